//! Quote extraction.
//!
//! Picks the sentences of a text blob that mention the most distinct query
//! terms, skipping near-duplicates and capping length.

use std::collections::HashSet;

use crate::types::evidence::{cap_snippet, EvidenceRecord};

/// Marker appended to truncated quotes.
pub const ELLIPSIS: char = '…';

/// Default quote length cap in characters.
pub const DEFAULT_MAX_LEN: usize = 240;

/// Overlap above which a sentence counts as a duplicate of a chosen one.
const DUPLICATE_OVERLAP: f64 = 0.8;

/// Query terms: lowercase alphanumeric tokens longer than two characters,
/// deduplicated in first-seen order.
pub fn query_terms(query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    tokenize(query)
        .filter(|t| t.chars().count() > 2)
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

/// Lowercase alphanumeric tokens.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

/// Split on terminal punctuation (`.`, `!`, `?`) followed by whitespace or end.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            let at_boundary = chars.peek().map_or(true, |next| next.is_whitespace());
            if at_boundary {
                push_sentence(&mut sentences, &current);
                current.clear();
            }
        }
    }
    push_sentence(&mut sentences, &current);
    sentences
}

fn push_sentence(sentences: &mut Vec<String>, raw: &str) {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if !collapsed.is_empty() {
        sentences.push(collapsed);
    }
}

/// Return up to `k` best matching sentences, each at most `max_len`
/// characters plus the ellipsis marker.
///
/// Sentences mentioning no query term are never returned, so the result is
/// empty when nothing matches; callers fall back to the raw snippet.
pub fn best_sentences(text: &str, terms: &[String], k: usize, max_len: usize) -> Vec<String> {
    if k == 0 || terms.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(usize, String)> = split_sentences(text)
        .into_iter()
        .map(|sentence| {
            let words: HashSet<String> = tokenize(&sentence).collect();
            let score = terms.iter().filter(|t| words.contains(*t)).count();
            (score, sentence)
        })
        .filter(|(score, _)| *score > 0)
        .collect();

    // score desc, then length desc
    scored.sort_by(|a, b| {
        b.0.cmp(&a.0)
            .then_with(|| b.1.chars().count().cmp(&a.1.chars().count()))
    });

    let mut chosen: Vec<String> = Vec::new();
    let mut chosen_words: Vec<HashSet<String>> = Vec::new();

    for (_, sentence) in scored {
        if chosen.len() >= k {
            break;
        }
        let quote = truncate_with_ellipsis(&sentence, max_len);
        let words: HashSet<String> = tokenize(&quote).collect();
        if chosen_words
            .iter()
            .any(|existing| word_overlap(existing, &words) > DUPLICATE_OVERLAP)
        {
            continue;
        }
        chosen.push(quote);
        chosen_words.push(words);
    }

    chosen
}

/// Shared words over the smaller set's size.
pub fn word_overlap(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let smaller = a.len().min(b.len());
    if smaller == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / smaller as f64
}

/// Cap at `max_len` characters, appending [`ELLIPSIS`] when cut.
pub fn truncate_with_ellipsis(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_len).collect();
    cut = cut.trim_end().to_string();
    cut.push(ELLIPSIS);
    cut
}

/// Replace a record's snippets with its best quotes for `terms`.
///
/// Quotes come from the full text when there is one, else from the stored
/// snippets. When no sentence mentions a term the lead of that text is kept,
/// ending in [`ELLIPSIS`] when cut.
pub fn quote_record(record: &mut EvidenceRecord, terms: &[String], k: usize) {
    let body = if record.text.trim().is_empty() {
        record.snippets.join(" ")
    } else {
        record.text.clone()
    };

    let mut quotes = best_sentences(&body, terms, k, DEFAULT_MAX_LEN);
    if quotes.is_empty() {
        let lead = body.split_whitespace().collect::<Vec<_>>().join(" ");
        if lead.is_empty() {
            return;
        }
        quotes.push(truncate_with_ellipsis(&lead, DEFAULT_MAX_LEN));
    }
    record.snippets = quotes.iter().map(|q| cap_snippet(q)).collect();
}
