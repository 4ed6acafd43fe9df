//! Normalization of heterogeneous archive records.
//!
//! Known record shapes are decoded into a typed union and matched
//! exhaustively. Anything else goes through an ordered list of field-path
//! candidates, with a depth-bounded key search only as a last resort.

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::LazyLock;

use crate::types::evidence::{EvidenceRecord, EvidenceSource};

/// Depth limit for the last-resort key search.
const MAX_SEARCH_DEPTH: usize = 3;

static TAG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid tag pattern"));

/// A string or a number, as ids and years come in both forms.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Number(i64),
}

impl Scalar {
    fn into_string(self) -> String {
        match self {
            Scalar::Text(s) => s,
            Scalar::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn into_first(self) -> Option<T> {
        match self {
            OneOrMany::One(v) => Some(v),
            OneOrMany::Many(v) => v.into_iter().next(),
        }
    }

    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(v) => vec![v],
            OneOrMany::Many(v) => v,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct NamedTitle {
    #[serde(default)]
    title: Option<String>,
}

/// Newspaper article: `heading` plus `date`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArticleRecord {
    id: Scalar,
    heading: String,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    trove_url: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    snippet: Option<String>,
    #[serde(default)]
    article_text: Option<String>,
    #[serde(default)]
    title: Option<NamedTitle>,
}

#[derive(Debug, Clone, Deserialize)]
struct Identifier {
    #[serde(default)]
    linktype: Option<String>,
    #[serde(default)]
    value: Option<String>,
}

/// Catalogue work: `title` plus `issued` and nested identifier links.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkRecord {
    id: Scalar,
    title: String,
    #[serde(default)]
    issued: Option<Scalar>,
    #[serde(default)]
    trove_url: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    identifier: Option<OneOrMany<Identifier>>,
    #[serde(default)]
    snippet: Option<OneOrMany<String>>,
    #[serde(default, rename = "abstract")]
    summary: Option<OneOrMany<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RecordShape {
    Article(ArticleRecord),
    Work(WorkRecord),
    Unknown(Value),
}

/// Flat view of an archive record before it becomes evidence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedRecord {
    pub id: Option<String>,
    pub title: Option<String>,
    pub date: Option<String>,
    pub url: Option<String>,
    pub text: Option<String>,
    pub source_title: Option<String>,
}

impl NormalizedRecord {
    /// Convert into evidence; `None` when the record has neither id nor url.
    pub fn into_evidence(self, dataset: &str) -> Option<EvidenceRecord> {
        let native_id = self.id.clone().or_else(|| self.url.clone())?;
        let url = self.url.unwrap_or_default();
        let title = self
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| "Untitled record".to_string());

        let mut record =
            EvidenceRecord::new(EvidenceSource::Archive, native_id, title, url).with_dataset(dataset);
        if let Some(date) = self.date {
            record = record.with_published_date(date);
        }
        if let Some(text) = self.text.filter(|t| !t.is_empty()) {
            record = record.with_snippet(&text).with_text(text);
        }
        Some(record)
    }
}

/// Normalize one raw record. Never fails; missing fields are `None`.
pub fn normalize(raw: &Value) -> NormalizedRecord {
    let shape = serde_json::from_value::<RecordShape>(raw.clone())
        .unwrap_or_else(|_| RecordShape::Unknown(raw.clone()));

    match shape {
        RecordShape::Article(article) => NormalizedRecord {
            id: Some(article.id.into_string()),
            title: Some(clean_text(&article.heading)),
            date: article.date,
            url: article.trove_url.or(article.url),
            text: article
                .article_text
                .or(article.snippet)
                .map(|t| clean_text(&t)),
            source_title: article.title.and_then(|t| t.title),
        },
        RecordShape::Work(work) => {
            let link = work
                .identifier
                .map(OneOrMany::into_vec)
                .unwrap_or_default()
                .into_iter()
                .filter(|i| i.value.is_some())
                .min_by_key(|i| match i.linktype.as_deref() {
                    Some("fulltext") => 0,
                    Some("restricted") => 1,
                    _ => 2,
                })
                .and_then(|i| i.value);
            NormalizedRecord {
                id: Some(work.id.into_string()),
                title: Some(clean_text(&work.title)),
                date: work.issued.map(Scalar::into_string),
                url: work.trove_url.or(link).or(work.url),
                text: work
                    .summary
                    .and_then(OneOrMany::into_first)
                    .or_else(|| work.snippet.and_then(OneOrMany::into_first))
                    .map(|t| clean_text(&t)),
                source_title: None,
            }
        }
        RecordShape::Unknown(value) => normalize_unknown(&value),
    }
}

/// Ordered candidate paths per field; dotted segments index objects,
/// numeric segments index arrays.
const ID_PATHS: &[&str] = &["id", "recordId", "identifier.id", "identifier.0.value"];
const TITLE_PATHS: &[&str] = &["heading", "title", "title.title", "name", "headline"];
const DATE_PATHS: &[&str] = &["date", "issued", "publishedDate", "published", "year"];
const URL_PATHS: &[&str] = &["troveUrl", "url", "link", "identifier.0.value", "identifier.value"];
const TEXT_PATHS: &[&str] = &["articleText", "snippet", "abstract", "description", "summary"];

fn normalize_unknown(value: &Value) -> NormalizedRecord {
    NormalizedRecord {
        id: first_string(value, ID_PATHS),
        title: first_string(value, TITLE_PATHS).map(|t| clean_text(&t)),
        date: first_string(value, DATE_PATHS),
        url: first_string(value, URL_PATHS),
        text: first_string(value, TEXT_PATHS).map(|t| clean_text(&t)),
        source_title: None,
    }
}

fn first_string(value: &Value, paths: &[&str]) -> Option<String> {
    paths
        .iter()
        .find_map(|path| lookup(value, path).and_then(scalar_string))
        .or_else(|| {
            let keys: Vec<&str> = paths.iter().filter(|p| !p.contains('.')).copied().collect();
            find_key(value, &keys, MAX_SEARCH_DEPTH)
        })
}

fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => items.iter().find_map(scalar_string),
        _ => None,
    }
}

/// Breadth-first search for the first key in `keys` holding a scalar,
/// bounded by `depth` levels of nesting.
fn find_key(value: &Value, keys: &[&str], depth: usize) -> Option<String> {
    let mut frontier = vec![value];
    for _ in 0..=depth {
        let mut next = Vec::new();
        for node in frontier {
            match node {
                Value::Object(map) => {
                    if let Some(found) = keys
                        .iter()
                        .find_map(|k| map.get(*k).and_then(scalar_string))
                    {
                        return Some(found);
                    }
                    next.extend(map.values());
                }
                Value::Array(items) => next.extend(items.iter()),
                _ => {}
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }
    None
}

/// Strip markup and collapse whitespace.
pub fn clean_text(text: &str) -> String {
    TAG_PATTERN
        .replace_all(text, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
