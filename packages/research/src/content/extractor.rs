//! HTML main-content extractors.

use indexmap::IndexMap;
use scraper::{ElementRef, Html, Node, Selector};

use super::MIN_CONTENT_CHARS;
use crate::traits::content::{ContentExtractor, ExtractedContent};

/// Containers tried in order by [`MainContentExtractor`].
const MAIN_SELECTORS: &[&str] = &[
    "main",
    "article",
    "[role='main']",
    "#content",
    "#main",
    ".content",
    ".main",
    ".post-content",
    ".entry-content",
];

const BOILERPLATE_TAGS: &[&str] = &[
    "nav", "header", "footer", "aside", "script", "style", "noscript", "iframe", "form", "svg",
];

const BOILERPLATE_MARKERS: &[&str] = &[
    "nav", "navbar", "header", "footer", "sidebar", "menu", "advertisement", "ads", "cookie",
];

/// Paragraphs shorter than this do not count toward readability scores.
const MIN_PARAGRAPH_CHARS: usize = 25;

fn is_boilerplate(element: &ElementRef<'_>) -> bool {
    let value = element.value();
    if BOILERPLATE_TAGS.contains(&value.name()) {
        return true;
    }
    let marked = |token: &str| BOILERPLATE_MARKERS.contains(&token.to_ascii_lowercase().as_str());
    value.id().is_some_and(marked) || value.classes().any(marked)
}

/// Visible text under `element`, skipping boilerplate subtrees.
fn visible_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    push_text(element, &mut out);
    collapse_whitespace(&out)
}

fn push_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    if !is_boilerplate(&child) {
                        push_text(child, out);
                    }
                }
            }
            _ => {}
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn page_title(document: &Html) -> Option<String> {
    ["title", "h1"].iter().find_map(|s| {
        let selector = Selector::parse(s).ok()?;
        document
            .select(&selector)
            .next()
            .map(|el| collapse_whitespace(&el.text().collect::<String>()))
            .filter(|t| !t.is_empty())
    })
}

fn long_enough(text: &str) -> bool {
    text.chars().count() >= MIN_CONTENT_CHARS
}

/// Selector-based extractor: the first main-content container with enough
/// text, boilerplate stripped. Pages without a recognizable container are
/// left to [`ReadabilityExtractor`].
#[derive(Debug, Clone, Default)]
pub struct MainContentExtractor;

impl ContentExtractor for MainContentExtractor {
    fn extract(&self, html: &str) -> Option<ExtractedContent> {
        let document = Html::parse_document(html);

        let text = MAIN_SELECTORS.iter().find_map(|s| {
            let selector = Selector::parse(s).ok()?;
            document
                .select(&selector)
                .map(visible_text)
                .find(|text| long_enough(text))
        })?;

        Some(ExtractedContent {
            title: page_title(&document),
            text,
        })
    }
}

#[derive(Default)]
struct ParagraphGroup {
    score: usize,
    paragraphs: Vec<String>,
}

/// Readability-style extractor: groups paragraphs by parent container and
/// keeps the densest group, scored by paragraph length plus comma count.
#[derive(Debug, Clone, Default)]
pub struct ReadabilityExtractor;

impl ContentExtractor for ReadabilityExtractor {
    fn extract(&self, html: &str) -> Option<ExtractedContent> {
        let document = Html::parse_document(html);
        let paragraph = Selector::parse("p").ok()?;

        let mut groups: IndexMap<_, ParagraphGroup> = IndexMap::new();
        for p in document.select(&paragraph) {
            let in_boilerplate = p
                .ancestors()
                .filter_map(ElementRef::wrap)
                .any(|a| is_boilerplate(&a));
            if in_boilerplate {
                continue;
            }

            let text = collapse_whitespace(&p.text().collect::<String>());
            let len = text.chars().count();
            if len < MIN_PARAGRAPH_CHARS {
                continue;
            }
            let Some(parent) = p.parent() else {
                continue;
            };

            let group = groups.entry(parent.id()).or_default();
            group.score += len + text.matches(',').count() * 10;
            group.paragraphs.push(text);
        }

        let best = groups
            .into_values()
            .reduce(|best, next| if next.score > best.score { next } else { best })?;
        let text = best.paragraphs.join("\n\n");
        if !long_enough(&text) {
            return None;
        }

        Some(ExtractedContent {
            title: page_title(&document),
            text,
        })
    }
}

/// Main-content extraction with a readability fallback.
#[derive(Debug, Clone, Default)]
pub struct TwoStageExtractor {
    primary: MainContentExtractor,
    fallback: ReadabilityExtractor,
}

impl ContentExtractor for TwoStageExtractor {
    fn extract(&self, html: &str) -> Option<ExtractedContent> {
        self.primary.extract(html).or_else(|| {
            tracing::trace!("Main content extraction failed, trying readability");
            self.fallback.extract(html)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentence() -> &'static str {
        "The Ashby ferry carried carts, stock and passengers across the Clarence River for decades. "
    }

    #[test]
    fn test_main_content_skips_boilerplate() {
        let html = format!(
            "<html><head><title>Ashby Ferry</title></head><body>\
             <nav>Home About Contact</nav>\
             <main><p>{}</p><p>{}</p><div class=\"sidebar\">Related links</div><p>{}</p></main>\
             <footer>Copyright</footer></body></html>",
            sentence(),
            sentence(),
            sentence()
        );
        let content = MainContentExtractor.extract(&html).unwrap();
        assert_eq!(content.title.as_deref(), Some("Ashby Ferry"));
        assert!(content.text.starts_with("The Ashby ferry"));
        assert!(!content.text.contains("Related links"));
        assert!(!content.text.contains("Copyright"));
    }

    #[test]
    fn test_short_content_is_failure() {
        let html = "<html><body><main><p>Too short.</p></main></body></html>";
        assert!(MainContentExtractor.extract(html).is_none());
        assert!(ReadabilityExtractor.extract(html).is_none());
        assert!(TwoStageExtractor::default().extract(html).is_none());
    }

    #[test]
    fn test_readability_picks_densest_container() {
        let html = format!(
            "<html><body>\
             <div id=\"teaser\"><p>A short teaser paragraph about ferries.</p></div>\
             <div id=\"story\"><p>{}</p><p>{}</p><p>{}</p></div>\
             </body></html>",
            sentence(),
            sentence(),
            sentence()
        );
        let content = ReadabilityExtractor.extract(&html).unwrap();
        assert!(!content.text.contains("teaser"));
        assert_eq!(content.text.matches("Ashby ferry").count(), 3);
    }

    #[test]
    fn test_two_stage_falls_back() {
        // No main container, so only paragraph density finds the story.
        let html = format!(
            "<html><body><div class=\"menu\">{}</div><section><p>{}</p><p>{}</p><p>{}</p></section></body></html>",
            "x ".repeat(10),
            sentence(),
            sentence(),
            sentence()
        );
        let content = TwoStageExtractor::default().extract(&html).unwrap();
        assert!(content.text.contains("Clarence River"));
    }
}
