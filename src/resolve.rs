use crate::data::{DictEntry, Dictionary, EntryShape};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::borrow::Cow;
use std::fmt;
use tracing::trace;

static POS_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?mR)^([a-z]+)\t(.+)$").expect("valid part-of-speech pattern"));
const POS_REPLACEMENT: &str = r#"<span class="pos">${1}</span> <span class="text">${2}</span>"#;

/// Markup ready for a popover content slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RenderedDefinition(String);

impl RenderedDefinition {
    pub fn as_html(&self) -> &str {
        &self.0
    }

    pub fn into_html(self) -> String {
        self.0
    }
}

impl fmt::Display for RenderedDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A resolution together with where its body came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedEntry {
    pub requested: String,
    pub source_key: String,
    pub shape: EntryShape,
    pub html: RenderedDefinition,
}

/// The explicit lookup key wins when present and non-empty.
pub fn lookup_key<'a>(surface: &'a str, lemma: Option<&'a str>) -> &'a str {
    match lemma {
        Some(lemma) if !lemma.is_empty() => lemma,
        _ => surface,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DefinitionResolver<'a> {
    dictionary: &'a Dictionary,
}

impl<'a> DefinitionResolver<'a> {
    pub fn new(dictionary: &'a Dictionary) -> Self {
        Self { dictionary }
    }

    pub fn dictionary(&self) -> &'a Dictionary {
        self.dictionary
    }

    /// Resolves `key` through at most one alias hop. `None` means the popover
    /// must not open.
    pub fn resolve(&self, key: &str) -> Option<RenderedDefinition> {
        self.explain(key).map(|resolved| resolved.html)
    }

    pub fn explain(&self, key: &str) -> Option<ResolvedEntry> {
        let (source_key, entry) = match self.dictionary.get(key)? {
            DictEntry::Plain(text) if text.is_empty() => {
                trace!(key, "empty definition");
                return None;
            }
            DictEntry::Alias(target) => match self.dictionary.get(target) {
                Some(entry) => (target.as_str(), entry),
                None => {
                    trace!(key, alias = target.as_str(), "alias target missing");
                    return None;
                }
            },
            entry => (key, entry),
        };
        let body = match entry {
            DictEntry::Verbatim(markup) => Cow::Borrowed(markup.as_str()),
            DictEntry::Plain(text) => format_plain(text),
            // A second alias is not followed; its raw text is rendered as-is.
            DictEntry::Alias(_) => Cow::Owned(format_plain(&entry.raw()).into_owned()),
        };
        Some(ResolvedEntry {
            requested: key.to_string(),
            source_key: source_key.to_string(),
            shape: entry.shape(),
            html: RenderedDefinition(format!(r#"<div class="definitions">{body}</div>"#)),
        })
    }
}

/// Rewrites `pos\ttext` lines and wraps the result in a text span unless it
/// now starts with markup.
pub fn format_plain(text: &str) -> Cow<'_, str> {
    let formatted = POS_LINE.replace_all(text, POS_REPLACEMENT);
    if formatted.starts_with('<') {
        formatted
    } else {
        Cow::Owned(format!(r#"<span class="text">{formatted}</span>"#))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dictionary {
        Dictionary::from_pairs([
            ("run", "v\trun quickly\nn\ta fast pace"),
            ("ran", ">run"),
            ("gone", ">missing"),
            ("hop", ">ran"),
            ("html", "<b>bold</b> text"),
            ("html-alias", ">html"),
            ("plain", "simply a note"),
            ("mixed", "a note first\nadj\tquick"),
            ("blank", "   "),
            ("empty", ""),
            ("empty-target", ">"),
            ("to-empty", ">empty"),
            ("upper", "V\tnot a pos"),
            ("crlf", "v\trun\r\nn\tpace"),
        ])
        .unwrap()
    }

    #[test]
    fn alias_scenario_renders_both_lines() {
        let dict = sample();
        let resolver = DefinitionResolver::new(&dict);
        let html = resolver.resolve("ran").unwrap();
        assert_eq!(
            html.as_html(),
            "<div class=\"definitions\"><span class=\"pos\">v</span> <span class=\"text\">run quickly</span>\n<span class=\"pos\">n</span> <span class=\"text\">a fast pace</span></div>"
        );
        assert_eq!(resolver.resolve("ran"), resolver.resolve("run"));
    }

    #[test]
    fn missing_keys_and_targets_are_not_found() {
        let dict = sample();
        let resolver = DefinitionResolver::new(&dict);
        assert!(resolver.resolve("absent").is_none());
        assert!(resolver.resolve("gone").is_none());
        assert!(resolver.resolve("empty-target").is_none());
        assert!(resolver.resolve("empty").is_none());
    }

    #[test]
    fn alias_is_followed_exactly_once() {
        let dict = sample();
        let resolver = DefinitionResolver::new(&dict);
        let resolved = resolver.explain("hop").unwrap();
        assert_eq!(resolved.source_key, "ran");
        assert_eq!(resolved.shape, EntryShape::Alias);
        assert_eq!(
            resolved.html.as_html(),
            "<div class=\"definitions\"><span class=\"text\">>run</span></div>"
        );
    }

    #[test]
    fn verbatim_markup_passes_through() {
        let dict = sample();
        let resolver = DefinitionResolver::new(&dict);
        let expected = "<div class=\"definitions\"><b>bold</b> text</div>";
        assert_eq!(resolver.resolve("html").unwrap().as_html(), expected);
        assert_eq!(resolver.resolve("html-alias").unwrap().as_html(), expected);
    }

    #[test]
    fn plain_text_is_wrapped() {
        let dict = sample();
        let resolver = DefinitionResolver::new(&dict);
        assert_eq!(
            resolver.resolve("plain").unwrap().as_html(),
            "<div class=\"definitions\"><span class=\"text\">simply a note</span></div>"
        );
        assert_eq!(
            resolver.resolve("blank").unwrap().as_html(),
            "<div class=\"definitions\"><span class=\"text\">   </span></div>"
        );
        assert_eq!(
            resolver.resolve("upper").unwrap().as_html(),
            "<div class=\"definitions\"><span class=\"text\">V\tnot a pos</span></div>"
        );
    }

    #[test]
    fn alias_to_empty_value_renders_empty_text() {
        let dict = sample();
        let resolver = DefinitionResolver::new(&dict);
        assert_eq!(
            resolver.resolve("to-empty").unwrap().as_html(),
            "<div class=\"definitions\"><span class=\"text\"></span></div>"
        );
    }

    #[test]
    fn non_matching_lines_keep_their_place() {
        let dict = sample();
        let resolver = DefinitionResolver::new(&dict);
        assert_eq!(
            resolver.resolve("mixed").unwrap().as_html(),
            "<div class=\"definitions\"><span class=\"text\">a note first\n<span class=\"pos\">adj</span> <span class=\"text\">quick</span></span></div>"
        );
    }

    #[test]
    fn crlf_lines_are_formatted_without_carriage_returns() {
        let dict = sample();
        let resolver = DefinitionResolver::new(&dict);
        assert_eq!(
            resolver.resolve("crlf").unwrap().as_html(),
            "<div class=\"definitions\"><span class=\"pos\">v</span> <span class=\"text\">run</span>\r\n<span class=\"pos\">n</span> <span class=\"text\">pace</span></div>"
        );
    }

    #[test]
    fn lemma_overrides_surface_text() {
        assert_eq!(lookup_key("ran", Some("run")), "run");
        assert_eq!(lookup_key("ran", Some("")), "ran");
        assert_eq!(lookup_key("ran", None), "ran");
    }
}
