use crate::prefs::WordList;
use crate::resolve::lookup_key;
use std::collections::BTreeSet;

/// Words tagged with this class keep their popover whatever list is active.
pub const EXTRA_TAG: &str = "extra";

/// A pre-rendered word token as the page hands it over.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WordSpan {
    pub text: String,
    pub lemma: Option<String>,
    pub tags: BTreeSet<String>,
}

impl WordSpan {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_lemma(mut self, lemma: impl Into<String>) -> Self {
        self.lemma = Some(lemma.into());
        self
    }

    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Takes membership tags from a whitespace separated class attribute.
    pub fn with_class_list(self, classes: &str) -> Self {
        self.with_tags(classes.split_whitespace())
    }

    pub fn lookup_key(&self) -> &str {
        lookup_key(&self.text, self.lemma.as_deref())
    }

    pub fn is_eligible(&self, filter: WordList) -> bool {
        is_eligible(&self.tags, filter)
    }
}

/// A word gets a popover when it belongs to the active list or is tagged
/// `extra`. `off` matches no real tag.
pub fn is_eligible(tags: &BTreeSet<String>, filter: WordList) -> bool {
    tags.contains(filter.as_str()) || tags.contains(EXTRA_TAG)
}
