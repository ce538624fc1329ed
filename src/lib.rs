//! Definition popovers and reader preferences for vocabulary-aware reading pages.
//!
//! A [`Page`] owns the persisted word-list and theme preferences. When the
//! reader interacts with a tagged word, the page gates the request through
//! [`is_eligible`], resolves the definition with a [`DefinitionResolver`] and
//! keeps the popover's style classes in step with the theme via
//! [`merge_theme`].

mod data;
mod eligibility;
mod page;
mod popover;
mod prefs;
mod resolve;
mod theme;

#[cfg(feature = "web")]
pub mod web;

pub use data::{DictEntry, Dictionary, DictionaryError, EntryShape};
pub use eligibility::{EXTRA_TAG, WordSpan, is_eligible};
pub use page::{Page, PreferenceState};
pub use popover::{PopoverConfig, PopoverDecision, PopoverHandle, Trigger, WordPopover};
pub use prefs::{
    JsonFileStore, KeyValueStore, MemoryStore, Preference, PreferenceStore, THEME_KEY, Theme,
    UnknownValue, WORD_LIST_KEY, WordList,
};
pub use resolve::{DefinitionResolver, RenderedDefinition, ResolvedEntry, format_plain, lookup_key};
pub use theme::{POPOVER_THEMES, body_class, merge_theme, popover_token};
