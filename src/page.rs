use crate::popover::{PopoverDecision, PopoverHandle, WordPopover};
use crate::prefs::{KeyValueStore, PreferenceStore, THEME_KEY, Theme, WORD_LIST_KEY, WordList};
use crate::resolve::DefinitionResolver;
use crate::theme::{body_class, merge_theme};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

const CONTENT_CLASS: &str = "content";

/// Snapshot of the reader's effective preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceState {
    pub word_list: WordList,
    pub theme: Theme,
}

/// Page-level coordinator that owns the preference state.
#[derive(Debug)]
pub struct Page<S> {
    prefs: PreferenceStore<S>,
    theme: Theme,
    word_list: WordList,
    word_list_buttons: BTreeMap<WordList, bool>,
    night_mode_active: bool,
}

impl<S: KeyValueStore> Page<S> {
    /// Reads both preferences once from `store`.
    pub fn new(store: S) -> Self {
        let prefs = PreferenceStore::new(store);
        let theme = Theme::load(&prefs);
        let word_list = WordList::load(&prefs);
        let word_list_buttons = WordList::ALL
            .into_iter()
            .map(|list| (list, list == word_list))
            .collect();
        debug!(%theme, %word_list, "page preferences loaded");
        Self {
            prefs,
            theme,
            word_list,
            word_list_buttons,
            night_mode_active: theme == Theme::Dark,
        }
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn word_list(&self) -> WordList {
        self.word_list
    }

    pub fn state(&self) -> PreferenceState {
        PreferenceState {
            word_list: self.word_list,
            theme: self.theme,
        }
    }

    pub fn store(&self) -> &S {
        self.prefs.inner()
    }

    pub fn into_store(self) -> S {
        self.prefs.into_inner()
    }

    pub fn body_class(&self) -> String {
        body_class(self.theme)
    }

    /// `content`, plus the active list unless the list is off.
    pub fn content_class(&self) -> String {
        if self.word_list.is_off() {
            CONTENT_CLASS.to_string()
        } else {
            format!("{CONTENT_CLASS} {}", self.word_list)
        }
    }

    pub fn night_mode_active(&self) -> bool {
        self.night_mode_active
    }

    pub fn is_word_list_button_active(&self, list: WordList) -> bool {
        self.word_list_buttons.get(&list).copied().unwrap_or(false)
    }

    pub fn change_theme(&mut self, theme: Theme) -> bool {
        if self.theme == theme {
            return false;
        }
        self.night_mode_active = theme == Theme::Dark;
        self.theme = theme;
        self.prefs.store(THEME_KEY, theme.as_str());
        debug!(%theme, "theme changed");
        true
    }

    /// Night-mode button: dark when it was inactive, light otherwise.
    pub fn toggle_night_mode(&mut self) -> Theme {
        let next = if self.night_mode_active {
            Theme::Light
        } else {
            Theme::Dark
        };
        self.change_theme(next);
        self.theme
    }

    pub fn change_word_list(&mut self, word_list: WordList) -> bool {
        if self.word_list == word_list {
            return false;
        }
        self.word_list_buttons.insert(self.word_list, false);
        self.word_list_buttons.insert(word_list, true);
        self.word_list = word_list;
        self.prefs.store(WORD_LIST_KEY, word_list.as_str());
        debug!(%word_list, "word list changed");
        true
    }

    /// Aligns any popover's style classes with the current theme.
    pub fn on_popover_show<H: PopoverHandle + ?Sized>(&self, handle: &mut H) {
        let merged = merge_theme(self.theme, handle.theme());
        handle.set_theme(merged);
    }

    /// Show hook for word popovers: theme, eligibility, then definition.
    pub fn on_word_popover_show<H: WordPopover + ?Sized>(
        &self,
        handle: &mut H,
        resolver: &DefinitionResolver<'_>,
    ) -> PopoverDecision {
        self.on_popover_show(handle);
        let word = handle.reference();
        if !word.is_eligible(self.word_list) {
            debug!(word = word.text.as_str(), list = %self.word_list, "word not in active list");
            return PopoverDecision::Suppress;
        }
        let key = word.lookup_key().to_string();
        match resolver.resolve(&key) {
            Some(definition) => {
                let html = definition.into_html();
                handle.set_content(html.clone());
                PopoverDecision::Show(html)
            }
            None => {
                debug!(key = key.as_str(), "no definition");
                PopoverDecision::Suppress
            }
        }
    }
}
