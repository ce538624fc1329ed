use crate::eligibility::WordSpan;
use serde::Serialize;

/// What a popover host exposes to the show hook before painting.
pub trait PopoverHandle {
    /// The current style-class string.
    fn theme(&self) -> &str;
    fn set_theme(&mut self, classes: String);
    fn set_content(&mut self, html: String);
}

/// A popover anchored on a word token.
pub trait WordPopover: PopoverHandle {
    fn reference(&self) -> &WordSpan;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopoverDecision {
    Show(String),
    Suppress,
}

impl PopoverDecision {
    /// The value a host's `onShow` callback returns; `false` cancels display.
    pub fn is_shown(&self) -> bool {
        matches!(self, PopoverDecision::Show(_))
    }

    pub fn content(&self) -> Option<&str> {
        match self {
            PopoverDecision::Show(html) => Some(html),
            PopoverDecision::Suppress => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    Click,
    Focus,
    #[serde(rename = "mouseenter focus")]
    Hover,
}

/// Host configuration for one kind of popover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PopoverConfig {
    pub selector: &'static str,
    pub delegated: bool,
    pub trigger: Trigger,
    pub touch: bool,
    pub interactive: bool,
    pub allow_html: bool,
    pub placeholder: Option<&'static str>,
    pub theme: &'static str,
}

impl PopoverConfig {
    pub const DEFINITION_THEME: &'static str = "definition-popup";
    pub const HELP_THEME: &'static str = "help-popup";

    /// Word popovers, delegated from the content section to `span.word`.
    pub fn definition() -> Self {
        Self {
            selector: "span.word",
            delegated: true,
            trigger: Trigger::Click,
            touch: true,
            interactive: true,
            allow_html: true,
            placeholder: Some("..."),
            theme: Self::DEFINITION_THEME,
        }
    }

    pub fn help() -> Self {
        Self {
            selector: "[data-tippy-content]",
            delegated: false,
            trigger: Trigger::Hover,
            touch: true,
            interactive: false,
            allow_html: true,
            placeholder: None,
            theme: Self::HELP_THEME,
        }
    }
}
