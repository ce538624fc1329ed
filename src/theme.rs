use crate::prefs::Theme;

/// Popover-library theme token for each page theme.
pub const POPOVER_THEMES: [(Theme, &str); 2] = [(Theme::Light, "light-border"), (Theme::Dark, "dark")];

pub fn popover_token(theme: Theme) -> &'static str {
    POPOVER_THEMES
        .iter()
        .find(|(candidate, _)| *candidate == theme)
        .map(|(_, token)| *token)
        .unwrap_or(POPOVER_THEMES[0].1)
}

fn is_theme_token(class: &str) -> bool {
    POPOVER_THEMES.iter().any(|(_, token)| *token == class)
}

/// Puts the token for `theme` in front of `classes`, dropping every theme
/// token already present and keeping the rest in order.
pub fn merge_theme(theme: Theme, classes: &str) -> String {
    let mut merged = String::from(popover_token(theme));
    for class in classes.split_whitespace().filter(|class| !is_theme_token(class)) {
        merged.push(' ');
        merged.push_str(class);
    }
    merged
}

/// Class applied to the document body.
pub fn body_class(theme: Theme) -> String {
    format!("theme-{theme}")
}
