use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

pub const WORD_LIST_KEY: &str = "wordList";
pub const THEME_KEY: &str = "theme";

/// A synchronous string key-value surface that outlives a page visit.
pub trait KeyValueStore {
    fn get(&self, name: &str) -> Option<String>;
    fn set(&mut self, name: &str, value: &str);
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }

    fn set(&mut self, name: &str, value: &str) {
        self.values.insert(name.to_string(), value.to_string());
    }
}

/// Preferences kept in a JSON object file.
///
/// An unreadable or malformed file reads as empty; failed writes are logged
/// and dropped.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl JsonFileStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|err| {
                warn!(path = %path.display(), error = %err, "ignoring malformed preference file");
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };
        Self { path, values }
    }

    fn flush(&self) {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(err) = fs::create_dir_all(parent) {
                    warn!(error = %err, "failed to create preference directory");
                    return;
                }
            }
        }
        let bytes = match serde_json::to_vec_pretty(&self.values) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(error = %err, "failed to serialize preferences");
                return;
            }
        };
        if let Err(err) = fs::write(&self.path, bytes) {
            warn!(path = %self.path.display(), error = %err, "failed to write preferences");
        }
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }

    fn set(&mut self, name: &str, value: &str) {
        self.values.insert(name.to_string(), value.to_string());
        self.flush();
    }
}

/// Validated access to named string preferences.
#[derive(Debug, Clone, Default)]
pub struct PreferenceStore<S> {
    store: S,
}

impl<S: KeyValueStore> PreferenceStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Reads `name`, falling back to `default_value` when absent or empty, and
    /// to `allowed[0]` when the result is outside a non-empty `allowed`.
    pub fn load(&self, name: &str, default_value: &str, allowed: &[&str]) -> String {
        let value = self
            .store
            .get(name)
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| default_value.to_string());
        match allowed.first() {
            Some(first) if !allowed.contains(&value.as_str()) => first.to_string(),
            _ => value,
        }
    }

    pub fn store(&mut self, name: &str, value: &str) {
        self.store.set(name, value);
    }

    pub fn inner(&self) -> &S {
        &self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Preference {
    pub name: String,
    pub value: String,
    pub allowed_values: Vec<String>,
}

impl Preference {
    pub fn load<S: KeyValueStore>(
        prefs: &PreferenceStore<S>,
        name: &str,
        default_value: &str,
        allowed: &[&str],
    ) -> Self {
        Self {
            name: name.to_string(),
            value: prefs.load(name, default_value, allowed),
            allowed_values: allowed.iter().map(|value| value.to_string()).collect(),
        }
    }

    pub fn allows(&self, value: &str) -> bool {
        self.allowed_values.is_empty() || self.allowed_values.iter().any(|v| v == value)
    }

    /// Persists `value` if it is allowed and differs from the current one.
    pub fn change<S: KeyValueStore>(&mut self, prefs: &mut PreferenceStore<S>, value: &str) -> bool {
        if self.value == value || !self.allows(value) {
            return false;
        }
        self.value = value.to_string();
        prefs.store(&self.name, &self.value);
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownValue {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} {:?}", self.kind, self.value)
    }
}

impl std::error::Error for UnknownValue {}

/// The reader's vocabulary list filter.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WordList {
    #[default]
    Ielts,
    Cet6,
    Off,
}

impl WordList {
    pub const ALL: [WordList; 3] = [WordList::Ielts, WordList::Cet6, WordList::Off];
    pub const NAMES: [&'static str; 3] = ["ielts", "cet6", "off"];

    pub fn as_str(&self) -> &'static str {
        match self {
            WordList::Ielts => "ielts",
            WordList::Cet6 => "cet6",
            WordList::Off => "off",
        }
    }

    pub fn is_off(&self) -> bool {
        matches!(self, WordList::Off)
    }

    pub fn load<S: KeyValueStore>(prefs: &PreferenceStore<S>) -> Self {
        prefs
            .load(WORD_LIST_KEY, Self::default().as_str(), &Self::NAMES)
            .parse()
            .unwrap_or_default()
    }
}

impl fmt::Display for WordList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WordList {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|list| list.as_str() == s)
            .ok_or_else(|| UnknownValue {
                kind: "word list",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub const ALL: [Theme; 2] = [Theme::Light, Theme::Dark];
    pub const NAMES: [&'static str; 2] = ["light", "dark"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn load<S: KeyValueStore>(prefs: &PreferenceStore<S>) -> Self {
        prefs
            .load(THEME_KEY, Self::default().as_str(), &Self::NAMES)
            .parse()
            .unwrap_or_default()
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|theme| theme.as_str() == s)
            .ok_or_else(|| UnknownValue {
                kind: "theme",
                value: s.to_string(),
            })
    }
}
