use fst::Map;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;
use zstd::stream::decode_all;

const ALIAS_SENTINEL: char = '>';
const VERBATIM_SENTINEL: char = '<';

/// A parsed dictionary value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DictEntry {
    /// Redirects to another key (`>key`).
    Alias(String),
    /// Final markup (`<...`), used unmodified.
    Verbatim(String),
    /// Definition text, possibly with `pos\ttext` lines.
    Plain(String),
}

impl DictEntry {
    pub fn parse(raw: &str) -> Self {
        if let Some(target) = raw.strip_prefix(ALIAS_SENTINEL) {
            DictEntry::Alias(target.to_string())
        } else if raw.starts_with(VERBATIM_SENTINEL) {
            DictEntry::Verbatim(raw.to_string())
        } else {
            DictEntry::Plain(raw.to_string())
        }
    }

    /// The value as it appeared in the source, sentinel included.
    pub fn raw(&self) -> String {
        match self {
            DictEntry::Alias(target) => format!("{ALIAS_SENTINEL}{target}"),
            DictEntry::Verbatim(markup) => markup.clone(),
            DictEntry::Plain(text) => text.clone(),
        }
    }

    pub fn shape(&self) -> EntryShape {
        match self {
            DictEntry::Alias(_) => EntryShape::Alias,
            DictEntry::Verbatim(_) => EntryShape::Verbatim,
            DictEntry::Plain(_) => EntryShape::Plain,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryShape {
    Alias,
    Verbatim,
    Plain,
}

impl fmt::Display for EntryShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryShape::Alias => write!(f, "alias"),
            EntryShape::Verbatim => write!(f, "verbatim"),
            EntryShape::Plain => write!(f, "plain"),
        }
    }
}

#[derive(Debug)]
pub enum DictionaryError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Index(fst::Error),
    Format { line: usize, message: String },
    UnsupportedFormat(String),
}

impl fmt::Display for DictionaryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DictionaryError::Io(err) => write!(f, "io error: {err}"),
            DictionaryError::Json(err) => write!(f, "invalid dictionary json: {err}"),
            DictionaryError::Index(err) => write!(f, "failed to build key index: {err}"),
            DictionaryError::Format { line, message } => {
                write!(f, "malformed dictionary line {line}: {message}")
            }
            DictionaryError::UnsupportedFormat(name) => {
                write!(f, "unsupported dictionary format: {name}")
            }
        }
    }
}

impl std::error::Error for DictionaryError {}

impl From<std::io::Error> for DictionaryError {
    fn from(value: std::io::Error) -> Self {
        DictionaryError::Io(value)
    }
}

impl From<serde_json::Error> for DictionaryError {
    fn from(value: serde_json::Error) -> Self {
        DictionaryError::Json(value)
    }
}

impl From<fst::Error> for DictionaryError {
    fn from(value: fst::Error) -> Self {
        DictionaryError::Index(value)
    }
}

/// Immutable key to entry mapping, indexed with an FST.
pub struct Dictionary {
    index: Map<Vec<u8>>,
    entries: Vec<DictEntry>,
}

impl fmt::Debug for Dictionary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dictionary")
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl Dictionary {
    /// Builds a dictionary from raw key/value pairs. Later duplicates win.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, DictionaryError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let sorted: BTreeMap<String, DictEntry> = pairs
            .into_iter()
            .map(|(key, value)| (key.into(), DictEntry::parse(value.as_ref())))
            .collect();
        let mut entries = Vec::with_capacity(sorted.len());
        let mut keys = Vec::with_capacity(sorted.len());
        for (slot, (key, entry)) in sorted.into_iter().enumerate() {
            keys.push((key, slot as u64));
            entries.push(entry);
        }
        let index = Map::from_iter(keys)?;
        debug!(entries = entries.len(), "dictionary indexed");
        Ok(Self { index, entries })
    }

    pub fn from_json_str(input: &str) -> Result<Self, DictionaryError> {
        let object: BTreeMap<String, Value> = serde_json::from_str(input)?;
        let mut pairs = Vec::with_capacity(object.len());
        for (key, value) in object {
            match value {
                Value::String(text) => pairs.push((key, text)),
                other => {
                    return Err(DictionaryError::Format {
                        line: 0,
                        message: format!("value for {key:?} is not a string: {other}"),
                    });
                }
            }
        }
        Self::from_pairs(pairs)
    }

    /// Reads the generated script form, `const DICT = {key:"value",...};`.
    pub fn from_script_str(input: &str) -> Result<Self, DictionaryError> {
        let start = input.find('{').ok_or_else(|| DictionaryError::Format {
            line: 1,
            message: "missing object literal".to_string(),
        })?;
        let end = input.rfind('}').ok_or_else(|| DictionaryError::Format {
            line: 1,
            message: "unterminated object literal".to_string(),
        })?;
        if end < start {
            return Err(DictionaryError::Format {
                line: 1,
                message: "unterminated object literal".to_string(),
            });
        }
        Self::from_json_str(&quote_bare_keys(&input[start..=end]))
    }

    /// One `key<TAB>value` per line; `\n`, `\t` and `\\` are unescaped in values.
    pub fn from_tsv_str(input: &str) -> Result<Self, DictionaryError> {
        let mut pairs = Vec::new();
        for (idx, line) in input.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let (key, value) = line.split_once('\t').ok_or_else(|| DictionaryError::Format {
                line: idx + 1,
                message: "expected key<TAB>value".to_string(),
            })?;
            pairs.push((key.to_string(), unescape_value(value)));
        }
        Self::from_pairs(pairs)
    }

    /// Loads a dictionary file, choosing the reader from its extension.
    /// A trailing `.zst` is decompressed first.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DictionaryError> {
        let path = path.as_ref();
        let mut bytes = fs::read(path)?;
        let mut name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if let Some(stripped) = name.strip_suffix(".zst") {
            bytes = decode_all(Cursor::new(bytes))?;
            name = stripped.to_string();
        }
        let text = String::from_utf8(bytes).map_err(|err| {
            DictionaryError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, err))
        })?;
        let extension = name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
        let dictionary = match extension {
            "json" => Self::from_json_str(&text)?,
            "js" => Self::from_script_str(&text)?,
            "tsv" | "txt" => Self::from_tsv_str(&text)?,
            _ => return Err(DictionaryError::UnsupportedFormat(name)),
        };
        debug!(path = %path.display(), entries = dictionary.len(), "dictionary loaded");
        Ok(dictionary)
    }

    pub fn get(&self, key: &str) -> Option<&DictEntry> {
        self.index
            .get(key)
            .and_then(|slot| self.entries.get(slot as usize))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Quotes identifier keys outside string literals so the object parses as JSON.
fn quote_bare_keys(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut output = String::with_capacity(input.len() + input.len() / 8);
    let mut in_string = false;
    let mut escaped = false;
    let mut idx = 0;
    while idx < chars.len() {
        let ch = chars[idx];
        if in_string {
            output.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            idx += 1;
            continue;
        }
        if ch == '"' {
            in_string = true;
            output.push(ch);
            idx += 1;
            continue;
        }
        if is_bare_key_char(ch) {
            let start = idx;
            while idx < chars.len() && is_bare_key_char(chars[idx]) {
                idx += 1;
            }
            let mut lookahead = idx;
            while lookahead < chars.len() && chars[lookahead].is_whitespace() {
                lookahead += 1;
            }
            let ident: String = chars[start..idx].iter().collect();
            if lookahead < chars.len() && chars[lookahead] == ':' {
                output.push('"');
                output.push_str(&ident);
                output.push('"');
            } else {
                output.push_str(&ident);
            }
            continue;
        }
        output.push(ch);
        idx += 1;
    }
    output
}

fn is_bare_key_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '$'
}

fn unescape_value(value: &str) -> String {
    let mut output = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            output.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => output.push('\n'),
            Some('t') => output.push('\t'),
            Some('\\') => output.push('\\'),
            Some(other) => {
                output.push('\\');
                output.push(other);
            }
            None => output.push('\\'),
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_detects_sentinels() {
        assert_eq!(DictEntry::parse(">run"), DictEntry::Alias("run".into()));
        assert_eq!(
            DictEntry::parse("<b>bold</b>"),
            DictEntry::Verbatim("<b>bold</b>".into())
        );
        assert_eq!(
            DictEntry::parse("v\trun quickly"),
            DictEntry::Plain("v\trun quickly".into())
        );
        assert_eq!(DictEntry::parse(">"), DictEntry::Alias(String::new()));
        assert_eq!(DictEntry::parse(">run").raw(), ">run");
    }

    #[test]
    fn later_duplicates_win() {
        let dict = Dictionary::from_pairs([("run", "first"), ("run", "second")]).unwrap();
        assert_eq!(dict.len(), 1);
        assert_eq!(dict.get("run"), Some(&DictEntry::Plain("second".into())));
    }

    #[test]
    fn lookup_is_exact() {
        let dict = Dictionary::from_pairs([("run", "v\trun"), ("runner", "n\tone who runs")]).unwrap();
        assert!(dict.contains_key("run"));
        assert!(dict.get("ru").is_none());
        assert!(dict.get("Run").is_none());
        assert!(dict.get("").is_none());
    }

    #[test]
    fn json_loader_rejects_non_string_values() {
        let dict = Dictionary::from_json_str(r#"{"ran": ">run", "run": "v\trun"}"#).unwrap();
        assert_eq!(dict.get("ran"), Some(&DictEntry::Alias("run".into())));
        let err = Dictionary::from_json_str(r#"{"run": 3}"#).unwrap_err();
        assert!(matches!(err, DictionaryError::Format { .. }));
    }

    #[test]
    fn script_loader_quotes_bare_keys_only() {
        let script = r#"const DICT = {run:"v\trun quickly",ran:">run","a b":"x, y: z",k2:"<i>k</i>"};"#;
        let dict = Dictionary::from_script_str(script).unwrap();
        assert_eq!(dict.len(), 4);
        assert_eq!(
            dict.get("run"),
            Some(&DictEntry::Plain("v\trun quickly".into()))
        );
        assert_eq!(dict.get("a b"), Some(&DictEntry::Plain("x, y: z".into())));
        assert_eq!(
            dict.get("k2"),
            Some(&DictEntry::Verbatim("<i>k</i>".into()))
        );
    }

    #[test]
    fn tsv_loader_unescapes_and_reports_lines() {
        let dict = Dictionary::from_tsv_str("run\tv\\trun quickly\\nn\\ta fast pace\n\nran\t>run\n").unwrap();
        assert_eq!(
            dict.get("run"),
            Some(&DictEntry::Plain("v\trun quickly\nn\ta fast pace".into()))
        );
        let err = Dictionary::from_tsv_str("run\tv\\trun\nbroken\n").unwrap_err();
        assert!(matches!(err, DictionaryError::Format { line: 2, .. }));
    }

    #[test]
    fn open_reads_compressed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dict.json.zst");
        let body = br#"{"run": "v\trun"}"#;
        let compressed = zstd::stream::encode_all(Cursor::new(&body[..]), 3).unwrap();
        fs::write(&path, compressed).unwrap();
        let dict = Dictionary::open(&path).unwrap();
        assert!(dict.contains_key("run"));

        let unknown = dir.path().join("dict.csv");
        fs::write(&unknown, "run,v").unwrap();
        assert!(matches!(
            Dictionary::open(&unknown),
            Err(DictionaryError::UnsupportedFormat(_))
        ));
    }
}
