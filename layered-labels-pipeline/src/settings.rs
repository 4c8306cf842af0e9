//! Key/value settings used to construct sources and processors.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::PipelineError;

/// Named string values: file paths, flags, names.
pub trait ConfigProvider: Send + Sync {
    fn get(&self, key: &str) -> Option<&str>;

    /// Like [`get`](ConfigProvider::get) but a missing key is an error.
    fn require(&self, key: &str) -> Result<&str, PipelineError> {
        self.get(key).ok_or_else(|| PipelineError::MissingSetting {
            key: key.to_string(),
        })
    }
}

/// Settings read from a TOML file.
///
/// Nested tables are flattened into dotted keys and scalars are kept as
/// strings:
///
/// ```toml
/// extension = "txt"
///
/// [measures]
/// standalonePath = "dicts/standalone.txt"
/// ```
///
/// yields `extension` and `measures.standalonePath`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    values: BTreeMap<String, String>,
}

impl Settings {
    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let settings = Self::parse(&content).map_err(|source| PipelineError::Settings {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), keys = settings.len(), "loaded settings");
        Ok(settings)
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        let table: toml::Table = toml::from_str(content)?;
        let mut values = BTreeMap::new();
        flatten("", &table, &mut values);
        Ok(Self { values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Values from `other` replace values under the same key.
    pub fn overlay(&mut self, other: &Settings) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
    }
}

fn flatten(prefix: &str, table: &toml::Table, values: &mut BTreeMap<String, String>) {
    for (key, value) in table {
        let key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };

        let scalar = match value {
            toml::Value::String(s) => s.clone(),
            toml::Value::Integer(i) => i.to_string(),
            toml::Value::Float(f) => f.to_string(),
            toml::Value::Boolean(b) => b.to_string(),
            toml::Value::Datetime(d) => d.to_string(),
            toml::Value::Table(inner) => {
                flatten(&key, inner, values);
                continue;
            }
            toml::Value::Array(_) => {
                debug!(key = %key, "skipping array setting");
                continue;
            }
        };
        values.insert(key, scalar);
    }
}

impl ConfigProvider for Settings {
    fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// In-memory settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapSettings {
    values: BTreeMap<String, String>,
}

impl MapSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapSettings {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut settings = MapSettings::new();
        for (key, value) in iter {
            settings.insert(key, value);
        }
        settings
    }
}

impl ConfigProvider for MapSettings {
    fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_flattens_nested_tables() {
        let settings = Settings::parse(
            r#"
            extension = "txt"
            workers = 4
            lowercase = true

            [measures]
            standalonePath = "dicts/standalone.txt"

            [measures.fuzzy]
            threshold = 0.5
            names = ["a", "b"]
            "#,
        )
        .unwrap();

        assert_eq!(settings.get("extension"), Some("txt"));
        assert_eq!(settings.get("workers"), Some("4"));
        assert_eq!(settings.get("lowercase"), Some("true"));
        assert_eq!(
            settings.get("measures.standalonePath"),
            Some("dicts/standalone.txt")
        );
        assert_eq!(settings.get("measures.fuzzy.threshold"), Some("0.5"));
        assert_eq!(settings.get("measures.fuzzy.names"), None);
        assert_eq!(settings.len(), 5);
    }

    #[test]
    fn test_require_reports_key() {
        let settings = MapSettings::new().with("documentName", "Original");
        assert_eq!(settings.require("documentName").unwrap(), "Original");

        let err = settings.require("inputDirectory").unwrap_err();
        assert!(matches!(err, PipelineError::MissingSetting { ref key } if key == "inputDirectory"));
        assert_eq!(err.to_string(), "missing setting \"inputDirectory\"");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[source]\nextension = \"txt\"").unwrap();

        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.get("source.extension"), Some("txt"));
    }

    #[test]
    fn test_load_errors_carry_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "extension = ").unwrap();
        match Settings::load(file.path()) {
            Err(PipelineError::Settings { path, .. }) => assert_eq!(path, file.path()),
            other => panic!("expected a settings error, got {:?}", other),
        }

        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        match Settings::load(&missing) {
            Err(PipelineError::Io { path, .. }) => assert_eq!(path, missing),
            other => panic!("expected an io error, got {:?}", other),
        }
    }

    #[test]
    fn test_overlay() {
        let mut base = Settings::parse("a = \"1\"\nb = \"2\"").unwrap();
        let top = Settings::parse("b = \"3\"").unwrap();
        base.overlay(&top);
        assert_eq!(base.get("a"), Some("1"));
        assert_eq!(base.get("b"), Some("3"));
        assert_eq!(base.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_map_settings_from_iter() {
        let settings: MapSettings = [("a", "x"), ("b", "y")].into_iter().collect();
        assert_eq!(settings.get("b"), Some("y"));
    }
}
