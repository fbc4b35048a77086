// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! App manifest loading.
//!
//! Each app checkout bundles a __manifest__ describing the app's metadata and
//! packaging directives. Manifests come in two encodings: TOML through
//! "manifest.toml", and JSON through "manifest.json". Both are loaded into the
//! same generic [`Manifest`] document, so fields the catalog builder knows
//! nothing about are passed through untouched.
//!
//! # Loader Priority
//!
//! Loaders are tried in a fixed order: TOML first, then JSON. A loader only
//! falls through to the next one when its manifest file does not exist. A
//! manifest that exists but cannot be parsed is an error, even if a manifest
//! of the other encoding would have been valid.

use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};

/// Generic manifest document.
///
/// Only `antifeatures`, `install`, and `resources` are interpreted. Everything
/// else is opaque.
#[derive(Default, Debug, PartialEq, Clone, Serialize)]
#[serde(transparent)]
pub struct Manifest(Map<String, Value>);

impl Manifest {
    /// Construct manifest from an already parsed document.
    ///
    /// # Errors
    ///
    /// - Return [`ManifestError::NotATable`] if document is not a table.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(ManifestError::NotATable {
                found: value_kind(&other),
            }),
        }
    }

    /// Lookup top-level field of manifest.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Check if manifest has top-level field.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Antifeature identifiers declared by manifest.
    ///
    /// Antifeatures are declared as a table whose keys are the identifiers,
    /// e.g., `[antifeatures] non-free-network = "..."`. A missing table means
    /// no antifeatures.
    ///
    /// # Errors
    ///
    /// - Return [`ManifestError::InvalidAntifeatures`] if field is not a table.
    pub fn antifeatures(&self) -> Result<Vec<String>> {
        match self.0.get("antifeatures") {
            None => Ok(Vec::new()),
            Some(Value::Object(table)) => Ok(table.keys().cloned().collect()),
            Some(other) => Err(ManifestError::InvalidAntifeatures {
                found: value_kind(other),
            }),
        }
    }

    /// Remove install questions section.
    pub fn remove_install(&mut self) -> Option<Value> {
        self.0.remove("install")
    }

    /// Remove resources section.
    pub fn remove_resources(&mut self) -> Option<Value> {
        self.0.remove("resources")
    }

    /// Convert manifest into JSON value.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// Manifest encoding that can be loaded from an app checkout.
pub trait ManifestLoader {
    /// Name of manifest file at the top-level of an app checkout.
    fn file_name(&self) -> &'static str;

    /// Parse manifest contents.
    fn parse(&self, data: &str) -> Result<Manifest>;

    /// Load manifest from app checkout.
    ///
    /// Returns `Ok(None)` if the manifest file does not exist, so the caller
    /// may try the next encoding.
    ///
    /// # Errors
    ///
    /// - Return [`ManifestError::Read`] if manifest cannot be read.
    /// - Return [`ManifestError::Parse`] if manifest cannot be parsed.
    fn load(&self, app_folder: &Path) -> Result<Option<Manifest>> {
        let path = app_folder.join(self.file_name());
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(ManifestError::Read { source, path }),
        };

        self.parse(&data)
            .map(Some)
            .map_err(|error| ManifestError::Parse {
                source: Box::new(error),
                path,
            })
    }
}

/// Loader for "manifest.toml".
#[derive(Debug, Default, Clone, Copy)]
pub struct TomlLoader;

impl ManifestLoader for TomlLoader {
    fn file_name(&self) -> &'static str {
        "manifest.toml"
    }

    fn parse(&self, data: &str) -> Result<Manifest> {
        let table: toml::Table = toml::de::from_str(data)?;
        Manifest::from_value(toml_to_json(toml::Value::Table(table)))
    }
}

/// Loader for "manifest.json".
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonLoader;

impl ManifestLoader for JsonLoader {
    fn file_name(&self) -> &'static str {
        "manifest.json"
    }

    fn parse(&self, data: &str) -> Result<Manifest> {
        Manifest::from_value(serde_json::from_str(data)?)
    }
}

/// Load manifest of app checkout in priority order.
///
/// # Errors
///
/// - Return [`ManifestError::NotFound`] if no supported manifest exists.
/// - Return [`ManifestError::Read`] or [`ManifestError::Parse`] if the first
///   manifest found cannot be loaded.
#[instrument(skip(app_folder), level = "debug")]
pub fn load_manifest(app_folder: impl AsRef<Path>) -> Result<Manifest> {
    let app_folder = app_folder.as_ref();
    let loaders: [&dyn ManifestLoader; 2] = [&TomlLoader, &JsonLoader];
    for loader in loaders {
        if let Some(manifest) = loader.load(app_folder)? {
            debug!(
                "loaded {} from {:?}",
                loader.file_name(),
                app_folder.display()
            );
            return Ok(manifest);
        }
    }

    Err(ManifestError::NotFound {
        app_folder: app_folder.to_path_buf(),
    })
}

/// Convert TOML value into equivalent JSON value.
///
/// Datetimes become their RFC 3339 string form. Floats that JSON cannot
/// represent, i.e., NaN and infinities, become null.
pub fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(string) => Value::String(string),
        toml::Value::Integer(integer) => Value::Number(integer.into()),
        toml::Value::Float(float) => Number::from_f64(float).map_or(Value::Null, Value::Number),
        toml::Value::Boolean(boolean) => Value::Bool(boolean),
        toml::Value::Datetime(datetime) => Value::String(datetime.to_string()),
        toml::Value::Array(array) => Value::Array(array.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(key, value)| (key, toml_to_json(value)))
                .collect(),
        ),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "table",
    }
}

/// Manifest loading error types.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// Neither "manifest.toml" nor "manifest.json" exist.
    #[error("no manifest.toml or manifest.json found in {:?}", app_folder.display())]
    NotFound { app_folder: PathBuf },

    /// Manifest file exists but cannot be read.
    #[error("failed to read manifest at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Manifest file exists but cannot be parsed.
    #[error("failed to parse manifest at {:?}: {source}", path.display())]
    Parse {
        #[source]
        source: Box<ManifestError>,
        path: PathBuf,
    },

    /// Failed to deserialize TOML manifest.
    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    /// Failed to deserialize JSON manifest.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Manifest document is not a table.
    #[error("manifest must be a table, found {found}")]
    NotATable { found: &'static str },

    /// Antifeatures field is not a table.
    #[error("manifest antifeatures must be a table, found {found}")]
    InvalidAntifeatures { found: &'static str },
}

/// Friendly result alias :3
pub type Result<T, E = ManifestError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use serde_json::json;

    #[test]
    fn parse_toml_manifest() -> anyhow::Result<()> {
        let result = TomlLoader.parse(indoc! {r#"
            packaging_format = 2
            id = "hextris"
            name = "Hextris"
            version = "1.0~ynh1"

            [antifeatures]
            non-free-assets = "Uses proprietary fonts."

            [install.domain]
            type = "domain"

            [resources.system_user]
        "#})?;

        let expect = json!({
            "packaging_format": 2,
            "id": "hextris",
            "name": "Hextris",
            "version": "1.0~ynh1",
            "antifeatures": { "non-free-assets": "Uses proprietary fonts." },
            "install": { "domain": { "type": "domain" } },
            "resources": { "system_user": {} },
        });

        assert_eq!(result.into_value(), expect);

        Ok(())
    }

    #[test]
    fn parse_json_manifest() -> anyhow::Result<()> {
        let result = JsonLoader.parse(r#"{ "id": "hextris", "version": "1.0" }"#)?;
        assert_eq!(result.get("id"), Some(&json!("hextris")));
        assert!(!result.contains_key("install"));
        Ok(())
    }

    #[test]
    fn reject_manifest_that_is_not_a_table() {
        let result = JsonLoader.parse("[1, 2]");
        assert!(matches!(
            result,
            Err(ManifestError::NotATable { found: "array" })
        ));
    }

    #[test]
    fn convert_toml_datetime_and_float() {
        let result = toml_to_json(toml::Value::Datetime("1979-05-27T07:32:00Z".parse().unwrap()));
        assert_eq!(result, json!("1979-05-27T07:32:00Z"));

        assert_eq!(toml_to_json(toml::Value::Float(f64::NAN)), Value::Null);
        assert_eq!(toml_to_json(toml::Value::Float(1.5)), json!(1.5));
    }

    #[test]
    fn manifest_antifeature_keys() -> anyhow::Result<()> {
        let manifest = Manifest::from_value(json!({
            "antifeatures": { "ads": "yes", "tracking": "sadly" }
        }))?;
        assert_eq!(manifest.antifeatures()?, vec!["ads", "tracking"]);

        let manifest = Manifest::from_value(json!({ "id": "foo" }))?;
        assert!(manifest.antifeatures()?.is_empty());

        let manifest = Manifest::from_value(json!({ "antifeatures": ["ads"] }))?;
        assert!(manifest.antifeatures().is_err());

        Ok(())
    }

    #[test]
    fn remove_install_and_resources() -> anyhow::Result<()> {
        let mut manifest = Manifest::from_value(json!({
            "id": "foo",
            "install": {},
            "resources": { "apt": {} },
        }))?;
        assert!(manifest.remove_install().is_some());
        assert!(manifest.remove_resources().is_some());
        assert!(manifest.remove_install().is_none());
        assert_eq!(manifest.into_value(), json!({ "id": "foo" }));
        Ok(())
    }

    #[sealed_test]
    fn load_prefers_toml_over_json() -> anyhow::Result<()> {
        fs::create_dir("foo_ynh")?;
        fs::write("foo_ynh/manifest.toml", "id = \"from-toml\"")?;
        fs::write("foo_ynh/manifest.json", r#"{ "id": "from-json" }"#)?;

        let manifest = load_manifest("foo_ynh")?;
        assert_eq!(manifest.get("id"), Some(&json!("from-toml")));

        Ok(())
    }

    #[sealed_test]
    fn load_falls_back_to_json() -> anyhow::Result<()> {
        fs::create_dir("foo_ynh")?;
        fs::write("foo_ynh/manifest.json", r#"{ "id": "from-json" }"#)?;

        let manifest = load_manifest("foo_ynh")?;
        assert_eq!(manifest.get("id"), Some(&json!("from-json")));

        Ok(())
    }

    #[sealed_test]
    fn load_does_not_fall_back_on_parse_failure() -> anyhow::Result<()> {
        fs::create_dir("foo_ynh")?;
        fs::write("foo_ynh/manifest.toml", "id = ")?;
        fs::write("foo_ynh/manifest.json", r#"{ "id": "from-json" }"#)?;

        let result = load_manifest("foo_ynh");
        assert!(matches!(result, Err(ManifestError::Parse { .. })));

        Ok(())
    }

    #[sealed_test]
    fn load_without_manifest_fails() -> anyhow::Result<()> {
        fs::create_dir("foo_ynh")?;

        let result = load_manifest("foo_ynh");
        assert!(matches!(result, Err(ManifestError::NotFound { .. })));

        // Missing checkout is just as bad as an empty one.
        let result = load_manifest("bar_ynh");
        assert!(matches!(result, Err(ManifestError::NotFound { .. })));

        Ok(())
    }
}
