// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Catalog building.
//!
//! The __catalog__ is the aggregate JSON document describing every app the
//! self-hosting platform can install from a local apps folder. It is built in
//! one pass from the app index, "apps.json", and the manifest bundled with
//! each app checkout.
//!
//! # Apps Folder Layout
//!
//! ```text
//! apps-folder/
//! ├── apps.json
//! ├── catalog.json        <- generated
//! ├── hextris_ynh/
//! │   └── manifest.toml
//! └── nextcloud_ynh/
//!     └── manifest.json
//! ```
//!
//! # Best-Effort Building
//!
//! A broken app must not keep the rest of the catalog from being published.
//! Every app listed in the index is attempted. Apps whose index entry is
//! malformed, or whose manifest is missing or broken, are left out of the
//! catalog and reported through [`BuildReport::failures`]. The catalog is
//! still written with every app that did build. Callers turn a partial build
//! into an error through [`BuildReport::ensure_success`].
//!
//! # Reproducibility
//!
//! All records of a single build share the same [`LastUpdate`] timestamp,
//! which the caller captures once up front. Object keys are sorted at every
//! level of the output, and antifeatures are deduplicated into sorted order,
//! so two builds over unchanged inputs only differ by that timestamp.
//!
//! Output is pure ASCII. Anything outside of printable ASCII is written as
//! `\uXXXX` escapes, using surrogate pairs beyond the basic multilingual
//! plane.

use crate::{
    index::{normalize_app_id, AppIndex, AppIndexEntry, IndexError},
    manifest::{load_manifest, Manifest, ManifestError},
    path::{app_folder, catalog_path, file_url, index_path},
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{
    ser::{Formatter, PrettyFormatter},
    Value,
};
use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};
use tracing::{debug, error, info, instrument, warn};

/// API version of the catalog format.
pub const FROM_API_VERSION: u32 = 3;

/// Time of catalog build in seconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct LastUpdate(f64);

impl LastUpdate {
    /// Capture current time.
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Use given point in time, with microsecond precision.
    pub fn from_datetime(datetime: DateTime<Utc>) -> Self {
        let micros = f64::from(datetime.timestamp_subsec_micros());
        Self(datetime.timestamp() as f64 + micros / 1_000_000.0)
    }

    /// Use given number of seconds since the Unix epoch.
    pub fn from_secs(secs: f64) -> Self {
        Self(secs)
    }

    pub fn as_secs(&self) -> f64 {
        self.0
    }
}

/// Git location recorded for an app.
///
/// Nothing is ever fetched from this location. The URL always points at the
/// local app checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GitLocation {
    pub branch: Option<String>,
    pub revision: Option<String>,
    pub url: String,
}

/// Catalog record of a single app.
///
/// Fields copied from the index entry are `None` only when the entry sets
/// them to `null` explicitly, and are written out as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogAppRecord {
    /// Lowercased app identifier.
    pub id: String,

    pub git: GitLocation,

    /// Build time shared by every record of the same catalog.
    #[serde(rename = "lastUpdate")]
    pub last_update: LastUpdate,

    /// App manifest as loaded from its checkout.
    pub manifest: Manifest,

    pub state: Option<String>,
    pub level: Option<i64>,
    pub maintained: Option<bool>,
    pub category: Option<String>,
    pub subtags: Option<Vec<String>>,
    pub potential_alternative_to: Option<Vec<String>>,

    /// Antifeatures of both the manifest and the index entry.
    pub antifeatures: BTreeSet<String>,
}

impl CatalogAppRecord {
    /// Construct record from index entry and loaded manifest.
    ///
    /// # Errors
    ///
    /// - Return [`AppError::Manifest`] if manifest declares antifeatures in
    ///   some other form than a table.
    /// - Return [`AppError::Entry`] if index entry gives antifeatures as null.
    pub fn new(
        app_id: impl Into<String>,
        app_folder: impl AsRef<Path>,
        entry: &AppIndexEntry,
        manifest: Manifest,
        last_update: LastUpdate,
    ) -> Result<Self, AppError> {
        let mut antifeatures = manifest.antifeatures()?.into_iter().collect::<BTreeSet<_>>();
        antifeatures.extend(entry.antifeatures()?.iter().cloned());

        Ok(Self {
            id: app_id.into(),
            git: GitLocation {
                branch: entry.branch().map(Into::into),
                revision: entry.revision().map(Into::into),
                url: file_url(app_folder),
            },
            last_update,
            manifest,
            state: entry.state().map(Into::into),
            level: entry.level(),
            maintained: entry.maintained(),
            category: entry.category().map(Into::into),
            subtags: entry.subtags().map(<[String]>::to_vec),
            potential_alternative_to: entry.potential_alternative_to().map(<[String]>::to_vec),
            antifeatures,
        })
    }

    /// Drop manifest sections the platform has no use for once the app is
    /// listed in a catalog.
    pub fn strip_manifest(&mut self) {
        self.manifest.remove_install();
        self.manifest.remove_resources();
    }
}

/// Aggregate catalog of apps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Catalog {
    pub apps: BTreeMap<String, CatalogAppRecord>,
    pub from_api_version: u32,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            apps: BTreeMap::new(),
            from_api_version: FROM_API_VERSION,
        }
    }
}

impl Catalog {
    /// Render catalog as pretty ASCII JSON with keys sorted at every level.
    ///
    /// # Errors
    ///
    /// - Return [`CatalogError::Serialize`] if catalog cannot be serialized.
    pub fn to_json_pretty(&self) -> Result<String> {
        // INVARIANT: Go through a JSON value so struct fields get sorted too.
        let value = serde_json::to_value(self)?;
        Ok(to_ascii_json_pretty(&value)?)
    }
}

/// Pretty print JSON value with two space indentation, escaping anything that
/// is not printable ASCII.
///
/// # Errors
///
/// - Return [`serde_json::Error`] if value cannot be serialized.
pub fn to_ascii_json_pretty(value: &Value) -> Result<String, serde_json::Error> {
    let mut writer = Vec::with_capacity(128);
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut writer, AsciiFormatter(PrettyFormatter::new()));
    value.serialize(&mut serializer)?;

    // INVARIANT: Formatter only ever emits ASCII.
    Ok(String::from_utf8_lossy(&writer).into_owned())
}

/// Pretty formatter that escapes everything outside of printable ASCII.
struct AsciiFormatter<'a>(PrettyFormatter<'a>);

impl Formatter for AsciiFormatter<'_> {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        let mut start = 0;
        for (index, ch) in fragment.char_indices() {
            if (' '..='~').contains(&ch) {
                continue;
            }

            writer.write_all(&fragment.as_bytes()[start..index])?;
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{unit:04x}")?;
            }
            start = index + ch.len_utf8();
        }

        writer.write_all(&fragment.as_bytes()[start..])
    }

    fn begin_array<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        self.0.begin_array(writer)
    }

    fn end_array<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        self.0.end_array(writer)
    }

    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        self.0.begin_array_value(writer, first)
    }

    fn end_array_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        self.0.end_array_value(writer)
    }

    fn begin_object<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        self.0.begin_object(writer)
    }

    fn end_object<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        self.0.end_object(writer)
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        self.0.begin_object_key(writer, first)
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        self.0.begin_object_value(writer)
    }

    fn end_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        self.0.end_object_value(writer)
    }
}

/// Reasons a single app cannot be built into the catalog.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Index entry of app is malformed.
    #[error(transparent)]
    Entry(#[from] IndexError),

    /// Manifest of app is missing or malformed.
    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

/// App that could not be built into the catalog.
#[derive(Debug, thiserror::Error)]
#[error("processing {app_id} failed: {source}")]
pub struct AppFailure {
    pub app_id: String,

    #[source]
    pub source: AppError,
}

/// Outcome of a catalog build.
#[derive(Debug)]
pub struct BuildReport {
    /// Path to the catalog that was written.
    pub catalog_path: PathBuf,

    /// Identifiers of apps written to the catalog, in index order.
    pub built: Vec<String>,

    /// Apps left out of the catalog, in index order.
    pub failures: Vec<AppFailure>,
}

impl BuildReport {
    /// Check if every app listed in the index was built.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Treat any app left out of the catalog as an error.
    ///
    /// # Errors
    ///
    /// - Return [`CatalogError::PartialBuild`] if at least one app failed.
    pub fn ensure_success(&self) -> Result<()> {
        if self.is_success() {
            return Ok(());
        }

        Err(CatalogError::PartialBuild {
            failed: self
                .failures
                .iter()
                .map(|failure| failure.app_id.clone())
                .collect(),
            catalog_path: self.catalog_path.clone(),
        })
    }
}

/// Catalog builder for an apps folder.
#[derive(Debug, Clone)]
pub struct CatalogBuilder {
    folder: PathBuf,
    last_update: LastUpdate,
}

impl CatalogBuilder {
    /// Construct new catalog builder.
    pub fn new(folder: impl Into<PathBuf>, last_update: LastUpdate) -> Self {
        Self {
            folder: folder.into(),
            last_update,
        }
    }

    /// Build catalog of apps folder and write it to "catalog.json".
    ///
    /// Any existing catalog is overwritten. Apps that fail to build are
    /// logged, left out of the catalog, and listed in the returned report.
    ///
    /// # Errors
    ///
    /// - Return [`CatalogError::FolderMissing`] if apps folder does not exist.
    /// - Return [`CatalogError::IndexMissing`] if "apps.json" does not exist.
    /// - Return [`CatalogError::ReadIndex`] or [`CatalogError::Index`] if
    ///   "apps.json" cannot be loaded, or is not an object.
    /// - Return [`CatalogError::WriteCatalog`] if catalog cannot be written.
    #[instrument(skip(self), level = "debug")]
    pub fn build(&self) -> Result<BuildReport> {
        let index = self.load_index()?;
        info!(
            "build catalog of {} apps in {:?}",
            index.len(),
            self.folder.display()
        );

        let outcomes = index
            .iter()
            .map(|(app_id, entry)| {
                let app_id = normalize_app_id(app_id);
                let outcome = self.build_app(&app_id, entry);
                (app_id, outcome)
            })
            .collect::<Vec<_>>();

        let mut catalog = Catalog::default();
        let mut built = Vec::new();
        let mut failures = Vec::new();
        for (app_id, outcome) in outcomes {
            match outcome {
                Ok(record) => {
                    debug!("built catalog record for {app_id}");
                    if catalog.apps.insert(app_id.clone(), record).is_some() {
                        warn!("{app_id} is listed more than once, keeping last entry");
                        built.retain(|id| id != &app_id);
                    }
                    built.push(app_id);
                }
                Err(source) => {
                    let failure = AppFailure { app_id, source };
                    error!("{failure}");
                    failures.push(failure);
                }
            }
        }

        // INVARIANT: Catalog records never carry install or resources sections.
        for record in catalog.apps.values_mut() {
            record.strip_manifest();
        }

        let catalog_path = catalog_path(&self.folder);
        fs::write(&catalog_path, catalog.to_json_pretty()?).map_err(|source| {
            CatalogError::WriteCatalog {
                source,
                path: catalog_path.clone(),
            }
        })?;
        info!(
            "wrote {} apps to {:?}",
            catalog.apps.len(),
            catalog_path.display()
        );

        Ok(BuildReport {
            catalog_path,
            built,
            failures,
        })
    }

    fn load_index(&self) -> Result<AppIndex> {
        if !self.folder.exists() {
            return Err(CatalogError::FolderMissing {
                folder: self.folder.clone(),
            });
        }

        let path = index_path(&self.folder);
        if !path.exists() {
            return Err(CatalogError::IndexMissing { path });
        }

        let data = fs::read_to_string(&path).map_err(|source| CatalogError::ReadIndex {
            source,
            path: path.clone(),
        })?;

        data.parse::<AppIndex>()
            .map_err(|source| CatalogError::Index { source, path })
    }

    fn build_app(&self, app_id: &str, entry: &Value) -> Result<CatalogAppRecord, AppError> {
        let app_folder = app_folder(&self.folder, app_id);
        let entry = AppIndexEntry::from_value(entry.clone())?;
        let manifest = load_manifest(&app_folder)?;
        CatalogAppRecord::new(app_id, app_folder, &entry, manifest, self.last_update)
    }
}

/// Build catalog of apps folder.
///
/// Shorthand for [`CatalogBuilder::build`].
pub fn build(folder: impl Into<PathBuf>, last_update: LastUpdate) -> Result<BuildReport> {
    CatalogBuilder::new(folder, last_update).build()
}

/// Catalog building error types.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Apps folder does not exist.
    #[error("apps folder {:?} does not exist", folder.display())]
    FolderMissing { folder: PathBuf },

    /// App index does not exist.
    #[error("no apps.json app list found at {:?}", path.display())]
    IndexMissing { path: PathBuf },

    /// App index cannot be read from.
    #[error("failed to read app list at {:?}", path.display())]
    ReadIndex {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// App index cannot be parsed.
    #[error("failed to parse app list at {:?}", path.display())]
    Index {
        #[source]
        source: IndexError,
        path: PathBuf,
    },

    /// Catalog cannot be serialized.
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),

    /// Catalog cannot be written to.
    #[error("failed to write catalog at {:?}", path.display())]
    WriteCatalog {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Catalog was written, but some apps were left out of it.
    #[error(
        "{} app(s) failed to process and were left out of {:?}: {}",
        failed.len(),
        catalog_path.display(),
        failed.join(", ")
    )]
    PartialBuild {
        failed: Vec<String>,
        catalog_path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = CatalogError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn manifest(value: Value) -> Manifest {
        Manifest::from_value(value).unwrap()
    }

    fn entry(value: Value) -> AppIndexEntry {
        AppIndexEntry::from_value(value).unwrap()
    }

    #[test]
    fn last_update_from_datetime() {
        let datetime = Utc.timestamp_opt(1_700_000_000, 250_000_000).unwrap();
        assert_eq!(LastUpdate::from_datetime(datetime).as_secs(), 1_700_000_000.25);
    }

    #[test]
    fn record_fills_in_defaults() -> anyhow::Result<()> {
        let record = CatalogAppRecord::new(
            "bar",
            "/srv/apps/bar_ynh",
            &AppIndexEntry::default(),
            manifest(json!({ "id": "bar" })),
            LastUpdate::from_secs(42.0),
        )?;

        let expect = CatalogAppRecord {
            id: "bar".into(),
            git: GitLocation {
                branch: Some("master".into()),
                revision: Some("HEAD".into()),
                url: "file:///srv/apps/bar_ynh".into(),
            },
            last_update: LastUpdate::from_secs(42.0),
            manifest: manifest(json!({ "id": "bar" })),
            state: Some("notworking".into()),
            level: Some(-1),
            maintained: Some(true),
            category: None,
            subtags: Some(Vec::new()),
            potential_alternative_to: Some(Vec::new()),
            antifeatures: BTreeSet::new(),
        };

        assert_eq!(record, expect);

        Ok(())
    }

    #[test]
    fn record_keeps_explicit_nulls() -> anyhow::Result<()> {
        let record = CatalogAppRecord::new(
            "nul",
            "nul_ynh",
            &entry(json!({ "level": null, "maintained": null, "revision": null })),
            manifest(json!({ "id": "nul" })),
            LastUpdate::from_secs(0.0),
        )?;

        let value = serde_json::to_value(&record)?;
        assert_eq!(value["level"], Value::Null);
        assert_eq!(value["maintained"], Value::Null);
        assert_eq!(value["git"]["revision"], Value::Null);
        assert_eq!(value["git"]["branch"], json!("master"));
        assert_eq!(value["state"], json!("notworking"));

        Ok(())
    }

    #[test]
    fn record_merges_antifeatures() -> anyhow::Result<()> {
        let record = CatalogAppRecord::new(
            "foo",
            "foo_ynh",
            &entry(json!({ "antifeatures": ["ads", "tracking", "ads"] })),
            manifest(json!({
                "antifeatures": { "non-free-assets": "fonts", "tracking": "analytics" }
            })),
            LastUpdate::from_secs(0.0),
        )?;

        let expect = ["ads", "non-free-assets", "tracking"]
            .into_iter()
            .map(String::from)
            .collect::<BTreeSet<_>>();
        assert_eq!(record.antifeatures, expect);

        Ok(())
    }

    #[test]
    fn record_rejects_null_antifeatures() {
        let result = CatalogAppRecord::new(
            "foo",
            "foo_ynh",
            &entry(json!({ "antifeatures": null })),
            manifest(json!({ "id": "foo" })),
            LastUpdate::from_secs(0.0),
        );
        assert!(matches!(
            result,
            Err(AppError::Entry(IndexError::NullAntifeatures))
        ));
    }

    #[test]
    fn strip_manifest_sections() -> anyhow::Result<()> {
        let mut record = CatalogAppRecord::new(
            "foo",
            "foo_ynh",
            &AppIndexEntry::default(),
            manifest(json!({ "id": "foo", "install": {}, "resources": {} })),
            LastUpdate::from_secs(0.0),
        )?;
        record.strip_manifest();
        assert_eq!(record.manifest, manifest(json!({ "id": "foo" })));

        Ok(())
    }

    #[test]
    fn partial_build_is_an_error() {
        let report = BuildReport {
            catalog_path: "apps/catalog.json".into(),
            built: vec!["bar".into()],
            failures: vec![AppFailure {
                app_id: "foo".into(),
                source: AppError::Entry(IndexError::NullAntifeatures),
            }],
        };
        match report.ensure_success() {
            Err(CatalogError::PartialBuild { failed, .. }) => assert_eq!(failed, vec!["foo"]),
            result => panic!("expected partial build error, got {result:?}"),
        }

        let report = BuildReport {
            catalog_path: "apps/catalog.json".into(),
            built: vec!["bar".into()],
            failures: Vec::new(),
        };
        assert!(report.ensure_success().is_ok());
    }

    #[test]
    fn ascii_json_escapes_non_ascii() -> anyhow::Result<()> {
        let value = json!({ "name": "Caf\u{e9} \u{1f389}\u{7f}", "k\u{fc}": [] });
        let result = to_ascii_json_pretty(&value)?;
        let expect = indoc! {r#"
            {
              "k\u00fc": [],
              "name": "Caf\u00e9 \ud83c\udf89\u007f"
            }"#};
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn catalog_renders_sorted_pretty_json() -> anyhow::Result<()> {
        let record = CatalogAppRecord::new(
            "hextris",
            "apps/hextris_ynh",
            &entry(json!({ "category": "games", "subtags": ["arcade"] })),
            manifest(json!({ "version": "1.0", "id": "hextris" })),
            LastUpdate::from_secs(1.5),
        )?;

        let mut catalog = Catalog::default();
        catalog.apps.insert(record.id.clone(), record);

        let result = catalog.to_json_pretty()?;
        let expect = indoc! {r#"
            {
              "apps": {
                "hextris": {
                  "antifeatures": [],
                  "category": "games",
                  "git": {
                    "branch": "master",
                    "revision": "HEAD",
                    "url": "file://apps/hextris_ynh"
                  },
                  "id": "hextris",
                  "lastUpdate": 1.5,
                  "level": -1,
                  "maintained": true,
                  "manifest": {
                    "id": "hextris",
                    "version": "1.0"
                  },
                  "potential_alternative_to": [],
                  "state": "notworking",
                  "subtags": [
                    "arcade"
                  ]
                }
              },
              "from_api_version": 3
            }"#};

        assert_eq!(result, expect);

        Ok(())
    }
}
