// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Catalog list management.
//!
//! The self-hosting platform reads the catalogs it should offer apps from out
//! of a small YAML file, by default "/etc/yunohost/apps_catalog.yml". Each
//! entry of that file is a __catalog source__ made of an identifier and an
//! optional URL:
//!
//! ```yaml
//! - id: default
//!   url: https://app.yunohost.org/default/
//! - id: custom
//!   url: null
//! ```
//!
//! The "custom" source has no URL, telling the platform to use the locally
//! built catalog instead. At most one "default" and one "custom" entry may
//! exist. This module never edits the file in place. It either replaces the
//! whole file, or leaves it untouched.
//!
//! The catalog list must already exist before any operation is performed on
//! it. Installing the platform is what creates it.

use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{info, instrument};

/// Identifier of the platform's default catalog source.
pub const DEFAULT_SOURCE_ID: &str = "default";

/// URL of the platform's default catalog source.
pub const DEFAULT_SOURCE_URL: &str = "https://app.yunohost.org/default/";

/// Identifier of the locally built catalog source.
pub const CUSTOM_SOURCE_ID: &str = "custom";

/// Single catalog source entry.
#[derive(Debug, PartialEq, Clone, Deserialize, Serialize)]
pub struct CatalogSource {
    /// Unique identifier of catalog source.
    pub id: String,

    /// Remote URL of catalog, or none for local catalogs.
    #[serde(default)]
    pub url: Option<String>,

    /// Fields this tool does not manage, kept as is.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl CatalogSource {
    /// The platform's default catalog source.
    pub fn default_source() -> Self {
        Self {
            id: DEFAULT_SOURCE_ID.into(),
            url: Some(DEFAULT_SOURCE_URL.into()),
            extra: BTreeMap::new(),
        }
    }

    /// The locally built catalog source.
    pub fn custom_source() -> Self {
        Self {
            id: CUSTOM_SOURCE_ID.into(),
            url: None,
            extra: BTreeMap::new(),
        }
    }
}

/// Ordered listing of catalog sources.
#[derive(Default, Debug, PartialEq, Clone, Deserialize, Serialize)]
#[serde(transparent)]
pub struct CatalogList(Vec<CatalogSource>);

impl CatalogList {
    /// Construct new catalog list.
    pub fn new(sources: impl IntoIterator<Item = CatalogSource>) -> Self {
        Self(sources.into_iter().collect())
    }

    /// Check if list has a source with given identifier.
    pub fn contains(&self, id: &str) -> bool {
        self.0.iter().any(|source| source.id == id)
    }

    /// Append custom source unless list already has one.
    ///
    /// Returns true if the custom source was appended.
    pub fn insert_custom(&mut self) -> bool {
        if self.contains(CUSTOM_SOURCE_ID) {
            return false;
        }

        self.0.push(CatalogSource::custom_source());
        true
    }

    pub fn sources(&self) -> &[CatalogSource] {
        &self.0
    }
}

impl FromStr for CatalogList {
    type Err = SourcesError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        // INVARIANT: An empty file is an empty list, not a null document.
        if data.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(data).map_err(SourcesError::Deserialize)
    }
}

impl Display for CatalogList {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            serde_yaml::to_string(self)
                .map_err(SourcesError::Serialize)?
                .as_str(),
        )
    }
}

/// Catalog list file on disk.
#[derive(Debug, Clone)]
pub struct CatalogListFile {
    path: PathBuf,
}

impl CatalogListFile {
    /// Open existing catalog list.
    ///
    /// # Errors
    ///
    /// - Return [`SourcesError::ListMissing`] if catalog list does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            return Err(SourcesError::ListMissing { path });
        }

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Read current catalog list.
    ///
    /// # Errors
    ///
    /// - Return [`SourcesError::ReadList`] if catalog list cannot be read.
    /// - Return [`SourcesError::Deserialize`] if catalog list is malformed.
    pub fn load(&self) -> Result<CatalogList> {
        fs::read_to_string(&self.path)
            .map_err(|source| SourcesError::ReadList {
                source,
                path: self.path.clone(),
            })?
            .parse()
    }

    /// Reset catalog list to the default source only.
    ///
    /// # Errors
    ///
    /// - Return [`SourcesError::WriteList`] if catalog list cannot be written.
    #[instrument(skip(self), level = "debug")]
    pub fn reset(&self) -> Result<()> {
        info!("reset catalog list {:?} to default source", self.path.display());
        self.store(&CatalogList::new([CatalogSource::default_source()]))
    }

    /// Add custom source to catalog list.
    ///
    /// Leaves the file untouched if a custom source is already listed. Returns
    /// true if the custom source was added.
    ///
    /// # Errors
    ///
    /// - Return [`SourcesError::ReadList`] if catalog list cannot be read.
    /// - Return [`SourcesError::Deserialize`] if catalog list is malformed.
    /// - Return [`SourcesError::WriteList`] if catalog list cannot be written.
    #[instrument(skip(self), level = "debug")]
    pub fn add_custom(&self) -> Result<bool> {
        let mut list = self.load()?;
        if !list.insert_custom() {
            info!("catalog list {:?} already has custom source", self.path.display());
            return Ok(false);
        }

        info!("add custom source to catalog list {:?}", self.path.display());
        self.store(&list)?;

        Ok(true)
    }

    /// Replace catalog list with the custom source only.
    ///
    /// # Errors
    ///
    /// - Return [`SourcesError::WriteList`] if catalog list cannot be written.
    #[instrument(skip(self), level = "debug")]
    pub fn override_with_custom(&self) -> Result<()> {
        info!("override catalog list {:?} with custom source", self.path.display());
        self.store(&CatalogList::new([CatalogSource::custom_source()]))
    }

    fn store(&self, list: &CatalogList) -> Result<()> {
        let data = serde_yaml::to_string(list)?;
        fs::write(&self.path, data).map_err(|source| SourcesError::WriteList {
            source,
            path: self.path.clone(),
        })
    }
}

/// Catalog list management error types.
#[derive(Debug, thiserror::Error)]
pub enum SourcesError {
    /// Catalog list does not exist.
    #[error("catalog list yaml file {:?} does not exist", path.display())]
    ListMissing { path: PathBuf },

    /// Catalog list cannot be read from.
    #[error("failed to read catalog list at {:?}", path.display())]
    ReadList {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Catalog list cannot be written to.
    #[error("failed to write catalog list at {:?}", path.display())]
    WriteList {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to deserialize catalog list.
    #[error("failed to deserialize catalog list")]
    Deserialize(#[source] serde_yaml::Error),

    /// Failed to serialize catalog list.
    #[error("failed to serialize catalog list")]
    Serialize(#[from] serde_yaml::Error),
}

impl From<SourcesError> for FmtError {
    fn from(_: SourcesError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
pub type Result<T, E = SourcesError> = std::result::Result<T, E>;
