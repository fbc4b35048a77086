// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! App index layout.
//!
//! Every apps folder carries an `apps.json` index. The index lists all apps
//! that should end up in the catalog, along with curator overrides for the
//! metadata that cannot be derived from an app's own manifest, e.g., its
//! maintenance state, quality level, or category. File I/O is left to the
//! caller to figure out.
//!
//! # General Layout
//!
//! The index is a single JSON object whose keys are app identifiers, and whose
//! values are [`AppIndexEntry`] objects. Every field of an entry is optional.
//! Missing fields are filled in with defaults at build time through the
//! accessors of [`AppIndexEntry`]. Fields explicitly set to `null` stay null.
//! Unknown fields are ignored.
//!
//! ```json
//! {
//!   "nextcloud": { "state": "working", "level": 8, "category": "productivity" },
//!   "hextris": {}
//! }
//! ```
//!
//! # Per-App Decoding
//!
//! Only the outer object is decoded when the index is parsed. Each entry is
//! kept as a raw JSON value and decoded on its own through
//! [`AppIndexEntry::from_value`], so a malformed entry only affects its own
//! app.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// Default git branch recorded for an app.
pub const DEFAULT_APP_BRANCH: &str = "master";

/// Default git revision recorded for an app.
pub const DEFAULT_APP_REVISION: &str = "HEAD";

/// Default app state.
pub const DEFAULT_APP_STATE: &str = "notworking";

/// Default app quality level.
pub const DEFAULT_APP_LEVEL: i64 = -1;

/// Index of apps to build into the catalog.
///
/// Entries keep the order they appear in within `apps.json`.
#[derive(Default, Debug, PartialEq, Clone, Deserialize, Serialize)]
#[serde(transparent)]
pub struct AppIndex(IndexMap<String, Value>);

impl AppIndex {
    /// Iterate through app identifiers and their raw entries in file order.
    ///
    /// Identifiers are yielded exactly as written in the index. Use
    /// [`normalize_app_id`] before deriving anything from them.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(id, entry)| (id.as_str(), entry))
    }

    /// Number of apps listed in the index.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if index lists no apps at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Value)> for AppIndex {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl FromStr for AppIndex {
    type Err = IndexError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(data).map_err(IndexError::Deserialize)
    }
}

/// Curator overrides for a single app.
///
/// The outer [`Option`] of each field tells whether the field was given at
/// all, and the inner one whether it was given as `null`.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct AppIndexEntry {
    /// Git branch the app is tracked on.
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub branch: Option<Option<String>>,

    /// Git revision the app is pinned to.
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub revision: Option<Option<String>>,

    /// Working state of the app, e.g., "working", "inprogress".
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub state: Option<Option<String>>,

    /// Quality level of the app.
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub level: Option<Option<i64>>,

    /// Whether the app is still maintained.
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub maintained: Option<Option<bool>>,

    /// Category the app is listed under.
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub category: Option<Option<String>>,

    /// Sub-categories the app is listed under.
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub subtags: Option<Option<Vec<String>>>,

    /// Well known software the app could replace.
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub potential_alternative_to: Option<Option<Vec<String>>>,

    /// Antifeatures flagged by curators on top of the manifest's own.
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub antifeatures: Option<Option<Vec<String>>>,
}

impl AppIndexEntry {
    /// Decode raw index entry.
    ///
    /// # Errors
    ///
    /// - Return [`IndexError::Entry`] if entry is not an object, or one of its
    ///   known fields has the wrong type.
    pub fn from_value(value: Value) -> Result<Self, IndexError> {
        serde_json::from_value(value).map_err(IndexError::Entry)
    }

    pub fn branch(&self) -> Option<&str> {
        or_default(&self.branch, DEFAULT_APP_BRANCH)
    }

    pub fn revision(&self) -> Option<&str> {
        or_default(&self.revision, DEFAULT_APP_REVISION)
    }

    pub fn state(&self) -> Option<&str> {
        or_default(&self.state, DEFAULT_APP_STATE)
    }

    pub fn level(&self) -> Option<i64> {
        self.level.unwrap_or(Some(DEFAULT_APP_LEVEL))
    }

    pub fn maintained(&self) -> Option<bool> {
        self.maintained.unwrap_or(Some(true))
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_ref().and_then(|category| category.as_deref())
    }

    pub fn subtags(&self) -> Option<&[String]> {
        or_default::<_, [String]>(&self.subtags, &[])
    }

    pub fn potential_alternative_to(&self) -> Option<&[String]> {
        or_default::<_, [String]>(&self.potential_alternative_to, &[])
    }

    /// Antifeatures flagged by curators.
    ///
    /// # Errors
    ///
    /// - Return [`IndexError::NullAntifeatures`] if field is given as `null`,
    ///   since there is nothing to merge with the manifest's antifeatures.
    pub fn antifeatures(&self) -> Result<&[String], IndexError> {
        match &self.antifeatures {
            None => Ok(&[]),
            Some(Some(antifeatures)) => Ok(antifeatures),
            Some(None) => Err(IndexError::NullAntifeatures),
        }
    }
}

/// Keep explicit `null` apart from a missing field.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn or_default<'a, T, U>(field: &'a Option<Option<T>>, default: &'a U) -> Option<&'a U>
where
    T: AsRef<U>,
    U: ?Sized,
{
    match field {
        None => Some(default),
        Some(value) => value.as_ref().map(<T as AsRef<U>>::as_ref),
    }
}

/// Normalize app identifier taken from the index.
///
/// App identifiers are case-insensitive, so they are always lowercased before
/// use.
pub fn normalize_app_id(id: impl AsRef<str>) -> String {
    id.as_ref().to_lowercase()
}

/// App index error types.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Failed to deserialize app index.
    #[error(transparent)]
    Deserialize(serde_json::Error),

    /// Failed to deserialize single index entry.
    #[error("invalid app list entry: {0}")]
    Entry(#[source] serde_json::Error),

    /// Antifeatures given as null.
    #[error("app list entry antifeatures must be a list, found null")]
    NullAntifeatures,
}
