// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Local app catalog builder for self-hosted app development.
//!
//! Scans a folder of app checkouts, and merges each app's manifest with the
//! curator overrides listed in "apps.json" into one "catalog.json" that the
//! self-hosting platform can install apps from. Also manages the platform's
//! catalog list so it knows to use the locally built catalog.
//!
//! See [`catalog`] for the building rules, and [`sources`] for the catalog
//! list operations.

pub mod catalog;
pub mod index;
pub mod manifest;
pub mod path;
pub mod sources;

pub use catalog::{build, BuildReport, Catalog, CatalogAppRecord, CatalogBuilder, LastUpdate};
pub use index::{AppIndex, AppIndexEntry};
pub use manifest::{load_manifest, Manifest};
pub use sources::{CatalogList, CatalogListFile, CatalogSource};
