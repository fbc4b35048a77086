// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine relevent path information for the files that the catalog builder
//! and catalog list manager need to read or write. None of these functions
//! check whether the paths they return actually exist.

use std::path::{Path, PathBuf};

/// Default directory holding app checkouts and the `apps.json` index.
pub const DEFAULT_APPS_FOLDER: &str = "/ynh-dev/custom-catalog/";

/// Default location of the platform's catalog list.
pub const DEFAULT_CATALOG_LIST_PATH: &str = "/etc/yunohost/apps_catalog.yml";

/// Name of the app index inside an apps folder.
pub const INDEX_FILE_NAME: &str = "apps.json";

/// Name of the generated catalog inside an apps folder.
pub const CATALOG_FILE_NAME: &str = "catalog.json";

/// Path to the `apps.json` index of an apps folder.
pub fn index_path(folder: impl AsRef<Path>) -> PathBuf {
    folder.as_ref().join(INDEX_FILE_NAME)
}

/// Path to the `catalog.json` output of an apps folder.
pub fn catalog_path(folder: impl AsRef<Path>) -> PathBuf {
    folder.as_ref().join(CATALOG_FILE_NAME)
}

/// Path to the checkout of a given app.
///
/// App checkouts always live at the top-level of the apps folder, and are
/// named after the lowercased app identifier with a "_ynh" suffix.
pub fn app_folder(folder: impl AsRef<Path>, app_id: &str) -> PathBuf {
    folder.as_ref().join(format!("{app_id}_ynh"))
}

/// Local `file://` URL pointing at an app checkout.
pub fn file_url(path: impl AsRef<Path>) -> String {
    format!("file://{}", path.as_ref().display())
}

/// Perform shell expansion on user supplied path.
///
/// Expands a leading tilde and any environment variables.
///
/// # Errors
///
/// - Return [`Error::ShellExpansion`] if a referenced variable is unset.
pub fn expand(path: impl AsRef<str>) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.as_ref())
            .map_err(Error::ShellExpansion)?
            .into_owned(),
    ))
}

/// Path resolution error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum Error {
    /// Failed to perform shell expansion on path.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

/// Friendly result alias :3
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[test]
    fn app_folder_uses_ynh_suffix() {
        let result = app_folder(DEFAULT_APPS_FOLDER, "nextcloud");
        assert_eq!(result, PathBuf::from("/ynh-dev/custom-catalog/nextcloud_ynh"));
        assert_eq!(
            file_url(result),
            "file:///ynh-dev/custom-catalog/nextcloud_ynh"
        );
    }

    #[test]
    fn index_and_catalog_live_in_apps_folder() {
        assert_eq!(index_path("/srv/apps"), PathBuf::from("/srv/apps/apps.json"));
        assert_eq!(
            catalog_path("/srv/apps"),
            PathBuf::from("/srv/apps/catalog.json")
        );
    }

    #[sealed_test(env = [("BLAH", "/home/blah/blah")])]
    fn expand_environment_variables() -> anyhow::Result<()> {
        assert_eq!(expand("$BLAH/apps")?, PathBuf::from("/home/blah/blah/apps"));
        Ok(())
    }

    #[sealed_test]
    fn expand_unset_variable_fails() {
        std::env::remove_var("CUSTOM_CATALOG_UNSET");
        assert!(expand("$CUSTOM_CATALOG_UNSET/apps").is_err());
    }
}
