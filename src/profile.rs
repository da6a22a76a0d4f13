//! Profile discovery.
//!
//! Firmware build variants live next to each other as `sdkconfig.<profile>` files in the
//! project directory, and each one is built into `build_<profile>`. This module turns that
//! directory listing into the ordered list of profiles the runner iterates over.

use crate::error::AppResult;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name prefix of profile configuration files.
pub const CONFIG_PREFIX: &str = "sdkconfig.";

/// Suffixes that name configuration overlays rather than runnable profiles.
const RESERVED_SUFFIXES: [&str; 3] = ["defaults", "old", "local"];

/// Any suffix starting with this is a CI overlay.
const RESERVED_PREFIX: &str = "ci";

/// Returns the profile named by a configuration file name, if it names one.
pub fn profile_from_file_name(file_name: &str) -> Option<&str> {
    let suffix = file_name.strip_prefix(CONFIG_PREFIX)?;
    if suffix.is_empty()
        || RESERVED_SUFFIXES.contains(&suffix)
        || suffix.starts_with(RESERVED_PREFIX)
    {
        return None;
    }
    Some(suffix)
}

/// Scans `dir` for `sdkconfig.<profile>` files.
///
/// The result is sorted lexicographically (byte order, case-sensitive) and free of
/// duplicates. A directory without matching files yields an empty list.
///
/// # Errors
/// Returns an I/O error when `dir` does not exist or cannot be read.
pub fn discover_profiles(dir: &Path) -> AppResult<Vec<String>> {
    let mut profiles = BTreeSet::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        if let Some(profile) = profile_from_file_name(file_name) {
            profiles.insert(profile.to_string());
        }
    }

    debug!(dir = %dir.display(), count = profiles.len(), "discovered profiles");
    Ok(profiles.into_iter().collect())
}

/// Keeps the profiles whose name contains `filter`; `None` keeps all of them.
pub fn select_profiles(profiles: Vec<String>, filter: Option<&str>) -> Vec<String> {
    match filter {
        Some(filter) => profiles
            .into_iter()
            .filter(|profile| profile.contains(filter))
            .collect(),
        None => profiles,
    }
}

/// Path of the build output directory for `profile`.
pub fn build_dir(project_dir: &Path, profile: &str) -> PathBuf {
    project_dir.join(format!("build_{profile}"))
}

/// Message shown when a profile is skipped because it has not been built.
pub fn missing_build_message(profile: &str) -> String {
    format!("Build directory not found: build_{profile} (run 'make PROFILE={profile} build')")
}
