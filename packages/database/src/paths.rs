#![allow(clippy::module_name_repetitions)]
//! Canonical file paths for the `DuckDB` data directory.
//!
//! Paths default to the project root's `data/` directory; callers may pass
//! any other data directory (e.g. from configuration).

use std::path::{Path, PathBuf};

/// File name of the health map database inside a data directory.
pub const DATABASE_FILE: &str = "health_map.duckdb";

/// Returns the workspace root directory.
///
/// Resolved at compile time from `CARGO_MANIFEST_DIR`.
///
/// # Panics
///
/// Panics if the project root cannot be resolved.
#[must_use]
pub fn project_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .expect("Failed to find project root from CARGO_MANIFEST_DIR")
        .to_path_buf()
}

/// Returns the default `data/` directory path.
#[must_use]
pub fn default_data_dir() -> PathBuf {
    project_root().join("data")
}

/// Returns the database path inside `data_dir`.
#[must_use]
pub fn database_path(data_dir: &Path) -> PathBuf {
    data_dir.join(DATABASE_FILE)
}

/// Returns the `reference/` directory inside `data_dir`, where the states
/// and counties CSV files live.
#[must_use]
pub fn reference_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("reference")
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.as_os_str().is_empty() && !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_lives_in_data_dir() {
        let dir = Path::new("/tmp/health");
        assert_eq!(
            database_path(dir),
            PathBuf::from("/tmp/health/health_map.duckdb")
        );
        assert_eq!(reference_dir(dir), PathBuf::from("/tmp/health/reference"));
    }

    #[test]
    fn default_data_dir_is_under_project_root() {
        assert!(default_data_dir().starts_with(project_root()));
    }
}
