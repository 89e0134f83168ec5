//! Configuration file resolution
//!
//! Locates the airlist TOML config file following the priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Platform config directory (`~/.config/airlist/config.toml`, then
//!    `/etc/airlist/config.toml` on Linux)

use crate::{Error, Result};
use std::path::PathBuf;

/// Resolve the config file path, if any exists
///
/// Returns `Ok(None)` when no config file is present anywhere; the caller
/// falls back to compiled defaults.
pub fn resolve_config_path(cli_arg: Option<&str>, env_var_name: &str) -> Result<Option<PathBuf>> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        let path = PathBuf::from(path);
        if !path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        return Ok(Some(path));
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        let path = PathBuf::from(path);
        if !path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        return Ok(Some(path));
    }

    // Priority 3: Platform config directory
    Ok(find_platform_config())
}

/// Probe the platform config locations for an existing config file
fn find_platform_config() -> Option<PathBuf> {
    if let Some(path) = dirs::config_dir().map(|d| d.join("airlist").join("config.toml")) {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/airlist/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Read and parse a TOML config file into the caller's config type
pub fn load_toml<T: serde::de::DeserializeOwned>(path: &std::path::Path) -> Result<T> {
    let contents = std::fs::read_to_string(path)?;
    toml::from_str(&contents).map_err(|e| Error::Parse(format!("{}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[derive(serde::Deserialize)]
    struct TestConfig {
        name: String,
        count: u32,
    }

    #[test]
    fn test_cli_arg_missing_file_is_error() {
        let result = resolve_config_path(Some("/nonexistent/airlist.toml"), "AIRLIST_TEST_UNSET");
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_arg_takes_priority() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name = \"x\"").unwrap();

        let resolved = resolve_config_path(file.path().to_str(), "AIRLIST_TEST_UNSET").unwrap();
        assert_eq!(resolved.as_deref(), Some(file.path()));
    }

    #[test]
    fn test_load_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name = \"radio\"\ncount = 3").unwrap();

        let config: TestConfig = load_toml(file.path()).unwrap();
        assert_eq!(config.name, "radio");
        assert_eq!(config.count, 3);
    }

    #[test]
    fn test_load_toml_bad_syntax() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name = ").unwrap();

        let result: Result<TestConfig> = load_toml(file.path());
        assert!(result.is_err());
    }
}
