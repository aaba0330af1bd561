//! Configuration loader.

use std::fs;
use std::path::Path;

use regex::Regex;

use crate::error::ConfigError;
use crate::schema::Config;

/// Configuration loader with environment variable substitution.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = fs::read_to_string(path)?;
        Self::load_str(&content)
    }

    /// Load configuration from a file, falling back to defaults when it is missing.
    pub fn load_or_default(path: &Path) -> Result<Config, ConfigError> {
        match Self::load(path) {
            Err(ConfigError::NotFound(_)) => Ok(Config::default()),
            other => other,
        }
    }

    /// Load configuration from a string.
    pub fn load_str(content: &str) -> Result<Config, ConfigError> {
        let expanded = Self::expand_env_vars(content)?;
        let config: Config = toml::from_str(&expanded)?;
        Ok(config)
    }

    /// Expand environment variables in the format `${VAR}`.
    fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
        let re = Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;
        let mut result = content.to_string();

        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let var_value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotSet(var_name.to_string()))?;
            result = result.replace(&cap[0], &var_value);
        }

        Ok(result)
    }

    /// Expand shell-style paths (e.g., `~/.horizon`).
    pub fn expand_path(path: &str) -> String {
        shellexpand::tilde(path).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_empty_config() {
        let config = ConfigLoader::load_str("").unwrap();
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn test_load_full_config() {
        let content = r#"
            [server]
            host = "0.0.0.0"
            port = 9000

            [store]
            path = "/tmp/horizon.db"

            [realtime]
            outbound_queue_capacity = 16
            max_message_size = 8192
        "#;
        let config = ConfigLoader::load_str(content).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.store.path, "/tmp/horizon.db");
        assert_eq!(config.realtime.outbound_queue_capacity, 16);
        assert_eq!(config.realtime.max_message_size, 8192);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[server]").unwrap();
        writeln!(file, "port = 7000").unwrap();

        let config = ConfigLoader::load(file.path()).unwrap();
        assert_eq!(config.server.port, 7000);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = ConfigLoader::load(Path::new("/nonexistent/path/horizon.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config =
            ConfigLoader::load_or_default(Path::new("/nonexistent/path/horizon.toml")).unwrap();
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn test_load_invalid_toml() {
        let result = ConfigLoader::load_str("invalid = [unclosed");
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn test_expand_env_vars() {
        // SAFETY: test-only variable name, not read by any other test
        unsafe {
            std::env::set_var("HORIZON_TEST_STORE_PATH", "/data/servers.db");
        }
        let config = ConfigLoader::load_str(
            r#"
            [store]
            path = "${HORIZON_TEST_STORE_PATH}"
            "#,
        )
        .unwrap();
        assert_eq!(config.store.path, "/data/servers.db");
        unsafe {
            std::env::remove_var("HORIZON_TEST_STORE_PATH");
        }
    }

    #[test]
    fn test_expand_env_vars_not_set() {
        let content = "value = \"${HORIZON_NONEXISTENT_VAR_12345}\"";
        let result = ConfigLoader::expand_env_vars(content);
        assert!(matches!(result, Err(ConfigError::EnvVarNotSet(_))));
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let expanded = ConfigLoader::expand_path("~/servers.db");
        assert!(!expanded.starts_with('~'));
        assert!(expanded.ends_with("/servers.db"));
    }

    #[test]
    fn test_expand_path_no_tilde() {
        assert_eq!(ConfigLoader::expand_path("/var/lib/horizon"), "/var/lib/horizon");
    }
}
