// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use std::path::{Path, PathBuf};

use anyhow::Context;
use etcetera::BaseStrategy;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use crate::start::ServerOptions;

fn default_name() -> String {
    "mcpez".to_string()
}

fn default_true() -> bool {
    true
}

/// Configuration for servers started through mcpez
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Server name used by automatic starts
    #[serde(default = "default_name")]
    pub name: String,

    /// Server version reported to clients
    #[serde(default)]
    pub version: Option<String>,

    /// Instructions shown to MCP clients
    #[serde(default)]
    pub instructions: Option<String>,

    /// Start the server automatically after the first registration
    #[serde(default = "default_true")]
    pub auto_start: bool,

    /// Exit the process once the transport closes
    #[serde(default = "default_true")]
    pub exit_on_close: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: default_name(),
            version: None,
            instructions: None,
            auto_start: true,
            exit_on_close: true,
        }
    }
}

impl Config {
    /// Returns a new [`Config`] instance by merging the configuration from the specified
    /// `overrides` (any struct that is Serialize, but generally a Clap `Parser`) with
    /// the configuration file and environment variables. By default, the configuration file is
    /// located at `$XDG_CONFIG_HOME/mcpez/config.toml`. This can be overridden by setting
    /// the `MCPEZ_CONFIG_FILE` environment variable.
    ///
    /// The order of precedence for configuration sources is as follows:
    /// 1. Values from `overrides`
    /// 2. Environment variables prefixed with `MCPEZ_`
    /// 3. Configuration file specified by `MCPEZ_CONFIG_FILE` or default location
    pub fn new<T: Serialize>(overrides: &T) -> Result<Self, anyhow::Error> {
        let config_file_path = match std::env::var_os("MCPEZ_CONFIG_FILE") {
            Some(path) => PathBuf::from(path),
            None => etcetera::choose_base_strategy()
                .context("Unable to get home directory")?
                .config_dir()
                .join("mcpez")
                .join("config.toml"),
        };
        Self::new_from_path(overrides, config_file_path)
    }

    /// Same as [`Config::new`], but allows specifying a custom path for the configuration file.
    pub fn new_from_path<T: Serialize>(
        overrides: &T,
        config_file_path: impl AsRef<Path>,
    ) -> Result<Self, anyhow::Error> {
        figment::Figment::new()
            .admerge(Toml::file(config_file_path))
            .admerge(Env::prefixed("MCPEZ_"))
            .admerge(Serialized::defaults(overrides))
            .extract()
            .context("Unable to merge configs")
    }

    /// Options for the server an automatic start builds.
    pub fn server_options(&self) -> ServerOptions {
        ServerOptions {
            version: self.version.clone(),
            instructions: self.instructions.clone(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    const ENV_VARS: [&str; 5] = [
        "MCPEZ_NAME",
        "MCPEZ_VERSION",
        "MCPEZ_INSTRUCTIONS",
        "MCPEZ_AUTO_START",
        "MCPEZ_EXIT_ON_CLOSE",
    ];

    fn no_overrides() -> HashMap<String, String> {
        HashMap::new()
    }

    #[derive(Serialize)]
    struct Overrides {
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        auto_start: Option<bool>,
    }

    #[test]
    fn test_config_file_not_exists_succeeds_with_defaults() {
        temp_env::with_vars_unset(ENV_VARS, || {
            let temp_dir = TempDir::new().unwrap();
            let non_existent_config = temp_dir.path().join("non_existent_config.toml");

            let config = Config::new_from_path(&no_overrides(), &non_existent_config)
                .expect("Failed to create config");

            assert_eq!(config, Config::default());
        });
    }

    #[test]
    fn test_config_file_values() {
        temp_env::with_vars_unset(ENV_VARS, || {
            let temp_dir = TempDir::new().unwrap();
            let config_file = temp_dir.path().join("config.toml");

            let toml_content = r#"
name = "calculator"
version = "2.0.0"
auto_start = false
"#;
            fs::write(&config_file, toml_content).unwrap();

            let config = Config::new_from_path(&no_overrides(), &config_file)
                .expect("Failed to create config");

            assert_eq!(config.name, "calculator");
            assert_eq!(config.version.as_deref(), Some("2.0.0"));
            assert!(!config.auto_start);
            // Not set in the file
            assert!(config.exit_on_close);
        });
    }

    #[test]
    fn test_overrides_take_precedence() {
        temp_env::with_var("MCPEZ_NAME", Some("from-env"), || {
            let temp_dir = TempDir::new().unwrap();
            let config_file = temp_dir.path().join("config.toml");
            fs::write(&config_file, "name = \"from-file\"\n").unwrap();

            let overrides = Overrides {
                name: Some("from-cli".to_string()),
                auto_start: None,
            };
            let config =
                Config::new_from_path(&overrides, &config_file).expect("Failed to create config");

            assert_eq!(config.name, "from-cli");
        });
    }

    #[test]
    fn test_env_var_over_config_file() {
        temp_env::with_var("MCPEZ_AUTO_START", Some("false"), || {
            let temp_dir = TempDir::new().unwrap();
            let config_file = temp_dir.path().join("config.toml");
            fs::write(&config_file, "auto_start = true\n").unwrap();

            let config = Config::new_from_path(&no_overrides(), &config_file)
                .expect("Failed to create config");

            assert!(!config.auto_start);
        });
    }

    #[test]
    fn test_invalid_toml_file_returns_error() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("invalid_config.toml");

        let invalid_toml = r#"
name = "calculator
"#;
        fs::write(&config_file, invalid_toml).unwrap();

        let result = Config::new_from_path(&no_overrides(), &config_file);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_file_path_override_with_env_var() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("custom_config.toml");
        fs::write(&config_file, "name = \"custom\"\n").unwrap();

        temp_env::with_vars(
            [
                ("MCPEZ_CONFIG_FILE", Some(config_file.to_str().unwrap())),
                ("MCPEZ_NAME", None),
            ],
            || {
                let config = Config::new(&no_overrides()).expect("Failed to create config");
                assert_eq!(config.name, "custom");
            },
        );
    }

    #[test]
    fn test_server_options_from_config() {
        let config = Config {
            version: Some("0.3.0".to_string()),
            instructions: Some("Be brief".to_string()),
            ..Default::default()
        };

        let options = config.server_options();
        assert_eq!(options.version.as_deref(), Some("0.3.0"));
        assert_eq!(options.instructions.as_deref(), Some("Be brief"));
        assert!(options.capabilities.is_none());
    }
}
