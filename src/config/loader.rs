//! Configuration loader with environment variable expansion

use super::{Config, ConfigError};
use std::path::Path;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<Config, ConfigError> {
        let expanded = Self::expand_env_vars(content);
        let config: Config = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Expand environment variables in a string.
    ///
    /// Supports two syntaxes:
    /// - `${VAR_NAME}` - Simple expansion, keeps placeholder if var not found
    /// - `${VAR_NAME:-default}` - Expansion with default value
    fn expand_env_vars(content: &str) -> String {
        let re = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}")
            .expect("static regex is valid");
        let mut last_match = 0;
        let mut result = String::with_capacity(content.len());

        for cap in re.captures_iter(content) {
            let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
                continue;
            };

            result.push_str(&content[last_match..full_match.start()]);

            match std::env::var(var_name.as_str()) {
                Ok(value) => result.push_str(&value),
                Err(_) => match cap.get(2) {
                    Some(default) => result.push_str(default.as_str()),
                    // Keep the placeholder so validation can point at it
                    None => result.push_str(full_match.as_str()),
                },
            }

            last_match = full_match.end();
        }

        result.push_str(&content[last_match..]);
        result
    }
}
