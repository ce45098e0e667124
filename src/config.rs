//! Connection settings for the Odoo server, layered with figment.
//!
//! Sources, highest priority first:
//! 1. Explicit overrides (CLI flags)
//! 2. Environment variables (`ODOO_URL`, `ODOO_DB`, `ODOO_USER`, `ODOO_PASSWORD`),
//!    including those loaded from a `.env` file by `dotenvy`
//! 3. An optional YAML defaults file
//! 4. Built-in defaults

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use tracing::debug;

use crate::error::{Result, SyncError};

pub const DEFAULT_URL: &str = "http://localhost:8069";
pub const DEFAULT_DB: &str = "odoo";

/// Resolved connection settings, built once at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OdooConfig {
    #[serde(deserialize_with = "string_like")]
    pub url: String,
    #[serde(deserialize_with = "string_like")]
    pub db: String,
    #[serde(deserialize_with = "string_like")]
    pub user: String,
    #[serde(deserialize_with = "string_like")]
    pub password: String,
}

impl Default for OdooConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            db: DEFAULT_DB.to_string(),
            user: String::new(),
            password: String::new(),
        }
    }
}

/// Settings given on the command line; unset fields leave lower layers alone
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Env and YAML values such as `ODOO_PASSWORD=1234` arrive as numbers
fn string_like<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
        Flag(bool),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Float(n) => n.to_string(),
        Raw::Flag(b) => b.to_string(),
    })
}

impl OdooConfig {
    /// Load `.env` (without overriding the real environment) and extract the config
    pub fn load(
        env_file: Option<&Path>,
        defaults_file: Option<&Path>,
        overrides: &ConfigOverrides,
    ) -> Result<Self> {
        match env_file {
            Some(path) => {
                dotenvy::from_path(path)
                    .map_err(|e| SyncError::Config(format!("{}: {e}", path.display())))?;
            }
            None => {
                if let Ok(path) = dotenvy::dotenv() {
                    debug!("loaded environment from {}", path.display());
                }
            }
        }

        if let Some(path) = defaults_file {
            if !path.exists() {
                return Err(SyncError::Config(format!("{} does not exist", path.display())));
            }
        }

        Self::extract(&Self::figment(defaults_file, overrides))
    }

    /// Build the provider chain, lowest priority first.
    pub fn figment(defaults_file: Option<&Path>, overrides: &ConfigOverrides) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(path) = defaults_file {
            figment = figment.merge(Yaml::file(path));
        }

        figment
            .merge(Env::prefixed("ODOO_").only(&["url", "db", "user", "password"]))
            .merge(Serialized::globals(overrides))
    }

    /// Extract from `figment` and validate the URL
    pub fn extract(figment: &Figment) -> Result<Self> {
        let mut config: Self = figment
            .extract()
            .map_err(|e| SyncError::Config(e.to_string()))?;

        config.url = config.url.trim().trim_end_matches('/').to_string();
        if config.url.is_empty() {
            return Err(SyncError::Config("ODOO_URL is empty".into()));
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_builtin_defaults() {
        Jail::expect_with(|_jail| {
            let config = OdooConfig::extract(&OdooConfig::figment(None, &ConfigOverrides::default()))
                .expect("defaults extract");
            assert_eq!(config.url, DEFAULT_URL);
            assert_eq!(config.db, DEFAULT_DB);
            assert_eq!(config.user, "");
            assert_eq!(config.password, "");
            Ok(())
        });
    }

    #[test]
    fn test_precedence_flag_env_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "odoo.yaml",
                "url: https://file.example.com\ndb: from-file\nuser: file-user\n",
            )?;
            jail.set_env("ODOO_USER", "env-user");
            jail.set_env("ODOO_PASSWORD", "secret");
            jail.set_env("ODOO_DB", "from-env");

            let flags = ConfigOverrides {
                db: Some("from-flag".into()),
                ..Default::default()
            };
            let figment = OdooConfig::figment(Some(Path::new("odoo.yaml")), &flags);
            let config = OdooConfig::extract(&figment).expect("layers extract");

            assert_eq!(config.url, "https://file.example.com");
            assert_eq!(config.db, "from-flag");
            assert_eq!(config.user, "env-user");
            assert_eq!(config.password, "secret");
            Ok(())
        });
    }

    #[test]
    fn test_yaml_defaults_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "odoo.yaml",
                "url: https://erp.example.com\ndb: prod\nuser: bot@example.com\n",
            )?;

            let figment = OdooConfig::figment(Some(Path::new("odoo.yaml")), &ConfigOverrides::default());
            let config = OdooConfig::extract(&figment).expect("yaml extract");
            assert_eq!(config.url, "https://erp.example.com");
            assert_eq!(config.db, "prod");
            assert_eq!(config.user, "bot@example.com");
            assert_eq!(config.password, "");
            Ok(())
        });
    }

    #[test]
    fn test_numeric_env_values_stay_text() {
        Jail::expect_with(|jail| {
            jail.set_env("ODOO_PASSWORD", "12345");
            jail.set_env("ODOO_DB", "2024");

            let config = OdooConfig::extract(&OdooConfig::figment(None, &ConfigOverrides::default()))
                .expect("numeric env extract");
            assert_eq!(config.password, "12345");
            assert_eq!(config.db, "2024");
            Ok(())
        });
    }

    #[test]
    fn test_url_trailing_slash_trimmed() {
        Jail::expect_with(|jail| {
            jail.set_env("ODOO_URL", "https://demo.odoo.com/");
            let config = OdooConfig::extract(&OdooConfig::figment(None, &ConfigOverrides::default()))
                .expect("url extract");
            assert_eq!(config.url, "https://demo.odoo.com");
            Ok(())
        });
    }

    #[test]
    fn test_empty_url_rejected() {
        Jail::expect_with(|_jail| {
            let flags = ConfigOverrides {
                url: Some("  ".into()),
                ..Default::default()
            };
            let err = OdooConfig::extract(&OdooConfig::figment(None, &flags)).unwrap_err();
            assert!(matches!(err, SyncError::Config(_)));
            Ok(())
        });
    }

    #[test]
    fn test_missing_defaults_file_rejected() {
        Jail::expect_with(|jail| {
            let env_file = jail.directory().join("empty.env");
            jail.create_file("empty.env", "")?;
            let err = OdooConfig::load(
                Some(&env_file),
                Some(Path::new("missing.yaml")),
                &ConfigOverrides::default(),
            )
            .unwrap_err();
            assert!(matches!(err, SyncError::Config(_)));
            Ok(())
        });
    }
}
