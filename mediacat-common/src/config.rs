//! Catalog configuration loading
//!
//! The configuration file is JSON (`config.json` by default) or TOML when the
//! path ends in `.toml`. Database credentials and ports are required; import
//! file locations and CORS origins fall back to defaults.

use crate::db::identifier::is_valid_identifier;
use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file, relative to the working directory
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

pub const DEFAULT_FORMATS_FILE: &str = "formats.json";
pub const DEFAULT_MEDIA_FILE: &str = "media.json";
pub const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:3000";

/// Database and server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub db_user: String,
    pub db_password: String,
    pub db_name: String,
    pub db_host: String,
    #[serde(deserialize_with = "deserialize_port")]
    pub db_port: u16,
    #[serde(deserialize_with = "deserialize_port")]
    pub server_port: u16,

    /// Format records imported at startup
    #[serde(default = "default_formats_file")]
    pub formats_file: PathBuf,

    /// Media records imported at startup
    #[serde(default = "default_media_file")]
    pub media_file: PathBuf,

    /// Origins allowed by the CORS layer
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

fn default_formats_file() -> PathBuf {
    PathBuf::from(DEFAULT_FORMATS_FILE)
}

fn default_media_file() -> PathBuf {
    PathBuf::from(DEFAULT_MEDIA_FILE)
}

fn default_allowed_origins() -> Vec<String> {
    vec![DEFAULT_ALLOWED_ORIGIN.to_string()]
}

/// Ports are written either as numbers or as numeric strings (`"3306"`)
fn deserialize_port<'de, D>(deserializer: D) -> std::result::Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PortValue {
        Number(u16),
        Text(String),
    }

    match PortValue::deserialize(deserializer)? {
        PortValue::Number(port) => Ok(port),
        PortValue::Text(text) => text
            .trim()
            .parse::<u16>()
            .map_err(|_| serde::de::Error::custom(format!("invalid port '{}'", text))),
    }
}

impl CatalogConfig {
    /// Parse configuration text; `toml` selects the TOML decoder
    pub fn parse(content: &str, toml: bool) -> Result<Self> {
        let config: CatalogConfig = if toml {
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?
        } else {
            serde_json::from_str(content).map_err(|e| Error::Config(e.to_string()))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Check required fields and the database name
    pub fn validate(&self) -> Result<()> {
        if self.db_user.is_empty() {
            return Err(Error::Config("db_user must not be empty".to_string()));
        }
        if self.db_host.is_empty() {
            return Err(Error::Config("db_host must not be empty".to_string()));
        }
        if self.db_name.is_empty() {
            return Err(Error::Config("db_name must not be empty".to_string()));
        }
        if !is_valid_identifier(&self.db_name) {
            return Err(Error::Config(format!(
                "db_name '{}' is not a valid identifier",
                self.db_name
            )));
        }
        if self.allowed_origins.is_empty() {
            return Err(Error::Config("allowed_origins must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Read and validate a configuration file
pub fn load_config(path: &Path) -> Result<CatalogConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read {}: {}", path.display(), e))
    })?;

    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    CatalogConfig::parse(&content, is_toml).map_err(|e| match e {
        Error::Config(msg) => Error::Config(format!("{}: {}", path.display(), msg)),
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEGACY_JSON: &str = r#"{
        "db_user": "root",
        "db_password": "secret",
        "db_name": "media_catalog",
        "db_host": "127.0.0.1",
        "db_port": "3306",
        "server_port": "8080"
    }"#;

    #[test]
    fn test_parse_json_with_string_ports() {
        let config = CatalogConfig::parse(LEGACY_JSON, false).unwrap();

        assert_eq!(config.db_port, 3306);
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.formats_file, PathBuf::from("formats.json"));
        assert_eq!(config.media_file, PathBuf::from("media.json"));
        assert_eq!(config.allowed_origins, vec!["http://localhost:3000"]);
    }

    #[test]
    fn test_parse_toml_with_numeric_ports() {
        let toml = r#"
            db_user = "catalog"
            db_password = ""
            db_name = "catalog"
            db_host = "db.internal"
            db_port = 3307
            server_port = 9000
            media_file = "/srv/import/media.json"
            allowed_origins = ["https://catalog.example.com"]
        "#;

        let config = CatalogConfig::parse(toml, true).unwrap();
        assert_eq!(config.db_port, 3307);
        assert_eq!(config.media_file, PathBuf::from("/srv/import/media.json"));
        assert_eq!(config.allowed_origins, vec!["https://catalog.example.com"]);
    }

    #[test]
    fn test_missing_field_is_config_error() {
        let json = r#"{"db_user": "root", "db_password": "", "db_name": "c", "db_host": "h", "db_port": 3306}"#;
        assert!(matches!(CatalogConfig::parse(json, false), Err(Error::Config(_))));
    }

    #[test]
    fn test_bad_port_is_config_error() {
        let json = LEGACY_JSON.replace("\"3306\"", "\"mysql\"");
        assert!(matches!(CatalogConfig::parse(&json, false), Err(Error::Config(_))));
    }

    #[test]
    fn test_database_name_must_be_identifier() {
        let json = LEGACY_JSON.replace("media_catalog", "media; DROP DATABASE x");
        let err = CatalogConfig::parse(&json, false).unwrap_err();
        assert!(err.to_string().contains("not a valid identifier"));
    }

    #[test]
    fn test_load_config_picks_decoder_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let json_path = dir.path().join("config.json");
        std::fs::write(&json_path, LEGACY_JSON).unwrap();
        assert_eq!(load_config(&json_path).unwrap().db_name, "media_catalog");

        let toml_path = dir.path().join("config.toml");
        std::fs::write(
            &toml_path,
            "db_user = \"u\"\ndb_password = \"p\"\ndb_name = \"catalog\"\ndb_host = \"h\"\ndb_port = \"3306\"\nserver_port = 8080\n",
        )
        .unwrap();
        assert_eq!(load_config(&toml_path).unwrap().db_name, "catalog");
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
