//! Client configuration
//!
//! Each setting resolves as command-line flag (or its environment variable,
//! handled by clap) > `client.toml` in the config folder > compiled default.

use std::path::{Path, PathBuf};

use hr_common::config::{default_config_dir, load_toml};
use serde::Deserialize;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

pub const TOKEN_FILE_NAME: &str = "tokens.json";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub base_url: Option<String>,
    pub token_file: Option<PathBuf>,
}

impl FileConfig {
    pub fn load(path: &Path) -> hr_common::Result<Self> {
        Ok(load_toml::<FileConfig>(path)?.unwrap_or_default())
    }
}

pub fn default_file_path() -> PathBuf {
    default_config_dir().join("client.toml")
}

pub fn default_token_file() -> PathBuf {
    default_config_dir().join(TOKEN_FILE_NAME)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub token_file: PathBuf,
}

impl ClientConfig {
    pub fn resolve(base_url: Option<String>, token_file: Option<PathBuf>, file: FileConfig) -> Self {
        Self {
            base_url: base_url
                .or(file.base_url)
                .filter(|url| !url.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            token_file: token_file
                .or(file.token_file)
                .unwrap_or_else(default_token_file),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::resolve(None, None, FileConfig::default());
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert!(config.token_file.ends_with(TOKEN_FILE_NAME));
    }

    #[test]
    fn test_flag_beats_file() {
        let file = FileConfig {
            base_url: Some("http://file.test/api".into()),
            token_file: Some(PathBuf::from("/tmp/file-tokens.json")),
        };
        let config = ClientConfig::resolve(Some("http://flag.test/api".into()), None, file);
        assert_eq!(config.base_url, "http://flag.test/api");
        assert_eq!(config.token_file, PathBuf::from("/tmp/file-tokens.json"));
    }
}
