//! TOML configuration file loading
//!
//! Supports `~/.config/parley/config.toml` (or `--config <path>`) as a
//! persistent config source. All fields are optional; the file is a partial
//! overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParleyConfigFile {
    /// Language for recognition and synthesis (e.g. "en")
    pub language: Option<String>,

    /// Server/runtime configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Gemini configuration
    #[serde(default)]
    pub gemini: GeminiFileConfig,

    /// Speech recognition configuration
    #[serde(default)]
    pub stt: SttFileConfig,

    /// Speech synthesis configuration
    #[serde(default)]
    pub tts: TtsFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub max_body_bytes: Option<usize>,
    pub requests_per_minute: Option<u32>,
}

/// Gemini configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeminiFileConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Speech recognition configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SttFileConfig {
    /// "auto", "whisper", "deepgram", "google" or "none"
    pub provider: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Speech synthesis configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TtsFileConfig {
    /// "google" or "openai"
    pub provider: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    pub deepgram: Option<String>,
    pub google_speech: Option<String>,
}

/// Load the TOML config file
///
/// With an explicit path the file must exist. Without one, the standard path
/// is used and a missing file means defaults.
///
/// # Errors
///
/// Returns error if the file cannot be read or parsed
pub fn load_config_file(explicit: Option<&Path>) -> Result<ParleyConfigFile> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match config_file_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(ParleyConfigFile::default()),
        },
    };

    let content = std::fs::read_to_string(&path).inspect_err(|e| {
        tracing::error!(path = %path.display(), error = %e, "failed to read config file");
    })?;
    let config = parse_config(&content)?;
    tracing::info!(path = %path.display(), "loaded config file");
    Ok(config)
}

/// Parse config file contents
///
/// # Errors
///
/// Returns error if the TOML is malformed or has unknown keys
pub fn parse_config(content: &str) -> Result<ParleyConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Return the config file path: `~/.config/parley/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("parley").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::Error;

    #[test]
    fn test_parse_partial_file() {
        let config = parse_config(
            r#"
            language = "fr"

            [server]
            port = 8080

            [stt]
            provider = "deepgram"
            "#,
        )
        .unwrap();

        assert_eq!(config.language.as_deref(), Some("fr"));
        assert_eq!(config.server.port, Some(8080));
        assert_eq!(config.server.host, None);
        assert_eq!(config.stt.provider.as_deref(), Some("deepgram"));
        assert!(config.gemini.api_key.is_none());
    }

    #[test]
    fn test_parse_empty_file() {
        let config = parse_config("").unwrap();
        assert!(config.language.is_none());
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let result = parse_config("[server]\nprot = 8080\n");
        assert!(matches!(result, Err(Error::Toml(_))));
    }

    #[test]
    fn test_load_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[gemini]\nmodel = \"gemini-2.0-flash\"").unwrap();

        let config = load_config_file(Some(file.path())).unwrap();
        assert_eq!(config.gemini.model.as_deref(), Some("gemini-2.0-flash"));
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config_file(Some(&dir.path().join("absent.toml")));
        let err = result.unwrap_err();
        assert!(matches!(&err, Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound));
        assert_eq!(err.kind(), crate::ErrorKind::Internal);
    }
}
