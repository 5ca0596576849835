//! Configuration management for Parley gateway
//!
//! Precedence is env > toml > default. Resolution is a pure function of an
//! environment lookup and a parsed file, so it can be exercised without
//! touching the process environment.

pub mod file;

use std::path::Path;
use std::time::Duration;

use secrecy::SecretString;

use crate::llm::gemini;
use crate::{Error, Result};

pub use file::{ParleyConfigFile, config_file_path};

pub const DEFAULT_PORT: u16 = 5002;
/// About two minutes of PCM16 at 16 kHz
pub const DEFAULT_MAX_BODY_BYTES: usize = 4 * 1024 * 1024;
const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 20;
const DEFAULT_STT_TIMEOUT_SECS: u64 = 15;
const DEFAULT_TTS_TIMEOUT_SECS: u64 = 20;

/// Parley gateway configuration
#[derive(Debug)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Text generation configuration
    pub gemini: GeminiConfig,

    /// Speech recognition configuration
    pub stt: SttConfig,

    /// Speech synthesis configuration
    pub tts: TtsConfig,

    /// Language for recognition and synthesis
    pub language: String,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Largest accepted request body
    pub max_body_bytes: usize,

    /// Global request budget, unlimited when `None`
    pub requests_per_minute: Option<u32>,
}

/// Gemini configuration
#[derive(Debug)]
pub struct GeminiConfig {
    pub api_key: SecretString,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

/// Which speech recognition engine to use
#[derive(Debug)]
pub enum SttBackend {
    Whisper { api_key: SecretString, model: String },
    Deepgram { api_key: SecretString, model: String },
    Google { api_key: SecretString },
}

/// Speech recognition configuration
#[derive(Debug)]
pub struct SttConfig {
    /// `None` makes the gateway text-only
    pub backend: Option<SttBackend>,
    pub base_url: Option<String>,
    pub timeout: Duration,
}

/// Which speech synthesis engine to use
#[derive(Debug)]
pub enum TtsBackend {
    Google,
    OpenAI {
        api_key: SecretString,
        model: String,
        voice: String,
    },
}

/// Speech synthesis configuration
#[derive(Debug)]
pub struct TtsConfig {
    pub backend: TtsBackend,
    pub base_url: Option<String>,
    pub timeout: Duration,
}

impl Config {
    /// Load configuration from `.env`, the process environment and the
    /// TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the config file is unreadable or malformed, or if
    /// required secrets are missing
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        match dotenv::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!(error = %e, "failed to read .env"),
        }

        let fc = file::load_config_file(config_path)?;
        Self::resolve(|key| std::env::var(key).ok(), fc)
    }

    /// Resolve configuration from an environment lookup and a parsed file
    ///
    /// # Errors
    ///
    /// Returns error if a value is malformed or a required secret is missing
    pub fn resolve<F>(env: F, fc: ParleyConfigFile) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let server = ServerConfig {
            host: env("PARLEY_HOST")
                .or(fc.server.host)
                .unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_env(&env, "PARLEY_PORT")?
                .or(parse_env(&env, "PORT")?)
                .or(fc.server.port)
                .unwrap_or(DEFAULT_PORT),
            max_body_bytes: parse_env(&env, "PARLEY_MAX_BODY_BYTES")?
                .or(fc.server.max_body_bytes)
                .unwrap_or(DEFAULT_MAX_BODY_BYTES),
            requests_per_minute: parse_env(&env, "PARLEY_REQUESTS_PER_MINUTE")?
                .or(fc.server.requests_per_minute)
                .filter(|&rpm| rpm > 0),
        };

        let api_key = env("GEMINI_API_KEY")
            .or(fc.gemini.api_key)
            .ok_or_else(|| {
                Error::Config("GEMINI_API_KEY not found; set it in the environment or .env".to_string())
            })?;

        let gemini = GeminiConfig {
            api_key: SecretString::from(api_key),
            model: env("PARLEY_GEMINI_MODEL")
                .or(fc.gemini.model)
                .unwrap_or_else(|| gemini::DEFAULT_MODEL.to_string()),
            base_url: env("PARLEY_GEMINI_BASE_URL")
                .or(fc.gemini.base_url)
                .unwrap_or_else(|| gemini::DEFAULT_BASE_URL.to_string()),
            timeout: Duration::from_secs(
                parse_env(&env, "PARLEY_GENERATION_TIMEOUT_SECS")?
                    .or(fc.gemini.timeout_secs)
                    .unwrap_or(DEFAULT_GENERATION_TIMEOUT_SECS),
            ),
        };

        let openai_key = env("OPENAI_API_KEY").or(fc.api_keys.openai);
        let deepgram_key = env("DEEPGRAM_API_KEY").or(fc.api_keys.deepgram);
        let google_speech_key = env("GOOGLE_SPEECH_API_KEY").or(fc.api_keys.google_speech);

        let stt_provider = env("PARLEY_STT_PROVIDER")
            .or(fc.stt.provider)
            .unwrap_or_else(|| "auto".to_string())
            .to_ascii_lowercase();
        let stt_model = env("PARLEY_STT_MODEL").or(fc.stt.model);

        let backend = match stt_provider.as_str() {
            "auto" => openai_key
                .clone()
                .map(|key| SttBackend::Whisper {
                    api_key: SecretString::from(key),
                    model: stt_model.clone().unwrap_or_else(|| "whisper-1".to_string()),
                })
                .or_else(|| {
                    deepgram_key.clone().map(|key| SttBackend::Deepgram {
                        api_key: SecretString::from(key),
                        model: stt_model.clone().unwrap_or_else(|| "nova-2".to_string()),
                    })
                })
                .or_else(|| {
                    google_speech_key.clone().map(|key| SttBackend::Google {
                        api_key: SecretString::from(key),
                    })
                }),
            "whisper" => Some(SttBackend::Whisper {
                api_key: SecretString::from(require(openai_key.clone(), "OPENAI_API_KEY", "whisper")?),
                model: stt_model.unwrap_or_else(|| "whisper-1".to_string()),
            }),
            "deepgram" => Some(SttBackend::Deepgram {
                api_key: SecretString::from(require(deepgram_key, "DEEPGRAM_API_KEY", "deepgram")?),
                model: stt_model.unwrap_or_else(|| "nova-2".to_string()),
            }),
            "google" => Some(SttBackend::Google {
                api_key: SecretString::from(require(
                    google_speech_key,
                    "GOOGLE_SPEECH_API_KEY",
                    "google",
                )?),
            }),
            "none" => None,
            other => {
                return Err(Error::Config(format!("unknown STT provider: {other}")));
            }
        };

        let stt = SttConfig {
            backend,
            base_url: env("PARLEY_STT_BASE_URL").or(fc.stt.base_url),
            timeout: Duration::from_secs(
                parse_env(&env, "PARLEY_STT_TIMEOUT_SECS")?
                    .or(fc.stt.timeout_secs)
                    .unwrap_or(DEFAULT_STT_TIMEOUT_SECS),
            ),
        };

        let tts_provider = env("PARLEY_TTS_PROVIDER")
            .or(fc.tts.provider)
            .unwrap_or_else(|| "google".to_string())
            .to_ascii_lowercase();

        let backend = match tts_provider.as_str() {
            "google" => TtsBackend::Google,
            "openai" => TtsBackend::OpenAI {
                api_key: SecretString::from(require(openai_key, "OPENAI_API_KEY", "openai")?),
                model: env("PARLEY_TTS_MODEL")
                    .or(fc.tts.model)
                    .unwrap_or_else(|| "tts-1".to_string()),
                voice: env("PARLEY_TTS_VOICE")
                    .or(fc.tts.voice)
                    .unwrap_or_else(|| "alloy".to_string()),
            },
            other => {
                return Err(Error::Config(format!("unknown TTS provider: {other}")));
            }
        };

        let tts = TtsConfig {
            backend,
            base_url: env("PARLEY_TTS_BASE_URL").or(fc.tts.base_url),
            timeout: Duration::from_secs(
                parse_env(&env, "PARLEY_TTS_TIMEOUT_SECS")?
                    .or(fc.tts.timeout_secs)
                    .unwrap_or(DEFAULT_TTS_TIMEOUT_SECS),
            ),
        };

        let language = env("PARLEY_LANGUAGE")
            .or(fc.language)
            .unwrap_or_else(|| "en".to_string());

        Ok(Self {
            server,
            gemini,
            stt,
            tts,
            language,
        })
    }
}

impl SttBackend {
    /// Provider name as used in config
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Whisper { .. } => "whisper",
            Self::Deepgram { .. } => "deepgram",
            Self::Google { .. } => "google",
        }
    }
}

fn parse_env<T, F>(env: &F, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    env(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| Error::Config(format!("invalid {key}={raw}: {e}")))
        })
        .transpose()
}

fn require(value: Option<String>, key: &str, provider: &str) -> Result<String> {
    value.ok_or_else(|| Error::Config(format!("{key} is required for the {provider} provider")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn resolve(vars: &[(&str, &str)], fc: ParleyConfigFile) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::resolve(|key| vars.get(key).cloned(), fc)
    }

    #[test]
    fn test_missing_gemini_key_fails() {
        let err = resolve(&[], ParleyConfigFile::default()).unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("GEMINI_API_KEY")));
    }

    #[test]
    fn test_blank_gemini_key_fails() {
        assert!(resolve(&[("GEMINI_API_KEY", "  ")], ParleyConfigFile::default()).is_err());
    }

    #[test]
    fn test_defaults() {
        let config = resolve(&[("GEMINI_API_KEY", "k")], ParleyConfigFile::default()).unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 5002);
        assert_eq!(config.server.max_body_bytes, 4 * 1024 * 1024);
        assert!(config.server.requests_per_minute.is_none());
        assert_eq!(config.gemini.model, "gemini-2.5-flash-lite");
        assert_eq!(config.gemini.timeout, Duration::from_secs(20));
        assert!(config.stt.backend.is_none());
        assert!(matches!(config.tts.backend, TtsBackend::Google));
        assert_eq!(config.language, "en");
    }

    #[test]
    fn test_env_overrides_file() {
        let fc = file::parse_config(
            r#"
            language = "de"
            [server]
            port = 7000
            [gemini]
            api_key = "from-file"
            "#,
        )
        .unwrap();

        let config = resolve(&[("PARLEY_PORT", "9000"), ("GEMINI_API_KEY", "from-env")], fc).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.gemini.api_key.expose_secret(), "from-env");
        assert_eq!(config.language, "de");
    }

    #[test]
    fn test_invalid_number_is_config_error() {
        let result = resolve(
            &[("GEMINI_API_KEY", "k"), ("PARLEY_PORT", "http")],
            ParleyConfigFile::default(),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_auto_stt_prefers_whisper() {
        let config = resolve(
            &[
                ("GEMINI_API_KEY", "k"),
                ("OPENAI_API_KEY", "sk"),
                ("DEEPGRAM_API_KEY", "dg"),
            ],
            ParleyConfigFile::default(),
        )
        .unwrap();
        assert_eq!(config.stt.backend.as_ref().map(SttBackend::name), Some("whisper"));
    }

    #[test]
    fn test_auto_stt_falls_back_to_deepgram() {
        let config = resolve(
            &[("GEMINI_API_KEY", "k"), ("DEEPGRAM_API_KEY", "dg")],
            ParleyConfigFile::default(),
        )
        .unwrap();
        assert_eq!(config.stt.backend.as_ref().map(SttBackend::name), Some("deepgram"));
    }

    #[test]
    fn test_explicit_stt_provider_needs_key() {
        let result = resolve(
            &[("GEMINI_API_KEY", "k"), ("PARLEY_STT_PROVIDER", "deepgram")],
            ParleyConfigFile::default(),
        );
        assert!(matches!(result, Err(Error::Config(ref msg)) if msg.contains("DEEPGRAM_API_KEY")));
    }

    #[test]
    fn test_stt_none_disables_audio() {
        let config = resolve(
            &[
                ("GEMINI_API_KEY", "k"),
                ("OPENAI_API_KEY", "sk"),
                ("PARLEY_STT_PROVIDER", "none"),
            ],
            ParleyConfigFile::default(),
        )
        .unwrap();
        assert!(config.stt.backend.is_none());
    }

    #[test]
    fn test_openai_tts_from_file() {
        let fc = file::parse_config(
            r#"
            [tts]
            provider = "openai"
            voice = "nova"
            [api_keys]
            openai = "sk-file"
            "#,
        )
        .unwrap();

        let config = resolve(&[("GEMINI_API_KEY", "k")], fc).unwrap();
        match config.tts.backend {
            TtsBackend::OpenAI { voice, model, .. } => {
                assert_eq!(voice, "nova");
                assert_eq!(model, "tts-1");
            }
            TtsBackend::Google => panic!("expected OpenAI backend"),
        }
    }

    #[test]
    fn test_unknown_provider_fails() {
        let result = resolve(
            &[("GEMINI_API_KEY", "k"), ("PARLEY_TTS_PROVIDER", "espeak")],
            ParleyConfigFile::default(),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
