//! Configuration module for the Callbridge server
//!
//! This module handles server configuration from various sources: .env files,
//! YAML files, and environment variables. Priority: YAML > ENV vars > defaults.
//!
//! # Example
//! ```rust,no_run
//! use callbridge_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable fallbacks
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::env;
use std::path::{Path, PathBuf};

use thiserror::Error;
use zeroize::Zeroize;

use crate::core::realtime::config::{DEFAULT_REALTIME_MODEL, REALTIME_API_URL, RealtimeVoice};

mod yaml;

use yaml::YamlConfig;

/// Default bind host.
const DEFAULT_HOST: &str = "0.0.0.0";

/// Default bind port.
const DEFAULT_PORT: u16 = 5050;

/// Default response randomness.
const DEFAULT_TEMPERATURE: f32 = 0.8;

/// Default persona instructions when none are configured.
const DEFAULT_INSTRUCTIONS: &str = "You are a friendly, concise voice assistant. \
     Answer the caller's questions directly and keep responses short enough \
     for natural conversation.";

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file could not be parsed
    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A value failed validation
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Server configuration
///
/// Contains everything needed to run the Callbridge server:
/// - Server settings (host, port, TLS)
/// - Realtime API settings (key, endpoint, model, voice, persona, temperature)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional; the telephony platform requires wss://
    // in production, terminated either by a fronting proxy or here)
    pub tls: Option<TlsConfig>,

    /// OpenAI API key for the Realtime API
    pub openai_api_key: Option<String>,
    /// Realtime WebSocket endpoint; overridable for gateways and tests
    pub realtime_url: String,
    /// Realtime model
    pub realtime_model: String,
    /// Voice for synthesized output
    pub voice: RealtimeVoice,
    /// Persona instructions sent with the initial session configuration
    pub instructions: String,
    /// Response randomness
    pub temperature: f32,
}

/// Zeroize the API key when the config is dropped so the secret does not
/// linger in freed memory.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        if let Some(ref mut key) = self.openai_api_key {
            key.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self::base_from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file, with environment variables as
    /// fallback for anything the file leaves unset.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let yaml: YamlConfig =
            serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let mut config = Self::base_from_env()?;
        config.apply_yaml(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Bind address in `host:port` form.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether TLS termination is configured.
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    fn base_from_env() -> Result<Self, ConfigError> {
        let host = env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        let port = match env::var("PORT") {
            Ok(value) => value
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid(format!("PORT is not a valid port: {value}")))?,
            Err(_) => DEFAULT_PORT,
        };

        let tls = match (env::var("TLS_CERT_PATH"), env::var("TLS_KEY_PATH")) {
            (Ok(cert), Ok(key)) => Some(TlsConfig {
                cert_path: PathBuf::from(cert),
                key_path: PathBuf::from(key),
            }),
            (Err(_), Err(_)) => None,
            _ => {
                return Err(ConfigError::Invalid(
                    "TLS_CERT_PATH and TLS_KEY_PATH must be set together".to_string(),
                ));
            }
        };

        let temperature = match env::var("TEMPERATURE") {
            Ok(value) => value.parse::<f32>().map_err(|_| {
                ConfigError::Invalid(format!("TEMPERATURE is not a number: {value}"))
            })?,
            Err(_) => DEFAULT_TEMPERATURE,
        };

        Ok(Self {
            host,
            port,
            tls,
            openai_api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            realtime_url: env::var("OPENAI_REALTIME_URL")
                .unwrap_or_else(|_| REALTIME_API_URL.to_string()),
            realtime_model: env::var("OPENAI_REALTIME_MODEL")
                .unwrap_or_else(|_| DEFAULT_REALTIME_MODEL.to_string()),
            voice: env::var("OPENAI_VOICE")
                .map(|v| RealtimeVoice::from_str_or_default(&v))
                .unwrap_or_default(),
            instructions: env::var("SYSTEM_MESSAGE")
                .unwrap_or_else(|_| DEFAULT_INSTRUCTIONS.to_string()),
            temperature,
        })
    }

    fn apply_yaml(&mut self, yaml: YamlConfig) -> Result<(), ConfigError> {
        if let Some(server) = yaml.server {
            if let Some(host) = server.host {
                self.host = host;
            }
            if let Some(port) = server.port {
                self.port = port;
            }
            if let Some(tls) = server.tls {
                match (tls.cert_path, tls.key_path) {
                    (Some(cert), Some(key)) => {
                        self.tls = Some(TlsConfig {
                            cert_path: PathBuf::from(cert),
                            key_path: PathBuf::from(key),
                        });
                    }
                    (None, None) => {}
                    _ => {
                        return Err(ConfigError::Invalid(
                            "tls.cert_path and tls.key_path must be set together".to_string(),
                        ));
                    }
                }
            }
        }

        if let Some(realtime) = yaml.realtime {
            if let Some(api_key) = realtime.api_key {
                self.openai_api_key = Some(api_key);
            }
            if let Some(url) = realtime.url {
                self.realtime_url = url;
            }
            if let Some(model) = realtime.model {
                self.realtime_model = model;
            }
            if let Some(voice) = realtime.voice {
                self.voice = RealtimeVoice::from_str_or_default(&voice);
            }
            if let Some(instructions) = realtime.instructions {
                self.instructions = instructions;
            }
            if let Some(temperature) = realtime.temperature {
                self.temperature = temperature;
            }
        }

        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Invalid("port must be non-zero".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid(format!(
                "temperature must be between 0.0 and 2.0, got {}",
                self.temperature
            )));
        }
        if !self.realtime_url.starts_with("ws://") && !self.realtime_url.starts_with("wss://") {
            return Err(ConfigError::Invalid(format!(
                "realtime url must be a ws:// or wss:// endpoint, got {}",
                self.realtime_url
            )));
        }
        Ok(())
    }
}
