// Configuration for the server, read once at startup

use std::time::Duration;

use tracing::warn;
use tts_core::{AuthPolicy, PipelineConfig, MAX_TEXT_LENGTH};

pub const DEFAULT_BRIDGE_CMD: &str = "python3 scripts/model_bridge.py";

#[derive(Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub auth_required: bool,
    pub auth_key: Option<String>,
    pub auth_header: String,
    pub model_bridge_cmd: String,
    pub mel_channels: Option<usize>,
    pub max_text_length: usize,
    pub max_body_bytes: usize,
    pub rate_limit_per_minute: u32,
    pub request_timeout_secs: u64,
    pub synthesis_timeout_secs: u64,
    pub cors_allowed_origins: Option<Vec<String>>,
    pub expose_error_details: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            auth_required: true,
            auth_key: None,
            auth_header: "Authorization".to_string(),
            model_bridge_cmd: DEFAULT_BRIDGE_CMD.to_string(),
            mel_channels: Some(80),
            max_text_length: MAX_TEXT_LENGTH,
            max_body_bytes: 64 * 1024,
            rate_limit_per_minute: 60,
            request_timeout_secs: 60,
            synthesis_timeout_secs: 30,
            cors_allowed_origins: None,
            expose_error_details: false,
        }
    }
}

// The key never shows up in logs
impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("port", &self.port)
            .field("auth_required", &self.auth_required)
            .field("auth_key", &self.auth_key.as_ref().map(|_| "<redacted>"))
            .field("auth_header", &self.auth_header)
            .field("model_bridge_cmd", &self.model_bridge_cmd)
            .field("mel_channels", &self.mel_channels)
            .field("max_text_length", &self.max_text_length)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("rate_limit_per_minute", &self.rate_limit_per_minute)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("synthesis_timeout_secs", &self.synthesis_timeout_secs)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("expose_error_details", &self.expose_error_details)
            .finish()
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or unparsable values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parsed = |key: &str| ParsedVar(lookup(key));
        let flag = |key: &str, default: bool| match lookup(key) {
            None => default,
            Some(raw) => parse_flag(&raw).unwrap_or_else(|| {
                warn!("{key}={raw:?} is not a recognized flag value, using {default}");
                default
            }),
        };

        let mel_channels = match parsed("MEL_CHANNELS").get::<usize>() {
            Some(0) => None,
            Some(n) => Some(n),
            None => defaults.mel_channels,
        };

        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS").map(|origins| {
            origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        Self {
            port: parsed("PORT").get().unwrap_or(defaults.port),
            auth_required: flag("AUTH_REQUIRED", defaults.auth_required),
            auth_key: lookup("AUTHKEY").filter(|k| !k.is_empty()),
            auth_header: lookup("AUTH_HEADER")
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
                .unwrap_or(defaults.auth_header),
            model_bridge_cmd: lookup("MODEL_BRIDGE_CMD")
                .filter(|c| !c.trim().is_empty())
                .unwrap_or(defaults.model_bridge_cmd),
            mel_channels,
            max_text_length: parsed("MAX_TEXT_LENGTH").get().unwrap_or(defaults.max_text_length),
            max_body_bytes: parsed("MAX_BODY_BYTES").get().unwrap_or(defaults.max_body_bytes),
            rate_limit_per_minute: parsed("RATE_LIMIT_PER_MINUTE")
                .get()
                .unwrap_or(defaults.rate_limit_per_minute),
            request_timeout_secs: parsed("REQUEST_TIMEOUT_SECS")
                .get()
                .unwrap_or(defaults.request_timeout_secs),
            synthesis_timeout_secs: parsed("SYNTHESIS_TIMEOUT_SECS")
                .get()
                .unwrap_or(defaults.synthesis_timeout_secs),
            cors_allowed_origins,
            expose_error_details: flag("EXPOSE_ERROR_DETAILS", defaults.expose_error_details),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn synthesis_timeout(&self) -> Duration {
        Duration::from_secs(self.synthesis_timeout_secs)
    }

    pub fn auth_policy(&self) -> AuthPolicy {
        AuthPolicy::from_config(self.auth_required, self.auth_key.clone())
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            mel_channels: self.mel_channels,
            max_text_length: self.max_text_length,
        }
    }
}

// Unknown spellings are `None` so a typo never flips a flag away from its default
fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

// Raw environment value, parsed on demand into whatever the field needs
struct ParsedVar(Option<String>);

impl ParsedVar {
    fn get<T: std::str::FromStr>(&self) -> Option<T> {
        self.0.as_deref().and_then(|v| v.trim().parse().ok())
    }
}
