use crate::error::ConfigError;
use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub recognition: RecognitionSettings,

    #[serde(default)]
    pub engine: EngineConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RecognitionSettings {
    #[serde(default = "default_language_code")]
    pub language_code: String,

    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    #[serde(default)]
    pub encoding: AudioEncoding,

    #[serde(default)]
    pub output_format: OutputFormat,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_stop_grace_ms")]
    pub stop_grace_ms: u64,

    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            language_code: default_language_code(),
            sample_rate: default_sample_rate(),
            encoding: AudioEncoding::default(),
            output_format: OutputFormat::default(),
            timeout_secs: default_timeout_secs(),
            stop_grace_ms: default_stop_grace_ms(),
            stream_buffer: default_stream_buffer(),
            chunk_size: default_chunk_size(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    #[serde(default = "default_engine_name")]
    pub name: String,

    #[serde(default)]
    pub azure: Option<AzureConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: default_engine_name(),
            azure: None,
        }
    }
}

#[derive(Deserialize, Clone, Default)]
pub struct AzureConfig {
    #[serde(default)]
    pub subscription_key: Option<String>,

    #[serde(default)]
    pub region: Option<String>,

    #[serde(default)]
    pub endpoint: Option<String>,
}

impl fmt::Debug for AzureConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureConfig")
            .field("subscription_key", &self.subscription_key.as_ref().map(|_| "<redacted>"))
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioEncoding {
    /// Raw 16-bit little-endian mono PCM.
    #[default]
    Pcm16,
    /// PCM16 inside a RIFF/WAVE container.
    Wav,
}

impl AudioEncoding {
    pub fn content_type(&self, sample_rate: u32) -> String {
        format!("audio/wav; codecs=audio/pcm; samplerate={sample_rate}")
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Simple,
    #[default]
    Detailed,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Detailed => "detailed",
        }
    }
}

/// Engine credentials. The key never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    subscription_key: String,
    region: String,
    endpoint: Option<String>,
}

impl Credentials {
    pub fn new(subscription_key: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            subscription_key: subscription_key.into(),
            region: region.into(),
            endpoint: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn subscription_key(&self) -> &str {
        &self.subscription_key
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("subscription_key", &"<redacted>")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Validated, immutable settings shared read-only by every session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionConfig {
    pub language_code: String,
    pub sample_rate_hz: u32,
    pub encoding: AudioEncoding,
    pub output_format: OutputFormat,
    pub timeout: Duration,
    pub stop_grace: Duration,
    pub stream_buffer: usize,
    pub chunk_size: usize,
    pub credentials: Credentials,
}

impl RecognitionConfig {
    /// Build the runtime config from loaded settings.
    pub fn initialize(config: &AppConfig) -> Result<Self, ConfigError> {
        let azure = config.engine.azure.clone().unwrap_or_default();
        let key = non_empty(azure.subscription_key)
            .ok_or(ConfigError::MissingCredential("subscription_key"))?;
        let region = non_empty(azure.region).ok_or(ConfigError::MissingCredential("region"))?;

        let mut credentials = Credentials::new(key, region);
        if let Some(endpoint) = non_empty(azure.endpoint) {
            credentials = credentials.with_endpoint(endpoint);
        }
        Self::from_settings(&config.recognition, credentials)
    }

    /// Build from `AZURE_KEY` / `AZURE_REGION` with default recognition settings.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let key = non_empty(lookup("AZURE_KEY")).ok_or(ConfigError::MissingCredential("AZURE_KEY"))?;
        let region =
            non_empty(lookup("AZURE_REGION")).ok_or(ConfigError::MissingCredential("AZURE_REGION"))?;
        Self::from_settings(&RecognitionSettings::default(), Credentials::new(key, region))
    }

    pub fn from_settings(
        settings: &RecognitionSettings,
        credentials: Credentials,
    ) -> Result<Self, ConfigError> {
        if settings.sample_rate == 0 {
            return Err(ConfigError::Invalid("sample_rate must be positive".to_string()));
        }
        if settings.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be positive".to_string()));
        }
        if settings.stream_buffer == 0 {
            return Err(ConfigError::Invalid("stream_buffer must be positive".to_string()));
        }
        if settings.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk_size must be positive".to_string()));
        }
        if settings.language_code.trim().is_empty() {
            return Err(ConfigError::Invalid("language_code is empty".to_string()));
        }

        Ok(Self {
            language_code: settings.language_code.clone(),
            sample_rate_hz: settings.sample_rate,
            encoding: settings.encoding,
            output_format: settings.output_format,
            timeout: Duration::from_secs(settings.timeout_secs),
            stop_grace: Duration::from_millis(settings.stop_grace_ms),
            stream_buffer: settings.stream_buffer,
            chunk_size: settings.chunk_size,
            credentials,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_stop_grace(mut self, stop_grace: Duration) -> Self {
        self.stop_grace = stop_grace;
        self
    }
}

static GLOBAL_CONFIG: OnceLock<Arc<RecognitionConfig>> = OnceLock::new();

/// Install the process-wide config. Only the first call succeeds.
pub fn install_global(config: RecognitionConfig) -> Result<Arc<RecognitionConfig>, ConfigError> {
    let config = Arc::new(config);
    GLOBAL_CONFIG
        .set(Arc::clone(&config))
        .map_err(|_| ConfigError::AlreadyInitialized)?;
    tracing::info!(
        language = %config.language_code,
        region = %config.credentials.region(),
        "recognition config installed"
    );
    Ok(config)
}

pub fn global() -> Result<Arc<RecognitionConfig>, ConfigError> {
    GLOBAL_CONFIG.get().cloned().ok_or(ConfigError::NotInitialized)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_language_code() -> String {
    "en-IN".to_string()
}

fn default_sample_rate() -> u32 {
    8000
}

fn default_timeout_secs() -> u64 {
    25
}

fn default_stop_grace_ms() -> u64 {
    5000
}

fn default_stream_buffer() -> usize {
    32
}

// 0.5s of 8kHz PCM16
fn default_chunk_size() -> usize {
    8000
}

fn default_engine_name() -> String {
    "null".to_string()
}

/// Interpolate `${VAR}` patterns with environment variable values.
fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ConfigError::Invalid(e.to_string()))?;
    let mut result = input.to_string();

    for cap in re.captures_iter(input) {
        let var_name = &cap[1];
        let value =
            std::env::var(var_name).map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
        result = result.replace(&cap[0], &value);
    }

    Ok(result)
}

impl AppConfig {
    /// Load configuration from a TOML file, with environment variable interpolation.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let interpolated = interpolate_env_vars(s)?;
        let config: AppConfig = toml::from_str(&interpolated)?;
        Ok(config)
    }
}
