use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::SessionSettings;

pub const MAX_LLM_RETRIES: u32 = 10;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub session: SessionConfig,
    pub extraction: ExtractionConfig,
    pub intent: IntentConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub catalog: CatalogConfig,
    pub gazetteer: GazetteerConfig,
    pub listing: ListingConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub max_history: usize,
    pub idle_timeout_secs: u64,
    pub sweep_interval_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ExtractionConfig {
    pub numeric_tie_break: NumericTieBreak,
    pub bare_price_threshold: u64,
    pub bare_price_multiplier: u64,
    pub location_similarity_floor: f64,
    pub unit_similarity_floor: f64,
    pub unit_semantic_threshold: f32,
    pub type_semantic_threshold: f32,
}

#[derive(Clone, Debug)]
pub struct IntentConfig {
    pub confirmation_threshold: f32,
    pub indifference_threshold: f32,
}

/// Sentence embedding backend. `model_dir` holds `model.onnx` and
/// `tokenizer.json` of a sentence-transformer export.
#[derive(Clone, Debug, Default)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    pub model_dir: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub prompt_template_path: Option<PathBuf>,
}

#[derive(Clone, Debug, Default)]
pub struct CatalogConfig {
    pub path: Option<PathBuf>,
}

#[derive(Clone, Debug, Default)]
pub struct GazetteerConfig {
    pub path: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct ListingConfig {
    pub base_url: String,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    OpenAi,
    Ollama,
}

impl LlmProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
        }
    }
}

/// `auto` uses the ONNX model when `model_dir` is set and falls back to the
/// hashing embedder otherwise; `onnx` makes a missing model fatal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackend {
    #[default]
    Auto,
    Onnx,
    Hashing,
}

impl EmbeddingBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Onnx => "onnx",
            Self::Hashing => "hashing",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

/// Which value wins when one utterance mentions the same count twice,
/// e.g. "2 habitaciones... mejor 3 habitaciones".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericTieBreak {
    #[default]
    Max,
    Last,
}

impl NumericTieBreak {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Max => "max",
            Self::Last => "last",
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_base_url: Option<String>,
    pub catalog_path: Option<PathBuf>,
    pub gazetteer_path: Option<PathBuf>,
    pub embedding_model_dir: Option<PathBuf>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig {
                max_history: 20,
                idle_timeout_secs: 3_600,
                sweep_interval_secs: 600,
            },
            extraction: ExtractionConfig {
                numeric_tie_break: NumericTieBreak::Max,
                bare_price_threshold: 10_000,
                bare_price_multiplier: 1_000_000,
                location_similarity_floor: 0.8,
                unit_similarity_floor: 0.75,
                unit_semantic_threshold: 0.6,
                type_semantic_threshold: 0.7,
            },
            intent: IntentConfig { confirmation_threshold: 0.70, indifference_threshold: 0.65 },
            embedding: EmbeddingConfig::default(),
            llm: LlmConfig {
                provider: LlmProvider::Ollama,
                api_key: None,
                base_url: "http://localhost:11434".to_string(),
                model: "mistral".to_string(),
                timeout_secs: 60,
                max_retries: 2,
                prompt_template_path: None,
            },
            catalog: CatalogConfig::default(),
            gazetteer: GazetteerConfig::default(),
            listing: ListingConfig { base_url: "https://multihabitat.lat/inmueble".to_string() },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for EmbeddingBackend {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "onnx" => Ok(Self::Onnx),
            "hashing" => Ok(Self::Hashing),
            other => Err(ConfigError::Validation(format!(
                "unsupported embedding backend `{other}` (expected auto|onnx|hashing)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl std::str::FromStr for NumericTieBreak {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "max" => Ok(Self::Max),
            "last" => Ok(Self::Last),
            other => Err(ConfigError::Validation(format!(
                "unsupported numeric tie-break `{other}` (expected max|last)"
            ))),
        }
    }
}

impl SessionConfig {
    pub fn settings(&self) -> SessionSettings {
        SessionSettings {
            max_history: self.max_history,
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
        }
    }
}

impl LlmConfig {
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_ref().is_some_and(|key| !key.expose_secret().trim().is_empty())
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("homecat.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Path of the file `load` would read, if any.
    pub fn resolved_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
        resolve_config_path(explicit_path)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(session) = patch.session {
            if let Some(max_history) = session.max_history {
                self.session.max_history = max_history;
            }
            if let Some(idle_timeout_secs) = session.idle_timeout_secs {
                self.session.idle_timeout_secs = idle_timeout_secs;
            }
            if let Some(sweep_interval_secs) = session.sweep_interval_secs {
                self.session.sweep_interval_secs = sweep_interval_secs;
            }
        }

        if let Some(extraction) = patch.extraction {
            if let Some(numeric_tie_break) = extraction.numeric_tie_break {
                self.extraction.numeric_tie_break = numeric_tie_break;
            }
            if let Some(threshold) = extraction.bare_price_threshold {
                self.extraction.bare_price_threshold = threshold;
            }
            if let Some(multiplier) = extraction.bare_price_multiplier {
                self.extraction.bare_price_multiplier = multiplier;
            }
            if let Some(floor) = extraction.location_similarity_floor {
                self.extraction.location_similarity_floor = floor;
            }
            if let Some(floor) = extraction.unit_similarity_floor {
                self.extraction.unit_similarity_floor = floor;
            }
            if let Some(threshold) = extraction.unit_semantic_threshold {
                self.extraction.unit_semantic_threshold = threshold;
            }
            if let Some(threshold) = extraction.type_semantic_threshold {
                self.extraction.type_semantic_threshold = threshold;
            }
        }

        if let Some(intent) = patch.intent {
            if let Some(threshold) = intent.confirmation_threshold {
                self.intent.confirmation_threshold = threshold;
            }
            if let Some(threshold) = intent.indifference_threshold {
                self.intent.indifference_threshold = threshold;
            }
        }

        if let Some(embedding) = patch.embedding {
            if let Some(backend) = embedding.backend {
                self.embedding.backend = backend;
            }
            if let Some(model_dir) = embedding.model_dir {
                self.embedding.model_dir = Some(model_dir);
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
            if let Some(prompt_template_path) = llm.prompt_template_path {
                self.llm.prompt_template_path = Some(prompt_template_path);
            }
        }

        if let Some(catalog) = patch.catalog {
            if let Some(path) = catalog.path {
                self.catalog.path = Some(path);
            }
        }

        if let Some(gazetteer) = patch.gazetteer {
            if let Some(path) = gazetteer.path {
                self.gazetteer.path = Some(path);
            }
        }

        if let Some(listing) = patch.listing {
            if let Some(base_url) = listing.base_url {
                self.listing.base_url = base_url;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("HOMECAT_SESSION_MAX_HISTORY") {
            self.session.max_history = parse_usize("HOMECAT_SESSION_MAX_HISTORY", &value)?;
        }
        if let Some(value) = read_env("HOMECAT_SESSION_IDLE_TIMEOUT_SECS") {
            self.session.idle_timeout_secs =
                parse_u64("HOMECAT_SESSION_IDLE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("HOMECAT_SESSION_SWEEP_INTERVAL_SECS") {
            self.session.sweep_interval_secs =
                parse_u64("HOMECAT_SESSION_SWEEP_INTERVAL_SECS", &value)?;
        }

        if let Some(value) = read_env("HOMECAT_EXTRACTION_NUMERIC_TIE_BREAK") {
            self.extraction.numeric_tie_break = value.parse()?;
        }
        if let Some(value) = read_env("HOMECAT_EXTRACTION_BARE_PRICE_THRESHOLD") {
            self.extraction.bare_price_threshold =
                parse_u64("HOMECAT_EXTRACTION_BARE_PRICE_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("HOMECAT_EXTRACTION_BARE_PRICE_MULTIPLIER") {
            self.extraction.bare_price_multiplier =
                parse_u64("HOMECAT_EXTRACTION_BARE_PRICE_MULTIPLIER", &value)?;
        }
        if let Some(value) = read_env("HOMECAT_EXTRACTION_LOCATION_SIMILARITY_FLOOR") {
            self.extraction.location_similarity_floor =
                parse_f64("HOMECAT_EXTRACTION_LOCATION_SIMILARITY_FLOOR", &value)?;
        }

        if let Some(value) = read_env("HOMECAT_INTENT_CONFIRMATION_THRESHOLD") {
            self.intent.confirmation_threshold =
                parse_f32("HOMECAT_INTENT_CONFIRMATION_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("HOMECAT_INTENT_INDIFFERENCE_THRESHOLD") {
            self.intent.indifference_threshold =
                parse_f32("HOMECAT_INTENT_INDIFFERENCE_THRESHOLD", &value)?;
        }

        if let Some(value) = read_env("HOMECAT_EMBEDDING_BACKEND") {
            self.embedding.backend = value.parse()?;
        }
        if let Some(value) = read_env("HOMECAT_EMBEDDING_MODEL_DIR") {
            self.embedding.model_dir = Some(PathBuf::from(value));
        }

        if let Some(value) = read_env("HOMECAT_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("HOMECAT_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("HOMECAT_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("HOMECAT_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("HOMECAT_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("HOMECAT_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("HOMECAT_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("HOMECAT_LLM_MAX_RETRIES", &value)?;
        }
        if let Some(value) = read_env("HOMECAT_LLM_PROMPT_TEMPLATE_PATH") {
            self.llm.prompt_template_path = Some(PathBuf::from(value));
        }

        if let Some(value) = read_env("HOMECAT_CATALOG_PATH") {
            self.catalog.path = Some(PathBuf::from(value));
        }
        if let Some(value) = read_env("HOMECAT_GAZETTEER_PATH") {
            self.gazetteer.path = Some(PathBuf::from(value));
        }
        if let Some(value) = read_env("HOMECAT_LISTING_BASE_URL") {
            self.listing.base_url = value;
        }

        let log_level =
            read_env("HOMECAT_LOGGING_LEVEL").or_else(|| read_env("HOMECAT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("HOMECAT_LOGGING_FORMAT").or_else(|| read_env("HOMECAT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_base_url) = overrides.llm_base_url {
            self.llm.base_url = llm_base_url;
        }
        if let Some(catalog_path) = overrides.catalog_path {
            self.catalog.path = Some(catalog_path);
        }
        if let Some(gazetteer_path) = overrides.gazetteer_path {
            self.gazetteer.path = Some(gazetteer_path);
        }
        if let Some(model_dir) = overrides.embedding_model_dir {
            self.embedding.model_dir = Some(model_dir);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_session(&self.session)?;
        validate_extraction(&self.extraction)?;
        validate_intent(&self.intent)?;
        validate_embedding(&self.embedding)?;
        validate_llm(&self.llm)?;
        validate_listing(&self.listing)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("homecat.toml"), PathBuf::from("config/homecat.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_session(session: &SessionConfig) -> Result<(), ConfigError> {
    if session.max_history == 0 {
        return Err(ConfigError::Validation(
            "session.max_history must be greater than zero".to_string(),
        ));
    }
    if session.idle_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "session.idle_timeout_secs must be greater than zero".to_string(),
        ));
    }
    if session.sweep_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "session.sweep_interval_secs must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_extraction(extraction: &ExtractionConfig) -> Result<(), ConfigError> {
    if extraction.bare_price_multiplier == 0 {
        return Err(ConfigError::Validation(
            "extraction.bare_price_multiplier must be greater than zero".to_string(),
        ));
    }

    let ratios = [
        ("extraction.location_similarity_floor", extraction.location_similarity_floor),
        ("extraction.unit_similarity_floor", extraction.unit_similarity_floor),
        ("extraction.unit_semantic_threshold", f64::from(extraction.unit_semantic_threshold)),
        ("extraction.type_semantic_threshold", f64::from(extraction.type_semantic_threshold)),
    ];
    for (key, value) in ratios {
        validate_ratio(key, value)?;
    }
    Ok(())
}

fn validate_intent(intent: &IntentConfig) -> Result<(), ConfigError> {
    validate_ratio("intent.confirmation_threshold", f64::from(intent.confirmation_threshold))?;
    validate_ratio("intent.indifference_threshold", f64::from(intent.indifference_threshold))
}

fn validate_ratio(key: &str, value: f64) -> Result<(), ConfigError> {
    if !(value > 0.0 && value <= 1.0) {
        return Err(ConfigError::Validation(format!("{key} must be in range (0, 1], got {value}")));
    }
    Ok(())
}

fn validate_embedding(embedding: &EmbeddingConfig) -> Result<(), ConfigError> {
    if embedding.backend == EmbeddingBackend::Onnx && embedding.model_dir.is_none() {
        return Err(ConfigError::Validation(
            "embedding.model_dir is required for the onnx backend (set HOMECAT_EMBEDDING_MODEL_DIR)"
                .to_string(),
        ));
    }
    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if llm.max_retries > MAX_LLM_RETRIES {
        return Err(ConfigError::Validation(format!(
            "llm.max_retries must be at most {MAX_LLM_RETRIES}"
        )));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    let base_url = llm.base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "llm.base_url must start with http:// or https://".to_string(),
        ));
    }

    if llm.provider == LlmProvider::OpenAi && !llm.has_api_key() {
        return Err(ConfigError::Validation(
            "llm.api_key is required for the openai provider (set HOMECAT_LLM_API_KEY)"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_listing(listing: &ListingConfig) -> Result<(), ConfigError> {
    let base_url = listing.base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "listing.base_url must start with http:// or https://".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| invalid_override(key, value))
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_f32(key: &str, value: &str) -> Result<f32, ConfigError> {
    value.parse::<f32>().map_err(|_| invalid_override(key, value))
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.parse::<f64>().map_err(|_| invalid_override(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    session: Option<SessionPatch>,
    extraction: Option<ExtractionPatch>,
    intent: Option<IntentPatch>,
    embedding: Option<EmbeddingPatch>,
    llm: Option<LlmPatch>,
    catalog: Option<PathPatch>,
    gazetteer: Option<PathPatch>,
    listing: Option<ListingPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionPatch {
    max_history: Option<usize>,
    idle_timeout_secs: Option<u64>,
    sweep_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ExtractionPatch {
    numeric_tie_break: Option<NumericTieBreak>,
    bare_price_threshold: Option<u64>,
    bare_price_multiplier: Option<u64>,
    location_similarity_floor: Option<f64>,
    unit_similarity_floor: Option<f64>,
    unit_semantic_threshold: Option<f32>,
    type_semantic_threshold: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct IntentPatch {
    confirmation_threshold: Option<f32>,
    indifference_threshold: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct EmbeddingPatch {
    backend: Option<EmbeddingBackend>,
    model_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    prompt_template_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct PathPatch {
    path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct ListingPatch {
    base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
