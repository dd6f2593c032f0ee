use std::env;
use std::fs;
use std::path::Path;

use homecat_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

use super::{CommandResult, EXIT_CONFIG, EXIT_OK};

pub fn run(options: &LoadOptions) -> CommandResult {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::text(EXIT_CONFIG, format!("config validation failed: {error}"))
        }
    };
    CommandResult::text(EXIT_OK, render(&config, options))
}

/// One line per setting, secrets redacted, each with where its value came from.
pub fn render(config: &AppConfig, options: &LoadOptions) -> String {
    let config_file_path = AppConfig::resolved_path(options.config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str], overridden: bool| {
        if overridden {
            return "flag".to_string();
        }
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };
    let path_or_unset =
        |path: Option<&Path>| path.map_or_else(|| "<unset>".to_string(), |path| path.display().to_string());

    let entries: Vec<(&str, String, &[&str], bool)> = vec![
        (
            "session.max_history",
            config.session.max_history.to_string(),
            &["HOMECAT_SESSION_MAX_HISTORY"][..],
            false,
        ),
        (
            "session.idle_timeout_secs",
            config.session.idle_timeout_secs.to_string(),
            &["HOMECAT_SESSION_IDLE_TIMEOUT_SECS"][..],
            false,
        ),
        (
            "session.sweep_interval_secs",
            config.session.sweep_interval_secs.to_string(),
            &["HOMECAT_SESSION_SWEEP_INTERVAL_SECS"][..],
            false,
        ),
        (
            "extraction.numeric_tie_break",
            config.extraction.numeric_tie_break.as_str().to_string(),
            &["HOMECAT_EXTRACTION_NUMERIC_TIE_BREAK"][..],
            false,
        ),
        (
            "extraction.bare_price_threshold",
            config.extraction.bare_price_threshold.to_string(),
            &["HOMECAT_EXTRACTION_BARE_PRICE_THRESHOLD"][..],
            false,
        ),
        (
            "extraction.bare_price_multiplier",
            config.extraction.bare_price_multiplier.to_string(),
            &["HOMECAT_EXTRACTION_BARE_PRICE_MULTIPLIER"][..],
            false,
        ),
        (
            "extraction.location_similarity_floor",
            config.extraction.location_similarity_floor.to_string(),
            &["HOMECAT_EXTRACTION_LOCATION_SIMILARITY_FLOOR"][..],
            false,
        ),
        (
            "intent.confirmation_threshold",
            config.intent.confirmation_threshold.to_string(),
            &["HOMECAT_INTENT_CONFIRMATION_THRESHOLD"][..],
            false,
        ),
        (
            "intent.indifference_threshold",
            config.intent.indifference_threshold.to_string(),
            &["HOMECAT_INTENT_INDIFFERENCE_THRESHOLD"][..],
            false,
        ),
        (
            "embedding.backend",
            config.embedding.backend.as_str().to_string(),
            &["HOMECAT_EMBEDDING_BACKEND"][..],
            false,
        ),
        (
            "embedding.model_dir",
            path_or_unset(config.embedding.model_dir.as_deref()),
            &["HOMECAT_EMBEDDING_MODEL_DIR"][..],
            options.overrides.embedding_model_dir.is_some(),
        ),
        (
            "llm.provider",
            config.llm.provider.as_str().to_string(),
            &["HOMECAT_LLM_PROVIDER"][..],
            options.overrides.llm_provider.is_some(),
        ),
        (
            "llm.model",
            config.llm.model.clone(),
            &["HOMECAT_LLM_MODEL"][..],
            options.overrides.llm_model.is_some(),
        ),
        (
            "llm.base_url",
            config.llm.base_url.clone(),
            &["HOMECAT_LLM_BASE_URL"][..],
            options.overrides.llm_base_url.is_some(),
        ),
        (
            "llm.api_key",
            redact_key(config.llm.api_key.as_ref().map(|key| key.expose_secret())),
            &["HOMECAT_LLM_API_KEY"][..],
            false,
        ),
        (
            "llm.timeout_secs",
            config.llm.timeout_secs.to_string(),
            &["HOMECAT_LLM_TIMEOUT_SECS"][..],
            false,
        ),
        (
            "llm.max_retries",
            config.llm.max_retries.to_string(),
            &["HOMECAT_LLM_MAX_RETRIES"][..],
            false,
        ),
        (
            "llm.prompt_template_path",
            path_or_unset(config.llm.prompt_template_path.as_deref()),
            &["HOMECAT_LLM_PROMPT_TEMPLATE_PATH"][..],
            false,
        ),
        (
            "catalog.path",
            path_or_unset(config.catalog.path.as_deref()),
            &["HOMECAT_CATALOG_PATH"][..],
            options.overrides.catalog_path.is_some(),
        ),
        (
            "gazetteer.path",
            path_or_unset(config.gazetteer.path.as_deref()),
            &["HOMECAT_GAZETTEER_PATH"][..],
            options.overrides.gazetteer_path.is_some(),
        ),
        (
            "listing.base_url",
            config.listing.base_url.clone(),
            &["HOMECAT_LISTING_BASE_URL"][..],
            false,
        ),
        (
            "logging.level",
            config.logging.level.clone(),
            &["HOMECAT_LOGGING_LEVEL", "HOMECAT_LOG_LEVEL"][..],
            options.overrides.log_level.is_some(),
        ),
        (
            "logging.format",
            config.logging.format.as_str().to_string(),
            &["HOMECAT_LOGGING_FORMAT", "HOMECAT_LOG_FORMAT"][..],
            options.overrides.log_format.is_some(),
        ),
    ];

    let mut lines =
        vec!["effective config (source precedence: flag > env > file > default):".to_string()];
    for (key, value, env_keys, overridden) in entries {
        lines.push(render_line(key, &value, source(key, env_keys, overridden)));
    }
    lines.join("\n")
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps a recognisable prefix such as `sk-` and hides the rest.
fn redact_key(key: Option<&str>) -> String {
    let Some(key) = key.map(str::trim) else {
        return "<unset>".to_string();
    };
    if key.is_empty() {
        return "<empty>".to_string();
    }
    if let Some((prefix, _)) = key.split_once('-') {
        return format!("{prefix}-***");
    }
    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use super::{contains_path, redact_key};

    #[test]
    fn keys_are_never_printed() {
        assert_eq!(redact_key(Some("sk-abc123")), "sk-***");
        assert_eq!(redact_key(Some("abc123")), "<redacted>");
        assert_eq!(redact_key(Some("  ")), "<empty>");
        assert_eq!(redact_key(None), "<unset>");
    }

    #[test]
    fn dotted_paths_walk_nested_tables() {
        let doc = "[llm]\nmodel = \"mistral\"\n".parse::<toml::Value>().unwrap();
        assert!(contains_path(&doc, "llm.model"));
        assert!(!contains_path(&doc, "llm.base_url"));
        assert!(!contains_path(&doc, "catalog.path"));
    }
}
