use std::fs;
use std::path::Path;
use std::sync::Arc;

use homecat_core::catalog::{Catalog, InMemoryCatalog};
use homecat_core::config::{AppConfig, EmbeddingBackend, EmbeddingConfig};
use homecat_core::domain::slots::SlotSet;
use homecat_core::errors::ApplicationError;
use homecat_core::gazetteer::Gazetteer;
use homecat_core::session::SessionStore;
use tracing::{info, warn};

use crate::conversation::{DialogueEngine, TurnReply};
#[cfg(feature = "onnx")]
use crate::embedding::OnnxEmbedder;
use crate::embedding::{Embedder, HashingEmbedder};
use crate::extraction::{ExtractionSettings, SlotExtractor};
use crate::intent::{IntentClassifier, IntentSettings};
use crate::llm::{CompletionService, HttpCompletion};
use crate::prompt::DEFAULT_TEMPLATE;

/// Everything one process needs to answer messages, wired from [`AppConfig`].
pub struct AgentRuntime {
    pub store: Arc<SessionStore>,
    pub extractor: Arc<SlotExtractor>,
    pub classifier: Arc<IntentClassifier>,
    pub catalog: Arc<dyn Catalog>,
    engine: DialogueEngine,
}

impl AgentRuntime {
    /// Runtime talking to the configured completion backend.
    pub fn from_config(config: &AppConfig) -> Result<Self, ApplicationError> {
        let template = load_template(config.llm.prompt_template_path.as_deref())?;
        let completion = HttpCompletion::new(&config.llm, template)
            .map_err(|error| ApplicationError::Completion(format!("{error:#}")))?;
        Self::with_completion(config, Arc::new(completion))
    }

    pub fn with_completion(
        config: &AppConfig,
        completion: Arc<dyn CompletionService>,
    ) -> Result<Self, ApplicationError> {
        info!(
            event_name = "system.bootstrap.start",
            correlation_id = "bootstrap",
            provider = config.llm.provider.as_str(),
            "building agent runtime"
        );

        let catalog: Arc<dyn Catalog> = match &config.catalog.path {
            Some(path) => Arc::new(InMemoryCatalog::load(path)?),
            None => Arc::new(InMemoryCatalog::default()),
        };
        let gazetteer = match &config.gazetteer.path {
            Some(path) => Gazetteer::load(path)?,
            None => Gazetteer::builtin(),
        };

        let embedder = build_embedder(&config.embedding)?;
        let extractor = Arc::new(SlotExtractor::new(
            Arc::new(gazetteer),
            embedder.clone(),
            ExtractionSettings::from(&config.extraction),
        ));
        let classifier =
            Arc::new(IntentClassifier::new(embedder, IntentSettings::from(&config.intent)));
        let store = Arc::new(SessionStore::new(config.session.settings()));

        let engine = DialogueEngine::new(
            store.clone(),
            extractor.clone(),
            classifier.clone(),
            catalog.clone(),
            completion,
            config.listing.base_url.clone(),
        );

        info!(
            event_name = "system.bootstrap.ready",
            correlation_id = "bootstrap",
            listings = catalog.listings().map(|listings| listings.len()).unwrap_or(0),
            "agent runtime ready"
        );
        Ok(Self { store, extractor, classifier, catalog, engine })
    }

    pub async fn handle_turn(&self, session_id: &str, message: &str) -> TurnReply {
        self.engine.handle_turn(session_id, message).await
    }

    pub fn extract(&self, message: &str, current: &SlotSet) -> SlotSet {
        self.engine.extract(message, current)
    }

    pub fn engine(&self) -> &DialogueEngine {
        &self.engine
    }
}

/// Embedder selected by `[embedding]`.
///
/// `auto` loads the ONNX model when a directory is configured and falls back
/// to [`HashingEmbedder`] when there is none or it fails to load.
pub fn build_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>, ApplicationError> {
    match (config.backend, config.model_dir.as_deref()) {
        (EmbeddingBackend::Onnx, Some(dir)) => load_model(dir),
        (EmbeddingBackend::Onnx, None) => Err(ApplicationError::Configuration(
            "embedding.model_dir is required for the onnx backend".to_string(),
        )),
        (EmbeddingBackend::Auto, Some(dir)) => load_model(dir).or_else(|error| {
            warn!(
                event_name = "system.bootstrap.embedding_fallback",
                model_dir = %dir.display(),
                %error,
                "embedding model unavailable, using hashing embedder"
            );
            Ok(hashing_embedder())
        }),
        (EmbeddingBackend::Auto, None) | (EmbeddingBackend::Hashing, _) => Ok(hashing_embedder()),
    }
}

fn hashing_embedder() -> Arc<dyn Embedder> {
    info!(backend = "hashing", "using hashing embedder");
    Arc::new(HashingEmbedder::default())
}

#[cfg(feature = "onnx")]
fn load_model(dir: &Path) -> Result<Arc<dyn Embedder>, ApplicationError> {
    let embedder = OnnxEmbedder::from_directory(dir).map_err(|error| {
        ApplicationError::Configuration(format!(
            "could not load embedding model from `{}`: {error}",
            dir.display()
        ))
    })?;
    info!(backend = "onnx", dimensions = embedder.dimensions(), "using onnx embedder");
    Ok(Arc::new(embedder))
}

#[cfg(not(feature = "onnx"))]
fn load_model(dir: &Path) -> Result<Arc<dyn Embedder>, ApplicationError> {
    Err(ApplicationError::Configuration(format!(
        "embedding model `{}` needs a build with the `onnx` feature",
        dir.display()
    )))
}

/// Prompt template from disk, or the built-in one when no path is set.
pub fn load_template(path: Option<&Path>) -> Result<String, ApplicationError> {
    let Some(path) = path else {
        return Ok(DEFAULT_TEMPLATE.to_string());
    };
    let raw = fs::read_to_string(path).map_err(|error| {
        ApplicationError::Configuration(format!(
            "could not read prompt template `{}`: {error}",
            path.display()
        ))
    })?;
    if raw.trim().is_empty() {
        return Err(ApplicationError::Configuration(format!(
            "prompt template `{}` is empty",
            path.display()
        )));
    }
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::Arc;

    use homecat_core::config::{AppConfig, EmbeddingBackend, EmbeddingConfig};
    use homecat_core::errors::ApplicationError;

    use super::{build_embedder, load_template, AgentRuntime};
    use crate::embedding::{Embedder, DEFAULT_DIMENSIONS};
    use crate::conversation::TurnOutcome;
    use crate::llm::ScriptedCompletion;
    use crate::prompt::DEFAULT_TEMPLATE;

    #[test]
    fn template_defaults_and_rejects_missing_or_empty_files() {
        assert_eq!(load_template(None).unwrap(), DEFAULT_TEMPLATE);

        let missing = load_template(Some(PathBuf::from("/nonexistent/prompt.txt").as_path()));
        assert!(matches!(missing, Err(ApplicationError::Configuration(_))));

        let mut empty = tempfile::NamedTempFile::new().unwrap();
        writeln!(empty, "   ").unwrap();
        assert!(load_template(Some(empty.path())).is_err());
    }

    #[test]
    fn embedder_follows_the_configured_backend() {
        let fallback = build_embedder(&EmbeddingConfig::default()).unwrap();
        assert_eq!(fallback.dimensions(), DEFAULT_DIMENSIONS);

        let missing_model = EmbeddingConfig {
            backend: EmbeddingBackend::Auto,
            model_dir: Some(PathBuf::from("/nonexistent/minilm")),
        };
        assert_eq!(build_embedder(&missing_model).unwrap().dimensions(), DEFAULT_DIMENSIONS);

        let required = EmbeddingConfig { backend: EmbeddingBackend::Onnx, ..missing_model.clone() };
        assert!(matches!(build_embedder(&required), Err(ApplicationError::Configuration(_))));

        let unset = EmbeddingConfig { backend: EmbeddingBackend::Onnx, model_dir: None };
        assert!(matches!(build_embedder(&unset), Err(ApplicationError::Configuration(_))));
    }

    #[test]
    fn unloadable_model_fails_the_runtime_when_onnx_is_required() {
        let mut config = AppConfig::default();
        config.embedding.backend = EmbeddingBackend::Onnx;
        config.embedding.model_dir = Some(PathBuf::from("/nonexistent/minilm"));

        let result = AgentRuntime::with_completion(&config, Arc::new(ScriptedCompletion::default()));
        assert!(matches!(result, Err(ApplicationError::Configuration(_))));
    }

    #[test]
    fn missing_catalog_file_is_a_catalog_error() {
        let mut config = AppConfig::default();
        config.catalog.path = Some(PathBuf::from("/nonexistent/listings.json"));

        let result = AgentRuntime::with_completion(&config, Arc::new(ScriptedCompletion::default()));
        assert!(matches!(result, Err(ApplicationError::Catalog(_))));
    }

    #[tokio::test]
    async fn default_config_runs_a_turn_without_a_catalog() {
        let runtime = AgentRuntime::with_completion(
            &AppConfig::default(),
            Arc::new(ScriptedCompletion::new(["¡Hola!"])),
        )
        .unwrap();

        let reply = runtime.handle_turn("s1", "hola, busco casa en el carmen").await;
        assert_eq!(reply.outcome, TurnOutcome::Conversation);
        assert_eq!(reply.text, "¡Hola!");
        assert!(runtime.store.get_slots("s1").property_type.has_value());
        assert_eq!(runtime.store.list_sessions(), vec!["s1".to_string()]);
    }
}
