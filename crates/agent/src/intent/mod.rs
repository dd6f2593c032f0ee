//! Confirmation and indifference detection.
//!
//! Each intent is the OR of two detectors: hand-written patterns and
//! similarity to a curated exemplar list. Classification never mutates
//! anything and never fails; embedding errors read as "not detected".

pub mod exemplars;
pub mod patterns;

use std::sync::Arc;

use homecat_core::config::IntentConfig;
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::embedding::{best_similarity, Embedder, EmbeddingError};
pub use exemplars::EXEMPLAR_CORPUS_VERSION;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Confirmation,
    Indifference,
}

impl Intent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Confirmation => "confirmation",
            Self::Indifference => "indifference",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionSource {
    Pattern,
    Semantic,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct IntentVerdict {
    pub intent: Intent,
    pub detected: bool,
    pub source: Option<DetectionSource>,
    /// Best exemplar similarity, when the semantic detector ran.
    pub similarity: Option<f32>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IntentSettings {
    pub confirmation_threshold: f32,
    pub indifference_threshold: f32,
}

impl Default for IntentSettings {
    fn default() -> Self {
        Self { confirmation_threshold: 0.70, indifference_threshold: 0.65 }
    }
}

impl From<&IntentConfig> for IntentSettings {
    fn from(config: &IntentConfig) -> Self {
        Self {
            confirmation_threshold: config.confirmation_threshold,
            indifference_threshold: config.indifference_threshold,
        }
    }
}

struct ExemplarVectors {
    version: &'static str,
    vectors: Vec<Vec<f32>>,
}

struct Detector {
    intent: Intent,
    patterns: &'static Lazy<Vec<Regex>>,
    exemplars: &'static [&'static str],
    threshold: f32,
    cache: OnceCell<ExemplarVectors>,
}

impl Detector {
    fn new(
        intent: Intent,
        patterns: &'static Lazy<Vec<Regex>>,
        exemplars: &'static [&'static str],
        threshold: f32,
    ) -> Self {
        Self { intent, patterns, exemplars, threshold, cache: OnceCell::new() }
    }

    fn exemplar_vectors(&self, embedder: &dyn Embedder) -> Result<&ExemplarVectors, EmbeddingError> {
        self.cache.get_or_try_init(|| {
            let vectors = embedder.embed_batch(self.exemplars)?;
            debug!(
                intent = self.intent.as_str(),
                version = EXEMPLAR_CORPUS_VERSION,
                exemplars = vectors.len(),
                "exemplar embeddings cached"
            );
            Ok(ExemplarVectors { version: EXEMPLAR_CORPUS_VERSION, vectors })
        })
    }

    fn similarity(&self, embedder: &dyn Embedder, text: &str) -> Result<f32, EmbeddingError> {
        let cached = self.exemplar_vectors(embedder)?;
        debug_assert_eq!(cached.version, EXEMPLAR_CORPUS_VERSION);
        let query = embedder.embed(text)?;
        Ok(best_similarity(&query, &cached.vectors)?.map_or(0.0, |(_, similarity)| similarity))
    }

    fn evaluate(&self, embedder: &dyn Embedder, utterance: &str) -> IntentVerdict {
        let lowered = utterance.trim().to_lowercase();
        let mut verdict =
            IntentVerdict { intent: self.intent, detected: false, source: None, similarity: None };

        if patterns::any_match(self.patterns, &lowered) {
            verdict.detected = true;
            verdict.source = Some(DetectionSource::Pattern);
            return verdict;
        }

        match self.similarity(embedder, &lowered) {
            Ok(similarity) => {
                verdict.similarity = Some(similarity);
                if similarity >= self.threshold {
                    verdict.detected = true;
                    verdict.source = Some(DetectionSource::Semantic);
                }
            }
            Err(error) => {
                warn!(intent = self.intent.as_str(), %error, "intent embedding failed");
            }
        }
        verdict
    }
}

pub struct IntentClassifier {
    embedder: Arc<dyn Embedder>,
    confirmation: Detector,
    indifference: Detector,
}

impl IntentClassifier {
    pub fn new(embedder: Arc<dyn Embedder>, settings: IntentSettings) -> Self {
        Self {
            embedder,
            confirmation: Detector::new(
                Intent::Confirmation,
                &patterns::CONFIRMATION,
                exemplars::CONFIRMATION,
                settings.confirmation_threshold,
            ),
            indifference: Detector::new(
                Intent::Indifference,
                &patterns::INDIFFERENCE,
                exemplars::INDIFFERENCE,
                settings.indifference_threshold,
            ),
        }
    }

    fn detector(&self, intent: Intent) -> &Detector {
        match intent {
            Intent::Confirmation => &self.confirmation,
            Intent::Indifference => &self.indifference,
        }
    }

    pub fn evaluate(&self, intent: Intent, utterance: &str) -> IntentVerdict {
        let verdict = self.detector(intent).evaluate(self.embedder.as_ref(), utterance);
        debug!(
            intent = intent.as_str(),
            detected = verdict.detected,
            source = ?verdict.source,
            similarity = verdict.similarity.unwrap_or(0.0),
            "intent evaluated"
        );
        verdict
    }

    pub fn classify_confirmation(&self, utterance: &str) -> bool {
        self.evaluate(Intent::Confirmation, utterance).detected
    }

    pub fn classify_indifference(&self, utterance: &str) -> bool {
        self.evaluate(Intent::Indifference, utterance).detected
    }

    /// Embeds both exemplar lists ahead of the first message.
    pub fn warm_up(&self) -> Result<usize, EmbeddingError> {
        let confirmation = self.confirmation.exemplar_vectors(self.embedder.as_ref())?;
        let indifference = self.indifference.exemplar_vectors(self.embedder.as_ref())?;
        Ok(confirmation.vectors.len() + indifference.vectors.len())
    }
}
