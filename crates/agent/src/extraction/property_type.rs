use std::sync::Arc;

use homecat_core::domain::slots::{PropertyType, SlotName, SlotValue};
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use tracing::{debug, warn};

use crate::embedding::{best_similarity, Embedder, EmbeddingError};
use crate::extraction::chain::{Detection, SlotStrategy, StrategyInput};

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("property type pattern must compile")
}

/// Keyword groups in detection priority order.
static TYPE_PATTERNS: Lazy<Vec<(PropertyType, Regex)>> = Lazy::new(|| {
    vec![
        (PropertyType::Farm, compile(r"\b(fincas?|finquitas?|granjas?|haciendas?|parcelas?|quintas?)\b")),
        (PropertyType::House, compile(r"\b(casas?|casitas?|viviendas?|hogar(es)?)\b")),
        (PropertyType::Apartment, compile(r"\b(apartamentos?|apartament(?:ic|it)[oa]s?|aptos?|departamentos?|deptos?)\b")),
        (PropertyType::Studio, compile(r"\b(apartaestudios?|estudios?|lofts?|monoambientes?)\b")),
        (PropertyType::Lot, compile(r"\b(lotes?|lotecitos?|terrenos?|solar(es)?)\b")),
        (
            PropertyType::Commercial,
            compile(r"\b(local(es)?( comercial(es)?)?|negocios?|tiendas?|almac[eé]n(es)?)\b"),
        ),
    ]
});

/// First property type whose keyword group matches the lowercased text.
pub fn detect_type_keywords(lowered: &str) -> Option<PropertyType> {
    TYPE_PATTERNS.iter().find(|(_, pattern)| pattern.is_match(lowered)).map(|(kind, _)| *kind)
}

#[derive(Debug, Default)]
pub struct TypeKeywordStrategy;

impl SlotStrategy for TypeKeywordStrategy {
    fn name(&self) -> &'static str {
        "type_keywords"
    }

    fn detect(&self, input: &StrategyInput<'_>) -> Option<Detection> {
        let kind = detect_type_keywords(&input.utterance.lowered)?;
        Some(Detection::single(SlotName::PropertyType, SlotValue::PropertyType(kind)))
    }
}

/// Compares the utterance with each type label and accepts the closest one
/// above the threshold.
pub struct TypeSemanticStrategy {
    embedder: Arc<dyn Embedder>,
    threshold: f32,
    labels: OnceCell<Vec<Vec<f32>>>,
}

impl TypeSemanticStrategy {
    pub fn new(embedder: Arc<dyn Embedder>, threshold: f32) -> Self {
        Self { embedder, threshold, labels: OnceCell::new() }
    }

    fn closest(&self, text: &str) -> Result<Option<(PropertyType, f32)>, EmbeddingError> {
        let labels = self.labels.get_or_try_init(|| {
            let labels = PropertyType::PRIORITY.iter().map(|kind| kind.label()).collect::<Vec<_>>();
            self.embedder.embed_batch(&labels)
        })?;
        let query = self.embedder.embed(text)?;
        Ok(best_similarity(&query, labels)?
            .map(|(index, similarity)| (PropertyType::PRIORITY[index], similarity)))
    }
}

impl SlotStrategy for TypeSemanticStrategy {
    fn name(&self) -> &'static str {
        "type_semantic"
    }

    fn detect(&self, input: &StrategyInput<'_>) -> Option<Detection> {
        match self.closest(&input.utterance.lowered) {
            Ok(Some((kind, similarity))) if similarity >= self.threshold => Some(
                Detection::single(SlotName::PropertyType, SlotValue::PropertyType(kind))
                    .with_similarity(similarity),
            ),
            Ok(best) => {
                debug!(
                    similarity = best.map(|(_, similarity)| similarity).unwrap_or(0.0),
                    threshold = self.threshold,
                    "no property type close enough"
                );
                None
            }
            Err(error) => {
                warn!(strategy = "type_semantic", %error, "property type embedding failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use homecat_core::domain::slots::{PropertyType, SlotSet, SlotValue};

    use super::{detect_type_keywords, TypeSemanticStrategy};
    use crate::embedding::fakes::{FailingEmbedder, ScriptedEmbedder};
    use crate::extraction::chain::{KnownLocations, SlotStrategy, StrategyInput, Utterance};

    #[test]
    fn keyword_groups_cover_synonyms_and_plurals() {
        assert_eq!(detect_type_keywords("busco un apto"), Some(PropertyType::Apartment));
        assert_eq!(detect_type_keywords("unas viviendas"), Some(PropertyType::House));
        assert_eq!(detect_type_keywords("un terreno plano"), Some(PropertyType::Lot));
        assert_eq!(detect_type_keywords("un local comercial"), Some(PropertyType::Commercial));
        assert_eq!(detect_type_keywords("un loft"), Some(PropertyType::Studio));
        assert_eq!(detect_type_keywords("quiero algo bonito"), None);
    }

    #[test]
    fn diminutives_name_the_same_type() {
        assert_eq!(detect_type_keywords("una casita"), Some(PropertyType::House));
        assert_eq!(detect_type_keywords("una finquita"), Some(PropertyType::Farm));
        assert_eq!(detect_type_keywords("un lotecito"), Some(PropertyType::Lot));
        assert_eq!(detect_type_keywords("un apartamentico"), Some(PropertyType::Apartment));
    }

    #[test]
    fn priority_order_breaks_overlaps() {
        assert_eq!(detect_type_keywords("una parcela"), Some(PropertyType::Farm));
        assert_eq!(detect_type_keywords("casa o apartamento"), Some(PropertyType::House));
        assert_eq!(detect_type_keywords("finca con casa"), Some(PropertyType::Farm));
    }

    #[test]
    fn keywords_need_word_boundaries() {
        assert_eq!(detect_type_keywords("casamiento"), None);
        assert_eq!(detect_type_keywords("localidad"), None);
    }

    fn detect(strategy: &TypeSemanticStrategy, text: &str) -> Option<SlotValue> {
        let utterance = Utterance::new(text);
        let current = SlotSet::default();
        let known = KnownLocations::default();
        strategy
            .detect(&StrategyInput { utterance: &utterance, current: &current, known: &known })
            .map(|detection| detection.values[0].1.clone())
    }

    #[test]
    fn semantic_fallback_accepts_only_above_threshold() {
        let embedder = ScriptedEmbedder::new(2)
            .with("Lote", vec![1.0, 0.0])
            .with("Casa", vec![0.0, 1.0])
            .with("un pedazo de tierra", vec![0.9, 0.1])
            .with("algo con jardín", vec![0.6, 0.8])
            .with("algo por ahí", vec![-0.8, 0.6]);
        let strategy = TypeSemanticStrategy::new(Arc::new(embedder), 0.7);

        assert_eq!(
            detect(&strategy, "un pedazo de tierra"),
            Some(SlotValue::PropertyType(PropertyType::Lot))
        );
        assert_eq!(
            detect(&strategy, "algo con jardín"),
            Some(SlotValue::PropertyType(PropertyType::House))
        );
        assert_eq!(detect(&strategy, "algo por ahí"), None);
        assert_eq!(detect(&strategy, "texto sin vector"), None);
    }

    #[test]
    fn label_embeddings_are_computed_once() {
        let embedder = Arc::new(ScriptedEmbedder::new(2));
        let strategy = TypeSemanticStrategy::new(embedder.clone(), 0.7);

        detect(&strategy, "uno");
        detect(&strategy, "dos");

        assert_eq!(embedder.calls(), PropertyType::PRIORITY.len() + 2);
    }

    #[test]
    fn embedding_failure_means_no_detection() {
        let strategy = TypeSemanticStrategy::new(Arc::new(FailingEmbedder), 0.7);
        assert_eq!(detect(&strategy, "una casa"), None);
    }
}
