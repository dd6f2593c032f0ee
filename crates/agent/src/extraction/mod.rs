//! Slot extraction from one user utterance.
//!
//! Each slot group is an ordered [`StrategyChain`]: keyword patterns first,
//! then fuzzy and semantic fallbacks. Extraction never clears a slot and only
//! the price chain replaces a value that is already set.

pub mod chain;
pub mod location;
pub mod numeric;
pub mod price;
pub mod property_type;

use std::sync::Arc;

use homecat_core::config::{ExtractionConfig, NumericTieBreak};
use homecat_core::domain::slots::{SlotName, SlotSet};
use homecat_core::gazetteer::Gazetteer;
use tracing::{debug, warn};

use crate::embedding::Embedder;
use chain::{KnownLocations, StrategyChain, StrategyInput, Utterance};
use location::{CatalogSubstringStrategy, GazetteerWindowStrategy};
use numeric::CountStrategy;
use price::{PriceParser, PriceSettings, PriceStrategy};
use property_type::{TypeKeywordStrategy, TypeSemanticStrategy};

#[derive(Clone, Debug, PartialEq)]
pub struct ExtractionSettings {
    pub numeric_tie_break: NumericTieBreak,
    pub price: PriceSettings,
    pub location_similarity_floor: f64,
    pub type_semantic_threshold: f32,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            numeric_tie_break: NumericTieBreak::Max,
            price: PriceSettings::default(),
            location_similarity_floor: 0.8,
            type_semantic_threshold: 0.7,
        }
    }
}

impl From<&ExtractionConfig> for ExtractionSettings {
    fn from(config: &ExtractionConfig) -> Self {
        Self {
            numeric_tie_break: config.numeric_tie_break,
            price: PriceSettings {
                bare_threshold: config.bare_price_threshold,
                bare_multiplier: config.bare_price_multiplier,
                unit_similarity_floor: config.unit_similarity_floor,
                unit_semantic_threshold: config.unit_semantic_threshold,
            },
            location_similarity_floor: config.location_similarity_floor,
            type_semantic_threshold: config.type_semantic_threshold,
        }
    }
}

pub struct SlotExtractor {
    chains: Vec<StrategyChain>,
    price: Arc<PriceParser>,
}

impl SlotExtractor {
    pub fn new(
        gazetteer: Arc<Gazetteer>,
        embedder: Arc<dyn Embedder>,
        settings: ExtractionSettings,
    ) -> Self {
        let tie_break = settings.numeric_tie_break;
        let price = Arc::new(PriceParser::new(settings.price).with_embedder(embedder.clone()));

        let chains = vec![
            StrategyChain::new([SlotName::PropertyType]).then(TypeKeywordStrategy),
            StrategyChain::new([SlotName::Bedrooms])
                .then(CountStrategy::new(SlotName::Bedrooms, tie_break)),
            StrategyChain::new([SlotName::Bathrooms])
                .then(CountStrategy::new(SlotName::Bathrooms, tie_break)),
            StrategyChain::new([SlotName::Parking])
                .then(CountStrategy::new(SlotName::Parking, tie_break)),
            StrategyChain::new([SlotName::AreaM2])
                .then(CountStrategy::new(SlotName::AreaM2, tie_break)),
            StrategyChain::new([SlotName::Price])
                .overwriting()
                .then(PriceStrategy::new(price.clone())),
            StrategyChain::new([SlotName::Neighborhood, SlotName::City])
                .then(GazetteerWindowStrategy::new(gazetteer, settings.location_similarity_floor))
                .then(CatalogSubstringStrategy),
            StrategyChain::new([SlotName::PropertyType])
                .then(TypeSemanticStrategy::new(embedder, settings.type_semantic_threshold)),
        ];

        Self { chains, price }
    }

    /// Extraction without catalog location names.
    pub fn extract(&self, utterance: &str, current: &SlotSet) -> SlotSet {
        self.extract_with_locations(utterance, current, &KnownLocations::default())
    }

    /// Runs every chain over the utterance and returns the updated copy of
    /// `current`. The input is never modified.
    pub fn extract_with_locations(
        &self,
        utterance: &str,
        current: &SlotSet,
        known: &KnownLocations,
    ) -> SlotSet {
        let parsed = Utterance::new(utterance);
        let mut slots = current.clone();
        let mut changed = Vec::new();

        for chain in &self.chains {
            let snapshot = slots.clone();
            let input = StrategyInput { utterance: &parsed, current: &snapshot, known };
            changed.extend(chain.run(&input, &mut slots));
        }

        if changed.is_empty() {
            warn!(utterance_chars = utterance.chars().count(), "utterance changed no slot");
        } else {
            debug!(
                changed = ?changed.iter().map(|name| name.as_str()).collect::<Vec<_>>(),
                "slots extracted"
            );
        }
        slots
    }

    /// First price expression in `text`, unranked.
    pub fn parse_price(&self, text: &str) -> Option<u64> {
        self.price.parse(text)
    }

    pub fn chain_summary(&self) -> Vec<(Vec<&'static str>, Vec<&'static str>)> {
        self.chains
            .iter()
            .map(|chain| {
                (
                    chain.targets().iter().map(|name| name.as_str()).collect(),
                    chain.strategy_names(),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use homecat_core::config::NumericTieBreak;
    use homecat_core::domain::slots::{PropertyType, Slot, SlotSet};
    use homecat_core::gazetteer::{Gazetteer, DEFAULT_CITY};

    use super::{ExtractionSettings, SlotExtractor};
    use crate::embedding::fakes::FailingEmbedder;
    use crate::embedding::HashingEmbedder;
    use crate::extraction::chain::KnownLocations;

    fn extractor() -> SlotExtractor {
        SlotExtractor::new(
            Arc::new(Gazetteer::builtin()),
            Arc::new(HashingEmbedder::default()),
            ExtractionSettings::default(),
        )
    }

    #[test]
    fn full_request_fills_every_mentioned_slot() {
        let slots = extractor().extract(
            "Busco una casa en El Carmen con 3 habitaciones, 2 baños, 1 parqueadero, \
             120 m2 y presupuesto de 450 millones",
            &SlotSet::default(),
        );

        assert_eq!(slots.property_type, Slot::Value(PropertyType::House));
        assert_eq!(slots.neighborhood, Slot::Value("El Carmen".to_string()));
        assert_eq!(slots.city, Slot::Value(DEFAULT_CITY.to_string()));
        assert_eq!(slots.bedrooms, Slot::Value(3));
        assert_eq!(slots.bathrooms, Slot::Value(2));
        assert_eq!(slots.parking, Slot::Value(1));
        assert_eq!(slots.area_m2, Slot::Value(120));
        assert_eq!(slots.price, Slot::Value(450_000_000));
        assert!(slots.is_complete());
    }

    #[test]
    fn extraction_is_idempotent() {
        let extractor = extractor();
        let text = "apartamento de 2 habitaciones en San José por 900 mil mensuales";

        let once = extractor.extract(text, &SlotSet::default());
        let twice = extractor.extract(text, &once);
        assert_eq!(once, twice);
        assert!(once.diff(&twice).is_empty());
    }

    #[test]
    fn unrelated_utterances_never_unset_slots() {
        let extractor = extractor();
        let filled = extractor.extract("un lote en la magdalena de 500 m2", &SlotSet::default());
        assert!(filled.property_type.has_value());

        for text in ["gracias", "no sé", "¿me puedes ayudar?", ""] {
            let after = extractor.extract(text, &filled);
            assert_eq!(after, filled, "`{text}` changed the slots");
        }
    }

    #[test]
    fn existing_values_are_kept_but_price_is_replaced() {
        let current = SlotSet {
            bedrooms: Slot::Value(4),
            price: Slot::Value(300_000_000),
            ..SlotSet::default()
        };

        let slots = extractor().extract("mejor 2 habitaciones y hasta 250 millones", &current);
        assert_eq!(slots.bedrooms, Slot::Value(4));
        assert_eq!(slots.price, Slot::Value(250_000_000));
    }

    #[test]
    fn no_preference_counts_as_filled() {
        let current = SlotSet { neighborhood: Slot::NoPreference, ..SlotSet::default() };
        let slots = extractor().extract("en el carmen", &current);

        assert_eq!(slots.neighborhood, Slot::NoPreference);
        assert_eq!(slots.city, Slot::Value(DEFAULT_CITY.to_string()));
    }

    #[test]
    fn catalog_names_are_used_when_gazetteer_misses() {
        let known = KnownLocations::new(vec!["Tuluá".to_string()], Vec::new());
        let slots =
            extractor().extract_with_locations("algo en Tuluá", &SlotSet::default(), &known);
        assert_eq!(slots.city, Slot::Value("Tuluá".to_string()));
        assert!(slots.neighborhood.is_unset());
    }

    #[test]
    fn tie_break_setting_reaches_numeric_chains() {
        let extractor = SlotExtractor::new(
            Arc::new(Gazetteer::builtin()),
            Arc::new(HashingEmbedder::default()),
            ExtractionSettings { numeric_tie_break: NumericTieBreak::Last, ..Default::default() },
        );
        let slots = extractor.extract("4 habitaciones, no, 3 habitaciones", &SlotSet::default());
        assert_eq!(slots.bedrooms, Slot::Value(3));
    }

    #[test]
    fn embedding_failures_leave_keyword_results_intact() {
        let extractor = SlotExtractor::new(
            Arc::new(Gazetteer::builtin()),
            Arc::new(FailingEmbedder),
            ExtractionSettings::default(),
        );
        let slots = extractor.extract("una finca de 3 habitaciones", &SlotSet::default());
        assert_eq!(slots.property_type, Slot::Value(PropertyType::Farm));
        assert_eq!(slots.bedrooms, Slot::Value(3));
        assert_eq!(extractor.parse_price("500 mil"), Some(500_000));
    }

    #[test]
    fn chains_run_in_documented_order() {
        let summary = extractor().chain_summary();
        assert_eq!(summary.first().map(|(_, names)| names.clone()), Some(vec!["type_keywords"]));
        assert_eq!(summary.last().map(|(_, names)| names.clone()), Some(vec!["type_semantic"]));
    }
}
