use std::sync::Arc;

use homecat_core::domain::slots::{SlotName, SlotValue};
use homecat_core::gazetteer::Gazetteer;

use crate::extraction::chain::{Detection, SlotStrategy, StrategyInput};

/// Longest run of tokens compared against the gazetteer.
pub const MAX_WINDOW: usize = 5;

/// Contiguous token windows, all one-token windows first, then two-token
/// windows, and so on up to [`MAX_WINDOW`].
pub fn token_windows(tokens: &[String]) -> Vec<String> {
    let mut windows = Vec::new();
    for size in 1..=MAX_WINDOW.min(tokens.len()) {
        for window in tokens.windows(size) {
            windows.push(window.join(" "));
        }
    }
    windows
}

/// Fuzzy match of token windows against the gazetteer. The first window
/// that clears the floor names the neighborhood and its city.
pub struct GazetteerWindowStrategy {
    gazetteer: Arc<Gazetteer>,
    floor: f64,
}

impl GazetteerWindowStrategy {
    pub fn new(gazetteer: Arc<Gazetteer>, floor: f64) -> Self {
        Self { gazetteer, floor }
    }
}

impl SlotStrategy for GazetteerWindowStrategy {
    fn name(&self) -> &'static str {
        "gazetteer_window"
    }

    fn detect(&self, input: &StrategyInput<'_>) -> Option<Detection> {
        for window in token_windows(&input.utterance.tokens) {
            let Some((entry, similarity)) = self.gazetteer.closest(&window, self.floor) else {
                continue;
            };

            let mut values = vec![(SlotName::Neighborhood, SlotValue::Text(entry.name.clone()))];
            if let Some(city) = &entry.city {
                values.push((SlotName::City, SlotValue::Text(city.clone())));
            }
            return Some(Detection {
                values,
                detail: Some(format!("{window} -> {} ({})", entry.name, entry.area)),
                similarity: Some(similarity as f32),
            });
        }
        None
    }
}

/// Plain substring search for the catalog's own city and neighborhood
/// names. Fills whichever of the two is still open.
#[derive(Debug, Default)]
pub struct CatalogSubstringStrategy;

impl SlotStrategy for CatalogSubstringStrategy {
    fn name(&self) -> &'static str {
        "catalog_substring"
    }

    fn detect(&self, input: &StrategyInput<'_>) -> Option<Detection> {
        if input.known.is_empty() {
            return None;
        }

        let haystack = &input.utterance.lowered;
        let find = |names: &[String]| {
            names.iter().find(|name| haystack.contains(&name.to_lowercase())).cloned()
        };

        let mut values = Vec::new();
        if !input.current.is_filled(SlotName::Neighborhood) {
            if let Some(name) = find(&input.known.neighborhoods) {
                values.push((SlotName::Neighborhood, SlotValue::Text(name)));
            }
        }
        if !input.current.is_filled(SlotName::City) {
            if let Some(name) = find(&input.known.cities) {
                values.push((SlotName::City, SlotValue::Text(name)));
            }
        }

        if values.is_empty() {
            None
        } else {
            Some(Detection { values, detail: None, similarity: None })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use homecat_core::domain::slots::{Slot, SlotName, SlotSet, SlotValue};
    use homecat_core::gazetteer::{Gazetteer, DEFAULT_CITY};

    use super::{token_windows, CatalogSubstringStrategy, GazetteerWindowStrategy};
    use crate::extraction::chain::{KnownLocations, SlotStrategy, StrategyInput, Utterance};

    fn values(
        strategy: &dyn SlotStrategy,
        text: &str,
        current: &SlotSet,
        known: &KnownLocations,
    ) -> Vec<(SlotName, SlotValue)> {
        let utterance = Utterance::new(text);
        strategy
            .detect(&StrategyInput { utterance: &utterance, current, known })
            .map(|detection| detection.values)
            .unwrap_or_default()
    }

    #[test]
    fn windows_are_ordered_by_size_then_position() {
        let tokens = ["a", "b", "c"].map(str::to_string);
        assert_eq!(token_windows(&tokens), vec!["a", "b", "c", "a b", "b c", "a b c"]);
        assert_eq!(token_windows(&vec!["x".to_string(); 8]).last().map(|w| w.len()), Some(9));
    }

    #[test]
    fn gazetteer_hit_sets_neighborhood_and_city() {
        let strategy = GazetteerWindowStrategy::new(Arc::new(Gazetteer::builtin()), 0.8);
        let found = values(
            &strategy,
            "Busco algo en el carmen, cerca al parque",
            &SlotSet::default(),
            &KnownLocations::default(),
        );

        assert_eq!(
            found,
            vec![
                (SlotName::Neighborhood, SlotValue::Text("El Carmen".to_string())),
                (SlotName::City, SlotValue::Text(DEFAULT_CITY.to_string())),
            ]
        );
    }

    #[test]
    fn gazetteer_ignores_unrelated_text() {
        let strategy = GazetteerWindowStrategy::new(Arc::new(Gazetteer::builtin()), 0.8);
        let found =
            values(&strategy, "quiero una casa grande", &SlotSet::default(), &KnownLocations::default());
        assert!(found.is_empty());
    }

    #[test]
    fn catalog_substring_fills_only_open_slots() {
        let known = KnownLocations::new(
            vec!["Tuluá".to_string()],
            vec!["Villa Colombia".to_string(), "Centro".to_string()],
        );
        let current =
            SlotSet { neighborhood: Slot::Value("Otro".to_string()), ..SlotSet::default() };

        let found =
            values(&CatalogSubstringStrategy, "algo en villa colombia de tuluá", &current, &known);
        assert_eq!(found, vec![(SlotName::City, SlotValue::Text("Tuluá".to_string()))]);

        let found =
            values(&CatalogSubstringStrategy, "villa colombia", &SlotSet::default(), &known);
        assert_eq!(
            found,
            vec![(SlotName::Neighborhood, SlotValue::Text("Villa Colombia".to_string()))]
        );
    }

    #[test]
    fn catalog_substring_without_known_names_is_silent() {
        let found = values(
            &CatalogSubstringStrategy,
            "tuluá",
            &SlotSet::default(),
            &KnownLocations::default(),
        );
        assert!(found.is_empty());
    }
}
