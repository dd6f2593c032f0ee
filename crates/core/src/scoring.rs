//! Weighted additive matching of a slot set against catalog listings.

use tracing::{debug, info};

use crate::domain::property::Property;
use crate::domain::slots::{Slot, SlotSet};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScoreWeights {
    pub property_type: u32,
    pub neighborhood: u32,
    pub city: u32,
    pub price: u32,
    pub area: u32,
    pub bedrooms: u32,
    pub bathrooms: u32,
    pub parking: u32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            property_type: 5,
            neighborhood: 4,
            city: 3,
            price: 2,
            area: 2,
            bedrooms: 2,
            bathrooms: 1,
            parking: 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchOutcome<'a> {
    Found { candidate: &'a Property, index: usize, score: u32 },
    /// Candidates existed but none scored above zero.
    NoSuitableMatch { candidates: usize },
    NoCandidates,
}

impl<'a> MatchOutcome<'a> {
    pub fn candidate(&self) -> Option<&'a Property> {
        match self {
            Self::Found { candidate, .. } => Some(candidate),
            Self::NoSuitableMatch { .. } | Self::NoCandidates => None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct CandidateScorer {
    weights: ScoreWeights,
}

impl CandidateScorer {
    pub fn new(weights: ScoreWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> ScoreWeights {
        self.weights
    }

    /// Sum of the weights of every criterion the candidate satisfies.
    /// A criterion missing on either side contributes nothing.
    pub fn score(&self, slots: &SlotSet, candidate: &Property) -> u32 {
        let weights = &self.weights;
        let mut score = 0;

        if let (Slot::Value(wanted), Some(actual)) =
            (&slots.property_type, present(&candidate.property_type))
        {
            if wanted.label().to_lowercase() == actual.to_lowercase() {
                score += weights.property_type;
            }
        }
        if contains_text(&slots.neighborhood, &candidate.neighborhood) {
            score += weights.neighborhood;
        }
        if contains_text(&slots.city, &candidate.city) {
            score += weights.city;
        }
        if let (Slot::Value(budget), Some(price)) = (&slots.price, candidate.price) {
            if price > 0 && price <= *budget {
                score += weights.price;
            }
        }
        if at_least(&slots.area_m2, candidate.area_m2) {
            score += weights.area;
        }
        if at_least(&slots.bedrooms, candidate.bedrooms) {
            score += weights.bedrooms;
        }
        if at_least(&slots.bathrooms, candidate.bathrooms) {
            score += weights.bathrooms;
        }
        if at_least(&slots.parking, candidate.parking) {
            score += weights.parking;
        }

        score
    }

    /// Highest-scoring candidate. Equal scores keep input order.
    pub fn evaluate<'a>(&self, slots: &SlotSet, candidates: &'a [Property]) -> MatchOutcome<'a> {
        if candidates.is_empty() {
            debug!("no candidates to score");
            return MatchOutcome::NoCandidates;
        }

        let mut best: Option<(usize, u32)> = None;
        for (index, candidate) in candidates.iter().enumerate() {
            let score = self.score(slots, candidate);
            debug!(candidate = %candidate.title, score, "candidate scored");
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((index, score));
            }
        }

        match best {
            Some((index, score)) if score > 0 => {
                let candidate = &candidates[index];
                info!(
                    event_name = "scoring.match.found",
                    candidate = %candidate.title,
                    score,
                    "best match selected"
                );
                MatchOutcome::Found { candidate, index, score }
            }
            _ => {
                info!(candidates = candidates.len(), "no candidate matched the criteria");
                MatchOutcome::NoSuitableMatch { candidates: candidates.len() }
            }
        }
    }

    pub fn best_match<'a>(&self, slots: &SlotSet, candidates: &'a [Property]) -> Option<&'a Property> {
        self.evaluate(slots, candidates).candidate()
    }
}

/// [`CandidateScorer::best_match`] with the default weights.
pub fn best_match<'a>(slots: &SlotSet, candidates: &'a [Property]) -> Option<&'a Property> {
    CandidateScorer::default().best_match(slots, candidates)
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|text| !text.is_empty())
}

fn contains_text(wanted: &Slot<String>, actual: &Option<String>) -> bool {
    match (wanted, present(actual)) {
        (Slot::Value(wanted), Some(actual)) => {
            let wanted = wanted.trim().to_lowercase();
            !wanted.is_empty() && actual.to_lowercase().contains(&wanted)
        }
        _ => false,
    }
}

fn at_least(wanted: &Slot<u32>, actual: Option<u32>) -> bool {
    match (wanted, actual) {
        (Slot::Value(wanted), Some(actual)) => actual > 0 && actual >= *wanted,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{best_match, CandidateScorer, MatchOutcome, ScoreWeights};
    use crate::domain::property::{Property, PropertyId};
    use crate::domain::slots::{PropertyType, Slot, SlotSet};

    fn listing(id: &str, kind: &str, neighborhood: &str, city: &str) -> Property {
        Property {
            id: PropertyId(id.to_string()),
            title: format!("Listing {id}"),
            slug: Some(id.to_string()),
            property_type: Some(kind.to_string()),
            price: Some(300_000_000),
            neighborhood: Some(neighborhood.to_string()),
            city: Some(city.to_string()),
            area_m2: Some(120),
            bedrooms: Some(3),
            bathrooms: Some(2),
            parking: Some(1),
            images: Vec::new(),
        }
    }

    fn house_in_carmen() -> SlotSet {
        SlotSet {
            property_type: Slot::Value(PropertyType::House),
            neighborhood: Slot::Value("El Carmen".to_string()),
            city: Slot::Value("Buga".to_string()),
            bedrooms: Slot::Value(3),
            ..SlotSet::default()
        }
    }

    #[test]
    fn full_match_sums_every_satisfied_weight() {
        let scorer = CandidateScorer::default();
        let slots = SlotSet {
            price: Slot::Value(350_000_000),
            area_m2: Slot::Value(100),
            bathrooms: Slot::Value(2),
            parking: Slot::Value(1),
            ..house_in_carmen()
        };
        let candidate = listing("a", "casa", "Barrio El Carmen", "Guadalajara de Buga");

        assert_eq!(scorer.score(&slots, &candidate), 5 + 4 + 3 + 2 + 2 + 2 + 1 + 1);
    }

    #[test]
    fn type_outweighs_neighborhood_which_outweighs_city() {
        let weights = ScoreWeights::default();
        assert!(weights.property_type > weights.neighborhood);
        assert!(weights.neighborhood > weights.city);
        assert!(weights.city > weights.price);
    }

    #[test]
    fn missing_values_contribute_zero_never_negative() {
        let scorer = CandidateScorer::default();
        let mut candidate = listing("a", "Casa", "El Carmen", "Buga");
        candidate.bedrooms = None;
        candidate.price = None;

        let slots = SlotSet {
            price: Slot::Value(1),
            bedrooms: Slot::Value(2),
            city: Slot::NoPreference,
            ..SlotSet::default()
        };
        assert_eq!(scorer.score(&slots, &candidate), 0);
    }

    #[test]
    fn price_above_budget_and_smaller_counts_do_not_score() {
        let scorer = CandidateScorer::default();
        let candidate = listing("a", "Lote", "Sucre", "Buga");
        let slots = SlotSet {
            price: Slot::Value(100_000_000),
            bedrooms: Slot::Value(5),
            area_m2: Slot::Value(500),
            ..SlotSet::default()
        };
        assert_eq!(scorer.score(&slots, &candidate), 0);
    }

    #[test]
    fn equal_scores_keep_input_order() {
        let candidates = vec![
            listing("first", "Casa", "El Carmen", "Buga"),
            listing("second", "Casa", "El Carmen", "Buga"),
        ];

        let outcome = CandidateScorer::default().evaluate(&house_in_carmen(), &candidates);

        assert!(matches!(outcome, MatchOutcome::Found { index: 0, .. }));
        assert_eq!(best_match(&house_in_carmen(), &candidates).unwrap().id.0, "first");
    }

    #[test]
    fn higher_score_wins_regardless_of_position() {
        let candidates = vec![
            listing("apartment", "Apartamento", "Sucre", "Tuluá"),
            listing("house", "Casa", "El Carmen", "Buga"),
        ];

        let best = best_match(&house_in_carmen(), &candidates).unwrap();
        assert_eq!(best.id.0, "house");
    }

    #[test]
    fn zero_scores_and_empty_input_are_distinguished() {
        let scorer = CandidateScorer::default();
        let candidates = vec![listing("a", "Finca", "La María", "Cali")];
        let slots = SlotSet {
            property_type: Slot::Value(PropertyType::Commercial),
            ..SlotSet::default()
        };

        assert_eq!(
            scorer.evaluate(&slots, &candidates),
            MatchOutcome::NoSuitableMatch { candidates: 1 }
        );
        assert_eq!(scorer.evaluate(&slots, &[]), MatchOutcome::NoCandidates);
    }
}
