//! Price mentions such as "500 mil", "2.5 millones", "$1.200.000" or a bare
//! "800" (read as millions).

use std::sync::Arc;

use homecat_core::domain::slots::{SlotName, SlotValue};
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use tracing::{debug, warn};

use crate::embedding::{best_similarity, Embedder, EmbeddingError};
use crate::extraction::chain::{Detection, SlotStrategy, StrategyInput};

static PRICE_EXPRESSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\$\s?)?\b(\d+(?:[.,]\d+)*)(?:\s*(k\s?cop|[a-záéíóúñ²][a-záéíóúñ0-9²]*))?")
        .expect("price pattern must compile")
});

/// Words after a number that make it something other than a price.
static NOT_A_PRICE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(m2|m²|mt|mts|mtr|metro|habitaci|cuarto|alcoba|dormitorio|bañ|ban|sanitario|garaje|parqueadero|parqueo|carro|auto|veh[ií]culo|puesto|piso|nivel|a[ñn]o|mes|semana|d[ií]a|hora|minuto|cuadra|km|kil[oó]metro)",
    )
    .expect("non-price pattern must compile")
});

/// Canonical unit spellings and their multipliers.
const UNITS: &[(&str, u64)] = &[
    ("millones", 1_000_000),
    ("millón", 1_000_000),
    ("millon", 1_000_000),
    ("m", 1_000_000),
    ("mil", 1_000),
    ("k", 1_000),
    ("kcop", 1_000),
    ("cop", 1),
    ("pesos", 1),
];

const CONTEXT_WORDS: &[&str] = &[
    "cueste",
    "cuesta",
    "cuestan",
    "vale",
    "valor",
    "precio",
    "presupuesto",
    "costo",
    "pagar",
    "pago",
    "arriendo",
    "alquiler",
    "venta",
    "mensual",
    "mensuales",
    "mensualmente",
    "por",
    "mes",
    "hasta",
    "máximo",
    "maximo",
];

/// How many tokens before a price expression are searched for context words.
const CONTEXT_WINDOW: usize = 3;

#[derive(Clone, Debug, PartialEq)]
pub struct PriceSettings {
    pub bare_threshold: u64,
    pub bare_multiplier: u64,
    pub unit_similarity_floor: f64,
    pub unit_semantic_threshold: f32,
}

impl Default for PriceSettings {
    fn default() -> Self {
        Self {
            bare_threshold: 10_000,
            bare_multiplier: 1_000_000,
            unit_similarity_floor: 0.75,
            unit_semantic_threshold: 0.6,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitSource {
    Exact,
    Fuzzy,
    Semantic,
    Symbol,
    Bare,
}

impl UnitSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Fuzzy => "fuzzy",
            Self::Semantic => "semantic",
            Self::Symbol => "symbol",
            Self::Bare => "bare",
        }
    }
}

/// One parsed price expression with its ranking score.
#[derive(Clone, Debug, PartialEq)]
pub struct PriceCandidate {
    pub amount: u64,
    pub expression: String,
    pub unit: UnitSource,
    pub score: u8,
}

pub struct PriceParser {
    settings: PriceSettings,
    embedder: Option<Arc<dyn Embedder>>,
    unit_vectors: OnceCell<Vec<Vec<f32>>>,
}

impl Default for PriceParser {
    fn default() -> Self {
        Self::new(PriceSettings::default())
    }
}

impl PriceParser {
    pub fn new(settings: PriceSettings) -> Self {
        Self { settings, embedder: None, unit_vectors: OnceCell::new() }
    }

    /// Enables the semantic fallback for unit words no spelling rule catches.
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn settings(&self) -> &PriceSettings {
        &self.settings
    }

    /// Amount of the first price expression in `text`, without ranking.
    pub fn parse(&self, text: &str) -> Option<u64> {
        self.candidates(&text.to_lowercase()).into_iter().next().map(|candidate| candidate.amount)
    }

    /// Highest-scoring price in the utterance. Earlier expressions win ties
    /// and a candidate needs a unit or context word to count.
    pub fn best_in(&self, lowered: &str) -> Option<PriceCandidate> {
        let mut best: Option<PriceCandidate> = None;
        for candidate in self.candidates(lowered) {
            if best.as_ref().map_or(true, |current| candidate.score > current.score) {
                best = Some(candidate);
            }
        }

        match best {
            Some(candidate) if candidate.score >= 1 => Some(candidate),
            Some(candidate) => {
                debug!(
                    expression = %candidate.expression,
                    "number without price unit or context ignored"
                );
                None
            }
            None => None,
        }
    }

    /// Every parseable price expression in text order.
    pub fn candidates(&self, lowered: &str) -> Vec<PriceCandidate> {
        let mut found = Vec::new();
        for captures in PRICE_EXPRESSION.captures_iter(lowered) {
            let Some(whole) = captures.get(0) else {
                continue;
            };
            let Some(number) = captures.get(2) else {
                continue;
            };
            let symbol = captures.get(1).is_some();
            let word = captures.get(3).map(|word| word.as_str());

            if word.is_some_and(|word| NOT_A_PRICE.is_match(word)) {
                continue;
            }

            let Some(magnitude) = parse_magnitude(number.as_str()) else {
                warn!(number = number.as_str(), "unparseable price magnitude");
                continue;
            };

            let context = has_context(lowered, whole.start(), whole.as_str());
            let resolved = word.and_then(|word| self.resolve_unit(word));
            if let (Some(word), None) = (word, resolved) {
                if context {
                    warn!(unit = word, "unknown price unit");
                } else {
                    debug!(word, "word after number is not a price unit");
                }
            }

            let (multiplier, unit) = match resolved {
                Some((multiplier, source)) => (multiplier, source),
                None if symbol => (1, UnitSource::Symbol),
                None if magnitude > self.settings.bare_threshold as f64 => (1, UnitSource::Bare),
                None => (self.settings.bare_multiplier, UnitSource::Bare),
            };

            let amount = (magnitude * multiplier as f64).round();
            if !amount.is_finite() || amount < 1.0 || amount > u64::MAX as f64 {
                continue;
            }

            let mut score = 0u8;
            if resolved.is_some() || symbol {
                score += 2;
            }
            if context {
                score += 1;
            }

            let number_text = &lowered[whole.start()..number.end()];
            let expression = match (resolved, word) {
                (Some(_), Some(word)) => format!("{number_text} {word}"),
                _ => number_text.to_string(),
            };

            found.push(PriceCandidate { amount: amount as u64, expression, unit, score });
        }
        found
    }

    fn resolve_unit(&self, word: &str) -> Option<(u64, UnitSource)> {
        let compact = word.split_whitespace().collect::<String>();

        if let Some((_, multiplier)) = UNITS.iter().find(|(unit, _)| *unit == compact) {
            return Some((*multiplier, UnitSource::Exact));
        }

        // Single letters are too short for edit distance to mean anything.
        let mut closest: Option<(u64, f64)> = None;
        for (unit, multiplier) in UNITS.iter().filter(|(unit, _)| unit.chars().count() > 1) {
            let similarity = strsim::normalized_levenshtein(&compact, unit);
            if similarity >= self.settings.unit_similarity_floor
                && closest.map_or(true, |(_, best)| similarity > best)
            {
                closest = Some((*multiplier, similarity));
            }
        }
        if let Some((multiplier, similarity)) = closest {
            debug!(word, similarity, "price unit matched by spelling");
            return Some((multiplier, UnitSource::Fuzzy));
        }

        match self.semantic_unit(&compact) {
            Ok(Some((multiplier, similarity))) => {
                debug!(word, similarity, "price unit matched semantically");
                Some((multiplier, UnitSource::Semantic))
            }
            Ok(None) => None,
            Err(error) => {
                warn!(strategy = "price_unit_semantic", %error, "unit embedding failed");
                None
            }
        }
    }

    fn semantic_unit(&self, word: &str) -> Result<Option<(u64, f32)>, EmbeddingError> {
        let Some(embedder) = &self.embedder else {
            return Ok(None);
        };

        let vectors = self.unit_vectors.get_or_try_init(|| {
            let units = UNITS.iter().map(|(unit, _)| *unit).collect::<Vec<_>>();
            embedder.embed_batch(&units)
        })?;
        let query = embedder.embed(word)?;

        Ok(best_similarity(&query, vectors)?
            .filter(|(_, similarity)| *similarity > self.settings.unit_semantic_threshold)
            .map(|(index, similarity)| (UNITS[index].1, similarity)))
    }
}

/// Numeric value of a digit group. Several separators, or one separator
/// followed by exactly three digits, mark thousands; otherwise the separator
/// is a decimal point.
pub fn parse_magnitude(number: &str) -> Option<f64> {
    let separators = number.chars().filter(|character| matches!(character, '.' | ',')).count();
    let thousands = match separators {
        0 => true,
        1 => number
            .rsplit(|character| matches!(character, '.' | ','))
            .next()
            .is_some_and(|tail| tail.len() == 3),
        _ => true,
    };

    if thousands {
        number
            .chars()
            .filter(char::is_ascii_digit)
            .collect::<String>()
            .parse::<u64>()
            .ok()
            .map(|value| value as f64)
    } else {
        number.replace(',', ".").parse::<f64>().ok()
    }
}

fn has_context(lowered: &str, start: usize, expression: &str) -> bool {
    let preceding = lowered[..start]
        .split_whitespace()
        .rev()
        .take(CONTEXT_WINDOW)
        .map(|token| token.trim_matches(|character: char| !character.is_alphanumeric()))
        .collect::<Vec<_>>();
    let inside = expression
        .split_whitespace()
        .map(|token| token.trim_matches(|character: char| !character.is_alphanumeric()));

    preceding.into_iter().chain(inside).any(|token| CONTEXT_WORDS.contains(&token))
}

/// Replaces the price with the best parse in each utterance.
pub struct PriceStrategy {
    parser: Arc<PriceParser>,
}

impl PriceStrategy {
    pub fn new(parser: Arc<PriceParser>) -> Self {
        Self { parser }
    }
}

impl SlotStrategy for PriceStrategy {
    fn name(&self) -> &'static str {
        "price"
    }

    fn detect(&self, input: &StrategyInput<'_>) -> Option<Detection> {
        let candidate = self.parser.best_in(&input.utterance.lowered)?;
        Some(
            Detection::single(SlotName::Price, SlotValue::Amount(candidate.amount))
                .with_detail(format!("{} ({})", candidate.expression, candidate.unit.as_str())),
        )
    }
}
