use homecat_core::config::NumericTieBreak;
use homecat_core::domain::slots::{SlotName, SlotValue};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::extraction::chain::{Detection, SlotStrategy, StrategyInput};

const COUNT: &str = r"(\d{1,2}|un|uno|una|dos|tres|cuatro|cinco|seis|siete|ocho|nueve|diez)";

fn count_pattern(units: &str) -> Regex {
    Regex::new(&format!(r"\b{COUNT}\s*(?:{units})\b")).expect("count pattern must compile")
}

static BEDROOMS: Lazy<Regex> = Lazy::new(|| {
    count_pattern(r"habitaci[oó]n(?:es)?|cuartos?|alcobas?|dormitorios?|recamaras?|rec[aá]maras?")
});
static BATHROOMS: Lazy<Regex> = Lazy::new(|| {
    count_pattern(r"bañ[oa]s?|bañitos?|banos?|sanitarios?|servicios?\s+higi[eé]nicos?")
});
static PARKING: Lazy<Regex> = Lazy::new(|| {
    count_pattern(
        r"garajes?|garages?|parqueaderos?|parqueos?|veh[ií]culos?|carros?|autos?|puestos?\s+de\s+parqueo",
    )
});
static AREA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,3}(?:[.,]\d{3})+|\d{1,5})\s*(?:(?:m2|mts?2|mts|metros(?:\s+cuadrados?)?)\b|m²)")
        .expect("area pattern must compile")
});

/// Value of a count token: digits or a Spanish number word up to ten.
pub fn parse_count(token: &str) -> Option<u32> {
    match token {
        "un" | "uno" | "una" => Some(1),
        "dos" => Some(2),
        "tres" => Some(3),
        "cuatro" => Some(4),
        "cinco" => Some(5),
        "seis" => Some(6),
        "siete" => Some(7),
        "ocho" => Some(8),
        "nueve" => Some(9),
        "diez" => Some(10),
        digits => digits.parse().ok(),
    }
}

fn parse_area(token: &str) -> Option<u32> {
    token.chars().filter(char::is_ascii_digit).collect::<String>().parse().ok()
}

/// Unit-anchored count for one numeric slot.
pub struct CountStrategy {
    slot: SlotName,
    tie_break: NumericTieBreak,
}

impl CountStrategy {
    pub fn new(slot: SlotName, tie_break: NumericTieBreak) -> Self {
        Self { slot, tie_break }
    }

    /// All positive counts mentioned for this slot, in text order.
    pub fn mentions(&self, lowered: &str) -> Vec<u32> {
        let (pattern, parse): (&Regex, fn(&str) -> Option<u32>) = match self.slot {
            SlotName::Bedrooms => (&BEDROOMS, parse_count),
            SlotName::Bathrooms => (&BATHROOMS, parse_count),
            SlotName::Parking => (&PARKING, parse_count),
            SlotName::AreaM2 => (&AREA, parse_area),
            _ => return Vec::new(),
        };

        pattern
            .captures_iter(lowered)
            .filter_map(|captures| captures.get(1))
            .filter_map(|token| parse(token.as_str()))
            .filter(|value| *value > 0)
            .collect()
    }

    fn pick(&self, values: &[u32]) -> Option<u32> {
        match self.tie_break {
            NumericTieBreak::Max => values.iter().copied().max(),
            NumericTieBreak::Last => values.last().copied(),
        }
    }
}

impl SlotStrategy for CountStrategy {
    fn name(&self) -> &'static str {
        match self.slot {
            SlotName::Bedrooms => "bedroom_count",
            SlotName::Bathrooms => "bathroom_count",
            SlotName::Parking => "parking_count",
            SlotName::AreaM2 => "area_m2",
            _ => "count",
        }
    }

    fn detect(&self, input: &StrategyInput<'_>) -> Option<Detection> {
        let values = self.mentions(&input.utterance.lowered);
        let value = self.pick(&values)?;
        if values.len() > 1 {
            debug!(
                slot = self.slot.as_str(),
                mentions = ?values,
                tie_break = self.tie_break.as_str(),
                chosen = value,
                "several counts for one slot"
            );
        }
        Some(Detection::single(self.slot, SlotValue::Count(value)))
    }
}

#[cfg(test)]
mod tests {
    use homecat_core::config::NumericTieBreak;
    use homecat_core::domain::slots::SlotName;

    use super::{parse_count, CountStrategy};

    fn mentions(slot: SlotName, text: &str) -> Vec<u32> {
        CountStrategy::new(slot, NumericTieBreak::Max).mentions(text)
    }

    #[test]
    fn counts_accept_digits_words_and_unit_variants() {
        assert_eq!(mentions(SlotName::Bedrooms, "3 habitaciones"), vec![3]);
        assert_eq!(mentions(SlotName::Bedrooms, "una habitación y dos alcobas"), vec![1, 2]);
        assert_eq!(mentions(SlotName::Bathrooms, "2 baños"), vec![2]);
        assert_eq!(mentions(SlotName::Bathrooms, "un bano"), vec![1]);
        assert_eq!(mentions(SlotName::Parking, "2 parqueaderos"), vec![2]);
        assert_eq!(mentions(SlotName::Parking, "1 puesto de parqueo"), vec![1]);
    }

    #[test]
    fn counts_ignore_numbers_without_their_unit() {
        assert!(mentions(SlotName::Bedrooms, "3 baños").is_empty());
        assert!(mentions(SlotName::Bathrooms, "tengo 2 hijos").is_empty());
        assert!(mentions(SlotName::Bedrooms, "0 habitaciones").is_empty());
    }

    #[test]
    fn area_accepts_square_meter_spellings_and_separators() {
        assert_eq!(mentions(SlotName::AreaM2, "80 m2"), vec![80]);
        assert_eq!(mentions(SlotName::AreaM2, "120mts"), vec![120]);
        assert_eq!(mentions(SlotName::AreaM2, "unos 90 metros cuadrados"), vec![90]);
        assert_eq!(mentions(SlotName::AreaM2, "1.200 m²"), vec![1200]);
        assert!(mentions(SlotName::AreaM2, "a 80 minutos").is_empty());
    }

    #[test]
    fn small_areas_and_short_unit_spellings_are_read() {
        assert_eq!(mentions(SlotName::AreaM2, "un cuarto útil de 9 m2"), vec![9]);
        assert_eq!(mentions(SlotName::AreaM2, "120 mt2"), vec![120]);
        assert_eq!(mentions(SlotName::AreaM2, "unos 85 mts2"), vec![85]);
        assert_eq!(mentions(SlotName::Parking, "1 garage"), vec![1]);
        assert_eq!(mentions(SlotName::Parking, "dos garajes"), vec![2]);
    }

    #[test]
    fn tie_break_is_configurable() {
        let text = "3 habitaciones, bueno mejor 2 habitaciones";
        let max = CountStrategy::new(SlotName::Bedrooms, NumericTieBreak::Max);
        let last = CountStrategy::new(SlotName::Bedrooms, NumericTieBreak::Last);

        assert_eq!(max.pick(&max.mentions(text)), Some(3));
        assert_eq!(last.pick(&last.mentions(text)), Some(2));
    }

    #[test]
    fn number_words_stop_at_ten() {
        assert_eq!(parse_count("diez"), Some(10));
        assert_eq!(parse_count("once"), None);
        assert_eq!(parse_count("12"), Some(12));
    }
}
