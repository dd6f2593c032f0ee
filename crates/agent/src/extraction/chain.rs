use homecat_core::domain::slots::{SlotName, SlotSet, SlotValue};
use tracing::debug;

/// Lowercased utterance plus its punctuation-free tokens.
#[derive(Clone, Debug)]
pub struct Utterance<'a> {
    pub raw: &'a str,
    pub lowered: String,
    pub tokens: Vec<String>,
}

impl<'a> Utterance<'a> {
    pub fn new(raw: &'a str) -> Self {
        let lowered = raw.to_lowercase();
        let tokens = lowered
            .chars()
            .map(|character| if character.is_ascii_punctuation() { ' ' } else { character })
            .collect::<String>()
            .split_whitespace()
            .map(str::to_string)
            .collect();
        Self { raw, lowered, tokens }
    }
}

/// City and neighborhood names known to the catalog, matched by substring.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KnownLocations {
    pub cities: Vec<String>,
    pub neighborhoods: Vec<String>,
}

impl KnownLocations {
    pub fn new(
        cities: impl IntoIterator<Item = String>,
        neighborhoods: impl IntoIterator<Item = String>,
    ) -> Self {
        Self { cities: longest_first(cities), neighborhoods: longest_first(neighborhoods) }
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty() && self.neighborhoods.is_empty()
    }
}

fn longest_first(names: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut names = names
        .into_iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect::<Vec<_>>();
    names.sort_by(|left, right| right.chars().count().cmp(&left.chars().count()).then(left.cmp(right)));
    names.dedup();
    names
}

/// What one strategy found, and how it found it.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub values: Vec<(SlotName, SlotValue)>,
    pub detail: Option<String>,
    pub similarity: Option<f32>,
}

impl Detection {
    pub fn single(name: SlotName, value: SlotValue) -> Self {
        Self { values: vec![(name, value)], detail: None, similarity: None }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_similarity(mut self, similarity: f32) -> Self {
        self.similarity = Some(similarity);
        self
    }
}

pub struct StrategyInput<'a> {
    pub utterance: &'a Utterance<'a>,
    pub current: &'a SlotSet,
    pub known: &'a KnownLocations,
}

/// One way of finding slot values in an utterance. Returning `None` hands
/// over to the next strategy in the chain.
pub trait SlotStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn detect(&self, input: &StrategyInput<'_>) -> Option<Detection>;
}

/// Ordered strategies for a group of slots. The first detection wins.
pub struct StrategyChain {
    targets: Vec<SlotName>,
    overwrite: bool,
    strategies: Vec<Box<dyn SlotStrategy>>,
}

impl StrategyChain {
    pub fn new(targets: impl Into<Vec<SlotName>>) -> Self {
        Self { targets: targets.into(), overwrite: false, strategies: Vec::new() }
    }

    /// Lets detections replace values that are already set.
    pub fn overwriting(mut self) -> Self {
        self.overwrite = true;
        self
    }

    pub fn then(mut self, strategy: impl SlotStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn targets(&self) -> &[SlotName] {
        &self.targets
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|strategy| strategy.name()).collect()
    }

    /// Runs the strategies in order and applies the first detection to
    /// `slots`. Returns the slots that changed.
    pub fn run(&self, input: &StrategyInput<'_>, slots: &mut SlotSet) -> Vec<SlotName> {
        if !self.overwrite && self.targets.iter().all(|name| slots.is_filled(*name)) {
            return Vec::new();
        }

        for strategy in &self.strategies {
            let Some(detection) = strategy.detect(input) else {
                continue;
            };

            let mut changed = Vec::new();
            for (name, value) in detection.values {
                if !self.overwrite && slots.is_filled(name) {
                    continue;
                }
                if slots.get(name) == value {
                    continue;
                }
                match slots.set(name, value) {
                    Ok(()) => changed.push(name),
                    Err(error) => {
                        debug!(strategy = strategy.name(), %error, "detection rejected by slot");
                    }
                }
            }

            debug!(
                strategy = strategy.name(),
                detail = detection.detail.as_deref().unwrap_or(""),
                similarity = detection.similarity.unwrap_or(1.0),
                changed = changed.len(),
                "slot strategy fired"
            );
            return changed;
        }

        Vec::new()
    }
}
