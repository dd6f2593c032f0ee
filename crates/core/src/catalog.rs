use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::domain::property::Property;
use crate::domain::slots::SlotSet;
use crate::scoring::CandidateScorer;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("could not read catalog file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse catalog file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: serde_json::Error },
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CatalogField {
    City,
    Neighborhood,
    PropertyType,
}

impl CatalogField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::City => "ciudad",
            Self::Neighborhood => "barrio",
            Self::PropertyType => "tipo",
        }
    }
}

/// Read-only listing source. "Nothing matched" is `Ok(None)`, not an error.
pub trait Catalog: Send + Sync {
    fn lookup_distinct(&self, field: CatalogField) -> Result<BTreeSet<String>, CatalogError>;

    fn find_best(&self, slots: &SlotSet) -> Result<Option<Property>, CatalogError>;

    fn listings(&self) -> Result<Vec<Property>, CatalogError>;

    /// Listing whose title the text mentions verbatim, ignoring case.
    fn mentioned_in(&self, text: &str) -> Result<Option<Property>, CatalogError> {
        let haystack = text.to_lowercase();
        Ok(self.listings()?.into_iter().find(|listing| {
            let title = listing.title.trim().to_lowercase();
            !title.is_empty() && haystack.contains(&title)
        }))
    }
}

/// Catalog held in memory, usually loaded from a JSON array of listings.
#[derive(Clone, Debug, Default)]
pub struct InMemoryCatalog {
    listings: Vec<Property>,
    scorer: CandidateScorer,
}

impl InMemoryCatalog {
    pub fn new(listings: Vec<Property>) -> Self {
        Self { listings, scorer: CandidateScorer::default() }
    }

    pub fn with_scorer(mut self, scorer: CandidateScorer) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn from_json_str(raw: &str, origin: &Path) -> Result<Self, CatalogError> {
        let listings = serde_json::from_str::<Vec<Property>>(raw)
            .map_err(|source| CatalogError::ParseFile { path: origin.to_path_buf(), source })?;
        Ok(Self::new(listings))
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| CatalogError::ReadFile { path: path.to_path_buf(), source })?;
        let catalog = Self::from_json_str(&raw, path)?;
        info!(path = %path.display(), listings = catalog.len(), "catalog loaded");
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }
}

impl Catalog for InMemoryCatalog {
    fn lookup_distinct(&self, field: CatalogField) -> Result<BTreeSet<String>, CatalogError> {
        let values = self
            .listings
            .iter()
            .filter_map(|listing| match field {
                CatalogField::City => listing.city.as_deref(),
                CatalogField::Neighborhood => listing.neighborhood.as_deref(),
                CatalogField::PropertyType => listing.property_type.as_deref(),
            })
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .collect::<BTreeSet<_>>();
        debug!(field = field.as_str(), distinct = values.len(), "catalog distinct lookup");
        Ok(values)
    }

    fn find_best(&self, slots: &SlotSet) -> Result<Option<Property>, CatalogError> {
        Ok(self.scorer.best_match(slots, &self.listings).cloned())
    }

    fn listings(&self) -> Result<Vec<Property>, CatalogError> {
        Ok(self.listings.clone())
    }
}
