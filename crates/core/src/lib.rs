pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod gazetteer;
pub mod scoring;
pub mod session;

pub use catalog::{Catalog, CatalogError, CatalogField, InMemoryCatalog};
pub use domain::conversation::{Role, SessionFlag, SessionFlags, Turn};
pub use domain::property::{Property, PropertyId};
pub use domain::slots::{
    slots_complete, PropertyType, Slot, SlotError, SlotName, SlotSet, SlotValue, NO_PREFERENCE,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use gazetteer::{Gazetteer, GazetteerEntry, GazetteerError};
pub use scoring::{best_match, CandidateScorer, MatchOutcome, ScoreWeights};
pub use session::{Clock, ManualClock, SessionSettings, SessionSnapshot, SessionStore, SystemClock};
