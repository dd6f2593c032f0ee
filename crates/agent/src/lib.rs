//! Conversational runtime for the property assistant.
//!
//! Each user message goes through the same loop:
//! 1. **Extraction** (`extraction`) - ordered strategy chains turn Spanish
//!    text into slot values
//! 2. **Intent** (`intent`) - confirmation and indifference, by pattern or
//!    by similarity to exemplars
//! 3. **Dialogue** (`conversation`) - decide whether to present a listing,
//!    ask for a missing detail, or keep talking
//! 4. **Generation** (`llm`, `prompt`) - the completion backend phrases the
//!    reply
//!
//! The model only phrases answers. Which listing is shown, and when, is
//! decided by the catalog scorer and the session flags.

pub mod conversation;
pub mod embedding;
pub mod extraction;
pub mod intent;
pub mod llm;
pub mod prompt;
pub mod runtime;

pub use conversation::{DialogueEngine, PropertyCard, TurnOutcome, TurnReply};
pub use runtime::AgentRuntime;
