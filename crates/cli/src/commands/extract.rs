use std::sync::Arc;

use homecat_agent::llm::FailingCompletion;
use homecat_agent::AgentRuntime;
use homecat_core::config::{AppConfig, LoadOptions};
use homecat_core::domain::slots::SlotSet;
use serde::Serialize;
use tracing::debug;

use super::{render_json, CommandResult, EXIT_CONFIG, EXIT_OK, EXIT_RUNTIME};
use crate::logging;

#[derive(Debug, Serialize)]
struct ExtractReport<'a> {
    command: &'static str,
    status: &'static str,
    text: &'a str,
    slots: SlotSet,
    complete: bool,
    missing: Vec<&'static str>,
}

pub fn run(options: &LoadOptions, text: &str) -> CommandResult {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("extract", "config_validation", error.to_string(), EXIT_CONFIG)
        }
    };
    if let Err(error) = logging::init(&config.logging) {
        debug!(%error, "keeping the existing log subscriber");
    }

    // Extraction never reaches the completion backend.
    let runtime = match AgentRuntime::with_completion(&config, Arc::new(FailingCompletion)) {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure("extract", "runtime_build", error.to_string(), EXIT_RUNTIME)
        }
    };

    let slots = runtime.extract(text, &SlotSet::default());
    let report = ExtractReport {
        command: "extract",
        status: "ok",
        text,
        complete: slots.is_complete(),
        missing: slots.missing_required().iter().map(|name| name.as_str()).collect(),
        slots,
    };
    CommandResult::text(EXIT_OK, render_json(&report))
}
