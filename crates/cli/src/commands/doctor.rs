use homecat_agent::embedding::Embedder;
use homecat_agent::runtime::{build_embedder, load_template};
use homecat_core::catalog::InMemoryCatalog;
use homecat_core::config::{AppConfig, LoadOptions};
use homecat_core::gazetteer::Gazetteer;
use serde::Serialize;

use super::{escape_json, CommandResult, EXIT_CHECK_FAILED, EXIT_OK};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str) -> Self {
        Self {
            name,
            status: CheckStatus::Skipped,
            details: "skipped because configuration did not load".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(options: &LoadOptions, json_output: bool) -> CommandResult {
    let report = build_report(options);
    let exit_code =
        if report.overall_status == CheckStatus::Pass { EXIT_OK } else { EXIT_CHECK_FAILED };

    if json_output {
        let output = serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
        return CommandResult::text(exit_code, output);
    }

    CommandResult::text(exit_code, render_human(&report))
}

fn build_report(options: &LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options.clone()) {
        Ok(config) => {
            checks.push(DoctorCheck::pass(
                "config_validation",
                "configuration loaded and validated",
            ));
            checks.push(check_catalog(&config));
            checks.push(check_gazetteer(&config));
            checks.push(check_embedding(&config));
            checks.push(check_prompt_template(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::fail("config_validation", error.to_string()));
            for name in ["catalog_load", "gazetteer_load", "embedding_model", "prompt_template"] {
                checks.push(DoctorCheck::skipped(name));
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_catalog(config: &AppConfig) -> DoctorCheck {
    let Some(path) = &config.catalog.path else {
        return DoctorCheck::pass("catalog_load", "no catalog configured; no listings can be shown");
    };
    match InMemoryCatalog::load(path) {
        Ok(catalog) => DoctorCheck::pass(
            "catalog_load",
            format!("{} listings loaded from `{}`", catalog.len(), path.display()),
        ),
        Err(error) => DoctorCheck::fail("catalog_load", error.to_string()),
    }
}

fn check_gazetteer(config: &AppConfig) -> DoctorCheck {
    let (gazetteer, origin) = match &config.gazetteer.path {
        Some(path) => match Gazetteer::load(path) {
            Ok(gazetteer) => (gazetteer, format!("`{}`", path.display())),
            Err(error) => return DoctorCheck::fail("gazetteer_load", error.to_string()),
        },
        None => (Gazetteer::builtin(), "built-in table".to_string()),
    };
    DoctorCheck::pass("gazetteer_load", format!("{} locations from {origin}", gazetteer.len()))
}

fn check_embedding(config: &AppConfig) -> DoctorCheck {
    let backend = config.embedding.backend.as_str();
    match build_embedder(&config.embedding) {
        Ok(embedder) => DoctorCheck::pass(
            "embedding_model",
            format!("backend `{backend}`, {} dimensions", embedder.dimensions()),
        ),
        Err(error) => DoctorCheck::fail("embedding_model", error.to_string()),
    }
}

fn check_prompt_template(config: &AppConfig) -> DoctorCheck {
    match load_template(config.llm.prompt_template_path.as_deref()) {
        Ok(template) => DoctorCheck::pass(
            "prompt_template",
            format!("{} characters", template.chars().count()),
        ),
        Err(error) => DoctorCheck::fail("prompt_template", error.to_string()),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}
