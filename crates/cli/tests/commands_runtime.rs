use std::env;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};

use homecat_agent::llm::ScriptedCompletion;
use homecat_agent::AgentRuntime;
use homecat_cli::commands::{chat, config, doctor, extract};
use homecat_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use serde_json::Value;
use tempfile::NamedTempFile;

const LISTINGS: &str = r#"[
    {"id": "7", "titulo": "Casa Campestre El Vínculo", "slug": "casa-vinculo", "tipo": "Casa",
     "precio": 450000000, "barrio": "El Carmen", "ciudad": "Guadalajara de Buga",
     "area_m2": 150, "habitaciones": 3, "banos": 2,
     "imagenes": ["https://img.example/a.jpg"]}
]"#;

#[test]
fn doctor_passes_with_defaults() {
    with_env(&[], || {
        let result = doctor::run(&LoadOptions::default(), true);
        assert_eq!(result.exit_code, 0, "expected every check to pass: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "pass");
        let names = payload["checks"]
            .as_array()
            .unwrap()
            .iter()
            .map(|check| check["name"].as_str().unwrap().to_string())
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            ["config_validation", "catalog_load", "gazetteer_load", "embedding_model", "prompt_template"]
        );
        assert_eq!(payload["checks"][3]["details"], "backend `auto`, 512 dimensions");
    });
}

#[test]
fn doctor_reports_an_unreadable_catalog() {
    with_env(&[("HOMECAT_CATALOG_PATH", "/nonexistent/listings.json")], || {
        let result = doctor::run(&LoadOptions::default(), true);
        assert_eq!(result.exit_code, 1);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "fail");
        assert_eq!(payload["checks"][1]["name"], "catalog_load");
        assert_eq!(payload["checks"][1]["status"], "fail");
    });
}

#[test]
fn doctor_skips_checks_when_config_is_invalid() {
    with_env(&[("HOMECAT_LLM_PROVIDER", "openai")], || {
        let result = doctor::run(&LoadOptions::default(), false);
        assert_eq!(result.exit_code, 1);
        assert!(result.output.contains("[fail] config_validation"));
        assert!(result.output.contains("[skip] catalog_load"));
    });
}

#[test]
fn doctor_fails_when_the_onnx_model_is_missing() {
    with_env(
        &[("HOMECAT_EMBEDDING_BACKEND", "onnx"), ("HOMECAT_EMBEDDING_MODEL_DIR", "/nonexistent/minilm")],
        || {
            let result = doctor::run(&LoadOptions::default(), true);
            assert_eq!(result.exit_code, 1);

            let payload = parse_payload(&result.output);
            assert_eq!(payload["checks"][3]["name"], "embedding_model");
            assert_eq!(payload["checks"][3]["status"], "fail");
        },
    );
}

#[test]
fn config_redacts_the_api_key_and_names_sources() {
    with_env(
        &[("HOMECAT_LLM_PROVIDER", "openai"), ("HOMECAT_LLM_API_KEY", "sk-very-secret")],
        || {
            let options = LoadOptions {
                overrides: ConfigOverrides {
                    llm_model: Some("gpt-4o-mini".to_string()),
                    ..Default::default()
                },
                ..Default::default()
            };
            let result = config::run(&options);
            assert_eq!(result.exit_code, 0);

            let output = result.output;
            assert!(!output.contains("very-secret"));
            assert!(output.contains("- llm.api_key = sk-*** (source: env (HOMECAT_LLM_API_KEY))"));
            assert!(output.contains("- llm.model = gpt-4o-mini (source: flag)"));
            assert!(output.contains("- session.max_history = 20 (source: default)"));
        },
    );
}

#[test]
fn config_reports_validation_failures() {
    with_env(&[("HOMECAT_SESSION_MAX_HISTORY", "many")], || {
        let result = config::run(&LoadOptions::default());
        assert_eq!(result.exit_code, 2);
        assert!(result.output.starts_with("config validation failed"));
    });
}

#[test]
fn extract_prints_the_slot_set() {
    with_env(&[], || {
        let result = extract::run(
            &LoadOptions::default(),
            "Busco una casa en El Carmen con 3 habitaciones, 2 baños y 120 m2",
        );
        assert_eq!(result.exit_code, 0, "{}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "extract");
        assert_eq!(payload["slots"]["tipo"], "Casa");
        assert_eq!(payload["slots"]["habitaciones"], 3);
        assert_eq!(payload["slots"]["barrio"], "El Carmen");
        assert_eq!(payload["complete"], true);
        assert_eq!(payload["missing"].as_array().unwrap().len(), 0);
    });
}

#[test]
fn extract_fails_cleanly_on_a_bad_catalog() {
    with_env(&[], || {
        let options = LoadOptions {
            overrides: ConfigOverrides {
                catalog_path: Some(PathBuf::from("/nonexistent/listings.json")),
                ..Default::default()
            },
            ..Default::default()
        };
        let result = extract::run(&options, "una casa");
        assert_eq!(result.exit_code, 3);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "runtime_build");
    });
}

#[tokio::test]
async fn chat_loop_answers_until_exit_and_shows_cards() {
    let mut listings = NamedTempFile::new().unwrap();
    listings.write_all(LISTINGS.as_bytes()).unwrap();
    let mut app_config = AppConfig::default();
    app_config.catalog.path = Some(listings.path().to_path_buf());

    let completion = Arc::new(ScriptedCompletion::new(["Anotado.", "Aquí la tienes."]));
    let runtime = AgentRuntime::with_completion(&app_config, completion).unwrap();

    let input = "Busco una casa en El Carmen con 3 habitaciones, 2 baños y 120 m2\n\n\
                 dale, muéstramela\n/salir\nesto no se lee\n";
    let mut output = Vec::new();
    let turns = chat::converse(&runtime, "s1", input.as_bytes(), &mut output).await.unwrap();

    assert_eq!(turns, 2);
    let transcript = String::from_utf8(output).unwrap();
    assert!(transcript.starts_with("Anotado.\n"));
    assert!(transcript.contains("Aquí la tienes.\n"));
    assert!(transcript
        .contains("  [Casa Campestre El Vínculo] https://multihabitat.lat/inmueble/casa-vinculo/\n"));
    assert!(transcript.contains("  - https://img.example/a.jpg\n"));
    assert_eq!(runtime.store.get_history("s1").len(), 4);
}

#[tokio::test]
async fn chat_reset_clears_the_session() {
    let runtime = AgentRuntime::with_completion(
        &AppConfig::default(),
        Arc::new(ScriptedCompletion::new(["Hola."])),
    )
    .unwrap();

    let mut output = Vec::new();
    chat::converse(&runtime, "s1", "hola\n/reiniciar\n".as_bytes(), &mut output).await.unwrap();

    assert!(runtime.store.get_history("s1").is_empty());
    assert!(String::from_utf8(output).unwrap().ends_with("(conversación reiniciada)\n"));
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "HOMECAT_SESSION_MAX_HISTORY",
        "HOMECAT_LLM_PROVIDER",
        "HOMECAT_LLM_API_KEY",
        "HOMECAT_LLM_BASE_URL",
        "HOMECAT_LLM_MODEL",
        "HOMECAT_LLM_PROMPT_TEMPLATE_PATH",
        "HOMECAT_CATALOG_PATH",
        "HOMECAT_GAZETTEER_PATH",
        "HOMECAT_EMBEDDING_BACKEND",
        "HOMECAT_EMBEDDING_MODEL_DIR",
        "HOMECAT_LLM_MAX_RETRIES",
        "HOMECAT_LOGGING_LEVEL",
        "HOMECAT_LOGGING_FORMAT",
        "HOMECAT_LOG_LEVEL",
        "HOMECAT_LOG_FORMAT",
    ];

    let previous = keys.iter().map(|key| (*key, env::var(key).ok())).collect::<Vec<_>>();
    for key in keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(test_fn));

    for (key, value) in previous {
        match value {
            Some(value) => env::set_var(key, value),
            None => env::remove_var(key),
        }
    }

    if let Err(panic) = outcome {
        std::panic::resume_unwind(panic);
    }
}
