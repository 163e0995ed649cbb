//! Scripted day replay: drives a real session (engine + in-memory
//! store) over a manual clock and prints the transcript.

use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use shiftline_core::RestaurantConfig;
use shiftline_engine::{
    spawn_session, Effect, EngineError, ManualClock, NoopNotifier, SessionHandle, SessionOptions,
};
use shiftline_storage::{Evidence, MemoryStore, ReviewDecision};

use crate::OutputFormat;

#[derive(Debug, Deserialize)]
struct Script {
    /// Actor whose completions the simulated session records.
    #[serde(default = "default_actor")]
    actor: String,
    /// Session start instant (RFC 3339).
    start: String,
    steps: Vec<Step>,
}

fn default_actor() -> String {
    "simulated-operator".to_string()
}

#[derive(Debug, Deserialize)]
struct Step {
    /// Instant the step happens at (RFC 3339).
    at: String,
    #[serde(flatten)]
    action: Action,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum Action {
    Submit {
        task_id: String,
        #[serde(default)]
        evidence: Evidence,
    },
    AdvanceTo {
        period_id: String,
    },
    LastCustomerLeft,
    CompleteClosing,
    Review {
        review_task_id: String,
        decision: ReviewDecision,
    },
    Snapshot,
}

pub(crate) async fn cmd_simulate(
    config_path: &Path,
    script_path: &Path,
    output: OutputFormat,
) -> Result<(), String> {
    let config_text = std::fs::read_to_string(config_path)
        .map_err(|e| format!("error reading '{}': {}", config_path.display(), e))?;
    let config = RestaurantConfig::from_json_str(&config_text)
        .map_err(|e| format!("error parsing '{}': {}", config_path.display(), e))?;
    if let Err(errors) = config.validate() {
        let msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        return Err(format!("invalid configuration: {}", msgs.join("; ")));
    }

    let script_text = std::fs::read_to_string(script_path)
        .map_err(|e| format!("error reading '{}': {}", script_path.display(), e))?;
    let script: Script = serde_json::from_str(&script_text)
        .map_err(|e| format!("error parsing '{}': {}", script_path.display(), e))?;

    let start = parse_instant(&script.start, &config)?;
    let clock = ManualClock::new(start);
    let handle = spawn_session(
        Arc::new(config.clone()),
        Arc::new(MemoryStore::new()),
        Arc::new(clock.clone()),
        Arc::new(NoopNotifier),
        SessionOptions::new(script.actor.clone()),
    );

    let mut transcript: Vec<serde_json::Value> = Vec::new();
    for step in &script.steps {
        let at = parse_instant(&step.at, &config)?;
        clock.set(at);
        let tick_effects = handle.tick().await.map_err(|e| e.to_string())?;
        for effect in &tick_effects {
            transcript.push(entry(&step.at, "tick", Ok(Some(effect_json(effect)))));
        }
        let (label, result) = run_step(&handle, &step.action).await;
        transcript.push(entry(&step.at, label, result));
    }
    handle.shutdown().await;

    match output {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&transcript)
                    .unwrap_or_else(|e| format!("serialization error: {}", e))
            );
        }
        OutputFormat::Text => {
            for line in &transcript {
                print_text_entry(line);
            }
        }
    }
    Ok(())
}

async fn run_step(
    handle: &SessionHandle,
    action: &Action,
) -> (&'static str, Result<Option<serde_json::Value>, EngineError>) {
    match action {
        Action::Submit { task_id, evidence } => (
            "submit",
            handle
                .submit_task(task_id, evidence.clone())
                .await
                .map(|record| serde_json::to_value(&record).ok()),
        ),
        Action::AdvanceTo { period_id } => (
            "advance-to",
            handle
                .advance_to(period_id)
                .await
                .map(|effects| Some(effects_json(&effects))),
        ),
        Action::LastCustomerLeft => (
            "last-customer-left",
            handle
                .last_customer_left()
                .await
                .map(|effects| Some(effects_json(&effects))),
        ),
        Action::CompleteClosing => (
            "complete-closing",
            handle
                .complete_closing()
                .await
                .map(|effects| Some(effects_json(&effects))),
        ),
        Action::Review {
            review_task_id,
            decision,
        } => (
            "review",
            handle
                .decide_review(review_task_id, decision.clone())
                .await
                .map(|record| serde_json::to_value(&record).ok()),
        ),
        Action::Snapshot => (
            "snapshot",
            handle
                .snapshot()
                .await
                .map(|view| serde_json::to_value(&view).ok()),
        ),
    }
}

fn parse_instant(s: &str, config: &RestaurantConfig) -> Result<OffsetDateTime, String> {
    OffsetDateTime::parse(s, &Rfc3339)
        .map(|t| t.to_offset(config.utc_offset()))
        .map_err(|e| format!("invalid instant '{}': {}", s, e))
}

fn effect_json(effect: &Effect) -> serde_json::Value {
    serde_json::to_value(effect).unwrap_or(serde_json::Value::Null)
}

fn effects_json(effects: &[Effect]) -> serde_json::Value {
    serde_json::Value::Array(effects.iter().map(effect_json).collect())
}

fn entry(
    at: &str,
    action: &str,
    result: Result<Option<serde_json::Value>, EngineError>,
) -> serde_json::Value {
    match result {
        Ok(detail) => serde_json::json!({
            "at": at,
            "action": action,
            "ok": true,
            "detail": detail,
        }),
        // A refused step (e.g. a blocked closing gate) is part of the
        // transcript, not a simulation failure.
        Err(err) => serde_json::json!({
            "at": at,
            "action": action,
            "ok": false,
            "error": err.to_string(),
        }),
    }
}

fn print_text_entry(line: &serde_json::Value) {
    let at = line.get("at").and_then(|v| v.as_str()).unwrap_or("?");
    let action = line.get("action").and_then(|v| v.as_str()).unwrap_or("?");
    let ok = line.get("ok").and_then(|v| v.as_bool()).unwrap_or(false);
    if ok {
        match line.get("detail") {
            Some(serde_json::Value::Null) | None => println!("[{}] {} ok", at, action),
            Some(detail) => println!("[{}] {} ok {}", at, action, compact(detail)),
        }
    } else {
        let err = line.get("error").and_then(|v| v.as_str()).unwrap_or("");
        println!("[{}] {} refused: {}", at, action, err);
    }
}

fn compact(value: &serde_json::Value) -> String {
    serde_json::to_string(value).unwrap_or_default()
}
