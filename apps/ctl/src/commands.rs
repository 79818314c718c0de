use clap::Subcommand;
use ransomeye_types::bundle::BundleScopeRequest;
use ransomeye_types::{AlertId, AlertStatus, BundleId, IncidentId, JobId};
use serde::Serialize;

use crate::client::{CtlClient, CtlError};

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Submit a canonical event from a JSON file, `POST /events`.
    SubmitEvent {
        #[arg(long)]
        file: std::path::PathBuf,
    },
    /// Submit a batch of alerts from a JSON file, legacy `POST /alerts/batch`.
    SubmitBatch {
        #[arg(long)]
        file: std::path::PathBuf,
    },
    /// `GET /alerts`, optionally filtered. `status`/`severity` are the
    /// snake_case wire values (`open`, `acknowledged`, ... / `info`, `low`,
    /// ...), validated against the real enums before the request is sent.
    ListAlerts {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        severity: Option<String>,
        #[arg(long)]
        limit: Option<i64>,
        #[arg(long)]
        offset: Option<i64>,
    },
    /// `GET /alerts/{id}`.
    GetAlert { alert_id: AlertId },
    /// `PATCH /alerts/{id}`.
    TransitionAlert {
        alert_id: AlertId,
        #[arg(long)]
        status: String,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Push a batch of already-admitted alerts into correlation, `POST /correlation/ingest`.
    CorrelationIngest {
        #[arg(long)]
        file: std::path::PathBuf,
    },
    /// `GET /incidents/{id}`.
    GetIncident { incident_id: IncidentId },
    /// Enqueue a `build_bundle` job, `POST /bundles`.
    BuildBundle {
        #[arg(long)]
        incident_id: IncidentId,
        #[arg(long, default_value = "full")]
        scope: String,
        #[arg(long)]
        since: Option<i64>,
        #[arg(long, value_delimiter = ',')]
        entities: Vec<String>,
        #[arg(long)]
        idempotency_key: Option<String>,
    },
    /// `GET /jobs/{id}`.
    GetJob { job_id: JobId },
    /// Upload or reference a bundle for rehydration, `POST /rehydrate`.
    Rehydrate {
        #[arg(long)]
        bundle_id: Option<BundleId>,
        #[arg(long)]
        archive_file: Option<std::path::PathBuf>,
    },
    /// `GET /healthz`.
    Health,
    /// `GET /metrics`.
    Metrics,
}

#[derive(Serialize)]
struct BundleRequest {
    incident_id: IncidentId,
    scope: BundleScopeRequest,
    idempotency_key: Option<String>,
}

#[derive(Serialize)]
struct RehydrateRequest {
    archive_bytes: Option<Vec<u8>>,
    bundle_id: Option<BundleId>,
}

#[derive(Serialize)]
struct TransitionRequest {
    status: AlertStatus,
    reason: Option<String>,
}

/// Validates a raw `--status`/`--severity` string against the real enum
/// before it ever reaches the wire, so a typo is a local `2`, not a round
/// trip to the orchestrator for a `400`.
fn parse_enum<T: serde::de::DeserializeOwned>(raw: &str, field: &str) -> Result<T, CtlError> {
    serde_json::from_value(serde_json::Value::String(raw.to_string())).map_err(|_| CtlError { exit_code: 2, message: format!("invalid {field} '{raw}'") })
}

fn parse_scope(scope: &str, since: Option<i64>, entities: Vec<String>) -> Result<BundleScopeRequest, CtlError> {
    match scope {
        "full" => Ok(BundleScopeRequest::Full),
        "since" => since.map(BundleScopeRequest::SinceTimestamp).ok_or_else(|| CtlError { exit_code: 2, message: "--since is required for scope=since".to_string() }),
        "entities" => {
            if entities.is_empty() {
                Err(CtlError { exit_code: 2, message: "--entities is required for scope=entities".to_string() })
            } else {
                Ok(BundleScopeRequest::Entities(entities))
            }
        }
        other => Err(CtlError { exit_code: 2, message: format!("unknown scope '{other}', expected full|since|entities") }),
    }
}

/// Runs one subcommand against the orchestrator and prints its result,
/// either as a human summary or (with `--json`) the raw response body.
/// Returns the process exit code, never panicking on a remote error —
/// only a local argument mistake maps to `2` before any request is sent.
pub async fn run(client: &CtlClient, command: Command, json: bool) -> i32 {
    let result = dispatch(client, command).await;
    match result {
        Ok(body) => {
            if json {
                println!("{body}");
            } else {
                println!("ok: {body}");
            }
            0
        }
        Err(e) => {
            eprintln!("error: {e}");
            e.exit_code
        }
    }
}

async fn dispatch(client: &CtlClient, command: Command) -> Result<String, CtlError> {
    match command {
        Command::SubmitEvent { file } => {
            let event: serde_json::Value = read_json(&file)?;
            let receipt: serde_json::Value = client.post("/events", &event).await?;
            Ok(receipt.to_string())
        }
        Command::SubmitBatch { file } => {
            let events: serde_json::Value = read_json(&file)?;
            let outcomes: serde_json::Value = client.post("/alerts/batch", &events).await?;
            Ok(outcomes.to_string())
        }
        Command::ListAlerts { status, severity, limit, offset } => {
            let mut path = "/alerts?".to_string();
            if let Some(s) = status {
                let _: AlertStatus = parse_enum(&s, "status")?;
                path.push_str(&format!("status={s}&"));
            }
            if let Some(s) = severity {
                let _: ransomeye_types::Severity = parse_enum(&s, "severity")?;
                path.push_str(&format!("severity={s}&"));
            }
            if let Some(l) = limit {
                path.push_str(&format!("limit={l}&"));
            }
            if let Some(o) = offset {
                path.push_str(&format!("offset={o}&"));
            }
            let alerts: serde_json::Value = client.get(&path).await?;
            Ok(alerts.to_string())
        }
        Command::GetAlert { alert_id } => {
            let alert: serde_json::Value = client.get(&format!("/alerts/{alert_id}")).await?;
            Ok(alert.to_string())
        }
        Command::TransitionAlert { alert_id, status, reason } => {
            let status: AlertStatus = parse_enum(&status, "status")?;
            let body = TransitionRequest { status, reason };
            let response: serde_json::Value = client.patch(&format!("/alerts/{alert_id}"), &body).await?;
            Ok(response.to_string())
        }
        Command::CorrelationIngest { file } => {
            let alerts: serde_json::Value = read_json(&file)?;
            let results: serde_json::Value = client.post("/correlation/ingest", &alerts).await?;
            Ok(results.to_string())
        }
        Command::GetIncident { incident_id } => {
            let incident: serde_json::Value = client.get(&format!("/incidents/{incident_id}")).await?;
            Ok(incident.to_string())
        }
        Command::BuildBundle { incident_id, scope, since, entities, idempotency_key } => {
            let scope = parse_scope(&scope, since, entities)?;
            let body = BundleRequest { incident_id, scope, idempotency_key };
            let response: serde_json::Value = client.post("/bundles", &body).await?;
            Ok(response.to_string())
        }
        Command::GetJob { job_id } => {
            let job: serde_json::Value = client.get(&format!("/jobs/{job_id}")).await?;
            Ok(job.to_string())
        }
        Command::Rehydrate { bundle_id, archive_file } => {
            if bundle_id.is_none() && archive_file.is_none() {
                return Err(CtlError { exit_code: 2, message: "one of --bundle-id or --archive-file is required".to_string() });
            }
            let archive_bytes = match &archive_file {
                Some(path) => Some(std::fs::read(path).map_err(|e| CtlError { exit_code: 1, message: format!("failed to read {}: {e}", path.display()) })?),
                None => None,
            };
            let body = RehydrateRequest { archive_bytes, bundle_id };
            let response: serde_json::Value = client.post("/rehydrate", &body).await?;
            Ok(response.to_string())
        }
        Command::Health => {
            let status = client.health().await?;
            Ok(status.to_string())
        }
        Command::Metrics => {
            let text = client.metrics_text().await?;
            Ok(text)
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &std::path::Path) -> Result<T, CtlError> {
    let contents = std::fs::read_to_string(path).map_err(|e| CtlError { exit_code: 1, message: format!("failed to read {}: {e}", path.display()) })?;
    serde_json::from_str(&contents).map_err(|e| CtlError { exit_code: 2, message: format!("invalid JSON in {}: {e}", path.display()) })
}
