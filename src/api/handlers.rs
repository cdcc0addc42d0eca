//! Endpoint handlers
//!
//! Request bodies are coerced into engine types here; the engine itself
//! never sees malformed input.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::{ApiResponse, ApiState};
use crate::engine::{
    AllocationState, CompatibilityChecker, CompatibilityReport, ProcessRecord, ResourceRecord,
    Scenario, ScenarioGenerator, Units,
};
use crate::error::{Error, Result};
use crate::strategy::{self, SimulationReport, SolveOutcome};

const DEFAULT_PROCESSES: usize = 5;
const DEFAULT_RESOURCES: usize = 3;
const DEFAULT_CORES: usize = 2;

#[derive(Debug, Deserialize)]
pub struct StateRequest {
    pub processes: Vec<String>,
    pub resources: Vec<String>,
    pub allocation: Vec<Vec<Units>>,
    pub max_need: Vec<Vec<Units>>,
    pub available: Vec<Units>,
}

impl StateRequest {
    fn into_state(self, state: &ApiState) -> Result<AllocationState> {
        state
            .config
            .limits
            .check(self.processes.len(), self.resources.len())?;
        AllocationState::new(
            self.processes,
            self.resources,
            self.allocation,
            self.max_need,
            self.available,
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct SolveRequest {
    #[serde(flatten)]
    pub state: StateRequest,
    pub strategy: String,
}

#[derive(Debug, Deserialize)]
pub struct CompatibilityRequest {
    #[serde(alias = "processId")]
    pub process_id: String,
    #[serde(alias = "resourceId")]
    pub resource_id: String,
    pub processes: Vec<ProcessRecord>,
    pub resources: Vec<ResourceRecord>,
}

/// Unreadable or non-JSON bodies get the same error envelope as bad fields.
fn json_body(payload: std::result::Result<Json<Value>, JsonRejection>) -> Result<Value> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| Error::InvalidInput(rejection.body_text()))
}

fn parse<T: DeserializeOwned>(body: Value) -> Result<T> {
    serde_json::from_value(body).map_err(|e| Error::InvalidInput(e.to_string()))
}

/// Absent or null falls back to `default`; anything but a positive integer is rejected.
fn positive_count(body: &Value, field: &str, default: usize) -> Result<usize> {
    match body.get(field) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => value
            .as_u64()
            .filter(|&n| n > 0)
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| {
                Error::InvalidInput(format!("'{}' must be a positive integer, got {}", field, value))
            }),
    }
}

pub async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({
            "status": "healthy",
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION"),
        }))),
    )
}

pub async fn simulate(
    State(state): State<ApiState>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<ApiResponse<SimulationReport>>> {
    let allocation = parse::<StateRequest>(json_body(payload)?)?.into_state(&state)?;
    Ok(Json(ApiResponse::success(strategy::simulate(&allocation))))
}

pub async fn solve(
    State(state): State<ApiState>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<ApiResponse<SolveOutcome>>> {
    let request: SolveRequest = parse(json_body(payload)?)?;
    let strategy = request.strategy.parse()?;
    let allocation = request.state.into_state(&state)?;
    Ok(Json(ApiResponse::success(strategy::solve(&allocation, strategy))))
}

pub async fn generate(
    State(state): State<ApiState>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<ApiResponse<Scenario>>> {
    let body = json_body(payload)?;
    if !body.is_object() {
        return Err(Error::InvalidInput("request body must be a JSON object".to_string()));
    }

    let processes = positive_count(&body, "processes", DEFAULT_PROCESSES)?;
    let resources = positive_count(&body, "resources", DEFAULT_RESOURCES)?;
    let cores = positive_count(&body, "cores", DEFAULT_CORES)?;
    state.config.limits.check(processes, resources)?;
    state.config.limits.check_cores(cores)?;

    let seed = match body.get("seed") {
        None | Some(Value::Null) => None,
        Some(value) => Some(value.as_u64().ok_or_else(|| {
            Error::InvalidInput(format!("'seed' must be a non-negative integer, got {}", value))
        })?),
    };

    let scenario = match seed {
        Some(seed) => ScenarioGenerator::seeded(seed).generate(processes, resources, cores)?,
        None => ScenarioGenerator::from_entropy().generate(processes, resources, cores)?,
    };
    Ok(Json(ApiResponse::success(scenario)))
}

pub async fn check_compatibility(
    State(state): State<ApiState>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<ApiResponse<CompatibilityReport>>> {
    let request: CompatibilityRequest = parse(json_body(payload)?)?;
    state
        .config
        .limits
        .check(request.processes.len(), request.resources.len())?;

    let report = CompatibilityChecker::check(
        &request.process_id,
        &request.resource_id,
        &request.processes,
        &request.resources,
    );
    Ok(Json(ApiResponse::success(report)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_positive_count() {
        let body = json!({ "processes": 4, "resources": 0, "cores": 2.5, "seed": -1 });

        assert_eq!(positive_count(&body, "processes", 5).unwrap(), 4);
        assert_eq!(positive_count(&body, "missing", 5).unwrap(), 5);
        assert!(positive_count(&body, "resources", 3).is_err());
        assert!(positive_count(&body, "cores", 2).is_err());
        assert!(positive_count(&json!({ "cores": "2" }), "cores", 2).is_err());
    }

    #[test]
    fn test_state_request_respects_limits() {
        let state = ApiState::new(
            crate::config::ConfigBuilder::new(crate::config::Environment::Development)
                .with_max_processes(1)
                .build()
                .unwrap(),
        );
        let request: StateRequest = parse(json!({
            "processes": ["P1", "P2"],
            "resources": ["R1"],
            "allocation": [[0], [0]],
            "max_need": [[0], [0]],
            "available": [1],
        }))
        .unwrap();

        assert!(matches!(request.into_state(&state), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_solve_request_flattened() {
        let request: SolveRequest = parse(json!({
            "processes": ["P1"],
            "resources": ["R1"],
            "allocation": [[1]],
            "max_need": [[1]],
            "available": [0],
            "strategy": "Avoidance",
        }))
        .unwrap();
        assert_eq!(request.strategy, "Avoidance");
        assert_eq!(request.state.processes, vec!["P1"]);
    }

    #[test]
    fn test_compatibility_request_accepts_camel_case() {
        let request: CompatibilityRequest = parse(json!({
            "processId": "p1",
            "resourceId": "r1",
            "processes": [{ "id": "p1", "name": "Editor", "needs": ["r1"], "allocation": [] }],
            "resources": [{ "id": "r1", "name": "Printer", "held_by": null }],
        }))
        .unwrap();
        assert_eq!(request.process_id, "p1");
        assert!(request.resources[0].held_by.is_none());
    }
}
