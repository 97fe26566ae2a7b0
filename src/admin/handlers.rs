use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::admin::AdminState;
use crate::balancer::BackendStatus;
use crate::load_balancer::{AddOutcome, RemoveOutcome};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub health_monitor_running: bool,
    pub backends: usize,
    pub healthy_backends: usize,
}

#[derive(Debug, Deserialize)]
pub struct AddBackendRequest {
    pub address: String,
}

#[derive(Debug, Serialize)]
pub struct MembershipResponse<O> {
    pub address: String,
    pub outcome: O,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let pool = state.balancer.pool();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        health_monitor_running: state.balancer.monitor().is_running(),
        backends: pool.len(),
        healthy_backends: pool.healthy().len(),
    })
}

pub async fn get_backends(State(state): State<AdminState>) -> Json<Vec<BackendStatus>> {
    Json(state.balancer.backends())
}

pub async fn add_backend(
    State(state): State<AdminState>,
    Json(request): Json<AddBackendRequest>,
) -> Result<(StatusCode, Json<MembershipResponse<AddOutcome>>), (StatusCode, Json<ErrorResponse>)> {
    match state.balancer.add_server(&request.address) {
        Ok(outcome) => {
            let status = match outcome {
                AddOutcome::Added => StatusCode::CREATED,
                AddOutcome::AlreadyPresent => StatusCode::OK,
            };
            Ok((status, Json(MembershipResponse { address: request.address, outcome })))
        }
        Err(e) => Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse { error: e.to_string() }),
        )),
    }
}

pub async fn remove_backend(
    State(state): State<AdminState>,
    Path(address): Path<String>,
) -> (StatusCode, Json<MembershipResponse<RemoveOutcome>>) {
    let outcome = state.balancer.remove_server(&address);
    let status = match outcome {
        RemoveOutcome::Removed => StatusCode::OK,
        RemoveOutcome::NotPresent => StatusCode::NOT_FOUND,
    };
    (status, Json(MembershipResponse { address, outcome }))
}

pub async fn run_health_check(State(state): State<AdminState>) -> Json<Vec<BackendStatus>> {
    state.balancer.check_now().await;
    Json(state.balancer.backends())
}
