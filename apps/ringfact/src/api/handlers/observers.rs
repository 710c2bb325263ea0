//! Observer registration, output recording and zone profiles.

use axum::{Json, extract::State, http::StatusCode};
use ringfact_core::{
    Grade, Milli, ObserverOutput, RingfactError, observer::hamming_distance,
    primitives::DEFAULT_QUANTUM,
};

use std::sync::Arc;

use super::{blocking, now_unix};
use crate::api::AppState;
use crate::api::error::{ApiError, ApiJson, ApiPath};
use crate::api::types::{
    ObserverProfileResponse, RecordOutputRequest, RegisterObserverRequest, parse_distance,
};

fn observer_error(error: RingfactError) -> ApiError {
    match error {
        RingfactError::NotFound(message) => {
            ApiError::not_found(message, "Register the agent first with POST /observers.")
        }
        other => other.into(),
    }
}

/// Distance of one output: given directly, or the Hamming distance between
/// a claimed and a derived value. Neither means zero.
fn output_distance(request: &RecordOutputRequest) -> Result<Milli, ApiError> {
    match (&request.distance, request.claimed, request.derived) {
        (Some(distance), None, None) => Ok(parse_distance(distance)?),
        (None, Some(claimed), Some(derived)) => Ok(hamming_distance(claimed, derived)),
        (None, None, None) => Ok(Milli::ZERO),
        (None, _, _) => Err(ApiError::param(
            "claimed",
            "claimed and derived must be given together",
        )),
        (Some(_), _, _) => Err(ApiError::param(
            "distance",
            "give either distance or claimed and derived, not both",
        )),
    }
}

/// `POST /observers`
///
/// Registry calls may touch the redb file, so they run on the blocking pool
/// and take the lock there.
pub async fn register_observer_handler(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterObserverRequest>,
) -> Result<(StatusCode, Json<ObserverProfileResponse>), ApiError> {
    let observers = Arc::clone(&state.observers);
    let record = blocking(move || {
        Ok(observers.blocking_write().register(
            &request.agent_id,
            request.quantum.unwrap_or(DEFAULT_QUANTUM),
            request.capacity,
            &request.founding_derivation,
            now_unix(),
        )?)
    })
    .await?;
    tracing::info!(
        event = "observer_registered",
        agent_id = %record.agent_id,
        zone = record.zone.name(),
        "Observer registered"
    );
    Ok((
        StatusCode::CREATED,
        Json(ObserverProfileResponse::new(&record, false)),
    ))
}

/// `POST /observers/{agent}/outputs`
pub async fn record_output_handler(
    State(state): State<AppState>,
    ApiPath(agent_id): ApiPath<String>,
    ApiJson(request): ApiJson<RecordOutputRequest>,
) -> Result<Json<ObserverProfileResponse>, ApiError> {
    let grade = Grade::from_letter(&request.grade)
        .ok_or_else(|| ApiError::param("grade", "expected one of A, B, C, D"))?;
    let distance = output_distance(&request)?;
    let now = now_unix();
    let output = ObserverOutput {
        grade,
        derivation_id: request.derivation_id,
        distance,
        recorded_at: now,
    };

    let observers = Arc::clone(&state.observers);
    let (record, changed) = blocking(move || {
        observers
            .blocking_write()
            .record(&agent_id, output, now)
            .map_err(observer_error)
    })
    .await?;
    if changed {
        tracing::info!(
            event = "zone_transition",
            agent_id = %record.agent_id,
            zone = record.zone.name(),
            "Observer changed zone"
        );
    }
    Ok(Json(ObserverProfileResponse::new(&record, changed)))
}

/// `GET /observers/{agent}`: profile with the zone recomputed.
///
/// Served under the read lock; the write lock is taken only when the
/// recomputed zone has to be persisted.
pub async fn profile_handler(
    State(state): State<AppState>,
    ApiPath(agent_id): ApiPath<String>,
) -> Result<Json<ObserverProfileResponse>, ApiError> {
    let observers = Arc::clone(&state.observers);
    let (record, changed) = blocking(move || {
        let now = now_unix();
        let (record, changed) = observers
            .blocking_read()
            .preview(&agent_id, now)
            .map_err(observer_error)?;
        if !changed {
            return Ok((record, false));
        }
        observers
            .blocking_write()
            .profile(&agent_id, now)
            .map_err(observer_error)
    })
    .await?;
    Ok(Json(ObserverProfileResponse::new(&record, changed)))
}
