//! # Rental Routes
//!
//! The command surface and the read surfaces. Handlers carry no business
//! logic: the engine authorizes, guards, and commits; the store serves
//! reads.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use lendloop_core::{ItemId, Money, PartyId, RentalId, Timestamp};
use lendloop_engine::RentalStore;
use lendloop_state::{
    Actor, Command, CommandPayload, HandoffDirection, HandoffInspection, LedgerEntry, RentalRecord,
    RentalStatus,
};

use crate::error::AppError;
use crate::state::AppState;

/// The rental route table.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/rentals", post(create_rental))
        .route("/v1/rentals/{id}", get(get_rental))
        .route("/v1/rentals/{id}/ledger", get(get_ledger))
        .route("/v1/rentals/{id}/attempt", post(attempt))
        .route("/v1/rentals/{id}/inspections", post(record_inspection))
}

// ─── Request / Response Types ────────────────────────────────────────

/// Body of `POST /v1/rentals`.
#[derive(Debug, Deserialize)]
pub struct CreateRentalRequest {
    /// The requesting party.
    pub requester: PartyId,
    /// The providing party.
    pub provider: PartyId,
    /// The item being rented.
    pub item: ItemId,
    /// The amount to hold at payment.
    pub price: Money,
    /// Start of the rental window (RFC 3339).
    pub start_date: Timestamp,
    /// End of the rental window (RFC 3339).
    pub end_date: Timestamp,
}

/// Body of `POST /v1/rentals/{id}/attempt`.
#[derive(Debug, Deserialize)]
pub struct AttemptRequest {
    /// The lifecycle command to attempt.
    pub command: Command,
    /// The identity issuing the command.
    pub actor: Actor,
    /// Command-specific data.
    #[serde(default)]
    pub payload: CommandPayload,
}

/// Response of a successful attempt.
#[derive(Debug, Serialize)]
pub struct AttemptResponse {
    /// The record that transitioned.
    pub record_id: String,
    /// The status before the transition.
    pub old_status: RentalStatus,
    /// The status after the transition.
    pub new_status: RentalStatus,
}

/// Body of `POST /v1/rentals/{id}/inspections`.
#[derive(Debug, Deserialize)]
pub struct InspectionRequest {
    /// Outbound or inbound.
    pub direction: HandoffDirection,
    /// The party whose signature seals the inspection.
    pub signing_party: PartyId,
    /// Whether the signature has been applied.
    pub signed: bool,
    /// Condition evidence references.
    #[serde(default)]
    pub evidence: Vec<String>,
    /// Free-text condition notes.
    #[serde(default)]
    pub notes: Option<String>,
}

// ─── Handlers ────────────────────────────────────────────────────────

async fn create_rental(
    State(state): State<AppState>,
    Json(req): Json<CreateRentalRequest>,
) -> Result<(StatusCode, Json<RentalRecord>), AppError> {
    if req.end_date < req.start_date {
        return Err(AppError::Validation(
            "end_date precedes start_date".to_string(),
        ));
    }
    let record = RentalRecord::new(
        req.requester,
        req.provider,
        req.item,
        req.price,
        req.start_date,
        req.end_date,
    );
    state.engine.store().insert_record(record.clone()).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn get_rental(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RentalRecord>, AppError> {
    let record = state
        .engine
        .store()
        .fetch_record(&RentalId::from_uuid(id))
        .await?;
    Ok(Json(record))
}

async fn get_ledger(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<LedgerEntry>>, AppError> {
    let entries = state
        .engine
        .store()
        .ledger(&RentalId::from_uuid(id))
        .await?;
    Ok(Json(entries))
}

async fn attempt(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AttemptRequest>,
) -> Result<Json<AttemptResponse>, AppError> {
    let outcome = state
        .engine
        .attempt(
            &RentalId::from_uuid(id),
            req.command,
            &req.actor,
            req.payload,
        )
        .await?;
    Ok(Json(AttemptResponse {
        record_id: outcome.record_id.to_string(),
        old_status: outcome.old_status,
        new_status: outcome.new_status,
    }))
}

async fn record_inspection(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<InspectionRequest>,
) -> Result<StatusCode, AppError> {
    let mut inspection = HandoffInspection::draft(
        RentalId::from_uuid(id),
        req.direction,
        req.signing_party,
    );
    inspection.signed = req.signed;
    inspection.evidence = req.evidence;
    inspection.notes = req.notes;
    state.engine.store().record_inspection(inspection).await?;
    Ok(StatusCode::NO_CONTENT)
}
