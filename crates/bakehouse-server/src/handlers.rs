use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use bakehouse_engine::CreateBakeRequest;
use bakehouse_ledger::LedgerEntry;
use bakehouse_types::{Agent, Bake, BakehouseError, Submission};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/agents", post(register_agent).get(list_agents))
        .route("/api/v1/agents/{agent_id}", get(get_agent))
        .route("/api/v1/agents/{agent_id}/balance", get(get_balance))
        .route("/api/v1/agents/{agent_id}/ledger", get(get_ledger))
        .route("/api/v1/bakes", post(create_bake).get(list_bakes))
        .route("/api/v1/bakes/{bake_id}", get(get_bake))
        .route("/api/v1/bakes/{bake_id}/cancel", post(cancel_bake))
        .route(
            "/api/v1/bakes/{bake_id}/submissions",
            post(create_submission).get(list_submissions),
        )
        .route("/api/v1/bakes/{bake_id}/winner", post(select_winner))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// Map engine errors onto transport status codes.
fn status_for(err: &BakehouseError) -> StatusCode {
    match err {
        BakehouseError::Validation(_) => StatusCode::BAD_REQUEST,
        BakehouseError::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,
        BakehouseError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        BakehouseError::AgentNotFound(_)
        | BakehouseError::BakeNotFound(_)
        | BakehouseError::SubmissionNotFound(_) => StatusCode::NOT_FOUND,
        BakehouseError::Forbidden(_) => StatusCode::FORBIDDEN,
        BakehouseError::Conflict(_) => StatusCode::CONFLICT,
        BakehouseError::TransientStore(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn reject(err: BakehouseError) -> (StatusCode, String) {
    (status_for(&err), err.to_string())
}

#[derive(serde::Deserialize)]
struct RegisterAgentRequest {
    name: String,
}

async fn register_agent(
    State(state): State<AppState>,
    Json(req): Json<RegisterAgentRequest>,
) -> Result<(StatusCode, Json<Agent>), (StatusCode, String)> {
    let agent = state
        .engine
        .register_agent(&req.name)
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(agent)))
}

async fn list_agents(State(state): State<AppState>) -> Json<Vec<Agent>> {
    Json(state.engine.list_agents().await)
}

async fn get_agent(
    State(state): State<AppState>,
    Path(agent_id): Path<Uuid>,
) -> Result<Json<Agent>, (StatusCode, String)> {
    state.engine.agent(agent_id).await.map(Json).map_err(reject)
}

#[derive(serde::Serialize)]
struct BalanceResponse {
    agent_id: Uuid,
    balance: i64,
}

async fn get_balance(
    State(state): State<AppState>,
    Path(agent_id): Path<Uuid>,
) -> Result<Json<BalanceResponse>, (StatusCode, String)> {
    let balance = state.engine.balance(agent_id).await.map_err(reject)?;
    Ok(Json(BalanceResponse { agent_id, balance }))
}

async fn get_ledger(
    State(state): State<AppState>,
    Path(agent_id): Path<Uuid>,
) -> Result<Json<Vec<LedgerEntry>>, (StatusCode, String)> {
    state
        .engine
        .statement(agent_id)
        .await
        .map(Json)
        .map_err(reject)
}

#[derive(serde::Deserialize)]
struct CreateBakeBody {
    creator_id: Uuid,
    title: String,
    description: String,
    category: String,
    bounty: i64,
    deadline: DateTime<Utc>,
}

async fn create_bake(
    State(state): State<AppState>,
    Json(body): Json<CreateBakeBody>,
) -> Result<(StatusCode, Json<Bake>), (StatusCode, String)> {
    let req = CreateBakeRequest {
        title: body.title,
        description: body.description,
        category: body.category,
        bounty: body.bounty,
        deadline: body.deadline,
    };
    let bake = state
        .engine
        .create_bake(body.creator_id, req)
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(bake)))
}

async fn list_bakes(State(state): State<AppState>) -> Json<Vec<Bake>> {
    Json(state.engine.list_bakes().await)
}

async fn get_bake(
    State(state): State<AppState>,
    Path(bake_id): Path<Uuid>,
) -> Result<Json<Bake>, (StatusCode, String)> {
    state.engine.bake(bake_id).await.map(Json).map_err(reject)
}

#[derive(serde::Deserialize)]
struct CancelBakeBody {
    requester_id: Uuid,
}

async fn cancel_bake(
    State(state): State<AppState>,
    Path(bake_id): Path<Uuid>,
    Json(body): Json<CancelBakeBody>,
) -> Result<Json<Bake>, (StatusCode, String)> {
    state
        .engine
        .cancel_bake(bake_id, body.requester_id)
        .await
        .map_err(reject)?;
    state.engine.bake(bake_id).await.map(Json).map_err(reject)
}

#[derive(serde::Deserialize)]
struct CreateSubmissionBody {
    agent_id: Uuid,
}

async fn create_submission(
    State(state): State<AppState>,
    Path(bake_id): Path<Uuid>,
    Json(body): Json<CreateSubmissionBody>,
) -> Result<(StatusCode, Json<Submission>), (StatusCode, String)> {
    let submission = state
        .engine
        .submit(bake_id, body.agent_id)
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(submission)))
}

async fn list_submissions(
    State(state): State<AppState>,
    Path(bake_id): Path<Uuid>,
) -> Result<Json<Vec<Submission>>, (StatusCode, String)> {
    state
        .engine
        .submissions(bake_id)
        .await
        .map(Json)
        .map_err(reject)
}

#[derive(serde::Deserialize)]
struct SelectWinnerBody {
    submission_id: Uuid,
    requester_id: Uuid,
}

async fn select_winner(
    State(state): State<AppState>,
    Path(bake_id): Path<Uuid>,
    Json(body): Json<SelectWinnerBody>,
) -> Result<Json<Bake>, (StatusCode, String)> {
    state
        .engine
        .select_winner(bake_id, body.submission_id, body.requester_id)
        .await
        .map_err(reject)?;
    state.engine.bake(bake_id).await.map(Json).map_err(reject)
}
