//! JSON request layer over the landing and scenario services.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Datelike, Utc};
use funnel_core::{
    ApplicationError, DomainError, InterfaceError, LandingService, LandingView, NewScenario,
    PeriodFilter, ScenarioId, ScenarioService, SimulationOutcome, SimulationScenario,
    StatusLabels, WeightEntry, WeightKind, WeightMapping,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct ApiState {
    pub landing: Arc<LandingService>,
    pub scenarios: Arc<ScenarioService>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/landing", get(get_landing))
        .route("/api/v1/landing/sync", post(force_sync))
        .route("/api/v1/landing/last-sync", get(last_sync))
        .route("/api/v1/landing/simulate", post(simulate))
        .route("/api/v1/status-maps", get(status_maps))
        .route("/api/v1/weights/{kind}", get(list_weights).put(put_weight))
        .route("/api/v1/scenarios", get(list_scenarios).post(create_scenario))
        .route("/api/v1/scenarios/{id}", delete(delete_scenario))
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub correlation_id: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            body: ErrorBody { error: message.into(), correlation_id: correlation_id() },
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        ApplicationError::Domain(DomainError::InvariantViolation(message.into())).into()
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        let interface = error.into_interface(correlation_id());
        let (status, message) = match &interface {
            InterfaceError::BadRequest { message, .. } => {
                (StatusCode::BAD_REQUEST, message.clone())
            }
            InterfaceError::ServiceUnavailable { message, .. } => {
                warn!(
                    event_name = "funnel.api.service_unavailable",
                    correlation_id = interface.correlation_id(),
                    error = %message,
                    "request failed on an unavailable dependency"
                );
                (StatusCode::SERVICE_UNAVAILABLE, interface.user_message().to_string())
            }
            InterfaceError::Internal { message, .. } => {
                error!(
                    event_name = "funnel.api.internal_error",
                    correlation_id = interface.correlation_id(),
                    error = %message,
                    "request failed"
                );
                (StatusCode::INTERNAL_SERVER_ERROR, interface.user_message().to_string())
            }
        };
        Self {
            status,
            body: ErrorBody { error: message, correlation_id: interface.correlation_id().into() },
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        ApplicationError::from(error).into()
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

fn correlation_id() -> String {
    format!("req-{}", Uuid::new_v4())
}

#[derive(Debug, Default, Deserialize)]
pub struct PeriodParams {
    pub year: Option<i32>,
    pub quarter: Option<u8>,
}

impl PeriodParams {
    /// Missing year means the current calendar year.
    fn resolve(&self) -> Result<PeriodFilter, DomainError> {
        PeriodFilter::new(self.year.unwrap_or_else(|| Utc::now().year()), self.quarter)
    }
}

#[derive(Debug, Deserialize)]
pub struct SimulateRequest {
    #[serde(flatten)]
    pub period: PeriodParams,
    #[serde(default)]
    pub quotation_weights: WeightMapping,
    #[serde(default)]
    pub opportunity_weights: WeightMapping,
}

#[derive(Debug, Deserialize)]
pub struct WeightUpdate {
    pub code: String,
    pub label: String,
    pub weight: Decimal,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LastSyncResponse {
    pub period: PeriodFilter,
    pub last_sync: Option<DateTime<Utc>>,
}

async fn get_landing(
    State(state): State<ApiState>,
    params: Result<Query<PeriodParams>, QueryRejection>,
) -> Result<Json<LandingView>, ApiError> {
    let Query(params) = params?;
    Ok(Json(state.landing.get_landing(params.resolve()?).await?))
}

async fn force_sync(
    State(state): State<ApiState>,
    body: Result<Json<PeriodParams>, JsonRejection>,
) -> Result<Json<LandingView>, ApiError> {
    let Json(params) = body?;
    Ok(Json(state.landing.force_sync(params.resolve()?).await?))
}

async fn last_sync(
    State(state): State<ApiState>,
    params: Result<Query<PeriodParams>, QueryRejection>,
) -> Result<Json<LastSyncResponse>, ApiError> {
    let Query(params) = params?;
    let period = params.resolve()?;
    let last_sync = state.landing.last_sync(period).await?;
    Ok(Json(LastSyncResponse { period, last_sync }))
}

async fn simulate(
    State(state): State<ApiState>,
    body: Result<Json<SimulateRequest>, JsonRejection>,
) -> Result<Json<SimulationOutcome>, ApiError> {
    let Json(request) = body?;
    let period = request.period.resolve()?;
    let outcome = state
        .landing
        .simulate(period, &request.quotation_weights, &request.opportunity_weights)
        .await?;
    Ok(Json(outcome))
}

async fn status_maps(State(state): State<ApiState>) -> Json<StatusLabels> {
    Json(state.landing.labels().clone())
}

fn weight_kind(raw: &str) -> Result<WeightKind, ApiError> {
    WeightKind::parse(raw)
        .ok_or_else(|| ApiError::bad_request(format!("unknown weight kind `{raw}`")))
}

async fn list_weights(
    State(state): State<ApiState>,
    Path(kind): Path<String>,
) -> Result<Json<Vec<WeightEntry>>, ApiError> {
    let kind = weight_kind(&kind)?;
    Ok(Json(state.landing.weights(kind).await?))
}

async fn put_weight(
    State(state): State<ApiState>,
    Path(kind): Path<String>,
    body: Result<Json<WeightUpdate>, JsonRejection>,
) -> Result<Json<WeightEntry>, ApiError> {
    let kind = weight_kind(&kind)?;
    let Json(update) = body?;
    let entry = state
        .landing
        .upsert_weight(kind, &update.code, &update.label, update.weight, update.description)
        .await?;
    Ok(Json(entry))
}

async fn list_scenarios(
    State(state): State<ApiState>,
) -> Result<Json<Vec<SimulationScenario>>, ApiError> {
    Ok(Json(state.scenarios.list().await?))
}

async fn create_scenario(
    State(state): State<ApiState>,
    body: Result<Json<NewScenario>, JsonRejection>,
) -> Result<(StatusCode, Json<SimulationScenario>), ApiError> {
    let Json(scenario) = body?;
    Ok((StatusCode::CREATED, Json(state.scenarios.save(scenario).await?)))
}

async fn delete_scenario(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.scenarios.delete(&ScenarioId(id.clone())).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("scenario `{id}` not found")))
    }
}
