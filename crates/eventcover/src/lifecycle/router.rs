use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use super::domain::{
    EventDetails, EventSubmission, PaymentFilter, PaymentRequest, PolicyHolderDetails,
    PolicyHolderSubmission, PolicyNumber, PolicyStatusUpdate, QuoteDetails, QuoteFilter,
    QuoteNumber, QuoteSubmission, RecordId, VenueDetails,
};
use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::repository::{InsuranceRepository, NotificationPublisher, StoreError};
use super::service::{LifecycleError, QuoteLifecycleService};
use crate::pricing::calculate_premium;

type SharedService<R, N> = Arc<QuoteLifecycleService<R, N>>;

/// Router builder exposing the quote, policy and payment resources.
pub fn lifecycle_router<R, N>(service: SharedService<R, N>) -> Router
where
    R: InsuranceRepository + 'static,
    N: NotificationPublisher + 'static,
{
    Router::new()
        .route("/api/premium", post(premium_handler))
        .route(
            "/api/quotes",
            get(list_quotes_handler::<R, N>).post(create_quote_handler::<R, N>),
        )
        .route(
            "/api/quotes/:quote_number",
            get(get_quote_handler::<R, N>)
                .put(update_quote_handler::<R, N>)
                .delete(delete_quote_handler::<R, N>),
        )
        .route(
            "/api/quotes/:quote_number/complete",
            post(complete_quote_handler::<R, N>),
        )
        .route(
            "/api/quotes/:quote_number/convert",
            post(convert_quote_handler::<R, N>),
        )
        .route("/api/events", post(create_event_handler::<R, N>))
        .route(
            "/api/events/:id",
            get(get_event_handler::<R, N>)
                .put(update_event_handler::<R, N>)
                .delete(delete_event_handler::<R, N>),
        )
        .route("/api/venues", post(create_venue_handler))
        .route(
            "/api/venues/:id",
            get(get_venue_handler::<R, N>)
                .put(update_venue_handler::<R, N>)
                .delete(delete_venue_handler::<R, N>),
        )
        .route("/api/policy-holders", post(create_policy_holder_handler::<R, N>))
        .route(
            "/api/policy-holders/:id",
            get(get_policy_holder_handler::<R, N>)
                .put(update_policy_holder_handler::<R, N>)
                .delete(delete_policy_holder_handler::<R, N>),
        )
        .route(
            "/api/policies",
            get(list_policies_handler::<R, N>).post(create_policy_handler::<R, N>),
        )
        .route("/api/policies/export", get(export_policies_handler::<R, N>))
        .route(
            "/api/policies/:policy_number",
            get(get_policy_handler::<R, N>)
                .put(update_policy_handler::<R, N>)
                .delete(delete_policy_handler::<R, N>),
        )
        .route(
            "/api/payments",
            get(list_payments_handler::<R, N>).post(create_payment_handler::<R, N>),
        )
        .route(
            "/api/payments/:id",
            get(get_payment_handler::<R, N>)
                .put(update_payment_handler)
                .delete(delete_payment_handler),
        )
        .with_state(service)
}

impl LifecycleError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            LifecycleError::Validation(_)
            | LifecycleError::MissingStep { .. }
            | LifecycleError::QuoteNotComplete(_) => StatusCode::BAD_REQUEST,
            LifecycleError::PaymentDeclined(_) => StatusCode::PAYMENT_REQUIRED,
            LifecycleError::QuoteNotFound(_)
            | LifecycleError::PolicyNotFound(_)
            | LifecycleError::NotFound { .. }
            | LifecycleError::Store(StoreError::NotFound) => StatusCode::NOT_FOUND,
            LifecycleError::AlreadyConverted(_) | LifecycleError::Store(StoreError::Conflict(_)) => {
                StatusCode::CONFLICT
            }
            LifecycleError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            LifecycleError::Export(_) | LifecycleError::Store(StoreError::Unavailable(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

pub(crate) fn error_response(err: LifecycleError) -> Response {
    let status = err.status_code();
    if status.is_server_error() {
        error!(error = %err, "request failed");
    }
    let payload = json!({ "error": err.to_string() });
    (status, Json(payload)).into_response()
}

fn respond<T: Serialize>(status: StatusCode, result: Result<T, LifecycleError>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(err) => error_response(err),
    }
}

fn deleted(result: Result<(), LifecycleError>) -> Response {
    respond(StatusCode::OK, result.map(|()| json!({ "status": "deleted" })))
}

/// Raw wizard keys; unknown keys price at zero.
#[derive(Debug, Deserialize)]
pub(crate) struct PremiumRequest {
    pub(crate) coverage_level: u8,
    #[serde(default = "default_liability_key")]
    pub(crate) liability_option: String,
    pub(crate) guest_range: String,
    #[serde(default)]
    pub(crate) liquor_liability: bool,
}

fn default_liability_key() -> String {
    "none".to_string()
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConvertRequest {
    pub(crate) quote_number: QuoteNumber,
}

pub(crate) async fn premium_handler(ApiJson(request): ApiJson<PremiumRequest>) -> Response {
    let premium = calculate_premium(
        request.coverage_level,
        &request.liability_option,
        &request.guest_range,
        request.liquor_liability,
    );
    (StatusCode::OK, Json(premium)).into_response()
}

pub(crate) async fn list_quotes_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    ApiQuery(filter): ApiQuery<QuoteFilter>,
) -> Response
where
    R: InsuranceRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, service.list_quotes(&filter))
}

pub(crate) async fn create_quote_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    ApiJson(submission): ApiJson<QuoteSubmission>,
) -> Response
where
    R: InsuranceRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::CREATED, service.create_quote(submission))
}

pub(crate) async fn get_quote_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    ApiPath(quote_number): ApiPath<String>,
) -> Response
where
    R: InsuranceRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, service.quote_view(&QuoteNumber(quote_number)))
}

pub(crate) async fn update_quote_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    ApiPath(quote_number): ApiPath<String>,
    ApiJson(details): ApiJson<QuoteDetails>,
) -> Response
where
    R: InsuranceRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(
        StatusCode::OK,
        service.update_quote(&QuoteNumber(quote_number), details),
    )
}

pub(crate) async fn delete_quote_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    ApiPath(quote_number): ApiPath<String>,
) -> Response
where
    R: InsuranceRepository + 'static,
    N: NotificationPublisher + 'static,
{
    deleted(service.delete_quote(&QuoteNumber(quote_number)))
}

pub(crate) async fn complete_quote_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    ApiPath(quote_number): ApiPath<String>,
) -> Response
where
    R: InsuranceRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(
        StatusCode::OK,
        service.complete_quote(&QuoteNumber(quote_number)),
    )
}

pub(crate) async fn convert_quote_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    ApiPath(quote_number): ApiPath<String>,
) -> Response
where
    R: InsuranceRepository + 'static,
    N: NotificationPublisher + 'static,
{
    convert(&service, QuoteNumber(quote_number))
}

fn convert<R, N>(service: &QuoteLifecycleService<R, N>, quote_number: QuoteNumber) -> Response
where
    R: InsuranceRepository + 'static,
    N: NotificationPublisher + 'static,
{
    match service.convert_quote(&quote_number) {
        Ok(issue) => {
            let status = if issue.was_created() {
                StatusCode::CREATED
            } else {
                StatusCode::OK
            };
            (status, Json(issue.into_policy())).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn create_event_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    ApiJson(submission): ApiJson<EventSubmission>,
) -> Response
where
    R: InsuranceRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let result = service
        .save_event(submission)
        .map(|(event, venue)| json!({ "event": event, "venue": venue }));
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn get_event_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    ApiPath(id): ApiPath<RecordId>,
) -> Response
where
    R: InsuranceRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, service.get_event(id))
}

pub(crate) async fn update_event_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    ApiPath(id): ApiPath<RecordId>,
    ApiJson(details): ApiJson<EventDetails>,
) -> Response
where
    R: InsuranceRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, service.update_event(id, details))
}

pub(crate) async fn delete_event_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    ApiPath(id): ApiPath<RecordId>,
) -> Response
where
    R: InsuranceRepository + 'static,
    N: NotificationPublisher + 'static,
{
    deleted(service.delete_event(id))
}

/// Venues are created together with their event.
pub(crate) async fn create_venue_handler() -> Response {
    error_response(LifecycleError::NotImplemented(
        "standalone venue creation; submit the venue with its event",
    ))
}

pub(crate) async fn get_venue_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    ApiPath(id): ApiPath<RecordId>,
) -> Response
where
    R: InsuranceRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, service.get_venue(id))
}

pub(crate) async fn update_venue_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    ApiPath(id): ApiPath<RecordId>,
    ApiJson(details): ApiJson<VenueDetails>,
) -> Response
where
    R: InsuranceRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, service.update_venue(id, details))
}

pub(crate) async fn delete_venue_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    ApiPath(id): ApiPath<RecordId>,
) -> Response
where
    R: InsuranceRepository + 'static,
    N: NotificationPublisher + 'static,
{
    deleted(service.delete_venue(id))
}

pub(crate) async fn create_policy_holder_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    ApiJson(submission): ApiJson<PolicyHolderSubmission>,
) -> Response
where
    R: InsuranceRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::CREATED, service.save_policy_holder(submission))
}

pub(crate) async fn get_policy_holder_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    ApiPath(id): ApiPath<RecordId>,
) -> Response
where
    R: InsuranceRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, service.get_policy_holder(id))
}

pub(crate) async fn update_policy_holder_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    ApiPath(id): ApiPath<RecordId>,
    ApiJson(details): ApiJson<PolicyHolderDetails>,
) -> Response
where
    R: InsuranceRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, service.update_policy_holder(id, details))
}

pub(crate) async fn delete_policy_holder_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    ApiPath(id): ApiPath<RecordId>,
) -> Response
where
    R: InsuranceRepository + 'static,
    N: NotificationPublisher + 'static,
{
    deleted(service.delete_policy_holder(id))
}

pub(crate) async fn list_policies_handler<R, N>(
    State(service): State<SharedService<R, N>>,
) -> Response
where
    R: InsuranceRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, service.list_policies())
}

pub(crate) async fn create_policy_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    ApiJson(request): ApiJson<ConvertRequest>,
) -> Response
where
    R: InsuranceRepository + 'static,
    N: NotificationPublisher + 'static,
{
    convert(&service, request.quote_number)
}

pub(crate) async fn export_policies_handler<R, N>(
    State(service): State<SharedService<R, N>>,
) -> Response
where
    R: InsuranceRepository + 'static,
    N: NotificationPublisher + 'static,
{
    match service.export_policies_csv() {
        Ok(csv) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
            csv,
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn get_policy_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    ApiPath(policy_number): ApiPath<String>,
) -> Response
where
    R: InsuranceRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(
        StatusCode::OK,
        service.get_policy(&PolicyNumber(policy_number)),
    )
}

pub(crate) async fn update_policy_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    ApiPath(policy_number): ApiPath<String>,
    ApiJson(update): ApiJson<PolicyStatusUpdate>,
) -> Response
where
    R: InsuranceRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(
        StatusCode::OK,
        service.update_policy_status(&PolicyNumber(policy_number), update),
    )
}

pub(crate) async fn delete_policy_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    ApiPath(policy_number): ApiPath<String>,
) -> Response
where
    R: InsuranceRepository + 'static,
    N: NotificationPublisher + 'static,
{
    deleted(service.delete_policy(&PolicyNumber(policy_number)))
}

pub(crate) async fn list_payments_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    ApiQuery(filter): ApiQuery<PaymentFilter>,
) -> Response
where
    R: InsuranceRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, service.list_payments(&filter))
}

pub(crate) async fn create_payment_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    ApiJson(request): ApiJson<PaymentRequest>,
) -> Response
where
    R: InsuranceRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::CREATED, service.record_payment(request))
}

pub(crate) async fn get_payment_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    ApiPath(id): ApiPath<RecordId>,
) -> Response
where
    R: InsuranceRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, service.get_payment(id))
}

pub(crate) async fn update_payment_handler() -> Response {
    error_response(LifecycleError::NotImplemented("payment amendment"))
}

pub(crate) async fn delete_payment_handler() -> Response {
    error_response(LifecycleError::NotImplemented("payment reversal"))
}
