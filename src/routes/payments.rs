use axum::{Json, Router, extract::State, routing::post};

use crate::{
    dto::payments::{
        InitiatePaymentRequest, InitiatePaymentResponse, VerifyPaymentRequest,
        VerifyPaymentResponse,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::payment_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/initiate", post(initiate_payment))
        .route("/verify", post(verify_payment))
}

#[utoipa::path(
    post,
    path = "/api/payment/initiate",
    request_body = InitiatePaymentRequest,
    responses(
        (status = 200, description = "Gateway selected; redirect metadata returned", body = ApiResponse<InitiatePaymentResponse>),
        (status = 400, description = "Invalid gateway or order already paid"),
        (status = 403, description = "Order not owned by caller"),
        (status = 404, description = "Order not found"),
        (status = 502, description = "Provider unreachable"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn initiate_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<InitiatePaymentRequest>,
) -> AppResult<Json<ApiResponse<InitiatePaymentResponse>>> {
    let resp = payment_service::initiate_payment(&state, &user, payload).await?;
    Ok(Json(resp))
}

// No auth here: the request arrives from the provider redirect round trip,
// carrying only the provider reference. The order id alone is not enough to
// mark anything paid; the provider lookup is.
#[utoipa::path(
    post,
    path = "/api/payment/verify",
    request_body = VerifyPaymentRequest,
    responses(
        (status = 200, description = "Payment confirmed (idempotent)", body = ApiResponse<VerifyPaymentResponse>),
        (status = 400, description = "Verification failed; order left unpaid and retryable"),
        (status = 404, description = "Order not found"),
    ),
    tag = "Payments"
)]
pub async fn verify_payment(
    State(state): State<AppState>,
    Json(payload): Json<VerifyPaymentRequest>,
) -> AppResult<Json<ApiResponse<VerifyPaymentResponse>>> {
    let resp = payment_service::verify_payment(&state, payload).await?;
    Ok(Json(resp))
}
