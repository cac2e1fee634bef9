use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::payment::{GatewayKind, InitiateOutcome};

#[derive(Debug, Deserialize, ToSchema)]
pub struct InitiatePaymentRequest {
    pub order_id: Uuid,
    pub gateway: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InitiatePaymentResponse {
    pub success: bool,
    pub gateway: GatewayKind,
    pub data: InitiateOutcome,
}

/// `ref_id` belongs to the redirect-wallet flow, `pidx` to the hosted flow;
/// exactly one is expected depending on `gateway`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyPaymentRequest {
    pub order_id: Uuid,
    pub gateway: String,
    pub ref_id: Option<String>,
    pub pidx: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyPaymentResponse {
    pub success: bool,
    pub order_id: Uuid,
    pub transaction_id: Option<String>,
}
