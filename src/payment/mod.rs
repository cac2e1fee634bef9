//! Payment gateway adapters.
//!
//! Each external provider sits behind [`PaymentGateway`] and is dispatched
//! through a [`GatewayRegistry`] keyed by [`GatewayKind`]. `initiate` never
//! touches an order's payment status; `verify` only reports what the provider
//! says and leaves the state transition to the payment service.

pub mod cod;
pub mod esewa;
pub mod khalti;

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum GatewayKind {
    Esewa,
    Khalti,
    Cod,
}

impl GatewayKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayKind::Esewa => "esewa",
            GatewayKind::Khalti => "khalti",
            GatewayKind::Cod => "cod",
        }
    }

    pub fn parse(s: &str) -> Result<Self, AppError> {
        match s {
            "esewa" => Ok(GatewayKind::Esewa),
            "khalti" => Ok(GatewayKind::Khalti),
            "cod" => Ok(GatewayKind::Cod),
            other => Err(AppError::Validation(format!(
                "Invalid payment gateway '{other}'. Must be one of: esewa, khalti, cod"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InitiateContext {
    pub order_id: Uuid,
    pub amount: Decimal,
    pub product_label: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
}

/// Provider-specific redirect metadata handed back to the client.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InitiateOutcome {
    /// eSewa style: the client form-POSTs the signed fields to `payment_url`.
    FormRedirect {
        payment_url: String,
        fields: esewa::EsewaFormFields,
    },
    /// Khalti style: the provider already holds the session; the client just
    /// follows `payment_url` and keeps `pidx` for the later lookup.
    HostedRedirect { payment_url: String, pidx: String },
    /// Cash on delivery: nothing leaves the platform.
    NoRedirect,
}

/// Reference the client got back from the provider's redirect round trip.
#[derive(Debug, Clone)]
pub enum ProviderReference {
    RefId(String),
    Pidx(String),
}

#[derive(Debug, Clone)]
pub struct VerifyContext {
    pub order_id: Uuid,
    pub amount: Decimal,
    pub reference: ProviderReference,
}

#[derive(Debug, Clone)]
pub struct Verification {
    pub verified: bool,
    pub transaction_id: Option<String>,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider returned an unusable response: {0}")]
    BadResponse(String),

    #[error("missing {0} for this gateway")]
    MissingReference(&'static str),

    #[error("operation not supported by this gateway")]
    Unsupported,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn kind(&self) -> GatewayKind;

    async fn initiate(&self, ctx: &InitiateContext) -> Result<InitiateOutcome, GatewayError>;

    async fn verify(&self, ctx: &VerifyContext) -> Result<Verification, GatewayError>;
}

pub struct GatewayRegistry {
    gateways: HashMap<GatewayKind, Arc<dyn PaymentGateway>>,
}

impl GatewayRegistry {
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        // One client for all providers; the timeout bounds every initiate and
        // verify round trip so a hung provider cannot pin a request task.
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.gateway_timeout_secs))
            .build()?;

        let mut registry = Self {
            gateways: HashMap::new(),
        };
        registry.register(Arc::new(esewa::EsewaGateway::new(
            config.esewa.clone(),
            http.clone(),
        )));
        registry.register(Arc::new(khalti::KhaltiGateway::new(
            config.khalti.clone(),
            http,
        )));
        registry.register(Arc::new(cod::CodGateway));
        Ok(registry)
    }

    pub fn register(&mut self, gateway: Arc<dyn PaymentGateway>) {
        self.gateways.insert(gateway.kind(), gateway);
    }

    pub fn get(&self, kind: GatewayKind) -> Result<&Arc<dyn PaymentGateway>, AppError> {
        self.gateways
            .get(&kind)
            .ok_or_else(|| AppError::Validation(format!("Gateway '{}' is not configured", kind.as_str())))
    }
}

/// Two-decimal rendering used in signatures and provider payloads; the
/// provider compares these strings byte for byte.
pub(crate) fn format_amount(amount: Decimal) -> String {
    let mut amount = amount.round_dp(2);
    amount.rescale(2);
    amount.to_string()
}
