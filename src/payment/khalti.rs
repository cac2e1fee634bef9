//! Khalti epayment v2: the session is opened server side, the customer pays
//! on the hosted page, and the `pidx` handed back at initiation drives the
//! lookup during verification.

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use serde_json::json;

use crate::config::KhaltiConfig;

use super::{
    GatewayError, GatewayKind, InitiateContext, InitiateOutcome, PaymentGateway,
    ProviderReference, Verification, VerifyContext,
};

#[derive(Debug, Deserialize)]
struct InitiateResponse {
    pidx: Option<String>,
    payment_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    pidx: Option<String>,
    status: Option<String>,
    transaction_id: Option<String>,
}

pub struct KhaltiGateway {
    config: KhaltiConfig,
    http: reqwest::Client,
}

impl KhaltiGateway {
    pub fn new(config: KhaltiConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    fn auth_header(&self) -> String {
        format!("Key {}", self.config.secret_key)
    }
}

/// Khalti amounts are integer paisa (1 Re = 100 paisa).
pub fn to_paisa(amount: rust_decimal::Decimal) -> i64 {
    (amount * rust_decimal::Decimal::from(100))
        .round()
        .to_i64()
        .unwrap_or(0)
}

#[async_trait]
impl PaymentGateway for KhaltiGateway {
    fn kind(&self) -> GatewayKind {
        GatewayKind::Khalti
    }

    async fn initiate(&self, ctx: &InitiateContext) -> Result<InitiateOutcome, GatewayError> {
        let payload = json!({
            "return_url": format!("{}?oid={}&gateway=khalti", self.config.return_url, ctx.order_id),
            "website_url": self.config.website_url,
            "amount": to_paisa(ctx.amount),
            "purchase_order_id": ctx.order_id,
            "purchase_order_name": ctx.product_label,
            "customer_info": {
                "name": ctx.customer_name,
                "email": ctx.customer_email,
                "phone": ctx.customer_phone.as_deref().unwrap_or("9800000000"),
            },
        });

        let response = self
            .http
            .post(format!("{}/epayment/initiate/", self.config.base_url))
            .header(reqwest::header::AUTHORIZATION, self.auth_header())
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GatewayError::BadResponse(format!(
                "initiate endpoint returned {}",
                response.status()
            )));
        }

        let body: InitiateResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::BadResponse(e.to_string()))?;

        match (body.payment_url, body.pidx) {
            (Some(payment_url), Some(pidx)) => {
                Ok(InitiateOutcome::HostedRedirect { payment_url, pidx })
            }
            _ => Err(GatewayError::BadResponse(
                "response missing payment_url or pidx".into(),
            )),
        }
    }

    async fn verify(&self, ctx: &VerifyContext) -> Result<Verification, GatewayError> {
        let pidx = match &ctx.reference {
            ProviderReference::Pidx(p) if !p.is_empty() => p.clone(),
            _ => return Err(GatewayError::MissingReference("pidx")),
        };

        let response = self
            .http
            .post(format!("{}/epayment/lookup/", self.config.base_url))
            .header(reqwest::header::AUTHORIZATION, self.auth_header())
            .json(&json!({ "pidx": pidx }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GatewayError::BadResponse(format!(
                "lookup endpoint returned {}",
                response.status()
            )));
        }

        let body: LookupResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::BadResponse(e.to_string()))?;

        if body.pidx.is_none() {
            return Err(GatewayError::BadResponse("lookup response missing pidx".into()));
        }

        Ok(Verification {
            verified: body.status.as_deref() == Some("Completed"),
            transaction_id: body.transaction_id,
        })
    }
}
