//! eSewa epay v2: the client form-POSTs an HMAC-signed field set to the
//! wallet, then the server confirms the transaction against the status
//! endpoint before anything is marked paid.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use utoipa::ToSchema;

use crate::config::EsewaConfig;

use super::{
    format_amount, GatewayError, GatewayKind, InitiateContext, InitiateOutcome, PaymentGateway,
    ProviderReference, Verification, VerifyContext,
};

type HmacSha256 = Hmac<Sha256>;

/// Field set the client submits to the wallet. Field names follow the
/// provider's form contract and must not be renamed.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EsewaFormFields {
    pub amount: String,
    pub tax_amount: String,
    pub total_amount: String,
    pub transaction_uuid: String,
    pub product_code: String,
    pub product_service_charge: String,
    pub product_delivery_charge: String,
    pub success_url: String,
    pub failure_url: String,
    pub signed_field_names: String,
    pub signature: String,
}

#[derive(Debug, Deserialize)]
pub struct EsewaStatusResponse {
    pub status: String,
    #[serde(default)]
    pub ref_id: Option<String>,
}

pub struct EsewaGateway {
    config: EsewaConfig,
    http: reqwest::Client,
}

impl EsewaGateway {
    pub fn new(config: EsewaConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    /// The signature covers exactly the fields named in `signed_field_names`,
    /// in order, as `key=value` pairs joined by commas.
    pub fn signature_message(&self, total_amount: &str, transaction_uuid: &str) -> String {
        format!(
            "total_amount={total_amount},transaction_uuid={transaction_uuid},product_code={}",
            self.config.product_code
        )
    }

    pub fn sign(&self, message: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.config.secret_key.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(message.as_bytes());
        BASE64.encode(mac.finalize().into_bytes())
    }

    pub fn build_form(&self, ctx: &InitiateContext) -> EsewaFormFields {
        let total_amount = format_amount(ctx.amount);
        let transaction_uuid = ctx.order_id.to_string();
        let signature = self.sign(&self.signature_message(&total_amount, &transaction_uuid));

        EsewaFormFields {
            amount: total_amount.clone(),
            tax_amount: "0".into(),
            total_amount,
            transaction_uuid: transaction_uuid.clone(),
            product_code: self.config.product_code.clone(),
            product_service_charge: "0".into(),
            product_delivery_charge: "0".into(),
            success_url: format!("{}?oid={transaction_uuid}", self.config.success_url),
            failure_url: format!("{}?oid={transaction_uuid}", self.config.failure_url),
            signed_field_names: "total_amount,transaction_uuid,product_code".into(),
            signature,
        }
    }
}

#[async_trait]
impl PaymentGateway for EsewaGateway {
    fn kind(&self) -> GatewayKind {
        GatewayKind::Esewa
    }

    async fn initiate(&self, ctx: &InitiateContext) -> Result<InitiateOutcome, GatewayError> {
        // Purely local: building the signed form makes no provider call, so
        // initiation can only fail on configuration problems.
        Ok(InitiateOutcome::FormRedirect {
            payment_url: self.config.payment_url.clone(),
            fields: self.build_form(ctx),
        })
    }

    async fn verify(&self, ctx: &VerifyContext) -> Result<Verification, GatewayError> {
        let ref_id = match &ctx.reference {
            ProviderReference::RefId(id) if !id.is_empty() => id.clone(),
            ProviderReference::RefId(_) => return Err(GatewayError::MissingReference("refId")),
            ProviderReference::Pidx(_) => return Err(GatewayError::MissingReference("refId")),
        };

        let response = self
            .http
            .get(&self.config.status_url)
            .query(&[
                ("product_code", self.config.product_code.as_str()),
                ("total_amount", &format_amount(ctx.amount)),
                ("transaction_uuid", &ctx.order_id.to_string()),
            ])
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GatewayError::BadResponse(format!(
                "status endpoint returned {}",
                response.status()
            )));
        }

        let body: EsewaStatusResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::BadResponse(e.to_string()))?;

        Ok(Verification {
            verified: body.status == "COMPLETE",
            transaction_id: Some(body.ref_id.unwrap_or(ref_id)),
        })
    }
}
