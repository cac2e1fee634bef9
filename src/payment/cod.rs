//! Cash on delivery: no external provider. The order proceeds unpaid until
//! settlement happens at the doorstep, outside this pipeline.

use async_trait::async_trait;

use super::{
    GatewayError, GatewayKind, InitiateContext, InitiateOutcome, PaymentGateway, Verification,
    VerifyContext,
};

pub struct CodGateway;

#[async_trait]
impl PaymentGateway for CodGateway {
    fn kind(&self) -> GatewayKind {
        GatewayKind::Cod
    }

    async fn initiate(&self, _ctx: &InitiateContext) -> Result<InitiateOutcome, GatewayError> {
        Ok(InitiateOutcome::NoRedirect)
    }

    async fn verify(&self, _ctx: &VerifyContext) -> Result<Verification, GatewayError> {
        // There is no provider to ask; COD orders are settled offline.
        Err(GatewayError::Unsupported)
    }
}
