use chrono::Utc;
use sea_orm::sea_query::LockType;
use sea_orm::{ActiveModelTrait, EntityTrait, QuerySelect, Set, TransactionTrait};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::OrmConn,
    dto::payments::{
        InitiatePaymentRequest, InitiatePaymentResponse, VerifyPaymentRequest,
        VerifyPaymentResponse,
    },
    entity::orders::{ActiveModel as OrderActive, Entity as Orders},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{OrderStatus, PaymentStatus},
    notify::Notification,
    payment::{GatewayError, GatewayKind, InitiateContext, ProviderReference, VerifyContext},
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Select a gateway for an unpaid order. Records the choice on the order but
/// never touches payment_status; a failed redirect leaves the order exactly
/// as it was, safe to retry.
pub async fn initiate_payment(
    state: &AppState,
    user: &AuthUser,
    payload: InitiatePaymentRequest,
) -> AppResult<ApiResponse<InitiatePaymentResponse>> {
    let kind = GatewayKind::parse(&payload.gateway)?;

    let order = Orders::find_by_id(payload.order_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    if order.user_id != user.user_id {
        return Err(AppError::Forbidden);
    }
    if order.payment_status == PaymentStatus::Paid.as_str() {
        return Err(AppError::Validation("Order already paid".into()));
    }

    let customer: (String, String, Option<String>) =
        sqlx::query_as("SELECT name, email, phone FROM users WHERE id = $1")
            .bind(user.user_id)
            .fetch_one(&state.pool)
            .await?;

    let order_ref = order.id.to_string();
    let ctx = InitiateContext {
        order_id: order.id,
        amount: order.total_amount,
        product_label: format!("Order #{}", &order_ref[..8]),
        customer_name: customer.0,
        customer_email: customer.1,
        customer_phone: customer.2,
    };

    let gateway = state.gateways.get(kind)?;
    let outcome = gateway
        .initiate(&ctx)
        .await
        .map_err(initiation_error)?;

    let mut active: OrderActive = order.into();
    active.payment_gateway = Set(Some(kind.as_str().into()));
    active.updated_at = Set(Utc::now().into());
    active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "payment_initiated",
        Some("orders"),
        Some(serde_json::json!({ "order_id": payload.order_id, "gateway": kind.as_str() })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Payment initiated",
        InitiatePaymentResponse {
            success: true,
            gateway: kind,
            data: outcome,
        },
        Some(Meta::empty()),
    ))
}

/// Reconcile a provider callback with the order. Idempotent: an already-paid
/// order short-circuits to success without another provider round trip, so
/// duplicate client callbacks cannot double-count revenue.
pub async fn verify_payment(
    state: &AppState,
    payload: VerifyPaymentRequest,
) -> AppResult<ApiResponse<VerifyPaymentResponse>> {
    let kind = GatewayKind::parse(&payload.gateway)?;

    let order = Orders::find_by_id(payload.order_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    if order.payment_status == PaymentStatus::Paid.as_str() {
        return Ok(ApiResponse::success(
            "Order already paid",
            VerifyPaymentResponse {
                success: true,
                order_id: order.id,
                transaction_id: order.transaction_id,
            },
            Some(Meta::empty()),
        ));
    }

    let reference = match kind {
        GatewayKind::Esewa => ProviderReference::RefId(
            payload
                .ref_id
                .filter(|r| !r.is_empty())
                .ok_or_else(|| AppError::Validation("eSewa reference ID is required".into()))?,
        ),
        GatewayKind::Khalti => ProviderReference::Pidx(
            payload
                .pidx
                .filter(|p| !p.is_empty())
                .ok_or_else(|| AppError::Validation("Khalti pidx is required".into()))?,
        ),
        GatewayKind::Cod => {
            return Err(AppError::Validation(
                "Cash on delivery orders are settled offline, not verified".into(),
            ));
        }
    };

    let fallback_reference = match &reference {
        ProviderReference::RefId(r) | ProviderReference::Pidx(r) => r.clone(),
    };

    let ctx = VerifyContext {
        order_id: order.id,
        amount: order.total_amount,
        reference,
    };

    let gateway = state.gateways.get(kind)?;
    let verification = gateway.verify(&ctx).await.map_err(verification_error)?;

    if !verification.verified {
        // Order stays unpaid and retryable; the customer can pay again or
        // retry with a valid reference.
        return Err(AppError::PaymentVerificationFailed(
            "provider did not confirm the transaction".into(),
        ));
    }

    let transaction_id = verification.transaction_id.unwrap_or(fallback_reference);

    let transitioned = record_payment_success(&state.orm, order.id, &transaction_id).await?;
    if transitioned {
        state.notifier.emit(Notification::PaymentReceived {
            order_id: order.id,
            transaction_id: transaction_id.clone(),
        });

        if let Err(err) = log_audit(
            &state.pool,
            Some(order.user_id),
            "payment_verified",
            Some("orders"),
            Some(serde_json::json!({ "order_id": order.id, "transaction_id": transaction_id })),
        )
        .await
        {
            tracing::warn!(error = %err, "audit log failed");
        }
    }

    Ok(ApiResponse::success(
        "Payment verified successfully",
        VerifyPaymentResponse {
            success: true,
            order_id: order.id,
            transaction_id: Some(transaction_id),
        },
        Some(Meta::empty()),
    ))
}

/// Apply the paid transition exactly once: paymentStatus unpaid -> paid and
/// status pending -> processing, atomically, under a row lock. Returns false
/// when a concurrent callback already applied it.
pub async fn record_payment_success(
    orm: &OrmConn,
    order_id: Uuid,
    transaction_id: &str,
) -> AppResult<bool> {
    let txn = orm.begin().await?;

    let order = Orders::find_by_id(order_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    if order.payment_status == PaymentStatus::Paid.as_str() {
        txn.commit().await?;
        return Ok(false);
    }

    let was_pending = order.status == OrderStatus::Pending.as_str();
    let mut active: OrderActive = order.into();
    active.payment_status = Set(PaymentStatus::Paid.as_str().into());
    if was_pending {
        active.status = Set(OrderStatus::Processing.as_str().into());
    }
    active.transaction_id = Set(Some(transaction_id.to_string()));
    active.updated_at = Set(Utc::now().into());
    active.update(&txn).await?;

    txn.commit().await?;
    Ok(true)
}

fn initiation_error(err: GatewayError) -> AppError {
    match err {
        GatewayError::Unsupported => AppError::Validation("Gateway does not support initiation".into()),
        other => AppError::PaymentInitiationFailed(other.to_string()),
    }
}

fn verification_error(err: GatewayError) -> AppError {
    match err {
        GatewayError::Unsupported => {
            AppError::Validation("Gateway does not support verification".into())
        }
        GatewayError::MissingReference(field) => {
            AppError::Validation(format!("{field} is required for this gateway"))
        }
        other => AppError::PaymentVerificationFailed(other.to_string()),
    }
}
