use chrono::Utc;
use sea_orm::sea_query::LockType;
use sea_orm::{ActiveModelTrait, EntityTrait, QuerySelect, Set, TransactionTrait};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::orders::OrderList,
    dto::vendor::{UpdateOrderStatusRequest, VendorRegisterRequest},
    entity::orders::{ActiveModel as OrderActive, Entity as Orders},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderStatus, Vendor},
    notify::Notification,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    services::order_service::order_from_entity,
    state::AppState,
};

/// Resolve the caller's vendor profile; only approved vendors may act.
pub async fn require_vendor(pool: &DbPool, user: &AuthUser) -> AppResult<Vendor> {
    let vendor: Option<Vendor> = sqlx::query_as("SELECT * FROM vendors WHERE user_id = $1")
        .bind(user.user_id)
        .fetch_optional(pool)
        .await?;
    match vendor {
        Some(v) if v.is_approved => Ok(v),
        Some(_) => Err(AppError::Forbidden),
        None => Err(AppError::Forbidden),
    }
}

pub async fn register_vendor(
    state: &AppState,
    user: &AuthUser,
    payload: VendorRegisterRequest,
) -> AppResult<ApiResponse<Vendor>> {
    if payload.business_name.trim().is_empty() {
        return Err(AppError::Validation("business_name is required".into()));
    }

    let exist: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM vendors WHERE user_id = $1")
        .bind(user.user_id)
        .fetch_optional(&state.pool)
        .await?;
    if exist.is_some() {
        return Err(AppError::Validation(
            "Vendor profile already exists".into(),
        ));
    }

    // Profiles start unapproved; an admin flips the switch.
    let vendor: Vendor = sqlx::query_as(
        r#"
        INSERT INTO vendors (user_id, business_name, business_email)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(user.user_id)
    .bind(payload.business_name.trim())
    .bind(payload.business_email.trim())
    .fetch_one(&state.pool)
    .await?;

    sqlx::query("UPDATE users SET role = 'vendor', updated_at = now() WHERE id = $1")
        .bind(user.user_id)
        .execute(&state.pool)
        .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "vendor_registered",
        Some("vendors"),
        Some(serde_json::json!({ "vendor_id": vendor.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Vendor registration submitted",
        vendor,
        Some(Meta::empty()),
    ))
}

/// Orders containing at least one of the vendor's items.
pub async fn list_vendor_orders(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<OrderList>> {
    let vendor = require_vendor(&state.pool, user).await?;
    let (page, limit, offset) = pagination.normalize();

    let orders: Vec<Order> = sqlx::query_as(
        r#"
        SELECT DISTINCT o.*
        FROM orders o
        JOIN order_items oi ON oi.order_id = o.id
        WHERE oi.vendor_id = $1
        ORDER BY o.created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(vendor.id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let total: (i64,) = sqlx::query_as(
        "SELECT COUNT(DISTINCT oi.order_id) FROM order_items oi WHERE oi.vendor_id = $1",
    )
    .bind(vendor.id)
    .fetch_one(&state.pool)
    .await?;

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success("Ok", OrderList { items: orders }, Some(meta)))
}

/// Move an order along the fulfillment axis. The caller must own at least
/// one item in the order; full order ownership is not required in a
/// multi-vendor order.
pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    let vendor = require_vendor(&state.pool, user).await?;
    let next = OrderStatus::parse(&payload.status)?;

    let owns_item: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM order_items WHERE order_id = $1 AND vendor_id = $2",
    )
    .bind(order_id)
    .bind(vendor.id)
    .fetch_one(&state.pool)
    .await?;
    if owns_item.0 == 0 {
        return Err(AppError::NotFound);
    }

    let txn = state.orm.begin().await?;

    let order = Orders::find_by_id(order_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let current = OrderStatus::parse(&order.status)?;
    if !current.can_transition(next) {
        return Err(AppError::Validation(format!(
            "Cannot change order status from {} to {}",
            current.as_str(),
            next.as_str()
        )));
    }

    let mut active: OrderActive = order.into();
    active.status = Set(next.as_str().into());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    txn.commit().await?;

    // Best effort; a notification outage never rolls back the status change.
    state.notifier.emit(Notification::StatusChanged {
        order_id: order.id,
        status: order.status.clone(),
    });

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_status_update",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "status": order.status })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order status updated",
        order_from_entity(order),
        Some(Meta::empty()),
    ))
}
