use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::orders::{CreateOrderRequest, OrderList, OrderSummary, OrderWithItems},
    entity::{
        cart_items::{Column as CartItemCol, Entity as CartItems},
        carts::{Column as CartCol, Entity as Carts},
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderItem, OrderStatus, PaymentStatus},
    notify::Notification,
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::inventory,
    state::AppState,
};

const MIN_ADDRESS_LEN: usize = 10;

/// The sole transactional boundary turning a cart into a durable order.
/// Everything between the cart read and the cart clear is one atomic unit:
/// a failure at any step leaves no order row, no stock change, and the cart
/// untouched.
pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<OrderSummary>> {
    let shipping_address = payload.shipping_address.trim().to_string();
    if shipping_address.chars().count() < MIN_ADDRESS_LEN {
        return Err(AppError::Validation(format!(
            "Shipping address must be at least {MIN_ADDRESS_LEN} characters"
        )));
    }

    let txn = state.orm.begin().await?;

    let cart = Carts::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let cart_items = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .all(&txn)
        .await?;

    if cart_items.is_empty() {
        return Err(AppError::EmptyCart);
    }

    // Lock the product rows for the duration of the transaction; the
    // conditional decrement below is the authoritative oversell guard, the
    // lock just keeps price and stock reads consistent with it. Locks are
    // taken in id order so concurrent checkouts sharing products cannot
    // deadlock on each other.
    let mut product_ids: Vec<Uuid> = cart_items.iter().map(|i| i.product_id).collect();
    product_ids.sort_unstable();
    let products: HashMap<Uuid, _> = Products::find()
        .filter(ProdCol::Id.is_in(product_ids))
        .order_by_asc(ProdCol::Id)
        .lock(LockType::Update)
        .all(&txn)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let mut total_amount = Decimal::ZERO;
    for item in &cart_items {
        let product = products.get(&item.product_id).ok_or(AppError::NotFound)?;
        if item.quantity < 1 {
            return Err(AppError::Validation("Cart has invalid quantity".into()));
        }
        if product.stock_quantity < item.quantity {
            return Err(AppError::InsufficientStock(product.id));
        }
        total_amount += product.price * Decimal::from(item.quantity);
    }
    let total_amount = total_amount.round_dp(2);

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        total_amount: Set(total_amount),
        status: Set(OrderStatus::Pending.as_str().into()),
        payment_status: Set(PaymentStatus::Unpaid.as_str().into()),
        payment_gateway: Set(None),
        transaction_id: Set(None),
        shipping_address: Set(shipping_address),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    for item in &cart_items {
        let product = &products[&item.product_id];
        // price_at_purchase is snapshotted here and never recalculated.
        OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(item.product_id),
            vendor_id: Set(product.vendor_id),
            quantity: Set(item.quantity),
            price_at_purchase: Set(product.price),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
    }

    let demands: Vec<(Uuid, i32)> = cart_items
        .iter()
        .map(|i| (i.product_id, i.quantity))
        .collect();
    inventory::reserve_stock(&txn, &demands).await?;

    // The cart row survives; only its lines go.
    CartItems::delete_many()
        .filter(CartItemCol::CartId.eq(cart.id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    state.notifier.emit(Notification::OrderConfirmed {
        order_id: order.id,
        user_id: user.user_id,
        total_amount,
    });

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_created",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "total_amount": total_amount })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order created successfully",
        OrderSummary {
            id: order.id,
            total_amount: order.total_amount,
            status: order.status,
            created_at: order.created_at.with_timezone(&Utc),
        },
        Some(Meta::empty()),
    ))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        OrderStatus::parse(status)?;
        condition = condition.add(OrderCol::Status.eq(status.clone()));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let mut finder = Orders::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "OK",
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

pub fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        user_id: model.user_id,
        total_amount: model.total_amount,
        status: model.status,
        payment_status: model.payment_status,
        payment_gateway: model.payment_gateway,
        transaction_id: model.transaction_id,
        shipping_address: model.shipping_address,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

pub fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        vendor_id: model.vendor_id,
        quantity: model.quantity,
        price_at_purchase: model.price_at_purchase,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
