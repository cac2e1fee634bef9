use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::cart::{AddToCartRequest, CartItemView, CartView, UpdateCartItemRequest},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::CartItem,
    response::{ApiResponse, Meta},
};

#[derive(FromRow)]
struct CartItemRow {
    id: Uuid,
    product_id: Uuid,
    product_name: String,
    price: Decimal,
    stock_quantity: i32,
    quantity: i32,
}

async fn cart_id_for(pool: &DbPool, user: &AuthUser) -> AppResult<Uuid> {
    let cart: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM carts WHERE user_id = $1")
        .bind(user.user_id)
        .fetch_optional(pool)
        .await?;
    cart.map(|(id,)| id).ok_or(AppError::NotFound)
}

pub async fn get_cart(pool: &DbPool, user: &AuthUser) -> AppResult<ApiResponse<CartView>> {
    let cart_id = cart_id_for(pool, user).await?;

    let rows = sqlx::query_as::<_, CartItemRow>(
        r#"
        SELECT ci.id, ci.product_id, ci.quantity,
               p.name AS product_name, p.price, p.stock_quantity
        FROM cart_items ci
        JOIN products p ON p.id = ci.product_id
        WHERE ci.cart_id = $1
        ORDER BY ci.added_at DESC
        "#,
    )
    .bind(cart_id)
    .fetch_all(pool)
    .await?;

    // Subtotal tracks the live catalog price; only checkout snapshots it.
    let subtotal: Decimal = rows
        .iter()
        .map(|r| r.price * Decimal::from(r.quantity))
        .sum();
    let item_count: i32 = rows.iter().map(|r| r.quantity).sum();

    let items = rows
        .into_iter()
        .map(|r| CartItemView {
            id: r.id,
            product_id: r.product_id,
            product_name: r.product_name,
            price: r.price,
            stock_quantity: r.stock_quantity,
            quantity: r.quantity,
        })
        .collect();

    Ok(ApiResponse::success(
        "OK",
        CartView {
            id: cart_id,
            items,
            subtotal: subtotal.round_dp(2),
            item_count,
        },
        Some(Meta::empty()),
    ))
}

pub async fn add_item(
    pool: &DbPool,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartItem>> {
    if payload.quantity < 1 {
        return Err(AppError::Validation(
            "quantity must be at least 1".to_string(),
        ));
    }

    let product: Option<(i32, bool)> =
        sqlx::query_as("SELECT stock_quantity, is_active FROM products WHERE id = $1")
            .bind(payload.product_id)
            .fetch_optional(pool)
            .await?;
    let (stock_quantity, is_active) = product.ok_or(AppError::NotFound)?;
    if !is_active {
        return Err(AppError::NotFound);
    }

    // Advisory only; stock is reserved at checkout, not here.
    if stock_quantity < payload.quantity {
        return Err(AppError::InsufficientStock(payload.product_id));
    }

    let cart_id = cart_id_for(pool, user).await?;

    let exist: Option<CartItem> =
        sqlx::query_as("SELECT * FROM cart_items WHERE cart_id = $1 AND product_id = $2")
            .bind(cart_id)
            .bind(payload.product_id)
            .fetch_optional(pool)
            .await?;

    let cart_item = if let Some(item) = exist {
        let combined = item.quantity + payload.quantity;
        if stock_quantity < combined {
            return Err(AppError::InsufficientStock(payload.product_id));
        }
        sqlx::query_as::<_, CartItem>(
            "UPDATE cart_items SET quantity = $2 WHERE id = $1 RETURNING *",
        )
        .bind(item.id)
        .bind(combined)
        .fetch_one(pool)
        .await?
    } else {
        sqlx::query_as(
            "INSERT INTO cart_items (cart_id, product_id, quantity) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(cart_id)
        .bind(payload.product_id)
        .bind(payload.quantity)
        .fetch_one(pool)
        .await?
    };

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "cart_add",
        Some("cart_items"),
        Some(serde_json::json!({ "product_id": payload.product_id, "quantity": cart_item.quantity })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("OK", cart_item, None))
}

pub async fn update_item(
    pool: &DbPool,
    user: &AuthUser,
    item_id: Uuid,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<CartItem>> {
    if payload.quantity < 1 {
        return Err(AppError::Validation(
            "quantity must be at least 1".to_string(),
        ));
    }

    let cart_id = cart_id_for(pool, user).await?;

    let row: Option<(Uuid, i32)> = sqlx::query_as(
        r#"
        SELECT ci.product_id, p.stock_quantity
        FROM cart_items ci
        JOIN products p ON p.id = ci.product_id
        WHERE ci.id = $1 AND ci.cart_id = $2
        "#,
    )
    .bind(item_id)
    .bind(cart_id)
    .fetch_optional(pool)
    .await?;
    let (product_id, stock_quantity) = row.ok_or(AppError::NotFound)?;

    if stock_quantity < payload.quantity {
        return Err(AppError::InsufficientStock(product_id));
    }

    let cart_item = sqlx::query_as::<_, CartItem>(
        "UPDATE cart_items SET quantity = $2 WHERE id = $1 RETURNING *",
    )
    .bind(item_id)
    .bind(payload.quantity)
    .fetch_one(pool)
    .await?;

    Ok(ApiResponse::success("Cart updated", cart_item, None))
}

pub async fn remove_item(
    pool: &DbPool,
    user: &AuthUser,
    item_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let cart_id = cart_id_for(pool, user).await?;

    let result = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND cart_id = $2")
        .bind(item_id)
        .bind(cart_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    Ok(ApiResponse::success(
        "Removed from cart",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn clear_cart(
    pool: &DbPool,
    user: &AuthUser,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let cart_id = cart_id_for(pool, user).await?;

    sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
        .bind(cart_id)
        .execute(pool)
        .await?;

    Ok(ApiResponse::success(
        "Cart cleared",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
