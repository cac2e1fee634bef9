use uuid::Uuid;

use crate::{
    db::DbPool,
    dto::products::{CreateProductRequest, ProductList, UpdateProductRequest},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Product,
    response::{ApiResponse, Meta},
    routes::params::{Pagination, ProductQuery},
    services::vendor_service::require_vendor,
};

/// Public catalog view; inactive products are invisible here but still
/// referenced by historical order items.
pub async fn list_products(
    pool: &DbPool,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination.normalize();

    let search = query
        .q
        .as_ref()
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{s}%"));

    let rows: Vec<Product> = sqlx::query_as(
        r#"
        SELECT * FROM products
        WHERE is_active = TRUE
          AND ($1::text IS NULL OR name ILIKE $1)
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(search.as_deref())
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM products WHERE is_active = TRUE AND ($1::text IS NULL OR name ILIKE $1)",
    )
    .bind(search.as_deref())
    .fetch_one(pool)
    .await?;

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success("OK", ProductList { items: rows }, Some(meta)))
}

pub async fn get_product(pool: &DbPool, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let product: Option<Product> =
        sqlx::query_as("SELECT * FROM products WHERE id = $1 AND is_active = TRUE")
            .bind(id)
            .fetch_optional(pool)
            .await?;
    let product = product.ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("OK", product, Some(Meta::empty())))
}

pub async fn list_vendor_products(
    pool: &DbPool,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<ProductList>> {
    let vendor = require_vendor(pool, user).await?;
    let (page, limit, offset) = pagination.normalize();

    let rows: Vec<Product> = sqlx::query_as(
        "SELECT * FROM products WHERE vendor_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(vendor.id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products WHERE vendor_id = $1")
        .bind(vendor.id)
        .fetch_one(pool)
        .await?;

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success("OK", ProductList { items: rows }, Some(meta)))
}

pub async fn create_product(
    pool: &DbPool,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    let vendor = require_vendor(pool, user).await?;

    if payload.price.is_sign_negative() || payload.price.is_zero() {
        return Err(AppError::Validation("price must be positive".into()));
    }
    if payload.stock_quantity < 0 {
        return Err(AppError::Validation("stock_quantity must be >= 0".into()));
    }

    let product: Product = sqlx::query_as(
        r#"
        INSERT INTO products (vendor_id, name, description, price, stock_quantity)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(vendor.id)
    .bind(payload.name)
    .bind(payload.description.unwrap_or_default())
    .bind(payload.price.round_dp(2))
    .bind(payload.stock_quantity)
    .fetch_one(pool)
    .await?;

    Ok(ApiResponse::success("Product created", product, None))
}

pub async fn update_product(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    let vendor = require_vendor(pool, user).await?;

    let existing: Option<Product> =
        sqlx::query_as("SELECT * FROM products WHERE id = $1 AND vendor_id = $2")
            .bind(id)
            .bind(vendor.id)
            .fetch_optional(pool)
            .await?;
    let existing = existing.ok_or(AppError::NotFound)?;

    if let Some(price) = payload.price {
        if price.is_sign_negative() || price.is_zero() {
            return Err(AppError::Validation("price must be positive".into()));
        }
    }
    if let Some(stock) = payload.stock_quantity {
        if stock < 0 {
            return Err(AppError::Validation("stock_quantity must be >= 0".into()));
        }
    }

    let product: Product = sqlx::query_as(
        r#"
        UPDATE products
        SET name = $2,
            description = $3,
            price = $4,
            stock_quantity = $5,
            is_active = $6,
            updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(payload.name.unwrap_or(existing.name))
    .bind(payload.description.unwrap_or(existing.description))
    .bind(payload.price.map(|p| p.round_dp(2)).unwrap_or(existing.price))
    .bind(payload.stock_quantity.unwrap_or(existing.stock_quantity))
    .bind(payload.is_active.unwrap_or(existing.is_active))
    .fetch_one(pool)
    .await?;

    Ok(ApiResponse::success("Product updated", product, None))
}
