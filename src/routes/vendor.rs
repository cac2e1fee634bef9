use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
};
use uuid::Uuid;

use crate::{
    dto::orders::OrderList,
    dto::products::{CreateProductRequest, ProductList, UpdateProductRequest},
    dto::vendor::{UpdateOrderStatusRequest, VendorRegisterRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::{Order, Product, Vendor},
    response::ApiResponse,
    routes::params::Pagination,
    services::{product_service, vendor_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register_vendor))
        .route("/orders", get(list_vendor_orders))
        .route("/orders/{order_id}/status", put(update_order_status))
        .route("/products", get(list_vendor_products).post(create_product))
        .route("/products/{id}", put(update_product))
}

#[utoipa::path(
    post,
    path = "/api/vendor/register",
    request_body = VendorRegisterRequest,
    responses(
        (status = 201, description = "Vendor profile created, pending approval", body = ApiResponse<Vendor>),
        (status = 400, description = "Profile already exists or invalid input"),
    ),
    security(("bearer_auth" = [])),
    tag = "Vendor"
)]
pub async fn register_vendor(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<VendorRegisterRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Vendor>>)> {
    let resp = vendor_service::register_vendor(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/vendor/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses(
        (status = 200, description = "Orders containing the vendor's items", body = ApiResponse<OrderList>),
        (status = 403, description = "Not an approved vendor"),
    ),
    security(("bearer_auth" = [])),
    tag = "Vendor"
)]
pub async fn list_vendor_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = vendor_service::list_vendor_orders(&state, &user, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/vendor/orders/{order_id}/status",
    params(("order_id" = Uuid, Path, description = "Order ID")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<Order>),
        (status = 400, description = "Unknown status or disallowed transition"),
        (status = 403, description = "Not an approved vendor"),
        (status = 404, description = "Order has none of the vendor's items"),
    ),
    security(("bearer_auth" = [])),
    tag = "Vendor"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = vendor_service::update_order_status(&state, &user, order_id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/vendor/products",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses(
        (status = 200, description = "The vendor's products", body = ApiResponse<ProductList>),
        (status = 403, description = "Not an approved vendor"),
    ),
    security(("bearer_auth" = [])),
    tag = "Vendor"
)]
pub async fn list_vendor_products(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = product_service::list_vendor_products(&state.pool, &user, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/vendor/products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created", body = ApiResponse<Product>),
        (status = 403, description = "Not an approved vendor"),
    ),
    security(("bearer_auth" = [])),
    tag = "Vendor"
)]
pub async fn create_product(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateProductRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Product>>)> {
    let resp = product_service::create_product(&state.pool, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    put,
    path = "/api/vendor/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Product updated", body = ApiResponse<Product>),
        (status = 404, description = "Product not found or not owned"),
    ),
    security(("bearer_auth" = [])),
    tag = "Vendor"
)]
pub async fn update_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = product_service::update_product(&state.pool, &user, id, payload).await?;
    Ok(Json(resp))
}
