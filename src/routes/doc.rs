use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        cart::{AddToCartRequest, CartItemView, CartView, UpdateCartItemRequest},
        orders::{CreateOrderRequest, OrderList, OrderSummary, OrderWithItems},
        payments::{
            InitiatePaymentRequest, InitiatePaymentResponse, VerifyPaymentRequest,
            VerifyPaymentResponse,
        },
        products::{CreateProductRequest, ProductList, UpdateProductRequest},
        vendor::{UpdateOrderStatusRequest, VendorRegisterRequest},
    },
    models::{CartItem, Order, OrderItem, OrderStatus, PaymentStatus, Product, User, Vendor},
    payment::{GatewayKind, InitiateOutcome, esewa::EsewaFormFields},
    response::{ApiResponse, Meta},
    routes::{admin, auth, cart, health, orders, params, payments, products, vendor},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        products::list_products,
        products::get_product,
        cart::get_cart,
        cart::add_to_cart,
        cart::update_cart_item,
        cart::remove_from_cart,
        cart::clear_cart,
        orders::create_order,
        orders::list_orders,
        orders::get_order,
        payments::initiate_payment,
        payments::verify_payment,
        vendor::register_vendor,
        vendor::list_vendor_orders,
        vendor::update_order_status,
        vendor::list_vendor_products,
        vendor::create_product,
        vendor::update_product,
        admin::list_all_orders,
        admin::approve_vendor
    ),
    components(
        schemas(
            User,
            Vendor,
            Product,
            CartItem,
            Order,
            OrderItem,
            OrderStatus,
            PaymentStatus,
            GatewayKind,
            InitiateOutcome,
            EsewaFormFields,
            AddToCartRequest,
            UpdateCartItemRequest,
            CartItemView,
            CartView,
            CreateOrderRequest,
            OrderSummary,
            OrderWithItems,
            OrderList,
            InitiatePaymentRequest,
            InitiatePaymentResponse,
            VerifyPaymentRequest,
            VerifyPaymentResponse,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            VendorRegisterRequest,
            UpdateOrderStatusRequest,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            Meta,
            ApiResponse<Product>,
            ApiResponse<CartView>,
            ApiResponse<OrderSummary>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<InitiatePaymentResponse>,
            ApiResponse<VerifyPaymentResponse>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Products", description = "Public catalog endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Checkout and order endpoints"),
        (name = "Payments", description = "Payment initiation and verification"),
        (name = "Vendor", description = "Vendor endpoints"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
