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
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        cart::{AddToCartRequest, CartLineDto, CartList},
        orders::{CheckoutRequest, OrderList, OrderWithLines},
        products,
    },
    error::StockShortage,
    models::{AuditLog, CartLine, Order, OrderLine, Product, User},
    response::{ApiResponse, Meta},
    routes::{admin, auth, cart, health, orders, params, products as product_routes},
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
    info(
        title = "Grocery Checkout API",
        description = "Catalog, cart and checkout service. Orders snapshot their prices at placement."
    ),
    paths(
        health::health_check,
        auth::login,
        auth::register,
        cart::cart_list,
        cart::add_to_cart,
        cart::remove_from_cart,
        product_routes::list_products,
        product_routes::create_product,
        product_routes::get_product,
        product_routes::update_product,
        product_routes::delete_product,
        orders::list_orders,
        orders::checkout,
        orders::get_order,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::update_order_status,
        admin::list_low_stock,
        admin::adjust_inventory,
        admin::list_audit_logs
    ),
    components(
        schemas(
            User,
            Product,
            CartLine,
            Order,
            OrderLine,
            AuditLog,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            AddToCartRequest,
            CartLineDto,
            CartList,
            CheckoutRequest,
            StockShortage,
            OrderList,
            OrderWithLines,
            admin::StatusUpdateRequest,
            admin::StockAdjustment,
            admin::LowStockQuery,
            admin::AuditLogQuery,
            admin::AuditLogList,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            products::CreateProductRequest,
            products::UpdateProductRequest,
            products::ProductList,
            Meta,
            ApiResponse<Product>,
            ApiResponse<products::ProductList>,
            ApiResponse<OrderWithLines>,
            ApiResponse<OrderList>,
            ApiResponse<CartList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness probe"),
        (name = "Products", description = "Catalog browsing, plus admin catalog management"),
        (name = "Cart", description = "The authenticated shopper's cart"),
        (name = "Orders", description = "Checkout and order history"),
        (name = "Admin", description = "Order lifecycle, inventory and audit trail"),
        (name = "Auth", description = "Registration and login"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
