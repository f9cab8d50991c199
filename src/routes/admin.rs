use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch},
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::orders::{OrderList, OrderWithLines},
    dto::products::ProductList,
    error::AppResult,
    middleware::auth::AuthUser,
    models::{AuditLog, Order, Product},
    response::ApiResponse,
    routes::params::{OrderListQuery, Pagination},
    services::admin_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_all_orders))
        .route("/orders/{id}", get(get_order_admin))
        .route("/orders/{id}/status", patch(update_order_status))
        .route("/inventory/low-stock", get(list_low_stock))
        .route("/inventory/{id}", patch(adjust_inventory))
        .route("/audit-logs", get(list_audit_logs))
}

/// Target lifecycle status by name, e.g. `processing`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct StatusUpdateRequest {
    #[schema(example = "processing")]
    pub status: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LowStockQuery {
    #[serde(flatten)]
    pub pagination: Pagination,
    /// Stock at or below this counts as low.
    pub threshold: Option<i32>,
}

/// Signed stock correction; negative removes units.
#[derive(Debug, Deserialize, ToSchema)]
pub struct StockAdjustment {
    #[schema(example = 25)]
    pub delta: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AuditLogQuery {
    #[serde(flatten)]
    pub pagination: Pagination,
    pub action: Option<String>,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, serde::Serialize, ToSchema)]
pub struct AuditLogList {
    pub items: Vec<AuditLog>,
}

#[utoipa::path(
    get,
    path = "/api/admin/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page, 1-based"),
        ("per_page" = Option<i64>, Query, description = "Rows per page, capped at 100"),
        ("status" = Option<String>, Query, description = "Restrict to one lifecycle status"),
        ("sort_order" = Option<String>, Query, description = "asc or desc by placement time")
    ),
    responses(
        (status = 200, description = "Orders across every account", body = ApiResponse<OrderList>),
        (status = 403, description = "Caller is not an admin"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_all_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = admin_service::list_all_orders(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order id")
    ),
    responses(
        (status = 200, description = "Any order with its lines, regardless of owner", body = ApiResponse<OrderWithLines>),
        (status = 404, description = "No such order"),
        (status = 403, description = "Caller is not an admin"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn get_order_admin(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderWithLines>>> {
    let resp = admin_service::get_order_admin(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/admin/orders/{id}/status",
    params(
        ("id" = Uuid, Path, description = "Order id")
    ),
    request_body = StatusUpdateRequest,
    responses(
        (status = 200, description = "Order moved to the requested status", body = ApiResponse<Order>),
        (status = 400, description = "Unknown status name or illegal transition"),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "No such order"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<StatusUpdateRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = admin_service::update_order_status(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/inventory/low-stock",
    params(
        ("threshold" = Option<i32>, Query, description = "Low-stock cutoff, default 5"),
        ("page" = Option<i64>, Query, description = "Page, 1-based"),
        ("per_page" = Option<i64>, Query, description = "Rows per page, capped at 100")
    ),
    responses(
        (status = 200, description = "Products at or under the cutoff, emptiest first", body = ApiResponse<ProductList>),
        (status = 403, description = "Caller is not an admin")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_low_stock(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<LowStockQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = admin_service::list_low_stock(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/admin/inventory/{id}",
    params(
        ("id" = Uuid, Path, description = "Product id")
    ),
    request_body = StockAdjustment,
    responses(
        (status = 200, description = "Product with the corrected stock level", body = ApiResponse<Product>),
        (status = 400, description = "Zero delta, or the correction would go below zero"),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "No such product"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn adjust_inventory(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<StockAdjustment>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = admin_service::adjust_inventory(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/audit-logs",
    params(
        ("page" = Option<i64>, Query, description = "Page, 1-based"),
        ("per_page" = Option<i64>, Query, description = "Rows per page, capped at 100"),
        ("action" = Option<String>, Query, description = "Exact action name, e.g. checkout"),
        ("user_id" = Option<Uuid>, Query, description = "Only entries recorded for this user")
    ),
    responses(
        (status = 200, description = "Audit trail, newest first", body = ApiResponse<AuditLogList>),
        (status = 403, description = "Caller is not an admin")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_audit_logs(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<AuditLogQuery>,
) -> AppResult<Json<ApiResponse<AuditLogList>>> {
    let resp = admin_service::list_audit_logs(&state, &user, query).await?;
    Ok(Json(resp))
}
