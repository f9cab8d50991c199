use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{OrderList, OrderWithLines},
    dto::products::ProductList,
    entity::{
        OrderStatus,
        audit_logs::{Column as AuditCol, Entity as AuditLogs},
        order_lines::{Column as LineCol, Entity as OrderLines},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
        products::{ActiveModel as ProductActive, Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{AuditLog, Order, OrderLine, Product},
    response::{ApiResponse, Meta},
    routes::admin::{
        AuditLogList, AuditLogQuery, LowStockQuery, StatusUpdateRequest, StockAdjustment,
    },
    routes::params::{OrderListQuery, SortOrder},
    state::AppState,
};

const DEFAULT_LOW_STOCK_THRESHOLD: i32 = 5;

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    let (page, per_page, offset) = query.pagination.normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        let wanted = OrderStatus::try_from_value(status)
            .map_err(|_| AppError::Validation("unknown order status".into()))?;
        condition = condition.add(OrderCol::Status.eq(wanted));
    }

    let mut select = Orders::find().filter(condition);
    select = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => select.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => select.order_by_desc(OrderCol::CreatedAt),
    };

    let total = select.clone().count(&state.orm).await? as i64;
    let items = select
        .limit(per_page as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Order::from)
        .collect();

    Ok(ApiResponse::success(
        "Orders",
        OrderList { items },
        Some(Meta::new(page, per_page, total)),
    ))
}

pub async fn get_order_admin(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithLines>> {
    ensure_admin(user)?;
    let order: Order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?
        .into();

    let lines = OrderLines::find()
        .filter(LineCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(OrderLine::from)
        .collect();

    Ok(ApiResponse::success(
        "Order found",
        OrderWithLines { order, lines },
        None,
    ))
}

/// Move an order along its lifecycle. Unknown statuses are rejected
/// outright; known ones still have to be legal from the current status.
pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: StatusUpdateRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;
    let next = OrderStatus::try_from_value(&payload.status)
        .map_err(|_| AppError::Validation("unknown order status".into()))?;

    // The legality check and the write happen under one row lock, so two
    // concurrent transitions serialize instead of interleaving.
    let txn = state.orm.begin().await?;
    let current = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    if !current.status.can_transition_to(next) {
        return Err(AppError::BadRequest(format!(
            "cannot move order from {} to {}",
            current.status.to_value(),
            next.to_value()
        )));
    }

    let mut active: OrderActive = current.into();
    active.status = Set(next);
    active.updated_at = Set(Utc::now().into());
    let updated = active.update(&txn).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        user.user_id,
        "order_status_update",
        "orders",
        serde_json::json!({ "order_id": updated.id, "status": updated.status }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order updated",
        Order::from(updated),
        None,
    ))
}

pub async fn list_low_stock(
    state: &AppState,
    user: &AuthUser,
    query: LowStockQuery,
) -> AppResult<ApiResponse<ProductList>> {
    ensure_admin(user)?;
    let threshold = query.threshold.unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD);
    let (page, per_page, offset) = query.pagination.normalize();

    // Emptiest shelves first, so the urgent rows lead the restock list.
    let select = Products::find()
        .filter(ProdCol::Stock.lte(threshold))
        .order_by_asc(ProdCol::Stock)
        .order_by_desc(ProdCol::CreatedAt);

    let total = select.clone().count(&state.orm).await? as i64;
    let items = select
        .limit(per_page as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    Ok(ApiResponse::success(
        "Low stock",
        ProductList { items },
        Some(Meta::new(page, per_page, total)),
    ))
}

/// Apply a signed stock delta under lock, so a restock cannot race a
/// checkout into a negative balance.
pub async fn adjust_inventory(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: StockAdjustment,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    if payload.delta == 0 {
        return Err(AppError::Validation("delta must not be 0".into()));
    }

    let txn = state.orm.begin().await?;
    let product = Products::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let new_stock = product.stock + payload.delta;
    if new_stock < 0 {
        return Err(AppError::BadRequest("stock cannot go negative".into()));
    }

    let mut active: ProductActive = product.into();
    active.stock = Set(new_stock);
    let updated = active.update(&txn).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        user.user_id,
        "inventory_adjust",
        "products",
        serde_json::json!({ "product_id": updated.id, "delta": payload.delta }),
    )
    .await;

    Ok(ApiResponse::success(
        "Inventory updated",
        Product::from(updated),
        None,
    ))
}

pub async fn list_audit_logs(
    state: &AppState,
    user: &AuthUser,
    query: AuditLogQuery,
) -> AppResult<ApiResponse<AuditLogList>> {
    ensure_admin(user)?;
    let (page, per_page, offset) = query.pagination.normalize();

    let mut condition = Condition::all();
    if let Some(action) = query.action.as_ref().filter(|a| !a.is_empty()) {
        condition = condition.add(AuditCol::Action.eq(action.clone()));
    }
    if let Some(user_id) = query.user_id {
        condition = condition.add(AuditCol::UserId.eq(user_id));
    }

    let select = AuditLogs::find()
        .filter(condition)
        .order_by_desc(AuditCol::CreatedAt);

    let total = select.clone().count(&state.orm).await? as i64;
    let items = select
        .limit(per_page as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(AuditLog::from)
        .collect();

    Ok(ApiResponse::success(
        "Audit logs",
        AuditLogList { items },
        Some(Meta::new(page, per_page, total)),
    ))
}
