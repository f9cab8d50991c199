use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait,
    FromQueryResult, JoinType, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait,
    Set, SqlErr, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{CheckoutRequest, OrderList, OrderWithLines},
    entity::{
        OrderStatus, PaymentMethod,
        cart_lines::{self, Column as CartCol, Entity as CartLines},
        order_lines::{Column as LineCol, Entity as OrderLines},
        orders::{Column as OrderCol, Entity as Orders},
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult, StockShortage},
    middleware::auth::AuthUser,
    models::{Order, OrderLine},
    pricing::{self, PriceBreakdown},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    state::AppState,
};

const ORDER_NUMBER_PREFIX: &str = "ORD";
const ORDER_NUMBER_ATTEMPTS: u32 = 3;
const MAX_TEXT_LEN: usize = 500;

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, per_page, offset) = query.pagination.normalize();
    let mut condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
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

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithLines>> {
    // Scoping by owner makes someone else's order indistinguishable from a
    // missing one.
    let order: Order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
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

/// Convert the buyer's selected cart lines into a durable order.
///
/// Everything after validation happens inside one database transaction:
/// the cart rows and their product rows are read under `FOR UPDATE`, the
/// order and its lines are inserted with the locked prices, stock is
/// decremented, and the consumed cart rows are deleted. Any failure rolls
/// the whole attempt back. The only retry is for an order-number collision,
/// which restarts the transaction from scratch.
pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<OrderWithLines>> {
    let input = validate_request(payload)?;

    let mut attempt = 0;
    let data = loop {
        attempt += 1;
        match checkout_attempt(state, user, &input).await {
            Ok(data) => break data,
            Err(AppError::OrmError(err))
                if attempt < ORDER_NUMBER_ATTEMPTS && is_order_number_collision(&err) =>
            {
                tracing::debug!(attempt, "order number collision, retrying checkout");
            }
            Err(AppError::OrmError(err)) => return Err(AppError::CheckoutFailed(err)),
            Err(other) => return Err(other),
        }
    };

    tracing::info!(
        order_number = %data.order.order_number,
        user_id = %user.user_id,
        total_amount = data.order.total_amount,
        "order created"
    );

    audit::record(
        &state.pool,
        user.user_id,
        "checkout",
        "orders",
        serde_json::json!({
            "order_id": data.order.id,
            "order_number": data.order.order_number,
        }),
    )
    .await;

    Ok(ApiResponse::success("Checkout success", data, None))
}

/// Validated checkout fields, with the payment method parsed into its enum.
#[derive(Debug)]
struct CheckoutInput {
    shipping_address: String,
    payment_method: PaymentMethod,
    notes: Option<String>,
    cart_line_ids: Option<Vec<Uuid>>,
}

fn validate_request(payload: CheckoutRequest) -> AppResult<CheckoutInput> {
    let shipping_address = payload.shipping_address.trim().to_string();
    if shipping_address.is_empty() {
        return Err(AppError::Validation(
            "shipping_address must not be empty".into(),
        ));
    }
    if shipping_address.chars().count() > MAX_TEXT_LEN {
        return Err(AppError::Validation(format!(
            "shipping_address must be at most {MAX_TEXT_LEN} characters"
        )));
    }

    let payment_method = PaymentMethod::try_from_value(&payload.payment_method).map_err(|_| {
        AppError::Validation(
            "payment_method must be one of bank_transfer, cash_on_delivery, e_wallet".into(),
        )
    })?;

    let notes = payload
        .notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    if notes.as_ref().is_some_and(|n| n.chars().count() > MAX_TEXT_LEN) {
        return Err(AppError::Validation(format!(
            "notes must be at most {MAX_TEXT_LEN} characters"
        )));
    }

    Ok(CheckoutInput {
        shipping_address,
        payment_method,
        notes,
        cart_line_ids: payload.cart_line_ids,
    })
}

/// Cart line joined with its product, read under lock at the start of the
/// checkout transaction. `unit_price` and `stock` are authoritative for the
/// rest of the transaction because both rows stay locked.
#[derive(Debug, FromQueryResult)]
struct LockedLine {
    cart_line_id: Uuid,
    product_id: Uuid,
    product_name: String,
    quantity: i32,
    unit_price: i64,
    stock: i32,
}

async fn checkout_attempt(
    state: &AppState,
    user: &AuthUser,
    input: &CheckoutInput,
) -> AppResult<OrderWithLines> {
    let txn = state.orm.begin().await?;

    let mut condition = Condition::all().add(CartCol::UserId.eq(user.user_id));
    if let Some(ids) = &input.cart_line_ids {
        condition = condition.add(CartCol::Id.is_in(ids.iter().copied()));
    }

    // FOR UPDATE on the join locks the cart rows and their product rows
    // together; competing checkouts against the same stock serialize here.
    // Scanning in product id order keeps lock acquisition order stable
    // between transactions that share products.
    let rows = CartLines::find()
        .select_only()
        .column_as(CartCol::Id, "cart_line_id")
        .column_as(CartCol::ProductId, "product_id")
        .column_as(CartCol::Quantity, "quantity")
        .column_as(ProdCol::Name, "product_name")
        .column_as(ProdCol::UnitPrice, "unit_price")
        .column_as(ProdCol::Stock, "stock")
        .join(JoinType::InnerJoin, cart_lines::Relation::Products.def())
        .filter(condition)
        .order_by_asc(CartCol::ProductId)
        .lock(LockType::Update)
        .into_model::<LockedLine>()
        .all(&txn)
        .await?;

    if rows.is_empty() {
        return Err(AppError::EmptyCart);
    }

    // Report every short line at once instead of failing on the first.
    let shortages: Vec<StockShortage> = rows
        .iter()
        .filter(|row| row.quantity > row.stock)
        .map(|row| StockShortage {
            product_id: row.product_id,
            name: row.product_name.clone(),
            requested: row.quantity,
            available: row.stock,
        })
        .collect();
    if !shortages.is_empty() {
        return Err(AppError::InsufficientStock(shortages));
    }

    // Totals that would overflow i64 fail the request instead of wrapping.
    let overflow = || AppError::Validation("order total exceeds the supported price range".into());
    let subtotal = rows
        .iter()
        .try_fold(0i64, |acc, row| {
            pricing::line_total(row.unit_price, row.quantity)
                .and_then(|line_total| acc.checked_add(line_total))
        })
        .ok_or_else(overflow)?;
    let breakdown = PriceBreakdown::compute(subtotal, &state.pricing).ok_or_else(overflow)?;

    let order_number = next_order_number(&txn, Utc::now()).await?;

    let order = crate::entity::orders::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_number: Set(order_number),
        user_id: Set(user.user_id),
        status: Set(OrderStatus::Pending),
        subtotal: Set(breakdown.subtotal),
        shipping_cost: Set(breakdown.shipping_cost),
        tax_amount: Set(breakdown.tax_amount),
        total_amount: Set(breakdown.total_amount),
        shipping_address: Set(input.shipping_address.clone()),
        payment_method: Set(input.payment_method),
        notes: Set(input.notes.clone()),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut lines: Vec<OrderLine> = Vec::with_capacity(rows.len());
    for row in &rows {
        let line = crate::entity::order_lines::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(row.product_id),
            quantity: Set(row.quantity),
            unit_price: Set(row.unit_price),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        lines.push(line.into());

        Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(row.quantity))
            .filter(ProdCol::Id.eq(row.product_id))
            .exec(&txn)
            .await?;
    }

    // Consume exactly the lines that went into the order.
    CartLines::delete_many()
        .filter(CartCol::Id.is_in(rows.iter().map(|row| row.cart_line_id)))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    Ok(OrderWithLines {
        order: order.into(),
        lines,
    })
}

/// Next number in today's sequence, read inside the caller's transaction.
/// Two transactions can read the same count; the unique index on
/// `order_number` is the backstop and the caller retries on that collision.
async fn next_order_number<C: ConnectionTrait>(
    conn: &C,
    now: DateTime<Utc>,
) -> Result<String, DbErr> {
    let date = now.format("%Y%m%d").to_string();
    let taken = Orders::find()
        .filter(OrderCol::OrderNumber.like(format!("{ORDER_NUMBER_PREFIX}-{date}-%")))
        .count(conn)
        .await?;
    Ok(format_order_number(&date, taken + 1))
}

fn format_order_number(date: &str, sequence: u64) -> String {
    format!("{ORDER_NUMBER_PREFIX}-{date}-{sequence:04}")
}

fn is_order_number_collision(err: &DbErr) -> bool {
    matches!(
        err.sql_err(),
        Some(SqlErr::UniqueConstraintViolation(detail)) if detail.contains("order_number")
    )
}
