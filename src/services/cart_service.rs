use chrono::DateTime;
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit,
    dto::cart::{AddToCartRequest, CartLineDto, CartList},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{CartLine, Product},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

/// One cart line joined with the product it points at.
#[derive(FromRow)]
struct JoinedLine {
    line_id: Uuid,
    quantity: i32,
    product_id: Uuid,
    name: String,
    description: Option<String>,
    unit_price: i64,
    stock: i32,
    created_at: DateTime<chrono::Utc>,
}

impl From<JoinedLine> for CartLineDto {
    fn from(row: JoinedLine) -> Self {
        Self {
            id: row.line_id,
            quantity: row.quantity,
            product: Product {
                id: row.product_id,
                name: row.name,
                description: row.description,
                unit_price: row.unit_price,
                stock: row.stock,
                created_at: row.created_at,
            },
        }
    }
}

pub async fn list_cart(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<CartList>> {
    let (page, per_page, offset) = pagination.normalize();
    let rows = sqlx::query_as::<_, JoinedLine>(
        r#"
        SELECT cl.id AS line_id, cl.quantity, p.id AS product_id,
               p.name, p.description, p.unit_price, p.stock, p.created_at
        FROM cart_lines cl
        INNER JOIN products p ON p.id = cl.product_id
        WHERE cl.user_id = $1
        ORDER BY cl.created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user.user_id)
    .bind(per_page)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cart_lines WHERE user_id = $1")
        .bind(user.user_id)
        .fetch_one(&state.pool)
        .await?;

    let lines = rows.into_iter().map(CartLineDto::from).collect();

    Ok(ApiResponse::success(
        "Cart",
        CartList { lines },
        Some(Meta::new(page, per_page, total)),
    ))
}

/// Put a product in the cart, replacing the line's quantity if it is
/// already there. Stock is not checked here; checkout is where stock
/// is enforced, under lock.
pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartLine>> {
    if payload.quantity <= 0 {
        return Err(AppError::Validation(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let product: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE id = $1")
        .bind(payload.product_id)
        .fetch_optional(&state.pool)
        .await?;
    if product.is_none() {
        return Err(AppError::BadRequest("product not found".to_string()));
    }

    let line = sqlx::query_as::<_, CartLine>(
        r#"
        INSERT INTO cart_lines (user_id, product_id, quantity)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, product_id) DO UPDATE SET quantity = EXCLUDED.quantity
        RETURNING *
        "#,
    )
    .bind(user.user_id)
    .bind(payload.product_id)
    .bind(payload.quantity)
    .fetch_one(&state.pool)
    .await?;

    audit::record(
        &state.pool,
        user.user_id,
        "cart_update",
        "cart_lines",
        serde_json::json!({
            "product_id": payload.product_id,
            "quantity": payload.quantity,
        }),
    )
    .await;

    Ok(ApiResponse::success("Cart updated", line, None))
}

pub async fn remove_from_cart(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = sqlx::query("DELETE FROM cart_lines WHERE product_id = $1 AND user_id = $2")
        .bind(product_id)
        .bind(user.user_id)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.pool,
        user.user_id,
        "cart_remove",
        "cart_lines",
        serde_json::json!({ "product_id": product_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Removed from cart",
        serde_json::json!({}),
        None,
    ))
}
