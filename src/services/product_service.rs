use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, SqlErr,
};
use uuid::Uuid;

use crate::dto::products::{CreateProductRequest, ProductList, UpdateProductRequest};
use crate::{
    audit,
    entity::products::{ActiveModel, Column, Entity as Products},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Product,
    response::{ApiResponse, Meta},
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    state::AppState,
};

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, per_page, offset) = query.pagination.normalize();
    let mut condition = Condition::all();

    if let Some(search) = query.q.as_ref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{search}%");
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::Name).ilike(pattern.clone()))
                .add(Expr::col(Column::Description).ilike(pattern)),
        );
    }

    if let Some(min_price) = query.min_price {
        condition = condition.add(Column::UnitPrice.gte(min_price));
    }
    if let Some(max_price) = query.max_price {
        condition = condition.add(Column::UnitPrice.lte(max_price));
    }
    if query.in_stock == Some(true) {
        condition = condition.add(Column::Stock.gt(0));
    }

    let sort_col = match query.sort_by.unwrap_or(ProductSortBy::CreatedAt) {
        ProductSortBy::CreatedAt => Column::CreatedAt,
        ProductSortBy::Price => Column::UnitPrice,
        ProductSortBy::Name => Column::Name,
    };
    let mut select = Products::find().filter(condition);
    select = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => select.order_by_asc(sort_col),
        SortOrder::Desc => select.order_by_desc(sort_col),
    };

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
        "Products",
        ProductList { items },
        Some(Meta::new(page, per_page, total)),
    ))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let product: Product = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?
        .into();
    Ok(ApiResponse::success("Product", product, None))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;

    let active = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(checked_name(&payload.name)?),
        description: Set(payload.description),
        unit_price: Set(checked_price(payload.unit_price)?),
        stock: Set(checked_stock(payload.stock)?),
        created_at: NotSet,
    };
    let product = active.insert(&state.orm).await?;

    audit::record(
        &state.pool,
        user.user_id,
        "product_create",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product created",
        Product::from(product),
        None,
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    let existing = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(checked_name(&name)?);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(unit_price) = payload.unit_price {
        active.unit_price = Set(checked_price(unit_price)?);
    }
    if let Some(stock) = payload.stock {
        active.stock = Set(checked_stock(stock)?);
    }

    let product = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        user.user_id,
        "product_update",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product updated",
        Product::from(product),
        None,
    ))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    // Ordered products keep their history; the order_lines foreign key
    // blocks the delete and we surface that as a client error.
    let result = match Products::delete_by_id(id).exec(&state.orm).await {
        Ok(res) => res,
        Err(err) if matches!(err.sql_err(), Some(SqlErr::ForeignKeyConstraintViolation(_))) => {
            return Err(AppError::BadRequest(
                "product has order history and cannot be deleted".into(),
            ));
        }
        Err(err) => return Err(err.into()),
    };
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.pool,
        user.user_id,
        "product_delete",
        "products",
        serde_json::json!({ "product_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product deleted",
        serde_json::json!({}),
        None,
    ))
}

fn checked_name(raw: &str) -> AppResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AppError::Validation("name must not be empty".into()));
    }
    Ok(name.to_string())
}

fn checked_price(unit_price: i64) -> AppResult<i64> {
    if unit_price < 0 {
        return Err(AppError::Validation("unit_price must not be negative".into()));
    }
    Ok(unit_price)
}

fn checked_stock(stock: i32) -> AppResult<i32> {
    if stock < 0 {
        return Err(AppError::Validation("stock must not be negative".into()));
    }
    Ok(stock)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_trimmed_and_must_not_be_blank() {
        assert_eq!(checked_name("  Oat Milk 1L ").unwrap(), "Oat Milk 1L");
        assert!(checked_name("   ").is_err());
    }

    #[test]
    fn negative_amounts_are_rejected() {
        assert!(checked_price(-1).is_err());
        assert!(checked_stock(-1).is_err());
        assert_eq!(checked_price(0).unwrap(), 0);
        assert_eq!(checked_stock(0).unwrap(), 0);
    }
}
