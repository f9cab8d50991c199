use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Product;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    #[schema(example = "Free Range Eggs 10pk")]
    pub name: String,
    pub description: Option<String>,
    /// Unit price in the smallest currency unit.
    #[schema(example = 32_000)]
    pub unit_price: i64,
    pub stock: i32,
}

/// Partial update; absent fields keep their current value.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub unit_price: Option<i64>,
    pub stock: Option<i32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductList {
    pub items: Vec<Product>,
}
