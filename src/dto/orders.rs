use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Order, OrderLine};

/// Body of `POST /api/orders/checkout`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    #[schema(example = "12 Market Street, Springfield")]
    pub shipping_address: String,
    /// One of `bank_transfer`, `cash_on_delivery`, `e_wallet`.
    #[schema(example = "bank_transfer")]
    pub payment_method: String,
    #[serde(default)]
    pub notes: Option<String>,
    /// Check out only these cart lines; the whole cart when omitted.
    #[serde(default)]
    pub cart_line_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithLines {
    pub order: Order,
    pub lines: Vec<OrderLine>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}
