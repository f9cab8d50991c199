//! API-facing models. Entities stay private to the persistence layer; these
//! are the shapes that cross the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::{self, OrderStatus, PaymentMethod};

/// Public view of a user account. The password hash never leaves the server.
#[derive(Debug, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Minor currency units, e.g. cents.
    pub unit_price: i64,
    pub stock: i32,
    pub created_at: DateTime<Utc>,
}

impl From<entity::products::Model> for Product {
    fn from(row: entity::products::Model) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            unit_price: row.unit_price,
            stock: row.stock,
            created_at: row.created_at.with_timezone(&Utc),
        }
    }
}

/// Raw cart line as stored, without the joined product.
#[derive(Debug, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct CartLine {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub subtotal: i64,
    pub shipping_cost: i64,
    pub tax_amount: i64,
    pub total_amount: i64,
    pub shipping_address: String,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<entity::orders::Model> for Order {
    fn from(row: entity::orders::Model) -> Self {
        Self {
            id: row.id,
            order_number: row.order_number,
            user_id: row.user_id,
            status: row.status,
            subtotal: row.subtotal,
            shipping_cost: row.shipping_cost,
            tax_amount: row.tax_amount,
            total_amount: row.total_amount,
            shipping_address: row.shipping_address,
            payment_method: row.payment_method,
            notes: row.notes,
            created_at: row.created_at.with_timezone(&Utc),
            updated_at: row.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderLine {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    /// Product price frozen at checkout time.
    pub unit_price: i64,
    pub created_at: DateTime<Utc>,
}

impl From<entity::order_lines::Model> for OrderLine {
    fn from(row: entity::order_lines::Model) -> Self {
        Self {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            quantity: row.quantity,
            unit_price: row.unit_price,
            created_at: row.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuditLog {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub action: String,
    pub resource: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl From<entity::audit_logs::Model> for AuditLog {
    fn from(row: entity::audit_logs::Model) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            action: row.action,
            resource: row.resource,
            metadata: row.metadata,
            created_at: row.created_at.with_timezone(&Utc),
        }
    }
}
