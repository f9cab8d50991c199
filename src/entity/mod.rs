pub mod audit_logs;
pub mod cart_lines;
pub mod order_lines;
pub mod orders;
pub mod products;
pub mod users;

pub use orders::{OrderStatus, PaymentMethod};
