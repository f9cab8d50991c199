use crate::db::{DbPool, OrmConn};
use crate::pricing::PricingConfig;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub pricing: PricingConfig,
}
