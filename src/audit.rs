use serde_json::Value;
use uuid::Uuid;

use crate::db::DbPool;

/// Append one audit row. Audit is best-effort by contract: a failed insert
/// is logged and swallowed so it can never fail the operation it describes.
pub async fn record(pool: &DbPool, actor: Uuid, action: &str, resource: &str, metadata: Value) {
    let outcome = sqlx::query(
        r#"
        INSERT INTO audit_logs (id, user_id, action, resource, metadata)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(actor)
    .bind(action)
    .bind(resource)
    .bind(metadata)
    .execute(pool)
    .await;

    if let Err(err) = outcome {
        tracing::warn!(action, error = %err, "audit insert failed");
    }
}
