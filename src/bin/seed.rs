use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use grocery_checkout_api::{config::AppConfig, db::create_pool};
use sqlx::PgPool;
use uuid::Uuid;

/// Accounts every fresh environment gets. Reruns only reassert the role.
const DEMO_ACCOUNTS: [(&str, &str, &str); 2] = [
    ("admin@example.com", "admin123!", "admin"),
    ("user@example.com", "user1234!", "user"),
];

/// Starter catalog; names that already exist are left untouched.
const CATALOG: [(&str, &str, i64, i32); 7] = [
    ("Bananas 1kg", "Cavendish, ripe", 25_000, 120),
    ("Whole Milk 1L", "Pasteurized, full cream", 22_000, 80),
    ("Sourdough Loaf", "Baked daily", 48_000, 30),
    ("Free Range Eggs 10pk", "Grade A", 35_000, 60),
    ("Arabica Beans 250g", "Medium roast, single origin", 95_000, 40),
    ("Jasmine Rice 5kg", "Premium grade", 78_000, 50),
    ("Olive Oil 500ml", "Extra virgin, cold pressed", 110_000, 25),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url, config.statement_timeout_ms).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    for (email, password, role) in DEMO_ACCOUNTS {
        let id = upsert_account(&pool, email, password, role).await?;
        println!("account {email} ({role}) -> {id}");
    }

    let inserted = seed_catalog(&pool).await?;
    println!("catalog seeded, {inserted} new products");
    Ok(())
}

async fn upsert_account(
    pool: &PgPool,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();

    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (email, password_hash, role)
        VALUES ($1, $2, $3)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

async fn seed_catalog(pool: &PgPool) -> anyhow::Result<u64> {
    let mut inserted = 0;
    for (name, description, unit_price, stock) in CATALOG {
        let result = sqlx::query(
            r#"
            INSERT INTO products (name, description, unit_price, stock)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(name)
        .bind(description)
        .bind(unit_price)
        .bind(stock)
        .execute(pool)
        .await?;
        inserted += result.rows_affected();
    }
    Ok(inserted)
}
