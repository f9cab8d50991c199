use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use password_hash::rand_core::OsRng;
use sqlx::FromRow;
use uuid::Uuid;

use crate::dto::auth::{Claims, LoginRequest, LoginResponse, RegisterRequest};
use crate::{
    audit,
    error::{AppError, AppResult},
    models::User,
    response::ApiResponse,
    state::AppState,
};

const MIN_PASSWORD_LEN: usize = 8;
const TOKEN_TTL_HOURS: i64 = 24;

/// Credential row for login. `models::User` never carries the hash, so
/// the lookup goes through this private shape instead.
#[derive(FromRow)]
struct UserAuthRow {
    id: Uuid,
    password_hash: String,
    role: String,
}

pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<User>> {
    let RegisterRequest { email, password } = payload;
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::Validation("email is not valid".to_string()));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let password_hash = hash_password(&password)?;

    // The unique index on email is the duplicate check; a racing second
    // registration loses here instead of at a prior SELECT.
    let inserted = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (email, password_hash)
        VALUES ($1, $2)
        RETURNING id, email, role, created_at
        "#,
    )
    .bind(email.as_str())
    .bind(password_hash)
    .fetch_one(&state.pool)
    .await;

    let user = match inserted {
        Ok(user) => user,
        Err(sqlx::Error::Database(db)) if db.constraint() == Some("users_email_key") => {
            return Err(AppError::BadRequest("Email is already taken".to_string()));
        }
        Err(err) => return Err(err.into()),
    };

    audit::record(
        &state.pool,
        user.id,
        "user_register",
        "users",
        serde_json::json!({ "email": user.email }),
    )
    .await;

    Ok(ApiResponse::success("User created", user, None))
}

pub async fn login_user(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let LoginRequest { email, password } = payload;
    let row: UserAuthRow =
        sqlx::query_as("SELECT id, password_hash, role FROM users WHERE email = $1")
            .bind(email.trim().to_lowercase())
            .fetch_optional(&state.pool)
            .await?
            .ok_or_else(|| AppError::BadRequest("Invalid email or password".into()))?;

    if !password_matches(&row.password_hash, &password)? {
        return Err(AppError::BadRequest("Invalid email or password".into()));
    }

    let token = issue_token(row.id, &row.role)?;

    audit::record(
        &state.pool,
        row.id,
        "user_login",
        "users",
        serde_json::json!({}),
    )
    .await;

    Ok(ApiResponse::success(
        "Logged in",
        LoginResponse {
            token: format!("Bearer {token}"),
        },
        None,
    ))
}

fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?;
    Ok(hash.to_string())
}

/// False for a wrong password; an unparseable stored hash is a server error.
fn password_matches(stored: &str, candidate: &str) -> AppResult<bool> {
    let parsed = PasswordHash::new(stored)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("stored password hash is invalid")))?;
    Ok(Argon2::default()
        .verify_password(candidate.as_bytes(), &parsed)
        .is_ok())
}

fn issue_token(user_id: Uuid, role: &str) -> AppResult<String> {
    let secret = std::env::var("JWT_SECRET")
        .map_err(|_| AppError::Internal(anyhow::anyhow!("JWT_SECRET is not set")))?;
    let expires = Utc::now() + Duration::hours(TOKEN_TTL_HOURS);
    let claims = Claims {
        sub: user_id.to_string(),
        role: role.to_string(),
        exp: expires.timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hashing_roundtrip() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(password_matches(&hash, "correct horse battery").unwrap());
        assert!(!password_matches(&hash, "wrong horse").unwrap());
    }
}
