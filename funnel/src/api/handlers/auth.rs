use axum::{Json, extract::State};
use chrono::Utc;
use tracing::instrument;

use crate::{
    AppState,
    api::models::auth::{AdminResponse, AuthResponse, AuthSuccessResponse, CurrentAdmin, LoginRequest, LoginResponse, LogoutResponse},
    auth::{password, session},
    db::handlers::AdminUsers,
    errors::{Error, Result},
};

fn invalid_credentials() -> Error {
    Error::Unauthenticated {
        message: Some("Invalid email or password".to_string()),
    }
}

/// Login with email and password
#[utoipa::path(
    post,
    path = "/authentication/login",
    request_body = LoginRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
    )
)]
#[instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<LoginResponse> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = AdminUsers::new(&mut conn);

    let email = request.email.trim().to_lowercase();
    let admin = repo.get_by_email(&email).await?.ok_or_else(invalid_credentials)?;
    let hash = admin.password_hash.clone().ok_or_else(invalid_credentials)?;

    // Verify password on a blocking thread to avoid blocking async runtime
    let password = request.password;
    let is_valid = tokio::task::spawn_blocking(move || password::verify_string(&password, &hash))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password verification task: {e}"),
        })??;

    if !is_valid {
        tracing::info!(admin_id = admin.id, "Rejected admin login");
        return Err(invalid_credentials());
    }

    repo.record_login(admin.id).await?;

    let current = CurrentAdmin::from(&admin);
    let token = session::create_session_token(&current, &state.config)?;
    let cookie = session::session_cookie(&token, &state.config);

    let mut admin = AdminResponse::from(admin);
    admin.last_login_at = Some(Utc::now());
    tracing::info!(admin_id = admin.id, "Admin signed in");

    Ok(LoginResponse {
        auth_response: AuthResponse {
            admin,
            token,
            message: "Login successful".to_string(),
        },
        cookie,
    })
}

/// Logout (clear session)
#[utoipa::path(
    post,
    path = "/authentication/logout",
    tag = "authentication",
    responses(
        (status = 200, description = "Logout successful", body = AuthSuccessResponse),
    )
)]
#[instrument(skip_all)]
pub async fn logout(State(state): State<AppState>) -> LogoutResponse {
    LogoutResponse {
        auth_response: AuthSuccessResponse {
            message: "Logout successful".to_string(),
        },
        cookie: session::clear_session_cookie(&state.config),
    }
}

/// The signed-in admin
#[utoipa::path(
    get,
    path = "/authentication/me",
    tag = "authentication",
    responses(
        (status = 200, description = "Current admin", body = CurrentAdmin),
        (status = 401, description = "Not signed in"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[instrument(skip_all)]
pub async fn me(admin: CurrentAdmin) -> Json<CurrentAdmin> {
    Json(admin)
}

#[cfg(test)]
mod tests {
    use crate::test_utils::{TEST_ADMIN_EMAIL, TEST_ADMIN_PASSWORD, create_test_app};
    use axum::http::{StatusCode, header};
    use serde_json::{Value, json};
    use sqlx::SqlitePool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_login_sets_cookie_and_returns_token(pool: SqlitePool) {
        let (server, _state, _dir) = create_test_app(pool).await;

        let response = server
            .post("/admin/api/v1/authentication/login")
            .json(&json!({ "email": TEST_ADMIN_EMAIL.to_uppercase(), "password": TEST_ADMIN_PASSWORD }))
            .await;
        response.assert_status_ok();

        let cookie = response.header(header::SET_COOKIE);
        let cookie = cookie.to_str().unwrap();
        assert!(cookie.starts_with("funnel_session="));
        assert!(cookie.contains("HttpOnly"));

        let body: Value = response.json();
        assert_eq!(body["admin"]["email"], TEST_ADMIN_EMAIL);
        assert!(body["admin"]["last_login_at"].is_string());
        let token = body["token"].as_str().unwrap();

        let response = server
            .get("/admin/api/v1/authentication/me")
            .add_header("authorization", format!("Bearer {token}"))
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["email"], TEST_ADMIN_EMAIL);

        // The cookie alone works too
        let session = cookie.split(';').next().unwrap().to_string();
        server
            .get("/admin/api/v1/authentication/me")
            .add_header("cookie", session)
            .await
            .assert_status_ok();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_wrong_password(pool: SqlitePool) {
        let (server, _state, _dir) = create_test_app(pool).await;

        let response = server
            .post("/admin/api/v1/authentication/login")
            .json(&json!({ "email": TEST_ADMIN_EMAIL, "password": "wrong" }))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(response.json::<Value>()["message"], "Invalid email or password");

        server
            .post("/admin/api/v1/authentication/login")
            .json(&json!({ "email": "nobody@funnel.test", "password": TEST_ADMIN_PASSWORD }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_logout_clears_cookie(pool: SqlitePool) {
        let (server, _state, _dir) = create_test_app(pool).await;

        let response = server.post("/admin/api/v1/authentication/logout").await;
        response.assert_status_ok();
        let cookie = response.header(header::SET_COOKIE);
        assert!(cookie.to_str().unwrap().contains("Max-Age=0"));
    }
}
