//! Admin authentication payloads.

use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{db::models::admin_users::AdminUserDBResponse, types::AdminUserId};

/// The authenticated admin behind a request.
///
/// Extracted from the session cookie or a bearer token, see [`crate::auth::current_admin`].
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurrentAdmin {
    pub id: AdminUserId,
    pub email: String,
}

impl From<&AdminUserDBResponse> for CurrentAdmin {
    fn from(db: &AdminUserDBResponse) -> Self {
        Self {
            id: db.id,
            email: db.email.clone(),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AdminResponse {
    pub id: AdminUserId,
    pub email: String,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<AdminUserDBResponse> for AdminResponse {
    fn from(db: AdminUserDBResponse) -> Self {
        Self {
            id: db.id,
            email: db.email,
            last_login_at: db.last_login_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub admin: AdminResponse,
    /// Session JWT, also set as the session cookie. Send it as `Authorization: Bearer <token>`
    /// from scripts.
    pub token: String,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthSuccessResponse {
    pub message: String,
}

/// Successful login: JSON body plus the session cookie.
#[derive(Debug)]
pub struct LoginResponse {
    pub auth_response: AuthResponse,
    pub cookie: String,
}

impl IntoResponse for LoginResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, [(header::SET_COOKIE, self.cookie)], Json(self.auth_response)).into_response()
    }
}

/// Logout: JSON body plus an expired session cookie.
#[derive(Debug)]
pub struct LogoutResponse {
    pub auth_response: AuthSuccessResponse,
    pub cookie: String,
}

impl IntoResponse for LogoutResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, [(header::SET_COOKIE, self.cookie)], Json(self.auth_response)).into_response()
    }
}
