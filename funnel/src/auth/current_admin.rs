//! Request extractor for the signed-in admin.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use tracing::{instrument, trace};

use crate::{
    AppState,
    api::models::auth::CurrentAdmin,
    auth::session,
    config::Config,
    errors::{Error, Result},
};

/// Admin from the session cookie, if the cookie is present.
///
/// Returns:
/// - None: no session cookie
/// - Some(Ok(admin)): valid session
/// - Some(Err(error)): cookie present but invalid or expired
fn try_session_cookie(parts: &Parts, config: &Config) -> Option<Result<CurrentAdmin>> {
    let cookie_header = parts.headers.get(header::COOKIE)?;

    let cookie_str = match cookie_header.to_str() {
        Ok(s) => s,
        Err(e) => {
            return Some(Err(Error::BadRequest {
                message: format!("Invalid cookie header: {e}"),
            }));
        }
    };
    let cookie_name = &config.auth.session.cookie_name;

    cookie_str
        .split(';')
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(name, _)| name == cookie_name)
        .map(|(_, value)| session::verify_session_token(value, config))
}

/// Admin from an `Authorization: Bearer <jwt>` header, if present.
fn try_bearer_token(parts: &Parts, config: &Config) -> Option<Result<CurrentAdmin>> {
    let auth_header = parts.headers.get(header::AUTHORIZATION)?;
    let auth_str = auth_header.to_str().ok()?;
    let token = auth_str.strip_prefix("Bearer ")?;

    Some(session::verify_session_token(token.trim(), config))
}

impl FromRequestParts<AppState> for CurrentAdmin {
    type Rejection = Error;

    #[instrument(skip_all)]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        // A valid credential wins even when the other one is stale
        let attempts = [try_session_cookie(parts, &state.config), try_bearer_token(parts, &state.config)];

        let mut last_error = None;
        for attempt in attempts.into_iter().flatten() {
            match attempt {
                Ok(admin) => {
                    trace!(admin_id = admin.id, "Authenticated admin");
                    return Ok(admin);
                }
                Err(e) => last_error = Some(e),
            }
        }

        Err(match last_error {
            Some(Error::Unauthenticated { .. }) | None => Error::Unauthenticated {
                message: Some("Sign in to access the admin dashboard".to_string()),
            },
            Some(other) => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_app_state;
    use axum::http::{HeaderValue, Request};
    use sqlx::SqlitePool;

    fn parts_with(name: header::HeaderName, value: &str) -> Parts {
        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
        parts.headers.insert(name, HeaderValue::from_str(value).unwrap());
        parts
    }

    fn token(state: &AppState) -> String {
        let admin = CurrentAdmin {
            id: 1,
            email: "admin@example.com".to_string(),
        };
        session::create_session_token(&admin, &state.config).unwrap()
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_cookie_authenticates(pool: SqlitePool) {
        let (state, _dir) = create_test_app_state(pool);
        let cookie = format!("other=1; {}={}", state.config.auth.session.cookie_name, token(&state));
        let mut parts = parts_with(header::COOKIE, &cookie);

        let admin = CurrentAdmin::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(admin.email, "admin@example.com");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_bearer_authenticates(pool: SqlitePool) {
        let (state, _dir) = create_test_app_state(pool);
        let mut parts = parts_with(header::AUTHORIZATION, &format!("Bearer {}", token(&state)));

        let admin = CurrentAdmin::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(admin.id, 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_missing_or_bad_credentials_are_unauthenticated(pool: SqlitePool) {
        let (state, _dir) = create_test_app_state(pool);

        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
        let err = CurrentAdmin::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert!(matches!(err, Error::Unauthenticated { .. }));

        let mut parts = parts_with(header::AUTHORIZATION, "Bearer forged");
        let err = CurrentAdmin::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert!(matches!(err, Error::Unauthenticated { .. }));
    }
}
