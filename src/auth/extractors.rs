use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;
use uuid::Uuid;

use super::jwt::{JwtKeys, TokenKind};
use super::repo::ROLE_ADMIN;
use crate::error::ApiError;

/// Authenticated caller, as proven by a valid access JWT.
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: Uuid,
    pub roles: Vec<String>,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r == ROLE_ADMIN)
    }
}

/// Extracts and validates the access JWT. Guarded routes fail here with
/// "You are not logged in." before any handler work happens.
#[derive(Debug)]
pub struct AuthUser(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthenticated)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .or_else(|| auth_header.strip_prefix("bearer "))
            .ok_or(ApiError::Unauthenticated)?;

        let claims = match keys.verify(token) {
            Ok(c) => c,
            Err(_) => {
                warn!("invalid or expired token");
                return Err(ApiError::Unauthenticated);
            }
        };

        if claims.kind != TokenKind::Access {
            return Err(ApiError::Unauthenticated);
        }

        Ok(AuthUser(Principal {
            id: claims.sub,
            roles: claims.roles,
        }))
    }
}

/// `AuthUser` plus the admin role. The role gate runs before the handler;
/// a non-admin caller is rejected with 403.
#[derive(Debug)]
pub struct AdminUser(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(principal) = AuthUser::from_request_parts(parts, state).await?;
        if !principal.is_admin() {
            warn!(user_id = %principal.id, "admin role required");
            return Err(ApiError::Forbidden);
        }
        Ok(AdminUser(principal))
    }
}

/// Ownership predicate for resource-scoped mutations. The admin role never
/// overrides ownership; the principal must be the recorded owner.
pub fn ensure_owner(principal: &Principal, owner_id: Uuid) -> Result<(), ApiError> {
    if principal.id != owner_id {
        return Err(ApiError::NotResourceOwner);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo::ROLE_USER;
    use crate::state::AppState;
    use axum::http::Request;

    fn principal(roles: &[&str]) -> Principal {
        Principal {
            id: Uuid::new_v4(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    fn parts_with_bearer(token: Option<&str>) -> Parts {
        let mut req = Request::new(());
        if let Some(token) = token {
            req.headers_mut().insert(
                axum::http::header::AUTHORIZATION,
                format!("Bearer {token}").parse().unwrap(),
            );
        }
        req.into_parts().0
    }

    #[tokio::test]
    async fn missing_authorization_header_is_unauthenticated() {
        let state = AppState::fake();
        let mut parts = parts_with_bearer(None);
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "You are not logged in.");
    }

    #[tokio::test]
    async fn garbage_token_is_unauthenticated() {
        let state = AppState::fake();
        let mut parts = parts_with_bearer(Some("not-a-jwt"));
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "You are not logged in.");
    }

    #[tokio::test]
    async fn valid_token_yields_the_principal() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let user_id = Uuid::new_v4();
        let token = keys
            .sign_access(user_id, &[ROLE_USER.to_string()])
            .unwrap();
        let mut parts = parts_with_bearer(Some(&token));
        let AuthUser(principal) = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert_eq!(principal.id, user_id);
        assert!(!principal.is_admin());
    }

    #[tokio::test]
    async fn non_admin_is_forbidden_before_the_handler() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let token = keys
            .sign_access(Uuid::new_v4(), &[ROLE_USER.to_string()])
            .unwrap();
        let mut parts = parts_with_bearer(Some(&token));
        let err = AdminUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Access denied.");
    }

    #[tokio::test]
    async fn admin_token_passes_the_role_gate() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let user_id = Uuid::new_v4();
        let token = keys
            .sign_access(user_id, &[ROLE_ADMIN.to_string(), ROLE_USER.to_string()])
            .unwrap();
        let mut parts = parts_with_bearer(Some(&token));
        let AdminUser(principal) = AdminUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert_eq!(principal.id, user_id);
        assert!(principal.is_admin());
    }

    #[test]
    fn admin_detection() {
        assert!(principal(&[ROLE_ADMIN, ROLE_USER]).is_admin());
        assert!(!principal(&[ROLE_USER]).is_admin());
        assert!(!principal(&[]).is_admin());
    }

    #[test]
    fn owner_check_accepts_owner_only() {
        let p = principal(&[ROLE_ADMIN]);
        assert!(ensure_owner(&p, p.id).is_ok());

        let err = ensure_owner(&p, Uuid::new_v4()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "You are not authorized to modify resource."
        );
    }
}
