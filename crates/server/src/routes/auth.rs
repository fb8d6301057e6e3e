use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use service::authz::{Actor, Role};
use service::reviews::ReviewService;

use crate::errors::ApiError;

pub const AUTH_COOKIE: &str = "auth_token";

#[derive(Clone)]
pub struct ServerAuthConfig {
    pub jwt_secret: String,
}

#[derive(Clone)]
pub struct ServerState {
    pub reviews: Arc<ReviewService>,
    pub auth: ServerAuthConfig,
}

/// Claims issued by the external auth service. Only `sub` and `role` are read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub role: Option<String>,
    pub exp: usize,
}

impl Claims {
    fn into_actor(self) -> Result<Actor, ApiError> {
        let id = Uuid::parse_str(&self.sub)
            .map_err(|_| ApiError::Unauthorized("token subject is not a user id".into()))?;
        let role = self.role.as_deref().map(Role::parse).unwrap_or_default();
        Ok(Actor::new(id, role))
    }
}

/// `Authorization: Bearer <token>` first, then the `auth_token` cookie.
fn bearer_token(req: &Request) -> Result<Option<String>, ApiError> {
    if let Some(value) = req.headers().get(header::AUTHORIZATION) {
        let value = value
            .to_str()
            .map_err(|_| ApiError::Unauthorized("malformed Authorization header".into()))?;
        return match value.strip_prefix("Bearer ") {
            Some(token) if !token.trim().is_empty() => Ok(Some(token.trim().to_string())),
            _ => Err(ApiError::Unauthorized("expected a Bearer token".into())),
        };
    }
    let jar = CookieJar::from_headers(req.headers());
    Ok(jar
        .get(AUTH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty()))
}

pub fn decode_actor(token: &str, secret: &str) -> Result<Actor, ApiError> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    let data = decode::<Claims>(token, &key, &validation).map_err(|e| {
        tracing::warn!(err = %e, "token validation failed");
        ApiError::Unauthorized("invalid or expired token".into())
    })?;
    data.claims.into_actor()
}

/// Route-layer middleware: resolves the caller into an [`Actor`] request extension.
pub async fn require_actor(
    State(state): State<ServerState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let path = req.uri().path().to_string();
    let token = match bearer_token(&req)? {
        Some(t) => t,
        None => {
            tracing::warn!(path = %path, "missing Authorization header and auth_token cookie");
            return Err(ApiError::Unauthorized("authentication required".into()));
        }
    };
    let actor = decode_actor(&token, &state.auth.jwt_secret)?;
    tracing::debug!(path = %path, actor_id = %actor.id, role = ?actor.role, "actor resolved");
    req.extensions_mut().insert(actor);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(sub: &str, role: Option<&str>, secret: &str, exp_offset: i64) -> String {
        let exp = (chrono::Utc::now().timestamp() + exp_offset) as usize;
        let claims = Claims { sub: sub.to_string(), role: role.map(str::to_string), exp };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn decodes_subject_and_role() {
        let id = Uuid::new_v4();
        let actor = decode_actor(&token(&id.to_string(), Some("admin"), "s3cret", 3600), "s3cret").unwrap();
        assert_eq!(actor.id, id);
        assert!(actor.role.is_admin());
    }

    #[test]
    fn missing_role_defaults_to_user() {
        let id = Uuid::new_v4();
        let actor = decode_actor(&token(&id.to_string(), None, "k", 3600), "k").unwrap();
        assert_eq!(actor.role, Role::User);
    }

    #[test]
    fn rejects_wrong_secret_and_expired_tokens() {
        let id = Uuid::new_v4().to_string();
        assert!(matches!(decode_actor(&token(&id, None, "a", 3600), "b"), Err(ApiError::Unauthorized(_))));
        assert!(matches!(decode_actor(&token(&id, None, "a", -3600), "a"), Err(ApiError::Unauthorized(_))));
    }

    #[test]
    fn rejects_non_uuid_subject() {
        let err = decode_actor(&token("alice", None, "k", 3600), "k").unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }
}
