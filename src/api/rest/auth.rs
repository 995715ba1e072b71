//! Caller identity at the HTTP boundary.
//!
//! Sessions and tokens are validated upstream; the authenticating proxy
//! forwards the resolved identity in `x-actor-id` and `x-actor-role`.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::user::{Actor, Role};

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

#[axum::async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(actor) = parts.extensions.get::<Actor>() {
            return Ok(*actor);
        }

        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };

        let raw_id = header(ACTOR_ID_HEADER)
            .ok_or_else(|| AppError::Unauthorized("missing actor identity".to_string()))?;
        let raw_role = header(ACTOR_ROLE_HEADER)
            .ok_or_else(|| AppError::Unauthorized("missing actor role".to_string()))?;

        let id = Uuid::parse_str(raw_id.trim())
            .map_err(|_| AppError::Unauthorized("malformed actor identity".to_string()))?;
        let role = raw_role.parse::<Role>().map_err(AppError::Unauthorized)?;

        let actor = Actor::new(id, role);
        parts.extensions.insert(actor);
        Ok(actor)
    }
}

pub fn require_admin(actor: &Actor) -> Result<(), AppError> {
    match actor.role {
        Role::Admin => Ok(()),
        Role::Courier | Role::Customer => {
            Err(AppError::Forbidden("admin role required".to_string()))
        }
    }
}
