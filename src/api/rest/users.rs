use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::Json;
use axum::Router;

use crate::api::rest::auth::require_admin;
use crate::error::AppError;
use crate::models::user::{Actor, UserProfile};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/users/couriers", get(list_couriers))
}

async fn list_couriers(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<Vec<UserProfile>>, AppError> {
    require_admin(&actor)?;
    Ok(Json(state.directory.couriers().await))
}
