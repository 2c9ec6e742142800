pub mod auth;
pub mod billing;
pub mod users;
pub mod verification;

use axum::Router;

use crate::adapters::http::app_state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router().merge(verification::router()))
        .nest("/users", users::router())
        .nest("/billing", billing::router())
}
