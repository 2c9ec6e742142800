use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::{
    adapters::http::{
        app_state::AppState,
        middleware::{BearerToken, CurrentAccount},
    },
    app_error::AppResult,
    domain::entities::account::AccountView,
    use_cases::auth::RegisterInput,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/google/start", post(google_start))
        .route("/google/exchange", post(google_exchange))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterPayload {
    email: String,
    password: String,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    #[serde(default)]
    phone: Option<String>,
}

#[derive(Deserialize)]
struct LoginPayload {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct GoogleExchangePayload {
    code: String,
    state: String,
}

#[derive(Serialize)]
struct MeResponse {
    user: AccountView,
}

async fn register(
    State(app_state): State<AppState>,
    Json(payload): Json<RegisterPayload>,
) -> AppResult<impl IntoResponse> {
    let result = app_state
        .auth_use_cases
        .register(RegisterInput {
            email: payload.email,
            password: payload.password,
            first_name: payload.first_name,
            last_name: payload.last_name,
            phone: payload.phone,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(result)))
}

async fn login(
    State(app_state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> AppResult<impl IntoResponse> {
    let result = app_state
        .auth_use_cases
        .login(&payload.email, &payload.password)
        .await?;
    Ok(Json(result))
}

async fn logout(
    State(app_state): State<AppState>,
    BearerToken(token): BearerToken,
) -> AppResult<StatusCode> {
    app_state.auth_use_cases.logout(&token).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn me(CurrentAccount(current): CurrentAccount) -> AppResult<impl IntoResponse> {
    Ok(Json(MeResponse {
        user: AccountView::from(current.account()),
    }))
}

async fn google_start(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    Ok(Json(app_state.auth_use_cases.start_oauth()?))
}

async fn google_exchange(
    State(app_state): State<AppState>,
    Json(payload): Json<GoogleExchangePayload>,
) -> AppResult<impl IntoResponse> {
    let result = app_state
        .auth_use_cases
        .complete_oauth(&payload.code, &payload.state)
        .await?;
    Ok(Json(result))
}
