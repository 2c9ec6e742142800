use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::{
    adapters::http::{app_state::AppState, middleware::CurrentAccount},
    app_error::{AppError, AppResult},
    domain::entities::account::AccountView,
    use_cases::verification::VerificationOutcome,
};

/// Email verification and password reset, mounted under `/auth`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/verify-email", post(verify_email))
        .route("/resend-verification", post(resend_verification))
        .route("/verification-status", get(verification_status))
        .route("/forgot-password", post(forgot_password))
        .route("/forgot-password/email", post(forgot_password_email))
        .route("/verify-reset-code", post(verify_reset_code))
        .route("/reset-password", post(reset_password))
}

#[derive(Deserialize)]
struct TokenPayload {
    token: String,
}

#[derive(Deserialize)]
struct EmailPayload {
    email: String,
}

#[derive(Deserialize)]
struct PhonePayload {
    phone: String,
}

#[derive(Deserialize)]
struct ResetCodePayload {
    phone: String,
    code: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResetPasswordPayload {
    reset_token: String,
    new_password: String,
}

#[derive(Serialize)]
struct VerifiedResponse {
    verified: bool,
    user: AccountView,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResetTokenResponse {
    reset_token: String,
}

async fn verify_email(
    State(app_state): State<AppState>,
    Json(payload): Json<TokenPayload>,
) -> AppResult<impl IntoResponse> {
    match app_state
        .verification_use_cases
        .redeem_verification(&payload.token)
        .await?
    {
        VerificationOutcome::Verified(user) => Ok(Json(VerifiedResponse {
            verified: true,
            user,
        })),
        VerificationOutcome::Invalid => Err(AppError::TokenInvalidOrExpired),
        VerificationOutcome::Expired => Err(AppError::VerificationExpired),
        VerificationOutcome::AccountNotFound => Err(AppError::NotFound),
    }
}

async fn resend_verification(
    State(app_state): State<AppState>,
    Json(payload): Json<EmailPayload>,
) -> AppResult<impl IntoResponse> {
    let dispatch = app_state
        .verification_use_cases
        .resend_verification(&payload.email)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(dispatch)))
}

async fn verification_status(
    State(app_state): State<AppState>,
    CurrentAccount(current): CurrentAccount,
) -> AppResult<impl IntoResponse> {
    Ok(Json(
        app_state
            .verification_use_cases
            .verification_status(current.account()),
    ))
}

async fn forgot_password(
    State(app_state): State<AppState>,
    Json(payload): Json<PhonePayload>,
) -> AppResult<StatusCode> {
    app_state
        .verification_use_cases
        .request_reset(&payload.phone)
        .await?;
    Ok(StatusCode::ACCEPTED)
}

async fn forgot_password_email(
    State(app_state): State<AppState>,
    Json(payload): Json<EmailPayload>,
) -> AppResult<impl IntoResponse> {
    let dispatch = app_state
        .verification_use_cases
        .request_email_reset(&payload.email)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(dispatch)))
}

async fn verify_reset_code(
    State(app_state): State<AppState>,
    Json(payload): Json<ResetCodePayload>,
) -> AppResult<impl IntoResponse> {
    let reset_token = app_state
        .verification_use_cases
        .verify_reset_code(&payload.phone, &payload.code)
        .await?;
    Ok(Json(ResetTokenResponse { reset_token }))
}

async fn reset_password(
    State(app_state): State<AppState>,
    Json(payload): Json<ResetPasswordPayload>,
) -> AppResult<StatusCode> {
    app_state
        .verification_use_cases
        .apply_reset(&payload.reset_token, &payload.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
