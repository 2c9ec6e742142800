use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    adapters::http::{app_state::AppState, middleware::CurrentAccount},
    app_error::AppResult,
    domain::entities::account::AccountView,
    use_cases::accounts::ProfileUpdate,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/profile", get(profile).patch(update_profile))
        .route("/me/password", post(change_password))
        .route("/2fa/setup", post(two_factor_setup))
        .route("/2fa/verify-setup", post(two_factor_verify_setup))
        .route("/2fa/disable", post(two_factor_disable))
        .route("/2fa/verify", post(two_factor_verify))
        .route("/2fa/backup-codes", get(backup_codes))
        .route("/2fa/regenerate-backup-codes", post(regenerate_backup_codes))
        .route("/{id}/suspend", post(suspend))
        .route("/{id}/activate", post(activate))
        .route("/{id}", delete(delete_account))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangePasswordPayload {
    current_password: String,
    new_password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfilePayload {
    first_name: Option<String>,
    last_name: Option<String>,
    phone: Option<String>,
    avatar: Option<String>,
}

#[derive(Deserialize)]
struct CodePayload {
    token: String,
}

#[derive(Deserialize)]
struct DisablePayload {
    password: Option<String>,
    token: String,
}

#[derive(Deserialize)]
struct PasswordPayload {
    password: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BackupCodesResponse {
    backup_codes: Vec<String>,
}

#[derive(Serialize)]
struct VerifiedResponse {
    verified: bool,
}

async fn profile(CurrentAccount(current): CurrentAccount) -> Json<AccountView> {
    Json(AccountView::from(current.account()))
}

async fn update_profile(
    State(app_state): State<AppState>,
    CurrentAccount(current): CurrentAccount,
    Json(payload): Json<ProfilePayload>,
) -> AppResult<Json<AccountView>> {
    let update = ProfileUpdate {
        first_name: payload.first_name,
        last_name: payload.last_name,
        phone: payload.phone,
        avatar: payload.avatar,
    };
    let view = app_state
        .account_use_cases
        .update_profile(&current.resolved, update)
        .await?;
    Ok(Json(view))
}

async fn two_factor_setup(
    State(app_state): State<AppState>,
    CurrentAccount(current): CurrentAccount,
) -> AppResult<impl IntoResponse> {
    let setup = app_state
        .account_use_cases
        .setup_two_factor(&current.resolved)
        .await?;
    Ok(Json(setup))
}

async fn two_factor_verify_setup(
    State(app_state): State<AppState>,
    CurrentAccount(current): CurrentAccount,
    Json(payload): Json<CodePayload>,
) -> AppResult<Json<BackupCodesResponse>> {
    let backup_codes = app_state
        .account_use_cases
        .confirm_two_factor(&current.resolved, &payload.token)
        .await?;
    Ok(Json(BackupCodesResponse { backup_codes }))
}

async fn two_factor_disable(
    State(app_state): State<AppState>,
    CurrentAccount(current): CurrentAccount,
    Json(payload): Json<DisablePayload>,
) -> AppResult<StatusCode> {
    app_state
        .account_use_cases
        .disable_two_factor(
            &current.resolved,
            payload.password.as_deref().unwrap_or_default(),
            &payload.token,
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn two_factor_verify(
    State(app_state): State<AppState>,
    CurrentAccount(current): CurrentAccount,
    Json(payload): Json<CodePayload>,
) -> AppResult<Json<VerifiedResponse>> {
    app_state
        .account_use_cases
        .verify_two_factor(&current.resolved, &payload.token)
        .await?;
    Ok(Json(VerifiedResponse { verified: true }))
}

async fn backup_codes(
    State(app_state): State<AppState>,
    CurrentAccount(current): CurrentAccount,
) -> AppResult<Json<BackupCodesResponse>> {
    let backup_codes = app_state.account_use_cases.backup_codes(&current.resolved)?;
    Ok(Json(BackupCodesResponse { backup_codes }))
}

async fn regenerate_backup_codes(
    State(app_state): State<AppState>,
    CurrentAccount(current): CurrentAccount,
    Json(payload): Json<PasswordPayload>,
) -> AppResult<Json<BackupCodesResponse>> {
    let backup_codes = app_state
        .account_use_cases
        .regenerate_backup_codes(
            &current.resolved,
            payload.password.as_deref().unwrap_or_default(),
        )
        .await?;
    Ok(Json(BackupCodesResponse { backup_codes }))
}

async fn change_password(
    State(app_state): State<AppState>,
    CurrentAccount(current): CurrentAccount,
    Json(payload): Json<ChangePasswordPayload>,
) -> AppResult<StatusCode> {
    app_state
        .account_use_cases
        .change_password(
            &current.resolved,
            &payload.current_password,
            &payload.new_password,
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn suspend(
    State(app_state): State<AppState>,
    CurrentAccount(current): CurrentAccount,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let view = app_state
        .account_use_cases
        .set_active(current.account(), id, false)
        .await?;
    Ok(Json(view))
}

async fn activate(
    State(app_state): State<AppState>,
    CurrentAccount(current): CurrentAccount,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let view = app_state
        .account_use_cases
        .set_active(current.account(), id, true)
        .await?;
    Ok(Json(view))
}

async fn delete_account(
    State(app_state): State<AppState>,
    CurrentAccount(current): CurrentAccount,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    app_state
        .account_use_cases
        .delete_account(current.account(), id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
