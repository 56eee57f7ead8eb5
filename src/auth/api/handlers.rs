//! HTTP handlers
//!
//! Thin adapters: parse the request, call the session manager, wrap the
//! result in the envelope. Multipart files are staged under `upload_dir`
//! and removed once the operation has finished.

use axum::{
    extract::{
        multipart::{Multipart, MultipartRejection},
        rejection::JsonRejection,
        State,
    },
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    cookies::{read_cookie, REFRESH_TOKEN_COOKIE},
    extract::CurrentUser,
    response::ApiResponse,
    AppState,
};
use crate::auth::{errors::SessionError, media::MediaBlob, types::*};

/// Text fields and staged files of a multipart request
#[derive(Debug, Default)]
pub struct StagedForm {
    fields: HashMap<String, String>,
    files: HashMap<String, MediaBlob>,
}

impl StagedForm {
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields.get(name).cloned()
    }

    pub fn file(&self, name: &str) -> Option<MediaBlob> {
        self.files.get(name).cloned()
    }

    /// Remove every staged file from disk
    pub async fn cleanup(self) {
        for blob in self.files.into_values() {
            remove_staged(&blob.path).await;
        }
    }
}

async fn remove_staged(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("failed to remove staged upload {}: {}", path.display(), e);
        }
    }
}

/// Read a multipart body, writing file parts to `upload_dir` under random
/// names. An empty file part counts as absent. On error nothing is left on disk.
pub async fn stage_multipart(
    upload_dir: &Path,
    mut multipart: Multipart,
) -> Result<StagedForm, SessionError> {
    tokio::fs::create_dir_all(upload_dir)
        .await
        .map_err(|e| SessionError::Internal(format!("cannot create upload dir: {e}")))?;

    let mut form = StagedForm::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                form.cleanup().await;
                return Err(SessionError::Validation(format!("invalid multipart body: {e}")));
            }
        };

        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        let Some(file_name) = field.file_name().map(str::to_string) else {
            match field.text().await {
                Ok(text) => {
                    form.fields.insert(name, text);
                }
                Err(e) => {
                    form.cleanup().await;
                    return Err(SessionError::Validation(format!("invalid field {name}: {e}")));
                }
            }
            continue;
        };

        let content_type = field.content_type().map(str::to_string);
        let bytes = match field.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                form.cleanup().await;
                return Err(SessionError::Validation(format!("invalid file {name}: {e}")));
            }
        };
        if bytes.is_empty() {
            continue;
        }

        let path = upload_dir.join(Uuid::new_v4().simple().to_string());
        if let Err(e) = tokio::fs::write(&path, &bytes).await {
            form.cleanup().await;
            return Err(SessionError::Internal(format!(
                "failed to stage upload {}: {e}",
                path.display()
            )));
        }

        let mut blob = MediaBlob::new(path, file_name);
        if let Some(content_type) = content_type {
            blob = blob.with_content_type(content_type);
        }
        if let Some(previous) = form.files.insert(name, blob) {
            remove_staged(&previous.path).await;
        }
    }

    Ok(form)
}

fn json_body<T: DeserializeOwned>(payload: Result<Json<T>, JsonRejection>) -> Result<T, SessionError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| SessionError::Validation(e.body_text()))
}

fn multipart_body(payload: Result<Multipart, MultipartRejection>) -> Result<Multipart, SessionError> {
    payload.map_err(|e| SessionError::Validation(e.body_text()))
}

pub async fn healthcheck() -> impl IntoResponse {
    ApiResponse::ok(json!({ "status": "ok" }), "OK")
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, SessionError> {
    let form = stage_multipart(&state.upload_dir, multipart_body(multipart)?).await?;

    let registration = Registration {
        full_name: form.text("fullName"),
        email: form.text("email"),
        username: form.text("username"),
        password: form.text("password"),
        avatar: form.file("avatar"),
        cover_image: form.file("coverImage"),
    };

    let result = state.sessions.register(registration).await;
    form.cleanup().await;

    let user = result?;
    Ok(ApiResponse::created(user, "User registered successfully"))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, SessionError> {
    let request = json_body(payload)?;
    let session = state.sessions.login(&request).await?;

    Ok((
        state.cookies.set_session(&session.tokens()),
        ApiResponse::ok(session, "User logged in successfully"),
    ))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, SessionError> {
    state.sessions.logout(&user.id).await?;

    Ok((
        state.cookies.clear_session(),
        ApiResponse::ok(json!({}), "User logged out"),
    ))
}

/// The cookie wins over the body
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Option<Json<RefreshRequest>>,
) -> Result<impl IntoResponse, SessionError> {
    let presented = read_cookie(&headers, REFRESH_TOKEN_COOKIE)
        .or_else(|| body.and_then(|Json(request)| request.refresh_token));

    let tokens = state.sessions.refresh_session(presented.as_deref()).await?;

    Ok((
        state.cookies.set_session(&tokens),
        ApiResponse::ok(tokens, "Access token refreshed"),
    ))
}

pub async fn change_password(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<impl IntoResponse, SessionError> {
    let request = json_body(payload)?;
    state
        .sessions
        .change_password(&user.id, &request.old_password, &request.new_password)
        .await?;

    Ok(ApiResponse::ok(json!({}), "Password changed successfully"))
}

pub async fn current_user(CurrentUser(user): CurrentUser) -> impl IntoResponse {
    ApiResponse::ok(user, "User fetched successfully")
}

pub async fn update_account(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<UpdateAccountRequest>, JsonRejection>,
) -> Result<impl IntoResponse, SessionError> {
    let request = json_body(payload)?;
    let updated = state
        .sessions
        .update_profile(&user.id, request.full_name.as_deref(), request.email.as_deref())
        .await?;

    Ok(ApiResponse::ok(updated, "Account details updated successfully"))
}

pub async fn update_avatar(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, SessionError> {
    let form = stage_multipart(&state.upload_dir, multipart_body(multipart)?).await?;
    let blob = form.file("avatar");

    let result = state.sessions.update_avatar(&user.id, blob.as_ref()).await;
    form.cleanup().await;

    let updated = result?;
    info!("avatar updated via api: user_id={}", updated.id);
    Ok(ApiResponse::ok(updated, "Avatar image updated successfully"))
}

pub async fn update_cover_image(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, SessionError> {
    let form = stage_multipart(&state.upload_dir, multipart_body(multipart)?).await?;
    let blob = form.file("coverImage");

    let result = state.sessions.update_cover_image(&user.id, blob.as_ref()).await;
    form.cleanup().await;

    let updated = result?;
    info!("cover image updated via api: user_id={}", updated.id);
    Ok(ApiResponse::ok(updated, "Cover image updated successfully"))
}
