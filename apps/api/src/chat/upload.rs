//! Résumé upload endpoint: multipart PDF in, extracted text + AI analysis out.

use axum::extract::{Multipart, Path, State};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::auth::MaybeAuthUser;
use crate::chat::messages::{
    bump_chat_metadata, insert_message, parse_chat_id, process_assistant_response,
    resolve_or_create_chat,
};
use crate::errors::AppError;
use crate::models::chat::{MESSAGE_TYPE_PDF, ROLE_USER};
use crate::sessions;
use crate::state::AppState;

const FALLBACK_FILE_NAME: &str = "resume.pdf";

#[derive(Debug, Serialize)]
pub struct UploadResumeResponse {
    #[serde(rename = "chatId")]
    pub chat_id: Uuid,
    pub data: Option<ExtractedResume>,
}

#[derive(Debug, Serialize)]
pub struct ExtractedResume {
    pub raw_text: String,
}

#[derive(Debug, Default)]
struct UploadForm {
    file: Option<(String, Vec<u8>)>,
    file_name: Option<String>,
    session_id: Option<String>,
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart payload: {e}")))?
    {
        match field.name() {
            Some("file") => {
                let name = field.file_name().map(str::to_string).unwrap_or_default();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read file: {e}")))?;
                form.file = Some((name, bytes.to_vec()));
            }
            Some("fileName") => {
                form.file_name = field.text().await.ok();
            }
            Some("sessionId") => {
                form.session_id = field.text().await.ok();
            }
            // jobDescription is accepted but currently unused
            _ => {
                let _ = field.bytes().await;
            }
        }
    }
    Ok(form)
}

async fn upload_resume(
    state: &AppState,
    chat_id: Option<Uuid>,
    user_id: Option<Uuid>,
    multipart: Multipart,
) -> Result<UploadResumeResponse, AppError> {
    let form = read_upload_form(multipart).await?;

    if form.file.is_none() && form.file_name.is_none() {
        return Err(AppError::Validation("File or file name is required".into()));
    }

    let file_name = form
        .file
        .as_ref()
        .map(|(name, _)| name.clone())
        .filter(|name| !name.is_empty())
        .or(form.file_name.clone())
        .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string());

    let effective_chat_id = resolve_or_create_chat(&state.db, chat_id, user_id).await?;

    // Extraction failures are logged, not fatal: the attachment message is
    // still recorded and the assistant still replies.
    let mut extracted_text: Option<String> = None;
    if let Some((_, bytes)) = form.file {
        match state.ai.extract_text(&file_name, bytes).await {
            Ok(text) => extracted_text = Some(text),
            Err(e) => tracing::error!(file_name = %file_name, "text extraction failed: {e}"),
        }
    }

    let content = match &extracted_text {
        Some(text) => format!("Attached file: {file_name}\n\n=== RESUME CONTENT ===\n{text}"),
        None => format!("Attached file: {file_name}"),
    };

    // Anonymous uploads can stash the parsed résumé on their session so it
    // survives until the account is created. The chat is linked to the
    // session too, so a later transfer can hand it over.
    if user_id.is_none() {
        if let Some(raw_session) = form.session_id.as_deref() {
            let session_id = Uuid::parse_str(raw_session)
                .map_err(|_| AppError::NotFound("Session not found or expired".into()))?;
            if let Some(text) = &extracted_text {
                sessions::handlers::update_session_data(
                    &state.db,
                    session_id,
                    &json!({ "raw_text": text }),
                )
                .await?;
            }
            sessions::handlers::link_chat_to_session(&state.db, session_id, effective_chat_id)
                .await?;
        }
    }

    insert_message(
        &state.db,
        effective_chat_id,
        ROLE_USER,
        MESSAGE_TYPE_PDF,
        &content,
        None,
    )
    .await?;

    process_assistant_response(state, effective_chat_id, user_id).await?;
    bump_chat_metadata(&state.db, effective_chat_id).await?;

    Ok(UploadResumeResponse {
        chat_id: effective_chat_id,
        data: extracted_text.map(|raw_text| ExtractedResume { raw_text }),
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /chats/upload-resume (no chat yet; one is created)
pub async fn handle_upload_resume_new(
    State(state): State<AppState>,
    MaybeAuthUser(user_id): MaybeAuthUser,
    multipart: Multipart,
) -> Result<Json<UploadResumeResponse>, AppError> {
    let response = upload_resume(&state, None, user_id, multipart).await?;
    Ok(Json(response))
}

/// POST /chats/:id/upload-resume
pub async fn handle_upload_resume(
    State(state): State<AppState>,
    MaybeAuthUser(user_id): MaybeAuthUser,
    Path(raw_chat_id): Path<String>,
    multipart: Multipart,
) -> Result<Json<UploadResumeResponse>, AppError> {
    let chat_id = parse_chat_id(&raw_chat_id)?;
    let response = upload_resume(&state, chat_id, user_id, multipart).await?;
    Ok(Json(response))
}
