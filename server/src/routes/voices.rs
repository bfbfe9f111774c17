// Voice asset routes

use audria_core::voice::{GenerateRequest, UploadRequest, VoiceInfo, VoiceRecord, VoiceSummary};
use audria_core::AudriaError;
use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::extract::CurrentUser;
use crate::AppState;

const DEFAULT_VOICE_TYPE: &str = "custom";
const DEFAULT_LANGUAGE: &str = "en";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_voices))
        .route("/upload", post(upload_voice))
        .route("/generate", post(generate_speech))
        .route("/generate/:voice_id", get(generate_speech_file))
        .route("/:voice_id", get(voice_info).delete(delete_voice))
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    success: bool,
    #[serde(flatten)]
    record: VoiceRecord,
}

#[derive(Debug, Serialize)]
struct ListResponse {
    success: bool,
    voices: Vec<VoiceSummary>,
}

#[derive(Debug, Serialize)]
struct InfoResponse {
    success: bool,
    #[serde(flatten)]
    info: VoiceInfo,
}

#[derive(Debug, Serialize)]
struct DeleteResponse {
    success: bool,
    message: String,
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

#[derive(Debug, Deserialize)]
struct GenerateBody {
    text: String,
    voice_id: String,
    #[serde(default = "default_language")]
    language: String,
    #[serde(default)]
    return_audio_data: bool,
}

#[derive(Debug, Serialize)]
struct GenerateResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_path: Option<String>,
    /// Base64-encoded WAV, only when requested
    #[serde(skip_serializing_if = "Option::is_none")]
    audio_data: Option<String>,
    tts_type: String,
    cloned: bool,
    message: String,
}

#[derive(Debug, Deserialize)]
struct GenerateQuery {
    text: String,
    #[serde(default = "default_language")]
    language: String,
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::bad_request(format!("Invalid multipart body: {e}"))
}

async fn upload_voice(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    let mut audio: Option<(String, Vec<u8>)> = None;
    let mut voice_name: Option<String> = None;
    let mut voice_type: Option<String> = None;
    let mut user_id: Option<String> = None;
    let mut test_text: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "audio_file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                audio = Some((filename, bytes.to_vec()));
            }
            "voice_name" => voice_name = Some(field.text().await.map_err(multipart_error)?),
            "voice_type" => voice_type = Some(field.text().await.map_err(multipart_error)?),
            "user_id" => user_id = Some(field.text().await.map_err(multipart_error)?),
            "test_text" => test_text = Some(field.text().await.map_err(multipart_error)?),
            other => warn!(target: "http", field = other, "Ignoring unknown upload field"),
        }
    }

    let (filename, bytes) = audio.ok_or_else(|| ApiError::bad_request("audio_file is required"))?;
    let voice_name = voice_name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("voice_name is required"))?;

    // Voices are always filed under the caller
    if let Some(requested) = user_id.filter(|u| !u.trim().is_empty()) {
        if requested.trim() != caller.user_id {
            return Err(AudriaError::Forbidden("Cannot upload voices for another user".into()).into());
        }
    }

    let record = state
        .voices
        .upload(UploadRequest {
            user_id: caller.user_id.clone(),
            voice_name,
            voice_type: voice_type
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_VOICE_TYPE.to_string()),
            filename,
            bytes,
            test_text,
        })
        .await?;
    info!(target: "http", user_id = %caller.user_id, voice_id = %record.voice_id, "Voice uploaded");
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            success: true,
            record,
        }),
    ))
}

async fn generate_speech(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(body): Json<GenerateBody>,
) -> ApiResult<Json<GenerateResponse>> {
    let speech = state
        .voices
        .generate(
            &caller.user_id,
            GenerateRequest {
                text: body.text,
                voice_id: body.voice_id,
                language: body.language,
            },
        )
        .await?;

    let (file_path, audio_data) = if body.return_audio_data {
        let bytes = tokio::fs::read(&speech.file_path)
            .await
            .map_err(AudriaError::from)?;
        if let Err(e) = tokio::fs::remove_file(&speech.file_path).await {
            warn!(target: "http", error = %e, "Failed to remove generated audio");
        }
        (None, Some(STANDARD.encode(bytes)))
    } else {
        (Some(speech.file_path.to_string_lossy().to_string()), None)
    };

    Ok(Json(GenerateResponse {
        success: true,
        file_path,
        audio_data,
        tts_type: speech.tts_type,
        cloned: speech.cloned,
        message: speech.message,
    }))
}

async fn generate_speech_file(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(voice_id): Path<String>,
    Query(query): Query<GenerateQuery>,
) -> ApiResult<impl IntoResponse> {
    let speech = state
        .voices
        .generate(
            &caller.user_id,
            GenerateRequest {
                text: query.text,
                voice_id: voice_id.clone(),
                language: query.language,
            },
        )
        .await?;

    let bytes = tokio::fs::read(&speech.file_path)
        .await
        .map_err(AudriaError::from)?;
    if let Err(e) = tokio::fs::remove_file(&speech.file_path).await {
        warn!(target: "http", error = %e, "Failed to remove generated audio");
    }

    // voice ids are restricted to [A-Za-z0-9_-], safe inside the quoted filename
    let disposition = format!("attachment; filename=\"speech_{voice_id}.wav\"");
    Ok((
        [
            (header::CONTENT_TYPE, "audio/wav".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

async fn list_voices(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> ApiResult<Json<ListResponse>> {
    let voices = state.voices.list(&caller.user_id).await?;
    Ok(Json(ListResponse {
        success: true,
        voices,
    }))
}

async fn voice_info(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(voice_id): Path<String>,
) -> ApiResult<Json<InfoResponse>> {
    let info = state.voices.info(&caller.user_id, &voice_id).await?;
    Ok(Json(InfoResponse {
        success: true,
        info,
    }))
}

async fn delete_voice(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(voice_id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    state.voices.delete(&caller.user_id, &voice_id).await?;
    info!(target: "http", user_id = %caller.user_id, voice_id = %voice_id, "Voice deleted");
    Ok(Json(DeleteResponse {
        success: true,
        message: format!("Voice {voice_id} deleted successfully"),
    }))
}
