use crate::{
    diagnosis::Diagnosis,
    model_service::ModelError,
    server::SharedState,
    transform::{transform_image, TransformError},
};
use axum::{
    body::Bytes,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinError;
use tracing::instrument;

const FILE_FIELD: &str = "file";

#[derive(Error, Debug)]
pub enum PredictError {
    #[error("Invalid multipart request: {0}")]
    InvalidRequest(#[from] MultipartRejection),
    #[error("Failed to read multipart body: {0}")]
    Multipart(#[from] MultipartError),
    #[error("Missing multipart field `file`")]
    MissingFile,
    #[error("Uploaded file is not a valid image: {0}")]
    Decode(#[from] TransformError),
    #[error("Inference failed: {0}")]
    Model(#[from] ModelError),
    #[error("Prediction task failed: {0}")]
    Task(#[from] JoinError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    detail: String,
}

impl PredictError {
    fn kind(&self) -> &'static str {
        match self {
            PredictError::InvalidRequest(_) | PredictError::Multipart(_) => "multipart",
            PredictError::MissingFile => "missing_file",
            PredictError::Decode(_) => "decode",
            PredictError::Model(_) => "inference",
            PredictError::Task(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            PredictError::InvalidRequest(e) => e.status(),
            PredictError::Multipart(e) => e.status(),
            PredictError::MissingFile => StatusCode::BAD_REQUEST,
            PredictError::Decode(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PredictError::Model(_) | PredictError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for PredictError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Prediction failed: {}", self);
        } else {
            tracing::warn!("Rejected prediction request: {}", self);
        }

        let body = ErrorBody {
            error: self.kind(),
            detail: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[instrument(skip(state, multipart))]
pub async fn predict(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Diagnosis>, PredictError> {
    let image_data = read_file_field(multipart?).await?;

    // Decoding and inference are CPU bound.
    let model_service = state.model_service.clone();
    let score = tokio::task::spawn_blocking(move || -> Result<f32, PredictError> {
        let input = transform_image(&image_data)?;
        Ok(model_service.predict(input)?)
    })
    .await??;

    let diagnosis = Diagnosis::from_score(score);
    tracing::debug!(score, code = diagnosis.code, "Prediction computed");

    Ok(Json(diagnosis))
}

async fn read_file_field(mut multipart: Multipart) -> Result<Bytes, PredictError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(FILE_FIELD) {
            return Ok(field.bytes().await?);
        }
    }
    Err(PredictError::MissingFile)
}
