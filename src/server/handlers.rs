// ============================================================
// HTTP Handlers
// ============================================================
// predict_handler:
//   1. refuse early with 500 if the model never loaded
//   2. read the multipart fields (age, gender, location, image)
//   3. classify on the blocking pool (image decode + a dot
//      product over 12 291 features is CPU work)
//   4. map PredictError onto a status code + {error} body;
//      a task that dies becomes a 400 like any prediction error
//
// Every error body is JSON: {"error": "<message>"}

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

use super::AppState;
use crate::application::predict_use_case::{Prediction, PredictError, PredictionRequest};

// ─── Error response ───────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct ApiError {
    status:  StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<PredictError> for ApiError {
    fn from(e: PredictError) -> Self {
        let status = match e {
            PredictError::ModelUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PredictError::MissingField(_)
            | PredictError::InvalidAge(_)
            | PredictError::UnreadableImage(_) => StatusCode::BAD_REQUEST,
            PredictError::Prediction(_) => {
                tracing::error!("Prediction failed: {}", e);
                StatusCode::BAD_REQUEST
            }
        };
        ApiError::new(status, e.to_string())
    }
}

// ─── Handlers ─────────────────────────────────────────────────────────────────

/// `GET /`
pub async fn index_handler(State(state): State<Arc<AppState>>) -> Response {
    let path = state.static_dir.join("index.html");
    match tokio::fs::read_to_string(&path).await {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::warn!("Cannot serve '{}': {}", path.display(), e);
            ApiError::new(StatusCode::NOT_FOUND, "index.html not found").into_response()
        }
    }
}

/// `POST /predict`
pub async fn predict_handler(
    State(state): State<Arc<AppState>>,
    multipart:    Result<Multipart, MultipartRejection>,
) -> Result<Json<Prediction>, ApiError> {
    if let Some(e) = state.service.unavailable_error() {
        return Err(e.into());
    }

    let mut multipart = multipart
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, format!("Expected a multipart form: {e}")))?;
    let request = read_request(&mut multipart).await?;

    let service = Arc::clone(&state.service);
    let prediction = tokio::task::spawn_blocking(move || service.classify(&request))
        .await
        .map_err(task_failure)??;

    tracing::info!(
        "Predicted {} ({:.3})",
        prediction.prediction,
        prediction.confidence
    );
    Ok(Json(prediction))
}

/// A prediction task that died is reported like any other prediction error.
fn task_failure(e: tokio::task::JoinError) -> ApiError {
    tracing::error!("Prediction task failed: {}", e);
    ApiError::new(StatusCode::BAD_REQUEST, format!("Prediction failed: {e}"))
}

/// Collect the known form fields; anything else is ignored.
async fn read_request(multipart: &mut Multipart) -> Result<PredictionRequest, ApiError> {
    let bad = |e: axum::extract::multipart::MultipartError| {
        ApiError::new(StatusCode::BAD_REQUEST, format!("Malformed multipart body: {e}"))
    };

    let mut request = PredictionRequest::default();
    while let Some(field) = multipart.next_field().await.map_err(bad)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "age"      => request.age          = Some(field.text().await.map_err(bad)?),
            "gender"   => request.sex          = Some(field.text().await.map_err(bad)?),
            "location" => request.localization = Some(field.text().await.map_err(bad)?),
            "image"    => {
                let bytes = field.bytes().await.map_err(bad)?;
                request.image = Some(bytes.to_vec());
            }
            other => tracing::debug!("Ignoring form field '{}'", other),
        }
    }
    Ok(request)
}
