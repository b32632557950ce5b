use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

/// Error returned by every handler. Rendered as the JSON envelope
/// `{ success, message, errors, errorCode, path, timestamp }`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("All fields are required.")]
    MissingFields(Vec<&'static str>),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    /// A collaborator (asset store, token signer, hasher) failed.
    #[error("{message}")]
    Upstream {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn upstream(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::Upstream {
            message: message.into(),
            source: source.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingFields(_) | AppError::Validation(_) | AppError::Conflict(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Upstream { .. } | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::MissingFields(_) | AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Upstream { .. } => "UPSTREAM_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub success: bool,
    pub message: String,
    pub errors: Vec<String>,
    pub error_code: &'static str,
    pub path: Option<String>,
    pub timestamp: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Upstream { message, source } => {
                tracing::error!(error = ?source, "{message}");
                message.clone()
            }
            AppError::Internal(e) => {
                tracing::error!(error = ?e, "internal error");
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };
        let errors = match &self {
            AppError::MissingFields(fields) => fields.iter().map(|f| f.to_string()).collect(),
            _ => Vec::new(),
        };

        let envelope = ErrorEnvelope {
            success: false,
            message,
            errors,
            error_code: self.code(),
            path: None,
            timestamp: OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .unwrap_or_default(),
        };

        let mut res = (status, Json(envelope.clone())).into_response();
        res.extensions_mut().insert(envelope);
        res
    }
}

/// Stamps the request path onto every error envelope produced downstream.
pub async fn error_envelope(req: Request, next: Next) -> Response {
    let path = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let mut res = next.run(req).await;
    let envelope = res.extensions_mut().remove::<ErrorEnvelope>();
    match envelope {
        Some(mut envelope) => {
            envelope.path = Some(path);
            (res.status(), Json(envelope)).into_response()
        }
        None => res,
    }
}

pub async fn route_not_found() -> AppError {
    AppError::NotFound("Route not found.".into())
}
