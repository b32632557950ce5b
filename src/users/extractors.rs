use axum::{
    async_trait,
    extract::{FromRef, FromRequest, FromRequestParts, Multipart, Request},
    http::{header, request::Parts, HeaderMap},
    Json,
};
use axum_extra::extract::CookieJar;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{error, warn};

use super::jwt::{JwtKeys, TokenError};
use super::model::SessionUser;
use crate::{error::AppError, state::AppState};

pub const TOKEN_COOKIE: &str = "token";
pub const RESUME_FIELD: &str = "resume";

/// Where a bearer token may be carried on a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Cookie,
    BearerHeader,
}

/// Sources are tried in this order; the first one carrying a token wins.
pub const TOKEN_SOURCES: [TokenSource; 2] = [TokenSource::Cookie, TokenSource::BearerHeader];

impl TokenSource {
    pub fn extract(self, headers: &HeaderMap) -> Option<String> {
        let raw = match self {
            TokenSource::Cookie => CookieJar::from_headers(headers)
                .get(TOKEN_COOKIE)
                .map(|c| c.value().to_string()),
            TokenSource::BearerHeader => headers
                .get(header::AUTHORIZATION)
                .and_then(|h| h.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
                .map(str::to_string),
        };
        raw.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
    }
}

pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    TOKEN_SOURCES.iter().find_map(|source| source.extract(headers))
}

pub const INVALID_TOKEN: &str = "Invalid or expired token.";
pub const TOKEN_VERIFICATION_FAILED: &str = "Token verification failed.";

/// Expired or malformed tokens are the client's fault; anything else is ours.
fn token_rejection(e: TokenError) -> AppError {
    match e {
        TokenError::Expired | TokenError::Invalid(_) => {
            warn!(error = %e, "rejected token");
            AppError::Unauthorized(INVALID_TOKEN.into())
        }
        TokenError::Unexpected(_) => {
            error!(error = %e, "token verification failed");
            AppError::upstream(TOKEN_VERIFICATION_FAILED, e)
        }
    }
}

/// The auth gate: verifies the request's token and loads the user it names.
#[derive(Debug, Clone)]
pub struct AuthUser(pub SessionUser);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers).ok_or_else(|| {
            AppError::Unauthorized("Authentication token is required.".into())
        })?;

        let claims = JwtKeys::from_ref(state)
            .verify(&token)
            .map_err(token_rejection)?;

        let user = state
            .users
            .find_by_id(claims.id)
            .await?
            .ok_or_else(|| AppError::NotFound("Invalid token or user not found.".into()))?;

        Ok(AuthUser(SessionUser::from(&user)))
    }
}

/// A file sent in the `resume` field of a multipart body.
#[derive(Debug, Clone)]
pub struct ResumeUpload {
    pub file_name: Option<String>,
    pub content_type: String,
    pub body: Bytes,
}

/// Request body given either as JSON or as `multipart/form-data`. Text parts
/// of a multipart body are deserialized into `T` the same way JSON would be.
pub struct FormPayload<T> {
    pub fields: T,
    pub resume: Option<ResumeUpload>,
}

fn bad_body(detail: impl std::fmt::Display) -> AppError {
    AppError::Validation(format!("Invalid request body: {detail}"))
}

#[async_trait]
impl<S, T> FromRequest<S> for FormPayload<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if !is_multipart {
            let Json(fields) = Json::<T>::from_request(req, state)
                .await
                .map_err(|e| bad_body(e.body_text()))?;
            return Ok(Self {
                fields,
                resume: None,
            });
        }

        let mut mp = Multipart::from_request(req, state)
            .await
            .map_err(|e| bad_body(e.body_text()))?;
        let mut map = Map::new();
        let mut resume = None;

        while let Some(field) = mp.next_field().await.map_err(|e| bad_body(e.body_text()))? {
            let name = field.name().unwrap_or_default().to_string();
            if name == RESUME_FIELD && field.file_name().is_some() {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field
                    .content_type()
                    .map(str::to_string)
                    .unwrap_or_else(|| "application/octet-stream".into());
                let body = field.bytes().await.map_err(|e| bad_body(e.body_text()))?;
                if !body.is_empty() {
                    resume = Some(ResumeUpload {
                        file_name,
                        content_type,
                        body,
                    });
                }
            } else if !name.is_empty() {
                let text = field.text().await.map_err(|e| bad_body(e.body_text()))?;
                map.insert(name, Value::String(text));
            }
        }

        let fields = serde_json::from_value(Value::Object(map)).map_err(bad_body)?;
        Ok(Self { fields, resume })
    }
}
