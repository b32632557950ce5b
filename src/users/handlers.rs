use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use tracing::{info, instrument};

use super::dto::{
    AuthResponse, LoginRequest, MessageResponse, ProfileResponse, RegisterInput,
    RegisterRequest, RegisterResponse, UpdatePasswordRequest, UpdateProfileRequest,
};
use super::extractors::{AuthUser, FormPayload, TOKEN_COOKIE};
use super::model::{Profile, PublicUser};
use super::services;
use crate::{error::AppError, state::AppState};

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/profile", get(get_profile))
        .route("/profile/edit", put(update_profile))
        .route("/update/password", put(update_password))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

fn token_cookie(value: String) -> Cookie<'static> {
    Cookie::build((TOKEN_COOKIE, value))
        .path("/")
        .http_only(true)
        .secure(true)
        .build()
}

fn clearing_cookie() -> Cookie<'static> {
    let mut cookie = token_cookie(String::new());
    cookie.set_max_age(time::Duration::ZERO);
    cookie
}

#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    payload: FormPayload<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let input = RegisterInput::try_from(payload.fields)?;
    let user = services::register(&state, input, payload.resume).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            success: true,
            message: "User registered successfully.".into(),
            user: PublicUser::from(&user),
        }),
    ))
}

#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: FormPayload<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let (user, token) = services::login(&state, payload.fields).await?;

    Ok((
        jar.add(token_cookie(token.clone())),
        Json(AuthResponse {
            success: true,
            message: "User logged in successfully.".into(),
            user: PublicUser::from(&user),
            token,
        }),
    ))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn logout(
    AuthUser(user): AuthUser,
    jar: CookieJar,
) -> (CookieJar, Json<MessageResponse>) {
    info!("user logged out");
    (
        jar.add(clearing_cookie()),
        Json(MessageResponse {
            success: true,
            message: "User logged out successfully.".into(),
        }),
    )
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<ProfileResponse>, AppError> {
    let user = services::get_profile(&state, user.id).await?;
    Ok(Json(ProfileResponse {
        success: true,
        message: None,
        user: Profile::from(&user),
    }))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    payload: FormPayload<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>, AppError> {
    let updated =
        services::update_profile(&state, user.id, payload.fields.into(), payload.resume).await?;
    Ok(Json(ProfileResponse {
        success: true,
        message: Some("Profile updated.".into()),
        user: Profile::from(&updated),
    }))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn update_password(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    jar: CookieJar,
    payload: FormPayload<UpdatePasswordRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let (user, token) = services::update_password(&state, user.id, payload.fields).await?;

    Ok((
        jar.add(token_cookie(token.clone())),
        Json(AuthResponse {
            success: true,
            message: "Password updated successfully.".into(),
            user: PublicUser::from(&user),
            token,
        }),
    ))
}
