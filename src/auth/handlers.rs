use axum::{
    extract::{
        rejection::{FormRejection, JsonRejection, QueryRejection},
        FromRef, Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Form, Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            LoginRequest, MessageResponse, PublicUser, RegisterRequest,
            ResendVerificationRequest, TokenCheckResponse, TokenResponse, VerifyEmailQuery,
        },
        errors::AuthError,
        extractors::AuthUser,
        jwt::JwtKeys,
        services,
        verification::{self, ConsumeOutcome},
    },
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login_form))
        .route("/auth/login/json", post(login_json))
        .route("/auth/verify-email", post(verify_email))
        .route("/auth/resend-verification", post(resend_verification))
}

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/me", get(get_me))
        .route("/auth/verify", get(check_token))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PublicUser>), AuthError> {
    let Json(payload) = payload?;
    let user =
        services::register(&state, &payload.email, &payload.username, &payload.password).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, payload))]
pub async fn login_form(
    State(state): State<AppState>,
    payload: Result<Form<LoginRequest>, FormRejection>,
) -> Result<Json<TokenResponse>, AuthError> {
    let Form(payload) = payload?;
    let token = services::login(&state, &payload.username, &payload.password).await?;
    Ok(Json(TokenResponse::bearer(token)))
}

#[instrument(skip(state, payload))]
pub async fn login_json(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, AuthError> {
    let Json(payload) = payload?;
    let token = services::login(&state, &payload.username, &payload.password).await?;
    Ok(Json(TokenResponse::bearer(token)))
}

#[instrument(skip(state, query))]
pub async fn verify_email(
    State(state): State<AppState>,
    query: Result<Query<VerifyEmailQuery>, QueryRejection>,
) -> Result<Json<MessageResponse>, AuthError> {
    let Query(query) = query?;
    let keys = JwtKeys::from_ref(&state);
    let outcome = verification::consume(state.users.as_ref(), &keys, query.token.trim()).await?;
    let message = match outcome {
        ConsumeOutcome::Verified => "Email verified successfully! You can now use all features.",
        ConsumeOutcome::AlreadyVerified => "Email already verified",
    };
    Ok(Json(MessageResponse::ok(message)))
}

#[instrument(skip(state, payload))]
pub async fn resend_verification(
    State(state): State<AppState>,
    payload: Result<Json<ResendVerificationRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AuthError> {
    let Json(payload) = payload?;
    services::resend_verification(&state, &payload.email).await?;
    Ok(Json(MessageResponse::ok(
        "If the email exists, a verification link has been sent.",
    )))
}

#[instrument(skip_all)]
pub async fn get_me(AuthUser(user): AuthUser) -> Json<PublicUser> {
    Json(user.into())
}

#[instrument(skip_all)]
pub async fn check_token(AuthUser(user): AuthUser) -> Json<TokenCheckResponse> {
    Json(TokenCheckResponse {
        valid: true,
        user_id: user.id,
        username: user.username,
        email_verified: user.email_verified,
    })
}
