use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::{
    auth::jwt::{AuthUser, JwtKeys},
    error::AppError,
    state::AppState,
    users::{
        dto::{CreateUserRequest, LoginRequest, LoginResponse, UpdateUserRequest, UserResponse},
        services,
    },
};

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(create_user).get(list_users))
        .route(
            "/users/:id",
            get(retrieve_user).patch(update_user).delete(delete_user),
        )
}

pub fn session_routes() -> Router<AppState> {
    Router::new().route("/login", post(login))
}

#[instrument(skip(state, payload))]
async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(AppError::BadRequest("Invalid email".into()));
    }
    if payload.password.is_empty() {
        warn!("empty password");
        return Err(AppError::BadRequest("Password must not be empty".into()));
    }

    let user = services::create(&state.db, payload).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, payload))]
async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(AppError::BadRequest("Invalid email".into()));
    }

    let keys = JwtKeys::from_ref(&state);
    let token = services::login(&state.db, &keys, payload).await?;
    Ok(Json(LoginResponse { token }))
}

#[instrument(skip(state, _auth))]
async fn list_users(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    let users = services::list(&state.db).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

#[instrument(skip(state, _auth))]
async fn retrieve_user(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<UserResponse>, AppError> {
    let user = services::retrieve(&state.db, id).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, _auth, payload))]
async fn update_user(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<Option<UserResponse>>, AppError> {
    let updated = services::update(&state.db, id, payload).await?;
    Ok(Json(updated.map(UserResponse::from)))
}

#[instrument(skip(state, _auth))]
async fn delete_user(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    services::delete(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape_check_accepts_plain_addresses() {
        assert!(is_valid_email("ana@mail.com"));
        assert!(is_valid_email("a.b+c@sub.domain.io"));
    }

    #[test]
    fn email_shape_check_rejects_garbage() {
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("two@@mail.com"));
        assert!(!is_valid_email("spaces in@mail.com"));
        assert!(!is_valid_email(""));
    }
}
