use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::info;
use uuid::Uuid;

use freet_db::models::UserRow;
use freet_types::api::{
    LoginRequest, MessageResponse, RegisterRequest, SessionResponse, UpdateUserRequest,
    UserEnvelope,
};
use freet_types::models::BIRTHDAY_FORMAT;

use crate::auth::{self, AppState, with_db};
use crate::error::ApiError;
use crate::format;
use crate::guards;
use crate::middleware::Session;

/// POST /users — register and sign in.
pub async fn register(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    jar: CookieJar,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    guards::require_signed_out(&state, &session).await?;
    let Json(req) = body?;
    guards::validate_username(&req.username)?;
    guards::validate_password(&req.password)?;
    let (birthday, underage) =
        guards::validate_birthday(&req.birthday, chrono::Utc::now().date_naive())?;
    guards::require_username_available(&state, &req.username, None).await?;

    let password_hash = auth::hash_password(&req.password)?;
    let user_id = Uuid::new_v4();
    let uid = user_id.to_string();
    let username = req.username.clone();
    let birthday = birthday.format(BIRTHDAY_FORMAT).to_string();

    let row = with_db(&state, move |db| {
        db.create_user(&uid, &username, &password_hash, &birthday, underage)?;
        db.get_user_by_id(&uid)
    })
    .await
    .map_err(guards::username_conflict)?
    .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("user vanished after insert")))?;

    info!("Registered user {} (underage: {})", row.username, row.underage);

    let token = auth::create_token(&state, user_id, &row.username)?;

    Ok((
        StatusCode::CREATED,
        jar.add(auth::session_cookie(token.clone())),
        Json(UserEnvelope {
            message: format!(
                "Your account was created successfully. You have been logged in as {}",
                row.username
            ),
            user: format::user(&row),
            token: Some(token),
        }),
    ))
}

/// PUT /users — change username and/or password of the signed-in user.
pub async fn update_user(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    jar: CookieJar,
    body: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let user = guards::require_user(&state, &session).await?;
    let Json(req) = body?;
    if req.username.is_none() && req.password.is_none() {
        return Err(ApiError::BadRequest(
            "Provide a username or password to update.".into(),
        ));
    }
    if let Some(username) = &req.username {
        guards::validate_username(username)?;
        guards::require_username_available(&state, username, Some(&user.id)).await?;
    }
    if let Some(password) = &req.password {
        guards::validate_password(password)?;
    }

    let password_hash = req.password.as_deref().map(auth::hash_password).transpose()?;
    let uid = user.id.clone();
    let row = with_db(&state, move |db| {
        if let Some(username) = &req.username {
            db.update_username(&uid, username)?;
        }
        if let Some(hash) = &password_hash {
            db.update_password(&uid, hash)?;
        }
        db.get_user_by_id(&uid)
    })
    .await
    .map_err(guards::username_conflict)?
    .ok_or_else(|| ApiError::Forbidden("You must be logged in to complete this action.".into()))?;

    let token = auth::create_token(&state, parse_user_id(&row)?, &row.username)?;

    Ok((
        jar.add(auth::session_cookie(token.clone())),
        Json(UserEnvelope {
            message: "Your profile was updated successfully.".into(),
            user: format::user(&row),
            token: Some(token),
        }),
    ))
}

/// DELETE /users — delete the signed-in user, their freets and their upvotes.
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let user = guards::require_user(&state, &session).await?;

    let uid = user.id.clone();
    with_db(&state, move |db| db.delete_user(&uid)).await?;
    info!("Deleted user {}", user.username);

    Ok((
        jar.remove(auth::expired_session_cookie()),
        Json(MessageResponse {
            message: "Your account has been deleted successfully.".into(),
        }),
    ))
}

/// GET /users/session
pub async fn current_session(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    let user = guards::current_user(&state, &session).await?;
    let message = if user.is_some() {
        "The current session user is found."
    } else {
        "There is no user currently logged in."
    };

    Ok(Json(SessionResponse {
        message: message.into(),
        user: user.as_ref().map(format::user),
    }))
}

/// POST /users/session — sign in.
pub async fn sign_in(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    jar: CookieJar,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    guards::require_signed_out(&state, &session).await?;
    let Json(req) = body?;
    if req.username.is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest(
            "Missing username or password credentials.".into(),
        ));
    }

    let bad_credentials =
        || ApiError::Unauthorized("Invalid user login credentials provided.".into());

    let name = req.username.clone();
    let user = with_db(&state, move |db| db.get_user_by_username(&name))
        .await?
        .ok_or_else(bad_credentials)?;

    if !auth::verify_password(&req.password, &user.password)? {
        return Err(bad_credentials());
    }

    let token = auth::create_token(&state, parse_user_id(&user)?, &user.username)?;

    Ok((
        jar.add(auth::session_cookie(token.clone())),
        Json(UserEnvelope {
            message: "You have logged in successfully".into(),
            user: format::user(&user),
            token: Some(token),
        }),
    ))
}

/// DELETE /users/session — sign out. Only the cookie is cleared; a bearer
/// token held elsewhere stays valid until it expires.
pub async fn sign_out(
    Extension(session): Extension<Session>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    guards::require_signed_in(&session)?;

    Ok((
        jar.remove(auth::expired_session_cookie()),
        Json(MessageResponse {
            message: "You have been logged out successfully.".into(),
        }),
    ))
}

fn parse_user_id(row: &UserRow) -> Result<Uuid, ApiError> {
    row.id
        .parse()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("corrupt user id '{}': {}", row.id, e)))
}
