use axum::{
    Extension, Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use freet_types::api::{CreateFreetRequest, FreetEnvelope, FreetResponse, MessageResponse};

use crate::auth::{AppState, with_db};
use crate::error::ApiError;
use crate::format;
use crate::guards;
use crate::middleware::Session;

#[derive(Debug, Deserialize)]
pub struct FreetQuery {
    /// Username whose freets to list.
    pub author: Option<String>,
}

/// GET /freets and GET /freets?author=U
///
/// Without an author filter, underage users do not see self-flagged freets.
pub async fn get_freets(
    State(state): State<AppState>,
    Query(query): Query<FreetQuery>,
    Extension(session): Extension<Session>,
) -> Result<Json<Vec<FreetResponse>>, ApiError> {
    let rows = match query.author {
        Some(author) => {
            let author = guards::user_by_username(&state, &author).await?;
            with_db(&state, move |db| db.get_freets_by_author(&author.id)).await?
        }
        None => {
            let viewer = guards::current_user(&state, &session).await?;
            let include_flagged = !viewer.is_some_and(|v| v.underage);
            with_db(&state, move |db| db.get_freets(include_flagged)).await?
        }
    };

    Ok(Json(rows.iter().map(format::freet).collect()))
}

/// GET /freets/{id}
pub async fn get_freet(
    State(state): State<AppState>,
    Path(freet_id): Path<String>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    let freet = guards::freet_exists(&state, &freet_id).await?;
    let viewer = guards::current_user(&state, &session).await?;
    guards::require_freet_visible(viewer.as_ref(), &freet)?;

    Ok(Json(FreetEnvelope {
        message: "Freet found.".into(),
        freet: format::freet(&freet),
    }))
}

/// POST /freets — body `{content, ...flags}`.
pub async fn create_freet(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    body: Result<Json<CreateFreetRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let user = guards::require_user(&state, &session).await?;
    let Json(req) = body?;
    let content = guards::validate_content(req.content.as_deref())?.to_string();
    let flags = guards::collect_flag_reasons(&req.flags);

    let freet_id = Uuid::new_v4().to_string();
    let row = with_db(&state, move |db| {
        db.insert_freet(&freet_id, &user.id, &content, &flags)?;
        db.get_freet(&freet_id)
    })
    .await?
    .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("freet vanished after insert")))?;

    Ok((
        StatusCode::CREATED,
        Json(FreetEnvelope {
            message: "Your freet was created successfully.".into(),
            freet: format::freet(&row),
        }),
    ))
}

/// DELETE /freets/{id} — author only. Takes the freet's upvotes with it.
pub async fn delete_freet(
    State(state): State<AppState>,
    Path(freet_id): Path<String>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    let user = guards::require_user(&state, &session).await?;
    let freet = guards::freet_exists(&state, &freet_id).await?;
    guards::require_freet_author(&user, &freet)?;

    with_db(&state, move |db| db.delete_freet(&freet.id)).await?;

    Ok(Json(MessageResponse {
        message: "Your freet was deleted successfully.".into(),
    }))
}
