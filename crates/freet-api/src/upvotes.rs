use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use freet_types::api::{MessageResponse, UpvoteEnvelope, UpvoteResponse};

use crate::auth::{AppState, with_db};
use crate::error::ApiError;
use crate::format;
use crate::guards;
use crate::middleware::Session;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpvoteQuery {
    pub author: Option<String>,
    pub freet_id: Option<String>,
}

/// GET /upvotes, GET /upvotes?author=U, GET /upvotes?freetId=F
pub async fn get_upvotes(
    State(state): State<AppState>,
    Query(query): Query<UpvoteQuery>,
) -> Result<Json<Vec<UpvoteResponse>>, ApiError> {
    let rows = if let Some(author) = query.author {
        let author = guards::user_by_username(&state, &author).await?;
        with_db(&state, move |db| db.get_upvotes_by_author(&author.id)).await?
    } else if let Some(freet_id) = query.freet_id {
        let freet = guards::freet_exists(&state, &freet_id).await?;
        with_db(&state, move |db| db.get_upvotes_by_freet(&freet.id)).await?
    } else {
        with_db(&state, |db| db.get_upvotes()).await?
    };

    Ok(Json(rows.iter().map(format::upvote).collect()))
}

/// POST /upvotes/{freet_id}
///
/// The upvote row and the user's upvoted list are written separately. The
/// unique (author, freet) constraint turns a concurrent duplicate into a 409;
/// nothing else makes the pair atomic.
pub async fn create_upvote(
    State(state): State<AppState>,
    Path(freet_id): Path<String>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    let user = guards::require_user(&state, &session).await?;
    let freet = guards::freet_exists(&state, &freet_id).await?;
    guards::require_not_upvoted(&user, &freet.id)?;

    let upvote_id = Uuid::new_v4().to_string();
    let (vid, uid, fid) = (upvote_id.clone(), user.id.clone(), freet.id.clone());
    let inserted = with_db(&state, move |db| db.insert_upvote(&vid, &uid, &fid)).await?;
    if !inserted {
        return Err(guards::already_upvoted());
    }

    let row = with_db(&state, move |db| {
        db.add_upvoted_freet(&user.id, &freet.id)?;
        db.get_upvote(&upvote_id)
    })
    .await?
    .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("upvote vanished after insert")))?;

    Ok((
        StatusCode::CREATED,
        Json(UpvoteEnvelope {
            message: "You upvoted this freet.".into(),
            upvote: format::upvote(&row),
        }),
    ))
}

/// DELETE /upvotes/{id} — author only.
pub async fn delete_upvote(
    State(state): State<AppState>,
    Path(upvote_id): Path<String>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    let user = guards::require_user(&state, &session).await?;
    let upvote = guards::upvote_exists(&state, &upvote_id).await?;
    guards::require_upvote_author(&user, &upvote)?;

    with_db(&state, move |db| {
        db.remove_upvoted_freet(&user.id, &upvote.freet_id)?;
        db.delete_upvote(&upvote.id)
    })
    .await?;

    Ok(Json(MessageResponse {
        message: "Your upvote was removed.".into(),
    }))
}
