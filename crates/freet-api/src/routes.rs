use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::auth::AppState;
use crate::middleware::load_session;
use crate::{freets, upvotes, users};

/// The REST surface. Every route sees a resolved [`crate::middleware::Session`].
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/users",
            post(users::register)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route(
            "/users/session",
            get(users::current_session)
                .post(users::sign_in)
                .delete(users::sign_out),
        )
        .route("/freets", get(freets::get_freets).post(freets::create_freet))
        .route(
            "/freets/{freet_id}",
            get(freets::get_freet).delete(freets::delete_freet),
        )
        .route("/upvotes", get(upvotes::get_upvotes))
        // POST takes a freet id, DELETE an upvote id
        .route(
            "/upvotes/{id}",
            post(upvotes::create_upvote).delete(upvotes::delete_upvote),
        )
        .layer(middleware::from_fn_with_state(state.clone(), load_session))
        .with_state(state)
}
