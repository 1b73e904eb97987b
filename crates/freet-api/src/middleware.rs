use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use jsonwebtoken::{DecodingKey, Validation, decode};
use uuid::Uuid;

use freet_types::api::Claims;

use crate::auth::{AppState, SESSION_COOKIE};

/// Identity of the requester, resolved once per request and handed to
/// handlers as an extension. Anonymous when no valid token was presented.
#[derive(Debug, Clone, Default)]
pub struct Session {
    claims: Option<Claims>,
}

impl Session {
    pub fn user_id(&self) -> Option<Uuid> {
        self.claims.as_ref().map(|c| c.sub)
    }
}

/// Resolve the session token from `Authorization: Bearer` or the session
/// cookie. Never rejects; guards decide what anonymous callers may do.
pub async fn load_session(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let token = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_string())
        .or_else(|| {
            CookieJar::from_headers(req.headers())
                .get(SESSION_COOKIE)
                .map(|c| c.value().to_string())
        });

    let claims = token.and_then(|token| decode_token(&token, &state.jwt_secret));

    req.extensions_mut().insert(Session { claims });
    next.run(req).await
}

fn decode_token(token: &str, secret: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims)
}
