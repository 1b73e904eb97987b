use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use freet_types::api::{
    CreateFreetRequest, FreetEnvelope, FreetResponse, LoginRequest, MessageResponse,
    RegisterRequest, SessionResponse, UpdateUserRequest, UpvoteEnvelope, UpvoteResponse,
    UserEnvelope,
};

use crate::error::ClientError;

/// Which upvotes `GET /upvotes` should return.
#[derive(Debug, Clone, Copy, Default)]
pub enum UpvoteFilter<'a> {
    #[default]
    All,
    ByAuthor(&'a str),
    OnFreet(&'a str),
}

/// One signed-in (or anonymous) view of the API. Calls that start a session
/// keep the returned token and send it as a bearer token from then on.
#[derive(Debug, Clone)]
pub struct FreetsClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl FreetsClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    // -- Users --

    /// POST /users. Signs the client in on success.
    pub async fn register(
        &mut self,
        username: &str,
        password: &str,
        birthday: &str,
    ) -> Result<UserEnvelope, ClientError> {
        let body = RegisterRequest {
            username: username.into(),
            password: password.into(),
            birthday: birthday.into(),
        };
        let reply: UserEnvelope = self.send(self.request(Method::POST, "/users").json(&body)).await?;
        self.keep_token(&reply);
        Ok(reply)
    }

    /// PUT /users. The server re-issues the token, so it is swapped here too.
    pub async fn update_user(&mut self, changes: &UpdateUserRequest) -> Result<UserEnvelope, ClientError> {
        let reply: UserEnvelope = self.send(self.request(Method::PUT, "/users").json(changes)).await?;
        self.keep_token(&reply);
        Ok(reply)
    }

    /// DELETE /users
    pub async fn delete_user(&mut self) -> Result<MessageResponse, ClientError> {
        let reply = self.send(self.request(Method::DELETE, "/users")).await?;
        self.token = None;
        Ok(reply)
    }

    /// GET /users/session
    pub async fn session(&self) -> Result<SessionResponse, ClientError> {
        self.send(self.request(Method::GET, "/users/session")).await
    }

    /// POST /users/session
    pub async fn sign_in(&mut self, username: &str, password: &str) -> Result<UserEnvelope, ClientError> {
        let body = LoginRequest {
            username: username.into(),
            password: password.into(),
        };
        let reply: UserEnvelope = self
            .send(self.request(Method::POST, "/users/session").json(&body))
            .await?;
        self.keep_token(&reply);
        Ok(reply)
    }

    /// DELETE /users/session. The local token is dropped even though the
    /// server cannot revoke it.
    pub async fn sign_out(&mut self) -> Result<MessageResponse, ClientError> {
        let reply = self.send(self.request(Method::DELETE, "/users/session")).await?;
        self.token = None;
        Ok(reply)
    }

    // -- Freets --

    /// GET /freets
    pub async fn freets(&self) -> Result<Vec<FreetResponse>, ClientError> {
        self.send(self.request(Method::GET, "/freets")).await
    }

    /// GET /freets?author=U
    pub async fn freets_by_author(&self, author: &str) -> Result<Vec<FreetResponse>, ClientError> {
        self.send(self.request(Method::GET, "/freets").query(&[("author", author)]))
            .await
    }

    /// GET /freets/{id}
    pub async fn freet(&self, freet_id: &str) -> Result<FreetEnvelope, ClientError> {
        self.send(self.request(Method::GET, &format!("/freets/{}", freet_id)))
            .await
    }

    /// POST /freets. Each entry of `flags` becomes a `reason: true` field.
    pub async fn create_freet(&self, content: &str, flags: &[&str]) -> Result<FreetEnvelope, ClientError> {
        let flags: Map<String, Value> = flags
            .iter()
            .map(|reason| (reason.to_string(), Value::Bool(true)))
            .collect();
        let body = CreateFreetRequest {
            content: Some(content.into()),
            flags,
        };
        self.send(self.request(Method::POST, "/freets").json(&body)).await
    }

    /// DELETE /freets/{id}
    pub async fn delete_freet(&self, freet_id: &str) -> Result<MessageResponse, ClientError> {
        self.send(self.request(Method::DELETE, &format!("/freets/{}", freet_id)))
            .await
    }

    // -- Upvotes --

    /// GET /upvotes, optionally filtered.
    pub async fn upvotes(&self, filter: UpvoteFilter<'_>) -> Result<Vec<UpvoteResponse>, ClientError> {
        let request = self.request(Method::GET, "/upvotes");
        let request = match filter {
            UpvoteFilter::All => request,
            UpvoteFilter::ByAuthor(author) => request.query(&[("author", author)]),
            UpvoteFilter::OnFreet(freet_id) => request.query(&[("freetId", freet_id)]),
        };
        self.send(request).await
    }

    /// POST /upvotes/{freetId}
    pub async fn upvote(&self, freet_id: &str) -> Result<UpvoteEnvelope, ClientError> {
        self.send(self.request(Method::POST, &format!("/upvotes/{}", freet_id)))
            .await
    }

    /// DELETE /upvotes/{upvoteId}
    pub async fn remove_upvote(&self, upvote_id: &str) -> Result<MessageResponse, ClientError> {
        self.send(self.request(Method::DELETE, &format!("/upvotes/{}", upvote_id)))
            .await
    }

    // -- Plumbing --

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let request = self.http.request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        debug!("{} {}", status, response.url().path());

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::from_response(status, &body));
        }

        Ok(response.json().await?)
    }

    fn keep_token(&mut self, reply: &UserEnvelope) {
        if let Some(token) = &reply.token {
            self.token = Some(token.clone());
        }
    }
}
