//! Async client for the webmail REST API

use hyper::body::Bytes;
use hyper::client::HttpConnector;
use hyper::header::CONTENT_TYPE;
use hyper::{Body, Client, Method, Request, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use thiserror::Error;

use crate::auth::USER_ID_HEADER;
use crate::handlers::TokenResponse;
use crate::models::*;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    #[error("Invalid request: {0}")]
    Request(#[from] hyper::http::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not logged in")]
    NotLoggedIn,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Server returned {status}: {message}")]
    Api { status: u16, message: String },
}

impl ClientError {
    /// HTTP status the server answered with, if it answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Unauthorized(_) => Some(401),
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Registration<'a> {
    username: &'a str,
    password: &'a str,
    name: &'a str,
    avatar_url: &'a str,
}

#[derive(Clone)]
pub struct ApiClient {
    http: Client<HttpConnector>,
    base_url: String,
    user_id: Option<UserId>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user_id: None,
        }
    }

    pub fn with_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    // ── Users ──

    pub async fn register(
        &self,
        username: &str,
        password: &str,
        name: &str,
        avatar_url: &str,
    ) -> Result<UserProfile> {
        let body = Registration {
            username,
            password,
            name,
            avatar_url,
        };
        self.send_json(Method::POST, "/api/users", Some(&body), false)
            .await
    }

    pub async fn get_user(&self, id: UserId) -> Result<UserProfile> {
        self.send_json::<(), _>(Method::GET, &format!("/api/users/{}", id), None, false)
            .await
    }

    /// Exchange credentials for a user id and act as that user from now on
    pub async fn login(&mut self, username: &str, password: &str) -> Result<UserId> {
        let body = json!({ "username": username, "password": password });
        let token: TokenResponse = self
            .send_json(Method::POST, "/api/tokens", Some(&body), false)
            .await?;
        self.user_id = Some(token.user_id);
        Ok(token.user_id)
    }

    // ── Labels ──

    pub async fn labels(&self) -> Result<Vec<LabelView>> {
        self.send_json::<(), _>(Method::GET, "/api/labels", None, true)
            .await
    }

    pub async fn create_label(&self, name: &str, description: &str) -> Result<LabelView> {
        let body = json!({ "name": name, "description": description });
        self.send_json(Method::POST, "/api/labels", Some(&body), true)
            .await
    }

    pub async fn get_label(&self, id: LabelId) -> Result<LabelView> {
        self.send_json::<(), _>(Method::GET, &format!("/api/labels/{}", id), None, true)
            .await
    }

    pub async fn update_label(&self, id: LabelId, patch: &LabelPatch) -> Result<()> {
        self.send_empty(Method::PATCH, &format!("/api/labels/{}", id), Some(patch))
            .await
    }

    pub async fn delete_label(&self, id: LabelId) -> Result<()> {
        self.send_empty::<()>(Method::DELETE, &format!("/api/labels/{}", id), None)
            .await
    }

    // ── Mails ──

    pub async fn inbox(&self) -> Result<Vec<MailView>> {
        self.send_json::<(), _>(Method::GET, "/api/mails", None, true)
            .await
    }

    pub async fn get_mail(&self, id: MailId) -> Result<MailView> {
        self.send_json::<(), _>(Method::GET, &format!("/api/mails/{}", id), None, true)
            .await
    }

    pub async fn search(&self, query: &str) -> Result<Vec<MailView>> {
        let path = format!("/api/mails/search/{}", encode_path_segment(query));
        self.send_json::<(), _>(Method::GET, &path, None, true).await
    }

    pub async fn send_mail(&self, to: UserId, subject: &str, body: &str) -> Result<MailView> {
        let body = json!({ "toUserId": to, "subject": subject, "body": body });
        self.send_json(Method::POST, "/api/mails", Some(&body), true)
            .await
    }

    pub async fn update_mail(&self, id: MailId, patch: &MailPatch) -> Result<()> {
        self.send_empty(Method::PATCH, &format!("/api/mails/{}", id), Some(patch))
            .await
    }

    pub async fn set_mail_labels(&self, id: MailId, labels: &[String]) -> Result<MailView> {
        let body = json!({ "labels": labels });
        self.send_json(
            Method::PUT,
            &format!("/api/mails/{}/labels", id),
            Some(&body),
            true,
        )
        .await
    }

    pub async fn delete_mail(&self, id: MailId) -> Result<()> {
        self.send_empty::<()>(Method::DELETE, &format!("/api/mails/{}", id), None)
            .await
    }

    // ── Plumbing ──

    async fn send_json<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        authenticated: bool,
    ) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let bytes = self.send(method, path, body, authenticated).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn send_empty<B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        self.send(method, path, body, true).await.map(|_| ())
    }

    async fn send<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        authenticated: bool,
    ) -> Result<Bytes>
    where
        B: Serialize + ?Sized,
    {
        let mut builder = Request::builder()
            .method(method.clone())
            .uri(format!("{}{}", self.base_url, path));

        if authenticated {
            let id = self.user_id.ok_or(ClientError::NotLoggedIn)?;
            builder = builder.header(USER_ID_HEADER, id.to_string());
        }

        let request = match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(body)?))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.http.request(request).await?;
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await?;
        tracing::debug!(%method, path, status = status.as_u16(), "api call");

        if status.is_success() {
            return Ok(bytes);
        }

        let message = serde_json::from_slice::<serde_json::Value>(&bytes)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
            .unwrap_or_else(|| String::from_utf8_lossy(&bytes).into_owned());

        if status == StatusCode::UNAUTHORIZED {
            Err(ClientError::Unauthorized(message))
        } else {
            Err(ClientError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}

/// Percent-encode everything outside the RFC 3986 unreserved set
fn encode_path_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}
