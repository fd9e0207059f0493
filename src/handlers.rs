//! HTTP handlers for users, tokens, labels and mails

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::blacklist::find_blacklisted;
use crate::error::{Error, Result};
use crate::models::*;
use crate::routes::AppState;

/// Most mails returned by the inbox listing
pub const INBOX_LIMIT: usize = 50;

fn parse_id(raw: &str, what: &str) -> Result<u64> {
    raw.trim()
        .parse()
        .map_err(|_| Error::bad_request(format!("Invalid {} ID", what)))
}

/// Unwrap a JSON body, turning any rejection (bad JSON, wrong types, wrong
/// content type) into a 400 with `msg`
fn json_body<T>(payload: std::result::Result<Json<T>, JsonRejection>, msg: &str) -> Result<T> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(rejection) => {
            tracing::debug!("rejected request body: {}", rejection);
            Err(Error::bad_request(msg))
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Custom labels may not shadow a system label name
fn check_custom_name(name: &str) -> Result<()> {
    match system::lookup(name.trim()) {
        Some(reserved) => Err(Error::bad_request(format!(
            "Label name is reserved: {}",
            reserved
        ))),
        None => Ok(()),
    }
}

// ── Users ──

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

pub async fn register(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserProfile>)> {
    const REQUIRED: &str = "Username and password are required";
    let req = json_body(payload, REQUIRED)?;

    let (Some(username), Some(password)) = (non_empty(req.username), non_empty(req.password))
    else {
        return Err(Error::bad_request(REQUIRED));
    };

    let user = state
        .users
        .register(NewUser {
            username,
            password,
            name: req.name.unwrap_or_default(),
            avatar_url: req.avatar_url.unwrap_or_default(),
        })
        .await?;

    tracing::info!(id = user.id, username = %user.username, "user registered");
    Ok((StatusCode::CREATED, Json(user.into())))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserProfile>> {
    let id = parse_id(&id, "user")?;
    let user = state
        .users
        .get(id)
        .await?
        .ok_or_else(|| Error::not_found("User not found"))?;
    Ok(Json(user.into()))
}

// ── Tokens ──

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub user_id: UserId,
}

pub async fn login(
    State(state): State<AppState>,
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>> {
    const REQUIRED: &str = "Username and password are required";
    let req = json_body(payload, REQUIRED)?;

    let (Some(username), Some(password)) = (non_empty(req.username), non_empty(req.password))
    else {
        return Err(Error::bad_request(REQUIRED));
    };

    match state.users.verify(&username, &password).await? {
        Some(user) => Ok(Json(TokenResponse { user_id: user.id })),
        None => {
            tracing::info!(username = %username, "failed login");
            Err(Error::Unauthorized("Invalid username or password".to_string()))
        }
    }
}

// ── Labels ──

#[derive(Debug, Deserialize)]
pub struct CreateLabelRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

pub async fn list_labels(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<LabelView>>> {
    let labels = state.labels.list(user).await?;
    Ok(Json(labels.into_iter().map(LabelView::from).collect()))
}

pub async fn create_label(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    payload: std::result::Result<Json<CreateLabelRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<LabelView>)> {
    const REQUIRED: &str = "Label name is required and must be a string";
    let req = json_body(payload, REQUIRED)?;
    let name = non_empty(req.name).ok_or_else(|| Error::bad_request(REQUIRED))?;
    check_custom_name(&name)?;

    let label = state
        .labels
        .create(user, &name, req.description.as_deref().unwrap_or(""))
        .await?;
    tracing::info!(user, id = label.id, "label created");
    Ok((StatusCode::CREATED, Json(label.into())))
}

pub async fn get_label(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<LabelView>> {
    let id = parse_id(&id, "label")?;
    let label = state
        .labels
        .get(user, id)
        .await?
        .ok_or_else(|| Error::not_found("Label not found"))?;
    Ok(Json(label.into()))
}

pub async fn update_label(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    payload: std::result::Result<Json<LabelPatch>, JsonRejection>,
) -> Result<StatusCode> {
    let id = parse_id(&id, "label")?;
    let patch = json_body(payload, "Invalid update data")?;
    if let Some(name) = patch.name.as_deref() {
        if name.is_empty() {
            return Err(Error::bad_request("Label name must not be empty"));
        }
        check_custom_name(name)?;
    }

    let before = state
        .labels
        .get(user, id)
        .await?
        .ok_or_else(|| Error::not_found("Label not found"))?;
    let after = state
        .labels
        .update(user, id, patch)
        .await?
        .ok_or_else(|| Error::not_found("Label not found"))?;

    if before.name != after.name {
        state.mails.rename_label(user, &before.name, &after.name).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_label(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let id = parse_id(&id, "label")?;
    let label = state
        .labels
        .get(user, id)
        .await?
        .ok_or_else(|| Error::not_found("Label not found"))?;

    if !state.labels.delete(user, id).await? {
        return Err(Error::not_found("Label not found"));
    }
    state.mails.strip_label(user, &label.name).await?;
    tracing::info!(user, id, "label deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ── Mails ──

/// Recipient id as sent by clients: a JSON number or a numeric string
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RecipientId {
    Number(UserId),
    Text(String),
}

impl RecipientId {
    fn resolve(&self) -> Option<UserId> {
        let id = match self {
            RecipientId::Number(id) => Some(*id),
            RecipientId::Text(s) => s.trim().parse().ok(),
        };
        // Ids start at 1; zero counts as missing
        id.filter(|id| *id != 0)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMailRequest {
    pub to_user_id: Option<RecipientId>,
    pub subject: Option<String>,
    pub body: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetLabelsRequest {
    pub labels: Vec<String>,
}

pub async fn inbox(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<MailView>>> {
    Ok(Json(state.mails.last_mails(user, INBOX_LIMIT).await?))
}

pub async fn search_mails(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(query): Path<String>,
) -> Result<Json<Vec<MailView>>> {
    if query.is_empty() {
        return Err(Error::bad_request("Missing search query"));
    }
    Ok(Json(state.mails.search(user, &query).await?))
}

pub async fn missing_search_query(AuthUser(_): AuthUser) -> Result<StatusCode> {
    Err(Error::bad_request("Missing search query"))
}

pub async fn create_mail(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    payload: std::result::Result<Json<CreateMailRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MailView>)> {
    const REQUIRED: &str = "Missing required fields or user ID";
    let req = json_body(payload, REQUIRED)?;

    let (Some(to_user_id), Some(subject), Some(body)) = (
        req.to_user_id.as_ref().and_then(RecipientId::resolve),
        non_empty(req.subject),
        non_empty(req.body),
    ) else {
        return Err(Error::bad_request(REQUIRED));
    };

    let recipient = state
        .users
        .get(to_user_id)
        .await?
        .ok_or_else(|| Error::not_found("Recipient user not found"))?;
    let sender = state
        .users
        .get(user)
        .await?
        .ok_or_else(|| Error::Unauthorized("Unauthorized: Missing or invalid user ID".into()))?;

    if find_blacklisted(state.blacklist.as_ref(), &[subject.as_str(), body.as_str()])
        .await?
        .is_some()
    {
        return Err(Error::bad_request(
            "Blacklisted URL detected in subject or body",
        ));
    }

    let mail = state
        .mails
        .create(NewMail {
            from_user_id: sender.id,
            from_username: sender.username,
            to_user_id: recipient.id,
            to_username: recipient.username,
            subject,
            body,
        })
        .await?;

    tracing::info!(id = mail.id, from = mail.from_user_id, to = mail.to_user_id, "mail sent");
    Ok((StatusCode::CREATED, Json(mail)))
}

pub async fn get_mail(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MailView>> {
    let id = parse_id(&id, "mail")?;
    let mail = state
        .mails
        .get(user, id)
        .await?
        .ok_or_else(|| Error::not_found("Mail not found or access denied"))?;
    Ok(Json(mail))
}

pub async fn update_mail(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    payload: std::result::Result<Json<MailPatch>, JsonRejection>,
) -> Result<StatusCode> {
    let id = parse_id(&id, "mail")?;
    let patch = json_body(payload, "Invalid update data")?;

    let texts: Vec<&str> = [patch.subject.as_deref(), patch.body.as_deref()]
        .into_iter()
        .flatten()
        .collect();
    if find_blacklisted(state.blacklist.as_ref(), &texts)
        .await?
        .is_some()
    {
        return Err(Error::bad_request(
            "Blacklisted URL detected in updated subject or body",
        ));
    }

    state
        .mails
        .update(user, id, patch)
        .await?
        .ok_or_else(|| Error::not_found("Mail not found or no permission"))?;
    tracing::info!(user, id, "mail edited");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_mail_labels(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    payload: std::result::Result<Json<SetLabelsRequest>, JsonRejection>,
) -> Result<Json<MailView>> {
    let id = parse_id(&id, "mail")?;
    let req = json_body(payload, "Labels must be a list of label names")?;

    let custom = state.labels.list(user).await?;
    let mut resolved = Vec::with_capacity(req.labels.len());
    for raw in &req.labels {
        let raw = raw.trim();
        if let Some(name) = system::lookup(raw) {
            resolved.push(name.to_string());
        } else if let Some(label) = custom
            .iter()
            .find(|l| l.name.eq_ignore_ascii_case(raw) || l.id.to_string() == raw)
        {
            resolved.push(label.name.clone());
        } else {
            return Err(Error::bad_request(format!("Unknown label: {}", raw)));
        }
    }

    let mail = state
        .mails
        .set_labels(user, id, resolved)
        .await?
        .ok_or_else(|| Error::not_found("Mail not found or access denied"))?;
    Ok(Json(mail))
}

pub async fn delete_mail(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let id = parse_id(&id, "mail")?;
    if !state.mails.delete(user, id).await? {
        return Err(Error::not_found("Mail not found or no permission"));
    }
    tracing::info!(user, id, "mail deleted");
    Ok(StatusCode::NO_CONTENT)
}
