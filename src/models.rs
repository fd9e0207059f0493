use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type UserId = u64;
pub type LabelId = u64;
pub type MailId = u64;

/// Label names the client uses to track per-user mail state
pub mod system {
    pub const STAR: &str = "star";
    pub const READ: &str = "read";
    pub const UNREAD: &str = "unread";
    pub const TRASH: &str = "trash";
    pub const SENT: &str = "sent";
    pub const RECEIVED: &str = "received";
    pub const DRAFTS: &str = "drafts";
    pub const SPAM: &str = "spam";

    pub const ALL: &[&str] = &[STAR, READ, UNREAD, TRASH, SENT, RECEIVED, DRAFTS, SPAM];

    pub fn lookup(name: &str) -> Option<&'static str> {
        ALL.iter().copied().find(|l| l.eq_ignore_ascii_case(name))
    }
}

/// Drop repeated label names (case-insensitively), keeping the first occurrence
pub fn dedup_labels<I>(labels: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut out: Vec<String> = Vec::new();
    for label in labels {
        if !out.iter().any(|l| l.eq_ignore_ascii_case(&label)) {
            out.push(label);
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub password: String, // stored as given
    pub name: String,
    pub avatar_url: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub name: String,
    pub avatar_url: String,
}

/// A user as returned over the API, without the password
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    pub name: String,
    pub avatar_url: String,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            name: user.name,
            avatar_url: user.avatar_url,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub id: LabelId,
    pub user_id: UserId,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabelPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A label as returned over the API, without its owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelView {
    pub id: LabelId,
    pub name: String,
    pub description: String,
}

impl From<Label> for LabelView {
    fn from(label: Label) -> Self {
        Self {
            id: label.id,
            name: label.name,
            description: label.description,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewMail {
    pub from_user_id: UserId,
    pub from_username: String,
    pub to_user_id: UserId,
    pub to_username: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MailPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// One participant's view of a mail, including that participant's labels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailView {
    pub id: MailId,
    pub from_user_id: UserId,
    pub to_user_id: UserId,
    pub from_username: String,
    pub to_username: String,
    pub subject: String,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub labels: Vec<String>,
}

impl MailView {
    pub fn has_label(&self, name: &str) -> bool {
        self.labels.iter().any(|l| l.eq_ignore_ascii_case(name))
    }
}
