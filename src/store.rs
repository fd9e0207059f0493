//! Store traits
//!
//! Handlers only ever talk to these traits, so the in-memory backends in
//! [`crate::memory`] can be swapped for a persistent one without touching the
//! HTTP layer.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::models::*;

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Register a new user, failing with `UsernameTaken` on a duplicate username
    async fn register(&self, user: NewUser) -> Result<User>;

    /// Find the user with exactly this username and password
    async fn verify(&self, username: &str, password: &str) -> Result<Option<User>>;

    async fn get(&self, id: UserId) -> Result<Option<User>>;
}

#[async_trait]
pub trait LabelStore: Send + Sync {
    /// All labels owned by `user`, in creation order
    async fn list(&self, user: UserId) -> Result<Vec<Label>>;

    async fn create(&self, user: UserId, name: &str, description: &str) -> Result<Label>;

    async fn get(&self, user: UserId, id: LabelId) -> Result<Option<Label>>;

    /// Apply the fields present in `patch`; `None` when the label is not `user`'s
    async fn update(&self, user: UserId, id: LabelId, patch: LabelPatch) -> Result<Option<Label>>;

    async fn delete(&self, user: UserId, id: LabelId) -> Result<bool>;
}

#[async_trait]
pub trait MailStore: Send + Sync {
    /// Up to `limit` of `user`'s mails, newest first
    async fn last_mails(&self, user: UserId, limit: usize) -> Result<Vec<MailView>>;

    /// Store a new mail and return the sender's view of it
    async fn create(&self, mail: NewMail) -> Result<MailView>;

    async fn get(&self, user: UserId, id: MailId) -> Result<Option<MailView>>;

    /// Case-insensitive substring search over subject and body
    async fn search(&self, user: UserId, query: &str) -> Result<Vec<MailView>>;

    /// Edit subject/body. Only the sender may do this.
    async fn update(&self, user: UserId, id: MailId, patch: MailPatch) -> Result<Option<MailView>>;

    /// Replace `user`'s own label set on a mail they can see
    async fn set_labels(
        &self,
        user: UserId,
        id: MailId,
        labels: Vec<String>,
    ) -> Result<Option<MailView>>;

    /// Remove a mail from the sender's list. Only the sender may do this.
    async fn delete(&self, user: UserId, id: MailId) -> Result<bool>;

    /// Rename a custom label across `user`'s mails
    async fn rename_label(&self, user: UserId, old: &str, new: &str) -> Result<()>;

    /// Drop a custom label from all of `user`'s mails
    async fn strip_label(&self, user: UserId, name: &str) -> Result<()>;
}

pub type SharedUserStore = Arc<dyn UserStore>;
pub type SharedLabelStore = Arc<dyn LabelStore>;
pub type SharedMailStore = Arc<dyn MailStore>;
