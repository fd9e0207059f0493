//! In-memory store backends
//!
//! Each store keeps its whole state behind one `RwLock`, so every operation
//! (including id allocation) happens under a single acquisition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::models::*;
use crate::store::{LabelStore, MailStore, UserStore};

struct UserState {
    users: Vec<User>,
    next_id: UserId,
}

pub struct InMemoryUserStore {
    state: RwLock<UserState>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(UserState {
                users: Vec::new(),
                next_id: 1,
            }),
        }
    }
}

impl Default for InMemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn register(&self, user: NewUser) -> Result<User> {
        let mut state = self.state.write().await;

        if state.users.iter().any(|u| u.username == user.username) {
            return Err(Error::UsernameTaken);
        }

        let user = User {
            id: state.next_id,
            username: user.username,
            password: user.password,
            name: user.name,
            avatar_url: user.avatar_url,
        };
        state.next_id += 1;
        state.users.push(user.clone());

        tracing::debug!(id = user.id, username = %user.username, "registered user");
        Ok(user)
    }

    async fn verify(&self, username: &str, password: &str) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .iter()
            .find(|u| u.username == username && u.password == password)
            .cloned())
    }

    async fn get(&self, id: UserId) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.iter().find(|u| u.id == id).cloned())
    }
}

struct LabelState {
    by_user: HashMap<UserId, Vec<Label>>,
    next_id: LabelId,
}

pub struct InMemoryLabelStore {
    state: RwLock<LabelState>,
}

impl InMemoryLabelStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(LabelState {
                by_user: HashMap::new(),
                next_id: 1,
            }),
        }
    }
}

impl Default for InMemoryLabelStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LabelStore for InMemoryLabelStore {
    async fn list(&self, user: UserId) -> Result<Vec<Label>> {
        let state = self.state.read().await;
        Ok(state.by_user.get(&user).cloned().unwrap_or_default())
    }

    async fn create(&self, user: UserId, name: &str, description: &str) -> Result<Label> {
        let mut state = self.state.write().await;
        let label = Label {
            id: state.next_id,
            user_id: user,
            name: name.to_string(),
            description: description.to_string(),
        };
        state.next_id += 1;
        state.by_user.entry(user).or_default().push(label.clone());
        Ok(label)
    }

    async fn get(&self, user: UserId, id: LabelId) -> Result<Option<Label>> {
        let state = self.state.read().await;
        Ok(state
            .by_user
            .get(&user)
            .and_then(|labels| labels.iter().find(|l| l.id == id))
            .cloned())
    }

    async fn update(&self, user: UserId, id: LabelId, patch: LabelPatch) -> Result<Option<Label>> {
        let mut state = self.state.write().await;
        let Some(label) = state
            .by_user
            .get_mut(&user)
            .and_then(|labels| labels.iter_mut().find(|l| l.id == id))
        else {
            return Ok(None);
        };

        if let Some(name) = patch.name {
            label.name = name;
        }
        if let Some(description) = patch.description {
            label.description = description;
        }
        Ok(Some(label.clone()))
    }

    async fn delete(&self, user: UserId, id: LabelId) -> Result<bool> {
        let mut state = self.state.write().await;
        let Some(labels) = state.by_user.get_mut(&user) else {
            return Ok(false);
        };
        match labels.iter().position(|l| l.id == id) {
            Some(idx) => {
                labels.remove(idx);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// The single canonical copy of a mail, shared by both participants' lists
struct MailRecord {
    id: MailId,
    from_user_id: UserId,
    to_user_id: UserId,
    from_username: String,
    to_username: String,
    subject: String,
    body: String,
    timestamp: DateTime<Utc>,
    /// Each participant's own label names
    labels: HashMap<UserId, Vec<String>>,
}

impl MailRecord {
    fn view(&self, user: UserId) -> MailView {
        MailView {
            id: self.id,
            from_user_id: self.from_user_id,
            to_user_id: self.to_user_id,
            from_username: self.from_username.clone(),
            to_username: self.to_username.clone(),
            subject: self.subject.clone(),
            body: self.body.clone(),
            timestamp: self.timestamp,
            labels: self.labels.get(&user).cloned().unwrap_or_default(),
        }
    }

    fn matches(&self, needle: &str) -> bool {
        self.subject.to_lowercase().contains(needle) || self.body.to_lowercase().contains(needle)
    }
}

struct MailState {
    mails: HashMap<MailId, MailRecord>,
    /// Per-user list of mail ids, in arrival order
    by_user: HashMap<UserId, Vec<MailId>>,
    next_id: MailId,
}

impl MailState {
    fn visible(&self, user: UserId, id: MailId) -> Option<&MailRecord> {
        let listed = self.by_user.get(&user).is_some_and(|ids| ids.contains(&id));
        if listed { self.mails.get(&id) } else { None }
    }

    fn visible_mut(&mut self, user: UserId, id: MailId) -> Option<&mut MailRecord> {
        let listed = self.by_user.get(&user).is_some_and(|ids| ids.contains(&id));
        if listed { self.mails.get_mut(&id) } else { None }
    }

    fn records_for(&self, user: UserId) -> impl Iterator<Item = &MailRecord> + '_ {
        self.by_user
            .get(&user)
            .into_iter()
            .flatten()
            .filter_map(|id| self.mails.get(id))
    }

    fn referenced(&self, id: MailId) -> bool {
        self.by_user.values().any(|ids| ids.contains(&id))
    }
}

/// Custom label match; system labels never match
fn is_custom_named(label: &str, name: &str) -> bool {
    label.eq_ignore_ascii_case(name) && system::lookup(label).is_none()
}

pub struct InMemoryMailStore {
    state: RwLock<MailState>,
}

impl InMemoryMailStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MailState {
                mails: HashMap::new(),
                by_user: HashMap::new(),
                next_id: 1,
            }),
        }
    }
}

impl Default for InMemoryMailStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MailStore for InMemoryMailStore {
    async fn last_mails(&self, user: UserId, limit: usize) -> Result<Vec<MailView>> {
        let state = self.state.read().await;
        let mut records: Vec<&MailRecord> = state.records_for(user).collect();
        // Newest first; ids break ties between mails created in the same instant
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        Ok(records
            .into_iter()
            .take(limit)
            .map(|r| r.view(user))
            .collect())
    }

    async fn create(&self, mail: NewMail) -> Result<MailView> {
        let mut state = self.state.write().await;
        let id = state.next_id;
        state.next_id += 1;

        let mut labels = HashMap::new();
        labels.insert(
            mail.from_user_id,
            vec![system::SENT.to_string(), system::READ.to_string()],
        );
        if mail.to_user_id != mail.from_user_id {
            labels.insert(
                mail.to_user_id,
                vec![system::RECEIVED.to_string(), system::UNREAD.to_string()],
            );
        }

        let record = MailRecord {
            id,
            from_user_id: mail.from_user_id,
            to_user_id: mail.to_user_id,
            from_username: mail.from_username,
            to_username: mail.to_username,
            subject: mail.subject,
            body: mail.body,
            timestamp: Utc::now(),
            labels,
        };
        let view = record.view(record.from_user_id);

        state.by_user.entry(record.from_user_id).or_default().push(id);
        if record.to_user_id != record.from_user_id {
            state.by_user.entry(record.to_user_id).or_default().push(id);
        }
        state.mails.insert(id, record);

        tracing::debug!(id, from = view.from_user_id, to = view.to_user_id, "stored mail");
        Ok(view)
    }

    async fn get(&self, user: UserId, id: MailId) -> Result<Option<MailView>> {
        let state = self.state.read().await;
        Ok(state.visible(user, id).map(|r| r.view(user)))
    }

    async fn search(&self, user: UserId, query: &str) -> Result<Vec<MailView>> {
        let needle = query.to_lowercase();
        let state = self.state.read().await;
        Ok(state
            .records_for(user)
            .filter(|r| r.matches(&needle))
            .map(|r| r.view(user))
            .collect())
    }

    async fn update(&self, user: UserId, id: MailId, patch: MailPatch) -> Result<Option<MailView>> {
        let mut state = self.state.write().await;
        let Some(record) = state.visible_mut(user, id) else {
            return Ok(None);
        };
        if record.from_user_id != user {
            return Ok(None);
        }

        if let Some(subject) = patch.subject {
            record.subject = subject;
        }
        if let Some(body) = patch.body {
            record.body = body;
        }
        Ok(Some(record.view(user)))
    }

    async fn set_labels(
        &self,
        user: UserId,
        id: MailId,
        labels: Vec<String>,
    ) -> Result<Option<MailView>> {
        let mut state = self.state.write().await;
        let Some(record) = state.visible_mut(user, id) else {
            return Ok(None);
        };
        record.labels.insert(user, dedup_labels(labels));
        Ok(Some(record.view(user)))
    }

    async fn delete(&self, user: UserId, id: MailId) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.visible(user, id) {
            Some(record) if record.from_user_id == user => {}
            _ => return Ok(false),
        }

        if let Some(ids) = state.by_user.get_mut(&user) {
            ids.retain(|m| *m != id);
        }
        if !state.referenced(id) {
            state.mails.remove(&id);
        } else if let Some(record) = state.mails.get_mut(&id) {
            record.labels.remove(&user);
        }
        Ok(true)
    }

    async fn rename_label(&self, user: UserId, old: &str, new: &str) -> Result<()> {
        if system::lookup(old).is_some() || system::lookup(new).is_some() {
            return Ok(());
        }
        let mut state = self.state.write().await;
        for record in state.mails.values_mut() {
            if let Some(labels) = record.labels.get_mut(&user) {
                for label in labels.iter_mut().filter(|l| is_custom_named(l, old)) {
                    *label = new.to_string();
                }
                *labels = dedup_labels(std::mem::take(labels));
            }
        }
        Ok(())
    }

    async fn strip_label(&self, user: UserId, name: &str) -> Result<()> {
        let mut state = self.state.write().await;
        for record in state.mails.values_mut() {
            if let Some(labels) = record.labels.get_mut(&user) {
                labels.retain(|l| !is_custom_named(l, name));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_mail(from: UserId, to: UserId, subject: &str, body: &str) -> NewMail {
        NewMail {
            from_user_id: from,
            from_username: format!("user{}", from),
            to_user_id: to,
            to_username: format!("user{}", to),
            subject: subject.to_string(),
            body: body.to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_rejects_duplicate_username() {
        let store = InMemoryUserStore::new();
        let first = store
            .register(NewUser {
                username: "alice".into(),
                password: "pw".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(first.id, 1);

        let dup = store
            .register(NewUser {
                username: "alice".into(),
                password: "other".into(),
                ..Default::default()
            })
            .await;
        assert!(matches!(dup, Err(Error::UsernameTaken)));
    }

    #[tokio::test]
    async fn test_verify_requires_both_fields() {
        let store = InMemoryUserStore::new();
        store
            .register(NewUser {
                username: "bob".into(),
                password: "secret".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(store.verify("bob", "secret").await.unwrap().is_some());
        assert!(store.verify("bob", "Secret").await.unwrap().is_none());
        assert!(store.verify("carol", "secret").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_labels_are_scoped_to_owner() {
        let store = InMemoryLabelStore::new();
        let label = store.create(1, "Work", "").await.unwrap();

        assert_eq!(store.list(1).await.unwrap().len(), 1);
        assert!(store.list(2).await.unwrap().is_empty());
        assert!(store.get(2, label.id).await.unwrap().is_none());
        assert!(!store.delete(2, label.id).await.unwrap());
        assert!(
            store
                .update(2, label.id, LabelPatch::default())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_label_partial_update() {
        let store = InMemoryLabelStore::new();
        let label = store.create(1, "Work", "office").await.unwrap();

        let updated = store
            .update(
                1,
                label.id,
                LabelPatch {
                    name: Some("Job".into()),
                    description: None,
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "Job");
        assert_eq!(updated.description, "office");

        assert!(store.delete(1, label.id).await.unwrap());
        assert!(store.get(1, label.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mail_is_shared_between_participants() {
        let store = InMemoryMailStore::new();
        let mail = store.create(new_mail(1, 2, "Hi", "there")).await.unwrap();
        assert_eq!(mail.labels, vec!["sent", "read"]);

        let received = store.get(2, mail.id).await.unwrap().unwrap();
        assert_eq!(received.labels, vec!["received", "unread"]);
        assert!(store.get(3, mail.id).await.unwrap().is_none());

        store
            .update(
                1,
                mail.id,
                MailPatch {
                    subject: Some("Edited".into()),
                    body: None,
                },
            )
            .await
            .unwrap()
            .unwrap();
        let received = store.get(2, mail.id).await.unwrap().unwrap();
        assert_eq!(received.subject, "Edited");
        assert_eq!(received.body, "there");
    }

    #[tokio::test]
    async fn test_self_mail_listed_once() {
        let store = InMemoryMailStore::new();
        store.create(new_mail(1, 1, "note", "to self")).await.unwrap();
        assert_eq!(store.last_mails(1, 50).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_only_sender_updates_or_deletes() {
        let store = InMemoryMailStore::new();
        let mail = store.create(new_mail(1, 2, "Hi", "there")).await.unwrap();

        let patch = MailPatch {
            subject: Some("Hacked".into()),
            body: None,
        };
        assert!(store.update(2, mail.id, patch).await.unwrap().is_none());
        assert!(!store.delete(2, mail.id).await.unwrap());

        assert!(store.delete(1, mail.id).await.unwrap());
        assert!(store.get(1, mail.id).await.unwrap().is_none());
        // The recipient keeps their copy
        let kept = store.get(2, mail.id).await.unwrap().unwrap();
        assert_eq!(kept.subject, "Hi");
    }

    #[tokio::test]
    async fn test_last_mails_limit_and_order() {
        let store = InMemoryMailStore::new();
        for i in 0..60 {
            store
                .create(new_mail(1, 2, &format!("mail {}", i), "body"))
                .await
                .unwrap();
        }

        let mails = store.last_mails(2, 50).await.unwrap();
        assert_eq!(mails.len(), 50);
        assert_eq!(mails[0].subject, "mail 59");
        assert!(
            mails
                .windows(2)
                .all(|w| (w[0].timestamp, w[0].id) > (w[1].timestamp, w[1].id))
        );
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive() {
        let store = InMemoryMailStore::new();
        store.create(new_mail(1, 2, "Quarterly REPORT", "numbers")).await.unwrap();
        store.create(new_mail(1, 2, "Lunch", "see the report")).await.unwrap();
        store.create(new_mail(1, 2, "Other", "nothing")).await.unwrap();

        let hits = store.search(2, "report").await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(store.search(3, "report").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_labels_are_per_participant() {
        let store = InMemoryMailStore::new();
        let mail = store.create(new_mail(1, 2, "Hi", "there")).await.unwrap();

        let starred = store
            .set_labels(2, mail.id, vec!["received".into(), "star".into(), "star".into()])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(starred.labels, vec!["received", "star"]);

        let sender_view = store.get(1, mail.id).await.unwrap().unwrap();
        assert!(!sender_view.has_label("star"));
        assert!(store.set_labels(3, mail.id, vec![]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rename_and_strip_custom_label() {
        let store = InMemoryMailStore::new();
        let mail = store.create(new_mail(1, 2, "Hi", "there")).await.unwrap();
        store
            .set_labels(1, mail.id, vec!["sent".into(), "Work".into()])
            .await
            .unwrap();

        store.rename_label(1, "work", "Job").await.unwrap();
        let view = store.get(1, mail.id).await.unwrap().unwrap();
        assert_eq!(view.labels, vec!["sent", "Job"]);

        store.strip_label(1, "job").await.unwrap();
        let view = store.get(1, mail.id).await.unwrap().unwrap();
        assert_eq!(view.labels, vec!["sent"]);
    }

    #[tokio::test]
    async fn test_custom_label_changes_leave_system_labels_alone() {
        let store = InMemoryMailStore::new();
        let mail = store.create(new_mail(1, 2, "Hi", "there")).await.unwrap();
        store
            .set_labels(2, mail.id, vec!["unread".into(), "trash".into()])
            .await
            .unwrap();

        store.strip_label(2, "Trash").await.unwrap();
        store.rename_label(2, "unread", "Later").await.unwrap();
        store.rename_label(2, "Someday", "star").await.unwrap();

        let view = store.get(2, mail.id).await.unwrap().unwrap();
        assert_eq!(view.labels, vec!["unread", "trash"]);
    }
}
