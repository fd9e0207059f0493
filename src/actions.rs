//! Star, read, trash and restore, expressed as rewrites of a mail's label set
//!
//! The label functions are pure; the async wrappers push the result to the
//! server through [`ApiClient`].

use crate::client::{ApiClient, Result};
use crate::models::{MailId, MailView, UserId, dedup_labels, system};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Updated(MailView),
    Removed(MailId),
}

fn without(labels: &[String], drop: &[&str]) -> Vec<String> {
    labels
        .iter()
        .filter(|l| !drop.iter().any(|d| l.eq_ignore_ascii_case(d)))
        .cloned()
        .collect()
}

fn with(mut labels: Vec<String>, add: &[&str]) -> Vec<String> {
    labels.extend(add.iter().map(|l| l.to_string()));
    dedup_labels(labels)
}

pub fn star_toggled(mail: &MailView) -> Vec<String> {
    if mail.has_label(system::STAR) {
        without(&mail.labels, &[system::STAR])
    } else {
        with(mail.labels.clone(), &[system::STAR])
    }
}

pub fn read_toggled(mail: &MailView) -> Vec<String> {
    if mail.has_label(system::READ) {
        with(without(&mail.labels, &[system::READ]), &[system::UNREAD])
    } else {
        with(without(&mail.labels, &[system::UNREAD]), &[system::READ])
    }
}

pub fn trashed(mail: &MailView) -> Vec<String> {
    with(
        without(&mail.labels, &[system::RECEIVED, system::SENT]),
        &[system::TRASH],
    )
}

pub fn restored(mail: &MailView, user: UserId) -> Vec<String> {
    let folder = if mail.from_user_id == user {
        system::SENT
    } else {
        system::RECEIVED
    };
    with(without(&mail.labels, &[system::TRASH]), &[folder, system::READ])
}

/// Labels after opening the mail, or `None` when it is already read
pub fn opened(mail: &MailView) -> Option<Vec<String>> {
    if mail.has_label(system::READ) {
        None
    } else {
        Some(with(without(&mail.labels, &[system::UNREAD]), &[system::READ]))
    }
}

pub async fn toggle_star(client: &ApiClient, mail: &MailView) -> Result<Outcome> {
    let labels = star_toggled(mail);
    Ok(Outcome::Updated(client.set_mail_labels(mail.id, &labels).await?))
}

pub async fn toggle_read(client: &ApiClient, mail: &MailView) -> Result<Outcome> {
    let labels = read_toggled(mail);
    Ok(Outcome::Updated(client.set_mail_labels(mail.id, &labels).await?))
}

/// Move to trash, or delete for good when the mail is already there
pub async fn trash_or_delete(
    client: &ApiClient,
    mail: &MailView,
    in_trash_view: bool,
) -> Result<Outcome> {
    if in_trash_view || mail.has_label(system::TRASH) {
        client.delete_mail(mail.id).await?;
        tracing::info!(id = mail.id, "mail deleted");
        return Ok(Outcome::Removed(mail.id));
    }
    let labels = trashed(mail);
    Ok(Outcome::Updated(client.set_mail_labels(mail.id, &labels).await?))
}

pub async fn restore_from_trash(
    client: &ApiClient,
    mail: &MailView,
    user: UserId,
) -> Result<Outcome> {
    let labels = restored(mail, user);
    Ok(Outcome::Updated(client.set_mail_labels(mail.id, &labels).await?))
}

/// Fetch a mail for display, marking it read first if needed
pub async fn open_mail(client: &ApiClient, mail: &MailView) -> Result<MailView> {
    if let Some(labels) = opened(mail) {
        client.set_mail_labels(mail.id, &labels).await?;
    }
    client.get_mail(mail.id).await
}
