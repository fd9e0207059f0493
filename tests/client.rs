use std::sync::Arc;

use webmail::actions::{self, Outcome};
use webmail::blacklist::NoBlacklist;
use webmail::client::{ApiClient, ClientError};
use webmail::models::{LabelPatch, MailPatch};
use webmail::routes::{self, AppState};

async fn start_server() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let state = AppState::in_memory(Arc::new(NoBlacklist));
    tokio::spawn(async move {
        routes::serve(listener, state, std::future::pending()).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn logged_in(base: &str, username: &str) -> ApiClient {
    let mut client = ApiClient::new(base);
    client.register(username, "pw", username, "").await.unwrap();
    client.login(username, "pw").await.unwrap();
    client
}

#[tokio::test]
async fn test_mail_actions_round_trip() {
    let base = start_server().await;
    let alice = logged_in(&base, "alice").await;
    let bob = logged_in(&base, "bob").await;
    let bob_id = bob.user_id().unwrap();

    let sent = alice.send_mail(bob_id, "Plans", "Friday?").await.unwrap();
    assert_eq!(sent.labels, vec!["sent", "read"]);

    let inbox = bob.inbox().await.unwrap();
    assert_eq!(inbox.len(), 1);
    let mail = &inbox[0];
    assert!(mail.has_label("unread"));

    let opened = actions::open_mail(&bob, mail).await.unwrap();
    assert_eq!(opened.labels, vec!["received", "read"]);

    let Outcome::Updated(starred) = actions::toggle_star(&bob, &opened).await.unwrap() else {
        panic!("star should update the mail");
    };
    assert!(starred.has_label("star"));

    let Outcome::Updated(unread) = actions::toggle_read(&bob, &starred).await.unwrap() else {
        panic!("read toggle should update the mail");
    };
    assert_eq!(unread.labels, vec!["received", "star", "unread"]);

    let Outcome::Updated(trashed) = actions::trash_or_delete(&bob, &unread, false)
        .await
        .unwrap()
    else {
        panic!("first trash should only relabel");
    };
    assert_eq!(trashed.labels, vec!["star", "unread", "trash"]);

    let Outcome::Updated(restored) = actions::restore_from_trash(&bob, &trashed, bob_id)
        .await
        .unwrap()
    else {
        panic!("restore should update the mail");
    };
    assert_eq!(restored.labels, vec!["star", "unread", "received", "read"]);

    // Sender's labels are untouched by all of the above
    let alice_view = alice.get_mail(sent.id).await.unwrap();
    assert_eq!(alice_view.labels, vec!["sent", "read"]);

    // Only the sender may delete for good
    let err = actions::trash_or_delete(&bob, &restored, true)
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(404));

    let outcome = actions::trash_or_delete(&alice, &alice_view, true)
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Removed(sent.id));
    assert!(alice.inbox().await.unwrap().is_empty());
    assert_eq!(bob.inbox().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_edit_and_search_through_client() {
    let base = start_server().await;
    let alice = logged_in(&base, "alice").await;
    let bob = logged_in(&base, "bob").await;

    let mail = alice
        .send_mail(bob.user_id().unwrap(), "Status", "all good")
        .await
        .unwrap();
    alice
        .update_mail(
            mail.id,
            &MailPatch {
                subject: Some("Status: shipped".to_string()),
                body: None,
            },
        )
        .await
        .unwrap();

    let hits = bob.search("status: SHIPPED").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].body, "all good");

    let err = bob
        .update_mail(mail.id, &MailPatch::default())
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
async fn test_label_management_through_client() {
    let base = start_server().await;
    let alice = logged_in(&base, "alice").await;

    let label = alice.create_label("travel", "trips").await.unwrap();
    alice
        .update_label(
            label.id,
            &LabelPatch {
                name: Some("holidays".to_string()),
                description: None,
            },
        )
        .await
        .unwrap();

    let fetched = alice.get_label(label.id).await.unwrap();
    assert_eq!(fetched.name, "holidays");
    assert_eq!(fetched.description, "trips");
    assert_eq!(alice.labels().await.unwrap().len(), 1);

    alice.delete_label(label.id).await.unwrap();
    assert!(alice.labels().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_client_errors() {
    let base = start_server().await;

    let mut anonymous = ApiClient::new(&base);
    let err = anonymous.login("nobody", "pw").await.unwrap_err();
    assert!(matches!(err, ClientError::Unauthorized(ref msg) if msg == "Invalid username or password"));

    let stranger = ApiClient::new(&base).with_user(999);
    assert!(matches!(
        stranger.inbox().await,
        Err(ClientError::Unauthorized(_))
    ));

    let alice = logged_in(&base, "alice").await;
    let profile = alice.get_user(alice.user_id().unwrap()).await.unwrap();
    assert_eq!(profile.username, "alice");

    let err = alice.send_mail(4242, "s", "b").await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Api { status: 404, ref message } if message == "Recipient user not found"
    ));
}
