use clap::Parser;

use webmail::card::{self, MailCard};
use webmail::client::ApiClient;

#[derive(Parser, Debug)]
#[command(name = "inbox", about = "Print a user's latest mails")]
struct Args {
    username: String,
    password: String,

    /// Only show mails matching this text
    #[arg(long)]
    search: Option<String>,

    #[arg(long, default_value = "http://127.0.0.1:3000")]
    server: String,

    #[arg(long, default_value_t = 100)]
    width: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    webmail::init_tracing();
    let args = Args::parse();

    let mut client = ApiClient::new(&args.server);
    let user_id = client
        .login(&args.username, &args.password)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to log in: {}", e))?;
    tracing::debug!(user_id, "logged in");

    let (mails, title) = match &args.search {
        Some(query) => (client.search(query).await?, format!("Search: {}", query)),
        None => (client.inbox().await?, format!("Inbox - {}", args.username)),
    };

    if mails.is_empty() {
        println!("No mails.");
        return Ok(());
    }

    let cards: Vec<MailCard> = mails.iter().map(MailCard::new).collect();
    print!("{}", card::render_text(&cards, args.width, &title));
    Ok(())
}
