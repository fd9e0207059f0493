//! URL blacklist checks for mail content

use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::bloom::BloomFilter;
use crate::protocol::{self, Check, Reply};

#[derive(Error, Debug)]
pub enum BlacklistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid filter configuration: {0:?}")]
    InvalidConfig(String),

    #[error("Unexpected reply from blacklist server: {0}")]
    Protocol(String),

    #[error("Blacklist server did not answer within {0:?}")]
    Timeout(Duration),
}

const URL_PATTERN: &str = r"(?:https?://)?(?:www\.)?(?:[A-Za-z0-9-]+\.)+[A-Za-z0-9]{2,}(?:/\S+)?";

static URL_IN_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i)\b{}", URL_PATTERN)).expect("valid URL regex"));

static URL_EXACT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("^{}$", URL_PATTERN)).expect("valid URL regex"));

/// Every URL-looking token in `text`, in order of appearance
pub fn extract_urls(text: &str) -> Vec<String> {
    URL_IN_TEXT
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Whether `s` as a whole looks like a web URL (scheme and `www.` optional)
pub fn is_valid_url(s: &str) -> bool {
    URL_EXACT.is_match(s)
}

#[async_trait]
pub trait UrlBlacklist: Send + Sync {
    async fn is_blacklisted(&self, url: &str) -> Result<bool, BlacklistError>;
}

/// Return the first blacklisted URL found in any of `texts`
pub async fn find_blacklisted(
    blacklist: &dyn UrlBlacklist,
    texts: &[&str],
) -> Result<Option<String>, BlacklistError> {
    for url in texts.iter().flat_map(|t| extract_urls(t)) {
        if blacklist.is_blacklisted(&url).await? {
            tracing::info!(url = %url, "blacklisted URL rejected");
            return Ok(Some(url));
        }
    }
    Ok(None)
}

/// Checks against a filter held in this process
#[derive(Clone)]
pub struct LocalBlacklist {
    filter: Arc<Mutex<BloomFilter>>,
}

impl LocalBlacklist {
    pub fn new(filter: BloomFilter) -> Self {
        Self {
            filter: Arc::new(Mutex::new(filter)),
        }
    }

    pub fn add(&self, url: &str) {
        if let Ok(mut filter) = self.filter.lock() {
            filter.add(url);
        }
    }

    pub fn remove(&self, url: &str) -> bool {
        self.filter.lock().map(|mut f| f.remove(url)).unwrap_or(false)
    }
}

#[async_trait]
impl UrlBlacklist for LocalBlacklist {
    async fn is_blacklisted(&self, url: &str) -> Result<bool, BlacklistError> {
        let filter = self
            .filter
            .lock()
            .map_err(|_| BlacklistError::Protocol("blacklist filter lock poisoned".into()))?;
        Ok(filter.double_check(url))
    }
}

/// Asks a `blacklist-server` over its line protocol, one connection per lookup
#[derive(Debug, Clone)]
pub struct RemoteBlacklist {
    addr: String,
    timeout: Duration,
}

impl RemoteBlacklist {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }

    async fn query(&self, url: &str) -> Result<Reply, BlacklistError> {
        let mut stream = TcpStream::connect(&self.addr).await?;
        let (read_half, mut write_half) = stream.split();
        write_half
            .write_all(format!("GET {}\n", url).as_bytes())
            .await?;
        let mut reader = BufReader::new(read_half);
        protocol::read_reply(&mut reader).await
    }
}

#[async_trait]
impl UrlBlacklist for RemoteBlacklist {
    async fn is_blacklisted(&self, url: &str) -> Result<bool, BlacklistError> {
        let reply = tokio::time::timeout(self.timeout, self.query(url))
            .await
            .map_err(|_| BlacklistError::Timeout(self.timeout))??;

        match reply {
            Reply::Checked(check) => Ok(check == Check::Present),
            other => Err(BlacklistError::Protocol(other.to_string().trim().to_string())),
        }
    }
}

/// Lets everything through
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBlacklist;

#[async_trait]
impl UrlBlacklist for NoBlacklist {
    async fn is_blacklisted(&self, _url: &str) -> Result<bool, BlacklistError> {
        Ok(false)
    }
}
