//! Line protocol spoken by the blacklist server
//!
//! Requests are single lines: `POST <url>`, `GET <url>` or `DELETE <url>`.
//! Verbs are case-sensitive and exactly one URL must follow.

use std::fmt;
use std::io;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use crate::blacklist::{BlacklistError, is_valid_url};
use crate::bloom::BloomFilter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add(String),
    Check(String),
    Delete(String),
}

impl Command {
    pub fn parse(line: &str) -> Option<Command> {
        let mut parts = line.split_whitespace();
        let verb = parts.next()?;
        let url = parts.next()?;
        if parts.next().is_some() || !is_valid_url(url) {
            return None;
        }

        let url = url.to_string();
        match verb {
            "POST" => Some(Command::Add(url)),
            "GET" => Some(Command::Check(url)),
            "DELETE" => Some(Command::Delete(url)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    /// Bloom filter says no
    Absent,
    /// Bloom filter says maybe, exact set says no
    FalsePositive,
    /// Both agree
    Present,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Created,
    Checked(Check),
    NoContent,
    NotFound,
    BadRequest,
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Created => f.write_str("201 Created\n"),
            Reply::Checked(Check::Absent) => f.write_str("200 Ok\n\nfalse\n"),
            Reply::Checked(Check::FalsePositive) => f.write_str("200 Ok\n\ntrue false\n"),
            Reply::Checked(Check::Present) => f.write_str("200 Ok\n\ntrue true\n"),
            Reply::NoContent => f.write_str("204 No Content\n"),
            Reply::NotFound => f.write_str("404 Not Found\n"),
            Reply::BadRequest => f.write_str("400 Bad Request\n"),
        }
    }
}

pub fn execute(filter: &mut BloomFilter, command: Command) -> Reply {
    match command {
        Command::Add(url) => {
            filter.add(&url);
            Reply::Created
        }
        Command::Check(url) => {
            let check = if !filter.check(&url) {
                Check::Absent
            } else if filter.double_check(&url) {
                Check::Present
            } else {
                Check::FalsePositive
            };
            Reply::Checked(check)
        }
        Command::Delete(url) => {
            if filter.remove(&url) {
                Reply::NoContent
            } else {
                Reply::NotFound
            }
        }
    }
}

/// Read one reply from a blacklist server
pub async fn read_reply<R>(reader: &mut R) -> Result<Reply, BlacklistError>
where
    R: AsyncBufRead + Unpin,
{
    let status = read_trimmed_line(reader).await?;
    match status.as_str() {
        "201 Created" => Ok(Reply::Created),
        "204 No Content" => Ok(Reply::NoContent),
        "404 Not Found" => Ok(Reply::NotFound),
        "400 Bad Request" => Ok(Reply::BadRequest),
        "200 Ok" => {
            let blank = read_trimmed_line(reader).await?;
            if !blank.is_empty() {
                return Err(BlacklistError::Protocol(blank));
            }
            let result = read_trimmed_line(reader).await?;
            let check = match result.as_str() {
                "false" => Check::Absent,
                "true false" => Check::FalsePositive,
                "true true" => Check::Present,
                _ => return Err(BlacklistError::Protocol(result)),
            };
            Ok(Reply::Checked(check))
        }
        _ => Err(BlacklistError::Protocol(status)),
    }
}

async fn read_trimmed_line<R>(reader: &mut R) -> Result<String, BlacklistError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Err(BlacklistError::Protocol("connection closed".into()));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Longest request line accepted, newline included
pub const MAX_LINE: usize = 4096;

/// Answer requests on one connection until the peer hangs up
pub async fn handle_connection(stream: TcpStream, filter: Arc<Mutex<BloomFilter>>) -> io::Result<()> {
    let (read_half, write_half) = stream.into_split();
    answer(BufReader::new(read_half), write_half, &filter).await
}

/// Read request lines from `reader` and write one reply per line to `writer`.
/// Lines that are not UTF-8 or longer than [`MAX_LINE`] get `400 Bad Request`.
pub async fn answer<R, W>(mut reader: R, mut writer: W, filter: &Mutex<BloomFilter>) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = Vec::with_capacity(128);
    loop {
        line.clear();
        let n = (&mut reader)
            .take(MAX_LINE as u64)
            .read_until(b'\n', &mut line)
            .await?;
        if n == 0 {
            return Ok(());
        }

        let reply = if n == MAX_LINE && line.last() != Some(&b'\n') {
            discard_line(&mut reader).await?;
            Reply::BadRequest
        } else {
            match std::str::from_utf8(&line).ok().and_then(Command::parse) {
                Some(command) => {
                    let mut filter = filter
                        .lock()
                        .map_err(|_| io::Error::other("blacklist filter lock poisoned"))?;
                    execute(&mut filter, command)
                }
                None => Reply::BadRequest,
            }
        };
        writer.write_all(reply.to_string().as_bytes()).await?;
    }
}

/// Skip the rest of an overlong line
async fn discard_line<R>(reader: &mut R) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let buf = reader.fill_buf().await?;
        if buf.is_empty() {
            return Ok(());
        }
        if let Some(pos) = buf.iter().position(|b| *b == b'\n') {
            reader.consume(pos + 1);
            return Ok(());
        }
        let len = buf.len();
        reader.consume(len);
    }
}

/// Accept connections forever, one task per client
pub async fn serve(listener: TcpListener, filter: Arc<Mutex<BloomFilter>>) -> io::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        tracing::debug!(%peer, "blacklist client connected");
        let filter = filter.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, filter).await {
                tracing::warn!(%peer, "blacklist connection failed: {}", e);
            }
        });
    }
}
