use std::process::Command;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use webmail::blacklist::{RemoteBlacklist, UrlBlacklist};
use webmail::bloom::BloomFilter;
use webmail::protocol;

async fn start(filter: BloomFilter) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(protocol::serve(listener, Arc::new(Mutex::new(filter))));
    addr.to_string()
}

/// Send raw request text and read back everything up to `lines` reply lines
async fn exchange(addr: &str, request: &str, lines: usize) -> Vec<String> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut reader = BufReader::new(stream);
    let mut out = Vec::with_capacity(lines);
    for _ in 0..lines {
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        out.push(line.trim_end_matches('\n').to_string());
    }
    out
}

#[tokio::test]
async fn test_protocol_session() {
    let addr = start(BloomFilter::new("1024 1 2".parse().unwrap(), None)).await;

    let replies = exchange(
        &addr,
        "GET www.integration-test.com\n\
         POST www.integration-test.com\n\
         GET www.integration-test.com\n\
         DELETE www.integration-test.com\n\
         DELETE www.integration-test.com\n\
         GET www.integration-test.com\n",
        10,
    )
    .await;

    assert_eq!(
        replies,
        vec![
            "200 Ok",
            "",
            "false",
            "201 Created",
            "200 Ok",
            "",
            "true true",
            "204 No Content",
            "404 Not Found",
            "200 Ok",
        ]
    );
}

#[tokio::test]
async fn test_bad_requests() {
    let addr = start(BloomFilter::new("64 3".parse().unwrap(), None)).await;

    let replies = exchange(
        &addr,
        "\nget www.test.com\nPOST\nPOST a.com b.com\nPOST not_a_url\n   GET   www.test.com   \n",
        8,
    )
    .await;

    assert_eq!(
        replies,
        vec![
            "400 Bad Request",
            "400 Bad Request",
            "400 Bad Request",
            "400 Bad Request",
            "400 Bad Request",
            "200 Ok",
            "",
            "false",
        ]
    );
}

#[tokio::test]
async fn test_remote_blacklist_against_server() {
    let addr = start(BloomFilter::new("512 2".parse().unwrap(), None)).await;
    exchange(&addr, "POST spam.example.net\n", 1).await;

    let remote = RemoteBlacklist::new(addr.clone(), Duration::from_secs(2));
    assert!(remote.is_blacklisted("spam.example.net").await.unwrap());
    assert!(!remote.is_blacklisted("ham.example.net").await.unwrap());

    // Bits stay set after removal but the exact set no longer confirms the hit
    exchange(&addr, "DELETE spam.example.net\n", 1).await;
    assert!(!remote.is_blacklisted("spam.example.net").await.unwrap());
}

#[tokio::test]
async fn test_blacklist_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blacklist.txt");

    let first = start(BloomFilter::new("65536 1".parse().unwrap(), Some(path.clone()))).await;
    exchange(&first, "POST www.kept.org\nPOST www.dropped.org\n", 2).await;
    exchange(&first, "DELETE www.dropped.org\n", 1).await;

    let second = start(BloomFilter::new("65536 1".parse().unwrap(), Some(path))).await;
    let replies = exchange(&second, "GET www.kept.org\nGET www.dropped.org\n", 6).await;
    assert_eq!(replies[2], "true true");
    assert_eq!(replies[3], "200 Ok");
    assert_eq!(replies[5], "false");
}

#[test]
fn test_server_binary_rejects_bad_arguments() {
    for args in [
        &[][..],
        &["5555"][..],
        &["5555", "1024"][..],
        &["5555", "0", "1"][..],
        &["5555", "1024", "0"][..],
        &["notaport", "1024", "1"][..],
    ] {
        let output = Command::new(env!("CARGO_BIN_EXE_blacklist-server"))
            .args(args)
            .output()
            .unwrap();
        assert!(!output.status.success(), "args {:?}", args);
        assert!(output.stdout.is_empty(), "args {:?}", args);
        assert!(output.stderr.is_empty(), "args {:?}", args);
    }
}
