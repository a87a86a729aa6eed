//! # folio-twitter
//!
//! Upstream client for the statuses filter stream and the search API.
//! Implements both [`StreamSource`] and [`TweetSearch`].

mod oauth;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use folio_core::models::RawTweet;
use folio_core::traits::{EventStream, StreamSource, TweetSearch};
use futures::stream::{Stream, StreamExt, TryStreamExt};
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::io::StreamReader;
use tracing::{debug, info};

pub use oauth::Credentials;

/// Longest stream line accepted. Statuses are a few KiB; anything past this
/// is a broken upstream.
const MAX_LINE_LENGTH: usize = 1024 * 1024;

pub struct TwitterConfig {
    pub credentials: Credentials,
    pub stream_url: String,
    pub search_url: String,
    /// Idle time after which an open stream counts as stalled.
    pub read_timeout: Duration,
}

pub struct TwitterClient {
    http: reqwest::Client,
    config: TwitterConfig,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    statuses: Vec<RawTweet>,
}

impl TwitterClient {
    pub fn new(config: TwitterConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .read_timeout(config.read_timeout)
            .build()?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl StreamSource for TwitterClient {
    async fn connect(&self, track: &[String]) -> anyhow::Result<EventStream> {
        let track = track.join(",");
        let params = [("track", track.as_str())];
        let auth = self
            .config
            .credentials
            .authorization("POST", &self.config.stream_url, &params);

        let resp = self
            .http
            .post(&self.config.stream_url)
            .header(AUTHORIZATION, auth)
            .form(&params)
            .send()
            .await?
            .error_for_status()?;
        info!(%track, "filter stream opened");

        let body = resp.bytes_stream().map_err(std::io::Error::other);
        let statuses = lines(body, MAX_LINE_LENGTH).filter_map(|line| async move {
            match line {
                Ok(line) => parse_status(&line).map(Ok),
                Err(e) => Some(Err(anyhow::Error::from(e))),
            }
        });
        Ok(statuses.boxed())
    }
}

#[async_trait]
impl TweetSearch for TwitterClient {
    async fn search(&self, query: &str, max_results: u32) -> anyhow::Result<Vec<RawTweet>> {
        let count = max_results.to_string();
        let params = [("q", query), ("count", count.as_str())];
        let auth = self
            .config
            .credentials
            .authorization("GET", &self.config.search_url, &params);

        let resp = self
            .http
            .get(&self.config.search_url)
            .header(AUTHORIZATION, auth)
            .query(&params)
            .send()
            .await?;

        if !resp.status().is_success() {
            anyhow::bail!(
                "search returned status {}: {}",
                resp.status(),
                resp.text().await.unwrap_or_default()
            );
        }

        let body: SearchResponse = resp.json().await?;
        debug!(query, found = body.statuses.len(), "search finished");
        Ok(body.statuses)
    }
}

/// Decodes one stream line. Keep-alive newlines and control messages
/// (deletes, limit notices) yield `None`.
fn parse_status(line: &str) -> Option<RawTweet> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<RawTweet>(line) {
        Ok(status) => Some(status),
        Err(e) => {
            debug!("skipping non-status message: {e}");
            None
        }
    }
}

/// Splits a chunked body into `\n`-delimited lines, dropping a trailing
/// `\r`. A line over `max_length` bytes is an error; so is any transport
/// error, and either one ends the stream.
fn lines<S>(chunks: S, max_length: usize) -> impl Stream<Item = Result<String, LinesCodecError>>
where
    S: Stream<Item = Result<Bytes, std::io::Error>>,
{
    FramedRead::new(
        StreamReader::new(chunks),
        LinesCodec::new_with_max_length(max_length),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use secrecy::SecretString;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const STATUS: &str = r#"{"id_str":"1050118621198921728","text":"hello #rustlang","created_at":"Wed Oct 10 20:19:24 +0000 2018","user":{"name":"Ada","screen_name":"ada","profile_image_url":"http://img/ada_normal.png"}}"#;

    fn chunks(parts: &[&str]) -> impl Stream<Item = Result<Bytes, std::io::Error>> {
        let owned: Vec<Result<Bytes, std::io::Error>> = parts
            .iter()
            .map(|p| Ok(Bytes::from(p.to_string())))
            .collect();
        stream::iter(owned)
    }

    #[tokio::test]
    async fn lines_are_reassembled_across_chunks() {
        let out: Vec<String> = lines(chunks(&["{\"a\":", "1}\r\n\r\n{\"b\"", ":2}"]), 64)
            .map(|l| l.unwrap())
            .collect()
            .await;
        assert_eq!(out, ["{\"a\":1}", "", "{\"b\":2}"]);
    }

    #[tokio::test]
    async fn transport_error_ends_the_stream() {
        let parts: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"partial")),
            Err(std::io::Error::other("reset")),
            Ok(Bytes::from_static(b"never\n")),
        ];
        let out: Vec<_> = lines(stream::iter(parts), 64).collect().await;
        assert_eq!(out.len(), 1);
        assert!(out[0].is_err());
    }

    #[tokio::test]
    async fn oversized_line_is_rejected_without_waiting_for_newline() {
        let body = stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from("x".repeat(4096)))])
            .chain(stream::pending());
        let mut out = Box::pin(lines(body, 1024));

        let first = tokio::time::timeout(Duration::from_secs(5), out.next())
            .await
            .expect("an oversized line must fail as soon as the limit is passed");
        assert!(matches!(first, Some(Err(LinesCodecError::MaxLineLengthExceeded))));
    }

    fn client(url: String, read_timeout: Duration) -> TwitterClient {
        TwitterClient::new(TwitterConfig {
            credentials: Credentials {
                consumer_key: SecretString::from("ck"),
                consumer_secret: SecretString::from("cs"),
                access_token: SecretString::from("at"),
                access_token_secret: SecretString::from("ats"),
            },
            stream_url: url.clone(),
            search_url: url,
            read_timeout,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn silent_stream_fails_after_read_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/filter", listener.local_addr().unwrap());

        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = sock.read(&mut buf).await;
            let line = format!("{STATUS}\r\n");
            let response = format!(
                "HTTP/1.1 200 OK\r\ntransfer-encoding: chunked\r\n\r\n{:x}\r\n{line}\r\n",
                line.len()
            );
            sock.write_all(response.as_bytes()).await.unwrap();
            // Never sends another byte.
            tokio::time::sleep(Duration::from_secs(60)).await;
            drop(sock);
        });

        let twitter = client(url, Duration::from_millis(200));
        let mut statuses = twitter.connect(&["#rustlang".to_string()]).await.unwrap();

        let first = statuses.next().await.unwrap().unwrap();
        assert_eq!(first.user.screen_name, "ada");

        let next = tokio::time::timeout(Duration::from_secs(5), statuses.next())
            .await
            .expect("stalled stream was not timed out");
        assert!(matches!(next, Some(Err(_))));
    }

    #[test]
    fn statuses_parse_and_control_messages_are_skipped() {
        let status = parse_status(STATUS).unwrap();
        assert_eq!(status.user.screen_name, "ada");
        assert_eq!(status.text.as_deref(), Some("hello #rustlang"));

        assert!(parse_status("").is_none());
        assert!(parse_status(r#"{"delete":{"status":{"id_str":"1"}}}"#).is_none());
        assert!(parse_status(r#"{"limit":{"track":12}}"#).is_none());
    }

    #[test]
    fn search_response_tolerates_missing_statuses() {
        let body: SearchResponse = serde_json::from_str(r#"{"search_metadata":{}}"#).unwrap();
        assert!(body.statuses.is_empty());

        let body: SearchResponse =
            serde_json::from_str(&format!(r#"{{"statuses":[{STATUS}]}}"#)).unwrap();
        assert_eq!(body.statuses.len(), 1);
    }
}
