//! Stream resolution engine
//!
//! A tuned station yields one or more raw stream URLs, which frequently
//! point at nested playlist documents instead of playable audio. The
//! resolver drives the unwrap loop: probe the URI, and when the probe says
//! "document" rather than "stream", download it, parse it as a playlist
//! and follow the first entry, under one cumulative wall-clock budget for
//! the whole session and with cycle detection across every URI attempted.
//!
//! The content probe is an external oracle (the host media server's
//! scanner); it and the HTTP downloader sit behind traits so the engine
//! can be exercised without touching the network.

use crate::error::{Error, Result};
use crate::playlist::{find_parser, uri_extension};
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Default cumulative budget for one resolution session
pub const DEFAULT_RESOLVE_BUDGET_SECS: u64 = 30;

/// Outcome of probing a URI for playability
#[derive(Debug, Clone)]
pub struct ProbeResult {
    /// MIME type reported by the scanner
    pub mime: String,
    /// Whether the scanner considers the content directly playable
    pub playable: bool,
    /// Whether the content is seekable (live streams are not)
    pub seekable: bool,
}

/// External content-probe oracle
///
/// Given a URI and the time remaining in the session, reports a
/// playability verdict and MIME type, or fails when the content cannot
/// be scanned. A scan failure is not fatal: the resolver falls through
/// to the download/parse path.
#[async_trait]
pub trait ContentProbe: Send + Sync {
    async fn probe(&self, uri: &str, timeout: Duration) -> Result<ProbeResult>;
}

/// A downloaded playlist document
///
/// `body` is `None` when the server answered with `audio/mpeg`: that
/// content is itself a stream and its body is deliberately not fetched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaylistFetch {
    pub content_type: Option<String>,
    pub body: Option<String>,
}

/// HTTP document downloader
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn fetch(&self, uri: &str, timeout: Duration) -> Result<PlaylistFetch>;
}

/// Second-chance playlist extraction, independent of the probe loop
///
/// Implemented by the directory client: download the URI once more and
/// return every URI its playlist yields, falling back to the URI itself.
#[async_trait]
pub trait StreamExtractor: Send + Sync {
    async fn extract(&self, uri: &str) -> Vec<String>;
}

/// reqwest-backed [`Downloader`]
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: reqwest::Client,
}

impl HttpDownloader {
    /// Create a downloader with its own HTTP client
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().build()?,
        })
    }

    /// Create a downloader sharing an existing HTTP client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn fetch(&self, uri: &str, timeout: Duration) -> Result<PlaylistFetch> {
        let response = self
            .client
            .get(uri)
            .timeout(timeout)
            .send()
            .await?
            .error_for_status()?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string())
            .unwrap_or_else(|| "audio/mpeg".to_string());

        let body = if content_type == "audio/mpeg" {
            debug!("Found streaming audio at {uri}");
            None
        } else {
            Some(response.text().await?)
        };

        Ok(PlaylistFetch {
            content_type: Some(content_type),
            body,
        })
    }
}

/// A successfully resolved, directly playable stream
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStream {
    /// The playable URI
    pub uri: String,
    /// MIME type, when the probe or the download produced one
    pub mime: Option<String>,
}

/// Deadline-bounded, cycle-safe stream resolver
pub struct StreamResolver {
    probe: Arc<dyn ContentProbe>,
    downloader: Arc<dyn Downloader>,
    budget: Duration,
}

impl StreamResolver {
    /// Create a resolver with the given session budget
    pub fn new(probe: Arc<dyn ContentProbe>, downloader: Arc<dyn Downloader>) -> Self {
        Self::with_budget(
            probe,
            downloader,
            Duration::from_secs(DEFAULT_RESOLVE_BUDGET_SECS),
        )
    }

    /// Create a resolver with a custom session budget
    pub fn with_budget(
        probe: Arc<dyn ContentProbe>,
        downloader: Arc<dyn Downloader>,
        budget: Duration,
    ) -> Self {
        Self {
            probe,
            downloader,
            budget,
        }
    }

    /// Resolve a station's candidate queue to one playable stream
    ///
    /// Candidates are attempted front to back. When the unwrap loop fails
    /// a candidate, one independent extraction pass may still harvest
    /// nested URIs from it: anything not yet attempted extends the queue,
    /// and a candidate that yields nothing new is played verbatim as a
    /// last resort. The whole session shares one deadline; once it
    /// passes, resolution fails without further network calls.
    pub async fn resolve(
        &self,
        candidates: Vec<String>,
        extractor: &dyn StreamExtractor,
    ) -> Result<ResolvedStream> {
        let Some(first) = candidates.first().cloned() else {
            return Err(Error::NoPlayableStream("no stream candidates".to_string()));
        };

        let deadline = Instant::now() + self.budget;
        let mut queue: VecDeque<String> = candidates.into();
        let mut seen: HashSet<String> = HashSet::new();

        while let Some(uri) = queue.pop_front() {
            debug!("Looking up URI: {uri}");
            if let Some(resolved) = self.unwrap_stream(&uri, deadline, &mut seen).await? {
                return Ok(resolved);
            }

            // Second chance: one playlist-extraction pass, independent of
            // the probe-driven loop above.
            let extracted = extractor.extract(&uri).await;
            let fresh: Vec<String> = extracted
                .into_iter()
                .filter(|u| *u != uri && !seen.contains(u) && !queue.contains(u))
                .collect();

            if fresh.is_empty() {
                debug!("Last attempt, play stream anyway: {uri}");
                return Ok(ResolvedStream { uri, mime: None });
            }
            queue.extend(fresh);
        }

        info!("Stream lookup failed for {first}");
        Err(Error::NoPlayableStream(first))
    }

    /// Unwrap one candidate until a playable stream or a dead end
    ///
    /// `Ok(None)` fails only this candidate (cycle or download failure);
    /// a passed deadline is terminal for the whole session.
    async fn unwrap_stream(
        &self,
        uri: &str,
        deadline: Instant,
        seen: &mut HashSet<String>,
    ) -> Result<Option<ResolvedStream>> {
        let mut uri = uri.to_string();

        loop {
            if !seen.insert(uri.clone()) {
                info!("Unwrapping stream from URI ({uri}) failed: playlist referenced itself");
                return Ok(None);
            }

            let now = Instant::now();
            if now >= deadline {
                info!("Timed out resolving stream URI {uri}");
                return Err(Error::DeadlineExceeded);
            }
            debug!("Unwrapping stream from URI: {uri}");

            match self.probe.probe(&uri, deadline - now).await {
                Ok(result) => {
                    let mime = result.mime.as_str();
                    // text/* and application/* are document families, not
                    // audio; anything else the probe reports is a stream.
                    if result.playable
                        || !(mime.starts_with("text/") || mime.starts_with("application/"))
                    {
                        debug!("Unwrapped potential {mime} stream: {uri}");
                        return Ok(Some(ResolvedStream {
                            uri,
                            mime: Some(result.mime),
                        }));
                    }
                }
                Err(e) => debug!("Scan failed for URI ({uri}): {e}"),
            }

            let now = Instant::now();
            if now >= deadline {
                info!("Timed out resolving stream URI {uri}");
                return Err(Error::DeadlineExceeded);
            }

            let fetch = match self.downloader.fetch(&uri, deadline - now).await {
                Ok(fetch) => fetch,
                Err(e) => {
                    info!("Unwrapping stream from URI ({uri}) failed: download error: {e}");
                    return Ok(None);
                }
            };

            let Some(body) = fetch.body else {
                // audio/mpeg answer: the URI is itself a stream.
                return Ok(Some(ResolvedStream {
                    uri,
                    mime: fetch.content_type,
                }));
            };

            let parsed = find_parser(uri_extension(&uri).as_deref(), fetch.content_type.as_deref())
                .map(|parser| parser.parse(body.as_bytes()))
                .unwrap_or_default();

            let Some(next) = parsed.into_iter().find(|u| !u.is_empty()) else {
                debug!("Failed parsing URI ({uri}) as playlist; found potential stream");
                return Ok(Some(ResolvedStream {
                    uri,
                    mime: fetch.content_type,
                }));
            };

            // Only the first parsed URI is followed; later entries are
            // recovered, if ever, by the extraction fallback in resolve().
            debug!("Parsed playlist ({uri}) and found new URI: {next}");
            uri = next;
        }
    }
}
