//! HTTP client for the TuneIn directory API
//!
//! This module provides a client for browsing and searching the TuneIn
//! radio directory, resolving stations to their raw stream URLs, and
//! normalizing the API's inconsistent JSON shapes into a uniform node
//! model.
//!
//! # Example
//!
//! ```no_run
//! use pmotunein::TuneInClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = TuneInClient::new().await?;
//!
//!     // Browse the top-level categories
//!     for category in client.categories("").await {
//!         println!("{}", category.text);
//!     }
//!
//!     // Search for stations
//!     for station in client.search("jazz").await {
//!         println!("{} ({:?})", station.text, station.guide_id);
//!     }
//!
//!     Ok(())
//! }
//! ```

use crate::cache::MemoCache;
use crate::error::{Error, Result};
use crate::models::{ApiResponse, DirectoryFilter, Node, NodeKind, Outline};
use crate::playlist::{find_parser, uri_extension};
use crate::resolver::{Downloader, HttpDownloader, PlaylistFetch};
use reqwest::Client;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error};
use url::Url;

/// Default TuneIn directory base URL
pub const DEFAULT_BASE_URL: &str = "http://opml.radiotime.com";

/// Default timeout for directory and playlist requests (milliseconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Default User-Agent
pub const DEFAULT_USER_AGENT: &str = "pmotunein/0.1.0";

/// Default TTL for the API response cache (seconds)
pub const API_CACHE_TTL_SECS: u64 = 3600;

/// Default hit ceiling for the API response cache; an entry that has
/// served more than this many hits is refreshed even inside its TTL
pub const API_CACHE_CTL: u32 = 8;

/// Extensions that are always a direct audio stream, never a playlist
const DIRECT_STREAM_EXTENSIONS: &[&str] = &[".mp3", ".wma"];

/// TuneIn directory HTTP client
///
/// All browse/search/tune/describe operations degrade to an empty result
/// on remote or transport failure; errors are logged, never surfaced.
/// Responses are memoized per request URL with a TTL plus a hit-count
/// refresh ceiling, and resolved station nodes are kept in a side-cache
/// until [`TuneInClient::reload`].
#[derive(Debug, Clone)]
pub struct TuneInClient {
    pub(crate) client: Client,
    base_url: String,
    timeout: Duration,
    filter: Option<DirectoryFilter>,
    downloader: HttpDownloader,
    api_cache: MemoCache<String, Vec<Outline>>,
    playlist_cache: MemoCache<String, PlaylistFetch>,
    stations: Arc<RwLock<HashMap<String, Node>>>,
}

impl TuneInClient {
    /// Create a new client with default settings
    pub async fn new() -> Result<Self> {
        Self::builder().build().await
    }

    /// Create a builder for configuring the client
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the request timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Clear the response caches and the station side-cache
    pub async fn reload(&self) {
        self.api_cache.clear().await;
        self.playlist_cache.clear().await;
        self.stations.write().await.clear();
    }

    // ========================================================================
    // Browsing
    // ========================================================================

    /// List top-level categories, or the content of one category
    ///
    /// Special cases, all inherited from the directory API's quirks:
    /// - `location` browses by the fixed root region id instead of a
    ///   category filter;
    /// - `language` is broken upstream and returns nothing, without a
    ///   network call;
    /// - `podcast` and `local` wrap their results in one extra level of
    ///   named sections that gets flattened here;
    /// - the top level (empty category) gains a synthesized "Trending"
    ///   link and loses the dead-end "language" entry.
    pub async fn categories(&self, category: &str) -> Vec<Node> {
        if category == "language" {
            debug!("Language category browsing is unsupported upstream");
            return Vec::new();
        }

        let args: Vec<(&str, &str)> = if category == "location" {
            vec![("id", "r0")]
        } else {
            vec![("c", category)]
        };
        let results = self.api_call("Browse.ashx", &args).await;

        if category == "podcast" || category == "local" {
            // One extra nesting level for these two only.
            return self.filter_results(&results, "", false).await;
        }

        let mut nodes: Vec<Node> = results.iter().map(Node::from_outline).collect();
        if category.is_empty() {
            nodes.retain(|node| node.key.as_deref() != Some("language"));
            nodes.push(self.trending_node());
        }
        nodes
    }

    /// List the navigational children of a region
    pub async fn locations(&self, location_id: &str) -> Vec<Node> {
        let results = self.api_call("Browse.ashx", &[("id", location_id)]).await;
        results
            .iter()
            .map(Node::from_outline)
            .filter(Node::is_link)
            .collect()
    }

    /// Featured items for a guide id
    pub async fn featured(&self, guide_id: &str) -> Vec<Node> {
        self.browse("Featured", guide_id).await
    }

    /// Local streams for a guide id
    pub async fn local(&self, guide_id: &str) -> Vec<Node> {
        self.browse("Local", guide_id).await
    }

    /// Stations under a guide id
    pub async fn stations(&self, guide_id: &str) -> Vec<Node> {
        self.browse("Station", guide_id).await
    }

    /// Related items for a guide id
    pub async fn related(&self, guide_id: &str) -> Vec<Node> {
        self.browse("Related", guide_id).await
    }

    /// Shows under a guide id
    pub async fn shows(&self, guide_id: &str) -> Vec<Node> {
        self.browse("Show", guide_id).await
    }

    /// Episodes of a show
    ///
    /// Episode listings come from the tune endpoint in program-browse
    /// mode, not from plain browsing.
    pub async fn episodes(&self, guide_id: &str) -> Vec<Node> {
        let results = self
            .api_call("Tune.ashx", &[("c", "pbrowse"), ("id", guide_id)])
            .await;
        self.filter_results(&results, "Topic", false).await
    }

    async fn browse(&self, section_name: &str, guide_id: &str) -> Vec<Node> {
        let results = self.api_call("Browse.ashx", &[("id", guide_id)]).await;
        self.filter_results(&results, section_name, false).await
    }

    // ========================================================================
    // Stations
    // ========================================================================

    /// Detailed metadata for a single station
    pub async fn station_info(&self, station_id: &str) -> Option<Node> {
        debug!("Fetching station info for {station_id}");
        let results = self
            .api_call(
                "Describe.ashx",
                &[("c", "composite"), ("detail", "listing"), ("id", station_id)],
            )
            .await;
        self.filter_results(&results, "Listing", true)
            .await
            .into_iter()
            .next()
    }

    /// Station lookup through the side-cache
    ///
    /// Stations already seen in browse or search results are answered
    /// from the cache; otherwise a describe request is issued and the
    /// result is cached under its id.
    pub async fn station(&self, station_id: &str) -> Option<Node> {
        if let Some(station) = self.stations.read().await.get(station_id) {
            return Some(station.clone());
        }

        let station = self.station_info(station_id).await?;
        self.stations
            .write()
            .await
            .insert(station_id.to_string(), station.clone());
        Some(station)
    }

    /// Search the directory for audio nodes
    ///
    /// An empty query short-circuits to an empty result without a
    /// network call. Nested result groups are flattened and anything
    /// that is not an audio node is dropped.
    pub async fn search(&self, query: &str) -> Vec<Node> {
        if query.is_empty() {
            return Vec::new();
        }

        let filter_value;
        let mut args: Vec<(&str, &str)> = vec![("query", query)];
        if let Some(filter) = self.filter {
            filter_value = filter.as_query_char().to_string();
            args.push(("filter", &filter_value));
        }

        let results = self.api_call("Search.ashx", &args).await;
        let mut nodes = Vec::new();
        for outline in &results {
            if outline.children.is_empty() {
                self.collect_audio_node(outline, &mut nodes).await;
            } else {
                for child in &outline.children {
                    self.collect_audio_node(child, &mut nodes).await;
                }
            }
        }
        nodes
    }

    async fn collect_audio_node(&self, outline: &Outline, nodes: &mut Vec<Node>) {
        if outline.kind != Some(NodeKind::Audio) {
            return;
        }
        let node = Node::from_outline(outline);
        self.remember_station(&node).await;
        nodes.push(node);
    }

    /// Resolve a station to its raw, possibly-indirect stream URLs
    ///
    /// Returns the ordered, duplicate-free `url` values from the tune
    /// response. An empty result means the station currently has no
    /// playable stream; it is logged but not an error.
    pub async fn tune(&self, station: &Node) -> Vec<String> {
        let Some(station_id) = station.guide_id.as_deref() else {
            error!("Cannot tune station without guide_id: {}", station.text);
            return Vec::new();
        };
        debug!("Tuning station id {station_id}");

        let results = self.api_call("Tune.ashx", &[("id", station_id)]).await;
        let mut seen = HashSet::new();
        let mut urls = Vec::new();
        for outline in &results {
            if let Some(url) = &outline.url {
                if seen.insert(url.clone()) {
                    urls.push(url.clone());
                }
            }
        }

        if urls.is_empty() {
            error!("Failed to tune station id {station_id}");
        }
        urls
    }

    // ========================================================================
    // Playlist extraction
    // ========================================================================

    /// Extract the full list of stream URLs behind one URL
    ///
    /// Known direct-audio extensions pass straight through. Otherwise
    /// the document is downloaded once and parsed as a playlist; when
    /// nothing can be extracted the URL itself is the only candidate.
    pub async fn extract_stream_urls(&self, url: &str) -> Vec<String> {
        let extension = uri_extension(url);
        if let Some(ext) = extension.as_deref() {
            if DIRECT_STREAM_EXTENSIONS.contains(&ext) {
                return vec![url.to_string()];
            }
        }

        let fetch = self.get_playlist(url).await;
        let mut results = Vec::new();
        if let Some(body) = &fetch.body {
            if let Some(parser) = find_parser(extension.as_deref(), fetch.content_type.as_deref())
            {
                results = parser
                    .parse(body.as_bytes())
                    .into_iter()
                    .filter(|uri| !uri.is_empty())
                    .collect();
            }
        }

        if results.is_empty() {
            results.push(url.to_string());
        }
        results
    }

    /// Download a playlist document, memoized per URL
    ///
    /// A `content-type: audio/mpeg` response is itself a stream: the
    /// body is not downloaded. Transport failures degrade to an empty
    /// fetch and are never cached.
    pub async fn get_playlist(&self, uri: &str) -> PlaylistFetch {
        if let Some(cached) = self.playlist_cache.get(&uri.to_string()).await {
            return cached;
        }

        debug!("Playlist request: {uri}");
        let fetch = match self.downloader.fetch(uri, self.timeout).await {
            Ok(fetch) => fetch,
            Err(e) => {
                error!("Playlist request failed: {e}");
                return PlaylistFetch::default();
            }
        };

        self.playlist_cache
            .insert(uri.to_string(), fetch.clone())
            .await;
        fetch
    }

    // ========================================================================
    // Normalization
    // ========================================================================

    /// Extract one named section's children from a browse response
    ///
    /// A section matches when its key prefix-matches `section_name`
    /// case-insensitively; the empty name matches the first section.
    /// Children without a guide id are dropped unless they are pure
    /// link nodes, which pass through unmapped. Every mapped node is
    /// also remembered in the station side-cache.
    async fn filter_results(
        &self,
        outlines: &[Outline],
        section_name: &str,
        map_listing: bool,
    ) -> Vec<Node> {
        let wanted = section_name.to_lowercase();
        for section in outlines {
            let key = section
                .key
                .as_deref()
                .unwrap_or_default()
                .to_lowercase();
            if !key.starts_with(&wanted) {
                continue;
            }

            let mut nodes = Vec::new();
            for item in &section.children {
                if item.guide_id.is_some() {
                    let node = if map_listing {
                        Node::from_listing(item)
                    } else {
                        Node::from_outline(item)
                    };
                    self.remember_station(&node).await;
                    nodes.push(node);
                } else if item.kind == Some(NodeKind::Link) {
                    nodes.push(Node::from_outline(item));
                }
            }
            return nodes;
        }
        Vec::new()
    }

    async fn remember_station(&self, node: &Node) {
        if let Some(guide_id) = &node.guide_id {
            self.stations
                .write()
                .await
                .insert(guide_id.clone(), node.clone());
        }
    }

    /// The synthesized top-level "Trending" entry; the API has no
    /// category for it, only a browse URL.
    fn trending_node(&self) -> Node {
        Node {
            guide_id: None,
            kind: Some(NodeKind::Link),
            text: "Trending".to_string(),
            url: Some(format!("{}/Browse.ashx?c=trending", self.base_url)),
            subtext: None,
            image: None,
            key: Some("trending".to_string()),
        }
    }

    // ========================================================================
    // Raw API access
    // ========================================================================

    /// Issue one directory GET request, memoized by full request URL
    ///
    /// Remote faults (non-"200" `head.status`) and transport failures
    /// both degrade to an empty body; only non-empty bodies are cached.
    async fn api_call(&self, variant: &str, args: &[(&str, &str)]) -> Vec<Outline> {
        let url = match self.request_url(variant, args) {
            Ok(url) => url,
            Err(e) => {
                error!("Invalid TuneIn request URL: {e}");
                return Vec::new();
            }
        };
        let key = url.as_str().to_string();

        if let Some(cached) = self.api_cache.get(&key).await {
            return cached;
        }

        debug!("TuneIn request: {url}");
        let body = match self.fetch_api(url).await {
            Ok(body) => body,
            Err(e) => {
                error!("TuneIn request failed: {e}");
                return Vec::new();
            }
        };

        if !body.is_empty() {
            self.api_cache.insert(key, body.clone()).await;
        }
        body
    }

    fn request_url(&self, variant: &str, args: &[(&str, &str)]) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/{}", self.base_url, variant))?;
        url.query_pairs_mut().append_pair("render", "json");
        for (name, value) in args {
            url.query_pairs_mut().append_pair(name, value);
        }
        Ok(url)
    }

    async fn fetch_api(&self, url: Url) -> Result<Vec<Outline>> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;

        let api: ApiResponse = response.json().await?;
        if api.head.status != "200" {
            return Err(Error::api_error(format!(
                "{} {}",
                api.head.status,
                api.head.fault.unwrap_or_default()
            )));
        }
        Ok(api.body)
    }
}

#[async_trait::async_trait]
impl crate::resolver::StreamExtractor for TuneInClient {
    async fn extract(&self, uri: &str) -> Vec<String> {
        self.extract_stream_urls(uri).await
    }
}

/// Builder for configuring a TuneInClient
#[derive(Debug)]
pub struct ClientBuilder {
    client: Option<Client>,
    base_url: String,
    timeout: Duration,
    user_agent: String,
    filter: Option<DirectoryFilter>,
    cache_ttl: Duration,
    cache_ctl: u32,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            client: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            filter: None,
            cache_ttl: Duration::from_secs(API_CACHE_TTL_SECS),
            cache_ctl: API_CACHE_CTL,
        }
    }
}

impl ClientBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a custom HTTP client
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the directory base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the request timeout in milliseconds, as found in configuration
    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout = Duration::from_millis(timeout_ms);
        self
    }

    /// Set a custom User-Agent header
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Restrict search results to stations or programs only
    pub fn filter(mut self, filter: DirectoryFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Set the response cache TTL
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Set the response cache hit ceiling (0 disables it)
    pub fn cache_ctl(mut self, ctl: u32) -> Self {
        self.cache_ctl = ctl;
        self
    }

    /// Build the client
    pub async fn build(self) -> Result<TuneInClient> {
        let client = if let Some(client) = self.client {
            client
        } else {
            Client::builder()
                .user_agent(&self.user_agent)
                .timeout(self.timeout)
                .build()?
        };

        Ok(TuneInClient {
            downloader: HttpDownloader::with_client(client.clone()),
            client,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            timeout: self.timeout,
            filter: self.filter,
            api_cache: MemoCache::with_ctl(self.cache_ttl, self.cache_ctl),
            playlist_cache: MemoCache::new(self.cache_ttl),
            stations: Arc::new(RwLock::new(HashMap::new())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outline(guide_id: Option<&str>, kind: Option<NodeKind>, text: &str) -> Outline {
        Outline {
            guide_id: guide_id.map(str::to_string),
            kind,
            text: Some(text.to_string()),
            ..Default::default()
        }
    }

    fn section(key: &str, children: Vec<Outline>) -> Outline {
        Outline {
            key: Some(key.to_string()),
            children,
            ..Default::default()
        }
    }

    async fn client() -> TuneInClient {
        TuneInClient::builder().build().await.unwrap()
    }

    #[tokio::test]
    async fn test_filter_results_section_prefix_match() {
        let client = client().await;
        let body = vec![
            section(
                "related",
                vec![outline(Some("s1"), Some(NodeKind::Audio), "Other FM")],
            ),
            section(
                "stations",
                vec![
                    outline(Some("s2"), Some(NodeKind::Audio), "Test FM"),
                    outline(Some("s3"), Some(NodeKind::Audio), "More FM"),
                ],
            ),
        ];

        let nodes = client.filter_results(&body, "Station", false).await;
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].text, "Test FM");
        assert_eq!(nodes[1].text, "More FM");
    }

    #[tokio::test]
    async fn test_filter_results_empty_name_takes_first_section() {
        let client = client().await;
        let body = vec![
            section(
                "podcasts",
                vec![outline(Some("p1"), Some(NodeKind::Audio), "Cast")],
            ),
            section(
                "more",
                vec![outline(Some("p2"), Some(NodeKind::Audio), "Other")],
            ),
        ];

        let nodes = client.filter_results(&body, "", false).await;
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].text, "Cast");
    }

    #[tokio::test]
    async fn test_filter_results_drops_anonymous_non_links() {
        let client = client().await;
        let body = vec![section(
            "stations",
            vec![
                outline(None, Some(NodeKind::Audio), "No id, not a link"),
                outline(None, Some(NodeKind::Link), "More stations"),
                outline(Some("s1"), Some(NodeKind::Audio), "Test FM"),
            ],
        )];

        let nodes = client.filter_results(&body, "Station", false).await;
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].text, "More stations");
        assert!(nodes[0].is_link());
        assert_eq!(nodes[1].text, "Test FM");
    }

    #[tokio::test]
    async fn test_filter_results_populates_side_cache() {
        let client = client().await;
        let body = vec![section(
            "stations",
            vec![outline(Some("s1"), Some(NodeKind::Audio), "Test FM")],
        )];
        client.filter_results(&body, "Station", false).await;

        let cached = client.station("s1").await;
        assert_eq!(cached.map(|n| n.text), Some("Test FM".to_string()));
    }

    #[tokio::test]
    async fn test_language_category_short_circuits() {
        // No base URL is reachable here; the call must not try the network.
        let client = TuneInClient::builder()
            .base_url("http://127.0.0.1:1")
            .build()
            .await
            .unwrap();
        assert!(client.categories("language").await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_search_short_circuits() {
        let client = TuneInClient::builder()
            .base_url("http://127.0.0.1:1")
            .build()
            .await
            .unwrap();
        assert!(client.search("").await.is_empty());
    }

    #[tokio::test]
    async fn test_tune_requires_guide_id() {
        let client = TuneInClient::builder()
            .base_url("http://127.0.0.1:1")
            .build()
            .await
            .unwrap();
        let node = Node {
            guide_id: None,
            kind: Some(NodeKind::Audio),
            text: "Anonymous".to_string(),
            url: None,
            subtext: None,
            image: None,
            key: None,
        };
        assert!(client.tune(&node).await.is_empty());
    }

    #[test]
    fn test_builder_defaults() {
        let builder = ClientBuilder::default();
        assert_eq!(builder.base_url, DEFAULT_BASE_URL);
        assert_eq!(builder.timeout, Duration::from_millis(DEFAULT_TIMEOUT_MS));
        assert_eq!(builder.cache_ctl, API_CACHE_CTL);
    }
}
