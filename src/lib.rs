//! TuneIn directory client library for PMOMusic
//!
//! This crate provides a Rust client for the TuneIn radio directory,
//! turning an opaque station identifier into one concrete, playable
//! audio stream URI. The directory API hands out indirect references
//! that frequently point at nested playlist files (M3U, PLS, and two
//! incompatible ASX dialects) rather than raw streams; the resolver
//! unwraps those under a single session deadline.
//!
//! # Features
//!
//! - **Directory Browsing**: categories, locations, featured/local/
//!   related sections, shows and episodes, normalized into a uniform
//!   node model despite the API's inconsistent JSON shapes
//! - **Search**: station search with an optional station/program filter
//! - **Response Caching**: per-request memoization with TTL plus a
//!   hit-count refresh ceiling, and a station side-cache cleared by
//!   [`TuneInClient::reload`]
//! - **Playlist Parsing**: M3U, PLS (with advertisement filtering), and
//!   both ASX dialects, selected by extension or content type
//! - **Stream Resolution**: deadline-bounded, cycle-safe unwrapping of
//!   nested playlists down to a playable stream
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use pmotunein::{HttpDownloader, StreamResolver, TuneInClient};
//! # use pmotunein::{ContentProbe, ProbeResult};
//! # struct MyScanner;
//! # #[async_trait::async_trait]
//! # impl ContentProbe for MyScanner {
//! #     async fn probe(&self, _uri: &str, _timeout: Duration)
//! #         -> pmotunein::Result<ProbeResult> { unimplemented!() }
//! # }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = TuneInClient::new().await?;
//!
//!     // Find a station and its raw stream URLs
//!     let station = client.search("jazz").await.into_iter().next().unwrap();
//!     let candidates = client.tune(&station).await;
//!
//!     // Unwrap playlists until something playable appears
//!     let probe = Arc::new(MyScanner);
//!     let downloader = Arc::new(HttpDownloader::new()?);
//!     let resolver = StreamResolver::new(probe, downloader);
//!     let stream = resolver.resolve(candidates, &client).await?;
//!     println!("Playable stream: {}", stream.uri);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Error Handling
//!
//! Directory operations never fail loudly: remote faults, transport
//! errors and malformed playlists all degrade to empty results and are
//! reported through `tracing`. The only hard failures are resolution
//! outcomes ([`Error::NoPlayableStream`], [`Error::DeadlineExceeded`]).

pub mod cache;
pub mod client;
pub mod error;
pub mod models;
pub mod playlist;
pub mod resolver;

// Re-exports
pub use cache::MemoCache;
pub use client::{ClientBuilder, TuneInClient};
pub use error::{Error, Result};
pub use models::{DirectoryFilter, GuideKind, Node, NodeKind, Outline};
pub use playlist::{find_parser, PlaylistFormat};
pub use resolver::{
    ContentProbe, Downloader, HttpDownloader, PlaylistFetch, ProbeResult, ResolvedStream,
    StreamExtractor, StreamResolver,
};
