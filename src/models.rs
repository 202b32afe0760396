//! Data models for TuneIn API responses
//!
//! The TuneIn directory API returns OPML-style outlines rendered as JSON.
//! The shapes are inconsistent across endpoints (browse, search, tune,
//! describe), so the wire structs here carry the superset of observed
//! fields and everything user-facing is normalized into [`Node`].

use serde::{Deserialize, Serialize};

// ============================================================================
// Normalized Node Model
// ============================================================================

/// Semantic type of a directory node, as reported by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A playable audio leaf (station or episode)
    Audio,
    /// A pure navigational link
    Link,
    /// Anything else the API may invent
    #[serde(other)]
    Unknown,
}

/// A normalized directory node
///
/// Produced by one API normalization pass over a raw outline. Identity is
/// `guide_id` when present; pure navigational links may not carry one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Opaque stable identifier; absent for pure navigational links
    pub guide_id: Option<String>,
    /// Node type (`audio`, `link`, or unset)
    #[serde(rename = "type")]
    pub kind: Option<NodeKind>,
    /// Display label
    pub text: String,
    /// Target URL for links, playback URL for resolved stations
    pub url: Option<String>,
    /// Secondary label (slogan, now-playing info)
    pub subtext: Option<String>,
    /// Image URL
    pub image: Option<String>,
    /// Section/category key, when the API provides one
    pub key: Option<String>,
}

impl Node {
    /// Build a node from a raw outline, keeping only the uniform fields
    pub fn from_outline(outline: &Outline) -> Self {
        Self {
            guide_id: outline.guide_id.clone(),
            kind: outline.kind,
            text: outline.text.clone().unwrap_or_default(),
            url: outline.url.clone(),
            subtext: outline.subtext.clone(),
            image: outline.image.clone(),
            key: outline.key.clone(),
        }
    }

    /// Build a station node from a describe-endpoint listing
    ///
    /// Describe listings use `name`/`slogan` instead of `text`/`subtext`
    /// and never carry a type, so the audio type is forced here.
    pub fn from_listing(outline: &Outline) -> Self {
        Self {
            guide_id: outline.guide_id.clone(),
            kind: Some(NodeKind::Audio),
            text: outline.name.clone().unwrap_or_else(|| "???".to_string()),
            url: outline.url.clone(),
            subtext: outline.slogan.clone().or_else(|| Some(String::new())),
            image: outline.image.clone(),
            key: outline.key.clone(),
        }
    }

    /// Whether this node is a playable audio leaf
    pub fn is_audio(&self) -> bool {
        self.kind == Some(NodeKind::Audio)
    }

    /// Whether this node is a pure navigational link
    pub fn is_link(&self) -> bool {
        self.kind == Some(NodeKind::Link)
    }

    /// Semantic kind encoded in the guide id prefix
    pub fn guide_kind(&self) -> GuideKind {
        self.guide_id
            .as_deref()
            .map(GuideKind::of)
            .unwrap_or(GuideKind::Unknown)
    }
}

// ============================================================================
// Guide ID Kind Codes
// ============================================================================

/// Semantic kind encoded in the first character of a guide id
///
/// Collaborators translating nodes into navigable URIs rely on this table;
/// the mapping must stay exactly as the directory service defines it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuideKind {
    Program,
    Station,
    Group,
    Topic,
    Category,
    Region,
    Podcast,
    Affiliate,
    Stream,
    Unknown,
}

impl GuideKind {
    /// Decode the kind from a guide id
    pub fn of(guide_id: &str) -> Self {
        match guide_id.chars().next() {
            Some('p') => GuideKind::Program,
            Some('s') => GuideKind::Station,
            Some('g') => GuideKind::Group,
            Some('t') => GuideKind::Topic,
            Some('c') => GuideKind::Category,
            Some('r') => GuideKind::Region,
            Some('f') => GuideKind::Podcast,
            Some('a') => GuideKind::Affiliate,
            Some('e') => GuideKind::Stream,
            _ => GuideKind::Unknown,
        }
    }
}

// ============================================================================
// Directory Filter
// ============================================================================

/// Optional directory-wide result filter
///
/// When configured, search requests restrict results to one listing kind
/// via the API's single-character `filter=` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectoryFilter {
    /// Stations only
    Station,
    /// Programs only
    Program,
}

impl DirectoryFilter {
    /// Single-character value for the `filter=` query parameter
    pub fn as_query_char(&self) -> char {
        match self {
            DirectoryFilter::Station => 's',
            DirectoryFilter::Program => 'p',
        }
    }
}

// ============================================================================
// Wire Models
// ============================================================================

/// Envelope of every TuneIn JSON response
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse {
    pub head: Head,
    #[serde(default)]
    pub body: Vec<Outline>,
}

/// Response status header
#[derive(Debug, Clone, Deserialize)]
pub struct Head {
    /// "200" on success, anything else is a remote fault
    #[serde(default)]
    pub status: String,
    /// Fault message accompanying a non-success status
    #[serde(default)]
    pub fault: Option<String>,
}

/// One raw outline element
///
/// Field availability varies by endpoint: browse sections use `key` and
/// `children`, tune responses use lowercase `url`, describe listings use
/// `name`/`slogan`. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Outline {
    pub element: Option<String>,
    pub key: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<NodeKind>,
    pub text: Option<String>,
    /// Browse/search links use uppercase `URL`, tune streams lowercase `url`
    #[serde(rename = "URL", alias = "url")]
    pub url: Option<String>,
    pub guide_id: Option<String>,
    pub subtext: Option<String>,
    pub image: Option<String>,
    pub item: Option<String>,
    pub name: Option<String>,
    pub slogan: Option<String>,
    #[serde(default)]
    pub children: Vec<Outline>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guide_kind_codes() {
        assert_eq!(GuideKind::of("p12345"), GuideKind::Program);
        assert_eq!(GuideKind::of("s98765"), GuideKind::Station);
        assert_eq!(GuideKind::of("g111"), GuideKind::Group);
        assert_eq!(GuideKind::of("t222"), GuideKind::Topic);
        assert_eq!(GuideKind::of("c333"), GuideKind::Category);
        assert_eq!(GuideKind::of("r0"), GuideKind::Region);
        assert_eq!(GuideKind::of("f444"), GuideKind::Podcast);
        assert_eq!(GuideKind::of("a555"), GuideKind::Affiliate);
        assert_eq!(GuideKind::of("e666"), GuideKind::Stream);
        assert_eq!(GuideKind::of("x777"), GuideKind::Unknown);
        assert_eq!(GuideKind::of(""), GuideKind::Unknown);
    }

    #[test]
    fn test_outline_url_aliases() {
        let browse: Outline =
            serde_json::from_str(r#"{"text":"Rock","URL":"http://x/browse","type":"link"}"#)
                .unwrap();
        assert_eq!(browse.url.as_deref(), Some("http://x/browse"));
        assert_eq!(browse.kind, Some(NodeKind::Link));

        let tune: Outline =
            serde_json::from_str(r#"{"element":"audio","url":"http://x/stream.pls"}"#).unwrap();
        assert_eq!(tune.url.as_deref(), Some("http://x/stream.pls"));
    }

    #[test]
    fn test_unknown_node_kind() {
        let outline: Outline =
            serde_json::from_str(r#"{"text":"Weird","type":"mystery"}"#).unwrap();
        assert_eq!(outline.kind, Some(NodeKind::Unknown));
    }

    #[test]
    fn test_node_from_listing() {
        let outline = Outline {
            guide_id: Some("s123".to_string()),
            name: Some("Test FM".to_string()),
            slogan: Some("All tests, all day".to_string()),
            ..Default::default()
        };
        let node = Node::from_listing(&outline);
        assert!(node.is_audio());
        assert_eq!(node.text, "Test FM");
        assert_eq!(node.subtext.as_deref(), Some("All tests, all day"));
        assert_eq!(node.guide_kind(), GuideKind::Station);
    }
}
