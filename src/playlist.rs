//! Playlist parsers and format dispatch
//!
//! Station tune responses frequently point at playlist documents instead of
//! raw audio streams: M3U, PLS, and ASX in two incompatible dialects (the
//! XML one and a legacy INI one). Each parser takes the raw document bytes
//! and returns the candidate URIs it could extract, in document order.
//! Malformed input never errors; it yields an empty or partial list so the
//! resolver can fall through to its next strategy.

use quick_xml::events::Event;
use quick_xml::Reader;

/// A supported playlist format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistFormat {
    M3u,
    Pls,
    Asx,
}

impl PlaylistFormat {
    /// Parse a playlist document into candidate stream URIs
    pub fn parse(&self, data: &[u8]) -> Vec<String> {
        match self {
            PlaylistFormat::M3u => parse_m3u(data),
            PlaylistFormat::Pls => parse_pls(data),
            PlaylistFormat::Asx => parse_asx(data),
        }
    }
}

/// Select a parser from a path extension, falling back to the content type
///
/// The extension map takes priority. When the URL gives no usable hint the
/// HTTP `content-type` header is tried instead; this is server-dependent
/// but better than nothing.
pub fn find_parser(extension: Option<&str>, content_type: Option<&str>) -> Option<PlaylistFormat> {
    if let Some(ext) = extension {
        match ext.to_lowercase().as_str() {
            ".asx" | ".wax" => return Some(PlaylistFormat::Asx),
            ".m3u" => return Some(PlaylistFormat::M3u),
            ".pls" => return Some(PlaylistFormat::Pls),
            _ => {}
        }
    }

    match content_type?.to_lowercase().as_str() {
        "video/x-ms-asf" => Some(PlaylistFormat::Asx),
        "application/x-mpegurl" => Some(PlaylistFormat::M3u),
        "audio/x-scpls" => Some(PlaylistFormat::Pls),
        _ => None,
    }
}

/// Extract the dotted path extension of a URI, lowercased (e.g. ".pls")
pub fn uri_extension(uri: &str) -> Option<String> {
    let path = url::Url::parse(uri).ok()?.path().to_string();
    let name = path.rsplit('/').next()?;
    let dot = name.rfind('.')?;
    Some(name[dot..].to_lowercase())
}

/// Parse an M3U document
///
/// Every non-empty line that is not a `#` directive is a URI. Lines that
/// are not valid UTF-8 are skipped.
pub fn parse_m3u(data: &[u8]) -> Vec<String> {
    data.split(|&b| b == b'\n')
        .filter_map(|line| std::str::from_utf8(line).ok())
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Parse a PLS document
///
/// Only the `[playlist]` section is considered. Entries whose `LengthN` is
/// declared and differs from -1 are advertisements injected by some
/// providers and are skipped; -1 marks an unbounded live stream.
pub fn parse_pls(data: &[u8]) -> Vec<String> {
    let sections = parse_ini(data);
    let Some(options) = lookup_section(&sections, "playlist") else {
        return Vec::new();
    };

    let count = lookup_option(options, "numberofentries")
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    let mut uris = Vec::new();
    for i in 1..=count {
        let Some(file) = lookup_option(options, &format!("file{i}")) else {
            continue;
        };
        if let Some(length) = lookup_option(options, &format!("length{i}")) {
            if length.trim() != "-1" {
                continue;
            }
        }
        uris.push(strip_quotes(file).to_string());
    }
    uris
}

/// Parse an ASX document, sniffing between the XML and legacy INI dialects
pub fn parse_asx(data: &[u8]) -> Vec<String> {
    let head = &data[..data.len().min(50)];
    if String::from_utf8_lossy(head).to_lowercase().contains("asx") {
        parse_xml_asx(data)
    } else {
        parse_old_asx(data)
    }
}

/// Parse the legacy INI ASX dialect
///
/// A `[Reference]` section holds one URI per `Ref*` option.
pub fn parse_old_asx(data: &[u8]) -> Vec<String> {
    let sections = parse_ini(data);
    let Some(options) = lookup_section(&sections, "reference") else {
        return Vec::new();
    };

    options
        .iter()
        .filter(|(key, _)| key.starts_with("ref"))
        .map(|(_, value)| fixup_asf_url(value))
        .collect()
}

/// Parse the XML ASX dialect
///
/// Two legal shapes exist: `<entry><ref href=.../></entry>` and
/// `<entry href=.../>`. All `entry/ref` URIs come first, then the
/// `entry` attribute form, each in document order.
pub fn parse_xml_asx(data: &[u8]) -> Vec<String> {
    let text = String::from_utf8_lossy(data);
    let mut reader = Reader::from_str(&text);

    let mut ref_uris = Vec::new();
    let mut entry_uris = Vec::new();
    let mut in_entry = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let tag = e.name().as_ref().to_ascii_lowercase();
                match tag.as_slice() {
                    b"entry" => {
                        in_entry = true;
                        if let Some(href) = attribute(&e, b"href") {
                            entry_uris.push(fixup_asf_url(href.trim()));
                        }
                    }
                    b"ref" if in_entry => {
                        if let Some(href) = attribute(&e, b"href") {
                            ref_uris.push(fixup_asf_url(href.trim()));
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref().to_ascii_lowercase() == b"entry" {
                    in_entry = false;
                }
            }
            Ok(Event::Eof) => break,
            // Malformed markup: keep whatever was extracted so far.
            Err(_) => break,
            _ => {}
        }
    }

    ref_uris.extend(entry_uris);
    ref_uris
}

/// Rewrite mislabeled ASF streaming URLs
///
/// Some upstream playlists hand out `http://...?MSWMExt=.asf` for what is
/// actually an MMS stream; players choke on the HTTP scheme.
fn fixup_asf_url(uri: &str) -> String {
    let lower = uri.to_lowercase();
    if let Some(rest) = lower.strip_prefix("http://") {
        if lower.ends_with("?mswmext=.asf") {
            return format!("mms://{rest}");
        }
    }
    uri.to_string()
}

fn attribute(e: &quick_xml::events::BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes().flatten().find_map(|attr| {
        if attr.key.as_ref().to_ascii_lowercase() == name {
            Some(String::from_utf8_lossy(&attr.value).into_owned())
        } else {
            None
        }
    })
}

/// Lenient INI parse: `(section_lower, [(key_lower, value)])` in file order
///
/// Lines that are neither a section header nor a `key=value` pair are
/// ignored rather than rejected.
fn parse_ini(data: &[u8]) -> Vec<(String, Vec<(String, String)>)> {
    let text = String::from_utf8_lossy(data);
    let mut sections: Vec<(String, Vec<(String, String)>)> = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }
        if line.starts_with('[') && line.ends_with(']') {
            let name = line[1..line.len() - 1].trim().to_lowercase();
            sections.push((name, Vec::new()));
        } else if let Some((key, value)) = line.split_once('=') {
            if let Some((_, options)) = sections.last_mut() {
                options.push((key.trim().to_lowercase(), value.trim().to_string()));
            }
        }
    }
    sections
}

fn lookup_section<'a>(
    sections: &'a [(String, Vec<(String, String)>)],
    name: &str,
) -> Option<&'a Vec<(String, String)>> {
    sections
        .iter()
        .find(|(section, _)| section == name)
        .map(|(_, options)| options)
}

fn lookup_option<'a>(options: &'a [(String, String)], key: &str) -> Option<&'a str> {
    options
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn strip_quotes(value: &str) -> &str {
    let value = value.trim();
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_m3u() {
        let data = b"#comment\nfile:///a\n\nfile:///b\n";
        assert_eq!(parse_m3u(data), vec!["file:///a", "file:///b"]);
    }

    #[test]
    fn test_parse_m3u_with_header_and_crlf() {
        let data = b"#EXTM3U\r\n#EXTINF:123,Example\r\nhttp://host/stream\r\n";
        assert_eq!(parse_m3u(data), vec!["http://host/stream"]);
    }

    #[test]
    fn test_parse_m3u_skips_invalid_utf8_lines() {
        let data = b"http://host/ok\n\xff\xfe\xfd\nhttp://host/also-ok\n";
        assert_eq!(
            parse_m3u(data),
            vec!["http://host/ok", "http://host/also-ok"]
        );
    }

    #[test]
    fn test_parse_pls_filters_advertisements() {
        let data = b"[playlist]\nNumberOfEntries=2\nFile1=a\nLength1=-1\nFile2=b\nLength2=180\n";
        assert_eq!(parse_pls(data), vec!["a"]);
    }

    #[test]
    fn test_parse_pls_keeps_entries_without_length() {
        let data = b"[Playlist]\nnumberofentries=2\nFile1=http://host/1\nFile2=http://host/2\n";
        assert_eq!(parse_pls(data), vec!["http://host/1", "http://host/2"]);
    }

    #[test]
    fn test_parse_pls_strips_quotes() {
        let data = b"[playlist]\nNumberOfEntries=1\nFile1=\"http://host/x\"\nLength1=-1\n";
        assert_eq!(parse_pls(data), vec!["http://host/x"]);
    }

    #[test]
    fn test_parse_pls_malformed() {
        assert!(parse_pls(b"not a playlist at all").is_empty());
        assert!(parse_pls(b"[playlist]\nNumberOfEntries=junk\n").is_empty());
    }

    #[test]
    fn test_parse_asx_entry_ref() {
        let data = br#"<ASX version="3.0">
  <TITLE>Example</TITLE>
  <ENTRY>
    <TITLE>Sample Title</TITLE>
    <REF href="file:///tmp/foo" />
  </ENTRY>
  <ENTRY>
    <REF href="file:///tmp/bar" />
  </ENTRY>
</ASX>
"#;
        assert_eq!(parse_asx(data), vec!["file:///tmp/foo", "file:///tmp/bar"]);
    }

    #[test]
    fn test_parse_asx_entry_href() {
        let data = br#"<ASX version="3.0">
  <ENTRY href="file:///tmp/foo" />
  <ENTRY href="file:///tmp/bar" />
</ASX>
"#;
        assert_eq!(parse_asx(data), vec!["file:///tmp/foo", "file:///tmp/bar"]);
    }

    #[test]
    fn test_parse_asx_legacy_ini() {
        let data = b"[Reference]\nRef1=file:///tmp/foo\nRef2=file:///tmp/bar\n";
        assert_eq!(parse_asx(data), vec!["file:///tmp/foo", "file:///tmp/bar"]);
    }

    #[test]
    fn test_parse_asx_asf_rewrite() {
        let data = b"[Reference]\nRef1=http://tmp.com/foo-mbr?MSWMExt=.asf\nRef2=mms://tmp.com:80/bar-mbr?mswmext=.asf\nRef3=http://tmp.com/baz\n";
        assert_eq!(
            parse_asx(data),
            vec![
                "mms://tmp.com/foo-mbr?mswmext=.asf",
                "mms://tmp.com:80/bar-mbr?mswmext=.asf",
                "http://tmp.com/baz",
            ]
        );
    }

    #[test]
    fn test_parse_asx_malformed_xml() {
        let data = b"<asx><entry><ref href=\"http://host/a\"/></entry><entry><unclosed";
        assert_eq!(parse_asx(data), vec!["http://host/a"]);
    }

    #[test]
    fn test_find_parser_extension_priority() {
        // Extension wins even when the content type says otherwise.
        assert_eq!(
            find_parser(Some(".pls"), Some("application/x-mpegurl")),
            Some(PlaylistFormat::Pls)
        );
        assert_eq!(find_parser(Some(".m3u"), None), Some(PlaylistFormat::M3u));
        assert_eq!(find_parser(Some(".asx"), None), Some(PlaylistFormat::Asx));
        assert_eq!(find_parser(Some(".wax"), None), Some(PlaylistFormat::Asx));
    }

    #[test]
    fn test_find_parser_content_type_fallback() {
        assert_eq!(
            find_parser(Some(".php"), Some("application/x-mpegurl")),
            Some(PlaylistFormat::M3u)
        );
        assert_eq!(
            find_parser(None, Some("Video/X-MS-ASF")),
            Some(PlaylistFormat::Asx)
        );
        assert_eq!(
            find_parser(None, Some("audio/x-scpls")),
            Some(PlaylistFormat::Pls)
        );
    }

    #[test]
    fn test_find_parser_no_match() {
        assert_eq!(find_parser(None, None), None);
        assert_eq!(find_parser(Some(".mp3"), Some("audio/mpeg")), None);
    }

    #[test]
    fn test_uri_extension() {
        assert_eq!(
            uri_extension("http://host/listen.pls?id=42").as_deref(),
            Some(".pls")
        );
        assert_eq!(
            uri_extension("http://host/dir/playlist.M3U").as_deref(),
            Some(".m3u")
        );
        assert_eq!(uri_extension("http://host/stream"), None);
    }
}
