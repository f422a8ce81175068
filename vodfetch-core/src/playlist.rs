use regex::Regex;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::download::{FetchError, Segment, SegmentFetcher};

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no variant stream reference found in master playlist {url}")]
    NoVariantFound { url: String },
    #[error("no segment entries found in playlist {url}")]
    NoSegmentsFound { url: String },
    #[error("invalid playlist url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("failed to fetch playlist: {0}")]
    Fetch(#[from] FetchError),
}

pub type ResolveResult<T> = std::result::Result<T, ResolveError>;

/// Resolves master/variant indirection and enumerates segment URLs in the
/// order the playlist lists them; that order is the assembly order.
#[derive(Clone)]
pub struct PlaylistResolver {
    fetcher: SegmentFetcher,
}

impl PlaylistResolver {
    pub fn new(fetcher: SegmentFetcher) -> Self {
        Self { fetcher }
    }

    pub async fn resolve(&self, master_url: &str) -> ResolveResult<Vec<Segment>> {
        let master_body = self.fetcher.fetch_text(master_url).await?;
        let (playlist_url, body) = if is_master_playlist(&master_body) {
            let reference =
                first_variant_reference(&master_body).ok_or_else(|| ResolveError::NoVariantFound {
                    url: master_url.to_string(),
                })?;
            let variant_url = resolve_reference(master_url, &reference)?;
            debug!(master = master_url, variant = %variant_url, "following variant playlist");
            let body = self.fetcher.fetch_text(&variant_url).await?;
            (variant_url, body)
        } else {
            (master_url.to_string(), master_body)
        };

        let segments = parse_segments(&playlist_url, &body)?;
        if segments.is_empty() {
            return Err(ResolveError::NoSegmentsFound { url: playlist_url });
        }
        Ok(segments)
    }
}

fn is_master_playlist(body: &str) -> bool {
    body.lines().any(|line| {
        let line = line.trim();
        line.starts_with("#EXT-X-STREAM-INF") || (!line.starts_with('#') && is_playlist_ref(line))
    })
}

fn first_variant_reference(body: &str) -> Option<String> {
    body.lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#') && is_playlist_ref(line))
        .map(str::to_string)
}

fn is_playlist_ref(line: &str) -> bool {
    strip_query(line).to_ascii_lowercase().ends_with(".m3u8")
}

fn parse_segments(playlist_url: &str, body: &str) -> ResolveResult<Vec<Segment>> {
    // Extension set matches what the sources actually serve; segments are
    // routinely disguised as images or text.
    let segment_ref =
        Regex::new(r"\.(ts|m4s|mp4|html|png|jpg|webp|txt)$").map_err(|err| {
            ResolveError::InvalidUrl {
                url: playlist_url.to_string(),
                reason: err.to_string(),
            }
        })?;
    let mut segments = Vec::new();
    for line in body.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if !segment_ref.is_match(&strip_query(line).to_ascii_lowercase()) {
            continue;
        }
        let url = resolve_reference(playlist_url, line)?;
        segments.push(Segment {
            index: segments.len(),
            url,
        });
    }
    Ok(segments)
}

fn strip_query(line: &str) -> &str {
    line.split(['?', '#']).next().unwrap_or(line)
}

fn resolve_reference(base: &str, reference: &str) -> ResolveResult<String> {
    if let Ok(parsed) = Url::parse(reference) {
        if matches!(parsed.scheme(), "http" | "https" | "file") {
            return Ok(reference.to_string());
        }
    }
    let base = Url::parse(base).map_err(|err| ResolveError::InvalidUrl {
        url: base.to_string(),
        reason: err.to_string(),
    })?;
    let joined = base.join(reference).map_err(|err| ResolveError::InvalidUrl {
        url: reference.to_string(),
        reason: err.to_string(),
    })?;
    Ok(joined.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn master_playlist_detection() {
        let master = "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=800000\nv.m3u8\n";
        assert!(is_master_playlist(master));
        let media = "#EXTM3U\n#EXTINF:4.0,\nseg_0.ts\n#EXT-X-ENDLIST\n";
        assert!(!is_master_playlist(media));
    }

    #[test]
    fn variant_reference_resolves_against_master() {
        let master = "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=800000\nstreams/v.m3u8\n";
        let reference = first_variant_reference(master).unwrap();
        let resolved = resolve_reference("https://h/live/master.m3u8", &reference).unwrap();
        assert_eq!(resolved, "https://h/live/streams/v.m3u8");
    }

    #[test]
    fn segments_preserve_textual_order() {
        let body = "#EXTM3U\n#EXTINF:4,\n2.ts\n#EXTINF:4,\n0.ts\n#EXTINF:4,\n1.ts\n";
        let segments = parse_segments("https://h/v.m3u8", body).unwrap();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].url, "https://h/2.ts");
        assert_eq!(segments[1].url, "https://h/0.ts");
        assert_eq!(segments[2].url, "https://h/1.ts");
        assert_eq!(
            segments.iter().map(|s| s.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn disguised_and_tokenized_segments_match() {
        let body = "#EXTM3U\nseg_0.png\nhttps://cdn.h/seg_1.ts?token=abc\nreadme.pdf\n";
        let segments = parse_segments("https://h/v.m3u8", body).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].url, "https://h/seg_0.png");
        assert_eq!(segments[1].url, "https://cdn.h/seg_1.ts?token=abc");
    }

    #[test]
    fn absolute_segment_urls_pass_through() {
        let body = "#EXTM3U\nhttps://other.h/a.ts\n";
        let segments = parse_segments("https://h/v.m3u8", body).unwrap();
        assert_eq!(segments[0].url, "https://other.h/a.ts");
    }
}
