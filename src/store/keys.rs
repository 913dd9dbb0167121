//! Document identity
//!
//! Annotations are stored per logical page, not per raw URL: the same
//! article reached through a tracking link or an in-page anchor must share
//! one record.

use url::Url;

/// Maps a page URL to its storage namespace
pub trait DocumentKeyer: Send + Sync {
    fn normalize(&self, url: &str) -> String;

    /// Raw keys to try in the legacy namespace before a full scan, most
    /// specific first
    fn legacy_variants(&self, url: &str) -> Vec<String> {
        vec![url.to_string()]
    }
}

/// URL based keyer
///
/// Parses with the WHATWG rules, so scheme and host case, the default port
/// and an empty path all collapse. The fragment and `utm_*` query
/// parameters are dropped and a trailing slash is trimmed from non-root
/// paths. Strings that are not absolute URLs only lose their fragment.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlKeyer;

fn strip_fragment(url: &str) -> &str {
    url.split_once('#').map_or(url, |(head, _)| head)
}

fn is_tracking_param(name: &str) -> bool {
    name.to_ascii_lowercase().starts_with("utm_")
}

fn normalize_parsed(mut url: Url) -> String {
    url.set_fragment(None);

    if !url.cannot_be_a_base() {
        let path = url.path();
        if path.len() > 1 && path.ends_with('/') {
            let trimmed = path.trim_end_matches('/').to_string();
            url.set_path(&trimmed);
        }
    }

    if url.query_pairs().any(|(name, _)| is_tracking_param(&name)) {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(name, _)| !is_tracking_param(name))
            .map(|(name, value)| (name.into_owned(), value.into_owned()))
            .collect();
        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
    } else if url.query() == Some("") {
        url.set_query(None);
    }

    url.to_string()
}

impl DocumentKeyer for UrlKeyer {
    fn normalize(&self, url: &str) -> String {
        let url = url.trim();
        match Url::parse(url) {
            Ok(parsed) => normalize_parsed(parsed),
            Err(_) => strip_fragment(url).to_string(),
        }
    }

    fn legacy_variants(&self, url: &str) -> Vec<String> {
        let exact = url.to_string();
        let no_fragment = strip_fragment(url).to_string();
        let no_query = no_fragment
            .split_once('?')
            .map_or(no_fragment.as_str(), |(head, _)| head)
            .to_string();
        let toggled = match no_query.strip_suffix('/') {
            Some(trimmed) => trimmed.to_string(),
            None => format!("{}/", no_query),
        };
        let decoded = urlencoding::decode(url)
            .map(|decoded| decoded.into_owned())
            .unwrap_or_else(|_| exact.clone());

        let mut variants: Vec<String> = Vec::new();
        for candidate in [exact, no_fragment, no_query, toggled, decoded] {
            if !variants.contains(&candidate) {
                variants.push(candidate);
            }
        }
        variants
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url() {
        let keyer = UrlKeyer;
        assert_eq!(
            keyer.normalize("HTTPS://Example.COM/Articles/One/?utm_source=x&id=7#section-2"),
            "https://example.com/Articles/One?id=7"
        );
        assert_eq!(keyer.normalize("https://example.com/"), "https://example.com/");
        assert_eq!(
            keyer.normalize("https://example.com/a?utm_medium=mail"),
            "https://example.com/a"
        );
        assert_eq!(keyer.normalize("file.xhtml#top"), "file.xhtml");
    }

    #[test]
    fn test_equivalent_urls_share_a_key() {
        let keyer = UrlKeyer;
        assert_eq!(keyer.normalize("https://example.com"), keyer.normalize("https://example.com/"));
        assert_eq!(
            keyer.normalize("https://example.com:443/a"),
            keyer.normalize("https://example.com/a")
        );
        assert_eq!(
            keyer.normalize("http://example.com:80/a?"),
            "http://example.com/a"
        );
        assert_eq!(
            keyer.normalize("https://example.com:8443/a"),
            "https://example.com:8443/a"
        );
        assert_eq!(
            keyer.normalize("https://example.com/a?UTM_Source=x&page=2&utm_term=y"),
            "https://example.com/a?page=2"
        );
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let keyer = UrlKeyer;
        let once = keyer.normalize("http://A.example/x/?b=2&utm_campaign=z");
        assert_eq!(keyer.normalize(&once), once);
    }

    #[test]
    fn test_legacy_variants() {
        let variants = UrlKeyer.legacy_variants("https://example.com/a%20b/?q=1#frag");
        assert_eq!(
            variants,
            vec![
                "https://example.com/a%20b/?q=1#frag",
                "https://example.com/a%20b/?q=1",
                "https://example.com/a%20b/",
                "https://example.com/a%20b",
                "https://example.com/a b/?q=1#frag",
            ]
        );
    }

    #[test]
    fn test_legacy_variants_deduplicated() {
        let variants = UrlKeyer.legacy_variants("https://example.com/page");
        assert_eq!(
            variants,
            vec!["https://example.com/page", "https://example.com/page/"]
        );
    }
}
