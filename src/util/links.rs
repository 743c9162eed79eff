//! Link canonicalization shared by the normalizer and the dedup link stage.

use url::Url;

use super::text::title_case;

/// Query keys dropped during normalization (compared case-insensitively).
pub const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "ref",
    "source",
    "mc_cid",
    "mc_eid",
    "ocid",
];

const SUBDOMAIN_PREFIXES: &[&str] = &["www.", "feeds.", "rss.", "feed."];

fn is_tracking_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key.as_str())
}

/// Canonicalizes an article link.
///
/// Scheme and host are lowercased, a trailing `/` is removed from the path
/// (the root path stays `/`), tracking parameters and blank-valued pairs are
/// dropped from the query and the fragment is removed. Input that does not
/// parse as an absolute URL is returned trimmed and otherwise untouched.
/// Applying the function to its own output yields the same string.
#[must_use]
pub fn normalize_link(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let Ok(mut url) = Url::parse(trimmed) else {
        return trimmed.to_string();
    };

    url.set_fragment(None);

    if !url.cannot_be_a_base() {
        let path = url.path().trim_end_matches('/').to_string();
        if path.is_empty() {
            url.set_path("/");
        } else {
            url.set_path(&path);
        }
    }

    if url.query().is_some() {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, value)| !value.is_empty() && !is_tracking_key(key))
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
    }

    url.to_string()
}

/// Derives a readable outlet name from a feed URL's host.
///
/// `https://feeds.bbci.co.uk/news/rss.xml` becomes `Bbci`.
#[must_use]
pub fn source_name_from_feed_url(feed_url: &str) -> Option<String> {
    let url = Url::parse(feed_url.trim()).ok()?;
    let mut host = url.host_str()?.to_ascii_lowercase();
    while let Some(prefix) = SUBDOMAIN_PREFIXES.iter().find(|p| host.starts_with(*p)) {
        host = host[prefix.len()..].to_string();
    }
    let label = host.split('.').next().filter(|label| !label.is_empty())?;
    Some(title_case(label))
}
