use url::Url;

use crate::text::to_snake_case;

/// Short domain key for a URL: host without `www.` and without its last
/// dot-segment. Only one segment is removed, so `example.co.uk` gives
/// `example.co`. Unparseable input gives an empty key.
pub fn directory_from_url(url: &str) -> String {
    let host = match Url::parse(url) {
        Ok(u) => u.host_str().unwrap_or_default().to_string(),
        Err(_) => return String::new(),
    };
    let host = host.strip_prefix("www.").unwrap_or(&host);
    match host.rfind('.') {
        Some(idx) => host[..idx].to_string(),
        None => host.to_string(),
    }
}

/// File stem taken from the URL itself: the last non-empty path segment,
/// or the host for bare domains. Empty when nothing usable remains.
pub fn stem_from_url(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return String::new();
    };
    let segment = parsed
        .path_segments()
        .and_then(|mut segs| segs.rfind(|s| !s.is_empty()))
        .map(|s| s.rsplit_once('.').map_or(s, |(stem, _)| stem).to_string());
    match segment.map(|s| to_snake_case(&s)).filter(|s| !s.is_empty()) {
        Some(stem) => stem,
        None => {
            let host = parsed.host_str().unwrap_or_default();
            to_snake_case(host.strip_prefix("www.").unwrap_or(host))
        }
    }
}
