use std::sync::LazyLock;

use regex::Regex;

/// Lines inspected when looking for a title.
pub const DEFAULT_SCAN_LINES: usize = 20;

static NON_WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s-]").unwrap());
static SEPARATOR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[-\s]+").unwrap());
static DOUBLE_BRACKET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[(.*?)\]\](\(.*?\))").unwrap());

const RATE_LIMIT_MARKERS: &[&str] = &["too many requests", "rate limit"];

/// Lowercase, underscore-separated form of `s` that is safe as a file stem.
///
/// Unicode word characters survive (lowercased); punctuation is dropped and
/// runs of whitespace or hyphens become a single `_`. Input with nothing left
/// after stripping yields an empty string.
pub fn to_snake_case(s: &str) -> String {
    let stripped = NON_WORD_RE.replace_all(s, "");
    let joined = SEPARATOR_RE.replace_all(&stripped, "_");
    joined.to_lowercase().trim_matches('_').to_string()
}

/// Pick a title from the first `scan_limit` lines of markdown.
///
/// Preference order: a `# ` heading without links, then the first non-empty
/// line without brackets, then whatever the first line is.
pub fn extract_title(content: &str, scan_limit: usize) -> String {
    let lines: Vec<&str> = content.split('\n').take(scan_limit).collect();

    if let Some(heading) = lines
        .iter()
        .copied()
        .find(|l| l.starts_with("# ") && !l.contains('['))
    {
        return to_snake_case(&heading[2..]);
    }

    if let Some(line) = lines
        .iter()
        .map(|l| l.trim())
        .find(|l| !l.is_empty() && !l.contains('[') && !l.contains(']'))
    {
        return to_snake_case(line);
    }

    lines
        .first()
        .map(|l| to_snake_case(l.trim()))
        .unwrap_or_default()
}

/// Rewrite `[[text]](link)` as `[text](link)`.
pub fn unwrap_double_brackets(md: &str) -> String {
    DOUBLE_BRACKET_RE.replace_all(md, "[$1]$2").into_owned()
}

/// Whether the page looks like a throttling response rather than an article.
pub fn is_rate_limited(content: &str) -> bool {
    let lower = content.to_lowercase();
    RATE_LIMIT_MARKERS.iter().any(|m| lower.contains(m))
}
