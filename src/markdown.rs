use htmd::options::{BulletListMarker, HeadingStyle, Options};
use htmd::HtmlToMarkdown;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum OptionError {
    #[error("unknown markdown option '{0}' (expected heading_style, bullets or strip)")]
    UnknownKey(String),
    #[error("invalid value '{value}' for markdown option '{key}'")]
    InvalidValue { key: String, value: String },
    #[error("markdown option must look like key=value, got '{0}'")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Heading {
    Atx,
    Setext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bullet {
    Asterisk,
    Dash,
}

/// Settings for the HTML → markdown step.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkdownOptions {
    pub heading_style: Heading,
    pub bullets: Bullet,
    /// Tags dropped together with their contents.
    pub strip: Vec<String>,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            heading_style: Heading::Atx,
            bullets: Bullet::Asterisk,
            strip: vec!["script".into(), "style".into()],
        }
    }
}

impl MarkdownOptions {
    /// Defaults with each `key=value` override applied in order.
    pub fn with_overrides<S: AsRef<str>>(overrides: &[S]) -> Result<Self, OptionError> {
        let mut opts = Self::default();
        for raw in overrides {
            let raw = raw.as_ref();
            let (key, value) = raw
                .split_once('=')
                .ok_or_else(|| OptionError::Malformed(raw.to_string()))?;
            opts.apply_override(key.trim(), value.trim())?;
        }
        Ok(opts)
    }

    pub fn apply_override(&mut self, key: &str, value: &str) -> Result<(), OptionError> {
        let invalid = || OptionError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        match key {
            "heading_style" => {
                self.heading_style = match value.to_ascii_lowercase().as_str() {
                    "atx" => Heading::Atx,
                    "setext" | "setex" | "underlined" => Heading::Setext,
                    _ => return Err(invalid()),
                }
            }
            "bullets" => {
                self.bullets = match value {
                    "*" => Bullet::Asterisk,
                    "-" => Bullet::Dash,
                    _ => return Err(invalid()),
                }
            }
            "strip" => {
                self.strip = value
                    .split(',')
                    .map(|t| t.trim().to_ascii_lowercase())
                    .filter(|t| !t.is_empty())
                    .collect();
            }
            other => return Err(OptionError::UnknownKey(other.to_string())),
        }
        Ok(())
    }

    fn converter(&self) -> HtmlToMarkdown {
        let options = Options {
            heading_style: match self.heading_style {
                Heading::Atx => HeadingStyle::Atx,
                Heading::Setext => HeadingStyle::Setex,
            },
            bullet_list_marker: match self.bullets {
                Bullet::Asterisk => BulletListMarker::Asterisk,
                Bullet::Dash => BulletListMarker::Dash,
            },
            ..Default::default()
        };
        HtmlToMarkdown::builder()
            .skip_tags(self.strip.iter().map(String::as_str).collect())
            .options(options)
            .build()
    }
}

/// Convert an HTML page to markdown.
pub fn to_markdown(html: &str, options: &MarkdownOptions) -> std::io::Result<String> {
    options.converter().convert(html)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let opts = MarkdownOptions::default();
        assert_eq!(opts.heading_style, Heading::Atx);
        assert_eq!(opts.bullets, Bullet::Asterisk);
        assert_eq!(opts.strip, ["script", "style"]);
    }

    #[test]
    fn overrides_replace_by_key() {
        let opts = MarkdownOptions::with_overrides(&["bullets=-", "strip=nav, footer"]).unwrap();
        assert_eq!(opts.heading_style, Heading::Atx);
        assert_eq!(opts.bullets, Bullet::Dash);
        assert_eq!(opts.strip, ["nav", "footer"]);
    }

    #[test]
    fn bad_overrides() {
        assert_eq!(
            MarkdownOptions::with_overrides(&["wrap=true"]),
            Err(OptionError::UnknownKey("wrap".into()))
        );
        assert!(matches!(
            MarkdownOptions::with_overrides(&["bullets=+"]),
            Err(OptionError::InvalidValue { .. })
        ));
        assert!(matches!(
            MarkdownOptions::with_overrides(&["bullets"]),
            Err(OptionError::Malformed(_))
        ));
    }

    #[test]
    fn atx_heading_and_stripped_script() {
        let html = "<html><head><style>p { color: red }</style></head><body>\
                    <h1>Hello World</h1><script>var x = 1;</script><p>Body</p></body></html>";
        let md = to_markdown(html, &MarkdownOptions::default()).unwrap();
        assert!(md.lines().any(|l| l.trim() == "# Hello World"));
        assert!(md.contains("Body"));
        assert!(!md.contains("var x"));
        assert!(!md.contains("color: red"));
    }

    #[test]
    fn asterisk_bullets() {
        let md = to_markdown("<ul><li>one</li><li>two</li></ul>", &MarkdownOptions::default()).unwrap();
        assert!(md.lines().any(|l| l.trim_start().starts_with('*')));
        assert!(!md.contains("- one"));
    }
}
