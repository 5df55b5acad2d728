//! Rich-text captions.
//!
//! Captions are written in a small HTML subset and rendered into plain text
//! plus formatting entities. Entity offsets and lengths count UTF-16 code
//! units, which is what the remote API expects.

use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;
use tracing::warn;

/// Formatting applied to a span of caption text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Code,
    Pre,
    TextLink,
}

impl EntityKind {
    fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "b" | "strong" => Self::Bold,
            "i" | "em" => Self::Italic,
            "u" | "ins" => Self::Underline,
            "s" | "strike" | "del" => Self::Strikethrough,
            "code" => Self::Code,
            "pre" => Self::Pre,
            "a" => Self::TextLink,
            _ => return None,
        })
    }
}

/// A formatted span of caption text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEntity {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    /// Start, in UTF-16 code units.
    pub offset: usize,
    /// Length, in UTF-16 code units.
    pub length: usize,
    /// Link target of a `TextLink`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub url: Option<String>,
}

/// Rendered caption.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caption {
    pub text: String,
    pub entities: Vec<MessageEntity>,
}

impl Caption {
    /// Unformatted caption.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            entities: Vec::new(),
        }
    }
}

/// Errors from rendering caption markup.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptionError {
    #[error("Unsupported tag <{tag}>")]
    UnknownTag { tag: String },

    #[error("Tag <{tag}> is never closed")]
    Unclosed { tag: String },

    #[error("Expected </{expected}>, found </{found}>")]
    Mismatched { expected: String, found: String },

    #[error("Closing tag </{tag}> without opening tag")]
    UnexpectedClose { tag: String },

    #[error("Link tag without href")]
    MissingHref,

    #[error("Invalid character reference &{reference};")]
    BadReference { reference: String },

    #[error("Unterminated tag at byte {at}")]
    UnterminatedTag { at: usize },
}

struct OpenTag {
    seq: usize,
    name: String,
    kind: EntityKind,
    offset: usize,
    url: Option<String>,
}

/// Render HTML-subset markup into a caption.
pub fn render_html(markup: &str) -> Result<Caption, CaptionError> {
    let mut text = String::with_capacity(markup.len());
    let mut units = 0usize;
    let mut stack: Vec<OpenTag> = Vec::new();
    let mut entities: Vec<(usize, MessageEntity)> = Vec::new();
    let mut opened = 0usize;

    let mut rest = markup;
    while let Some(c) = rest.chars().next() {
        match c {
            '<' => {
                let end = rest
                    .find('>')
                    .ok_or(CaptionError::UnterminatedTag { at: markup.len() - rest.len() })?;
                let inner = rest[1..end].trim();
                rest = &rest[end + 1..];

                if let Some(name) = inner.strip_prefix('/') {
                    let name = name.trim().to_ascii_lowercase();
                    let open = stack
                        .pop()
                        .ok_or_else(|| CaptionError::UnexpectedClose { tag: name.clone() })?;
                    if open.name != name {
                        return Err(CaptionError::Mismatched {
                            expected: open.name,
                            found: name,
                        });
                    }
                    if units > open.offset {
                        entities.push((
                            open.seq,
                            MessageEntity {
                                kind: open.kind,
                                offset: open.offset,
                                length: units - open.offset,
                                url: open.url,
                            },
                        ));
                    }
                } else {
                    let (name, attrs) = match inner.find(char::is_whitespace) {
                        Some(idx) => (&inner[..idx], &inner[idx..]),
                        None => (inner, ""),
                    };
                    let name = name.to_ascii_lowercase();
                    let kind = EntityKind::from_tag(&name)
                        .ok_or_else(|| CaptionError::UnknownTag { tag: name.clone() })?;
                    let url = match kind {
                        EntityKind::TextLink => Some(href(attrs)?),
                        _ => None,
                    };
                    stack.push(OpenTag {
                        seq: opened,
                        name,
                        kind,
                        offset: units,
                        url,
                    });
                    opened += 1;
                }
            }
            '&' => {
                let end = rest.find(';').ok_or_else(|| CaptionError::BadReference {
                    reference: rest[1..].chars().take(8).collect(),
                })?;
                let decoded = decode_reference(&rest[1..end])?;
                text.push(decoded);
                units += decoded.len_utf16();
                rest = &rest[end + 1..];
            }
            _ => {
                text.push(c);
                units += c.len_utf16();
                rest = &rest[c.len_utf8()..];
            }
        }
    }

    if let Some(open) = stack.pop() {
        return Err(CaptionError::Unclosed { tag: open.name });
    }

    // Opening order puts outer entities before inner ones at the same offset
    entities.sort_by_key(|(seq, _)| *seq);
    let entities = entities.into_iter().map(|(_, entity)| entity).collect();

    Ok(Caption { text, entities })
}

fn href(attrs: &str) -> Result<String, CaptionError> {
    let start = attrs.find("href=").ok_or(CaptionError::MissingHref)?;
    let value = &attrs[start + "href=".len()..];
    let quote = value.chars().next().ok_or(CaptionError::MissingHref)?;
    if quote != '"' && quote != '\'' {
        return Err(CaptionError::MissingHref);
    }
    let end = value[1..].find(quote).ok_or(CaptionError::MissingHref)?;
    let raw = &value[1..end + 1];

    let mut url = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(idx) = rest.find('&') {
        url.push_str(&rest[..idx]);
        let end = rest[idx..]
            .find(';')
            .ok_or_else(|| CaptionError::BadReference {
                reference: rest[idx + 1..].to_string(),
            })?;
        url.push(decode_reference(&rest[idx + 1..idx + end])?);
        rest = &rest[idx + end + 1..];
    }
    url.push_str(rest);

    Ok(url)
}

fn decode_reference(reference: &str) -> Result<char, CaptionError> {
    let bad = || CaptionError::BadReference {
        reference: reference.to_string(),
    };

    match reference {
        "lt" => Ok('<'),
        "gt" => Ok('>'),
        "amp" => Ok('&'),
        "quot" => Ok('"'),
        _ => {
            let code = if let Some(hex) = reference
                .strip_prefix("#x")
                .or_else(|| reference.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).map_err(|_| bad())?
            } else if let Some(dec) = reference.strip_prefix('#') {
                dec.parse::<u32>().map_err(|_| bad())?
            } else {
                return Err(bad());
            };
            char::from_u32(code).ok_or_else(bad)
        }
    }
}

/// Escape text for inclusion in caption markup.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Fill `{name}` and `{mime}` in a caption template with escaped values.
pub fn fill_template(template: &str, name: &str, mime: &str) -> String {
    let mut out = String::with_capacity(template.len() + name.len() + mime.len());
    let mut rest = template;
    while let Some(idx) = rest.find('{') {
        out.push_str(&rest[..idx]);
        let tail = &rest[idx..];
        if let Some(after) = tail.strip_prefix("{name}") {
            out.push_str(&escape_html(name));
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{mime}") {
            out.push_str(&escape_html(mime));
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

/// Caption of a file. Falls back to the plain name when the template does not render.
pub fn file_caption(template: &str, name: &str, mime: &str) -> Caption {
    match render_html(&fill_template(template, name, mime)) {
        Ok(caption) => caption,
        Err(err) => {
            warn!(name = %name, error = %err, "Failed to render caption, using plain name");
            Caption::plain(name)
        }
    }
}
