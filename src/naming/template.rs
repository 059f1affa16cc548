//! Object key templates
//!
//! A template is plain text with `{variable}` placeholders, e.g.
//! `{year}/{month}/{day}/{originname_without_ext}-{randomkey8}{ext}`.
//! Templates are parsed once into segments and rendered per upload against a
//! [`TemplateContext`].
//!
//! Each variable is evaluated at most once per render: every occurrence of
//! `{randomkey8}` in one template receives the same value.

use chrono::{DateTime, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};

use super::filename::FilenameParts;

/// Supported template variables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateVar {
    /// 16 lowercase hex characters
    RandomKey16,
    /// 8 lowercase hex characters
    RandomKey8,
    /// First 8 hex characters of the SHA-256 of the file content
    Hash8,
    /// Unix time in seconds
    Timestamp,
    /// Unix time in nanoseconds
    TimestampNano,
    /// Sanitized stem plus extension
    OriginName,
    /// Sanitized stem
    OriginNameWithoutExt,
    /// Extension with leading `.`, or empty
    Ext,
    /// `YYYYMMDD`
    Date,
    /// `YYYYMMDDHHMMSS`
    DateTime,
    Year,
    Month,
    Day,
}

impl TemplateVar {
    pub const ALL: [TemplateVar; 13] = [
        TemplateVar::RandomKey16,
        TemplateVar::RandomKey8,
        TemplateVar::Hash8,
        TemplateVar::Timestamp,
        TemplateVar::TimestampNano,
        TemplateVar::OriginName,
        TemplateVar::OriginNameWithoutExt,
        TemplateVar::Ext,
        TemplateVar::Date,
        TemplateVar::DateTime,
        TemplateVar::Year,
        TemplateVar::Month,
        TemplateVar::Day,
    ];

    /// Placeholder name without braces
    pub fn name(self) -> &'static str {
        match self {
            TemplateVar::RandomKey16 => "randomkey16",
            TemplateVar::RandomKey8 => "randomkey8",
            TemplateVar::Hash8 => "hash8",
            TemplateVar::Timestamp => "timestamp",
            TemplateVar::TimestampNano => "timestamp_nano",
            TemplateVar::OriginName => "originname",
            TemplateVar::OriginNameWithoutExt => "originname_without_ext",
            TemplateVar::Ext => "ext",
            TemplateVar::Date => "date",
            TemplateVar::DateTime => "datetime",
            TemplateVar::Year => "year",
            TemplateVar::Month => "month",
            TemplateVar::Day => "day",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|var| var.name() == name)
    }

    fn index(self) -> usize {
        self as usize
    }

    fn evaluate(self, ctx: &TemplateContext<'_>, rng: &mut dyn RngCore) -> String {
        match self {
            TemplateVar::RandomKey16 => random_hex(rng, 8),
            TemplateVar::RandomKey8 => random_hex(rng, 4),
            TemplateVar::Hash8 => hex::encode(&Sha256::digest(ctx.content)[..4]),
            TemplateVar::Timestamp => ctx.now.timestamp().to_string(),
            TemplateVar::TimestampNano => ctx
                .now
                .timestamp_nanos_opt()
                .unwrap_or_else(|| i64::from(ctx.now.timestamp_subsec_nanos()))
                .to_string(),
            TemplateVar::OriginName => ctx.file.file_name(),
            TemplateVar::OriginNameWithoutExt => ctx.file.stem.clone(),
            TemplateVar::Ext => ctx.file.ext.clone(),
            TemplateVar::Date => ctx.now.format("%Y%m%d").to_string(),
            TemplateVar::DateTime => ctx.now.format("%Y%m%d%H%M%S").to_string(),
            TemplateVar::Year => ctx.now.format("%Y").to_string(),
            TemplateVar::Month => ctx.now.format("%m").to_string(),
            TemplateVar::Day => ctx.now.format("%d").to_string(),
        }
    }
}

fn random_hex(rng: &mut dyn RngCore, bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rng.fill_bytes(&mut buf);
    hex::encode(buf)
}

/// Per-upload inputs to a template render
#[derive(Debug, Clone)]
pub struct TemplateContext<'a> {
    /// Filename as sent by the client
    pub original: String,
    pub file: FilenameParts,
    pub now: DateTime<Utc>,
    /// Uploaded bytes, hashed for `{hash8}`
    pub content: &'a [u8],
}

impl<'a> TemplateContext<'a> {
    /// Context with no content; `{hash8}` renders the hash of zero bytes
    pub fn new(original_filename: &str, now: DateTime<Utc>) -> Self {
        Self {
            original: original_filename.to_string(),
            file: FilenameParts::from_original(original_filename),
            now,
            content: &[],
        }
    }

    pub fn with_content(mut self, content: &'a [u8]) -> Self {
        self.content = content;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Var(TemplateVar),
}

/// Parsed object key template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl KeyTemplate {
    /// Parse a template string
    ///
    /// Never fails: unrecognized `{tokens}` and unbalanced braces are kept as
    /// literal text.
    pub fn parse(source: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = source;

        while let Some(open) = rest.find('{') {
            literal.push_str(&rest[..open]);
            let after_open = &rest[open + 1..];

            let Some(close) = after_open.find('}') else {
                literal.push_str(&rest[open..]);
                rest = "";
                break;
            };

            let token = &after_open[..close];
            if token.contains('{') {
                // "{{year}}": the outer brace is text, rescan from the inner one
                literal.push('{');
                rest = after_open;
                continue;
            }
            match TemplateVar::from_name(token) {
                Some(var) => {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Var(var));
                }
                None => {
                    literal.push('{');
                    literal.push_str(token);
                    literal.push('}');
                }
            }
            rest = &after_open[close + 1..];
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self {
            source: source.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Variables referenced by this template, in order of first use
    pub fn variables(&self) -> Vec<TemplateVar> {
        let mut seen = Vec::new();
        for segment in &self.segments {
            if let Segment::Var(var) = segment {
                if !seen.contains(var) {
                    seen.push(*var);
                }
            }
        }
        seen
    }

    /// `{tokens}` that look like variables but are not recognized
    pub fn unknown_tokens(&self) -> Vec<String> {
        let mut tokens = Vec::new();
        for segment in &self.segments {
            let Segment::Literal(text) = segment else {
                continue;
            };
            let mut rest = text.as_str();
            while let Some(open) = rest.find('{') {
                let after_open = &rest[open + 1..];
                let Some(close) = after_open.find('}') else {
                    break;
                };
                tokens.push(format!("{{{}}}", &after_open[..close]));
                rest = &after_open[close + 1..];
            }
        }
        tokens
    }

    /// Render the template into a normalized object key
    ///
    /// The result never starts or ends with `/` and contains no empty path
    /// segments. If nothing is left after normalization the sanitized
    /// original filename is used.
    pub fn render(&self, ctx: &TemplateContext<'_>, rng: &mut dyn RngCore) -> String {
        let mut cache: [Option<String>; TemplateVar::ALL.len()] = Default::default();
        let mut out = String::new();

        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Var(var) => {
                    let value = cache[var.index()].get_or_insert_with(|| var.evaluate(ctx, rng));
                    out.push_str(value);
                }
            }
        }

        let key = normalize_key(&out);
        if key.is_empty() {
            let fallback = ctx.file.file_name();
            tracing::debug!(
                template = %self.source,
                original = %ctx.original,
                key = %fallback,
                "Template rendered empty, using sanitized filename"
            );
            fallback
        } else {
            key
        }
    }
}

/// Drop leading, trailing and repeated `/`
pub fn normalize_key(raw: &str) -> String {
    raw.split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}
