//! Original filename handling
//!
//! Uploaded filenames come straight from the client and may carry directory
//! components (some browsers send full Windows paths), spaces or characters
//! that do not belong in an object key.

/// Stem used when nothing printable survives sanitization
pub const FALLBACK_STEM: &str = "file";

/// Longest stem kept in a key; longer stems are cut
pub const MAX_STEM_CHARS: usize = 64;

/// Sanitized pieces of an uploaded filename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameParts {
    /// Sanitized stem, never empty
    pub stem: String,
    /// Extension including the leading `.`, or empty
    pub ext: String,
}

impl FilenameParts {
    /// Split and sanitize a client-supplied filename
    pub fn from_original(original: &str) -> Self {
        let base = basename(original);
        let (raw_stem, raw_ext) = split_extension(base);

        let mut stem = sanitize_stem(raw_stem);
        if stem.is_empty() {
            stem = FALLBACK_STEM.to_string();
        }

        Self {
            stem,
            ext: sanitize_extension(raw_ext),
        }
    }

    /// Stem and extension joined back together
    pub fn file_name(&self) -> String {
        format!("{}{}", self.stem, self.ext)
    }
}

fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Split at the last `.`; a leading dot (".bashrc") is part of the stem
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 && !name[..idx].chars().all(|c| c == '.') => name.split_at(idx),
        _ => (name, ""),
    }
}

fn sanitize_stem(stem: &str) -> String {
    let mut out = String::with_capacity(stem.len());
    for c in stem.chars() {
        let mapped = if c.is_ascii_alphanumeric() || c == '-' {
            c
        } else if c == '_' || c == '.' || c.is_whitespace() {
            '_'
        } else {
            continue;
        };
        if mapped == '_' && out.ends_with('_') {
            continue;
        }
        out.push(mapped);
    }

    out.trim_matches('_').chars().take(MAX_STEM_CHARS).collect()
}

fn sanitize_extension(ext: &str) -> String {
    let body: String = ext
        .trim_start_matches('.')
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect();
    if body.is_empty() {
        String::new()
    } else {
        format!(".{body}")
    }
}
