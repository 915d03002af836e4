//! Path resolution for namespace paths.
//!
//! Turns user-supplied strings into canonical absolute paths: `/` separated,
//! no empty segments, segments normalized to NFC.

use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::fmt;
use unicode_normalization::UnicodeNormalization;

pub const SEPARATOR: char = '/';

/// Canonical absolute path inside a namespace. The root has zero segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AbsolutePath {
    segments: Vec<String>,
}

impl AbsolutePath {
    pub fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Parse a path string. Leading and trailing separators are ignored, so
    /// `"docs/2024/"` and `"/docs/2024"` resolve to the same path and `""`
    /// resolves to the root.
    pub fn parse(input: &str) -> Result<Self, ApiError> {
        let trimmed = input.trim_matches(SEPARATOR);
        if trimmed.contains("//") {
            return Err(ApiError::InvalidPath(format!(
                "repeating slashes not allowed: '{}'",
                input
            )));
        }
        if trimmed.is_empty() {
            return Ok(Self::root());
        }

        let segments = trimmed
            .split(SEPARATOR)
            .map(normalize_segment)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { segments })
    }

    pub fn from_segments<I, S>(segments: I) -> Result<Self, ApiError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let segments = segments
            .into_iter()
            .map(|s| normalize_segment(s.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { segments })
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Final segment, `None` for the root.
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Path of the containing directory, `None` for the root.
    pub fn parent(&self) -> Option<AbsolutePath> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    pub(crate) fn child(&self, segment: &str) -> AbsolutePath {
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Self { segments }
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }
}

impl fmt::Display for AbsolutePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

fn normalize_segment(segment: &str) -> Result<String, ApiError> {
    if segment.is_empty() {
        return Err(ApiError::InvalidPath("empty path segment".to_string()));
    }
    if segment.contains('\u{0000}') {
        return Err(ApiError::InvalidPath(
            "path segments cannot contain NUL characters".to_string(),
        ));
    }
    if segment == "." || segment == ".." {
        return Err(ApiError::InvalidPath(format!(
            "'{}' is not allowed as a path segment",
            segment
        )));
    }
    Ok(segment.nfc().collect())
}

/// Resolve `path` against the working directory `cwd`.
///
/// Absolute inputs (leading `/`) ignore `cwd`. Relative inputs are appended to
/// `cwd`, with `.` skipped and `..` popping one segment (never above the root).
pub fn resolve_relative(path: &str, cwd: &str) -> Result<AbsolutePath, ApiError> {
    if path.starts_with(SEPARATOR) {
        return AbsolutePath::parse(path);
    }

    let trimmed = path.trim_matches(SEPARATOR);
    if trimmed.contains("//") {
        return Err(ApiError::InvalidPath(format!(
            "repeating slashes not allowed: '{}'",
            path
        )));
    }

    let mut segments = AbsolutePath::parse(cwd)?.segments;
    for segment in trimmed.split(SEPARATOR) {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            other => segments.push(normalize_segment(other)?),
        }
    }
    Ok(AbsolutePath { segments })
}
