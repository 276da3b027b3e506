use crate::error::{BoardError, Result};

const FORBIDDEN: &[char] = &['.', '#', '$', '[', ']'];

/// A location in the store, e.g. `/boards/main/notes/<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct StorePath(Vec<String>);

impl StorePath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Parse a `/`-separated path. Leading and trailing slashes are ignored.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::root());
        }

        let mut segments = Vec::new();
        for segment in trimmed.split('/') {
            validate_segment(raw, segment)?;
            segments.push(segment.to_string());
        }
        Ok(Self(segments))
    }

    pub fn child(&self, segment: &str) -> Result<Self> {
        validate_segment(segment, segment)?;
        let mut segments = self.0.clone();
        segments.push(segment.to_string());
        Ok(Self(segments))
    }

    /// Append a relative path that may span several segments (`notes/abc`).
    pub fn join(&self, relative: &str) -> Result<Self> {
        let rel = Self::parse(relative)?;
        let mut segments = self.0.clone();
        segments.extend(rel.0);
        Ok(Self(segments))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    pub fn parent(&self) -> Option<Self> {
        let (_, init) = self.0.split_last()?;
        Some(Self(init.to_vec()))
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// True when `other` is this path or lies beneath it.
    pub fn contains(&self, other: &StorePath) -> bool {
        other.0.len() >= self.0.len() && other.0[..self.0.len()] == self.0[..]
    }

    /// A write at one path is visible at the other.
    pub fn overlaps(&self, other: &StorePath) -> bool {
        self.contains(other) || other.contains(self)
    }
}

fn validate_segment(raw: &str, segment: &str) -> Result<()> {
    let reason = if segment.is_empty() {
        Some("empty segment".to_string())
    } else if segment.contains('/') {
        Some(format!("segment '{}' contains '/'", segment))
    } else if let Some(c) = segment
        .chars()
        .find(|c| FORBIDDEN.contains(c) || c.is_control())
    {
        Some(format!("segment '{}' contains forbidden character {:?}", segment, c))
    } else {
        None
    };

    match reason {
        Some(reason) => Err(BoardError::InvalidPath {
            path: raw.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

impl std::fmt::Display for StorePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}", self.0.join("/"))
    }
}

impl std::str::FromStr for StorePath {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
