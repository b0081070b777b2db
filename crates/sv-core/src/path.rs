use std::fmt;

use crate::error::{ErrorKind, VarError};

/// Dot-separated address into a variable; the first segment names the variable itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VarPath {
    segments: Vec<String>,
}

impl VarPath {
    pub fn parse(raw: &str) -> Result<Self, VarError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(VarError::new(ErrorKind::MalformedPath, "Path is empty."));
        }
        let segments = trimmed
            .split('.')
            .map(str::trim)
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        if segments.iter().any(String::is_empty) {
            return Err(VarError::new(
                ErrorKind::MalformedPath,
                format!("Path \"{}\" contains an empty segment.", trimmed),
            ));
        }
        Ok(Self { segments })
    }

    pub fn root(&self) -> &str {
        &self.segments[0]
    }

    /// Segments below the root variable.
    pub fn rest(&self) -> &[String] {
        &self.segments[1..]
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root_only(&self) -> bool {
        self.segments.len() == 1
    }
}

impl fmt::Display for VarPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

/// Array index named by a segment, when it is a plain non-negative integer.
pub fn segment_index(segment: &str) -> Option<usize> {
    if segment.is_empty() || !segment.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}
