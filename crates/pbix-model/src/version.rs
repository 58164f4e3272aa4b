//! Package format generation gate.

use std::fmt;

/// Major format generation of a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u32);

impl Generation {
    /// The only generation this workspace converts.
    pub const V3: Generation = Generation(3);

    pub const fn new(major: u32) -> Self {
        Self(major)
    }

    pub const fn major(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V{}", self.0)
    }
}

/// The text of a package's `Version` part, kept verbatim so it can be
/// written back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionMarker(String);

impl VersionMarker {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses `major[.minor...]`, with an optional leading `V`.
    pub fn generation(&self) -> Option<Generation> {
        let trimmed = self.0.trim();
        let unprefixed = trimmed
            .strip_prefix('V')
            .or_else(|| trimmed.strip_prefix('v'))
            .unwrap_or(trimmed);
        let major = unprefixed.split('.').next()?;
        if major.is_empty() || !major.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        major.parse().ok().map(Generation)
    }

    pub fn is_supported(&self) -> bool {
        self.generation() == Some(Generation::V3)
    }
}

impl fmt::Display for VersionMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
