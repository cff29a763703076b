//! Semantic versions as written in plugin manifests.
//!
//! Manifests carry versions as `vMAJOR.MINOR.PATCH` with optional
//! `-PRERELEASE` and `+BUILD` suffixes. Upgrades compare versions with
//! [`PluginVersion`]'s ordering: numeric on the core triple, a pre-release
//! sorts before its release, and build metadata is ignored.

use std::cmp::Ordering;
use std::fmt;

use crate::error::InstallError;

/// A parsed manifest version.
///
/// # Example
///
/// ```
/// use kubeplug_install::PluginVersion;
///
/// let old = PluginVersion::parse("v1.2.0").expect("valid version");
/// let new = PluginVersion::parse("v1.10.0").expect("valid version");
/// assert!(new > old);
/// assert_eq!(new.to_string(), "v1.10.0");
/// ```
///
/// Equality follows the ordering, so versions differing only in build
/// metadata compare equal.
#[derive(Debug, Clone)]
pub struct PluginVersion {
    major: u64,
    minor: u64,
    patch: u64,
    pre_release: Vec<Identifier>,
    build: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Identifier {
    Numeric(u64),
    Alphanumeric(String),
}

impl PluginVersion {
    /// Parses a `v`-prefixed semantic version.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::Manifest`] when the text is not a valid
    /// version.
    pub fn parse(text: &str) -> Result<Self, InstallError> {
        let invalid = |reason: &str| InstallError::Manifest {
            message: format!("invalid version '{text}': {reason}"),
        };
        let body = text
            .strip_prefix('v')
            .ok_or_else(|| invalid("must start with 'v'"))?;
        let (without_build, build) = body
            .split_once('+')
            .map_or((body, None), |(head, meta)| (head, Some(meta)));
        let (core, pre) = without_build
            .split_once('-')
            .map_or((without_build, None), |(head, tail)| (head, Some(tail)));

        let mut numbers = core.split('.');
        let major = parse_number(numbers.next()).ok_or_else(|| invalid("bad major"))?;
        let minor = parse_number(numbers.next()).ok_or_else(|| invalid("bad minor"))?;
        let patch = parse_number(numbers.next()).ok_or_else(|| invalid("bad patch"))?;
        if numbers.next().is_some() {
            return Err(invalid("too many components"));
        }

        let pre_release = pre
            .map_or(Some(Vec::new()), |tail| {
                tail.split('.').map(parse_identifier).collect::<Option<Vec<_>>>()
            })
            .ok_or_else(|| invalid("bad pre-release"))?;
        if let Some(meta) = build {
            if meta.is_empty() || meta.split('.').any(|part| !is_identifier_text(part)) {
                return Err(invalid("bad build metadata"));
            }
        }

        Ok(Self {
            major,
            minor,
            patch,
            pre_release,
            build: build.map(str::to_owned),
        })
    }

    /// Returns the major version number.
    #[must_use]
    pub const fn major(&self) -> u64 {
        self.major
    }

    /// Returns the minor version number.
    #[must_use]
    pub const fn minor(&self) -> u64 {
        self.minor
    }

    /// Returns the patch version number.
    #[must_use]
    pub const fn patch(&self) -> u64 {
        self.patch
    }

    /// Returns `true` when the version carries a pre-release tag.
    #[must_use]
    pub const fn is_pre_release(&self) -> bool {
        !self.pre_release.is_empty()
    }
}

fn parse_number(part: Option<&str>) -> Option<u64> {
    let digits = part?;
    if digits.is_empty() || !digits.chars().all(|ch| ch.is_ascii_digit()) {
        return None;
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    digits.parse().ok()
}

fn parse_identifier(part: &str) -> Option<Identifier> {
    if !is_identifier_text(part) {
        return None;
    }
    if part.chars().all(|ch| ch.is_ascii_digit()) {
        parse_number(Some(part)).map(Identifier::Numeric)
    } else {
        Some(Identifier::Alphanumeric(part.to_owned()))
    }
}

fn is_identifier_text(part: &str) -> bool {
    !part.is_empty() && part.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-')
}

impl Ord for Identifier {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Numeric(left), Self::Numeric(right)) => left.cmp(right),
            (Self::Numeric(_), Self::Alphanumeric(_)) => Ordering::Less,
            (Self::Alphanumeric(_), Self::Numeric(_)) => Ordering::Greater,
            (Self::Alphanumeric(left), Self::Alphanumeric(right)) => left.cmp(right),
        }
    }
}

impl PartialOrd for Identifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PluginVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| {
                match (self.pre_release.is_empty(), other.pre_release.is_empty()) {
                    (true, true) => Ordering::Equal,
                    (true, false) => Ordering::Greater,
                    (false, true) => Ordering::Less,
                    (false, false) => self.pre_release.cmp(&other.pre_release),
                }
            })
    }
}

impl PartialEq for PluginVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PluginVersion {}

impl PartialOrd for PluginVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(value) => write!(f, "{value}"),
            Self::Alphanumeric(value) => f.write_str(value),
        }
    }
}

impl fmt::Display for PluginVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}.{}", self.major, self.minor, self.patch)?;
        for (index, identifier) in self.pre_release.iter().enumerate() {
            let separator = if index == 0 { '-' } else { '.' };
            write!(f, "{separator}{identifier}")?;
        }
        if let Some(build) = &self.build {
            write!(f, "+{build}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
