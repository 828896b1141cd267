use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use anyhow::{Result, anyhow};

/// Semantic version as published in release tags (`v1.2.3`, `1.3.0-beta.2`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre: Vec<String>,
}

impl Version {
    /// Version of the running build.
    pub fn current() -> Self {
        Self::from_str(env!("CARGO_PKG_VERSION")).unwrap_or(Self {
            major: 0,
            minor: 0,
            patch: 0,
            pre: Vec::new(),
        })
    }

    pub fn is_prerelease(&self) -> bool {
        !self.pre.is_empty()
    }
}

impl FromStr for Version {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        let trimmed = raw.trim().trim_start_matches('v');
        // Build metadata does not take part in ordering.
        let trimmed = trimmed.split('+').next().unwrap_or(trimmed);
        let (core, pre) = match trimmed.split_once('-') {
            Some((core, pre)) => (core, Some(pre)),
            None => (trimmed, None),
        };

        let mut parts = core.split('.');
        let mut next = |name: &str| -> Result<u64> {
            parts
                .next()
                .ok_or_else(|| anyhow!("version '{}' is missing its {} part", raw, name))?
                .parse::<u64>()
                .map_err(|_| anyhow!("version '{}' has a non-numeric {} part", raw, name))
        };
        let major = next("major")?;
        let minor = next("minor")?;
        let patch = next("patch")?;
        if parts.next().is_some() {
            return Err(anyhow!("version '{}' has too many parts", raw));
        }

        let pre = match pre {
            Some(pre) if pre.is_empty() => return Err(anyhow!("version '{}' has an empty prerelease", raw)),
            Some(pre) => pre.split('.').map(str::to_string).collect(),
            None => Vec::new(),
        };

        Ok(Self {
            major,
            minor,
            patch,
            pre,
        })
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (self.pre.is_empty(), other.pre.is_empty()) {
                (true, true) => Ordering::Equal,
                // A release sorts after any of its prereleases.
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => compare_pre(&self.pre, &other.pre),
            })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn compare_pre(a: &[String], b: &[String]) -> Ordering {
    for (left, right) in a.iter().zip(b.iter()) {
        let ordering = match (left.parse::<u64>(), right.parse::<u64>()) {
            (Ok(l), Ok(r)) => l.cmp(&r),
            (Ok(_), Err(_)) => Ordering::Less,
            (Err(_), Ok(_)) => Ordering::Greater,
            (Err(_), Err(_)) => left.cmp(right),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    a.len().cmp(&b.len())
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if !self.pre.is_empty() {
            write!(f, "-{}", self.pre.join("."))?;
        }
        Ok(())
    }
}
