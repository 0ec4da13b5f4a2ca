//! Config path syntax
//!
//! A path is a `/`-separated list of segments:
//!
//! ```text
//! /NodeList/[0-3|7]/$evsim::Ipv4/Rx
//! /Names/server/eth*/Mtu
//! ```
//!
//! A segment is a type cast (`$TypeName`), a name pattern (`*` globbing
//! and `a|b` alternatives) or, right after a container attribute, an index
//! selector (`3`, `*`, `[0-3|7]`).

use evsim_core::{KernelError, KernelResult};

fn malformed(path: &str) -> KernelError {
    KernelError::MalformedValue {
        expected: "config path".into(),
        value: path.into(),
    }
}

/// Segments of an absolute path
pub fn split_path(path: &str) -> KernelResult<Vec<String>> {
    let rest = path.strip_prefix('/').ok_or_else(|| malformed(path))?;
    let rest = rest.strip_suffix('/').unwrap_or(rest);
    if rest.is_empty() {
        return Err(malformed(path));
    }
    let segments: Vec<String> = rest.split('/').map(str::to_string).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(malformed(path));
    }
    Ok(segments)
}

/// Split `path` into the path of the objects and the attribute or trace
/// source name at its end
pub fn split_leaf(path: &str) -> KernelResult<(String, String)> {
    let mut segments = split_path(path)?;
    let leaf = segments.pop().ok_or_else(|| malformed(path))?;
    if segments.is_empty() {
        return Err(malformed(path));
    }
    Ok((format!("/{}", segments.join("/")), leaf))
}

/// Type name of a `$TypeName` segment
pub fn type_cast(segment: &str) -> Option<&str> {
    segment.strip_prefix('$').filter(|name| !name.is_empty())
}

/// Whether `name` is selected by a name pattern
pub fn name_matches(pattern: &str, name: &str) -> bool {
    pattern.split('|').any(|alt| glob_match(alt.as_bytes(), name.as_bytes()))
}

fn glob_match(pattern: &[u8], name: &[u8]) -> bool {
    let (mut p, mut n) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while n < name.len() {
        if p < pattern.len() && pattern[p] == b'*' {
            backtrack = Some((p, n));
            p += 1;
        } else if p < pattern.len() && pattern[p] == name[n] {
            p += 1;
            n += 1;
        } else if let Some((star, matched)) = backtrack {
            p = star + 1;
            n = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|&c| c == b'*')
}

/// Selector of container indices
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexMatcher {
    any: bool,
    ranges: Vec<(u32, u32)>,
}

impl IndexMatcher {
    /// Parse `*`, `n`, `a|b` or `[a-b|c]`; `None` if the segment is not an
    /// index selector
    pub fn parse(segment: &str) -> Option<Self> {
        if segment == "*" {
            return Some(Self {
                any: true,
                ranges: Vec::new(),
            });
        }
        let body = segment
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .unwrap_or(segment);
        let mut ranges = Vec::new();
        for part in body.split('|') {
            let range = match part.split_once('-') {
                Some((lo, hi)) => (lo.trim().parse().ok()?, hi.trim().parse().ok()?),
                None => {
                    let single = part.trim().parse().ok()?;
                    (single, single)
                }
            };
            if range.0 > range.1 {
                return None;
            }
            ranges.push(range);
        }
        Some(Self { any: false, ranges })
    }

    pub fn matches(&self, index: u32) -> bool {
        self.any || self.ranges.iter().any(|&(lo, hi)| lo <= index && index <= hi)
    }
}
