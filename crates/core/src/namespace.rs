//! [`NamespacePath`] — dotted identifier for a host-defined context.
//!
//! A namespace mirrors a filesystem location under the source root:
//! `user.apps.terminal` names `apps/terminal.decl` (list mode), while
//! `user.apps.terminal.cmd` names `apps/terminal.cmd` (command mode, the
//! native extension kept as the final dotted component).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PathError;

/// First segment required of every addressable namespace.
pub const ROOT_TOKEN: &str = "user";

/// Extension of list-mode source files (the generic source extension).
pub const LIST_SOURCE_EXT: &str = "decl";

/// Extension of command-mode source files, kept verbatim in the namespace.
pub const COMMAND_SOURCE_EXT: &str = "cmd";

/// Dot-separated identifier for a host-defined context.
///
/// Invariant: every segment is a non-empty identifier and the first segment
/// is [`ROOT_TOKEN`]. Construction goes through [`FromStr`], so a held value
/// is always well-formed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NamespacePath(String);

impl NamespacePath {
    /// The dotted segments, root token first.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// Segments after the root token (the filesystem-relative part).
    pub fn relative_segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.').skip(1)
    }

    /// Whether this namespace addresses a command-mode context.
    pub fn is_command(&self) -> bool {
        self.0.ends_with(&format!(".{}", COMMAND_SOURCE_EXT))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn valid_segment(seg: &str) -> bool {
    !seg.is_empty()
        && seg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl FromStr for NamespacePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut segments = s.split('.');
        if segments.next() != Some(ROOT_TOKEN) {
            return Err(PathError::OutsideRoot(s.to_string()));
        }
        let mut rest = 0usize;
        for seg in segments {
            if !valid_segment(seg) {
                return Err(PathError::OutsideRoot(s.to_string()));
            }
            rest += 1;
        }
        if rest == 0 {
            // the bare root token addresses nothing
            return Err(PathError::OutsideRoot(s.to_string()));
        }
        Ok(NamespacePath(s.to_string()))
    }
}

impl TryFrom<String> for NamespacePath {
    type Error = PathError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<NamespacePath> for String {
    fn from(ns: NamespacePath) -> String {
        ns.0
    }
}

impl fmt::Display for NamespacePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_list_namespace() {
        let ns: NamespacePath = "user.apps.terminal".parse().unwrap();
        assert_eq!(ns.segments().collect::<Vec<_>>(), vec!["user", "apps", "terminal"]);
        assert!(!ns.is_command());
    }

    #[test]
    fn parses_command_namespace() {
        let ns: NamespacePath = "user.apps.terminal.cmd".parse().unwrap();
        assert!(ns.is_command());
        assert_eq!(ns.relative_segments().collect::<Vec<_>>(), vec!["apps", "terminal", "cmd"]);
    }

    #[test]
    fn rejects_foreign_root() {
        let err = "system.apps.terminal".parse::<NamespacePath>().unwrap_err();
        assert!(matches!(err, PathError::OutsideRoot(_)));
    }

    #[test]
    fn rejects_bare_root_and_empty_segments() {
        assert!("user".parse::<NamespacePath>().is_err());
        assert!("user..terminal".parse::<NamespacePath>().is_err());
        assert!("user.apps.".parse::<NamespacePath>().is_err());
    }

    #[test]
    fn rejects_segment_with_separator_chars() {
        assert!("user.apps/terminal".parse::<NamespacePath>().is_err());
    }

    #[test]
    fn display_round_trips() {
        let ns: NamespacePath = "user.apps.terminal".parse().unwrap();
        assert_eq!(ns.to_string(), "user.apps.terminal");
    }
}
