//! Hierarchical, wildcard-capable permission strings.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Error;

const SEGMENT_SEPARATOR: char = ':';
const WILDCARD: &str = "*";

/// A colon-delimited permission of the form `domain:action:instance`, where
/// any segment may be the wildcard `*`. Segment comparison is
/// case-insensitive; permissions are lowercased at parse time.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WildcardPermission {
    segments: Vec<String>,
}

impl WildcardPermission {
    /// Parse a permission string.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when the string is empty or any segment is
    /// blank (`user::view`).
    pub fn parse(raw: &str) -> Result<Self, Error> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::Config("permission string is empty".to_string()));
        }
        let segments: Vec<String> = trimmed
            .split(SEGMENT_SEPARATOR)
            .map(|segment| segment.trim().to_lowercase())
            .collect();
        if segments.iter().any(String::is_empty) {
            return Err(Error::Config(format!(
                "permission string {trimmed:?} has an empty segment"
            )));
        }
        Ok(Self { segments })
    }

    /// Whether this (granted) permission implies the `requested` one.
    ///
    /// The walk compares segment by segment: a granted `*` matches any
    /// requested value, and a granted permission that ends in `*` covers all
    /// deeper requested segments. A granted permission exhausted *without* a
    /// trailing wildcard does not imply the remaining requested segments, so
    /// `user:view` does not imply `user:view:123`.
    #[must_use]
    pub fn implies(&self, requested: &WildcardPermission) -> bool {
        for (index, granted) in self.segments.iter().enumerate() {
            let Some(wanted) = requested.segments.get(index) else {
                // Requested is shorter; covered only if the rest of the
                // granted permission is all wildcards.
                return self.segments[index..].iter().all(|s| s == WILDCARD);
            };
            if granted != WILDCARD && granted != wanted {
                return false;
            }
        }
        if requested.segments.len() > self.segments.len() {
            // Granted ran out first; only a trailing wildcard reaches deeper.
            return self.segments.last().is_some_and(|s| s == WILDCARD);
        }
        true
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for WildcardPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join(":"))
    }
}

impl TryFrom<String> for WildcardPermission {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<WildcardPermission> for String {
    fn from(value: WildcardPermission) -> Self {
        value.to_string()
    }
}

/// OR combinator: true as soon as one granted permission implies one of the
/// requested permissions.
#[must_use]
pub fn has_any_permission<'a, G, R>(granted: G, requested: R) -> bool
where
    G: IntoIterator<Item = &'a WildcardPermission> + Clone,
    R: IntoIterator<Item = &'a WildcardPermission>,
{
    requested.into_iter().any(|wanted| {
        granted
            .clone()
            .into_iter()
            .any(|grant| grant.implies(wanted))
    })
}

/// AND combinator: every requested permission must be implied by at least one
/// granted permission.
#[must_use]
pub fn has_all_permissions<'a, G, R>(granted: G, requested: R) -> bool
where
    G: IntoIterator<Item = &'a WildcardPermission> + Clone,
    R: IntoIterator<Item = &'a WildcardPermission>,
{
    requested.into_iter().all(|wanted| {
        granted
            .clone()
            .into_iter()
            .any(|grant| grant.implies(wanted))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perm(raw: &str) -> WildcardPermission {
        WildcardPermission::parse(raw).unwrap()
    }

    #[test]
    fn implies_is_reflexive() {
        for raw in ["user:view", "user:*", "*", "report:download:42"] {
            assert!(perm(raw).implies(&perm(raw)), "{raw} should imply itself");
        }
    }

    #[test]
    fn sole_wildcard_implies_everything() {
        let all = perm("*");
        assert!(all.implies(&perm("user:create")));
        assert!(all.implies(&perm("report")));
        assert!(all.implies(&perm("a:b:c:d")));
    }

    #[test]
    fn trailing_wildcard_covers_domain() {
        let users = perm("user:*");
        assert!(users.implies(&perm("user:create")));
        assert!(users.implies(&perm("user:delete")));
        assert!(users.implies(&perm("user:view:123")));
        assert!(!users.implies(&perm("report:view")));
        assert!(!users.implies(&perm("report:*")));
    }

    #[test]
    fn instance_level_wildcards() {
        let any_action = perm("user:*:123");
        assert!(any_action.implies(&perm("user:view:123")));
        assert!(any_action.implies(&perm("user:delete:123")));
        assert!(!any_action.implies(&perm("user:view:456")));
    }

    #[test]
    fn implication_is_not_symmetric() {
        assert!(!perm("user:view").implies(&perm("user:*")));
        assert!(perm("user:*").implies(&perm("user:view")));
    }

    #[test]
    fn exhausted_grant_without_wildcard_stops() {
        assert!(!perm("user").implies(&perm("user:view")));
        assert!(!perm("user:view").implies(&perm("user:view:123")));
    }

    #[test]
    fn shorter_request_met_by_wildcard_tail() {
        assert!(perm("user:*").implies(&perm("user")));
        assert!(!perm("user:view").implies(&perm("user")));
    }

    #[test]
    fn comparison_is_case_insensitive() {
        assert!(perm("User:View").implies(&perm("user:view")));
        assert_eq!(perm("USER:*").to_string(), "user:*");
    }

    #[test]
    fn empty_and_blank_segments_rejected() {
        assert!(WildcardPermission::parse("").is_err());
        assert!(WildcardPermission::parse("   ").is_err());
        assert!(WildcardPermission::parse("user::view").is_err());
        assert!(WildcardPermission::parse("user:").is_err());
    }

    #[test]
    fn any_combinator_short_circuits_on_first_hit() {
        let granted = [perm("report:view"), perm("user:*")];
        let wanted = [perm("user:delete"), perm("billing:view")];
        assert!(has_any_permission(granted.iter(), wanted.iter()));
        let nothing = [perm("billing:view")];
        assert!(!has_any_permission(granted.iter(), nothing.iter()));
    }

    #[test]
    fn all_combinator_requires_every_request() {
        let granted = [perm("user:*"), perm("report:view")];
        let both = [perm("user:create"), perm("report:view")];
        assert!(has_all_permissions(granted.iter(), both.iter()));
        let too_much = [perm("user:create"), perm("report:download")];
        assert!(!has_all_permissions(granted.iter(), too_much.iter()));
    }
}
