//! Permission seam: the contract the core requires from RBAC.
//!
//! The core owns the trait; real policy engines implement it elsewhere.
//! `GrantBook` is the shipped table-backed implementation used by the
//! CLI and by tests.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const WILDCARD: &str = "*";

/// One `resource -> actions` grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub resource: String,
    pub actions: Vec<String>,
}

impl PermissionGrant {
    /// Whether this grant covers `(resource, action)`. A `*` resource or
    /// `*` action short-circuits to allow.
    pub fn covers(&self, resource: &str, action: &str) -> bool {
        let resource_match = self.resource == WILDCARD || self.resource == resource;
        resource_match
            && self
                .actions
                .iter()
                .any(|granted| granted == WILDCARD || granted == action)
    }

    /// Whether this grant is fully administrative (`*:*`).
    pub fn is_wildcard(&self) -> bool {
        self.resource == WILDCARD && self.actions.iter().any(|action| action == WILDCARD)
    }
}

/// External permission check consulted by the action resolver.
pub trait PermissionEngine {
    /// Evaluate one `(actor, resource, action)` triple, optionally
    /// scoped to a location.
    fn check_permission(
        &self,
        actor_id: &str,
        resource: &str,
        action: &str,
        location_id: Option<&str>,
    ) -> bool;

    /// All grants held by `actor_id`.
    fn grants_for(&self, actor_id: &str) -> Vec<PermissionGrant>;

    /// Whether the actor holds the administrative `*:*` grant.
    fn has_wildcard(&self, actor_id: &str) -> bool {
        self.grants_for(actor_id)
            .iter()
            .any(PermissionGrant::is_wildcard)
    }
}

/// Static grant table keyed by user id.
///
/// Location scoping: a grant may be restricted to specific locations;
/// an empty location list means unscoped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrantBook {
    #[serde(default)]
    grants: BTreeMap<String, Vec<ScopedGrant>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopedGrant {
    pub resource: String,
    pub actions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<String>,
}

impl ScopedGrant {
    fn location_matches(&self, location_id: Option<&str>) -> bool {
        if self.locations.is_empty() {
            return true;
        }
        location_id.is_some_and(|id| self.locations.iter().any(|loc| loc == id))
    }
}

impl GrantBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(
        &mut self,
        actor_id: impl Into<String>,
        resource: impl Into<String>,
        actions: Vec<String>,
        locations: Vec<String>,
    ) {
        self.grants.entry(actor_id.into()).or_default().push(ScopedGrant {
            resource: resource.into(),
            actions,
            locations,
        });
    }

    /// Convenience: grant `resource:action` unscoped.
    pub fn allow(&mut self, actor_id: &str, resource: &str, action: &str) {
        self.grant(
            actor_id,
            resource,
            vec![action.to_string()],
            Vec::new(),
        );
    }

    /// Convenience: grant the administrative wildcard.
    pub fn allow_all(&mut self, actor_id: &str) {
        self.allow(actor_id, WILDCARD, WILDCARD);
    }
}

impl PermissionEngine for GrantBook {
    fn check_permission(
        &self,
        actor_id: &str,
        resource: &str,
        action: &str,
        location_id: Option<&str>,
    ) -> bool {
        let Some(scoped) = self.grants.get(actor_id) else {
            return false;
        };
        scoped.iter().any(|grant| {
            let flat = PermissionGrant {
                resource: grant.resource.clone(),
                actions: grant.actions.clone(),
            };
            // Wildcard grants ignore location scoping entirely.
            flat.is_wildcard() || (flat.covers(resource, action) && grant.location_matches(location_id))
        })
    }

    fn grants_for(&self, actor_id: &str) -> Vec<PermissionGrant> {
        self.grants
            .get(actor_id)
            .map(|scoped| {
                scoped
                    .iter()
                    .map(|grant| PermissionGrant {
                        resource: grant.resource.clone(),
                        actions: grant.actions.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_resource_or_action_short_circuits() {
        let mut book = GrantBook::new();
        book.allow_all("admin-1");
        assert!(book.check_permission("admin-1", "event_requests", "review", None));
        assert!(book.check_permission("admin-1", "anything", "whatever", Some("loc-x")));
        assert!(book.has_wildcard("admin-1"));
        assert!(!book.has_wildcard("nobody"));
    }

    #[test]
    fn location_scoped_grant_only_covers_listed_locations() {
        let mut book = GrantBook::new();
        book.grant(
            "coord-a",
            "event_requests",
            vec!["review".to_string()],
            vec!["loc-north".to_string()],
        );
        assert!(book.check_permission("coord-a", "event_requests", "review", Some("loc-north")));
        assert!(!book.check_permission("coord-a", "event_requests", "review", Some("loc-south")));
        assert!(!book.check_permission("coord-a", "event_requests", "review", None));
    }

    #[test]
    fn unscoped_grant_covers_any_location() {
        let mut book = GrantBook::new();
        book.allow("stake-1", "event_requests", "respond");
        assert!(book.check_permission("stake-1", "event_requests", "respond", Some("loc-x")));
        assert!(book.check_permission("stake-1", "event_requests", "respond", None));
        assert!(!book.check_permission("stake-1", "event_requests", "review", None));
    }

    #[test]
    fn grants_for_flattens_location_scope() {
        let mut book = GrantBook::new();
        book.grant(
            "coord-a",
            "event_requests",
            vec!["review".to_string(), "claim".to_string()],
            vec!["loc-north".to_string()],
        );
        let grants = book.grants_for("coord-a");
        assert_eq!(grants.len(), 1);
        assert!(grants[0].covers("event_requests", "claim"));
        assert!(!grants[0].is_wildcard());
    }
}
