//! Decision engine
//!
//! Maps `(path, roles)` to allow or deny using the current rule table:
//!
//! | matched rule             | outcome                         |
//! |--------------------------|---------------------------------|
//! | none                     | deny                            |
//! | `deny, ...`              | deny                            |
//! | `allow, pattern`         | allow                           |
//! | `allow, pattern, role`   | allow iff the caller holds role |
//! | `allow, pattern, !host`  | whatever `host` answers         |

use crate::delegation::{DelegationClient, RequestContext};
use crate::error::DecisionError;
use crate::identity::RoleSet;
use crate::rules::{RuleAction, RuleStore, RuleTarget};
use reqwest::header::HeaderValue;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Outcome of an authorization check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allowed,
    Denied,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

impl From<bool> for Decision {
    fn from(allowed: bool) -> Self {
        if allowed {
            Decision::Allowed
        } else {
            Decision::Denied
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Allowed => f.write_str("allowed"),
            Decision::Denied => f.write_str("denied"),
        }
    }
}

/// Evaluates requests against the rule store
pub struct DecisionEngine {
    rules: Arc<RuleStore>,
    delegation: DelegationClient,
}

impl DecisionEngine {
    pub fn new(rules: Arc<RuleStore>, delegation: DelegationClient) -> Self {
        Self { rules, delegation }
    }

    pub fn rules(&self) -> &Arc<RuleStore> {
        &self.rules
    }

    /// Decide whether a caller holding `roles` may access `path`
    ///
    /// Only internal faults are errors; a delegation failure is a deny.
    pub async fn decide(
        &self,
        path: &str,
        roles: &RoleSet,
        ctx: &RequestContext,
    ) -> Result<Decision, DecisionError> {
        // Everything that goes out in X-Forwarded-Roles must be a valid header
        let header = roles.to_header_value();
        HeaderValue::from_str(&header).map_err(|e| DecisionError::RoleHeader(e.to_string()))?;

        let table = self.rules.snapshot();
        let Some(rule) = table.find_match(path) else {
            debug!(path, roles = %header, "No rule matches, denying");
            return Ok(Decision::Denied);
        };

        let decision = match (rule.action, &rule.target) {
            (RuleAction::Deny, _) => Decision::Denied,
            (RuleAction::Allow, RuleTarget::Open) => Decision::Allowed,
            (RuleAction::Allow, RuleTarget::Role(role)) => roles.contains(role).into(),
            (RuleAction::Allow, RuleTarget::Delegate(target)) => {
                self.delegation.delegate(target, path, roles, ctx).await.into()
            }
        };

        debug!(
            path,
            roles = %header,
            rule = %rule,
            line = rule.line,
            %decision,
            "Rule matched"
        );
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::parse_rules;
    use std::time::Duration;

    fn engine(rules: &str) -> DecisionEngine {
        let store = RuleStore::from_table(parse_rules(rules, None));
        let client = DelegationClient::new(Duration::from_millis(500)).unwrap();
        DecisionEngine::new(Arc::new(store), client)
    }

    async fn decide(engine: &DecisionEngine, path: &str, roles: &str) -> Decision {
        engine
            .decide(path, &RoleSet::parse(roles), &RequestContext::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_default_deny() {
        let engine = engine("");
        assert_eq!(decide(&engine, "/anything", "public,admin").await, Decision::Denied);
    }

    #[tokio::test]
    async fn test_open_and_role_rules() {
        let engine = engine("allow, /public/*\nallow, /admin/*, admin\n");

        assert_eq!(decide(&engine, "/public/x", "public").await, Decision::Allowed);
        assert_eq!(decide(&engine, "/admin/x", "public").await, Decision::Denied);
        assert_eq!(decide(&engine, "/admin/x", "public,admin").await, Decision::Allowed);
    }

    #[tokio::test]
    async fn test_deny_wins_regardless_of_roles() {
        let engine = engine("deny, /secret/*, admin\nallow, /secret/*\n");
        assert_eq!(decide(&engine, "/secret/x", "admin").await, Decision::Denied);
    }

    #[tokio::test]
    async fn test_first_match_wins() {
        let engine = engine("deny, /auth/authorize\nallow, /auth/*, public\n");

        assert_eq!(decide(&engine, "/auth/authorize", "public").await, Decision::Denied);
        assert_eq!(decide(&engine, "/auth/login", "public").await, Decision::Allowed);
    }

    #[tokio::test]
    async fn test_unreachable_delegate_denies() {
        // Port 9 (discard) on localhost is not expected to serve HTTP
        let engine = engine("allow, /photos/*, !127.0.0.1:9\n");
        assert_eq!(decide(&engine, "/photos/1", "public").await, Decision::Denied);
    }

    #[tokio::test]
    async fn test_unencodable_roles_are_internal_error() {
        let engine = engine("allow, /*\n");
        let mut roles = RoleSet::public();
        roles.insert("bad\u{7f}role");

        let result = engine
            .decide("/x", &roles, &RequestContext::default())
            .await;
        assert!(matches!(result, Err(DecisionError::RoleHeader(_))));
    }

    #[test]
    fn test_decision_from_bool() {
        assert_eq!(Decision::from(true), Decision::Allowed);
        assert!(!Decision::from(false).is_allowed());
        assert_eq!(Decision::Denied.to_string(), "denied");
    }
}
