//! The allow/deny decision for a tenant, method and path.

use http::Method;

use davgate_core::config::Permission;

use crate::tenant::Tenant;

/// Methods a `read-only` rule permits.
pub fn is_read_only_method(method: &Method) -> bool {
    matches!(method.as_str(), "GET" | "HEAD" | "PROPFIND" | "OPTIONS")
}

/// Whether `permission` lets `method` through.
pub fn permits(permission: Permission, method: &Method) -> bool {
    match permission {
        Permission::Allow => true,
        Permission::ReadOnly => is_read_only_method(method),
        Permission::Deny => false,
    }
}

/// Decide whether `tenant` may perform `method` on `path`.
///
/// `path` is relative to the configured URL prefix. A path no rule matches
/// is denied.
pub fn allowed(tenant: &Tenant, method: &Method, path: &str) -> bool {
    tenant
        .rules()
        .resolve(path)
        .is_some_and(|permission| permits(permission, method))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::rule::{Rule, RuleSet};

    fn tenant(rules: Vec<Rule>) -> Tenant {
        Tenant::anonymous("/srv", RuleSet::new(rules))
    }

    fn method(name: &str) -> Method {
        Method::from_bytes(name.as_bytes()).unwrap()
    }

    const ALL_METHODS: &[&str] = &[
        "GET", "HEAD", "PUT", "DELETE", "MKCOL", "COPY", "MOVE", "PROPFIND", "PROPPATCH", "LOCK",
        "UNLOCK", "OPTIONS", "POST",
    ];

    #[test]
    fn test_fail_closed_without_match() {
        let t = tenant(vec![Rule::prefix("/public", Permission::Allow)]);
        for name in ALL_METHODS {
            assert!(!allowed(&t, &method(name), "/secret/file"), "{name}");
        }
    }

    #[test]
    fn test_empty_rule_set_denies_everything() {
        let t = tenant(vec![]);
        for name in ALL_METHODS {
            assert!(!allowed(&t, &method(name), "/"), "{name}");
        }
    }

    #[test]
    fn test_deny_overrides_broader_allow() {
        let t = tenant(vec![
            Rule::prefix("/", Permission::Allow),
            Rule::prefix("/private", Permission::Deny),
        ]);
        assert!(!allowed(&t, &Method::GET, "/private/x"));
        assert!(allowed(&t, &Method::GET, "/public/x"));
    }

    #[test]
    fn test_read_only_permits_only_safe_methods() {
        let t = tenant(vec![Rule::prefix("/", Permission::ReadOnly)]);
        for name in ["GET", "HEAD", "PROPFIND", "OPTIONS"] {
            assert!(allowed(&t, &method(name), "/file.txt"), "{name}");
        }
        for name in [
            "PUT", "DELETE", "MKCOL", "COPY", "MOVE", "PROPPATCH", "LOCK", "UNLOCK", "POST",
        ] {
            assert!(!allowed(&t, &method(name), "/file.txt"), "{name}");
        }
    }

    #[test]
    fn test_unknown_method_is_mutating() {
        let t = tenant(vec![Rule::prefix("/", Permission::ReadOnly)]);
        assert!(!allowed(&t, &method("BREW"), "/pot"));
    }

    #[test]
    fn test_decision_is_deterministic() {
        let t = tenant(vec![
            Rule::prefix("/", Permission::ReadOnly),
            Rule::prefix("/inbox", Permission::Allow),
        ]);
        let first = allowed(&t, &Method::PUT, "/inbox/a");
        for _ in 0..10 {
            assert_eq!(allowed(&t, &Method::PUT, "/inbox/a"), first);
        }
        assert!(first);
    }
}
