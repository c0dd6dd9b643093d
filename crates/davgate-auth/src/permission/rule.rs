//! Compiled permission rules and longest-match resolution.

use regex::Regex;

use davgate_core::config::{Permission, RuleConfig};
use davgate_core::error::AppError;

use super::path::normalize_path;

/// What part of the path a rule applies to.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Normalized path prefix, matched on segment boundaries.
    Prefix(String),
    /// Regular expression matched anywhere in the normalized path.
    Regex(Regex),
}

impl Matcher {
    /// Returns the specificity of the match, or `None` if the rule does not
    /// apply. Higher is more specific.
    pub fn specificity(&self, path: &str) -> Option<usize> {
        match self {
            Self::Prefix(prefix) => {
                let applies = prefix == "/"
                    || path == prefix
                    || path
                        .strip_prefix(prefix.as_str())
                        .is_some_and(|rest| rest.starts_with('/'));
                applies.then_some(prefix.len())
            }
            Self::Regex(regex) => regex.find(path).map(|m| m.as_str().len()),
        }
    }
}

/// A single rule: matcher plus effect.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Where the rule applies.
    pub matcher: Matcher,
    /// What it permits.
    pub permission: Permission,
}

impl Rule {
    /// Prefix rule; the prefix is normalized.
    pub fn prefix(path: &str, permission: Permission) -> Self {
        Self {
            matcher: Matcher::Prefix(normalize_path(path)),
            permission,
        }
    }

    /// Regex rule.
    pub fn regex(pattern: &str, permission: Permission) -> Result<Self, AppError> {
        let regex = Regex::new(pattern).map_err(|e| {
            AppError::configuration(format!("invalid rule regex {pattern:?}: {e}"))
        })?;
        Ok(Self {
            matcher: Matcher::Regex(regex),
            permission,
        })
    }

    /// Compile a configured rule.
    pub fn from_config(config: &RuleConfig) -> Result<Self, AppError> {
        match (&config.path, &config.regex) {
            (Some(path), None) => Ok(Self::prefix(path, config.permission)),
            (None, Some(pattern)) => Self::regex(pattern, config.permission),
            _ => Err(AppError::configuration(
                "each rule needs exactly one of `path` or `regex`",
            )),
        }
    }
}

/// An ordered, immutable set of rules.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Build from already compiled rules.
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Compile configured rules.
    pub fn from_config(configs: &[RuleConfig]) -> Result<Self, AppError> {
        configs
            .iter()
            .map(Rule::from_config)
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }

    /// Whether no rule is configured (every request will be denied).
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Rules in configuration order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Resolve the effective permission for a path.
    ///
    /// The most specific matching rule wins; among equally specific rules the
    /// most restrictive one wins. `None` means no rule matched.
    pub fn resolve(&self, path: &str) -> Option<Permission> {
        let path = normalize_path(path);

        self.rules
            .iter()
            .filter_map(|rule| {
                rule.matcher
                    .specificity(&path)
                    .map(|specificity| (specificity, rule.permission))
            })
            .max()
            .map(|(_, permission)| permission)
    }
}
