//! Path and method permission rules.

pub mod evaluator;
pub mod path;
pub mod rule;

pub use evaluator::{allowed, is_read_only_method};
pub use path::normalize_path;
pub use rule::{Matcher, Rule, RuleSet};
