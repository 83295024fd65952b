//! Tandem exclusion rule engine
//!
//! Evaluates per-root inclusion rules against candidate paths. Rule
//! sets compile once per change and evaluate lazily per path with
//! per-directory memoization; while a recompute is in flight the
//! verdict is `Unknown` and the scanner defers the path rather than
//! guessing.

pub mod engine;
pub mod error;
pub mod file;
pub mod rule;

pub use engine::{RuleEngine, RuleSet, Verdict};
pub use error::RuleError;
pub use file::{load_legacy_file, load_rule_file, parse_legacy, parse_rules, save_rule_file, write_rules};
pub use rule::{CompiledRule, ExclusionRule, Predicate, RuleSign, RuleTarget};
