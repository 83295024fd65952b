//! Exclusion rule model
//!
//! A rule is a (sign, target, predicate) triple. Rules are ordered and
//! evaluated first-applicable-wins per target type: the first enabled
//! rule whose target covers the entry kind and whose predicate matches
//! decides inclusion. A path with no applicable rule is included.

use glob::Pattern;
use serde::{Deserialize, Serialize};

use tandem_core::domain::tree::EntryKind;

use crate::error::RuleError;

/// Whether a matching rule includes or excludes the entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSign {
    Exclude,
    Include,
}

/// Which entry kinds a rule applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleTarget {
    File,
    Folder,
    Both,
}

impl RuleTarget {
    /// True if this target covers the given kind
    #[must_use]
    pub fn covers(self, kind: EntryKind) -> bool {
        match self {
            RuleTarget::Both => true,
            RuleTarget::File => kind == EntryKind::File,
            RuleTarget::Folder => kind == EntryKind::Folder,
        }
    }
}

/// Rule predicate, data only (compiled separately)
///
/// Name predicates test the entry's final path segment; `Wildcard`
/// tests the full `/`-separated relative path; `SizeRange` applies to
/// files only and never matches when the size is unknown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "predicate", rename_all = "snake_case")]
pub enum Predicate {
    BeginsWith { value: String },
    EndsWith { value: String },
    Contains { value: String },
    Equals { value: String },
    Wildcard { pattern: String },
    Extension { value: String },
    SizeRange { min: Option<u64>, max: Option<u64> },
}

/// One ordered exclusion rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionRule {
    pub sign: RuleSign,
    pub target: RuleTarget,
    pub predicate: Predicate,
    pub enabled: bool,
}

impl ExclusionRule {
    /// A new enabled exclusion rule
    #[must_use]
    pub fn exclude(target: RuleTarget, predicate: Predicate) -> Self {
        Self {
            sign: RuleSign::Exclude,
            target,
            predicate,
            enabled: true,
        }
    }

    /// A new enabled include-override rule
    #[must_use]
    pub fn include(target: RuleTarget, predicate: Predicate) -> Self {
        Self {
            sign: RuleSign::Include,
            target,
            predicate,
            enabled: true,
        }
    }
}

/// A rule with its wildcard pattern compiled
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub sign: RuleSign,
    pub target: RuleTarget,
    matcher: Matcher,
}

#[derive(Debug, Clone)]
enum Matcher {
    BeginsWith(String),
    EndsWith(String),
    Contains(String),
    Equals(String),
    Wildcard(Pattern),
    Extension(String),
    SizeRange { min: Option<u64>, max: Option<u64> },
}

impl CompiledRule {
    /// Compile a rule, validating its pattern
    ///
    /// # Errors
    ///
    /// Returns `RuleError::InvalidPattern` for a malformed wildcard.
    pub fn compile(rule: &ExclusionRule) -> Result<Self, RuleError> {
        let matcher = match &rule.predicate {
            Predicate::BeginsWith { value } => Matcher::BeginsWith(value.clone()),
            Predicate::EndsWith { value } => Matcher::EndsWith(value.clone()),
            Predicate::Contains { value } => Matcher::Contains(value.clone()),
            Predicate::Equals { value } => Matcher::Equals(value.clone()),
            Predicate::Wildcard { pattern } => {
                let compiled = Pattern::new(pattern).map_err(|e| RuleError::InvalidPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })?;
                Matcher::Wildcard(compiled)
            }
            Predicate::Extension { value } => {
                Matcher::Extension(value.trim_start_matches('.').to_ascii_lowercase())
            }
            Predicate::SizeRange { min, max } => {
                if let (Some(mn), Some(mx)) = (min, max) {
                    if mn > mx {
                        return Err(RuleError::InvalidSizeRange(format!("{mn}-{mx}")));
                    }
                }
                Matcher::SizeRange {
                    min: *min,
                    max: *max,
                }
            }
        };
        Ok(Self {
            sign: rule.sign,
            target: rule.target,
            matcher,
        })
    }

    /// True if the predicate matches the entry
    #[must_use]
    pub fn matches(&self, rel_path: &str, kind: EntryKind, size: Option<u64>) -> bool {
        let name = rel_path.rsplit('/').next().unwrap_or(rel_path);
        match &self.matcher {
            Matcher::BeginsWith(v) => name.starts_with(v.as_str()),
            Matcher::EndsWith(v) => name.ends_with(v.as_str()),
            Matcher::Contains(v) => name.contains(v.as_str()),
            Matcher::Equals(v) => name == v,
            Matcher::Wildcard(p) => p.matches(rel_path),
            Matcher::Extension(v) => match name.rsplit_once('.') {
                Some((stem, ext)) => !stem.is_empty() && ext.eq_ignore_ascii_case(v),
                None => false,
            },
            Matcher::SizeRange { min, max } => {
                if kind != EntryKind::File {
                    return false;
                }
                let Some(size) = size else {
                    return false;
                };
                min.map_or(true, |m| size >= m) && max.map_or(true, |m| size <= m)
            }
        }
    }
}
