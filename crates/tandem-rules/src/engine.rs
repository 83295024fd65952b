//! Per-root rule evaluation with memoization
//!
//! Rule sets compile once per change ([`RuleEngine::install`]) and are
//! evaluated lazily per path. While a root's rules are being recomputed
//! the verdict is [`Verdict::Unknown`]; the scanner must defer such
//! paths, never treat them as excluded.
//!
//! An excluded folder excludes its whole subtree, so evaluation walks
//! the ancestor chain; folder verdicts are memoized per directory and
//! invalidated by revision.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use tandem_core::domain::newtypes::RootId;
use tandem_core::domain::tree::EntryKind;

use crate::rule::{CompiledRule, ExclusionRule, RuleSign};

/// Inclusion verdict for a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Included,
    Excluded,
    /// Rules for this root are still being computed; defer, don't guess
    Unknown,
}

/// A compiled, ordered rule set for one root
///
/// Invalid rules are logged and skipped at compile time, matching how
/// the rest of the engine treats malformed configuration: degrade, do
/// not abort.
#[derive(Debug)]
pub struct RuleSet {
    compiled: Vec<CompiledRule>,
    source: Vec<ExclusionRule>,
}

impl RuleSet {
    /// Compile an ordered rule list, skipping invalid rules with a warning
    #[must_use]
    pub fn compile(rules: Vec<ExclusionRule>) -> Self {
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in &rules {
            if !rule.enabled {
                continue;
            }
            match CompiledRule::compile(rule) {
                Ok(c) => compiled.push(c),
                Err(e) => {
                    warn!(error = %e, "Skipping invalid exclusion rule");
                }
            }
        }
        Self {
            compiled,
            source: rules,
        }
    }

    /// The source rules this set was compiled from
    #[must_use]
    pub fn source(&self) -> &[ExclusionRule] {
        &self.source
    }

    /// First-applicable-wins verdict for a single entry (no ancestor walk)
    #[must_use]
    pub fn evaluate_entry(&self, rel_path: &str, kind: EntryKind, size: Option<u64>) -> Verdict {
        for rule in &self.compiled {
            if !rule.target.covers(kind) {
                continue;
            }
            if rule.matches(rel_path, kind, size) {
                return match rule.sign {
                    RuleSign::Exclude => Verdict::Excluded,
                    RuleSign::Include => Verdict::Included,
                };
            }
        }
        Verdict::Included
    }
}

enum RootRules {
    Ready { revision: u64, set: Arc<RuleSet> },
    /// An update is in flight; verdicts are Unknown until install
    Pending { revision: u64 },
}

/// Evaluates exclusion rules for all roots of an installation
pub struct RuleEngine {
    roots: DashMap<RootId, RootRules>,
    /// (root, revision, folder path) → folder included?
    folder_memo: DashMap<(RootId, u64, String), bool>,
}

impl RuleEngine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            roots: DashMap::new(),
            folder_memo: DashMap::new(),
        }
    }

    /// Mark a root's rules as being recomputed
    ///
    /// Until [`install`](Self::install) completes, every verdict for
    /// this root is [`Verdict::Unknown`].
    pub fn begin_update(&self, root: RootId) {
        let revision = self.current_revision(root) + 1;
        self.roots.insert(root, RootRules::Pending { revision });
        debug!(%root, revision, "Rule update started");
    }

    /// Install a compiled rule set for a root
    pub fn install(&self, root: RootId, rules: Vec<ExclusionRule>) {
        let revision = self.current_revision(root) + 1;
        let set = Arc::new(RuleSet::compile(rules));
        self.folder_memo.retain(|(r, _, _), _| *r != root);
        self.roots.insert(root, RootRules::Ready { revision, set });
        debug!(%root, revision, "Rule set installed");
    }

    /// Drop a root's rules entirely (root removed)
    pub fn remove_root(&self, root: RootId) {
        self.roots.remove(&root);
        self.folder_memo.retain(|(r, _, _), _| *r != root);
    }

    /// The source rules currently installed for a root, if ready
    #[must_use]
    pub fn rules(&self, root: RootId) -> Option<Vec<ExclusionRule>> {
        match self.roots.get(&root)?.value() {
            RootRules::Ready { set, .. } => Some(set.source().to_vec()),
            RootRules::Pending { .. } => None,
        }
    }

    /// Force-apply a legacy global rule set to the given roots,
    /// overwriting whatever each root currently has
    ///
    /// Returns how many roots were overwritten.
    pub fn force_migrate(&self, legacy: &[ExclusionRule], roots: &[RootId]) -> usize {
        for root in roots {
            self.install(*root, legacy.to_vec());
        }
        debug!(count = roots.len(), "Legacy rules force-applied");
        roots.len()
    }

    /// Verdict for a path, including the excluded-ancestor check
    ///
    /// A root with no installed rules includes everything.
    #[must_use]
    pub fn evaluate(
        &self,
        root: RootId,
        rel_path: &str,
        kind: EntryKind,
        size: Option<u64>,
    ) -> Verdict {
        let (revision, set) = match self.roots.get(&root).as_deref() {
            None => return Verdict::Included,
            Some(RootRules::Pending { .. }) => return Verdict::Unknown,
            Some(RootRules::Ready { revision, set }) => (*revision, Arc::clone(set)),
        };

        // Excluded folder excludes the whole subtree
        let mut prefix = String::new();
        for segment in ancestor_segments(rel_path) {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(segment);
            if !self.folder_included(root, revision, &set, &prefix) {
                return Verdict::Excluded;
            }
        }

        set.evaluate_entry(rel_path, kind, size)
    }

    fn folder_included(&self, root: RootId, revision: u64, set: &RuleSet, dir: &str) -> bool {
        let key = (root, revision, dir.to_string());
        if let Some(cached) = self.folder_memo.get(&key) {
            return *cached;
        }
        let included = set.evaluate_entry(dir, EntryKind::Folder, None) == Verdict::Included;
        self.folder_memo.insert(key, included);
        included
    }

    fn current_revision(&self, root: RootId) -> u64 {
        match self.roots.get(&root).as_deref() {
            Some(RootRules::Ready { revision, .. }) | Some(RootRules::Pending { revision }) => {
                *revision
            }
            None => 0,
        }
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over the ancestor directory segments of a relative path
/// (every segment except the last)
fn ancestor_segments(rel_path: &str) -> impl Iterator<Item = &str> {
    let count = rel_path.split('/').count();
    rel_path.split('/').take(count.saturating_sub(1))
}
