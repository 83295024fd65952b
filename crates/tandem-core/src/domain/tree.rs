//! Node arena for local and remote trees
//!
//! Both sides of a sync root are addressed by stable [`NodeId`]s rather
//! than path strings: a rename or move mutates a node's `name`/`parent`
//! fields in place, so identity survives and "moved" never looks like
//! "deleted then created". Full paths are reconstructed on demand by
//! walking parent references.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::ContentDigest;

/// Stable arena key for a tree node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u64);

impl NodeId {
    /// The root node of every arena
    pub const ROOT: NodeId = NodeId(0);

    /// Raw key value
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Kind of a filesystem entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Folder,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKind::File => write!(f, "file"),
            EntryKind::Folder => write!(f, "folder"),
        }
    }
}

/// Content + metadata identity of an entry
///
/// Used to tell "the same file after a rename" from "a new, unrelated
/// file with the same name". A missing digest means the content could
/// not be read (mid-write, permissions); such an identity matches
/// nothing and routes to the `FingerprintMissing` stall category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// SHA-256 of content; None if the bytes could not be read
    pub digest: Option<ContentDigest>,
    /// Size in bytes (0 for folders)
    pub size: u64,
    /// Last modification time
    pub mtime: DateTime<Utc>,
}

impl Identity {
    /// Identity for a folder (no content digest, zero size)
    #[must_use]
    pub fn folder(mtime: DateTime<Utc>) -> Self {
        Self {
            digest: None,
            size: 0,
            mtime,
        }
    }

    /// True if content was successfully fingerprinted
    #[must_use]
    pub fn is_verifiable(&self) -> bool {
        self.digest.is_some()
    }

    /// True if both identities carry digests and content matches
    ///
    /// A missing digest on either side never matches: unverifiable
    /// content must not be mistaken for a move or a duplicate.
    #[must_use]
    pub fn same_content(&self, other: &Identity) -> bool {
        match (&self.digest, &other.digest) {
            (Some(a), Some(b)) => a == b && self.size == other.size,
            _ => false,
        }
    }
}

/// A single entry in a tree arena
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    /// Path segment (file or folder name); empty only for the root
    pub name: String,
    /// File or folder
    pub kind: EntryKind,
    /// Content + metadata identity
    pub identity: Identity,
    /// Parent node; None only for the root
    pub parent: Option<NodeId>,
}

/// Arena of tree nodes addressed by stable integer keys
///
/// The arena always contains a root node with id [`NodeId::ROOT`].
/// Removal tombstones an id forever; ids are never reused, so stale
/// references fail loudly instead of aliasing a new entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeArena {
    nodes: HashMap<u64, TreeNode>,
    next_id: u64,
}

impl TreeArena {
    /// Create an arena containing only the root folder
    #[must_use]
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            0,
            TreeNode {
                name: String::new(),
                kind: EntryKind::Folder,
                identity: Identity::folder(Utc::now()),
                parent: None,
            },
        );
        Self { nodes, next_id: 1 }
    }

    /// Number of nodes including the root
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if only the root exists
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Look up a node by id
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(&id.0)
    }

    /// Insert a child under `parent`
    ///
    /// # Errors
    ///
    /// Fails if the parent is unknown, is a file, or already has a child
    /// with the same name.
    pub fn insert(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        kind: EntryKind,
        identity: Identity,
    ) -> Result<NodeId, DomainError> {
        let name = name.into();
        let parent_node = self
            .nodes
            .get(&parent.0)
            .ok_or(DomainError::UnknownNode(parent.0))?;
        if parent_node.kind != EntryKind::Folder {
            return Err(DomainError::ValidationFailed(format!(
                "parent {} is not a folder",
                parent.0
            )));
        }
        if self.child_by_name(parent, &name).is_some() {
            return Err(DomainError::ValidationFailed(format!(
                "duplicate name under parent: {name}"
            )));
        }

        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id.0,
            TreeNode {
                name,
                kind,
                identity,
                parent: Some(parent),
            },
        );
        Ok(id)
    }

    /// Rename a node in place; the id stays stable
    pub fn rename(&mut self, id: NodeId, new_name: impl Into<String>) -> Result<(), DomainError> {
        if id == NodeId::ROOT {
            return Err(DomainError::ValidationFailed("cannot rename root".into()));
        }
        let node = self
            .nodes
            .get_mut(&id.0)
            .ok_or(DomainError::UnknownNode(id.0))?;
        node.name = new_name.into();
        Ok(())
    }

    /// Re-parent a node; the id stays stable
    ///
    /// # Errors
    ///
    /// Fails on unknown nodes, a non-folder target, or a move that would
    /// create a cycle (moving a folder under its own descendant).
    pub fn move_node(&mut self, id: NodeId, new_parent: NodeId) -> Result<(), DomainError> {
        if id == NodeId::ROOT {
            return Err(DomainError::ValidationFailed("cannot move root".into()));
        }
        let target = self
            .nodes
            .get(&new_parent.0)
            .ok_or(DomainError::UnknownNode(new_parent.0))?;
        if target.kind != EntryKind::Folder {
            return Err(DomainError::ValidationFailed(format!(
                "move target {} is not a folder",
                new_parent.0
            )));
        }
        // Cycle check: ascend from the target to the root
        let mut cursor = Some(new_parent);
        while let Some(c) = cursor {
            if c == id {
                return Err(DomainError::ValidationFailed(
                    "move would create a cycle".into(),
                ));
            }
            cursor = self.nodes.get(&c.0).and_then(|n| n.parent);
        }

        let node = self
            .nodes
            .get_mut(&id.0)
            .ok_or(DomainError::UnknownNode(id.0))?;
        node.parent = Some(new_parent);
        Ok(())
    }

    /// Replace a node's identity after a content change
    pub fn set_identity(&mut self, id: NodeId, identity: Identity) -> Result<(), DomainError> {
        let node = self
            .nodes
            .get_mut(&id.0)
            .ok_or(DomainError::UnknownNode(id.0))?;
        node.identity = identity;
        Ok(())
    }

    /// Remove a node and its entire subtree, returning removed ids
    pub fn remove(&mut self, id: NodeId) -> Result<Vec<NodeId>, DomainError> {
        if id == NodeId::ROOT {
            return Err(DomainError::ValidationFailed("cannot remove root".into()));
        }
        if !self.nodes.contains_key(&id.0) {
            return Err(DomainError::UnknownNode(id.0));
        }
        let mut removed = Vec::new();
        let mut queue = vec![id];
        while let Some(current) = queue.pop() {
            queue.extend(self.children(current));
            self.nodes.remove(&current.0);
            removed.push(current);
        }
        Ok(removed)
    }

    /// Direct children of a node
    #[must_use]
    pub fn children(&self, parent: NodeId) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.parent == Some(parent))
            .map(|(id, _)| NodeId(*id))
            .collect();
        out.sort();
        out
    }

    /// Child of `parent` with the given name, if any
    #[must_use]
    pub fn child_by_name(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|(_, n)| n.parent == Some(parent) && n.name == name)
            .map(|(id, _)| NodeId(*id))
    }

    /// Resolve a `/`-separated relative path to a node
    #[must_use]
    pub fn lookup(&self, rel_path: &str) -> Option<NodeId> {
        let mut cursor = NodeId::ROOT;
        for segment in rel_path.split('/').filter(|s| !s.is_empty()) {
            cursor = self.child_by_name(cursor, segment)?;
        }
        Some(cursor)
    }

    /// Reconstruct the `/`-separated relative path of a node
    #[must_use]
    pub fn path_of(&self, id: NodeId) -> Option<String> {
        let mut segments = Vec::new();
        let mut cursor = id;
        loop {
            let node = self.nodes.get(&cursor.0)?;
            match node.parent {
                Some(parent) => {
                    segments.push(node.name.clone());
                    cursor = parent;
                }
                None => break,
            }
        }
        segments.reverse();
        Some(segments.join("/"))
    }

    /// Nesting depth of a node below the root
    #[must_use]
    pub fn depth(&self, id: NodeId) -> Option<usize> {
        let mut depth = 0;
        let mut cursor = self.nodes.get(&id.0)?;
        while let Some(parent) = cursor.parent {
            depth += 1;
            cursor = self.nodes.get(&parent.0)?;
        }
        Some(depth)
    }

    /// All file nodes whose identity matches `identity` by content
    #[must_use]
    pub fn find_by_content(&self, identity: &Identity) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.kind == EntryKind::File && n.identity.same_content(identity))
            .map(|(id, _)| NodeId(*id))
            .collect();
        out.sort();
        out
    }

    /// Iterate over all non-root nodes as (id, node) pairs
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &TreeNode)> {
        self.nodes
            .iter()
            .filter(|(id, _)| **id != 0)
            .map(|(id, n)| (NodeId(*id), n))
    }
}

impl Default for TreeArena {
    fn default() -> Self {
        Self::new()
    }
}
