//! Domain newtypes with validation
//!
//! Strongly-typed wrappers for domain identifiers and values. Each newtype
//! ensures data validity at construction time, so the rest of the engine
//! never has to re-check a path or digest it received.

use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// UUID-based ID types
// ============================================================================

/// Identifier for a configured sync root (local↔remote pairing)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RootId(Uuid);

impl RootId {
    /// Create a new random RootId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a RootId from an existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Create a nil (all zeros) RootId
    #[must_use]
    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }
}

impl Default for RootId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RootId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RootId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid UUID: {e}")))
    }
}

/// Identifier for a stalled issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueId(Uuid);

impl IssueId {
    /// Create a new random IssueId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an IssueId from an existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for IssueId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for IssueId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for IssueId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid UUID: {e}")))
    }
}

/// Identifier for a transfer task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Create a new random TaskId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a TaskId from an existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for TaskId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid UUID: {e}")))
    }
}

/// Identifier for a debris entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DebrisId(Uuid);

impl DebrisId {
    /// Create a new random DebrisId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a DebrisId from an existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for DebrisId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for DebrisId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DebrisId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid UUID: {e}")))
    }
}

// ============================================================================
// Path types
// ============================================================================

/// An absolute path on the local filesystem
///
/// Guaranteed absolute at construction; everything downstream can join
/// and strip prefixes without re-validating.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalPath(PathBuf);

impl LocalPath {
    /// Create a LocalPath from an absolute path
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidPath` if the path is relative or empty.
    pub fn new(path: PathBuf) -> Result<Self, DomainError> {
        if path.as_os_str().is_empty() {
            return Err(DomainError::InvalidPath("empty path".to_string()));
        }
        if !path.is_absolute() {
            return Err(DomainError::InvalidPath(format!(
                "path must be absolute: {}",
                path.display()
            )));
        }
        Ok(Self(path))
    }

    /// Borrow the inner path
    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Consume into the inner PathBuf
    #[must_use]
    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }

    /// Join a relative component, producing a new LocalPath
    #[must_use]
    pub fn join(&self, rel: impl AsRef<Path>) -> Self {
        Self(self.0.join(rel))
    }
}

impl Display for LocalPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// A path in the remote tree, rooted at `/`
///
/// Remote paths use `/` separators regardless of the local platform and
/// never contain empty or `.`/`..` segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemotePath(String);

impl RemotePath {
    /// Create a validated RemotePath
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidRemotePath` if the path does not start
    /// with `/` or contains empty / dot segments.
    pub fn new(path: String) -> Result<Self, DomainError> {
        if !path.starts_with('/') {
            return Err(DomainError::InvalidRemotePath(format!(
                "must start with '/': {path}"
            )));
        }
        if path.len() > 1 {
            for segment in path[1..].split('/') {
                if segment.is_empty() || segment == "." || segment == ".." {
                    return Err(DomainError::InvalidRemotePath(format!(
                        "invalid segment in: {path}"
                    )));
                }
            }
        }
        Ok(Self(path))
    }

    /// The remote root path, `/`
    #[must_use]
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Borrow the path string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The final path segment, or the empty string for the root
    #[must_use]
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or("")
    }

    /// The parent path, or None for the root
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.0 == "/" {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) => Some(Self("/".to_string())),
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => None,
        }
    }

    /// Join a child segment
    #[must_use]
    pub fn join(&self, segment: &str) -> Self {
        if self.0 == "/" {
            Self(format!("/{segment}"))
        } else {
            Self(format!("{}/{segment}", self.0))
        }
    }

    /// Number of segments below the root
    #[must_use]
    pub fn depth(&self) -> usize {
        if self.0 == "/" {
            0
        } else {
            self.0[1..].split('/').count()
        }
    }
}

impl Display for RemotePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A SHA-256 content digest, lowercase hex
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Create a validated digest (64 lowercase hex characters)
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidDigest` on wrong length or alphabet.
    pub fn new(hex: String) -> Result<Self, DomainError> {
        if hex.len() != 64 || !hex.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase())
        {
            return Err(DomainError::InvalidDigest(hex));
        }
        Ok(Self(hex))
    }

    /// Build a digest from raw SHA-256 output bytes
    #[must_use]
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        let mut hex = String::with_capacity(64);
        for b in bytes {
            use std::fmt::Write;
            let _ = write!(hex, "{b:02x}");
        }
        Self(hex)
    }

    /// Borrow the hex string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ContentDigest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_id_roundtrip() {
        let id = RootId::new();
        let parsed: RootId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_id_parse_rejects_garbage() {
        assert!("not-a-uuid".parse::<IssueId>().is_err());
        assert!("".parse::<TaskId>().is_err());
    }

    #[test]
    fn test_nil_root_id() {
        assert_eq!(RootId::nil().as_uuid(), &Uuid::nil());
    }

    #[test]
    fn test_local_path_must_be_absolute() {
        assert!(LocalPath::new(PathBuf::from("relative/path")).is_err());
        assert!(LocalPath::new(PathBuf::from("")).is_err());
        assert!(LocalPath::new(PathBuf::from("/home/user/sync")).is_ok());
    }

    #[test]
    fn test_remote_path_validation() {
        assert!(RemotePath::new("/docs/report.txt".to_string()).is_ok());
        assert!(RemotePath::new("docs".to_string()).is_err());
        assert!(RemotePath::new("/docs//x".to_string()).is_err());
        assert!(RemotePath::new("/docs/../x".to_string()).is_err());
    }

    #[test]
    fn test_remote_path_name_and_parent() {
        let p = RemotePath::new("/docs/report.txt".to_string()).unwrap();
        assert_eq!(p.name(), "report.txt");
        assert_eq!(p.parent().unwrap().as_str(), "/docs");
        assert_eq!(p.parent().unwrap().parent().unwrap().as_str(), "/");
        assert!(RemotePath::root().parent().is_none());
    }

    #[test]
    fn test_remote_path_join_and_depth() {
        let root = RemotePath::root();
        assert_eq!(root.depth(), 0);
        let child = root.join("a").join("b");
        assert_eq!(child.as_str(), "/a/b");
        assert_eq!(child.depth(), 2);
    }

    #[test]
    fn test_content_digest_validation() {
        let ok = "a".repeat(64);
        assert!(ContentDigest::new(ok).is_ok());
        assert!(ContentDigest::new("A".repeat(64)).is_err());
        assert!(ContentDigest::new("a".repeat(63)).is_err());
        assert!(ContentDigest::new("zz".repeat(32)).is_err());
    }

    #[test]
    fn test_content_digest_from_bytes() {
        let digest = ContentDigest::from_bytes(&[0xab; 32]);
        assert_eq!(digest.as_str(), "ab".repeat(32));
    }

    #[test]
    fn test_serde_transparent() {
        let id = IssueId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let back: IssueId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
