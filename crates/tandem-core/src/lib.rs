//! Tandem Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `SyncRoot`, `TreeArena`, `StalledIssue`,
//!   `TransferTask`, `DebrisEntry`
//! - **The stall taxonomy** - the closed `StallCategory` sum type and the
//!   issue lifecycle state machine
//! - **Port definitions** - traits for adapters: `ILocalFileSystem`,
//!   `IRemoteStore`, `IStateRepository`, `ITransferQueue`
//!
//! # Architecture
//!
//! Ports & adapters: this crate is pure domain logic with no IO. The
//! rule engine, scanner, classifier/resolver, transfer queue, and
//! SQLite store are separate crates implementing or consuming the port
//! traits defined here.

pub mod config;
pub mod domain;
pub mod ports;

/// Maximum supported nesting depth below a sync root
///
/// Anything deeper is reported as an `ExceedsTreeDepth` stall, never
/// silently truncated.
pub const MAX_TREE_DEPTH: usize = 64;
