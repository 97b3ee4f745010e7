//! core
//!
//! Core domain types, configuration, and operations for docsync.
//!
//! # Modules
//!
//! - [`types`] - Strong types: Oid, CommitRef, ConflictEntry, etc.
//! - [`config`] - Configuration schema and loading
//! - [`ops`] - Repository locking
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Schemas are strict and self-describing

pub mod config;
pub mod ops;
pub mod types;
