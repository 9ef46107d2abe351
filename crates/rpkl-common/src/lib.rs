//! Common types and utilities for the rpkl evaluator.
//!
//! This crate provides foundational types used across all rpkl crates:
//! - String interning (`Atom`, `Interner`, `ShardedInterner`)
//! - Identifiers with the local-property distinction (`Identifier`)
//! - Source spans (`Span`, `Spanned`)
//! - Line maps for 1-based line/column rendering (`LineMap`, `Location`)
//! - The diagnostic message catalog (template keys and formatting)

// String interning for identifier deduplication
pub mod interner;
pub use interner::{Atom, Identifier, Interner, ShardedInterner};

// Span - Source location tracking (byte offsets)
pub mod span;
pub use span::{Span, Spanned};

// Position/Range types for line/column source locations
pub mod position;
pub use position::{LineMap, Location, Position};

// Diagnostic message catalog
pub mod diagnostics;
