//! Cache module: normalized, cross-query-consistent storage of query results.
//!
//! # Module Organization
//!
//! - [`cell`]: [`StateCell`], the reactive container holding one query's [`QueryState`]
//! - [`base`]: [`NormalizedCache`], the three indices and the reconciliation step
//!
//! # Public API
//!
//! ```rust
//! use quire_core::cache::{NormalizedCache, QueryState, SharedCache, StateCell};
//! ```

mod base;
mod cell;


pub use base::{Invalidation, NormalizedCache, SharedCache};
pub use cell::{QueryState, StateCell};
