//! # Nightlife Testkit
//!
//! Test utilities for the nightlife directory.
//!
//! This crate provides:
//! - A small sample catalogue of clubs, DJs, promoters and events
//! - Property-based test generators using proptest
//! - Temporary locations for snapshot files
//!
//! ## Usage
//!
//! ```rust,ignore
//! use nightlife_testkit::prelude::*;
//!
//! #[test]
//! fn joins_resolve() {
//!     let store = Catalogue::sample().into_store();
//!     assert_eq!(store.resolver().events_for_club("c1").len(), 2);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
