//! Micromouse Property-Based Tests
//!
//! Standalone test suite using proptest for invariants of the core crate.
//!
//! # Usage
//!
//! ```bash
//! cargo test -p micromouse-property-tests          # Run all property tests
//! cargo test -p micromouse-property-tests maze     # Run only maze tests
//! PROPTEST_CASES=1000 cargo test -p micromouse-property-tests
//! ```
//!
//! # Test Modules
//!
//! - `maze`: wall symmetry, flood against a reference search, persistence
//! - `path`: reconstructed routes are walkable and minimal, expansion
//! - `profile`: completion, overshoot, mirror symmetry
//! - `snapshot`: packing, seqlock reads

// Re-export for convenience in tests
pub use micromouse::*;
