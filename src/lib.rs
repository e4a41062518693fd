//! `sd-retcfi`: the compiler-side core of a backward-edge control-flow
//! integrity mechanism.
//!
//! This crate hardens compiled programs against return-address corruption
//! by requiring every protected function to verify, before it returns,
//! that its return site carries one of the caller-expected call-site
//! identifiers — identifiers a separate pass burns into no-op immediates
//! placed right after each call. Five passes cooperate to make this work:
//!
//! - [`encode`] — maps a function signature to a compact type ID.
//! - [`funcid`] — assigns every function a blacklist/virtual/static
//!   classification and its ID(s), using a caller-supplied
//!   [`cha::ClassHierarchyAnalysis`] for virtual methods.
//! - [`callsite`] — classifies every call instruction and computes its
//!   target ID or ID range.
//! - [`retcheck`] — builds the return-side check chain each function's
//!   epilogue evaluates.
//! - [`landingpad`] — emits the no-op immediates a machine backend would
//!   place after each call.
//!
//! [`pipeline::Pipeline`] wires all five over one [`ir::Module`]. Class
//! hierarchy analysis itself, Itanium mangling, and pass-manager/CLI
//! wiring are out of scope for this crate — see the [`cha`] module for the
//! trait boundary this crate consumes instead of implementing.

#![warn(missing_docs)]

/// The crate version, as declared in `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod callsite;
pub mod cha;
pub mod encode;
pub mod errors;
pub mod funcid;
pub mod ir;
pub mod landingpad;
pub mod metadata;
pub mod pipeline;
pub mod policy;
pub mod record;
pub mod retcheck;
pub mod stats;
