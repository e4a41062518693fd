//! Class-hierarchy analysis: the external collaborator this crate consumes
//! but does not implement (spec.md §1, "out of scope").
//!
//! `build_function_info` is assumed to have already run by the time any
//! pass in this crate touches a [`ClassHierarchyAnalysis`] — that's the
//! caller's responsibility, same as cranelift's passes assume their
//! `TargetIsa` is already configured.

use hashbrown::HashMap;

/// The three operations the Function-ID Assigner and Call-Site Analyzer
/// need from CHA (spec.md §6, "Consumed from CHA").
pub trait ClassHierarchyAnalysis {
    /// Run whatever hierarchy analysis populates this CHA's internal
    /// tables. Idempotent: calling it twice must not change the result.
    fn build_function_info(&mut self);

    /// The set of caller-expected IDs for a virtual method, across every
    /// concrete override reachable through the class hierarchy (including
    /// diamond inheritance, hence possibly more than one). Empty if
    /// `mangled` is not a virtual method CHA recognizes.
    fn function_id(&self, mangled: &str) -> &[u64];

    /// The largest ID CHA assigned to any virtual function. The Function-ID
    /// Assigner's first static ID is `max_id() + 1`.
    fn max_id(&self) -> u64;
}

/// A `HashMap`-backed [`ClassHierarchyAnalysis`] test double. Stands in for
/// the real CHA pass so the rest of this crate's passes can be exercised
/// without a front end — the same role `Function::new` with hand-built
/// instructions plays in `cranelift-codegen`'s own unit tests.
#[cfg(any(test, feature = "test-support"))]
#[derive(Default, Debug, Clone)]
pub struct StaticCha {
    ids: HashMap<String, Vec<u64>>,
    max_id: u64,
}

#[cfg(any(test, feature = "test-support"))]
impl StaticCha {
    pub fn new() -> Self {
        StaticCha::default()
    }

    /// Register a virtual method's ID list and extend `max_id` if needed.
    pub fn with_virtual(mut self, mangled: impl Into<String>, ids: Vec<u64>) -> Self {
        let max = ids.iter().copied().max().unwrap_or(0);
        if max > self.max_id {
            self.max_id = max;
        }
        self.ids.insert(mangled.into(), ids);
        self
    }

    /// Set `max_id` directly, e.g. when a module has virtual IDs assigned
    /// by CHA that aren't otherwise registered here (S1's `CHA.max_id = 10`
    /// with no virtual methods at all).
    pub fn with_max_id(mut self, max_id: u64) -> Self {
        self.max_id = max_id;
        self
    }
}

#[cfg(any(test, feature = "test-support"))]
impl ClassHierarchyAnalysis for StaticCha {
    fn build_function_info(&mut self) {
        // Every table this double serves is already populated by its
        // builder methods (`with_virtual`/`with_max_id`) at construction
        // time, so there is nothing left to compute here.
    }

    fn function_id(&self, mangled: &str) -> &[u64] {
        self.ids.get(mangled).map(Vec::as_slice).unwrap_or(&[])
    }

    fn max_id(&self) -> u64 {
        self.max_id
    }
}
