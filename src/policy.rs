//! What happens when every branch of a return check falls through
//! (spec.md §4.D, §9 "Default non-trapping failure policy is surprising").

/// Selected once per [`crate::pipeline::Pipeline`], not per call — this
/// mirrors the reference implementation's build-time flag, not a
/// runtime-configurable setting.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum FailurePolicy {
    /// Detect, don't enforce: call a do-nothing intrinsic and branch to
    /// success anyway. This is the default — preserved deliberately, per
    /// spec.md §9, for instrumentation builds that only want visibility.
    #[default]
    NonTrapping,
    /// Abort the process.
    Trap,
    /// Log the failure and continue, distinct from `NonTrapping` only in
    /// that it's expected to be noisy.
    PrintfContinue,
}
