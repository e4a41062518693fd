//! Component D — the Return-Check Injector (spec.md §4.D).
//!
//! There is no LLVM `Function` here to splice basic blocks into, so a
//! function's return check is built as an explicit, inspectable
//! [`CheckChain`] value instead of control flow. `CheckChain::evaluate`
//! interprets it against a [`LandingPad`] — the same bytes [`crate::
//! landingpad`] will materialize — which is what makes the round-trip
//! property and the S1/S2/S3/S6 scenarios testable without a target ISA.

use crate::policy::FailurePolicy;
use crate::record::{FunctionFlags, FunctionKind, FunctionRecord, UNKNOWN_ID, MAGIC_BIT};
use std::fmt;

/// The fixed memory boundary above which a return address is assumed to
/// belong to a caller outside the protected module (spec.md §4.D,
/// "External-call allowance").
pub const EXTERNAL_CALL_BOUNDARY: u64 = 0x200_0000;

/// One comparison in a check chain, evaluated in order until one succeeds
/// or the chain runs out (spec.md §4.D's state-machine diagram).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckStep {
    /// Virtual check: `diff = (id | 0x80000) - min_id`; succeeds if
    /// `diff <=u width`.
    RangeMatch { id: u64 },
    /// Static check: succeeds if `min_id == (id | 0x80000)`.
    ExactMatch { id: u64 },
    /// Address-taken augmentation, step 1: accept any return address above
    /// [`EXTERNAL_CALL_BOUNDARY`].
    ExternalRange,
    /// Address-taken augmentation, step 2: accept `min_id == type_id`,
    /// without the magic bit (indirect landing pads carry the raw type ID).
    IndirectMatch { type_id: u32 },
    /// Address-taken augmentation, step 3: accept the unknown-caller
    /// sentinel.
    UnknownSentinel,
    /// Every prior step missed: invoke the configured failure policy. This
    /// step always "succeeds" in the sense that it terminates the chain,
    /// but [`CheckOutcome`] distinguishes it from a real match.
    Fail(FailurePolicy),
}

/// The bytes a return check reads back from the caller's return address,
/// i.e. what [`crate::landingpad`] would have written there (spec.md §6,
/// "Runtime landing-pad wire format").
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LandingPad {
    /// The 32-bit value at offset `+3`, already including the magic bit if
    /// the pad that produced it set one.
    pub min_id: u64,
    /// The 32-bit value at offset `+10`. Ignored for static/indirect/
    /// unknown checks, which only ever read `min_id`.
    pub width: u64,
    /// The caller's own return address, consulted only by
    /// [`CheckStep::ExternalRange`].
    pub return_address: u64,
}

impl LandingPad {
    pub fn virtual_pad(min_id: u64, max_id: u64) -> Self {
        LandingPad {
            min_id: min_id | MAGIC_BIT,
            width: (max_id - min_id) | MAGIC_BIT,
            return_address: 0,
        }
    }

    pub fn static_pad(id: u64) -> Self {
        LandingPad {
            min_id: id | MAGIC_BIT,
            width: 0,
            return_address: 0,
        }
    }

    pub fn indirect_pad(type_id: u32) -> Self {
        LandingPad {
            min_id: type_id as u64,
            width: 0,
            return_address: 0,
        }
    }

    pub fn unknown_pad() -> Self {
        LandingPad {
            min_id: UNKNOWN_ID,
            width: 0,
            return_address: 0,
        }
    }
}

/// The result of evaluating a [`CheckChain`] against one [`LandingPad`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckOutcome {
    /// A real comparison matched, at this step index.
    Success { step: usize },
    /// Every comparison missed and the failure policy ran.
    PolicyFallback(FailurePolicy),
}

impl CheckOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CheckOutcome::Success { .. })
    }
}

/// One function's return check, as a flat ordered list of [`CheckStep`]s
/// (spec.md §4.D).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckChain {
    pub steps: Vec<CheckStep>,
}

impl CheckChain {
    /// Run the chain's width-diff comparisons with wrapping arithmetic,
    /// matching the original's unsigned-subtraction semantics: an
    /// underflowing `diff` wraps to a huge value and therefore correctly
    /// fails `<=u width` rather than panicking.
    pub fn evaluate(&self, pad: &LandingPad) -> CheckOutcome {
        for (step, check) in self.steps.iter().enumerate() {
            let matched = match check {
                CheckStep::RangeMatch { id } => {
                    let diff = (id | MAGIC_BIT).wrapping_sub(pad.min_id);
                    diff <= pad.width
                }
                CheckStep::ExactMatch { id } => pad.min_id == (id | MAGIC_BIT),
                CheckStep::ExternalRange => pad.return_address > EXTERNAL_CALL_BOUNDARY,
                CheckStep::IndirectMatch { type_id } => pad.min_id == *type_id as u64,
                CheckStep::UnknownSentinel => pad.min_id == UNKNOWN_ID,
                CheckStep::Fail(policy) => return CheckOutcome::PolicyFallback(*policy),
            };
            if matched {
                return CheckOutcome::Success { step };
            }
        }
        unreachable!("every chain ends in CheckStep::Fail");
    }

    /// Render the chain as the block diagram spec.md §4.D describes, for
    /// debugging output (this crate's analog of a `write.rs`/pretty-printer
    /// over IR).
    pub fn pretty_print(&self) -> String {
        let mut out = String::new();
        for (i, step) in self.steps.iter().enumerate() {
            let label = match step {
                CheckStep::RangeMatch { id } => format!("compare id {id:#x} (range)"),
                CheckStep::ExactMatch { id } => format!("compare id {id:#x} (exact)"),
                CheckStep::ExternalRange => "ext-range?".to_string(),
                CheckStep::IndirectMatch { type_id } => format!("indirect? ({type_id:#x})"),
                CheckStep::UnknownSentinel => "unknown?".to_string(),
                CheckStep::Fail(policy) => format!("sd.fail (policy={policy:?})"),
            };
            out.push_str(&format!("[{i}: {label}]"));
            if i + 1 < self.steps.len() {
                out.push_str(" --miss--> ");
            }
        }
        out
    }
}

impl fmt::Display for CheckChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pretty_print())
    }
}

/// Build the return check for `record`, mutating it to record
/// `extra_ids`/`check_count` accounting (spec.md §4.D: "Each augmentation
/// adds to extra_ids for accounting").
///
/// Returns `None` when no checks should be installed: blacklisted
/// functions, or a Virtual/Static record with an empty `ids` list (spec.md
/// §7, "Static-function record has no IDs → Skip").
pub fn build_check_chain(record: &mut FunctionRecord, policy: FailurePolicy) -> Option<CheckChain> {
    if matches!(record.kind, FunctionKind::BlackListed) || record.ids.is_empty() {
        return None;
    }

    let mut steps = Vec::new();
    match record.kind {
        FunctionKind::Virtual => {
            for &id in &record.ids {
                steps.push(CheckStep::RangeMatch { id });
            }
        }
        FunctionKind::Static => {
            // Exactly one ID for a static record (spec.md §8, property 3).
            steps.push(CheckStep::ExactMatch { id: record.ids[0] });
        }
        FunctionKind::BlackListed => unreachable!("handled above"),
    }

    if let Some(type_id) = record.type_id {
        steps.push(CheckStep::ExternalRange);
        steps.push(CheckStep::IndirectMatch { type_id });
        steps.push(CheckStep::UnknownSentinel);
        record.extra_ids.push(type_id as u64);
        record.extra_ids.push(UNKNOWN_ID);
    }

    steps.push(CheckStep::Fail(policy));
    record.check_count = (steps.len() - 1) as u32;
    if record.flags.contains(FunctionFlags::EXTERNAL) {
        log::debug!(
            "{} is external-linkage but still receives {} checks (diagnostic only)",
            record.name,
            record.check_count
        );
    }
    Some(CheckChain { steps })
}
