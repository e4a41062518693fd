//! The data model shared across every pass (spec.md §3): `FunctionRecord`
//! and `CallSiteRecord`. Both are keyed by string (mangled name / site key)
//! and carry no IR pointers, since they are the only state that survives
//! the IR → machine-code boundary (spec.md §3, closing paragraph).

use bitflags::bitflags;
use smallvec::SmallVec;

/// Sentinel accepted by a return check as "this call came from an
/// indirect/unknown landing pad we couldn't classify, but it's still one of
/// ours" (spec.md §3, `extra_ids`).
pub const UNKNOWN_ID: u64 = 0x7_FFFF;

/// The "magic bit" distinguishing landing-pad-produced immediates from
/// coincidental return-address bytes (spec.md §9).
pub const MAGIC_BIT: u64 = 0x8_0000;

/// The unknown-landing-pad immediate written by the Materializer when it
/// can't classify a call at all (spec.md §6).
pub const UNKNOWN_LANDING_PAD_IMM: u32 = 0xF_FFFF;

bitflags! {
    /// Diagnostic flags recorded alongside a [`FunctionRecord`] (spec.md §3).
    /// None of these change whether checks are emitted; they're accounting.
    #[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
    pub struct FunctionFlags: u8 {
        /// No call site in this module was found to call this function.
        const NO_CALLER = 1 << 0;
        /// The function has no return instruction at all.
        const NO_RETURN = 1 << 1;
        /// External or weak linkage.
        const EXTERNAL  = 1 << 2;
    }
}

/// How a function was classified by the Function-ID Assigner (spec.md §3).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FunctionKind {
    /// Syntactically excluded from protection; carries no IDs.
    BlackListed,
    /// A virtual method (or non-virtual thunk); IDs come from CHA.
    Virtual,
    /// Not blacklisted, not virtual: gets one fresh ID above CHA's ceiling.
    Static,
}

/// One record per function in the module, produced by the Function-ID
/// Assigner and consumed by the Return-Check Injector (spec.md §3).
#[derive(Clone, Debug)]
pub struct FunctionRecord {
    pub name: String,
    pub kind: FunctionKind,
    /// Ordered IDs this function's callers may present at its return site.
    /// Empty for `BlackListed`. Exactly one entry for `Static`. One or more
    /// (diamond inheritance) for `Virtual`.
    pub ids: SmallVec<[u64; 4]>,
    /// Present only when the function's address is taken.
    pub type_id: Option<u32>,
    /// Auxiliary IDs the return check additionally accepts (populated by
    /// the Return-Check Injector as it builds the address-taken
    /// augmentation branches, not by the Assigner).
    pub extra_ids: SmallVec<[u64; 2]>,
    pub flags: FunctionFlags,
    /// Number of return checks actually emitted (0 if `ids` was empty or
    /// the function has no `ret` at all).
    pub check_count: u32,
}

impl FunctionRecord {
    pub fn blacklisted(name: impl Into<String>) -> Self {
        FunctionRecord {
            name: name.into(),
            kind: FunctionKind::BlackListed,
            ids: SmallVec::new(),
            type_id: None,
            extra_ids: SmallVec::new(),
            flags: FunctionFlags::empty(),
            check_count: 0,
        }
    }

    pub fn new(name: impl Into<String>, kind: FunctionKind, ids: SmallVec<[u64; 4]>) -> Self {
        FunctionRecord {
            name: name.into(),
            kind,
            ids,
            type_id: None,
            extra_ids: SmallVec::new(),
            flags: FunctionFlags::empty(),
            check_count: 0,
        }
    }

    pub fn is_protected(&self) -> bool {
        !matches!(self.kind, FunctionKind::BlackListed) && !self.ids.is_empty()
    }
}

/// How the Call-Site Analyzer classified one call instruction (spec.md §4.C).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallSiteKind {
    /// Virtual dispatch through a `checked_vptr` marker; `(min_id, max_id)`
    /// covers every legal target.
    Virtual { min_id: u64, max_id: u64 },
    /// A direct call to a known static (non-virtual) symbol.
    Static { id: u64 },
    /// A call through an unresolved function pointer, tagged with the
    /// call's own type ID rather than a callee's function ID.
    Indirect { type_id: u32 },
    /// A tail call: the return it would have gone through is elided, so no
    /// landing pad is emitted for it.
    Tail,
}

/// One record per instrumented call site, keyed by `"file:line:col"` (or a
/// pseudo integer fallback) (spec.md §3).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallSiteRecord {
    pub site_key: String,
    pub kind: CallSiteKind,
    /// The intended callee's mangled name, or the synthetic
    /// `__INDIRECT__<suffix>` / `__TAIL__` tokens spec.md §3 specifies.
    pub callee_name: String,
}

impl CallSiteRecord {
    pub fn indirect_callee_name(site_key: &str) -> String {
        format!("__INDIRECT__{site_key}")
    }

    pub const TAIL_CALLEE_NAME: &'static str = "__TAIL__";
}
