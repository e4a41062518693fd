//! Component E — the Landing-Pad Materializer (spec.md §4.E).
//!
//! There's no real instruction-selection backend here, so "a machine
//! instruction classified as a call" is modeled by walking the same
//! `ir::Inst` sequence the Analyzer walked, reading back the metadata it
//! serialized (spec.md §4.E / SPEC_FULL.md §4.E). This is the only place
//! the magic bit actually gets OR'd into an emitted immediate — callers of
//! this module should never need to do that themselves.

use crate::ir::{Callee, InstData, Module};
use crate::record::{CallSiteKind, CallSiteRecord, UNKNOWN_LANDING_PAD_IMM, MAGIC_BIT};
use hashbrown::HashMap;

/// What got written after one call instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LandingPadEmission {
    /// Tail call: landing pad suppressed entirely (spec.md §4.E).
    None,
    /// Static, indirect, or unknown: one noop immediate.
    Single(u32),
    /// Virtual: two noop immediates, `min` first, `width` second — this
    /// crate's chosen canonical order (spec.md §4.E calls out that either
    /// order is valid as long as it's documented and consistent, since both
    /// noops sit at fixed `+3`/`+10` offsets regardless of emission order).
    Double(u32, u32),
}

/// Per-module accounting the Materializer keeps as it runs, feeding
/// `stats.rs`'s CSV reports (spec.md §4.E, "side effect").
#[derive(Default, Debug)]
pub struct MaterializeStats {
    pub id_hit_counts: HashMap<u64, u32>,
    pub range_widths: Vec<u64>,
    pub unknown_count: u32,
}

impl MaterializeStats {
    fn record_id(&mut self, id: u64) {
        *self.id_hit_counts.entry(id).or_insert(0) += 1;
    }
}

/// Emit the landing pad for one call, given the analyzer's record for its
/// site key (`None` if the key wasn't found in either table: spec.md §7,
/// "Unknown").
fn emit_for_site(
    callee: &Callee,
    site: Option<&CallSiteRecord>,
    stats: &mut MaterializeStats,
) -> LandingPadEmission {
    match site.map(|s| &s.kind) {
        Some(CallSiteKind::Tail) => LandingPadEmission::None,
        Some(CallSiteKind::Virtual { min_id, max_id }) => {
            let min = min_id | MAGIC_BIT;
            let width = (max_id - min_id) | MAGIC_BIT;
            stats.record_id(*min_id);
            stats.range_widths.push(max_id - min_id);
            LandingPadEmission::Double(min as u32, width as u32)
        }
        Some(CallSiteKind::Static { id }) => {
            stats.record_id(*id);
            LandingPadEmission::Single((id | MAGIC_BIT) as u32)
        }
        Some(CallSiteKind::Indirect { type_id }) => {
            stats.record_id(*type_id as u64);
            LandingPadEmission::Single(*type_id)
        }
        None => {
            // Unknown: the pass only instruments this if the callee isn't
            // a named symbol (global or external) — direct/tail calls to
            // known symbols that simply fell out of the metadata tables
            // are left alone, matching `!isGlobal() && !isExternalSymbol()`
            // in the reference backend pass.
            match callee {
                Callee::Direct(_) | Callee::Tail(_) => LandingPadEmission::None,
                Callee::Indirect { .. } | Callee::Virtual { .. } => {
                    stats.unknown_count += 1;
                    LandingPadEmission::Single(UNKNOWN_LANDING_PAD_IMM)
                }
            }
        }
    }
}

/// Walk every function's call instructions and materialize their landing
/// pads. `call_sites` is the analyzer's output, keyed by site key
/// (`CallSiteRecord::site_key`) — the same table that would have been
/// (de)serialized through `metadata.rs` in a real multi-unit pipeline.
///
/// Returns the per-module stats `stats.rs` turns into CSV reports. If both
/// input tables are empty, the pass still runs but produces no emissions
/// and empty stats (spec.md §4.E: "if both are empty, disable the pass for
/// the remainder of this module" — modeled here as simply doing no work,
/// since there's no separate enable/disable state to track).
pub fn materialize_module(
    module: &Module,
    call_sites: &HashMap<String, CallSiteRecord>,
) -> (HashMap<(String, u32), LandingPadEmission>, MaterializeStats) {
    let mut stats = MaterializeStats::default();
    let mut emissions = HashMap::new();

    for function in module.functions() {
        for inst in function.calls() {
            let InstData::Call { callee, debug_loc } = function.inst(inst) else {
                unreachable!("calls() only returns Call instructions");
            };
            let site_key = debug_loc
                .as_ref()
                .map(|loc| loc.site_key())
                .unwrap_or_else(|| "N/A".to_string());
            let site = call_sites.get(&site_key);
            let emission = emit_for_site(callee, site, &mut stats);
            emissions.insert((function.mangled_name.clone(), inst.as_u32()), emission);
        }
    }

    (emissions, stats)
}
