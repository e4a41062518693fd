//! Component C — the Call-Site Analyzer (spec.md §4.C).
//!
//! Walks every call instruction in the module, classifies it, and computes
//! its target ID (static/indirect) or target ID range (virtual). Sites
//! lacking real debug info get a pseudo location so every site still has a
//! unique key (spec.md §4.C, "essential").

use crate::encode::TypeEncoder;
use crate::ir::{Callee, DebugLoc, InstData, Module};
use crate::record::{CallSiteKind, CallSiteRecord, FunctionRecord};
use hashbrown::HashMap;

/// Assigns sequential pseudo debug locations to call sites that have none,
/// starting at 1 (spec.md §4.C).
#[derive(Default)]
pub struct PseudoLocAllocator {
    next: u64,
}

impl PseudoLocAllocator {
    pub fn new() -> Self {
        PseudoLocAllocator { next: 1 }
    }

    pub fn allocate(&mut self) -> DebugLoc {
        let loc = DebugLoc::Pseudo(self.next);
        self.next += 1;
        loc
    }
}

/// Result of analyzing one module: every instrumented call site, keyed by
/// its site key, plus how many pseudo locations had to be synthesized.
#[derive(Default, Debug)]
pub struct AnalysisResult {
    pub sites: HashMap<String, CallSiteRecord>,
    pub pseudo_locs_assigned: u32,
    /// Every mangled name reachable as a callee from some call site in this
    /// module, across every overrider of a virtual dispatch — not just the
    /// one `CallSiteRecord::callee_name` happens to carry as its diagnostic
    /// hint. A diamond-style virtual call site's full `possible_targets`
    /// list all belong here, since every one of them is a genuine target of
    /// that site (spec.md §3/§4.C). This is what `NO_CALLER` accounting
    /// must fold over instead of `sites`' `callee_name`s.
    pub reachable_callees: std::collections::HashSet<String>,
}

/// Given a virtual call's set of possible concrete targets (already
/// resolved by CHA) and each target's ID list, compute the contiguous
/// `(min, max)` range spec.md §4.C says CHA's numbering guarantees.
/// Returns `None` if no target carries any ID (spec.md §7, "skip").
fn virtual_target_range(possible_target_ids: &[&[u64]]) -> Option<(u64, u64)> {
    let mut min = None;
    let mut max = None;
    for ids in possible_target_ids {
        for &id in *ids {
            min = Some(min.map_or(id, |m: u64| m.min(id)));
            max = Some(max.map_or(id, |m: u64| m.max(id)));
        }
    }
    Some((min?, max?))
}

/// Analyze every call site in `module`. `function_records` is the table the
/// Function-ID Assigner produced, keyed by mangled name; this is the join
/// key the Analyzer uses to turn a `Callee::Virtual`'s possible-target names
/// into an ID range, or a `Callee::Direct`'s target name into a single ID.
pub fn analyze_call_sites(
    module: &mut Module,
    function_records: &HashMap<String, FunctionRecord>,
    type_encoder: &mut TypeEncoder,
) -> AnalysisResult {
    let mut result = AnalysisResult::default();
    let mut pseudo = PseudoLocAllocator::new();

    for function in module.functions_mut() {
        let call_insts = function.calls();
        for inst in call_insts {
            // Borrow-split: read the callee shape, decide the site key and
            // record, then write the (possibly pseudo) loc back.
            let (callee, existing_loc) = match function.inst(inst) {
                InstData::Call { callee, debug_loc } => (callee.clone(), debug_loc.clone()),
                InstData::Return => unreachable!("calls() only returns Call instructions"),
            };

            let loc = match existing_loc {
                Some(loc) => loc,
                None => {
                    result.pseudo_locs_assigned += 1;
                    pseudo.allocate()
                }
            };
            let site_key = loc.site_key();

            if let InstData::Call { debug_loc, .. } = function.inst_mut(inst) {
                *debug_loc = Some(loc);
            }

            let record = match &callee {
                Callee::Tail(name) => {
                    result.reachable_callees.insert(name.clone());
                    CallSiteRecord {
                        site_key: site_key.clone(),
                        kind: CallSiteKind::Tail,
                        callee_name: CallSiteRecord::TAIL_CALLEE_NAME.to_string(),
                    }
                }
                Callee::Indirect { signature } => {
                    let type_id = type_encoder.get_type_id(signature);
                    CallSiteRecord {
                        site_key: site_key.clone(),
                        kind: CallSiteKind::Indirect { type_id },
                        callee_name: CallSiteRecord::indirect_callee_name(&site_key),
                    }
                }
                Callee::Direct(name) => {
                    result.reachable_callees.insert(name.clone());
                    let Some(record) = function_records.get(name) else {
                        log::warn!("static call to {name} has no assigned id, skipping");
                        continue;
                    };
                    let Some(&id) = record.ids.first() else {
                        continue;
                    };
                    CallSiteRecord {
                        site_key: site_key.clone(),
                        kind: CallSiteKind::Static { id },
                        callee_name: name.clone(),
                    }
                }
                Callee::Virtual { possible_targets } => {
                    result
                        .reachable_callees
                        .extend(possible_targets.iter().cloned());
                    let id_lists: Vec<&[u64]> = possible_targets
                        .iter()
                        .filter_map(|name| function_records.get(name))
                        .map(|record| record.ids.as_slice())
                        .collect();
                    let Some((min_id, max_id)) = virtual_target_range(&id_lists) else {
                        // Empty target set: skip, no metadata emitted
                        // (spec.md §7).
                        continue;
                    };
                    let class_hint = possible_targets.first().cloned().unwrap_or_default();
                    CallSiteRecord {
                        site_key: site_key.clone(),
                        kind: CallSiteKind::Virtual { min_id, max_id },
                        callee_name: class_hint,
                    }
                }
            };

            result.sites.insert(site_key, record);
        }
    }

    result
}
