//! Component B — the Function-ID Assigner (spec.md §4.B).
//!
//! Runs once per module, after `CHA::build_function_info`. Classifies every
//! function as blacklisted, virtual, or static and assigns its ID(s); fresh
//! static IDs are handed out monotonically above `CHA.max_id()`.

use crate::cha::ClassHierarchyAnalysis;
use crate::encode::TypeEncoder;
use crate::ir::{Function, Module};
use crate::record::{FunctionKind, FunctionRecord};
use hashbrown::HashMap;
use smallvec::SmallVec;

/// Prefixes/names that exclude a function from protection outright,
/// checked before anything else because it's the cheapest test (spec.md
/// §4.B, step 1).
fn is_blacklisted(name: &str) -> bool {
    name.starts_with("__")
        || name.starts_with("llvm.")
        || name == "_Znwm"
        || name == "main"
        || name.starts_with("_GLOBAL_")
}

/// Itanium complete/base-object/allocating constructor suffixes: a
/// constructor is never itself a virtual override target even though its
/// mangled name starts with `_Z` (spec.md §4.B, step 2).
const CONSTRUCTOR_SUFFIXES: [&str; 3] = ["C0Ev", "C1Ev", "C2Ev"];

fn is_constructor(name: &str) -> bool {
    CONSTRUCTOR_SUFFIXES.iter().any(|s| name.ends_with(s))
}

/// Recover the underlying `_Z`-prefixed symbol a non-virtual thunk adjusts
/// for, e.g. `_ZTh0_N1D1gEv` → `_ZN1D1gEv`.
///
/// This reproduces the reference implementation's
/// `name.drop_front(1).split("_")` bit for bit: drop the leading `_`,
/// split on the *first* remaining `_`, and glue `_Z` back onto the tail.
fn thunk_underlying_symbol(name: &str) -> Option<String> {
    let without_leading_underscore = name.strip_prefix('_')?;
    let (_head, tail) = without_leading_underscore.split_once('_')?;
    Some(format!("_Z{tail}"))
}

fn is_virtual_candidate(name: &str, cha: &impl ClassHierarchyAnalysis) -> bool {
    if !name.starts_with("_Z") {
        return false;
    }
    if is_constructor(name) {
        return false;
    }
    if name.starts_with("_ZTh") {
        return true;
    }
    !cha.function_id(name).is_empty()
}

/// Outcome of classifying and assigning one function, reported alongside
/// the module-level `FUNCINFO_*` metadata it corresponds to (spec.md §6,
/// §7's two distinct warn-and-continue rows).
#[derive(Debug)]
pub enum AssignOutcome {
    Assigned,
    /// A `_Z...` function CHA doesn't recognize as virtual despite looking
    /// like one, and that isn't a thunk either. No checks are ever inserted
    /// for this function (spec.md §7, "Virtual symbol not in CHA and not a
    /// recognizable thunk").
    VirtualWithoutId { name: String },
    /// A `_ZTh...` thunk whose recovered underlying symbol CHA has no IDs
    /// for (or whose name doesn't even parse as a thunk) (spec.md §7,
    /// "Thunk whose underlying symbol has no CHA IDs").
    UnresolvableThunk { name: String },
}

impl From<AssignOutcome> for crate::errors::SdError {
    fn from(outcome: AssignOutcome) -> Self {
        match outcome {
            AssignOutcome::Assigned => {
                unreachable!("Assigned is not a warning outcome")
            }
            AssignOutcome::VirtualWithoutId { name } => {
                crate::errors::SdError::VirtualWithoutId { name }
            }
            AssignOutcome::UnresolvableThunk { name } => {
                crate::errors::SdError::UnresolvableThunk { thunk: name }
            }
        }
    }
}

/// Assigns every function in `module` a [`FunctionRecord`], using `cha` for
/// virtual IDs and the ceiling for static IDs. Returns the records keyed by
/// mangled name (the sole linking identifier downstream passes use) plus
/// any warnings raised along the way.
pub fn assign_function_ids(
    module: &Module,
    cha: &impl ClassHierarchyAnalysis,
    type_encoder: &mut TypeEncoder,
) -> (HashMap<String, FunctionRecord>, Vec<AssignOutcome>) {
    let mut records = HashMap::new();
    let mut outcomes = Vec::new();
    let mut next_static_id = cha.max_id() + 1;

    for function in module.functions() {
        let name = function.mangled_name.as_str();

        if is_blacklisted(name) {
            records.insert(name.to_string(), FunctionRecord::blacklisted(name));
            continue;
        }

        if is_virtual_candidate(name, cha) {
            match classify_virtual(function, cha, type_encoder) {
                Ok(record) => {
                    records.insert(name.to_string(), record);
                }
                Err(outcome) => {
                    log::warn!("{name}: {outcome:?}");
                    outcomes.push(outcome);
                    // No checks are installed for a function with an empty
                    // ID list; record it anyway so downstream passes see
                    // exactly one record per function (spec.md §8,
                    // property 1).
                    records.insert(
                        name.to_string(),
                        FunctionRecord::new(name, FunctionKind::Virtual, SmallVec::new()),
                    );
                }
            }
            continue;
        }

        // Static is the fallback for everything else; the classifier is
        // total by construction (spec.md §4.B, "Failure mode").
        let id = next_static_id;
        next_static_id += 1;
        let mut record =
            FunctionRecord::new(name, FunctionKind::Static, SmallVec::from_slice(&[id]));
        if function.has_address_taken() {
            record.type_id = Some(type_encoder.get_type_id(&function.signature));
        }
        log::debug!("function (static) {name} gets id {id}");
        records.insert(name.to_string(), record);
    }

    (records, outcomes)
}

fn classify_virtual(
    function: &Function,
    cha: &impl ClassHierarchyAnalysis,
    type_encoder: &mut TypeEncoder,
) -> Result<FunctionRecord, AssignOutcome> {
    let name = function.mangled_name.as_str();
    let mut ids = cha.function_id(name);

    let underlying;
    if ids.is_empty() {
        if !name.starts_with("_ZTh") {
            return Err(AssignOutcome::VirtualWithoutId {
                name: name.to_string(),
            });
        }
        underlying = thunk_underlying_symbol(name).ok_or_else(|| AssignOutcome::UnresolvableThunk {
            name: name.to_string(),
        })?;
        ids = cha.function_id(&underlying);
        if ids.is_empty() {
            return Err(AssignOutcome::UnresolvableThunk {
                name: name.to_string(),
            });
        }
    }

    if ids.len() > 1 {
        log::debug!("{name} has {} ids (diamond inheritance)", ids.len());
    }

    let mut record =
        FunctionRecord::new(name, FunctionKind::Virtual, SmallVec::from_slice(ids));
    if function.has_address_taken() {
        record.type_id = Some(type_encoder.get_type_id(&function.signature));
    }
    Ok(record)
}
