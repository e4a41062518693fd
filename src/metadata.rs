//! Named-metadata wire format (spec.md §6): the comma-separated entries that
//! are the sole durable contract crossing the IR/machine-code boundary.
//!
//! Every serializer here is deliberately lossy in the same places the
//! reference implementation is lossy (e.g. class/precise names are
//! diagnostic only and never round-trip through a real type); every field
//! the Landing-Pad Materializer actually *checks against* round-trips
//! exactly.

use crate::record::{CallSiteKind, CallSiteRecord, FunctionKind, FunctionRecord};
use smallvec::SmallVec;
use std::fmt;

/// Named-metadata key prefixes, stable within this crate (spec.md §6:
/// "exact metadata keys are implementation-chosen but must be stable within
/// a toolchain").
pub mod keys {
    pub const FUNCINFO_NORMAL: &str = "sd.funcinfo.normal/";
    pub const FUNCINFO_VIRTUAL: &str = "sd.funcinfo.virtual/";
    pub const FUNCINFO_BLACKLIST: &str = "sd.funcinfo.blacklist/";
    pub const RETURN_VIRTUAL: &str = "sd.return.virtual";
    pub const RETURN_NORMAL: &str = "sd.return.normal";
}

/// A metadata entry failed to parse back into a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataParseError {
    pub entry: String,
    pub reason: &'static str,
}

impl fmt::Display for MetadataParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed metadata entry {:?}: {}", self.entry, self.reason)
    }
}

impl std::error::Error for MetadataParseError {}

fn err(entry: &str, reason: &'static str) -> MetadataParseError {
    MetadataParseError {
        entry: entry.to_string(),
        reason,
    }
}

/// Serialize one [`FunctionRecord`] to its named-metadata entry, keyed by
/// `FUNCINFO_{NORMAL,VIRTUAL,BLACKLIST}/<name>` (spec.md §6).
///
/// Returns `(metadata_name, entry)`. `BlackListed` records carry just the
/// name, per `FUNCINFO_BLACKLIST/<name> = (name)`.
pub fn serialize_function_record(record: &FunctionRecord) -> (String, String) {
    match record.kind {
        FunctionKind::BlackListed => (
            format!("{}{}", keys::FUNCINFO_BLACKLIST, record.name),
            record.name.clone(),
        ),
        FunctionKind::Static => {
            let mut entry = record.name.clone();
            if let Some(&id) = record.ids.first() {
                entry.push_str(&format!(",{id}"));
            }
            if let Some(type_id) = record.type_id {
                entry.push_str(&format!(",{type_id}"));
            }
            (format!("{}{}", keys::FUNCINFO_NORMAL, record.name), entry)
        }
        FunctionKind::Virtual => {
            let mut entry = format!("{},{}", record.name, record.ids.len());
            for id in &record.ids {
                entry.push_str(&format!(",{id}"));
            }
            if let Some(type_id) = record.type_id {
                entry.push_str(&format!(",{type_id}"));
            }
            (format!("{}{}", keys::FUNCINFO_VIRTUAL, record.name), entry)
        }
    }
}

/// Parse a `FUNCINFO_NORMAL` entry: `name, id [, type_id]`.
pub fn parse_normal_entry(entry: &str) -> Result<FunctionRecord, MetadataParseError> {
    let parts: Vec<&str> = entry.split(',').collect();
    if parts.len() < 2 {
        return Err(err(entry, "normal entry needs at least name,id"));
    }
    let name = parts[0];
    let id: u64 = parts[1]
        .parse()
        .map_err(|_| err(entry, "id is not a valid integer"))?;
    let mut record =
        FunctionRecord::new(name, FunctionKind::Static, SmallVec::from_slice(&[id]));
    if let Some(type_id_str) = parts.get(2) {
        record.type_id = Some(
            type_id_str
                .parse()
                .map_err(|_| err(entry, "type_id is not a valid integer"))?,
        );
    }
    Ok(record)
}

/// Parse a `FUNCINFO_VIRTUAL` entry: `name, id_count, id_1...id_k [, type_id]`.
pub fn parse_virtual_entry(entry: &str) -> Result<FunctionRecord, MetadataParseError> {
    let parts: Vec<&str> = entry.split(',').collect();
    if parts.len() < 2 {
        return Err(err(entry, "virtual entry needs at least name,id_count"));
    }
    let name = parts[0];
    let id_count: usize = parts[1]
        .parse()
        .map_err(|_| err(entry, "id_count is not a valid integer"))?;
    if parts.len() < 2 + id_count {
        return Err(err(entry, "fewer ids present than id_count claims"));
    }
    let mut ids = SmallVec::new();
    for raw in &parts[2..2 + id_count] {
        ids.push(
            raw.parse::<u64>()
                .map_err(|_| err(entry, "id is not a valid integer"))?,
        );
    }
    let mut record = FunctionRecord::new(name, FunctionKind::Virtual, ids);
    if let Some(type_id_str) = parts.get(2 + id_count) {
        record.type_id = Some(
            type_id_str
                .parse()
                .map_err(|_| err(entry, "type_id is not a valid integer"))?,
        );
    }
    Ok(record)
}

/// Parse a `FUNCINFO_BLACKLIST` entry: just `name`.
pub fn parse_blacklist_entry(entry: &str) -> FunctionRecord {
    FunctionRecord::blacklisted(entry)
}

/// Serialize one [`CallSiteRecord`] into its `sd.return.{virtual,normal}`
/// entry. `class_name`/`precise_name` are diagnostic-only strings the
/// original carries for human-readable reports; this IR has no real class
/// hierarchy to draw them from, so the call site's `callee_name` doubles
/// for both, matching the degraded-but-valid shape spec.md §7 allows for
/// missing debug information.
pub fn serialize_call_site(record: &CallSiteRecord) -> (&'static str, String) {
    match record.kind {
        CallSiteKind::Virtual { min_id, max_id } => {
            let entry = format!(
                "{},{},{},{},{},{}",
                record.site_key, record.callee_name, record.callee_name, record.callee_name,
                min_id, max_id
            );
            (keys::RETURN_VIRTUAL, entry)
        }
        CallSiteKind::Static { id } => {
            let entry = format!("{},{},{}", record.site_key, record.callee_name, id);
            (keys::RETURN_NORMAL, entry)
        }
        CallSiteKind::Indirect { type_id } => {
            let entry = format!("{},{},{}", record.site_key, record.callee_name, type_id);
            (keys::RETURN_NORMAL, entry)
        }
        CallSiteKind::Tail => {
            let entry = format!("{},{}", record.site_key, record.callee_name);
            (keys::RETURN_NORMAL, entry)
        }
    }
}

/// Parse a `sd.return.virtual` entry: `loc, class, precise, callee, min, max`.
pub fn parse_virtual_call_site(entry: &str) -> Result<CallSiteRecord, MetadataParseError> {
    let parts: Vec<&str> = entry.split(',').collect();
    if parts.len() != 6 {
        return Err(err(entry, "virtual call site entry needs exactly 6 fields"));
    }
    let min_id: u64 = parts[4]
        .parse()
        .map_err(|_| err(entry, "min is not a valid integer"))?;
    let max_id: u64 = parts[5]
        .parse()
        .map_err(|_| err(entry, "max is not a valid integer"))?;
    Ok(CallSiteRecord {
        site_key: parts[0].to_string(),
        kind: CallSiteKind::Virtual { min_id, max_id },
        callee_name: parts[3].to_string(),
    })
}

/// Parse a `sd.return.normal` entry: `loc, callee [, id]`. A tail call or an
/// indirect call is distinguished, on re-parse, by the callee-name
/// convention (`__TAIL__`, `__INDIRECT__<loc>`) spec.md §3 specifies — the
/// same way the Materializer itself would tell them apart if re-reading
/// its own output.
pub fn parse_normal_call_site(entry: &str) -> Result<CallSiteRecord, MetadataParseError> {
    let parts: Vec<&str> = entry.split(',').collect();
    if parts.len() < 2 {
        return Err(err(entry, "normal call site entry needs at least loc,callee"));
    }
    let site_key = parts[0].to_string();
    let callee_name = parts[1].to_string();

    if callee_name == CallSiteRecord::TAIL_CALLEE_NAME {
        return Ok(CallSiteRecord {
            site_key,
            kind: CallSiteKind::Tail,
            callee_name,
        });
    }

    let id: u64 = parts
        .get(2)
        .ok_or_else(|| err(entry, "normal call site entry missing id"))?
        .parse()
        .map_err(|_| err(entry, "id is not a valid integer"))?;

    if callee_name.starts_with("__INDIRECT__") {
        return Ok(CallSiteRecord {
            site_key,
            kind: CallSiteKind::Indirect {
                type_id: id as u32,
            },
            callee_name,
        });
    }

    Ok(CallSiteRecord {
        site_key,
        kind: CallSiteKind::Static { id },
        callee_name,
    })
}
