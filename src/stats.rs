//! CSV statistics output (spec.md §6, "CSV outputs"; §5, path dedup).
//!
//! Two reports per compile unit: `<base>-Backend.csv` (per-ID hit counts,
//! from the Landing-Pad Materializer) and `<base>-SDStats.csv` (per-class
//! function dumps, from the Function-ID Assigner's records).

use crate::landingpad::MaterializeStats;
use crate::record::{FunctionFlags, FunctionKind, FunctionRecord};
use hashbrown::HashMap;
use std::path::{Path, PathBuf};

/// Render `<base>-Backend.csv`'s body: one `id,count` line per ID, sorted
/// by ID for deterministic output.
pub fn backend_csv(stats: &MaterializeStats) -> String {
    let mut ids: Vec<(&u64, &u32)> = stats.id_hit_counts.iter().collect();
    ids.sort_by_key(|(id, _)| **id);
    let mut out = String::new();
    for (id, count) in ids {
        out.push_str(&format!("{id},{count}\n"));
    }
    out
}

/// One line per function in a class dump: `name,id_1,id_2,...[,extra_id_1,
/// extra_id_2,...]`. `extra_ids` (the address-taken augmentation's
/// indirect-type-id and unknown-sentinel accounting, populated by
/// `retcheck::build_check_chain`) is appended after `ids`, matching the
/// original's `storeStatistics` appending `Entry.ExtraIDs` after `Entry.IDs`
/// in every per-class section.
fn function_line(record: &FunctionRecord) -> String {
    let mut line = record.name.clone();
    for id in &record.ids {
        line.push(',');
        line.push_str(&id.to_string());
    }
    for id in &record.extra_ids {
        line.push(',');
        line.push_str(&id.to_string());
    }
    line
}

/// Render `<base>-SDStats.csv`'s body: totals, then one section per class
/// (spec.md §6: "static / virtual / external / no-return / blacklisted").
/// A function can appear in both a kind section and a flag section (e.g.
/// an externally-linked static function appears under both `STATIC` and
/// `EXTERNAL`).
pub fn sdstats_csv(records: &HashMap<String, FunctionRecord>) -> String {
    let mut sorted: Vec<&FunctionRecord> = records.values().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    let static_fns: Vec<&&FunctionRecord> = sorted
        .iter()
        .filter(|r| r.kind == FunctionKind::Static)
        .collect();
    let virtual_fns: Vec<&&FunctionRecord> = sorted
        .iter()
        .filter(|r| r.kind == FunctionKind::Virtual)
        .collect();
    let blacklisted_fns: Vec<&&FunctionRecord> = sorted
        .iter()
        .filter(|r| r.kind == FunctionKind::BlackListed)
        .collect();
    let external_fns: Vec<&&FunctionRecord> = sorted
        .iter()
        .filter(|r| r.flags.contains(FunctionFlags::EXTERNAL))
        .collect();
    let no_return_fns: Vec<&&FunctionRecord> = sorted
        .iter()
        .filter(|r| r.flags.contains(FunctionFlags::NO_RETURN))
        .collect();

    let mut out = String::new();
    out.push_str(&format!("TOTAL_STATIC,{}\n", static_fns.len()));
    out.push_str(&format!("TOTAL_VIRTUAL,{}\n", virtual_fns.len()));
    out.push_str(&format!("TOTAL_EXTERNAL,{}\n", external_fns.len()));
    out.push_str(&format!("TOTAL_NO_RETURN,{}\n", no_return_fns.len()));
    out.push_str(&format!("TOTAL_BLACKLISTED,{}\n", blacklisted_fns.len()));

    for (header, group) in [
        ("STATIC", &static_fns),
        ("VIRTUAL", &virtual_fns),
        ("EXTERNAL", &external_fns),
        ("NO_RETURN", &no_return_fns),
        ("BLACKLISTED", &blacklisted_fns),
    ] {
        out.push_str(header);
        out.push('\n');
        for record in group {
            out.push_str(&function_line(record));
            out.push('\n');
        }
    }
    out
}

/// Resolve a collision-free report path of the form `<base>-<suffix>.csv`,
/// `<base>-<suffix>1.csv`, `<base>-<suffix>2.csv`, ... by incrementing a
/// numeric suffix until the candidate doesn't exist. The TOCTOU window
/// between this check and the caller's write is accepted (spec.md §5:
/// "compile artefacts are not adversarial").
pub fn dedup_report_path(base: &str, suffix: &str) -> PathBuf {
    let mut n = 0u32;
    loop {
        let candidate = if n == 0 {
            format!("{base}-{suffix}.csv")
        } else {
            format!("{base}-{suffix}{n}.csv")
        };
        let path = PathBuf::from(&candidate);
        if !path.exists() {
            return path;
        }
        n += 1;
    }
}

/// Write both reports under `base`, returning the paths used.
pub fn write_reports(
    base: &Path,
    stats: &MaterializeStats,
    records: &HashMap<String, FunctionRecord>,
) -> std::io::Result<(PathBuf, PathBuf)> {
    let base_str = base.to_string_lossy();
    let backend_path = dedup_report_path(&base_str, "Backend");
    let sdstats_path = dedup_report_path(&base_str, "SDStats");
    std::fs::write(&backend_path, backend_csv(stats))?;
    std::fs::write(&sdstats_path, sdstats_csv(records))?;
    Ok((backend_path, sdstats_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::SmallVec;

    #[test]
    fn backend_csv_sorted_by_id() {
        let mut stats = MaterializeStats::default();
        stats.id_hit_counts.insert(11, 2);
        stats.id_hit_counts.insert(3, 5);
        let csv = backend_csv(&stats);
        assert_eq!(csv, "3,5\n11,2\n");
    }

    #[test]
    fn sdstats_groups_by_kind_and_flags() {
        let mut records = HashMap::new();
        let mut ext_static = FunctionRecord::new(
            "_ZN1A3fooEv",
            FunctionKind::Static,
            SmallVec::from_slice(&[11]),
        );
        ext_static.flags = FunctionFlags::EXTERNAL;
        records.insert(ext_static.name.clone(), ext_static);
        records.insert(
            "_ZN1D1gEv".to_string(),
            FunctionRecord::new("_ZN1D1gEv", FunctionKind::Virtual, SmallVec::from_slice(&[3, 7])),
        );
        records.insert(
            "__cxa_throw".to_string(),
            FunctionRecord::blacklisted("__cxa_throw"),
        );

        let csv = sdstats_csv(&records);
        assert!(csv.contains("TOTAL_STATIC,1"));
        assert!(csv.contains("TOTAL_VIRTUAL,1"));
        assert!(csv.contains("TOTAL_EXTERNAL,1"));
        assert!(csv.contains("TOTAL_BLACKLISTED,1"));
        assert!(csv.contains("_ZN1D1gEv,3,7"));
    }

    #[test]
    fn function_line_appends_extra_ids_after_ids() {
        let mut record = FunctionRecord::new(
            "_Z8takesInti",
            FunctionKind::Static,
            SmallVec::from_slice(&[11]),
        );
        record.extra_ids = SmallVec::from_slice(&[0x7_FFFE, crate::record::UNKNOWN_ID]);
        assert_eq!(
            function_line(&record),
            format!("_Z8takesInti,11,{},{}", 0x7_FFFE, crate::record::UNKNOWN_ID)
        );
    }

    #[test]
    fn sdstats_csv_includes_extra_ids_in_function_line() {
        let mut record = FunctionRecord::new(
            "_Z8takesInti",
            FunctionKind::Static,
            SmallVec::from_slice(&[11]),
        );
        record.extra_ids = SmallVec::from_slice(&[0x7_FFFE]);
        let mut records = HashMap::new();
        records.insert(record.name.clone(), record);

        let csv = sdstats_csv(&records);
        assert!(csv.contains(&format!("_Z8takesInti,11,{}", 0x7_FFFE)));
    }

    #[test]
    fn dedup_path_increments_on_collision() {
        let dir = std::env::temp_dir().join(format!(
            "sd-retcfi-test-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let base = dir.join("unit").to_string_lossy().to_string();

        let first = dedup_report_path(&base, "Backend");
        std::fs::write(&first, "x").unwrap();
        let second = dedup_report_path(&base, "Backend");
        assert_ne!(first, second);
        assert!(second.to_string_lossy().ends_with("Backend1.csv"));

        std::fs::remove_dir_all(&dir).ok();
    }
}
