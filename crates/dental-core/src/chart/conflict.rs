//! Surface conflict detection.
//!
//! Only completed treatments block a surface. Work on `entire` blocks every
//! surface of the tooth, and asking for `entire` is blocked by any completed
//! treatment on that tooth.

use serde::{Deserialize, Serialize};

use crate::models::{DentalChart, ProcedureEntry, Surface, ToothNumber, ToothRecord};

/// Details of the treatment that already occupies a surface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceConflict {
    pub tooth_number: ToothNumber,
    /// Surface that was requested
    pub surface: Surface,
    pub last_treated_at: String,
    pub last_procedure: String,
    pub suggestion: String,
}

impl SurfaceConflict {
    fn from_entry(tooth_number: ToothNumber, requested: Surface, entry: &ProcedureEntry) -> Self {
        let suggestion = if entry.surface.is_entire() {
            format!(
                "tooth {} was treated as a whole with {} on {}; record a follow-up instead",
                tooth_number, entry.name, entry.date
            )
        } else if requested.is_entire() {
            format!(
                "tooth {} already has {} on the {} surface from {}; \
                 review it before whole-tooth work",
                tooth_number, entry.name, entry.surface, entry.date
            )
        } else {
            format!(
                "tooth {} {} was treated with {} on {}; \
                 choose another surface or record a follow-up",
                tooth_number, requested, entry.name, entry.date
            )
        };

        Self {
            tooth_number,
            surface: requested,
            last_treated_at: entry.date.clone(),
            last_procedure: entry.name.clone(),
            suggestion,
        }
    }
}

fn blocks(entry: &ProcedureEntry, requested: Surface) -> bool {
    entry.is_completed_treatment()
        && (requested.is_entire() || entry.surface.is_entire() || entry.surface == requested)
}

pub fn is_surface_treated(
    chart: &DentalChart,
    tooth_number: ToothNumber,
    surface: Surface,
) -> bool {
    chart
        .tooth(tooth_number)
        .is_some_and(|record| record.procedures.iter().any(|e| blocks(e, surface)))
}

/// Most recent completed treatment blocking `surface`, if any.
pub fn find_conflict(
    chart: &DentalChart,
    tooth_number: ToothNumber,
    surface: Surface,
) -> Option<SurfaceConflict> {
    chart
        .tooth(tooth_number)
        .and_then(|record| conflict_in_record(record, surface))
}

pub(crate) fn conflict_in_record(
    record: &ToothRecord,
    surface: Surface,
) -> Option<SurfaceConflict> {
    record
        .procedures
        .iter()
        .filter(|e| blocks(e, surface))
        .max_by(|a, b| a.date.cmp(&b.date))
        .map(|entry| SurfaceConflict::from_entry(record.tooth_number, surface, entry))
}

/// Conflict raised by an entry that matched on its key.
pub(crate) fn conflict_with_entry(
    tooth_number: ToothNumber,
    surface: Surface,
    entry: &ProcedureEntry,
) -> SurfaceConflict {
    SurfaceConflict::from_entry(tooth_number, surface, entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntryKind, ProcedureStatus};

    fn tooth(n: i64) -> ToothNumber {
        ToothNumber::new(n).unwrap()
    }

    fn entry(
        kind: EntryKind,
        name: &str,
        surface: Surface,
        status: ProcedureStatus,
        date: &str,
    ) -> ProcedureEntry {
        let mut e = ProcedureEntry::new(kind, name.into(), surface, status);
        e.date = date.into();
        e
    }

    fn treated(name: &str, surface: Surface, date: &str) -> ProcedureEntry {
        entry(EntryKind::Treatment, name, surface, ProcedureStatus::Completed, date)
    }

    const JAN: &str = "2026-01-01T00:00:00+00:00";

    fn chart_with(n: i64, entries: Vec<ProcedureEntry>) -> DentalChart {
        let mut record = ToothRecord::new(tooth(n));
        record.procedures = entries;
        DentalChart::from(vec![record])
    }

    #[test]
    fn test_same_surface_conflicts_other_surface_free() {
        let chart = chart_with(
            14,
            vec![entry(
                EntryKind::Treatment,
                "Filling",
                Surface::Occlusal,
                ProcedureStatus::Completed,
                "2026-01-10T10:00:00+00:00",
            )],
        );

        assert!(is_surface_treated(&chart, tooth(14), Surface::Occlusal));
        assert!(!is_surface_treated(&chart, tooth(14), Surface::Mesial));

        let conflict = find_conflict(&chart, tooth(14), Surface::Occlusal).unwrap();
        assert_eq!(conflict.last_procedure, "Filling");
        assert_eq!(conflict.last_treated_at, "2026-01-10T10:00:00+00:00");
        assert!(conflict.suggestion.contains("tooth 14 occlusal"));
    }

    #[test]
    fn test_entire_blocks_every_surface() {
        let chart = chart_with(
            14,
            vec![entry(
                EntryKind::Treatment,
                "Extraction",
                Surface::Entire,
                ProcedureStatus::Completed,
                "2026-01-10T10:00:00+00:00",
            )],
        );

        for surface in Surface::ALL {
            assert!(is_surface_treated(&chart, tooth(14), surface), "{surface}");
        }
    }

    #[test]
    fn test_requesting_entire_conflicts_with_any_surface() {
        let chart = chart_with(
            3,
            vec![entry(
                EntryKind::Treatment,
                "Filling",
                Surface::Distal,
                ProcedureStatus::Completed,
                "2026-01-10T10:00:00+00:00",
            )],
        );

        let conflict = find_conflict(&chart, tooth(3), Surface::Entire).unwrap();
        assert_eq!(conflict.surface, Surface::Entire);
        assert!(conflict.suggestion.contains("distal"));
    }

    #[test]
    fn test_planned_and_conditions_do_not_block() {
        use ProcedureStatus::{Completed, Planned};
        let chart = chart_with(
            8,
            vec![
                entry(EntryKind::Treatment, "Crown", Surface::Entire, Planned, JAN),
                entry(EntryKind::Condition, "caries", Surface::Entire, Completed, JAN),
            ],
        );

        assert!(find_conflict(&chart, tooth(8), Surface::Entire).is_none());
        assert!(find_conflict(&chart, tooth(9), Surface::Entire).is_none());
    }

    #[test]
    fn test_most_recent_treatment_reported() {
        let chart = chart_with(
            19,
            vec![
                treated("Sealant", Surface::Occlusal, "2025-03-01T00:00:00+00:00"),
                treated("Filling", Surface::Occlusal, "2026-02-01T00:00:00+00:00"),
                treated("Scaling", Surface::Buccal, "2026-03-01T00:00:00+00:00"),
            ],
        );

        let conflict = find_conflict(&chart, tooth(19), Surface::Occlusal).unwrap();
        assert_eq!(conflict.last_procedure, "Filling");
    }

    #[test]
    fn test_conflict_serializes_camel_case() {
        let chart = chart_with(
            14,
            vec![treated("Filling", Surface::Occlusal, "2026-01-10T10:00:00+00:00")],
        );
        let conflict = find_conflict(&chart, tooth(14), Surface::Occlusal).unwrap();
        let json = serde_json::to_value(conflict).unwrap();
        assert_eq!(json["toothNumber"], 14);
        assert_eq!(json["lastProcedure"], "Filling");
        assert!(json.get("suggestion").is_some());
    }
}
