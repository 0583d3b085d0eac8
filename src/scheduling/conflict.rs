use chrono::{DateTime, Utc};

use super::SchedulingError;
use crate::models::Appointment;

/// Half-open intersection of `[a_start, a_end)` and `[b_start, b_end)`.
/// Touching intervals (one ends exactly where the other starts) do not overlap.
pub fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// Rejects the slot if any of `existing` intersects it. The earliest clash is reported.
pub(crate) fn ensure_free(
    existing: &[Appointment],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<(), SchedulingError> {
    let clash = existing
        .iter()
        .filter(|a| overlaps(a.start_time, a.end_time, start, end))
        .min_by_key(|a| (a.start_time, a.appointment_id));

    match clash {
        Some(a) => Err(SchedulingError::SlotConflict {
            conflicting_id: a.appointment_id,
            start: a.start_time,
            end: a.end_time,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn at(min: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_741_597_200, 0).unwrap() + TimeDelta::minutes(min)
    }

    #[test]
    fn partial_overlap_from_either_side() {
        assert!(overlaps(at(0), at(30), at(15), at(45)));
        assert!(overlaps(at(15), at(45), at(0), at(30)));
    }

    #[test]
    fn containment_either_direction() {
        assert!(overlaps(at(0), at(60), at(15), at(30)));
        assert!(overlaps(at(15), at(30), at(0), at(60)));
        assert!(overlaps(at(0), at(30), at(0), at(30)));
    }

    #[test]
    fn back_to_back_is_free() {
        assert!(!overlaps(at(0), at(30), at(30), at(60)));
        assert!(!overlaps(at(30), at(60), at(0), at(30)));
    }

    #[test]
    fn disjoint_is_free() {
        assert!(!overlaps(at(0), at(30), at(45), at(60)));
    }

    #[test]
    fn exhaustive_grid_matches_pointwise_definition() {
        // Two intervals overlap iff some minute lies in both.
        for a1 in 0..6 {
            for a2 in (a1 + 1)..7 {
                for b1 in 0..6 {
                    for b2 in (b1 + 1)..7 {
                        let shared = (0..7).any(|m| a1 <= m && m < a2 && b1 <= m && m < b2);
                        assert_eq!(
                            overlaps(at(a1), at(a2), at(b1), at(b2)),
                            shared,
                            "[{a1},{a2}) vs [{b1},{b2})"
                        );
                    }
                }
            }
        }
    }
}
