use crate::model::*;

/// Reservations in a start-sorted schedule that overlap `window`.
/// Everything from the first reservation starting at or after `window.end` is skipped.
pub fn overlapping<'a>(
    schedule: &'a [Reservation],
    window: &DateRange,
) -> impl Iterator<Item = &'a Reservation> {
    let right_bound = schedule.partition_point(|r| r.start_date < window.end);
    schedule[..right_bound]
        .iter()
        .filter(move |r| r.end_date > window.start)
}

/// True when no reservation in `schedule` other than `exclude` overlaps `candidate`.
pub fn is_available(
    schedule: &[Reservation],
    candidate: &DateRange,
    exclude: Option<ReservationId>,
) -> bool {
    !overlapping(schedule, candidate).any(|r| Some(r.id) != exclude)
}

/// Merge sorted ranges that overlap or touch.
pub fn merge_overlapping(sorted: &[DateRange]) -> Vec<DateRange> {
    let mut merged: Vec<DateRange> = Vec::new();
    for &range in sorted {
        if let Some(last) = merged.last_mut()
            && range.start <= last.end
        {
            last.end = last.end.max(range.end);
            continue;
        }
        merged.push(range);
    }
    merged
}

/// Parts of `window` not covered by the sorted, disjoint `taken` ranges.
pub fn subtract(window: &DateRange, taken: &[DateRange]) -> Vec<DateRange> {
    let mut free = Vec::new();
    let mut cursor = window.start;
    for t in taken {
        if t.end <= cursor {
            continue;
        }
        if t.start >= window.end {
            break;
        }
        if t.start > cursor {
            free.push(DateRange::new(cursor, t.start));
        }
        cursor = cursor.max(t.end);
    }
    if cursor < window.end {
        free.push(DateRange::new(cursor, window.end));
    }
    free
}

/// Maximal free windows of a room inside `window`.
pub fn free_windows(schedule: &[Reservation], window: &DateRange) -> Vec<DateRange> {
    let taken: Vec<DateRange> = overlapping(schedule, window).map(|r| r.range()).collect();
    subtract(window, &merge_overlapping(&taken))
}
