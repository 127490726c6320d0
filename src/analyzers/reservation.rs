//! Reservation roster expansion for the comparison chart.

use chrono::Duration;

use crate::records::{Reservation, ReservationSlot};

/// One slot per `width` step from check-in up to and including check-out.
///
/// Steps start at the check-in time itself, not at a bucket boundary.
/// Rows missing either time, or checking out before checking in, yield
/// nothing.
pub fn expand_reservations(reservations: &[Reservation], width: Duration) -> Vec<ReservationSlot> {
    let step = if width > Duration::zero() { width } else { Duration::minutes(1) };

    let mut slots = Vec::new();
    for r in reservations {
        let (Some(start), Some(end)) = (r.check_in, r.check_out) else {
            continue;
        };
        let mut at = start;
        while at <= end {
            slots.push(ReservationSlot {
                datetime: at,
                user: r.user.clone(),
                seat_number: r.seat_number.clone(),
                area: r.area.clone(),
            });
            at += step;
        }
    }
    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_datetime;

    fn reservation(check_in: &str, check_out: &str) -> Reservation {
        Reservation {
            user: "Sato".to_string(),
            check_in: parse_datetime(check_in),
            check_out: parse_datetime(check_out),
            seat_number: Some("A-12".to_string()),
            area: Some("North".to_string()),
        }
    }

    #[test]
    fn test_expansion_includes_end() {
        let slots = expand_reservations(
            &[reservation("2025-09-01 09:00:00", "2025-09-01 09:15:00")],
            Duration::minutes(5),
        );
        let times: Vec<_> = slots.iter().map(|s| s.datetime.format("%H:%M").to_string()).collect();
        assert_eq!(times, vec!["09:00", "09:05", "09:10", "09:15"]);
        assert!(slots.iter().all(|s| s.area.as_deref() == Some("North")));
    }

    #[test]
    fn test_unaligned_check_in_is_kept() {
        let slots = expand_reservations(
            &[reservation("2025-09-01 09:02:00", "2025-09-01 09:11:00")],
            Duration::minutes(5),
        );
        let times: Vec<_> = slots.iter().map(|s| s.datetime.format("%H:%M").to_string()).collect();
        assert_eq!(times, vec!["09:02", "09:07"]);
    }

    #[test]
    fn test_inverted_or_missing_times_yield_nothing() {
        let mut open = reservation("2025-09-01 09:00:00", "2025-09-01 09:00:00");
        open.check_out = None;
        let inverted = reservation("2025-09-01 10:00:00", "2025-09-01 09:00:00");
        assert!(expand_reservations(&[open, inverted], Duration::minutes(5)).is_empty());
    }
}
