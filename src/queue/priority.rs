//! Sparse priority arithmetic.
//!
//! Priorities are a float-keyed index, not array positions: a move writes one
//! record and never renumbers its siblings. All functions take the pending
//! priorities as read at call time.

use uuid::Uuid;

use crate::models::Feature;

/// Priority for the first feature appended to an empty backlog.
pub const APPEND_BASELINE: f64 = 1.0;

/// How far a single "move up" lowers a priority.
///
/// One move overtakes the immediate neighbour at integer spacing. In a crowded
/// region a move may overtake nothing; [`compact`] restores the spacing.
pub const MOVE_UP_DELTA: f64 = 1.5;

fn min(priorities: impl IntoIterator<Item = f64>) -> Option<f64> {
    priorities.into_iter().reduce(f64::min)
}

fn max(priorities: impl IntoIterator<Item = f64>) -> Option<f64> {
    priorities.into_iter().reduce(f64::max)
}

/// Priority for a feature added behind every pending one.
pub fn append(pending: impl IntoIterator<Item = f64>) -> f64 {
    max(pending).map_or(APPEND_BASELINE, |max| max + 1.0)
}

/// Priority for a feature that must be picked next ("start now").
///
/// `0.0` while every pending priority is positive, otherwise one below the
/// current minimum.
pub fn front(pending: impl IntoIterator<Item = f64>) -> f64 {
    match min(pending) {
        Some(min) if min <= 0.0 => min - 1.0,
        _ => 0.0,
    }
}

/// Priority that puts a pending feature ahead of every pending feature,
/// itself included.
pub fn top(pending: impl IntoIterator<Item = f64>, current: f64) -> f64 {
    min(pending).map_or(current, |min| min.min(current)) - 1.0
}

/// Priority one step closer to the front.
pub fn move_up(current: f64) -> f64 {
    current - MOVE_UP_DELTA
}

/// Rewrite `ordered` (pending features, queue order) to priorities `1, 2, 3, ...`.
///
/// Returns only the features whose priority actually changes.
pub fn compact<'a>(ordered: impl IntoIterator<Item = &'a Feature>) -> Vec<(Uuid, f64)> {
    ordered
        .into_iter()
        .enumerate()
        .filter_map(|(index, feature)| {
            let priority = APPEND_BASELINE + index as f64;
            (feature.priority != priority).then_some((feature.id, priority))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_goes_behind_the_maximum() {
        assert_eq!(append([3.0, 7.5, -2.0]), 8.5);
        assert_eq!(append(std::iter::empty()), APPEND_BASELINE);
    }

    #[test]
    fn front_sorts_before_everything() {
        assert_eq!(front([1.0, 2.0]), 0.0);
        assert_eq!(front(std::iter::empty()), 0.0);
        assert_eq!(front([0.0, 4.0]), -1.0);
        assert_eq!(front([-3.5, 4.0]), -4.5);

        for pending in [vec![0.5, 3.0], vec![0.0], vec![-10.0, 0.0, 10.0]] {
            let p = front(pending.iter().copied());
            assert!(pending.iter().all(|&other| p <= other));
        }
    }

    #[test]
    fn top_is_strictly_below_every_pending() {
        let pending = [4.0, 2.0, 9.0];
        let p = top(pending, 9.0);
        assert_eq!(p, 1.0);
        assert!(pending.iter().all(|&other| p < other));
    }

    #[test]
    fn top_of_single_feature_still_moves_down() {
        assert_eq!(top(std::iter::empty(), 5.0), 4.0);
        assert_eq!(top([5.0], 5.0), 4.0);
    }

    #[test]
    fn move_up_overtakes_the_neighbour_at_integer_spacing() {
        let neighbour = 3.0;
        let current = 4.0;
        assert!(move_up(current) < neighbour);
    }

    #[test]
    fn repeated_move_up_keeps_a_total_order() {
        let mut p = 10.0;
        for _ in 0..20 {
            let next = move_up(p);
            assert!(next < p);
            assert!(next.is_finite());
            p = next;
        }
    }
}
