//! Context trimmer — bounds history to a character budget.
//!
//! Sliding window from newest to oldest: a turn is kept while the running
//! total (including it) stays within `max_chars`; the first turn that does
//! not fit ends the walk, so the result is always a suffix of the history.
//! The newest turn is kept even when it alone is over budget.

use chatrelay_config::{ContextConfig, OversizePolicy};
use chatrelay_core::Turn;

/// Keep the longest suffix of `history` whose total length fits `max_chars`.
///
/// A non-empty history never trims to nothing: an oversized newest turn is
/// returned alone, whole.
pub fn trim(history: &[Turn], max_chars: usize) -> Vec<Turn> {
    let mut used = 0;
    let mut start = history.len();

    for (idx, turn) in history.iter().enumerate().rev() {
        let len = turn.char_len();
        if used + len > max_chars {
            break;
        }
        used += len;
        start = idx;
    }

    if start == history.len() {
        // Newest turn alone is over budget.
        return history.last().cloned().into_iter().collect();
    }

    history[start..].to_vec()
}

/// Trimmer configured with a budget and an oversize policy.
#[derive(Debug, Clone, Copy)]
pub struct ContextTrimmer {
    pub max_chars: usize,
    pub oversize: OversizePolicy,
}

impl ContextTrimmer {
    pub fn new(max_chars: usize, oversize: OversizePolicy) -> Self {
        Self { max_chars, oversize }
    }

    pub fn from_config(config: &ContextConfig) -> Self {
        Self::new(config.max_chars, config.oversize_turn)
    }

    pub fn apply(&self, history: &[Turn]) -> Vec<Turn> {
        let mut bounded = trim(history, self.max_chars);

        if self.oversize == OversizePolicy::Truncate {
            if let [only] = bounded.as_mut_slice() {
                if only.char_len() > self.max_chars {
                    only.content = only.content.chars().take(self.max_chars).collect();
                }
            }
        }

        let dropped = history.len() - bounded.len();
        if dropped > 0 {
            tracing::debug!(
                dropped,
                kept = bounded.len(),
                max_chars = self.max_chars,
                "Oldest turns dropped (sliding window)"
            );
        }

        bounded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(lens: &[usize]) -> Vec<Turn> {
        lens.iter()
            .enumerate()
            .map(|(i, len)| {
                let content = "x".repeat(*len);
                if i % 2 == 0 { Turn::user(content) } else { Turn::assistant(content) }
            })
            .collect()
    }

    fn lens(turns: &[Turn]) -> Vec<usize> {
        turns.iter().map(Turn::char_len).collect()
    }

    #[test]
    fn empty_history_stays_empty() {
        assert!(trim(&[], 10).is_empty());
    }

    #[test]
    fn everything_fits() {
        let h = history(&[3, 3, 3]);
        assert_eq!(trim(&h, 9), h);
    }

    #[test]
    fn oldest_turns_dropped_first() {
        let h = history(&[5, 4, 3, 2]);
        assert_eq!(lens(&trim(&h, 6)), vec![3, 2]);
    }

    #[test]
    fn walk_stops_at_first_turn_that_does_not_fit() {
        // The 1-char turn would fit on its own but lies behind the 8-char one.
        let h = history(&[1, 8, 2]);
        assert_eq!(lens(&trim(&h, 5)), vec![2]);
    }

    #[test]
    fn oversized_newest_turn_kept_whole() {
        let h = history(&[2, 50]);
        assert_eq!(lens(&trim(&h, 10)), vec![50]);
    }

    #[test]
    fn truncate_policy_cuts_oversized_turn() {
        let h = history(&[2, 50]);
        let trimmer = ContextTrimmer::new(10, OversizePolicy::Truncate);
        assert_eq!(lens(&trimmer.apply(&h)), vec![10]);
    }

    #[test]
    fn truncate_policy_counts_characters() {
        let h = vec![Turn::user("مرحبا بالعالم")];
        let trimmer = ContextTrimmer::new(5, OversizePolicy::Truncate);
        assert_eq!(trimmer.apply(&h)[0].content, "مرحبا");
    }

    #[test]
    fn keep_policy_matches_free_function() {
        let h = history(&[4, 9, 1, 30]);
        let trimmer = ContextTrimmer::new(12, OversizePolicy::Keep);
        assert_eq!(trimmer.apply(&h), trim(&h, 12));
    }

    #[test]
    fn result_is_nonempty_suffix_within_budget() {
        let cases: &[&[usize]] = &[
            &[1],
            &[10, 10, 10],
            &[3, 7, 2, 9, 1],
            &[0, 0, 5],
            &[6, 6, 6, 6, 6, 6],
        ];
        for lens_in in cases {
            let h = history(lens_in);
            for max in 1..=20 {
                let out = trim(&h, max);
                assert!(!out.is_empty(), "empty result for {lens_in:?} / {max}");
                assert_eq!(out.as_slice(), &h[h.len() - out.len()..]);

                let every_turn_fits = lens_in.iter().all(|l| *l <= max);
                if every_turn_fits {
                    let total: usize = out.iter().map(Turn::char_len).sum();
                    assert!(total <= max, "{lens_in:?} / {max} kept {total}");
                }
            }
        }
    }

    #[test]
    fn trimming_is_idempotent() {
        let h = history(&[3, 7, 2, 9, 1, 40]);
        for max in [1, 5, 10, 39, 40, 41, 100] {
            for policy in [OversizePolicy::Keep, OversizePolicy::Truncate] {
                let trimmer = ContextTrimmer::new(max, policy);
                let once = trimmer.apply(&h);
                assert_eq!(trimmer.apply(&once), once);
            }
        }
    }
}
