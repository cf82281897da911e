use webcloud_core::{RankedTerm, SizeProfile, WeightedTerm};

/// Map counts to render weights on a log scale normalized against the batch's own
/// min/max counts. Equal counts (or a single term) all get `profile.min`.
pub fn map_weights(ranked: &[RankedTerm], profile: SizeProfile) -> Vec<WeightedTerm> {
    let (lo_w, hi_w) = ordered_bounds(profile);
    let Some(min_count) = ranked.iter().map(|r| r.count).min() else {
        return Vec::new();
    };
    let max_count = ranked.iter().map(|r| r.count).max().unwrap_or(min_count);

    let ln_min = ((min_count as f64) + 1.0).ln();
    let ln_max = ((max_count as f64) + 1.0).ln();
    let span = ln_max - ln_min;

    ranked
        .iter()
        .map(|r| {
            let weight = if span <= 0.0 {
                lo_w
            } else {
                let ratio = (((r.count as f64) + 1.0).ln() - ln_min) / span;
                clamp(lo_w + ratio * (hi_w - lo_w), lo_w, hi_w)
            };
            WeightedTerm {
                term: r.term.clone(),
                weight,
            }
        })
        .collect()
}

/// Profile bounds with min <= max; NaN bounds collapse to the other bound.
fn ordered_bounds(profile: SizeProfile) -> (f64, f64) {
    let (a, b) = (profile.min, profile.max);
    match (a.is_nan(), b.is_nan()) {
        (true, true) => (0.0, 0.0),
        (true, false) => (b, b),
        (false, true) => (a, a),
        (false, false) => (a.min(b), a.max(b)),
    }
}

// `f64::clamp` panics on lo > hi; bounds are pre-ordered but NaN inputs still fall to `lo`.
fn clamp(v: f64, lo: f64, hi: f64) -> f64 {
    if v.is_nan() || v < lo {
        lo
    } else if v > hi {
        hi
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ranked(counts: &[(&str, u64)]) -> Vec<RankedTerm> {
        counts
            .iter()
            .enumerate()
            .map(|(i, (t, c))| RankedTerm {
                term: t.to_string(),
                count: *c,
                rank: i + 1,
            })
            .collect()
    }

    #[test]
    fn equal_counts_all_get_min() {
        let out = map_weights(
            &ranked(&[("a", 10), ("b", 10), ("c", 10)]),
            SizeProfile::custom(10.0, 50.0),
        );
        assert!(out.iter().all(|w| w.weight == 10.0));
    }

    #[test]
    fn top_term_gets_max_and_bottom_gets_min() {
        let out = map_weights(
            &ranked(&[("rust", 7), ("code", 3), ("web", 1)]),
            SizeProfile::MEDIUM,
        );
        assert_eq!(out[0].weight, 60.0);
        assert_eq!(out[2].weight, 16.0);
        assert!(out[1].weight > 16.0 && out[1].weight < 60.0);
        // ln(4) sits halfway between ln(2) and ln(8) on the log scale.
        assert!((out[1].weight - 38.0).abs() < 1e-9);
    }

    #[test]
    fn empty_and_single_inputs() {
        assert!(map_weights(&[], SizeProfile::SMALL).is_empty());
        let out = map_weights(&ranked(&[("solo", 4)]), SizeProfile::LARGE);
        assert_eq!(out[0].weight, 20.0);
    }

    #[test]
    fn inverted_profile_bounds_do_not_panic() {
        let out = map_weights(
            &ranked(&[("a", 5), ("b", 1)]),
            SizeProfile::custom(60.0, 16.0),
        );
        assert_eq!(out[0].weight, 60.0);
        assert_eq!(out[1].weight, 16.0);
    }

    proptest! {
        #[test]
        fn weights_stay_within_profile(
            mut counts in prop::collection::vec(1u64..10_000, 1..60),
            profile_idx in 0usize..3,
        ) {
            counts.sort_unstable_by(|a, b| b.cmp(a));
            let terms: Vec<RankedTerm> = counts
                .iter()
                .enumerate()
                .map(|(i, c)| RankedTerm { term: format!("t{i}"), count: *c, rank: i + 1 })
                .collect();
            let profile = SizeProfile::PRESETS[profile_idx];
            let out = map_weights(&terms, profile);
            prop_assert_eq!(out.len(), terms.len());
            for w in &out {
                prop_assert!(w.weight >= profile.min && w.weight <= profile.max);
            }
            if counts[0] != counts[counts.len() - 1] {
                prop_assert_eq!(out[0].weight, profile.max);
            }
            for pair in out.windows(2) {
                prop_assert!(pair[0].weight >= pair[1].weight);
            }
        }
    }
}
