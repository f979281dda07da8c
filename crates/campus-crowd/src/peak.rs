//! Peak-hour analysis over a day of hourly samples.

use crate::types::{HourlySample, PeakWindow, RankedHour};

/// The `n` busiest hours with a known reading, busiest first.
/// Equal popularity is broken by the earlier hour.
pub fn rank_top(samples: &[HourlySample], n: usize) -> Vec<RankedHour> {
    let mut ranked: Vec<RankedHour> = samples
        .iter()
        .filter_map(|s| {
            s.reading.popularity().map(|popularity| RankedHour {
                hour: s.hour,
                popularity,
            })
        })
        .collect();
    ranked.sort_by(|a, b| b.popularity.cmp(&a.popularity).then(a.hour.cmp(&b.hour)));
    ranked.truncate(n);
    ranked
}

/// Longest run of consecutive hours whose reading is at least `threshold`.
///
/// The earliest run wins on equal length. An unknown reading or a gap in
/// the hour sequence ends a run. With no qualifying hour the window is the
/// single busiest hour; `None` only when no hour has data.
pub fn peak_window(samples: &[HourlySample], threshold: u8) -> Option<PeakWindow> {
    let mut best: Option<PeakWindow> = None;
    let mut current: Option<PeakWindow> = None;

    for sample in samples {
        let hot = sample
            .reading
            .popularity()
            .is_some_and(|p| p.value() >= threshold);

        current = match (hot, current) {
            (false, _) => None,
            (true, Some(run)) if run.end_hour + 1 == sample.hour => Some(PeakWindow {
                start_hour: run.start_hour,
                end_hour: sample.hour,
            }),
            (true, _) => Some(PeakWindow {
                start_hour: sample.hour,
                end_hour: sample.hour,
            }),
        };

        if let Some(run) = current {
            let longer = best.map_or(true, |b| run_len(&run) > run_len(&b));
            if longer {
                best = Some(run);
            }
        }
    }

    best.or_else(|| {
        rank_top(samples, 1).first().map(|top| PeakWindow {
            start_hour: top.hour,
            end_hour: top.hour,
        })
    })
}

fn run_len(window: &PeakWindow) -> u32 {
    window.end_hour - window.start_hour + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_core::Popularity;

    fn samples(known: &[(u32, u8)]) -> Vec<HourlySample> {
        (7..23)
            .map(|hour| HourlySample {
                hour,
                reading: known
                    .iter()
                    .find(|(h, _)| *h == hour)
                    .and_then(|(_, v)| Popularity::new(*v))
                    .into(),
            })
            .collect()
    }

    fn ranked(pairs: &[(u32, u8)]) -> Vec<RankedHour> {
        pairs
            .iter()
            .map(|&(hour, v)| RankedHour {
                hour,
                popularity: Popularity::new(v).unwrap(),
            })
            .collect()
    }

    // ---- rank_top ----

    #[test]
    fn test_top_three_with_tie_on_earlier_hour() {
        let s = samples(&[(9, 40), (12, 78), (13, 78), (18, 55)]);
        assert_eq!(rank_top(&s, 3), ranked(&[(12, 78), (13, 78), (18, 55)]));
    }

    #[test]
    fn test_top_fewer_than_n() {
        let s = samples(&[(10, 20)]);
        assert_eq!(rank_top(&s, 3), ranked(&[(10, 20)]));
    }

    #[test]
    fn test_top_ignores_unknown() {
        let s = samples(&[]);
        assert!(rank_top(&s, 3).is_empty());
    }

    // ---- peak_window ----

    #[test]
    fn test_window_excludes_hours_below_threshold() {
        let s = samples(&[(11, 55), (12, 78), (13, 74), (14, 50)]);
        assert_eq!(
            peak_window(&s, 60),
            Some(PeakWindow {
                start_hour: 12,
                end_hour: 13
            })
        );
    }

    #[test]
    fn test_window_picks_longest_run() {
        let s = samples(&[(8, 90), (12, 65), (13, 70), (14, 61), (18, 99)]);
        assert_eq!(
            peak_window(&s, 60),
            Some(PeakWindow {
                start_hour: 12,
                end_hour: 14
            })
        );
    }

    #[test]
    fn test_window_earliest_on_equal_length() {
        let s = samples(&[(9, 60), (10, 61), (17, 90), (18, 95)]);
        assert_eq!(
            peak_window(&s, 60),
            Some(PeakWindow {
                start_hour: 9,
                end_hour: 10
            })
        );
    }

    #[test]
    fn test_window_threshold_is_inclusive() {
        let s = samples(&[(15, 60)]);
        assert_eq!(
            peak_window(&s, 60),
            Some(PeakWindow {
                start_hour: 15,
                end_hour: 15
            })
        );
    }

    #[test]
    fn test_window_unknown_breaks_run() {
        // Hour 12 has no data.
        let s = samples(&[(11, 70), (13, 70), (14, 70)]);
        assert_eq!(
            peak_window(&s, 60),
            Some(PeakWindow {
                start_hour: 13,
                end_hour: 14
            })
        );
    }

    #[test]
    fn test_window_falls_back_to_top_hour() {
        let s = samples(&[(9, 40), (12, 52), (13, 52)]);
        assert_eq!(
            peak_window(&s, 60),
            Some(PeakWindow {
                start_hour: 12,
                end_hour: 12
            })
        );
    }

    #[test]
    fn test_window_none_without_data() {
        assert_eq!(peak_window(&samples(&[]), 60), None);
        assert_eq!(peak_window(&[], 60), None);
    }
}
