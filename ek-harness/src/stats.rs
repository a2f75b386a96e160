use serde::Serialize;

/// Order statistics over a set of latency samples, in milliseconds.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct LatencySummary {
    pub min_ms: f64,
    pub max_ms: f64,
    pub median_ms: f64,
    pub p95_ms: f64,
}

impl LatencySummary {
    /// Summarize the given samples, `None` if there are none.
    ///
    /// The median of an even number of samples is the mean of the two middle ones,
    /// P95 is the sample at index `floor(n * 0.95)` of the sorted samples.
    pub fn from_samples(samples: &[f64]) -> Option<LatencySummary> {
        if samples.is_empty() {
            return None;
        }

        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);
        let n = sorted.len();

        let median_ms = if n % 2 == 0 {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        } else {
            sorted[n / 2]
        };
        let p95_index = ((n as f64 * 0.95).floor() as usize).min(n - 1);

        Some(LatencySummary {
            min_ms: sorted[0],
            max_ms: sorted[n - 1],
            median_ms,
            p95_ms: sorted[p95_index],
        })
    }
}

pub fn mean(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        None
    } else {
        Some(samples.iter().sum::<f64>() / samples.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty() {
        assert_eq!(LatencySummary::from_samples(&[]), None);
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn single() {
        let summary = LatencySummary::from_samples(&[4.0]).unwrap();
        assert_eq!(summary.min_ms, 4.0);
        assert_eq!(summary.max_ms, 4.0);
        assert_eq!(summary.median_ms, 4.0);
        assert_eq!(summary.p95_ms, 4.0);
    }

    #[test]
    fn even_median_and_p95() {
        let summary = LatencySummary::from_samples(&[4.0, 1.0, 3.0, 2.0]).unwrap();
        assert_eq!(summary.min_ms, 1.0);
        assert_eq!(summary.max_ms, 4.0);
        assert_eq!(summary.median_ms, 2.5);
        // floor(4 * 0.95) = 3
        assert_eq!(summary.p95_ms, 4.0);
    }

    #[test]
    fn hundred_samples() {
        let samples: Vec<f64> = (1..=100).rev().map(|x| x as f64).collect();
        let summary = LatencySummary::from_samples(&samples).unwrap();
        assert_eq!(summary.median_ms, 50.5);
        // index 95 of 1..=100
        assert_eq!(summary.p95_ms, 96.0);
        assert_eq!(mean(&samples), Some(50.5));
    }

    #[test]
    fn ordering() {
        let samples = [0.3, 12.0, 0.7, 5.5, 5.5, 0.01, 9.0];
        let s = LatencySummary::from_samples(&samples).unwrap();
        assert!(s.min_ms <= s.median_ms);
        assert!(s.median_ms <= s.p95_ms);
        assert!(s.p95_ms <= s.max_ms);
    }
}
