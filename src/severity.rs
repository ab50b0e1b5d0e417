use serde::{Deserialize, Serialize};

/// Classification of a numeric deviation against a pair of thresholds.
///
/// Ordered so that `Minor < Major < Critical`; regression reporting and
/// alerting key off this ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviationLevel {
    Minor,
    Major,
    Critical,
}

impl DeviationLevel {
    pub fn rank(self) -> u8 {
        match self {
            DeviationLevel::Minor => 0,
            DeviationLevel::Major => 1,
            DeviationLevel::Critical => 2,
        }
    }
}

impl std::fmt::Display for DeviationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DeviationLevel::Minor => "minor",
            DeviationLevel::Major => "major",
            DeviationLevel::Critical => "critical",
        };
        write!(f, "{label}")
    }
}

/// Classifies a deviation value against two thresholds.
///
/// Total over every `f64` including NaN and the infinities, and independent
/// of the order the thresholds are supplied in: the larger threshold is the
/// critical bound, the smaller the major bound.
///
/// Above the critical bound ⇒ `Critical`; above the major bound ⇒ `Major`;
/// otherwise `Minor`. NaN compares false against everything, so a NaN value
/// classifies as `Minor`; that is the defined behavior, not an accident.
pub fn calculate_severity(value: f64, threshold_a: f64, threshold_b: f64) -> DeviationLevel {
    // f64::max/min ignore a NaN operand, so a single NaN threshold degrades
    // to the remaining one instead of poisoning both bounds.
    let critical_bound = threshold_a.max(threshold_b);
    let major_bound = threshold_a.min(threshold_b);

    if value > critical_bound {
        DeviationLevel::Critical
    } else if value > major_bound {
        DeviationLevel::Major
    } else {
        DeviationLevel::Minor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_classification() {
        assert_eq!(calculate_severity(5.0, 10.0, 20.0), DeviationLevel::Minor);
        assert_eq!(calculate_severity(15.0, 10.0, 20.0), DeviationLevel::Major);
        assert_eq!(calculate_severity(25.0, 10.0, 20.0), DeviationLevel::Critical);
    }

    #[test]
    fn test_threshold_order_is_irrelevant() {
        let values = [-50.0, 0.0, 5.0, 10.0, 15.0, 20.0, 25.0, 1e9];
        for value in values {
            assert_eq!(
                calculate_severity(value, 10.0, 20.0),
                calculate_severity(value, 20.0, 10.0),
                "order-dependent result for value {value}"
            );
        }
    }

    #[test]
    fn test_boundary_values_are_not_exceedances() {
        // Exactly at a threshold does not cross it.
        assert_eq!(calculate_severity(10.0, 10.0, 20.0), DeviationLevel::Minor);
        assert_eq!(calculate_severity(20.0, 10.0, 20.0), DeviationLevel::Major);
    }

    #[test]
    fn test_total_over_non_finite_inputs() {
        assert_eq!(
            calculate_severity(f64::NAN, 10.0, 20.0),
            DeviationLevel::Minor
        );
        assert_eq!(
            calculate_severity(f64::INFINITY, 10.0, 20.0),
            DeviationLevel::Critical
        );
        assert_eq!(
            calculate_severity(f64::NEG_INFINITY, 10.0, 20.0),
            DeviationLevel::Minor
        );
        // NaN thresholds degrade rather than panic.
        assert_eq!(
            calculate_severity(15.0, f64::NAN, 10.0),
            DeviationLevel::Major
        );
        assert_eq!(
            calculate_severity(15.0, f64::NAN, f64::NAN),
            DeviationLevel::Minor
        );
    }

    #[test]
    fn test_monotone_in_value() {
        let samples = [
            f64::NEG_INFINITY,
            -100.0,
            0.0,
            9.9,
            10.1,
            19.9,
            20.1,
            1e12,
            f64::INFINITY,
        ];
        let mut previous = None;
        for value in samples {
            let rank = calculate_severity(value, 10.0, 20.0).rank();
            if let Some(prev) = previous {
                assert!(rank >= prev, "rank decreased at value {value}");
            }
            previous = Some(rank);
        }
    }
}
