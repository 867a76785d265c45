//! Pure pass/fail decision against a frozen scoring rule. No I/O; the caller
//! persists the threshold/scale snapshot so the decision stays explainable.

/// Ties favor the candidate: a score equal to the threshold passes.
pub fn passed(score: f64, threshold: f64) -> bool {
    score >= threshold
}

/// Human-readable decision summary used in audit rationales,
/// e.g. "82/100 (threshold 70)".
pub fn summary(score: f64, threshold: f64, scale: f64) -> String {
    format!(
        "{}/{} (threshold {})",
        format_number(score),
        format_number(scale),
        format_number(threshold)
    )
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_to_threshold_passes() {
        assert!(passed(70.0, 70.0));
    }

    #[test]
    fn just_below_threshold_fails() {
        assert!(!passed(69.999, 70.0));
    }

    #[test]
    fn above_threshold_passes() {
        assert!(passed(82.0, 70.0));
    }

    #[test]
    fn summary_renders_whole_numbers_without_fraction() {
        assert_eq!(summary(82.0, 70.0, 100.0), "82/100 (threshold 70)");
        assert_eq!(summary(64.5, 70.0, 100.0), "64.5/100 (threshold 70)");
    }
}
