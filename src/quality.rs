//! Code quality score derived from review findings.
//!
//! The score is the weighted number of findings per 100 characters of code,
//! mapped onto `[0, 1]`: `max(0, 1 - normalized / 20)`, rounded to three
//! decimals. It is the only input to the loop strategy's quality exit.

use crate::agents::{Finding, Severity};

/// Weight of a finding that carries no severity at all (scored as `info`).
pub const MISSING_SEVERITY_WEIGHT: f64 = 0.5;

/// Weight of a severity label outside the known table. Unrecognized labels
/// weigh like `low`; missing ones like `info`.
pub const UNKNOWN_SEVERITY_WEIGHT: f64 = 1.0;

/// Weighted findings per 100 code units that drive the score to zero.
const ZERO_SCORE_DENSITY: f64 = 20.0;

pub fn severity_weight(severity: Option<&Severity>) -> f64 {
    match severity {
        None => MISSING_SEVERITY_WEIGHT,
        Some(Severity::Critical) => 10.0,
        Some(Severity::High) => 5.0,
        Some(Severity::Medium) => 2.0,
        Some(Severity::Low) => 1.0,
        Some(Severity::Info) => 0.5,
        Some(Severity::Other(_)) => UNKNOWN_SEVERITY_WEIGHT,
    }
}

/// Scores `findings` for a piece of code of `code_size` characters.
pub fn score(findings: &[Finding], code_size: usize) -> f64 {
    if findings.is_empty() {
        return 1.0;
    }

    let total_weight: f64 = findings
        .iter()
        .map(|f| severity_weight(f.severity.as_ref()))
        .sum();

    let normalized = if code_size > 0 {
        total_weight / (code_size as f64 / 100.0)
    } else {
        total_weight
    };

    let score = (1.0 - normalized / ZERO_SCORE_DENSITY).max(0.0);
    (score * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(severity: Severity) -> Finding {
        Finding::new(severity, "issue")
    }

    #[test]
    fn no_findings_is_perfect_for_any_size() {
        for size in [0, 1, 100, 10_000] {
            assert_eq!(score(&[], size), 1.0);
        }
    }

    #[test]
    fn weights_per_hundred_characters() {
        // 5 / (1000 / 100) = 0.5 → 1 - 0.5 / 20 = 0.975
        assert_eq!(score(&[finding(Severity::High)], 1000), 0.975);
        // 10 / 1 = 10 → 0.5
        assert_eq!(score(&[finding(Severity::Critical)], 100), 0.5);
    }

    #[test]
    fn zero_size_uses_raw_weight() {
        assert_eq!(score(&[finding(Severity::Medium)], 0), 0.9);
    }

    #[test]
    fn score_never_goes_below_zero() {
        let findings = vec![finding(Severity::Critical); 10];
        assert_eq!(score(&findings, 50), 0.0);
    }

    #[test]
    fn rounds_to_three_decimals() {
        // 1 / (300 / 100) = 0.333.. → 1 - 0.01666.. = 0.98333..
        assert_eq!(score(&[finding(Severity::Low)], 300), 0.983);
    }

    #[test]
    fn missing_and_unknown_severities_use_distinct_fallbacks() {
        let missing = Finding {
            severity: None,
            ..finding(Severity::Info)
        };
        assert_eq!(severity_weight(missing.severity.as_ref()), 0.5);
        assert_eq!(severity_weight(Some(&Severity::Other("blocker".into()))), 1.0);
        assert_eq!(score(&[missing], 0), 0.975);
        assert_eq!(score(&[finding(Severity::Other("blocker".into()))], 0), 0.95);
    }

    #[test]
    fn adding_or_escalating_findings_never_raises_the_score() {
        let ladder = [
            Severity::Info,
            Severity::Low,
            Severity::Medium,
            Severity::High,
            Severity::Critical,
        ];
        let mut findings = Vec::new();
        let mut previous = score(&findings, 400);
        for severity in ladder.iter().cycle().take(15) {
            findings.push(finding(severity.clone()));
            let current = score(&findings, 400);
            assert!(current <= previous, "{current} > {previous}");
            previous = current;
        }

        for pair in ladder.windows(2) {
            let lower = score(&[finding(pair[0].clone())], 250);
            let higher = score(&[finding(pair[1].clone())], 250);
            assert!(higher <= lower);
        }
    }

    #[test]
    fn order_of_findings_does_not_matter() {
        let mut findings = vec![
            finding(Severity::Critical),
            finding(Severity::Info),
            finding(Severity::Other("odd".into())),
            finding(Severity::Medium),
        ];
        let forward = score(&findings, 730);
        findings.reverse();
        assert_eq!(score(&findings, 730), forward);
        findings.swap(0, 2);
        assert_eq!(score(&findings, 730), forward);
    }
}
