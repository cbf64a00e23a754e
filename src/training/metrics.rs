use serde::{Deserialize, Serialize};
use tabled::Tabled;

/// Binary classification scores with class 1 as the positive class.
/// Ratios whose denominator is zero are reported as 0.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
}

#[derive(Tabled)]
pub struct MetricLine {
    #[tabled(rename = "Metric")]
    pub name: &'static str,
    #[tabled(rename = "Value")]
    pub value: String,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

impl ClassificationMetrics {
    pub fn from_predictions(actual: &[u8], predicted: &[u8]) -> Self {
        let mut m = Self::default();
        for (&a, &p) in actual.iter().zip(predicted) {
            match (a == 1, p == 1) {
                (true, true) => m.true_positives += 1,
                (false, true) => m.false_positives += 1,
                (false, false) => m.true_negatives += 1,
                (true, false) => m.false_negatives += 1,
            }
        }

        let total = m.true_positives + m.false_positives + m.true_negatives + m.false_negatives;
        m.accuracy = ratio(m.true_positives + m.true_negatives, total);
        m.precision = ratio(m.true_positives, m.true_positives + m.false_positives);
        m.recall = ratio(m.true_positives, m.true_positives + m.false_negatives);
        m.f1 = if m.precision + m.recall > 0.0 {
            2.0 * m.precision * m.recall / (m.precision + m.recall)
        } else {
            0.0
        };
        m
    }

    pub fn samples(&self) -> usize {
        self.true_positives + self.false_positives + self.true_negatives + self.false_negatives
    }

    pub fn lines(&self) -> Vec<MetricLine> {
        let pct = |v: f64| format!("{:.2}%", v * 100.0);
        vec![
            MetricLine { name: "Accuracy", value: pct(self.accuracy) },
            MetricLine { name: "Precision", value: pct(self.precision) },
            MetricLine { name: "Recall", value: pct(self.recall) },
            MetricLine { name: "F1", value: format!("{:.4}", self.f1) },
            MetricLine { name: "True positives", value: self.true_positives.to_string() },
            MetricLine { name: "False positives", value: self.false_positives.to_string() },
            MetricLine { name: "True negatives", value: self.true_negatives.to_string() },
            MetricLine { name: "False negatives", value: self.false_negatives.to_string() },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_and_scores() {
        let actual = [1, 1, 0, 0, 1];
        let predicted = [1, 0, 1, 0, 1];
        let m = ClassificationMetrics::from_predictions(&actual, &predicted);

        assert_eq!(
            (m.true_positives, m.false_positives, m.true_negatives, m.false_negatives),
            (2, 1, 1, 1)
        );
        assert!((m.accuracy - 0.6).abs() < 1e-12);
        assert!((m.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.recall - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.f1 - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(m.samples(), 5);
    }

    #[test]
    fn zero_denominators_report_zero() {
        let m = ClassificationMetrics::from_predictions(&[0, 0], &[0, 0]);
        assert_eq!(m.accuracy, 1.0);
        assert_eq!(m.precision, 0.0);
        assert_eq!(m.recall, 0.0);
        assert_eq!(m.f1, 0.0);

        let empty = ClassificationMetrics::from_predictions(&[], &[]);
        assert_eq!(empty.accuracy, 0.0);
    }

    #[test]
    fn renders_one_line_per_score() {
        let m = ClassificationMetrics::from_predictions(&[1], &[1]);
        let lines = m.lines();
        assert_eq!(lines.len(), 8);
        assert_eq!(lines[0].value, "100.00%");
    }
}
