//! Per-class precision/recall/F1 on a held-out partition.

use std::fmt::Write as _;

use serde::Serialize;

/// Metrics for one class. Undefined ratios are reported as 0.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub class: usize,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Averages {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    /// Classes seen in either the true or the predicted labels, ascending.
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_avg: Averages,
    pub weighted_avg: Averages,
    pub total: usize,
}

impl ClassificationReport {
    /// Compare `y_pred` against `y_true`. Both must have the same length and
    /// every label must be below `n_classes`.
    pub fn compute(y_true: &[usize], y_pred: &[usize], n_classes: usize) -> Self {
        let mut tp = vec![0usize; n_classes];
        let mut true_count = vec![0usize; n_classes];
        let mut pred_count = vec![0usize; n_classes];

        for (&t, &p) in y_true.iter().zip(y_pred) {
            true_count[t] += 1;
            pred_count[p] += 1;
            if t == p {
                tp[t] += 1;
            }
        }

        let classes: Vec<ClassMetrics> = (0..n_classes)
            .filter(|&c| true_count[c] > 0 || pred_count[c] > 0)
            .map(|c| {
                let precision = ratio(tp[c], pred_count[c]);
                let recall = ratio(tp[c], true_count[c]);
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassMetrics {
                    class: c,
                    precision,
                    recall,
                    f1,
                    support: true_count[c],
                }
            })
            .collect();

        let total = y_true.len();
        let correct: usize = tp.iter().sum();

        let k = classes.len().max(1) as f64;
        let macro_avg = Averages {
            precision: classes.iter().map(|m| m.precision).sum::<f64>() / k,
            recall: classes.iter().map(|m| m.recall).sum::<f64>() / k,
            f1: classes.iter().map(|m| m.f1).sum::<f64>() / k,
        };

        let weighted = |f: fn(&ClassMetrics) -> f64| {
            if total == 0 {
                0.0
            } else {
                classes.iter().map(|m| f(m) * m.support as f64).sum::<f64>() / total as f64
            }
        };
        let weighted_avg = Averages {
            precision: weighted(|m| m.precision),
            recall: weighted(|m| m.recall),
            f1: weighted(|m| m.f1),
        };

        Self {
            accuracy: ratio(correct, total),
            classes,
            macro_avg,
            weighted_avg,
            total,
        }
    }

    /// Render as a fixed-width table, naming class `i` by `names[i]`.
    pub fn render(&self, names: &[&str]) -> String {
        let label = |c: usize| -> String {
            names.get(c).map_or_else(|| c.to_string(), |n| (*n).to_string())
        };
        let width = self
            .classes
            .iter()
            .map(|m| label(m.class).chars().count())
            .chain(std::iter::once("weighted avg".len()))
            .max()
            .unwrap_or(0);

        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:>width$} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        );
        out.push('\n');
        for m in &self.classes {
            let _ = writeln!(
                out,
                "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                label(m.class),
                m.precision,
                m.recall,
                m.f1,
                m.support
            );
        }
        out.push('\n');
        let _ = writeln!(
            out,
            "{:>width$} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.total
        );
        for (name, avg) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            let _ = writeln!(
                out,
                "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name, avg.precision, avg.recall, avg.f1, self.total
            );
        }
        out
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn hand_computed_metrics() {
        // class 0: tp=2, predicted 3, true 2 -> p=2/3 r=1
        // class 1: tp=1, predicted 1, true 2 -> p=1 r=1/2
        // class 2: tp=0, predicted 0, true 0 -> absent
        let y_true = [0, 0, 1, 1];
        let y_pred = [0, 0, 0, 1];
        let report = ClassificationReport::compute(&y_true, &y_pred, 3);

        assert_eq!(report.classes.len(), 2);
        let c0 = &report.classes[0];
        assert!(close(c0.precision, 2.0 / 3.0));
        assert!(close(c0.recall, 1.0));
        assert!(close(c0.f1, 0.8));
        let c1 = &report.classes[1];
        assert!(close(c1.precision, 1.0));
        assert!(close(c1.recall, 0.5));
        assert!(close(c1.f1, 2.0 / 3.0));

        assert!(close(report.accuracy, 0.75));
        assert!(close(report.macro_avg.recall, 0.75));
        assert!(close(report.weighted_avg.f1, (0.8 * 2.0 + 2.0 / 3.0 * 2.0) / 4.0));
    }

    #[test]
    fn predicted_only_class_has_zero_support() {
        let report = ClassificationReport::compute(&[0, 0], &[0, 2], 3);
        let c2 = report.classes.iter().find(|m| m.class == 2).unwrap();
        assert_eq!(c2.support, 0);
        assert_eq!(c2.precision, 0.0);
        assert_eq!(c2.recall, 0.0);
    }

    #[test]
    fn empty_input_is_all_zero() {
        let report = ClassificationReport::compute(&[], &[], 5);
        assert!(report.classes.is_empty());
        assert_eq!(report.accuracy, 0.0);
        assert_eq!(report.total, 0);
    }

    #[test]
    fn render_uses_class_names() {
        let report = ClassificationReport::compute(&[0, 1], &[0, 1], 2);
        let text = report.render(&["Esguince", "Desgarre"]);
        assert!(text.contains("Esguince"));
        assert!(text.contains("precision"));
        assert!(text.contains("weighted avg"));
        assert!(text.contains("1.00"));
    }
}
