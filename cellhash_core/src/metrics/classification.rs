//! Classification metrics over predicted and true labels.
//!
//! Averages are taken over the sorted union of labels seen in either
//! vector. A label that is never predicted has precision 0, one that never
//! occurs in the truth has recall 0; neither is an error.

use crate::error::{HashError, HashResult};

/// Per-label true-positive, predicted and true counts.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelCounts {
    true_positive: Vec<usize>,
    predicted: Vec<usize>,
    actual: Vec<usize>,
    total: usize,
}

/// Precision, recall, F1 and support of one class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassStats {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl LabelCounts {
    /// Tallies paired predictions.
    ///
    /// # Errors
    ///
    /// * `ShapeMismatch` if the vectors differ in length
    /// * `EmptyCollection` if they are empty
    pub fn new(predicted: &[usize], truth: &[usize]) -> HashResult<Self> {
        if predicted.len() != truth.len() {
            return Err(HashError::shape_mismatch(
                truth.len(),
                predicted.len(),
                "predicted label count",
            ));
        }
        if truth.is_empty() {
            return Err(HashError::empty_collection("label vectors"));
        }

        let size = predicted
            .iter()
            .chain(truth)
            .copied()
            .max()
            .map_or(0, |max| max + 1);
        let mut counts = Self {
            true_positive: vec![0; size],
            predicted: vec![0; size],
            actual: vec![0; size],
            total: truth.len(),
        };
        for (&p, &t) in predicted.iter().zip(truth) {
            counts.predicted[p] += 1;
            counts.actual[t] += 1;
            if p == t {
                counts.true_positive[p] += 1;
            }
        }
        Ok(counts)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Labels present in truth or prediction, ascending.
    pub fn labels(&self) -> Vec<usize> {
        (0..self.actual.len())
            .filter(|&l| self.actual[l] + self.predicted[l] > 0)
            .collect()
    }

    /// Stats for `label`; labels never seen yield all zeros.
    pub fn class_stats(&self, label: usize) -> ClassStats {
        let tp = self.true_positive.get(label).copied().unwrap_or(0);
        let predicted = self.predicted.get(label).copied().unwrap_or(0);
        let actual = self.actual.get(label).copied().unwrap_or(0);
        ClassStats {
            precision: ratio(tp, predicted),
            recall: ratio(tp, actual),
            f1: ratio(2 * tp, predicted + actual),
            support: actual,
        }
    }

    /// Fraction of exact matches.
    pub fn accuracy(&self) -> f64 {
        ratio(self.true_positive.iter().sum(), self.total)
    }

    /// F1 per label in [`LabelCounts::labels`] order.
    pub fn f1_per_class(&self) -> Vec<f64> {
        self.labels().into_iter().map(|l| self.class_stats(l).f1).collect()
    }

    /// F1 from pooled counts.
    pub fn f1_micro(&self) -> f64 {
        let tp: usize = self.true_positive.iter().sum();
        let fp = self.total - tp;
        let fn_ = self.total - tp;
        ratio(2 * tp, 2 * tp + fp + fn_)
    }

    pub fn f1_macro(&self) -> f64 {
        self.macro_average(|s| s.f1)
    }

    /// F1 averaged with true support as weight.
    pub fn f1_weighted(&self) -> f64 {
        let weighted: f64 = self
            .labels()
            .into_iter()
            .map(|l| {
                let stats = self.class_stats(l);
                stats.f1 * stats.support as f64
            })
            .sum();
        weighted / self.total as f64
    }

    pub fn precision_macro(&self) -> f64 {
        let labels = self.labels();
        let undefined = labels.iter().filter(|&&l| self.predicted[l] == 0).count();
        if undefined > 0 {
            tracing::debug!(undefined, "labels with no predicted samples score precision 0");
        }
        self.macro_average(|s| s.precision)
    }

    pub fn recall_macro(&self) -> f64 {
        let labels = self.labels();
        let undefined = labels.iter().filter(|&&l| self.actual[l] == 0).count();
        if undefined > 0 {
            tracing::debug!(undefined, "labels with no true samples score recall 0");
        }
        self.macro_average(|s| s.recall)
    }

    fn macro_average(&self, pick: impl Fn(&ClassStats) -> f64) -> f64 {
        let labels = self.labels();
        let sum: f64 = labels.iter().map(|&l| pick(&self.class_stats(l))).sum();
        sum / labels.len() as f64
    }
}

/// Median of the values; the mean of the middle pair for even lengths.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Exact-match accuracy.
pub fn accuracy(predicted: &[usize], truth: &[usize]) -> HashResult<f64> {
    Ok(LabelCounts::new(predicted, truth)?.accuracy())
}

/// Fixed-width per-class report listing every class in `class_names`
/// followed by accuracy, macro and weighted averages.
///
/// The averages in the report run over all listed classes, including ones
/// absent from both vectors.
pub fn classification_report(
    predicted: &[usize],
    truth: &[usize],
    class_names: &[String],
) -> HashResult<String> {
    let counts = LabelCounts::new(predicted, truth)?;
    if class_names.is_empty() {
        return Err(HashError::empty_collection("class names"));
    }

    let width = class_names
        .iter()
        .map(String::len)
        .chain(["weighted avg".len()])
        .max()
        .unwrap_or(0);
    let stats: Vec<ClassStats> = (0..class_names.len()).map(|l| counts.class_stats(l)).collect();

    let mut report = format!(
        "{:>w$}  {:>9} {:>9} {:>9} {:>9}\n\n",
        "",
        "precision",
        "recall",
        "f1-score",
        "support",
        w = width
    );
    for (name, s) in class_names.iter().zip(&stats) {
        report.push_str(&format!(
            "{:>w$}  {:>9.2} {:>9.2} {:>9.2} {:>9}\n",
            name,
            s.precision,
            s.recall,
            s.f1,
            s.support,
            w = width
        ));
    }
    report.push('\n');

    let support: usize = stats.iter().map(|s| s.support).sum();
    report.push_str(&format!(
        "{:>w$}  {:>9} {:>9} {:>9.2} {:>9}\n",
        "accuracy",
        "",
        "",
        counts.accuracy(),
        support,
        w = width
    ));

    let n = stats.len() as f64;
    let macro_avg = (
        stats.iter().map(|s| s.precision).sum::<f64>() / n,
        stats.iter().map(|s| s.recall).sum::<f64>() / n,
        stats.iter().map(|s| s.f1).sum::<f64>() / n,
    );
    let weight = |pick: fn(&ClassStats) -> f64| -> f64 {
        if support == 0 {
            return 0.0;
        }
        stats.iter().map(|s| pick(s) * s.support as f64).sum::<f64>() / support as f64
    };
    let weighted_avg = (weight(|s| s.precision), weight(|s| s.recall), weight(|s| s.f1));

    for (label, (p, r, f)) in [("macro avg", macro_avg), ("weighted avg", weighted_avg)] {
        report.push_str(&format!(
            "{:>w$}  {:>9.2} {:>9.2} {:>9.2} {:>9}\n",
            label,
            p,
            r,
            f,
            support,
            w = width
        ));
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_perfect_prediction() {
        let labels = [0, 1, 2, 2, 1];
        let counts = LabelCounts::new(&labels, &labels).unwrap();
        assert_eq!(counts.accuracy(), 1.0);
        assert_eq!(counts.f1_macro(), 1.0);
        assert_eq!(counts.f1_micro(), 1.0);
        assert_eq!(counts.f1_weighted(), 1.0);
        assert_eq!(counts.f1_per_class(), vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_mixed_prediction() {
        let truth = [0, 0, 1, 1, 2, 2];
        let predicted = [0, 1, 1, 1, 2, 0];
        let counts = LabelCounts::new(&predicted, &truth).unwrap();

        // class 0: tp 1, pred 2, true 2 -> p .5 r .5 f .5
        // class 1: tp 2, pred 3, true 2 -> p 2/3 r 1 f .8
        // class 2: tp 1, pred 1, true 2 -> p 1 r .5 f 2/3
        assert!(close(counts.accuracy(), 4.0 / 6.0));
        assert!(close(counts.f1_micro(), 4.0 / 6.0));
        let per_class = counts.f1_per_class();
        assert!(close(per_class[0], 0.5));
        assert!(close(per_class[1], 0.8));
        assert!(close(per_class[2], 2.0 / 3.0));
        assert!(close(counts.f1_macro(), (0.5 + 0.8 + 2.0 / 3.0) / 3.0));
        assert!(close(counts.f1_weighted(), (0.5 + 0.8 + 2.0 / 3.0) / 3.0));
        assert!(close(counts.precision_macro(), (0.5 + 2.0 / 3.0 + 1.0) / 3.0));
        assert!(close(counts.recall_macro(), (0.5 + 1.0 + 0.5) / 3.0));
        assert!(close(median(&per_class).unwrap(), 2.0 / 3.0));
    }

    #[test]
    fn test_never_predicted_class_scores_zero() {
        let truth = [0, 0, 1, 1];
        let predicted = [0, 0, 0, 0];
        let counts = LabelCounts::new(&predicted, &truth).unwrap();
        let stats = counts.class_stats(1);
        assert_eq!(stats.precision, 0.0);
        assert_eq!(stats.f1, 0.0);
        assert_eq!(stats.support, 2);
        assert!(close(counts.precision_macro(), 0.25));
        assert!(close(counts.f1_weighted(), (2.0 / 3.0) * 0.5));
    }

    #[test]
    fn test_label_set_is_union_of_seen_labels() {
        let counts = LabelCounts::new(&[0, 4], &[0, 2]).unwrap();
        assert_eq!(counts.labels(), vec![0, 2, 4]);
        assert_eq!(counts.f1_per_class().len(), 3);
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[]), None);
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert!(close(median(&[0.2, 0.8, 0.4, 1.0]).unwrap(), 0.6));
    }

    #[test]
    fn test_length_mismatch() {
        assert!(matches!(
            accuracy(&[0, 1], &[0]),
            Err(HashError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            accuracy(&[], &[]),
            Err(HashError::EmptyCollection { .. })
        ));
    }

    #[test]
    fn test_report_layout() {
        let names: Vec<String> = vec!["B cell".into(), "T cell".into(), "NK".into()];
        let report = classification_report(&[0, 1, 1, 0], &[0, 1, 0, 0], &names).unwrap();
        let lines: Vec<&str> = report.lines().collect();

        assert_eq!(lines[0], "              precision    recall  f1-score   support");
        assert_eq!(lines[1], "");
        assert_eq!(lines[2], "      B cell       1.00      0.67      0.80         3");
        assert_eq!(lines[3], "      T cell       0.50      1.00      0.67         1");
        assert_eq!(lines[4], "          NK       0.00      0.00      0.00         0");
        assert_eq!(lines[6], "    accuracy                           0.75         4");
        assert!(lines[7].starts_with("   macro avg"));
        assert!(lines[8].starts_with("weighted avg"));
        assert!(lines[8].ends_with("4"));
    }
}
