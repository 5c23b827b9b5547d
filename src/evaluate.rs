use std::fmt::Write as _;
use tracing::info;

use crate::config::{EvaluateConfig, Metric};
use crate::error::PipelineError;

/// 2x2 confusion matrix, rows are actual (0, 1), columns predicted (0, 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfusionMatrix {
    pub true_negative: usize,
    pub false_positive: usize,
    pub false_negative: usize,
    pub true_positive: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassMetrics {
    pub label: i32,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
}

/// Evaluation results; a metric is `Some` only when it was requested.
#[derive(Debug, Default)]
pub struct EvaluationReport {
    pub auc: Option<f64>,
    pub accuracy: Option<f64>,
    pub confusion: Option<ConfusionMatrix>,
    pub classification_report: Option<ClassificationReport>,
}

/// Rank-based ROC AUC (Mann-Whitney) with tie correction, computed
/// against the probability column.
pub fn roc_auc(y_true: &[i32], scores: &[f64]) -> Result<f64, PipelineError> {
    if y_true.len() != scores.len() {
        return Err(PipelineError::Evaluation(
            "label and score lengths differ".into(),
        ));
    }
    let n_pos = y_true.iter().filter(|y| **y == 1).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(PipelineError::Evaluation(
            "AUC undefined for a single-class test set".into(),
        ));
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|a, b| scores[*a].total_cmp(&scores[*b]));

    // Average ranks over tie groups, then sum the positive-class ranks.
    let mut rank_sum_pos = 0.0f64;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for k in i..=j {
            if y_true[order[k]] == 1 {
                rank_sum_pos += avg_rank;
            }
        }
        i = j + 1;
    }

    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    Ok((rank_sum_pos - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}

pub fn accuracy(y_true: &[i32], y_pred: &[i32]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| t == p)
        .count();
    correct as f64 / y_true.len() as f64
}

pub fn confusion_matrix(y_true: &[i32], y_pred: &[i32]) -> ConfusionMatrix {
    let mut cm = ConfusionMatrix {
        true_negative: 0,
        false_positive: 0,
        false_negative: 0,
        true_positive: 0,
    };
    for (t, p) in y_true.iter().zip(y_pred.iter()) {
        match (t, p) {
            (0, 0) => cm.true_negative += 1,
            (0, _) => cm.false_positive += 1,
            (_, 0) => cm.false_negative += 1,
            _ => cm.true_positive += 1,
        }
    }
    cm
}

fn safe_ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

pub fn classification_report(y_true: &[i32], y_pred: &[i32]) -> ClassificationReport {
    let cm = confusion_matrix(y_true, y_pred);
    let per_class = [
        (0, cm.true_negative, cm.false_negative, cm.false_positive),
        (1, cm.true_positive, cm.false_positive, cm.false_negative),
    ];
    let classes = per_class
        .iter()
        .map(|(label, tp, fp, fn_)| {
            let precision = safe_ratio(*tp, tp + fp);
            let recall = safe_ratio(*tp, tp + fn_);
            let f1 = if precision + recall == 0.0 {
                0.0
            } else {
                2.0 * precision * recall / (precision + recall)
            };
            let support = y_true.iter().filter(|y| *y == label).count();
            ClassMetrics {
                label: *label,
                precision,
                recall,
                f1,
                support,
            }
        })
        .collect();
    ClassificationReport { classes }
}

/// Computes exactly the requested subset of metrics. AUC uses the
/// probability column; the rest use the binary column. A metric left out
/// of the subset is neither computed nor reported.
pub fn compute_metrics(
    y_true: &[i32],
    y_pred_proba: &[f64],
    y_pred_bin: &[i32],
    cfg: &EvaluateConfig,
) -> Result<EvaluationReport, PipelineError> {
    info!(requested = cfg.metrics.len(), "Computing metrics");
    let mut report = EvaluationReport::default();
    for metric in &cfg.metrics {
        match metric {
            Metric::Auc => report.auc = Some(roc_auc(y_true, y_pred_proba)?),
            Metric::Accuracy => report.accuracy = Some(accuracy(y_true, y_pred_bin)),
            Metric::Confusion => report.confusion = Some(confusion_matrix(y_true, y_pred_bin)),
            Metric::ClassificationReport => {
                report.classification_report = Some(classification_report(y_true, y_pred_bin));
            }
        }
    }
    Ok(report)
}

impl EvaluationReport {
    /// Renders the requested metrics as the batch run's text artifact.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(auc) = self.auc {
            let _ = writeln!(out, "AUC on test: {auc:.3}\n");
        }
        if let Some(accuracy) = self.accuracy {
            let _ = writeln!(out, "Accuracy on test: {accuracy:.3}\n");
        }
        if let Some(cm) = &self.confusion {
            let _ = writeln!(out, "Confusion matrix:");
            let _ = writeln!(out, "{:>16} {:>20} {:>20}", "", "Predicted negative", "Predicted positive");
            let _ = writeln!(out, "{:>16} {:>20} {:>20}", "Actual negative", cm.true_negative, cm.false_positive);
            let _ = writeln!(out, "{:>16} {:>20} {:>20}\n", "Actual positive", cm.false_negative, cm.true_positive);
        }
        if let Some(report) = &self.classification_report {
            let _ = writeln!(out, "Classification report:");
            let _ = writeln!(out, "{:>8} {:>10} {:>8} {:>8} {:>8}", "class", "precision", "recall", "f1", "support");
            for class in &report.classes {
                let _ = writeln!(
                    out,
                    "{:>8} {:>10.3} {:>8.3} {:>8.3} {:>8}",
                    class.label, class.precision, class.recall, class.f1, class.support
                );
            }
        }
        out
    }
}
