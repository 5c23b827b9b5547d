use polars::prelude::*;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::config::LabelConfig;
use crate::error::PipelineError;

/// Per-applicant counts of the three delinquency-severity buckets,
/// positionally aligned with `LabelConfig::buckets`.
type BucketCounts = [i64; 3];

fn bucket_index(cfg: &LabelConfig, bucket: &str) -> Option<usize> {
    cfg.buckets.iter().position(|b| b == bucket)
}

/// Applies the reference tie-break table to one applicant's counts.
///
/// The table is an ordered list of overwrite rules, not a decision tree:
/// every matching rule overwrites the slot, so a later match wins when
/// several predicates hold. The asymmetry is intentional and must not be
/// "simplified" into if/else chains. An all-way tie leaves the slot
/// unset.
pub fn vote_label(counts: BucketCounts) -> Option<i32> {
    let [c1, c2, c3] = counts;
    let mut label = None;
    if c1 > c2 {
        label = Some(1);
    }
    if c1 > c3 {
        label = Some(1);
    }
    if c2 > c1 {
        label = Some(0);
    }
    if c2 > c3 {
        label = Some(1);
    }
    if c3 > c1 {
        label = Some(0);
    }
    if c3 > c2 {
        label = Some(0);
    }
    label
}

/// Collapses the monthly credit-status history into one binary
/// delinquency label per applicant.
///
/// Raw status codes are remapped onto the three configured buckets,
/// counted per applicant, and voted on with the priority table above.
/// The output carries exactly the identifier and the target column, one
/// row per applicant, sorted by identifier.
pub fn derive_labels(df: &DataFrame, cfg: &LabelConfig) -> Result<DataFrame, PipelineError> {
    let ids = df
        .column(&cfg.id_column)?
        .i64()
        .map_err(|_| PipelineError::LabelDerivation(format!(
            "identifier column {} is not integer-typed",
            cfg.id_column
        )))?;
    // A digit-only history can arrive integer-typed from schema
    // inference; the bucket map keys are text, so normalize first.
    let status_col = df
        .column(&cfg.status_column)?
        .cast(&DataType::String)
        .map_err(|_| PipelineError::LabelDerivation(format!(
            "status column {} cannot be read as text",
            cfg.status_column
        )))?;
    let statuses = status_col.str()?;

    let mut counts: BTreeMap<i64, BucketCounts> = BTreeMap::new();
    for (id, status) in ids.into_iter().zip(statuses.into_iter()) {
        let (Some(id), Some(status)) = (id, status) else {
            continue;
        };
        let Some(pair) = cfg.status_map.iter().find(|p| p.from == status) else {
            warn!(status, "Status code missing from the bucket map, record skipped");
            continue;
        };
        let Some(idx) = bucket_index(cfg, &pair.to) else {
            return Err(PipelineError::LabelDerivation(format!(
                "status map targets unknown bucket {}",
                pair.to
            )));
        };
        counts.entry(id).or_default()[idx] += 1;
    }
    debug!(applicants = counts.len(), "Bucket counts pivoted per applicant");

    let mut out_ids = Vec::with_capacity(counts.len());
    let mut out_labels: Vec<Option<i32>> = Vec::with_capacity(counts.len());
    let mut undefined = 0usize;
    for (id, bucket_counts) in counts {
        let label = vote_label(bucket_counts);
        if label.is_none() {
            undefined += 1;
        }
        out_ids.push(id);
        out_labels.push(label);
    }
    if undefined != 0 {
        warn!(undefined, "Applicants with an all-way bucket tie have no label");
    }
    info!(applicants = out_ids.len(), "Delinquency labels derived");

    let out = DataFrame::new(vec![
        Column::new(cfg.id_column.as_str().into(), out_ids),
        Column::new(cfg.target_column.as_str().into(), out_labels),
    ])?;
    Ok(out)
}
