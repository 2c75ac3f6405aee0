//! Differences between run summaries

use serde::Serialize;
use std::fmt;
use tickharness_core::Bucket;
use tracing::debug;

use crate::error::MetricsError;
use crate::summary::{write_table, EventSummary, SummaryRow};
use crate::value::MetricValue;

/// Row-wise `b - a` of two summaries with the same columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryDiff {
    columns: Vec<String>,
    /// Change in the number of events summarized.
    total: i64,
    rows: Vec<SummaryRow>,
}

impl SummaryDiff {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn total(&self) -> i64 {
        self.total
    }

    pub fn rows(&self) -> &[SummaryRow] {
        &self.rows
    }

    pub fn row(&self, bucket: Bucket) -> Option<&SummaryRow> {
        self.rows.iter().find(|row| row.bucket == bucket)
    }

    pub fn value(&self, bucket: Bucket, column: &str) -> Result<MetricValue, MetricsError> {
        self.row(bucket)
            .and_then(|row| row.get(column))
            .ok_or_else(|| MetricsError::UnknownColumn(column.to_string()))
    }

    /// True when every cell is zero.
    pub fn is_zero(&self) -> bool {
        self.total == 0
            && self
                .rows
                .iter()
                .flat_map(|row| row.values.iter())
                .all(|(_, value)| value.as_f64() == 0.0)
    }
}

impl fmt::Display for SummaryDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_table(f, &self.columns, &self.rows)
    }
}

impl EventSummary {
    /// `b - a` per metric per bucket, on the unrounded values.
    pub fn diff(a: &EventSummary, b: &EventSummary) -> Result<SummaryDiff, MetricsError> {
        if a.columns() != b.columns() {
            return Err(MetricsError::ShapeMismatch {
                left: a.columns().to_vec(),
                right: b.columns().to_vec(),
            });
        }

        let rows = Bucket::ALL
            .iter()
            .map(|&bucket| {
                let (before, after) = (a.row(bucket), b.row(bucket));
                let values = before
                    .values
                    .iter()
                    .zip(&after.values)
                    .map(|((name, old), (_, new))| (name.clone(), *new - *old))
                    .collect();
                SummaryRow::new(bucket, values)
            })
            .collect();

        debug!(columns = a.columns().len(), "Summary diff computed");
        Ok(SummaryDiff {
            columns: a.columns().to_vec(),
            total: b.total() as i64 - a.total() as i64,
            rows,
        })
    }
}

/// One run of a comparison set, diffed against the baseline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunComparison {
    pub label: String,
    pub diff: SummaryDiff,
}

/// Diff every run against the first one, which is the baseline.
///
/// The baseline itself is not included in the result.
pub fn compare_runs<L: AsRef<str>>(
    runs: &[(L, EventSummary)],
) -> Result<Vec<RunComparison>, MetricsError> {
    let ((_, baseline), rest) = runs.split_first().ok_or(MetricsError::Empty)?;
    rest.iter()
        .map(|(label, summary)| {
            Ok(RunComparison {
                label: label.as_ref().to_string(),
                diff: EventSummary::diff(baseline, summary)?,
            })
        })
        .collect()
}
