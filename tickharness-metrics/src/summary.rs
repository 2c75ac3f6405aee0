//! Per-bucket event summaries
//!
//! A summary partitions a run's events into [`Bucket::Success`] and
//! [`Bucket::Fail`] and applies every reducer of a [`MetricSet`] to each
//! bucket. The default set produces `count`, `percent`, `mean_latency` and
//! `std_latency`; callers append their own columns with
//! [`MetricSet::with_metric`].

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;
use tickharness_core::{Bucket, Event};
use tracing::debug;

use crate::error::MetricsError;
use crate::latency::LatencyStats;
use crate::value::MetricValue;

pub const COUNT: &str = "count";
pub const PERCENT: &str = "percent";
pub const MEAN_LATENCY: &str = "mean_latency";
pub const STD_LATENCY: &str = "std_latency";

/// The events of one bucket, handed to each metric reducer.
#[derive(Debug)]
pub struct BucketView<'a, P> {
    bucket: Bucket,
    events: Vec<&'a Event<P>>,
    total: usize,
}

impl<'a, P> BucketView<'a, P> {
    pub fn new(bucket: Bucket, events: Vec<&'a Event<P>>, total: usize) -> Self {
        Self {
            bucket,
            events,
            total,
        }
    }

    /// Split `events` into one view per bucket, in [`Bucket::ALL`] order.
    pub fn partition(events: &'a [Event<P>]) -> Vec<BucketView<'a, P>> {
        let total = events.len();
        Bucket::ALL
            .iter()
            .map(|&bucket| {
                let members = events.iter().filter(|e| e.bucket() == bucket).collect();
                BucketView::new(bucket, members, total)
            })
            .collect()
    }

    pub fn bucket(&self) -> Bucket {
        self.bucket
    }

    pub fn events(&self) -> &[&'a Event<P>] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Size of the whole collection, both buckets together.
    pub fn total(&self) -> usize {
        self.total
    }

    /// `end - start` of every settled event, in ticks.
    pub fn latencies(&self) -> impl Iterator<Item = f64> + '_ {
        self.events.iter().filter_map(|e| e.latency())
    }

    pub fn latency_stats(&self) -> LatencyStats {
        LatencyStats::from_samples(self.latencies())
    }
}

type MetricFn<P> = Box<dyn Fn(&BucketView<'_, P>) -> MetricValue>;

/// Ordered table of named reducers, one column each.
pub struct MetricSet<P> {
    metrics: Vec<(String, MetricFn<P>)>,
}

impl<P> MetricSet<P> {
    /// A set with no columns.
    pub fn empty() -> Self {
        Self {
            metrics: Vec::new(),
        }
    }

    /// Append a column. A name that is already present keeps its position
    /// and has its reducer replaced.
    #[must_use]
    pub fn with_metric<F>(mut self, name: impl Into<String>, metric: F) -> Self
    where
        F: Fn(&BucketView<'_, P>) -> MetricValue + 'static,
    {
        let name = name.into();
        let metric: MetricFn<P> = Box::new(metric);
        match self.metrics.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = metric,
            None => self.metrics.push((name, metric)),
        }
        self
    }

    pub fn columns(&self) -> Vec<String> {
        self.metrics.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    fn evaluate(&self, view: &BucketView<'_, P>) -> SummaryRow {
        let values = self
            .metrics
            .iter()
            .map(|(name, metric)| (name.clone(), metric(view)))
            .collect();
        SummaryRow::new(view.bucket(), values)
    }
}

impl<P: 'static> Default for MetricSet<P> {
    fn default() -> Self {
        Self::empty()
            .with_metric(COUNT, count)
            .with_metric(PERCENT, percent)
            .with_metric(MEAN_LATENCY, mean_latency)
            .with_metric(STD_LATENCY, std_latency)
    }
}

impl<P> fmt::Debug for MetricSet<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricSet")
            .field("columns", &self.columns())
            .finish()
    }
}

/// Number of events in the bucket.
pub fn count<P>(view: &BucketView<'_, P>) -> MetricValue {
    MetricValue::from(view.len())
}

/// Share of the whole collection in this bucket, 0 for an empty collection.
pub fn percent<P>(view: &BucketView<'_, P>) -> MetricValue {
    if view.total() == 0 {
        MetricValue::Float(0.0)
    } else {
        MetricValue::Float(view.len() as f64 / view.total() as f64)
    }
}

pub fn mean_latency<P>(view: &BucketView<'_, P>) -> MetricValue {
    MetricValue::from(view.latency_stats().mean())
}

/// Population standard deviation of latency.
pub fn std_latency<P>(view: &BucketView<'_, P>) -> MetricValue {
    MetricValue::from(view.latency_stats().std_dev())
}

/// One bucket's metric values, in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub bucket: Bucket,
    pub values: Vec<(String, MetricValue)>,
}

impl SummaryRow {
    pub fn new(bucket: Bucket, values: Vec<(String, MetricValue)>) -> Self {
        Self { bucket, values }
    }

    pub fn get(&self, name: &str) -> Option<MetricValue> {
        self.values
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| *value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(name, _)| name.as_str())
    }
}

// A row serializes as a flat map: {"bucket": "success", "count": 5, ...}
impl Serialize for SummaryRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len() + 1))?;
        map.serialize_entry("bucket", &self.bucket)?;
        for (name, value) in &self.values {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Success and fail rows of one run.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct EventSummary {
    columns: Vec<String>,
    total: usize,
    rows: Vec<SummaryRow>,
}

impl EventSummary {
    /// Summarize with the default columns.
    pub fn from_events<P: 'static>(events: &[Event<P>]) -> Self {
        Self::build(events, &MetricSet::default())
    }

    pub fn build<P>(events: &[Event<P>], metrics: &MetricSet<P>) -> Self {
        let rows: Vec<SummaryRow> = BucketView::partition(events)
            .iter()
            .map(|view| metrics.evaluate(view))
            .collect();
        debug!(
            total = events.len(),
            columns = metrics.len(),
            "Event summary built"
        );
        Self {
            columns: metrics.columns(),
            total: events.len(),
            rows,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of events summarized.
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn rows(&self) -> &[SummaryRow] {
        &self.rows
    }

    pub fn row(&self, bucket: Bucket) -> &SummaryRow {
        // Both buckets are always present, in Bucket::ALL order
        &self.rows[bucket_index(bucket)]
    }

    /// Look up one cell, erroring on a column this summary does not have.
    pub fn value(&self, bucket: Bucket, column: &str) -> Result<MetricValue, MetricsError> {
        self.row(bucket)
            .get(column)
            .ok_or_else(|| MetricsError::UnknownColumn(column.to_string()))
    }
}

fn bucket_index(bucket: Bucket) -> usize {
    match bucket {
        Bucket::Success => 0,
        Bucket::Fail => 1,
    }
}

/// Plain-text table of rows under a column header.
pub(crate) fn write_table(
    f: &mut fmt::Formatter<'_>,
    columns: &[String],
    rows: &[SummaryRow],
) -> fmt::Result {
    write!(f, "{:<8}", "bucket")?;
    for column in columns {
        write!(f, " {column:>14}")?;
    }
    for row in rows {
        writeln!(f)?;
        write!(f, "{:<8}", row.bucket.as_str())?;
        for (_, value) in &row.values {
            write!(f, " {:>14}", value.to_string())?;
        }
    }
    Ok(())
}

impl fmt::Display for EventSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_table(f, &self.columns, &self.rows)
    }
}
