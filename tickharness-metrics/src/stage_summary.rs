//! Stage timing and traffic tables
//!
//! Stages keep their own counters; this only reshapes them into one row per
//! stage, in the order the stages were given.

use serde::Serialize;
use std::fmt;
use tickharness_core::StageReport;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageTimeRow {
    pub stage: String,
    pub queue_time: f64,
    pub work_time: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageTrafficRow {
    pub stage: String,
    pub add: u64,
    pub work_on: u64,
    pub success: u64,
    pub fail: u64,
}

pub fn stage_time_rows(stages: &[&dyn StageReport]) -> Vec<StageTimeRow> {
    stages
        .iter()
        .map(|stage| {
            let time = stage.stage_time();
            StageTimeRow {
                stage: stage.stage_name().to_string(),
                queue_time: time.queue_time,
                work_time: time.work_time,
            }
        })
        .collect()
}

pub fn stage_traffic_rows(stages: &[&dyn StageReport]) -> Vec<StageTrafficRow> {
    stages
        .iter()
        .map(|stage| {
            let traffic = stage.stage_traffic();
            StageTrafficRow {
                stage: stage.stage_name().to_string(),
                add: traffic.add,
                work_on: traffic.work_on,
                success: traffic.success,
                fail: traffic.fail,
            }
        })
        .collect()
}

impl fmt::Display for StageTimeRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: queue={:.3} work={:.3}",
            self.stage, self.queue_time, self.work_time
        )
    }
}

impl fmt::Display for StageTrafficRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: add={} work_on={} success={} fail={}",
            self.stage, self.add, self.work_on, self.success, self.fail
        )
    }
}
