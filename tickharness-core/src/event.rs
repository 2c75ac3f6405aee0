//! Events flowing through a stage and the outcomes they settle with.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::StageError;
use crate::types::{EventId, EventKey};
use crate::SimTime;

/// Submission and settlement timestamps of one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseTime {
    pub start: SimTime,
    /// `None` until the stage call settles.
    pub end: Option<SimTime>,
}

impl ResponseTime {
    pub fn started_at(start: SimTime) -> Self {
        Self { start, end: None }
    }

    /// `end - start` in ticks, once settled.
    pub fn latency(&self) -> Option<f64> {
        self.end.map(|end| end.ticks_since(self.start))
    }
}

/// Statistics bucket an outcome falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Success,
    Fail,
}

impl Bucket {
    pub const ALL: [Bucket; 2] = [Bucket::Success, Bucket::Fail];

    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Success => "success",
            Bucket::Fail => "fail",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an event failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReason(pub String);

impl From<StageError> for FailureReason {
    fn from(err: StageError) -> Self {
        FailureReason(err.to_string())
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a stage call settled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response<P> {
    Success(P),
    Failure(FailureReason),
}

impl<P> Response<P> {
    pub fn bucket(&self) -> Bucket {
        match self {
            Response::Success(_) => Bucket::Success,
            Response::Failure(_) => Bucket::Fail,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Response::Success(_))
    }

    pub fn payload(&self) -> Option<&P> {
        match self {
            Response::Success(payload) => Some(payload),
            Response::Failure(_) => None,
        }
    }
}

impl<P> From<Result<P, StageError>> for Response<P> {
    fn from(result: Result<P, StageError>) -> Self {
        match result {
            Ok(payload) => Response::Success(payload),
            Err(err) => Response::Failure(err.into()),
        }
    }
}

/// One simulated unit of work.
///
/// Built by the arrival engine at submission and settled exactly once when
/// its stage call resolves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event<P> {
    pub id: EventId,
    pub key: EventKey,
    pub response_time: ResponseTime,
    pub response: Option<Response<P>>,
}

impl<P> Event<P> {
    pub fn new(id: EventId, key: EventKey, start: SimTime) -> Self {
        Self {
            id,
            key,
            response_time: ResponseTime::started_at(start),
            response: None,
        }
    }

    /// Record the outcome. A second settlement is ignored.
    pub fn settle(&mut self, end: SimTime, response: Response<P>) {
        if self.response.is_some() {
            return;
        }
        debug_assert!(end >= self.response_time.start);
        self.response_time.end = Some(end);
        self.response = Some(response);
    }

    pub fn is_settled(&self) -> bool {
        self.response.is_some()
    }

    /// Bucket for statistics. Anything not explicitly failed counts as success.
    pub fn bucket(&self) -> Bucket {
        match &self.response {
            Some(Response::Failure(_)) => Bucket::Fail,
            _ => Bucket::Success,
        }
    }

    pub fn latency(&self) -> Option<f64> {
        self.response_time.latency()
    }
}
