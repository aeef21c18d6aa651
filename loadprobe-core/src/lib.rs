//! Bounded-concurrency HTTP load generation with exact, lock-serialized statistics.
//!
//! The moving parts, leaf first:
//! - [`StatRecorder`] accumulates one [`RequestOutcome`] per finished request.
//! - [`RequestRunner`] issues one request through a [`Transport`] and classifies the result.
//! - [`LoadDriver`] runs a fixed number of requests (or a duration) on a bounded worker pool.
//! - [`ShapedDriver`] follows a [`LoadShape`] that varies the number of simulated users.

mod driver;
mod endpoint;
mod error;
mod gate;
mod outcome;
mod request;
mod schedule;
mod select;
mod shape;
mod shaped;
mod stats;
mod thresholds;
mod transport;

pub use driver::{DriverReport, LoadDriver, LoadPlan, MAX_CONCURRENCY};
pub use endpoint::{Endpoint, Expectation, default_endpoints, weighted_endpoints};
pub use error::{Error, Result};
pub use gate::RequestGate;
pub use outcome::{Outcome, OutcomeKind, RequestOutcome, StatusKey};
pub use request::{OutcomeFn, RequestRunner};
pub use schedule::{RampingSchedule, Stage};
pub use select::{EndpointSelector, SequenceSelector, UniformSelector, WeightedSelector};
pub use shape::{LoadShape, ShapeTick, SpikeShape, SpikeWindow, StagedShape, StepShape, preview};
pub use shaped::{ShapeProgress, ShapeProgressFn, ShapedDriver, ShapedPlan, ThinkTime};
pub use stats::{EndpointStats, LatencySummary, LiveStats, StatRecorder, StatSnapshot};
pub use thresholds::{ThresholdMetric, ThresholdViolation, Thresholds};
pub use transport::{Transport, TransportError, TransportResponse};
