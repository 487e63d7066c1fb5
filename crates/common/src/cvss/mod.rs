// CVSS v4.0 scoring engine.
//
// Pure and deterministic: no I/O, no clocks. Scores reproduce the published
// FIRST calculator to one decimal place.

mod lookup;
pub mod metrics;
pub mod score;
pub mod selection;
pub mod values;
pub mod vector;

pub use metrics::{Metric, MetricGroup};
pub use score::{MacroVector, Severity};
pub use selection::{CvssScore, CvssSelection};
pub use values::ScoringVector;
pub use vector::{CvssParseError, VECTOR_PREFIX};
