//! Core data models, geodesy and flight-profile logic for skycheck.
//!
//! Everything in this crate is pure CPU work: altitude unit handling,
//! great-circle math, polyline buffering, corridor construction, the
//! branch-wise profile corrector and crossing categorization. I/O
//! (database, network, files) lives in `skycheck-engine`.

pub mod buffer;
pub mod corridor;
pub mod models;
pub mod profile;
pub mod report;
pub mod spatial;
pub mod units;

pub use corridor::{Corridor, CorridorParams};
pub use models::{Airspace, AirspaceType, Crossing, FlightPath, Vertex, Waypoint};
pub use profile::{BranchAction, BranchReport, CorrectedProfile, ProfileParams};
pub use units::AltitudeLimit;
