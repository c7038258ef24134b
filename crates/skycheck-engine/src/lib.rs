//! I/O services for skycheck: AIXM extraction, the airspace store, the
//! spatial query engine, the terrain-elevation oracle and KML handling.

pub mod aixm;
pub mod analysis;
pub mod cancel;
pub mod config;
pub mod corrector;
pub mod elevation;
pub mod error;
pub mod geometry;
pub mod index;
pub mod kml;
pub mod persistence;
pub mod query;

pub use cancel::CancelToken;
pub use config::Config;
pub use error::{Error, Result};
