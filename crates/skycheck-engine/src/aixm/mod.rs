//! AIXM 4.5 extraction: streaming XML parsing into airspace records.

pub mod coords;
pub mod extractor;

pub use extractor::{extract_file, extract_reader, ExtractionSummary};
