//! Node-table rendering for mesh managers that publish Babel ETX metrics.
//!
//! The ETX column always shows the metric exactly as the router reports it;
//! see [`formatting::format_etx`].

pub mod etx;
pub mod export;
pub mod formatting;
pub mod model;
pub mod report;
pub mod sources;
pub mod summary;
pub mod table;
