//! Summary tables of regional cortical thickness (CT) and magnetization transfer (MT) for the CT/MT
//! analysis pipeline.
//!
//! Reads per-subject regional measurements and a structural covariance graph, and writes one region table per
//! parcellation granularity (308, 68 and 34 regions) plus a table of the main findings across cohorts.

pub mod config;
pub mod error;
pub mod findings;
pub mod measures;
pub mod network;
pub mod parcellation;
pub mod regions;
pub mod stats;
pub mod util;

pub use config::Config;
pub use error::{Result, StatsTableError};
pub use findings::{create_findings_table, table1_findings, Finding};
pub use measures::MeasureTable;
pub use network::{calculate_network_measures, CovarianceGraph, NetworkMeasure, NullModel};
pub use parcellation::{Granularity, Parcellation, RegionGroup, RegionName};
pub use regions::create_statstable;
pub use stats::{linregress, CorrelationResult, CorrelationSummary, LinearFit, PermutationTest};
