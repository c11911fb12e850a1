pub mod regulator;
pub mod statistics;

pub use regulator::RegulatorService;
pub use statistics::{disease_breakdown, rollup, StatisticsService};
