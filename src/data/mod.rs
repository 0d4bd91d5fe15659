//! Data module - county table loading, region selection and aggregation

mod loader;
mod processor;
mod region;
mod series;

pub use loader::{CountyTable, DataLoader, TableKind, POPULATION_COLUMN, REGION_COLUMN};
pub use processor::{DataProcessor, RegionalTotals};
pub use region::RegionFilter;
pub use series::{
    parse_date_label, Correction, DailyRecord, RegionalSeries, SeriesBuilder, SeriesMetric,
};
