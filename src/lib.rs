pub mod config;
pub mod entity;
pub mod storage;
pub mod tsdb;
pub mod util;

pub use entity::{Annotation, AnnotationQuery, Metric, MetricQuery, ReservedField, Tags};
pub use tsdb::{TableOptions, TableTsdbService, TsdbError, TsdbResult, TsdbService, WriteReport};
