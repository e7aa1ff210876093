pub mod get;
pub mod list;
pub mod statistics;

pub use get::{GetInvalidRecordError, GetInvalidRecordQuery};
pub use list::{ListInvalidRecordsError, ListInvalidRecordsQuery, ListInvalidRecordsResponse};
pub use statistics::{StatisticsError, StatisticsQuery};
