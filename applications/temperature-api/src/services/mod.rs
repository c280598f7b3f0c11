pub mod alerts;
pub mod readings;

pub use alerts::AlertService;
pub use readings::{HistoryParams, IngestOutcome, ReadingService};
