use serde::{Deserialize, Serialize};

pub use crate::repositories::{Alert, AlertCounts as AlertStatsResponse};

#[derive(Debug, Serialize, Deserialize)]
pub struct AcknowledgeResponse {
    pub message: String,
    pub alert: Alert,
}
