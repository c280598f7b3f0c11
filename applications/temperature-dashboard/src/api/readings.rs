use super::client::{ApiClient, ApiError};
use crate::models::{Reading, ReadingPage};

impl ApiClient {
    /// Most recent reading, `None` while the server has no data yet
    pub async fn latest_reading(&self) -> Result<Option<Reading>, ApiError> {
        self.get_optional("/api/data/latest").await
    }

    /// One page of reading history, newest first
    pub async fn reading_history(&self, page: u32, limit: u32) -> Result<Vec<Reading>, ApiError> {
        let page: ReadingPage = self
            .get(&format!("/api/data?page={}&limit={}", page, limit))
            .await?;
        Ok(page.data)
    }
}
