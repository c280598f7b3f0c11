use super::{Alert, AlertCounts, NewAlert, NewReading, Reading, TelemetryStore};
use crate::db::DbPool;
use crate::error::Result;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, Row};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn counts_from_row(row: &PgRow) -> std::result::Result<AlertCounts, sqlx::Error> {
    Ok(AlertCounts {
        total: row.try_get("total")?,
        unacknowledged: row.try_get("unacknowledged")?,
        today: row.try_get("today")?,
    })
}

#[async_trait::async_trait]
impl TelemetryStore for PgStore {
    async fn insert_reading(
        &self,
        reading: NewReading,
        alert: Option<NewAlert>,
    ) -> Result<(Reading, Option<Alert>)> {
        let mut tx = self.pool.begin().await?;

        let stored = sqlx::query_as::<_, Reading>(
            r#"
            INSERT INTO readings (temperature, timestamp, alert)
            VALUES ($1, $2, $3)
            RETURNING id, temperature, timestamp, alert
            "#,
        )
        .bind(reading.temperature)
        .bind(reading.timestamp)
        .bind(reading.alert)
        .fetch_one(&mut *tx)
        .await?;

        let stored_alert = match alert {
            Some(alert) => Some(
                sqlx::query_as::<_, Alert>(
                    r#"
                    INSERT INTO alerts (temperature, message, timestamp, acknowledged)
                    VALUES ($1, $2, $3, FALSE)
                    RETURNING id, temperature, message, timestamp, acknowledged
                    "#,
                )
                .bind(alert.temperature)
                .bind(&alert.message)
                .bind(alert.timestamp)
                .fetch_one(&mut *tx)
                .await?,
            ),
            None => None,
        };

        tx.commit().await?;

        Ok((stored, stored_alert))
    }

    async fn latest_reading(&self) -> Result<Option<Reading>> {
        let reading = sqlx::query_as::<_, Reading>(
            r#"
            SELECT id, temperature, timestamp, alert
            FROM readings
            ORDER BY timestamp DESC, id DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(reading)
    }

    async fn list_readings(&self, offset: i64, limit: i64) -> Result<Vec<Reading>> {
        let readings = sqlx::query_as::<_, Reading>(
            r#"
            SELECT id, temperature, timestamp, alert
            FROM readings
            ORDER BY timestamp DESC, id DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(readings)
    }

    async fn recent_alerts(&self, limit: i64) -> Result<Vec<Alert>> {
        let alerts = sqlx::query_as::<_, Alert>(
            r#"
            SELECT id, temperature, message, timestamp, acknowledged
            FROM alerts
            ORDER BY timestamp DESC, id DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(alerts)
    }

    async fn alert_counts(
        &self,
        day_start: DateTime<Utc>,
        day_end: DateTime<Utc>,
    ) -> Result<AlertCounts> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE NOT acknowledged) AS unacknowledged,
                COUNT(*) FILTER (WHERE timestamp >= $1 AND timestamp < $2) AS today
            FROM alerts
            "#,
        )
        .bind(day_start)
        .bind(day_end)
        .fetch_one(&self.pool)
        .await?;

        Ok(counts_from_row(&row)?)
    }

    async fn acknowledge_alert(&self, id: i64) -> Result<Option<Alert>> {
        let alert = sqlx::query_as::<_, Alert>(
            r#"
            UPDATE alerts SET acknowledged = TRUE
            WHERE id = $1
            RETURNING id, temperature, message, timestamp, acknowledged
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(alert)
    }

    async fn ping(&self) -> bool {
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "database ping failed");
                false
            }
        }
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
