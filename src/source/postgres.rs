use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgConnection, PgRow};
use sqlx::{Column, Connection, Row, TypeInfo};
use time::{OffsetDateTime, PrimitiveDateTime};

use super::{RecordSource, SourceRow, TableName};

/// Postgres-backed source over a single connection.
///
/// Every table is expected to carry `id BIGINT`, `timestamp TIMESTAMPTZ`,
/// `device_id TEXT` and `value DOUBLE PRECISION`. A zone-less `TIMESTAMP`
/// column is also accepted and read as UTC, which is the session time zone
/// sqlx connects with.
pub struct PgSource {
    conn: PgConnection,
}

impl PgSource {
    /// Opens a connection and pings it so an unreachable server fails here.
    pub async fn connect(url: &str) -> Result<Self> {
        let mut conn = PgConnection::connect(url)
            .await
            .context("connecting to postgres")?;
        conn.ping().await.context("testing database connection")?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl RecordSource for PgSource {
    async fn fetch_expired(
        &mut self,
        table: &TableName,
        cutoff: OffsetDateTime,
        limit: usize,
    ) -> Result<Vec<SourceRow>> {
        let sql = format!(
            "SELECT id, timestamp, device_id, value FROM {} \
             WHERE timestamp < $1 ORDER BY timestamp DESC LIMIT $2",
            table.quoted()
        );
        let limit = i64::try_from(limit).context("batch size out of range")?;
        let rows = sqlx::query(&sql)
            .bind(cutoff)
            .bind(limit)
            .fetch_all(&mut self.conn)
            .await
            .with_context(|| format!("querying old records from {table}"))?;

        rows.iter()
            .map(|row| decode_row(row).with_context(|| format!("scanning row from {table}")))
            .collect()
    }

    async fn purge_expired(&mut self, table: &TableName, cutoff: OffsetDateTime) -> Result<u64> {
        let sql = format!("DELETE FROM {} WHERE timestamp < $1", table.quoted());
        let result = sqlx::query(&sql)
            .bind(cutoff)
            .execute(&mut self.conn)
            .await
            .with_context(|| format!("deleting rows from {table}"))?;
        Ok(result.rows_affected())
    }
}

fn decode_row(row: &PgRow) -> Result<SourceRow> {
    Ok(SourceRow {
        id: row.try_get("id")?,
        timestamp: decode_timestamp(row)?,
        device_id: row.try_get("device_id")?,
        value: row.try_get("value")?,
    })
}

fn decode_timestamp(row: &PgRow) -> Result<OffsetDateTime> {
    let column = row.try_column("timestamp")?;
    if is_zoned_timestamp(column.type_info().name())? {
        Ok(row.try_get("timestamp")?)
    } else {
        let naive: PrimitiveDateTime = row.try_get("timestamp")?;
        Ok(naive.assume_utc())
    }
}

fn is_zoned_timestamp(type_name: &str) -> Result<bool> {
    match type_name {
        "TIMESTAMPTZ" => Ok(true),
        "TIMESTAMP" => Ok(false),
        other => bail!("timestamp column has type {other}, expected TIMESTAMPTZ or TIMESTAMP"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_both_timestamp_column_types() {
        assert!(is_zoned_timestamp("TIMESTAMPTZ").unwrap());
        assert!(!is_zoned_timestamp("TIMESTAMP").unwrap());
        let err = is_zoned_timestamp("DATE").unwrap_err();
        assert!(err.to_string().contains("DATE"));
    }
}
