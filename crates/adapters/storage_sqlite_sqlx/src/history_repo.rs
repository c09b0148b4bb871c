//! `SQLite` implementation of [`HistoryStore`].

use std::future::Future;
use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

use irrigo_app::ports::HistoryStore;
use irrigo_domain::error::IrrigoError;
use irrigo_domain::history::{CycleMetrics, HistoryRecord, RunKind};
use irrigo_domain::id::{HistoryId, RoomId};
use irrigo_domain::time::Timestamp;

use crate::error::StorageError;
use crate::{SqliteStorage, decode_timestamp, encode_timestamp};

/// Wrapper for converting database rows into domain types without polluting
/// domain structs with database concerns.
struct Wrapper(HistoryRecord);

fn decode_err<E>(err: E) -> sqlx::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    sqlx::Error::Decode(Box::new(err))
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: uuid::Uuid = row.try_get("id")?;
        let room_id: String = row.try_get("room_id")?;
        let kind: String = row.try_get("kind")?;
        let duration: u32 = row.try_get("duration")?;
        let success: bool = row.try_get("success")?;
        let error_message: Option<String> = row.try_get("error_message")?;
        let recorded_at: String = row.try_get("recorded_at")?;

        Ok(Self(HistoryRecord {
            id: HistoryId::from_uuid(id),
            room_id: RoomId::from_str(&room_id).map_err(decode_err)?,
            kind: RunKind::from_str(&kind).map_err(decode_err)?,
            duration,
            success,
            error_message,
            timestamp: decode_timestamp(&recorded_at)?,
        }))
    }
}

struct MetricsRow(CycleMetrics);

impl<'r> FromRow<'r, SqliteRow> for MetricsRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let read = |column: &str| -> Result<u64, sqlx::Error> {
            let value: i64 = row.try_get(column)?;
            u64::try_from(value).map_err(decode_err)
        };
        Ok(Self(CycleMetrics {
            total_attempts: read("total_attempts")?,
            successful_cycles: read("successful_cycles")?,
            failed_cycles: read("failed_cycles")?,
            total_duration: read("total_duration")?,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO irrigation_history (id, room_id, kind, duration, success, error_message, recorded_at)
    VALUES (?, ?, ?, ?, ?, ?, ?)
";

const SELECT_SINCE: &str = r"
    SELECT * FROM irrigation_history
    WHERE recorded_at >= ?
    ORDER BY recorded_at DESC
";

const SELECT_ROOM_SINCE: &str = r"
    SELECT * FROM irrigation_history
    WHERE room_id = ? AND recorded_at >= ?
    ORDER BY recorded_at DESC
";

const DELETE_BEFORE: &str = "DELETE FROM irrigation_history WHERE recorded_at < ?";

const RECORD_CYCLE: &str = r"
    UPDATE cycle_metrics SET
        total_attempts = total_attempts + 1,
        successful_cycles = successful_cycles + ?,
        failed_cycles = failed_cycles + ?,
        total_duration = total_duration + ?
    WHERE id = 1
";

const SELECT_METRICS: &str = "SELECT * FROM cycle_metrics WHERE id = 1";

const RESET_METRICS: &str = r"
    UPDATE cycle_metrics SET
        total_attempts = 0, successful_cycles = 0, failed_cycles = 0, total_duration = 0
    WHERE id = 1
";

impl HistoryStore for SqliteStorage {
    fn append(
        &self,
        record: &HistoryRecord,
    ) -> impl Future<Output = Result<(), IrrigoError>> + Send {
        let pool = self.pool.clone();
        let record = record.clone();
        async move {
            sqlx::query(INSERT)
                .bind(record.id.as_uuid())
                .bind(record.room_id.as_str())
                .bind(record.kind.to_string())
                .bind(record.duration)
                .bind(record.success)
                .bind(record.error_message.as_deref())
                .bind(encode_timestamp(record.timestamp))
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(())
        }
    }

    fn find_since(
        &self,
        room: Option<&RoomId>,
        since: Timestamp,
    ) -> impl Future<Output = Result<Vec<HistoryRecord>, IrrigoError>> + Send {
        let pool = self.pool.clone();
        let room = room.cloned();
        async move {
            let since = encode_timestamp(since);
            let query = match &room {
                Some(room) => sqlx::query_as(SELECT_ROOM_SINCE)
                    .bind(room.as_str())
                    .bind(since),
                None => sqlx::query_as(SELECT_SINCE).bind(since),
            };
            let rows: Vec<Wrapper> = query.fetch_all(&pool).await.map_err(StorageError::from)?;

            Ok(rows.into_iter().map(|w| w.0).collect())
        }
    }

    fn purge_before(
        &self,
        before: Timestamp,
    ) -> impl Future<Output = Result<u64, IrrigoError>> + Send {
        let pool = self.pool.clone();
        async move {
            let result = sqlx::query(DELETE_BEFORE)
                .bind(encode_timestamp(before))
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(result.rows_affected())
        }
    }

    fn record_cycle(
        &self,
        success: bool,
        duration: u32,
    ) -> impl Future<Output = Result<(), IrrigoError>> + Send {
        let pool = self.pool.clone();
        async move {
            sqlx::query(RECORD_CYCLE)
                .bind(i64::from(success))
                .bind(i64::from(!success))
                .bind(i64::from(duration))
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(())
        }
    }

    fn cycle_metrics(&self) -> impl Future<Output = Result<CycleMetrics, IrrigoError>> + Send {
        let pool = self.pool.clone();
        async move {
            let row: Option<MetricsRow> = sqlx::query_as(SELECT_METRICS)
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(row.map(|row| row.0).unwrap_or_default())
        }
    }

    fn reset_cycle_metrics(&self) -> impl Future<Output = Result<(), IrrigoError>> + Send {
        let pool = self.pool.clone();
        async move {
            sqlx::query(RESET_METRICS)
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use irrigo_domain::event::EventType;

    use super::*;
    use crate::memory_storage;

    fn at(hour: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap()
    }

    fn room(id: &str) -> RoomId {
        RoomId::new(id).unwrap()
    }

    #[tokio::test]
    async fn should_return_records_newest_first() {
        let repo = memory_storage().await;
        let first = HistoryRecord::success(room("veg"), RunKind::Event(EventType::P1), 60, at(6));
        let second = HistoryRecord::failure(
            room("veg"),
            RunKind::Manual,
            0,
            "Daily irrigation limit exceeded",
            at(9),
        );
        repo.append(&first).await.unwrap();
        repo.append(&second).await.unwrap();

        let records = repo.find_since(None, at(0)).await.unwrap();

        assert_eq!(records, vec![second, first]);
    }

    #[tokio::test]
    async fn should_filter_by_room_and_time() {
        let repo = memory_storage().await;
        let old = HistoryRecord::success(room("veg"), RunKind::Manual, 60, at(1));
        let recent = HistoryRecord::success(room("veg"), RunKind::Manual, 60, at(8));
        let other = HistoryRecord::success(room("flower"), RunKind::Manual, 60, at(8));
        for record in [&old, &recent, &other] {
            repo.append(record).await.unwrap();
        }

        let records = repo.find_since(Some(&room("veg")), at(5)).await.unwrap();

        assert_eq!(records, vec![recent]);
    }

    #[tokio::test]
    async fn should_purge_only_records_before_cutoff() {
        let repo = memory_storage().await;
        for hour in [1, 2, 10] {
            let record = HistoryRecord::success(room("veg"), RunKind::Manual, 60, at(hour));
            repo.append(&record).await.unwrap();
        }

        let removed = repo.purge_before(at(2)).await.unwrap();

        assert_eq!(removed, 1);
        assert_eq!(repo.find_since(None, at(0)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn should_order_sub_second_timestamps_correctly() {
        let repo = memory_storage().await;
        let base = at(6);
        let later = base + Duration::milliseconds(250);
        repo.append(&HistoryRecord::success(room("veg"), RunKind::Manual, 1, later))
            .await
            .unwrap();
        repo.append(&HistoryRecord::success(room("veg"), RunKind::Manual, 2, base))
            .await
            .unwrap();

        let durations: Vec<u32> = repo
            .find_since(None, base)
            .await
            .unwrap()
            .into_iter()
            .map(|record| record.duration)
            .collect();

        assert_eq!(durations, vec![1, 2]);
    }

    #[tokio::test]
    async fn should_accumulate_and_reset_cycle_metrics() {
        let repo = memory_storage().await;
        repo.record_cycle(true, 120).await.unwrap();
        repo.record_cycle(false, 0).await.unwrap();

        let metrics = repo.cycle_metrics().await.unwrap();
        assert_eq!(
            metrics,
            CycleMetrics {
                total_attempts: 2,
                successful_cycles: 1,
                failed_cycles: 1,
                total_duration: 120,
            }
        );

        repo.reset_cycle_metrics().await.unwrap();
        assert_eq!(repo.cycle_metrics().await.unwrap(), CycleMetrics::default());
    }
}
