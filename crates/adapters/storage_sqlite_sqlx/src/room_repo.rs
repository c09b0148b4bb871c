//! `SQLite` implementation of [`RoomRepository`].
//!
//! A room, its events and their shots are one JSON document; the name is
//! duplicated in a column for ad-hoc queries.

use std::future::Future;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

use irrigo_app::ports::RoomRepository;
use irrigo_domain::error::{IrrigoError, NotFoundError};
use irrigo_domain::id::RoomId;
use irrigo_domain::room::Room;
use irrigo_domain::time;

use crate::error::StorageError;
use crate::{SqliteStorage, encode_timestamp};

/// Wrapper for converting database rows into domain [`Room`].
struct Wrapper(Room);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<Room> {
        value.map(|w| w.0)
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let config: String = row.try_get("config")?;
        let room: Room =
            serde_json::from_str(&config).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        Ok(Self(room))
    }
}

const INSERT: &str = "INSERT INTO rooms (id, name, config, updated_at) VALUES (?, ?, ?, ?)";
const SELECT_BY_ID: &str = "SELECT config FROM rooms WHERE id = ?";
const SELECT_ALL: &str = "SELECT config FROM rooms ORDER BY id";
const UPDATE: &str = "UPDATE rooms SET name = ?, config = ?, updated_at = ? WHERE id = ?";
const DELETE_BY_ID: &str = "DELETE FROM rooms WHERE id = ?";

impl RoomRepository for SqliteStorage {
    fn create(&self, room: Room) -> impl Future<Output = Result<Room, IrrigoError>> + Send {
        let pool = self.pool.clone();
        async move {
            let config = serde_json::to_string(&room).map_err(StorageError::from)?;
            sqlx::query(INSERT)
                .bind(room.id.as_str())
                .bind(&room.name)
                .bind(config)
                .bind(encode_timestamp(time::now()))
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(room)
        }
    }

    fn get_by_id(
        &self,
        id: &RoomId,
    ) -> impl Future<Output = Result<Option<Room>, IrrigoError>> + Send {
        let pool = self.pool.clone();
        let id = id.clone();
        async move {
            let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
                .bind(id.as_str())
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::maybe(row))
        }
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Room>, IrrigoError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SELECT_ALL)
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(rows.into_iter().map(|w| w.0).collect())
        }
    }

    fn update(&self, room: Room) -> impl Future<Output = Result<Room, IrrigoError>> + Send {
        let pool = self.pool.clone();
        async move {
            let config = serde_json::to_string(&room).map_err(StorageError::from)?;
            let result = sqlx::query(UPDATE)
                .bind(&room.name)
                .bind(config)
                .bind(encode_timestamp(time::now()))
                .bind(room.id.as_str())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            if result.rows_affected() == 0 {
                return Err(NotFoundError::room(&room.id).into());
            }
            Ok(room)
        }
    }

    fn delete(&self, id: &RoomId) -> impl Future<Output = Result<(), IrrigoError>> + Send {
        let pool = self.pool.clone();
        let id = id.clone();
        async move {
            sqlx::query(DELETE_BY_ID)
                .bind(id.as_str())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(())
        }
    }
}
