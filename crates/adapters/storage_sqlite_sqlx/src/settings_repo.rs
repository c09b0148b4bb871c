//! `SQLite` implementation of [`SettingsRepository`].

use std::future::Future;

use irrigo_app::ports::SettingsRepository;
use irrigo_domain::error::IrrigoError;
use irrigo_domain::settings::Settings;

use crate::SqliteStorage;
use crate::error::StorageError;

const SELECT: &str = "SELECT config FROM settings WHERE id = 1";
const UPSERT: &str = r"
    INSERT INTO settings (id, config) VALUES (1, ?)
    ON CONFLICT (id) DO UPDATE SET config = excluded.config
";

impl SettingsRepository for SqliteStorage {
    fn get(&self) -> impl Future<Output = Result<Settings, IrrigoError>> + Send {
        let pool = self.pool.clone();
        async move {
            let row: Option<(String,)> = sqlx::query_as(SELECT)
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            match row {
                Some((config,)) => {
                    let settings = serde_json::from_str(&config).map_err(StorageError::from)?;
                    Ok(settings)
                }
                None => Ok(Settings::default()),
            }
        }
    }

    fn save(&self, settings: &Settings) -> impl Future<Output = Result<(), IrrigoError>> + Send {
        let pool = self.pool.clone();
        let config = serde_json::to_string(settings);
        async move {
            let config = config.map_err(StorageError::from)?;
            sqlx::query(UPSERT)
                .bind(config)
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(())
        }
    }
}
