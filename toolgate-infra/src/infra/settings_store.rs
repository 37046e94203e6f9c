use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use toolgate_core::{
    ConnectorPermission, SettingsPatch, SettingsStore, StoreError, Tier, UserSettings,
};

#[derive(Error, Debug)]
pub enum SettingsDbError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl From<SettingsDbError> for StoreError {
    fn from(err: SettingsDbError) -> Self {
        match err {
            SettingsDbError::Database(e) => StoreError::Database(e.to_string()),
            SettingsDbError::Corrupt(msg) => StoreError::Corrupt(msg),
        }
    }
}

type SettingsRow = (String, i64, Option<String>, bool, String);
type PermissionRow = (String, String, i64, String);

/// SQLite-backed settings and grant rows.
pub struct SettingsDb {
    conn: Mutex<Connection>,
}

impl SettingsDb {
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self, SettingsDbError> {
        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, SettingsDbError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, SettingsDbError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS user_settings (
                user_id TEXT PRIMARY KEY,
                permission_level INTEGER NOT NULL DEFAULT 0,
                vacation_mode_until TEXT,
                require_confirmation INTEGER NOT NULL DEFAULT 1,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS connector_permissions (
                user_id TEXT NOT NULL,
                connector TEXT NOT NULL,
                tier INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (user_id, connector)
            )",
            [],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn get_user_settings(
        &self,
        user_id: &str,
    ) -> Result<Option<UserSettings>, SettingsDbError> {
        let conn = self.conn.lock();
        let row = Self::read_settings(&conn, user_id)?;
        row.map(settings_from_row).transpose()
    }

    pub fn upsert_user_settings(
        &self,
        user_id: &str,
        patch: &SettingsPatch,
    ) -> Result<UserSettings, SettingsDbError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let mut settings = match Self::read_settings(&tx, user_id)? {
            Some(row) => settings_from_row(row)?,
            None => UserSettings::defaults(user_id),
        };
        settings.apply(patch);

        tx.execute(
            "INSERT INTO user_settings
                (user_id, permission_level, vacation_mode_until, require_confirmation, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(user_id) DO UPDATE SET
                permission_level = excluded.permission_level,
                vacation_mode_until = excluded.vacation_mode_until,
                require_confirmation = excluded.require_confirmation,
                updated_at = excluded.updated_at",
            params![
                settings.user_id,
                settings.permission_level.level(),
                settings.vacation_mode_until.map(|t| t.to_rfc3339()),
                settings.require_confirmation,
                settings.updated_at.to_rfc3339(),
            ],
        )?;
        tx.commit()?;

        Ok(settings)
    }

    pub fn get_connector_permission(
        &self,
        user_id: &str,
        connector: &str,
    ) -> Result<Option<ConnectorPermission>, SettingsDbError> {
        let conn = self.conn.lock();
        let row: Option<PermissionRow> = conn
            .query_row(
                "SELECT user_id, connector, tier, updated_at FROM connector_permissions
                 WHERE user_id = ?1 AND connector = ?2",
                params![user_id, connector],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;
        row.map(permission_from_row).transpose()
    }

    pub fn upsert_connector_permission(
        &self,
        user_id: &str,
        connector: &str,
        tier: Tier,
    ) -> Result<ConnectorPermission, SettingsDbError> {
        let permission = ConnectorPermission::new(user_id, connector, tier);
        let conn = self.conn.lock();

        conn.execute(
            "INSERT INTO connector_permissions (user_id, connector, tier, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id, connector) DO UPDATE SET
                tier = excluded.tier,
                updated_at = excluded.updated_at",
            params![
                permission.user_id,
                permission.connector,
                permission.tier.level(),
                permission.updated_at.to_rfc3339(),
            ],
        )?;

        Ok(permission)
    }

    pub fn list_connector_permissions(
        &self,
        user_id: &str,
    ) -> Result<Vec<ConnectorPermission>, SettingsDbError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT user_id, connector, tier, updated_at FROM connector_permissions
             WHERE user_id = ?1 ORDER BY connector",
        )?;

        let rows = stmt.query_map(params![user_id], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })?;

        let mut permissions = Vec::new();
        for row in rows {
            permissions.push(permission_from_row(row?)?);
        }

        Ok(permissions)
    }

    fn read_settings(
        conn: &Connection,
        user_id: &str,
    ) -> Result<Option<SettingsRow>, SettingsDbError> {
        Ok(conn
            .query_row(
                "SELECT user_id, permission_level, vacation_mode_until,
                        require_confirmation, updated_at
                 FROM user_settings WHERE user_id = ?1",
                params![user_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )
            .optional()?)
    }
}

fn tier_from_column(value: i64) -> Result<Tier, SettingsDbError> {
    u8::try_from(value)
        .ok()
        .and_then(Tier::from_level)
        .ok_or_else(|| SettingsDbError::Corrupt(format!("tier out of range: {}", value)))
}

fn timestamp_from_column(value: &str) -> Result<DateTime<Utc>, SettingsDbError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| SettingsDbError::Corrupt(format!("bad timestamp '{}': {}", value, e)))
}

fn settings_from_row(row: SettingsRow) -> Result<UserSettings, SettingsDbError> {
    let (user_id, level, vacation, require_confirmation, updated_at) = row;
    Ok(UserSettings {
        user_id,
        permission_level: tier_from_column(level)?,
        vacation_mode_until: vacation.as_deref().map(timestamp_from_column).transpose()?,
        require_confirmation,
        updated_at: timestamp_from_column(&updated_at)?,
    })
}

fn permission_from_row(row: PermissionRow) -> Result<ConnectorPermission, SettingsDbError> {
    let (user_id, connector, tier, updated_at) = row;
    Ok(ConnectorPermission {
        user_id,
        connector,
        tier: tier_from_column(tier)?,
        updated_at: timestamp_from_column(&updated_at)?,
    })
}

/// Async [`SettingsStore`] over a [`SettingsDb`]; queries run on the blocking
/// pool.
#[derive(Clone)]
pub struct SqliteSettingsStore {
    inner: Arc<SettingsDb>,
}

impl SqliteSettingsStore {
    pub fn new(inner: Arc<SettingsDb>) -> Self {
        Self { inner }
    }

    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self, SettingsDbError> {
        Ok(Self::new(Arc::new(SettingsDb::open(db_path)?)))
    }

    async fn run<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&SettingsDb) -> Result<T, SettingsDbError> + Send + 'static,
    {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || op(&inner).map_err(StoreError::from))
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
    }
}

#[async_trait]
impl SettingsStore for SqliteSettingsStore {
    async fn get_user_settings(&self, user_id: &str) -> Result<Option<UserSettings>, StoreError> {
        let user_id = user_id.to_string();
        self.run(move |db| db.get_user_settings(&user_id)).await
    }

    async fn upsert_user_settings(
        &self,
        user_id: &str,
        patch: SettingsPatch,
    ) -> Result<UserSettings, StoreError> {
        let user_id = user_id.to_string();
        self.run(move |db| db.upsert_user_settings(&user_id, &patch)).await
    }

    async fn get_connector_permission(
        &self,
        user_id: &str,
        connector: &str,
    ) -> Result<Option<ConnectorPermission>, StoreError> {
        let user_id = user_id.to_string();
        let connector = connector.to_string();
        self.run(move |db| db.get_connector_permission(&user_id, &connector))
            .await
    }

    async fn upsert_connector_permission(
        &self,
        user_id: &str,
        connector: &str,
        tier: Tier,
    ) -> Result<ConnectorPermission, StoreError> {
        let user_id = user_id.to_string();
        let connector = connector.to_string();
        self.run(move |db| db.upsert_connector_permission(&user_id, &connector, tier))
            .await
    }

    async fn list_connector_permissions(
        &self,
        user_id: &str,
    ) -> Result<Vec<ConnectorPermission>, StoreError> {
        let user_id = user_id.to_string();
        self.run(move |db| db.list_connector_permissions(&user_id)).await
    }
}
