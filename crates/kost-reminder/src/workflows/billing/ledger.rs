use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument, warn};

use super::domain::{RentRecord, TenantId, TenantRecord};

const SNAPSHOT_QUERY: &str = "\
SELECT t.id_tenant, t.full_name, t.no_telp, r.id_rent, r.room_id, r.rent_date, r.rent_out
FROM tenant t
LEFT JOIN rent_data r ON r.tenant_id = t.id_tenant AND r.deleted = 0
WHERE t.deleted = 0";

/// Read side of the tenant/rent ledger owned by the admin backend.
#[async_trait]
pub trait TenantLedger: Send + Sync {
    /// Every live tenant with its rent record, as of now.
    async fn snapshot(&self) -> Result<Vec<TenantRecord>, LedgerError>;
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("tenant ledger unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),
    #[error("ledger migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// A single row that cannot be turned into a tenant record.
#[derive(Debug, thiserror::Error)]
enum RowError {
    #[error(transparent)]
    Column(#[from] sqlx::Error),
    #[error("column {column} holds unreadable date '{value}'")]
    Date { column: &'static str, value: String },
}

/// SQLite-backed ledger.
#[derive(Debug, Clone)]
pub struct SqlTenantLedger {
    pool: SqlitePool,
}

impl SqlTenantLedger {
    /// Pool over an existing database; connections are made on first use, so
    /// an unreachable store only fails the snapshot that needs it.
    pub fn open(database_url: &str) -> Result<Self, LedgerError> {
        let options = SqliteConnectOptions::from_str(database_url)?;
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_lazy_with(options);
        Ok(Self { pool })
    }

    /// Connect eagerly, creating the database file when missing.
    pub async fn create(database_url: &str) -> Result<Self, LedgerError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<(), LedgerError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl TenantLedger for SqlTenantLedger {
    #[instrument(skip_all)]
    async fn snapshot(&self) -> Result<Vec<TenantRecord>, LedgerError> {
        let rows = sqlx::query(SNAPSHOT_QUERY).fetch_all(&self.pool).await?;
        let mut tenants = Vec::with_capacity(rows.len());
        for row in &rows {
            match tenant_from_row(row) {
                Ok(tenant) => tenants.push(tenant),
                Err(err) => {
                    let tenant_id = row.try_get::<String, _>("id_tenant").unwrap_or_default();
                    warn!(%tenant_id, %err, "skipping unreadable ledger row");
                }
            }
        }
        debug!(count = tenants.len(), "loaded tenant ledger snapshot");
        Ok(tenants)
    }
}

fn tenant_from_row(row: &SqliteRow) -> Result<TenantRecord, RowError> {
    let rent_id: Option<String> = row.try_get("id_rent")?;
    let room_id: Option<String> = row.try_get("room_id")?;
    let rent_date = date_column(row, "rent_date")?;
    let rent_out = date_column(row, "rent_out")?;

    let rent = match (rent_id, rent_date) {
        (Some(rent_id), Some(rent_date)) => Some(RentRecord {
            rent_id,
            room_id: room_id.unwrap_or_default(),
            rent_date,
            rent_out,
        }),
        _ => None,
    };

    Ok(TenantRecord {
        id: TenantId(row.try_get("id_tenant")?),
        full_name: row.try_get("full_name")?,
        phone: row.try_get("no_telp")?,
        rent,
    })
}

/// Dates arrive as text in several shapes, or as epoch milliseconds.
fn date_column(row: &SqliteRow, column: &'static str) -> Result<Option<NaiveDate>, RowError> {
    let value = match row.try_get::<Option<String>, _>(column) {
        Ok(text) => text,
        Err(_) => row
            .try_get::<Option<i64>, _>(column)?
            .map(|millis| millis.to_string()),
    };

    match value {
        None => Ok(None),
        Some(value) => parse_ledger_date(&value)
            .map(Some)
            .ok_or(RowError::Date { column, value }),
    }
}

/// Calendar date out of `YYYY-MM-DD`, RFC 3339, `YYYY-MM-DD HH:MM:SS[.f]` or
/// epoch milliseconds (UTC).
fn parse_ledger_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%F") {
        return Some(date);
    }
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Some(instant.date_naive());
    }
    if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
        return raw
            .parse::<i64>()
            .ok()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|instant| instant.date_naive());
    }
    ["%F %T%.f", "%FT%T%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|stamp| stamp.date())
}
