//! `PostgreSQL` ticket store for gatecheck.
//!
//! Implements the `TicketStore` trait from `gatecheck-core` over a sqlx
//! connection pool. The check-in transition is a single conditional
//! `UPDATE ... WHERE status = 'valid'`, so any number of gate devices can
//! scan concurrently and exactly one of them admits a given ticket.
//!
//! # Example
//!
//! ```ignore
//! use gatecheck_postgres::PostgresTicketStore;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PostgresTicketStore::connect("postgres://localhost/gatecheck", 10).await?;
//!     store.migrate().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use chrono::{DateTime, Utc};
use gatecheck_core::store::{StoreError, StoreFuture, TicketStore};
use gatecheck_core::ticket::{
    EventId, ListingStatus, Money, OperatorId, Ticket, TicketId, TicketNumber, TicketStatus,
};
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use std::time::Instant;

const TICKET_COLUMNS: &str = "id, event_id, ticket_number, owner_id, attendee_name, \
     price_paid_cents, currency, status, checked_in_at, checked_in_by, \
     listing_status, listing_price_cents, created_at";

/// PostgreSQL-backed [`TicketStore`].
///
/// # Schema
///
/// One `tickets` table (see `migrations/`). Check constraints mirror the
/// ticket invariants: check-in fields are set iff the ticket is `used`, only
/// `valid` tickets can be listed, and a listing price exists iff listed.
#[derive(Clone, Debug)]
pub struct PostgresTicketStore {
    pool: PgPool,
}

impl PostgresTicketStore {
    /// Connect to `database_url` with a pool of at most `max_connections`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the database cannot be reached.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to connect: {e}")))?;

        tracing::info!(max_connections, "Connected to ticket database");
        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the `tickets` table if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// Insert a freshly sold ticket.
    ///
    /// Ticket sales live outside the check-in flow; this exists for seeding
    /// and tests.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateTicketNumber`] if the number is taken,
    /// [`StoreError::Corrupt`] if an amount does not fit the schema, or
    /// [`StoreError::Unavailable`] if the insert fails.
    pub async fn insert_ticket(&self, ticket: &Ticket) -> Result<(), StoreError> {
        let started = Instant::now();
        let result = sqlx::query(
            r"
            INSERT INTO tickets (
                id, event_id, ticket_number, owner_id, attendee_name,
                price_paid_cents, currency, status, checked_in_at, checked_in_by,
                listing_status, listing_price_cents, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ",
        )
        .bind(ticket.id.as_str())
        .bind(ticket.event_id.as_str())
        .bind(ticket.ticket_number.as_str())
        .bind(ticket.owner_id.as_deref())
        .bind(ticket.attendee_name.as_deref())
        .bind(cents_to_db(ticket.price_paid)?)
        .bind(&ticket.currency)
        .bind(ticket.status.as_str())
        .bind(ticket.checked_in_at)
        .bind(ticket.checked_in_by.as_ref().map(OperatorId::as_str))
        .bind(ticket.listing_status.as_str())
        .bind(ticket.listing_price.map(cents_to_db).transpose()?)
        .bind(ticket.created_at)
        .execute(&self.pool)
        .await;
        record_duration("insert", started);

        match result {
            Ok(_) => {
                tracing::debug!(ticket_id = %ticket.id, "Ticket inserted");
                Ok(())
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(
                StoreError::DuplicateTicketNumber(ticket.ticket_number.clone()),
            ),
            Err(e) => Err(database_error(&e)),
        }
    }

    async fn fetch_one_by(
        &self,
        op: &'static str,
        column: &'static str,
        value: &str,
    ) -> Result<Option<Ticket>, StoreError> {
        let started = Instant::now();
        let row = sqlx::query(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE {column} = $1"
        ))
        .bind(value)
        .fetch_optional(&self.pool)
        .await;
        record_duration(op, started);

        row.map_err(|e| database_error(&e))?
            .as_ref()
            .map(row_to_ticket)
            .transpose()
    }
}

impl TicketStore for PostgresTicketStore {
    fn lookup_by_id<'a>(&'a self, id: &'a TicketId) -> StoreFuture<'a, Option<Ticket>> {
        Box::pin(self.fetch_one_by("lookup_by_id", "id", id.as_str()))
    }

    fn lookup_by_number<'a>(
        &'a self,
        number: &'a TicketNumber,
    ) -> StoreFuture<'a, Option<Ticket>> {
        Box::pin(self.fetch_one_by("lookup_by_number", "ticket_number", number.as_str()))
    }

    fn compare_and_set_used<'a>(
        &'a self,
        ticket_id: &'a TicketId,
        operator: &'a OperatorId,
        now: DateTime<Utc>,
    ) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let started = Instant::now();
            // SET expressions see the pre-update row
            let result = sqlx::query(
                r"
                UPDATE tickets
                SET status = 'used',
                    checked_in_at = $3,
                    checked_in_by = $2,
                    listing_status = CASE WHEN listing_status = 'listed'
                                          THEN 'cancelled' ELSE listing_status END,
                    listing_price_cents = CASE WHEN listing_status = 'listed'
                                               THEN NULL ELSE listing_price_cents END
                WHERE id = $1 AND status = 'valid'
                ",
            )
            .bind(ticket_id.as_str())
            .bind(operator.as_str())
            .bind(now)
            .execute(&self.pool)
            .await;
            record_duration("compare_and_set_used", started);

            let updated = result.map_err(|e| database_error(&e))?.rows_affected() == 1;
            tracing::debug!(ticket_id = %ticket_id, updated, "Check-in update issued");
            Ok(updated)
        })
    }

    fn reset_to_valid<'a>(&'a self, ticket_id: &'a TicketId) -> StoreFuture<'a, Ticket> {
        Box::pin(async move {
            let started = Instant::now();
            let row = sqlx::query(&format!(
                r"
                UPDATE tickets
                SET status = 'valid', checked_in_at = NULL, checked_in_by = NULL
                WHERE id = $1
                RETURNING {TICKET_COLUMNS}
                "
            ))
            .bind(ticket_id.as_str())
            .fetch_optional(&self.pool)
            .await;
            record_duration("reset_to_valid", started);

            let row = row
                .map_err(|e| database_error(&e))?
                .ok_or_else(|| StoreError::NotFound(ticket_id.clone()))?;
            row_to_ticket(&row)
        })
    }
}

fn row_to_ticket(row: &PgRow) -> Result<Ticket, StoreError> {
    let status: String = column(row, "status")?;
    let status = TicketStatus::parse(&status)
        .ok_or_else(|| StoreError::Corrupt(format!("Invalid ticket status: {status}")))?;

    let listing_status: String = column(row, "listing_status")?;
    let listing_status = ListingStatus::parse(&listing_status).ok_or_else(|| {
        StoreError::Corrupt(format!("Invalid listing status: {listing_status}"))
    })?;

    let listing_price: Option<i64> = column(row, "listing_price_cents")?;

    Ok(Ticket {
        id: TicketId::new(column::<String>(row, "id")?),
        event_id: EventId::new(column::<String>(row, "event_id")?),
        ticket_number: TicketNumber::new(column::<String>(row, "ticket_number")?),
        owner_id: column(row, "owner_id")?,
        attendee_name: column(row, "attendee_name")?,
        price_paid: cents_from_db(column(row, "price_paid_cents")?)?,
        currency: column(row, "currency")?,
        status,
        checked_in_at: column(row, "checked_in_at")?,
        checked_in_by: column::<Option<String>>(row, "checked_in_by")?.map(OperatorId::new),
        listing_status,
        listing_price: listing_price.map(cents_from_db).transpose()?,
        created_at: column(row, "created_at")?,
    })
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(name)
        .map_err(|e| StoreError::Corrupt(format!("Column {name}: {e}")))
}

fn cents_to_db(money: Money) -> Result<i64, StoreError> {
    i64::try_from(money.cents())
        .map_err(|_| StoreError::Corrupt(format!("Amount out of range: {} cents", money.cents())))
}

fn cents_from_db(cents: i64) -> Result<Money, StoreError> {
    u64::try_from(cents)
        .map(Money::from_cents)
        .map_err(|_| StoreError::Corrupt(format!("Negative amount: {cents} cents")))
}

fn database_error(error: &sqlx::Error) -> StoreError {
    match error {
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::Decode(_) => StoreError::Corrupt(error.to_string()),
        _ => {
            tracing::warn!(error = %error, "Ticket database query failed");
            StoreError::Unavailable(error.to_string())
        }
    }
}

fn record_duration(op: &'static str, started: Instant) {
    metrics::histogram!("gatecheck_store_query_duration_seconds", "op" => op)
        .record(started.elapsed().as_secs_f64());
}
