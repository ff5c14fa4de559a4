//! SQLite persistence.
//!
//! Foreign keys carry `ON DELETE CASCADE`, so removing a quote removes its
//! event, venue, policy holder, policy and payments in one statement.

use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, Transaction};

use crate::lifecycle::domain::{
    EventDetails, EventRecord, NewPayment, PaymentRecord, PolicyHolderDetails,
    PolicyHolderRecord, PolicyIssue, PolicyNumber, PolicyRecord, QuoteDetails, QuoteFilter,
    QuoteNumber, QuoteRecord, RecordId, VenueDetails, VenueRecord,
};
use crate::lifecycle::repository::{InsuranceRepository, StoreError};
use crate::pricing::PremiumBreakdown;

pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS quotes (
  quote_number TEXT PRIMARY KEY,
  source TEXT NOT NULL,
  status TEXT NOT NULL,
  resident_state TEXT NOT NULL,
  event_type TEXT NOT NULL,
  event_date TEXT NOT NULL,
  guest_range TEXT NOT NULL,
  coverage_level INTEGER NOT NULL,
  liability_option TEXT NOT NULL,
  liquor_liability INTEGER NOT NULL,
  covid_disclosure INTEGER NOT NULL,
  special_activities INTEGER NOT NULL,
  email TEXT NOT NULL,
  base_premium INTEGER NOT NULL,
  liability_premium INTEGER NOT NULL,
  liquor_liability_premium INTEGER NOT NULL,
  total_premium INTEGER NOT NULL,
  converted_to_policy INTEGER NOT NULL DEFAULT 0,
  created_at TEXT NOT NULL,
  updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS events (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  quote_number TEXT NOT NULL UNIQUE REFERENCES quotes(quote_number) ON DELETE CASCADE,
  honoree1_first_name TEXT NOT NULL,
  honoree1_last_name TEXT NOT NULL,
  honoree2_first_name TEXT,
  honoree2_last_name TEXT,
  ceremony_location_type TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS venues (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  event_id INTEGER NOT NULL UNIQUE REFERENCES events(id) ON DELETE CASCADE,
  name TEXT NOT NULL,
  address1 TEXT NOT NULL,
  address2 TEXT,
  city TEXT NOT NULL,
  state TEXT NOT NULL,
  zip TEXT NOT NULL,
  country TEXT NOT NULL,
  as_insured INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS policy_holders (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  quote_number TEXT NOT NULL UNIQUE REFERENCES quotes(quote_number) ON DELETE CASCADE,
  first_name TEXT NOT NULL,
  last_name TEXT NOT NULL,
  phone TEXT NOT NULL,
  relationship TEXT NOT NULL,
  address TEXT NOT NULL,
  city TEXT NOT NULL,
  state TEXT NOT NULL,
  zip TEXT NOT NULL,
  country TEXT NOT NULL,
  hear_about_us TEXT,
  legal_notices_accepted INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS policies (
  policy_number TEXT PRIMARY KEY,
  quote_number TEXT NOT NULL UNIQUE REFERENCES quotes(quote_number) ON DELETE CASCADE,
  source TEXT NOT NULL,
  status TEXT NOT NULL,
  issued_at TEXT NOT NULL,
  updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS payments (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  policy_number TEXT NOT NULL REFERENCES policies(policy_number) ON DELETE CASCADE,
  amount INTEGER NOT NULL,
  method TEXT NOT NULL,
  status TEXT NOT NULL,
  reference TEXT,
  paid_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS payments_policy_idx ON payments(policy_number);
";

const QUOTE_COLUMNS: &str = "quote_number, source, status, resident_state, event_type, event_date, \
     guest_range, coverage_level, liability_option, liquor_liability, covid_disclosure, \
     special_activities, email, base_premium, liability_premium, liquor_liability_premium, \
     total_premium, converted_to_policy, created_at, updated_at";

const EVENT_COLUMNS: &str = "id, quote_number, honoree1_first_name, honoree1_last_name, \
     honoree2_first_name, honoree2_last_name, ceremony_location_type";

const VENUE_COLUMNS: &str =
    "id, event_id, name, address1, address2, city, state, zip, country, as_insured";

const HOLDER_COLUMNS: &str = "id, quote_number, first_name, last_name, phone, relationship, \
     address, city, state, zip, country, hear_about_us, legal_notices_accepted";

const POLICY_COLUMNS: &str = "policy_number, quote_number, source, status, issued_at, updated_at";

const PAYMENT_COLUMNS: &str = "id, policy_number, amount, method, status, reference, paid_at";

/// Relational store backed by a single SQLite connection.
pub struct SqliteRepository {
    conn: Mutex<Connection>,
}

impl SqliteRepository {
    /// Open (or create) the database at `path` and apply the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(store_error)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(store_error)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(store_error)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(store_error)?;
        conn.execute_batch(SCHEMA).map_err(store_error)?;
        conn.execute_batch(&format!("PRAGMA user_version={SCHEMA_VERSION};"))
            .map_err(store_error)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection mutex poisoned".to_string()))
    }
}

fn store_error(err: rusqlite::Error) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, message)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            StoreError::Conflict(message.clone().unwrap_or_else(|| err.to_string()))
        }
        _ => StoreError::Unavailable(err.to_string()),
    }
}

fn require_changed(changed: usize) -> Result<(), StoreError> {
    if changed == 0 {
        Err(StoreError::NotFound)
    } else {
        Ok(())
    }
}

fn parsed<T>(row: &Row<'_>, column: &str) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(column)?;
    raw.parse::<T>().map_err(|err| {
        let index = row.as_ref().column_index(column).unwrap_or_default();
        rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(err))
    })
}

fn date_text(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn timestamp_text(at: DateTime<Utc>) -> String {
    at.to_rfc3339()
}

fn quote_from_row(row: &Row<'_>) -> rusqlite::Result<QuoteRecord> {
    Ok(QuoteRecord {
        quote_number: QuoteNumber(row.get("quote_number")?),
        source: parsed(row, "source")?,
        status: parsed(row, "status")?,
        details: QuoteDetails {
            resident_state: row.get("resident_state")?,
            event_type: row.get("event_type")?,
            event_date: parsed(row, "event_date")?,
            guest_range: parsed(row, "guest_range")?,
            coverage_level: row.get("coverage_level")?,
            liability_option: parsed(row, "liability_option")?,
            liquor_liability: row.get("liquor_liability")?,
            covid_disclosure: row.get("covid_disclosure")?,
            special_activities: row.get("special_activities")?,
            email: row.get("email")?,
        },
        premium: PremiumBreakdown {
            base_premium: row.get("base_premium")?,
            liability_premium: row.get("liability_premium")?,
            liquor_liability_premium: row.get("liquor_liability_premium")?,
            total_premium: row.get("total_premium")?,
        },
        converted_to_policy: row.get("converted_to_policy")?,
        created_at: parsed(row, "created_at")?,
        updated_at: parsed(row, "updated_at")?,
    })
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<EventRecord> {
    Ok(EventRecord {
        id: row.get("id")?,
        quote_number: QuoteNumber(row.get("quote_number")?),
        details: EventDetails {
            honoree1_first_name: row.get("honoree1_first_name")?,
            honoree1_last_name: row.get("honoree1_last_name")?,
            honoree2_first_name: row.get("honoree2_first_name")?,
            honoree2_last_name: row.get("honoree2_last_name")?,
            ceremony_location_type: row.get("ceremony_location_type")?,
        },
    })
}

fn venue_from_row(row: &Row<'_>) -> rusqlite::Result<VenueRecord> {
    Ok(VenueRecord {
        id: row.get("id")?,
        event_id: row.get("event_id")?,
        details: VenueDetails {
            name: row.get("name")?,
            address1: row.get("address1")?,
            address2: row.get("address2")?,
            city: row.get("city")?,
            state: row.get("state")?,
            zip: row.get("zip")?,
            country: row.get("country")?,
            as_insured: row.get("as_insured")?,
        },
    })
}

fn holder_from_row(row: &Row<'_>) -> rusqlite::Result<PolicyHolderRecord> {
    Ok(PolicyHolderRecord {
        id: row.get("id")?,
        quote_number: QuoteNumber(row.get("quote_number")?),
        details: PolicyHolderDetails {
            first_name: row.get("first_name")?,
            last_name: row.get("last_name")?,
            phone: row.get("phone")?,
            relationship: row.get("relationship")?,
            address: row.get("address")?,
            city: row.get("city")?,
            state: row.get("state")?,
            zip: row.get("zip")?,
            country: row.get("country")?,
            hear_about_us: row.get("hear_about_us")?,
            legal_notices_accepted: row.get("legal_notices_accepted")?,
        },
    })
}

fn policy_from_row(row: &Row<'_>) -> rusqlite::Result<PolicyRecord> {
    Ok(PolicyRecord {
        policy_number: PolicyNumber(row.get("policy_number")?),
        quote_number: QuoteNumber(row.get("quote_number")?),
        source: parsed(row, "source")?,
        status: parsed(row, "status")?,
        issued_at: parsed(row, "issued_at")?,
        updated_at: parsed(row, "updated_at")?,
    })
}

fn payment_from_row(row: &Row<'_>) -> rusqlite::Result<PaymentRecord> {
    Ok(PaymentRecord {
        id: row.get("id")?,
        policy_number: PolicyNumber(row.get("policy_number")?),
        amount: row.get("amount")?,
        method: parsed(row, "method")?,
        status: parsed(row, "status")?,
        reference: row.get("reference")?,
        paid_at: parsed(row, "paid_at")?,
    })
}

fn quote_exists(conn: &Connection, quote: &QuoteNumber) -> Result<bool, StoreError> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM quotes WHERE quote_number = ?1",
            params![quote.0],
            |row| row.get(0),
        )
        .optional()
        .map_err(store_error)?;
    Ok(found.is_some())
}

fn select_policy_for_quote(
    conn: &Connection,
    quote: &QuoteNumber,
) -> Result<Option<PolicyRecord>, StoreError> {
    conn.query_row(
        &format!("SELECT {POLICY_COLUMNS} FROM policies WHERE quote_number = ?1"),
        params![quote.0],
        policy_from_row,
    )
    .optional()
    .map_err(store_error)
}

fn insert_event_with_venue(
    tx: &Transaction<'_>,
    quote: &QuoteNumber,
    event: EventDetails,
    venue: VenueDetails,
) -> Result<(EventRecord, VenueRecord), StoreError> {
    tx.execute(
        "INSERT INTO events (quote_number, honoree1_first_name, honoree1_last_name, \
         honoree2_first_name, honoree2_last_name, ceremony_location_type) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            quote.0,
            event.honoree1_first_name,
            event.honoree1_last_name,
            event.honoree2_first_name,
            event.honoree2_last_name,
            event.ceremony_location_type,
        ],
    )
    .map_err(store_error)?;
    let event = EventRecord {
        id: tx.last_insert_rowid(),
        quote_number: quote.clone(),
        details: event,
    };

    tx.execute(
        "INSERT INTO venues (event_id, name, address1, address2, city, state, zip, country, \
         as_insured) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            event.id,
            venue.name,
            venue.address1,
            venue.address2,
            venue.city,
            venue.state,
            venue.zip,
            venue.country,
            venue.as_insured,
        ],
    )
    .map_err(store_error)?;
    let venue = VenueRecord {
        id: tx.last_insert_rowid(),
        event_id: event.id,
        details: venue,
    };

    Ok((event, venue))
}

impl InsuranceRepository for SqliteRepository {
    fn insert_quote(&self, quote: QuoteRecord) -> Result<QuoteRecord, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            &format!(
                "INSERT INTO quotes ({QUOTE_COLUMNS}) VALUES \
                 (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)"
            ),
            params![
                quote.quote_number.0,
                quote.source.as_str(),
                quote.status.as_str(),
                quote.details.resident_state,
                quote.details.event_type,
                date_text(quote.details.event_date),
                quote.details.guest_range.key(),
                quote.details.coverage_level,
                quote.details.liability_option.key(),
                quote.details.liquor_liability,
                quote.details.covid_disclosure,
                quote.details.special_activities,
                quote.details.email,
                quote.premium.base_premium,
                quote.premium.liability_premium,
                quote.premium.liquor_liability_premium,
                quote.premium.total_premium,
                quote.converted_to_policy,
                timestamp_text(quote.created_at),
                timestamp_text(quote.updated_at),
            ],
        )
        .map_err(store_error)?;
        Ok(quote)
    }

    fn update_quote(&self, quote: &QuoteRecord) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE quotes SET status = ?2, resident_state = ?3, event_type = ?4, \
                 event_date = ?5, guest_range = ?6, coverage_level = ?7, liability_option = ?8, \
                 liquor_liability = ?9, covid_disclosure = ?10, special_activities = ?11, \
                 email = ?12, base_premium = ?13, liability_premium = ?14, \
                 liquor_liability_premium = ?15, total_premium = ?16, updated_at = ?17 \
                 WHERE quote_number = ?1",
                params![
                    quote.quote_number.0,
                    quote.status.as_str(),
                    quote.details.resident_state,
                    quote.details.event_type,
                    date_text(quote.details.event_date),
                    quote.details.guest_range.key(),
                    quote.details.coverage_level,
                    quote.details.liability_option.key(),
                    quote.details.liquor_liability,
                    quote.details.covid_disclosure,
                    quote.details.special_activities,
                    quote.details.email,
                    quote.premium.base_premium,
                    quote.premium.liability_premium,
                    quote.premium.liquor_liability_premium,
                    quote.premium.total_premium,
                    timestamp_text(quote.updated_at),
                ],
            )
            .map_err(store_error)?;
        require_changed(changed)
    }

    fn fetch_quote(&self, number: &QuoteNumber) -> Result<Option<QuoteRecord>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {QUOTE_COLUMNS} FROM quotes WHERE quote_number = ?1"),
            params![number.0],
            quote_from_row,
        )
        .optional()
        .map_err(store_error)
    }

    fn list_quotes(&self, filter: &QuoteFilter) -> Result<Vec<QuoteRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {QUOTE_COLUMNS} FROM quotes ORDER BY created_at DESC"
            ))
            .map_err(store_error)?;
        let rows = stmt.query_map([], quote_from_row).map_err(store_error)?;

        let mut quotes = Vec::new();
        for row in rows {
            let quote = row.map_err(store_error)?;
            if filter.matches(&quote) {
                quotes.push(quote);
            }
        }
        Ok(quotes)
    }

    fn delete_quote(&self, number: &QuoteNumber) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "DELETE FROM quotes WHERE quote_number = ?1",
                params![number.0],
            )
            .map_err(store_error)?;
        require_changed(changed)
    }

    fn save_event(
        &self,
        quote: &QuoteNumber,
        event: EventDetails,
        venue: VenueDetails,
    ) -> Result<(EventRecord, VenueRecord), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(store_error)?;
        if !quote_exists(&tx, quote)? {
            return Err(StoreError::NotFound);
        }
        tx.execute(
            "DELETE FROM events WHERE quote_number = ?1",
            params![quote.0],
        )
        .map_err(store_error)?;
        let saved = insert_event_with_venue(&tx, quote, event, venue)?;
        tx.commit().map_err(store_error)?;
        Ok(saved)
    }

    fn fetch_event(&self, id: RecordId) -> Result<Option<EventRecord>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1"),
            params![id],
            event_from_row,
        )
        .optional()
        .map_err(store_error)
    }

    fn event_for_quote(&self, quote: &QuoteNumber) -> Result<Option<EventRecord>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {EVENT_COLUMNS} FROM events WHERE quote_number = ?1"),
            params![quote.0],
            event_from_row,
        )
        .optional()
        .map_err(store_error)
    }

    fn update_event(&self, id: RecordId, details: EventDetails) -> Result<EventRecord, StoreError> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE events SET honoree1_first_name = ?2, honoree1_last_name = ?3, \
                 honoree2_first_name = ?4, honoree2_last_name = ?5, ceremony_location_type = ?6 \
                 WHERE id = ?1",
                params![
                    id,
                    details.honoree1_first_name,
                    details.honoree1_last_name,
                    details.honoree2_first_name,
                    details.honoree2_last_name,
                    details.ceremony_location_type,
                ],
            )
            .map_err(store_error)?;
        require_changed(changed)?;
        conn.query_row(
            &format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1"),
            params![id],
            event_from_row,
        )
        .map_err(store_error)
    }

    fn delete_event(&self, id: RecordId) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let changed = conn
            .execute("DELETE FROM events WHERE id = ?1", params![id])
            .map_err(store_error)?;
        require_changed(changed)
    }

    fn fetch_venue(&self, id: RecordId) -> Result<Option<VenueRecord>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {VENUE_COLUMNS} FROM venues WHERE id = ?1"),
            params![id],
            venue_from_row,
        )
        .optional()
        .map_err(store_error)
    }

    fn venue_for_event(&self, event_id: RecordId) -> Result<Option<VenueRecord>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {VENUE_COLUMNS} FROM venues WHERE event_id = ?1"),
            params![event_id],
            venue_from_row,
        )
        .optional()
        .map_err(store_error)
    }

    fn update_venue(&self, id: RecordId, details: VenueDetails) -> Result<VenueRecord, StoreError> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE venues SET name = ?2, address1 = ?3, address2 = ?4, city = ?5, \
                 state = ?6, zip = ?7, country = ?8, as_insured = ?9 WHERE id = ?1",
                params![
                    id,
                    details.name,
                    details.address1,
                    details.address2,
                    details.city,
                    details.state,
                    details.zip,
                    details.country,
                    details.as_insured,
                ],
            )
            .map_err(store_error)?;
        require_changed(changed)?;
        conn.query_row(
            &format!("SELECT {VENUE_COLUMNS} FROM venues WHERE id = ?1"),
            params![id],
            venue_from_row,
        )
        .map_err(store_error)
    }

    fn delete_venue(&self, id: RecordId) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let changed = conn
            .execute("DELETE FROM venues WHERE id = ?1", params![id])
            .map_err(store_error)?;
        require_changed(changed)
    }

    fn save_policy_holder(
        &self,
        quote: &QuoteNumber,
        details: PolicyHolderDetails,
    ) -> Result<PolicyHolderRecord, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(store_error)?;
        if !quote_exists(&tx, quote)? {
            return Err(StoreError::NotFound);
        }
        tx.execute(
            "DELETE FROM policy_holders WHERE quote_number = ?1",
            params![quote.0],
        )
        .map_err(store_error)?;
        tx.execute(
            "INSERT INTO policy_holders (quote_number, first_name, last_name, phone, \
             relationship, address, city, state, zip, country, hear_about_us, \
             legal_notices_accepted) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                quote.0,
                details.first_name,
                details.last_name,
                details.phone,
                details.relationship,
                details.address,
                details.city,
                details.state,
                details.zip,
                details.country,
                details.hear_about_us,
                details.legal_notices_accepted,
            ],
        )
        .map_err(store_error)?;
        let holder = PolicyHolderRecord {
            id: tx.last_insert_rowid(),
            quote_number: quote.clone(),
            details,
        };
        tx.commit().map_err(store_error)?;
        Ok(holder)
    }

    fn fetch_policy_holder(&self, id: RecordId) -> Result<Option<PolicyHolderRecord>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {HOLDER_COLUMNS} FROM policy_holders WHERE id = ?1"),
            params![id],
            holder_from_row,
        )
        .optional()
        .map_err(store_error)
    }

    fn policy_holder_for_quote(
        &self,
        quote: &QuoteNumber,
    ) -> Result<Option<PolicyHolderRecord>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {HOLDER_COLUMNS} FROM policy_holders WHERE quote_number = ?1"),
            params![quote.0],
            holder_from_row,
        )
        .optional()
        .map_err(store_error)
    }

    fn update_policy_holder(
        &self,
        id: RecordId,
        details: PolicyHolderDetails,
    ) -> Result<PolicyHolderRecord, StoreError> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE policy_holders SET first_name = ?2, last_name = ?3, phone = ?4, \
                 relationship = ?5, address = ?6, city = ?7, state = ?8, zip = ?9, \
                 country = ?10, hear_about_us = ?11, legal_notices_accepted = ?12 WHERE id = ?1",
                params![
                    id,
                    details.first_name,
                    details.last_name,
                    details.phone,
                    details.relationship,
                    details.address,
                    details.city,
                    details.state,
                    details.zip,
                    details.country,
                    details.hear_about_us,
                    details.legal_notices_accepted,
                ],
            )
            .map_err(store_error)?;
        require_changed(changed)?;
        conn.query_row(
            &format!("SELECT {HOLDER_COLUMNS} FROM policy_holders WHERE id = ?1"),
            params![id],
            holder_from_row,
        )
        .map_err(store_error)
    }

    fn delete_policy_holder(&self, id: RecordId) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let changed = conn
            .execute("DELETE FROM policy_holders WHERE id = ?1", params![id])
            .map_err(store_error)?;
        require_changed(changed)
    }

    fn issue_policy(&self, policy: PolicyRecord) -> Result<PolicyIssue, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(store_error)?;
        if !quote_exists(&tx, &policy.quote_number)? {
            return Err(StoreError::NotFound);
        }
        if let Some(existing) = select_policy_for_quote(&tx, &policy.quote_number)? {
            return Ok(PolicyIssue::Existing(existing));
        }

        tx.execute(
            &format!("INSERT INTO policies ({POLICY_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
            params![
                policy.policy_number.0,
                policy.quote_number.0,
                policy.source.as_str(),
                policy.status.as_str(),
                timestamp_text(policy.issued_at),
                timestamp_text(policy.updated_at),
            ],
        )
        .map_err(store_error)?;
        tx.execute(
            "UPDATE quotes SET converted_to_policy = 1, updated_at = ?2 WHERE quote_number = ?1",
            params![policy.quote_number.0, timestamp_text(policy.issued_at)],
        )
        .map_err(store_error)?;
        tx.commit().map_err(store_error)?;
        Ok(PolicyIssue::Created(policy))
    }

    fn fetch_policy(&self, number: &PolicyNumber) -> Result<Option<PolicyRecord>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {POLICY_COLUMNS} FROM policies WHERE policy_number = ?1"),
            params![number.0],
            policy_from_row,
        )
        .optional()
        .map_err(store_error)
    }

    fn policy_for_quote(&self, quote: &QuoteNumber) -> Result<Option<PolicyRecord>, StoreError> {
        let conn = self.lock()?;
        select_policy_for_quote(&conn, quote)
    }

    fn list_policies(&self) -> Result<Vec<PolicyRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {POLICY_COLUMNS} FROM policies ORDER BY issued_at DESC"
            ))
            .map_err(store_error)?;
        let rows = stmt.query_map([], policy_from_row).map_err(store_error)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(store_error)
    }

    fn update_policy(&self, policy: &PolicyRecord) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE policies SET status = ?2, updated_at = ?3 WHERE policy_number = ?1",
                params![
                    policy.policy_number.0,
                    policy.status.as_str(),
                    timestamp_text(policy.updated_at),
                ],
            )
            .map_err(store_error)?;
        require_changed(changed)
    }

    fn delete_policy(&self, number: &PolicyNumber) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(store_error)?;
        let quote: Option<String> = tx
            .query_row(
                "SELECT quote_number FROM policies WHERE policy_number = ?1",
                params![number.0],
                |row| row.get(0),
            )
            .optional()
            .map_err(store_error)?;
        let quote = quote.ok_or(StoreError::NotFound)?;

        tx.execute(
            "DELETE FROM quotes WHERE quote_number = ?1",
            params![quote],
        )
        .map_err(store_error)?;
        tx.commit().map_err(store_error)
    }

    fn count_policies_issued_on(&self, day: NaiveDate) -> Result<u32, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT COUNT(*) FROM policies WHERE substr(issued_at, 1, 10) = ?1",
            params![date_text(day)],
            |row| row.get(0),
        )
        .map_err(store_error)
    }

    fn insert_payment(&self, payment: NewPayment) -> Result<PaymentRecord, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO payments (policy_number, amount, method, status, reference, paid_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                payment.policy_number.0,
                payment.amount,
                payment.method.as_str(),
                payment.status.as_str(),
                payment.reference,
                timestamp_text(payment.paid_at),
            ],
        )
        .map_err(store_error)?;
        Ok(PaymentRecord {
            id: conn.last_insert_rowid(),
            policy_number: payment.policy_number,
            amount: payment.amount,
            method: payment.method,
            status: payment.status,
            reference: payment.reference,
            paid_at: payment.paid_at,
        })
    }

    fn fetch_payment(&self, id: RecordId) -> Result<Option<PaymentRecord>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = ?1"),
            params![id],
            payment_from_row,
        )
        .optional()
        .map_err(store_error)
    }

    fn list_payments(
        &self,
        policy: Option<&PolicyNumber>,
    ) -> Result<Vec<PaymentRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {PAYMENT_COLUMNS} FROM payments \
                 WHERE ?1 IS NULL OR policy_number = ?1 ORDER BY id"
            ))
            .map_err(store_error)?;
        let filter = policy.map(|number| number.0.as_str());
        let rows = stmt
            .query_map(params![filter], payment_from_row)
            .map_err(store_error)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(store_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::domain::{PolicyStatus, QuoteSource, QuoteStatus};
    use crate::pricing::{GuestRange, LiabilityOption};

    fn quote(number: &str) -> QuoteRecord {
        let now = Utc::now();
        let details = QuoteDetails {
            resident_state: "IA".to_string(),
            event_type: "wedding".to_string(),
            event_date: NaiveDate::from_ymd_opt(2027, 6, 12).expect("valid"),
            guest_range: GuestRange::UpTo200,
            coverage_level: 6,
            liability_option: LiabilityOption::Option3,
            liquor_liability: true,
            covid_disclosure: true,
            special_activities: false,
            email: "couple@example.com".to_string(),
        };
        QuoteRecord {
            quote_number: QuoteNumber(number.to_string()),
            source: QuoteSource::Customer,
            status: QuoteStatus::Complete,
            premium: details.premium(),
            details,
            converted_to_policy: false,
            created_at: now,
            updated_at: now,
        }
    }

    fn event() -> EventDetails {
        EventDetails {
            honoree1_first_name: "Avery".to_string(),
            honoree1_last_name: "Lee".to_string(),
            honoree2_first_name: Some("Sam".to_string()),
            honoree2_last_name: None,
            ceremony_location_type: "outdoor".to_string(),
        }
    }

    fn venue() -> VenueDetails {
        VenueDetails {
            name: "Salisbury House".to_string(),
            address1: "4025 Tonawanda Dr".to_string(),
            address2: None,
            city: "Des Moines".to_string(),
            state: "IA".to_string(),
            zip: "50312".to_string(),
            country: "US".to_string(),
            as_insured: false,
        }
    }

    fn policy(number: &str, quote: &str) -> PolicyRecord {
        let now = Utc::now();
        PolicyRecord {
            policy_number: PolicyNumber(number.to_string()),
            quote_number: QuoteNumber(quote.to_string()),
            source: QuoteSource::Customer,
            status: PolicyStatus::Active,
            issued_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn quote_round_trips_through_columns() {
        let repo = SqliteRepository::in_memory().expect("opens");
        let stored = repo.insert_quote(quote("QC-1")).expect("insert");
        let fetched = repo
            .fetch_quote(&stored.quote_number)
            .expect("fetch")
            .expect("present");
        assert_eq!(fetched.details, stored.details);
        assert_eq!(fetched.premium, stored.premium);
        assert_eq!(fetched.status, QuoteStatus::Complete);
    }

    #[test]
    fn duplicate_quote_number_is_a_conflict() {
        let repo = SqliteRepository::in_memory().expect("opens");
        repo.insert_quote(quote("QC-1")).expect("insert");
        assert!(matches!(
            repo.insert_quote(quote("QC-1")),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn issue_policy_is_idempotent_per_quote() {
        let repo = SqliteRepository::in_memory().expect("opens");
        repo.insert_quote(quote("QC-1")).expect("insert");

        let first = repo.issue_policy(policy("PC-1", "QC-1")).expect("issue");
        assert!(first.was_created());
        let second = repo.issue_policy(policy("PC-2", "QC-1")).expect("issue");
        assert_eq!(second, PolicyIssue::Existing(first.policy().clone()));

        let flagged = repo
            .fetch_quote(&QuoteNumber("QC-1".to_string()))
            .expect("fetch")
            .expect("present");
        assert!(flagged.converted_to_policy);
    }

    #[test]
    fn duplicate_policy_number_is_a_conflict() {
        let repo = SqliteRepository::in_memory().expect("opens");
        repo.insert_quote(quote("QC-1")).expect("insert");
        repo.insert_quote(quote("QC-2")).expect("insert");
        repo.issue_policy(policy("PC-1", "QC-1")).expect("issue");

        assert!(matches!(
            repo.issue_policy(policy("PC-1", "QC-2")),
            Err(StoreError::Conflict(_))
        ));
        let untouched = repo
            .fetch_quote(&QuoteNumber("QC-2".to_string()))
            .expect("fetch")
            .expect("present");
        assert!(!untouched.converted_to_policy);
    }

    #[test]
    fn deleting_policy_cascades_through_quote() {
        let repo = SqliteRepository::in_memory().expect("opens");
        let number = QuoteNumber("QC-1".to_string());
        repo.insert_quote(quote("QC-1")).expect("insert");
        let (event, venue) = repo.save_event(&number, event(), venue()).expect("event");
        repo.issue_policy(policy("PC-1", "QC-1")).expect("issue");

        repo.delete_policy(&PolicyNumber("PC-1".to_string()))
            .expect("delete");

        assert!(repo.fetch_quote(&number).expect("fetch").is_none());
        assert!(repo.fetch_event(event.id).expect("fetch").is_none());
        assert!(repo.fetch_venue(venue.id).expect("fetch").is_none());
    }

    #[test]
    fn saving_event_replaces_previous_event_and_venue() {
        let repo = SqliteRepository::in_memory().expect("opens");
        let number = QuoteNumber("QC-1".to_string());
        repo.insert_quote(quote("QC-1")).expect("insert");
        let (first, first_venue) = repo.save_event(&number, event(), venue()).expect("event");
        let (second, _) = repo.save_event(&number, event(), venue()).expect("event");

        assert_ne!(first.id, second.id);
        assert!(repo.fetch_event(first.id).expect("fetch").is_none());
        assert!(repo.fetch_venue(first_venue.id).expect("fetch").is_none());
        assert_eq!(
            repo.event_for_quote(&number).expect("fetch").map(|e| e.id),
            Some(second.id)
        );
    }

    #[test]
    fn counts_policies_by_issue_day() {
        let repo = SqliteRepository::in_memory().expect("opens");
        repo.insert_quote(quote("QC-1")).expect("insert");
        repo.insert_quote(quote("QC-2")).expect("insert");
        repo.issue_policy(policy("PC-1", "QC-1")).expect("issue");
        repo.issue_policy(policy("PC-2", "QC-2")).expect("issue");

        let today = Utc::now().date_naive();
        assert_eq!(repo.count_policies_issued_on(today).expect("count"), 2);
        assert_eq!(
            repo.count_policies_issued_on(today.pred_opt().expect("valid"))
                .expect("count"),
            0
        );
    }

    #[test]
    fn stale_quote_write_keeps_conversion_flag() {
        let repo = SqliteRepository::in_memory().expect("opens");
        let stale = repo.insert_quote(quote("QC-1")).expect("insert");
        repo.issue_policy(policy("PC-1", "QC-1")).expect("issue");

        repo.update_quote(&stale).expect("update");
        let stored = repo
            .fetch_quote(&stale.quote_number)
            .expect("fetch")
            .expect("present");
        assert!(stored.converted_to_policy);
    }
}
