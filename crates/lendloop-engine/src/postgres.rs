//! # Postgres Store
//!
//! The durable [`RentalStore`] for production deployments, built on SQLx.
//!
//! ## One Table, Two Enforcement Points
//!
//! [`PgStore::migrate`] installs a `BEFORE UPDATE OF status` trigger whose
//! legal-pair list is GENERATED from the Rust `LEGAL_TRANSITIONS` slice at
//! migration time. The Rust-side [`enforce_legal`] check and the trigger
//! therefore answer from the same table and cannot silently diverge; the
//! trigger also catches writers that never touch this crate (psql
//! sessions, migrations, admin tooling).
//!
//! ## Compare-and-Swap
//!
//! The status swap is `UPDATE ... WHERE id = $1 AND status = $expected`
//! inside a transaction that also appends ledger entries and mutates the
//! claim row. Zero affected rows means another actor transitioned the
//! record first, and the whole transaction rolls back.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

use lendloop_core::{ClaimId, ItemId, LedgerEntryId, Money, PartyId, RentalId, Timestamp};
use lendloop_state::{
    ClaimResolution, DamageClaim, HandoffDirection, HandoffInspection, LedgerEntry,
    LedgerEntryKind, RentalRecord, RentalStatus, LEGAL_TRANSITIONS,
};

use crate::error::StoreError;
use crate::store::{enforce_legal, ClaimOp, RentalStore, TransitionCommit};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS rentals (
    id UUID PRIMARY KEY,
    status TEXT NOT NULL,
    status_updated_at TIMESTAMPTZ NOT NULL,
    start_date TIMESTAMPTZ NOT NULL,
    end_date TIMESTAMPTZ NOT NULL,
    activated_at TIMESTAMPTZ,
    completed_at TIMESTAMPTZ,
    disputed_at TIMESTAMPTZ,
    requester UUID NOT NULL,
    provider UUID NOT NULL,
    item UUID NOT NULL,
    price_amount TEXT NOT NULL,
    price_currency TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS inspections (
    rental UUID NOT NULL REFERENCES rentals(id),
    direction TEXT NOT NULL,
    signing_party UUID NOT NULL,
    signed BOOLEAN NOT NULL,
    evidence TEXT[] NOT NULL,
    notes TEXT,
    recorded_at TIMESTAMPTZ NOT NULL,
    PRIMARY KEY (rental, direction)
);

CREATE TABLE IF NOT EXISTS claims (
    id UUID PRIMARY KEY,
    rental UUID NOT NULL REFERENCES rentals(id),
    filed_by UUID NOT NULL,
    description TEXT NOT NULL,
    amount TEXT NOT NULL,
    currency TEXT NOT NULL,
    evidence TEXT[] NOT NULL,
    resolution TEXT,
    filed_at TIMESTAMPTZ NOT NULL,
    resolved_at TIMESTAMPTZ
);

CREATE UNIQUE INDEX IF NOT EXISTS claims_one_open
    ON claims (rental) WHERE resolution IS NULL;

CREATE TABLE IF NOT EXISTS ledger_entries (
    seq BIGSERIAL PRIMARY KEY,
    id UUID NOT NULL UNIQUE,
    rental UUID NOT NULL REFERENCES rentals(id),
    kind TEXT NOT NULL,
    amount TEXT NOT NULL,
    currency TEXT NOT NULL,
    memo TEXT NOT NULL,
    recorded_at TIMESTAMPTZ NOT NULL
);
"#;

/// Render the status-transition trigger from the legal-transition table.
///
/// Exposed so tests can assert the generated SQL names every edge — and
/// nothing else.
pub fn transition_guard_sql() -> String {
    let pairs = LEGAL_TRANSITIONS
        .iter()
        .map(|(from, to)| format!("('{}', '{}')", from.as_str(), to.as_str()))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        r#"
CREATE OR REPLACE FUNCTION rentals_enforce_status_transition() RETURNS trigger AS $$
BEGIN
    IF NEW.status = OLD.status THEN
        RETURN NEW;
    END IF;
    IF (OLD.status, NEW.status) IN ({pairs}) THEN
        RETURN NEW;
    END IF;
    RAISE EXCEPTION 'illegal rental status transition: % -> %', OLD.status, NEW.status;
END;
$$ LANGUAGE plpgsql;

DROP TRIGGER IF EXISTS rentals_status_guard ON rentals;
CREATE TRIGGER rentals_status_guard
    BEFORE UPDATE OF status ON rentals
    FOR EACH ROW EXECUTE FUNCTION rentals_enforce_status_transition();
"#
    )
}

/// A Postgres-backed rental store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to the database.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new().max_connections(16).connect(url).await?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the schema and install the generated transition trigger.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        sqlx::raw_sql(&transition_guard_sql())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn record_from_row(row: &PgRow) -> Result<RentalRecord, StoreError> {
    let status_text: String = row.try_get("status")?;
    let status = RentalStatus::from_str(&status_text).map_err(|e| StoreError::Decode {
        reason: e.to_string(),
    })?;
    let price = Money::new(
        row.try_get::<String, _>("price_amount")?,
        row.try_get::<String, _>("price_currency")?,
    )
    .map_err(|e| StoreError::Decode {
        reason: e.to_string(),
    })?;
    Ok(RentalRecord {
        id: RentalId::from_uuid(row.try_get("id")?),
        status,
        status_updated_at: ts(row.try_get("status_updated_at")?),
        start_date: ts(row.try_get("start_date")?),
        end_date: ts(row.try_get("end_date")?),
        activated_at: opt_ts(row.try_get("activated_at")?),
        completed_at: opt_ts(row.try_get("completed_at")?),
        disputed_at: opt_ts(row.try_get("disputed_at")?),
        requester: PartyId::from_uuid(row.try_get("requester")?),
        provider: PartyId::from_uuid(row.try_get("provider")?),
        item: ItemId::from_uuid(row.try_get("item")?),
        price,
        created_at: ts(row.try_get("created_at")?),
    })
}

fn inspection_from_row(row: &PgRow) -> Result<HandoffInspection, StoreError> {
    let direction_text: String = row.try_get("direction")?;
    Ok(HandoffInspection {
        rental: RentalId::from_uuid(row.try_get("rental")?),
        direction: parse_direction(&direction_text)?,
        signing_party: PartyId::from_uuid(row.try_get("signing_party")?),
        signed: row.try_get("signed")?,
        evidence: row.try_get("evidence")?,
        notes: row.try_get("notes")?,
        recorded_at: ts(row.try_get("recorded_at")?),
    })
}

fn claim_from_row(row: &PgRow) -> Result<DamageClaim, StoreError> {
    let amount = Money::new(
        row.try_get::<String, _>("amount")?,
        row.try_get::<String, _>("currency")?,
    )
    .map_err(|e| StoreError::Decode {
        reason: e.to_string(),
    })?;
    let resolution = row
        .try_get::<Option<String>, _>("resolution")?
        .map(|text| parse_resolution(&text))
        .transpose()?;
    Ok(DamageClaim {
        id: ClaimId::from_uuid(row.try_get("id")?),
        rental: RentalId::from_uuid(row.try_get("rental")?),
        filed_by: PartyId::from_uuid(row.try_get("filed_by")?),
        description: row.try_get("description")?,
        amount,
        evidence: row.try_get("evidence")?,
        resolution,
        filed_at: ts(row.try_get("filed_at")?),
        resolved_at: opt_ts(row.try_get("resolved_at")?),
    })
}

fn ledger_from_row(row: &PgRow) -> Result<LedgerEntry, StoreError> {
    let kind_text: String = row.try_get("kind")?;
    let amount = Money::new(
        row.try_get::<String, _>("amount")?,
        row.try_get::<String, _>("currency")?,
    )
    .map_err(|e| StoreError::Decode {
        reason: e.to_string(),
    })?;
    Ok(LedgerEntry {
        id: LedgerEntryId::from_uuid(row.try_get("id")?),
        rental: RentalId::from_uuid(row.try_get("rental")?),
        kind: parse_kind(&kind_text)?,
        amount,
        memo: row.try_get("memo")?,
        recorded_at: ts(row.try_get("recorded_at")?),
    })
}

fn ts(dt: DateTime<Utc>) -> Timestamp {
    Timestamp::from_utc(dt)
}

fn opt_ts(dt: Option<DateTime<Utc>>) -> Option<Timestamp> {
    dt.map(Timestamp::from_utc)
}

fn parse_direction(s: &str) -> Result<HandoffDirection, StoreError> {
    match s {
        "PICKUP" => Ok(HandoffDirection::Pickup),
        "RETURN" => Ok(HandoffDirection::Return),
        other => Err(StoreError::Decode {
            reason: format!("unknown handoff direction \"{other}\""),
        }),
    }
}

fn parse_resolution(s: &str) -> Result<ClaimResolution, StoreError> {
    match s {
        "ACCEPTED" => Ok(ClaimResolution::Accepted),
        "REJECTED" => Ok(ClaimResolution::Rejected),
        other => Err(StoreError::Decode {
            reason: format!("unknown claim resolution \"{other}\""),
        }),
    }
}

fn parse_kind(s: &str) -> Result<LedgerEntryKind, StoreError> {
    match s {
        "HOLD" => Ok(LedgerEntryKind::Hold),
        "RELEASE" => Ok(LedgerEntryKind::Release),
        "CAPTURE" => Ok(LedgerEntryKind::Capture),
        other => Err(StoreError::Decode {
            reason: format!("unknown ledger entry kind \"{other}\""),
        }),
    }
}

#[async_trait]
impl RentalStore for PgStore {
    async fn insert_record(&self, record: RentalRecord) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO rentals (id, status, status_updated_at, start_date, end_date, \
             activated_at, completed_at, disputed_at, requester, provider, item, \
             price_amount, price_currency, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(*record.id.as_uuid())
        .bind(record.status.as_str())
        .bind(*record.status_updated_at.as_datetime())
        .bind(*record.start_date.as_datetime())
        .bind(*record.end_date.as_datetime())
        .bind(record.activated_at.map(|t| *t.as_datetime()))
        .bind(record.completed_at.map(|t| *t.as_datetime()))
        .bind(record.disputed_at.map(|t| *t.as_datetime()))
        .bind(*record.requester.as_uuid())
        .bind(*record.provider.as_uuid())
        .bind(*record.item.as_uuid())
        .bind(record.price.amount.clone())
        .bind(record.price.currency.clone())
        .bind(*record.created_at.as_datetime())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::AlreadyExists {
                    rental_id: record.id.to_string(),
                })
            }
            Err(other) => Err(StoreError::Database(other)),
        }
    }

    async fn fetch_record(&self, id: &RentalId) -> Result<RentalRecord, StoreError> {
        let row = sqlx::query("SELECT * FROM rentals WHERE id = $1")
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                rental_id: id.to_string(),
            })?;
        record_from_row(&row)
    }

    async fn due_for_activation(&self, now: Timestamp) -> Result<Vec<RentalId>, StoreError> {
        let rows = sqlx::query(
            "SELECT id FROM rentals WHERE status = $1 AND start_date <= $2 ORDER BY start_date",
        )
        .bind(RentalStatus::AwaitingStartDate.as_str())
        .bind(*now.as_datetime())
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| Ok(RentalId::from_uuid(row.try_get("id")?)))
            .collect()
    }

    async fn commit_transition(
        &self,
        id: &RentalId,
        expected: RentalStatus,
        commit: TransitionCommit,
    ) -> Result<RentalRecord, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT * FROM rentals WHERE id = $1 FOR UPDATE")
            .bind(*id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                rental_id: id.to_string(),
            })?;
        let record = record_from_row(&row)?;

        if record.status != expected {
            return Err(StoreError::Conflict {
                rental_id: id.to_string(),
                expected,
                actual: record.status,
            });
        }

        // The enforcer, ahead of the trigger that backs it up.
        enforce_legal(id, record.status, commit.to)?;

        if commit.to == record.status {
            tx.rollback().await?;
            return Ok(record);
        }

        let now = Timestamp::now().strictly_after(record.status_updated_at);
        let milestone = |status| {
            (commit.to == status && record.milestone(status) == Some(None))
                .then(|| *now.as_datetime())
        };

        let swapped = sqlx::query(
            "UPDATE rentals SET status = $1, status_updated_at = $2, \
             activated_at = COALESCE(activated_at, $3), \
             completed_at = COALESCE(completed_at, $4), \
             disputed_at = COALESCE(disputed_at, $5) \
             WHERE id = $6 AND status = $7",
        )
        .bind(commit.to.as_str())
        .bind(*now.as_datetime())
        .bind(milestone(RentalStatus::Active))
        .bind(milestone(RentalStatus::Completed))
        .bind(milestone(RentalStatus::Disputed))
        .bind(*id.as_uuid())
        .bind(expected.as_str())
        .execute(&mut *tx)
        .await?;
        if swapped.rows_affected() != 1 {
            return Err(StoreError::Conflict {
                rental_id: id.to_string(),
                expected,
                actual: record.status,
            });
        }

        match commit.claim {
            Some(ClaimOp::File(claim)) => {
                let open: bool = sqlx::query(
                    "SELECT EXISTS(SELECT 1 FROM claims WHERE rental = $1 AND resolution IS NULL) AS open",
                )
                .bind(*id.as_uuid())
                .fetch_one(&mut *tx)
                .await?
                .try_get("open")?;
                if open {
                    return Err(StoreError::ClaimViolation {
                        rental_id: id.to_string(),
                        reason: "a claim is already open".to_string(),
                    });
                }
                sqlx::query(
                    "INSERT INTO claims (id, rental, filed_by, description, amount, currency, \
                     evidence, resolution, filed_at, resolved_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, NULL, $8, NULL)",
                )
                .bind(*claim.id.as_uuid())
                .bind(*claim.rental.as_uuid())
                .bind(*claim.filed_by.as_uuid())
                .bind(claim.description.clone())
                .bind(claim.amount.amount.clone())
                .bind(claim.amount.currency.clone())
                .bind(claim.evidence.clone())
                .bind(*claim.filed_at.as_datetime())
                .execute(&mut *tx)
                .await?;
            }
            Some(ClaimOp::Resolve(outcome)) => {
                let resolved = sqlx::query(
                    "UPDATE claims SET resolution = $1, resolved_at = $2 \
                     WHERE rental = $3 AND resolution IS NULL",
                )
                .bind(outcome.as_str())
                .bind(*now.as_datetime())
                .bind(*id.as_uuid())
                .execute(&mut *tx)
                .await?;
                if resolved.rows_affected() != 1 {
                    return Err(StoreError::ClaimViolation {
                        rental_id: id.to_string(),
                        reason: "no open claim to resolve".to_string(),
                    });
                }
            }
            None => {}
        }

        for entry in &commit.ledger {
            sqlx::query(
                "INSERT INTO ledger_entries (id, rental, kind, amount, currency, memo, recorded_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(*entry.id.as_uuid())
            .bind(*entry.rental.as_uuid())
            .bind(entry.kind.as_str())
            .bind(entry.amount.amount.clone())
            .bind(entry.amount.currency.clone())
            .bind(entry.memo.clone())
            .bind(*entry.recorded_at.as_datetime())
            .execute(&mut *tx)
            .await?;
        }

        let row = sqlx::query("SELECT * FROM rentals WHERE id = $1")
            .bind(*id.as_uuid())
            .fetch_one(&mut *tx)
            .await?;
        let updated = record_from_row(&row)?;

        tx.commit().await?;
        Ok(updated)
    }

    async fn record_inspection(&self, inspection: HandoffInspection) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query("SELECT 1 FROM rentals WHERE id = $1")
            .bind(*inspection.rental.as_uuid())
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(StoreError::NotFound {
                rental_id: inspection.rental.to_string(),
            });
        }

        let sealed: Option<bool> = sqlx::query(
            "SELECT signed FROM inspections WHERE rental = $1 AND direction = $2 FOR UPDATE",
        )
        .bind(*inspection.rental.as_uuid())
        .bind(inspection.direction.as_str())
        .fetch_optional(&mut *tx)
        .await?
        .map(|row| row.try_get("signed"))
        .transpose()?;
        if sealed == Some(true) {
            return Err(StoreError::InspectionSealed {
                rental_id: inspection.rental.to_string(),
                direction: inspection.direction,
            });
        }

        sqlx::query(
            "INSERT INTO inspections (rental, direction, signing_party, signed, evidence, notes, recorded_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (rental, direction) DO UPDATE SET \
             signing_party = EXCLUDED.signing_party, signed = EXCLUDED.signed, \
             evidence = EXCLUDED.evidence, notes = EXCLUDED.notes, recorded_at = EXCLUDED.recorded_at",
        )
        .bind(*inspection.rental.as_uuid())
        .bind(inspection.direction.as_str())
        .bind(*inspection.signing_party.as_uuid())
        .bind(inspection.signed)
        .bind(inspection.evidence.clone())
        .bind(inspection.notes.clone())
        .bind(*inspection.recorded_at.as_datetime())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn inspection(
        &self,
        id: &RentalId,
        direction: HandoffDirection,
    ) -> Result<Option<HandoffInspection>, StoreError> {
        let row = sqlx::query("SELECT * FROM inspections WHERE rental = $1 AND direction = $2")
            .bind(*id.as_uuid())
            .bind(direction.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| inspection_from_row(&row)).transpose()
    }

    async fn open_claim(&self, id: &RentalId) -> Result<Option<DamageClaim>, StoreError> {
        let row = sqlx::query("SELECT * FROM claims WHERE rental = $1 AND resolution IS NULL")
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| claim_from_row(&row)).transpose()
    }

    async fn claims(&self, id: &RentalId) -> Result<Vec<DamageClaim>, StoreError> {
        let rows = sqlx::query("SELECT * FROM claims WHERE rental = $1 ORDER BY filed_at")
            .bind(*id.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(claim_from_row).collect()
    }

    async fn ledger(&self, id: &RentalId) -> Result<Vec<LedgerEntry>, StoreError> {
        let rows = sqlx::query("SELECT * FROM ledger_entries WHERE rental = $1 ORDER BY seq")
            .bind(*id.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(ledger_from_row).collect()
    }
}
