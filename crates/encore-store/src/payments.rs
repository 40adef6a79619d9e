use chrono::{DateTime, Utc};
use encore_shared::{RequestId, Tip};
use rusqlite::params;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Payment, PaymentState};
use crate::rows;

const COLUMNS: &str = "id, song_request_id, session_id, amount_cents, currency, status, \
     payment_intent_id, created_at, updated_at";

impl Database {
    pub fn insert_payment(&self, payment: &Payment) -> Result<()> {
        self.conn().execute(
            &format!("INSERT INTO payments ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
            params![
                payment.id.to_string(),
                payment.song_request_id.map(|id| id.to_string()),
                payment.session_id,
                rows::cents(payment.amount.cents()),
                payment.currency,
                payment.status.as_str(),
                payment.payment_intent_id,
                rows::timestamp(payment.created_at),
                rows::timestamp(payment.updated_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_payment_by_session(&self, session_id: &str) -> Result<Payment> {
        self.conn()
            .query_row(
                &format!("SELECT {COLUMNS} FROM payments WHERE session_id = ?1"),
                params![session_id],
                row_to_payment,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    pub fn update_payment_status(
        &self,
        session_id: &str,
        status: PaymentState,
        payment_intent_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Payment> {
        let affected = self.conn().execute(
            "UPDATE payments
             SET status = ?1,
                 payment_intent_id = COALESCE(?2, payment_intent_id),
                 updated_at = ?3
             WHERE session_id = ?4",
            params![status.as_str(), payment_intent_id, rows::timestamp(now), session_id],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        self.get_payment_by_session(session_id)
    }
}

fn row_to_payment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Payment> {
    Ok(Payment {
        id: rows::uuid_at(row, 0)?,
        song_request_id: rows::opt_uuid_at(row, 1)?.map(RequestId),
        session_id: row.get(2)?,
        amount: Tip::from_cents(rows::cents_at(row, 3)?),
        currency: row.get(4)?,
        status: rows::parsed_at(row, 5)?,
        payment_intent_id: row.get(6)?,
        created_at: rows::timestamp_at(row, 7)?,
        updated_at: rows::timestamp_at(row, 8)?,
    })
}
