//! Booking repository implementation
//!
//! Reads go through the pool; locking reads and writes take the connection
//! of the caller's transaction so they commit together with the payment
//! changes that caused them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection, PgPool};
use tracing::warn;
use uuid::Uuid;

use core_kernel::{BookingId, Currency, Money, ParticipantId};
use domain_payments::{Booking, BookingChannel, BookingStatus};

use crate::error::DatabaseError;

const SELECT_BOOKING: &str = r#"
    SELECT id, participant_id, amount_due, amount_paid, currency, status,
           payment_method, paid_at, created_at, updated_at
    FROM bookings
"#;

/// A row of the `bookings` table
#[derive(Debug, Clone, FromRow)]
pub struct BookingRow {
    pub id: Uuid,
    pub participant_id: Uuid,
    pub amount_due: Decimal,
    pub amount_paid: Decimal,
    pub currency: String,
    pub status: String,
    pub payment_method: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = DatabaseError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let currency: Currency = row
            .currency
            .parse()
            .map_err(|_| DatabaseError::corrupt("bookings", "currency", &row.currency))?;
        let status = BookingStatus::parse(&row.status)
            .ok_or_else(|| DatabaseError::corrupt("bookings", "status", &row.status))?;
        let payment_method = BookingChannel::parse(&row.payment_method).ok_or_else(|| {
            DatabaseError::corrupt("bookings", "payment_method", &row.payment_method)
        })?;

        let booking = Booking {
            id: BookingId::from_uuid(row.id),
            participant_id: ParticipantId::from_uuid(row.participant_id),
            amount_due: Money::new(row.amount_due, currency),
            amount_paid: Money::new(row.amount_paid, currency),
            status,
            payment_method,
            paid_at: row.paid_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        };
        if !booking.is_consistent() {
            warn!(
                booking_id = %booking.id,
                status = booking.status.as_str(),
                amount_paid = %booking.amount_paid,
                amount_due = %booking.amount_due,
                "Stored booking status disagrees with its amounts"
            );
        }
        Ok(booking)
    }
}

/// Repository for the `bookings` table
#[derive(Debug, Clone)]
pub struct BookingRepository {
    pool: PgPool,
}

impl BookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Retrieves a booking by id
    pub async fn get_by_id(&self, id: BookingId) -> Result<Booking, DatabaseError> {
        let row = sqlx::query_as::<_, BookingRow>(&format!("{} WHERE id = $1", SELECT_BOOKING))
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Booking", id))?;

        row.try_into()
    }

    /// Retrieves the booking opened for a participation, if any
    pub async fn find_by_participant(
        &self,
        participant_id: ParticipantId,
    ) -> Result<Option<Booking>, DatabaseError> {
        sqlx::query_as::<_, BookingRow>(&format!(
            "{} WHERE participant_id = $1",
            SELECT_BOOKING
        ))
        .bind(*participant_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .map(Booking::try_from)
        .transpose()
    }

    /// Reads a booking and holds its row lock until the transaction ends
    pub async fn lock(conn: &mut PgConnection, id: BookingId) -> Result<Booking, DatabaseError> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "{} WHERE id = $1 FOR UPDATE",
            SELECT_BOOKING
        ))
        .bind(*id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Booking", id))?;

        row.try_into()
    }

    /// Inserts a new booking; a second booking for the same participation
    /// fails with `DuplicateEntry`
    pub async fn insert(conn: &mut PgConnection, booking: &Booking) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO bookings (
                id, participant_id, amount_due, amount_paid, currency, status,
                payment_method, paid_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(*booking.id.as_uuid())
        .bind(*booking.participant_id.as_uuid())
        .bind(booking.amount_due.amount())
        .bind(booking.amount_paid.amount())
        .bind(booking.currency().code())
        .bind(booking.status.as_str())
        .bind(booking.payment_method.as_str())
        .bind(booking.paid_at)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Writes the mutable columns of a booking
    pub async fn update(conn: &mut PgConnection, booking: &Booking) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET amount_paid = $2, status = $3, paid_at = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(*booking.id.as_uuid())
        .bind(booking.amount_paid.amount())
        .bind(booking.status.as_str())
        .bind(booking.paid_at)
        .bind(booking.updated_at)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Booking", booking.id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn row(status: &str, amount_paid: Decimal) -> BookingRow {
        let now = Utc::now();
        BookingRow {
            id: Uuid::new_v4(),
            participant_id: Uuid::new_v4(),
            amount_due: dec!(100.00),
            amount_paid,
            currency: "BDT".to_string(),
            status: status.to_string(),
            payment_method: "online".to_string(),
            paid_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_row_maps_to_booking() {
        let booking = Booking::try_from(row("partial", dec!(40.00))).unwrap();

        assert_eq!(booking.status, BookingStatus::Partial);
        assert_eq!(booking.amount_paid, Money::new(dec!(40.00), Currency::BDT));
        assert_eq!(booking.payment_method, BookingChannel::Online);
        assert!(booking.is_consistent());
    }

    #[test]
    fn test_unknown_status_is_corrupt() {
        let err = Booking::try_from(row("refunded", dec!(0))).unwrap_err();
        assert!(matches!(err, DatabaseError::CorruptRow(ref msg) if msg.contains("bookings.status")));
    }

    #[test]
    fn test_unknown_currency_is_corrupt() {
        let mut bad = row("pending", dec!(0));
        bad.currency = "XYZ".to_string();
        assert!(matches!(Booking::try_from(bad), Err(DatabaseError::CorruptRow(_))));
    }

    #[test]
    fn test_inconsistent_row_still_loads() {
        // Rows written by older flows may disagree; they load and get logged
        let booking = Booking::try_from(row("pending", dec!(40.00))).unwrap();
        assert!(!booking.is_consistent());
    }

    proptest! {
        #[test]
        fn prop_amounts_survive_mapping(minor in 0i64..10_000) {
            let paid = Decimal::new(minor, 2);
            let booking = Booking::try_from(row("partial", paid)).unwrap();
            prop_assert_eq!(booking.amount_paid.amount(), paid);
            prop_assert_eq!(booking.amount_due.amount(), dec!(100.00));
        }
    }
}
