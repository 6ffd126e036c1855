//! Payment repository implementation

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use core_kernel::{BookingId, Currency, Money, PaymentId, UserId};
use domain_payments::{Payment, PaymentMethod, PaymentStatus};

use crate::error::DatabaseError;

const SELECT_PAYMENT: &str = r#"
    SELECT id, booking_id, amount, currency, method, status, transaction_id,
           gateway_payload, created_by, verified_by, verified_at, created_at, updated_at
    FROM payments
"#;

/// A row of the `payments` table
#[derive(Debug, Clone, FromRow)]
pub struct PaymentRow {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub method: String,
    pub status: String,
    pub transaction_id: Option<String>,
    pub gateway_payload: Option<serde_json::Value>,
    pub created_by: Uuid,
    pub verified_by: Option<Uuid>,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = DatabaseError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let currency: Currency = row
            .currency
            .parse()
            .map_err(|_| DatabaseError::corrupt("payments", "currency", &row.currency))?;
        let method = PaymentMethod::parse(&row.method)
            .ok_or_else(|| DatabaseError::corrupt("payments", "method", &row.method))?;
        let status = PaymentStatus::parse(&row.status)
            .ok_or_else(|| DatabaseError::corrupt("payments", "status", &row.status))?;

        Ok(Payment {
            id: PaymentId::from_uuid(row.id),
            booking_id: BookingId::from_uuid(row.booking_id),
            amount: Money::new(row.amount, currency),
            method,
            status,
            transaction_id: row.transaction_id,
            gateway_payload: row.gateway_payload,
            created_by: UserId::from_uuid(row.created_by),
            verified_by: row.verified_by.map(UserId::from_uuid),
            verified_at: row.verified_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for the `payments` table
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: PgPool,
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Retrieves a payment by id
    pub async fn get_by_id(&self, id: PaymentId) -> Result<Payment, DatabaseError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!("{} WHERE id = $1", SELECT_PAYMENT))
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Payment", id))?;

        row.try_into()
    }

    /// Lists the payments against a booking, oldest first
    pub async fn list_for_booking(&self, booking_id: BookingId) -> Result<Vec<Payment>, DatabaseError> {
        sqlx::query_as::<_, PaymentRow>(&format!(
            "{} WHERE booking_id = $1 ORDER BY created_at, id",
            SELECT_PAYMENT
        ))
        .bind(*booking_id.as_uuid())
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Payment::try_from)
        .collect()
    }

    /// Reads a payment and holds its row lock until the transaction ends
    pub async fn lock(conn: &mut PgConnection, id: PaymentId) -> Result<Payment, DatabaseError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "{} WHERE id = $1 FOR UPDATE",
            SELECT_PAYMENT
        ))
        .bind(*id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Payment", id))?;

        row.try_into()
    }

    /// Inserts a new payment
    pub async fn insert(conn: &mut PgConnection, payment: &Payment) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, booking_id, amount, currency, method, status, transaction_id,
                gateway_payload, created_by, verified_by, verified_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(*payment.id.as_uuid())
        .bind(*payment.booking_id.as_uuid())
        .bind(payment.amount.amount())
        .bind(payment.amount.currency().code())
        .bind(payment.method.as_str())
        .bind(payment.status.as_str())
        .bind(payment.transaction_id.as_deref())
        .bind(payment.gateway_payload.clone())
        .bind(*payment.created_by.as_uuid())
        .bind(payment.verified_by.map(Uuid::from))
        .bind(payment.verified_at)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Writes the mutable columns of a payment
    ///
    /// Settling a payment under a transaction id that another successful
    /// payment already carries fails with `DuplicateEntry`.
    pub async fn update(conn: &mut PgConnection, payment: &Payment) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = $2, transaction_id = $3, gateway_payload = $4,
                verified_by = $5, verified_at = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(*payment.id.as_uuid())
        .bind(payment.status.as_str())
        .bind(payment.transaction_id.as_deref())
        .bind(payment.gateway_payload.clone())
        .bind(payment.verified_by.map(Uuid::from))
        .bind(payment.verified_at)
        .bind(payment.updated_at)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Payment", payment.id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn row(method: &str, status: &str) -> PaymentRow {
        let now = Utc::now();
        PaymentRow {
            id: Uuid::new_v4(),
            booking_id: Uuid::new_v4(),
            amount: dec!(60.00),
            currency: "BDT".to_string(),
            method: method.to_string(),
            status: status.to_string(),
            transaction_id: Some("T-1".to_string()),
            gateway_payload: Some(serde_json::json!({ "status": "VALID" })),
            created_by: Uuid::new_v4(),
            verified_by: None,
            verified_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_row_maps_to_payment() {
        let payment = Payment::try_from(row("gateway", "success")).unwrap();

        assert_eq!(payment.method, PaymentMethod::Gateway);
        assert_eq!(payment.status, PaymentStatus::Success);
        assert_eq!(payment.amount, Money::new(dec!(60.00), Currency::BDT));
        assert_eq!(payment.transaction_id.as_deref(), Some("T-1"));
        assert_eq!(payment.gateway_payload.unwrap()["status"], "VALID");
    }

    #[test]
    fn test_gateway_alias_is_accepted() {
        let payment = Payment::try_from(row("sslcommerz", "processing")).unwrap();
        assert_eq!(payment.method, PaymentMethod::Gateway);
    }

    #[test]
    fn test_unknown_values_are_corrupt() {
        assert!(matches!(
            Payment::try_from(row("cheque", "success")),
            Err(DatabaseError::CorruptRow(_))
        ));
        assert!(matches!(
            Payment::try_from(row("cash", "refunded")),
            Err(DatabaseError::CorruptRow(_))
        ));
    }
}
