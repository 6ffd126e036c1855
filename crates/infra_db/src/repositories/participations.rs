//! Participation repository implementation
//!
//! Participations, tours and users belong to the tour side of the platform.
//! This repository only reads them, joining in the tour's organizer and
//! price and the tourist's contact details.

use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use core_kernel::{Currency, Money, ParticipantId, TourId, UserId};
use domain_payments::{Contact, Participation, ParticipationStatus};

use crate::error::DatabaseError;

/// A participation joined with its tour and tourist
#[derive(Debug, Clone, FromRow)]
pub struct ParticipationRow {
    pub id: Uuid,
    pub tour_id: Uuid,
    pub tourist_id: Uuid,
    pub organizer_id: Uuid,
    pub status: String,
    pub cost_per_person: Decimal,
    pub currency: String,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
}

impl TryFrom<ParticipationRow> for Participation {
    type Error = DatabaseError;

    fn try_from(row: ParticipationRow) -> Result<Self, Self::Error> {
        let currency: Currency = row
            .currency
            .parse()
            .map_err(|_| DatabaseError::corrupt("tours", "currency", &row.currency))?;
        let status = ParticipationStatus::parse(&row.status)
            .ok_or_else(|| DatabaseError::corrupt("tour_participants", "status", &row.status))?;

        Ok(Participation {
            id: ParticipantId::from_uuid(row.id),
            tour_id: TourId::from_uuid(row.tour_id),
            tourist_id: UserId::from_uuid(row.tourist_id),
            organizer_id: UserId::from_uuid(row.organizer_id),
            status,
            cost_per_person: Money::new(row.cost_per_person, currency),
            tourist_contact: Contact {
                name: row.full_name,
                email: row.email,
                phone: row.phone.filter(|p| !p.trim().is_empty()),
            },
        })
    }
}

/// Read-only repository over `tour_participants`
#[derive(Debug, Clone)]
pub struct ParticipationRepository {
    pool: PgPool,
}

impl ParticipationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Retrieves a participation with its tour's organizer and price
    pub async fn get_by_id(&self, id: ParticipantId) -> Result<Participation, DatabaseError> {
        let row = sqlx::query_as::<_, ParticipationRow>(
            r#"
            SELECT tp.id, tp.tour_id, tp.tourist_id, t.organizer_id, tp.status,
                   t.cost_per_person, t.currency, u.full_name, u.email, u.phone
            FROM tour_participants tp
            JOIN tours t ON t.id = tp.tour_id
            JOIN users u ON u.id = tp.tourist_id
            WHERE tp.id = $1
            "#,
        )
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Participation", id))?;

        row.try_into()
    }
}
