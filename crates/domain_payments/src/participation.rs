//! Tour participation as seen by the payments domain
//!
//! Participations are owned by the tour management side; payments only read
//! them to price bookings and to decide who may act on a booking.

use serde::{Deserialize, Serialize};

use core_kernel::{Money, ParticipantId, TourId, UserId};

/// Approval state of a tourist's request to join a tour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipationStatus {
    Pending,
    Approved,
    Rejected,
}

impl ParticipationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipationStatus::Pending => "pending",
            ParticipationStatus::Approved => "approved",
            ParticipationStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(ParticipationStatus::Pending),
            "approved" => Some(ParticipationStatus::Approved),
            "rejected" => Some(ParticipationStatus::Rejected),
            _ => None,
        }
    }
}

/// Customer details forwarded to the gateway checkout page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// A tourist's participation in a tour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participation {
    pub id: ParticipantId,
    pub tour_id: TourId,
    /// The tourist who joined
    pub tourist_id: UserId,
    /// The organizer who owns the tour
    pub organizer_id: UserId,
    pub status: ParticipationStatus,
    /// Price of one seat, used as the booking's due amount
    pub cost_per_person: Money,
    pub tourist_contact: Contact,
}

impl Participation {
    pub fn is_approved(&self) -> bool {
        self.status == ParticipationStatus::Approved
    }

    pub fn is_owned_by(&self, tourist: UserId) -> bool {
        self.tourist_id == tourist
    }

    pub fn is_organized_by(&self, organizer: UserId) -> bool {
        self.organizer_id == organizer
    }
}
