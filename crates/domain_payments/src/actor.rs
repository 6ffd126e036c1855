//! Actors and the capabilities they hold over a booking
//!
//! Every engine operation names the [`Capability`] it needs; the actor is
//! checked against the participation the booking belongs to. Organizers own
//! the tour, tourists own their participation, admins see everything, and
//! guides hold no payment capabilities.

use serde::{Deserialize, Serialize};

use core_kernel::UserId;

use crate::error::PaymentError;
use crate::participation::Participation;

/// The authenticated user driving an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", content = "user_id", rename_all = "lowercase")]
pub enum Actor {
    Admin(UserId),
    Organizer(UserId),
    Tourist(UserId),
    Guide(UserId),
}

/// Operations gated by ownership of a booking's participation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Create the booking for a participation
    OpenBooking,
    /// Read a booking or one of its payments
    ViewBooking,
    /// Start an online payment through the gateway
    InitiateGatewayPayment,
    /// Record cash collected in person
    RecordCashPayment,
    /// Settle a payment or booking by hand
    Verify,
}

impl Actor {
    pub fn user_id(&self) -> UserId {
        match self {
            Actor::Admin(id) | Actor::Organizer(id) | Actor::Tourist(id) | Actor::Guide(id) => *id,
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            Actor::Admin(_) => "admin",
            Actor::Organizer(_) => "organizer",
            Actor::Tourist(_) => "tourist",
            Actor::Guide(_) => "guide",
        }
    }

    /// Builds an actor from a role name as carried in access tokens
    pub fn from_role(role: &str, user_id: UserId) -> Option<Self> {
        match role {
            "admin" => Some(Actor::Admin(user_id)),
            "organizer" => Some(Actor::Organizer(user_id)),
            "tourist" => Some(Actor::Tourist(user_id)),
            "guide" => Some(Actor::Guide(user_id)),
            _ => None,
        }
    }

    /// Returns true if this actor holds `capability` over `participation`
    pub fn can(&self, capability: Capability, participation: &Participation) -> bool {
        match (capability, self) {
            (Capability::OpenBooking | Capability::ViewBooking, Actor::Admin(_)) => true,
            (Capability::OpenBooking | Capability::ViewBooking, Actor::Organizer(id)) => {
                participation.is_organized_by(*id)
            }
            (Capability::OpenBooking | Capability::ViewBooking, Actor::Tourist(id)) => {
                participation.is_owned_by(*id)
            }
            (Capability::InitiateGatewayPayment, Actor::Tourist(id)) => {
                participation.is_owned_by(*id)
            }
            (Capability::RecordCashPayment, Actor::Organizer(id)) => {
                participation.is_organized_by(*id)
            }
            (Capability::Verify, Actor::Admin(_)) => true,
            (Capability::Verify, Actor::Organizer(id)) => participation.is_organized_by(*id),
            _ => false,
        }
    }

    /// Like [`Actor::can`], but returns `PermissionDenied` when the check fails
    pub fn authorize(
        &self,
        capability: Capability,
        participation: &Participation,
    ) -> Result<(), PaymentError> {
        if self.can(capability, participation) {
            Ok(())
        } else {
            Err(PaymentError::permission(format!(
                "{} {} may not {:?} for participation {}",
                self.role(),
                self.user_id(),
                capability,
                participation.id
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participation::{Contact, ParticipationStatus};
    use core_kernel::{Currency, Money, ParticipantId, TourId};
    use rust_decimal_macros::dec;

    fn participation(tourist: UserId, organizer: UserId) -> Participation {
        Participation {
            id: ParticipantId::new(),
            tour_id: TourId::new(),
            tourist_id: tourist,
            organizer_id: organizer,
            status: ParticipationStatus::Approved,
            cost_per_person: Money::new(dec!(100), Currency::BDT),
            tourist_contact: Contact {
                name: "Rahim".to_string(),
                email: "rahim@example.com".to_string(),
                phone: None,
            },
        }
    }

    #[test]
    fn test_only_owning_tourist_initiates() {
        let tourist = UserId::new();
        let p = participation(tourist, UserId::new());

        assert!(Actor::Tourist(tourist).can(Capability::InitiateGatewayPayment, &p));
        assert!(!Actor::Tourist(UserId::new()).can(Capability::InitiateGatewayPayment, &p));
        assert!(!Actor::Admin(UserId::new()).can(Capability::InitiateGatewayPayment, &p));
    }

    #[test]
    fn test_only_owning_organizer_records_cash() {
        let organizer = UserId::new();
        let p = participation(UserId::new(), organizer);

        assert!(Actor::Organizer(organizer).can(Capability::RecordCashPayment, &p));
        assert!(!Actor::Organizer(UserId::new()).can(Capability::RecordCashPayment, &p));
        assert!(!Actor::Admin(UserId::new()).can(Capability::RecordCashPayment, &p));
    }

    #[test]
    fn test_verify_is_admin_or_owning_organizer() {
        let organizer = UserId::new();
        let tourist = UserId::new();
        let p = participation(tourist, organizer);

        assert!(Actor::Admin(UserId::new()).can(Capability::Verify, &p));
        assert!(Actor::Organizer(organizer).can(Capability::Verify, &p));
        assert!(!Actor::Organizer(UserId::new()).can(Capability::Verify, &p));
        assert!(!Actor::Tourist(tourist).can(Capability::Verify, &p));
    }

    #[test]
    fn test_guide_holds_nothing() {
        let guide = UserId::new();
        let p = participation(UserId::new(), UserId::new());
        let err = Actor::Guide(guide).authorize(Capability::ViewBooking, &p).unwrap_err();
        assert!(matches!(err, PaymentError::PermissionDenied(_)));
    }

    #[test]
    fn test_from_role() {
        let id = UserId::new();
        assert_eq!(Actor::from_role("organizer", id), Some(Actor::Organizer(id)));
        assert_eq!(Actor::from_role("superuser", id), None);
    }
}
