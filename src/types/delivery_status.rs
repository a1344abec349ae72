use serde::{Deserialize, Serialize};
use std::fmt;

/// Delivery lifecycle for a tracked order. The variant order is the canonical
/// progression: the tracking state machine only moves forward along it, with
/// cancellation as the single special-cased regression.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum DeliveryStatus {
    Created,
    Confirmed,
    Preparing,
    Ready,
    Delivering,
    Delivered,
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryStatus::Created => write!(f, "Created"),
            DeliveryStatus::Confirmed => write!(f, "Confirmed"),
            DeliveryStatus::Preparing => write!(f, "Preparing"),
            DeliveryStatus::Ready => write!(f, "Ready for Delivery"),
            DeliveryStatus::Delivering => write!(f, "Delivering"),
            DeliveryStatus::Delivered => write!(f, "Delivered"),
        }
    }
}

/// A proposed status transition, as translated from a backend status string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusUpdate {
    /// Normal forward progression to (at least) this status.
    Progress(DeliveryStatus),
    /// Explicit cancellation/rejection; resets the canonical status to
    /// [`DeliveryStatus::Confirmed`].
    Cancellation,
}

impl DeliveryStatus {
    /// Map the backend's status vocabulary onto the canonical enum. Several
    /// backend spellings collapse onto one canonical state; anything
    /// unrecognized falls back to `Confirmed` rather than being dropped.
    pub fn from_backend(raw: &str) -> StatusUpdate {
        match raw.trim().to_uppercase().as_str() {
            "CREATED" | "PENDING_PAYMENT" => StatusUpdate::Progress(DeliveryStatus::Created),
            "CONFIRMED" | "PAID" => StatusUpdate::Progress(DeliveryStatus::Confirmed),
            "PREPARING" => StatusUpdate::Progress(DeliveryStatus::Preparing),
            "READY" | "READY_FOR_DELIVERY" => StatusUpdate::Progress(DeliveryStatus::Ready),
            "ASSIGNED" | "OUT_FOR_DELIVERY" | "DELIVERING" | "IN_PROGRESS" => {
                StatusUpdate::Progress(DeliveryStatus::Delivering)
            }
            "DELIVERED" | "COMPLETED" => StatusUpdate::Progress(DeliveryStatus::Delivered),
            "REJECTED" | "CANCELLED" => StatusUpdate::Cancellation,
            _ => StatusUpdate::Progress(DeliveryStatus::Confirmed),
        }
    }

    pub fn is_terminal(self) -> bool {
        self == DeliveryStatus::Delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_are_ordered_by_progression() {
        assert!(DeliveryStatus::Created < DeliveryStatus::Confirmed);
        assert!(DeliveryStatus::Confirmed < DeliveryStatus::Preparing);
        assert!(DeliveryStatus::Preparing < DeliveryStatus::Ready);
        assert!(DeliveryStatus::Ready < DeliveryStatus::Delivering);
        assert!(DeliveryStatus::Delivering < DeliveryStatus::Delivered);
    }

    #[test]
    fn backend_spellings_collapse() {
        assert_eq!(
            DeliveryStatus::from_backend("OUT_FOR_DELIVERY"),
            StatusUpdate::Progress(DeliveryStatus::Delivering)
        );
        assert_eq!(
            DeliveryStatus::from_backend("ready_for_delivery"),
            StatusUpdate::Progress(DeliveryStatus::Ready)
        );
        assert_eq!(
            DeliveryStatus::from_backend("COMPLETED"),
            StatusUpdate::Progress(DeliveryStatus::Delivered)
        );
        assert_eq!(
            DeliveryStatus::from_backend("PAID"),
            StatusUpdate::Progress(DeliveryStatus::Confirmed)
        );
    }

    #[test]
    fn rejection_and_cancellation_regress() {
        assert_eq!(
            DeliveryStatus::from_backend("CANCELLED"),
            StatusUpdate::Cancellation
        );
        assert_eq!(
            DeliveryStatus::from_backend("REJECTED"),
            StatusUpdate::Cancellation
        );
    }

    #[test]
    fn unknown_status_falls_back_to_confirmed() {
        assert_eq!(
            DeliveryStatus::from_backend("SOMETHING_NEW"),
            StatusUpdate::Progress(DeliveryStatus::Confirmed)
        );
    }
}
