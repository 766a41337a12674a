use serde::{Deserialize, Serialize};

use crate::errors::ApiError;

/// Lifecycle of a reservation or test-drive request. `Cancelled` and
/// `Completed` are terminal; nothing ever moves back to `Pending`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::Completed)
    }

    /// Human-readable form used in notification emails.
    pub fn label(self) -> &'static str {
        match self {
            BookingStatus::Pending => "Pending confirmation",
            BookingStatus::Confirmed => "Confirmed",
            BookingStatus::Cancelled => "Cancelled",
            BookingStatus::Completed => "Completed",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        }
    }
}

/// An accepted state change. Handlers persist `to` first, then hand the
/// change to the notification dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub from: BookingStatus,
    pub to: BookingStatus,
}

/// Decides a requested transition. `Ok(None)` means the record is already in
/// the requested status: nothing is persisted and nobody is notified.
pub fn apply_transition(
    current: BookingStatus,
    requested: BookingStatus,
) -> Result<Option<StatusChange>, ApiError> {
    if requested == current {
        return Ok(None);
    }
    if current.is_terminal() {
        return Err(ApiError::InvalidState(format!(
            "No further changes are allowed once a booking is {}",
            current.as_str()
        )));
    }
    if requested == BookingStatus::Pending {
        return Err(ApiError::InvalidState(
            "A booking cannot return to pending".to_string(),
        ));
    }
    Ok(Some(StatusChange {
        from: current,
        to: requested,
    }))
}

/// Cancellation by the creator or an admin. Unlike a repeated admin status
/// update, cancelling an already-terminal booking is an error, never a silent
/// success.
pub fn cancel(current: BookingStatus) -> Result<StatusChange, ApiError> {
    if current.is_terminal() {
        return Err(ApiError::InvalidState(
            "This booking has already been cancelled or completed".to_string(),
        ));
    }
    Ok(StatusChange {
        from: current,
        to: BookingStatus::Cancelled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use BookingStatus::*;

    fn all() -> [BookingStatus; 4] {
        [Pending, Confirmed, Cancelled, Completed]
    }

    #[test]
    fn same_status_is_idempotent_and_silent() {
        for status in all() {
            assert_eq!(apply_transition(status, status).unwrap(), None);
        }
    }

    #[test]
    fn pending_reaches_every_other_status() {
        for target in [Confirmed, Cancelled, Completed] {
            let change = apply_transition(Pending, target).unwrap().unwrap();
            assert_eq!(change.from, Pending);
            assert_eq!(change.to, target);
        }
    }

    #[test]
    fn confirmed_can_cancel_or_complete() {
        assert!(apply_transition(Confirmed, Cancelled).unwrap().is_some());
        assert!(apply_transition(Confirmed, Completed).unwrap().is_some());
    }

    #[test]
    fn terminal_states_admit_no_transition() {
        for current in [Cancelled, Completed] {
            for target in all() {
                if target == current {
                    continue;
                }
                assert!(
                    matches!(
                        apply_transition(current, target),
                        Err(ApiError::InvalidState(_))
                    ),
                    "{:?} -> {:?} should be rejected",
                    current,
                    target
                );
            }
        }
    }

    #[test]
    fn cancelled_to_confirmed_always_fails() {
        assert!(matches!(
            apply_transition(Cancelled, Confirmed),
            Err(ApiError::InvalidState(_))
        ));
    }

    #[test]
    fn nothing_returns_to_pending() {
        for current in [Confirmed, Cancelled, Completed] {
            assert!(apply_transition(current, Pending).is_err());
        }
    }

    #[test]
    fn cancel_rejects_terminal_states() {
        assert!(cancel(Cancelled).is_err());
        assert!(cancel(Completed).is_err());
        assert_eq!(cancel(Pending).unwrap().to, Cancelled);
        assert_eq!(cancel(Confirmed).unwrap().to, Cancelled);
    }

    #[test]
    fn wire_format_is_lowercase() {
        assert_eq!(serde_json::to_string(&Confirmed).unwrap(), "\"confirmed\"");
        assert_eq!(
            serde_json::from_str::<BookingStatus>("\"pending\"").unwrap(),
            Pending
        );
    }
}
