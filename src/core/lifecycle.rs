use thiserror::Error;

use crate::models::{DonationStatus, RequestStatus};

/// Errors raised when a status change does not fit the lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Cannot move request from {from:?} to {to:?}")]
    InvalidRequestTransition {
        from: RequestStatus,
        to: RequestStatus,
    },

    #[error("Donation is {0:?} and no longer accepts changes")]
    DonationClosed(DonationStatus),
}

impl RequestStatus {
    /// Completed, rejected and cancelled requests never change again
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RequestStatus::Rejected | RequestStatus::Completed | RequestStatus::Cancelled
        )
    }

    /// Only requests that never produced a handover or a decision may be removed
    pub fn is_deletable(self) -> bool {
        matches!(self, RequestStatus::Pending | RequestStatus::Cancelled)
    }

    /// pending -> {approved, rejected, cancelled}, approved -> completed
    pub fn can_transition_to(self, next: RequestStatus) -> bool {
        matches!(
            (self, next),
            (RequestStatus::Pending, RequestStatus::Approved)
                | (RequestStatus::Pending, RequestStatus::Rejected)
                | (RequestStatus::Pending, RequestStatus::Cancelled)
                | (RequestStatus::Approved, RequestStatus::Completed)
        )
    }
}

impl DonationStatus {
    /// Available and requested donations still take new requests
    pub fn accepts_requests(self) -> bool {
        matches!(self, DonationStatus::Available | DonationStatus::Requested)
    }
}

/// Side effects that accompany a request status change
///
/// All of them are applied together with the status write in one database
/// transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionPlan {
    pub from: RequestStatus,
    pub to: RequestStatus,
    /// Generate the pickup code and create the handover record
    pub issue_pickup_code: bool,
    /// New status for the parent donation
    pub donation_status: Option<DonationStatus>,
    /// Stamp the actual pickup time and close the handover record
    pub complete_handover: bool,
    /// Put the donation back to available when no pending request is left
    pub release_donation: bool,
}

/// Work out what a status change entails, given the current status
pub fn plan_transition(
    from: RequestStatus,
    to: RequestStatus,
) -> Result<TransitionPlan, TransitionError> {
    if !from.can_transition_to(to) {
        return Err(TransitionError::InvalidRequestTransition { from, to });
    }

    let plan = TransitionPlan {
        from,
        to,
        issue_pickup_code: to == RequestStatus::Approved,
        donation_status: (to == RequestStatus::Approved).then_some(DonationStatus::Completed),
        complete_handover: to == RequestStatus::Completed,
        release_donation: matches!(to, RequestStatus::Rejected | RequestStatus::Cancelled),
    };

    Ok(plan)
}

/// Status a donation takes when one more request is filed against it
pub fn donation_status_on_request(current: DonationStatus) -> Result<DonationStatus, TransitionError> {
    if current.accepts_requests() {
        Ok(DonationStatus::Requested)
    } else {
        Err(TransitionError::DonationClosed(current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [RequestStatus; 5] = [
        RequestStatus::Pending,
        RequestStatus::Approved,
        RequestStatus::Rejected,
        RequestStatus::Completed,
        RequestStatus::Cancelled,
    ];

    #[test]
    fn test_allowed_transitions() {
        let allowed: Vec<(RequestStatus, RequestStatus)> = ALL
            .iter()
            .flat_map(|from| ALL.iter().map(move |to| (*from, *to)))
            .filter(|(from, to)| from.can_transition_to(*to))
            .collect();

        assert_eq!(
            allowed,
            vec![
                (RequestStatus::Pending, RequestStatus::Approved),
                (RequestStatus::Pending, RequestStatus::Rejected),
                (RequestStatus::Pending, RequestStatus::Cancelled),
                (RequestStatus::Approved, RequestStatus::Completed),
            ]
        );
    }

    #[test]
    fn test_terminal_states_are_frozen() {
        for from in ALL.iter().filter(|status| status.is_terminal()) {
            for to in ALL {
                assert!(plan_transition(*from, to).is_err(), "{:?} -> {:?}", from, to);
            }
        }
    }

    #[test]
    fn test_only_undecided_requests_are_deletable() {
        let deletable: Vec<RequestStatus> =
            ALL.iter().copied().filter(|status| status.is_deletable()).collect();

        assert_eq!(deletable, vec![RequestStatus::Pending, RequestStatus::Cancelled]);
    }

    #[test]
    fn test_approval_plan() {
        let plan = plan_transition(RequestStatus::Pending, RequestStatus::Approved).unwrap();

        assert!(plan.issue_pickup_code);
        assert_eq!(plan.donation_status, Some(DonationStatus::Completed));
        assert!(!plan.complete_handover);
        assert!(!plan.release_donation);
    }

    #[test]
    fn test_rejection_releases_donation() {
        let plan = plan_transition(RequestStatus::Pending, RequestStatus::Rejected).unwrap();

        assert!(!plan.issue_pickup_code);
        assert_eq!(plan.donation_status, None);
        assert!(plan.release_donation);
    }

    #[test]
    fn test_completion_plan() {
        let plan = plan_transition(RequestStatus::Approved, RequestStatus::Completed).unwrap();
        assert!(plan.complete_handover);
        assert!(!plan.issue_pickup_code);

        let err = plan_transition(RequestStatus::Pending, RequestStatus::Completed).unwrap_err();
        assert_eq!(
            err,
            TransitionError::InvalidRequestTransition {
                from: RequestStatus::Pending,
                to: RequestStatus::Completed,
            }
        );
    }

    #[test]
    fn test_donation_status_on_request() {
        assert_eq!(
            donation_status_on_request(DonationStatus::Available),
            Ok(DonationStatus::Requested)
        );
        assert_eq!(
            donation_status_on_request(DonationStatus::Requested),
            Ok(DonationStatus::Requested)
        );
        assert!(donation_status_on_request(DonationStatus::Expired).is_err());
        assert!(!DonationStatus::Completed.accepts_requests());
    }
}
