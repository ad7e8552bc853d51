//! The order lifecycle state machine.
//!
//! This is a pure function of (current status, event). The storage layer is responsible for applying the result
//! atomically under the version guard; this module only decides what is allowed.
//!
//! | From \ Event     | submit | captured | failed | claim  | confirmed | mint.failed | requeue |
//! |------------------|--------|----------|--------|--------|-----------|-------------|---------|
//! | Created          | Await  | Err      | Failed | Err    | Err       | Err         | Err     |
//! | AwaitingPayment  | Err    | Paid     | Failed | Err    | Err       | Err         | Err     |
//! | Paid             | Err    | NoOp     | Err    | Minting| Err       | Err         | Err     |
//! | Minting          | Err    | NoOp     | Err    | Err    | Minted    | Failed      | Err     |
//! | Minted           | Err    | NoOp     | Err    | Err    | Err       | Err         | Err     |
//! | Failed           | Err    | Err      | Err    | Err    | Err       | Err         | Paid    |
//!
//! A duplicate `payment.captured` for an order that is already paid (or further along) is a no-op success, not an
//! error: the gateway delivers at least once and must not be punished for it.
use thiserror::Error;

use crate::db_types::{LedgerEvent, OrderStatusType};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Event '{event}' is not a valid transition from state {from}")]
pub struct TransitionError {
    pub from: OrderStatusType,
    pub event: &'static str,
}

/// The decision for a (status, event) pair: either move to a new status or acknowledge without change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Move(OrderStatusType),
    NoOp,
}

pub fn next_state(current: OrderStatusType, event: &LedgerEvent) -> Result<Transition, TransitionError> {
    use OrderStatusType::*;
    use Transition::*;
    let next = match (current, event) {
        (Created, LedgerEvent::Submit) => Move(AwaitingPayment),
        (Created | AwaitingPayment, LedgerEvent::PaymentFailed) => Move(Failed),
        (AwaitingPayment, LedgerEvent::PaymentCaptured { .. }) => Move(Paid),
        // At-least-once delivery: a repeated capture for an order that has already progressed is acknowledged.
        (Paid | Minting | Minted, LedgerEvent::PaymentCaptured { .. }) => NoOp,
        (Paid, LedgerEvent::ClaimForMinting) => Move(Minting),
        (Minting, LedgerEvent::MintConfirmed { .. }) => Move(Minted),
        (Minting, LedgerEvent::MintFailed) => Move(Failed),
        (Failed, LedgerEvent::Requeue) => Move(Paid),
        (from, event) => return Err(TransitionError { from, event: event.name() }),
    };
    Ok(next)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db_types::{LedgerEvent, OrderStatusType::*};

    fn captured() -> LedgerEvent {
        LedgerEvent::PaymentCaptured { payment_ref: "pay_123".into() }
    }

    fn confirmed() -> LedgerEvent {
        LedgerEvent::MintConfirmed { txid: "0xabc".into() }
    }

    #[test]
    fn happy_path() {
        assert_eq!(next_state(Created, &LedgerEvent::Submit), Ok(Transition::Move(AwaitingPayment)));
        assert_eq!(next_state(AwaitingPayment, &captured()), Ok(Transition::Move(Paid)));
        assert_eq!(next_state(Paid, &LedgerEvent::ClaimForMinting), Ok(Transition::Move(Minting)));
        assert_eq!(next_state(Minting, &confirmed()), Ok(Transition::Move(Minted)));
    }

    #[test]
    fn duplicate_capture_is_a_noop() {
        for state in [Paid, Minting, Minted] {
            assert_eq!(next_state(state, &captured()), Ok(Transition::NoOp));
        }
    }

    #[test]
    fn failure_paths() {
        assert_eq!(next_state(AwaitingPayment, &LedgerEvent::PaymentFailed), Ok(Transition::Move(Failed)));
        assert_eq!(next_state(Created, &LedgerEvent::PaymentFailed), Ok(Transition::Move(Failed)));
        assert_eq!(next_state(Minting, &LedgerEvent::MintFailed), Ok(Transition::Move(Failed)));
    }

    #[test]
    fn requeue_resets_failed_to_paid() {
        assert_eq!(next_state(Failed, &LedgerEvent::Requeue), Ok(Transition::Move(Paid)));
        // Requeue is only meaningful from Failed.
        assert!(next_state(Paid, &LedgerEvent::Requeue).is_err());
    }

    #[test]
    fn terminal_states_reject_everything_else() {
        for ev in
            [LedgerEvent::Submit, LedgerEvent::PaymentFailed, LedgerEvent::ClaimForMinting, LedgerEvent::MintFailed]
        {
            assert!(next_state(Minted, &ev).is_err(), "Minted must reject {}", ev.name());
            assert!(next_state(Failed, &ev).is_err(), "Failed must reject {}", ev.name());
        }
        assert!(next_state(Failed, &captured()).is_err());
        assert!(next_state(Minted, &confirmed()).is_err());
    }

    #[test]
    fn no_shortcut_to_minted() {
        // An order can never reach Minted without having been Paid and claimed first.
        for state in [Created, AwaitingPayment, Paid] {
            assert!(next_state(state, &confirmed()).is_err());
        }
    }
}
