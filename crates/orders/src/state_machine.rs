//! Order-level transition rules.
//!
//! Pure: given the current status, the requested status and who asks, decide
//! whether the move is allowed and which stock movement it implies.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use bazaar_auth::ActorRole;
use bazaar_inventory::StockMovement;

use crate::status::OrderStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionDenial {
    /// The order is cancelled, refunded or delivered.
    Terminal,
    /// The requested status does not move the order forward.
    NotForward,
    /// The actor's role may not request this change.
    RoleNotPermitted,
    /// A force-cancel on an order that is already cancelled.
    AlreadyCancelled,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[error("cannot move order from {current} to {requested} ({reason:?})")]
pub struct InvalidTransition {
    pub current: OrderStatus,
    pub requested: OrderStatus,
    pub reason: TransitionDenial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionMode {
    #[default]
    Normal,
    /// Administrative cancellation that ignores terminal states.
    Force,
}

/// An accepted transition and the stock movement it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub stock: Option<StockMovement>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OrderStateMachine;

impl OrderStateMachine {
    /// Role-free acceptance rule.
    pub fn accepts(current: OrderStatus, requested: OrderStatus) -> bool {
        !current.is_terminal() && (requested.rank() > current.rank() || requested.is_absorbing())
    }

    /// Stock consequence of a move that has already been accepted.
    pub fn stock_effect(from: OrderStatus, to: OrderStatus) -> Option<StockMovement> {
        match to {
            OrderStatus::Cancelled if from.holds_stock() => Some(StockMovement::Restore),
            OrderStatus::Refunded if from.holds_stock() => Some(StockMovement::Return),
            OrderStatus::Confirmed
            | OrderStatus::Processing
            | OrderStatus::Shipped
            | OrderStatus::Delivered
                if from == OrderStatus::Pending =>
            {
                Some(StockMovement::Deduct)
            }
            _ => None,
        }
    }

    pub fn evaluate(
        current: OrderStatus,
        requested: OrderStatus,
        role: ActorRole,
        mode: TransitionMode,
    ) -> Result<Transition, InvalidTransition> {
        let deny = |reason| InvalidTransition {
            current,
            requested,
            reason,
        };

        match (role, mode) {
            (ActorRole::Vendor, _) | (ActorRole::Customer, TransitionMode::Force) => {
                return Err(deny(TransitionDenial::RoleNotPermitted));
            }
            (ActorRole::Admin, TransitionMode::Force) => {
                if requested != OrderStatus::Cancelled {
                    return Err(deny(TransitionDenial::NotForward));
                }
                if current == OrderStatus::Cancelled {
                    return Err(deny(TransitionDenial::AlreadyCancelled));
                }
            }
            (_, TransitionMode::Normal) => {
                if current.is_terminal() {
                    return Err(deny(TransitionDenial::Terminal));
                }
                if !Self::accepts(current, requested) {
                    return Err(deny(TransitionDenial::NotForward));
                }
                if role == ActorRole::Customer
                    && !(requested == OrderStatus::Cancelled && current == OrderStatus::Pending)
                {
                    return Err(deny(TransitionDenial::RoleNotPermitted));
                }
            }
        }

        Ok(Transition {
            from: current,
            to: requested,
            stock: Self::stock_effect(current, requested),
        })
    }
}
