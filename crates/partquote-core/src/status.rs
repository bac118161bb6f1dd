//! Offer lifecycle state machine.
//!
//! ```text
//! proiect ──send──▶ trimisa
//!    │                 │
//!    └──submit_selection┴──▶ comanda_spre_finalizare ──accept──▶ oferta_acceptata
//!                                    │                                 │
//!                                    └──reject──▶ oferta_respinsa      start_delivery
//!                                                                      ▼
//!                                                         livrare_in_procesare ──▶ livrata
//!
//! any non-terminal ──cancel──▶ anulata
//! ```
//!
//! [`next_status`] only knows the graph and who may walk each edge. Guards
//! that depend on offer contents (a non-empty selection, a billing address)
//! live on [`crate::Offer::apply`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status strings are persisted and sent over the wire verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OfferStatus {
    #[serde(rename = "proiect")]
    Draft,
    #[serde(rename = "trimisa")]
    Sent,
    #[serde(rename = "comanda_spre_finalizare")]
    AwaitingFinalization,
    #[serde(rename = "oferta_acceptata")]
    Accepted,
    #[serde(rename = "oferta_respinsa")]
    Rejected,
    #[serde(rename = "livrare_in_procesare")]
    DeliveryProcessing,
    #[serde(rename = "livrata")]
    Delivered,
    #[serde(rename = "anulata")]
    Cancelled,
}

impl OfferStatus {
    pub const ALL: [OfferStatus; 8] = [
        OfferStatus::Draft,
        OfferStatus::Sent,
        OfferStatus::AwaitingFinalization,
        OfferStatus::Accepted,
        OfferStatus::Rejected,
        OfferStatus::DeliveryProcessing,
        OfferStatus::Delivered,
        OfferStatus::Cancelled,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            OfferStatus::Draft => "proiect",
            OfferStatus::Sent => "trimisa",
            OfferStatus::AwaitingFinalization => "comanda_spre_finalizare",
            OfferStatus::Accepted => "oferta_acceptata",
            OfferStatus::Rejected => "oferta_respinsa",
            OfferStatus::DeliveryProcessing => "livrare_in_procesare",
            OfferStatus::Delivered => "livrata",
            OfferStatus::Cancelled => "anulata",
        }
    }

    /// No transition leaves a terminal status.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OfferStatus::Rejected | OfferStatus::Delivered | OfferStatus::Cancelled
        )
    }

    /// Part lines may only be added or edited while the offer is a draft or sent.
    #[must_use]
    pub fn allows_part_edits(self) -> bool {
        matches!(self, OfferStatus::Draft | OfferStatus::Sent)
    }

    /// Client may (re)submit a selection.
    #[must_use]
    pub fn allows_selection(self) -> bool {
        matches!(
            self,
            OfferStatus::Draft | OfferStatus::Sent | OfferStatus::AwaitingFinalization
        )
    }

    /// Position along the lifecycle; every legal transition strictly
    /// increases it or keeps it (selection resubmission).
    #[must_use]
    pub fn stage(self) -> u8 {
        match self {
            OfferStatus::Draft => 0,
            OfferStatus::Sent => 1,
            OfferStatus::AwaitingFinalization => 2,
            OfferStatus::Accepted | OfferStatus::Rejected => 3,
            OfferStatus::DeliveryProcessing => 4,
            OfferStatus::Delivered | OfferStatus::Cancelled => 5,
        }
    }
}

impl fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OfferStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OfferStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown offer status '{s}'"))
    }
}

/// Who is driving a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Actor {
    Admin,
    Client,
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::Admin => write!(f, "admin"),
            Actor::Client => write!(f, "client"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferAction {
    Send,
    SubmitSelection,
    Accept,
    Reject,
    StartDelivery,
    MarkDelivered,
    Cancel,
}

impl OfferAction {
    /// The only actor allowed to perform this action.
    #[must_use]
    pub fn actor(self) -> Actor {
        match self {
            OfferAction::SubmitSelection | OfferAction::Accept | OfferAction::Reject => {
                Actor::Client
            }
            OfferAction::Send
            | OfferAction::StartDelivery
            | OfferAction::MarkDelivered
            | OfferAction::Cancel => Actor::Admin,
        }
    }
}

impl fmt::Display for OfferAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OfferAction::Send => "send",
            OfferAction::SubmitSelection => "submit_selection",
            OfferAction::Accept => "accept",
            OfferAction::Reject => "reject",
            OfferAction::StartDelivery => "start_delivery",
            OfferAction::MarkDelivered => "mark_delivered",
            OfferAction::Cancel => "cancel",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("{actor} may not {action} an offer")]
    Forbidden { action: OfferAction, actor: Actor },

    #[error("cannot {action} an offer in status '{from}'")]
    NotAllowed {
        action: OfferAction,
        from: OfferStatus,
    },

    #[error("offer is already cancelled")]
    AlreadyCancelled,

    #[error("cannot {action}: {reason}")]
    GuardFailed {
        action: OfferAction,
        reason: &'static str,
    },

    #[error("part lines cannot be edited in status '{0}'")]
    PartsLocked(OfferStatus),
}

/// A status change that was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: OfferStatus,
    pub to: OfferStatus,
    pub action: OfferAction,
}

impl Transition {
    /// Accept and reject are announced to the counter-party.
    #[must_use]
    pub fn notifies_counterparty(&self) -> bool {
        matches!(self.action, OfferAction::Accept | OfferAction::Reject)
    }
}

/// Resolves the target status of `action` from `from`, checking the actor.
///
/// # Errors
///
/// - [`TransitionError::Forbidden`] when `actor` may not perform `action`.
/// - [`TransitionError::AlreadyCancelled`] when cancelling a cancelled offer.
/// - [`TransitionError::NotAllowed`] for any edge missing from the graph.
pub fn next_status(
    from: OfferStatus,
    action: OfferAction,
    actor: Actor,
) -> Result<OfferStatus, TransitionError> {
    if action.actor() != actor {
        return Err(TransitionError::Forbidden { action, actor });
    }

    let to = match (action, from) {
        (OfferAction::Send, OfferStatus::Draft) => OfferStatus::Sent,
        (OfferAction::SubmitSelection, s) if s.allows_selection() => {
            OfferStatus::AwaitingFinalization
        }
        (OfferAction::Accept, OfferStatus::AwaitingFinalization) => OfferStatus::Accepted,
        (OfferAction::Reject, OfferStatus::AwaitingFinalization) => OfferStatus::Rejected,
        (OfferAction::StartDelivery, OfferStatus::Accepted) => OfferStatus::DeliveryProcessing,
        (OfferAction::MarkDelivered, OfferStatus::DeliveryProcessing) => OfferStatus::Delivered,
        (OfferAction::Cancel, OfferStatus::Cancelled) => {
            return Err(TransitionError::AlreadyCancelled)
        }
        (OfferAction::Cancel, s) if !s.is_terminal() => OfferStatus::Cancelled,
        _ => return Err(TransitionError::NotAllowed { action, from }),
    };

    Ok(to)
}
