//! Client-side selection flow: pick one option per part type, adjust
//! quantities, then submit the selection and the decision in one go.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use partquote_core::{
    Address, DeliveryChoice, SelectionBoard, SelectionRequest, Totals, VatRate,
};

use crate::client::OfferClient;
use crate::error::ClientError;
use crate::types::OfferDocument;

/// Advisory "submitting" flag shared between a form and its submit action.
///
/// Only one [`SubmitGuard`] can exist at a time; dropping it clears the
/// flag, including when the submit fails.
#[derive(Debug, Clone, Default)]
pub struct SubmitFlag(Arc<AtomicBool>);

impl SubmitFlag {
    /// # Errors
    ///
    /// [`ClientError::SubmitInProgress`] while another guard is alive.
    pub fn try_begin(&self) -> Result<SubmitGuard, ClientError> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ClientError::SubmitInProgress)?;
        Ok(SubmitGuard(Arc::clone(&self.0)))
    }

    #[must_use]
    pub fn is_submitting(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
pub struct SubmitGuard(Arc<AtomicBool>);

impl Drop for SubmitGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Reject,
}

#[derive(Debug)]
pub struct SelectionFlow {
    offer: OfferDocument,
    board: SelectionBoard,
    vat_rate: VatRate,
    submitting: SubmitFlag,
}

impl SelectionFlow {
    /// Starts from the offer's current selection, if it has one.
    #[must_use]
    pub fn new(offer: OfferDocument, vat_rate: VatRate) -> Self {
        let board = SelectionBoard::from_offer(&offer.to_offer());
        Self {
            offer,
            board,
            vat_rate,
            submitting: SubmitFlag::default(),
        }
    }

    #[must_use]
    pub fn offer(&self) -> &OfferDocument {
        &self.offer
    }

    #[must_use]
    pub fn board(&self) -> &SelectionBoard {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut SelectionBoard {
        &mut self.board
    }

    #[must_use]
    pub fn totals(&self) -> Totals {
        self.board.totals(self.vat_rate)
    }

    #[must_use]
    pub fn submit_flag(&self) -> SubmitFlag {
        self.submitting.clone()
    }

    /// Whether the finalize control should be enabled.
    #[must_use]
    pub fn can_finalize(&self) -> bool {
        self.board.has_selection() && !self.submitting.is_submitting()
    }

    /// Sends the selection with its addresses, then accepts or rejects.
    ///
    /// Nothing is sent when the selection is empty or an address is
    /// incomplete. If the decision call fails after the selection was
    /// stored, calling `finalize` again resubmits and retries it.
    ///
    /// # Errors
    ///
    /// [`ClientError::SubmitInProgress`] while another finalize runs,
    /// [`ClientError::Selection`] for local validation, API errors otherwise.
    pub async fn finalize(
        &self,
        client: &OfferClient,
        billing_address: Address,
        delivery: DeliveryChoice,
        decision: Decision,
    ) -> Result<OfferDocument, ClientError> {
        let _guard = self.submitting.try_begin()?;
        let submission = self.board.finalize(billing_address, delivery)?;
        let request = SelectionRequest::from(submission);

        let id = self.offer.id;
        let updated = client.submit_selection(id, &request).await?;
        tracing::info!(
            offer_id = %id,
            net = %updated.total,
            lines = updated.selected_parts.len(),
            "selection submitted"
        );

        match decision {
            Decision::Accept => client.accept_offer(id).await,
            Decision::Reject => client.reject_offer(id).await,
        }
    }
}

#[cfg(test)]
#[path = "flow_test.rs"]
mod tests;
