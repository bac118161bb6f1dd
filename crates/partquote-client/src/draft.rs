//! Local drafts of offers being composed.
//!
//! While an admin composes a new offer for an order, every change to the
//! line list is saved under `draft_offer_<orderId>`. Reopening the compose
//! form for the same order yields a [`ResumePrompt`] instead of a blank
//! form. Drafts never leave the machine; the offer only exists on the
//! server once [`ComposeSession::submit`] succeeds.

use chrono::{DateTime, Utc};
use partquote_core::{group_draft_lines, validate_draft_line, NewPartLine, PartLineDraft};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::client::OfferClient;
use crate::error::{ClientError, StoreError};
use crate::flow::SubmitFlag;
use crate::store::LocalStore;
use crate::types::OfferDocument;

pub const DRAFT_KEY_PREFIX: &str = "draft_offer_";

#[must_use]
pub fn draft_key(order_id: Uuid) -> String {
    format!("{DRAFT_KEY_PREFIX}{order_id}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposeDraft {
    pub order_id: Uuid,
    pub lines: Vec<PartLineDraft>,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct DraftStore {
    store: LocalStore,
}

impl DraftStore {
    #[must_use]
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    /// # Errors
    ///
    /// [`StoreError`] on I/O failure or an undecodable draft.
    pub async fn load(&self, order_id: Uuid) -> Result<Option<ComposeDraft>, StoreError> {
        self.store.get_json(&draft_key(order_id)).await
    }

    /// Saves `lines` for `order_id`; an empty list removes the draft.
    ///
    /// # Errors
    ///
    /// [`StoreError`] on I/O failure.
    pub async fn save(&self, order_id: Uuid, lines: &[PartLineDraft]) -> Result<(), StoreError> {
        if lines.is_empty() {
            return self.discard(order_id).await;
        }
        let draft = ComposeDraft {
            order_id,
            lines: lines.to_vec(),
            saved_at: Utc::now(),
        };
        self.store.set_json(&draft_key(order_id), &draft).await?;
        tracing::debug!(order_id = %order_id, lines = lines.len(), "compose draft saved");
        Ok(())
    }

    /// # Errors
    ///
    /// [`StoreError`] on I/O failure.
    pub async fn discard(&self, order_id: Uuid) -> Result<(), StoreError> {
        self.store.remove(&draft_key(order_id)).await
    }
}

/// Result of opening the compose form for an order.
#[derive(Debug)]
pub enum Opened {
    /// No saved draft; start from an empty line list.
    Fresh(ComposeSession),
    /// A saved draft exists; the user chooses to resume or discard it.
    ResumePrompt(ResumePrompt),
}

#[derive(Debug)]
pub struct ResumePrompt {
    drafts: DraftStore,
    draft: ComposeDraft,
}

impl ResumePrompt {
    #[must_use]
    pub fn draft(&self) -> &ComposeDraft {
        &self.draft
    }

    /// Continues with exactly the saved lines.
    #[must_use]
    pub fn resume(self) -> ComposeSession {
        ComposeSession {
            drafts: self.drafts,
            order_id: self.draft.order_id,
            lines: self.draft.lines,
            submitting: SubmitFlag::default(),
        }
    }

    /// Drops the saved draft and starts empty.
    ///
    /// # Errors
    ///
    /// [`StoreError`] if the draft cannot be removed.
    pub async fn discard(self) -> Result<ComposeSession, StoreError> {
        self.drafts.discard(self.draft.order_id).await?;
        Ok(ComposeSession::empty(self.drafts, self.draft.order_id))
    }
}

/// Line list of an offer being composed; every change is saved.
#[derive(Debug)]
pub struct ComposeSession {
    drafts: DraftStore,
    order_id: Uuid,
    lines: Vec<PartLineDraft>,
    submitting: SubmitFlag,
}

impl ComposeSession {
    fn empty(drafts: DraftStore, order_id: Uuid) -> Self {
        Self {
            drafts,
            order_id,
            lines: Vec::new(),
            submitting: SubmitFlag::default(),
        }
    }

    /// Opens the compose form for `order_id`.
    ///
    /// # Errors
    ///
    /// [`StoreError`] if a stored draft cannot be read.
    pub async fn open(drafts: DraftStore, order_id: Uuid) -> Result<Opened, StoreError> {
        match drafts.load(order_id).await? {
            Some(draft) if !draft.lines.is_empty() => {
                Ok(Opened::ResumePrompt(ResumePrompt { drafts, draft }))
            }
            _ => Ok(Opened::Fresh(Self::empty(drafts, order_id))),
        }
    }

    #[must_use]
    pub fn order_id(&self) -> Uuid {
        self.order_id
    }

    #[must_use]
    pub fn lines(&self) -> &[PartLineDraft] {
        &self.lines
    }

    #[must_use]
    pub fn submit_flag(&self) -> SubmitFlag {
        self.submitting.clone()
    }

    /// Validates and appends a copy of `line`. On a validation error the
    /// caller keeps `line` as typed and nothing is saved.
    ///
    /// # Errors
    ///
    /// [`ClientError::Validation`] for the first invalid field,
    /// [`ClientError::Store`] if the draft cannot be saved.
    pub async fn add_line(&mut self, line: &PartLineDraft) -> Result<(), ClientError> {
        validate_draft_line(line)?;
        self.lines.push(line.clone());
        self.save().await
    }

    /// Replaces the line at `index` after validating it.
    ///
    /// # Errors
    ///
    /// As [`ComposeSession::add_line`], plus
    /// [`ClientError::LineIndexOutOfRange`] when no line sits at `index`.
    pub async fn update_line(
        &mut self,
        index: usize,
        line: &PartLineDraft,
    ) -> Result<(), ClientError> {
        validate_draft_line(line)?;
        let len = self.lines.len();
        let Some(slot) = self.lines.get_mut(index) else {
            return Err(ClientError::LineIndexOutOfRange { index, len });
        };
        *slot = line.clone();
        self.save().await
    }

    /// Removes and returns the line at `index`.
    ///
    /// # Errors
    ///
    /// [`ClientError::Store`] if the draft cannot be saved.
    pub async fn remove_line(&mut self, index: usize) -> Result<Option<PartLineDraft>, ClientError> {
        if index >= self.lines.len() {
            return Ok(None);
        }
        let removed = self.lines.remove(index);
        self.save().await?;
        Ok(Some(removed))
    }

    /// Lines grouped into part lines, as they will be submitted.
    #[must_use]
    pub fn part_lines(&self) -> Vec<NewPartLine> {
        group_draft_lines(&self.lines)
    }

    /// Creates the offer on the server and drops the local draft.
    ///
    /// # Errors
    ///
    /// [`ClientError::SubmitInProgress`] while another submit runs, API
    /// errors otherwise. The draft is kept when the create call fails.
    pub async fn submit(&self, client: &OfferClient) -> Result<OfferDocument, ClientError> {
        let _guard = self.submitting.try_begin()?;
        let offer = client
            .create_offer(self.order_id, &self.part_lines())
            .await?;
        self.drafts.discard(self.order_id).await?;
        tracing::info!(
            offer_id = %offer.id,
            order_id = %self.order_id,
            "offer created from compose draft"
        );
        Ok(offer)
    }

    async fn save(&self) -> Result<(), ClientError> {
        self.drafts.save(self.order_id, &self.lines).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "draft_test.rs"]
mod tests;
