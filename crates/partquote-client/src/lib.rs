//! API client for the offer service.
//!
//! Used by front-ends and the CLI. Carries the session explicitly, retries
//! transient failures, and keeps client-local state (tokens, compose
//! drafts) in a file-backed [`LocalStore`].

pub mod client;
pub mod draft;
pub mod error;
pub mod flow;
pub(crate) mod retry;
pub mod session;
pub mod store;
pub mod types;

pub use client::OfferClient;
pub use draft::{draft_key, ComposeDraft, ComposeSession, DraftStore, Opened, ResumePrompt};
pub use error::{ClientError, StoreError};
pub use flow::{Decision, SelectionFlow, SubmitFlag, SubmitGuard};
pub use retry::RetryPolicy;
pub use session::{force_logout, Session, TokenRefresher};
pub use store::LocalStore;
pub use types::{OfferDocument, OfferPage, OfferQuery, OrderRef, OrderSummary};
