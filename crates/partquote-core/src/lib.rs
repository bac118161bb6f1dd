pub mod app_config;
pub mod config;
pub mod lines;
pub mod offer;
pub mod pricing;
pub mod selection;
pub mod status;

use thiserror::Error;

pub use app_config::{AppConfig, ClientConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env, load_client_config};
pub use lines::{
    group_draft_lines, validate_draft_line, LineField, LineValidationError, NewPartLine,
    NewPartOption, PartLineDraft,
};
pub use offer::{
    Address, AddressError, DeliveryChoice, Offer, OfferError, OfferPart, PartOption, SelectedPart,
    SelectionRequest, SelectionSubmission,
};
pub use pricing::{
    checked_sum, has_bani_precision, line_total, Totals, VatRate, MAX_AMOUNT, MAX_UNIT_PRICE,
};
pub use selection::{Candidate, PartTypeGroup, SelectionBoard, SelectionEntry, SelectionError};
pub use status::{next_status, Actor, OfferAction, OfferStatus, Transition, TransitionError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
