//! Commands issued by the display layer.

pub mod claims;
pub mod fees;

pub use claims::{can_claim, claim_all, claim_one, wallet_label};
pub use fees::{fetch_fees, fetch_status, list_fees, list_notifications};
