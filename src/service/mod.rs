pub mod client;
pub mod protocol;

pub use client::{HttpVerificationClient, VerificationClient};
pub use protocol::{MatchStatus, MatchedEmployee, VerificationResult, VerifyResponse};
