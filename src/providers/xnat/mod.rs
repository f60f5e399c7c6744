mod client;
mod detector;
mod sessions;
mod types;

pub use client::XnatClient;
pub use sessions::MR_SESSION_TYPE;
pub use types::{DateRange, MismatchedScan, SessionTable, Verdict};
