//! C1 — upstream API client and its raw payload types.

pub mod client;
pub mod types;

pub use client::UpstreamClient;
pub use types::{RawEntrant, RawMeeting, RawMoneyTrackerPoint, RawOdds, RawRaceData, RawRaceSummary};
