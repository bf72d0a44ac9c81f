//! Live poll voting: a vote tally engine with per-poll live result fan-out.
//!
//! Votes flow through [`tally::TallyEngine`], which reconciles each voter's
//! record in the [`store::VoteLedger`], adjusts the [`store::ScoreStore`] and
//! publishes the new score on the [`bus::FanoutBus`]. Fresh viewers read a
//! [`snapshot::SnapshotReader`] result and then follow the bus.

pub mod backend;
pub mod bus;
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod models;
pub mod snapshot;
pub mod store;
pub mod tally;

pub use error::{StoreError, TallyError};
