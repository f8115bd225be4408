//! Lattice Bridge - cross-chain bridge operation orchestrator
//!
//! Coordinates multi-step cross-chain asset transfers: a user locks or burns
//! an asset on one chain and, once chain-confirmed, the corresponding mint or
//! unlock is triggered on the other chain. The orchestration core drives a
//! fixed per-direction action pipeline against the [`adapter::ChainAdapter`]
//! interface.

pub mod adapter;
pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod store;
