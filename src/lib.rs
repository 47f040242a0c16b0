//! Genius Loci gateway - ambient audio session coordination.
//!
//! Companion observers (one per browser tab running the game) connect over
//! WebSocket and report where the player is. The gateway resolves each
//! report against a packaged mapping, drives the audio player and keeps all
//! observers and the status surface in sync.
//!
//! Flow: `api` parses frames into events, the `dispatch` actor applies them
//! to the `session` in arrival order, the session consults `mapping` and
//! `resolver` and pushes updates back out through the `registry`.

pub mod api;
pub mod dispatch;
pub mod mapping;
pub mod player;
pub mod protocol;
pub mod registry;
pub mod resolver;
pub mod resources;
pub mod session;
pub mod status;

#[cfg(test)]
pub(crate) mod testutil;
