//! A session-multiplexing proxy for Minecraft protocol 340 ("1.12.2").
//!
//! The proxy keeps a persistent session open against an upstream
//! server for each configured profile, mirroring the full world state
//! it receives. Queue position and in-world state therefore survive
//! client restarts: when a game client attaches, the proxy replays a
//! synthetic world join built from the mirror and then pipes traffic
//! in both directions, rewriting the entity ids that differ between
//! the synthetic and real sessions.
//!
//! # Structure
//! - [`protocol`] — wire codec and typed packets for revision 340.
//! - [`net`] — packet IO over TCP.
//! - [`world`] — the state mirror fed by upstream packets.
//! - [`replay`] — synthesises the join sequence from a mirror.
//! - [`bridge`] — the per-packet rewrite filters for attached clients.
//! - [`session`] — upstream session tasks and their manager.
//! - [`listener`] — the downstream protocol server.

pub mod auth;
pub mod bridge;
pub mod config;
pub mod dump;
pub mod listener;
pub mod net;
pub mod position;
pub mod profile;
pub mod protocol;
pub mod replay;
pub mod session;
pub mod world;
