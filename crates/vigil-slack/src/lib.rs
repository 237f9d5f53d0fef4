// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Slack gateway for the Vigil channel monitor.
//!
//! [`SlackClient`] implements the outbound collaborator traits (alert
//! posting, permalinks, identity lookup, history) over the Web API.
//! [`SlackListener`] receives channel messages over Socket Mode and turns
//! them into [`vigil_core::GatewayEvent`]s.

pub mod client;
pub mod events;
mod retry;
pub mod socket;
mod types;

pub use client::SlackClient;
pub use events::{SocketAction, SocketEnvelope, normalize_message_event};
pub use socket::SlackListener;
pub use types::AuthTestResponse;
