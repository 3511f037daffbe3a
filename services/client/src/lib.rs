// chat-client: the reliable chat client (C5). See SPEC_FULL.md §4.5.

pub mod cli;
mod client;

pub use client::{ChatClient, ConnectionLost, InboundMessage};
