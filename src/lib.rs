//Might re-enable clippy::restriction later.
#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::cast_possible_truncation,
    clippy::doc_markdown,
    clippy::module_name_repetitions
)]
//! Bluetooth Mesh provisioner and message transport engine.
//!
//! Layers (leaves first):
//! - `crypto`: k1-k4, s1, AES-CMAC, AES-CCM, ECDH
//! - `net`, `lower`, `upper`, `access`: the Mesh transport layers
//! - `provisioning`: the provisioning handshake
//! - `stack`: per node message dispatching on top of the layers
//!
//! Bytes go out through an [`interface::OutboundTransport`] and events come back through an
//! [`interface::EventSink`].
#[macro_use]
extern crate slog;

pub mod access;
pub mod address;
pub mod bytes;
pub mod config;
pub mod control;
pub mod crypto;
pub mod interface;
pub mod lower;
pub mod mesh;
pub mod models;
pub mod net;
pub mod provisioning;
pub mod proxy;
pub mod random;
pub mod reassembler;
pub mod segmenter;
pub mod stack;
pub mod upper;

/// `Logger` that drops everything. Used when the caller doesn't pass one in.
#[must_use]
pub fn discard_logger() -> slog::Logger {
    slog::Logger::root(slog::Discard, o!())
}
