//! Network Module
//!
//! Wire formats and transports for talking to the receiver.
//!
//! # Modules
//!
//! - [`control_message`]: Encoding, decoding and response classification of control messages.
//! - [`tcp`]: The TCP control transport and the request/response control client built on it.
//! - [`udp`]: The UDP data transport delivering IQ datagrams.

pub mod control_message;
pub mod tcp;
pub mod udp;
