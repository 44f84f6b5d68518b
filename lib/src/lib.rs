//! Control and streaming client for NetSDR style receivers.
//!
//! The TCP control channel sets receiver state and frequency; the UDP data
//! channel delivers IQ datagrams that are streamed to a sink.

pub mod client;
pub mod errors;
pub mod handler;
pub mod network;
pub mod sinks;

#[cfg(test)]
pub mod test_utils;
