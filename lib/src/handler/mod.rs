//! Handler
//! -------
//!
//! Long-running tasks that move data from a transport into a sink.

pub mod capture;
