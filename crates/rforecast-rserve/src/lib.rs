//! Rserve transport — QAP1 framing over TCP.
//!
//! `RserveConnection` speaks just enough of the Rserve protocol to back a
//! `ComputeSession`: evaluate, create/write/close a file, remove a file.
//! Returned R objects are decoded into `RValue`; attributes are dropped.

pub mod connection;
pub mod protocol;
pub mod sexp;

pub use connection::{AuthRequirement, RserveConnection, ServerInfo};
