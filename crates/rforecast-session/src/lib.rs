//! Remote compute session abstraction.
//!
//! The `ComputeSession` trait is the narrow capability surface the forecast
//! pipeline needs from a remote R process: evaluate an expression, stream a
//! file into the session's working directory, and remove it again.
//! `RserveConnection` (in `rforecast-rserve`) is the production
//! implementation; `ScriptedSession` is an in-memory stand-in that records
//! every call.

pub mod handle;
pub mod scripted;
pub mod session;
pub mod value;

pub use handle::RemoteFileHandle;
pub use scripted::{ScriptedSession, SessionCall};
pub use session::ComputeSession;
pub use value::RValue;
