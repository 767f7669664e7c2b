//! The capability surface a forecast run needs from a remote R session.

use rforecast_core::Result;

use crate::value::RValue;

/// A live, caller-owned channel to a remote numeric engine.
///
/// Calls are strictly request/response: each one completes before the next
/// is issued, which the `&mut self` receivers enforce.
///
/// File transfer is a three-step sink: `create_file`, any number of
/// `write_file` calls, then `close_file`, which flushes. Only one remote
/// file is open at a time.
#[allow(async_fn_in_trait)]
pub trait ComputeSession {
    /// Evaluate an expression and return its value.
    async fn evaluate(&mut self, expression: &str) -> Result<RValue>;

    /// Create (or truncate) a file in the session's working directory and
    /// make it the open write target.
    async fn create_file(&mut self, name: &str) -> Result<()>;

    /// Append bytes to the open file.
    async fn write_file(&mut self, data: &[u8]) -> Result<()>;

    /// Flush and close the open file.
    async fn close_file(&mut self) -> Result<()>;

    /// Delete a file from the session's working directory.
    async fn remove_file(&mut self, name: &str) -> Result<()>;
}
