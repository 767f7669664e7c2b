//! In-memory `ComputeSession` that answers from a script and records calls.

use std::collections::HashMap;

use rforecast_core::{Error, Result};
use tracing::debug;

use crate::session::ComputeSession;
use crate::value::RValue;

/// One call made against a `ScriptedSession`.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCall {
    Evaluate(String),
    CreateFile(String),
    /// Number of bytes written.
    WriteFile(usize),
    CloseFile,
    RemoveFile(String),
}

enum Reply {
    Value(RValue),
    Error(String),
}

/// Session whose evaluate replies are chosen by expression prefix.
///
/// The first rule whose prefix matches wins; unmatched expressions evaluate
/// to `NULL`. Files live in a map so uploads can be inspected, and removing
/// a file that does not exist fails the way a real server does.
#[derive(Default)]
pub struct ScriptedSession {
    rules: Vec<(String, Reply)>,
    calls: Vec<SessionCall>,
    files: HashMap<String, Vec<u8>>,
    open_file: Option<String>,
    fail_create: Option<String>,
    fail_write: Option<String>,
    fail_close: Option<String>,
    fail_remove: Option<String>,
}

impl ScriptedSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer expressions starting with `prefix` with `value`.
    pub fn on_eval(mut self, prefix: &str, value: RValue) -> Self {
        self.rules.push((prefix.to_string(), Reply::Value(value)));
        self
    }

    /// Fail expressions starting with `prefix` with an evaluation error.
    pub fn fail_eval(mut self, prefix: &str, message: &str) -> Self {
        self.rules.push((prefix.to_string(), Reply::Error(message.to_string())));
        self
    }

    pub fn fail_create(mut self, message: &str) -> Self {
        self.fail_create = Some(message.to_string());
        self
    }

    pub fn fail_write(mut self, message: &str) -> Self {
        self.fail_write = Some(message.to_string());
        self
    }

    pub fn fail_close(mut self, message: &str) -> Self {
        self.fail_close = Some(message.to_string());
        self
    }

    pub fn fail_remove(mut self, message: &str) -> Self {
        self.fail_remove = Some(message.to_string());
        self
    }

    /// Every call, in order.
    pub fn calls(&self) -> &[SessionCall] {
        &self.calls
    }

    /// Evaluated expressions, in order.
    pub fn evaluations(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                SessionCall::Evaluate(e) => Some(e.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Names passed to `create_file`, in order.
    pub fn created_files(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                SessionCall::CreateFile(n) => Some(n.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Names passed to `remove_file`, in order (including failed removals).
    pub fn removed_files(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                SessionCall::RemoveFile(n) => Some(n.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Contents of a file still present in the session.
    pub fn file(&self, name: &str) -> Option<&[u8]> {
        self.files.get(name).map(|v| v.as_slice())
    }

    /// Number of files still present in the session.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

impl ComputeSession for ScriptedSession {
    async fn evaluate(&mut self, expression: &str) -> Result<RValue> {
        self.calls.push(SessionCall::Evaluate(expression.to_string()));
        debug!("scripted eval: {}", expression);

        let reply = self
            .rules
            .iter()
            .find(|(prefix, _)| expression.starts_with(prefix.as_str()))
            .map(|(_, reply)| reply);

        match reply {
            Some(Reply::Value(v)) => Ok(v.clone()),
            Some(Reply::Error(msg)) => Err(Error::Eval(msg.clone())),
            None => Ok(RValue::Null),
        }
    }

    async fn create_file(&mut self, name: &str) -> Result<()> {
        self.calls.push(SessionCall::CreateFile(name.to_string()));
        if let Some(msg) = &self.fail_create {
            return Err(Error::Transport(msg.clone()));
        }
        self.files.insert(name.to_string(), Vec::new());
        self.open_file = Some(name.to_string());
        Ok(())
    }

    async fn write_file(&mut self, data: &[u8]) -> Result<()> {
        self.calls.push(SessionCall::WriteFile(data.len()));
        if let Some(msg) = &self.fail_write {
            return Err(Error::Transport(msg.clone()));
        }
        let name = self
            .open_file
            .as_ref()
            .ok_or_else(|| Error::Transport("no open file".into()))?;
        if let Some(contents) = self.files.get_mut(name) {
            contents.extend_from_slice(data);
        }
        Ok(())
    }

    async fn close_file(&mut self) -> Result<()> {
        self.calls.push(SessionCall::CloseFile);
        if let Some(msg) = &self.fail_close {
            return Err(Error::Transport(msg.clone()));
        }
        self.open_file
            .take()
            .map(|_| ())
            .ok_or_else(|| Error::Transport("no open file".into()))
    }

    async fn remove_file(&mut self, name: &str) -> Result<()> {
        self.calls.push(SessionCall::RemoveFile(name.to_string()));
        if let Some(msg) = &self.fail_remove {
            return Err(Error::Transport(msg.clone()));
        }
        self.files
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::Transport(format!("no such file: {}", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_prefix_rules() {
        let mut session = ScriptedSession::new()
            .on_eval("require(", RValue::Logical(vec![Some(true)]))
            .fail_eval("stop(", "boom");

        let v = session.evaluate("require('forecast')").await.unwrap();
        assert_eq!(v, RValue::Logical(vec![Some(true)]));

        let err = session.evaluate("stop('x')").await.unwrap_err();
        assert!(matches!(err, Error::Eval(ref m) if m == "boom"));

        assert_eq!(session.evaluate("1 + 1").await.unwrap(), RValue::Null);
        assert_eq!(session.evaluations().len(), 3);
    }

    #[tokio::test]
    async fn test_file_lifecycle() {
        let mut session = ScriptedSession::new();
        session.create_file("a.data").await.unwrap();
        session.write_file(b"1\n2\n").await.unwrap();
        session.write_file(b"3\n").await.unwrap();
        session.close_file().await.unwrap();

        assert_eq!(session.file("a.data"), Some(&b"1\n2\n3\n"[..]));
        assert!(session.close_file().await.is_err());

        session.remove_file("a.data").await.unwrap();
        assert_eq!(session.file_count(), 0);
        assert!(session.remove_file("a.data").await.is_err());
        assert_eq!(session.removed_files(), vec!["a.data", "a.data"]);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let mut session = ScriptedSession::new().fail_create("disk full");
        assert!(session.create_file("x.data").await.is_err());
        assert_eq!(session.file_count(), 0);

        let mut session = ScriptedSession::new().fail_close("reset");
        session.create_file("z.data").await.unwrap();
        assert!(session.close_file().await.is_err());
        assert_eq!(session.file_count(), 1);

        let mut session = ScriptedSession::new().fail_remove("gone");
        session.create_file("y.data").await.unwrap();
        session.close_file().await.unwrap();
        assert!(session.remove_file("y.data").await.is_err());
        assert_eq!(session.file_count(), 1);
    }
}
