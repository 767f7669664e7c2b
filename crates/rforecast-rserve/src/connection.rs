//! Rserve connection — handshake, login, and the `ComputeSession` commands.

use std::time::Duration;

use rforecast_core::{Error, ForecastConfig, Result};
use rforecast_session::{ComputeSession, RValue};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::protocol::*;
use crate::sexp;

/// Largest slice sent in a single `writeFile` command.
const WRITE_CHUNK: usize = 1 << 20;

/// Authentication the server asked for in its greeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRequirement {
    None,
    /// `ARpt`: user and password sent as plain text.
    PlainText,
    /// `ARuc`: unix crypt with a server salt.
    Crypt,
}

/// What the server announced in its 32-byte greeting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    /// Rserve protocol revision, e.g. `0103`.
    pub version: String,
    pub auth: AuthRequirement,
}

impl ServerInfo {
    /// Parse `Rsrv<version>QAP1\r\n\r\n` followed by four attribute slots.
    pub fn parse(greeting: &[u8; GREETING_LEN]) -> Result<Self> {
        if &greeting[0..4] != b"Rsrv" {
            return Err(Error::Protocol("server did not identify as Rserve".into()));
        }
        if &greeting[8..12] != b"QAP1" {
            return Err(Error::Protocol(format!(
                "unsupported protocol '{}'",
                String::from_utf8_lossy(&greeting[8..12])
            )));
        }
        let version = String::from_utf8_lossy(&greeting[4..8]).into_owned();

        let mut plain = false;
        let mut crypt = false;
        for attr in greeting[16..].chunks_exact(4) {
            match attr {
                b"ARpt" => plain = true,
                b"ARuc" => crypt = true,
                _ => {}
            }
        }
        let auth = if plain {
            AuthRequirement::PlainText
        } else if crypt {
            AuthRequirement::Crypt
        } else {
            AuthRequirement::None
        };

        Ok(Self { version, auth })
    }
}

/// A live connection to an Rserve instance.
pub struct RserveConnection {
    stream: TcpStream,
    info: ServerInfo,
}

impl RserveConnection {
    /// Connect using the endpoint, timeout and credentials from `config`.
    pub async fn open(config: &ForecastConfig) -> Result<Self> {
        Self::connect(
            &config.addr(),
            Duration::from_secs(config.connect_timeout_secs),
            config.credentials(),
        )
        .await
    }

    /// Connect, read the greeting, and log in when the server requires it.
    pub async fn connect(
        addr: &str,
        timeout: Duration,
        credentials: Option<(&str, &str)>,
    ) -> Result<Self> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::Transport(format!("connecting to {} timed out", addr)))?
            .map_err(|e| Error::Transport(format!("cannot connect to {}: {}", addr, e)))?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!("set_nodelay failed: {}", e);
        }

        let mut conn = Self {
            stream,
            info: ServerInfo {
                version: String::new(),
                auth: AuthRequirement::None,
            },
        };

        let mut greeting = [0u8; GREETING_LEN];
        conn.read_exact(&mut greeting).await?;
        conn.info = ServerInfo::parse(&greeting)?;
        info!(
            "Connected to Rserve at {} (protocol {}, auth {:?})",
            addr, conn.info.version, conn.info.auth
        );

        match (conn.info.auth, credentials) {
            (AuthRequirement::None, _) => {}
            (AuthRequirement::PlainText, Some((user, password))) => {
                conn.login(user, password).await?;
            }
            (AuthRequirement::PlainText, None) => {
                return Err(Error::Auth(
                    "server requires a login but no credentials were configured".into(),
                ));
            }
            (AuthRequirement::Crypt, _) => {
                return Err(Error::Auth(
                    "server only offers unix-crypt login, which is not supported".into(),
                ));
            }
        }

        Ok(conn)
    }

    pub fn server_info(&self) -> &ServerInfo {
        &self.info
    }

    /// Close the socket.
    pub async fn close(mut self) -> Result<()> {
        self.stream
            .shutdown()
            .await
            .map_err(|e| Error::Transport(format!("closing connection: {}", e)))
    }

    async fn login(&mut self, user: &str, password: &str) -> Result<()> {
        let payload = encode_string_param(&format!("{}\n{}", user, password));
        self.request(CMD_LOGIN, &payload).await?;
        debug!("Logged in as {}", user);
        Ok(())
    }

    async fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.stream
            .read_exact(buf)
            .await
            .map(|_| ())
            .map_err(|e| Error::Transport(format!("connection lost while reading: {}", e)))
    }

    /// Send one command and wait for its response payload.
    async fn request(&mut self, command: i32, payload: &[u8]) -> Result<Vec<u8>> {
        let message = encode_message(command, payload);
        self.stream
            .write_all(&message)
            .await
            .map_err(|e| Error::Transport(format!("connection lost while writing: {}", e)))?;

        let mut raw = [0u8; HEADER_LEN];
        self.read_exact(&mut raw).await?;
        let header = Header::decode(&raw);

        if header.length > MAX_RESPONSE_LEN {
            return Err(Error::Protocol(format!(
                "response of {} bytes exceeds limit of {}",
                header.length, MAX_RESPONSE_LEN
            )));
        }
        let len = usize::try_from(header.length)
            .map_err(|_| Error::Protocol(format!("response of {} bytes", header.length)))?;
        let mut body = vec![0u8; len];
        self.read_exact(&mut body).await?;

        if header.is_ok() {
            Ok(body)
        } else if header.is_error() {
            Err(status_error(command, header.status()))
        } else {
            Err(Error::Protocol(format!(
                "unexpected response code {:#x}",
                header.command
            )))
        }
    }

    async fn eval_raw(&mut self, expression: &str) -> Result<RValue> {
        let body = self
            .request(CMD_EVAL, &encode_string_param(expression))
            .await?;
        let (kind, sexp_body, _) = split_param(&body)?;
        if kind != DT_SEXP {
            return Err(Error::Protocol(format!(
                "eval returned parameter type {} instead of an expression",
                kind
            )));
        }
        sexp::decode(sexp_body)
    }
}

fn status_error(command: i32, status: u8) -> Error {
    let text = describe_status(status);
    match status {
        ERR_AUTH_FAILED => Error::Auth(text.into()),
        1..=5 | ERR_R_ERROR | ERR_EVAL_FAILED if command == CMD_EVAL => {
            Error::Eval(format!("{} (status {})", text, status))
        }
        _ => Error::Transport(format!("{} (status {:#x})", text, status)),
    }
}

impl ComputeSession for RserveConnection {
    async fn evaluate(&mut self, expression: &str) -> Result<RValue> {
        debug!("eval: {}", expression);
        match self.eval_raw(expression).await {
            Err(Error::Eval(msg)) => {
                // the server only sends a status code; R keeps the message
                let detail = self
                    .eval_raw("geterrmessage()")
                    .await
                    .ok()
                    .and_then(|v| v.as_string().ok())
                    .map(|m| m.trim().to_string())
                    .filter(|m| !m.is_empty());
                let msg = match detail {
                    Some(detail) => format!("{}: {}", msg, detail),
                    None => msg,
                };
                warn!("Evaluation of `{}` failed: {}", expression, msg);
                Err(Error::Eval(msg))
            }
            other => other,
        }
    }

    async fn create_file(&mut self, name: &str) -> Result<()> {
        self.request(CMD_CREATE_FILE, &encode_string_param(name))
            .await?;
        debug!("Created remote file {}", name);
        Ok(())
    }

    async fn write_file(&mut self, data: &[u8]) -> Result<()> {
        for chunk in data.chunks(WRITE_CHUNK) {
            self.request(CMD_WRITE_FILE, &encode_bytes_param(chunk))
                .await?;
        }
        Ok(())
    }

    async fn close_file(&mut self) -> Result<()> {
        self.request(CMD_CLOSE_FILE, &[]).await?;
        Ok(())
    }

    async fn remove_file(&mut self, name: &str) -> Result<()> {
        self.request(CMD_REMOVE_FILE, &encode_string_param(name))
            .await?;
        debug!("Removed remote file {}", name);
        Ok(())
    }
}
