//! RPC messages and newline-delimited JSON framing.
//!
//! A request frame names the method and carries its parameters:
//! `{"method":"CreateUser","params":{"username":"bob123"}}`. The reply frame is the
//! method's reply object. Errors travel in the reply's `error` field, never as a
//! broken connection.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::domain::{Error, ErrorBody, User};

/// Largest accepted frame, newline included.
pub const MAX_FRAME_BYTES: u64 = 64 * 1024;

pub const FIND_USER_BY_ID: &str = "FindUserByID";
pub const CREATE_USER: &str = "CreateUser";

/// An RPC call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum RpcRequest {
    #[serde(rename = "FindUserByID")]
    FindUserById(FindUserByIdRequest),
    CreateUser(CreateUserRequest),
}

impl RpcRequest {
    pub fn method(&self) -> &'static str {
        match self {
            RpcRequest::FindUserById(_) => FIND_USER_BY_ID,
            RpcRequest::CreateUser(_) => CREATE_USER,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindUserByIdRequest {
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindUserByIdReply {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl FindUserByIdReply {
    pub fn from_result(result: Result<User, ErrorBody>) -> Self {
        match result {
            Ok(user) => Self {
                id: user.id,
                username: user.username,
                error: None,
            },
            Err(error) => Self::failed(error),
        }
    }

    pub fn failed(error: ErrorBody) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn into_result(self) -> Result<User, Error> {
        match self.error {
            Some(body) => Err(body.into()),
            None => Ok(User {
                id: self.id,
                username: self.username,
            }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateUserReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl CreateUserReply {
    pub fn created(id: String) -> Self {
        Self {
            id: Some(id),
            error: None,
        }
    }

    pub fn failed(error: ErrorBody) -> Self {
        Self {
            id: None,
            error: Some(error),
        }
    }

    /// The assigned id. A success reply without one is treated as a malformed reply.
    pub fn into_result(self) -> Result<String, Error> {
        match (self.error, self.id) {
            (Some(body), _) => Err(body.into()),
            (None, Some(id)) => Ok(id),
            (None, None) => Err(Error::internal().with_cause("CreateUser reply has no id")),
        }
    }
}

/// Reply for a frame that could not be decoded or was rejected before dispatch.
///
/// Serializes as `{"error": {...}}`, which both reply types accept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub error: ErrorBody,
}

/// Framing failures.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("connection closed")]
    Closed,
    #[error("frame exceeds maximum size")]
    TooLarge,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid frame: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read one raw frame without its trailing newline.
///
/// Returns `Ok(None)` on a clean end of stream between frames.
pub async fn read_line<R>(reader: &mut R) -> Result<Option<String>, FrameError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let n = (&mut *reader)
        .take(MAX_FRAME_BYTES + 1)
        .read_line(&mut line)
        .await?;
    if n == 0 {
        return Ok(None);
    }
    if !line.ends_with('\n') {
        if n as u64 > MAX_FRAME_BYTES {
            return Err(FrameError::TooLarge);
        }
        return Err(FrameError::Closed);
    }
    line.pop();
    if line.ends_with('\r') {
        line.pop();
    }
    Ok(Some(line))
}

/// Read and decode one frame. End of stream is [`FrameError::Closed`].
pub async fn read_frame<R, T>(reader: &mut R) -> Result<T, FrameError>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    let line = read_line(reader).await?.ok_or(FrameError::Closed)?;
    Ok(serde_json::from_str(&line)?)
}

/// Encode and write one frame.
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut frame = serde_json::to_vec(message)?;
    frame.push(b'\n');
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}
