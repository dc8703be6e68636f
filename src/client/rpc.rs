//! RPC transport for the client.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::io::BufReader;
use tokio::net::TcpStream;

use crate::domain::{BoxError, Error, User};
use crate::resilience::timeouts::bounded;
use crate::transport::rpc::{
    read_frame, write_frame, CreateUserReply, CreateUserRequest, FindUserByIdReply,
    FindUserByIdRequest, RpcRequest,
};

use super::Transport;

/// Talks to the RPC server, one connection per call.
#[derive(Debug, Clone)]
pub struct RpcTransport {
    address: String,
    timeout: Duration,
}

impl RpcTransport {
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }

    async fn round_trip<T: DeserializeOwned>(&self, request: RpcRequest) -> Result<T, Error> {
        let method = request.method();
        let exchange = async {
            let stream = TcpStream::connect(&self.address).await?;
            let (reader, mut writer) = stream.into_split();
            write_frame(&mut writer, &request).await?;
            let reply = read_frame(&mut BufReader::new(reader)).await?;
            Ok::<T, BoxError>(reply)
        };

        bounded(self.timeout, exchange).await.map_err(|e| {
            tracing::debug!(method, address = %self.address, error = %e, "RPC round trip failed");
            Error::internal().with_cause(e)
        })
    }
}

#[async_trait]
impl Transport for RpcTransport {
    async fn find_user_by_id(&self, id: &str) -> Result<User, Error> {
        let request = RpcRequest::FindUserById(FindUserByIdRequest { id: id.to_string() });
        let reply: FindUserByIdReply = self.round_trip(request).await?;
        reply.into_result()
    }

    async fn create_user(&self, username: &str) -> Result<String, Error> {
        let request = RpcRequest::CreateUser(CreateUserRequest {
            username: username.to_string(),
        });
        let reply: CreateUserReply = self.round_trip(request).await?;
        reply.into_result()
    }
}
