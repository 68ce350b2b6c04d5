//! TCP client for one tool server.
//!
//! One request in flight at a time; responses are correlated by id and
//! stray notifications (or stale responses from an abandoned call) are
//! skipped. Every read and write is bounded by the client's I/O timeout.

use super::error::CallError;
use super::protocol::{
    InitializeParams, JsonRpcRequest, RemoteToolInfo, ToolsCallParams, ToolsCallResult,
    ToolsListResult,
};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::{debug, trace};

/// Connected session to a single tool server.
#[derive(Debug)]
pub struct ToolServerClient {
    server: String,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    io_timeout: Duration,
}

impl ToolServerClient {
    /// Connect to `address` (host:port). Does not send anything yet; follow
    /// with [`initialize`](Self::initialize).
    pub async fn connect(
        server: &str,
        address: &str,
        io_timeout: Duration,
    ) -> Result<Self, CallError> {
        let stream = tokio::time::timeout(io_timeout, TcpStream::connect(address))
            .await
            .map_err(|_| CallError::Timeout(io_timeout))?
            .map_err(|e| CallError::Io {
                server: server.to_string(),
                reason: e.to_string(),
            })?;
        debug!(server, address, "connected to tool server");
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            server: server.to_string(),
            reader: BufReader::new(read_half),
            writer: write_half,
            io_timeout,
        })
    }

    /// Perform the `initialize` handshake.
    pub async fn initialize(&mut self) -> Result<(), CallError> {
        let params = serde_json::to_value(InitializeParams::default())
            .map_err(|e| self.protocol_error(e.to_string()))?;
        self.request("initialize", Some(params)).await?;
        Ok(())
    }

    /// Ask the server which tools it offers.
    pub async fn list_tools(&mut self) -> Result<Vec<RemoteToolInfo>, CallError> {
        let result = self.request("tools/list", None).await?;
        let listing: ToolsListResult =
            serde_json::from_value(result).map_err(|e| self.protocol_error(e.to_string()))?;
        Ok(listing.tools)
    }

    /// Invoke one tool. A tool-level failure (`isError`) comes back as
    /// [`CallError::ToolFailure`]; the session remains usable.
    pub async fn call_tool(
        &mut self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<String, CallError> {
        let params = serde_json::to_value(ToolsCallParams {
            name: name.to_string(),
            arguments,
        })
        .map_err(|e| self.protocol_error(e.to_string()))?;
        let result = self.request("tools/call", Some(params)).await?;
        let call: ToolsCallResult =
            serde_json::from_value(result).map_err(|e| self.protocol_error(e.to_string()))?;
        if call.is_error {
            return Err(CallError::ToolFailure(call.text()));
        }
        Ok(call.text())
    }

    /// Close the session. Best effort; the server sees EOF.
    pub async fn close(mut self) {
        let _ = self.writer.shutdown().await;
        debug!(server = %self.server, "closed tool server session");
    }

    async fn request(
        &mut self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, CallError> {
        let request = JsonRpcRequest::new(method, params);
        let mut line =
            serde_json::to_string(&request).map_err(|e| self.protocol_error(e.to_string()))?;
        line.push('\n');
        trace!(server = %self.server, method, id = request.id, "sending request");
        tokio::time::timeout(self.io_timeout, self.writer.write_all(line.as_bytes()))
            .await
            .map_err(|_| CallError::Timeout(self.io_timeout))?
            .map_err(|e| self.io_error(e))?;

        loop {
            let mut buf = String::new();
            let read = tokio::time::timeout(self.io_timeout, self.reader.read_line(&mut buf))
                .await
                .map_err(|_| CallError::Timeout(self.io_timeout))?
                .map_err(|e| self.io_error(e))?;
            if read == 0 {
                return Err(CallError::Io {
                    server: self.server.clone(),
                    reason: "connection closed by server".into(),
                });
            }
            let trimmed = buf.trim();
            if trimmed.is_empty() {
                continue;
            }
            let response: super::protocol::JsonRpcResponse =
                serde_json::from_str(trimmed).map_err(|e| self.protocol_error(e.to_string()))?;
            match response.id {
                Some(id) if id == request.id => {
                    if let Some(error) = response.error {
                        return Err(CallError::Rpc {
                            server: self.server.clone(),
                            code: error.code,
                            message: error.message,
                        });
                    }
                    return Ok(response.result.unwrap_or(serde_json::Value::Null));
                }
                // Notification or a stale response from an abandoned call.
                _ => trace!(server = %self.server, "skipping unsolicited message"),
            }
        }
    }

    fn io_error(&self, e: std::io::Error) -> CallError {
        CallError::Io {
            server: self.server.clone(),
            reason: e.to_string(),
        }
    }

    fn protocol_error(&self, reason: String) -> CallError {
        CallError::Protocol {
            server: self.server.clone(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::StubToolServer;
    use super::*;

    const IO: Duration = Duration::from_secs(2);

    #[tokio::test]
    async fn test_initialize_list_and_call() {
        let stub = StubToolServer::spawn(vec![("get_issue", "fetch an issue")]);
        let mut client = ToolServerClient::connect("stub", &stub.address(), IO)
            .await
            .unwrap();
        client.initialize().await.unwrap();

        let tools = client.list_tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "get_issue");

        let output = client
            .call_tool("get_issue", serde_json::json!({"id": "PROJ-1"}))
            .await
            .unwrap();
        assert_eq!(output, "echo:get_issue");
        client.close().await;
    }

    #[tokio::test]
    async fn test_tool_level_error_is_tool_failure() {
        let stub = StubToolServer::spawn(vec![("boom", "always fails")]);
        let mut client = ToolServerClient::connect("stub", &stub.address(), IO)
            .await
            .unwrap();
        client.initialize().await.unwrap();

        let err = client
            .call_tool("boom", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, CallError::ToolFailure(_)));

        // Session is still usable after a tool failure.
        assert!(client.list_tools().await.is_ok());
    }

    #[tokio::test]
    async fn test_connect_refused_is_io_error() {
        // Port 1 is essentially never listening.
        let err = ToolServerClient::connect("stub", "127.0.0.1:1", IO)
            .await
            .unwrap_err();
        assert!(matches!(err, CallError::Io { .. } | CallError::Timeout(_)));
    }
}
