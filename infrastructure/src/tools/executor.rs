//! Execution router — resolves tool names and dispatches calls.
//!
//! Local built-ins are registered first; tools discovered from remote
//! servers are merged afterwards with last-write-wins, so a remote tool can
//! shadow a built-in (with one warning). Resolution failures never touch the
//! network.

use super::builtin::{FinalAnswerTool, LocalTool, PingTool};
use crate::remote::{CallError, SessionManager};
use async_trait::async_trait;
use planwire_application::ports::{ExecutionError, ToolExecutorPort};
use planwire_domain::tool::{ToolCall, ToolDescriptor, ToolError, ToolOwner, ToolRegistry, ToolResult};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Routes tool calls between in-process handlers and the session manager.
pub struct ExecutionRouter {
    registry: ToolRegistry,
    locals: HashMap<String, Arc<dyn LocalTool>>,
    sessions: Option<Arc<SessionManager>>,
}

impl ExecutionRouter {
    /// Router with the built-in local tools and no remote servers.
    pub fn new() -> Self {
        let mut router = Self {
            registry: ToolRegistry::new(),
            locals: HashMap::new(),
            sessions: None,
        };
        router.add_local(Arc::new(PingTool));
        router.add_local(Arc::new(FinalAnswerTool));
        router
    }

    fn add_local(&mut self, tool: Arc<dyn LocalTool>) {
        let descriptor = tool.descriptor();
        self.locals.insert(descriptor.name.clone(), tool);
        if let Some(shadowed) = self.registry.register(descriptor) {
            warn!(tool = %shadowed.name, "local tool registered twice");
        }
    }

    /// Register an extra local tool.
    pub fn with_local_tool(mut self, tool: Arc<dyn LocalTool>) -> Self {
        self.add_local(tool);
        self
    }

    /// Attach a started session manager and merge its discovered tools.
    /// Emits exactly one warning per name collision.
    pub fn with_sessions(mut self, sessions: Arc<SessionManager>) -> Self {
        for tool in sessions.discovered_tools() {
            debug!(tool = %tool.name, owner = %tool.owner, "registering remote tool");
            if let Some(shadowed) = self.registry.register(tool.clone()) {
                warn!(
                    tool = %tool.name,
                    previous = %shadowed.owner,
                    now = %tool.owner,
                    "tool name collision, keeping the newest registration"
                );
            }
        }
        self.sessions = Some(sessions);
        self
    }

    async fn delegate(
        &self,
        call: &ToolCall,
        server: &str,
    ) -> Result<ToolResult, ExecutionError> {
        let Some(sessions) = &self.sessions else {
            return Err(ExecutionError::CallFailed {
                tool: call.name.clone(),
                server: server.to_string(),
                reason: "no session manager attached".into(),
            });
        };

        let manager = Arc::clone(sessions);
        let server_name = server.to_string();
        let tool_name = call.name.clone();
        let arguments = serde_json::Value::Object(call.args.clone());
        let clock = Instant::now();

        // The manager API blocks on its runtime thread; hop off the async
        // executor for the wait.
        let joined = tokio::task::spawn_blocking(move || {
            manager.call(&server_name, &tool_name, arguments)
        })
        .await;

        let duration_ms = clock.elapsed().as_millis() as u64;
        let outcome = joined.map_err(|e| ExecutionError::CallFailed {
            tool: call.name.clone(),
            server: server.to_string(),
            reason: e.to_string(),
        })?;

        match outcome {
            Ok(text) => Ok(ToolResult::success(&call.name, text)
                .with_server(server)
                .with_duration(duration_ms)),
            // The tool ran and said no; that's a result, not a routing error.
            Err(CallError::ToolFailure(message)) => Ok(ToolResult::failure(
                &call.name,
                ToolError::execution_failed(message),
            )
            .with_server(server)
            .with_duration(duration_ms)),
            Err(e) => Err(ExecutionError::CallFailed {
                tool: call.name.clone(),
                server: server.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

impl Default for ExecutionRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolExecutorPort for ExecutionRouter {
    fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolResult, ExecutionError> {
        let Some(descriptor) = self.registry.resolve(&call.name) else {
            debug!(tool = %call.name, "unknown tool");
            return Err(ExecutionError::UnknownTool(call.name.clone()));
        };

        match descriptor.owner.clone() {
            ToolOwner::Local => {
                let Some(tool) = self.locals.get(&call.name) else {
                    return Err(ExecutionError::UnknownTool(call.name.clone()));
                };
                let clock = Instant::now();
                let result = tool.invoke(&call.args);
                Ok(result.with_duration(clock.elapsed().as_millis() as u64))
            }
            ToolOwner::Server(server) => self.delegate(call, &server).await,
        }
    }
}

/// Catalog entry helper for `--list-tools` style output.
pub fn format_catalog(tools: &[&ToolDescriptor]) -> String {
    tools
        .iter()
        .map(|t| format!("{:<24} {:<16} {}", t.name, t.owner.to_string(), t.description))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::testing::StubToolServer;
    use planwire_domain::server::ServerDescriptor;
    use std::time::Duration;

    #[tokio::test]
    async fn test_unknown_tool_resolves_without_any_network() {
        let router = ExecutionRouter::new();
        let err = router
            .execute(&ToolCall::new("does_not_exist"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::UnknownTool(name) if name == "does_not_exist"));
    }

    #[tokio::test]
    async fn test_local_ping_dispatch() {
        let router = ExecutionRouter::new();
        let result = router.execute(&ToolCall::new("ping")).await.unwrap();
        assert!(result.is_success());
        assert!(result.output().unwrap().contains("pong"));
        assert!(result.duration_ms.is_some());
    }

    #[tokio::test]
    async fn test_remote_dispatch_and_shadowing() {
        let stub = StubToolServer::spawn(vec![("get_issue", "fetch an issue"), ("ping", "remote ping")]);
        let manager = Arc::new(SessionManager::new(Duration::from_secs(2)));
        manager
            .start(&[ServerDescriptor::new("stub", stub.address())])
            .unwrap();

        let router = ExecutionRouter::new().with_sessions(Arc::clone(&manager));

        // Remote discovery registered after built-ins, so the remote ping
        // shadows the local one.
        assert_eq!(
            router.registry().resolve("ping").unwrap().owner,
            ToolOwner::Server("stub".into())
        );

        let result = router
            .execute(&ToolCall::new("get_issue").with_arg("id", "PROJ-1"))
            .await
            .unwrap();
        assert!(result.is_success());
        assert_eq!(result.output(), Some("echo:get_issue"));
        assert_eq!(result.server.as_deref(), Some("stub"));

        manager.stop(Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_collision_warns_exactly_once() {
        #[derive(Clone)]
        struct Capture(Arc<std::sync::Mutex<Vec<u8>>>);

        impl std::io::Write for Capture {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let stub = StubToolServer::spawn(vec![
            // Collides with the local built-in; the other name is clean.
            ("ping", "remote ping"),
            ("get_issue", "fetch an issue"),
        ]);
        let manager = Arc::new(SessionManager::new(Duration::from_secs(2)));
        manager
            .start(&[ServerDescriptor::new("stub", stub.address())])
            .unwrap();

        let buffer = Arc::new(std::sync::Mutex::new(Vec::new()));
        let writer = Capture(Arc::clone(&buffer));
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .finish();

        let router = tracing::subscriber::with_default(subscriber, || {
            ExecutionRouter::new().with_sessions(Arc::clone(&manager))
        });

        let logs = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert_eq!(logs.matches("tool name collision").count(), 1);
        assert_eq!(
            router.registry().resolve("ping").unwrap().owner,
            ToolOwner::Server("stub".into())
        );

        manager.stop(Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_remote_tool_failure_is_a_failed_result() {
        let stub = StubToolServer::spawn(vec![("boom", "always fails")]);
        let manager = Arc::new(SessionManager::new(Duration::from_secs(2)));
        manager
            .start(&[ServerDescriptor::new("stub", stub.address())])
            .unwrap();
        let router = ExecutionRouter::new().with_sessions(Arc::clone(&manager));

        let result = router.execute(&ToolCall::new("boom")).await.unwrap();
        assert!(!result.is_success());
        assert_eq!(
            result.error().map(|e| e.code.as_str()),
            Some("EXECUTION_FAILED")
        );

        manager.stop(Duration::from_secs(2));
    }
}
