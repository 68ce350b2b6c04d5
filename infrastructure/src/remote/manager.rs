//! Session manager — the synchronous facade over the remote tool layer.
//!
//! `start` spawns configured server processes, boots the background runtime
//! and discovers tools; `call` routes one invocation to a server; `stop`
//! tears everything down. Startup is all-or-nothing for processes and the
//! runtime, while per-server discovery failures are tolerated: a server that
//! won't answer `tools/list` simply contributes no tools.
//!
//! Ephemeral servers get a fresh connect/initialize/call/close per
//! invocation. Persistent servers keep one lazily-opened session in a
//! per-server slot; a fair async mutex serializes calls in arrival order and
//! an unhealthy session is closed so the next call reconnects.

use super::client::ToolServerClient;
use super::error::{CallError, StartupError};
use super::process::ServerProcess;
use super::runtime::{RuntimeError, RuntimeHandle, SessionRuntime};
use planwire_domain::server::ServerDescriptor;
use planwire_domain::tool::ToolDescriptor;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{info, warn};

const SPAWN_TIMEOUT: Duration = Duration::from_secs(10);
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);
const CONNECT_ATTEMPTS: usize = 5;
const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(100);
const ROLLBACK_GRACE: Duration = Duration::from_secs(2);

type SessionSlot = Arc<tokio::sync::Mutex<Option<ToolServerClient>>>;

struct Running {
    runtime: SessionRuntime,
    servers: HashMap<String, ServerDescriptor>,
    processes: Vec<ServerProcess>,
    sessions: HashMap<String, SessionSlot>,
    discovered: Vec<ToolDescriptor>,
}

/// Manages tool-server processes and sessions behind a blocking API.
pub struct SessionManager {
    state: Mutex<Option<Running>>,
    call_timeout: Duration,
}

impl SessionManager {
    /// `call_timeout` bounds each I/O step of a remote call (connect,
    /// handshake, request/response).
    pub fn new(call_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(None),
            call_timeout,
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, Option<Running>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_running(&self) -> bool {
        self.lock_state().is_some()
    }

    /// Start the manager for the given server set.
    ///
    /// Validation and spawning are atomic: on any failure every
    /// already-spawned child is terminated, the runtime is torn down and the
    /// manager stays stopped.
    pub fn start(&self, servers: &[ServerDescriptor]) -> Result<(), StartupError> {
        let mut state = self.lock_state();
        if state.is_some() {
            return Err(StartupError::AlreadyRunning);
        }
        ServerDescriptor::validate_all(servers)?;

        let runtime = SessionRuntime::start().map_err(StartupError::Runtime)?;
        let handle = runtime.handle();

        let mut processes: Vec<ServerProcess> = Vec::new();
        for descriptor in servers.iter().filter(|s| s.command.is_some()) {
            let spawn_target = descriptor.clone();
            match handle.run(SPAWN_TIMEOUT, async move { ServerProcess::spawn(&spawn_target) }) {
                Ok(Ok(process)) => processes.push(process),
                Ok(Err(e)) => {
                    Self::rollback(&handle, processes);
                    return Err(StartupError::Spawn {
                        name: descriptor.name.clone(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    Self::rollback(&handle, processes);
                    return Err(StartupError::Runtime(e.to_string()));
                }
            }
        }

        let mut discovered = Vec::new();
        let io_timeout = self.call_timeout;
        for descriptor in servers {
            let server = descriptor.name.clone();
            let address = descriptor.address.clone();
            let job = async move {
                let mut client = connect_with_retry(&server, &address, io_timeout).await?;
                client.initialize().await?;
                let tools = client.list_tools().await?;
                client.close().await;
                Ok::<_, CallError>(tools)
            };
            match handle.run(DISCOVERY_TIMEOUT, job) {
                Ok(Ok(tools)) => {
                    info!(server = %descriptor.name, count = tools.len(), "discovered tools");
                    for tool in tools {
                        discovered.push(ToolDescriptor::remote(
                            tool.name,
                            tool.description,
                            &descriptor.name,
                        ));
                    }
                }
                Ok(Err(e)) => {
                    warn!(
                        server = %descriptor.name,
                        error = %e,
                        "tool discovery failed, continuing without this server's tools"
                    );
                }
                Err(e) => {
                    warn!(
                        server = %descriptor.name,
                        error = %e,
                        "tool discovery failed, continuing without this server's tools"
                    );
                }
            }
        }

        let sessions = servers
            .iter()
            .filter(|s| s.persistent)
            .map(|s| {
                (
                    s.name.clone(),
                    Arc::new(tokio::sync::Mutex::new(None)) as SessionSlot,
                )
            })
            .collect();
        let servers_map = servers
            .iter()
            .map(|s| (s.name.clone(), s.clone()))
            .collect();

        *state = Some(Running {
            runtime,
            servers: servers_map,
            processes,
            sessions,
            discovered,
        });
        info!(servers = servers.len(), "session manager started");
        Ok(())
    }

    /// Terminate children spawned before a startup failure. The runtime
    /// itself is torn down by dropping it in the caller.
    fn rollback(handle: &RuntimeHandle, processes: Vec<ServerProcess>) {
        if processes.is_empty() {
            return;
        }
        warn!(
            count = processes.len(),
            "startup failed, terminating already-spawned servers"
        );
        let budget = ROLLBACK_GRACE * (processes.len() as u32 + 1);
        let _ = handle.run(budget, async move {
            for process in processes {
                process.terminate(ROLLBACK_GRACE).await;
            }
        });
    }

    /// Every tool advertised by every reachable server.
    pub fn discovered_tools(&self) -> Vec<ToolDescriptor> {
        self.lock_state()
            .as_ref()
            .map(|r| r.discovered.clone())
            .unwrap_or_default()
    }

    /// Invoke `tool` on `server`. Blocks until the call resolves or times
    /// out; routing to different servers proceeds concurrently.
    pub fn call(
        &self,
        server: &str,
        tool: &str,
        arguments: serde_json::Value,
    ) -> Result<String, CallError> {
        let (handle, descriptor, slot) = {
            let state = self.lock_state();
            let Some(running) = state.as_ref() else {
                return Err(CallError::NotRunning);
            };
            let descriptor = running
                .servers
                .get(server)
                .cloned()
                .ok_or_else(|| CallError::UnknownServer(server.to_string()))?;
            (
                running.runtime.handle(),
                descriptor,
                running.sessions.get(server).cloned(),
            )
        };

        let io_timeout = self.call_timeout;
        let tool = tool.to_string();
        // Budget for the whole job: queueing on the per-server lock plus
        // connect, handshake and the call, each bounded by io_timeout.
        let job_timeout = self.call_timeout * 4;
        let outcome = if descriptor.persistent {
            let slot = slot.ok_or_else(|| CallError::UnknownServer(descriptor.name.clone()))?;
            handle.run(
                job_timeout,
                persistent_call(slot, descriptor, tool, arguments, io_timeout),
            )
        } else {
            handle.run(
                job_timeout,
                ephemeral_call(descriptor, tool, arguments, io_timeout),
            )
        };

        match outcome {
            Ok(result) => result,
            Err(RuntimeError::NotRunning) => Err(CallError::NotRunning),
            Err(RuntimeError::Timeout(d)) => Err(CallError::Timeout(d)),
        }
    }

    /// Stop everything: close persistent sessions, terminate children with
    /// `grace` before killing, shut the runtime down. Idempotent; calling
    /// on a stopped manager is a no-op.
    pub fn stop(&self, grace: Duration) {
        let Some(running) = self.lock_state().take() else {
            return;
        };
        info!("stopping session manager");
        let Running {
            mut runtime,
            sessions,
            processes,
            ..
        } = running;
        let handle = runtime.handle();

        if !sessions.is_empty() {
            let _ = handle.run(grace + Duration::from_secs(1), async move {
                for slot in sessions.into_values() {
                    let mut guard = slot.lock().await;
                    if let Some(client) = guard.take() {
                        client.close().await;
                    }
                }
            });
        }

        if !processes.is_empty() {
            let budget = grace * (processes.len() as u32 + 1) + Duration::from_secs(1);
            let _ = handle.run(budget, async move {
                for process in processes {
                    process.terminate(grace).await;
                }
            });
        }

        runtime.shutdown();
        info!("session manager stopped");
    }
}

async fn connect_with_retry(
    server: &str,
    address: &str,
    io_timeout: Duration,
) -> Result<ToolServerClient, CallError> {
    let mut last_error = None;
    for attempt in 0..CONNECT_ATTEMPTS {
        if attempt > 0 {
            tokio::time::sleep(CONNECT_RETRY_DELAY).await;
        }
        match ToolServerClient::connect(server, address, io_timeout).await {
            Ok(client) => return Ok(client),
            Err(e) => last_error = Some(e),
        }
    }
    Err(last_error.unwrap_or(CallError::Timeout(io_timeout)))
}

/// Connect, call, close. No state survives the invocation.
async fn ephemeral_call(
    descriptor: ServerDescriptor,
    tool: String,
    arguments: serde_json::Value,
    io_timeout: Duration,
) -> Result<String, CallError> {
    let mut client =
        ToolServerClient::connect(&descriptor.name, &descriptor.address, io_timeout).await?;
    client.initialize().await?;
    let result = client.call_tool(&tool, arguments).await;
    client.close().await;
    result
}

/// Call through the server's long-lived session, opening it on first use.
async fn persistent_call(
    slot: SessionSlot,
    descriptor: ServerDescriptor,
    tool: String,
    arguments: serde_json::Value,
    io_timeout: Duration,
) -> Result<String, CallError> {
    // Tokio's mutex queues waiters fairly, so calls run in arrival order.
    let mut guard = slot.lock().await;
    if guard.is_none() {
        let mut client =
            ToolServerClient::connect(&descriptor.name, &descriptor.address, io_timeout).await?;
        client.initialize().await?;
        *guard = Some(client);
    }
    // The session lives outside the slot while the request is in flight:
    // if the job is cancelled mid-I/O the client is dropped, the slot stays
    // empty and the next call reconnects.
    let Some(mut client) = guard.take() else {
        return Err(CallError::NotRunning);
    };
    match client.call_tool(&tool, arguments).await {
        Ok(text) => {
            *guard = Some(client);
            Ok(text)
        }
        // The tool answered; the session is fine.
        Err(e @ CallError::ToolFailure(_)) => {
            *guard = Some(client);
            Err(e)
        }
        Err(e) => {
            warn!(server = %descriptor.name, error = %e, "recycling unhealthy session");
            client.close().await;
            Err(e)
        }
    }
}
