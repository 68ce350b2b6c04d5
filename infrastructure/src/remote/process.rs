//! Child-process lifecycle for spawned tool servers.

use planwire_domain::server::ServerDescriptor;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// A tool-server child process owned by the session manager.
///
/// stdout and stderr are piped and drained by background tasks, so the child
/// can never block on a full pipe. `kill_on_drop` is the last line of
/// defense; orderly shutdown goes through [`terminate`](Self::terminate).
#[derive(Debug)]
pub struct ServerProcess {
    name: String,
    child: tokio::process::Child,
}

impl ServerProcess {
    /// Spawn the server's configured command. Must be called from within a
    /// Tokio runtime: the pipe-drain tasks are spawned immediately.
    pub fn spawn(descriptor: &ServerDescriptor) -> std::io::Result<Self> {
        let program = descriptor.command.as_deref().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "server has no spawn command",
            )
        })?;

        let mut cmd = Command::new(program);
        cmd.args(&descriptor.args)
            .envs(&descriptor.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &descriptor.cwd {
            cmd.current_dir(cwd);
        }

        // If this process dies without cleanup, the kernel reaps the child.
        #[cfg(target_os = "linux")]
        unsafe {
            cmd.pre_exec(|| {
                libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM);
                Ok(())
            });
        }

        let mut child = cmd.spawn()?;
        info!(server = %descriptor.name, pid = child.id(), "spawned tool server process");

        if let Some(stdout) = child.stdout.take() {
            drain_pipe(descriptor.name.clone(), "stdout", stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            drain_pipe(descriptor.name.clone(), "stderr", stderr);
        }

        Ok(Self {
            name: descriptor.name.clone(),
            child,
        })
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Terminate: SIGTERM, wait up to `grace`, then SIGKILL.
    pub async fn terminate(mut self, grace: Duration) {
        self.send_sigterm();
        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(status) => {
                debug!(server = %self.name, ?status, "tool server exited");
            }
            Err(_) => {
                warn!(server = %self.name, "tool server ignored SIGTERM, killing");
                let _ = self.child.start_kill();
                let _ = self.child.wait().await;
            }
        }
    }

    #[cfg(target_os = "linux")]
    fn send_sigterm(&mut self) {
        if let Some(pid) = self.child.id() {
            unsafe {
                libc::kill(pid as i32, libc::SIGTERM);
            }
        }
    }

    #[cfg(not(target_os = "linux"))]
    fn send_sigterm(&mut self) {
        let _ = self.child.start_kill();
    }
}

/// Forward a child pipe into structured logs, line by line.
fn drain_pipe(
    server: String,
    stream: &'static str,
    pipe: impl tokio::io::AsyncRead + Unpin + Send + 'static,
) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(pipe).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(server = %server, stream, "{line}");
        }
    });
}
