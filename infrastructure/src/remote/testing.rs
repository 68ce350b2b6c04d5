//! In-process stub tool server for tests.
//!
//! Speaks just enough newline-delimited JSON-RPC for the client and manager
//! tests: `initialize`, `tools/list` and `tools/call`. The `boom` tool
//! reports a tool-level error, the `slow` tool sleeps before answering so
//! tests can observe call overlap.

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub(crate) struct StubToolServer {
    addr: SocketAddr,
    /// Total accepted connections.
    pub connections: Arc<AtomicUsize>,
    /// Highest number of `tools/call` requests in flight at once.
    pub max_active_calls: Arc<AtomicUsize>,
}

impl StubToolServer {
    pub fn spawn(tools: Vec<(&str, &str)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub server");
        let addr = listener.local_addr().expect("local addr");
        let tools: Arc<Vec<(String, String)>> = Arc::new(
            tools
                .into_iter()
                .map(|(n, d)| (n.to_string(), d.to_string()))
                .collect(),
        );
        let connections = Arc::new(AtomicUsize::new(0));
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));

        let conn_counter = Arc::clone(&connections);
        let max_for_thread = Arc::clone(&max_active);
        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                conn_counter.fetch_add(1, Ordering::SeqCst);
                let tools = Arc::clone(&tools);
                let active = Arc::clone(&active);
                let max_active = Arc::clone(&max_for_thread);
                std::thread::spawn(move || handle_connection(stream, tools, active, max_active));
            }
        });

        Self {
            addr,
            connections,
            max_active_calls: max_active,
        }
    }

    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn max_overlap(&self) -> usize {
        self.max_active_calls.load(Ordering::SeqCst)
    }
}

fn handle_connection(
    stream: TcpStream,
    tools: Arc<Vec<(String, String)>>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
) {
    let mut writer = match stream.try_clone() {
        Ok(w) => w,
        Err(_) => return,
    };
    let reader = BufReader::new(stream);
    for line in reader.lines() {
        let Ok(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }
        let Ok(request) = serde_json::from_str::<serde_json::Value>(&line) else {
            break;
        };
        let id = request["id"].clone();
        let result = match request["method"].as_str() {
            Some("initialize") => serde_json::json!({"protocolVersion": "2024-11-05"}),
            Some("tools/list") => {
                let tools: Vec<serde_json::Value> = tools
                    .iter()
                    .map(|(name, description)| {
                        serde_json::json!({"name": name, "description": description})
                    })
                    .collect();
                serde_json::json!({"tools": tools})
            }
            Some("tools/call") => {
                let name = request["params"]["name"].as_str().unwrap_or("");
                if name == "slow" {
                    let current = active.fetch_add(1, Ordering::SeqCst) + 1;
                    max_active.fetch_max(current, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(150));
                    active.fetch_sub(1, Ordering::SeqCst);
                }
                if name == "boom" {
                    serde_json::json!({
                        "content": [{"type": "text", "text": "it broke"}],
                        "isError": true,
                    })
                } else {
                    serde_json::json!({
                        "content": [{"type": "text", "text": format!("echo:{name}")}],
                        "isError": false,
                    })
                }
            }
            _ => serde_json::json!({}),
        };
        let response = serde_json::json!({"jsonrpc": "2.0", "id": id, "result": result});
        if writeln!(writer, "{response}").is_err() {
            break;
        }
        let _ = writer.flush();
    }
}
