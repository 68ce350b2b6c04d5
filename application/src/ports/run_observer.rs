//! Run progress port.
//!
//! [`RunObserver`] is an **output port** the outer layers implement to watch
//! a planning run as it happens: the console renderer and the JSONL run
//! logger both hang off it. All callback argument types come from the domain
//! layer, and every method has a no-op default so implementers only override
//! what they care about.

use planwire_domain::command::Command;
use planwire_domain::run::RunResult;
use planwire_domain::tool::ToolResult;

/// Observer for planning-run lifecycle events.
pub trait RunObserver: Send + Sync {
    /// Called once before the first iteration.
    fn on_run_start(&self, _task: &str) {}

    /// Called at the top of every iteration.
    fn on_iteration_start(&self, _index: usize) {}

    /// Called with the conversation message the model is about to answer.
    fn on_model_request(&self, _index: usize, _prompt: &str) {}

    /// Called with the raw model reply, before parsing.
    fn on_model_response(&self, _index: usize, _text: &str) {}

    /// Called when a reply failed to parse.
    fn on_parse_error(&self, _index: usize, _error: &str) {}

    /// Called with the parsed command, before dispatch.
    fn on_command(&self, _index: usize, _command: &Command) {}

    /// Called with the result of a dispatched tool call.
    fn on_tool_result(&self, _index: usize, _result: &ToolResult) {}

    /// Called when a dispatch failed before reaching a tool.
    fn on_execution_error(&self, _index: usize, _error: &str) {}

    /// Called when the model backend is being retried.
    fn on_model_retry(&self, _attempt: usize, _max_retries: usize, _error: &str) {}

    /// Called once with the finished run.
    fn on_run_complete(&self, _result: &RunResult) {}
}

/// No-op implementation for when progress isn't needed.
pub struct NoRunObserver;

impl RunObserver for NoRunObserver {}

/// Fan-out to several observers, e.g. console rendering plus a JSONL log.
pub struct CompositeRunObserver {
    observers: Vec<Box<dyn RunObserver>>,
}

impl CompositeRunObserver {
    pub fn new() -> Self {
        Self {
            observers: Vec::new(),
        }
    }

    pub fn with(mut self, observer: Box<dyn RunObserver>) -> Self {
        self.observers.push(observer);
        self
    }
}

impl Default for CompositeRunObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl RunObserver for CompositeRunObserver {
    fn on_run_start(&self, task: &str) {
        for o in &self.observers {
            o.on_run_start(task);
        }
    }

    fn on_iteration_start(&self, index: usize) {
        for o in &self.observers {
            o.on_iteration_start(index);
        }
    }

    fn on_model_request(&self, index: usize, prompt: &str) {
        for o in &self.observers {
            o.on_model_request(index, prompt);
        }
    }

    fn on_model_response(&self, index: usize, text: &str) {
        for o in &self.observers {
            o.on_model_response(index, text);
        }
    }

    fn on_parse_error(&self, index: usize, error: &str) {
        for o in &self.observers {
            o.on_parse_error(index, error);
        }
    }

    fn on_command(&self, index: usize, command: &Command) {
        for o in &self.observers {
            o.on_command(index, command);
        }
    }

    fn on_tool_result(&self, index: usize, result: &ToolResult) {
        for o in &self.observers {
            o.on_tool_result(index, result);
        }
    }

    fn on_execution_error(&self, index: usize, error: &str) {
        for o in &self.observers {
            o.on_execution_error(index, error);
        }
    }

    fn on_model_retry(&self, attempt: usize, max_retries: usize, error: &str) {
        for o in &self.observers {
            o.on_model_retry(attempt, max_retries, error);
        }
    }

    fn on_run_complete(&self, result: &RunResult) {
        for o in &self.observers {
            o.on_run_complete(result);
        }
    }
}
