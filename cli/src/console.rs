//! Console rendering of run progress.

use planwire_application::ports::RunObserver;
use planwire_domain::command::Command;
use planwire_domain::run::{RunOutcome, RunResult};
use planwire_domain::tool::ToolResult;

const PREVIEW_LEN: usize = 200;

/// Observer that narrates the run on stdout.
pub struct ConsoleObserver {
    verbose: bool,
}

impl ConsoleObserver {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

fn preview(text: &str) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= PREVIEW_LEN {
        return flat;
    }
    let cut: String = flat.chars().take(PREVIEW_LEN).collect();
    format!("{cut}…")
}

impl RunObserver for ConsoleObserver {
    fn on_run_start(&self, task: &str) {
        println!("Task: {task}");
    }

    fn on_iteration_start(&self, index: usize) {
        println!("--- iteration {} ---", index + 1);
    }

    fn on_model_response(&self, _index: usize, text: &str) {
        if self.verbose {
            println!("model: {}", preview(text));
        }
    }

    fn on_parse_error(&self, _index: usize, error: &str) {
        println!("parse error: {error}");
    }

    fn on_command(&self, _index: usize, command: &Command) {
        match command {
            Command::Query { tool, .. } => println!("query  -> {tool}"),
            Command::Task { tool, .. } => println!("task   -> {tool}"),
            Command::Error { message } => println!("error  -> {message}"),
        }
    }

    fn on_tool_result(&self, _index: usize, result: &ToolResult) {
        if result.is_success() {
            println!("result <- {}", preview(result.output().unwrap_or("")));
        } else {
            let error = result
                .error()
                .map(ToString::to_string)
                .unwrap_or_else(|| "unknown error".into());
            println!("result <- FAILED: {error}");
        }
    }

    fn on_execution_error(&self, _index: usize, error: &str) {
        println!("dispatch failed: {error}");
    }

    fn on_model_retry(&self, attempt: usize, max_retries: usize, error: &str) {
        println!("model retry {attempt}/{max_retries}: {error}");
    }

    fn on_run_complete(&self, result: &RunResult) {
        println!();
        match &result.outcome {
            RunOutcome::Completed { answer } => println!("{answer}"),
            other => println!("Run failed: {other}"),
        }
    }
}
