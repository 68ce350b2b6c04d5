//! Run-plan use case — the Planning → Parsing → Dispatching loop.
//!
//! Each iteration asks the model for one command block, parses it strictly,
//! dispatches the command and feeds the result back into the conversation.
//! Every failure mode is bounded: parse failures by
//! [`RunConfig::max_parse_failures`], backend failures by
//! [`RunConfig::max_model_retries`], and the loop itself by
//! [`RunConfig::max_iterations`]. A run always produces exactly one
//! [`RunResult`] carrying the full iteration trail.

use crate::ports::{ModelClient, ModelError, RunObserver, ToolExecutorPort};
use chrono::Utc;
use planwire_domain::command::{self, Args, Command};
use planwire_domain::prompt::{Message, PromptTemplate};
use planwire_domain::run::{PlanIteration, RunOutcome, RunResult};
use planwire_domain::tool::{FINAL_ANSWER_TOOL, ToolCall};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Bounds and knobs for a planning run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Hard cap on Planning → Dispatching iterations.
    pub max_iterations: usize,
    /// Consecutive unparseable replies tolerated before the run is a
    /// protocol violation.
    pub max_parse_failures: usize,
    /// Retries after a failed model request (total attempts is this + 1).
    pub max_model_retries: usize,
    /// Timeout for a single model request.
    pub model_timeout: Duration,
    /// Maximum number of conversation messages sent to the model; older
    /// exchanges are dropped from the middle, keeping the system prompt and
    /// the original task.
    pub history_window: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            max_parse_failures: 3,
            max_model_retries: 2,
            model_timeout: Duration::from_secs(60),
            history_window: 40,
        }
    }
}

/// Orchestrates one planning run against a model and a tool executor.
pub struct RunPlanUseCase<M, T> {
    model: Arc<M>,
    executor: Arc<T>,
    config: RunConfig,
}

impl<M, T> RunPlanUseCase<M, T>
where
    M: ModelClient,
    T: ToolExecutorPort,
{
    pub fn new(model: Arc<M>, executor: Arc<T>) -> Self {
        Self {
            model,
            executor,
            config: RunConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    /// Run the loop for one task until a terminal outcome.
    pub async fn execute(&self, task: &str, observer: &dyn RunObserver) -> RunResult {
        let started_at = Utc::now();
        let run_clock = Instant::now();
        observer.on_run_start(task);
        info!(task, "starting planning run");

        let system = PromptTemplate::system(&self.executor.registry().catalog());
        let mut messages = vec![Message::system(system), Message::user(task)];
        let mut iterations: Vec<PlanIteration> = Vec::new();
        let mut consecutive_parse_failures = 0usize;
        let mut outcome: Option<RunOutcome> = None;

        for index in 0..self.config.max_iterations {
            observer.on_iteration_start(index);
            let iteration_started = Utc::now();
            let iteration_clock = Instant::now();

            let prompt = messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default();
            observer.on_model_request(index, &prompt);

            let text = match self.generate_with_retry(&messages, observer).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "model backend unavailable, aborting run");
                    outcome = Some(RunOutcome::ModelUnavailable {
                        reason: e.to_string(),
                    });
                    break;
                }
            };
            observer.on_model_response(index, &text);
            messages.push(Message::assistant(text.clone()));

            let mut iteration =
                PlanIteration::new(index, iteration_started, prompt, text.clone());
            let mut finish: Option<RunOutcome> = None;

            match command::parse(&text) {
                Err(e) => {
                    consecutive_parse_failures += 1;
                    debug!(
                        iteration = index,
                        failures = consecutive_parse_failures,
                        error = %e,
                        "model reply failed to parse"
                    );
                    observer.on_parse_error(index, &e.to_string());
                    iteration = iteration.with_parse_error(e.to_string());
                    if consecutive_parse_failures >= self.config.max_parse_failures {
                        finish = Some(RunOutcome::ProtocolViolation {
                            last_error: e.to_string(),
                        });
                    } else {
                        messages.push(Message::user(PromptTemplate::parse_error_feedback(&e)));
                    }
                }
                Ok(parsed) => {
                    consecutive_parse_failures = 0;
                    observer.on_command(index, &parsed);
                    iteration = iteration.with_command(parsed.clone());
                    match parsed {
                        Command::Error { message } => {
                            finish = Some(RunOutcome::ModelDeclaredFailure { message });
                        }
                        Command::Query { tool, args } | Command::Task { tool, args } => {
                            if tool == FINAL_ANSWER_TOOL {
                                finish = Some(RunOutcome::Completed {
                                    answer: final_answer_text(&args),
                                });
                            } else {
                                let call = ToolCall { name: tool, args };
                                match self.executor.execute(&call).await {
                                    Ok(result) => {
                                        observer.on_tool_result(index, &result);
                                        messages.push(Message::user(
                                            PromptTemplate::tool_result_feedback(&result),
                                        ));
                                        iteration = iteration.with_result(result);
                                    }
                                    Err(e) => {
                                        observer.on_execution_error(index, &e.to_string());
                                        messages.push(Message::user(
                                            PromptTemplate::execution_error_feedback(
                                                &e.to_string(),
                                                &self.executor.registry().catalog(),
                                            ),
                                        ));
                                        iteration = iteration.with_execution_error(e.to_string());
                                    }
                                }
                            }
                        }
                    }
                }
            }

            let duration_ms = iteration_clock.elapsed().as_millis() as u64;
            iterations.push(iteration.with_duration(duration_ms));
            if let Some(terminal) = finish {
                outcome = Some(terminal);
                break;
            }
        }

        let outcome = outcome.unwrap_or(RunOutcome::MaxIterationsExceeded);
        info!(outcome = %outcome, iterations = iterations.len(), "planning run finished");
        let result = RunResult {
            outcome,
            iterations,
            started_at,
            duration_ms: run_clock.elapsed().as_millis() as u64,
        };
        observer.on_run_complete(&result);
        result
    }

    /// One model request with bounded retries and a per-request timeout.
    async fn generate_with_retry(
        &self,
        messages: &[Message],
        observer: &dyn RunObserver,
    ) -> Result<String, ModelError> {
        let window = self.windowed(messages);
        let mut last_error: Option<ModelError> = None;

        for attempt in 0..=self.config.max_model_retries {
            if let Some(e) = &last_error {
                observer.on_model_retry(attempt, self.config.max_model_retries, &e.to_string());
                warn!(attempt, error = %e, "retrying model request");
            }
            let outcome =
                tokio::time::timeout(self.config.model_timeout, self.model.generate(&window))
                    .await;
            match outcome {
                Err(_) => last_error = Some(ModelError::Timeout(self.config.model_timeout)),
                Ok(Err(e)) if e.is_retryable() => last_error = Some(e),
                Ok(Err(e)) => return Err(e),
                Ok(Ok(text)) if text.trim().is_empty() => return Err(ModelError::EmptyResponse),
                Ok(Ok(text)) => return Ok(text),
            }
        }

        Err(last_error.unwrap_or(ModelError::EmptyResponse))
    }

    /// Bound the conversation sent to the model: keep the system prompt and
    /// the original task, drop the oldest exchanges beyond the window.
    fn windowed(&self, messages: &[Message]) -> Vec<Message> {
        let window = self.config.history_window.max(4);
        if messages.len() <= window {
            return messages.to_vec();
        }
        let mut trimmed: Vec<Message> = messages[..2].to_vec();
        trimmed.extend_from_slice(&messages[messages.len() - (window - 2)..]);
        trimmed
    }
}

/// Extract the final answer from the reserved tool's arguments.
fn final_answer_text(args: &Args) -> String {
    match args.get("text").and_then(|v| v.as_str()) {
        Some(text) => text.to_string(),
        None => serde_json::Value::Object(args.clone()).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{ExecutionError, NoRunObserver};
    use async_trait::async_trait;
    use planwire_domain::tool::{ToolDescriptor, ToolRegistry, ToolResult};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Model that replays a fixed script of replies.
    struct ScriptedModel {
        replies: Mutex<VecDeque<Result<String, ModelError>>>,
        requests: AtomicUsize,
    }

    impl ScriptedModel {
        fn new(replies: Vec<Result<String, ModelError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().collect()),
                requests: AtomicUsize::new(0),
            }
        }

        fn requests(&self) -> usize {
            self.requests.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ModelClient for ScriptedModel {
        async fn generate(&self, _messages: &[Message]) -> Result<String, ModelError> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(ModelError::Transport("script exhausted".into())))
        }
    }

    /// Executor that succeeds for every registered tool.
    struct StubExecutor {
        registry: ToolRegistry,
        calls: Mutex<Vec<ToolCall>>,
    }

    impl StubExecutor {
        fn new() -> Self {
            let mut registry = ToolRegistry::new();
            registry.register(ToolDescriptor::local("ping", "liveness probe"));
            registry.register(ToolDescriptor::local(FINAL_ANSWER_TOOL, "deliver the answer"));
            registry.register(ToolDescriptor::remote("get_issue", "fetch an issue", "tracker"));
            Self {
                registry,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ToolExecutorPort for StubExecutor {
        fn registry(&self) -> &ToolRegistry {
            &self.registry
        }

        async fn execute(&self, call: &ToolCall) -> Result<ToolResult, ExecutionError> {
            if !self.registry.contains(&call.name) {
                return Err(ExecutionError::UnknownTool(call.name.clone()));
            }
            self.calls.lock().unwrap().push(call.clone());
            Ok(ToolResult::success(&call.name, format!("ok:{}", call.name)))
        }
    }

    fn query_block(tool: &str, args: &str) -> Result<String, ModelError> {
        Ok(format!("BEGIN\nQUERY({tool}, {args})\nEND"))
    }

    fn final_block(answer: &str) -> Result<String, ModelError> {
        Ok(format!(
            "BEGIN\nQUERY({FINAL_ANSWER_TOOL}, {{\"text\": \"{answer}\"}})\nEND"
        ))
    }

    fn use_case(
        model: ScriptedModel,
        executor: StubExecutor,
        config: RunConfig,
    ) -> RunPlanUseCase<ScriptedModel, StubExecutor> {
        RunPlanUseCase::new(Arc::new(model), Arc::new(executor)).with_config(config)
    }

    #[tokio::test]
    async fn test_run_completes_on_final_answer() {
        let model = ScriptedModel::new(vec![
            query_block("get_issue", "{\"id\": \"PROJ-1\"}"),
            final_block("the issue is open"),
        ]);
        let executor = StubExecutor::new();
        let uc = use_case(model, executor, RunConfig::default());

        let result = uc.execute("check PROJ-1", &NoRunObserver).await;
        assert_eq!(result.answer(), Some("the issue is open"));
        assert_eq!(result.iterations.len(), 2);
        assert!(result.iterations[0].result.is_some());
        assert_eq!(uc.executor.call_count(), 1);
    }

    #[tokio::test]
    async fn test_iterations_record_the_prompt_they_answered() {
        let model = ScriptedModel::new(vec![
            query_block("get_issue", "{\"id\": \"PROJ-1\"}"),
            final_block("done"),
        ]);
        let uc = use_case(model, StubExecutor::new(), RunConfig::default());

        let result = uc.execute("check PROJ-1", &NoRunObserver).await;
        // First iteration answers the task itself, the second answers the
        // tool result fed back into the conversation.
        assert_eq!(result.iterations[0].prompt, "check PROJ-1");
        assert!(result.iterations[1].prompt.contains("ok:get_issue"));
    }

    #[tokio::test]
    async fn test_error_command_is_model_declared_failure() {
        let model = ScriptedModel::new(vec![Ok(
            "BEGIN\nERROR(\"no tool reads email\")\nEND".to_string()
        )]);
        let uc = use_case(model, StubExecutor::new(), RunConfig::default());

        let result = uc.execute("read my email", &NoRunObserver).await;
        assert_eq!(
            result.outcome,
            RunOutcome::ModelDeclaredFailure {
                message: "no tool reads email".into()
            }
        );
        assert_eq!(result.iterations.len(), 1);
    }

    #[tokio::test]
    async fn test_bounded_parse_failures_become_protocol_violation() {
        let model = ScriptedModel::new(vec![
            Ok("nonsense".into()),
            Ok("also nonsense".into()),
            Ok("still nonsense".into()),
        ]);
        let uc = use_case(model, StubExecutor::new(), RunConfig::default());

        let result = uc.execute("task", &NoRunObserver).await;
        assert!(matches!(
            result.outcome,
            RunOutcome::ProtocolViolation { .. }
        ));
        // All three bad replies are in the trail.
        assert_eq!(result.iterations.len(), 3);
        assert!(result.iterations.iter().all(|i| i.parse_error.is_some()));
    }

    #[tokio::test]
    async fn test_parse_failure_recovery_resets_the_counter() {
        let model = ScriptedModel::new(vec![
            Ok("garbage".into()),
            Ok("garbage".into()),
            final_block("recovered"),
        ]);
        let uc = use_case(model, StubExecutor::new(), RunConfig::default());

        let result = uc.execute("task", &NoRunObserver).await;
        assert_eq!(result.answer(), Some("recovered"));
        assert_eq!(result.iterations.len(), 3);
    }

    #[tokio::test]
    async fn test_iteration_cap_fires() {
        let replies = (0..20)
            .map(|_| query_block("ping", "{}"))
            .collect::<Vec<_>>();
        let model = ScriptedModel::new(replies);
        let config = RunConfig {
            max_iterations: 5,
            ..RunConfig::default()
        };
        let uc = use_case(model, StubExecutor::new(), config);

        let result = uc.execute("task", &NoRunObserver).await;
        assert_eq!(result.outcome, RunOutcome::MaxIterationsExceeded);
        assert_eq!(result.iterations.len(), 5);
        assert_eq!(uc.executor.call_count(), 5);
    }

    #[tokio::test]
    async fn test_model_unavailable_after_bounded_retries() {
        let model = ScriptedModel::new(vec![
            Err(ModelError::Transport("connection refused".into())),
            Err(ModelError::Transport("connection refused".into())),
            Err(ModelError::Transport("connection refused".into())),
        ]);
        let config = RunConfig {
            max_model_retries: 2,
            ..RunConfig::default()
        };
        let uc = use_case(model, StubExecutor::new(), config);

        let result = uc.execute("task", &NoRunObserver).await;
        assert!(matches!(result.outcome, RunOutcome::ModelUnavailable { .. }));
        // Initial attempt plus two retries.
        assert_eq!(uc.model.requests(), 3);
        assert!(result.iterations.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_tool_feeds_back_without_ending_the_run() {
        let model = ScriptedModel::new(vec![
            query_block("summon_demon", "{}"),
            final_block("done without demons"),
        ]);
        let uc = use_case(model, StubExecutor::new(), RunConfig::default());

        let result = uc.execute("task", &NoRunObserver).await;
        assert_eq!(result.answer(), Some("done without demons"));
        let first = &result.iterations[0];
        assert!(first.execution_error.as_deref().unwrap().contains("summon_demon"));
        assert!(first.result.is_none());
        assert_eq!(uc.executor.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_model_timeout_counts_as_retryable() {
        struct SleepyModel;

        #[async_trait]
        impl ModelClient for SleepyModel {
            async fn generate(&self, _messages: &[Message]) -> Result<String, ModelError> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok("never".into())
            }
        }

        let config = RunConfig {
            max_model_retries: 1,
            model_timeout: Duration::from_secs(5),
            ..RunConfig::default()
        };
        let uc = RunPlanUseCase::new(Arc::new(SleepyModel), Arc::new(StubExecutor::new()))
            .with_config(config);

        let result = uc.execute("task", &NoRunObserver).await;
        match result.outcome {
            RunOutcome::ModelUnavailable { reason } => assert!(reason.contains("timed out")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_final_answer_text_falls_back_to_raw_args() {
        let mut args = Args::new();
        args.insert("summary".into(), serde_json::json!("short"));
        assert_eq!(final_answer_text(&args), "{\"summary\":\"short\"}");

        let mut args = Args::new();
        args.insert("text".into(), serde_json::json!("the answer"));
        assert_eq!(final_answer_text(&args), "the answer");
    }
}
