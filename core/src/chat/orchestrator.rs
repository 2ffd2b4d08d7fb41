use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use opentelemetry::{
    global,
    metrics::{Counter, Histogram},
    KeyValue,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::time::timeout;
use tracing::{debug, info, warn, Span};

use super::intention::{ToolResolution, UserIntention, INTENT_FALLBACK_RESPONSE};
use super::json::parse_json_object;
use super::outcome::{Stage, StageOutcome};
use super::prompts;
use crate::llm::{ChatMessage, CompletionClient};
use crate::tools::{ToolArguments, ToolDescriptor, ToolError, ToolRegistry};
use crate::{CalendarError, Result};

/// Argument key under which the caller's access token is handed to tools
pub const ACCESS_TOKEN_ARGUMENT: &str = "accessToken";

/// Rejection text for empty messages
pub const EMPTY_MESSAGE_ERROR: &str = "Message cannot be empty.";

/// Tool returned no text content
pub const TOOL_NO_RESPONSE: &str = "The action completed but did not return any response.";

/// Tool could not be reached or failed
pub const TOOL_FAILURE_RESPONSE: &str =
    "I'm sorry, I couldn't complete that action because the calendar service is unavailable right now.";

/// Drafting round-trip failed after the tool ran
pub const DRAFT_FAILURE_RESPONSE: &str =
    "Your request was completed, but I had trouble formatting the response.";

/// Prefix of the reply when the tool chain breaks
pub const GENERIC_APOLOGY: &str = "I'm sorry, something went wrong while handling your request.";

/// Per round-trip bounds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorOptions {
    pub llm_timeout_ms: u64,
    pub tool_timeout_ms: u64,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            llm_timeout_ms: std::env::var("CHAT_LLM_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(45_000),
            tool_timeout_ms: std::env::var("CHAT_TOOL_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30_000),
        }
    }
}

/// Which branch of the flow produced the reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyPath {
    /// The intention's own response was returned
    Direct,
    /// A tool ran and its result was drafted into a reply
    ToolDrafted,
    /// The tool chain returned an error; apology plus the intention's
    /// response. Each stage absorbs its own failures, so this only covers
    /// errors that escape them.
    Degraded,
}

impl ReplyPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplyPath::Direct => "direct",
            ReplyPath::ToolDrafted => "tool_drafted",
            ReplyPath::Degraded => "degraded",
        }
    }
}

/// Final answer for one message
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub text: String,
    pub path: ReplyPath,
    pub intention: UserIntention,
}

struct ChatMetrics {
    messages_counter: Counter<u64>,
    intents_counter: Counter<u64>,
    tool_calls_counter: Counter<u64>,
    degraded_counter: Counter<u64>,
    llm_latency: Histogram<f64>,
    tool_latency: Histogram<f64>,
}

impl ChatMetrics {
    fn new() -> Self {
        let meter = global::meter("aicalendar.chat");

        Self {
            messages_counter: meter
                .u64_counter("aicalendar.chat.messages_total")
                .with_description("Total number of processed messages")
                .init(),
            intents_counter: meter
                .u64_counter("aicalendar.chat.intents_total")
                .with_description("Determined intents by category")
                .init(),
            tool_calls_counter: meter
                .u64_counter("aicalendar.chat.tool_calls_total")
                .with_description("Total number of tool calls")
                .init(),
            degraded_counter: meter
                .u64_counter("aicalendar.chat.degraded_total")
                .with_description("Stages that fell back to scripted text")
                .init(),
            llm_latency: meter
                .f64_histogram("aicalendar.chat.llm_latency_ms")
                .with_description("Completion round-trip latency in milliseconds")
                .init(),
            tool_latency: meter
                .f64_histogram("aicalendar.chat.tool_latency_ms")
                .with_description("Tool round-trip latency in milliseconds")
                .init(),
        }
    }
}

/// Turns one user message into one reply, optionally by way of a tool call.
///
/// Flow: intention → (arguments → execution → draft | direct response).
/// Only an empty message is rejected; every other failure degrades to
/// scripted text.
pub struct ChatOrchestrator {
    llm: Arc<dyn CompletionClient>,
    tools: Arc<dyn ToolRegistry>,
    options: OrchestratorOptions,
    metrics: ChatMetrics,
}

impl ChatOrchestrator {
    pub fn new(
        llm: Arc<dyn CompletionClient>,
        tools: Arc<dyn ToolRegistry>,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            llm,
            tools,
            options,
            metrics: ChatMetrics::new(),
        }
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    /// Reply text for `message`, acting on behalf of `caller_token` when a
    /// tool is called.
    pub async fn process_message(&self, message: &str, caller_token: Option<&str>) -> Result<String> {
        self.process_message_detailed(message, caller_token)
            .await
            .map(|reply| reply.text)
    }

    #[tracing::instrument(
        name = "chat.process_message",
        skip_all,
        fields(message_len = message.len(), intent, path)
    )]
    pub async fn process_message_detailed(
        &self,
        message: &str,
        caller_token: Option<&str>,
    ) -> Result<ChatReply> {
        if message.trim().is_empty() {
            return Err(CalendarError::InvalidInput(EMPTY_MESSAGE_ERROR.to_string()));
        }
        self.metrics.messages_counter.add(1, &[]);

        let intention = self.determine_intention(message).await;
        Span::current().record("intent", intention.intent.as_str());

        let reply = if intention.has_resolved_tool() {
            match self.run_tool_chain(&intention, message, caller_token).await {
                Ok(text) => ChatReply {
                    text,
                    path: ReplyPath::ToolDrafted,
                    intention,
                },
                Err(e) => {
                    warn!(target: "chat_orchestrator", error = %e, "Tool chain failed; replying with apology");
                    ChatReply {
                        text: degraded_reply(&intention.response),
                        path: ReplyPath::Degraded,
                        intention,
                    }
                }
            }
        } else {
            let text = if intention.response.trim().is_empty() {
                INTENT_FALLBACK_RESPONSE.to_string()
            } else {
                intention.response.clone()
            };
            ChatReply {
                text,
                path: ReplyPath::Direct,
                intention,
            }
        };

        Span::current().record("path", reply.path.as_str());
        info!(
            target: "chat_orchestrator",
            intent = %reply.intention.intent,
            path = reply.path.as_str(),
            "Message processed"
        );
        Ok(reply)
    }

    /// Errors only when `execute_tool` has no resolved tool to run; stage
    /// failures inside the chain already settle to scripted text.
    async fn run_tool_chain(
        &self,
        intention: &UserIntention,
        message: &str,
        caller_token: Option<&str>,
    ) -> Result<String> {
        let arguments = self.extract_tool_arguments(intention, message).await;
        let tool_result = self.execute_tool(intention, arguments, caller_token).await?;
        Ok(self.draft_user_response(&tool_result, message).await)
    }

    /// Classify `message` and select a tool. Never fails: any error yields
    /// `UserIntention::fallback()`.
    pub async fn determine_intention(&self, message: &str) -> UserIntention {
        let result = self.try_determine_intention(message).await;
        let intention = self
            .settle(Stage::Intention, result, UserIntention::fallback)
            .into_value();

        self.metrics
            .intents_counter
            .add(1, &[KeyValue::new("intent", intention.intent.as_str())]);
        debug!(
            target: "chat_orchestrator",
            intent = %intention.intent,
            confidence = intention.confidence.as_str(),
            tool = %intention.tool_to_call,
            "Intention determined"
        );
        intention
    }

    async fn try_determine_intention(&self, message: &str) -> Result<UserIntention> {
        let tools = self.list_tools().await?;

        let messages = [
            ChatMessage::system(prompts::intention_prompt(&tools)),
            ChatMessage::user(message),
        ];
        let raw = self.complete(Stage::Intention, &messages).await?;

        let mut intention = UserIntention::from_model_output(&raw)?;
        match intention.resolve_tool(&tools) {
            ToolResolution::Resolved(name) => {
                debug!(target: "chat_orchestrator", tool = %name, "Tool resolved");
            }
            ToolResolution::Unknown(name) => {
                warn!(
                    target: "chat_orchestrator",
                    tool = %name,
                    available = tools.len(),
                    "Model selected a tool that is not available; ignoring it"
                );
            }
            ToolResolution::NotRequested => {}
        }
        Ok(intention)
    }

    /// Arguments for the intention's resolved tool; empty when there is no
    /// tool or extraction fails. Only keys declared by the tool schema
    /// survive.
    pub async fn extract_tool_arguments(
        &self,
        intention: &UserIntention,
        message: &str,
    ) -> ToolArguments {
        let Some(tool) = intention.resolved_tool.as_ref() else {
            return ToolArguments::new();
        };
        let result = self.try_extract_arguments(tool, message).await;
        self.settle(Stage::Arguments, result, ToolArguments::new)
            .into_value()
    }

    async fn try_extract_arguments(
        &self,
        tool: &ToolDescriptor,
        message: &str,
    ) -> Result<ToolArguments> {
        let messages = [
            ChatMessage::system(prompts::argument_prompt(
                tool,
                Local::now(),
                ACCESS_TOKEN_ARGUMENT,
            )),
            ChatMessage::user(message),
        ];
        let raw = self.complete(Stage::Arguments, &messages).await?;

        let (arguments, dropped) = ToolArguments::validated(parse_json_object(&raw)?, tool);
        if !dropped.is_empty() {
            warn!(
                target: "chat_orchestrator",
                tool = %tool.name,
                dropped = ?dropped,
                "Dropping arguments not declared by the tool schema"
            );
        }
        debug!(
            target: "chat_orchestrator",
            tool = %tool.name,
            keys = ?arguments.keys().collect::<Vec<_>>(),
            "Arguments extracted"
        );
        Ok(arguments)
    }

    /// Run the resolved tool with `arguments`, returning its first text
    /// block. Errors only when the intention has no resolved tool; tool
    /// failures come back as scripted text.
    pub async fn execute_tool(
        &self,
        intention: &UserIntention,
        mut arguments: ToolArguments,
        caller_token: Option<&str>,
    ) -> Result<String> {
        let tool = intention
            .resolved_tool
            .as_ref()
            .ok_or_else(|| CalendarError::Internal("No resolved tool to execute".into()))?;

        match caller_token.map(str::trim).filter(|t| !t.is_empty()) {
            Some(token) => {
                arguments.insert(ACCESS_TOKEN_ARGUMENT, json!(token));
            }
            None => {
                arguments.remove(ACCESS_TOKEN_ARGUMENT);
            }
        }

        let started = Instant::now();
        let wait = Duration::from_millis(self.options.tool_timeout_ms);
        let result = match timeout(wait, self.tools.call_tool(&tool.name, arguments)).await {
            Ok(r) => r,
            Err(_) => Err(ToolError::Timeout),
        };
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        let status = if result.is_ok() { "success" } else { "error" };
        self.metrics.tool_calls_counter.add(
            1,
            &[
                KeyValue::new("tool", tool.name.clone()),
                KeyValue::new("status", status),
            ],
        );
        self.metrics
            .tool_latency
            .record(elapsed_ms, &[KeyValue::new("tool", tool.name.clone())]);
        info!(target: "chat_orchestrator", tool = %tool.name, status, latency_ms = elapsed_ms, "Tool invocation finished");

        let text = result.map_err(CalendarError::from).map(|r| {
            if r.is_error() {
                warn!(target: "chat_orchestrator", tool = %tool.name, "Tool reported an error result");
            }
            match r.first_text() {
                Some(text) => text.to_string(),
                None => {
                    warn!(target: "chat_orchestrator", tool = %tool.name, "Tool returned no text content");
                    TOOL_NO_RESPONSE.to_string()
                }
            }
        });
        Ok(self
            .settle(Stage::Execution, text, || TOOL_FAILURE_RESPONSE.to_string())
            .into_value())
    }

    /// Phrase the tool result as a friendly reply to `original_message`
    pub async fn draft_user_response(&self, tool_result: &str, original_message: &str) -> String {
        let messages = [
            ChatMessage::system(prompts::DRAFT_SYSTEM_PROMPT),
            ChatMessage::user(prompts::draft_prompt(tool_result, original_message)),
        ];
        let result = self
            .complete(Stage::Draft, &messages)
            .await
            .and_then(|text| {
                let text = text.trim();
                if text.is_empty() {
                    Err(CalendarError::Llm("empty draft completion".into()))
                } else {
                    Ok(text.to_string())
                }
            });
        self.settle(Stage::Draft, result, || DRAFT_FAILURE_RESPONSE.to_string())
            .into_value()
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let wait = Duration::from_millis(self.options.tool_timeout_ms);
        match timeout(wait, self.tools.list_tools()).await {
            Ok(tools) => Ok(tools?),
            Err(_) => Err(ToolError::Timeout.into()),
        }
    }

    async fn complete(&self, stage: Stage, messages: &[ChatMessage]) -> Result<String> {
        let started = Instant::now();
        let wait = Duration::from_millis(self.options.llm_timeout_ms);
        let result = match timeout(wait, self.llm.complete(messages)).await {
            Ok(r) => r,
            Err(_) => Err(CalendarError::Llm(format!(
                "completion timed out after {} ms",
                self.options.llm_timeout_ms
            ))),
        };
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.metrics
            .llm_latency
            .record(elapsed_ms, &[KeyValue::new("stage", stage.as_str())]);
        debug!(target: "chat_orchestrator", %stage, latency_ms = elapsed_ms, ok = result.is_ok(), "Completion finished");
        result
    }

    fn settle<T>(
        &self,
        stage: Stage,
        result: Result<T>,
        fallback: impl FnOnce() -> T,
    ) -> StageOutcome<T> {
        let outcome = StageOutcome::from_result(stage, result, fallback);
        if outcome.is_degraded() {
            self.metrics
                .degraded_counter
                .add(1, &[KeyValue::new("stage", stage.as_str())]);
        }
        outcome
    }
}

fn degraded_reply(intention_response: &str) -> String {
    let response = intention_response.trim();
    if response.is_empty() {
        GENERIC_APOLOGY.to_string()
    } else {
        format!("{} {}", GENERIC_APOLOGY, response)
    }
}
