//! Message orchestration: intention, tool arguments, tool execution and
//! reply drafting.

mod intention;
pub mod json;
mod orchestrator;
mod outcome;
pub mod prompts;

pub use intention::{Confidence, Intent, ToolResolution, UserIntention, INTENT_FALLBACK_RESPONSE};
pub use orchestrator::{
    ChatOrchestrator, ChatReply, OrchestratorOptions, ReplyPath, ACCESS_TOKEN_ARGUMENT,
    DRAFT_FAILURE_RESPONSE, EMPTY_MESSAGE_ERROR, GENERIC_APOLOGY, TOOL_FAILURE_RESPONSE,
    TOOL_NO_RESPONSE,
};
pub use outcome::{Stage, StageOutcome};
