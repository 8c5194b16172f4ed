//! Model gateway: provider abstraction, the Anthropic adapter, and the
//! turn-level event fan-out with streaming fallback.

mod anthropic;
mod error;
mod gateway;
pub mod prompts;
mod types;

pub use anthropic::AnthropicProvider;
pub use error::{ModelError, ModelResult};
pub use gateway::{ModelGateway, TurnObserver};
pub use types::{ModelMessage, ModelProvider, StopReason, TurnEvent, TurnEventStream, TurnRequest};
