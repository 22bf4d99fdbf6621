//! Client side of toolbridge: an agent session that discovers remote tools,
//! lets a decision loop pick calls, and streams call events to an observer.

pub mod config;
pub mod events;
pub mod llm;
pub mod session;
pub mod transport;

pub use config::BridgeConfig;
pub use events::{AgentEvent, EventSink};
pub use llm::{ChatCompletionsLoop, EchoLoop, LlmConfig};
pub use session::{Session, SessionState};
pub use transport::{HttpTransport, McpClient, SseTransport};
