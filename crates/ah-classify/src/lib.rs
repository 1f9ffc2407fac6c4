//! Classification Engine (§4.E): L1 (in-process) -> L2 (distributed) -> LLM
//! -> rule-based fallback, with an order-preserving batch API.

mod engine;
mod error;
mod fallback;
mod l1;
mod l2;
mod llm;

pub use engine::ClassificationEngine;
pub use error::{ClassifyError, Result};
pub use l2::{FaultTolerantL2, InMemoryL2Cache, L2Cache, RedisL2Cache};
pub use llm::{FakeLlmClient, HttpLlmClient, LlmClient};
