pub mod http_client;
pub mod json_repair;
pub mod prompt_store;

pub use http_client::HttpLlmClient;
pub use prompt_store::{PromptStore, TEMPLATE_NAMES};
