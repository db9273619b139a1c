//! External services used by the research pipeline: search backends, the
//! deep-read content fetcher, run history and settings loading.

pub mod article_reader;
pub mod config;
pub mod history;
pub mod search_dispatch;
pub mod web_search;

pub use article_reader::{ContentFetcher, ContentSource, JinaReader, ReadTarget};
pub use history::{HistoryStore, JsonHistoryStore};
pub use search_dispatch::{SearchDispatcher, SpecializedTask};
pub use web_search::{GeneralSearch, GoogleCseClient, SpecializedSearch, TavilyClient};
