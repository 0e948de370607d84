mod reqwest_json_fetcher;

pub use reqwest_json_fetcher::{ReqwestJsonFetcher, DEFAULT_USER_AGENT};
