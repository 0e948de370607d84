mod geo_resolver;
mod json_fetcher;

pub use geo_resolver::GeoResolver;
pub use json_fetcher::{FetchError, JsonFetcher};
