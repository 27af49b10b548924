pub mod browser_fetcher;
pub mod fetcher;

pub use browser_fetcher::BrowserFetcher;
pub use fetcher::{build_http_client, FetchedPage, HttpFetcher, PageFetcher};
