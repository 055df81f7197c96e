use std::num::NonZeroUsize;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_page_buffer")]
    pub page_buffer: usize,

    /// The delay in seconds between two request starts
    #[serde(default = "default_download_delay")]
    pub download_delay: f32,

    /// Spread the delay between 0.5x and 1.5x of `download_delay`
    #[serde(default = "default_randomize_delay")]
    pub randomize_delay: bool,

    /// The maximum number of downloads in flight
    #[serde(default = "default_concurrent_requests")]
    pub concurrent_requests: NonZeroUsize,

    #[serde(default = "default_on_dl_error")]
    pub on_dl_error: OnError,

    #[serde(default = "default_on_scrap_error")]
    pub on_scrap_error: OnError,

    #[serde(default = "default_handle_sigint")]
    pub handle_sigint: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            page_buffer: default_page_buffer(),
            download_delay: default_download_delay(),
            randomize_delay: default_randomize_delay(),
            concurrent_requests: default_concurrent_requests(),
            on_dl_error: default_on_dl_error(),
            on_scrap_error: default_on_scrap_error(),
            handle_sigint: default_handle_sigint(),
        }
    }
}

impl CrawlerConfig {
    pub fn delay(&self) -> Duration {
        if self.download_delay.is_finite() && self.download_delay > 0. {
            Duration::from_secs_f32(self.download_delay)
        } else {
            Duration::ZERO
        }
    }
}

fn default_user_agent() -> String {
    String::from(
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
    )
}

fn default_page_buffer() -> usize {
    10_000
}

fn default_download_delay() -> f32 {
    2.
}

fn default_randomize_delay() -> bool {
    true
}

fn default_concurrent_requests() -> NonZeroUsize {
    NonZeroUsize::MIN
}

fn default_on_dl_error() -> OnError {
    OnError::SkipAndLog
}

// Scrapers only report output errors
fn default_on_scrap_error() -> OnError {
    OnError::Fail
}

fn default_handle_sigint() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum OnError {
    Fail,
    SkipAndLog,
}
