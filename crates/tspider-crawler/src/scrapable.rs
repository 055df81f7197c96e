use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

pub trait Scrapable {
    type Config: Clone + Send + 'static;

    /// Data carried from a request to the page it fetches
    type Meta: Send + 'static;

    fn new(config: &Self::Config) -> anyhow::Result<Self>
    where
        Self: Sized;

    fn seed(config: &Self::Config) -> Vec<Request<Self::Meta>>;

    /// Called for every follow-up request, seeds are always accepted
    fn accept(&self, _url: &str) -> bool {
        true
    }

    fn scrap(
        &mut self,
        page: Page<Self::Meta>,
        ctx: &mut ScrapingContext<Self::Meta>,
    ) -> anyhow::Result<()>;

    fn finalizer(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Request<M> {
    pub url: String,
    pub meta: M,
}

impl<M> Request<M> {
    pub fn new(url: impl Into<String>, meta: M) -> Self {
        Self {
            url: url.into(),
            meta,
        }
    }
}

#[derive(Debug)]
pub struct Page<M> {
    pub body: String,
    pub location: PageLocation,
    pub meta: M,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageLocation {
    Url(String),
    Path(PathBuf),
}

impl fmt::Display for PageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => write!(f, "{url}"),
            Self::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Collects the follow-up requests emitted while scraping one page.
#[derive(Debug)]
pub struct ScrapingContext<M> {
    requests: Vec<Request<M>>,
}

impl<M> Default for ScrapingContext<M> {
    fn default() -> Self {
        Self { requests: vec![] }
    }
}

impl<M> ScrapingContext<M> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send_request(&mut self, request: Request<M>) {
        self.requests.push(request);
    }

    pub fn requests(&self) -> &[Request<M>] {
        &self.requests
    }

    pub fn into_requests(self) -> Vec<Request<M>> {
        self.requests
    }
}

/// Request sender that keeps track of how many requests were enqueued.
#[derive(Debug)]
pub struct CountedTx<M> {
    tx: mpsc::UnboundedSender<Request<M>>,
    counter: Arc<AtomicUsize>,
}

impl<M> Clone for CountedTx<M> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            counter: self.counter.clone(),
        }
    }
}

impl<M> CountedTx<M> {
    pub fn new(tx: mpsc::UnboundedSender<Request<M>>, counter: Arc<AtomicUsize>) -> Self {
        Self { tx, counter }
    }

    pub fn send(&self, request: Request<M>) {
        // Counted first so that the crawl can't be seen as done in between
        self.counter.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = self.tx.send(request) {
            self.counter.fetch_sub(1, Ordering::SeqCst);
            log::error!("Couldn't send request: {}", e.0.url);
        }
    }
}
