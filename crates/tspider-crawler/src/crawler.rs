use std::future::Future;
use std::io::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Error, Result};
use crossbeam_channel::{Receiver, Sender};
use flate2::read::GzDecoder;
use futures::{future, stream, try_join, StreamExt};
use lazy_static::lazy_static;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, USER_AGENT};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::config::{CrawlerConfig, OnError};
use crate::limiter::RateLimiter;
use crate::scrapable::{CountedTx, Page, PageLocation, Request, Scrapable, ScrapingContext};

lazy_static! {
    static ref HTTP_CLI: reqwest::Client = reqwest::ClientBuilder::new()
        .gzip(true)
        .deflate(true)
        .build()
        .unwrap();
}

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

async fn download<M>(config: &CrawlerConfig, request: Request<M>) -> Result<Page<M>> {
    let Request { url, meta } = request;

    let resp = HTTP_CLI
        .get(&url)
        .header(USER_AGENT, &config.user_agent)
        .header(ACCEPT, ACCEPT_HTML)
        .header(ACCEPT_LANGUAGE, "en")
        .send()
        .await
        .and_then(|resp| resp.error_for_status())
        .with_context(|| format!("Couldn't download {url}"))?;

    // Relative links are resolved against where we landed, not what we asked for
    let location = PageLocation::Url(resp.url().to_string());

    let body = match resp.headers().get(CONTENT_TYPE) {
        Some(c) if c == "application/x-gzip" || c == "application/gzip" => {
            let compressed = resp.bytes().await?;
            let mut gz = GzDecoder::new(&compressed[..]);
            let mut body = String::new();
            gz.read_to_string(&mut body)
                .with_context(|| format!("Couldn't decompress {url}"))?;
            body
        }
        _ => resp.text().await?,
    };

    log::debug!("Downloaded {location}");

    Ok(Page {
        body,
        location,
        meta,
    })
}

fn until_err<T, E>(
    err: &mut &mut Result<(), E>,
    item: Result<T, E>,
) -> impl Future<Output = Option<T>> {
    match item {
        Ok(item) => future::ready(Some(item)),
        Err(e) => {
            **err = Err(e);
            future::ready(None)
        }
    }
}

fn scrap_pages<T>(
    scraper: &mut T,
    rx_page: Receiver<Page<T::Meta>>,
    rx_stop: Receiver<()>,
    tx_url: CountedTx<T::Meta>,
    pages_out: Arc<AtomicUsize>,
    on_scrap_error: OnError,
) -> Result<()>
where
    T: Scrapable,
{
    loop {
        crossbeam_channel::select! {
            recv(rx_page) -> page => {
                let page = match page {
                    Ok(page) => page,
                    Err(_) => break,
                };
                let location = page.location.clone();
                let mut ctx = ScrapingContext::new();
                match scraper.scrap(page, &mut ctx) {
                    Ok(()) => (),
                    Err(e) => match on_scrap_error {
                        OnError::SkipAndLog => {
                            log::error!("Skipping scrap for page {location} got: {e:#}");
                        }
                        OnError::Fail => {
                            return Err(e.context(format!("Couldn't scrap page {location}")));
                        }
                    },
                }
                for request in ctx.into_requests() {
                    if scraper.accept(&request.url) {
                        tx_url.send(request);
                    } else {
                        log::debug!("Skipping offsite URL: {}", request.url);
                    }
                }
                pages_out.fetch_add(1, Ordering::SeqCst);
            },
            recv(rx_stop) -> _ => break
        }
    }
    Ok(())
}

pub async fn crawl_site<T>(crawler_conf: &CrawlerConfig, scraper_conf: &T::Config) -> Result<()>
where
    T: Scrapable + 'static,
{
    let pages_in = Arc::new(AtomicUsize::new(0));
    let pages_out = Arc::new(AtomicUsize::new(0));
    let stop = Arc::new(AtomicBool::new(false));

    let (tx_stop, rx_stop) = crossbeam_channel::bounded::<()>(1);
    let (tx_url, rx_url) = mpsc::unbounded_channel::<Request<T::Meta>>();
    let (tx_page, rx_page): (Sender<Page<T::Meta>>, _) =
        crossbeam_channel::bounded(crawler_conf.page_buffer);

    let tx_url = CountedTx::new(tx_url, pages_in.clone());

    // Worker

    let worker = {
        let tx_url = tx_url.clone();
        let pages_out = pages_out.clone();
        let scraper_conf = scraper_conf.clone();
        let on_scrap_error = crawler_conf.on_scrap_error;
        thread::Builder::new()
            .name(String::from("scraper"))
            .spawn(move || {
                let mut scraper = <T as Scrapable>::new(&scraper_conf)?;
                let res = scrap_pages(
                    &mut scraper,
                    rx_page,
                    rx_stop,
                    tx_url,
                    pages_out,
                    on_scrap_error,
                );
                let finalized = scraper.finalizer();
                res.and(finalized)
            })?
    };
    let worker = async move {
        tokio::task::spawn_blocking(move || {
            worker
                .join()
                .map_err(|_| anyhow!("Scraper worker panicked"))?
        })
        .await?
    };

    // Downloader

    let limiter = RateLimiter::new(crawler_conf.delay(), crawler_conf.randomize_delay);
    let pages_in_c = pages_in.clone();
    let stop_c = stop.clone();
    let downloader = async move {
        let stream = UnboundedReceiverStream::new(rx_url)
            .take_while(move |_| future::ready(!stop_c.load(Ordering::SeqCst)))
            .zip(stream::repeat_with(move || (pages_in_c.clone(), limiter.clone())))
            .map(|(request, (pages_in, limiter))| async move {
                limiter.acquire().await;
                download(crawler_conf, request).await.map_err(|e| {
                    pages_in.fetch_sub(1, Ordering::SeqCst);
                    e
                })
            })
            .buffer_unordered(crawler_conf.concurrent_requests.get());

        match crawler_conf.on_dl_error {
            OnError::Fail => {
                let mut err = Ok::<(), Error>(());
                stream
                    .scan(&mut err, until_err)
                    .map(|page| tx_page.send(page).ok())
                    .collect::<Vec<_>>()
                    .await;
                err
            }
            OnError::SkipAndLog => {
                stream
                    .filter_map(|dl| async move {
                        dl.map_err(|e| log::warn!("Skipping URL: {e:#}")).ok()
                    })
                    .map(|page| tx_page.send(page).ok())
                    .collect::<Vec<_>>()
                    .await;
                Ok(())
            }
        }
    };

    // Seeds

    let seeds = <T as Scrapable>::seed(scraper_conf);
    if seeds.is_empty() {
        log::warn!("Nothing to crawl, no seed was provided");
    }
    for request in seeds {
        log::info!("Seeding {}", request.url);
        tx_url.send(request);
    }
    drop(tx_url);

    // Run all tasks

    let handle_sigint = crawler_conf.handle_sigint;
    let done = async move {
        loop {
            let tick = Duration::from_secs(1);
            let interrupted = if handle_sigint {
                timeout(tick, tokio::signal::ctrl_c()).await.is_ok()
            } else {
                tokio::time::sleep(tick).await;
                false
            };
            if interrupted {
                log::warn!("Interrupted, stopping crawl");
                stop.store(true, Ordering::SeqCst);
                tx_stop.send(()).ok();
                return Ok::<_, Error>(true);
            }
            if pages_out.load(Ordering::SeqCst) == pages_in.load(Ordering::SeqCst) {
                tx_stop.send(()).ok();
                return Ok(false);
            }
        }
    };

    let ((), (), interrupted) = try_join!(worker, downloader, done)?;
    if interrupted {
        return Err(anyhow!("Interrupted"));
    }

    Ok(())
}
