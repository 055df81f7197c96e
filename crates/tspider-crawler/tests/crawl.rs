use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tspider_crawler::{
    crawl_site, CrawlerConfig, OnError, Page, PageLocation, Request, Scrapable, ScrapingContext,
};

async fn serve(pages: HashMap<&'static str, &'static str>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let pages = pages.clone();
            tokio::spawn(async move {
                let mut buf = vec![0; 4096];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let req = String::from_utf8_lossy(&buf[..n]).to_string();
                let path = req.split_whitespace().nth(1).unwrap_or("/");
                let resp = match pages.get(path) {
                    Some(body) => format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\
                         Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    ),
                    None => String::from(
                        "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                    ),
                };
                socket.write_all(resp.as_bytes()).await.ok();
                socket.shutdown().await.ok();
            });
        }
    });
    format!("http://{addr}")
}

#[derive(Debug, Clone, Default)]
struct Journal {
    scraped: Arc<Mutex<Vec<(String, usize)>>>,
    finalized: Arc<Mutex<bool>>,
}

#[derive(Debug, Clone)]
struct DummyConfig {
    base: String,
    journal: Journal,
}

/// Follows every word starting with `/` in the page body, `/boom` fails.
struct DummyScraper {
    config: DummyConfig,
}

impl Scrapable for DummyScraper {
    type Config = DummyConfig;
    type Meta = usize;

    fn new(config: &Self::Config) -> anyhow::Result<Self> {
        Ok(Self {
            config: config.clone(),
        })
    }

    fn seed(config: &Self::Config) -> Vec<Request<usize>> {
        vec![Request::new(format!("{}/", config.base), 0)]
    }

    fn accept(&self, url: &str) -> bool {
        !url.ends_with("/offsite")
    }

    fn scrap(&mut self, page: Page<usize>, ctx: &mut ScrapingContext<usize>) -> anyhow::Result<()> {
        let url = match &page.location {
            PageLocation::Url(url) => url.clone(),
            PageLocation::Path(_) => anyhow::bail!("Unexpected path"),
        };
        self.config
            .journal
            .scraped
            .lock()
            .unwrap()
            .push((url.clone(), page.meta));
        for word in page.body.split_whitespace() {
            if word.starts_with('/') {
                ctx.send_request(Request::new(
                    format!("{}{word}", self.config.base),
                    page.meta + 1,
                ));
            }
        }
        if url.ends_with("/boom") {
            anyhow::bail!("Boom");
        }
        Ok(())
    }

    fn finalizer(&mut self) -> anyhow::Result<()> {
        *self.config.journal.finalized.lock().unwrap() = true;
        Ok(())
    }
}

fn crawler_conf() -> CrawlerConfig {
    CrawlerConfig {
        download_delay: 0.,
        handle_sigint: false,
        ..Default::default()
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn crawl_follows_accepted_requests() {
    let base = serve(HashMap::from([
        ("/", "/a /b /offsite /missing"),
        ("/a", "/c"),
        ("/b", "nothing here"),
        ("/c", ""),
        ("/offsite", "/never"),
    ]))
    .await;
    let journal = Journal::default();
    let scraper_conf = DummyConfig {
        base: base.clone(),
        journal: journal.clone(),
    };

    crawl_site::<DummyScraper>(&crawler_conf(), &scraper_conf)
        .await
        .unwrap();

    let mut scraped = journal.scraped.lock().unwrap().clone();
    scraped.sort();
    assert_eq!(
        vec![
            (format!("{base}/"), 0),
            (format!("{base}/a"), 1),
            (format!("{base}/b"), 1),
            (format!("{base}/c"), 2),
        ],
        scraped
    );
    assert!(*journal.finalized.lock().unwrap());
}

#[tokio::test(flavor = "multi_thread")]
async fn crawl_stops_on_scrap_error() {
    let base = serve(HashMap::from([("/", "/boom"), ("/boom", "/a"), ("/a", "")])).await;
    let journal = Journal::default();
    let scraper_conf = DummyConfig {
        base,
        journal: journal.clone(),
    };
    let crawler_conf = CrawlerConfig {
        on_scrap_error: OnError::Fail,
        ..crawler_conf()
    };

    let err = crawl_site::<DummyScraper>(&crawler_conf, &scraper_conf)
        .await
        .unwrap_err();

    assert!(format!("{err:#}").contains("Boom"));
    assert!(*journal.finalized.lock().unwrap());
}

#[tokio::test(flavor = "multi_thread")]
async fn crawl_skips_scrap_errors_when_asked() {
    let base = serve(HashMap::from([("/", "/boom"), ("/boom", "/a"), ("/a", "")])).await;
    let journal = Journal::default();
    let scraper_conf = DummyConfig {
        base: base.clone(),
        journal: journal.clone(),
    };
    let crawler_conf = CrawlerConfig {
        on_scrap_error: OnError::SkipAndLog,
        ..crawler_conf()
    };

    crawl_site::<DummyScraper>(&crawler_conf, &scraper_conf)
        .await
        .unwrap();

    assert_eq!(3, journal.scraped.lock().unwrap().len());
}

#[tokio::test(flavor = "multi_thread")]
async fn crawl_fails_on_download_error_when_asked() {
    let base = serve(HashMap::from([("/", "/missing")])).await;
    let scraper_conf = DummyConfig {
        base,
        journal: Journal::default(),
    };
    let crawler_conf = CrawlerConfig {
        on_dl_error: OnError::Fail,
        ..crawler_conf()
    };

    let err = crawl_site::<DummyScraper>(&crawler_conf, &scraper_conf)
        .await
        .unwrap_err();

    assert!(format!("{err:#}").contains("/missing"));
}
