use indicatif::ProgressBar;
use regex::Regex;
use reqwest::blocking::Client;
use thiserror::Error;

use crate::coupon::CouponImage;
use crate::exec::ExecMode;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// An image URL that couldn't be downloaded, with the reason.
#[derive(Debug)]
pub struct FetchFailure {
    pub url: String,
    pub error: FetchError,
}

/// Result of resolving a batch of URLs into images.
///
/// Failures are carried alongside the successes instead of aborting the
/// batch; a failed entry never reaches the classifier.
#[derive(Debug, Default)]
pub struct FetchBatch {
    pub images: Vec<CouponImage>,
    pub failures: Vec<FetchFailure>,
}

/// Extracts coupon image URLs from a page, one pattern match per HTML line,
/// with an optional prefix rewrite. The database lists thumbnail paths like
/// `/coupons/thumbs/tn_x.png`; rewriting the prefix yields the absolute
/// full-resolution URL.
#[derive(Debug, Clone)]
pub struct ScrapeRule {
    pattern: Regex,
    rewrite: Option<(String, String)>,
}

impl ScrapeRule {
    pub fn new(pattern: Regex) -> Self {
        Self {
            pattern,
            rewrite: None,
        }
    }

    pub fn with_rewrite(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.rewrite = Some((from.into(), to.into()));
        self
    }

    /// First match per line, rewritten, deduplicated in first-seen order.
    pub fn extract(&self, html: &str) -> Vec<String> {
        let mut urls = Vec::new();
        for line in html.lines() {
            let Some(found) = self.pattern.find(line) else {
                continue;
            };
            let url = match &self.rewrite {
                Some((from, to)) => found.as_str().replace(from.as_str(), to),
                None => found.as_str().to_string(),
            };
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
        urls
    }
}

/// GET a page body as text.
pub fn fetch_page(client: &Client, url: &str) -> Result<String, FetchError> {
    let body = client.get(url).send()?.error_for_status()?.text()?;
    Ok(body)
}

/// Download every URL into a [`CouponImage`], fanning out per `mode`.
///
/// Each image is named after its URL's last path segment. The progress bar
/// ticks once per URL whether it succeeded or not.
pub fn fetch_images(
    client: &Client,
    urls: Vec<String>,
    mode: ExecMode,
    progress: &ProgressBar,
) -> FetchBatch {
    let results = mode.run(urls, |url| {
        let outcome = fetch_one(client, &url);
        progress.inc(1);
        (url, outcome)
    });
    progress.finish();

    let mut batch = FetchBatch::default();
    for (url, outcome) in results {
        match outcome {
            Ok(image) => batch.images.push(image),
            Err(error) => batch.failures.push(FetchFailure { url, error }),
        }
    }
    batch
}

fn fetch_one(client: &Client, url: &str) -> Result<CouponImage, FetchError> {
    let bytes = client.get(url).send()?.error_for_status()?.bytes()?;
    Ok(CouponImage::from_url(url, bytes.to_vec()))
}
