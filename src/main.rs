use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use reqwest::blocking::Client;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use couponrs::classify::{Classification, classify};
use couponrs::coupon::CouponImage;
use couponrs::detect::{DEFAULT_THRESHOLD, DuplicateDetector};
use couponrs::exec::ExecMode;
use couponrs::fetch::{FetchBatch, ScrapeRule, fetch_images, fetch_page};

const DB_URL: &str = "https://www.hfqpdb.com";
const COUPON_PAGE: &str = "https://www.harborfreight.com/coupons";
const PROMO_PAGE: &str = "https://www.harborfreight.com/promotions";
const SAVE_DIR: &str = "upload_to_hfqpdb";

#[derive(Parser, Debug)]
#[command(
    name = "couponrs",
    version,
    about = "Check retailer coupons against the community coupon database"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scrape both sites, then save coupons missing from the database
    Check {
        /// Coupon database base URL
        #[arg(long, value_name = "URL", default_value = DB_URL)]
        db_url: String,
        /// Retailer coupon page
        #[arg(long, value_name = "URL", default_value = COUPON_PAGE)]
        coupon_page: String,
        /// Retailer promotions page (percent-off coupons)
        #[arg(long, value_name = "URL", default_value = PROMO_PAGE)]
        promo_page: String,
        /// Directory to save missing coupons into
        #[arg(short, long, value_name = "DIR", default_value = SAVE_DIR)]
        out: PathBuf,
        /// Minimum correlation score to call two coupons the same
        #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
        threshold: f32,
        /// Run comparisons and downloads on one thread or many
        #[arg(long, value_enum, default_value = "threaded")]
        exec: ExecMode,
        /// Print the summary as JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Score two local image files against each other
    Compare {
        a: PathBuf,
        b: PathBuf,
        #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
        threshold: f32,
    },
}

#[derive(Serialize, Debug)]
struct RunSummary {
    total_candidates: usize,
    found_count: usize,
    reference_count: usize,
    missing: Vec<String>,
    failed_urls: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            db_url,
            coupon_page,
            promo_page,
            out,
            threshold,
            exec,
            json,
        } => run_check(
            &db_url,
            &coupon_page,
            &promo_page,
            &out,
            threshold,
            exec,
            json,
        ),
        Commands::Compare { a, b, threshold } => run_compare(&a, &b, threshold),
    }
}

fn run_check(
    db_url: &str,
    coupon_page: &str,
    promo_page: &str,
    out: &Path,
    threshold: f32,
    exec: ExecMode,
    json: bool,
) -> Result<()> {
    let client = Client::builder()
        .user_agent(concat!("couponrs/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(30))
        .build()
        .context("Failed to build HTTP client")?;

    let browse_url = format!("{db_url}/browse");
    println!("▶ Scraping database listing: {browse_url}");
    let db_html =
        fetch_page(&client, &browse_url).with_context(|| format!("Failed to fetch {browse_url}"))?;
    let db_urls = database_rule(db_url).extract(&db_html);
    println!("  {} database coupon(s) listed", db_urls.len());

    println!("▶ Scraping retailer pages: {coupon_page}, {promo_page}");
    let mut site_urls = coupon_rule().extract(
        &fetch_page(&client, coupon_page)
            .with_context(|| format!("Failed to fetch {coupon_page}"))?,
    );
    for url in promo_rule().extract(
        &fetch_page(&client, promo_page)
            .with_context(|| format!("Failed to fetch {promo_page}"))?,
    ) {
        if !site_urls.contains(&url) {
            site_urls.push(url);
        }
    }
    println!("  {} site coupon(s) advertised", site_urls.len());

    println!("▶ Downloading database coupons…");
    let reference = fetch_images(&client, db_urls, exec, &download_bar()?);
    println!("▶ Downloading site coupons…");
    let candidates = fetch_images(&client, site_urls, exec, &download_bar()?);

    let failed_urls = report_failures(&reference, &candidates);

    let detector = DuplicateDetector::new(threshold);
    let result = benchmark("classifying coupons", || {
        classify(&detector, candidates.images, &reference.images, exec)
    });

    save_missing(out, &result.missing)?;

    if json {
        let summary = RunSummary {
            total_candidates: result.total_candidates,
            found_count: result.found_count,
            reference_count: result.reference_count,
            missing: result.missing.iter().map(|m| m.name().to_string()).collect(),
            failed_urls,
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    print_summary(&result, db_url, out);
    Ok(())
}

fn run_compare(a: &Path, b: &Path, threshold: f32) -> Result<()> {
    let load = |path: &Path| -> Result<CouponImage> {
        let bytes = fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
        Ok(CouponImage::new(path.to_string_lossy(), bytes))
    };
    let img_a = load(a)?;
    let img_b = load(b)?;

    let detector = DuplicateDetector::new(threshold);
    if img_a.fingerprint() == img_b.fingerprint() {
        println!("✅ Exact duplicate (identical bytes)");
        return Ok(());
    }
    match detector.similarity(&img_a, &img_b) {
        Some(score) => {
            let verdict = if detector.is_duplicate(&img_a, &img_b) {
                "duplicate"
            } else {
                "distinct"
            };
            println!("Best correlation: {score:.4} (threshold {threshold}) → {verdict}");
        }
        None => {
            println!("⚠️  Images are not comparable (undecodable, or neither fits in the other)")
        }
    }
    Ok(())
}

/// Database browse pages list thumbnails; rewrite them to the full-size URL.
fn database_rule(db_url: &str) -> ScrapeRule {
    ScrapeRule::new(Regex::new(r"/coupons/(.+?)(png|jpg)").unwrap())
        .with_rewrite("/coupons/thumbs/tn_", format!("{db_url}/coupons/"))
}

fn coupon_rule() -> ScrapeRule {
    ScrapeRule::new(
        Regex::new(
            r"https://images\.harborfreight\.com/hftweb/weblanding/coupon-deals/images/(.+?)png",
        )
        .unwrap(),
    )
}

fn promo_rule() -> ScrapeRule {
    ScrapeRule::new(
        Regex::new(r"https://images\.harborfreight\.com/hftweb/promotions(.+?)png").unwrap(),
    )
}

fn download_bar() -> Result<ProgressBar> {
    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::with_template(
        "{spinner:.green} {pos} downloaded",
    )?);
    Ok(bar)
}

/// Print every URL that failed to download, returning them for the summary.
fn report_failures(reference: &FetchBatch, candidates: &FetchBatch) -> Vec<String> {
    let failures = || reference.failures.iter().chain(candidates.failures.iter());
    if failures().next().is_some() {
        println!("\n⚠️  Failed to download:");
        for failure in failures() {
            println!("   {} ({})", failure.url, failure.error);
        }
    }
    failures().map(|f| f.url.clone()).collect()
}

/// Write the missing coupons into `out`, replacing any previous run's output.
fn save_missing(out: &Path, missing: &[CouponImage]) -> Result<()> {
    if out.exists() {
        fs::remove_dir_all(out)
            .with_context(|| format!("Failed to remove old directory {:?}", out))?;
    }
    if missing.is_empty() {
        return Ok(());
    }
    fs::create_dir_all(out).with_context(|| format!("Failed to create directory {:?}", out))?;
    for image in missing {
        let dest = out.join(image.name());
        fs::write(&dest, image.bytes())
            .with_context(|| format!("Failed to save {:?}", dest))?;
    }
    Ok(())
}

fn print_summary(result: &Classification, db_url: &str, out: &Path) {
    if !result.missing.is_empty() {
        println!("\nNot found in database:");
        for image in &result.missing {
            println!("   ▶ {}", image.name());
        }
    }

    println!(
        "\n{}/{} site coupons found in database (db coupon count={})",
        result.found_count, result.total_candidates, result.reference_count
    );
    if result.missing.is_empty() {
        println!("✅ DATABASE IS UP TO DATE");
    } else {
        println!(
            "Consider uploading the {} missing coupon(s) at {}/mass_coupon_submit",
            result.missing.len(),
            db_url
        );
        println!("Coupon save location: {}", out.display());
    }
}

/// Run `f()`, print how long it took (with `label`), and return its result.
fn benchmark<T, F: FnOnce() -> T>(label: &str, f: F) -> T {
    let start = Instant::now();
    let result = f();
    println!("⏱ {} took {:.2?}", label, start.elapsed());
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn save_missing_replaces_previous_run() {
        let temp_dir = TempDir::new().unwrap();
        let out = temp_dir.path().join("upload");

        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("stale.png"), b"from last run").unwrap();

        let missing = vec![CouponImage::new("fresh.png", b"new coupon".to_vec())];
        save_missing(&out, &missing).unwrap();

        assert!(!out.join("stale.png").exists());
        assert_eq!(fs::read(out.join("fresh.png")).unwrap(), b"new coupon");
    }

    #[test]
    fn save_missing_with_nothing_missing_leaves_no_directory() {
        let temp_dir = TempDir::new().unwrap();
        let out = temp_dir.path().join("upload");

        save_missing(&out, &[]).unwrap();
        assert!(!out.exists());
    }

    #[test]
    fn database_rule_rewrites_thumbnails_to_full_resolution() {
        let html = r#"<img src="/coupons/thumbs/tn_ITEM_123.png">"#;
        assert_eq!(
            database_rule("https://www.hfqpdb.com").extract(html),
            vec!["https://www.hfqpdb.com/coupons/ITEM_123.png"]
        );
    }

    #[test]
    fn retailer_rules_match_absolute_image_urls() {
        let coupons = "<img src=\"https://images.harborfreight.com/hftweb/weblanding/coupon-deals/images/12345_deal.png\">";
        assert_eq!(
            coupon_rule().extract(coupons),
            vec!["https://images.harborfreight.com/hftweb/weblanding/coupon-deals/images/12345_deal.png"]
        );

        let promos = "<img src=\"https://images.harborfreight.com/hftweb/promotions/20-off.png\">";
        assert_eq!(
            promo_rule().extract(promos),
            vec!["https://images.harborfreight.com/hftweb/promotions/20-off.png"]
        );
    }
}
