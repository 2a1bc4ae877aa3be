// src/pipeline/crawl.rs

//! Catalog crawling pipeline.

use std::time::Duration;

use chrono::Utc;

use crate::error::{AppError, FetchFailure, Result};
use crate::models::{CatalogYear, Config, CrawlStats};
use crate::services::ProgramCrawler;
use crate::storage::SnapshotStorage;

/// Crawl catalog years until the range ends, the listing pages keep
/// failing, or the run is interrupted.
///
/// Every complete year is written as soon as it is fetched. Run statistics
/// are written last.
pub async fn run_crawler(
    config: &Config,
    crawler: &ProgramCrawler,
    storage: &dyn SnapshotStorage,
) -> Result<CrawlStats> {
    let catalog = &config.catalog;
    let mut stats = CrawlStats::new(Utc::now());
    let mut year = CatalogYear::new(catalog.start_year_id, catalog.year_base);
    let mut consecutive_failures = 0u32;
    let delay = Duration::from_millis(catalog.year_delay_ms);

    log::info!(
        "Crawling from {} (stop after {} consecutive listing failures)",
        year.label(),
        catalog.stop_after_failures
    );

    loop {
        if catalog.end_year_id.is_some_and(|end| year.id > end) {
            log::info!("Reached end of configured year range");
            break;
        }
        if crawler.fetcher().is_cancelled() {
            stats.cancelled = true;
            break;
        }

        log::info!("=== Processing yearId={} ({}) ===", year.id_string(), year.label());
        match crawler.fetch_year(year).await {
            Ok(report) if report.cancelled => {
                log::warn!("Interrupted during {}; year not written", year.label());
                stats.cancelled = true;
                break;
            }
            Ok(report) => {
                consecutive_failures = 0;
                stats.program_count += report.snapshot.programs.len();
                stats.program_failures += report.missing_details();
                for (code, failure) in &report.failures {
                    log::debug!("{} {}: {}", year.label(), code, failure);
                }

                match storage.write_year(&report.snapshot, year.start_year()).await {
                    Ok(_) => stats.years_written.push(year.label()),
                    Err(e) => log::error!("Failed to write {}: {}", year.label(), e),
                }
            }
            Err(AppError::Fetch(FetchFailure::Cancelled { .. })) => {
                log::warn!("Interrupted before {} listing", year.label());
                stats.cancelled = true;
                break;
            }
            Err(e) => {
                stats.year_failures += 1;
                consecutive_failures += 1;
                log::warn!("List page error for {}: {}", year.label(), e);
                if consecutive_failures >= catalog.stop_after_failures {
                    log::error!(
                        "Encountered {} consecutive list-page errors, stopping",
                        consecutive_failures
                    );
                    break;
                }
            }
        }

        year = year.next();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    stats.end_time = Utc::now();
    storage.write_stats(&stats).await?;

    log::info!(
        "Crawl finished: {} years written, {} programs ({:.1}% with detail)",
        stats.years_written.len(),
        stats.program_count,
        stats.success_rate() * 100.0
    );

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    use tempfile::TempDir;

    use super::*;
    use crate::services::Fetcher;
    use crate::services::RetryPolicy;
    use crate::services::fetcher::testing::ScriptedTransport;
    use crate::storage::LocalStorage;

    const BASE: &str = "https://programs.example.edu";

    const LISTING: &str = r#"
        <div id="scrollTable"><table><tbody>
          <tr><th scope="row">Biology</th>
              <td>AS</td><td>Science</td><td>x</td><td>BIO</td></tr>
        </tbody></table></div>"#;

    const DETAIL: &str = r##"
        <div id="faqOne">
          <div class="row"><a class="classLinks" href="#"><div class="col-md-2">BIOL 1</div><div class="col-md-2">4</div></a></div>
        </div>"##;

    fn config(end_year_id: Option<u32>) -> Config {
        let mut config = Config::default();
        config.catalog.base_url = BASE.to_string();
        config.catalog.start_year_id = 8;
        config.catalog.end_year_id = end_year_id;
        config
    }

    fn setup(config: &Config) -> (Arc<ScriptedTransport>, ProgramCrawler) {
        let transport = Arc::new(ScriptedTransport::new());
        let policy = RetryPolicy {
            max_attempts: 3,
            base: Duration::from_millis(10),
            cap: Duration::from_millis(50),
        };
        let fetcher = Fetcher::new(transport.clone(), policy, 4);
        let crawler = ProgramCrawler::new(Arc::new(config.clone()), fetcher).unwrap();
        (transport, crawler)
    }

    fn serve_year(transport: &ScriptedTransport, crawler: &ProgramCrawler, id: u32) {
        let year = CatalogYear::new(id, 2010);
        transport.respond(&crawler.list_url(year), 200, LISTING);
        transport.respond(&crawler.info_url(year, "BIO"), 200, DETAIL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_after_consecutive_failures() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let config = config(None);
        let (transport, crawler) = setup(&config);

        // 08 fails, 09 succeeds, 10 and 11 fail.
        transport.respond(&crawler.list_url(CatalogYear::new(8, 2010)), 503, "");
        serve_year(&transport, &crawler, 9);
        transport.respond(&crawler.list_url(CatalogYear::new(10, 2010)), 503, "");

        let stats = run_crawler(&config, &crawler, &storage).await.unwrap();

        assert_eq!(stats.years_written, vec!["2019-2020"]);
        assert_eq!(stats.year_failures, 3);
        assert_eq!(stats.program_count, 1);
        assert_eq!(stats.program_failures, 0);
        assert!(!stats.cancelled);

        assert!(tmp.path().join("programs_2019.json").exists());
        assert!(!tmp.path().join("programs_2018.json").exists());
        assert!(tmp.path().join("stats.json").exists());

        let year12 = crawler.list_url(CatalogYear::new(12, 2010));
        assert!(transport.calls_to(&year12).is_empty());
        // 503 is retried, 404 is not.
        assert_eq!(
            transport
                .calls_to(&crawler.list_url(CatalogYear::new(10, 2010)))
                .len(),
            3
        );
        assert_eq!(
            transport
                .calls_to(&crawler.list_url(CatalogYear::new(11, 2010)))
                .len(),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_written_years_survive_a_later_stop() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let config = config(None);
        let (transport, crawler) = setup(&config);
        serve_year(&transport, &crawler, 8);

        let stats = run_crawler(&config, &crawler, &storage).await.unwrap();
        assert_eq!(stats.years_written, vec!["2018-2019"]);

        let written = storage.load_year(2018).await.unwrap().unwrap();
        assert_eq!(written.year_id, "08");
        assert_eq!(written.program_count, 1);
        assert!(written.programs[0].detail.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_year_bounds_the_run() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let config = config(Some(9));
        let (transport, crawler) = setup(&config);
        for id in 8..=10 {
            serve_year(&transport, &crawler, id);
        }

        let stats = run_crawler(&config, &crawler, &storage).await.unwrap();
        assert_eq!(stats.years_written, vec!["2018-2019", "2019-2020"]);
        assert!(!tmp.path().join("programs_2020.json").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_run_writes_no_year() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let config = config(None);
        let (transport, crawler) = setup(&config);
        serve_year(&transport, &crawler, 8);
        crawler.fetcher().shutdown_handle().store(true, Ordering::SeqCst);

        let stats = run_crawler(&config, &crawler, &storage).await.unwrap();
        assert!(stats.cancelled);
        assert!(stats.years_written.is_empty());
        assert_eq!(transport.total_calls(), 0);
        assert!(!tmp.path().join("programs_2018.json").exists());
    }
}
