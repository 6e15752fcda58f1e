use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::Local;
use futures::FutureExt;
use futures::future::BoxFuture;
use scraper::Html;
use serde::Serialize;
use url::Url;

use crate::config::MissingAttrPolicy;
use crate::error::CrawlError;
use crate::extract::extract_level;
use crate::fetch::PageFetcher;
use crate::scheduler::BranchScheduler;
use crate::selector::LevelSpec;
use crate::sink::RecordSink;

/// Totals for one finished crawl run.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlSummary {
    pub started: String,
    pub elapsed_seconds: f64,
    pub pages_crawled: usize,
    pub records_written: usize,
    pub branches_abandoned: usize,
    pub errors: Vec<String>,
}

/// Recursive orchestrator for the whole crawl.
///
/// Each branch is one task: fetch a page, align its extraction, then either
/// fan out one child branch per redirection link or emit completed records.
/// Partial records are copied at every fan-out boundary, so branches share
/// nothing but the scheduler and the sink.
pub struct CrawlEngine<F, W> {
    inner: Arc<EngineInner<F, W>>,
}

struct EngineInner<F, W> {
    fetcher: F,
    levels: Vec<LevelSpec>,
    domain: String,
    missing: MissingAttrPolicy,
    scheduler: Arc<BranchScheduler>,
    sink: RecordSink<W>,
    pages_crawled: AtomicUsize,
    records_written: AtomicUsize,
    branches_abandoned: AtomicUsize,
    errors: Mutex<Vec<String>>,
    fatal: Mutex<Option<String>>,
}

impl<F, W> CrawlEngine<F, W>
where
    F: PageFetcher + 'static,
    W: Write + Send + 'static,
{
    pub fn new(
        fetcher: F,
        levels: Vec<LevelSpec>,
        domain: String,
        missing: MissingAttrPolicy,
        concurrency: usize,
        sink: RecordSink<W>,
    ) -> Result<Self, CrawlError> {
        if levels.is_empty() {
            return Err(CrawlError::config("no level specs configured"));
        }
        let scheduler = Arc::new(BranchScheduler::new(concurrency)?);
        Ok(Self {
            inner: Arc::new(EngineInner {
                fetcher,
                levels,
                domain,
                missing,
                scheduler,
                sink,
                pages_crawled: AtomicUsize::new(0),
                records_written: AtomicUsize::new(0),
                branches_abandoned: AtomicUsize::new(0),
                errors: Mutex::new(Vec::new()),
                fatal: Mutex::new(None),
            }),
        })
    }

    /// Handle for external cancellation (e.g. Ctrl-C).
    pub fn scheduler(&self) -> Arc<BranchScheduler> {
        Arc::clone(&self.inner.scheduler)
    }

    /// Crawls every start URL to completion and returns the run totals.
    ///
    /// Per-branch faults are logged and abandoned; a configuration fault
    /// discovered mid-run cancels admission, lets in-flight branches drain
    /// and fails the run.
    pub async fn run(&self, start_urls: Vec<String>) -> Result<CrawlSummary, CrawlError> {
        let started = Local::now().to_rfc3339();
        let clock = Instant::now();

        for url in start_urls {
            EngineInner::spawn_branch(&self.inner, url, 0, Vec::new());
        }
        self.inner.scheduler.drain().await;
        self.inner.sink.flush()?;

        if let Some(message) = self.inner.fatal.lock().unwrap().take() {
            return Err(CrawlError::Config(message));
        }

        Ok(CrawlSummary {
            started,
            elapsed_seconds: clock.elapsed().as_secs_f64(),
            pages_crawled: self.inner.pages_crawled.load(Ordering::SeqCst),
            records_written: self.inner.records_written.load(Ordering::SeqCst),
            branches_abandoned: self.inner.branches_abandoned.load(Ordering::SeqCst),
            errors: self.inner.errors.lock().unwrap().clone(),
        })
    }
}

impl<F, W> EngineInner<F, W>
where
    F: PageFetcher + 'static,
    W: Write + Send + 'static,
{
    /// Offers one branch to the scheduler. Registration happens before the
    /// task is spawned so `drain` can never observe a spurious zero.
    fn spawn_branch(this: &Arc<Self>, url: String, level: usize, partial: Vec<String>) {
        if this.scheduler.is_cancelled() {
            return;
        }
        this.scheduler.register();
        tokio::spawn(Arc::clone(this).run_branch(url, level, partial));
    }

    /// One branch end to end: wait for admission, visit the page, fan out.
    ///
    /// Boxed because the branch recursion flows through spawned tasks.
    fn run_branch(
        self: Arc<Self>,
        url: String,
        level: usize,
        partial: Vec<String>,
    ) -> BoxFuture<'static, ()> {
        async move {
            let permit = self.scheduler.admit().await;
            if permit.is_none() || self.scheduler.is_cancelled() {
                self.scheduler.finish();
                return;
            }

            match self.visit(&url, level, partial).await {
                Ok(children) => {
                    drop(permit);
                    for (target, child_partial) in children {
                        Self::spawn_branch(&self, target, level + 1, child_partial);
                    }
                }
                Err(e) => {
                    self.branches_abandoned.fetch_add(1, Ordering::SeqCst);
                    log::error!("abandoning branch at {url} (level {level}): {e}");
                    self.errors.lock().unwrap().push(e.to_string());
                    if e.is_fatal() {
                        *self.fatal.lock().unwrap() = Some(e.to_string());
                        self.scheduler.cancel();
                    }
                }
            }
            self.scheduler.finish();
        }
        .boxed()
    }

    /// Fetches and extracts one page, returning the child branches to spawn
    /// (empty on a terminal level, where records go straight to the sink).
    async fn visit(
        &self,
        url: &str,
        level: usize,
        partial: Vec<String>,
    ) -> Result<Vec<(String, Vec<String>)>, CrawlError> {
        let Some(level_spec) = self.levels.get(level) else {
            return Err(CrawlError::config(format!(
                "reached level {level} but only {} levels are configured",
                self.levels.len()
            )));
        };

        log::info!("crawling level {level}: {url}");
        let content = self.fetcher.fetch(url).await?;

        // The parsed DOM is not Send; keep it scoped away from await points.
        let aligned = {
            let doc = Html::parse_document(&content);
            extract_level(&doc, level_spec, self.missing)?
        };
        self.pages_crawled.fetch_add(1, Ordering::SeqCst);

        if let Some(links) = aligned.redirection_row() {
            let mut children = Vec::with_capacity(aligned.width());
            for (i, link) in links.iter().enumerate() {
                let mut child = partial.clone();
                child.extend(aligned.fragment(i));
                children.push((self.resolve_link(link), child));
            }
            log::debug!("level {level} fans out into {} branches", children.len());
            Ok(children)
        } else {
            for i in 0..aligned.width() {
                let mut record = partial.clone();
                record.extend(aligned.fragment(i));
                self.sink.append(&record)?;
                self.records_written.fetch_add(1, Ordering::SeqCst);
            }
            Ok(Vec::new())
        }
    }

    /// Absolute locators pass through; relative ones get the domain base
    /// prefixed.
    fn resolve_link(&self, raw: &str) -> String {
        if Url::parse(raw).is_ok() {
            raw.to_string()
        } else {
            format!("{}{}", self.domain, raw)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapFetcher {
        pages: HashMap<String, String>,
    }

    impl PageFetcher for MapFetcher {
        fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<String, CrawlError>> {
            async move {
                self.pages
                    .get(url)
                    .cloned()
                    .ok_or_else(|| CrawlError::Fetch {
                        url: url.to_string(),
                        reason: "HTTP error: 404 Not Found".to_string(),
                    })
            }
            .boxed()
        }
    }

    fn engine_with(
        pages: &[(&str, &str)],
        levels: &[&str],
    ) -> CrawlEngine<MapFetcher, Vec<u8>> {
        let fetcher = MapFetcher {
            pages: pages
                .iter()
                .map(|(url, html)| (url.to_string(), html.to_string()))
                .collect(),
        };
        let levels = levels
            .iter()
            .map(|spec| LevelSpec::parse(spec).unwrap())
            .collect();
        CrawlEngine::new(
            fetcher,
            levels,
            "https://site.test".to_string(),
            MissingAttrPolicy::Abandon,
            4,
            RecordSink::new(Vec::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_resolve_link() {
        let engine = engine_with(&[], &["information|text|combination|p"]);
        assert_eq!(
            engine.inner.resolve_link("/jobs/1"),
            "https://site.test/jobs/1"
        );
        assert_eq!(
            engine.inner.resolve_link("https://other.test/x"),
            "https://other.test/x"
        );
    }

    #[tokio::test]
    async fn test_terminal_level_emits_one_record_per_index() {
        let engine = engine_with(
            &[(
                "https://site.test/start",
                r#"<h2 class="n">A</h2><h2 class="n">B</h2><span class="t">x</span>"#,
            )],
            &["information|text|separate|h2.n,information|text|combination|span.t"],
        );
        let summary = engine
            .run(vec!["https://site.test/start".to_string()])
            .await
            .unwrap();
        assert_eq!(summary.pages_crawled, 1);
        assert_eq!(summary.records_written, 2);
        assert_eq!(summary.branches_abandoned, 0);
    }

    #[tokio::test]
    async fn test_depth_overflow_is_fatal() {
        let engine = engine_with(
            &[
                (
                    "https://site.test/start",
                    r#"<a class="m" href="/next">go</a>"#,
                ),
                ("https://site.test/next", "<p>leaf</p>"),
            ],
            // Deepest level still redirects, so its children overflow.
            &["redirection|attribute href|separate|a.m"],
        );
        let err = engine
            .run(vec!["https://site.test/start".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, CrawlError::Config(_)));
    }

    #[tokio::test]
    async fn test_validation_fault_abandons_branch_only() {
        let engine = engine_with(
            &[
                (
                    "https://site.test/start",
                    r#"<a class="m" href="/good">1</a><a class="m" href="/bad">2</a>"#,
                ),
                (
                    "https://site.test/good",
                    r#"<p class="d">ok</p><i class="e">tag</i>"#,
                ),
                // Two separate rows with different lengths: validation fault.
                (
                    "https://site.test/bad",
                    r#"<p class="d">1</p><p class="d">2</p><i class="e">z</i>"#,
                ),
            ],
            &[
                "redirection|attribute href|separate|a.m",
                "information|text|separate|p.d,information|text|separate|i.e",
            ],
        );
        let summary = engine
            .run(vec!["https://site.test/start".to_string()])
            .await
            .unwrap();
        assert_eq!(summary.branches_abandoned, 1);
        assert_eq!(summary.records_written, 1);
        assert_eq!(summary.errors.len(), 1);
    }
}
