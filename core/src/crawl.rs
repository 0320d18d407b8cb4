//! Two-phase crawl: walk the paginated listing to collect food codes, then
//! fetch and process each food's detail page in discovery order.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::capture::CaptureFile;
use crate::extract::{ListingEntry, parse_detail, parse_listing};
use crate::models::FoodRecord;
use crate::writer::{FoodWriter, NutrientStore, WriteSummary};

/// Source of raw HTML. The CLI implements this over HTTP; tests serve canned
/// pages.
pub trait PageFetcher {
    /// Listing page `page` (1-based).
    fn fetch_listing(&self, page: u32) -> Result<String>;
    fn fetch_detail(&self, code: &str) -> Result<String>;
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CrawlSummary {
    pub pages_visited: u32,
    pub codes_found: usize,
    pub details_fetched: usize,
    pub details_failed: usize,
    pub captured: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write: Option<WriteSummary>,
}

pub struct Crawler<'a, F: PageFetcher, S: NutrientStore> {
    fetcher: &'a F,
    capture: Option<&'a CaptureFile>,
    store: Option<&'a S>,
}

impl<'a, F: PageFetcher, S: NutrientStore> Crawler<'a, F, S> {
    pub fn new(fetcher: &'a F) -> Self {
        Self {
            fetcher,
            capture: None,
            store: None,
        }
    }

    #[must_use]
    pub fn with_capture(mut self, capture: &'a CaptureFile) -> Self {
        self.capture = Some(capture);
        self
    }

    #[must_use]
    pub fn with_store(mut self, store: &'a S) -> Self {
        self.store = Some(store);
        self
    }

    /// Walk listing pages from 1 until there is no next-page link, a page has
    /// no food links, or a fetch fails. Returns what was collected so far and
    /// the number of pages that were parsed.
    pub fn collect_codes(&self) -> (Vec<ListingEntry>, u32) {
        let mut entries = Vec::new();
        let mut page = 1;
        let mut visited = 0;

        loop {
            let html = match self.fetcher.fetch_listing(page) {
                Ok(html) => html,
                Err(e) => {
                    warn!(page, error = %format!("{e:#}"), "listing fetch failed, stopping pagination");
                    break;
                }
            };
            visited += 1;

            let listing = parse_listing(&html);
            info!(page, foods = listing.entries.len(), "listing page");
            if listing.entries.is_empty() {
                break;
            }
            entries.extend(listing.entries);

            if !listing.has_next {
                break;
            }
            page += 1;
        }

        info!(total = entries.len(), pages = visited, "collected food codes");
        (entries, visited)
    }

    pub fn fetch_record(&self, entry: &ListingEntry) -> Result<FoodRecord> {
        let html = self.fetcher.fetch_detail(&entry.code)?;
        let detail = parse_detail(&html);
        Ok(FoodRecord {
            code: entry.code.clone(),
            class: entry.class.clone(),
            description: detail.description,
            nutrients: detail.nutrients,
        })
    }

    /// Run both phases. Per-food failures and failed periodic commits are
    /// logged and the run goes on; only a failing final commit is an error.
    pub fn run(&self) -> Result<CrawlSummary> {
        let (entries, pages_visited) = self.collect_codes();
        let mut summary = CrawlSummary {
            pages_visited,
            codes_found: entries.len(),
            ..CrawlSummary::default()
        };

        let mut writer = self.store.map(FoodWriter::new);

        for (i, entry) in entries.iter().enumerate() {
            let record = match self.fetch_record(entry) {
                Ok(record) => record,
                Err(e) => {
                    summary.details_failed += 1;
                    warn!(code = %entry.code, error = %format!("{e:#}"), "skipping food");
                    continue;
                }
            };
            summary.details_fetched += 1;

            if let Some(capture) = self.capture {
                match capture.append(&record) {
                    Ok(()) => summary.captured += 1,
                    Err(e) => {
                        warn!(code = %entry.code, error = %format!("{e:#}"), "capture failed, skipping food");
                        continue;
                    }
                }
            }

            if let Some(writer) = writer.as_mut() {
                writer.save(&record);
                writer.checkpoint(i + 1);
            }
        }

        if let Some(writer) = writer {
            writer.commit().context("Final commit failed")?;
            summary.write = Some(writer.into_summary());
        }

        info!(
            fetched = summary.details_fetched,
            failed = summary.details_failed,
            "crawl finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use anyhow::anyhow;

    use super::*;
    use crate::db::Database;
    use crate::writer::testing::CommitCountingStore;

    #[derive(Default)]
    struct FakeSite {
        listings: HashMap<u32, String>,
        details: HashMap<String, String>,
        detail_requests: RefCell<Vec<String>>,
    }

    impl PageFetcher for FakeSite {
        fn fetch_listing(&self, page: u32) -> Result<String> {
            self.listings
                .get(&page)
                .cloned()
                .ok_or_else(|| anyhow!("HTTP 500 for page {page}"))
        }

        fn fetch_detail(&self, code: &str) -> Result<String> {
            self.detail_requests.borrow_mut().push(code.to_string());
            self.details
                .get(code)
                .cloned()
                .ok_or_else(|| anyhow!("HTTP 404 for {code}"))
        }
    }

    fn listing(codes: &[&str], next: bool) -> String {
        let mut html = String::from("<table>");
        for code in codes {
            html.push_str(&format!(
                r#"<tr><td><a href="composicao_alimentos.php?codigo_alimento={code}">{code}</a></td><td>Grupo {code}</td></tr>"#
            ));
        }
        html.push_str("</table>");
        if next {
            html.push_str(r#"<a href="composicao_alimentos.php?pagina=2">próxima</a>"#);
        }
        html
    }

    fn detail(description: &str) -> String {
        format!(
            "<h2>{description}</h2><table>
             <tr><th>Componente</th><th>Unidades</th><th>Valor por 100g</th></tr>
             <tr><td>Energia</td><td>kcal</td><td>100</td></tr>
             <tr><td>Ferro</td><td>mg</td><td>1,5</td></tr>
             </table>"
        )
    }

    fn two_page_site() -> FakeSite {
        let mut site = FakeSite::default();
        site.listings.insert(1, listing(&["A1"], true));
        site.listings.insert(2, listing(&["B2"], false));
        site.details.insert("A1".into(), detail("Abacaxi, cru"));
        site.details.insert("B2".into(), detail("Banana, prata, crua"));
        site
    }

    #[test]
    fn test_two_listing_pages_end_to_end() {
        let site = two_page_site();
        let store = CommitCountingStore::new();

        let summary = Crawler::new(&site).with_store(&store).run().unwrap();

        assert_eq!(*site.detail_requests.borrow(), vec!["A1", "B2"]);
        assert_eq!(summary.pages_visited, 2);
        assert_eq!(summary.codes_found, 2);
        assert_eq!(summary.details_fetched, 2);
        assert_eq!(summary.write.as_ref().unwrap().saved, 2);
        // Only the final commit: fewer than ten records.
        assert_eq!(store.commits.get(), 1);

        let counts = store.db.counts().unwrap();
        assert_eq!(counts.foods, 2);
        assert_eq!(counts.variations, 2);

        let banana = store.db.food_by_code("B2").unwrap().unwrap();
        assert_eq!(banana.class, "Grupo B2");
        assert_eq!(banana.name, "Banana");
    }

    #[test]
    fn test_listing_failure_keeps_partial_results() {
        let mut site = two_page_site();
        site.listings.remove(&2);
        let (entries, visited) = Crawler::<_, Database>::new(&site).collect_codes();
        assert_eq!(visited, 1);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].code, "A1");
    }

    #[test]
    fn test_listing_stops_on_page_without_foods() {
        let mut site = FakeSite::default();
        site.listings.insert(1, listing(&[], true));
        site.listings.insert(2, listing(&["X"], false));
        let (entries, visited) = Crawler::<_, Database>::new(&site).collect_codes();
        assert_eq!(visited, 1);
        assert!(entries.is_empty());
    }

    #[test]
    fn test_detail_failure_skips_only_that_food() {
        let mut site = two_page_site();
        site.details.remove("A1");
        let store = CommitCountingStore::new();

        let summary = Crawler::new(&site).with_store(&store).run().unwrap();

        assert_eq!(summary.details_failed, 1);
        assert_eq!(summary.details_fetched, 1);
        assert!(store.db.food_by_code("A1").unwrap().is_none());
        assert!(store.db.food_by_code("B2").unwrap().is_some());
    }

    #[test]
    fn test_commits_every_ten_records() {
        let site = many_foods_site(25);
        let store = CommitCountingStore::new();

        let summary = Crawler::new(&site).with_store(&store).run().unwrap();

        assert_eq!(summary.write.unwrap().saved, 25);
        // After 10, after 20, and the final one.
        assert_eq!(store.commits.get(), 3);
        assert_eq!(store.db.counts().unwrap().variations, 25);
    }

    #[test]
    fn test_capture_only_run() {
        let site = two_page_site();
        let dir = tempfile::tempdir().unwrap();
        let capture = CaptureFile::new(dir.path().join("alimentos.txt"));

        let summary = Crawler::<_, Database>::new(&site)
            .with_capture(&capture)
            .run()
            .unwrap();

        assert_eq!(summary.captured, 2);
        assert!(summary.write.is_none());
        let content = std::fs::read_to_string(capture.path()).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.contains(r#""descricao":"Abacaxi, cru""#));
    }

    #[test]
    fn test_fetch_record_assembles_code_and_class() {
        let site = two_page_site();
        let crawler = Crawler::<_, Database>::new(&site);
        let record = crawler
            .fetch_record(&ListingEntry {
                code: "A1".into(),
                class: "Frutas".into(),
            })
            .unwrap();
        assert_eq!(record.code, "A1");
        assert_eq!(record.class, "Frutas");
        assert_eq!(record.description, "Abacaxi, cru");
        assert_eq!(record.nutrients.len(), 2);
    }

    fn many_foods_site(n: usize) -> FakeSite {
        let mut site = FakeSite::default();
        let codes: Vec<String> = (0..n).map(|i| format!("F{i:02}")).collect();
        let refs: Vec<&str> = codes.iter().map(String::as_str).collect();
        site.listings.insert(1, listing(&refs, false));
        for code in &codes {
            site.details.insert(code.clone(), detail("Alimento, teste"));
        }
        site
    }

    #[test]
    fn test_periodic_commit_failure_does_not_abort_run() {
        let site = many_foods_site(12);
        let store = CommitCountingStore::failing_first(1);

        let summary = Crawler::new(&site).with_store(&store).run().unwrap();

        let write = summary.write.unwrap();
        assert_eq!(write.saved, 12);
        assert_eq!(write.commit_failures, 1);
        // Failed commit at 10, then the final one picks everything up.
        assert_eq!(store.commits.get(), 2);
        assert_eq!(store.db.counts().unwrap().variations, 12);
    }

    #[test]
    fn test_failing_final_commit_is_an_error() {
        let site = two_page_site();
        let store = CommitCountingStore::failing_first(1);
        let err = Crawler::new(&site).with_store(&store).run().unwrap_err();
        assert!(format!("{err:#}").contains("database is locked"));
        assert_eq!(store.commits.get(), 1);
    }
}
