use log::{debug, info, warn};
use reqwest::StatusCode;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::error::ScanError;
use crate::model::RecipeRecord;
use crate::scheduler::{host_of, SiteScheduler};

/// Scraper column value for rows whose URL produced no record before the batch went idle.
pub const NO_RESPONSE: &str = "No Response";

/// A parsed batch input: the header row, the data rows and the URL column.
#[derive(Debug, Clone)]
pub struct BatchInput {
    pub headers: csv::StringRecord,
    pub rows: Vec<csv::StringRecord>,
    pub url_column: usize,
}

impl BatchInput {
    /// Read a CSV file and locate its `url` column (header matched case-insensitively).
    pub fn from_path(path: &Path) -> Result<Self, ScanError> {
        let reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
        Self::from_reader(reader, &path.display().to_string())
    }

    pub fn from_reader<R: std::io::Read>(mut reader: csv::Reader<R>, name: &str) -> Result<Self, ScanError> {
        let headers = reader.headers()?.clone();
        if headers.is_empty() {
            return Err(ScanError::EmptyCsv(name.to_string()));
        }
        let url_column = headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case("url"))
            .ok_or_else(|| ScanError::MissingUrlColumn(name.to_string()))?;

        let rows: Vec<csv::StringRecord> = reader.records().collect::<Result<_, _>>()?;
        if rows.is_empty() {
            return Err(ScanError::EmptyCsv(name.to_string()));
        }

        Ok(Self {
            headers,
            rows,
            url_column,
        })
    }

    /// The trimmed, non-empty URL of every data row, in file order.
    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.rows
            .iter()
            .filter_map(|row| row.get(self.url_column))
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

/// Outcome of one batch: every record received, keyed by source URL.
#[derive(Debug, Default)]
pub struct BatchResult {
    pub records: HashMap<String, RecipeRecord>,
    pub summary: BatchSummary,
}

impl BatchResult {
    /// The value written to the added `scraper` column for `url`.
    pub fn scraper_label(&self, url: &str) -> String {
        match self.records.get(url) {
            Some(record) => scraper_label(record),
            None => NO_RESPONSE.to_string(),
        }
    }

    fn accept(&mut self, record: RecipeRecord) {
        self.summary.record(&record);
        self.records.insert(record.source_url.clone(), record);
    }
}

/// Extractor name for successes, `HTTP <code>` for everything else.
pub fn scraper_label(record: &RecipeRecord) -> String {
    if record.status_code == StatusCode::OK.as_u16() {
        record.scraper_name.clone()
    } else {
        format!("HTTP {}", record.status_code)
    }
}

/// Feed every URL in `input` to the scheduler and collect the outcomes.
///
/// This pipeline:
/// 1. Rejects rows whose URL cannot key a site queue (recorded as 400)
/// 2. Submits the remaining URLs from a separate task, so a full site queue
///    never stalls draining
/// 3. Drains `results` until every submission has answered or nothing
///    arrives for `idle_timeout`
///
/// # Arguments
/// * `scheduler` - Scheduler whose result channel is `results`
/// * `results` - Receiving end returned by [`SiteScheduler::new`]
/// * `input` - Parsed CSV input
/// * `idle_timeout` - How long to wait for the next record before giving up
pub async fn run_batch(
    scheduler: &SiteScheduler,
    results: &mut mpsc::Receiver<RecipeRecord>,
    input: &BatchInput,
    idle_timeout: Duration,
) -> BatchResult {
    let mut batch = BatchResult::default();
    let mut accepted = Vec::new();

    for url in input.urls() {
        match host_of(url) {
            Ok(_) => accepted.push(url.to_string()),
            Err(e) => {
                warn!("URL Error {}: {}", url, e);
                batch.accept(RecipeRecord::failure(url, StatusCode::BAD_REQUEST.as_u16(), e.to_string()));
            }
        }
    }

    let expected = accepted.len();
    info!("submitting {} URLs ({} rejected)", expected, batch.records.len());

    let submitter = scheduler.clone();
    let submission = tokio::spawn(async move {
        let mut failed = Vec::new();
        for url in accepted {
            if let Err(e) = submitter.site_get_recipe(&url).await {
                warn!("URL Error {}: {}", url, e);
                failed.push(RecipeRecord::failure(
                    url.as_str(),
                    StatusCode::SERVICE_UNAVAILABLE.as_u16(),
                    e.to_string(),
                ));
            }
        }
        failed
    });

    let mut received = 0;
    while received < expected {
        match tokio::time::timeout(idle_timeout, results.recv()).await {
            Ok(Some(record)) => {
                received += 1;
                debug!("{} {}", record.status_code, record.source_url);
                batch.accept(record);
            }
            Ok(None) => break,
            Err(_) => {
                warn!("no result for {:?}, {} of {} outstanding", idle_timeout, expected - received, expected);
                break;
            }
        }
    }

    match submission.await {
        Ok(failed) => failed.into_iter().for_each(|record| batch.accept(record)),
        Err(e) => warn!("submission task failed: {}", e),
    }
    batch
}

/// Write `input` back out with a trailing `scraper` column, next to the
/// input as `<file>.csv`.
pub fn write_augmented(input: &BatchInput, batch: &BatchResult, source: &Path) -> Result<PathBuf, ScanError> {
    let mut output = source.as_os_str().to_owned();
    output.push(".csv");
    let output = PathBuf::from(output);

    let mut writer = csv::WriterBuilder::new().flexible(true).from_path(&output)?;
    write_rows(&mut writer, input, batch)?;
    writer.flush()?;
    Ok(output)
}

fn write_rows<W: std::io::Write>(
    writer: &mut csv::Writer<W>,
    input: &BatchInput,
    batch: &BatchResult,
) -> Result<(), ScanError> {
    let mut headers = input.headers.clone();
    headers.push_field("scraper");
    writer.write_record(&headers)?;

    for row in &input.rows {
        let url = row.get(input.url_column).map(str::trim).unwrap_or_default();
        let label = if url.is_empty() {
            String::new()
        } else {
            batch.scraper_label(url)
        };
        let mut row = row.clone();
        row.push_field(&label);
        writer.write_record(&row)?;
    }
    Ok(())
}

type Counts = BTreeMap<String, usize>;

/// Counts of batch outcomes by HTTP status, by site and by scraper.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    /// status code -> host -> count
    pub by_status: BTreeMap<u16, Counts>,
    /// host -> scraper -> count, successes only
    pub by_site: BTreeMap<String, Counts>,
    /// scraper -> host -> count, successes only
    pub by_scraper: BTreeMap<String, Counts>,
}

impl BatchSummary {
    pub fn record(&mut self, record: &RecipeRecord) {
        let host = host_of(&record.source_url).unwrap_or_else(|_| record.source_url.clone());
        bump(self.by_status.entry(record.status_code).or_default(), &host);

        if record.status_code == StatusCode::OK.as_u16() {
            bump(self.by_site.entry(host.clone()).or_default(), &record.scraper_name);
            bump(self.by_scraper.entry(record.scraper_name.clone()).or_default(), &host);
        }
    }

    pub fn total(&self) -> usize {
        self.by_status.values().map(|hosts| hosts.values().sum::<usize>()).sum()
    }

    pub fn status_count(&self, status: u16) -> usize {
        self.by_status.get(&status).map_or(0, |hosts| hosts.values().sum())
    }

    pub fn scraper_count(&self, scraper: &str) -> usize {
        self.by_scraper.get(scraper).map_or(0, |hosts| hosts.values().sum())
    }
}

fn bump(counts: &mut Counts, key: &str) {
    *counts.entry(key.to_string()).or_insert(0) += 1;
}

/// Groups ordered by descending total, then by key.
fn ranked<K: Clone + Ord>(groups: &BTreeMap<K, Counts>) -> Vec<(K, usize)> {
    let mut totals: Vec<(K, usize)> = groups
        .iter()
        .map(|(key, counts)| (key.clone(), counts.values().sum()))
        .collect();
    totals.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    totals
}

fn write_section<K: Clone + Ord + fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    title: &str,
    outer: &str,
    inner: &str,
    groups: &BTreeMap<K, Counts>,
) -> fmt::Result {
    let totals = ranked(groups);

    writeln!(f)?;
    writeln!(f, "{} Detail", title)?;
    for (key, count) in &totals {
        writeln!(f, "Count:{:6}, {}: {}", count, outer, key)?;
        let mut detail: Vec<(&String, &usize)> = groups.get(key).into_iter().flatten().collect();
        detail.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (name, count) in detail {
            writeln!(f, "\tCount:{:6}, {}: {}", count, inner, name)?;
        }
    }

    writeln!(f)?;
    writeln!(f, "{} Summary", title)?;
    for (key, count) in &totals {
        writeln!(f, "Count:{:6}, {}: {}", count, outer, key)?;
    }
    writeln!(f, "Total:{:6}, {}", totals.iter().map(|(_, c)| c).sum::<usize>(), outer)
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", "-".repeat(80))?;
        write_section(f, "HTTP", "HTTP", "Site", &self.by_status)?;
        write_section(f, "Site", "Site", "Scraper", &self.by_site)?;
        write_section(f, "Scraper", "Scraper", "Site", &self.by_scraper)
    }
}
