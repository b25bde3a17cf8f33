//! One merge session, end to end
//!
//! Reads incoming institution files, cleans their rows (including
//! publisher normalization), backs up the master file, merges everything
//! into the master store, then writes the store and the publisher map
//! exactly once. Warnings accumulate in the run summary; only fatal
//! conditions abort, and they abort before the master file is touched.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Paths;
use crate::crossref::PublisherLookup;
use crate::decision::DecisionSource;
use crate::error::{Error, Result};
use crate::publisher::PublisherNormalizer;
use crate::reconciler::{MergeReport, Reconciler};
use crate::record::{clean_field, col, is_header_row, normalize_amount, Record};
use crate::store::MasterStore;

/// Aggregated outcome of one session.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub files_processed: usize,
    pub added: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped_no_doi: usize,
    pub warnings: Vec<String>,
}

impl RunSummary {
    fn absorb(&mut self, report: MergeReport) {
        self.added += report.added;
        self.updated += report.updated;
        self.unchanged += report.unchanged;
        self.skipped_no_doi += report.skipped_no_doi;
        self.warnings.extend(report.warnings);
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// End-of-run report: differentiates "no errors" from "see warnings".
    pub fn log(&self) {
        tracing::info!(
            files = self.files_processed,
            added = self.added,
            updated = self.updated,
            unchanged = self.unchanged,
            skipped_no_doi = self.skipped_no_doi,
            "Session complete"
        );
        if self.warnings.is_empty() {
            tracing::info!("No errors during processing");
        } else {
            tracing::warn!("There were {} warning(s) during processing:", self.warnings.len());
            for warning in &self.warnings {
                tracing::warn!("  {}", warning);
            }
        }
    }
}

/// Read a file-list file: one path per line, `#` comment lines and blank
/// lines skipped.
pub fn read_file_list(path: &Path) -> Result<Vec<PathBuf>> {
    let content = fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.contains('#'))
        .map(PathBuf::from)
        .collect())
}

/// Copy the master file to a `_backup` sibling before any write.
pub fn backup_master(path: &Path) -> Result<PathBuf> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::InvalidInput(format!("bad master path: {}", path.display())))?;
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("csv");
    let backup_path = path.with_file_name(format!("{}_backup.{}", stem, extension));

    fs::copy(path, &backup_path)?;
    tracing::info!(backup = %backup_path.display(), "Backed up master file");
    Ok(backup_path)
}

fn read_incoming_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    let delimiter = match path.extension().and_then(|e| e.to_str()) {
        Some("tsv") => b'\t',
        _ => b',',
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_path(path)?;

    let mut rows = Vec::new();
    for row in reader.records() {
        let row = row?;
        rows.push(row.iter().map(|f| f.to_string()).collect());
    }
    Ok(rows)
}

/// Outcome of cleaning one incoming file.
pub struct CleanedFile {
    pub header: Option<Vec<String>>,
    pub records: Vec<Record>,
    pub warnings: Vec<String>,
}

/// Clean raw incoming rows into records.
///
/// Skips blank rows, `#` comment rows and rows without an organisation or
/// an APC amount; trims and canonicalizes every field; normalizes the
/// amount's decimal mark; and resolves the publisher spelling through the
/// normalizer. A duplicate non-empty DOI inside one file is fatal: the
/// supplying institution must fix the source before the data can merge.
pub async fn clean_rows<L: PublisherLookup>(
    rows: Vec<Vec<String>>,
    location: &str,
    normalizer: &mut PublisherNormalizer,
    lookup: &L,
    decisions: &mut dyn DecisionSource,
) -> Result<CleanedFile> {
    let mut header: Option<Vec<String>> = None;
    let mut records = Vec::new();
    let mut warnings = Vec::new();
    let mut seen_dois: HashSet<String> = HashSet::new();

    for row in rows {
        if row.is_empty() || row.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        let first = row[0].trim();
        if first.is_empty() || first.starts_with('#') {
            continue;
        }
        if is_header_row(&row) {
            header = Some(row.iter().map(|f| f.trim().to_string()).collect());
            continue;
        }

        let mut fields: Vec<String> = row.iter().map(|f| clean_field(f)).collect();
        if let Some(amount) = fields.get_mut(col::APC_AMOUNT) {
            *amount = normalize_amount(amount);
        }

        if fields.get(col::APC_AMOUNT).map(String::as_str).unwrap_or("").is_empty() {
            let identifier = fields.get(col::IDENTIFIER).cloned().unwrap_or_default();
            let warning = format!("No APC amount for publication '{}', entry skipped", identifier);
            tracing::warn!("{}", warning);
            warnings.push(warning);
            continue;
        }

        let mut record = Record::new(fields);
        let doi = record.normalized_doi();
        if !doi.is_empty() && !seen_dois.insert(doi.clone()) {
            return Err(Error::DuplicateDoi {
                doi,
                location: location.to_string(),
            });
        }

        let publisher = record.publisher().to_string();
        if !publisher.is_empty() {
            let raw_doi = record.field(col::DOI).trim().to_string();
            let canonical = normalizer
                .normalize(&publisher, &raw_doi, lookup, decisions)
                .await;
            if canonical != publisher {
                record.set_field(col::PUBLISHER, canonical);
            }
        }

        records.push(record);
    }

    Ok(CleanedFile {
        header,
        records,
        warnings,
    })
}

/// Run one full merge session over `incoming_files`.
///
/// The master file is backed up first and written exactly once, at the
/// end; the publisher map is persisted exactly once after all
/// normalization.
pub async fn run_session<L: PublisherLookup>(
    paths: &Paths,
    incoming_files: &[PathBuf],
    lookup: &L,
    decisions: &mut dyn DecisionSource,
) -> Result<RunSummary> {
    let mut summary = RunSummary::default();

    backup_master(&paths.master_file)?;
    let mut store = MasterStore::load(&paths.master_file)?;
    let mut normalizer = PublisherNormalizer::load(&paths.publisher_map_file)?;

    let mut reconciler = Reconciler::with_default_policies(store.header());

    for file in incoming_files {
        tracing::info!(file = %file.display(), "Processing incoming file");
        let rows = read_incoming_rows(file)?;
        let cleaned = clean_rows(
            rows,
            &file.display().to_string(),
            &mut normalizer,
            lookup,
            decisions,
        )
        .await?;
        summary.warnings.extend(cleaned.warnings);

        if store.header().is_empty() {
            if let Some(header) = cleaned.header {
                store.set_header_if_empty(header.clone());
                reconciler = Reconciler::with_default_policies(&header);
            }
        }

        let report = reconciler.merge(&mut store, &cleaned.records, decisions);
        summary.absorb(report);
        summary.files_processed += 1;
    }

    store.write(&paths.master_file)?;
    normalizer.persist(&paths.publisher_map_file)?;
    summary.warnings.extend(normalizer.take_warnings());

    Ok(summary)
}
