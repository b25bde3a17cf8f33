//! DOI-keyed master dataset
//!
//! The master file is comma-separated, double-quote quoted, header first.
//! Loading rejects duplicate non-empty normalized DOIs (prior corruption
//! must be fixed by an operator before anything new is merged). Writing
//! sorts the full record set and goes through a sibling temp file followed
//! by a rename, so a failed run never leaves a half-written master.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::record::{is_header_row, Record};

/// In-memory master dataset: normalized DOI -> record, plus the remembered
/// header row. Records with an empty DOI are kept aside and written out,
/// but never participate in deduplication.
#[derive(Debug)]
pub struct MasterStore {
    header: Vec<String>,
    records: HashMap<String, Record>,
    keyless: Vec<Record>,
}

impl MasterStore {
    pub fn new(header: Vec<String>) -> Self {
        Self {
            header,
            records: HashMap::new(),
            keyless: Vec::new(),
        }
    }

    /// Load the master dataset from `path`.
    ///
    /// Fails with [`Error::DuplicateDoi`] when two rows normalize to the
    /// same non-empty DOI. I/O and CSV failures are fatal as well.
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)?;

        let mut header: Vec<String> = Vec::new();
        let mut records: HashMap<String, Record> = HashMap::new();
        let mut keyless: Vec<Record> = Vec::new();

        for row in reader.records() {
            let row = row?;
            let fields: Vec<String> = row.iter().map(|f| f.to_string()).collect();
            if is_header_row(&fields) {
                header = fields;
                continue;
            }
            let record = Record::new(fields);
            let doi = record.normalized_doi();
            if doi.is_empty() {
                keyless.push(record);
                continue;
            }
            if records.contains_key(&doi) {
                return Err(Error::DuplicateDoi {
                    doi,
                    location: path.display().to_string(),
                });
            }
            records.insert(doi, record);
        }

        tracing::info!(
            path = %path.display(),
            records = records.len(),
            keyless = keyless.len(),
            "Loaded master dataset"
        );

        Ok(Self {
            header,
            records,
            keyless,
        })
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Adopt a header when the store has none (first run against an empty
    /// or headerless master file).
    pub fn set_header_if_empty(&mut self, header: Vec<String>) {
        if self.header.is_empty() {
            self.header = header;
        }
    }

    pub fn len(&self) -> usize {
        self.records.len() + self.keyless.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.keyless.is_empty()
    }

    pub fn contains(&self, normalized_doi: &str) -> bool {
        self.records.contains_key(normalized_doi)
    }

    pub fn get(&self, normalized_doi: &str) -> Option<&Record> {
        self.records.get(normalized_doi)
    }

    /// Insert or replace the record under its normalized DOI. Records with
    /// an empty DOI land in the keyless pool.
    pub fn insert(&mut self, record: Record) {
        let doi = record.normalized_doi();
        if doi.is_empty() {
            self.keyless.push(record);
        } else {
            self.records.insert(doi, record);
        }
    }

    /// All records sorted lexicographically over the full field tuple.
    /// Map iteration order is never relied upon for output.
    pub fn sorted_records(&self) -> Vec<Record> {
        let mut rows: Vec<Record> = self.records.values().cloned().collect();
        rows.extend(self.keyless.iter().cloned());
        rows.sort();
        rows
    }

    /// Serialize the full dataset to `path`: header first, sorted body,
    /// written to a sibling temp file and renamed into place.
    pub fn write(&self, path: &Path) -> Result<()> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::InvalidInput(format!("bad master path: {}", path.display())))?;
        let tmp_path = path.with_file_name(format!("{}.tmp", file_name));

        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .flexible(true)
                .from_path(&tmp_path)?;
            if !self.header.is_empty() {
                writer.write_record(&self.header)?;
            }
            for record in self.sorted_records() {
                writer.write_record(record.fields())?;
            }
            writer.flush()?;
        }

        fs::rename(&tmp_path, path)?;
        tracing::info!(path = %path.display(), records = self.len(), "Wrote master dataset");
        Ok(())
    }
}
