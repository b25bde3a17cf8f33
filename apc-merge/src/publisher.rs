//! Publisher name normalization
//!
//! Many institution reports spell the same publisher differently. The
//! normalizer maps each raw spelling to one canonical form, consulting (in
//! order) the persisted name map, a Crossref lookup keyed by DOI, and the
//! operator. Newly learned mappings are cached for the session and written
//! back wholesale at session end.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::crossref::{PublisherLookup, PublisherNames};
use crate::decision::{DecisionSource, Selection};
use crate::error::Result;

/// Persisted mapping: normalized (trimmed, lower-cased) spelling ->
/// canonical publisher name. Two-column TSV, no header, one mapping per
/// line. Grows monotonically; never shrinks automatically.
#[derive(Debug, Default)]
pub struct PublisherNameMap {
    entries: HashMap<String, String>,
}

impl PublisherNameMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the full map into memory. An unreadable map file is fatal.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut entries = HashMap::new();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match line.split_once('\t') {
                Some((key, canonical)) => {
                    entries.insert(key.trim().to_lowercase(), canonical.trim().to_string());
                }
                None => {
                    tracing::warn!(
                        path = %path.display(),
                        line = line_no + 1,
                        "Skipping malformed publisher map line"
                    );
                }
            }
        }
        tracing::info!(path = %path.display(), entries = entries.len(), "Loaded publisher name map");
        Ok(Self { entries })
    }

    pub fn get(&self, normalized_name: &str) -> Option<&String> {
        self.entries.get(normalized_name)
    }

    pub fn insert(&mut self, normalized_name: String, canonical: String) {
        self.entries.insert(normalized_name, canonical);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rewrite the whole map to `path`, one `key<TAB>canonical` per line,
    /// unordered. Goes through a sibling temp file and a rename.
    pub fn persist(&self, path: &Path) -> Result<()> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("publisher_name_map.tsv");
        let tmp_path = path.with_file_name(format!("{}.tmp", file_name));

        let mut body = String::new();
        for (key, canonical) in &self.entries {
            body.push_str(key);
            body.push('\t');
            body.push_str(canonical);
            body.push('\n');
        }
        fs::write(&tmp_path, body)?;
        fs::rename(&tmp_path, path)?;

        tracing::info!(path = %path.display(), entries = self.entries.len(), "Updated publisher name map");
        Ok(())
    }
}

/// Session-scoped publisher name resolver. Owns the name map for the
/// duration of the session; `persist` must be called exactly once after
/// all normalization is done.
pub struct PublisherNormalizer {
    map: PublisherNameMap,
    learned: usize,
    warnings: Vec<String>,
}

impl PublisherNormalizer {
    pub fn new(map: PublisherNameMap) -> Self {
        Self {
            map,
            learned: 0,
            warnings: Vec::new(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::new(PublisherNameMap::load(path)?))
    }

    pub fn map(&self) -> &PublisherNameMap {
        &self.map
    }

    /// Mappings learned during this session.
    pub fn learned(&self) -> usize {
        self.learned
    }

    /// Drain warnings recorded so far (lookup failures, unnormalizable
    /// names). These never abort processing.
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    /// Resolve `raw_name` to canonical form.
    ///
    /// Cache hits are silent (informational note only when the canonical
    /// form differs). On a miss with a non-empty DOI, Crossref supplies
    /// candidates and the operator picks one (or types a replacement); the
    /// choice is cached. On lookup failure, or a miss without a DOI, the
    /// raw name is returned unchanged and nothing is cached.
    pub async fn normalize<L: PublisherLookup>(
        &mut self,
        raw_name: &str,
        doi: &str,
        lookup: &L,
        decisions: &mut dyn DecisionSource,
    ) -> String {
        let key = raw_name.trim().to_lowercase();
        if let Some(canonical) = self.map.get(&key) {
            if canonical != raw_name {
                tracing::info!("Name '{}' normalized to '{}'", raw_name, canonical);
            }
            return canonical.clone();
        }

        let doi = doi.trim();
        if doi.is_empty() {
            let warning = format!("No normalization of publisher name '{}' (no DOI)", raw_name);
            tracing::warn!("{}", warning);
            self.warnings.push(warning);
            return raw_name.to_string();
        }

        match lookup.publisher_names(doi).await {
            Ok(candidates) => {
                let canonical = self.ask(raw_name, &candidates, decisions);
                self.map.insert(key, canonical.clone());
                self.learned += 1;
                canonical
            }
            Err(e) => {
                let warning = format!(
                    "No normalization of publisher name '{}' (lookup failed for {}: {})",
                    raw_name, doi, e
                );
                tracing::warn!("{}", warning);
                self.warnings.push(warning);
                raw_name.to_string()
            }
        }
    }

    fn ask(
        &self,
        raw_name: &str,
        candidates: &PublisherNames,
        decisions: &mut dyn DecisionSource,
    ) -> String {
        let prompt = format!(
            "Several name choices found for publisher '{}'. Choose one alternative or enter a new preferred name.",
            raw_name
        );
        let options = vec![
            raw_name.trim().to_string(),
            candidates.publisher.clone(),
            candidates.prefix_name.clone(),
        ];
        loop {
            match decisions.choose(&prompt, &options, true) {
                Selection::Choice(i) if i < options.len() => return options[i].clone(),
                Selection::Text(name) if !name.trim().is_empty() => {
                    return name.trim().to_string()
                }
                _ => continue,
            }
        }
    }

    /// Write the map back to durable storage. Call once per session, after
    /// all normalization calls.
    pub fn persist(&self, path: &Path) -> Result<()> {
        self.map.persist(path)
    }
}
