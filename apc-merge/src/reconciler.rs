//! DOI-keyed record reconciliation
//!
//! Streams incoming records into the master store in input order. New DOIs
//! are inserted, identical records are skipped, and differing records go
//! through conflict resolution: per-field column policies are the primary
//! path, with a whole-record choice as the coarser fallback when a
//! conflicting column has no registered policy.

use std::collections::HashMap;

use crate::decision::{DecisionSource, Selection};
use crate::policy::FieldPolicy;
use crate::record::{is_na, Record};
use crate::store::MasterStore;

/// Outcome counts and warnings for one merge pass.
#[derive(Debug, Default)]
pub struct MergeReport {
    pub added: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped_no_doi: usize,
    pub warnings: Vec<String>,
}

impl MergeReport {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} added, {} updated, {} unchanged, {} skipped (no DOI)",
            self.added, self.updated, self.unchanged, self.skipped_no_doi
        )
    }
}

/// Merges incoming records into the master store. Owns the per-column
/// policies for the duration of one merge session.
pub struct Reconciler {
    policies: HashMap<usize, FieldPolicy>,
}

impl Reconciler {
    /// Per-field resolution for every column, named from the header row.
    pub fn with_default_policies(header: &[String]) -> Self {
        let mut policies = HashMap::new();
        for (index, name) in header.iter().enumerate() {
            let name = if name.trim().is_empty() {
                format!("column {}", index + 1)
            } else {
                name.trim().to_string()
            };
            policies.insert(index, FieldPolicy::new(name));
        }
        Self { policies }
    }

    /// No column policies: every conflict falls back to a whole-record
    /// choice.
    pub fn without_policies() -> Self {
        Self {
            policies: HashMap::new(),
        }
    }

    pub fn register_policy(&mut self, column: usize, policy: FieldPolicy) {
        self.policies.insert(column, policy);
    }

    /// Merge `incoming` into `store`, one record at a time, preserving
    /// input order. The store is only mutated; serialization is the
    /// caller's final step.
    pub fn merge(
        &mut self,
        store: &mut MasterStore,
        incoming: &[Record],
        decisions: &mut dyn DecisionSource,
    ) -> MergeReport {
        let mut report = MergeReport::default();

        for record in incoming {
            let doi = record.normalized_doi();

            if doi.is_empty() {
                let warning = format!("Record without DOI skipped: {}", record.display());
                tracing::warn!("{}", warning);
                report.warnings.push(warning);
                report.skipped_no_doi += 1;
                continue;
            }

            let existing = match store.get(&doi) {
                None => {
                    tracing::info!(doi = %doi, "Added new record");
                    store.insert(record.clone());
                    report.added += 1;
                    continue;
                }
                Some(existing) => existing.clone(),
            };

            if existing == *record {
                tracing::debug!(doi = %doi, "Duplicate record, no change");
                report.unchanged += 1;
                continue;
            }

            tracing::info!(doi = %doi, "Record differs from master, resolving");
            let resolved = self.resolve_conflict(&existing, record, decisions);
            if resolved == existing {
                report.unchanged += 1;
            } else {
                report.updated += 1;
            }
            store.insert(resolved);
        }

        tracing::info!(summary = %report.summary(), "Merge pass complete");
        report
    }

    /// Resolve a differing record pair.
    ///
    /// Blank and sentinel values in the stored record are filled from the
    /// incoming one first, with no prompting, whatever the strategy. The
    /// columns still contested after that resolve per-field when every one
    /// of them has a policy; otherwise the operator picks one record
    /// wholesale.
    fn resolve_conflict(
        &mut self,
        old: &Record,
        new: &Record,
        decisions: &mut dyn DecisionSource,
    ) -> Record {
        let width = old.len().max(new.len());
        let mut resolved = old.clone();
        let mut contested: Vec<usize> = Vec::new();

        for index in 0..width {
            let (old_value, new_value) = (old.field(index), new.field(index));
            if old_value == new_value {
                continue;
            }
            if is_na(old_value) {
                resolved.set_field(index, new_value.to_string());
                continue;
            }
            contested.push(index);
        }

        if contested.is_empty() {
            return resolved;
        }

        let all_covered = contested.iter().all(|i| self.policies.contains_key(i));
        if !all_covered {
            return self.choose_whole_record(&resolved, new, decisions);
        }

        for index in contested {
            if let Some(policy) = self.policies.get_mut(&index) {
                let value = policy.resolve(old.field(index), new.field(index), decisions);
                resolved.set_field(index, value);
            }
        }
        resolved
    }

    fn choose_whole_record(
        &self,
        old: &Record,
        new: &Record,
        decisions: &mut dyn DecisionSource,
    ) -> Record {
        let prompt = format!(
            "DOI {} already present with different data. Choose the record to keep.",
            old.normalized_doi()
        );
        let options = vec![
            format!("Present: {}", old.display()),
            format!("New:     {}", new.display()),
        ];
        loop {
            match decisions.choose(&prompt, &options, false) {
                Selection::Choice(0) => return old.clone(),
                Selection::Choice(1) => return new.clone(),
                _ => continue,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::ScriptedDecisionSource;
    use crate::policy::{FieldPolicy, OverwriteMode};

    fn header() -> Vec<String> {
        ["institution", "period", "euro", "doi", "publication", "publisher"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn record(fields: &[&str]) -> Record {
        Record::new(fields.iter().map(|f| f.to_string()).collect())
    }

    fn store_with(records: &[Record]) -> MasterStore {
        let mut store = MasterStore::new(header());
        for record in records {
            store.insert(record.clone());
        }
        store
    }

    #[test]
    fn test_new_doi_is_added() {
        let mut store = store_with(&[]);
        let mut reconciler = Reconciler::with_default_policies(&header());
        let mut decisions = ScriptedDecisionSource::new(vec![]);

        let incoming = vec![record(&["KTH", "2016", "1200.00", "10.1/a", "A", "Elsevier BV"])];
        let report = reconciler.merge(&mut store, &incoming, &mut decisions);

        assert_eq!(report.added, 1);
        assert_eq!(store.len(), 1);
        assert!(store.contains("10.1/a"));
        assert_eq!(decisions.prompts_issued(), 0);
    }

    #[test]
    fn test_identical_record_is_silent_noop() {
        let existing = record(&["KTH", "2016", "1200.00", "10.1/a", "A", "Elsevier BV"]);
        let mut store = store_with(&[existing.clone()]);
        let mut reconciler = Reconciler::with_default_policies(&header());
        let mut decisions = ScriptedDecisionSource::new(vec![]);

        let report = reconciler.merge(&mut store, &[existing], &mut decisions);

        assert_eq!(report.unchanged, 1);
        assert_eq!(report.added, 0);
        assert_eq!(store.len(), 1);
        assert_eq!(decisions.prompts_issued(), 0);
        assert!(!report.has_warnings());
    }

    #[test]
    fn test_empty_doi_is_skipped_with_warning() {
        let mut store = store_with(&[]);
        let mut reconciler = Reconciler::with_default_policies(&header());
        let mut decisions = ScriptedDecisionSource::new(vec![]);

        let incoming = vec![record(&["KTH", "2016", "1200.00", "  ", "A", "Elsevier BV"])];
        let report = reconciler.merge(&mut store, &incoming, &mut decisions);

        assert_eq!(report.skipped_no_doi, 1);
        assert!(store.is_empty());
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let rows = vec![
            record(&["KTH", "2016", "1200.00", "10.1/a", "A", "Elsevier BV"]),
            record(&["DU", "2016", "900.00", "10.1/b", "B", "Springer Nature"]),
        ];
        let mut store = store_with(&[]);
        let mut reconciler = Reconciler::with_default_policies(&header());
        let mut decisions = ScriptedDecisionSource::new(vec![]);

        let first = reconciler.merge(&mut store, &rows, &mut decisions);
        assert_eq!(first.added, 2);

        let second = reconciler.merge(&mut store, &rows, &mut decisions);
        assert_eq!(second.added, 0);
        assert_eq!(second.unchanged, 2);
        assert_eq!(store.len(), 2);
        assert_eq!(decisions.prompts_issued(), 0);
    }

    #[test]
    fn test_sentinel_fields_overwritten_without_prompt() {
        let existing = record(&["KTH", "2016", "NA", "10.1/a", "A", ""]);
        let mut store = store_with(&[existing]);
        let mut reconciler = Reconciler::with_default_policies(&header());
        let mut decisions = ScriptedDecisionSource::new(vec![]);

        let incoming = vec![record(&["KTH", "2016", "1200.00", "10.1/a", "A", "Elsevier BV"])];
        let report = reconciler.merge(&mut store, &incoming, &mut decisions);

        assert_eq!(report.updated, 1);
        let merged = store.get("10.1/a").unwrap();
        assert_eq!(merged.field(2), "1200.00");
        assert_eq!(merged.field(5), "Elsevier BV");
        assert_eq!(decisions.prompts_issued(), 0);
    }

    #[test]
    fn test_amount_conflict_prompts_then_memoizes_column_mode() {
        let mut store = store_with(&[
            record(&["KTH", "2016", "1200.50", "10.1/b", "B", "Elsevier BV"]),
            record(&["KTH", "2016", "500.00", "10.1/c", "C", "Wiley"]),
        ]);
        let mut reconciler = Reconciler::with_default_policies(&header());
        // First conflict: "Yes, and always overwrite in this column"
        let mut decisions = ScriptedDecisionSource::new(vec![Selection::Choice(2)]);

        let incoming = vec![
            record(&["KTH", "2016", "1300.00", "10.1/b", "B", "Elsevier BV"]),
            record(&["KTH", "2016", "600.00", "10.1/c", "C", "Wiley"]),
        ];
        let report = reconciler.merge(&mut store, &incoming, &mut decisions);

        assert_eq!(report.updated, 2);
        assert_eq!(store.get("10.1/b").unwrap().field(2), "1300.00");
        // Second amount conflict auto-resolved by the switched mode
        assert_eq!(store.get("10.1/c").unwrap().field(2), "600.00");
        assert_eq!(decisions.prompts_issued(), 1);
    }

    #[test]
    fn test_keep_old_resolution_counts_as_unchanged() {
        let existing = record(&["KTH", "2016", "1200.50", "10.1/b", "B", "Elsevier BV"]);
        let mut store = store_with(&[existing.clone()]);
        let mut reconciler = Reconciler::with_default_policies(&header());
        let mut decisions = ScriptedDecisionSource::new(vec![Selection::Choice(3)]);

        let incoming = vec![record(&["KTH", "2016", "1300.00", "10.1/b", "B", "Elsevier BV"])];
        let report = reconciler.merge(&mut store, &incoming, &mut decisions);

        assert_eq!(report.updated, 0);
        assert_eq!(report.unchanged, 1);
        assert_eq!(*store.get("10.1/b").unwrap(), existing);
    }

    #[test]
    fn test_per_field_resolution_mixes_columns() {
        let existing = record(&["KTH", "2016", "1200.50", "10.1/b", "B", "Elsevier"]);
        let mut store = store_with(&[existing]);
        let mut reconciler = Reconciler::with_default_policies(&header());
        reconciler.register_policy(2, FieldPolicy::with_mode("euro", OverwriteMode::Always));
        reconciler.register_policy(5, FieldPolicy::with_mode("publisher", OverwriteMode::Never));
        let mut decisions = ScriptedDecisionSource::new(vec![]);

        let incoming = vec![record(&["KTH", "2016", "1300.00", "10.1/b", "B", "Elsevier BV"])];
        let report = reconciler.merge(&mut store, &incoming, &mut decisions);

        let merged = store.get("10.1/b").unwrap();
        assert_eq!(merged.field(2), "1300.00"); // euro overwritten
        assert_eq!(merged.field(5), "Elsevier"); // publisher kept
        assert_eq!(report.updated, 1);
        assert_eq!(decisions.prompts_issued(), 0);
    }

    #[test]
    fn test_whole_record_fallback_without_policies() {
        let existing = record(&["KTH", "2016", "1200.50", "10.1/b", "B", "Elsevier BV"]);
        let mut store = store_with(&[existing]);
        let mut reconciler = Reconciler::without_policies();
        // Operator picks the new record wholesale
        let mut decisions = ScriptedDecisionSource::new(vec![Selection::Choice(1)]);

        let incoming = vec![record(&["KTH", "2016", "1300.00", "10.1/b", "B new", "Elsevier BV"])];
        let report = reconciler.merge(&mut store, &incoming, &mut decisions);

        assert_eq!(report.updated, 1);
        assert_eq!(store.get("10.1/b").unwrap().field(4), "B new");
        assert_eq!(decisions.prompts_issued(), 1);
    }

    #[test]
    fn test_sentinel_fill_never_prompts_even_without_policies() {
        let existing = record(&["KTH", "2016", "NA", "10.1/b", "B", ""]);
        let mut store = store_with(&[existing]);
        let mut reconciler = Reconciler::without_policies();
        let mut decisions = ScriptedDecisionSource::new(vec![]);

        let incoming = vec![record(&["KTH", "2016", "1300.00", "10.1/b", "B", "Elsevier BV"])];
        let report = reconciler.merge(&mut store, &incoming, &mut decisions);

        assert_eq!(report.updated, 1);
        let merged = store.get("10.1/b").unwrap();
        assert_eq!(merged.field(2), "1300.00");
        assert_eq!(merged.field(5), "Elsevier BV");
        assert_eq!(decisions.prompts_issued(), 0);
    }

    #[test]
    fn test_whole_record_fallback_keep_present() {
        let existing = record(&["KTH", "2016", "1200.50", "10.1/b", "B", "Elsevier BV"]);
        let mut store = store_with(&[existing.clone()]);
        let mut reconciler = Reconciler::without_policies();
        let mut decisions = ScriptedDecisionSource::new(vec![Selection::Choice(0)]);

        let incoming = vec![record(&["KTH", "2016", "1300.00", "10.1/b", "B", "Elsevier BV"])];
        let report = reconciler.merge(&mut store, &incoming, &mut decisions);

        assert_eq!(report.unchanged, 1);
        assert_eq!(*store.get("10.1/b").unwrap(), existing);
    }

    #[test]
    fn test_extra_column_beyond_header_uses_whole_record_fallback() {
        // Records wider than the header differ in an unpoliced column
        let existing = record(&["KTH", "2016", "1200.50", "10.1/b", "B", "Elsevier BV", "x"]);
        let mut store = store_with(&[existing]);
        let mut reconciler = Reconciler::with_default_policies(&header());
        let mut decisions = ScriptedDecisionSource::new(vec![Selection::Choice(1)]);

        let incoming = vec![record(&["KTH", "2016", "1200.50", "10.1/b", "B", "Elsevier BV", "y"])];
        reconciler.merge(&mut store, &incoming, &mut decisions);

        assert_eq!(store.get("10.1/b").unwrap().field(6), "y");
        assert_eq!(decisions.prompts_issued(), 1);
    }
}
