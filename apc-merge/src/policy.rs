//! Per-column overwrite policy
//!
//! Each mergeable column carries a small state machine deciding whether an
//! existing value yields to an incoming one. State: current mode plus a
//! whitelist ("always replace this exact pair") and a blacklist ("never
//! replace this exact pair"). Transitions happen only on operator
//! decisions; automatically resolved conflicts never mutate state. The
//! state is scoped to one merge session and never persisted.

use std::collections::HashMap;

use crate::decision::{DecisionSource, Selection};
use crate::record::is_na;

/// Overwrite behavior for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverwriteMode {
    /// Incoming value always wins
    Always,
    /// Undecided pairs escalate to the operator
    Ask,
    /// Existing value always wins
    Never,
}

/// Conflict policy for one column.
#[derive(Debug)]
pub struct FieldPolicy {
    column_name: String,
    mode: OverwriteMode,
    whitelist: HashMap<String, String>,
    blacklist: HashMap<String, String>,
}

impl FieldPolicy {
    pub fn new(column_name: impl Into<String>) -> Self {
        Self::with_mode(column_name, OverwriteMode::Ask)
    }

    pub fn with_mode(column_name: impl Into<String>, mode: OverwriteMode) -> Self {
        Self {
            column_name: column_name.into(),
            mode,
            whitelist: HashMap::new(),
            blacklist: HashMap::new(),
        }
    }

    pub fn column_name(&self) -> &str {
        &self.column_name
    }

    pub fn mode(&self) -> OverwriteMode {
        self.mode
    }

    /// Decide which value survives a conflict.
    ///
    /// Precedence, first match wins:
    /// 1. Equal values: keep old, no decision needed
    /// 2. Old value is blank or the NA sentinel: take new
    /// 3. Mode Always: take new
    /// 4. Mode Never: keep old
    /// 5. Exact pair blacklisted: keep old
    /// 6. Exact pair whitelisted: take new
    /// 7. Ask the operator (six choices, remembered choices update state)
    pub fn resolve(
        &mut self,
        old_value: &str,
        new_value: &str,
        decisions: &mut dyn DecisionSource,
    ) -> String {
        if old_value == new_value {
            return old_value.to_string();
        }
        if is_na(old_value) {
            return new_value.to_string();
        }
        match self.mode {
            OverwriteMode::Always => return new_value.to_string(),
            OverwriteMode::Never => return old_value.to_string(),
            OverwriteMode::Ask => {}
        }
        if self.blacklist.get(old_value).map(String::as_str) == Some(new_value) {
            return old_value.to_string();
        }
        if self.whitelist.get(old_value).map(String::as_str) == Some(new_value) {
            return new_value.to_string();
        }
        self.ask(old_value, new_value, decisions)
    }

    fn ask(
        &mut self,
        old_value: &str,
        new_value: &str,
        decisions: &mut dyn DecisionSource,
    ) -> String {
        let prompt = format!(
            "Conflict: existing value '{}' in column '{}' is to be replaced by new value '{}'. Allow overwrite?",
            old_value, self.column_name, new_value
        );
        let options = vec![
            "Yes".to_string(),
            format!("Yes, and always replace '{}' by '{}' in this column", old_value, new_value),
            "Yes, and always overwrite in this column".to_string(),
            "No".to_string(),
            format!("No, and never replace '{}' by '{}' in this column", old_value, new_value),
            "No, and never overwrite in this column".to_string(),
        ];
        loop {
            match decisions.choose(&prompt, &options, false) {
                Selection::Choice(0) => return new_value.to_string(),
                Selection::Choice(1) => {
                    self.whitelist
                        .insert(old_value.to_string(), new_value.to_string());
                    return new_value.to_string();
                }
                Selection::Choice(2) => {
                    self.mode = OverwriteMode::Always;
                    return new_value.to_string();
                }
                Selection::Choice(3) => return old_value.to_string(),
                Selection::Choice(4) => {
                    self.blacklist
                        .insert(old_value.to_string(), new_value.to_string());
                    return old_value.to_string();
                }
                Selection::Choice(5) => {
                    self.mode = OverwriteMode::Never;
                    return old_value.to_string();
                }
                // Out-of-range or free-form answers re-ask
                _ => continue,
            }
        }
    }
}
