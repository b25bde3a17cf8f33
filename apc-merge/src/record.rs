//! Record type and field-level normalization
//!
//! A record is an ordered sequence of text fields with fixed positional
//! meaning. Field values are plain text; cleaning (trimming, decimal-mark
//! normalization, boolean canonicalization) happens here before any record
//! reaches the reconciler.

/// Positional field meanings shared by every institution report and the
/// master dataset.
pub mod col {
    pub const ORGANISATION: usize = 0;
    pub const PERIOD: usize = 1;
    pub const APC_AMOUNT: usize = 2;
    pub const DOI: usize = 3;
    pub const IDENTIFIER: usize = 4;
    pub const PUBLISHER: usize = 5;
}

/// Placeholder value meaning "no real data yet"; always safe to overwrite.
pub const NA_SENTINEL: &str = "NA";

/// One row of APC data.
///
/// Ordering is lexicographic over the field tuple, which is what the
/// master file sort relies on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Record {
    fields: Vec<String>,
}

impl Record {
    pub fn new(fields: Vec<String>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Field at `index`, or `""` when the row is short.
    pub fn field(&self, index: usize) -> &str {
        self.fields.get(index).map(String::as_str).unwrap_or("")
    }

    pub fn set_field(&mut self, index: usize, value: String) {
        if index >= self.fields.len() {
            self.fields.resize(index + 1, String::new());
        }
        self.fields[index] = value;
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The dedup key: DOI trimmed and lower-cased. May be empty.
    pub fn normalized_doi(&self) -> String {
        self.field(col::DOI).trim().to_lowercase()
    }

    pub fn publisher(&self) -> &str {
        self.field(col::PUBLISHER)
    }

    /// One-line rendering for prompts and log messages.
    pub fn display(&self) -> String {
        self.fields.join(" | ")
    }
}

/// True for the explicit "not available" sentinel and for blank values.
pub fn is_na(value: &str) -> bool {
    value.trim().is_empty() || value == NA_SENTINEL
}

/// Normalize a monetary amount: drop internal whitespace (thousands
/// grouping from spreadsheet exports) and use `.` as the decimal mark.
pub fn normalize_amount(raw: &str) -> String {
    let compact: String = raw.split_whitespace().collect();
    compact.replace(',', ".")
}

/// Clean one raw field: trim surrounding whitespace, canonicalize boolean
/// spellings (including Swedish spreadsheet exports), and map the literal
/// `None` to empty.
pub fn clean_field(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.to_lowercase().as_str() {
        "sant" | "true" => return "TRUE".to_string(),
        "falskt" | "false" => return "FALSE".to_string(),
        _ => {}
    }
    if trimmed == "None" {
        return String::new();
    }
    trimmed.to_string()
}

/// A header row carries the literal `doi` in the DOI position.
pub fn is_header_row(fields: &[String]) -> bool {
    fields
        .get(col::DOI)
        .map(|f| f.trim().eq_ignore_ascii_case("doi"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fields: &[&str]) -> Record {
        Record::new(fields.iter().map(|f| f.to_string()).collect())
    }

    #[test]
    fn test_normalized_doi_trims_and_lowercases() {
        let rec = record(&["KTH", "2016", "1200.00", "  10.1109/TEST.2016 ", "Title", "IEEE"]);
        assert_eq!(rec.normalized_doi(), "10.1109/test.2016");
    }

    #[test]
    fn test_normalized_doi_empty_when_missing() {
        let rec = record(&["KTH", "2016"]);
        assert_eq!(rec.normalized_doi(), "");
    }

    #[test]
    fn test_field_out_of_range_is_empty() {
        let rec = record(&["KTH"]);
        assert_eq!(rec.field(col::PUBLISHER), "");
    }

    #[test]
    fn test_set_field_extends_short_row() {
        let mut rec = record(&["KTH"]);
        rec.set_field(col::PUBLISHER, "Elsevier BV".to_string());
        assert_eq!(rec.field(col::PUBLISHER), "Elsevier BV");
        assert_eq!(rec.field(col::DOI), "");
    }

    #[test]
    fn test_is_na() {
        assert!(is_na("NA"));
        assert!(is_na(""));
        assert!(is_na("   "));
        assert!(!is_na("Elsevier BV"));
        assert!(!is_na("na")); // sentinel is exact
    }

    #[test]
    fn test_normalize_amount_decimal_comma() {
        assert_eq!(normalize_amount("1200,50"), "1200.50");
        assert_eq!(normalize_amount("1 200,50"), "1200.50");
        assert_eq!(normalize_amount("1300.00"), "1300.00");
    }

    #[test]
    fn test_clean_field_booleans() {
        assert_eq!(clean_field("sant"), "TRUE");
        assert_eq!(clean_field("Falskt"), "FALSE");
        assert_eq!(clean_field("true"), "TRUE");
        assert_eq!(clean_field("false"), "FALSE");
    }

    #[test]
    fn test_clean_field_none_and_whitespace() {
        assert_eq!(clean_field("None"), "");
        assert_eq!(clean_field("  Elsevier BV  "), "Elsevier BV");
    }

    #[test]
    fn test_header_row_detection() {
        let header: Vec<String> = ["institution", "period", "euro", "doi", "title", "publisher"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert!(is_header_row(&header));

        let data: Vec<String> = ["KTH", "2016", "1200", "10.1/x", "Title", "IEEE"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert!(!is_header_row(&data));
    }

    #[test]
    fn test_record_ordering_is_lexicographic_over_fields() {
        let a = record(&["A", "2016", "100", "10.1/a"]);
        let b = record(&["A", "2017", "100", "10.1/b"]);
        let c = record(&["B", "2015", "100", "10.1/c"]);
        let mut rows = vec![c.clone(), b.clone(), a.clone()];
        rows.sort();
        assert_eq!(rows, vec![a, b, c]);
    }
}
