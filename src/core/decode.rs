//! Purpose: Turn raw mdbtools CSV output lines into columns and records.
//! Exports: `Record`, `RecordSet`, `decode_columns`, `decode_records`, offsets.
//! Invariants: Decoding is a pure function of the line sequence; no I/O here.
//! Invariants: Every record carries exactly one value per column, in column order.

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::core::error::{Error, ErrorKind};

/// Leading parsed rows to discard for a plain `mdb-export` table export:
/// just the header line.
pub const TABLE_OFFSET: usize = 1;

/// Leading parsed rows to discard for an `mdb-sql` query result, which
/// prepends one extra header line before the column row.
pub const QUERY_OFFSET: usize = 2;

/// One data row: `(column, value)` pairs in column order. The export format
/// cannot distinguish NULL from an empty string, so the empty string stands
/// in for both.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    fn is_trailing_artifact(&self) -> bool {
        if self.fields.len() <= 1 {
            return false;
        }
        let first_empty = self.fields.first().is_some_and(|(_, v)| v.is_empty());
        let last_empty = self.fields.last().is_some_and(|(_, v)| v.is_empty());
        first_empty && last_empty
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// The decoded contents of one table or query result. Built fresh per decode
/// call and never mutated afterwards.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RecordSet {
    records: Vec<Record>,
}

impl RecordSet {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }
}

impl IntoIterator for RecordSet {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl Serialize for RecordSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.records.len()))?;
        for record in &self.records {
            seq.serialize_element(record)?;
        }
        seq.end()
    }
}

/// Decode the column names from a headers-on export: the first line, parsed
/// as one CSV record. Independent of the data-row offset rule.
pub fn decode_columns(lines: &[String]) -> Result<Vec<String>, Error> {
    let header = lines.first().ok_or_else(|| {
        Error::new(ErrorKind::MalformedExport).with_message("export produced no output")
    })?;

    let mut reader = csv_reader(header);
    let mut row = csv::StringRecord::new();
    let found = reader.read_record(&mut row).map_err(malformed)?;
    if !found {
        return Err(Error::new(ErrorKind::MalformedExport).with_message("export header is blank"));
    }
    Ok(row.iter().map(str::to_string).collect())
}

/// Decode data rows from an export, skipping the first `offset` parsed rows
/// and zipping each remaining row against `columns` positionally.
///
/// The export emits a spurious blank row at end-of-stream; when the final
/// record has more than one field and both its first and last values are
/// empty it is dropped. A single-column table keeps its final blank value.
pub fn decode_records(
    lines: &[String],
    columns: &[String],
    offset: usize,
) -> Result<RecordSet, Error> {
    // Quoted fields may span lines, so the document is parsed whole rather
    // than line by line.
    let document = lines.join("\n");
    let mut reader = csv_reader(&document);

    let mut parsed = 0usize;
    let mut records = Vec::new();
    let mut row = csv::StringRecord::new();
    while reader.read_record(&mut row).map_err(malformed)? {
        parsed += 1;
        if parsed <= offset {
            continue;
        }
        if row.len() != columns.len() {
            return Err(Error::new(ErrorKind::RowShapeMismatch).with_message(format!(
                "data row {} has {} fields, expected {}",
                parsed - offset,
                row.len(),
                columns.len()
            )));
        }
        let fields = columns
            .iter()
            .cloned()
            .zip(row.iter().map(str::to_string))
            .collect();
        records.push(Record { fields });
    }

    if parsed < offset {
        return Err(Error::new(ErrorKind::MalformedExport).with_message(format!(
            "export has {parsed} rows, expected at least {offset} header rows"
        )));
    }

    if records.last().is_some_and(Record::is_trailing_artifact) {
        records.pop();
    }

    Ok(RecordSet { records })
}

fn csv_reader(document: &str) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(document.as_bytes())
}

fn malformed(err: csv::Error) -> Error {
    Error::new(ErrorKind::MalformedExport)
        .with_message("export is not valid CSV")
        .with_source(err)
}

#[cfg(test)]
mod tests {
    use super::{QUERY_OFFSET, TABLE_OFFSET, decode_columns, decode_records};
    use crate::core::error::ErrorKind;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|line| line.to_string()).collect()
    }

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn columns_come_from_the_first_line_only() {
        let raw = lines(&["id,name,price", "1,widget,9.99"]);
        assert_eq!(
            decode_columns(&raw).expect("columns"),
            columns(&["id", "name", "price"])
        );
    }

    #[test]
    fn columns_unescape_quoted_names() {
        let raw = lines(&[r#"id,"name, long","qty""#]);
        assert_eq!(
            decode_columns(&raw).expect("columns"),
            columns(&["id", "name, long", "qty"])
        );
    }

    #[test]
    fn empty_export_is_malformed() {
        let err = decode_columns(&[]).expect_err("err");
        assert_eq!(err.kind(), ErrorKind::MalformedExport);
    }

    #[test]
    fn table_export_scenario() {
        // "col1,col2\n1,2\n3,4\n,\n" with offset 1: two records, artifact dropped.
        let raw = lines(&["col1,col2", "1,2", "3,4", ","]);
        let cols = decode_columns(&raw).expect("columns");
        let set = decode_records(&raw, &cols, TABLE_OFFSET).expect("records");
        assert_eq!(set.len(), 2);
        assert_eq!(set.records()[0].get("col1"), Some("1"));
        assert_eq!(set.records()[0].get("col2"), Some("2"));
        assert_eq!(set.records()[1].get("col1"), Some("3"));
        assert_eq!(set.records()[1].get("col2"), Some("4"));
    }

    #[test]
    fn every_record_matches_column_count_and_order() {
        let raw = lines(&["a,b,c", "1,2,3", "4,5,6"]);
        let cols = columns(&["a", "b", "c"]);
        let set = decode_records(&raw, &cols, TABLE_OFFSET).expect("records");
        for record in set.iter() {
            assert_eq!(record.len(), cols.len());
            let names: Vec<&str> = record.iter().map(|(name, _)| name).collect();
            assert_eq!(names, vec!["a", "b", "c"]);
        }
    }

    #[test]
    fn single_column_final_empty_row_is_kept() {
        // One-field rows never trip the artifact guard, even when empty.
        let raw = lines(&["a", "x", r#""""#]);
        let cols = columns(&["a"]);
        let set = decode_records(&raw, &cols, TABLE_OFFSET).expect("records");
        assert_eq!(set.len(), 2);
        assert_eq!(set.records()[0].get("a"), Some("x"));
        assert_eq!(set.records()[1].get("a"), Some(""));
    }

    #[test]
    fn multi_column_trailing_blank_row_is_dropped() {
        let raw = lines(&["a,b", "1,x", "2,y", ","]);
        let cols = columns(&["a", "b"]);
        let set = decode_records(&raw, &cols, TABLE_OFFSET).expect("records");
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn interior_blank_row_survives() {
        let raw = lines(&["a,b", ",", "2,y"]);
        let cols = columns(&["a", "b"]);
        let set = decode_records(&raw, &cols, TABLE_OFFSET).expect("records");
        assert_eq!(set.len(), 2);
        assert_eq!(set.records()[0].get("a"), Some(""));
    }

    #[test]
    fn offset_two_skips_the_query_preface() {
        let with_preface = lines(&["1 row retrieved", "col1,col2", "1,2", "3,4"]);
        let plain = lines(&["col1,col2", "1,2", "3,4"]);
        let cols = columns(&["col1", "col2"]);
        let via_query = decode_records(&with_preface, &cols, QUERY_OFFSET).expect("records");
        let via_table = decode_records(&plain, &cols, TABLE_OFFSET).expect("records");
        assert_eq!(via_query, via_table);
    }

    #[test]
    fn decoding_is_idempotent() {
        let raw = lines(&["a,b", "1,x", "2,y"]);
        let cols = columns(&["a", "b"]);
        let first = decode_records(&raw, &cols, TABLE_OFFSET).expect("records");
        let second = decode_records(&raw, &cols, TABLE_OFFSET).expect("records");
        assert_eq!(first, second);
    }

    #[test]
    fn fewer_rows_than_offset_is_malformed() {
        let raw = lines(&["col1,col2"]);
        let cols = columns(&["col1", "col2"]);
        let err = decode_records(&raw, &cols, QUERY_OFFSET).expect_err("err");
        assert_eq!(err.kind(), ErrorKind::MalformedExport);

        let err = decode_records(&[], &cols, TABLE_OFFSET).expect_err("err");
        assert_eq!(err.kind(), ErrorKind::MalformedExport);
    }

    #[test]
    fn row_width_disagreement_is_reported_not_zipped() {
        let raw = lines(&["a,b", "1,2,3"]);
        let cols = columns(&["a", "b"]);
        let err = decode_records(&raw, &cols, TABLE_OFFSET).expect_err("err");
        assert_eq!(err.kind(), ErrorKind::RowShapeMismatch);
        let text = err.to_string();
        assert!(text.contains("data row 1"));
        assert!(text.contains("3 fields"));
        assert!(text.contains("expected 2"));
    }

    #[test]
    fn quoted_fields_keep_commas_and_newlines() {
        let raw = lines(&["a,b", r#""x, y","line one"#, r#"line two""#]);
        let cols = columns(&["a", "b"]);
        let set = decode_records(&raw, &cols, TABLE_OFFSET).expect("records");
        assert_eq!(set.len(), 1);
        assert_eq!(set.records()[0].get("a"), Some("x, y"));
        assert_eq!(set.records()[0].get("b"), Some("line one\nline two"));
    }

    #[test]
    fn record_serializes_in_column_order() {
        let raw = lines(&["zeta,alpha", "1,2"]);
        let cols = columns(&["zeta", "alpha"]);
        let set = decode_records(&raw, &cols, TABLE_OFFSET).expect("records");
        let json = serde_json::to_string(&set).expect("json");
        assert_eq!(json, r#"[{"zeta":"1","alpha":"2"}]"#);
    }
}
