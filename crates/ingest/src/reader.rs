use crate::error::{IngestError, Result};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

/// One parsed source row.
#[derive(Debug, Clone)]
pub struct RawRow {
    /// 1-based line in the raw file (CSV data rows start at 2, after
    /// the header).
    pub line: usize,

    /// The original parsed record, retained verbatim for `raw_json`.
    pub value: Value,

    /// Flattened field view used for mapping: top-level fields in key
    /// order, with one level of nested-object children exposed as
    /// `parent.child` right after their parent.
    pub fields: Vec<(String, Value)>,
}

impl RawRow {
    fn from_object(line: usize, object: Map<String, Value>) -> Self {
        let mut fields = Vec::with_capacity(object.len());
        for (key, value) in &object {
            fields.push((key.clone(), value.clone()));
            if let Value::Object(children) = value {
                for (child_key, child_value) in children {
                    fields.push((format!("{key}.{child_key}"), child_value.clone()));
                }
            }
        }
        Self {
            line,
            value: Value::Object(object),
            fields,
        }
    }

    /// Field names observed in this row (flattened view), for mapping
    /// suggestion.
    #[must_use]
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// First scalar value bound to a field name.
    #[must_use]
    pub fn scalar(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, value)| field == name && is_scalar(value))
            .map(|(_, value)| value)
    }
}

#[must_use]
pub fn is_scalar(value: &Value) -> bool {
    matches!(
        value,
        Value::String(_) | Value::Number(_) | Value::Bool(_)
    )
}

/// Source file format, detected from the extension: `.csv` reads as
/// CSV with a header row, everything else as NDJSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Ndjson,
    Csv,
}

impl SourceFormat {
    #[must_use]
    pub fn detect(path: &Path) -> SourceFormat {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => SourceFormat::Csv,
            _ => SourceFormat::Ndjson,
        }
    }
}

/// Streaming reader over a raw export, yielding rows with 1-based line
/// numbers. Blank NDJSON lines are skipped; unparseable rows surface as
/// [`IngestError::MalformedRow`] so the run controller can apply the
/// strict/lenient policy.
pub struct RowReader {
    inner: ReaderKind,
}

enum ReaderKind {
    Ndjson {
        lines: Lines<BufReader<File>>,
        line: usize,
    },
    Csv {
        records: csv::StringRecordsIntoIter<File>,
        headers: Vec<String>,
        line: usize,
    },
}

impl RowReader {
    pub fn open(path: &Path) -> Result<RowReader> {
        let format = SourceFormat::detect(path);
        let inner = match format {
            SourceFormat::Ndjson => {
                let file = File::open(path)?;
                ReaderKind::Ndjson {
                    lines: BufReader::new(file).lines(),
                    line: 0,
                }
            }
            SourceFormat::Csv => {
                let file = File::open(path)?;
                let mut reader = csv::ReaderBuilder::new()
                    .has_headers(true)
                    .flexible(false)
                    .from_reader(file);
                let headers = reader
                    .headers()
                    .map_err(|err| IngestError::MalformedRow {
                        line: 1,
                        message: format!("unreadable CSV header: {err}"),
                    })?
                    .iter()
                    .map(str::to_string)
                    .collect();
                ReaderKind::Csv {
                    records: reader.into_records(),
                    headers,
                    // Header occupies line 1; data rows follow.
                    line: 1,
                }
            }
        };
        Ok(RowReader { inner })
    }
}

impl Iterator for RowReader {
    type Item = Result<RawRow>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            ReaderKind::Ndjson { lines, line } => loop {
                let text = match lines.next()? {
                    Ok(text) => text,
                    Err(err) => return Some(Err(err.into())),
                };
                *line += 1;
                if text.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Value>(&text) {
                    Ok(Value::Object(object)) => {
                        return Some(Ok(RawRow::from_object(*line, object)))
                    }
                    Ok(_) => {
                        return Some(Err(IngestError::MalformedRow {
                            line: *line,
                            message: "not a JSON object".to_string(),
                        }))
                    }
                    Err(err) => {
                        return Some(Err(IngestError::MalformedRow {
                            line: *line,
                            message: format!("invalid JSON: {err}"),
                        }))
                    }
                }
            },
            ReaderKind::Csv {
                records,
                headers,
                line,
            } => {
                let record = records.next()?;
                *line += 1;
                match record {
                    Ok(record) => {
                        let mut object = Map::new();
                        for (header, value) in headers.iter().zip(record.iter()) {
                            object.insert(header.clone(), Value::String(value.to_string()));
                        }
                        Some(Ok(RawRow::from_object(*line, object)))
                    }
                    Err(err) => Some(Err(IngestError::MalformedRow {
                        line: *line,
                        message: format!("invalid CSV record: {err}"),
                    })),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn ndjson_rows_keep_line_numbers() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("rows.ndjson");
        let mut file = File::create(&path).unwrap();
        writeln!(file, r#"{{"a": 1}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"a": 2}}"#).unwrap();
        drop(file);

        let rows: Vec<_> = RowReader::open(&path)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].line, 1);
        // The blank line still advances the counter.
        assert_eq!(rows[1].line, 3);
    }

    #[test]
    fn ndjson_bad_line_is_malformed_row() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("rows.ndjson");
        std::fs::write(&path, "{\"ok\": true}\nnot json\n").unwrap();

        let results: Vec<_> = RowReader::open(&path).unwrap().collect();
        assert!(results[0].is_ok());
        match &results[1] {
            Err(IngestError::MalformedRow { line, .. }) => assert_eq!(*line, 2),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn csv_rows_start_at_line_two() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("rows.csv");
        std::fs::write(&path, "ts,host\n2024-05-01T00:00:00Z,ws01\n").unwrap();

        let rows: Vec<_> = RowReader::open(&path)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].line, 2);
        assert_eq!(
            rows[0].scalar("host"),
            Some(&Value::String("ws01".to_string()))
        );
    }

    #[test]
    fn nested_objects_flatten_one_level() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("rows.ndjson");
        std::fs::write(
            &path,
            r#"{"outcome": {"result": "SUCCESS", "reason": null}, "published": "2024-05-01T00:00:00Z"}"#,
        )
        .unwrap();

        let rows: Vec<_> = RowReader::open(&path)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        let names = rows[0].field_names();
        assert!(names.contains(&"outcome"));
        assert!(names.contains(&"outcome.result"));
        assert_eq!(
            rows[0].scalar("outcome.result"),
            Some(&Value::String("SUCCESS".to_string()))
        );
        // The parent object itself is not scalar.
        assert_eq!(rows[0].scalar("outcome"), None);
    }
}
