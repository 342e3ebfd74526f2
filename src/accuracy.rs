//! Replays a delimited export of `(identifier, ..., expected_bucket)` rows
//! against a [`BucketMapper`] and reports how many buckets agree.
//!
//! The first line is a header. Identifier is the first field and the expected
//! bucket the last one; anything in between is ignored.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use rayon::prelude::*;

use crate::bucket::BucketMapper;

const DELIMITER: char = ',';

#[derive(Debug, thiserror::Error)]
pub enum AccuracyError {
    #[error("failed to open {path}")]
    Open {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to read line {line}")]
    Read {
        line: usize,
        source: std::io::Error,
    },
}

/// Why a row was left out of the comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    EmptyLine,
    TooFewFields,
    EmptyIdentifier,
    EmptyExpected,
    NonIntegerExpected,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Row<'a> {
    pub identifier: &'a str,
    pub expected: i64,
}

pub fn parse_row(line: &str) -> Result<Row<'_>, SkipReason> {
    if line.is_empty() {
        return Err(SkipReason::EmptyLine);
    }
    let mut fields = line.split(DELIMITER);
    let first = fields.next().unwrap_or_default();
    let Some(last) = fields.next_back() else {
        return Err(SkipReason::TooFewFields);
    };
    let identifier = first.trim();
    let expected = last.trim();
    if identifier.is_empty() {
        return Err(SkipReason::EmptyIdentifier);
    }
    if expected.is_empty() {
        return Err(SkipReason::EmptyExpected);
    }
    let expected = expected
        .parse::<i64>()
        .map_err(|_| SkipReason::NonIntegerExpected)?;
    Ok(Row {
        identifier,
        expected,
    })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RowOutcome {
    pub identifier: String,
    pub expected: i64,
    pub predicted: u32,
}

impl RowOutcome {
    pub fn is_match(&self) -> bool {
        self.expected == self.predicted as i64
    }
}

#[derive(Clone, Debug, Default)]
pub struct Report {
    /// `None` when the input had no lines at all.
    pub header: Option<String>,
    pub outcomes: Vec<RowOutcome>,
    pub skipped: usize,
}

impl Report {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn matches(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_match()).count()
    }

    /// Percentage of matching rows, `None` if no row was valid.
    pub fn accuracy(&self) -> Option<f64> {
        match self.total() {
            0 => None,
            total => Some(self.matches() as f64 * 100.0 / total as f64),
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(header) = &self.header else {
            return writeln!(f, "No rows to evaluate.");
        };
        writeln!(f, "Using CSV header: {}", header)?;
        for outcome in &self.outcomes {
            writeln!(
                f,
                "adid={} expected={} predicted={}",
                outcome.identifier, outcome.expected, outcome.predicted
            )?;
        }
        match self.accuracy() {
            None => writeln!(f, "No valid rows processed."),
            Some(accuracy) => writeln!(
                f,
                "\nMatches: {}/{}  Accuracy: {:.2}%",
                self.matches(),
                self.total(),
                accuracy
            ),
        }
    }
}

pub fn evaluate_path(path: &Path, mapper: &BucketMapper) -> Result<Report, AccuracyError> {
    let file = File::open(path).map_err(|source| AccuracyError::Open {
        path: path.display().to_string(),
        source,
    })?;
    evaluate(BufReader::new(file), mapper)
}

/// Reads every line first, then buckets the valid rows in parallel. Output
/// order follows input order.
pub fn evaluate<R: BufRead>(reader: R, mapper: &BucketMapper) -> Result<Report, AccuracyError> {
    let mut lines = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| AccuracyError::Read { line: i + 1, source })?;
        lines.push(line);
    }
    let Some(header) = lines.first() else {
        return Ok(Report::default());
    };

    let mut skipped = 0;
    let mut rows = Vec::with_capacity(lines.len() - 1);
    for (i, line) in lines[1..].iter().enumerate() {
        match parse_row(line) {
            Ok(row) => rows.push(row),
            Err(reason) => {
                // +2: one-based, after the header.
                log::debug!("skipping line {}: {:?}", i + 2, reason);
                skipped += 1;
            }
        }
    }

    let outcomes = rows
        .par_iter()
        .map_init(Vec::new, |payload, row| RowOutcome {
            identifier: row.identifier.to_string(),
            expected: row.expected,
            predicted: mapper.bucket_with(payload, row.identifier),
        })
        .collect();

    let report = Report {
        header: Some(header.clone()),
        outcomes,
        skipped,
    };
    log::info!(
        "evaluated {} rows, {} matched, {} skipped",
        report.total(),
        report.matches(),
        report.skipped
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parse_rules() {
        assert_eq!(
            parse_row(" abc123 ,foo, 96 "),
            Ok(Row {
                identifier: "abc123",
                expected: 96
            })
        );
        assert_eq!(parse_row(""), Err(SkipReason::EmptyLine));
        assert_eq!(parse_row("abc123"), Err(SkipReason::TooFewFields));
        assert_eq!(parse_row(" ,5"), Err(SkipReason::EmptyIdentifier));
        assert_eq!(parse_row("abc123,"), Err(SkipReason::EmptyExpected));
        assert_eq!(parse_row("abc123,  "), Err(SkipReason::EmptyExpected));
        assert_eq!(parse_row("abc123,x7"), Err(SkipReason::NonIntegerExpected));
        assert_eq!(parse_row("abc123,9.5"), Err(SkipReason::NonIntegerExpected));
    }

    #[test]
    fn open_error_keeps_io_error_as_source() {
        use std::error::Error;

        let err = evaluate_path(
            Path::new("/nonexistent/farm-bucket/export.csv"),
            &BucketMapper::default(),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed to open /nonexistent/farm-bucket/export.csv"
        );
        let source = err.source().unwrap().to_string();
        assert!(!err.to_string().contains(&source));
    }

    #[test]
    fn read_error_reports_line_number() {
        let input: &[u8] = b"adid,bucket\nabc123,96\n\xff\xfe,1\n";
        let err = evaluate(input, &BucketMapper::default()).unwrap_err();
        assert_eq!(err.to_string(), "failed to read line 3");
    }

    #[test]
    fn empty_input() {
        let report = evaluate(Cursor::new(""), &BucketMapper::default()).unwrap();
        assert_eq!(report.header, None);
        assert_eq!(report.to_string(), "No rows to evaluate.\n");
    }

    #[test]
    fn header_only() {
        let report = evaluate(Cursor::new("adid,bucket\n"), &BucketMapper::default()).unwrap();
        assert_eq!(report.accuracy(), None);
        assert_eq!(
            report.to_string(),
            "Using CSV header: adid,bucket\nNo valid rows processed.\n"
        );
    }

    #[test]
    fn counts_matches_and_skips() {
        let input = "adid,segment,bucket\n\
                     abc123,x,96\n\
                     1234-5678-ABCD,y,47\n\
                     A1B2C3D4,z,0\n\
                     \n\
                     broken\n\
                     xyz-987,w,n/a\n";
        let report = evaluate(Cursor::new(input), &BucketMapper::default()).unwrap();
        assert_eq!(report.total(), 3);
        assert_eq!(report.matches(), 2);
        assert_eq!(report.skipped, 3);
        let predicted: Vec<u32> = report.outcomes.iter().map(|o| o.predicted).collect();
        assert_eq!(predicted, vec![96, 47, 98]);
        assert!(
            report
                .to_string()
                .ends_with("\nMatches: 2/3  Accuracy: 66.67%\n")
        );
    }

    #[test]
    fn order_does_not_change_buckets() {
        let forward = "h\nabc123,1\nxyz-987,2\nA1B2C3D4,3\n";
        let backward = "h\nA1B2C3D4,3\nxyz-987,2\nabc123,1\n";
        let mapper = BucketMapper::default();
        let mut a = evaluate(Cursor::new(forward), &mapper).unwrap().outcomes;
        let mut b = evaluate(Cursor::new(backward), &mapper).unwrap().outcomes;
        a.sort_by(|x, y| x.identifier.cmp(&y.identifier));
        b.sort_by(|x, y| x.identifier.cmp(&y.identifier));
        assert_eq!(a, b);
    }
}
