//! Header discovery
//!
//! Archive exports prepend an arbitrary number of `#` comment lines before the
//! real header. The locator tries each line offset in turn, parses a short
//! probe and accepts the first offset whose header names a known disposition
//! column.

use crate::config::PipelineConfig;
use crate::error::{OrbitalError, Result};
use polars::prelude::*;
use std::io::Cursor;
use std::ops::Range;
use tracing::{debug, info};

/// Table parsed at the located header line
#[derive(Debug, Clone)]
pub struct RawTable {
    pub header_offset: usize,
    pub frame: DataFrame,
}

impl RawTable {
    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect()
    }
}

/// Return the first offset in `offsets` whose probed column names contain a
/// candidate (case-insensitive equality). `probe` yields `None` when the
/// offset cannot be parsed.
pub fn search_header<F>(offsets: Range<usize>, candidates: &[String], mut probe: F) -> Option<usize>
where
    F: FnMut(usize) -> Option<Vec<String>>,
{
    offsets.into_iter().find(|&offset| match probe(offset) {
        Some(columns) => columns.iter().any(|column| {
            let column = column.trim().to_lowercase();
            candidates.iter().any(|c| *c == column)
        }),
        None => {
            debug!(offset, "probe parse failed");
            false
        }
    })
}

#[derive(Debug, Clone)]
pub struct HeaderLocator {
    candidates: Vec<String>,
    search_limit: usize,
    probe_rows: usize,
}

impl HeaderLocator {
    pub fn new(candidates: &[String], search_limit: usize, probe_rows: usize) -> Self {
        Self {
            candidates: candidates.iter().map(|c| c.trim().to_lowercase()).collect(),
            search_limit,
            probe_rows: probe_rows.max(1),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(&config.target_columns, config.header_search_limit, config.probe_rows)
    }

    /// Locate the header and parse the full table beneath it.
    pub fn locate(&self, text: &str) -> Result<RawTable> {
        let starts = line_starts(text);
        let limit = self.search_limit.min(starts.len());
        let mut next = 0;

        while let Some(offset) =
            search_header(next..limit, &self.candidates, |o| self.probe(text, &starts, o))
        {
            match parse_csv(&text[starts[offset]..], None) {
                Ok(frame) => {
                    info!(
                        header_offset = offset,
                        rows = frame.height(),
                        columns = frame.width(),
                        "located dataset header"
                    );
                    return Ok(RawTable {
                        header_offset: offset,
                        frame,
                    });
                }
                Err(e) => {
                    debug!(offset, error = %e, "full parse failed, continuing search");
                    next = offset + 1;
                }
            }
        }

        Err(OrbitalError::HeaderNotFound {
            searched: self.search_limit,
        })
    }

    fn probe(&self, text: &str, starts: &[usize], offset: usize) -> Option<Vec<String>> {
        let begin = starts[offset];
        let end = starts
            .get(offset + self.probe_rows + 1)
            .copied()
            .unwrap_or(text.len());
        let frame = parse_csv(&text[begin..end], Some(self.probe_rows)).ok()?;
        Some(
            frame
                .get_column_names()
                .iter()
                .map(|name| name.to_string())
                .collect(),
        )
    }
}

/// Byte offset where each line starts. A trailing newline does not open a
/// new line.
fn line_starts(text: &str) -> Vec<usize> {
    let mut starts = vec![0];
    starts.extend(
        text.match_indices('\n')
            .map(|(i, _)| i + 1)
            .filter(|&i| i < text.len()),
    );
    starts
}

fn parse_csv(text: &str, infer_rows: Option<usize>) -> PolarsResult<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(infer_rows)
        .into_reader_with_file_handle(Cursor::new(text.as_bytes()))
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates() -> Vec<String> {
        vec!["koi_disposition".into(), "tfopwg_disp".into(), "disposition".into()]
    }

    #[test]
    fn test_search_header_pure() {
        let headers = [
            vec!["# comment".to_string()],
            vec!["a".to_string(), "b".to_string()],
            vec!["kepid".to_string(), "KOI_DISPOSITION".to_string()],
        ];
        let found = search_header(0..3, &candidates(), |o| Some(headers[o].clone()));
        assert_eq!(found, Some(2));

        let none = search_header(0..2, &candidates(), |o| Some(headers[o].clone()));
        assert_eq!(none, None);
    }

    #[test]
    fn test_search_header_skips_parse_failures() {
        let found = search_header(0..4, &candidates(), |o| {
            if o < 3 {
                None
            } else {
                Some(vec!["disposition".to_string()])
            }
        });
        assert_eq!(found, Some(3));
    }

    #[test]
    fn test_locate_after_comment_lines() {
        let mut text = String::new();
        for i in 0..12 {
            text.push_str(&format!("# comment line {}\n", i));
        }
        text.push_str("kepid,koi_disposition,koi_period\n");
        text.push_str("1,CONFIRMED,10.5\n2,FALSE POSITIVE,3.2\n3,CANDIDATE,7.7\n");

        let locator = HeaderLocator::new(&candidates(), 300, 5);
        let table = locator.locate(&text).unwrap();
        assert_eq!(table.header_offset, 12);
        assert_eq!(table.frame.height(), 3);
        assert!(table.column_names().contains(&"koi_disposition".to_string()));
    }

    #[test]
    fn test_locate_at_zero() {
        let text = "tfopwg_disp,pl_orbper\nPC,1.0\nFP,2.0\n";
        let locator = HeaderLocator::new(&candidates(), 300, 5);
        assert_eq!(locator.locate(text).unwrap().header_offset, 0);
    }

    #[test]
    fn test_header_not_found() {
        let mut text = String::from("a,b,c\n");
        for i in 0..50 {
            text.push_str(&format!("{},{},{}\n", i, i * 2, i * 3));
        }
        let locator = HeaderLocator::new(&candidates(), 300, 5);
        assert!(matches!(
            locator.locate(&text),
            Err(OrbitalError::HeaderNotFound { .. })
        ));
    }

    #[test]
    fn test_header_beyond_limit() {
        let mut text = String::new();
        for _ in 0..10 {
            text.push_str("# preamble\n");
        }
        text.push_str("disposition,x\nCONFIRMED,1\n");
        let locator = HeaderLocator::new(&candidates(), 5, 5);
        assert!(locator.locate(&text).is_err());
    }

    #[test]
    fn test_line_starts() {
        assert_eq!(line_starts("a\nb\n"), vec![0, 2]);
        assert_eq!(line_starts("a\nb"), vec![0, 2]);
        assert_eq!(line_starts(""), vec![0]);
    }
}
