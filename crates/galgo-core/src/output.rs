//! Streaming JSON / JSONL output of ingestion outcomes.
//!
//! JSON output is a single array written incrementally, so outcomes can be
//! emitted as each batch chunk completes.

use serde::Serialize;
use std::io::{self, Write};

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// One JSON array
    Json,
    /// One JSON object per line (newline-delimited JSON)
    JsonLines,
}

impl OutputFormat {
    /// Parse format from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "jsonl" | "jsonlines" | "ndjson" => Some(Self::JsonLines),
            _ => None,
        }
    }
}

/// Writes serializable items one at a time in the chosen format.
///
/// For [`OutputFormat::Json`] the closing bracket is only written by
/// [`OutputWriter::finish`].
pub struct OutputWriter<W: Write> {
    writer: W,
    format: OutputFormat,
    pretty: bool,
    items_written: usize,
}

impl<W: Write> OutputWriter<W> {
    /// `pretty` only affects JSON output.
    pub fn new(writer: W, format: OutputFormat, pretty: bool) -> Self {
        Self {
            writer,
            format,
            pretty,
            items_written: 0,
        }
    }

    /// Append one item.
    pub fn write<T: Serialize>(&mut self, item: &T) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => {
                let separator = match (self.items_written == 0, self.pretty) {
                    (true, true) => "[\n  ",
                    (true, false) => "[",
                    (false, true) => ",\n  ",
                    (false, false) => ",",
                };
                self.writer.write_all(separator.as_bytes())?;
                if self.pretty {
                    let text = serde_json::to_string_pretty(item).map_err(io::Error::other)?;
                    self.writer.write_all(text.replace('\n', "\n  ").as_bytes())?;
                } else {
                    serde_json::to_writer(&mut self.writer, item).map_err(io::Error::other)?;
                }
            }
            OutputFormat::JsonLines => {
                serde_json::to_writer(&mut self.writer, item).map_err(io::Error::other)?;
                writeln!(self.writer)?;
            }
        }
        self.items_written += 1;
        Ok(())
    }

    /// Append every item in order.
    pub fn write_all<T: Serialize>(&mut self, items: &[T]) -> io::Result<()> {
        items.iter().try_for_each(|item| self.write(item))
    }

    /// Get the number of items written.
    pub fn items_written(&self) -> usize {
        self.items_written
    }

    /// Close the JSON array (if any), flush, and return the writer.
    pub fn finish(mut self) -> io::Result<W> {
        if self.format == OutputFormat::Json {
            let closing = match (self.items_written == 0, self.pretty) {
                (true, _) => "[]\n",
                (false, true) => "\n]\n",
                (false, false) => "]\n",
            };
            self.writer.write_all(closing.as_bytes())?;
        }
        self.writer.flush()?;
        Ok(self.writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureReason;
    use crate::types::IngestionOutcome;

    fn rejected(name: &str) -> IngestionOutcome {
        IngestionOutcome::Rejected {
            file_name: name.to_string(),
            reason: FailureReason::UnsupportedType("not media".to_string()),
        }
    }

    #[test]
    fn test_json_array_is_valid() {
        for pretty in [false, true] {
            let mut writer = OutputWriter::new(Vec::new(), OutputFormat::Json, pretty);
            writer.write(&rejected("a.txt")).unwrap();
            writer.write(&rejected("b.txt")).unwrap();
            let output = writer.finish().unwrap();

            let parsed: serde_json::Value = serde_json::from_slice(&output).unwrap();
            let items = parsed.as_array().unwrap();
            assert_eq!(items.len(), 2);
            assert_eq!(items[1]["file_name"], "b.txt");
            assert_eq!(items[0]["status"], "rejected");
        }
    }

    #[test]
    fn test_empty_json_array() {
        let writer = OutputWriter::new(Vec::new(), OutputFormat::Json, true);
        let output = writer.finish().unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "[]\n");
    }

    #[test]
    fn test_write_jsonl() {
        let mut writer = OutputWriter::new(Vec::new(), OutputFormat::JsonLines, true);
        writer
            .write_all(&[rejected("a.txt"), rejected("b.txt")])
            .unwrap();
        assert_eq!(writer.items_written(), 2);

        let output = String::from_utf8(writer.finish().unwrap()).unwrap();
        let lines: Vec<&str> = output.trim().split('\n').collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["reason"]["kind"], "unsupported_type");
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(OutputFormat::parse("json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("JSONL"), Some(OutputFormat::JsonLines));
        assert_eq!(OutputFormat::parse("csv"), None);
    }
}
