//! Report serialization for JSON and JSON Lines output.

use serde::Serialize;
use std::io::{self, Write};

/// Machine-readable output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty-printed JSON, one document per item
    Json,
    /// One compact JSON object per line
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

/// Serializes run reports to a writer as they complete.
pub struct OutputWriter<W: Write> {
    writer: W,
    format: OutputFormat,
    items_written: usize,
}

impl<W: Write> OutputWriter<W> {
    pub fn new(writer: W, format: OutputFormat) -> Self {
        Self {
            writer,
            format,
            items_written: 0,
        }
    }

    /// Write one item followed by a newline.
    pub fn write<T: Serialize>(&mut self, item: &T) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut self.writer, item).map_err(io::Error::other)?
            }
            OutputFormat::JsonLines => {
                serde_json::to_writer(&mut self.writer, item).map_err(io::Error::other)?
            }
        }
        writeln!(self.writer)?;
        self.items_written += 1;
        Ok(())
    }

    pub fn items_written(&self) -> usize {
        self.items_written
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Narrative;

    #[derive(Serialize)]
    struct Item {
        caption: &'static str,
        narrative: Narrative,
    }

    fn item(caption: &'static str) -> Item {
        Item {
            caption,
            narrative: Narrative::fallback("HTTP 429"),
        }
    }

    #[test]
    fn test_jsonl_one_object_per_line() {
        let mut buffer = Vec::new();
        let mut writer = OutputWriter::new(&mut buffer, OutputFormat::JsonLines);
        writer.write(&item("a cat")).unwrap();
        writer.write(&item("a dog")).unwrap();
        assert_eq!(writer.items_written(), 2);

        let output = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["caption"], "a cat");
        assert_eq!(first["narrative"]["kind"], "fallback");
    }

    #[test]
    fn test_json_is_pretty() {
        let mut buffer = Vec::new();
        let mut writer = OutputWriter::new(&mut buffer, OutputFormat::Json);
        writer.write(&item("a cat")).unwrap();

        let output = String::from_utf8(buffer).unwrap();
        assert!(output.starts_with("{\n"));
        assert!(output.contains("\"caption\": \"a cat\""));
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(OutputFormat::parse("json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("NDJSON"), Some(OutputFormat::JsonLines));
        assert_eq!(OutputFormat::parse("text"), None);
    }
}
