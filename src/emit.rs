//! Release emitters.
//!
//! Thin serialization layer over frozen releases: pretty JSON for single
//! notices, NDJSON for batches, and the OCDS release-package envelope.

use std::io::Write;

use serde_json::{json, Value};

use crate::release::Release;

/// Error type for emission.
#[derive(Debug)]
pub enum EmitError {
    JsonError(serde_json::Error),
    IoError(std::io::Error),
}

impl From<serde_json::Error> for EmitError {
    fn from(err: serde_json::Error) -> Self {
        EmitError::JsonError(err)
    }
}

impl From<std::io::Error> for EmitError {
    fn from(err: std::io::Error) -> Self {
        EmitError::IoError(err)
    }
}

impl std::fmt::Display for EmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmitError::JsonError(e) => write!(f, "JSON error: {}", e),
            EmitError::IoError(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for EmitError {}

/// Pretty-printed JSON for one release.
pub fn to_json_pretty(release: &Release) -> Result<String, EmitError> {
    Ok(serde_json::to_string_pretty(release.as_value())?)
}

/// NDJSON writer: one release per line.
pub struct NdjsonWriter<W: Write> {
    writer: W,
}

impl<W: Write> NdjsonWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Write a single release as one NDJSON line.
    pub fn write(&mut self, release: &Release) -> Result<(), EmitError> {
        let json = serde_json::to_string(release.as_value())?;
        writeln!(self.writer, "{}", json)?;
        Ok(())
    }

    /// Flush the underlying writer.
    pub fn flush(&mut self) -> Result<(), EmitError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Wrap releases in an OCDS release package.
///
/// `published_date` is supplied by the caller so batch output stays
/// reproducible.
pub fn package(releases: &[&Release], published_date: &str) -> Value {
    let releases: Vec<&Value> = releases.iter().map(|r| r.as_value()).collect();
    json!({
        "version": "1.1",
        "publishedDate": published_date,
        "releases": releases
    })
}

/// Write a release package to a sink.
pub fn write_package<W: Write>(
    mut writer: W,
    releases: &[&Release],
    published_date: &str,
) -> Result<(), EmitError> {
    let value = package(releases, published_date);
    serde_json::to_writer_pretty(&mut writer, &value)?;
    writeln!(writer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::Cursor;
    use serde_json::json;

    fn sample_release(id: &str) -> Release {
        let mut release = Release::new();
        release.set(&Cursor::from_dotted("id"), json!(id));
        release.set(&Cursor::from_dotted("tender.title"), json!("Works"));
        release.freeze();
        release
    }

    #[test]
    fn test_pretty_json() {
        let release = sample_release("notice-1");
        let out = to_json_pretty(&release).unwrap();

        assert!(out.contains("\"id\": \"notice-1\""));
        assert!(out.contains("\"title\": \"Works\""));
    }

    #[test]
    fn test_ndjson_one_line_per_release() {
        let mut buf = Vec::new();
        let mut writer = NdjsonWriter::new(&mut buf);

        writer.write(&sample_release("a")).unwrap();
        writer.write(&sample_release("b")).unwrap();
        writer.flush().unwrap();

        let output = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"a\""));
        assert!(lines[1].contains("\"b\""));
    }

    #[test]
    fn test_package_envelope() {
        let a = sample_release("a");
        let b = sample_release("b");
        let value = package(&[&a, &b], "2020-05-20T00:00:00Z");

        assert_eq!(value["version"], json!("1.1"));
        assert_eq!(value["publishedDate"], json!("2020-05-20T00:00:00Z"));
        assert_eq!(value["releases"].as_array().unwrap().len(), 2);
        assert_eq!(value["releases"][0]["id"], json!("a"));
    }
}
