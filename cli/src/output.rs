//! Printing monitor results.

use std::io::Write;

use anyhow::Result;
use bookmarks_directory_monitor::{Evaluation, FileRecord, MonitorEvent, Snapshot};
use serde_json::{Value, json};

/// Writes events and listings to stdout, as text or JSON lines.
#[derive(Debug, Clone, Copy)]
pub struct Printer {
    json: bool,
}

impl Printer {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    pub fn event(&self, event: &MonitorEvent) -> Result<()> {
        if self.json {
            return emit(&event_json(event));
        }

        let mut out = std::io::stdout().lock();
        write_event(&mut out, event)
    }

    pub fn evaluation(&self, evaluation: &Evaluation) -> Result<()> {
        if self.json {
            let errors: Vec<String> = evaluation
                .entry_errors
                .iter()
                .map(ToString::to_string)
                .collect();
            return emit(&json!({
                "contents": evaluation.snapshot,
                "errors": errors,
            }));
        }

        let mut out = std::io::stdout().lock();
        write_records(&mut out, &evaluation.snapshot)?;
        for error in &evaluation.entry_errors {
            writeln!(out, "skipped: {error}")?;
        }
        Ok(())
    }
}

fn event_json(event: &MonitorEvent) -> Value {
    match event {
        MonitorEvent::GatheringFinished(contents) => {
            json!({ "event": "gathering_finished", "contents": contents })
        }
        MonitorEvent::Updated(contents) => json!({ "event": "updated", "contents": contents }),
        MonitorEvent::Error(error) => json!({ "event": "error", "message": error.to_string() }),
    }
}

fn write_event(out: &mut impl Write, event: &MonitorEvent) -> Result<()> {
    if let Some(contents) = event.contents() {
        let heading = match event {
            MonitorEvent::GatheringFinished(_) => "gathering finished",
            _ => "updated",
        };
        writeln!(out, "{heading}: {} file(s)", contents.len())?;
        write_records(out, contents)?;
    } else if let MonitorEvent::Error(error) = event {
        writeln!(out, "error: {error}")?;
    }
    Ok(())
}

fn emit(value: &Value) -> Result<()> {
    let mut out = std::io::stdout().lock();
    serde_json::to_writer(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

fn write_records(out: &mut impl Write, contents: &Snapshot) -> Result<()> {
    for record in contents {
        writeln!(out, "  {}", describe(record))?;
    }
    Ok(())
}

fn describe(record: &FileRecord) -> String {
    format!(
        "{} ({} bytes, modified {})",
        record.file_name,
        record.size,
        record.last_modified.format("%Y-%m-%d %H:%M:%S UTC")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookmarks_directory_monitor::MonitorError;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_event_json_shape() {
        let value = event_json(&MonitorEvent::Updated(Snapshot::default()));
        assert_eq!(value, json!({ "event": "updated", "contents": [] }));

        let error = MonitorError::Config("bad".to_string());
        let value = event_json(&MonitorEvent::Error(error));
        assert_eq!(value["event"], "error");
        assert_eq!(value["message"], "configuration error: bad");
    }

    #[test]
    fn test_text_event_lists_files() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("Home.kml");
        std::fs::write(&path, "<kml/>").unwrap();
        let contents: Snapshot = [FileRecord::from_path(&path).unwrap()].into_iter().collect();

        let mut out = Vec::new();
        write_event(&mut out, &MonitorEvent::GatheringFinished(contents)).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("gathering finished: 1 file(s)\n  Home.kml (6 bytes"));

        let mut out = Vec::new();
        let error = MonitorError::Config("bad".to_string());
        write_event(&mut out, &MonitorEvent::Error(error)).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "error: configuration error: bad\n"
        );
    }

    #[test]
    fn test_describe_record() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("Home.kml");
        std::fs::write(&path, "<kml/>").unwrap();

        let record = FileRecord::from_path(&path).unwrap();
        assert!(describe(&record).starts_with("Home.kml (6 bytes, modified "));
    }
}
