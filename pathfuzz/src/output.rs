use anyhow::Result;
use clap::ValueEnum;
use dir_fuzz::{FuzzResult, RunOutcome};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_else(|_| String::new())
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat { Text, Json, Jsonl }

impl OutputFormat {
    pub fn from_config(s: &str) -> Option<Self> {
        match s {
            "text" => Some(OutputFormat::Text),
            "json" => Some(OutputFormat::Json),
            "jsonl" => Some(OutputFormat::Jsonl),
            _ => None,
        }
    }
}

/// Identifies one run in machine-readable output.
#[derive(Debug, Clone)]
pub struct RunInfo {
    pub run_id: String,
    pub target: String,
    pub started_at: String,
}

pub fn text_line(r: &FuzzResult) -> String {
    let status = r.status.map(|s| s.to_string()).unwrap_or_else(|| "---".into());
    let length = r.length.map(|l| l.to_string()).unwrap_or_else(|| "-".into());
    let mut line = format!("{:>4} {:>9} {:>6}ms  {}  [{}]", status, length, r.elapsed_ms, r.target_path, r.bucket());
    if let Some(e) = &r.error {
        line.push_str(&format!(" ({})", e));
    }
    line
}

pub fn result_json(run: &RunInfo, r: &FuzzResult) -> serde_json::Value {
    serde_json::json!({
        "run_id": run.run_id,
        "payload": r.payload,
        "path": r.target_path,
        "status": r.status,
        "length": r.length,
        "elapsed_ms": r.elapsed_ms,
        "bucket": r.bucket().as_str(),
        "malformed": r.malformed,
        "error": r.error,
    })
}

enum Sink {
    Lines(Box<dyn Write>),
    Csv(csv::Writer<File>),
}

/// Streams results as they arrive. `Json` buffers until `finish` so the output is one document.
pub struct ResultWriter {
    format: OutputFormat,
    run: RunInfo,
    sink: Sink,
    buffered: Vec<serde_json::Value>,
}

impl ResultWriter {
    pub fn new(format: OutputFormat, out: Option<&Path>, csv_out: bool, run: RunInfo) -> Result<Self> {
        let sink = match (out, csv_out) {
            (Some(path), true) => {
                let mut wtr = csv::Writer::from_writer(File::create(path)?);
                wtr.write_record(["run_id", "payload", "path", "status", "length", "elapsed_ms", "bucket", "malformed", "error"])?;
                Sink::Csv(wtr)
            }
            (None, true) => anyhow::bail!("--csv requires --out <file>"),
            (Some(path), false) => Sink::Lines(Box::new(BufWriter::new(File::create(path)?))),
            (None, false) => Sink::Lines(Box::new(std::io::stdout())),
        };
        Ok(ResultWriter { format, run, sink, buffered: Vec::new() })
    }

    pub fn write(&mut self, r: &FuzzResult) -> Result<()> {
        match &mut self.sink {
            Sink::Csv(wtr) => {
                wtr.write_record([
                    self.run.run_id.clone(),
                    r.payload.clone(),
                    r.target_path.clone(),
                    r.status.map(|v| v.to_string()).unwrap_or_default(),
                    r.length.map(|v| v.to_string()).unwrap_or_default(),
                    r.elapsed_ms.to_string(),
                    r.bucket().to_string(),
                    r.malformed.to_string(),
                    r.error.clone().unwrap_or_default(),
                ])?;
                wtr.flush()?;
            }
            Sink::Lines(w) => match self.format {
                OutputFormat::Text => {
                    writeln!(w, "{}", text_line(r))?;
                    w.flush()?;
                }
                OutputFormat::Jsonl => {
                    writeln!(w, "{}", serde_json::to_string(&result_json(&self.run, r))?)?;
                    w.flush()?;
                }
                OutputFormat::Json => self.buffered.push(result_json(&self.run, r)),
            },
        }
        Ok(())
    }

    pub fn finish(mut self, outcome: RunOutcome, total: usize) -> Result<()> {
        if let (Sink::Lines(w), OutputFormat::Json) = (&mut self.sink, self.format) {
            let obj = serde_json::json!({
                "run_id": self.run.run_id,
                "target": self.run.target,
                "started_at": self.run.started_at,
                "ended_at": now_rfc3339(),
                "outcome": match outcome { RunOutcome::Completed => "completed", RunOutcome::Cancelled => "cancelled" },
                "attempted": self.buffered.len(),
                "wordlist": total,
                "results": self.buffered,
            });
            writeln!(w, "{}", serde_json::to_string(&obj)?)?;
            w.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(status: Option<u16>, length: Option<usize>) -> FuzzResult {
        FuzzResult {
            payload: "admin".into(),
            target_path: "/api/admin".into(),
            status,
            length,
            elapsed_ms: 12,
            malformed: false,
            error: if status.is_none() { Some("no response".into()) } else { None },
        }
    }

    fn run() -> RunInfo {
        RunInfo { run_id: "r1".into(), target: "http://h/api".into(), started_at: now_rfc3339() }
    }

    #[test]
    fn text_line_marks_missing_response() {
        assert_eq!(text_line(&result(Some(200), Some(42))), " 200        42     12ms  /api/admin  [success]");
        assert_eq!(text_line(&result(None, None)), " ---         -     12ms  /api/admin  [neutral] (no response)");
    }

    #[test]
    fn json_record_fields() {
        let v = result_json(&run(), &result(Some(404), Some(9)));
        assert_eq!(v["status"], 404);
        assert_eq!(v["bucket"], "not-found");
        assert_eq!(v["run_id"], "r1");
        assert!(v["error"].is_null());
    }

    #[test]
    fn csv_written_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut w = ResultWriter::new(OutputFormat::Text, Some(&path), true, run()).unwrap();
        w.write(&result(Some(403), Some(0))).unwrap();
        w.write(&result(None, None)).unwrap();
        w.finish(RunOutcome::Completed, 2).unwrap();
        let s = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = s.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("run_id,payload,path,status"));
        assert_eq!(lines[1], "r1,admin,/api/admin,403,0,12,redirect/auth,false,");
        assert_eq!(lines[2], "r1,admin,/api/admin,,,12,neutral,false,no response");
    }

    #[test]
    fn json_document_written_on_finish() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let mut w = ResultWriter::new(OutputFormat::Json, Some(&path), false, run()).unwrap();
        w.write(&result(Some(200), Some(1))).unwrap();
        w.finish(RunOutcome::Cancelled, 8).unwrap();
        let v: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(v["outcome"], "cancelled");
        assert_eq!(v["attempted"], 1);
        assert_eq!(v["wordlist"], 8);
        assert_eq!(v["results"][0]["path"], "/api/admin");
    }

    #[test]
    fn csv_needs_out_path() {
        assert!(ResultWriter::new(OutputFormat::Text, None, true, run()).is_err());
    }
}
