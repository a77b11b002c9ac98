//! Rendering of probe outcomes: console blocks, per-device YAML files, JSON lines, CSV summary.

use anyhow::{Context, Result};
use clap::ValueEnum;
use healthfetch_core::{FetchSession, ProbeOutcome, Target};
use serde_json::Value;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default, ValueEnum)]
pub enum OutputMode {
    /// Status line plus the YAML payload on stdout
    #[default]
    Console,
    /// Status line on stdout, payload saved to response_<address>.yaml
    Files,
    /// One JSON object per device on stdout
    Jsonl,
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_else(|_| String::new())
}

/// Deterministic per-device file name; `:` in IPv6 addresses becomes `_`.
pub fn response_file_name(target: &Target) -> String {
    format!("response_{}.yaml", target.as_str().replace(':', "_"))
}

pub fn render_yaml(payload: &Value) -> Result<String> {
    Ok(serde_yaml::to_string(payload)?)
}

pub fn status_line(outcome: &ProbeOutcome) -> String {
    match outcome {
        ProbeOutcome::Success { address, generation, .. } => {
            format!("Success: {} on port {} ({})", address, generation.endpoint().port, generation)
        }
        ProbeOutcome::Timeout { address, generation } => {
            format!("Timeout: {} on port {} ({})", address, generation.endpoint().port, generation)
        }
        ProbeOutcome::Error { address, generation: Some(g), cause } => {
            format!("Error: {} on port {} ({}): {}", address, g.endpoint().port, g, cause)
        }
        ProbeOutcome::Error { address, generation: None, cause } => format!("Error: {}: {}", address, cause),
    }
}

pub fn outcome_json(outcome: &ProbeOutcome, finished_at: &str) -> Value {
    let err = outcome.error();
    serde_json::json!({
        "address": outcome.address().as_str(),
        "status": outcome.status(),
        "generation": outcome.generation().map(|g| g.as_str()),
        "port": outcome.port(),
        "error_kind": err.as_ref().map(|e| e.kind()),
        "error": err.as_ref().map(|e| e.to_string()),
        "payload": outcome.payload(),
        "finished_at": finished_at,
    })
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Tally {
    pub success: usize,
    pub timeout: usize,
    pub error: usize,
    pub report_errors: usize,
}

impl Tally {
    pub fn record(&mut self, outcome: &ProbeOutcome) {
        match outcome {
            ProbeOutcome::Success { .. } => self.success += 1,
            ProbeOutcome::Timeout { .. } => self.timeout += 1,
            ProbeOutcome::Error { .. } => self.error += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.success + self.timeout + self.error
    }

    pub fn all_ok(&self) -> bool {
        self.timeout == 0 && self.error == 0 && self.report_errors == 0
    }
}

pub struct ReportSink<W: Write> {
    mode: OutputMode,
    out_dir: PathBuf,
    out: W,
}

impl<W: Write> ReportSink<W> {
    pub fn new(mode: OutputMode, out_dir: PathBuf, out: W) -> Result<Self> {
        if mode == OutputMode::Files {
            fs::create_dir_all(&out_dir).with_context(|| format!("creating {}", out_dir.display()))?;
        }
        Ok(ReportSink { mode, out_dir, out })
    }

    pub fn announce(&mut self, session: &FetchSession) -> Result<()> {
        if self.mode == OutputMode::Jsonl {
            return Ok(());
        }
        writeln!(
            self.out,
            "Fetching data for {} device(s) (timeout {} s, concurrency {})",
            session.targets().len(),
            session.timeout().as_secs_f64(),
            session.concurrency()
        )?;
        Ok(())
    }

    pub fn emit(&mut self, outcome: &ProbeOutcome) -> Result<()> {
        match self.mode {
            OutputMode::Console => {
                writeln!(self.out, "{}", status_line(outcome))?;
                if let Some(payload) = outcome.payload() {
                    writeln!(self.out, "{}", render_yaml(payload)?.trim_end())?;
                    writeln!(self.out)?;
                }
            }
            OutputMode::Files => {
                if let Some(payload) = outcome.payload() {
                    let path = self.out_dir.join(response_file_name(outcome.address()));
                    if !path.exists() {
                        writeln!(self.out, "New device detected: {}", outcome.address())?;
                    }
                    write_yaml(&path, payload)?;
                    writeln!(self.out, "{} -> {}", status_line(outcome), path.display())?;
                } else {
                    writeln!(self.out, "{}", status_line(outcome))?;
                }
            }
            OutputMode::Jsonl => {
                writeln!(self.out, "{}", serde_json::to_string(&outcome_json(outcome, &now_rfc3339()))?)?;
            }
        }
        self.out.flush()?;
        Ok(())
    }

    pub fn finish(&mut self, tally: &Tally, duration_ms: u128) -> Result<()> {
        if self.mode != OutputMode::Jsonl {
            writeln!(
                self.out,
                "Done: {} device(s), {} succeeded, {} timed out, {} failed ({} ms)",
                tally.total(),
                tally.success,
                tally.timeout,
                tally.error,
                duration_ms
            )?;
        }
        self.out.flush()?;
        Ok(())
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

fn write_yaml(path: &Path, payload: &Value) -> Result<()> {
    let text = render_yaml(payload)?;
    fs::write(path, text).with_context(|| format!("writing {}", path.display()))
}

/// CSV summary with one row per device.
pub struct SummaryCsv {
    wtr: csv::Writer<File>,
}

impl SummaryCsv {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        let mut wtr = csv::Writer::from_writer(file);
        wtr.write_record(["address", "status", "generation", "port", "detail", "finished_at"])?;
        Ok(SummaryCsv { wtr })
    }

    pub fn record(&mut self, outcome: &ProbeOutcome) -> Result<()> {
        let detail = outcome.error().map(|e| e.to_string()).unwrap_or_default();
        self.wtr.write_record([
            outcome.address().to_string(),
            outcome.status().to_string(),
            outcome.generation().map(|g| g.as_str().to_string()).unwrap_or_default(),
            outcome.port().map(|p| p.to_string()).unwrap_or_default(),
            detail,
            now_rfc3339(),
        ])?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        self.wtr.flush()?;
        Ok(())
    }
}
