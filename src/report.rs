use std::io::Write;
use std::path::{Path, PathBuf};
use chrono::{SecondsFormat, Local};
use clap::crate_version;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::CleanseqError;
use crate::runner::{execute, path_str, ToolInvocation};
use crate::stage::StageRun;
use crate::tools::{Tool, ToolPaths};
use crate::utils::count_reads;

/// Log file capturing the aggregation tool's output inside the module directory.
pub const AGGREGATION_LOG: &str = "multiqc.log";

/// Runs multiqc once over a module directory after its stage has finished.
pub struct ReportAggregator {
    tools: ToolPaths,
}

impl ReportAggregator {
    pub fn new(tools: ToolPaths) -> Self {
        Self { tools }
    }
    pub fn invocation(&self, module_dir: &Path) -> Result<ToolInvocation, CleanseqError> {
        let dir = path_str(module_dir)?;
        Ok(ToolInvocation::new(self.tools.executable(Tool::Multiqc))
            .args([dir.as_str(), "-o", dir.as_str(), "-f"])
            .reads([module_dir.to_path_buf()])
            .stderr_to(module_dir.join(AGGREGATION_LOG)))
    }
    /// Aggregates the reports in `module_dir`. Absence of the tool and failures
    /// are logged, the returned flag tells whether a report was produced.
    pub fn aggregate(&self, module_dir: &Path) -> bool {
        if let Err(err) = self.tools.check_dependency(Tool::Multiqc) {
            log::warn!("Skipping report aggregation: {}", err);
            return false;
        }
        let result = self.invocation(module_dir).and_then(|invocation| execute(&invocation));
        match result {
            Ok(()) => {
                log::info!("Aggregated reports in {}", module_dir.display());
                true
            }
            Err(err) => {
                log::warn!("Report aggregation failed: {}", err);
                false
            }
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ReadFile {
    pub path: PathBuf,
    /// Number of reads, absent if the file is missing or unreadable.
    pub reads: Option<u64>,
}

impl ReadFile {
    pub fn count(path: &Path) -> Self {
        let reads = if path.exists() {
            match count_reads(path) {
                Ok(reads) => Some(reads),
                Err(err) => {
                    log::warn!("Failed to count reads in {}: {}", path.display(), err);
                    None
                }
            }
        } else {
            None
        };
        Self { path: path.to_path_buf(), reads }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SampleSummary {
    pub id: String,
    pub layout: String,
    pub input: Vec<ReadFile>,
    pub output: Vec<ReadFile>,
}

/// Summary of one stage run, written with `--json`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StageSummary {
    pub version: String,
    pub date: String,
    pub command: String,
    pub stage: String,
    pub host: Option<String>,
    pub project: PathBuf,
    pub module: PathBuf,
    pub executions: usize,
    pub failed: usize,
    pub aggregated: bool,
    pub samples: Vec<SampleSummary>,
}

impl StageSummary {
    pub fn create(run: &StageRun, command: &str) -> Self {
        let samples = run
            .samples
            .par_iter()
            .map(|result| SampleSummary {
                id: result.sample.id.clone(),
                layout: result.sample.layout().to_string(),
                input: result.sample.files.iter().map(|path| ReadFile::count(path)).collect(),
                output: result.outputs.iter().map(|path| ReadFile::count(path)).collect(),
            })
            .collect();

        Self {
            version: crate_version!().to_string(),
            date: Local::now().to_rfc3339_opts(SecondsFormat::Millis, false),
            command: command.to_string(),
            stage: run.descriptor.label.to_string(),
            host: run.host.map(|host| host.to_string()),
            project: run.project.clone(),
            module: run.module_dir.clone(),
            executions: run.record.entries.len(),
            failed: run.record.failed(),
            aggregated: run.aggregated,
            samples,
        }
    }
    pub fn to_json(&self, output: &Path) -> Result<(), CleanseqError> {
        let mut file = std::fs::File::create(output)?;
        let json_string = serde_json::to_string_pretty(self)?;
        file.write_all(json_string.as_bytes())?;
        Ok(())
    }
}
