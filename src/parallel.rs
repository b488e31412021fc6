//! Fan-out of a stage over many samples through GNU parallel.
//!
//! The orchestrator does no scheduling itself: it builds one templated
//! `parallel` command per sample layout that re-invokes this executable for
//! every sample, and reports the utility's exit status.

use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::error::CleanseqError;
use crate::runner::ToolInvocation;
use crate::samples::SampleGroup;
use crate::tools::{Tool, ToolPaths};

/// Re-invocation of this executable for each sample.
#[derive(Debug, Clone)]
pub struct ParallelFanout {
    pub jobs: usize,
    pub executable: PathBuf,
    pub module: String,
    /// Arguments placed after the module name, before the read file placeholders
    pub module_args: Vec<String>,
    pub tools: ToolPaths,
}

impl ParallelFanout {
    /// Fan-out for the running executable.
    pub fn current(jobs: usize, module: impl Into<String>, module_args: Vec<String>, tools: ToolPaths) -> Result<Self, CleanseqError> {
        let executable = std::env::current_exe()
            .map_err(|err| CleanseqError::ExecutableNotFound(err.to_string()))?;
        Ok(Self { jobs, executable, module: module.into(), module_args, tools })
    }
    /// Jobs run quoted (`--quote`), so arguments reach the executable unchanged
    /// and are never interpreted by a shell.
    fn base(&self) -> Result<ToolInvocation, CleanseqError> {
        Ok(ToolInvocation::new(self.tools.executable(Tool::Parallel))
            .args(["--jobs".to_string(), self.jobs.to_string(), "--link".to_string(), "--quote".to_string()])
            .path_arg(&self.executable)?
            .arg(self.module.as_str())
            .args(self.module_args.iter().cloned()))
    }
    /// One command for all paired samples and one for all single-end samples,
    /// omitting a layout without samples.
    pub fn invocations(&self, samples: &[SampleGroup]) -> Result<Vec<ToolInvocation>, CleanseqError> {
        let (paired, single): (Vec<&SampleGroup>, Vec<&SampleGroup>) = samples.iter().partition(|sample| sample.is_paired());
        let mut invocations = Vec::new();

        if !paired.is_empty() {
            let mut invocation = self.base()?.args(["--forward", "{1}", "--reverse", "{2}", ":::"]);
            for sample in &paired {
                invocation = invocation.path_arg(&sample.files[0])?;
            }
            invocation = invocation.arg(":::");
            for sample in &paired {
                invocation = invocation.path_arg(&sample.files[1])?;
            }
            let files = paired.iter().flat_map(|sample| sample.files.clone());
            invocations.push(invocation.reads(files));
        }

        if !single.is_empty() {
            let mut invocation = self.base()?.args(["--single", "{1}", ":::"]);
            for sample in &single {
                invocation = invocation.path_arg(sample.first())?;
            }
            let files = single.iter().flat_map(|sample| sample.files.clone());
            invocations.push(invocation.reads(files));
        }

        Ok(invocations)
    }
    /// Runs the fan-out commands in turn with the terminal attached and
    /// returns whether all of them succeeded.
    ///
    /// # Errors
    ///
    /// * `CleanseqError::MissingTool` if GNU parallel is not available.
    pub fn run(&self, samples: &[SampleGroup]) -> Result<bool, CleanseqError> {
        self.tools.check_dependency(Tool::Parallel)?;

        let mut success = true;
        for invocation in self.invocations(samples)? {
            let command_line = invocation.command_line();
            log::info!("Dispatching: {}", command_line);

            let status = Command::new(&invocation.program)
                .args(&invocation.args)
                .stdin(Stdio::null())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit())
                .status()
                .map_err(|err| CleanseqError::CommandExecutionFailed(command_line.clone(), err.to_string()))?;

            if status.success() {
                log::info!("Fan-out over {} read files completed", invocation.inputs.len());
            } else {
                // parallel exits with the number of failed jobs
                log::error!("{}", CleanseqError::CommandFailed(command_line, status.code().unwrap_or(-1)));
                success = false;
            }
        }
        Ok(success)
    }
}
