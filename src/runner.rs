//! Sequential execution of tool invocations with an append-only execution log
//! and removal of intermediate files once a batch has finished.

use chrono::{Local, SecondsFormat};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::CleanseqError;

/// File name of the execution log inside each module directory.
pub const EXECUTION_LOG: &str = "execution.log";

/// Suffixes that survive cleanup in every module directory.
pub const PROTECTED_SUFFIXES: [&str; 5] = [".log", ".html", ".json", ".zip", "_report.txt"];

/// Number of trailing stderr lines kept for a failed invocation.
const STDERR_TAIL: usize = 5;

/// One external command as a program and argument vector, with the files it
/// reads and writes and optional files capturing its output streams.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub inputs: Vec<PathBuf>,
    pub outputs: Vec<PathBuf>,
    pub stdout: Option<PathBuf>,
    pub stderr: Option<PathBuf>,
}

impl ToolInvocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            stdout: None,
            stderr: None,
        }
    }
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
    pub fn path_arg(self, path: &Path) -> Result<Self, CleanseqError> {
        Ok(self.arg(path_str(path)?))
    }
    /// Declares files read by the invocation, passed on the command line separately.
    pub fn reads<I: IntoIterator<Item = PathBuf>>(mut self, paths: I) -> Self {
        self.inputs.extend(paths);
        self
    }
    /// Declares files written by the invocation, passed on the command line separately.
    pub fn writes<I: IntoIterator<Item = PathBuf>>(mut self, paths: I) -> Self {
        self.outputs.extend(paths);
        self
    }
    pub fn stdout_to(mut self, path: PathBuf) -> Self {
        self.stdout = Some(path);
        self
    }
    pub fn stderr_to(mut self, path: PathBuf) -> Self {
        self.stderr = Some(path);
        self
    }
    /// Human readable command line, arguments with whitespace are quoted.
    pub fn command_line(&self) -> String {
        let mut line = std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|token| {
                if token.is_empty() || token.contains(char::is_whitespace) {
                    format!("'{}'", token)
                } else {
                    token.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(" ");
        if let Some(path) = &self.stdout {
            line.push_str(&format!(" > {}", path.display()));
        }
        if let Some(path) = &self.stderr {
            line.push_str(&format!(" 2> {}", path.display()));
        }
        line
    }
}

/// Converts a path into a command-line token.
pub fn path_str(path: &Path) -> Result<String, CleanseqError> {
    path.to_str()
        .map(str::to_string)
        .ok_or_else(|| CleanseqError::InvalidFileName(path.to_path_buf()))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionEntry {
    pub command: String,
    pub success: bool,
    pub detail: Option<String>,
}

/// Results of every invocation of a run, mirrored line by line into the log file.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionRecord {
    pub log: PathBuf,
    pub entries: Vec<ExecutionEntry>,
}

impl ExecutionRecord {
    pub fn new(log: PathBuf) -> Self {
        Self { log, entries: Vec::new() }
    }
    /// Appends the entry to the log file before adding it to the record.
    pub fn append(&mut self, entry: ExecutionEntry) -> Result<(), CleanseqError> {
        let mut file = OpenOptions::new().append(true).create(true).open(&self.log)?;
        let timestamp = Local::now().to_rfc3339_opts(SecondsFormat::Secs, false);
        match &entry.detail {
            Some(detail) => writeln!(
                file, "{}\t{}\t{}\t{}",
                timestamp, status_label(entry.success), entry.command, detail.replace('\n', " | ")
            )?,
            None => writeln!(file, "{}\t{}\t{}", timestamp, status_label(entry.success), entry.command)?,
        }
        file.flush()?;
        self.entries.push(entry);
        Ok(())
    }
    pub fn succeeded(&self) -> usize {
        self.entries.iter().filter(|entry| entry.success).count()
    }
    pub fn failed(&self) -> usize {
        self.entries.iter().filter(|entry| !entry.success).count()
    }
}

fn status_label(success: bool) -> &'static str {
    if success { "OK" } else { "FAILED" }
}

/// Which files of a module directory survive after a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetentionPolicy {
    pub save_intermediates: bool,
    pub protected_suffixes: Vec<String>,
}

impl RetentionPolicy {
    /// Protects the final outputs named with `tag` plus logs and reports.
    pub fn for_tag(tag: &str, save_intermediates: bool) -> Self {
        let mut protected_suffixes = vec![
            format!("_{tag}_1.fastq"),
            format!("_{tag}_2.fastq"),
            format!("_{tag}.fastq"),
        ];
        protected_suffixes.extend(PROTECTED_SUFFIXES.iter().map(|suffix| suffix.to_string()));
        Self { save_intermediates, protected_suffixes }
    }
    pub fn is_protected(&self, file_name: &str) -> bool {
        self.protected_suffixes.iter().any(|suffix| file_name.ends_with(suffix.as_str()))
    }
}

/// Runs invocations in submission order for one module directory.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    module_dir: PathBuf,
}

impl CommandRunner {
    pub fn new(module_dir: impl Into<PathBuf>) -> Self {
        Self { module_dir: module_dir.into() }
    }
    pub fn log_path(&self) -> PathBuf {
        self.module_dir.join(EXECUTION_LOG)
    }
    /// Executes every invocation in order, continuing past failures, then
    /// prunes unprotected files once unless intermediates are retained.
    ///
    /// Only logging or pruning errors are returned, failed invocations are
    /// recorded in the `ExecutionRecord`.
    pub fn run(&self, invocations: Vec<ToolInvocation>, policy: &RetentionPolicy) -> Result<ExecutionRecord, CleanseqError> {
        let mut record = ExecutionRecord::new(self.log_path());

        let total = invocations.len();
        for (i, invocation) in invocations.into_iter().enumerate() {
            let command = invocation.command_line();
            log::info!("Running {} ({}/{})", invocation.program, i + 1, total);
            log::debug!("Running command: {}", command);

            let entry = match execute(&invocation) {
                Ok(()) => ExecutionEntry { command, success: true, detail: None },
                Err(err) => {
                    log::error!("{}", err);
                    ExecutionEntry { command, success: false, detail: Some(err.to_string()) }
                }
            };
            record.append(entry)?;
        }

        if !policy.save_intermediates {
            let removed = prune(&self.module_dir, policy)?;
            if !removed.is_empty() {
                log::info!("Removed {} intermediate files from {}", removed.len(), self.module_dir.display());
            }
        }

        Ok(record)
    }
}

/// Spawns the invocation directly, without a shell, and waits for it.
pub fn execute(invocation: &ToolInvocation) -> Result<(), CleanseqError> {
    let command_line = invocation.command_line();
    let exec_err = |err: std::io::Error| CleanseqError::CommandExecutionFailed(command_line.clone(), err.to_string());

    let mut command = Command::new(&invocation.program);
    command.args(&invocation.args).stdin(Stdio::null());

    match &invocation.stdout {
        Some(path) => command.stdout(Stdio::from(File::create(path).map_err(exec_err)?)),
        None => command.stdout(Stdio::null()),
    };
    match &invocation.stderr {
        Some(path) => command.stderr(Stdio::from(File::create(path).map_err(exec_err)?)),
        None => command.stderr(Stdio::piped()),
    };

    let output = command.output().map_err(exec_err)?;

    if !output.status.success() {
        let stderr = match &invocation.stderr {
            Some(path) => std::fs::read_to_string(path).unwrap_or_default(),
            None => String::from_utf8_lossy(&output.stderr).to_string(),
        };
        let tail = stderr.lines().rev().take(STDERR_TAIL).collect::<Vec<_>>().into_iter().rev().collect::<Vec<_>>().join("\n");
        let code = output.status.code().unwrap_or(-1);
        if tail.is_empty() {
            return Err(CleanseqError::CommandFailed(command_line, code));
        }
        return Err(CleanseqError::CommandFailedWithOutput(command_line, code, tail));
    }

    Ok(())
}

/// Deletes every regular file directly inside `dir` that the policy does not protect.
pub fn prune(dir: &Path, policy: &RetentionPolicy) -> Result<Vec<PathBuf>, CleanseqError> {
    let mut removed = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let protected = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| policy.is_protected(name))
            .unwrap_or(false);

        if !protected {
            log::debug!("Removing intermediate file: {}", path.display());
            std::fs::remove_file(&path)?;
            removed.push(path);
        }
    }
    removed.sort();
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn sh(script: &str) -> ToolInvocation {
        ToolInvocation::new("sh").arg("-c").arg(script)
    }

    fn names(dir: &Path) -> Vec<String> {
        let mut names = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect::<Vec<_>>();
        names.sort();
        names
    }

    #[test]
    fn command_line_quotes_whitespace() {
        let invocation = ToolInvocation::new("bowtie2")
            .args(["-x", "/refs/my index"])
            .stderr_to(PathBuf::from("s_report.txt"));
        assert_eq!(invocation.command_line(), "bowtie2 -x '/refs/my index' 2> s_report.txt");
    }

    #[test]
    fn failures_are_recorded_and_execution_continues() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.txt");
        let third = dir.path().join("third.txt");

        let invocations = vec![
            sh(&format!("echo 1 > {}", first.display())),
            sh("echo broken >&2; exit 3"),
            sh(&format!("echo 3 > {}", third.display())),
            ToolInvocation::new("cleanseq-test-no-such-program"),
        ];
        let runner = CommandRunner::new(dir.path());
        let record = runner.run(invocations, &RetentionPolicy::for_tag("filtered", true)).unwrap();

        assert_eq!(record.entries.len(), 4);
        assert_eq!(record.succeeded(), 2);
        assert_eq!(record.failed(), 2);
        assert!(!record.entries[1].success);
        assert!(record.entries[1].detail.as_deref().unwrap().contains("broken"));
        assert!(first.exists() && third.exists());

        let log = fs::read_to_string(runner.log_path()).unwrap();
        let lines = log.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("\tOK\t"));
        assert!(lines[1].contains("\tFAILED\t"));
        assert!(lines[2].contains("\tOK\t"));
        assert!(lines[3].contains("cleanseq-test-no-such-program"));
    }

    #[test]
    fn log_is_appended_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let runner = CommandRunner::new(dir.path());
        let policy = RetentionPolicy::for_tag("filtered", true);
        runner.run(vec![sh("true")], &policy).unwrap();
        runner.run(vec![sh("true"), sh("true")], &policy).unwrap();
        assert_eq!(fs::read_to_string(runner.log_path()).unwrap().lines().count(), 3);
    }

    #[test]
    fn output_streams_are_captured() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("s_stdout.txt");
        let err = dir.path().join("s_bowtie2_report.txt");
        let invocation = sh("echo reads; echo summary >&2").stdout_to(out.clone()).stderr_to(err.clone());
        execute(&invocation).unwrap();
        assert_eq!(fs::read_to_string(out).unwrap(), "reads\n");
        assert_eq!(fs::read_to_string(err).unwrap(), "summary\n");
    }

    #[test]
    fn pruning_keeps_only_protected_files() {
        let dir = tempfile::tempdir().unwrap();
        let script = [
            "touch s_filtered_1.fastq s_filtered_2.fastq t_filtered.fastq",
            "touch s_unclassified_1.fastq s.sam s.kraken2",
            "touch s_fastp.html s_fastp.json s_fastqc.zip s_human_kraken2_report.txt",
            "mkdir nested && touch nested/keep.sam",
        ].join(" && ");

        let runner = CommandRunner::new(dir.path());
        let invocation = ToolInvocation::new("sh").arg("-c").arg(format!("cd {} && {}", dir.path().display(), script));
        let record = runner.run(vec![invocation], &RetentionPolicy::for_tag("filtered", false)).unwrap();
        assert_eq!(record.failed(), 0);

        assert_eq!(names(dir.path()), vec![
            EXECUTION_LOG,
            "nested",
            "s_fastp.html",
            "s_fastp.json",
            "s_fastqc.zip",
            "s_filtered_1.fastq",
            "s_filtered_2.fastq",
            "s_human_kraken2_report.txt",
            "t_filtered.fastq",
        ]);
        assert!(dir.path().join("nested/keep.sam").exists());
    }

    #[test]
    fn retaining_keeps_everything() {
        let dir = tempfile::tempdir().unwrap();
        let runner = CommandRunner::new(dir.path());
        let invocation = sh(&format!("cd {} && touch a_filtered_1.fastq a.sam a_unclassified_1.fastq", dir.path().display()));
        runner.run(vec![invocation], &RetentionPolicy::for_tag("filtered", true)).unwrap();

        assert_eq!(names(dir.path()), vec![
            "a.sam",
            "a_filtered_1.fastq",
            "a_unclassified_1.fastq",
            EXECUTION_LOG,
        ]);
    }
}
