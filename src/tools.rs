//! External tools called by the cleaning stages and the checks that decide
//! whether a stage can run on this system.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::process::{Command, Stdio};

use crate::error::CleanseqError;

/// Enum representing the external programs the pipelines delegate to.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tool {
    Fastp,
    Kraken2,
    Bowtie2,
    Fastqc,
    Multiqc,
    Parallel,
}

/// Argument that makes every tool print its version and exit successfully.
pub const VERSION_ARG: &str = "--version";

impl Tool {
    pub const ALL: [Tool; 6] = [
        Tool::Fastp,
        Tool::Kraken2,
        Tool::Bowtie2,
        Tool::Fastqc,
        Tool::Multiqc,
        Tool::Parallel,
    ];

    pub fn install_hint(&self) -> &str {
        match self {
            Tool::Fastp => "conda install -c bioconda fastp",
            Tool::Kraken2 => "conda install -c bioconda kraken2",
            Tool::Bowtie2 => "conda install -c bioconda bowtie2",
            Tool::Fastqc => "conda install -c bioconda fastqc",
            Tool::Multiqc => "pip install multiqc",
            Tool::Parallel => "conda install -c conda-forge parallel",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tool::Fastp => write!(f, "fastp"),
            Tool::Kraken2 => write!(f, "kraken2"),
            Tool::Bowtie2 => write!(f, "bowtie2"),
            Tool::Fastqc => write!(f, "fastqc"),
            Tool::Multiqc => write!(f, "multiqc"),
            Tool::Parallel => write!(f, "parallel"),
        }
    }
}

/// Executable names or paths for each tool, read from the `[tools]` table of the
/// configuration file. Unset entries fall back to the tool name on `PATH`.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ToolPaths {
    pub fastp: Option<String>,
    pub kraken2: Option<String>,
    pub bowtie2: Option<String>,
    pub fastqc: Option<String>,
    pub multiqc: Option<String>,
    pub parallel: Option<String>,
}

impl ToolPaths {
    /// Returns the program to spawn for `tool`.
    pub fn executable(&self, tool: Tool) -> String {
        let configured = match tool {
            Tool::Fastp => &self.fastp,
            Tool::Kraken2 => &self.kraken2,
            Tool::Bowtie2 => &self.bowtie2,
            Tool::Fastqc => &self.fastqc,
            Tool::Multiqc => &self.multiqc,
            Tool::Parallel => &self.parallel,
        };
        configured.clone().unwrap_or_else(|| tool.to_string())
    }
    /// Sets the program for `tool`.
    pub fn with(mut self, tool: Tool, executable: impl Into<String>) -> Self {
        let executable = Some(executable.into());
        match tool {
            Tool::Fastp => self.fastp = executable,
            Tool::Kraken2 => self.kraken2 = executable,
            Tool::Bowtie2 => self.bowtie2 = executable,
            Tool::Fastqc => self.fastqc = executable,
            Tool::Multiqc => self.multiqc = executable,
            Tool::Parallel => self.parallel = executable,
        }
        self
    }
    /// Checks that the tool can be executed by running its version command.
    ///
    /// # Errors
    ///
    /// * `CleanseqError::MissingTool` if the program cannot be spawned or exits unsuccessfully.
    pub fn check_dependency(&self, tool: Tool) -> Result<(), CleanseqError> {
        let program = self.executable(tool);
        let status = Command::new(&program)
            .arg(VERSION_ARG)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => {
                log::debug!("Version check `{} {}` exited with {}", program, VERSION_ARG, status);
                Err(CleanseqError::MissingTool(tool))
            }
            Err(err) => {
                log::debug!("Version check `{} {}` failed: {}", program, VERSION_ARG, err);
                Err(CleanseqError::MissingTool(tool))
            }
        }
    }
    pub fn is_available(&self, tool: Tool) -> bool {
        self.check_dependency(tool).is_ok()
    }
}

/// Logs availability for every external tool.
pub fn report_tools(paths: &ToolPaths) -> usize {
    let mut missing = 0;
    for tool in Tool::ALL {
        if paths.is_available(tool) {
            log::info!("{:<10} available ({})", tool.to_string(), paths.executable(tool));
        } else {
            missing += 1;
            log::warn!("{:<10} missing - install with: {}", tool.to_string(), tool.install_hint());
        }
    }
    missing
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn executable_defaults_to_tool_name() {
        let paths = ToolPaths::default();
        assert_eq!(paths.executable(Tool::Bowtie2), "bowtie2");
        assert_eq!(paths.executable(Tool::Parallel), "parallel");
    }

    #[test]
    fn executable_override_is_used() {
        let paths = ToolPaths::default().with(Tool::Fastp, "/opt/fastp/bin/fastp");
        assert_eq!(paths.executable(Tool::Fastp), "/opt/fastp/bin/fastp");
        assert_eq!(paths.executable(Tool::Kraken2), "kraken2");
    }

    #[test]
    fn missing_program_is_missing_tool() {
        let paths = ToolPaths::default().with(Tool::Fastp, "cleanseq-test-no-such-fastp");
        match paths.check_dependency(Tool::Fastp) {
            Err(CleanseqError::MissingTool(Tool::Fastp)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn exit_status_of_version_command_decides_availability() {
        assert!(ToolPaths::default().with(Tool::Fastp, "true").is_available(Tool::Fastp));
        assert!(!ToolPaths::default().with(Tool::Fastp, "false").is_available(Tool::Fastp));
    }

    #[test]
    fn missing_tool_message_carries_install_hint() {
        let msg = CleanseqError::MissingTool(Tool::Kraken2).to_string();
        assert!(msg.contains("kraken2"));
        assert!(msg.contains("conda install -c bioconda kraken2"));
    }
}
