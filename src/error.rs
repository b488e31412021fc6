use std::path::PathBuf;

use thiserror::Error;

use crate::tools::Tool;

#[derive(Error, Debug)]
pub enum CleanseqError {

    #[error("No usable input was given, provide `--forward` and `--reverse`, `--single` or `--input-dir`.")]
    MissingInput,

    #[error("Input read file was not found: {0}")]
    MissingInputReadFile(PathBuf),

    #[error("Input directory was not found: {0}")]
    MissingInputDirectory(PathBuf),

    #[error("No FASTQ files were found in input directory: {0}")]
    EmptyInputDirectory(PathBuf),

    #[error("Tool `{}` cannot be executed - is it installed? Try: {}", .0, .0.install_hint())]
    MissingTool(Tool),

    #[error("Custom host requires both `--db-path-kraken2` and `--db-path-bowtie2` (missing: {0})")]
    MissingDatabasePath(String),

    #[error("Host organism `{0}` is not supported, choose one of: {1}")]
    UnsupportedHost(String, String),

    #[error("Configuration key `{0}` is missing from the `[databases]` table of {1}")]
    MissingConfigKey(String, PathBuf),

    #[error("Configuration file was not found: {0}")]
    MissingConfigFile(PathBuf),

    #[error("Contaminant removal for `{0}` requires the `--host` organism to be set")]
    MissingHostOrganism(String),

    #[error("Module `{0}` requires the contaminant `--subtype` to be set")]
    MissingSubtype(String),

    #[error("Failed to execute command '{0}': {1}")]
    CommandExecutionFailed(String, String),

    #[error("Command '{0}' exited with status code: {1}")]
    CommandFailed(String, i32),

    #[error("Command '{0}' exited with status code {1}: {2}")]
    CommandFailedWithOutput(String, i32, String),

    #[error("Failed to locate the running executable: {0}")]
    ExecutableNotFound(String),

    #[error("Project directory already exists: {0}")]
    ProjectExists(PathBuf),

    #[error("File name could not be obtained from path: {0}")]
    InvalidFileName(PathBuf),

    #[error("More than one sample would write the output file: {0}")]
    OutputCollision(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    GlobPattern(#[from] glob::PatternError),

    #[error(transparent)]
    Glob(#[from] glob::GlobError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Needletail(#[from] needletail::errors::ParseError),
}
