use std::fmt;
use std::path::PathBuf;
use clap::{crate_version, Args, Parser, Subcommand, ValueEnum};

use crate::prelude::*;
use crate::config::{DatabaseConfig, HostOrganism};
use crate::params::{Bowtie2Params, FastpParams, Kraken2Params};
use crate::parallel::ParallelFanout;
use crate::samples::{InputSelection, SampleGroup};
use crate::stage::{CustomReferences, StageJob, StageKind, StageParams, StageSettings};
use crate::utils::command_line;

#[derive(Debug, Parser)]
#[command(
    version=crate_version!(),
    about="Quality filtering and contaminant removal for sequencing reads",
    help_template="\
{before-help}{name} {version}
{author-with-newline}
{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
"
)]
#[command(styles=get_styles())]
#[command(arg_required_else_help(true))]
pub struct App {
    /// Output logs to file instead of terminal
    ///
    /// Specify a file path to store the output logs. If not provided,
    /// logs will be displayed in the terminal.
    #[arg(short, long, global = true)]
    pub log_file: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

/// Enumeration of available commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Quality filtering of reads with fastp, with fastqc reports before and after.
    Quality(QualityArgs),
    /// Removal of PhiX, human or host reads with kraken2 and bowtie2.
    Contaminants(ContaminantArgs),
    /// Run a stage for every sample of a directory with GNU parallel.
    Parallel(ParallelArgs),
    /// Check which external tools are available.
    Tools(ToolsArgs),
}

/// Read file selection shared by all stages.
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Forward read file of a paired-end sample (optional .gz)
    #[arg(short, long, requires = "reverse")]
    pub forward: Option<PathBuf>,
    /// Reverse read file of a paired-end sample (optional .gz)
    #[arg(short, long, requires = "forward")]
    pub reverse: Option<PathBuf>,
    /// Read file of a single-end sample (optional .gz)
    #[arg(short, long)]
    pub single: Option<PathBuf>,
    /// Directory of read files
    ///
    /// All FASTQ files (.fastq, .fq, optionally compressed) in the directory
    /// are processed. Mates are paired by the markers '_R1'/'_R2' or '_1'/'_2',
    /// files without a partner are processed as single-end. Takes precedence
    /// over explicit read files.
    #[arg(short, long)]
    pub input_dir: Option<PathBuf>,
}

impl InputArgs {
    pub fn selection(&self) -> InputSelection {
        InputSelection {
            forward: self.forward.clone(),
            reverse: self.reverse.clone(),
            single: self.single.clone(),
            input_dir: self.input_dir.clone(),
        }
    }
}

/// Output and execution settings shared by all stages.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Output directory
    ///
    /// A project directory named 'Project_<timestamp>_<pid>' is created in
    /// this directory, with one sub-directory per stage.
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,
    /// Keep intermediate files
    ///
    /// By default only the cleaned reads, logs and reports are kept in
    /// the stage directory after all tools have run.
    #[arg(long)]
    pub save_intermediates: bool,
    /// Number of threads passed to every tool, 0 leaves the tool default
    #[arg(short, long, default_value = "4")]
    pub threads: u32,
    /// Summary output file (.json)
    ///
    /// Path to a JSON file for storing summary information about the
    /// stage, including read counts of inputs and outputs.
    #[arg(short, long)]
    pub json: Option<PathBuf>,
    /// Configuration file (.toml)
    ///
    /// Reference databases in a '[databases]' table and optional tool
    /// executables in a '[tools]' table. Defaults to 'cleanseq.toml' next
    /// to the executable.
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl RunArgs {
    fn settings(&self, config: &DatabaseConfig) -> StageSettings {
        StageSettings {
            threads: self.threads,
            save_intermediates: self.save_intermediates,
            tools: config.tools.clone(),
        }
    }
    /// Arguments forwarding these settings to a re-invocation.
    fn forward_args(&self) -> Vec<String> {
        let mut args = vec![
            "--output".to_string(), self.output.display().to_string(),
            "--threads".to_string(), self.threads.to_string(),
        ];
        if self.save_intermediates {
            args.push("--save-intermediates".to_string());
        }
        if let Some(config) = &self.config {
            args.push("--config".to_string());
            args.push(config.display().to_string());
        }
        args
    }
}

#[derive(Args, Debug)]
pub struct QualityArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub run: RunArgs,
    #[command(flatten)]
    pub fastp: FastpParams,
}

impl QualityArgs {
    /// Validates the provided arguments and builds the quality stage.
    pub fn validate_and_build(self) -> Result<StageJob, CleanseqError> {
        let config = DatabaseConfig::locate(self.run.config.as_deref())?;
        let params = StageParams { fastp: self.fastp, ..Default::default() };

        let executor = StageExecutor::new(
            StageKind::Quality,
            params,
            self.run.settings(&config),
            &config,
            CustomReferences::default(),
        )?;

        Ok(StageJob {
            executor,
            inputs: self.input.selection(),
            output: self.run.output,
            json: self.run.json,
            command: command_line(),
        })
    }
}

/// Contaminant removed by the `contaminants` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Subtype {
    Phix,
    Human,
    Host,
}

impl fmt::Display for Subtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subtype::Phix => write!(f, "phix"),
            Subtype::Human => write!(f, "human"),
            Subtype::Host => write!(f, "host"),
        }
    }
}

#[derive(Args, Debug)]
pub struct ContaminantArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub run: RunArgs,
    /// Contaminant to remove
    #[arg(long, value_enum)]
    pub subtype: Subtype,
    /// Host organism for '--subtype host'
    ///
    /// One of: dog, cat, rat, mouse, cow, pig, horse, zebrafish, yeast or
    /// custom. Built-in organisms use the '{organism}_kraken2_db' and
    /// '{organism}_bowtie2_index' configuration keys, 'custom' requires
    /// '--db-path-kraken2' and '--db-path-bowtie2'.
    #[arg(long)]
    pub host: Option<String>,
    /// Kraken2 database of a custom host
    #[arg(long)]
    pub db_path_kraken2: Option<PathBuf>,
    /// Bowtie2 index prefix of a custom host
    #[arg(long)]
    pub db_path_bowtie2: Option<PathBuf>,
    #[command(flatten)]
    pub kraken2: Kraken2Params,
    #[command(flatten)]
    pub bowtie2: Bowtie2Params,
}

impl ContaminantArgs {
    /// Validates the provided arguments and builds the contaminant stage.
    ///
    /// Host and database errors are returned before anything is written.
    pub fn validate_and_build(self) -> Result<StageJob, CleanseqError> {
        let kind = stage_kind(self.subtype, self.host.as_deref())?;
        let config = DatabaseConfig::locate(self.run.config.as_deref())?;

        let params = StageParams {
            kraken2: self.kraken2,
            bowtie2: self.bowtie2,
            ..Default::default()
        };
        let custom = CustomReferences {
            kraken2_db: self.db_path_kraken2,
            bowtie2_index: self.db_path_bowtie2,
        };

        let executor = StageExecutor::new(kind, params, self.run.settings(&config), &config, custom)?;

        Ok(StageJob {
            executor,
            inputs: self.input.selection(),
            output: self.run.output,
            json: self.run.json,
            command: command_line(),
        })
    }
}

/// Stage selected by a subtype and an optional host organism name.
pub fn stage_kind(subtype: Subtype, host: Option<&str>) -> Result<StageKind, CleanseqError> {
    match (subtype, host) {
        (Subtype::Host, Some(name)) => Ok(StageKind::Host(name.parse::<HostOrganism>()?)),
        (Subtype::Host, None) => Err(CleanseqError::MissingHostOrganism(subtype.to_string())),
        (subtype, host) => {
            if let Some(host) = host {
                log::warn!("Host organism `{}` is ignored for subtype `{}`", host, subtype);
            }
            Ok(match subtype {
                Subtype::Phix => StageKind::Phix,
                _ => StageKind::Human,
            })
        }
    }
}

/// Stage command re-invoked by the fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Module {
    Quality,
    Contaminants,
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Module::Quality => write!(f, "quality"),
            Module::Contaminants => write!(f, "contaminants"),
        }
    }
}

#[derive(Args, Debug)]
pub struct ParallelArgs {
    /// Stage to run for every sample
    #[arg(value_enum)]
    pub module: Module,
    /// Number of samples processed at the same time
    #[arg(long, default_value = "4")]
    pub jobs: usize,
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub run: RunArgs,
    /// Contaminant to remove, required by the 'contaminants' module
    #[arg(long, value_enum)]
    pub subtype: Option<Subtype>,
    /// Host organism for '--subtype host'
    #[arg(long)]
    pub host: Option<String>,
    /// Kraken2 database of a custom host
    #[arg(long)]
    pub db_path_kraken2: Option<PathBuf>,
    /// Bowtie2 index prefix of a custom host
    #[arg(long)]
    pub db_path_bowtie2: Option<PathBuf>,
    /// Additional arguments for the stage command
    ///
    /// Passed unchanged to every invocation, for example:
    /// 'cleanseq parallel quality -i reads/ -- --length-required 50'
    #[arg(last = true, allow_hyphen_values = true)]
    pub extra: Vec<String>,
}

impl ParallelArgs {
    /// Validates the provided arguments, discovers the samples and builds the fan-out.
    ///
    /// Host and database errors are returned before any sample is dispatched.
    pub fn validate_and_build(self) -> Result<(ParallelFanout, Vec<SampleGroup>), CleanseqError> {
        let config = DatabaseConfig::locate(self.run.config.as_deref())?;

        let mut module_args = Vec::new();
        if self.module == Module::Contaminants {
            let subtype = self.subtype.ok_or_else(|| CleanseqError::MissingSubtype(self.module.to_string()))?;
            let custom = CustomReferences {
                kraken2_db: self.db_path_kraken2.clone(),
                bowtie2_index: self.db_path_bowtie2.clone(),
            };
            stage_kind(subtype, self.host.as_deref())?.references(&config, custom)?;

            module_args.push("--subtype".to_string());
            module_args.push(subtype.to_string());
            if let (Subtype::Host, Some(host)) = (subtype, &self.host) {
                module_args.push("--host".to_string());
                module_args.push(host.clone());
            }
            for (flag, path) in [("--db-path-kraken2", &self.db_path_kraken2), ("--db-path-bowtie2", &self.db_path_bowtie2)] {
                if let Some(path) = path {
                    module_args.push(flag.to_string());
                    module_args.push(path.display().to_string());
                }
            }
        }
        module_args.extend(self.run.forward_args());
        module_args.extend(self.extra);

        let samples = self.input.selection().resolve()?;
        let fanout = ParallelFanout::current(self.jobs, self.module.to_string(), module_args, config.tools)?;

        Ok((fanout, samples))
    }
}

#[derive(Args, Debug)]
pub struct ToolsArgs {
    /// Configuration file (.toml) with tool executables in a '[tools]' table
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl ToolsArgs {
    pub fn validate_and_build(self) -> Result<ToolPaths, CleanseqError> {
        Ok(DatabaseConfig::locate(self.config.as_deref())?.tools)
    }
}

pub fn get_styles() -> clap::builder::Styles {
    clap::builder::Styles::styled()
        .usage(
            anstyle::Style::new()
                .bold()
                .underline()
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
        )
        .header(
            anstyle::Style::new()
                .bold()
                .underline()
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
        )
        .literal(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
        )
}
