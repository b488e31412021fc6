//! Stage execution: one parameterised executor that builds the tool chain of a
//! stage for every sample, runs it in the stage's module directory and
//! aggregates the reports.

use niffler::compression::Format;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::{DatabaseConfig, HostOrganism, References};
use crate::error::CleanseqError;
use crate::naming::OutputNamer;
use crate::params::{assemble, Bowtie2Params, FastpParams, Kraken2Params};
use crate::project::Project;
use crate::report::{ReportAggregator, StageSummary};
use crate::runner::{path_str, CommandRunner, ExecutionRecord, RetentionPolicy, ToolInvocation};
use crate::samples::{InputSelection, SampleGroup};
use crate::tools::{Tool, ToolPaths};
use crate::utils::CompressionExt;

/// External tools run by a stage, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ToolChain {
    /// fastp, with fastqc before and after
    Trim,
    /// bowtie2
    Align,
    /// kraken2, then bowtie2 on the unclassified reads
    ClassifyAlign,
}

impl ToolChain {
    /// Tools without which the stage cannot produce outputs.
    pub fn required_tools(&self) -> &'static [Tool] {
        match self {
            ToolChain::Trim => &[Tool::Fastp],
            ToolChain::Align => &[Tool::Bowtie2],
            ToolChain::ClassifyAlign => &[Tool::Kraken2, Tool::Bowtie2],
        }
    }
}

/// Static description of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageDescriptor {
    /// Short name used in report file names
    pub label: &'static str,
    /// Module directory name inside the project
    pub module: &'static str,
    /// Tag of the cleaned read files
    pub tag: &'static str,
    pub chain: ToolChain,
}

pub const QUALITY: StageDescriptor = StageDescriptor {
    label: "quality",
    module: "quality",
    tag: "filtered",
    chain: ToolChain::Trim,
};
pub const PHIX: StageDescriptor = StageDescriptor {
    label: "phix",
    module: "phix_removal",
    tag: "phix_removed",
    chain: ToolChain::Align,
};
pub const HUMAN: StageDescriptor = StageDescriptor {
    label: "human",
    module: "human_removal",
    tag: "human_removed",
    chain: ToolChain::ClassifyAlign,
};
pub const HOST: StageDescriptor = StageDescriptor {
    label: "host",
    module: "host_removal",
    tag: "host_removed",
    chain: ToolChain::ClassifyAlign,
};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageKind {
    Quality,
    Phix,
    Human,
    Host(HostOrganism),
}

impl StageKind {
    pub fn descriptor(&self) -> StageDescriptor {
        match self {
            StageKind::Quality => QUALITY,
            StageKind::Phix => PHIX,
            StageKind::Human => HUMAN,
            StageKind::Host(_) => HOST,
        }
    }
    pub fn host(&self) -> Option<HostOrganism> {
        match self {
            StageKind::Host(organism) => Some(*organism),
            _ => None,
        }
    }
    /// Reference databases the stage reads, `None` for the quality stage.
    ///
    /// # Errors
    ///
    /// * `CleanseqError::MissingDatabasePath` if a custom host lacks a reference path.
    /// * `CleanseqError::MissingConfigKey` if a reference is not configured.
    pub fn references(&self, config: &DatabaseConfig, custom: CustomReferences) -> Result<Option<References>, CleanseqError> {
        let references = match self {
            StageKind::Quality => None,
            StageKind::Phix => Some(References::aligner_only("phix", config)?),
            StageKind::Human => Some(References::chained("human", config)?),
            StageKind::Host(organism) => Some(References::for_host(
                *organism,
                custom.kraken2_db,
                custom.bowtie2_index,
                config,
            )?),
        };
        Ok(references)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    Discovering,
    BuildingInvocations,
    Executing,
    PostProcessing,
    Reporting,
    Done,
    Skipped,
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageState::Discovering => write!(f, "discovering"),
            StageState::BuildingInvocations => write!(f, "building invocations"),
            StageState::Executing => write!(f, "executing"),
            StageState::PostProcessing => write!(f, "post-processing"),
            StageState::Reporting => write!(f, "reporting"),
            StageState::Done => write!(f, "done"),
            StageState::Skipped => write!(f, "skipped"),
        }
    }
}

/// Run-wide settings shared by all tools of a stage.
#[derive(Debug, Clone, Default)]
pub struct StageSettings {
    pub threads: u32,
    pub save_intermediates: bool,
    pub tools: ToolPaths,
}

/// Option sets of the tools a stage may run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StageParams {
    pub fastp: FastpParams,
    pub kraken2: Kraken2Params,
    pub bowtie2: Bowtie2Params,
}

impl StageParams {
    /// Sets the thread count on every tool, zero leaves them unset.
    pub fn with_threads(mut self, threads: u32) -> Self {
        let threads = (threads > 0).then_some(threads);
        self.fastp.thread = threads;
        self.kraken2.threads = threads;
        self.bowtie2.threads = threads;
        self
    }
}

/// Reference paths given on the command line for a custom host.
#[derive(Debug, Clone, Default)]
pub struct CustomReferences {
    pub kraken2_db: Option<PathBuf>,
    pub bowtie2_index: Option<PathBuf>,
}

/// Cleaned outputs expected for one sample.
#[derive(Debug, Clone, Serialize)]
pub struct SampleResult {
    pub sample: SampleGroup,
    pub outputs: Vec<PathBuf>,
}

/// Everything a completed stage produced.
#[derive(Debug, Clone, Serialize)]
pub struct StageRun {
    pub descriptor: StageDescriptor,
    pub host: Option<HostOrganism>,
    pub project: PathBuf,
    pub module_dir: PathBuf,
    pub samples: Vec<SampleResult>,
    pub record: ExecutionRecord,
    pub aggregated: bool,
}

#[derive(Debug)]
pub enum StageOutcome {
    /// A required tool is missing, nothing was written
    Skipped(Tool),
    Done(StageRun),
}

pub struct StageExecutor {
    kind: StageKind,
    descriptor: StageDescriptor,
    references: Option<References>,
    params: StageParams,
    settings: StageSettings,
    state: StageState,
}

impl StageExecutor {
    /// Resolves the references of the stage, so that configuration errors
    /// surface before anything is built or written, see [`StageKind::references`].
    pub fn new(
        kind: StageKind,
        params: StageParams,
        settings: StageSettings,
        config: &DatabaseConfig,
        custom: CustomReferences,
    ) -> Result<Self, CleanseqError> {
        let references = kind.references(config, custom)?;

        Ok(Self {
            kind,
            descriptor: kind.descriptor(),
            references,
            params: params.with_threads(settings.threads),
            settings,
            state: StageState::Discovering,
        })
    }
    pub fn kind(&self) -> StageKind {
        self.kind
    }
    pub fn descriptor(&self) -> StageDescriptor {
        self.descriptor
    }
    pub fn state(&self) -> StageState {
        self.state
    }
    pub fn references(&self) -> Option<&References> {
        self.references.as_ref()
    }
    fn transition(&mut self, next: StageState) {
        log::info!("Stage {}: {} -> {}", self.descriptor.label, self.state, next);
        self.state = next;
    }
    fn executable(&self, tool: Tool) -> String {
        self.settings.tools.executable(tool)
    }
    /// Checks every tool the stage cannot run without.
    pub fn check_dependencies(&self) -> Result<(), CleanseqError> {
        for tool in self.descriptor.chain.required_tools() {
            self.settings.tools.check_dependency(*tool)?;
        }
        Ok(())
    }
    /// Discovers the samples, runs the stage in a module directory of `project`
    /// and aggregates the reports.
    ///
    /// A stage whose required tools are missing is skipped before anything is
    /// created on disk. Failing invocations are recorded and do not abort the stage.
    pub fn run(&mut self, selection: &InputSelection, project: &Project) -> Result<StageOutcome, CleanseqError> {
        log::info!("Stage {}: {}", self.descriptor.label, self.state);

        let samples = selection.resolve()?;
        log::info!("Found {} sample(s) for {} stage", samples.len(), self.descriptor.label);

        if let Err(err) = self.check_dependencies() {
            return match err {
                CleanseqError::MissingTool(tool) => {
                    log::warn!("{}", CleanseqError::MissingTool(tool));
                    self.transition(StageState::Skipped);
                    Ok(StageOutcome::Skipped(tool))
                }
                err => Err(err),
            };
        }

        self.transition(StageState::BuildingInvocations);

        let with_qc = self.descriptor.chain == ToolChain::Trim && match self.settings.tools.check_dependency(Tool::Fastqc) {
            Ok(()) => true,
            Err(err) => {
                log::warn!("Skipping read quality reports: {}", err);
                false
            }
        };
        let namer = OutputNamer::new(project.module_path(self.descriptor.module));
        let invocations = self.build_invocations(&samples, &namer, with_qc)?;

        project.create()?;
        let module_dir = project.module_dir(self.descriptor.module)?;
        project.write_manifest(&samples)?;

        self.transition(StageState::Executing);

        let policy = RetentionPolicy::for_tag(self.descriptor.tag, self.settings.save_intermediates);
        let record = CommandRunner::new(&module_dir).run(invocations, &policy)?;

        self.transition(StageState::PostProcessing);

        if record.failed() > 0 {
            log::warn!(
                "{} of {} invocations failed, see {}",
                record.failed(), record.entries.len(), record.log.display()
            );
        }
        let mut results = Vec::with_capacity(samples.len());
        for sample in samples {
            let outputs = self.stage_outputs(&sample, &namer);
            for output in outputs.iter().filter(|output| !output.exists()) {
                log::warn!("Expected output was not produced: {}", output.display());
            }
            results.push(SampleResult { sample, outputs });
        }

        self.transition(StageState::Reporting);

        let aggregated = ReportAggregator::new(self.settings.tools.clone()).aggregate(&module_dir);

        self.transition(StageState::Done);

        Ok(StageOutcome::Done(StageRun {
            descriptor: self.descriptor,
            host: self.kind.host(),
            project: project.root().to_path_buf(),
            module_dir,
            samples: results,
            record,
            aggregated,
        }))
    }
    /// Cleaned read files of `sample`, one per mate, named from the sample identifier.
    pub fn stage_outputs(&self, sample: &SampleGroup, namer: &OutputNamer) -> Vec<PathBuf> {
        namer.sample(&sample.id).mates(self.descriptor.tag, sample.is_paired())
    }
    /// Builds all invocations of the stage in execution order. Nothing is
    /// executed or written.
    ///
    /// # Errors
    ///
    /// * `CleanseqError::OutputCollision` if two invocations would write the same file.
    pub fn build_invocations(&self, samples: &[SampleGroup], namer: &OutputNamer, with_qc: bool) -> Result<Vec<ToolInvocation>, CleanseqError> {
        let mut invocations = Vec::new();

        match self.descriptor.chain {
            ToolChain::Trim => {
                if with_qc {
                    let raw = samples.iter().flat_map(|sample| sample.files.clone()).collect::<Vec<_>>();
                    invocations.push(self.fastqc(raw, namer)?);
                }
                let mut filtered = Vec::new();
                for sample in samples {
                    invocations.push(self.fastp(sample, namer)?);
                    filtered.extend(self.stage_outputs(sample, namer));
                }
                if with_qc {
                    invocations.push(self.fastqc(filtered, namer)?);
                }
            }
            ToolChain::Align => {
                let index = self.bowtie2_index()?;
                for sample in samples {
                    invocations.push(self.bowtie2(&sample.id, &sample.files, index, namer)?);
                }
            }
            ToolChain::ClassifyAlign => {
                let index = self.bowtie2_index()?;
                for sample in samples {
                    let (classify, unclassified) = self.kraken2(sample, namer)?;
                    invocations.push(classify);
                    invocations.push(self.bowtie2(&sample.id, &unclassified, index, namer)?);
                }
            }
        }

        let mut written = HashSet::new();
        for output in invocations.iter().flat_map(|invocation| &invocation.outputs) {
            if !written.insert(output) {
                return Err(CleanseqError::OutputCollision(output.clone()));
            }
        }
        Ok(invocations)
    }
    fn bowtie2_index(&self) -> Result<&Path, CleanseqError> {
        self.references
            .as_ref()
            .map(|references| references.bowtie2_index.as_path())
            .ok_or_else(|| CleanseqError::MissingDatabasePath("--db-path-bowtie2".to_string()))
    }
    fn fastqc(&self, files: Vec<PathBuf>, namer: &OutputNamer) -> Result<ToolInvocation, CleanseqError> {
        let mut invocation = ToolInvocation::new(self.executable(Tool::Fastqc))
            .arg("-o")
            .path_arg(namer.dir())?;
        if self.settings.threads > 0 {
            invocation = invocation.arg("-t").arg(self.settings.threads.to_string());
        }
        for file in &files {
            invocation = invocation.path_arg(file)?;
        }
        Ok(invocation.reads(files))
    }
    fn fastp(&self, sample: &SampleGroup, namer: &OutputNamer) -> Result<ToolInvocation, CleanseqError> {
        let names = namer.sample(&sample.id);
        let outputs = self.stage_outputs(sample, namer);
        let html = names.artifact("fastp.html");
        let json = names.artifact("fastp.json");

        let mut invocation = ToolInvocation::new(self.executable(Tool::Fastp));
        for (flag, input) in ["-i", "-I"].iter().zip(&sample.files) {
            invocation = invocation.arg(*flag).path_arg(input)?;
        }
        for (flag, output) in ["-o", "-O"].iter().zip(&outputs) {
            invocation = invocation.arg(*flag).path_arg(output)?;
        }
        Ok(invocation
            .arg("-h")
            .path_arg(&html)?
            .arg("-j")
            .path_arg(&json)?
            .args(assemble(&self.params.fastp))
            .reads(sample.files.clone())
            .writes(outputs)
            .writes([html, json])
            .stderr_to(names.artifact("fastp.log")))
    }
    /// Returns the classifier invocation and the unclassified read files it writes.
    fn kraken2(&self, sample: &SampleGroup, namer: &OutputNamer) -> Result<(ToolInvocation, Vec<PathBuf>), CleanseqError> {
        let label = self.descriptor.label;
        let db = self
            .references
            .as_ref()
            .and_then(|references| references.kraken2_db.as_deref())
            .ok_or_else(|| CleanseqError::MissingDatabasePath("--db-path-kraken2".to_string()))?;

        let names = namer.sample(&sample.id);
        let unclassified_tag = format!("{label}_unclassified");
        let unclassified = names.mates(&unclassified_tag, sample.is_paired());
        let template = if sample.is_paired() {
            names.template(&unclassified_tag, "#")
        } else {
            unclassified[0].clone()
        };

        let mut invocation = ToolInvocation::new(self.executable(Tool::Kraken2))
            .arg("--db")
            .path_arg(db)?
            .args(assemble(&self.params.kraken2));
        if sample.is_paired() {
            invocation = invocation.arg("--paired");
        }
        match <Format as CompressionExt>::from_path(sample.first()) {
            Format::Gzip => invocation = invocation.arg("--gzip-compressed"),
            Format::Bzip => invocation = invocation.arg("--bzip2-compressed"),
            _ => {}
        }
        invocation = invocation
            .arg("--unclassified-out")
            .path_arg(&template)?
            .arg("--output")
            .path_arg(&names.artifact(&format!("{label}.kraken2")))?
            .arg("--report")
            .path_arg(&names.artifact(&format!("{label}_kraken2_report.txt")))?;
        for file in &sample.files {
            invocation = invocation.path_arg(file)?;
        }

        let invocation = invocation
            .reads(sample.files.clone())
            .writes(unclassified.clone())
            .stderr_to(names.artifact(&format!("{label}_kraken2.log")));

        Ok((invocation, unclassified))
    }
    /// Aligner invocation over `inputs`, keeping the unaligned reads as the
    /// cleaned output. Names derive from `base`, the sample identifier.
    fn bowtie2(&self, base: &str, inputs: &[PathBuf], index: &Path, namer: &OutputNamer) -> Result<ToolInvocation, CleanseqError> {
        let label = self.descriptor.label;
        let tag = self.descriptor.tag;
        let paired = inputs.len() == 2;
        let names = namer.sample(base);
        let outputs = names.mates(tag, paired);

        let mut invocation = ToolInvocation::new(self.executable(Tool::Bowtie2))
            .args(assemble(&self.params.bowtie2))
            .arg("-x")
            .arg(path_str(index)?);

        invocation = if paired {
            invocation
                .arg("-1")
                .path_arg(&inputs[0])?
                .arg("-2")
                .path_arg(&inputs[1])?
                .arg("--un-conc")
                .path_arg(&names.template(tag, "_%"))?
        } else {
            invocation
                .arg("-U")
                .path_arg(&inputs[0])?
                .arg("--un")
                .path_arg(&outputs[0])?
        };

        Ok(invocation
            .arg("-S")
            .path_arg(&names.artifact(&format!("{label}.sam")))?
            .reads(inputs.to_vec())
            .writes(outputs)
            .stderr_to(names.artifact(&format!("{label}_bowtie2_report.txt"))))
    }
}

/// A stage run requested from the command line.
pub struct StageJob {
    pub executor: StageExecutor,
    pub inputs: InputSelection,
    pub output: PathBuf,
    pub json: Option<PathBuf>,
    pub command: String,
}

impl StageJob {
    pub fn run(mut self) -> Result<StageOutcome, CleanseqError> {
        let project = Project::new(&self.output);
        let outcome = self.executor.run(&self.inputs, &project)?;

        if let (StageOutcome::Done(run), Some(json)) = (&outcome, &self.json) {
            let summary = StageSummary::create(run, &self.command);
            summary.to_json(json)?;
            log::info!("Wrote stage summary to {}", json.display());
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DatabaseConfig {
        DatabaseConfig::default()
            .with_database("phix_bowtie2_index", "/refs/phix")
            .with_database("human_kraken2_db", "/refs/k2/human")
            .with_database("human_bowtie2_index", "/refs/bt2/human")
            .with_database("dog_kraken2_db", "/refs/k2/dog")
            .with_database("dog_bowtie2_index", "/refs/bt2/dog")
    }

    fn executor(kind: StageKind) -> StageExecutor {
        StageExecutor::new(kind, StageParams::default(), StageSettings::default(), &config(), CustomReferences::default()).unwrap()
    }

    fn paired() -> SampleGroup {
        SampleGroup::paired("s", PathBuf::from("/in/s_R1.fastq.gz"), PathBuf::from("/in/s_R2.fastq.gz"))
    }

    #[test]
    fn quality_paired_invocation() {
        let namer = OutputNamer::new("/p/quality");
        let invocations = executor(StageKind::Quality).build_invocations(&[paired()], &namer, false).unwrap();
        assert_eq!(invocations.len(), 1);
        assert_eq!(invocations[0].program, "fastp");
        assert_eq!(invocations[0].args, vec![
            "-i", "/in/s_R1.fastq.gz", "-I", "/in/s_R2.fastq.gz",
            "-o", "/p/quality/s_filtered_1.fastq", "-O", "/p/quality/s_filtered_2.fastq",
            "-h", "/p/quality/s_fastp.html", "-j", "/p/quality/s_fastp.json",
        ]);
    }

    #[test]
    fn quality_reports_wrap_the_trimmer() {
        let namer = OutputNamer::new("/p/quality");
        let samples = [paired(), SampleGroup::single("b", PathBuf::from("/in/b.fq"))];
        let invocations = executor(StageKind::Quality).build_invocations(&samples, &namer, true).unwrap();
        let programs = invocations.iter().map(|i| i.program.as_str()).collect::<Vec<_>>();
        assert_eq!(programs, vec!["fastqc", "fastp", "fastp", "fastqc"]);
        assert_eq!(invocations[0].inputs.len(), 3);
        assert_eq!(invocations[3].inputs, vec![
            PathBuf::from("/p/quality/s_filtered_1.fastq"),
            PathBuf::from("/p/quality/s_filtered_2.fastq"),
            PathBuf::from("/p/quality/b_filtered.fastq"),
        ]);
    }

    #[test]
    fn threads_reach_every_tool() {
        let settings = StageSettings { threads: 8, ..Default::default() };
        let executor = StageExecutor::new(StageKind::Phix, StageParams::default(), settings, &config(), CustomReferences::default()).unwrap();
        let invocations = executor.build_invocations(&[paired()], &OutputNamer::new("/p"), false).unwrap();
        let args = &invocations[0].args;
        assert_eq!(&args[..3], &["--very-sensitive", "-p", "8"]);
    }

    #[test]
    fn phix_single_end_keeps_unaligned_reads() {
        let namer = OutputNamer::new("/p/phix_removal");
        let sample = SampleGroup::single("b", PathBuf::from("/in/b.fq"));
        let invocations = executor(StageKind::Phix).build_invocations(&[sample], &namer, false).unwrap();
        assert_eq!(invocations[0].args, vec![
            "--very-sensitive", "-x", "/refs/phix",
            "-U", "/in/b.fq", "--un", "/p/phix_removal/b_phix_removed.fastq",
            "-S", "/p/phix_removal/b_phix.sam",
        ]);
        assert_eq!(invocations[0].stderr, Some(PathBuf::from("/p/phix_removal/b_phix_bowtie2_report.txt")));
    }

    #[test]
    fn host_chain_aligns_the_classifier_outputs() {
        let namer = OutputNamer::new("/p/host_removal");
        let invocations = executor(StageKind::Host(HostOrganism::Dog)).build_invocations(&[paired()], &namer, false).unwrap();
        assert_eq!(invocations.len(), 2);
        let (classify, align) = (&invocations[0], &invocations[1]);

        assert_eq!(classify.program, "kraken2");
        assert_eq!(align.program, "bowtie2");
        assert_eq!(align.inputs, classify.outputs);
        assert_eq!(classify.outputs, vec![
            PathBuf::from("/p/host_removal/s_host_unclassified_1.fastq"),
            PathBuf::from("/p/host_removal/s_host_unclassified_2.fastq"),
        ]);
        assert_eq!(classify.args, vec![
            "--db", "/refs/k2/dog", "--paired", "--gzip-compressed",
            "--unclassified-out", "/p/host_removal/s_host_unclassified#.fastq",
            "--output", "/p/host_removal/s_host.kraken2",
            "--report", "/p/host_removal/s_host_kraken2_report.txt",
            "/in/s_R1.fastq.gz", "/in/s_R2.fastq.gz",
        ]);
        assert_eq!(align.args, vec![
            "--very-sensitive", "-x", "/refs/bt2/dog",
            "-1", "/p/host_removal/s_host_unclassified_1.fastq",
            "-2", "/p/host_removal/s_host_unclassified_2.fastq",
            "--un-conc", "/p/host_removal/s_host_removed_%.fastq",
            "-S", "/p/host_removal/s_host.sam",
        ]);
        assert_eq!(align.outputs, vec![
            PathBuf::from("/p/host_removal/s_host_removed_1.fastq"),
            PathBuf::from("/p/host_removal/s_host_removed_2.fastq"),
        ]);
    }

    #[test]
    fn human_single_end_chain() {
        let namer = OutputNamer::new("/p/human_removal");
        let sample = SampleGroup::single("b", PathBuf::from("/in/b.fastq"));
        let invocations = executor(StageKind::Human).build_invocations(&[sample], &namer, false).unwrap();
        let (classify, align) = (&invocations[0], &invocations[1]);
        assert!(!classify.args.contains(&"--paired".to_string()));
        assert_eq!(classify.outputs, vec![PathBuf::from("/p/human_removal/b_human_unclassified.fastq")]);
        assert_eq!(align.inputs, classify.outputs);
        assert_eq!(align.outputs, vec![PathBuf::from("/p/human_removal/b_human_removed.fastq")]);
    }

    #[test]
    fn custom_host_without_aligner_index_fails_early() {
        let custom = CustomReferences { kraken2_db: Some(PathBuf::from("/k2")), bowtie2_index: None };
        let result = StageExecutor::new(
            StageKind::Host(HostOrganism::Custom),
            StageParams::default(),
            StageSettings::default(),
            &DatabaseConfig::default(),
            custom,
        );
        match result {
            Err(CleanseqError::MissingDatabasePath(flag)) => assert_eq!(flag, "--db-path-bowtie2"),
            Err(err) => panic!("unexpected error: {err}"),
            Ok(_) => panic!("custom host without aligner index was accepted"),
        }
    }

    #[test]
    fn unconfigured_host_is_a_config_error() {
        let result = StageExecutor::new(
            StageKind::Host(HostOrganism::Cat),
            StageParams::default(),
            StageSettings::default(),
            &config(),
            CustomReferences::default(),
        );
        assert!(matches!(result, Err(CleanseqError::MissingConfigKey(_, _))));
    }

    #[test]
    fn quality_without_trimmer_is_skipped_without_writes() {
        let dir = tempfile::tempdir().unwrap();
        let reads = dir.path().join("a.fastq");
        std::fs::write(&reads, "@r\nACGT\n+\nIIII\n").unwrap();

        let settings = StageSettings {
            tools: ToolPaths::default().with(Tool::Fastp, "cleanseq-test-no-such-fastp"),
            ..Default::default()
        };
        let mut executor = StageExecutor::new(StageKind::Quality, StageParams::default(), settings, &config(), CustomReferences::default()).unwrap();

        let output = dir.path().join("out");
        let project = Project::new(&output);
        let selection = InputSelection { single: Some(reads), ..Default::default() };

        let outcome = executor.run(&selection, &project).unwrap();
        assert!(matches!(outcome, StageOutcome::Skipped(Tool::Fastp)));
        assert_eq!(executor.state(), StageState::Skipped);
        assert!(!output.exists());
    }

    #[test]
    fn quality_without_trimmer_skips_a_paired_directory() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("reads");
        std::fs::create_dir(&input).unwrap();
        for name in ["a_R1.fastq", "a_R2.fastq"] {
            std::fs::write(input.join(name), "@r\nACGT\n+\nIIII\n").unwrap();
        }

        let settings = StageSettings {
            tools: ToolPaths::default().with(Tool::Fastp, "cleanseq-test-no-such-fastp"),
            ..Default::default()
        };
        let mut executor = StageExecutor::new(StageKind::Quality, StageParams::default(), settings, &config(), CustomReferences::default()).unwrap();

        let output = dir.path().join("out");
        let project = Project::new(&output);
        let selection = InputSelection { input_dir: Some(input.clone()), ..Default::default() };

        let outcome = executor.run(&selection, &project).unwrap();
        assert!(matches!(outcome, StageOutcome::Skipped(Tool::Fastp)));
        assert_eq!(executor.state(), StageState::Skipped);
        assert!(!output.exists());
        assert_eq!(std::fs::read_dir(&input).unwrap().count(), 2);
    }

    #[test]
    fn lone_mate_outputs_keep_the_marker() {
        let namer = OutputNamer::new("/p/quality");
        let samples = crate::samples::group_files(vec![
            PathBuf::from("/in/x.fastq"),
            PathBuf::from("/in/x_R1.fastq"),
        ]);
        let invocations = executor(StageKind::Quality).build_invocations(&samples, &namer, false).unwrap();
        assert_eq!(invocations[0].outputs, vec![
            PathBuf::from("/p/quality/x_filtered.fastq"),
            PathBuf::from("/p/quality/x_fastp.html"),
            PathBuf::from("/p/quality/x_fastp.json"),
        ]);
        assert_eq!(invocations[1].outputs, vec![
            PathBuf::from("/p/quality/x_R1_filtered.fastq"),
            PathBuf::from("/p/quality/x_R1_fastp.html"),
            PathBuf::from("/p/quality/x_R1_fastp.json"),
        ]);
        assert_eq!(invocations[1].stderr, Some(PathBuf::from("/p/quality/x_R1_fastp.log")));
    }

    #[test]
    fn samples_writing_the_same_output_are_rejected() {
        let namer = OutputNamer::new("/p/phix_removal");
        let samples = crate::samples::group_files(vec![
            PathBuf::from("/in/a.fastq"),
            PathBuf::from("/in/a.fq.gz"),
        ]);
        match executor(StageKind::Phix).build_invocations(&samples, &namer, false) {
            Err(CleanseqError::OutputCollision(path)) => {
                assert_eq!(path, PathBuf::from("/p/phix_removal/a_phix_removed.fastq"))
            }
            Err(err) => panic!("unexpected error: {err}"),
            Ok(_) => panic!("colliding outputs were accepted"),
        }
    }
}
