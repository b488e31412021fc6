//! Typed option sets for the external tools and their translation into
//! command-line tokens.
//!
//! Every option is optional. An option is emitted only when it is set to a
//! truthy value: `false`, numeric zero and empty strings count as unset, so a
//! caller cannot pass an explicit zero through this layer. Each tool has a
//! fixed baseline placed before the user options; contradicting options (for
//! example a second bowtie2 preset) are passed through unchanged and the tool
//! decides which one wins.

use clap::Args;
use serde::{Deserialize, Serialize};

/// A single option value.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Flag(bool),
    Int(Option<i64>),
    Float(Option<f64>),
    Text(Option<String>),
}

impl OptionValue {
    pub fn is_set(&self) -> bool {
        match self {
            OptionValue::Flag(value) => *value,
            OptionValue::Int(value) => matches!(value, Some(v) if *v != 0),
            OptionValue::Float(value) => matches!(value, Some(v) if *v != 0.0),
            OptionValue::Text(value) => matches!(value, Some(v) if !v.is_empty()),
        }
    }
    fn value_token(&self) -> Option<String> {
        match self {
            OptionValue::Flag(_) => None,
            OptionValue::Int(value) => value.map(|v| v.to_string()),
            OptionValue::Float(value) => value.map(|v| v.to_string()),
            OptionValue::Text(value) => value.clone(),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Flag(value)
    }
}
impl From<Option<u32>> for OptionValue {
    fn from(value: Option<u32>) -> Self {
        OptionValue::Int(value.map(i64::from))
    }
}
impl From<Option<f64>> for OptionValue {
    fn from(value: Option<f64>) -> Self {
        OptionValue::Float(value)
    }
}
impl From<Option<String>> for OptionValue {
    fn from(value: Option<String>) -> Self {
        OptionValue::Text(value)
    }
}

/// Option schema of one external tool.
pub trait ToolParams {
    /// Tokens placed before every user option.
    fn baseline(&self) -> Vec<String> {
        Vec::new()
    }
    /// Options in emission order, as (flag, value).
    fn options(&self) -> Vec<(&'static str, OptionValue)>;
}

/// Assembles the baseline and every set option of `params` into tokens.
///
/// # Example
///
/// ```
/// use cleanseq::params::{assemble, Kraken2Params};
///
/// let params = Kraken2Params { confidence: Some(0.1), quick: true, ..Default::default() };
/// assert_eq!(assemble(&params), vec!["--confidence", "0.1", "--quick"]);
/// ```
pub fn assemble<P: ToolParams>(params: &P) -> Vec<String> {
    let mut tokens = params.baseline();
    for (flag, value) in params.options() {
        if !value.is_set() {
            continue;
        }
        tokens.push(flag.to_string());
        if let Some(token) = value.value_token() {
            tokens.push(token);
        }
    }
    tokens
}

/// Options for quality filtering with fastp.
#[derive(Args, Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[command(next_help_heading = "Fastp options")]
pub struct FastpParams {
    /// Minimum base quality for a base to be qualified
    #[arg(long)]
    pub qualified_quality_phred: Option<u32>,
    /// Maximum percentage of unqualified bases allowed in a read
    #[arg(long)]
    pub unqualified_percent_limit: Option<u32>,
    /// Maximum number of N bases allowed in a read
    #[arg(long)]
    pub n_base_limit: Option<u32>,
    /// Minimum read length after trimming
    #[arg(long)]
    pub length_required: Option<u32>,
    /// Discard reads with average quality below this value
    #[arg(long)]
    pub average_qual: Option<u32>,
    /// Adapter sequence for read 1
    #[arg(long)]
    pub adapter_sequence: Option<String>,
    /// Adapter sequence for read 2
    #[arg(long)]
    pub adapter_sequence_r2: Option<String>,
    /// Detect adapters for paired-end data by overlap analysis
    #[arg(long)]
    pub detect_adapter_for_pe: bool,
    /// Bases trimmed from the front of read 1
    #[arg(long)]
    pub trim_front1: Option<u32>,
    /// Bases trimmed from the tail of read 1
    #[arg(long)]
    pub trim_tail1: Option<u32>,
    /// Bases trimmed from the front of read 2
    #[arg(long)]
    pub trim_front2: Option<u32>,
    /// Bases trimmed from the tail of read 2
    #[arg(long)]
    pub trim_tail2: Option<u32>,
    /// Sliding window trimming from 5' to 3'
    #[arg(long)]
    pub cut_front: bool,
    /// Sliding window trimming from 3' to 5'
    #[arg(long)]
    pub cut_tail: bool,
    /// Sliding window trimming moving right
    #[arg(long)]
    pub cut_right: bool,
    /// Sliding window size
    #[arg(long)]
    pub cut_window_size: Option<u32>,
    /// Mean quality required in the sliding window
    #[arg(long)]
    pub cut_mean_quality: Option<u32>,
    /// Force polyG tail trimming
    #[arg(long)]
    pub trim_poly_g: bool,
    /// Enable polyX tail trimming
    #[arg(long)]
    pub trim_poly_x: bool,
    /// Enable low complexity filter
    #[arg(long)]
    pub low_complexity_filter: bool,
    /// Complexity threshold (0-100)
    #[arg(long)]
    pub complexity_threshold: Option<u32>,
    /// Base correction in overlapped regions of paired-end reads
    #[arg(long)]
    pub correction: bool,
    /// Remove duplicated reads
    #[arg(long)]
    pub dedup: bool,
    /// Enable overrepresented sequence analysis
    #[arg(long)]
    pub overrepresentation_analysis: bool,
    /// Number of worker threads
    #[arg(skip)]
    pub thread: Option<u32>,
}

impl ToolParams for FastpParams {
    fn options(&self) -> Vec<(&'static str, OptionValue)> {
        vec![
            ("--qualified_quality_phred", self.qualified_quality_phred.into()),
            ("--unqualified_percent_limit", self.unqualified_percent_limit.into()),
            ("--n_base_limit", self.n_base_limit.into()),
            ("--length_required", self.length_required.into()),
            ("--average_qual", self.average_qual.into()),
            ("--adapter_sequence", self.adapter_sequence.clone().into()),
            ("--adapter_sequence_r2", self.adapter_sequence_r2.clone().into()),
            ("--detect_adapter_for_pe", self.detect_adapter_for_pe.into()),
            ("--trim_front1", self.trim_front1.into()),
            ("--trim_tail1", self.trim_tail1.into()),
            ("--trim_front2", self.trim_front2.into()),
            ("--trim_tail2", self.trim_tail2.into()),
            ("--cut_front", self.cut_front.into()),
            ("--cut_tail", self.cut_tail.into()),
            ("--cut_right", self.cut_right.into()),
            ("--cut_window_size", self.cut_window_size.into()),
            ("--cut_mean_quality", self.cut_mean_quality.into()),
            ("--trim_poly_g", self.trim_poly_g.into()),
            ("--trim_poly_x", self.trim_poly_x.into()),
            ("--low_complexity_filter", self.low_complexity_filter.into()),
            ("--complexity_threshold", self.complexity_threshold.into()),
            ("--correction", self.correction.into()),
            ("--dedup", self.dedup.into()),
            ("--overrepresentation_analysis", self.overrepresentation_analysis.into()),
            ("--thread", self.thread.into()),
        ]
    }
}

/// Options for k-mer classification with Kraken2.
#[derive(Args, Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[command(next_help_heading = "Kraken2 options")]
pub struct Kraken2Params {
    /// Confidence score threshold (0-1)
    #[arg(long)]
    pub confidence: Option<f64>,
    /// Minimum base quality used in classification
    #[arg(long)]
    pub minimum_base_quality: Option<u32>,
    /// Minimum number of hit groups needed for a call
    #[arg(long)]
    pub minimum_hit_groups: Option<u32>,
    /// Quick operation, use the first hit or hits
    #[arg(long)]
    pub quick: bool,
    /// Avoid loading the database into RAM
    #[arg(long)]
    pub memory_mapping: bool,
    /// Print scientific names instead of taxonomy identifiers
    #[arg(long)]
    pub use_names: bool,
    /// Number of worker threads
    #[arg(skip)]
    pub threads: Option<u32>,
}

impl ToolParams for Kraken2Params {
    fn options(&self) -> Vec<(&'static str, OptionValue)> {
        vec![
            ("--confidence", self.confidence.into()),
            ("--minimum-base-quality", self.minimum_base_quality.into()),
            ("--minimum-hit-groups", self.minimum_hit_groups.into()),
            ("--quick", self.quick.into()),
            ("--memory-mapping", self.memory_mapping.into()),
            ("--use-names", self.use_names.into()),
            ("--threads", self.threads.into()),
        ]
    }
}

/// Sensitivity preset always passed to bowtie2 before user options.
pub const BOWTIE2_BASELINE_PRESET: &str = "--very-sensitive";

/// Options for read alignment with Bowtie2.
#[derive(Args, Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[command(next_help_heading = "Bowtie2 options")]
pub struct Bowtie2Params {
    /// Preset: very fast end-to-end alignment
    #[arg(long)]
    pub very_fast: bool,
    /// Preset: fast end-to-end alignment
    #[arg(long)]
    pub fast: bool,
    /// Preset: sensitive end-to-end alignment
    #[arg(long)]
    pub sensitive: bool,
    /// Local alignment instead of end-to-end
    #[arg(long)]
    pub local: bool,
    /// Preset: very sensitive local alignment
    #[arg(long)]
    pub very_sensitive_local: bool,
    /// Mismatches allowed in the seed alignment (0-1)
    #[arg(long = "seed-mismatches")]
    pub seed_mismatches: Option<u32>,
    /// Length of seed substrings
    #[arg(long = "seed-length")]
    pub seed_length: Option<u32>,
    /// Minimum fragment length
    #[arg(long)]
    pub minins: Option<u32>,
    /// Maximum fragment length
    #[arg(long)]
    pub maxins: Option<u32>,
    /// Bases trimmed from the 5' end of each read
    #[arg(long)]
    pub trim5: Option<u32>,
    /// Bases trimmed from the 3' end of each read
    #[arg(long)]
    pub trim3: Option<u32>,
    /// Minimum alignment score function, e.g. 'L,-0.6,-0.6'
    #[arg(long, allow_hyphen_values = true)]
    pub score_min: Option<String>,
    /// Suppress unpaired alignments for paired reads
    #[arg(long)]
    pub no_mixed: bool,
    /// Suppress discordant alignments for paired reads
    #[arg(long)]
    pub no_discordant: bool,
    /// Do not try one-mismatch end-to-end alignments before seed search
    #[arg(long)]
    pub no_1mm_upfront: bool,
    /// Number of worker threads
    #[arg(skip)]
    pub threads: Option<u32>,
}

impl ToolParams for Bowtie2Params {
    fn baseline(&self) -> Vec<String> {
        vec![BOWTIE2_BASELINE_PRESET.to_string()]
    }
    fn options(&self) -> Vec<(&'static str, OptionValue)> {
        vec![
            ("--very-fast", self.very_fast.into()),
            ("--fast", self.fast.into()),
            ("--sensitive", self.sensitive.into()),
            ("--local", self.local.into()),
            ("--very-sensitive-local", self.very_sensitive_local.into()),
            ("-N", self.seed_mismatches.into()),
            ("-L", self.seed_length.into()),
            ("--minins", self.minins.into()),
            ("--maxins", self.maxins.into()),
            ("--trim5", self.trim5.into()),
            ("--trim3", self.trim3.into()),
            ("--score-min", self.score_min.clone().into()),
            ("--no-mixed", self.no_mixed.into()),
            ("--no-discordant", self.no_discordant.into()),
            ("--no-1mm-upfront", self.no_1mm_upfront.into()),
            ("-p", self.threads.into()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_options_are_not_emitted() {
        assert!(assemble(&FastpParams::default()).is_empty());
        assert!(assemble(&Kraken2Params::default()).is_empty());
        assert_eq!(assemble(&Bowtie2Params::default()), vec![BOWTIE2_BASELINE_PRESET]);
    }

    #[test]
    fn boolean_flag_emits_one_token() {
        let params = FastpParams { dedup: true, ..Default::default() };
        assert_eq!(assemble(&params), vec!["--dedup"]);
    }

    #[test]
    fn zero_and_empty_values_are_unset() {
        let params = FastpParams {
            length_required: Some(0),
            adapter_sequence: Some(String::new()),
            thread: Some(0),
            ..Default::default()
        };
        assert!(assemble(&params).is_empty());

        let params = Kraken2Params { confidence: Some(0.0), ..Default::default() };
        assert!(assemble(&params).is_empty());
    }

    #[test]
    fn values_follow_their_flags_in_schema_order() {
        let params = FastpParams {
            length_required: Some(50),
            qualified_quality_phred: Some(20),
            adapter_sequence: Some("AGATCGGAAGAGC".to_string()),
            thread: Some(8),
            ..Default::default()
        };
        assert_eq!(assemble(&params), vec![
            "--qualified_quality_phred", "20",
            "--length_required", "50",
            "--adapter_sequence", "AGATCGGAAGAGC",
            "--thread", "8",
        ]);
    }

    #[test]
    fn contradicting_presets_are_passed_through() {
        let params = Bowtie2Params { very_fast: true, threads: Some(4), ..Default::default() };
        assert_eq!(assemble(&params), vec!["--very-sensitive", "--very-fast", "-p", "4"]);
    }

    #[test]
    fn assembly_is_deterministic() {
        let params = Bowtie2Params {
            local: true,
            maxins: Some(800),
            score_min: Some("L,-0.6,-0.6".to_string()),
            ..Default::default()
        };
        assert_eq!(assemble(&params), assemble(&params));
    }
}
