//! Deterministic output names for stage products.
//!
//! Names are derived from a sample base, by default the input file name with
//! compression and FASTQ extensions and the mate marker removed. The stage tag plus an
//! optional mate suffix are appended. Both mates of a pair therefore map to
//! the same base and their outputs differ only by suffix, which is what the
//! next stage relies on when it pairs the cleaned files again.

use niffler::compression::Format;
use std::path::{Path, PathBuf};

use crate::error::CleanseqError;
use crate::utils::CompressionExt;

/// Recognised FASTQ extensions (before compression).
pub const FASTQ_EXTENSIONS: [&str; 2] = ["fastq", "fq"];

/// Extension of every file written by a stage.
pub const OUTPUT_EXTENSION: &str = "fastq";

/// Read of a paired-end library a file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Mate {
    One,
    Two,
}

impl Mate {
    pub fn suffix(&self) -> &'static str {
        match self {
            Mate::One => "1",
            Mate::Two => "2",
        }
    }
}

/// Mate markers in the order they are tested, the first one contained in a
/// file stem decides the mate.
pub const MATE_MARKERS: [(&str, Mate); 4] = [
    ("_R1", Mate::One),
    ("_R2", Mate::Two),
    ("_1", Mate::One),
    ("_2", Mate::Two),
];

/// Removes a trailing compression extension and a FASTQ extension.
///
/// Returns `None` if the remaining name does not carry a FASTQ extension.
pub fn fastq_stem(file_name: &str) -> Option<&str> {
    let name = match <Format as CompressionExt>::from_path(file_name) {
        Format::No => file_name,
        _ => file_name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(file_name),
    };
    let (stem, ext) = name.rsplit_once('.')?;
    if FASTQ_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) && !stem.is_empty() {
        Some(stem)
    } else {
        None
    }
}

/// Like [`fastq_stem`] but leaves names without a FASTQ extension untouched
/// apart from the compression extension.
fn loose_stem(file_name: &str) -> &str {
    match fastq_stem(file_name) {
        Some(stem) => stem,
        None => match <Format as CompressionExt>::from_path(file_name) {
            Format::No => file_name,
            _ => file_name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(file_name),
        },
    }
}

/// First mate marker contained in `stem`.
pub fn find_mate_marker(stem: &str) -> Option<(&'static str, Mate)> {
    MATE_MARKERS
        .iter()
        .find(|(marker, _)| stem.contains(marker))
        .copied()
}

/// Stem with one occurrence of its mate marker removed.
pub fn strip_mate_marker(stem: &str) -> String {
    match find_mate_marker(stem) {
        Some((marker, _)) => stem.replacen(marker, "", 1),
        None => stem.to_string(),
    }
}

/// Canonical base name of a read file, e.g. `sample` for `sample_R1.fastq.gz`.
pub fn sample_base(path: &Path) -> Result<String, CleanseqError> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| CleanseqError::InvalidFileName(path.to_path_buf()))?;

    Ok(strip_mate_marker(loose_stem(file_name)))
}

/// Derives file names inside one module directory.
#[derive(Debug, Clone)]
pub struct OutputNamer {
    dir: PathBuf,
}

impl OutputNamer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
    pub fn dir(&self) -> &Path {
        &self.dir
    }
    /// Names for the sample with base name `base`, usually its identifier.
    pub fn sample<'a>(&'a self, base: &'a str) -> SampleNamer<'a> {
        SampleNamer { dir: &self.dir, base }
    }
    /// `<base>_<tag>_<mate>.fastq`, or `<base>_<tag>.fastq` for an empty mate suffix.
    ///
    /// # Example
    ///
    /// ```
    /// use cleanseq::naming::OutputNamer;
    /// use std::path::{Path, PathBuf};
    ///
    /// let namer = OutputNamer::new("out");
    /// let path = namer.output(Path::new("reads/sample_R2.fastq.gz"), "filtered", "2").unwrap();
    /// assert_eq!(path, PathBuf::from("out/sample_filtered_2.fastq"));
    /// ```
    pub fn output(&self, input: &Path, tag: &str, mate: &str) -> Result<PathBuf, CleanseqError> {
        Ok(self.sample(&sample_base(input)?).output(tag, mate))
    }
    /// `<base>_<tag><placeholder>.fastq` for tools that expand a placeholder into
    /// the mate suffix themselves, e.g. `_%` for bowtie2 or `#` for kraken2.
    pub fn template(&self, input: &Path, tag: &str, placeholder: &str) -> Result<PathBuf, CleanseqError> {
        Ok(self.sample(&sample_base(input)?).template(tag, placeholder))
    }
    /// Per-mate names the outputs of [`OutputNamer::template`] expand to.
    pub fn mates(&self, input: &Path, tag: &str, paired: bool) -> Result<Vec<PathBuf>, CleanseqError> {
        Ok(self.sample(&sample_base(input)?).mates(tag, paired))
    }
    /// Arbitrary non-read artifact named from the input base, e.g. `<base>_fastp.html`.
    pub fn artifact(&self, input: &Path, suffix: &str) -> Result<PathBuf, CleanseqError> {
        Ok(self.sample(&sample_base(input)?).artifact(suffix))
    }
}

/// [`OutputNamer`] bound to one base name.
#[derive(Debug, Clone, Copy)]
pub struct SampleNamer<'a> {
    dir: &'a Path,
    base: &'a str,
}

impl SampleNamer<'_> {
    pub fn output(&self, tag: &str, mate: &str) -> PathBuf {
        let base = self.base;
        let name = if mate.is_empty() {
            format!("{base}_{tag}.{OUTPUT_EXTENSION}")
        } else {
            format!("{base}_{tag}_{mate}.{OUTPUT_EXTENSION}")
        };
        self.dir.join(name)
    }
    pub fn template(&self, tag: &str, placeholder: &str) -> PathBuf {
        self.dir.join(format!("{}_{tag}{placeholder}.{OUTPUT_EXTENSION}", self.base))
    }
    pub fn mates(&self, tag: &str, paired: bool) -> Vec<PathBuf> {
        if paired {
            vec![self.output(tag, Mate::One.suffix()), self.output(tag, Mate::Two.suffix())]
        } else {
            vec![self.output(tag, "")]
        }
    }
    pub fn artifact(&self, suffix: &str) -> PathBuf {
        self.dir.join(format!("{}_{suffix}", self.base))
    }
}
