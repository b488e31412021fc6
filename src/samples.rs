//! Discovery of read files and grouping into paired-end or single-end samples.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::CleanseqError;
use crate::naming::{fastq_stem, find_mate_marker, sample_base, Mate};

/// Glob matching every FASTQ-family file name, filtered further by [`fastq_stem`].
pub const FASTQ_GLOB: &str = "*.f*q*";

/// A sample: canonical base name and one (single-end) or two (mate 1, mate 2) read files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SampleGroup {
    pub id: String,
    pub files: Vec<PathBuf>,
}

impl SampleGroup {
    pub fn paired(id: impl Into<String>, forward: PathBuf, reverse: PathBuf) -> Self {
        Self { id: id.into(), files: vec![forward, reverse] }
    }
    pub fn single(id: impl Into<String>, file: PathBuf) -> Self {
        Self { id: id.into(), files: vec![file] }
    }
    pub fn is_paired(&self) -> bool {
        self.files.len() == 2
    }
    /// First (or only) read file, which names per-sample reports.
    pub fn first(&self) -> &Path {
        &self.files[0]
    }
    pub fn layout(&self) -> &str {
        if self.is_paired() { "paired" } else { "single" }
    }
}

/// Input selection as given on the command line.
#[derive(Debug, Clone, Default)]
pub struct InputSelection {
    pub forward: Option<PathBuf>,
    pub reverse: Option<PathBuf>,
    pub single: Option<PathBuf>,
    pub input_dir: Option<PathBuf>,
}

impl InputSelection {
    /// Resolves the selection into sample groups, the input directory takes
    /// precedence over explicit files.
    ///
    /// # Errors
    ///
    /// * `CleanseqError::MissingInput` if neither a directory, a forward/reverse pair nor a single file is given.
    pub fn resolve(&self) -> Result<Vec<SampleGroup>, CleanseqError> {
        if let Some(dir) = &self.input_dir {
            if self.forward.is_some() || self.reverse.is_some() || self.single.is_some() {
                log::warn!("Input directory is set, ignoring explicit read files");
            }
            return discover_samples(dir);
        }
        match (&self.forward, &self.reverse, &self.single) {
            (Some(forward), Some(reverse), _) => {
                check_read_file(forward)?;
                check_read_file(reverse)?;
                Ok(vec![SampleGroup::paired(sample_base(forward)?, forward.clone(), reverse.clone())])
            }
            (_, _, Some(single)) => {
                check_read_file(single)?;
                Ok(vec![SampleGroup::single(sample_base(single)?, single.clone())])
            }
            _ => Err(CleanseqError::MissingInput),
        }
    }
}

fn check_read_file(path: &Path) -> Result<(), CleanseqError> {
    if !path.exists() || !path.is_file() {
        return Err(CleanseqError::MissingInputReadFile(path.to_path_buf()));
    }
    Ok(())
}

/// Scans `dir` for FASTQ files and groups mates by their canonical base.
///
/// Files with a mate marker whose partner is missing are kept as single-end
/// samples with a warning. Groups are returned sorted by sample identifier.
pub fn discover_samples(dir: &Path) -> Result<Vec<SampleGroup>, CleanseqError> {
    if !dir.exists() || !dir.is_dir() {
        return Err(CleanseqError::MissingInputDirectory(dir.to_path_buf()));
    }

    let dir_str = dir.to_str().ok_or_else(|| CleanseqError::InvalidFileName(dir.to_path_buf()))?;
    let pattern = Path::new(&glob::Pattern::escape(dir_str)).join(FASTQ_GLOB);
    let pattern = pattern.to_str().ok_or_else(|| CleanseqError::InvalidFileName(dir.to_path_buf()))?;

    let mut files = Vec::new();
    for entry in glob::glob(pattern)? {
        let path = entry?;
        let is_fastq = path.is_file()
            && path.file_name().and_then(|name| name.to_str()).and_then(fastq_stem).is_some();
        if is_fastq {
            files.push(path);
        }
    }
    if files.is_empty() {
        return Err(CleanseqError::EmptyInputDirectory(dir.to_path_buf()));
    }

    Ok(group_files(files))
}

/// Groups read files into samples, see [`discover_samples`].
pub fn group_files(files: Vec<PathBuf>) -> Vec<SampleGroup> {
    let mut mates: BTreeMap<String, Vec<(Mate, PathBuf)>> = BTreeMap::new();
    let mut groups: Vec<SampleGroup> = Vec::new();

    for path in files {
        let Some(stem) = path.file_name().and_then(|name| name.to_str()).and_then(fastq_stem) else {
            continue;
        };
        match find_mate_marker(stem) {
            Some((marker, mate)) => {
                let base = stem.replacen(marker, "", 1);
                mates.entry(base).or_default().push((mate, path.clone()));
            }
            None => groups.push(SampleGroup::single(stem, path.clone())),
        }
    }

    for (base, mut entries) in mates {
        entries.sort();
        let is_pair = entries.len() == 2 && entries[0].0 == Mate::One && entries[1].0 == Mate::Two;
        if is_pair {
            let (_, reverse) = entries.remove(1);
            let (_, forward) = entries.remove(0);
            groups.push(SampleGroup::paired(base, forward, reverse));
        } else {
            for (_, path) in entries {
                log::warn!("No matching mate found for {}, processing it as single-end", path.display());
                let id = path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .and_then(fastq_stem)
                    .unwrap_or(&base)
                    .to_string();
                groups.push(SampleGroup::single(id, path));
            }
        }
    }

    groups.sort_by(|a, b| a.id.cmp(&b.id));
    groups
}

/// Writes a tab-separated manifest of the sample groups.
pub fn write_manifest(samples: &[SampleGroup], output: &Path) -> Result<(), CleanseqError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(File::create(output)?);

    writer.write_record(["sample", "layout", "forward", "reverse"])?;
    for sample in samples {
        let forward = sample.first().display().to_string();
        let reverse = match sample.files.get(1) {
            Some(path) => path.display().to_string(),
            None => String::new(),
        };
        writer.write_record([sample.id.as_str(), sample.layout(), forward.as_str(), reverse.as_str()])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, "").unwrap();
        path
    }

    #[test]
    fn directory_with_pair_and_single() {
        let dir = tempfile::tempdir().unwrap();
        let r1 = touch(dir.path(), "a_R1.fastq");
        let r2 = touch(dir.path(), "a_R2.fastq");
        let b = touch(dir.path(), "b.fastq");

        let groups = discover_samples(dir.path()).unwrap();
        assert_eq!(groups, vec![
            SampleGroup::paired("a", r1, r2),
            SampleGroup::single("b", b),
        ]);
    }

    #[test]
    fn compressed_and_numeric_markers_pair() {
        let dir = tempfile::tempdir().unwrap();
        let r2 = touch(dir.path(), "s_2.fq.gz");
        let r1 = touch(dir.path(), "s_1.fq.gz");

        let groups = discover_samples(dir.path()).unwrap();
        assert_eq!(groups, vec![SampleGroup::paired("s", r1, r2)]);
    }

    #[test]
    fn non_fastq_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "notes.fq.txt");
        touch(dir.path(), "table.fqz");
        let c = touch(dir.path(), "c.fq");

        let groups = discover_samples(dir.path()).unwrap();
        assert_eq!(groups, vec![SampleGroup::single("c", c)]);
    }

    #[test]
    fn lone_mate_becomes_single_end() {
        let dir = tempfile::tempdir().unwrap();
        let lone = touch(dir.path(), "lonely_R1.fastq");

        let groups = discover_samples(dir.path()).unwrap();
        assert_eq!(groups, vec![SampleGroup::single("lonely_R1", lone)]);
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(discover_samples(dir.path()), Err(CleanseqError::EmptyInputDirectory(_))));
    }

    #[test]
    fn explicit_pair_and_single() {
        let dir = tempfile::tempdir().unwrap();
        let r1 = touch(dir.path(), "x_R1.fastq.gz");
        let r2 = touch(dir.path(), "x_R2.fastq.gz");

        let selection = InputSelection { forward: Some(r1.clone()), reverse: Some(r2.clone()), ..Default::default() };
        assert_eq!(selection.resolve().unwrap(), vec![SampleGroup::paired("x", r1.clone(), r2)]);

        let selection = InputSelection { single: Some(r1.clone()), ..Default::default() };
        assert_eq!(selection.resolve().unwrap(), vec![SampleGroup::single("x", r1)]);
    }

    #[test]
    fn forward_without_reverse_is_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let r1 = touch(dir.path(), "x_R1.fastq");
        let selection = InputSelection { forward: Some(r1), ..Default::default() };
        assert!(matches!(selection.resolve(), Err(CleanseqError::MissingInput)));
        assert!(matches!(InputSelection::default().resolve(), Err(CleanseqError::MissingInput)));
    }

    #[test]
    fn input_dir_takes_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let b = touch(dir.path(), "b.fastq");
        let selection = InputSelection {
            single: Some(PathBuf::from("/does/not/exist.fastq")),
            input_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        assert_eq!(selection.resolve().unwrap(), vec![SampleGroup::single("b", b)]);
    }

    #[test]
    fn manifest_lists_samples() {
        let dir = tempfile::tempdir().unwrap();
        let samples = vec![
            SampleGroup::paired("a", PathBuf::from("a_R1.fq"), PathBuf::from("a_R2.fq")),
            SampleGroup::single("b", PathBuf::from("b.fq")),
        ];
        let manifest = dir.path().join("samples.tsv");
        write_manifest(&samples, &manifest).unwrap();
        let content = fs::read_to_string(manifest).unwrap();
        assert_eq!(content, "sample\tlayout\tforward\treverse\na\tpaired\ta_R1.fq\ta_R2.fq\nb\tsingle\tb.fq\t\n");
    }
}
