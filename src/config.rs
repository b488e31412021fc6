//! Reference database configuration and host organism selection.
//!
//! The configuration file is TOML with a `[databases]` table that maps
//! `{organism}_kraken2_db` and `{organism}_bowtie2_index` keys to paths, and an
//! optional `[tools]` table with executable overrides:
//!
//! ```toml
//! [databases]
//! phix_bowtie2_index = "/refs/phix/phix"
//! human_kraken2_db = "/refs/kraken2/human"
//! human_bowtie2_index = "/refs/bowtie2/GRCh38"
//! dog_kraken2_db = "/refs/kraken2/dog"
//! dog_bowtie2_index = "/refs/bowtie2/canfam4"
//!
//! [tools]
//! fastp = "/opt/fastp/bin/fastp"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::CleanseqError;
use crate::tools::ToolPaths;

/// Default configuration file name, looked up next to the running executable.
pub const CONFIG_FILE_NAME: &str = "cleanseq.toml";

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub databases: BTreeMap<String, PathBuf>,
    pub tools: ToolPaths,
    #[serde(skip)]
    pub source: PathBuf,
}

impl DatabaseConfig {
    /// Reads and parses a configuration file.
    pub fn from_file(path: &Path) -> Result<Self, CleanseqError> {
        if !path.exists() || !path.is_file() {
            return Err(CleanseqError::MissingConfigFile(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let mut config: DatabaseConfig = toml::from_str(&content)?;
        config.source = path.to_path_buf();
        Ok(config)
    }
    /// Loads the explicitly given configuration, or `cleanseq.toml` next to the
    /// running executable. A missing default file yields an empty configuration.
    pub fn locate(explicit: Option<&Path>) -> Result<Self, CleanseqError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        let default = std::env::current_exe()
            .map_err(|err| CleanseqError::ExecutableNotFound(err.to_string()))?
            .with_file_name(CONFIG_FILE_NAME);

        if default.exists() {
            Self::from_file(&default)
        } else {
            log::info!("No configuration file at {}, using defaults", default.display());
            Ok(Self { source: default, ..Default::default() })
        }
    }
    pub fn with_database(mut self, key: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.databases.insert(key.into(), path.into());
        self
    }
    pub fn with_tools(mut self, tools: ToolPaths) -> Self {
        self.tools = tools;
        self
    }
    /// Path configured for `key`.
    ///
    /// # Errors
    ///
    /// * `CleanseqError::MissingConfigKey` if the key is absent.
    pub fn get(&self, key: &str) -> Result<PathBuf, CleanseqError> {
        self.databases
            .get(key)
            .cloned()
            .ok_or_else(|| CleanseqError::MissingConfigKey(key.to_string(), self.source.clone()))
    }
    pub fn kraken2_db(&self, organism: &str) -> Result<PathBuf, CleanseqError> {
        self.get(&format!("{organism}_kraken2_db"))
    }
    pub fn bowtie2_index(&self, organism: &str) -> Result<PathBuf, CleanseqError> {
        self.get(&format!("{organism}_bowtie2_index"))
    }
}

/// Host organisms with built-in configuration keys, plus a custom choice.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostOrganism {
    Dog,
    Cat,
    Rat,
    Mouse,
    Cow,
    Pig,
    Horse,
    Zebrafish,
    Yeast,
    Custom,
}

impl HostOrganism {
    pub const ALL: [HostOrganism; 10] = [
        HostOrganism::Dog,
        HostOrganism::Cat,
        HostOrganism::Rat,
        HostOrganism::Mouse,
        HostOrganism::Cow,
        HostOrganism::Pig,
        HostOrganism::Horse,
        HostOrganism::Zebrafish,
        HostOrganism::Yeast,
        HostOrganism::Custom,
    ];

    /// Prefix of the organism's keys in the `[databases]` table.
    pub fn key(&self) -> &str {
        match self {
            HostOrganism::Dog => "dog",
            HostOrganism::Cat => "cat",
            HostOrganism::Rat => "rat",
            HostOrganism::Mouse => "mouse",
            HostOrganism::Cow => "cow",
            HostOrganism::Pig => "pig",
            HostOrganism::Horse => "horse",
            HostOrganism::Zebrafish => "zebrafish",
            HostOrganism::Yeast => "yeast",
            HostOrganism::Custom => "custom",
        }
    }
    fn choices() -> String {
        Self::ALL.iter().map(|organism| organism.key()).collect::<Vec<_>>().join(", ")
    }
}

impl fmt::Display for HostOrganism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for HostOrganism {
    type Err = CleanseqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .find(|organism| organism.key() == name)
            .copied()
            .ok_or_else(|| CleanseqError::UnsupportedHost(s.to_string(), Self::choices()))
    }
}

/// Classifier database and aligner index used by one stage.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct References {
    pub kraken2_db: Option<PathBuf>,
    pub bowtie2_index: PathBuf,
}

impl References {
    /// References for the host stage.
    ///
    /// Custom hosts take both paths from the command line, every other organism
    /// is looked up in the configuration.
    ///
    /// # Errors
    ///
    /// * `CleanseqError::MissingDatabasePath` if a custom host lacks one of the paths.
    /// * `CleanseqError::MissingConfigKey` if a built-in organism is not configured.
    pub fn for_host(
        organism: HostOrganism,
        custom_kraken2_db: Option<PathBuf>,
        custom_bowtie2_index: Option<PathBuf>,
        config: &DatabaseConfig,
    ) -> Result<Self, CleanseqError> {
        match organism {
            HostOrganism::Custom => {
                let kraken2_db = custom_kraken2_db
                    .ok_or_else(|| CleanseqError::MissingDatabasePath("--db-path-kraken2".to_string()))?;
                let bowtie2_index = custom_bowtie2_index
                    .ok_or_else(|| CleanseqError::MissingDatabasePath("--db-path-bowtie2".to_string()))?;
                Ok(Self { kraken2_db: Some(kraken2_db), bowtie2_index })
            }
            organism => {
                if custom_kraken2_db.is_some() || custom_bowtie2_index.is_some() {
                    log::warn!("Database paths on the command line are only used with `--host custom`, using configured references for {}", organism);
                }
                Ok(Self {
                    kraken2_db: Some(config.kraken2_db(organism.key())?),
                    bowtie2_index: config.bowtie2_index(organism.key())?,
                })
            }
        }
    }
    /// Classifier database and aligner index configured under `name`, e.g. `human`.
    pub fn chained(name: &str, config: &DatabaseConfig) -> Result<Self, CleanseqError> {
        Ok(Self {
            kraken2_db: Some(config.kraken2_db(name)?),
            bowtie2_index: config.bowtie2_index(name)?,
        })
    }
    /// Aligner index configured under `name`, e.g. `phix`.
    pub fn aligner_only(name: &str, config: &DatabaseConfig) -> Result<Self, CleanseqError> {
        Ok(Self { kraken2_db: None, bowtie2_index: config.bowtie2_index(name)? })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
[databases]
phix_bowtie2_index = "/refs/phix/phix"
human_kraken2_db = "/refs/kraken2/human"
human_bowtie2_index = "/refs/bowtie2/GRCh38"
dog_kraken2_db = "/refs/kraken2/dog"
dog_bowtie2_index = "/refs/bowtie2/canfam4"

[tools]
fastp = "/opt/fastp"
"#;

    fn config() -> DatabaseConfig {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, CONFIG).unwrap();
        DatabaseConfig::from_file(&path).unwrap()
    }

    #[test]
    fn parses_databases_and_tools() {
        let config = config();
        assert_eq!(config.bowtie2_index("phix").unwrap(), PathBuf::from("/refs/phix/phix"));
        assert_eq!(config.tools.executable(crate::tools::Tool::Fastp), "/opt/fastp");
    }

    #[test]
    fn missing_key_is_an_error() {
        match config().kraken2_db("cat") {
            Err(CleanseqError::MissingConfigKey(key, _)) => assert_eq!(key, "cat_kraken2_db"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn unknown_config_sections_are_rejected() {
        assert!(toml::from_str::<DatabaseConfig>("[references]\nx = 1\n").is_err());
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let result = DatabaseConfig::from_file(Path::new("/does/not/exist/cleanseq.toml"));
        assert!(matches!(result, Err(CleanseqError::MissingConfigFile(_))));
    }

    #[test]
    fn organisms_parse_case_insensitively() {
        assert_eq!("Zebrafish".parse::<HostOrganism>().unwrap(), HostOrganism::Zebrafish);
        assert_eq!("custom".parse::<HostOrganism>().unwrap(), HostOrganism::Custom);
        assert_eq!(HostOrganism::ALL.len(), 10);
    }

    #[test]
    fn unknown_organism_is_unsupported() {
        match "platypus".parse::<HostOrganism>() {
            Err(CleanseqError::UnsupportedHost(name, choices)) => {
                assert_eq!(name, "platypus");
                assert!(choices.contains("zebrafish"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn builtin_host_resolves_from_config() {
        let references = References::for_host(HostOrganism::Dog, None, None, &config()).unwrap();
        assert_eq!(references.kraken2_db, Some(PathBuf::from("/refs/kraken2/dog")));
        assert_eq!(references.bowtie2_index, PathBuf::from("/refs/bowtie2/canfam4"));
    }

    #[test]
    fn custom_host_requires_both_paths() {
        let config = DatabaseConfig::default();
        let result = References::for_host(HostOrganism::Custom, Some(PathBuf::from("/k2")), None, &config);
        match result {
            Err(CleanseqError::MissingDatabasePath(flag)) => assert_eq!(flag, "--db-path-bowtie2"),
            other => panic!("unexpected result: {:?}", other),
        }
        let result = References::for_host(HostOrganism::Custom, None, Some(PathBuf::from("/bt2")), &config);
        assert!(matches!(result, Err(CleanseqError::MissingDatabasePath(_))));

        let references = References::for_host(HostOrganism::Custom, Some(PathBuf::from("/k2")), Some(PathBuf::from("/bt2")), &config).unwrap();
        assert_eq!(references.bowtie2_index, PathBuf::from("/bt2"));
    }
}
