//! Configuration of input/output locations and statistics settings.
//!
//! All sections are optional in the TOML file; anything left out falls back to the file layout of the
//! CT/MT analysis pipeline.

use quick_error::ResultExt;
use serde::{Deserialize, Serialize};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Result, StatsTableError};
use crate::stats::PermutationTest;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub files: FilesConfig,

    #[serde(default)]
    pub columns: ColumnsConfig,

    #[serde(default)]
    pub parcellation: ParcellationConfig,

    #[serde(default)]
    pub stats: StatsConfig,

    /// Per-cohort inputs of the findings table, keyed (and therefore sorted) by cohort name.
    #[serde(default)]
    pub cohorts: BTreeMap<String, CohortConfig>,
}

/// Directories the pipeline reads from and writes to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_dir")]
    pub graph_dir: PathBuf,
    #[serde(default = "default_dir")]
    pub table_dir: PathBuf,
    #[serde(default = "default_dir")]
    pub fsaverage_dir: PathBuf,
    #[serde(default = "default_dir")]
    pub paper_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_dir(),
            graph_dir: default_dir(),
            table_dir: default_dir(),
            fsaverage_dir: default_dir(),
            paper_dir: default_dir(),
        }
    }
}

fn default_dir() -> PathBuf {
    PathBuf::from(".")
}

/// File names, relative to the directories in [`PathsConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesConfig {
    /// Cortical thickness table, in `data_dir`.
    #[serde(default = "default_ct_data")]
    pub ct_data: String,
    /// Magnetization transfer averaged over all depths, in `data_dir`.
    #[serde(default = "default_mt_data")]
    pub mt_data: String,
    /// Magnetization transfer at 70% cortical depth, in `data_dir`.
    #[serde(default = "default_mt70_data")]
    pub mt70_data: String,
    /// Structural covariance graph edge list, in `graph_dir`.
    #[serde(default = "default_ct_graph")]
    pub ct_graph: String,
    /// Region names, in `fsaverage_dir`.
    #[serde(default = "default_names")]
    pub names: String,
    /// Lobe of each region, in `fsaverage_dir`.
    #[serde(default = "default_lobes")]
    pub lobes: String,
    /// Narrative findings table, in `paper_dir`.
    #[serde(default = "default_findings_table")]
    pub findings_table: String,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            ct_data: default_ct_data(),
            mt_data: default_mt_data(),
            mt70_data: default_mt70_data(),
            ct_graph: default_ct_graph(),
            names: default_names(),
            lobes: default_lobes(),
            findings_table: default_findings_table(),
        }
    }
}

fn default_ct_data() -> String {
    "PARC_500aparc_thickness_behavmerge.csv".to_string()
}

fn default_mt_data() -> String {
    "SEG_MT_500cortConsec_mean_behavmerge.csv".to_string()
}

fn default_mt70_data() -> String {
    "PARC_500aparc_MT_projfrac+030_mean_behavmerge.csv".to_string()
}

fn default_ct_graph() -> String {
    "Graph_CT_covar_ones_all_COST_10.csv".to_string()
}

fn default_names() -> String {
    "parcellation/500.names.txt".to_string()
}

fn default_lobes() -> String {
    "parcellation/500.lobes.txt".to_string()
}

fn default_findings_table() -> String {
    "Table1.txt".to_string()
}

/// Names of the non-region columns of the measurement tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnsConfig {
    #[serde(default = "default_subject_id")]
    pub subject_id: String,
    #[serde(default = "default_age")]
    pub age: String,
}

impl Default for ColumnsConfig {
    fn default() -> Self {
        Self {
            subject_id: default_subject_id(),
            age: default_age(),
        }
    }
}

fn default_subject_id() -> String {
    "nspn_id".to_string()
}

fn default_age() -> String {
    "age_scan".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParcellationConfig {
    /// Number of lines at the top of the names and lobes files that are not regions.
    #[serde(default = "default_header_rows")]
    pub header_rows: usize,
}

impl Default for ParcellationConfig {
    fn default() -> Self {
        Self {
            header_rows: default_header_rows(),
        }
    }
}

fn default_header_rows() -> usize {
    41
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Label shuffles per permutation test.
    #[serde(default = "default_n_permutations")]
    pub n_permutations: usize,
    /// Seed of the random number generators, so that tables are reproducible.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Random graphs generated as the null of each network measure.
    #[serde(default = "default_n_random_graphs")]
    pub n_random_graphs: usize,
    /// Double edge swaps per edge when rewiring a random graph.
    #[serde(default = "default_swaps_per_edge")]
    pub swaps_per_edge: usize,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            n_permutations: default_n_permutations(),
            seed: default_seed(),
            n_random_graphs: default_n_random_graphs(),
            swaps_per_edge: default_swaps_per_edge(),
        }
    }
}

fn default_n_permutations() -> usize {
    1000
}

fn default_seed() -> u64 {
    2718
}

fn default_n_random_graphs() -> usize {
    3
}

fn default_swaps_per_edge() -> usize {
    10
}

impl StatsConfig {
    pub fn permutation_test(&self) -> PermutationTest {
        PermutationTest {
            n_permutations: self.n_permutations,
            seed: self.seed,
        }
    }
}

/// Pre-computed statistics and graphs of one cohort.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CohortConfig {
    /// JSON file mapping measure names to values or per-region series.
    pub measures: PathBuf,
    /// Edge list files keyed by graph name.
    #[serde(default)]
    pub graphs: BTreeMap<String, PathBuf>,
}

impl Config {
    /// Load a configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Config> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(StatsTableError::MissingFile(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).context(path)?;
        let config: Config = toml::from_str(&content).context(path)?;
        Ok(config)
    }

    /// The default configuration as TOML text.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Config::default()).unwrap_or_default()
    }

    pub fn ct_data_file(&self) -> PathBuf {
        self.paths.data_dir.join(&self.files.ct_data)
    }

    pub fn mt_data_file(&self) -> PathBuf {
        self.paths.data_dir.join(&self.files.mt_data)
    }

    pub fn mt70_data_file(&self) -> PathBuf {
        self.paths.data_dir.join(&self.files.mt70_data)
    }

    pub fn ct_graph_file(&self) -> PathBuf {
        self.paths.graph_dir.join(&self.files.ct_graph)
    }

    pub fn names_file(&self) -> PathBuf {
        self.paths.fsaverage_dir.join(&self.files.names)
    }

    pub fn lobes_file(&self) -> PathBuf {
        self.paths.fsaverage_dir.join(&self.files.lobes)
    }

    pub fn findings_table_file(&self) -> PathBuf {
        self.paths.paper_dir.join(&self.files.findings_table)
    }
}
