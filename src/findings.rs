//! The findings table: one line per scientific finding, giving a short description followed by the supporting
//! statistic for every cohort, cohorts in name order.
//!
//! The per-cohort statistics are computed upstream and read from one JSON file per cohort, mapping a measure name
//! either to a number (e.g. `CT_global_slope_age`, `CT_global_slope_age_r`, `CT_global_slope_age_p_perm`) or to
//! a per-region series (e.g. `CT_all_mean`).

use ndarray::Array1;
use quick_error::ResultExt;
use serde::Deserialize;
use tracing::{debug, info, warn};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{Result, StatsTableError};
use crate::network::{calculate_network_measures, CovarianceGraph, NullModel};
use crate::parcellation::Parcellation;
use crate::stats::{format_r_p_m, CorrelationSummary, PermutationTest};
use crate::util::{append_line, create_with_header, open_input};

/// The cell of a correlation that leaves too few usable values to fit.
pub const NOT_AVAILABLE: &str = "n/a";

/// A pre-computed statistic: a single number or one number per region.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum MeasureValue {
    Scalar(f64),
    Series(Vec<f64>),
}

/// The named statistics of one cohort.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CohortMeasures {
    pub cohort: String,
    pub values: BTreeMap<String, MeasureValue>,
}

impl CohortMeasures {
    pub fn from_file<P: AsRef<Path>>(cohort: &str, path: P) -> Result<CohortMeasures> {
        let path = path.as_ref();
        let values: BTreeMap<String, MeasureValue> = serde_json::from_reader(open_input(path)?).context(path)?;
        Ok(CohortMeasures {
            cohort: cohort.to_string(),
            values,
        })
    }

    fn get(&self, key: &str) -> Result<&MeasureValue> {
        self.values
            .get(key)
            .ok_or_else(|| StatsTableError::MissingMeasure(self.cohort.clone(), key.to_string()))
    }

    pub fn scalar(&self, key: &str) -> Result<f64> {
        match self.get(key)? {
            MeasureValue::Scalar(v) => Ok(*v),
            MeasureValue::Series(_) => Err(StatsTableError::MeasureKind(self.cohort.clone(), key.to_string(), "number")),
        }
    }

    pub fn series(&self, key: &str) -> Result<&[f64]> {
        match self.get(key)? {
            MeasureValue::Series(v) => Ok(v),
            MeasureValue::Scalar(_) => Err(StatsTableError::MeasureKind(self.cohort.clone(), key.to_string(), "series")),
        }
    }
}

/// Statistics and named graphs of one cohort.
#[derive(Debug, Clone, Default)]
pub struct CohortData {
    pub measures: CohortMeasures,
    pub graphs: BTreeMap<String, CovarianceGraph>,
}

/// All cohorts plus the settings of the tests run on them.
#[derive(Debug, Clone)]
pub struct FindingsContext {
    /// Keyed by cohort name, so iteration is in sorted order.
    pub cohorts: BTreeMap<String, CohortData>,
    pub permutation: PermutationTest,
    pub null: NullModel,
}

/// Exclusive bounds on the x and y values entering a correlation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Thresholds {
    pub x_upper: Option<f64>,
    pub x_lower: Option<f64>,
    pub y_upper: Option<f64>,
    pub y_lower: Option<f64>,
}

impl Thresholds {
    pub fn keeps(&self, x: f64, y: f64) -> bool {
        self.x_upper.map_or(true, |t| x < t)
            && self.x_lower.map_or(true, |t| x > t)
            && self.y_upper.map_or(true, |t| y < t)
            && self.y_lower.map_or(true, |t| y > t)
    }
}

/// A regression of one per-region series on another.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationFinding {
    pub text: String,
    pub x_key: String,
    pub y_key: String,
    pub thresholds: Thresholds,
    /// Divide y by 1000 before thresholding and fitting.
    pub div1000: bool,
    /// Multiply the reported slope by 1000.
    pub mul1000: bool,
}

impl CorrelationFinding {
    pub fn new(text: &str, x_key: &str, y_key: &str) -> CorrelationFinding {
        CorrelationFinding {
            text: text.to_string(),
            x_key: x_key.to_string(),
            y_key: y_key.to_string(),
            thresholds: Thresholds::default(),
            div1000: false,
            mul1000: false,
        }
    }
}

/// A slope, correlation and permutation p stored under `key`, `key_r` and `key_p_perm`.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueFinding {
    pub text: String,
    pub key: String,
    /// Decimals of the slope, 1 to 4; anything else prints the slope without decimals.
    pub dp: usize,
}

/// Global topology of a named graph against random graphs.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkFinding {
    pub text: String,
    pub graph_key: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Finding {
    Correlation(CorrelationFinding),
    Value(ValueFinding),
    Network(NetworkFinding),
}

impl Finding {
    pub fn text(&self) -> &str {
        match self {
            Finding::Correlation(f) => &f.text,
            Finding::Value(f) => &f.text,
            Finding::Network(f) => &f.text,
        }
    }

    /// The description followed by the statistic of every cohort.
    pub fn row(&self, ctx: &FindingsContext) -> Result<Vec<String>> {
        match self {
            Finding::Correlation(f) => write_corr_result_row(ctx, f),
            Finding::Value(f) => write_value_result_row(ctx, f),
            Finding::Network(f) => write_network_result_row(ctx, f),
        }
    }
}

/// Regress `y_key` on `x_key` for every cohort, after optional rescaling and masking.
///
/// A cohort whose masked series cannot be fitted (fewer than 3 values, a constant or missing value) gets
/// [`NOT_AVAILABLE`] and the rest of the row is still written.
pub fn write_corr_result_row(ctx: &FindingsContext, finding: &CorrelationFinding) -> Result<Vec<String>> {
    let mut row = vec![finding.text.clone()];
    for (name, cohort) in ctx.cohorts.iter() {
        let x = cohort.measures.series(&finding.x_key)?;
        let y = cohort.measures.series(&finding.y_key)?;
        if x.len() != y.len() {
            return Err(StatsTableError::RegionMismatch(format!(
                "cohort '{}': {} has {} values but {} has {}",
                name,
                finding.x_key,
                x.len(),
                finding.y_key,
                y.len()
            )));
        }

        let (xs, ys): (Vec<f64>, Vec<f64>) = x
            .iter()
            .zip(y.iter())
            .map(|(&a, &b)| (a, if finding.div1000 { b / 1000.0 } else { b }))
            .filter(|&(a, b)| finding.thresholds.keeps(a, b))
            .unzip();
        debug!("{}: {} of {} values pass the thresholds", name, xs.len(), x.len());

        let (xs, ys) = (Array1::from(xs), Array1::from(ys));
        match ctx.permutation.permutation_correlation(xs.view(), ys.view()) {
            Ok(result) => row.push(CorrelationSummary::new(&result, finding.mul1000).render()),
            Err(StatsTableError::InsufficientData(msg)) => {
                warn!("'{}' for cohort {} cannot be fitted: {}", finding.text, name, msg);
                row.push(String::from(NOT_AVAILABLE));
            }
            Err(e) => return Err(e),
        }
    }
    Ok(row)
}

/// Report the stored slope, correlation and permutation p of `key` for every cohort.
pub fn write_value_result_row(ctx: &FindingsContext, finding: &ValueFinding) -> Result<Vec<String>> {
    let mut row = vec![finding.text.clone()];
    for cohort in ctx.cohorts.values() {
        let m = cohort.measures.scalar(&finding.key)?;
        let r = cohort.measures.scalar(&format!("{}_r", finding.key))?;
        let perm_p = cohort.measures.scalar(&format!("{}_p_perm", finding.key))?;
        row.push(format_r_p_m(r, perm_p, m, finding.dp));
    }
    Ok(row)
}

/// Report the global network measures of the graph `graph_key` for every cohort.
pub fn write_network_result_row(ctx: &FindingsContext, finding: &NetworkFinding) -> Result<Vec<String>> {
    let mut row = vec![finding.text.clone()];
    for (name, cohort) in ctx.cohorts.iter() {
        let graph = cohort
            .graphs
            .get(&finding.graph_key)
            .ok_or_else(|| StatsTableError::MissingMeasure(name.clone(), finding.graph_key.clone()))?;
        let measures = calculate_network_measures(&graph.graph, &ctx.null);
        row.push(
            measures
                .iter()
                .map(|m| m.to_string())
                .collect::<Vec<String>>()
                .join(", "),
        );
    }
    Ok(row)
}

/// Start a findings table: `Finding` followed by the cohort names.
pub fn write_stats_table_header<P: AsRef<Path>>(path: P, ctx: &FindingsContext) -> Result<()> {
    let mut header = vec![String::from("Finding")];
    header.extend(ctx.cohorts.keys().cloned());
    create_with_header(path, &header)
}

/// Append one finding row. The statistics contain commas themselves, so the row is not checked for them.
pub fn write_stats_table_list<P: AsRef<Path>>(path: P, row: &[String]) -> Result<()> {
    append_line(path, row)
}

fn corr(text: &str, x_key: &str, y_key: &str, thresholds: Thresholds, div1000: bool, mul1000: bool) -> Finding {
    Finding::Correlation(CorrelationFinding {
        thresholds,
        div1000,
        mul1000,
        ..CorrelationFinding::new(text, x_key, y_key)
    })
}

fn value(text: &str, key: &str, dp: usize) -> Finding {
    Finding::Value(ValueFinding {
        text: text.to_string(),
        key: key.to_string(),
        dp,
    })
}

/// The findings reported in Table 1 of the CT/MT paper, in order.
pub fn table1_findings() -> Vec<Finding> {
    let none = Thresholds::default();
    let y_below_zero = Thresholds {
        y_upper: Some(0.0),
        ..Thresholds::default()
    };
    let y_above_zero = Thresholds {
        y_lower: Some(0.0),
        ..Thresholds::default()
    };
    let not_thinning = "(more strongly when you exclude regions that aren't thinning)";

    vec![
        corr(
            "Regional variations in CT and MT correlate inversely",
            "CT_all_mean",
            "MT_projfrac+030_all_mean",
            none,
            true,
            false,
        ),
        value("CT decreases with age", "CT_global_slope_age", 4),
        value("MT increases with age;", "MTall_global_slope_age", 2),
        value("most strongly at 70% cortical depth", "MT_projfrac+030_global_slope_age", 2),
        value("Thinner cortex has higher MT;", "MTall_global_slope_ct", 2),
        value("most strongly at 70% cortical depth", "MT_projfrac+030_global_slope_ct", 2),
        corr(
            "Regional change in CT with age not dependent on mean CT",
            "CT_all_mean",
            "CT_all_slope_age",
            none,
            false,
            true,
        ),
        corr(
            "(unless you exclude regions that aren't thinning, then thicker cortex thins more)",
            "CT_all_mean",
            "CT_all_slope_age",
            y_below_zero,
            false,
            true,
        ),
        corr(
            "Regional change in MT with age weakly dependent on mean CT: thinner cortex myelinates more",
            "CT_all_mean",
            "MT_projfrac+030_all_slope_age",
            none,
            false,
            false,
        ),
        corr(not_thinning, "CT_all_mean", "MT_projfrac+030_all_slope_age", y_above_zero, false, false),
        corr(
            "Regional change in MT with age weakly dependent on mean MT: less myelinated cortex myelinates more",
            "MT_projfrac+030_all_mean",
            "MT_projfrac+030_all_slope_age",
            none,
            false,
            true,
        ),
        corr(
            not_thinning,
            "MT_projfrac+030_all_mean",
            "MT_projfrac+030_all_slope_age",
            y_above_zero,
            false,
            true,
        ),
        corr(
            "Regional change in CT with age weakly dependent on mean MT: less myelinated cortex myelinates more",
            "MT_projfrac+030_all_mean",
            "CT_all_slope_age",
            none,
            false,
            true,
        ),
        corr(not_thinning, "MT_projfrac+030_all_mean", "CT_all_slope_age", y_below_zero, false, true),
        Finding::Network(NetworkFinding {
            text: String::from(
                "Structural covariance network: assortative; modular; clustered; longer average path lengths; \
                 lower global efficiency; small world",
            ),
            graph_key: String::from("CT_covar_ones_all_COST_10"),
        }),
    ]
}

/// Load the cohorts named in `config`. Relative measure files are resolved against the data directory and
/// relative graph files against the graph directory. Graph nodes are the regions of the parcellation.
pub fn setup_findings_data(config: &Config) -> Result<FindingsContext> {
    let parcellation = Parcellation::from_files(config.names_file(), config.lobes_file(), config.parcellation.header_rows)?;
    let mut cohorts = BTreeMap::new();
    for (name, cohort) in config.cohorts.iter() {
        let measures = CohortMeasures::from_file(name, config.paths.data_dir.join(&cohort.measures))?;
        let mut graphs = BTreeMap::new();
        for (key, path) in cohort.graphs.iter() {
            let path = config.paths.graph_dir.join(path);
            graphs.insert(key.clone(), CovarianceGraph::from_file(path, parcellation.names())?);
        }
        info!("Loaded {} measures and {} graphs for cohort {}", measures.values.len(), graphs.len(), name);
        cohorts.insert(name.clone(), CohortData { measures, graphs });
    }
    Ok(FindingsContext {
        cohorts,
        permutation: config.stats.permutation_test(),
        null: NullModel {
            n_random: config.stats.n_random_graphs,
            swaps_per_edge: config.stats.swaps_per_edge,
            seed: config.stats.seed,
        },
    })
}

/// Write the header and the rows of `findings` to `path`.
pub fn write_findings_table<P: AsRef<Path>>(path: P, ctx: &FindingsContext, findings: &[Finding]) -> Result<()> {
    let path = path.as_ref();
    write_stats_table_header(path, ctx)?;
    for finding in findings {
        debug!("Finding: {}", finding.text());
        let row = finding.row(ctx)?;
        write_stats_table_list(path, &row)?;
    }
    Ok(())
}

/// Read the cohorts named in `config` and write the Table 1 findings. Returns the file written.
pub fn create_findings_table(config: &Config) -> Result<PathBuf> {
    info!("Setting up findings data");
    let ctx = setup_findings_data(config)?;
    let path = config.findings_table_file();
    info!("Making findings table for {} cohorts", ctx.cohorts.len());
    write_findings_table(&path, &ctx, &table1_findings())?;
    Ok(path)
}
