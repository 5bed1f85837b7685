//! The per-region tables at 308, 68 and 34 regions.
//!
//! Each row reports, for one region: the mean (SD) of cortical thickness (CT), magnetization transfer
//! averaged over cortical depths (MTall) and at 70% depth (MT70), the change of each with age, the relation of CT
//! to both MT measures, the number of fine grained regions averaged into the row and their mean degree in the
//! structural covariance network.

use ndarray::ArrayView1;
use tracing::{debug, info, warn};

use std::path::PathBuf;

use crate::config::Config;
use crate::error::Result;
use crate::measures::MeasureTable;
use crate::network::CovarianceGraph;
use crate::parcellation::{Granularity, Parcellation};
use crate::stats::{format_mean_std, mean_std, CorrelationSummary, PermutationTest};
use crate::util::{append_row, create_with_header};

/// Column titles of the region tables. `Hemisphere` is dropped at [`Granularity::Coarse`].
pub const HEADER: [&str; 18] = [
    "Lobe",
    "Region",
    "Hemisphere",
    "Mean CT (SD)",
    "Slope CT with age (x10-3)",
    "perm_p",
    "Mean MTall (SD)",
    "Slope MTall with age (x10-3)",
    "perm_p",
    "Mean MT70 (SD)",
    "Slope MT70 with age (x10-3)",
    "perm_p",
    "Slope CT with MTall",
    "perm_p",
    "Slope CT with MT70",
    "perm_p",
    "N Sub Regions",
    "Degree",
];

/// The number of fine grained regions the tables are designed for.
pub const EXPECTED_REGIONS: usize = 308;

/// Everything the region tables are computed from, read once up front.
#[derive(Debug, Clone)]
pub struct TableContext {
    pub parcellation: Parcellation,
    pub ct: MeasureTable,
    pub mt: MeasureTable,
    pub mt70: MeasureTable,
    pub graph: CovarianceGraph,
    /// Name of the scan age column, present in all three tables.
    pub age_column: String,
    pub permutation: PermutationTest,
    pub table_dir: PathBuf,
}

impl TableContext {
    /// The output file of the table at `granularity`.
    pub fn table_file(&self, granularity: Granularity) -> PathBuf {
        self.table_dir.join(format!("{}_regions.csv", granularity.n()))
    }

    fn measures(&self) -> [&MeasureTable; 3] {
        [&self.ct, &self.mt, &self.mt70]
    }
}

/// Read the region lists, the three measurement tables and the covariance graph named in `config`.
///
/// Every region must be a column of every table and a node of the graph.
pub fn setup_table_data(config: &Config) -> Result<TableContext> {
    let parcellation = Parcellation::from_files(config.names_file(), config.lobes_file(), config.parcellation.header_rows)?;
    if parcellation.len() != EXPECTED_REGIONS {
        warn!(
            "Expected {} regions in '{}', found {}",
            EXPECTED_REGIONS,
            config.names_file().display(),
            parcellation.len()
        );
    }

    let age_column = config.columns.age.clone();
    let mut columns = vec![age_column.clone()];
    columns.extend(parcellation.names().iter().cloned());

    let subject_id = &config.columns.subject_id;
    let ct = MeasureTable::from_file(config.ct_data_file(), subject_id, &columns)?;
    let mt = MeasureTable::from_file(config.mt_data_file(), subject_id, &columns)?;
    let mt70 = MeasureTable::from_file(config.mt70_data_file(), subject_id, &columns)?;
    info!("Loaded {}", ct);
    info!("Loaded {}", mt);
    info!("Loaded {}", mt70);

    let graph = CovarianceGraph::from_file(config.ct_graph_file(), parcellation.names())?;
    info!("Loaded {}", graph);

    Ok(TableContext {
        parcellation,
        ct,
        mt,
        mt70,
        graph,
        age_column,
        permutation: config.stats.permutation_test(),
        table_dir: config.paths.table_dir.clone(),
    })
}

/// The header row at `granularity`.
pub fn header(granularity: Granularity) -> Vec<&'static str> {
    HEADER
        .iter()
        .copied()
        .filter(|&h| granularity.has_hemisphere() || h != "Hemisphere")
        .collect()
}

/// Append "mean (SD)" of the `sub_rois` columns of `table`.
pub fn append_mean_std(row: &mut Vec<String>, table: &MeasureTable, sub_rois: &[String]) -> Result<()> {
    let (mean, sd) = mean_std(&table.select(sub_rois)?)?;
    row.push(format_mean_std(mean, sd));
    Ok(())
}

/// Append the slope and permutation p of y regressed on x.
pub fn append_correlation(
    row: &mut Vec<String>,
    x: ArrayView1<f64>,
    y: ArrayView1<f64>,
    test: &PermutationTest,
    mul1000: bool,
) -> Result<()> {
    let result = test.permutation_correlation(x, y)?;
    let summary = CorrelationSummary::new(&result, mul1000);
    row.push(summary.slope_field());
    row.push(summary.p_field());
    Ok(())
}

/// Append the mean degree of the `sub_rois` graph nodes.
pub fn append_degree(row: &mut Vec<String>, graph: &CovarianceGraph, sub_rois: &[String]) -> Result<()> {
    row.push(format!("{:2.1}", graph.mean_degree(sub_rois)?));
    Ok(())
}

/// All fields of the table row of `roi`.
pub fn table_row(ctx: &TableContext, roi: &str, granularity: Granularity) -> Result<Vec<String>> {
    let group = ctx.parcellation.create_lists(roi, granularity)?;
    let sub_rois = &group.sub_rois;
    let mut row = group.display_fields();

    for table in ctx.measures().iter() {
        append_mean_std(&mut row, table, sub_rois)?;
        let age = table.column(&ctx.age_column)?;
        let values = table.row_mean(sub_rois)?;
        append_correlation(&mut row, age, values.view(), &ctx.permutation, true)?;
    }

    for mt_table in [&ctx.mt, &ctx.mt70].iter() {
        let (ct_values, mt_values) = ctx.ct.paired_row_means(mt_table, sub_rois)?;
        append_correlation(&mut row, ct_values.view(), mt_values.view(), &ctx.permutation, true)?;
    }

    row.push(format!("{}", sub_rois.len()));
    append_degree(&mut row, &ctx.graph, sub_rois)?;

    debug!("{} row for {}: {}", granularity, roi, row.join(" | "));
    Ok(row)
}

/// Write the region table at `granularity`, replacing any previous file. Returns the file written.
pub fn write_table(ctx: &TableContext, granularity: Granularity) -> Result<PathBuf> {
    let path = ctx.table_file(granularity);
    create_with_header(&path, &header(granularity))?;
    for roi in ctx.parcellation.roi_list(granularity) {
        let row = table_row(ctx, roi, granularity)?;
        append_row(&path, &row)?;
    }
    Ok(path)
}

/// Read the inputs named in `config` and write all three region tables.
pub fn create_statstable(config: &Config) -> Result<Vec<PathBuf>> {
    info!("Setting up table data");
    let ctx = setup_table_data(config)?;
    let mut written = Vec::with_capacity(Granularity::ALL.len());
    for granularity in Granularity::ALL.iter() {
        info!("Making table {}", granularity);
        written.push(write_table(&ctx, *granularity)?);
    }
    Ok(written)
}
