//! Regional measurement tables: one row per subject, one column per region (and a few subject level
//! columns such as the scan age).

use csv::ReaderBuilder;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use quick_error::ResultExt;

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Result, StatsTableError};
use crate::util::open_input;

/// The numeric columns of a measurement CSV file, keyed by subject.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasureTable {
    pub path: PathBuf,
    pub subject_ids: Vec<String>,
    pub column_names: Vec<String>,
    /// Subjects along axis 0, columns along axis 1.
    pub data: Array2<f64>,
    index: HashMap<String, usize>,
}

impl MeasureTable {
    /// Build a table from in-memory values. `data` must have one row per subject and one column per name.
    pub fn new(subject_ids: Vec<String>, column_names: Vec<String>, data: Array2<f64>) -> Result<MeasureTable> {
        if data.nrows() != subject_ids.len() || data.ncols() != column_names.len() {
            return Err(StatsTableError::RegionMismatch(format!(
                "table of shape {:?} for {} subjects and {} columns",
                data.shape(),
                subject_ids.len(),
                column_names.len()
            )));
        }
        let index = column_names
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), idx))
            .collect();
        Ok(MeasureTable {
            path: PathBuf::new(),
            subject_ids,
            column_names,
            data,
            index,
        })
    }

    /// Read the subject id column and the requested numeric columns of a CSV file.
    ///
    /// Other columns in the file are ignored. A requested column that is not in the header is an error naming the
    /// file, as is a cell that cannot be parsed as a number. Empty cells are read as NaN.
    pub fn from_file<P: AsRef<Path>>(path: P, subject_column: &str, value_columns: &[String]) -> Result<MeasureTable> {
        let path = path.as_ref();
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(open_input(path)?);

        let header: HashMap<String, usize> = rdr
            .headers()
            .context(path)?
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.to_string(), idx))
            .collect();

        let lookup = |name: &str| {
            header
                .get(name)
                .copied()
                .ok_or_else(|| StatsTableError::MissingColumn(path.to_path_buf(), name.to_string()))
        };
        let id_idx = lookup(subject_column)?;
        let value_idx = value_columns
            .iter()
            .map(|c| lookup(c))
            .collect::<Result<Vec<usize>>>()?;

        let mut subject_ids = Vec::new();
        let mut values: Vec<f64> = Vec::new();
        for (row, record) in rdr.records().enumerate() {
            let record = record.context(path)?;
            subject_ids.push(record.get(id_idx).unwrap_or("").to_string());
            for (col, &idx) in value_idx.iter().enumerate() {
                let cell = record.get(idx).unwrap_or("");
                values.push(parse_cell(cell).ok_or_else(|| {
                    StatsTableError::InvalidValue(path.to_path_buf(), row + 1, value_columns[col].clone(), cell.to_string())
                })?);
            }
        }

        let mut data = Array2::zeros((subject_ids.len(), value_columns.len()));
        for (cell, value) in data.iter_mut().zip(values) {
            *cell = value;
        }
        let mut table = MeasureTable::new(subject_ids, value_columns.to_vec(), data)?;
        table.path = path.to_path_buf();
        Ok(table)
    }

    /// The number of subjects.
    pub fn len(&self) -> usize {
        self.subject_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subject_ids.is_empty()
    }

    fn column_index(&self, name: &str) -> Result<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| StatsTableError::MissingColumn(self.path.clone(), name.to_string()))
    }

    /// The values of one column, in subject order.
    pub fn column(&self, name: &str) -> Result<ArrayView1<f64>> {
        Ok(self.data.column(self.column_index(name)?))
    }

    /// The sub-table of the given columns, subjects along axis 0.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Array2<f64>> {
        let idx = names
            .iter()
            .map(|n| self.column_index(n.as_ref()))
            .collect::<Result<Vec<usize>>>()?;
        Ok(self.data.select(Axis(1), &idx))
    }

    /// The per-subject mean across the given columns, skipping missing (NaN) cells. A subject without any value
    /// stays NaN. A single column is returned as is.
    pub fn row_mean<S: AsRef<str>>(&self, names: &[S]) -> Result<Array1<f64>> {
        if names.is_empty() {
            return Err(StatsTableError::InsufficientData(String::from("no columns to average")));
        }
        if names.len() == 1 {
            return Ok(self.column(names[0].as_ref())?.to_owned());
        }
        let block = self.select(names)?;
        Ok(block
            .axis_iter(Axis(0))
            .map(|row| {
                let (sum, n) = row
                    .iter()
                    .filter(|v| !v.is_nan())
                    .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
                if n == 0 {
                    f64::NAN
                } else {
                    sum / n as f64
                }
            })
            .collect())
    }

    /// Row pairs of subjects present in both tables, in the subject order of `self`.
    pub fn inner_join(&self, other: &MeasureTable) -> Vec<(usize, usize)> {
        let other_rows: HashMap<&str, usize> = other
            .subject_ids
            .iter()
            .enumerate()
            .map(|(idx, id)| (id.as_str(), idx))
            .collect();
        self.subject_ids
            .iter()
            .enumerate()
            .filter_map(|(idx, id)| other_rows.get(id.as_str()).map(|&o| (idx, o)))
            .collect()
    }

    /// Per-subject means of `names` in `self` and in `other`, restricted to the subjects of both tables.
    pub fn paired_row_means<S: AsRef<str>>(&self, other: &MeasureTable, names: &[S]) -> Result<(Array1<f64>, Array1<f64>)> {
        let pairs = self.inner_join(other);
        let mine = self.row_mean(names)?;
        let theirs = other.row_mean(names)?;
        let x = pairs.iter().map(|&(i, _)| mine[i]).collect();
        let y = pairs.iter().map(|&(_, j)| theirs[j]).collect();
        Ok((x, y))
    }
}

impl fmt::Display for MeasureTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Measurement table '{}' with {} subjects and {} columns.",
            self.path.display(),
            self.len(),
            self.column_names.len()
        )
    }
}

fn parse_cell(cell: &str) -> Option<f64> {
    if cell.is_empty() {
        return Some(f64::NAN);
    }
    cell.parse::<f64>().ok()
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use tempfile::tempdir;

    fn names(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn a_measure_csv_can_be_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("PARC_500aparc_thickness_behavmerge.csv");
        std::fs::write(
            &path,
            "nspn_id,sex,age_scan,lh_bankssts_part1,lh_bankssts_part2\n\
             10001,M,14.5,2.5,2.7\n\
             10002,F,19.0,2.3,\n\
             10003,F,22.1,2.1,2.4\n",
        )
        .unwrap();

        let cols = names(&["age_scan", "lh_bankssts_part1", "lh_bankssts_part2"]);
        let table = MeasureTable::from_file(&path, "nspn_id", &cols).unwrap();

        assert_eq!(3, table.len());
        assert_eq!(vec!["10001", "10002", "10003"], table.subject_ids);
        assert_eq!(&[3, 3], table.data.shape());
        assert_abs_diff_eq!(19.0, table.column("age_scan").unwrap()[1]);
        assert!(table.column("lh_bankssts_part2").unwrap()[1].is_nan());
        assert!(table.column("sex").is_err());
    }

    #[test]
    fn missing_columns_name_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mt.csv");
        std::fs::write(&path, "nspn_id,age_scan\n10001,14.5\n").unwrap();

        match MeasureTable::from_file(&path, "nspn_id", &names(&["lh_insula_part1"])) {
            Err(StatsTableError::MissingColumn(p, c)) => {
                assert_eq!(path, p);
                assert_eq!("lh_insula_part1", c);
            }
            other => panic!("unexpected result: {:?}", other.map(|t| t.len())),
        }
    }

    #[test]
    fn unparsable_cells_are_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mt.csv");
        std::fs::write(&path, "nspn_id,age_scan\n10001,old\n").unwrap();
        let res = MeasureTable::from_file(&path, "nspn_id", &names(&["age_scan"]));
        assert!(matches!(res, Err(StatsTableError::InvalidValue(_, 1, _, _))));
    }

    #[test]
    fn row_means_average_across_columns() {
        let table = MeasureTable::new(
            names(&["a", "b", "c"]),
            names(&["r1", "r2"]),
            array![[1.0, 3.0], [2.0, 4.0], [0.0, 0.5]],
        )
        .unwrap();

        assert_eq!(array![2.0, 3.0, 0.25], table.row_mean(&["r1", "r2"]).unwrap());
        assert_eq!(array![1.0, 2.0, 0.0], table.row_mean(&["r1"]).unwrap());
        assert!(table.row_mean(&["r3"]).is_err());
    }

    #[test]
    fn row_means_skip_missing_cells() {
        let table = MeasureTable::new(
            names(&["a", "b"]),
            names(&["r1", "r2"]),
            array![[1.0, f64::NAN], [f64::NAN, f64::NAN]],
        )
        .unwrap();
        let means = table.row_mean(&["r1", "r2"]).unwrap();
        assert_eq!(1.0, means[0]);
        assert!(means[1].is_nan());
    }

    #[test]
    fn tables_are_joined_on_subject_id() {
        let ct = MeasureTable::new(names(&["a", "b", "c"]), names(&["r1"]), array![[1.0], [2.0], [3.0]]).unwrap();
        let mt = MeasureTable::new(names(&["c", "a"]), names(&["r1"]), array![[30.0], [10.0]]).unwrap();

        assert_eq!(vec![(0, 1), (2, 0)], ct.inner_join(&mt));
        let (x, y) = ct.paired_row_means(&mt, &["r1"]).unwrap();
        assert_eq!(array![1.0, 3.0], x);
        assert_eq!(array![10.0, 30.0], y);
    }
}
