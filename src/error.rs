use quick_error::quick_error;
use std::io::Error as IOError;
use std::path::{Path, PathBuf};

quick_error! {
    /// Error type for all error variants originated by this crate.
    #[derive(Debug)]
    pub enum StatsTableError {
        /// I/O Error
        Io(err: IOError) {
            from()
            source(err)
            display("I/O error: {}", err)
        }

        /// I/O error on a known file.
        FileIo(path: PathBuf, err: IOError) {
            context(path: &'a Path, err: IOError) -> (path.to_path_buf(), err)
            source(err)
            display("I/O error on '{}': {}", path.display(), err)
        }

        /// An input file that the pipeline needs does not exist.
        MissingFile(path: PathBuf) {
            display("Missing input file: '{}'", path.display())
        }

        Csv(path: PathBuf, err: csv::Error) {
            context(path: &'a Path, err: csv::Error) -> (path.to_path_buf(), err)
            source(err)
            display("Invalid CSV file '{}': {}", path.display(), err)
        }

        Json(path: PathBuf, err: serde_json::Error) {
            context(path: &'a Path, err: serde_json::Error) -> (path.to_path_buf(), err)
            source(err)
            display("Invalid JSON file '{}': {}", path.display(), err)
        }

        Config(path: PathBuf, err: toml::de::Error) {
            context(path: &'a Path, err: toml::de::Error) -> (path.to_path_buf(), err)
            source(err)
            display("Invalid config file '{}': {}", path.display(), err)
        }

        /// A region name that is not of the form `<hemi>_<label>[_<parcel>]`.
        InvalidRegionName(name: String) {
            display("Invalid region name '{}'", name)
        }

        /// Region names, lobes, measurement tables and graph disagree.
        RegionMismatch(msg: String) {
            display("Inconsistent regions: {}", msg)
        }

        MissingColumn(path: PathBuf, column: String) {
            display("Column '{}' not found in '{}'", column, path.display())
        }

        MissingMeasure(cohort: String, key: String) {
            display("Measure '{}' not found for cohort '{}'", key, cohort)
        }

        /// A scalar measure was found where a series was needed, or vice versa.
        MeasureKind(cohort: String, key: String, expected: &'static str) {
            display("Measure '{}' of cohort '{}' is not a {}", key, cohort, expected)
        }

        InvalidValue(path: PathBuf, row: usize, column: String, value: String) {
            display("Invalid value '{}' in column '{}', row {} of '{}'", value, column, row, path.display())
        }

        /// Not enough usable observations to fit a regression.
        InsufficientData(msg: String) {
            display("Insufficient data for regression: {}", msg)
        }

        UnknownGranularity(n: usize) {
            display("Unsupported granularity n={}, expected 308, 68 or 34", n)
        }

        /// A table field contains the field separator.
        MalformedField(field: String) {
            display("Table field '{}' contains a comma", field)
        }
    }
}

/// Alias type for results originated from this crate.
pub type Result<T> = ::std::result::Result<T, StatsTableError>;
