//! Utility functions used in all other statstable modules.

use flate2::bufread::GzDecoder;
use quick_error::ResultExt;

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::error::{Result, StatsTableError};

/// The separator between the fields of one table row.
pub const FIELD_SEPARATOR: &str = ",";

/// Check whether the file extension ends with ".gz".
pub fn is_gz_file<P>(path: P) -> bool
where
    P: AsRef<Path>,
{
    path.as_ref()
        .file_name()
        .map(|a| a.to_string_lossy().ends_with(".gz"))
        .unwrap_or(false)
}

/// Open an input file for buffered reading.
///
/// Fails with [`StatsTableError::MissingFile`] if the path does not exist. If the file's name ends with ".gz", the
/// content is transparently GZip decoded.
pub fn open_input<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(StatsTableError::MissingFile(path.to_path_buf()));
    }
    let file = BufReader::new(File::open(path).context(path)?);
    if is_gz_file(path) {
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(file))
    }
}

/// Read all lines of a text file, trimmed, dropping the first `skip` lines.
pub fn read_lines<P: AsRef<Path>>(path: P, skip: usize) -> Result<Vec<String>> {
    let path = path.as_ref();
    let input = open_input(path)?;
    let mut lines = Vec::new();
    for line in input.lines().skip(skip) {
        lines.push(line.context(path)?.trim().to_string());
    }
    Ok(lines)
}

/// Join the fields of one row, rejecting fields that would not survive a split on the separator.
pub fn join_fields<S: AsRef<str>>(fields: &[S]) -> Result<String> {
    if let Some(bad) = fields.iter().find(|f| f.as_ref().contains(FIELD_SEPARATOR)) {
        return Err(StatsTableError::MalformedField(bad.as_ref().to_string()));
    }
    Ok(fields
        .iter()
        .map(|f| f.as_ref())
        .collect::<Vec<&str>>()
        .join(FIELD_SEPARATOR))
}

/// Split a row written by [`join_fields`] back into its fields.
pub fn split_row(line: &str) -> Vec<String> {
    line.trim_end_matches('\n')
        .split(FIELD_SEPARATOR)
        .map(String::from)
        .collect()
}

/// Create (or truncate) a table file and write the header row.
pub fn create_with_header<P: AsRef<Path>, S: AsRef<str>>(path: P, header: &[S]) -> Result<()> {
    let path = path.as_ref();
    let line = join_fields(header)?;
    let mut file = File::create(path).context(path)?;
    writeln!(file, "{}", line).context(path)?;
    Ok(())
}

/// Append one row to a table file. Fields must not contain the separator.
pub fn append_row<P: AsRef<Path>, S: AsRef<str>>(path: P, fields: &[S]) -> Result<()> {
    let line = join_fields(fields)?;
    append_raw_line(path.as_ref(), &line)
}

/// Append the comma-joined fields as one line, without checking the fields for embedded separators.
///
/// Used for free text tables whose statistic fields contain commas themselves.
pub fn append_line<P: AsRef<Path>, S: AsRef<str>>(path: P, fields: &[S]) -> Result<()> {
    let line = fields
        .iter()
        .map(|f| f.as_ref())
        .collect::<Vec<&str>>()
        .join(FIELD_SEPARATOR);
    append_raw_line(path.as_ref(), &line)
}

fn append_raw_line(path: &Path, line: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .context(path)?;
    writeln!(file, "{}", line).context(path)?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Read;
    use tempfile::tempdir;

    #[test]
    fn gz_files_are_detected_by_name() {
        assert!(is_gz_file("data/PARC_500aparc_thickness_behavmerge.csv.gz"));
        assert!(!is_gz_file("data/PARC_500aparc_thickness_behavmerge.csv"));
        assert!(!is_gz_file("data/"));
    }

    #[test]
    fn missing_input_files_are_reported_with_their_path() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("500.names.txt");
        match open_input(&missing) {
            Err(StatsTableError::MissingFile(p)) => assert_eq!(p, missing),
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("expected an error"),
        }
    }

    #[test]
    fn header_lines_are_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("names.txt");
        std::fs::write(&path, "hdr1\nhdr2\n lh_bankssts_part1 \nrh_bankssts_part1\n").unwrap();
        let lines = read_lines(&path, 2).unwrap();
        assert_eq!(lines, vec!["lh_bankssts_part1", "rh_bankssts_part1"]);
    }

    #[test]
    fn fields_with_commas_are_rejected() {
        let res = join_fields(&["frontal", "r_sq = 0.10, p = 0.200"]);
        assert!(matches!(res, Err(StatsTableError::MalformedField(_))));
    }

    #[test]
    fn written_rows_split_back_into_the_same_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("308_regions.csv");
        let header = ["Lobe", "Region", "Hemisphere"];
        let row = vec![
            String::from("temporal"),
            String::from("bankssts_part1"),
            String::from("lh"),
            String::from("2.51 (0.20)"),
            String::from("< 0.001"),
        ];
        create_with_header(&path, &header).unwrap();
        append_row(&path, &row).unwrap();
        append_row(&path, &row).unwrap();

        let mut content = String::new();
        File::open(&path).unwrap().read_to_string(&mut content).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(3, lines.len());
        assert_eq!(split_row(lines[0]), header.to_vec());
        assert_eq!(split_row(lines[1]), row);
        assert_eq!(split_row(lines[2]), row);
    }
}
