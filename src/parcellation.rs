//! Cortical parcellation bookkeeping: region names, their lobes, and the three granularities at which the
//! region tables are reported.
//!
//! The fine grained parcellation has 308 regions of roughly equal area, obtained by sub-dividing the 68
//! Desikan-Killiany regions. A region name encodes the hemisphere, the Desikan-Killiany label and the index of
//! the sub-parcel, e.g. `lh_bankssts_part1`.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crate::error::{Result, StatsTableError};
use crate::util::read_lines;

/// The hemisphere tokens, in reporting order.
pub const HEMISPHERES: [&str; 2] = ["lh", "rh"];

/// Suffix of the first sub-parcel of each Desikan-Killiany region.
pub const FIRST_PARCEL_SUFFIX: &str = "part1";

/// The level of anatomical detail of a region table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Granularity {
    /// All 308 sub-parcels, each reported on its own.
    Fine,
    /// The 68 Desikan-Killiany regions, averaged over sub-parcels within a hemisphere.
    Medium,
    /// The 34 Desikan-Killiany labels, averaged over sub-parcels and both hemispheres.
    Coarse,
}

impl Granularity {
    /// All granularities, in the order the tables are written.
    pub const ALL: [Granularity; 3] = [Granularity::Fine, Granularity::Medium, Granularity::Coarse];

    /// The number of regions at this granularity.
    pub fn n(&self) -> usize {
        match self {
            Granularity::Fine => 308,
            Granularity::Medium => 68,
            Granularity::Coarse => 34,
        }
    }

    pub fn from_n(n: usize) -> Result<Granularity> {
        match n {
            308 => Ok(Granularity::Fine),
            68 => Ok(Granularity::Medium),
            34 => Ok(Granularity::Coarse),
            _ => Err(StatsTableError::UnknownGranularity(n)),
        }
    }

    /// Whether rows at this granularity carry a hemisphere column.
    pub fn has_hemisphere(&self) -> bool {
        *self != Granularity::Coarse
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "n={}", self.n())
    }
}

/// A parsed fine grained region name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionName {
    pub hemi: String,
    pub label: String,
    /// Sub-parcel token, e.g. `part3`. Absent for plain Desikan-Killiany names.
    pub parcel: Option<String>,
}

impl RegionName {
    /// Parse a name of the form `<hemi>_<label>[_<parcel>]`.
    pub fn parse(name: &str) -> Result<RegionName> {
        let mut tokens = name.splitn(3, '_');
        let hemi = tokens.next().unwrap_or("");
        let label = tokens.next().unwrap_or("");
        if hemi.is_empty() || label.is_empty() {
            return Err(StatsTableError::InvalidRegionName(name.to_string()));
        }
        Ok(RegionName {
            hemi: hemi.to_string(),
            label: label.to_string(),
            parcel: tokens.next().map(String::from),
        })
    }

    /// The name without its hemisphere, e.g. `bankssts_part1`.
    pub fn without_hemi(&self) -> String {
        match &self.parcel {
            Some(parcel) => format!("{}_{}", self.label, parcel),
            None => self.label.clone(),
        }
    }
}

/// The rows of one region table line before any statistics are added.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionGroup {
    pub lobe: String,
    /// Display name of the region.
    pub region: String,
    /// Hemisphere, absent when both hemispheres are pooled.
    pub hemi: Option<String>,
    /// All fine grained regions averaged into this row.
    pub sub_rois: Vec<String>,
}

impl RegionGroup {
    /// The leading text fields of the table row: lobe, region and, if present, hemisphere.
    pub fn display_fields(&self) -> Vec<String> {
        let mut fields = vec![self.lobe.clone(), self.region.clone()];
        if let Some(hemi) = &self.hemi {
            fields.push(hemi.clone());
        }
        fields
    }
}

/// The ordered list of fine grained regions together with their lobes.
#[derive(Debug, Clone)]
pub struct Parcellation {
    names: Vec<String>,
    lobes: Vec<String>,
    parsed: Vec<RegionName>,
    index: HashMap<String, usize>,
}

impl Parcellation {
    /// Build a parcellation from index-aligned name and lobe lists.
    pub fn new(names: Vec<String>, lobes: Vec<String>) -> Result<Parcellation> {
        if names.len() != lobes.len() {
            return Err(StatsTableError::RegionMismatch(format!(
                "{} region names but {} lobes",
                names.len(),
                lobes.len()
            )));
        }
        let mut index = HashMap::with_capacity(names.len());
        let mut parsed = Vec::with_capacity(names.len());
        for (idx, name) in names.iter().enumerate() {
            parsed.push(RegionName::parse(name)?);
            if index.insert(name.clone(), idx).is_some() {
                return Err(StatsTableError::RegionMismatch(format!("duplicate region name '{}'", name)));
            }
        }
        Ok(Parcellation {
            names,
            lobes,
            parsed,
            index,
        })
    }

    /// Read the region names and lobes files, skipping `header_rows` lines at the top of each.
    pub fn from_files<P: AsRef<Path>, Q: AsRef<Path>>(names_file: P, lobes_file: Q, header_rows: usize) -> Result<Parcellation> {
        let names = read_lines(names_file, header_rows)?;
        let lobes = read_lines(lobes_file, header_rows)?;
        Parcellation::new(names, lobes)
    }

    /// All fine grained region names, in file order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Position of a region in the name list.
    pub fn position(&self, name: &str) -> Result<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| StatsTableError::RegionMismatch(format!("unknown region '{}'", name)))
    }

    /// The representative regions to loop over for a table: every region for [`Granularity::Fine`], the first
    /// sub-parcel of each region for [`Granularity::Medium`] and only the left hemisphere ones of those for
    /// [`Granularity::Coarse`].
    pub fn roi_list(&self, granularity: Granularity) -> Vec<&str> {
        self.names
            .iter()
            .zip(self.parsed.iter())
            .filter(|(name, parsed)| match granularity {
                Granularity::Fine => true,
                Granularity::Medium => name.ends_with(FIRST_PARCEL_SUFFIX),
                Granularity::Coarse => name.ends_with(FIRST_PARCEL_SUFFIX) && parsed.hemi == HEMISPHERES[0],
            })
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// The display fields and the sub-regions to average over for the row of `roi`.
    pub fn create_lists(&self, roi: &str, granularity: Granularity) -> Result<RegionGroup> {
        let idx = self.position(roi)?;
        let lobe = self.lobes[idx].clone();
        let parsed = &self.parsed[idx];

        let group = match granularity {
            Granularity::Fine => RegionGroup {
                lobe,
                region: parsed.without_hemi(),
                hemi: Some(parsed.hemi.clone()),
                sub_rois: vec![roi.to_string()],
            },
            Granularity::Medium => RegionGroup {
                lobe,
                region: parsed.label.clone(),
                hemi: Some(parsed.hemi.clone()),
                sub_rois: self.matching(|r| r.label == parsed.label && r.hemi == parsed.hemi),
            },
            Granularity::Coarse => RegionGroup {
                lobe,
                region: parsed.label.clone(),
                hemi: None,
                sub_rois: self.matching(|r| r.label == parsed.label),
            },
        };
        Ok(group)
    }

    fn matching<F>(&self, predicate: F) -> Vec<String>
    where
        F: Fn(&RegionName) -> bool,
    {
        self.names
            .iter()
            .zip(self.parsed.iter())
            .filter(|(_, parsed)| predicate(*parsed))
            .map(|(name, _)| name.clone())
            .collect()
    }
}
