use ctmt_statstable::util::split_row;
use ctmt_statstable::{create_findings_table, create_statstable, Config, StatsTableError};
use flate2::write::GzEncoder;
use flate2::Compression;

use std::io::Write;
use std::path::Path;

const REGIONS: [(&str, &str); 8] = [
    ("lh_insula_part1", "insula"),
    ("lh_insula_part2", "insula"),
    ("lh_cuneus_part1", "occipital"),
    ("lh_precuneus_part1", "parietal"),
    ("rh_insula_part1", "insula"),
    ("rh_cuneus_part1", "occipital"),
    ("rh_cuneus_part2", "occipital"),
    ("rh_precuneus_part1", "parietal"),
];

const AGES: [f64; 6] = [14.2, 15.9, 17.5, 19.1, 21.8, 24.0];

fn write(path: &Path, content: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

/// A measurement table whose regional values change linearly with age, with a little per-cell jitter.
fn measure_csv(base: f64, rate: f64) -> String {
    let mut csv = String::from("nspn_id,sex,age_scan");
    for (name, _) in REGIONS.iter() {
        csv.push(',');
        csv.push_str(name);
    }
    csv.push('\n');
    for (s, age) in AGES.iter().enumerate() {
        csv.push_str(&format!("{},F,{}", 20001 + s, age));
        for c in 0..REGIONS.len() {
            let jitter = 0.002 * (((s * 7 + c * 3) % 5) as f64 - 2.0);
            csv.push_str(&format!(",{:.5}", base + 0.02 * c as f64 + rate * age + jitter));
        }
        csv.push('\n');
    }
    csv
}

fn edge_list() -> String {
    let edges = [(0, 1), (1, 2), (2, 3), (3, 4), (4, 5), (5, 6), (6, 7), (7, 0), (0, 4), (1, 5), (2, 6), (3, 7)];
    let mut csv = String::from("source,target\n");
    for (a, b) in edges.iter() {
        csv.push_str(&format!("{},{}\n", REGIONS[*a].0, REGIONS[*b].0));
    }
    csv
}

fn cohort_json() -> String {
    let series = |v: [f64; 8]| format!("{:?}", v.to_vec());
    format!(
        r#"{{
  "CT_all_mean": {},
  "MT_projfrac+030_all_mean": {},
  "CT_all_slope_age": {},
  "MT_projfrac+030_all_slope_age": {},
  "CT_global_slope_age": -0.0142, "CT_global_slope_age_r": -0.52, "CT_global_slope_age_p_perm": 0.0,
  "MTall_global_slope_age": 0.0031, "MTall_global_slope_age_r": 0.31, "MTall_global_slope_age_p_perm": 0.002,
  "MT_projfrac+030_global_slope_age": 0.0043, "MT_projfrac+030_global_slope_age_r": 0.37, "MT_projfrac+030_global_slope_age_p_perm": 0.0,
  "MTall_global_slope_ct": -0.12, "MTall_global_slope_ct_r": -0.2, "MTall_global_slope_ct_p_perm": 0.04,
  "MT_projfrac+030_global_slope_ct": -0.18, "MT_projfrac+030_global_slope_ct_r": -0.29, "MT_projfrac+030_global_slope_ct_p_perm": 0.001
}}"#,
        series([2.1, 2.4, 2.6, 2.8, 3.0, 3.1, 3.3, 3.5]),
        series([1100.0, 1050.0, 1020.0, 980.0, 950.0, 930.0, 900.0, 870.0]),
        series([-0.01, -0.02, 0.005, -0.015, -0.03, 0.002, -0.025, -0.04]),
        series([0.002, 0.004, -0.001, 0.003, 0.005, 0.001, 0.006, -0.002]),
    )
}

/// Lay out a complete set of pipeline inputs below `root` and return the configuration file.
fn demo_inputs(root: &Path) -> std::path::PathBuf {
    let header = "# generated by mris_anatomical_stats\n# 500 parcellation\n";
    let names: String = REGIONS.iter().map(|(n, _)| format!("{}\n", n)).collect();
    let lobes: String = REGIONS.iter().map(|(_, l)| format!("{}\n", l)).collect();
    write(&root.join("fsaverage/parcellation/500.names.txt"), &format!("{}{}", header, names));
    write(&root.join("fsaverage/parcellation/500.lobes.txt"), &format!("{}{}", header, lobes));

    write(&root.join("data/ct.csv"), &measure_csv(3.0, -0.015));
    write(&root.join("data/mt.csv"), &measure_csv(0.8, 0.002));
    let mut gz = GzEncoder::new(Vec::new(), Compression::default());
    gz.write_all(measure_csv(0.9, 0.004).as_bytes()).unwrap();
    std::fs::write(root.join("data/mt70.csv.gz"), gz.finish().unwrap()).unwrap();

    write(&root.join("graphs/Graph_CT_covar_ones_all_COST_10.csv"), &edge_list());
    write(&root.join("data/discovery.json"), &cohort_json());
    write(&root.join("data/validation.json"), &cohort_json());

    let config = format!(
        r#"
[paths]
data_dir = "{root}/data"
graph_dir = "{root}/graphs"
table_dir = "{root}/tables"
fsaverage_dir = "{root}/fsaverage"
paper_dir = "{root}/paper"

[files]
ct_data = "ct.csv"
mt_data = "mt.csv"
mt70_data = "mt70.csv.gz"

[parcellation]
header_rows = 2

[stats]
n_permutations = 200
seed = 11
n_random_graphs = 2
swaps_per_edge = 5

[cohorts.VALIDATION]
measures = "validation.json"
graphs = {{ CT_covar_ones_all_COST_10 = "Graph_CT_covar_ones_all_COST_10.csv" }}

[cohorts.DISCOVERY]
measures = "discovery.json"
graphs = {{ CT_covar_ones_all_COST_10 = "Graph_CT_covar_ones_all_COST_10.csv" }}
"#,
        root = root.display()
    );
    let path = root.join("ctmt.toml");
    write(&path, &config);
    path
}

fn read_rows(path: &Path) -> Vec<Vec<String>> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(split_row)
        .collect()
}

#[test]
fn the_region_tables_can_be_created() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    std::fs::create_dir_all(root.join("tables")).unwrap();
    let config = Config::from_file(demo_inputs(&root)).unwrap();

    let written = create_statstable(&config).unwrap();
    assert_eq!(3, written.len());
    assert_eq!(root.join("tables/308_regions.csv"), written[0]);
    assert_eq!(root.join("tables/68_regions.csv"), written[1]);
    assert_eq!(root.join("tables/34_regions.csv"), written[2]);

    let fine = read_rows(&written[0]);
    assert_eq!(1 + REGIONS.len(), fine.len());
    assert_eq!(vec!["Lobe", "Region", "Hemisphere"], fine[0][0..3].to_vec());
    assert!(fine.iter().all(|row| row.len() == 18));
    assert_eq!(vec!["insula", "insula_part1", "lh"], fine[1][0..3].to_vec());
    // CT thins with age, MT rises
    assert!(fine[1][4].starts_with('-'));
    assert!(!fine[1][7].starts_with('-'));
    // every node of the ring with chords has degree 3
    assert!(fine[1..].iter().all(|row| row[17] == "3.0"));

    let medium = read_rows(&written[1]);
    assert_eq!(7, medium.len());
    assert_eq!(vec!["insula", "insula", "lh"], medium[1][0..3].to_vec());
    assert_eq!("2", medium[1][16]);

    let coarse = read_rows(&written[2]);
    assert_eq!(4, coarse.len());
    assert!(coarse.iter().all(|row| row.len() == 17));
    let regions: Vec<&str> = coarse[1..].iter().map(|row| row[1].as_str()).collect();
    assert_eq!(vec!["insula", "cuneus", "precuneus"], regions);
    // cuneus pools lh_cuneus_part1, rh_cuneus_part1 and rh_cuneus_part2, never the precuneus
    assert_eq!("3", coarse[2][15]);
    assert_eq!("2", coarse[3][15]);
}

#[test]
fn the_findings_table_can_be_created() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    std::fs::create_dir_all(root.join("paper")).unwrap();
    let config = Config::from_file(demo_inputs(&root)).unwrap();

    let path = create_findings_table(&config).unwrap();
    assert_eq!(root.join("paper/Table1.txt"), path);

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(16, lines.len());
    assert_eq!("Finding,DISCOVERY,VALIDATION", lines[0]);
    assert!(lines[1].starts_with("Regional variations in CT and MT correlate inversely,r_sq = "));
    assert_eq!(
        "CT decreases with age,r_sq = 0.27, P < 0.001, beta = -0.0142,r_sq = 0.27, P < 0.001, beta = -0.0142",
        lines[2]
    );
    assert!(lines[15].starts_with("Structural covariance network: assortative;"));
    assert!(lines[15].contains("sigma = "));
}

#[test]
fn missing_inputs_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    let config = Config::from_file(demo_inputs(&root)).unwrap();
    std::fs::remove_file(root.join("data/mt.csv")).unwrap();

    match create_statstable(&config) {
        Err(StatsTableError::MissingFile(p)) => assert_eq!(root.join("data/mt.csv"), p),
        other => panic!("unexpected result: {:?}", other),
    }
}
