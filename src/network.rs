//! The structural covariance network: loading it, looking up node degrees by region name, and the global
//! topology measures reported in the findings table.
//!
//! Nodes are addressed by region name, never by position, so a reordered name list cannot silently shift the
//! degrees onto the wrong regions.

use csv::ReaderBuilder;
use petgraph::algo::dijkstra;
use petgraph::graph::{NodeIndex, UnGraph};
use quick_error::ResultExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::Path;

use crate::error::{Result, StatsTableError};
use crate::util::open_input;

/// An undirected graph whose nodes are the fine grained regions.
#[derive(Debug, Clone)]
pub struct CovarianceGraph {
    pub graph: UnGraph<String, ()>,
    nodes: HashMap<String, NodeIndex>,
}

impl CovarianceGraph {
    /// Build a graph with one node per region name, in order, and the given edges between named regions.
    ///
    /// Self loops are dropped and repeated edges are stored once.
    pub fn from_edges<I, S>(names: &[String], edges: I) -> Result<CovarianceGraph>
    where
        I: IntoIterator<Item = (S, S)>,
        S: AsRef<str>,
    {
        let mut graph = UnGraph::with_capacity(names.len(), 0);
        let mut nodes = HashMap::with_capacity(names.len());
        for name in names {
            let node = graph.add_node(name.clone());
            if nodes.insert(name.clone(), node).is_some() {
                return Err(StatsTableError::RegionMismatch(format!("duplicate graph node '{}'", name)));
            }
        }
        let mut cg = CovarianceGraph { graph, nodes };
        for (source, target) in edges {
            let a = cg.node(source.as_ref())?;
            let b = cg.node(target.as_ref())?;
            if a != b {
                cg.graph.update_edge(a, b, ());
            }
        }
        Ok(cg)
    }

    /// Read a CSV edge list with a `source,target` header of region names.
    pub fn from_file<P: AsRef<Path>>(path: P, names: &[String]) -> Result<CovarianceGraph> {
        let path = path.as_ref();
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(open_input(path)?);
        let mut edges = Vec::new();
        for record in rdr.records() {
            let record = record.context(path)?;
            match (record.get(0), record.get(1)) {
                (Some(s), Some(t)) => edges.push((s.to_string(), t.to_string())),
                _ => {
                    return Err(StatsTableError::RegionMismatch(format!(
                        "edge list '{}' has a row with fewer than two regions",
                        path.display()
                    )))
                }
            }
        }
        let cg = CovarianceGraph::from_edges(names, edges)?;
        debug!("Read {}", cg);
        Ok(cg)
    }

    pub fn node(&self, name: &str) -> Result<NodeIndex> {
        self.nodes
            .get(name)
            .copied()
            .ok_or_else(|| StatsTableError::RegionMismatch(format!("region '{}' is not a graph node", name)))
    }

    pub fn degree(&self, name: &str) -> Result<usize> {
        Ok(self.graph.neighbors(self.node(name)?).count())
    }

    /// The mean degree over the given regions.
    pub fn mean_degree<S: AsRef<str>>(&self, names: &[S]) -> Result<f64> {
        if names.is_empty() {
            return Err(StatsTableError::InsufficientData(String::from("no regions for mean degree")));
        }
        let total = names
            .iter()
            .map(|n| self.degree(n.as_ref()))
            .sum::<Result<usize>>()?;
        Ok(total as f64 / names.len() as f64)
    }
}

impl fmt::Display for CovarianceGraph {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Covariance graph with {} regions and {} edges.",
            self.graph.node_count(),
            self.graph.edge_count()
        )
    }
}

/// Sorted, deduplicated neighbour lists by node position.
fn adjacency<N, E>(graph: &UnGraph<N, E>) -> Vec<Vec<usize>> {
    graph
        .node_indices()
        .map(|n| {
            let mut nb: Vec<usize> = graph.neighbors(n).map(|m| m.index()).filter(|&m| m != n.index()).collect();
            nb.sort_unstable();
            nb.dedup();
            nb
        })
        .collect()
}

/// Degree assortativity: the Pearson correlation of the degrees at either end of an edge.
pub fn degree_assortativity<N, E>(graph: &UnGraph<N, E>) -> f64 {
    let adj = adjacency(graph);
    let (mut sum_jk, mut sum_half, mut sum_half_sq, mut m) = (0.0, 0.0, 0.0, 0.0);
    for (u, nb) in adj.iter().enumerate() {
        for &v in nb.iter().filter(|&&v| v > u) {
            let j = adj[u].len() as f64;
            let k = adj[v].len() as f64;
            sum_jk += j * k;
            sum_half += 0.5 * (j + k);
            sum_half_sq += 0.5 * (j * j + k * k);
            m += 1.0;
        }
    }
    if m == 0.0 {
        return f64::NAN;
    }
    let mean_half = sum_half / m;
    (sum_jk / m - mean_half * mean_half) / (sum_half_sq / m - mean_half * mean_half)
}

/// Mean of the local clustering coefficients; nodes with fewer than two neighbours count as 0.
pub fn average_clustering<N, E>(graph: &UnGraph<N, E>) -> f64 {
    let adj = adjacency(graph);
    if adj.is_empty() {
        return 0.0;
    }
    let sets: Vec<HashSet<usize>> = adj.iter().map(|nb| nb.iter().copied().collect()).collect();
    let total: f64 = adj
        .iter()
        .map(|nb| {
            let k = nb.len();
            if k < 2 {
                return 0.0;
            }
            let mut triangles = 0usize;
            for (i, &a) in nb.iter().enumerate() {
                triangles += nb[i + 1..].iter().filter(|&&b| sets[a].contains(&b)).count();
            }
            2.0 * triangles as f64 / (k * (k - 1)) as f64
        })
        .sum();
    total / adj.len() as f64
}

/// Characteristic path length (mean over connected node pairs) and global efficiency (mean inverse distance over
/// all node pairs).
pub fn path_length_and_efficiency<N, E>(graph: &UnGraph<N, E>) -> (f64, f64) {
    let n = graph.node_count();
    if n < 2 {
        return (0.0, 0.0);
    }
    let (mut dist_sum, mut inv_sum, mut reachable) = (0.0, 0.0, 0usize);
    for start in graph.node_indices() {
        let dist = dijkstra(graph, start, None, |_| 1usize);
        for (&node, &d) in dist.iter() {
            if node != start {
                dist_sum += d as f64;
                inv_sum += 1.0 / d as f64;
                reachable += 1;
            }
        }
    }
    let pairs = (n * (n - 1)) as f64;
    let path_length = if reachable == 0 { f64::NAN } else { dist_sum / reachable as f64 };
    (path_length, inv_sum / pairs)
}

/// Modularity of the community partition found by the Louvain method.
pub fn modularity<N, E>(graph: &UnGraph<N, E>) -> f64 {
    let adj = adjacency(graph);
    let partition = louvain(&adj);
    partition_modularity(&adj, &partition)
}

/// Newman modularity of an assignment of nodes to communities.
pub fn partition_modularity(adj: &[Vec<usize>], partition: &[usize]) -> f64 {
    let two_m: f64 = adj.iter().map(|nb| nb.len() as f64).sum();
    if two_m == 0.0 {
        return 0.0;
    }
    let mut internal: HashMap<usize, f64> = HashMap::new();
    let mut degree: HashMap<usize, f64> = HashMap::new();
    for (u, nb) in adj.iter().enumerate() {
        *degree.entry(partition[u]).or_insert(0.0) += nb.len() as f64;
        for &v in nb {
            if partition[u] == partition[v] {
                // each internal edge is seen from both ends
                *internal.entry(partition[u]).or_insert(0.0) += 1.0;
            }
        }
    }
    degree
        .iter()
        .map(|(c, d)| internal.get(c).copied().unwrap_or(0.0) / two_m - (d / two_m).powi(2))
        .sum()
}

/// Weighted adjacency of a Louvain level; a self loop appears once in its own list and holds the weight of the
/// edges inside the collapsed community.
type WeightedAdjacency = Vec<Vec<(usize, f64)>>;

/// Community of every node, found by repeated local moving and aggregation.
fn louvain(adj: &[Vec<usize>]) -> Vec<usize> {
    let mut level: WeightedAdjacency = adj
        .iter()
        .map(|nb| nb.iter().map(|&v| (v, 1.0)).collect())
        .collect();
    let mut partition: Vec<usize> = (0..adj.len()).collect();

    loop {
        let (communities, improved) = local_moving(&level);
        if !improved {
            break;
        }
        let (renumbered, n_communities) = renumber(&communities);
        for c in partition.iter_mut() {
            *c = renumbered[*c];
        }
        level = aggregate(&level, &renumbered, n_communities);
    }
    partition
}

fn local_moving(level: &WeightedAdjacency) -> (Vec<usize>, bool) {
    let n = level.len();
    let degree: Vec<f64> = level
        .iter()
        .enumerate()
        .map(|(u, nb)| nb.iter().map(|&(v, w)| if v == u { 2.0 * w } else { w }).sum())
        .collect();
    let two_m: f64 = degree.iter().sum();
    let mut community: Vec<usize> = (0..n).collect();
    if two_m == 0.0 {
        return (community, false);
    }
    let mut total = degree.clone();

    let mut improved = false;
    let mut moved = true;
    while moved {
        moved = false;
        for u in 0..n {
            let current = community[u];
            let mut links: BTreeMap<usize, f64> = BTreeMap::new();
            for &(v, w) in level[u].iter().filter(|&&(v, _)| v != u) {
                *links.entry(community[v]).or_insert(0.0) += w;
            }
            total[current] -= degree[u];

            let gain = |c: usize, w: f64| w - total[c] * degree[u] / two_m;
            let mut best = current;
            let mut best_gain = gain(current, links.get(&current).copied().unwrap_or(0.0));
            for (&c, &w) in links.iter() {
                let g = gain(c, w);
                if g > best_gain + 1e-12 {
                    best = c;
                    best_gain = g;
                }
            }

            total[best] += degree[u];
            if best != current {
                community[u] = best;
                moved = true;
                improved = true;
            }
        }
    }
    (community, improved)
}

/// Relabel communities onto 0..k, returning the new label of every node and k.
fn renumber(communities: &[usize]) -> (Vec<usize>, usize) {
    let mut mapping = vec![usize::MAX; communities.len()];
    let mut next = 0;
    for &c in communities {
        if mapping[c] == usize::MAX {
            mapping[c] = next;
            next += 1;
        }
    }
    (communities.iter().map(|&c| mapping[c]).collect(), next)
}

fn aggregate(level: &WeightedAdjacency, community: &[usize], n_communities: usize) -> WeightedAdjacency {
    let mut weights: BTreeMap<(usize, usize), f64> = BTreeMap::new();
    for (u, nb) in level.iter().enumerate() {
        for &(v, w) in nb.iter().filter(|&&(v, _)| v >= u) {
            let (a, b) = (community[u], community[v]);
            *weights.entry((a.min(b), a.max(b))).or_insert(0.0) += w;
        }
    }
    let mut next: WeightedAdjacency = vec![Vec::new(); n_communities];
    for ((a, b), w) in weights {
        next[a].push((b, w));
        if a != b {
            next[b].push((a, w));
        }
    }
    next
}

/// A degree preserving randomisation of `graph` by double edge swaps.
///
/// Performs `swaps_per_edge` successful swaps per edge, or gives up after 100 times as many attempts.
pub fn random_rewire<N, E, R: Rng>(graph: &UnGraph<N, E>, swaps_per_edge: usize, rng: &mut R) -> UnGraph<(), ()> {
    let n = graph.node_count();
    let mut edges: Vec<(usize, usize)> = Vec::new();
    for (u, nb) in adjacency(graph).iter().enumerate() {
        edges.extend(nb.iter().filter(|&&v| v > u).map(|&v| (u, v)));
    }
    let mut present: HashSet<(usize, usize)> = edges.iter().copied().collect();
    let key = |a: usize, b: usize| (a.min(b), a.max(b));

    if edges.len() >= 2 {
        let n_swaps = swaps_per_edge * edges.len();
        let max_tries = n_swaps * 100;
        let (mut done, mut tries) = (0, 0);
        while done < n_swaps && tries < max_tries {
            tries += 1;
            let i = rng.gen_range(0..edges.len());
            let j = rng.gen_range(0..edges.len());
            if i == j {
                continue;
            }
            let (u, v) = edges[i];
            let (mut x, mut y) = edges[j];
            if rng.gen::<bool>() {
                std::mem::swap(&mut x, &mut y);
            }
            // u-v, x-y  ->  u-x, v-y
            if u == x || v == y || present.contains(&key(u, x)) || present.contains(&key(v, y)) {
                continue;
            }
            present.remove(&key(u, v));
            present.remove(&key(x, y));
            present.insert(key(u, x));
            present.insert(key(v, y));
            edges[i] = key(u, x);
            edges[j] = key(v, y);
            done += 1;
        }
    }

    let mut random = UnGraph::with_capacity(n, edges.len());
    for _ in 0..n {
        random.add_node(());
    }
    random.extend_with_edges(edges.iter().map(|&(a, b)| (a as u32, b as u32)));
    random
}

/// Settings of the random graph null model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NullModel {
    pub n_random: usize,
    pub swaps_per_edge: usize,
    pub seed: u64,
}

/// One global network measure and its value averaged over the random graphs.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkMeasure {
    pub name: &'static str,
    pub observed: f64,
    pub random: f64,
}

impl fmt::Display for NetworkMeasure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} = {:2.2} (random = {:2.2})", self.name, self.observed, self.random)
    }
}

struct GlobalMeasures {
    a: f64,
    m: f64,
    c: f64,
    l: f64,
    e: f64,
}

fn global_measures<N, E>(graph: &UnGraph<N, E>) -> GlobalMeasures {
    let (l, e) = path_length_and_efficiency(graph);
    GlobalMeasures {
        a: degree_assortativity(graph),
        m: modularity(graph),
        c: average_clustering(graph),
        l,
        e,
    }
}

/// Assortativity `a`, modularity `M`, clustering `C`, path length `L`, efficiency `E` and small-worldness
/// `sigma`, each next to its mean over `null.n_random` rewired graphs.
pub fn calculate_network_measures<N, E>(graph: &UnGraph<N, E>, null: &NullModel) -> Vec<NetworkMeasure> {
    let observed = global_measures(graph);

    let mut rng = StdRng::seed_from_u64(null.seed);
    let randoms: Vec<GlobalMeasures> = (0..null.n_random)
        .map(|_| global_measures(&random_rewire(graph, null.swaps_per_edge, &mut rng)))
        .collect();
    let mean = |f: fn(&GlobalMeasures) -> f64| {
        if randoms.is_empty() {
            f64::NAN
        } else {
            randoms.iter().map(f).sum::<f64>() / randoms.len() as f64
        }
    };
    let (a_rand, m_rand, c_rand, l_rand, e_rand) = (
        mean(|g: &GlobalMeasures| g.a),
        mean(|g: &GlobalMeasures| g.m),
        mean(|g: &GlobalMeasures| g.c),
        mean(|g: &GlobalMeasures| g.l),
        mean(|g: &GlobalMeasures| g.e),
    );
    let sigma = (observed.c / c_rand) / (observed.l / l_rand);

    vec![
        NetworkMeasure { name: "a", observed: observed.a, random: a_rand },
        NetworkMeasure { name: "M", observed: observed.m, random: m_rand },
        NetworkMeasure { name: "C", observed: observed.c, random: c_rand },
        NetworkMeasure { name: "L", observed: observed.l, random: l_rand },
        NetworkMeasure { name: "E", observed: observed.e, random: e_rand },
        NetworkMeasure { name: "sigma", observed: sigma, random: 1.0 },
    ]
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("lh_region{}_part1", i)).collect()
    }

    /// Two triangles joined by a single edge.
    fn two_triangles() -> UnGraph<(), ()> {
        UnGraph::from_edges(&[(0, 1), (1, 2), (0, 2), (3, 4), (4, 5), (3, 5), (2, 3)])
    }

    #[test]
    fn degrees_are_looked_up_by_region_name() {
        let n = names(4);
        let edges = vec![
            (n[0].as_str(), n[1].as_str()),
            (n[0].as_str(), n[2].as_str()),
            (n[1].as_str(), n[0].as_str()),
            (n[3].as_str(), n[3].as_str()),
        ];
        let g = CovarianceGraph::from_edges(&n, edges).unwrap();

        assert_eq!(4, g.graph.node_count());
        assert_eq!(2, g.graph.edge_count());
        assert_eq!(2, g.degree(&n[0]).unwrap());
        assert_eq!(0, g.degree(&n[3]).unwrap());
        assert_abs_diff_eq!(1.5, g.mean_degree(&n[0..2]).unwrap());
        assert!(g.degree("rh_region0_part1").is_err());
    }

    #[test]
    fn edges_to_unknown_regions_are_rejected() {
        let n = names(2);
        let res = CovarianceGraph::from_edges(&n, vec![(n[0].as_str(), "rh_insula_part1")]);
        assert!(matches!(res, Err(StatsTableError::RegionMismatch(_))));
    }

    #[test]
    fn an_edge_list_file_can_be_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Graph_CT_covar_ones_all_COST_10.csv");
        std::fs::write(
            &path,
            "source,target\nlh_region0_part1,lh_region1_part1\nlh_region1_part1,lh_region2_part1\n",
        )
        .unwrap();
        let g = CovarianceGraph::from_file(&path, &names(3)).unwrap();
        assert_eq!(2, g.degree("lh_region1_part1").unwrap());
    }

    #[test]
    fn clustering_counts_closed_triangles() {
        let g = two_triangles();
        // nodes 2 and 3 have 1 of 3 neighbour pairs connected, the others are fully clustered
        assert_abs_diff_eq!((4.0 + 2.0 / 3.0) / 6.0, average_clustering(&g), epsilon = 1e-12);
    }

    #[test]
    fn path_length_and_efficiency_of_a_path_graph() {
        let g: UnGraph<(), ()> = UnGraph::from_edges(&[(0, 1), (1, 2)]);
        let (l, e) = path_length_and_efficiency(&g);
        assert_abs_diff_eq!(4.0 / 3.0, l, epsilon = 1e-12);
        assert_abs_diff_eq!((1.0 + 1.0 + 0.5) * 2.0 / 6.0, e, epsilon = 1e-12);
    }

    #[test]
    fn a_star_is_disassortative() {
        let g: UnGraph<(), ()> = UnGraph::from_edges(&[(0, 1), (0, 2), (0, 3), (0, 4)]);
        assert_abs_diff_eq!(-1.0, degree_assortativity(&g), epsilon = 1e-12);
    }

    #[test]
    fn louvain_separates_the_triangles() {
        let g = two_triangles();
        // two communities of 3 edges each, 7 edges in total, both community degree sums are 7
        let expected = 2.0 * (3.0 / 7.0 - (7.0f64 / 14.0).powi(2));
        assert_abs_diff_eq!(expected, modularity(&g), epsilon = 1e-12);
    }

    #[test]
    fn rewiring_preserves_degrees() {
        let g = two_triangles();
        let mut rng = StdRng::seed_from_u64(1);
        let r = random_rewire(&g, 10, &mut rng);
        assert_eq!(g.node_count(), r.node_count());
        assert_eq!(g.edge_count(), r.edge_count());
        for node in g.node_indices() {
            assert_eq!(g.neighbors(node).count(), r.neighbors(node).count());
        }
    }

    #[test]
    fn network_measures_are_reported_against_random_graphs() {
        let null = NullModel {
            n_random: 3,
            swaps_per_edge: 10,
            seed: 42,
        };
        let measures = calculate_network_measures(&two_triangles(), &null);
        let labels: Vec<&str> = measures.iter().map(|m| m.name).collect();
        assert_eq!(vec!["a", "M", "C", "L", "E", "sigma"], labels);
        assert_eq!("sigma", measures[5].name);
        assert_abs_diff_eq!(1.0, measures[5].random);
        assert!(measures[0].to_string().starts_with("a = "));
        assert!(measures[0].to_string().contains(" (random = "));
    }
}
