use std::collections::HashMap;

use rand::Rng;

use crate::components::fill::fill_region;
use crate::pattern::{PatternStore, is_fill_blocking};

/// Hops longer than this many cells are flagged (and re-routed when an
/// insertion is shorter).
pub const DEFAULT_PATH_THRESHOLD: f32 = 10.0;

/// Where the stitching order starts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StartStrategy {
    TopLeft,
    Center,
    /// Cluster nearest to a chosen cell.
    Point(u32, u32),
    Random,
}

impl StartStrategy {
    pub fn label(&self) -> &'static str {
        match self {
            StartStrategy::TopLeft => "Top left",
            StartStrategy::Center => "Center",
            StartStrategy::Point(..) => "Selected cell",
            StartStrategy::Random => "Random",
        }
    }
}

/// One hop between consecutive clusters.
#[derive(Clone, Debug, PartialEq)]
pub struct PathSegment {
    pub from_cluster: usize,
    pub to_cluster: usize,
    pub distance: f32,
    /// Closest pair of cells between the two clusters.
    pub from_cell: (u32, u32),
    pub to_cell: (u32, u32),
    pub long_hop: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlannedPath {
    pub code: String,
    /// 4-connected groups of `code`, each sorted row-major.
    pub clusters: Vec<Vec<(u32, u32)>>,
    /// Visiting order (cluster indices).
    pub order: Vec<usize>,
    pub segments: Vec<PathSegment>,
}

impl PlannedPath {
    pub fn start_cell(&self) -> Option<(u32, u32)> {
        match self.segments.first() {
            Some(seg) => Some(seg.from_cell),
            None => self
                .order
                .first()
                .and_then(|&c| self.clusters[c].first().copied()),
        }
    }

    pub fn total_distance(&self) -> f32 {
        self.segments.iter().map(|s| s.distance).sum()
    }

    pub fn long_hops(&self) -> usize {
        self.segments.iter().filter(|s| s.long_hop).count()
    }
}

/// Label the 4-connected clusters of `code` in the merged view, in
/// row-major order of their first cell.
pub fn find_clusters(store: &PatternStore, code: &str) -> Vec<Vec<(u32, u32)>> {
    if is_fill_blocking(code) {
        return Vec::new();
    }
    let cols = store.cols();
    let rows = store.rows();
    let grid = store.merged_grid();
    let mut labelled = vec![false; grid.len()];
    let mut clusters = Vec::new();

    for (idx, cell) in grid.iter().enumerate() {
        if labelled[idx] || *cell != Some(code) {
            continue;
        }
        let start = ((idx % cols as usize) as u32, (idx / cols as usize) as u32);
        let mut cluster = fill_region(&grid, cols, rows, start, code);
        for &(x, y) in &cluster {
            labelled[(y * cols + x) as usize] = true;
        }
        cluster.sort_by_key(|&(x, y)| (y, x));
        clusters.push(cluster);
    }
    clusters
}

fn cell_distance(a: (u32, u32), b: (u32, u32)) -> f32 {
    let dx = a.0 as f32 - b.0 as f32;
    let dy = a.1 as f32 - b.1 as f32;
    (dx * dx + dy * dy).sqrt()
}

/// Closest member of `cluster` to `point`.
fn nearest_member(cluster: &[(u32, u32)], point: (f32, f32)) -> f32 {
    cluster
        .iter()
        .map(|&(x, y)| {
            let dx = x as f32 - point.0;
            let dy = y as f32 - point.1;
            dx * dx + dy * dy
        })
        .fold(f32::INFINITY, f32::min)
}

#[derive(Clone, Copy)]
struct Link {
    distance: f32,
    from_cell: (u32, u32),
    to_cell: (u32, u32),
}

/// Memoised minimum cell-to-cell distance between clusters.
struct LinkTable<'a> {
    clusters: &'a [Vec<(u32, u32)>],
    cache: HashMap<(usize, usize), Link>,
}

impl<'a> LinkTable<'a> {
    fn new(clusters: &'a [Vec<(u32, u32)>]) -> Self {
        Self {
            clusters,
            cache: HashMap::new(),
        }
    }

    fn link(&mut self, a: usize, b: usize) -> Link {
        let key = (a.min(b), a.max(b));
        let clusters = self.clusters;
        let link = *self.cache.entry(key).or_insert_with(|| {
            let mut best = Link {
                distance: f32::INFINITY,
                from_cell: (0, 0),
                to_cell: (0, 0),
            };
            for &p in &clusters[key.0] {
                for &q in &clusters[key.1] {
                    let d = cell_distance(p, q);
                    if d < best.distance {
                        best = Link {
                            distance: d,
                            from_cell: p,
                            to_cell: q,
                        };
                    }
                }
            }
            best
        });
        if a <= b {
            link
        } else {
            Link {
                distance: link.distance,
                from_cell: link.to_cell,
                to_cell: link.from_cell,
            }
        }
    }
}

/// Order the clusters of `code` for stitching: start per `strategy`, then
/// greedily hop to the nearest unvisited cluster.  A hop longer than
/// `threshold` is instead spliced between two already-ordered clusters when
/// that detour is shorter than the hop.
pub fn plan_path<R: Rng>(
    store: &PatternStore,
    code: &str,
    strategy: StartStrategy,
    threshold: f32,
    rng: &mut R,
) -> Option<PlannedPath> {
    let clusters = find_clusters(store, code);
    if clusters.is_empty() {
        return None;
    }

    let start = match strategy {
        StartStrategy::Random => rng.gen_range(0..clusters.len()),
        other => {
            let target = match other {
                StartStrategy::Center => (store.cols() as f32 / 2.0, store.rows() as f32 / 2.0),
                StartStrategy::Point(x, y) => (x as f32, y as f32),
                _ => (0.0, 0.0),
            };
            let mut best = 0;
            let mut best_d = f32::INFINITY;
            for (i, cluster) in clusters.iter().enumerate() {
                let d = nearest_member(cluster, target);
                if d < best_d {
                    best = i;
                    best_d = d;
                }
            }
            best
        }
    };

    let mut links = LinkTable::new(&clusters);
    let mut order = vec![start];
    let mut remaining: Vec<usize> = (0..clusters.len()).filter(|&i| i != start).collect();
    let mut current = start;

    while !remaining.is_empty() {
        let (pos, next, hop) = remaining
            .iter()
            .enumerate()
            .map(|(pos, &c)| (pos, c, links.link(current, c).distance))
            .fold(None, |best: Option<(usize, usize, f32)>, cand| match best {
                Some(b) if b.2 <= cand.2 => Some(b),
                _ => Some(cand),
            })?;
        remaining.remove(pos);

        if hop > threshold && order.len() > 1 {
            let mut best_insert: Option<(usize, f32)> = None;
            for i in 0..order.len() - 1 {
                let detour = links.link(order[i], next).distance + links.link(next, order[i + 1]).distance;
                if best_insert.is_none_or(|(_, d)| detour < d) {
                    best_insert = Some((i, detour));
                }
            }
            if let Some((i, detour)) = best_insert
                && detour < hop
            {
                order.insert(i + 1, next);
                continue;
            }
        }

        order.push(next);
        current = next;
    }

    let segments = order
        .windows(2)
        .map(|w| {
            let link = links.link(w[0], w[1]);
            PathSegment {
                from_cluster: w[0],
                to_cluster: w[1],
                distance: link.distance,
                from_cell: link.from_cell,
                to_cell: link.to_cell,
                long_hop: link.distance > threshold,
            }
        })
        .collect();

    crate::log_info!(
        "Planned path for {}: {} clusters, start {}",
        code,
        clusters.len(),
        strategy.label()
    );

    Some(PlannedPath {
        code: code.to_string(),
        clusters,
        order,
        segments,
    })
}
