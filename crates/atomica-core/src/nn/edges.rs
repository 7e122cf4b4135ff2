//! Edge construction for the atom-level and block-level message passing.
//!
//! Real units are connected to their `k` nearest neighbours, separately within their own
//! segment and towards the other segment of the same sample. Global units are wired in
//! a star around their members and pairwise across segments only when global message
//! passing is enabled for that level.

use super::layers::index_tensor;
use candle_core::{Device, Result, Tensor};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EdgeKind {
    Intra = 0,
    Inter = 1,
    Global = 2,
    GlobalGlobal = 3,
}

pub const NUM_EDGE_KINDS: usize = 4;

/// Directed edges; messages flow from `src` to `dst`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeList {
    pub src: Vec<u32>,
    pub dst: Vec<u32>,
    pub kinds: Vec<EdgeKind>,
}

impl EdgeList {
    pub fn len(&self) -> usize {
        self.src.len()
    }

    pub fn is_empty(&self) -> bool {
        self.src.is_empty()
    }

    fn push(&mut self, src: usize, dst: usize, kind: EdgeKind) {
        self.src.push(src as u32);
        self.dst.push(dst as u32);
        self.kinds.push(kind);
    }

    fn push_both(&mut self, a: usize, b: usize, kind: EdgeKind) {
        self.push(a, b, kind);
        self.push(b, a, kind);
    }

    pub fn count(&self, kind: EdgeKind) -> usize {
        self.kinds.iter().filter(|&&k| k == kind).count()
    }

    pub(crate) fn to_tensors(&self, device: &Device) -> Result<EdgeTensors> {
        let kinds: Vec<u32> = self.kinds.iter().map(|&k| k as u32).collect();
        Ok(EdgeTensors {
            src: index_tensor(&self.src, device)?,
            dst: index_tensor(&self.dst, device)?,
            kinds: index_tensor(&kinds, device)?,
            len: self.len(),
        })
    }
}

#[derive(Debug, Clone)]
pub(crate) struct EdgeTensors {
    pub src: Tensor,
    pub dst: Tensor,
    pub kinds: Tensor,
    pub len: usize,
}

/// Positions and memberships of the units of one message-passing level.
#[derive(Debug, Clone, Copy)]
pub struct Units<'a> {
    pub positions: &'a [[f64; 3]],
    pub batch_id: &'a [u32],
    pub segment_ids: &'a [u8],
    pub is_global: &'a [bool],
}

type GroupKey = (u32, u8);

impl Units<'_> {
    fn len(&self) -> usize {
        self.positions.len()
    }

    fn key(&self, i: usize) -> GroupKey {
        (self.batch_id[i], self.segment_ids[i])
    }

    fn real_groups(&self) -> BTreeMap<GroupKey, Vec<usize>> {
        let mut groups: BTreeMap<GroupKey, Vec<usize>> = BTreeMap::new();
        for i in (0..self.len()).filter(|&i| !self.is_global[i]) {
            groups.entry(self.key(i)).or_default().push(i);
        }
        groups
    }

    fn squared_distance(&self, i: usize, j: usize) -> f64 {
        let (p, q) = (self.positions[i], self.positions[j]);
        (0..3).map(|axis| (p[axis] - q[axis]).powi(2)).sum()
    }

    fn nearest(&self, node: usize, candidates: &[usize], k: usize) -> Vec<usize> {
        let mut ranked: Vec<(f64, usize)> = candidates
            .iter()
            .filter(|&&j| j != node)
            .map(|&j| (self.squared_distance(node, j), j))
            .collect();
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        ranked.into_iter().take(k).map(|(_, j)| j).collect()
    }
}

/// Connects every real unit to its `k` nearest real units within its segment and to its
/// `k` nearest real units of the other segment of the same sample. Ties break by index.
pub fn knn_edges(units: &Units, k: usize) -> EdgeList {
    let groups = units.real_groups();
    let mut edges = EdgeList::default();
    for (&(batch, segment), members) in &groups {
        let partner = groups.get(&(batch, 1 - segment));
        for &node in members {
            for neighbour in units.nearest(node, members, k) {
                edges.push(neighbour, node, EdgeKind::Intra);
            }
            if let Some(partner) = partner {
                for neighbour in units.nearest(node, partner, k) {
                    edges.push(neighbour, node, EdgeKind::Inter);
                }
            }
        }
    }
    edges
}

/// Connects the two segment hubs of every sample to each other.
fn connect_hubs(hubs: &BTreeMap<GroupKey, usize>, edges: &mut EdgeList) {
    for (&(batch, segment), &hub) in hubs {
        if segment != 0 {
            continue;
        }
        if let Some(&other) = hubs.get(&(batch, 1)) {
            edges.push_both(hub, other, EdgeKind::GlobalGlobal);
        }
    }
}

/// Block-level edges. With `global` set, each segment's global block exchanges messages
/// with the real blocks of its segment, and the two global blocks of a sample with each
/// other.
pub fn block_edges(units: &Units, k: usize, global: bool) -> EdgeList {
    let mut edges = knn_edges(units, k);
    if !global {
        return edges;
    }

    let mut hubs = BTreeMap::new();
    for i in (0..units.len()).filter(|&i| units.is_global[i]) {
        hubs.entry(units.key(i)).or_insert(i);
    }
    for (key, members) in units.real_groups() {
        if let Some(&hub) = hubs.get(&key) {
            for member in members {
                edges.push_both(hub, member, EdgeKind::Global);
            }
        }
    }
    connect_hubs(&hubs, &mut edges);
    edges
}

/// Atom-level edges. With `global` set, the global atom of every real block exchanges
/// messages with the block's atoms, the global atom of each segment's global block with
/// the per-block global atoms of the segment, and the two segment global atoms of a
/// sample with each other.
pub fn atom_edges(
    units: &Units,
    block_id: &[u32],
    is_global_block: &[bool],
    k: usize,
    global: bool,
) -> EdgeList {
    let mut edges = knn_edges(units, k);
    if !global {
        return edges;
    }

    let mut block_hubs: BTreeMap<u32, usize> = BTreeMap::new();
    let mut segment_hubs: BTreeMap<GroupKey, usize> = BTreeMap::new();
    for i in (0..units.len()).filter(|&i| units.is_global[i]) {
        let block = block_id[i];
        if is_global_block[block as usize] {
            segment_hubs.entry(units.key(i)).or_insert(i);
        } else {
            block_hubs.entry(block).or_insert(i);
        }
    }

    for i in (0..units.len()).filter(|&i| !units.is_global[i]) {
        if let Some(&hub) = block_hubs.get(&block_id[i]) {
            edges.push_both(hub, i, EdgeKind::Global);
        }
    }
    for &hub in block_hubs.values() {
        if let Some(&segment_hub) = segment_hubs.get(&units.key(hub)) {
            edges.push_both(segment_hub, hub, EdgeKind::Global);
        }
    }
    connect_hubs(&segment_hubs, &mut edges);
    edges
}
