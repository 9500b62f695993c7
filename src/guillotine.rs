//! Guillotine cut trees.
//!
//! A [`Mosaic`] is the cutting plan of one stock panel: a binary tree of
//! rectangles where every inner node is split in two by a single straight
//! cut. Trees are persistent. Placing a piece rebuilds only the nodes on the
//! path from the root to the region that receives it; every other subtree is
//! shared between the old and the new mosaic.

use std::sync::Arc;

use serde::Serialize;

use crate::types::TileDimensions;

/// Direction of the cut line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CutOrientation {
    /// Line of constant `x`; divides the width.
    Vertical,
    /// Line of constant `y`; divides the height.
    Horizontal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Width,
    Height,
}

impl Axis {
    fn other(self) -> Axis {
        match self {
            Axis::Width => Axis::Height,
            Axis::Height => Axis::Width,
        }
    }

    fn of_piece(self, piece: &TileDimensions) -> u32 {
        match self {
            Axis::Width => piece.width,
            Axis::Height => piece.height,
        }
    }
}

/// One guillotine cut, in panel coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cut {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
    pub original_width: u32,
    pub original_height: u32,
    pub orientation: CutOrientation,
    /// Offset of the cut line from the origin of the split region.
    pub cut_coord: u32,
    pub original_tile_id: u32,
    pub child1_tile_id: u32,
    pub child2_tile_id: u32,
    /// Material actually removed; less than the blade width when the cut
    /// runs along the region edge.
    pub thickness: u32,
}

impl Cut {
    /// Area of material turned into dust by this cut.
    pub fn consumed_area(&self) -> u64 {
        let length = match self.orientation {
            CutOrientation::Vertical => self.original_height,
            CutOrientation::Horizontal => self.original_width,
        };
        self.thickness as u64 * length as u64
    }
}

#[derive(Debug, Clone)]
pub struct TileNode {
    pub id: u32,
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
    pub external_id: Option<u32>,
    pub is_final: bool,
    pub rotated: bool,
    children: Option<[Arc<TileNode>; 2]>,
}

impl TileNode {
    pub fn new(id: u32, x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self {
            id,
            x1,
            y1,
            x2,
            y2,
            external_id: None,
            is_final: false,
            rotated: false,
            children: None,
        }
    }

    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    pub fn children(&self) -> Option<(&TileNode, &TileNode)> {
        self.children.as_ref().map(|[a, b]| (a.as_ref(), b.as_ref()))
    }

    fn extent(&self, axis: Axis) -> u32 {
        match axis {
            Axis::Width => self.width(),
            Axis::Height => self.height(),
        }
    }

    fn assign(&mut self, piece: &TileDimensions) {
        self.is_final = true;
        self.external_id = Some(piece.id);
        self.rotated = piece.rotated;
    }

    /// Final tiles of this subtree, depth first.
    pub fn final_tiles(&self) -> Vec<&TileNode> {
        let mut out = Vec::new();
        self.collect(&mut |n| n.is_final, &mut out);
        out
    }

    /// Leaves that hold no piece and have a non-zero area.
    pub fn unused_tiles(&self) -> Vec<&TileNode> {
        let mut out = Vec::new();
        self.collect(&mut |n| n.is_leaf() && !n.is_final && n.area() > 0, &mut out);
        out
    }

    fn collect<'a>(&'a self, pred: &mut dyn FnMut(&TileNode) -> bool, out: &mut Vec<&'a TileNode>) {
        if pred(self) {
            out.push(self);
        }
        if let Some([a, b]) = &self.children {
            a.collect(pred, out);
            b.collect(pred, out);
        }
    }

    pub fn depth(&self) -> usize {
        match &self.children {
            Some([a, b]) => 1 + a.depth().max(b.depth()),
            None => 0,
        }
    }
}

/// Aggregates cached on every mosaic; ranking reads them many times.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MosaicStats {
    pub final_tiles: usize,
    pub used_area: u64,
    pub unused_tiles: usize,
    pub biggest_unused_area: u64,
    pub depth: usize,
}

impl MosaicStats {
    fn of(root: &TileNode) -> Self {
        let finals = root.final_tiles();
        let unused = root.unused_tiles();
        Self {
            final_tiles: finals.len(),
            used_area: finals.iter().map(|n| n.area()).sum(),
            unused_tiles: unused.len(),
            biggest_unused_area: unused.iter().map(|n| n.area()).max().unwrap_or(0),
            depth: root.depth(),
        }
    }
}

/// The cutting plan of one stock panel.
#[derive(Debug, Clone)]
pub struct Mosaic {
    stock: TileDimensions,
    root: Arc<TileNode>,
    cuts: Vec<Cut>,
    next_id: u32,
    stats: MosaicStats,
}

impl Mosaic {
    pub fn new(stock: TileDimensions) -> Self {
        let root = TileNode::new(0, 0, 0, stock.width, stock.height);
        let stats = MosaicStats::of(&root);
        Self {
            stock,
            root: Arc::new(root),
            cuts: Vec::new(),
            next_id: 1,
            stats,
        }
    }

    pub fn stock(&self) -> &TileDimensions {
        &self.stock
    }

    pub fn root(&self) -> &TileNode {
        &self.root
    }

    pub fn cuts(&self) -> &[Cut] {
        &self.cuts
    }

    pub fn stats(&self) -> &MosaicStats {
        &self.stats
    }

    pub fn is_used(&self) -> bool {
        self.stats.final_tiles > 0
    }

    /// Panel area not covered by pieces.
    pub fn wasted_area(&self) -> u64 {
        self.stock.area() - self.stats.used_area
    }

    /// Whether two trees share the node behind `other`'s root.
    pub fn shares_root_with(&self, other: &Mosaic) -> bool {
        Arc::ptr_eq(&self.root, &other.root)
    }

    fn candidates(&self, piece: &TileDimensions) -> Vec<Vec<usize>> {
        let mut out = Vec::new();
        let mut path = Vec::new();
        find_candidates(&self.root, piece.width, piece.height, &mut path, &mut out);
        out
    }

    /// Returns a new mosaic where the leaf at `path` is replaced by the
    /// subtree produced by `fit`.
    fn branch<F>(&self, path: &[usize], fit: F) -> Mosaic
    where
        F: FnOnce(&TileNode, &mut u32) -> (TileNode, Vec<Cut>),
    {
        let mut next_id = self.next_id;
        let mut new_cuts = Vec::new();
        let root = rebuild(&self.root, path, |leaf| {
            let (node, cuts) = fit(leaf, &mut next_id);
            new_cuts = cuts;
            node
        });

        let mut cuts = Vec::with_capacity(self.cuts.len() + new_cuts.len());
        cuts.extend_from_slice(&self.cuts);
        cuts.extend(new_cuts);

        let stats = MosaicStats::of(&root);
        Mosaic {
            stock: self.stock,
            root,
            cuts,
            next_id,
            stats,
        }
    }
}

fn find_candidates(node: &TileNode, w: u32, h: u32, path: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
    if node.is_final || node.width() < w || node.height() < h {
        return;
    }
    match &node.children {
        None => out.push(path.clone()),
        Some(children) => {
            for (side, child) in children.iter().enumerate() {
                path.push(side);
                find_candidates(child, w, h, path, out);
                path.pop();
            }
        }
    }
}

fn rebuild<F>(node: &Arc<TileNode>, path: &[usize], replace: F) -> Arc<TileNode>
where
    F: FnOnce(&TileNode) -> TileNode,
{
    let Some((&side, rest)) = path.split_first() else {
        return Arc::new(replace(node));
    };
    let Some(children) = &node.children else {
        return Arc::clone(node);
    };
    let mut children = children.clone();
    children[side] = rebuild(&children[side], rest, replace);
    Arc::new(TileNode {
        children: Some(children),
        ..(**node).clone()
    })
}

/// Splits `node` so that its first child measures `size` along `axis`.
///
/// The second child starts after the kerf. When the leftover is narrower
/// than the kerf the second child is empty and the kerf is clipped.
fn split(node: &TileNode, axis: Axis, size: u32, cut_thickness: u32, next_id: &mut u32) -> (TileNode, TileNode, Cut) {
    let mut alloc = || {
        let id = *next_id;
        *next_id += 1;
        id
    };
    let first_id = alloc();
    let second_id = alloc();

    let (first, second, cut) = match axis {
        Axis::Width => {
            let line = node.x1 + size;
            let start = line.saturating_add(cut_thickness).min(node.x2);
            let first = TileNode::new(first_id, node.x1, node.y1, line, node.y2);
            let second = TileNode::new(second_id, start, node.y1, node.x2, node.y2);
            let cut = Cut {
                x1: line,
                y1: node.y1,
                x2: line,
                y2: node.y2,
                original_width: node.width(),
                original_height: node.height(),
                orientation: CutOrientation::Vertical,
                cut_coord: size,
                original_tile_id: node.id,
                child1_tile_id: first_id,
                child2_tile_id: second_id,
                thickness: start - line,
            };
            (first, second, cut)
        }
        Axis::Height => {
            let line = node.y1 + size;
            let start = line.saturating_add(cut_thickness).min(node.y2);
            let first = TileNode::new(first_id, node.x1, node.y1, node.x2, line);
            let second = TileNode::new(second_id, node.x1, start, node.x2, node.y2);
            let cut = Cut {
                x1: node.x1,
                y1: line,
                x2: node.x2,
                y2: line,
                original_width: node.width(),
                original_height: node.height(),
                orientation: CutOrientation::Horizontal,
                cut_coord: size,
                original_tile_id: node.id,
                child1_tile_id: first_id,
                child2_tile_id: second_id,
                thickness: start - line,
            };
            (first, second, cut)
        }
    };
    (first, second, cut)
}

/// Carves `piece` out of the free leaf `leaf`, cutting along `first_axis`
/// first and then along the other axis if still needed.
fn fit_split(
    leaf: &TileNode,
    piece: &TileDimensions,
    first_axis: Axis,
    cut_thickness: u32,
    next_id: &mut u32,
) -> (TileNode, Vec<Cut>) {
    let second_axis = first_axis.other();
    let mut cuts = Vec::with_capacity(2);
    let mut parent = leaf.clone();

    // Exact fits are handled by the caller, so at least one axis is larger.
    let axis = if leaf.extent(first_axis) > first_axis.of_piece(piece) {
        first_axis
    } else {
        second_axis
    };

    let (mut first, second, cut) = split(leaf, axis, axis.of_piece(piece), cut_thickness, next_id);
    cuts.push(cut);

    let remaining = axis.other();
    if axis == first_axis && first.extent(remaining) > remaining.of_piece(piece) {
        let (mut inner, rest, cut) = split(&first, remaining, remaining.of_piece(piece), cut_thickness, next_id);
        inner.assign(piece);
        first.children = Some([Arc::new(inner), Arc::new(rest)]);
        cuts.push(cut);
    } else {
        first.assign(piece);
    }

    parent.children = Some([Arc::new(first), Arc::new(second)]);
    (parent, cuts)
}

fn fit_oriented(piece: &TileDimensions, mosaic: &Mosaic, cut_thickness: u32, out: &mut Vec<Mosaic>) {
    for path in mosaic.candidates(piece) {
        let Some(leaf) = node_at(&mosaic.root, &path) else {
            continue;
        };

        if leaf.width() == piece.width && leaf.height() == piece.height {
            out.push(mosaic.branch(&path, |leaf, _| {
                let mut node = leaf.clone();
                node.assign(piece);
                (node, Vec::new())
            }));
            continue;
        }

        out.push(mosaic.branch(&path, |leaf, ids| {
            fit_split(leaf, piece, Axis::Width, cut_thickness, ids)
        }));

        // With one side already matching both orders give the same plan.
        if leaf.width() == piece.width || leaf.height() == piece.height {
            continue;
        }

        out.push(mosaic.branch(&path, |leaf, ids| {
            fit_split(leaf, piece, Axis::Height, cut_thickness, ids)
        }));
    }
}

fn node_at<'a>(root: &'a TileNode, path: &[usize]) -> Option<&'a TileNode> {
    let mut node = root;
    for &side in path {
        let children = node.children.as_ref()?;
        node = children.get(side)?;
    }
    Some(node)
}

/// Every way of placing `piece` into a free region of `mosaic`.
///
/// Returns an empty list when the piece fits nowhere. The input mosaic is
/// left untouched.
pub fn place(piece: &TileDimensions, mosaic: &Mosaic, cut_thickness: u32, allow_rotation: bool) -> Vec<Mosaic> {
    let mut out = Vec::new();
    fit_oriented(piece, mosaic, cut_thickness, &mut out);
    if allow_rotation && !piece.is_square() {
        fit_oriented(&piece.rotate90(), mosaic, cut_thickness, &mut out);
    }
    out
}
