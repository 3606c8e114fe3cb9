//! The index engine: build, query, merge, and the BAI/CSI binning
//! regimes that sit underneath both on-disk formats.

pub mod bai;
pub mod csi;

use crate::bin::{BaiScheme, BinningScheme, CsiScheme, STATS_BIN};
use crate::error::{Error, Result};
use crate::record::Record;
use crate::vpos::{adjacent, Chunk, FullyMergeOverlaps, MergeStrategy, VirtualPosition};

const LINEAR_TILE_SHIFT: u32 = 14; // 16 KiB tiles.

/// Parameters of the CSI binning regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsiParams {
    pub min_shift: u32,
    pub depth: u32,
}

impl Default for CsiParams {
    fn default() -> Self {
        Self {
            min_shift: 14,
            depth: 5,
        }
    }
}

/// Which on-disk flavour (and therefore which binning regime) an index
/// was built for.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Regime {
    Bai,
    Csi(CsiParams),
}

impl Regime {
    fn max_coordinate(self) -> u64 {
        match self {
            Regime::Bai => BaiScheme.max_coordinate(),
            Regime::Csi(p) => CsiScheme::new(p.min_shift, p.depth).max_coordinate(),
        }
    }

    fn region_to_bin(self, beg: u64, end: u64) -> u32 {
        match self {
            Regime::Bai => BaiScheme.region_to_bin(beg, end),
            Regime::Csi(p) => CsiScheme::new(p.min_shift, p.depth).region_to_bin(beg, end),
        }
    }

    fn region_to_bins(self, beg: u64, end: u64) -> Vec<u32> {
        match self {
            Regime::Bai => BaiScheme.region_to_bins(beg, end),
            Regime::Csi(p) => CsiScheme::new(p.min_shift, p.depth).region_to_bins(beg, end),
        }
    }
}

/// Per-reference mapped/unmapped counts and the chunk spanning its first
/// and last records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub chunk: Chunk,
    pub mapped: u64,
    pub unmapped: u64,
}

/// One bin's chunk list, plus the CSI-only left offset and record count
/// (unused, left at defaults, under the BAI regime).
#[derive(Debug, Clone, Default)]
pub struct Bin {
    pub id: u32,
    pub chunks: Vec<Chunk>,
    pub left_offset: VirtualPosition,
    pub record_count: u64,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ReferenceIndex {
    bins: Vec<Bin>,
    intervals: Vec<VirtualPosition>,
    stats: Option<Stats>,
}

/// A BAI- or CSI-shaped coordinate index, built incrementally via
/// [`Index::add`] and queried via [`Index::chunks`].
pub struct Index {
    regime: Regime,
    references: Vec<ReferenceIndex>,
    unmapped_file_count: Option<u64>,
    dirty: bool,
    last_ref_id: Option<i32>,
    last_pos: Option<i32>,
}

impl Index {
    pub fn new_bai() -> Self {
        Self::with_regime(Regime::Bai)
    }

    pub fn new_csi(params: CsiParams) -> Self {
        Self::with_regime(Regime::Csi(params))
    }

    fn with_regime(regime: Regime) -> Self {
        Self {
            regime,
            references: Vec::new(),
            unmapped_file_count: None,
            dirty: false,
            last_ref_id: None,
            last_pos: None,
        }
    }

    /// Feeds one (record, chunk) pair into the index. `mapped` and `placed` are derived from the
    /// record's own flags and reference/position fields.
    ///
    /// Order is enforced only for placed records: real coordinate-sorted
    /// streams commonly trail with `refID = -1` unplaced records, which
    /// would otherwise violate monotonic refID — the same exemption
    /// htslib's own indexer makes.
    pub fn add(&mut self, record: &Record, chunk: Chunk) -> Result<()> {
        let mapped = !record.flags.is_unmapped();
        if !record.is_placed() {
            *self.unmapped_file_count.get_or_insert(0) += 1;
            return Ok(());
        }

        let ref_id = record.ref_id;
        let pos = record.pos as i64;
        let end = record.end();
        if pos < 0 || (end as u64) > self.regime.max_coordinate() {
            return Err(Error::OutOfRange("position"));
        }

        if let Some(last_ref) = self.last_ref_id {
            if ref_id < last_ref {
                return Err(Error::OrderError("reference"));
            }
            if ref_id == last_ref {
                if let Some(last_pos) = self.last_pos {
                    if pos < last_pos as i64 {
                        return Err(Error::OrderError("position"));
                    }
                }
            }
        }

        while self.references.len() <= ref_id as usize {
            self.references.push(ReferenceIndex::default());
        }
        let bin_id = self.regime.region_to_bin(pos as u64, end as u64);
        let max_tiles = (self.regime.max_coordinate() >> LINEAR_TILE_SHIFT) as usize;
        let biv = (pos >> LINEAR_TILE_SHIFT) as usize;
        let eiv = (end >> LINEAR_TILE_SHIFT) as usize;
        if matches!(self.regime, Regime::Bai) && eiv >= max_tiles {
            return Err(Error::OutOfRange("position"));
        }

        let r = &mut self.references[ref_id as usize];

        let bin = match r.bins.iter_mut().find(|b| b.id == bin_id) {
            Some(b) => b,
            None => {
                r.bins.push(Bin {
                    id: bin_id,
                    ..Default::default()
                });
                r.bins.last_mut().unwrap()
            }
        };
        match bin.chunks.last_mut() {
            Some(last) if last.end >= chunk.begin => {
                if chunk.end > last.end {
                    last.end = chunk.end;
                }
            }
            _ => bin.chunks.push(chunk),
        }
        bin.record_count += 1;
        bin.left_offset = bin.chunks[0].begin;

        if matches!(self.regime, Regime::Bai) {
            let prev_len = r.intervals.len();
            if r.intervals.len() <= eiv {
                r.intervals.resize(eiv + 1, VirtualPosition::default());
            }
            let start = biv.max(prev_len);
            for tile in &mut r.intervals[start..=eiv] {
                if tile.is_unset() {
                    *tile = chunk.begin;
                }
            }
        }

        match &mut r.stats {
            None => {
                r.stats = Some(Stats {
                    chunk,
                    mapped: mapped as u64,
                    unmapped: (!mapped) as u64,
                });
            }
            Some(s) => {
                if chunk.end > s.chunk.end {
                    s.chunk.end = chunk.end;
                }
                if mapped {
                    s.mapped += 1;
                } else {
                    s.unmapped += 1;
                }
            }
        }
        if !mapped {
            *self.unmapped_file_count.get_or_insert(0) += 1;
        }

        self.last_ref_id = Some(ref_id);
        self.last_pos = Some(pos as i32);
        self.dirty = true;
        Ok(())
    }

    fn ensure_sorted(&mut self) {
        if !self.dirty {
            return;
        }
        for r in &mut self.references {
            r.bins.sort_by_key(|b| b.id);
            for bin in &mut r.bins {
                bin.chunks.sort();
            }
        }
        self.dirty = false;
    }

    /// Returns the merged chunk list covering `[beg, end)` on `ref_id`,
    /// gathering every candidate bin's chunks, dropping any a linear-index
    /// tile rules out, then coalescing overlaps.
    pub fn chunks(&mut self, ref_id: i32, beg: i64, end: i64) -> Vec<Chunk> {
        if ref_id < 0 || ref_id as usize >= self.references.len() {
            return Vec::new();
        }
        self.ensure_sorted();

        let candidate_bins = self.regime.region_to_bins(beg as u64, end as u64);
        let tile0 = (beg >> LINEAR_TILE_SHIFT) as usize;
        let r = &self.references[ref_id as usize];

        let mut out = Vec::new();
        for bin_id in candidate_bins {
            let Some(bin) = r.bins.iter().find(|b| b.id == bin_id) else {
                continue;
            };
            match self.regime {
                Regime::Bai => {
                    for &chunk in &bin.chunks {
                        let mut tile = tile0;
                        while tile < r.intervals.len() {
                            let vo = r.intervals[tile];
                            if !vo.is_unset() && vo < chunk.end {
                                let tile_beg = (tile as i64) << LINEAR_TILE_SHIFT;
                                let tile_end = tile_beg + (1 << LINEAR_TILE_SHIFT);
                                if tile_beg < end && beg < tile_end {
                                    out.push(chunk);
                                    break;
                                }
                            }
                            tile += 1;
                        }
                    }
                }
                Regime::Csi(_) => {
                    for &chunk in &bin.chunks {
                        if chunk.end > bin.left_offset {
                            out.push(chunk);
                        }
                    }
                }
            }
        }
        out.sort();
        let merged = FullyMergeOverlaps.merge(&out);
        adjacent(&merged)
    }

    /// Per-reference mapped/unmapped counts and spanning chunk.
    pub fn reference_stats(&self, ref_id: i32) -> Option<Stats> {
        self.references
            .get(usize::try_from(ref_id).ok()?)
            .and_then(|r| r.stats)
    }

    /// `(count, is_known)`: the file-level unmapped-read count, and
    /// whether it has ever been set.
    pub fn unmapped(&self) -> (u64, bool) {
        match self.unmapped_file_count {
            Some(n) => (n, true),
            None => (0, false),
        }
    }

    /// Applies `strategy` to every bin's chunk list, re-sorting after
    /// each merge since a strategy is free to reorder or drop entries.
    pub fn merge_chunks(&mut self, strategy: &dyn MergeStrategy) {
        self.ensure_sorted();
        for r in &mut self.references {
            for bin in &mut r.bins {
                bin.chunks = strategy.merge(&bin.chunks);
            }
        }
    }

    pub(crate) fn reference_count(&self) -> usize {
        self.references.len()
    }

    pub(crate) fn reference_at(&self, i: usize) -> Option<&ReferenceIndex> {
        self.references.get(i)
    }

    pub(crate) fn regime(&self) -> Regime {
        self.regime
    }

    pub(crate) fn unmapped_file_count_raw(&self) -> Option<u64> {
        self.unmapped_file_count
    }

    /// Rebuilds an index directly from decoded on-disk parts (used by the
    /// BAI/CSI readers, which parse the wire format themselves and then
    /// hand back fully-formed reference entries).
    pub(crate) fn from_parts(
        regime: Regime,
        references: Vec<ReferenceIndex>,
        unmapped_file_count: Option<u64>,
    ) -> Self {
        Self {
            regime,
            references,
            unmapped_file_count,
            dirty: false,
            last_ref_id: None,
            last_pos: None,
        }
    }
}

impl ReferenceIndex {
    pub(crate) fn new(bins: Vec<Bin>, intervals: Vec<VirtualPosition>, stats: Option<Stats>) -> Self {
        Self {
            bins,
            intervals,
            stats,
        }
    }

    pub(crate) fn bins(&self) -> &[Bin] {
        &self.bins
    }

    pub(crate) fn intervals(&self) -> &[VirtualPosition] {
        &self.intervals
    }

    pub(crate) fn stats(&self) -> Option<Stats> {
        self.stats
    }
}
