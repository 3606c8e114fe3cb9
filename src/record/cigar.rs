//! CIGAR operations: encoding, consumption semantics, and the `End()`
//! cursor walk.

use crate::error::{Error, Result};

/// The ten CIGAR operation kinds, in their on-wire numeric order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Match,
    Insertion,
    Deletion,
    Skipped,
    SoftClipped,
    HardClipped,
    Padded,
    Equal,
    Mismatch,
    Back,
}

use Kind::*;

const KINDS: [Kind; 10] = [
    Match, Insertion, Deletion, Skipped, SoftClipped, HardClipped, Padded, Equal, Mismatch, Back,
];

/// Per-operation (query, reference) consumption counts, indexed by
/// `Kind::code()`. `Back` consumes reference by −1.
const CONSUMPTION: [(i64, i64); 10] = [
    (1, 1),  // M
    (1, 0),  // I
    (0, 1),  // D
    (0, 1),  // N
    (1, 0),  // S
    (0, 0),  // H
    (0, 0),  // P
    (1, 1),  // =
    (1, 1),  // X
    (0, -1), // B
];

impl Kind {
    fn code(self) -> u8 {
        KINDS.iter().position(|&k| k == self).unwrap() as u8
    }

    fn from_code(code: u8) -> Result<Self> {
        KINDS
            .get(code as usize)
            .copied()
            .ok_or(Error::Malformed("cigar op code"))
    }

    /// `(query_consume, ref_consume)` for one unit of this op.
    fn consumption(self) -> (i64, i64) {
        CONSUMPTION[self.code() as usize]
    }

    pub fn consumes_query(self) -> bool {
        self.consumption().0 != 0
    }

    pub fn consumes_reference(self) -> bool {
        self.consumption().1 != 0
    }

    /// Whether this op may appear at the outer ends of a CIGAR
    /// (clipping ops — `SoftClipped`/`HardClipped`).
    pub fn is_clipping(self) -> bool {
        matches!(self, SoftClipped | HardClipped)
    }
}

/// One (length, op-type) pair, packed as a 32-bit word with length in the
/// high 28 bits and the op-type code in the low 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Op {
    pub len: u32,
    pub kind: Kind,
}

impl Op {
    pub fn new(len: u32, kind: Kind) -> Self {
        Self { len, kind }
    }

    pub fn encode(self) -> u32 {
        (self.len << 4) | self.kind.code() as u32
    }

    pub fn decode(word: u32) -> Result<Self> {
        Ok(Self {
            len: word >> 4,
            kind: Kind::from_code((word & 0xf) as u8)?,
        })
    }

    fn query_consume(self) -> i64 {
        self.len as i64 * self.kind.consumption().0
    }

    fn ref_consume(self) -> i64 {
        self.len as i64 * self.kind.consumption().1
    }
}

/// A full CIGAR string: an ordered sequence of operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cigar(pub Vec<Op>);

impl Cigar {
    pub fn new(ops: Vec<Op>) -> Self {
        Self(ops)
    }

    pub fn ops(&self) -> &[Op] {
        &self.0
    }

    /// `(ref_len, query_len)`: the summed consumption over every op.
    /// `ref_len` may be negative in the presence of a non-terminal
    /// `Back`; callers anchoring coordinates should use [`Cigar::end`]
    /// instead, which tracks the cursor rather than a bare sum.
    pub fn lengths(&self) -> (i64, i64) {
        self.0.iter().fold((0, 0), |(r, q), op| {
            (r + op.ref_consume(), q + op.query_consume())
        })
    }

    /// The alignment end position, anchored at `pos`: the maximum cursor
    /// value reached while walking the ops in order, each advancing the
    /// cursor by its reference consumption.
    ///
    /// A `Back` as the very last op therefore never pulls `end` below the
    /// maximum already reached by an earlier query-consuming op, since
    /// the max is taken over the whole walk rather than the final cursor
    /// value.
    pub fn end(&self, pos: i64) -> i64 {
        let mut cursor = pos;
        let mut max = pos;
        for op in &self.0 {
            cursor += op.ref_consume();
            if cursor > max {
                max = cursor;
            }
        }
        max
    }

    /// Validates query-consumption against `seq_len` and clipping
    /// placement.
    pub fn is_valid(&self, seq_len: usize) -> bool {
        if self.0.is_empty() {
            return seq_len == 0;
        }
        let (_, query_len) = self.lengths();
        if query_len < 0 || query_len as usize != seq_len {
            return false;
        }
        self.clipping_well_placed()
    }

    fn clipping_well_placed(&self) -> bool {
        let n = self.0.len();
        for (i, op) in self.0.iter().enumerate() {
            if !op.kind.is_clipping() {
                continue;
            }
            let at_start = i == 0 || (op.kind == HardClipped && i == 1 && self.0[0].kind == HardClipped);
            let at_end =
                i == n - 1 || (op.kind == HardClipped && i == n - 2 && self.0[n - 1].kind == HardClipped);
            if op.kind == SoftClipped {
                let flanked_by_h_at_start = i > 0 && self.0[i - 1].kind == HardClipped && i - 1 == 0;
                let flanked_by_h_at_end =
                    i + 1 < n && self.0[i + 1].kind == HardClipped && i + 1 == n - 1;
                if !(i == 0 || flanked_by_h_at_start || i == n - 1 || flanked_by_h_at_end) {
                    return false;
                }
            } else if !(at_start || at_end) {
                return false;
            }
        }
        true
    }
}
