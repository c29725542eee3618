//! Per-worker search heuristics: history, killers, and the transposition table
//
//  This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
////////////////////////////////////////////////////////////////////////////////////////////////////
//! Every worker owns one [`ThreadContext`] and nothing else touches it while a depth is
//! being searched. Between depth iterations the coordinator folds each context into a
//! shared [`RootAggregate`] under a mutex, so later iterations can order root moves with
//! what earlier ones learned without any synchronization inside the hot path.

use crate::chess::{Color, Move, Square, Zobrist};
use super::eval::EvalScratch;

/// Deepest ply the killer table tracks.
pub const MAX_PLY: usize = 128;

////////////////////////////////////////////////////////////////////////////////////////////////////
/// History heuristic: a saturating counter for every (side, origin, destination) tuple,
/// bumped by depth² on quiet beta cutoffs.
#[derive(Debug, Clone)]
pub struct HistoryTable {
    counters: Vec<i16>,
}

impl HistoryTable {
    /// Creates an empty history table.
    pub fn new() -> HistoryTable {
        HistoryTable { counters: vec![0; Color::COUNT * Square::COUNT * Square::COUNT] }
    }

    fn index(side: Color, from: Square, to: Square) -> usize {
        ((side as usize) * Square::COUNT + from as usize) * Square::COUNT + to as usize
    }

    /// Returns the counter for one (side, from, to) tuple.
    pub fn get(&self, side: Color, from: Square, to: Square) -> i16 {
        self.counters[Self::index(side, from, to)]
    }

    /// Adds `value` to a counter, saturating at the i16 bounds.
    pub fn add(&mut self, side: Color, from: Square, to: Square, value: i32) {
        let c = &mut self.counters[Self::index(side, from, to)];
        *c = (*c as i32 + value).clamp(i16::MIN as i32, i16::MAX as i32) as i16;
    }

    /// Resets every counter to zero.
    pub fn clear(&mut self) {
        self.counters.iter_mut().for_each(|c| *c = 0);
    }

    /// Merges another table into this one by saturating addition.
    pub fn merge_from(&mut self, other: &HistoryTable) {
        for (c, o) in self.counters.iter_mut().zip(&other.counters) {
            *c = (*c as i32 + *o as i32).clamp(i16::MIN as i32, i16::MAX as i32) as i16;
        }
    }
}

impl Default for HistoryTable {
    fn default() -> Self {
        Self::new()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Killer moves: up to two non-captures per ply that recently caused a beta cutoff.
#[derive(Debug, Clone)]
pub struct KillerTable {
    k1: [Option<Move>; MAX_PLY],
    k2: [Option<Move>; MAX_PLY],
}

impl KillerTable {
    /// Creates an empty killer table.
    pub fn new() -> KillerTable {
        KillerTable { k1: [None; MAX_PLY], k2: [None; MAX_PLY] }
    }

    /// Returns the two killers recorded at `ply`.
    pub fn get(&self, ply: usize) -> (Option<Move>, Option<Move>) {
        if ply < MAX_PLY {
            (self.k1[ply], self.k2[ply])
        } else {
            (None, None)
        }
    }

    /// Records a cutoff move at `ply`. A move already present is left in place; otherwise
    /// the old first killer becomes the second.
    pub fn add(&mut self, ply: usize, m: Move) {
        if ply >= MAX_PLY || self.k1[ply] == Some(m) || self.k2[ply] == Some(m) {
            return;
        }
        self.k2[ply] = self.k1[ply];
        self.k1[ply] = Some(m);
    }

    /// Forgets all killers.
    pub fn clear(&mut self) {
        self.k1 = [None; MAX_PLY];
        self.k2 = [None; MAX_PLY];
    }

    /// Merges another table into this one, keeping the first two distinct moves per ply
    /// and preferring this table's entries.
    pub fn merge_from(&mut self, other: &KillerTable) {
        for ply in 0..MAX_PLY {
            let candidates = [self.k1[ply], self.k2[ply], other.k1[ply], other.k2[ply]];
            let mut out = [None, None];
            for c in candidates.into_iter().flatten() {
                if out[0].is_none() {
                    out[0] = Some(c);
                } else if out[1].is_none() && out[0] != Some(c) {
                    out[1] = Some(c);
                }
            }
            self.k1[ply] = out[0];
            self.k2[ply] = out[1];
        }
    }
}

impl Default for KillerTable {
    fn default() -> Self {
        Self::new()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Indicates the kind of bound a transposition table entry carries.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Bound {
    /// The score lay strictly inside the (alpha, beta) window when it was written
    Exact,
    /// The score caused a beta cutoff and is a lower bound
    Lower,
    /// The score never exceeded the original alpha and is an upper bound
    Upper,
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// An entry in the transposition table.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TtEntry {
    /// The position's full Zobrist key
    pub key: u64,
    /// The score found when this entry was written
    pub score: i32,
    /// Remaining depth the score was searched to
    pub depth: u32,
    /// What kind of bound the score is
    pub bound: Bound,
    /// The best move found at this node, if any
    pub best: Option<Move>,
    /// Age counter; higher is more recent
    pub age: u16,
}

impl TtEntry {
    /// Returns true if the stored score may stand in for a search of `depth` remaining
    /// plies under the (alpha, beta) window: the entry must be at least as deep, and its
    /// bound must be conclusive for the window.
    pub fn score_usable(&self, depth: u32, alpha: i32, beta: i32) -> bool {
        self.depth >= depth
            && match self.bound {
                Bound::Exact => true,
                Bound::Lower => self.score >= beta,
                Bound::Upper => self.score <= alpha,
            }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// An open-addressed transposition table indexed by Zobrist key modulo table size.
#[derive(Debug, Clone)]
pub struct TransTable {
    slots: Vec<Option<TtEntry>>,
}

impl TransTable {
    /// Creates a table with room for `entries` entries (at least one).
    pub fn new(entries: usize) -> TransTable {
        TransTable { slots: vec![None; entries.max(1)] }
    }

    /// The number of slots in the table.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if the table has no slots (it never does).
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn index(&self, key: Zobrist) -> usize {
        (u64::from(key) % self.slots.len() as u64) as usize
    }

    /// Looks up the entry for `key`, if one is stored.
    pub fn probe(&self, key: Zobrist) -> Option<TtEntry> {
        self.slots[self.index(key)].filter(|e| e.key == u64::from(key))
    }

    /// Writes an entry, replacing the occupant only when the slot is empty, the new entry
    /// is deeper, or equally deep and newer. Otherwise the write is dropped.
    pub fn store(&mut self, key: Zobrist, score: i32, depth: u32, bound: Bound,
                 best: Option<Move>, age: u16) {
        let idx = self.index(key);
        let slot = &mut self.slots[idx];
        let replace = match slot {
            None => true,
            Some(e) => depth > e.depth || (depth == e.depth && age > e.age),
        };
        if replace {
            *slot = Some(TtEntry { key: u64::from(key), score, depth, bound, best, age });
        }
    }

    /// Empties the table without changing its size.
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = None);
    }

    /// Merges another table of the same size into this one, slot by slot, keeping
    /// whichever entry is deeper, or newer at equal depth.
    pub fn merge_from(&mut self, other: &TransTable) {
        debug_assert_eq!(self.slots.len(), other.slots.len());
        for (dst, src) in self.slots.iter_mut().zip(&other.slots) {
            let src = match src {
                Some(e) => e,
                None => continue,
            };
            let replace = match dst {
                None => true,
                Some(d) => src.depth > d.depth || (src.depth == d.depth && src.age > d.age),
            };
            if replace {
                *dst = Some(*src);
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Everything one worker needs to search: evaluation scratch space, its private history,
/// killers and transposition table, and the age stamp for new table entries.
#[derive(Debug)]
pub struct ThreadContext {
    /// Evaluation scratch state
    pub eval: EvalScratch,
    /// This worker's history counters
    pub history: HistoryTable,
    /// This worker's killer moves
    pub killers: KillerTable,
    /// This worker's transposition table
    pub tt: TransTable,
    /// Age written into new transposition entries
    pub age: u16,
}

impl ThreadContext {
    /// Creates a context with a transposition table of `tt_entries` slots.
    pub fn new(tt_entries: usize) -> ThreadContext {
        ThreadContext {
            eval: EvalScratch::new(),
            history: HistoryTable::new(),
            killers: KillerTable::new(),
            tt: TransTable::new(tt_entries),
            age: 0,
        }
    }

    /// Forgets everything learned so far.
    pub fn reset(&mut self) {
        self.history.clear();
        self.killers.clear();
        self.tt.clear();
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Heuristics shared across workers between depth iterations. Never touched during a
/// single-depth search; the coordinator merges worker contexts into it under a mutex once
/// a depth finishes.
#[derive(Debug)]
pub struct RootAggregate {
    /// Merged history counters
    pub history: HistoryTable,
    /// Merged killers
    pub killers: KillerTable,
    /// Merged transposition table
    pub tt: TransTable,
}

impl RootAggregate {
    /// Creates an empty aggregate whose table matches the workers' table size.
    pub fn new(tt_entries: usize) -> RootAggregate {
        RootAggregate {
            history: HistoryTable::new(),
            killers: KillerTable::new(),
            tt: TransTable::new(tt_entries),
        }
    }

    /// Folds one worker's context into the aggregate.
    pub fn absorb(&mut self, ctx: &ThreadContext) {
        self.history.merge_from(&ctx.history);
        self.killers.merge_from(&ctx.killers);
        self.tt.merge_from(&ctx.tt);
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use super::*;
    use crate::chess::Square;

    fn mv(from: Square, to: Square) -> Move {
        Move::new(from, to)
    }

    #[test]
    fn history_saturates_in_both_directions() {
        let mut h = HistoryTable::new();
        h.add(Color::White, Square::E2, Square::E4, 32_000);
        h.add(Color::White, Square::E2, Square::E4, 32_000);
        assert_eq!(h.get(Color::White, Square::E2, Square::E4), i16::MAX);
        h.add(Color::Black, Square::E7, Square::E5, -100_000);
        assert_eq!(h.get(Color::Black, Square::E7, Square::E5), i16::MIN);
    }

    #[test]
    fn killers_keep_the_two_most_recent_distinct_moves() {
        let mut k = KillerTable::new();
        let a = mv(Square::B1, Square::C3);
        let b = mv(Square::G1, Square::F3);
        let c = mv(Square::F1, Square::C4);

        k.add(3, a);
        assert_eq!(k.get(3), (Some(a), None));
        k.add(3, a);
        assert_eq!(k.get(3), (Some(a), None));
        k.add(3, b);
        assert_eq!(k.get(3), (Some(b), Some(a)));
        k.add(3, c);
        assert_eq!(k.get(3), (Some(c), Some(b)));
        assert_eq!(k.get(4), (None, None));
    }

    #[test]
    fn killer_merge_takes_the_union_of_the_best_two() {
        let mut a = KillerTable::new();
        let mut b = KillerTable::new();
        let m1 = mv(Square::B1, Square::C3);
        let m2 = mv(Square::G1, Square::F3);
        a.add(0, m1);
        b.add(0, m2);
        b.add(0, m1);
        a.merge_from(&b);
        assert_eq!(a.get(0), (Some(m1), Some(m2)));
    }

    #[test]
    fn table_replacement_prefers_deeper_then_newer() {
        let mut tt = TransTable::new(64);
        let key = Zobrist::compute(&crate::chess::Board::initial());

        tt.store(key, 10, 4, Bound::Exact, None, 1);
        assert_eq!(tt.probe(key).unwrap().score, 10);

        // shallower write is dropped
        tt.store(key, 99, 3, Bound::Exact, None, 2);
        assert_eq!(tt.probe(key).unwrap().score, 10);

        // equal depth but newer age replaces
        tt.store(key, 20, 4, Bound::Lower, None, 2);
        assert_eq!(tt.probe(key).unwrap().score, 20);

        // equal depth and equal age is dropped
        tt.store(key, 30, 4, Bound::Upper, None, 2);
        assert_eq!(tt.probe(key).unwrap().score, 20);

        // deeper always replaces
        tt.store(key, 40, 5, Bound::Exact, None, 0);
        assert_eq!(tt.probe(key).unwrap().score, 40);
    }

    #[test]
    fn stored_scores_are_usable_only_when_deep_and_conclusive() {
        let e = TtEntry { key: 1, score: 50, depth: 4, bound: Bound::Lower, best: None, age: 0 };
        assert!(e.score_usable(4, 0, 40));    // cutoff: score >= beta
        assert!(!e.score_usable(4, 0, 100));  // bound is inconclusive
        assert!(!e.score_usable(5, 0, 40));   // too shallow

        let e = TtEntry { bound: Bound::Exact, ..e };
        assert!(e.score_usable(4, 0, 100));
    }

    #[test]
    fn aggregate_absorbs_worker_contexts() {
        let mut agg = RootAggregate::new(64);
        let mut ctx = ThreadContext::new(64);
        let key = Zobrist::compute(&crate::chess::Board::initial());

        ctx.history.add(Color::White, Square::E2, Square::E4, 9);
        ctx.killers.add(1, mv(Square::B1, Square::C3));
        ctx.tt.store(key, 7, 3, Bound::Exact, None, 1);

        agg.absorb(&ctx);
        assert_eq!(agg.history.get(Color::White, Square::E2, Square::E4), 9);
        assert_eq!(agg.killers.get(1).0, Some(mv(Square::B1, Square::C3)));
        assert_eq!(agg.tt.probe(key).unwrap().score, 7);
    }
}
