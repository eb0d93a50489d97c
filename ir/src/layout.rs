//! Function layout: the order of blocks, and of instructions within a block.
//!
//! Adapted from Cranelift's `ir::layout`, trimmed to what this rewriter needs.
//! The upstream `Layout` also assigns sequence numbers to every instruction so
//! that "does A come before B" can be answered in O(1) for arbitrary A/B,
//! which register allocation and scheduling need. Nothing in this rewriter
//! ever asks that question: every value it creates is consumed immediately
//! next to its definition, by construction, so a plain doubly linked list
//! (no sequence numbers) is enough.

use crate::entities::{Block, Inst};
use cranelift_entity::packed_option::PackedOption;
use cranelift_entity::SecondaryMap;

#[derive(Clone, Copy, Default)]
struct BlockNode {
    prev: PackedOption<Block>,
    next: PackedOption<Block>,
    first_inst: PackedOption<Inst>,
    last_inst: PackedOption<Inst>,
}

#[derive(Clone, Copy, Default)]
struct InstNode {
    block: PackedOption<Block>,
    prev: PackedOption<Inst>,
    next: PackedOption<Inst>,
}

/// The order of blocks in a function, and of instructions within each block.
#[derive(Default, Clone)]
pub struct Layout {
    blocks: SecondaryMap<Block, BlockNode>,
    insts: SecondaryMap<Inst, InstNode>,
    first_block: PackedOption<Block>,
    last_block: PackedOption<Block>,
}

impl Layout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `block` to the end of the function.
    pub fn append_block(&mut self, block: Block) {
        debug_assert!(self.blocks[block].prev.is_none() && self.blocks[block].next.is_none());
        match self.last_block.expand() {
            None => self.first_block = block.into(),
            Some(prev) => {
                self.blocks[prev].next = block.into();
                self.blocks[block].prev = prev.into();
            }
        }
        self.last_block = block.into();
    }

    pub fn is_block_inserted(&self, block: Block) -> bool {
        self.first_block.expand() == Some(block) || self.blocks[block].prev.is_some()
    }

    pub fn entry_block(&self) -> Option<Block> {
        self.first_block.expand()
    }

    pub fn next_block(&self, block: Block) -> Option<Block> {
        self.blocks[block].next.expand()
    }

    /// Iterate over blocks in layout order.
    pub fn blocks(&self) -> Blocks<'_> {
        Blocks {
            layout: self,
            next: self.first_block.expand(),
        }
    }

    /// Which block `inst` has been placed in, if any.
    pub fn inst_block(&self, inst: Inst) -> Option<Block> {
        self.insts[inst].block.expand()
    }

    /// Append `inst` to the end of `block`.
    pub fn append_inst(&mut self, inst: Inst, block: Block) {
        debug_assert!(self.inst_block(inst).is_none());
        let last = self.blocks[block].last_inst;
        self.insts[inst].block = block.into();
        self.insts[inst].prev = last;
        match last.expand() {
            None => self.blocks[block].first_inst = inst.into(),
            Some(prev) => self.insts[prev].next = inst.into(),
        }
        self.blocks[block].last_inst = inst.into();
    }

    /// Insert `inst` immediately after `after`, in `after`'s block.
    pub fn insert_inst_after(&mut self, inst: Inst, after: Inst) {
        debug_assert!(self.inst_block(inst).is_none());
        let block = self
            .inst_block(after)
            .expect("anchor instruction not in layout");
        let next = self.insts[after].next;
        self.insts[inst].block = block.into();
        self.insts[inst].prev = after.into();
        self.insts[inst].next = next;
        self.insts[after].next = inst.into();
        match next.expand() {
            Some(n) => self.insts[n].prev = inst.into(),
            None => self.blocks[block].last_inst = inst.into(),
        }
    }

    /// Insert `inst` at the start of `block`, before any existing instruction.
    pub fn prepend_inst(&mut self, inst: Inst, block: Block) {
        debug_assert!(self.inst_block(inst).is_none());
        let first = self.blocks[block].first_inst;
        self.insts[inst].block = block.into();
        self.insts[inst].prev = None.into();
        self.insts[inst].next = first;
        match first.expand() {
            None => self.blocks[block].last_inst = inst.into(),
            Some(f) => self.insts[f].prev = inst.into(),
        }
        self.blocks[block].first_inst = inst.into();
    }

    /// Insert `inst` immediately before `before`, in `before`'s block.
    pub fn insert_inst_before(&mut self, inst: Inst, before: Inst) {
        match self.prev_inst(before) {
            Some(prev) => self.insert_inst_after(inst, prev),
            None => {
                let block = self
                    .inst_block(before)
                    .expect("anchor instruction not in layout");
                self.prepend_inst(inst, block);
            }
        }
    }

    /// Remove `inst` from the layout, without touching its dfg entry.
    pub fn remove_inst(&mut self, inst: Inst) {
        let block = self.inst_block(inst).expect("instruction already removed");
        let prev = self.insts[inst].prev;
        let next = self.insts[inst].next;
        self.insts[inst] = InstNode::default();
        match prev.expand() {
            None => self.blocks[block].first_inst = next,
            Some(p) => self.insts[p].next = next,
        }
        match next.expand() {
            None => self.blocks[block].last_inst = prev,
            Some(n) => self.insts[n].prev = prev,
        }
    }

    pub fn first_inst(&self, block: Block) -> Option<Inst> {
        self.blocks[block].first_inst.expand()
    }

    pub fn last_inst(&self, block: Block) -> Option<Inst> {
        self.blocks[block].last_inst.expand()
    }

    pub fn next_inst(&self, inst: Inst) -> Option<Inst> {
        self.insts[inst].next.expand()
    }

    pub fn prev_inst(&self, inst: Inst) -> Option<Inst> {
        self.insts[inst].prev.expand()
    }

    /// Iterate over the instructions of `block` in layout order.
    pub fn block_insts(&self, block: Block) -> Insts<'_> {
        Insts {
            layout: self,
            next: self.blocks[block].first_inst.expand(),
        }
    }
}

/// Forward iterator over the blocks of a function.
pub struct Blocks<'f> {
    layout: &'f Layout,
    next: Option<Block>,
}

impl Iterator for Blocks<'_> {
    type Item = Block;
    fn next(&mut self) -> Option<Block> {
        let block = self.next?;
        self.next = self.layout.next_block(block);
        Some(block)
    }
}

/// Forward iterator over the instructions of a block.
pub struct Insts<'f> {
    layout: &'f Layout,
    next: Option<Inst>,
}

impl Iterator for Insts<'_> {
    type Item = Inst;
    fn next(&mut self) -> Option<Inst> {
        let inst = self.next?;
        self.next = self.layout.next_inst(inst);
        Some(inst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cranelift_entity::PrimaryMap;

    #[test]
    fn append_and_iterate_blocks() {
        let mut blocks: PrimaryMap<Block, ()> = PrimaryMap::new();
        let mut layout = Layout::new();
        let b0 = blocks.push(());
        let b1 = blocks.push(());
        layout.append_block(b0);
        layout.append_block(b1);
        assert_eq!(layout.blocks().collect::<Vec<_>>(), vec![b0, b1]);
    }

    #[test]
    fn insert_after_splices_into_the_middle() {
        let mut blocks: PrimaryMap<Block, ()> = PrimaryMap::new();
        let mut insts: PrimaryMap<Inst, ()> = PrimaryMap::new();
        let mut layout = Layout::new();
        let b0 = blocks.push(());
        layout.append_block(b0);
        let i0 = insts.push(());
        let i1 = insts.push(());
        let i2 = insts.push(());
        layout.append_inst(i0, b0);
        layout.append_inst(i2, b0);
        layout.insert_inst_after(i1, i0);
        assert_eq!(layout.block_insts(b0).collect::<Vec<_>>(), vec![i0, i1, i2]);
    }

    #[test]
    fn remove_inst_unlinks_from_either_end() {
        let mut blocks: PrimaryMap<Block, ()> = PrimaryMap::new();
        let mut insts: PrimaryMap<Inst, ()> = PrimaryMap::new();
        let mut layout = Layout::new();
        let b0 = blocks.push(());
        layout.append_block(b0);
        let i0 = insts.push(());
        let i1 = insts.push(());
        layout.append_inst(i0, b0);
        layout.append_inst(i1, b0);
        layout.remove_inst(i0);
        assert_eq!(layout.block_insts(b0).collect::<Vec<_>>(), vec![i1]);
    }
}
