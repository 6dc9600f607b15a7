// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Statement scopes.
//!
//! A method body is a tree of blocks: the body itself is the root,
//! and every `If` arm, loop body, `Case` section, and `Try` region gets
//! a child block. Blocks introduced by the compiler (loop bodies that
//! exist only to scope a synthesized variable, for example) are marked
//! *implicit*; label duplicate checking walks through implicit blocks to
//! the nearest explicit one, while label shadow checking looks at the
//! rest of the tree, and the two produce distinct diagnostics.
//!
//! Variable slot numbers index the flow-analysis assignment vectors.
//! A block's variables receive a contiguous slot range after its
//! parent's, and a variable whose declared type failed to resolve gets
//! slot `-1` — excluded from flow tracking without poisoning the rest of
//! the block.

use ecow::EcoString;

use crate::source_analysis::Location;

use super::constants::ConstantValue;
use super::declaration_space::{DeclarationSpace, DeclareResult};
use super::types::TypeId;

/// A block identity within one method's [`BlockTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(u32);

impl BlockId {
    /// The method body's root block.
    pub const ROOT: Self = Self(0);

    const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A local variable with its flow-analysis slot.
#[derive(Debug, Clone)]
pub struct LocalVariable {
    /// The declared name.
    pub name: EcoString,
    /// The resolved type; `None` when the declared type failed.
    pub ty: Option<TypeId>,
    /// The block that declares the variable.
    pub block: BlockId,
    /// Location of the declaring name token.
    pub location: Location,
    /// Flow-analysis slot, or `-1` when untracked.
    pub slot: i32,
    /// Number of individually tracked members for structure-typed
    /// variables; `0` for everything else.
    pub struct_member_count: u32,
}

/// What a name in a block resolves to.
#[derive(Debug, Clone)]
pub enum LocalSymbol {
    /// A variable, by index into [`BlockTree::variables`].
    Variable(usize),
    /// A local constant; `value` is `None` when its initializer failed.
    Constant {
        ty: Option<TypeId>,
        value: Option<ConstantValue>,
    },
}

/// The outcome of declaring a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelOutcome {
    /// The label is new.
    Ok,
    /// The label already exists in the same (explicit) scope region.
    Duplicate,
    /// The label exists in an enclosing or nested block.
    Shadows,
}

#[derive(Debug)]
struct Block {
    parent: Option<BlockId>,
    children: Vec<BlockId>,
    explicit: bool,
    names: DeclarationSpace<LocalSymbol>,
    labels: Vec<EcoString>,
}

/// The block tree for one method body.
#[derive(Debug)]
pub struct BlockTree {
    blocks: Vec<Block>,
    /// All declared variables, indexed by [`LocalSymbol::Variable`].
    pub variables: Vec<LocalVariable>,
    next_slot: u32,
}

impl BlockTree {
    /// Creates a tree holding only the explicit root block.
    #[must_use]
    pub fn new() -> Self {
        Self {
            blocks: vec![Block {
                parent: None,
                children: Vec::new(),
                explicit: true,
                names: DeclarationSpace::new(),
                labels: Vec::new(),
            }],
            variables: Vec::new(),
            next_slot: 0,
        }
    }

    /// Opens a child block.
    pub fn push_block(&mut self, parent: BlockId, explicit: bool) -> BlockId {
        let id = BlockId(u32::try_from(self.blocks.len()).expect("block count fits u32"));
        self.blocks.push(Block {
            parent: Some(parent),
            children: Vec::new(),
            explicit,
            names: DeclarationSpace::new(),
            labels: Vec::new(),
        });
        self.blocks[parent.index()].children.push(id);
        id
    }

    /// Declares a variable in `block`. On success the declaration is
    /// propagated to every ancestor as a child claim, which is what
    /// rejects a later same-named declaration further out.
    pub fn declare_variable(
        &mut self,
        block: BlockId,
        name: &str,
        ty: Option<TypeId>,
        struct_member_count: u32,
        location: Location,
    ) -> Result<usize, DeclareResult> {
        let index = self.variables.len();
        let result = self.blocks[block.index()]
            .names
            .declare(name, LocalSymbol::Variable(index));
        if !result.is_ok() {
            return Err(result);
        }
        let slot = match ty {
            Some(_) => {
                let slot = i32::try_from(self.next_slot).expect("slot count fits i32");
                self.next_slot += 1;
                slot
            }
            None => -1,
        };
        self.variables.push(LocalVariable {
            name: EcoString::from(name),
            ty,
            block,
            location,
            slot,
            struct_member_count,
        });
        self.claim_in_ancestors(block, name);
        Ok(index)
    }

    /// Declares a local constant in `block`.
    pub fn declare_constant(
        &mut self,
        block: BlockId,
        name: &str,
        ty: Option<TypeId>,
        value: Option<ConstantValue>,
    ) -> DeclareResult {
        let result = self.blocks[block.index()]
            .names
            .declare(name, LocalSymbol::Constant { ty, value });
        if result.is_ok() {
            self.claim_in_ancestors(block, name);
        }
        result
    }

    fn claim_in_ancestors(&mut self, block: BlockId, name: &str) {
        let mut current = self.blocks[block.index()].parent;
        while let Some(id) = current {
            self.blocks[id.index()].names.mark_used_in_child(name);
            current = self.blocks[id.index()].parent;
        }
    }

    /// Looks up a name from `block` outward.
    #[must_use]
    pub fn lookup(&self, block: BlockId, name: &str) -> Option<&LocalSymbol> {
        let mut current = Some(block);
        while let Some(id) = current {
            if let Some(symbol) = self.blocks[id.index()].names.lookup(name) {
                return Some(symbol);
            }
            current = self.blocks[id.index()].parent;
        }
        None
    }

    /// Declares a label on `block`.
    ///
    /// The duplicate check walks up through implicit blocks to the
    /// nearest explicit block; the shadow check covers the rest of the
    /// tree (further ancestors and all descendants).
    pub fn declare_label(&mut self, block: BlockId, name: &str) -> LabelOutcome {
        // Duplicate region: this block, then implicit ancestors up to
        // and including the nearest explicit block.
        let mut region = vec![block];
        let mut current = block;
        while !self.blocks[current.index()].explicit {
            let Some(parent) = self.blocks[current.index()].parent else {
                break;
            };
            region.push(parent);
            current = parent;
        }
        for &id in &region {
            if self.has_label(id, name) {
                return LabelOutcome::Duplicate;
            }
        }

        // Shadow region: every remaining ancestor, and every descendant
        // of this block.
        let mut current = self.blocks[region[region.len() - 1].index()].parent;
        while let Some(id) = current {
            if self.has_label(id, name) {
                return LabelOutcome::Shadows;
            }
            current = self.blocks[id.index()].parent;
        }
        if self.subtree_has_label(block, name) {
            return LabelOutcome::Shadows;
        }

        self.blocks[block.index()].labels.push(EcoString::from(name));
        LabelOutcome::Ok
    }

    fn has_label(&self, block: BlockId, name: &str) -> bool {
        self.blocks[block.index()]
            .labels
            .iter()
            .any(|label| label.eq_ignore_ascii_case(name))
    }

    fn subtree_has_label(&self, block: BlockId, name: &str) -> bool {
        let data = &self.blocks[block.index()];
        data.children
            .iter()
            .any(|&child| self.has_label(child, name) || self.subtree_has_label(child, name))
    }

    /// Returns `true` if the label exists anywhere in the method, for
    /// `GoTo` target resolution (labels are method-scoped).
    #[must_use]
    pub fn label_exists(&self, name: &str) -> bool {
        self.blocks
            .iter()
            .any(|block| block.labels.iter().any(|l| l.eq_ignore_ascii_case(name)))
    }

    /// Total number of flow-analysis slots handed out.
    #[must_use]
    pub const fn slot_count(&self) -> u32 {
        self.next_slot
    }

    /// The variable behind a symbol, if it is one.
    #[must_use]
    pub fn variable(&self, symbol: &LocalSymbol) -> Option<&LocalVariable> {
        match symbol {
            LocalSymbol::Variable(index) => self.variables.get(*index),
            LocalSymbol::Constant { .. } => None,
        }
    }
}

impl Default for BlockTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declare(tree: &mut BlockTree, block: BlockId, name: &str) -> Result<usize, DeclareResult> {
        tree.declare_variable(block, name, Some(TypeId::new(1)), 0, Location::NULL)
    }

    #[test]
    fn outer_then_inner_shadow_is_allowed() {
        let mut tree = BlockTree::new();
        let inner = tree.push_block(BlockId::ROOT, true);
        assert!(declare(&mut tree, BlockId::ROOT, "x").is_ok());
        assert!(declare(&mut tree, inner, "x").is_ok());
        // The inner declaration wins from the inner block.
        let symbol = tree.lookup(inner, "x").unwrap();
        let variable = tree.variable(symbol).unwrap();
        assert_eq!(variable.block, inner);
    }

    #[test]
    fn inner_then_outer_is_rejected() {
        let mut tree = BlockTree::new();
        let inner = tree.push_block(BlockId::ROOT, true);
        assert!(declare(&mut tree, inner, "x").is_ok());
        assert_eq!(
            declare(&mut tree, BlockId::ROOT, "x"),
            Err(DeclareResult::UsedInChildScope)
        );
    }

    #[test]
    fn deep_child_claims_reach_every_ancestor() {
        let mut tree = BlockTree::new();
        let mid = tree.push_block(BlockId::ROOT, false);
        let deep = tree.push_block(mid, false);
        assert!(declare(&mut tree, deep, "v").is_ok());
        assert_eq!(
            declare(&mut tree, mid, "v"),
            Err(DeclareResult::UsedInChildScope)
        );
        assert_eq!(
            declare(&mut tree, BlockId::ROOT, "v"),
            Err(DeclareResult::UsedInChildScope)
        );
    }

    #[test]
    fn duplicate_in_same_block_is_name_exists() {
        let mut tree = BlockTree::new();
        assert!(declare(&mut tree, BlockId::ROOT, "x").is_ok());
        assert_eq!(
            declare(&mut tree, BlockId::ROOT, "X"),
            Err(DeclareResult::NameExists)
        );
    }

    #[test]
    fn slots_are_contiguous_and_skip_failed_types() {
        let mut tree = BlockTree::new();
        let a = declare(&mut tree, BlockId::ROOT, "a").unwrap();
        let broken = tree
            .declare_variable(BlockId::ROOT, "broken", None, 0, Location::NULL)
            .unwrap();
        let inner = tree.push_block(BlockId::ROOT, true);
        let b = declare(&mut tree, inner, "b").unwrap();

        assert_eq!(tree.variables[a].slot, 0);
        assert_eq!(tree.variables[broken].slot, -1);
        assert_eq!(tree.variables[b].slot, 1);
        assert_eq!(tree.slot_count(), 2);
    }

    #[test]
    fn labels_duplicate_through_implicit_blocks() {
        let mut tree = BlockTree::new();
        // Root is explicit; the loop body is implicit.
        let body = tree.push_block(BlockId::ROOT, false);
        assert_eq!(tree.declare_label(BlockId::ROOT, "again"), LabelOutcome::Ok);
        assert_eq!(
            tree.declare_label(body, "Again"),
            LabelOutcome::Duplicate,
            "implicit chain reaches the explicit root"
        );
    }

    #[test]
    fn labels_shadow_across_explicit_boundaries() {
        let mut tree = BlockTree::new();
        let explicit_child = tree.push_block(BlockId::ROOT, true);
        assert_eq!(tree.declare_label(BlockId::ROOT, "out"), LabelOutcome::Ok);
        assert_eq!(
            tree.declare_label(explicit_child, "out"),
            LabelOutcome::Shadows
        );
    }

    #[test]
    fn labels_shadow_from_descendants() {
        let mut tree = BlockTree::new();
        let child = tree.push_block(BlockId::ROOT, true);
        assert_eq!(tree.declare_label(child, "inner"), LabelOutcome::Ok);
        assert_eq!(
            tree.declare_label(BlockId::ROOT, "inner"),
            LabelOutcome::Shadows
        );
    }

    #[test]
    fn goto_finds_labels_anywhere_in_the_method() {
        let mut tree = BlockTree::new();
        let child = tree.push_block(BlockId::ROOT, false);
        tree.declare_label(child, "done");
        assert!(tree.label_exists("DONE"));
        assert!(!tree.label_exists("missing"));
    }

    #[test]
    fn constants_participate_in_scoping() {
        let mut tree = BlockTree::new();
        assert!(
            tree.declare_constant(BlockId::ROOT, "limit", None, None)
                .is_ok()
        );
        assert_eq!(
            tree.declare_constant(BlockId::ROOT, "LIMIT", None, None),
            DeclareResult::NameExists
        );
        assert!(matches!(
            tree.lookup(BlockId::ROOT, "limit"),
            Some(LocalSymbol::Constant { .. })
        ));
    }
}
