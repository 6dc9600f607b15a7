// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Definite-assignment and reachability analysis.
//!
//! The engine is a stack of branching contexts, one per nested
//! control-flow construct. Each context tracks one usage vector per
//! potential path: per variable slot, whether the path has assigned the
//! variable (structure-typed variables track each field separately).
//!
//! Merging sibling paths is conservative: a variable counts as assigned
//! after the merge only if **every** merged path assigned it.
//! Reachability merges the other way — one falling-through path makes
//! the merge fall through; otherwise returning beats throwing beats
//! unreachable.
//!
//! Queries answer "assigned" when the engine is disabled, which is how
//! speculative (probe) resolution runs without flow state.

/// How a path ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reachability {
    /// Falls through to whatever comes next.
    FallsThrough,
    /// Every way through returns.
    Returns,
    /// Every way through throws.
    Throws,
    /// The path cannot be reached at all.
    Unreachable,
}

impl Reachability {
    /// Returns `true` if code after this point cannot execute.
    #[must_use]
    pub const fn is_terminated(self) -> bool {
        !matches!(self, Self::FallsThrough)
    }

    fn merge_siblings(a: Self, b: Self) -> Self {
        use Reachability as R;
        match (a, b) {
            (R::FallsThrough, _) | (_, R::FallsThrough) => R::FallsThrough,
            (R::Returns, _) | (_, R::Returns) => R::Returns,
            (R::Throws, _) | (_, R::Throws) => R::Throws,
            (R::Unreachable, R::Unreachable) => R::Unreachable,
        }
    }
}

/// Assignment state of one variable slot on one path.
#[derive(Debug, Clone, PartialEq, Eq)]
enum AssignState {
    Unassigned,
    Assigned,
    /// Structure-typed variable with per-field bits.
    Partial(Vec<bool>),
}

impl AssignState {
    fn is_fully_assigned(&self) -> bool {
        match self {
            Self::Unassigned => false,
            Self::Assigned => true,
            Self::Partial(fields) => fields.iter().all(|&set| set),
        }
    }

    fn intersect(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::Assigned, Self::Assigned) => Self::Assigned,
            (Self::Partial(a), Self::Partial(b)) => {
                Self::Partial(a.iter().zip(b).map(|(&x, &y)| x && y).collect())
            }
            (Self::Assigned, Self::Partial(p)) | (Self::Partial(p), Self::Assigned) => {
                Self::Partial(p.clone())
            }
            _ => Self::Unassigned,
        }
    }
}

/// The assignment/reachability state of one path.
#[derive(Debug, Clone)]
pub struct UsageVector {
    reachability: Reachability,
    slots: Vec<AssignState>,
}

impl UsageVector {
    fn new() -> Self {
        Self {
            reachability: Reachability::FallsThrough,
            slots: Vec::new(),
        }
    }

    fn slot_mut(&mut self, slot: u32) -> &mut AssignState {
        let index = slot as usize;
        if index >= self.slots.len() {
            self.slots.resize(index + 1, AssignState::Unassigned);
        }
        &mut self.slots[index]
    }

    fn slot(&self, slot: u32) -> &AssignState {
        self.slots
            .get(slot as usize)
            .unwrap_or(&AssignState::Unassigned)
    }

    /// Sibling merge: intersect assignments, widen reachability.
    fn merge_sibling(&self, other: &Self) -> Self {
        let len = self.slots.len().max(other.slots.len());
        let slots = (0..len)
            .map(|index| {
                let slot = u32::try_from(index).expect("slot index fits u32");
                self.slot(slot).intersect(other.slot(slot))
            })
            .collect();
        Self {
            reachability: Reachability::merge_siblings(self.reachability, other.reachability),
            slots,
        }
    }
}

/// The kind of control-flow context a branching models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchingKind {
    /// The method body or a plain block.
    Block,
    /// A loop; the body may run zero times unless post-tested.
    Loop,
    /// One `Select Case` statement.
    Switch,
    /// A `Try`/`Catch` statement.
    TryCatch,
}

/// One nested control-flow context.
#[derive(Debug)]
struct FlowBranching {
    kind: BranchingKind,
    /// State on entry, the starting point of every sibling path.
    entry: UsageVector,
    /// The path currently being resolved.
    current: UsageVector,
    /// Finished sibling paths awaiting the merge.
    completed: Vec<UsageVector>,
}

/// The flow-analysis engine for one method body.
#[derive(Debug)]
pub struct FlowAnalysis {
    stack: Vec<FlowBranching>,
    enabled: bool,
}

impl FlowAnalysis {
    /// Creates an engine. A disabled engine answers every assignment
    /// query with "assigned" and records nothing.
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        let root = UsageVector::new();
        Self {
            stack: vec![FlowBranching {
                kind: BranchingKind::Block,
                entry: root.clone(),
                current: root,
                completed: Vec::new(),
            }],
            enabled,
        }
    }

    /// Returns `true` when the engine records state.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn top(&mut self) -> &mut FlowBranching {
        self.stack.last_mut().expect("flow stack is never empty")
    }

    /// Enters a nested control-flow context.
    pub fn push_branching(&mut self, kind: BranchingKind) {
        if !self.enabled {
            return;
        }
        let entry = self.top().current.clone();
        self.stack.push(FlowBranching {
            kind,
            entry: entry.clone(),
            current: entry,
            completed: Vec::new(),
        });
    }

    /// Finishes the current sibling path and starts the next one from
    /// the branching's entry state.
    pub fn branch(&mut self) {
        if !self.enabled {
            return;
        }
        let entry = self.top().entry.clone();
        let branching = self.top();
        let finished = std::mem::replace(&mut branching.current, entry);
        branching.completed.push(finished);
    }

    /// Leaves a context, merging its sibling paths into the parent.
    ///
    /// With `may_skip` the merge also includes the entry state — the
    /// construct might not execute at all (a pre-tested loop, a
    /// `Select` without `Case Else`).
    pub fn pop_branching(&mut self, may_skip: bool) -> Reachability {
        if !self.enabled {
            return Reachability::FallsThrough;
        }
        let branching = self.stack.pop().expect("pop matches a push");
        let mut merged = branching.current;
        for path in &branching.completed {
            merged = merged.merge_sibling(path);
        }
        if may_skip {
            merged = merged.merge_sibling(&branching.entry);
        }
        let result = merged.reachability;
        let parent = self.top();
        parent.current = merged;
        // The construct as a whole was reached, so what follows it is
        // reachable unless every path out of it terminated.
        if !result.is_terminated() {
            parent.current.reachability = Reachability::FallsThrough;
        }
        result
    }

    /// Records an assignment of the whole variable.
    pub fn report_assignment(&mut self, slot: i32) {
        let Ok(slot) = u32::try_from(slot) else {
            return; // untracked variable
        };
        if !self.enabled {
            return;
        }
        *self.top().current.slot_mut(slot) = AssignState::Assigned;
    }

    /// Records an assignment of one field of a structure-typed
    /// variable.
    pub fn report_member_assignment(&mut self, slot: i32, member: u32, member_count: u32) {
        let Ok(slot) = u32::try_from(slot) else {
            return;
        };
        if !self.enabled {
            return;
        }
        let state = self.top().current.slot_mut(slot);
        let mut fields = match state {
            AssignState::Partial(fields) => fields.clone(),
            AssignState::Assigned => return,
            AssignState::Unassigned => vec![false; member_count as usize],
        };
        if let Some(bit) = fields.get_mut(member as usize) {
            *bit = true;
        }
        *state = if fields.iter().all(|&set| set) {
            AssignState::Assigned
        } else {
            AssignState::Partial(fields)
        };
    }

    /// Whether the variable is definitely assigned on the current path.
    /// Untracked slots and a disabled engine answer `true`.
    #[must_use]
    pub fn is_assigned(&self, slot: i32) -> bool {
        let Ok(slot) = u32::try_from(slot) else {
            return true;
        };
        if !self.enabled {
            return true;
        }
        self.stack
            .last()
            .expect("flow stack is never empty")
            .current
            .slot(slot)
            .is_fully_assigned()
    }

    /// Reachability of the current path.
    #[must_use]
    pub fn current_reachability(&self) -> Reachability {
        if !self.enabled {
            return Reachability::FallsThrough;
        }
        self.stack
            .last()
            .expect("flow stack is never empty")
            .current
            .reachability
    }

    /// Marks the current path as ending in a return.
    pub fn mark_returns(&mut self) {
        if self.enabled {
            self.top().current.reachability = Reachability::Returns;
        }
    }

    /// Marks the current path as ending in a throw.
    pub fn mark_throws(&mut self) {
        if self.enabled {
            self.top().current.reachability = Reachability::Throws;
        }
    }

    /// A label makes the code after it reachable again — someone may
    /// jump to it.
    pub fn reset_reachability(&mut self) {
        if self.enabled {
            self.top().current.reachability = Reachability::FallsThrough;
        }
    }

    /// A jump (`GoTo`, `Exit For`) leaves the current path; whatever
    /// follows it on this path cannot run.
    pub fn mark_unreachable_after_jump(&mut self) {
        if self.enabled {
            self.top().current.reachability = Reachability::Unreachable;
        }
    }

    /// The innermost branching kind, for `Exit` validation.
    #[must_use]
    pub fn innermost_kind(&self) -> BranchingKind {
        self.stack
            .last()
            .expect("flow stack is never empty")
            .kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignment_in_one_arm_does_not_survive_the_merge() {
        let mut flow = FlowAnalysis::new(true);
        flow.push_branching(BranchingKind::Block);
        flow.report_assignment(0); // the If arm assigns
        flow.branch();
        // The Else arm does not assign.
        flow.pop_branching(false);
        assert!(!flow.is_assigned(0));
    }

    #[test]
    fn assignment_in_every_arm_survives_the_merge() {
        let mut flow = FlowAnalysis::new(true);
        flow.push_branching(BranchingKind::Block);
        flow.report_assignment(0);
        flow.branch();
        flow.report_assignment(0);
        flow.pop_branching(false);
        assert!(flow.is_assigned(0));
    }

    #[test]
    fn skippable_construct_merges_with_entry() {
        let mut flow = FlowAnalysis::new(true);
        flow.push_branching(BranchingKind::Loop);
        flow.report_assignment(0);
        // A pre-tested loop may run zero times.
        flow.pop_branching(true);
        assert!(!flow.is_assigned(0));
    }

    #[test]
    fn assignment_before_a_branching_is_kept() {
        let mut flow = FlowAnalysis::new(true);
        flow.report_assignment(1);
        flow.push_branching(BranchingKind::Block);
        flow.branch();
        flow.pop_branching(false);
        assert!(flow.is_assigned(1));
    }

    #[test]
    fn try_catch_reassignment_is_not_double_counted() {
        // A variable assigned in Try and reassigned in Catch is
        // assigned after the merge exactly once; the Catch path starts
        // from the entry state, not from the Try's end state.
        let mut flow = FlowAnalysis::new(true);
        flow.report_assignment(0);
        flow.push_branching(BranchingKind::TryCatch);
        flow.report_assignment(1); // try assigns v
        flow.branch();
        flow.report_assignment(1); // catch reassigns v
        flow.pop_branching(false);
        assert!(flow.is_assigned(0));
        assert!(flow.is_assigned(1));
    }

    #[test]
    fn catch_does_not_see_try_assignments() {
        let mut flow = FlowAnalysis::new(true);
        flow.push_branching(BranchingKind::TryCatch);
        flow.report_assignment(0);
        assert!(flow.is_assigned(0));
        flow.branch();
        // Inside the catch, the try's assignment may not have happened.
        assert!(!flow.is_assigned(0));
        flow.pop_branching(false);
    }

    #[test]
    fn reachability_merge_prefers_fallthrough() {
        let mut flow = FlowAnalysis::new(true);
        flow.push_branching(BranchingKind::Block);
        flow.mark_returns();
        flow.branch();
        // Second arm falls through.
        let result = flow.pop_branching(false);
        assert_eq!(result, Reachability::FallsThrough);
        assert_eq!(flow.current_reachability(), Reachability::FallsThrough);
    }

    #[test]
    fn all_paths_returning_terminates_the_merge() {
        let mut flow = FlowAnalysis::new(true);
        flow.push_branching(BranchingKind::Block);
        flow.mark_returns();
        flow.branch();
        flow.mark_throws();
        let result = flow.pop_branching(false);
        assert_eq!(result, Reachability::Returns);
        assert!(flow.current_reachability().is_terminated());
    }

    #[test]
    fn label_resets_unreachable_code() {
        let mut flow = FlowAnalysis::new(true);
        flow.mark_returns();
        assert!(flow.current_reachability().is_terminated());
        flow.reset_reachability();
        assert_eq!(flow.current_reachability(), Reachability::FallsThrough);
    }

    #[test]
    fn structure_fields_assign_individually() {
        let mut flow = FlowAnalysis::new(true);
        flow.report_member_assignment(0, 0, 2);
        assert!(!flow.is_assigned(0));
        flow.report_member_assignment(0, 1, 2);
        assert!(flow.is_assigned(0));
    }

    #[test]
    fn partial_assignments_intersect_by_field() {
        let mut flow = FlowAnalysis::new(true);
        flow.push_branching(BranchingKind::Block);
        flow.report_member_assignment(0, 0, 2);
        flow.report_member_assignment(0, 1, 2);
        flow.branch();
        flow.report_member_assignment(0, 0, 2);
        flow.pop_branching(false);
        // Field 0 assigned on both paths, field 1 only on the first.
        assert!(!flow.is_assigned(0));
        flow.report_member_assignment(0, 1, 2);
        assert!(flow.is_assigned(0));
    }

    #[test]
    fn disabled_engine_answers_assigned() {
        let mut flow = FlowAnalysis::new(false);
        assert!(flow.is_assigned(0));
        flow.push_branching(BranchingKind::Block);
        flow.pop_branching(false);
        assert_eq!(flow.current_reachability(), Reachability::FallsThrough);
    }

    #[test]
    fn untracked_slots_answer_assigned() {
        let flow = FlowAnalysis::new(true);
        assert!(flow.is_assigned(-1));
    }
}
