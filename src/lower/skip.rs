//! Structured control flow over relative skips.
//!
//! Every forward skip is emitted with an unknown count and patched once its
//! guarded region is complete. Backward skips are emitted with a known count
//! because the loop start is already behind them.

use log::trace;

use crate::action::{Action, ActionList, CompareOp, Element, SkipRef};

use super::error::LowerError;
use super::variable::Variable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Unset,
    Setup,
    Guarded,
    Epilogue,
    Finished,
}

fn expect_state(actual: BuildState, wanted: BuildState, step: &str) -> Result<(), LowerError> {
    if actual != wanted {
        return Err(LowerError::invariant(format!(
            "{} called in state {:?}, expected {:?}",
            step, actual, wanted
        )));
    }
    Ok(())
}

// =============================================================================
// IF
// =============================================================================

/// One guarded block: `SkipIf(!condition, ?) body`.
#[derive(Debug)]
pub struct IfBuilder {
    state: BuildState,
    exit: Option<SkipRef>,
}

impl Default for IfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl IfBuilder {
    pub fn new() -> Self {
        Self {
            state: BuildState::Unset,
            exit: None,
        }
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    pub fn setup(&mut self, list: &mut ActionList, condition: Element) -> Result<(), LowerError> {
        expect_state(self.state, BuildState::Unset, "if setup")?;
        self.exit = Some(list.push_skip(Some(condition.negate())));
        self.state = BuildState::Setup;
        Ok(())
    }

    pub fn finish(&mut self, list: &mut ActionList) -> Result<(), LowerError> {
        expect_state(self.state, BuildState::Setup, "if finish")?;
        let exit = self
            .exit
            .take()
            .ok_or_else(|| LowerError::invariant("if finished without an exit skip"))?;
        list.resolve_here(exit)?;
        self.state = BuildState::Finished;
        Ok(())
    }
}

/// Skips from the end of each taken branch of an `if` / `else if` chain to
/// the end of the whole chain.
#[derive(Debug, Default)]
pub struct IfChain {
    ends: Vec<SkipRef>,
}

impl IfChain {
    pub fn new() -> Self {
        Self { ends: Vec::new() }
    }

    pub fn skip_to_end(&mut self, list: &mut ActionList) {
        self.ends.push(list.push_skip(None));
    }

    pub fn finish(self, list: &mut ActionList) -> Result<(), LowerError> {
        for end in self.ends {
            list.resolve_here(end)?;
        }
        Ok(())
    }
}

// =============================================================================
// LOOP FRAMES (continuation counter)
// =============================================================================

/// Bookkeeping of one loop under construction.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopFrame {
    /// First action of the condition; the backward skip lands here.
    pub start: usize,
    /// Scopes open when the loop began. Early exits pop every scope above.
    pub scope_depth: usize,
    continues: Vec<SkipRef>,
    breaks: Vec<SkipRef>,
}

impl LoopFrame {
    pub fn new(start: usize, scope_depth: usize) -> Self {
        Self {
            start,
            scope_depth,
            continues: Vec::new(),
            breaks: Vec::new(),
        }
    }
}

/// Stack of enclosing loops. `break n` / `continue n` address the n-th loop
/// outward from the innermost one.
#[derive(Debug, Default)]
pub struct ContinueSkip {
    frames: Vec<LoopFrame>,
}

impl ContinueSkip {
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn push(&mut self, frame: LoopFrame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Result<LoopFrame, LowerError> {
        self.frames
            .pop()
            .ok_or_else(|| LowerError::invariant("loop finished with no open loop frame"))
    }

    fn index(&self, depth: u32, floor: usize, what: &str) -> Result<usize, LowerError> {
        let depth = depth as usize;
        match self.frames.len().checked_sub(depth + 1) {
            Some(index) if index >= floor => Ok(index),
            _ => Err(LowerError::unsupported(
                format!("{} {}", what, depth),
                "there is no enclosing loop at that depth",
            )),
        }
    }

    /// Frame `depth` loops out. Loops below `floor` belong to an enclosing
    /// method and cannot be left from here.
    pub fn frame(&self, depth: u32, floor: usize, what: &str) -> Result<&LoopFrame, LowerError> {
        let index = self.index(depth, floor, what)?;
        Ok(&self.frames[index])
    }

    pub fn add_break(&mut self, depth: u32, floor: usize, skip: SkipRef) -> Result<(), LowerError> {
        let index = self.index(depth, floor, "break")?;
        self.frames[index].breaks.push(skip);
        Ok(())
    }

    pub fn add_continue(&mut self, depth: u32, floor: usize, skip: SkipRef) -> Result<(), LowerError> {
        let index = self.index(depth, floor, "continue")?;
        self.frames[index].continues.push(skip);
        Ok(())
    }
}

// =============================================================================
// LOOP
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum LoopKind {
    While,
    /// Walks `array` with `index`; the element is `array[index]`.
    ForEach { array: Element, index: Variable },
    /// The step statement is lowered by the caller between
    /// [`LoopBuilder::epilogue`] and [`LoopBuilder::finish`].
    For,
}

/// Shape of every loop:
///
/// ```text
/// [index = 0]                     ; foreach only
/// start:  <condition actions>
///         SkipIf(!condition) → exit
///         <body>
/// cont:   <epilogue>              ; step / index += 1
///         Skip → start
/// exit:   <exit tail>
/// end:                            ; breaks land here
/// ```
#[derive(Debug)]
pub struct LoopBuilder {
    kind: LoopKind,
    state: BuildState,
    start: usize,
    exit: Option<SkipRef>,
    breaks: Vec<SkipRef>,
}

impl LoopBuilder {
    pub fn new(kind: LoopKind) -> Self {
        Self {
            kind,
            state: BuildState::Unset,
            start: 0,
            exit: None,
            breaks: Vec::new(),
        }
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    pub fn start(&self) -> usize {
        self.start
    }

    /// The element a foreach body sees.
    pub fn element(&self) -> Option<Element> {
        match &self.kind {
            LoopKind::ForEach { array, index } => Some(array.clone().value_in_array(index.get())),
            _ => None,
        }
    }

    /// Run the pre-loop step, record the loop start and open its frame.
    /// Actions that compute the condition go between this and [`guard`].
    ///
    /// [`guard`]: LoopBuilder::guard
    pub fn setup(
        &mut self,
        list: &mut ActionList,
        loops: &mut ContinueSkip,
        scope_depth: usize,
    ) -> Result<(), LowerError> {
        expect_state(self.state, BuildState::Unset, "loop setup")?;
        if let LoopKind::ForEach { index, .. } = &self.kind {
            list.extend(index.set("foreach index", Element::number(0.0), &[])?);
        }
        self.start = list.len();
        loops.push(LoopFrame::new(self.start, scope_depth));
        self.state = BuildState::Setup;
        Ok(())
    }

    /// Emit the exit skip. `condition` is the loop condition for `While` and
    /// `For`; a foreach builds its own from the index.
    pub fn guard(&mut self, list: &mut ActionList, condition: Option<Element>) -> Result<(), LowerError> {
        expect_state(self.state, BuildState::Setup, "loop guard")?;
        let exit = match (&self.kind, condition) {
            (LoopKind::ForEach { array, index }, None) => Element::compare(
                index.get(),
                CompareOp::GreaterEqual,
                array.clone().count_of(),
            ),
            (LoopKind::ForEach { .. }, Some(_)) => {
                return Err(LowerError::invariant("foreach loop given an explicit condition"));
            }
            (_, Some(condition)) => condition.negate(),
            (_, None) => return Err(LowerError::invariant("loop guard without a condition")),
        };
        self.exit = Some(list.push_skip(Some(exit)));
        self.state = BuildState::Guarded;
        Ok(())
    }

    /// Close the body: pending continues land here, and the frame leaves the
    /// continuation counter.
    pub fn epilogue(&mut self, list: &mut ActionList, loops: &mut ContinueSkip) -> Result<(), LowerError> {
        expect_state(self.state, BuildState::Guarded, "loop epilogue")?;
        let frame = loops.pop()?;
        if frame.start != self.start {
            return Err(LowerError::invariant(format!(
                "loop frames out of order: closing {} but innermost is {}",
                self.start, frame.start
            )));
        }
        for skip in frame.continues {
            list.resolve_here(skip)?;
        }
        self.breaks = frame.breaks;
        self.state = BuildState::Epilogue;
        Ok(())
    }

    /// Emit the increment (foreach), the backward skip, and patch the exit
    /// and every break to the end of the loop.
    ///
    /// `exit_tail` runs only when the condition fails: it pops what the
    /// condition pushed, which the body path already popped.
    pub fn finish(
        &mut self,
        list: &mut ActionList,
        loops: &mut ContinueSkip,
        exit_tail: Vec<Action>,
    ) -> Result<(), LowerError> {
        if self.state == BuildState::Guarded {
            self.epilogue(list, loops)?;
        }
        expect_state(self.state, BuildState::Epilogue, "loop finish")?;

        if let LoopKind::ForEach { index, .. } = &self.kind {
            let next = index.get().add(Element::number(1.0));
            list.extend(index.set("foreach index", next, &[])?);
        }
        let back = list.push_skip_to(self.start);
        trace!("loop back-skip at {} -> {}", back, self.start);

        let exit = self
            .exit
            .take()
            .ok_or_else(|| LowerError::invariant("loop finished without an exit skip"))?;
        list.resolve_here(exit)?;
        list.extend(exit_tail);
        for skip in self.breaks.drain(..) {
            list.resolve_here(skip)?;
        }
        self.state = BuildState::Finished;
        Ok(())
    }
}
