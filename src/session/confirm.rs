use crate::graph::RemovalSummary;
use std::fmt;

/// What a delete is about to remove, shown to the user before it happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePrompt {
    Selection { blocks: usize, edges: usize },
    All,
}

impl fmt::Display for DeletePrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            DeletePrompt::Selection { blocks, edges } if blocks > 0 && edges > 0 => {
                write!(f, "Delete {} block(s) and {} connection(s)?", blocks, edges)
            }
            DeletePrompt::Selection { blocks, .. } if blocks > 0 => {
                write!(f, "Delete {} block(s)?", blocks)
            }
            DeletePrompt::Selection { edges, .. } => write!(f, "Delete {} connection(s)?", edges),
            DeletePrompt::All => f.write_str("Delete ALL blocks?"),
        }
    }
}

/// A yes/no gate in front of destructive edits.
pub trait Confirm {
    fn confirm(&mut self, prompt: &DeletePrompt) -> bool;
}

impl<F> Confirm for F
where
    F: FnMut(&DeletePrompt) -> bool,
{
    fn confirm(&mut self, prompt: &DeletePrompt) -> bool {
        self(prompt)
    }
}

/// Answers every prompt the same way. Handy for scripted edits.
#[derive(Debug, Clone, Copy)]
pub struct AlwaysConfirm(pub bool);

impl Confirm for AlwaysConfirm {
    fn confirm(&mut self, _prompt: &DeletePrompt) -> bool {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Delete-selected with an empty selection. The user was not asked.
    NothingSelected,
    /// Delete-all on an empty scenario. The user was not asked.
    Empty,
    Cancelled,
    Removed(RemovalSummary),
}

impl DeleteOutcome {
    pub fn removed(&self) -> Option<RemovalSummary> {
        match self {
            DeleteOutcome::Removed(summary) => Some(*summary),
            _ => None,
        }
    }
}
