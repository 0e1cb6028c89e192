//! Message types carried on the task bus

use std::fmt;
use std::ops::Range;

/// Discriminant of a [`Task`], for logging and assertions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Work,
    Finish,
    Shutdown,
}

/// A message on the task bus
///
/// `Work` owns the mutable sub-slice it describes; holding the message is the
/// only way to write to those elements, so live `Work` ranges cannot overlap.
pub enum Task<'a> {
    /// `chunk` covers `[begin, begin + chunk.len())` and still needs sorting
    Work { begin: usize, chunk: &'a mut [f64] },

    /// `[begin, end)` is fully sorted
    Finish { begin: usize, end: usize },

    /// Pool-wide termination signal
    Shutdown,
}

impl<'a> Task<'a> {
    pub fn work(begin: usize, chunk: &'a mut [f64]) -> Self {
        Task::Work { begin, chunk }
    }

    pub fn finish(range: Range<usize>) -> Self {
        Task::Finish {
            begin: range.start,
            end: range.end,
        }
    }

    pub fn kind(&self) -> TaskKind {
        match self {
            Task::Work { .. } => TaskKind::Work,
            Task::Finish { .. } => TaskKind::Finish,
            Task::Shutdown => TaskKind::Shutdown,
        }
    }

    /// Index range the message refers to (empty for `Shutdown`)
    pub fn range(&self) -> Range<usize> {
        match self {
            Task::Work { begin, chunk } => *begin..*begin + chunk.len(),
            Task::Finish { begin, end } => *begin..*end,
            Task::Shutdown => 0..0,
        }
    }
}

impl fmt::Debug for Task<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let range = self.range();
        match self.kind() {
            TaskKind::Shutdown => write!(f, "Shutdown"),
            kind => write!(f, "{:?}({}..{})", kind, range.start, range.end),
        }
    }
}
