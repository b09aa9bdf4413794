//! Run-scoped state shared by every reconciliation step.

use super::stats::SyncStats;
use super::SyncOptions;
use crate::fs::LocalStore;
use crate::remote::RemoteStore;
use crate::transfer::ProgressReporter;
use crate::SyncError;
use std::fmt;
use tracing::error;

/// Kind of mutation a decision line announces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// `F`: file transfer
    Transfer,
    /// `D`: directory creation
    CreateDir,
    /// `R`: removal or replacement
    Remove,
}

impl Action {
    pub fn prefix(self) -> char {
        match self {
            Action::Transfer => 'F',
            Action::CreateDir => 'D',
            Action::Remove => 'R',
        }
    }
}

/// One decision line, e.g. `F /r/x.txt`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub action: Action,
    pub path: String,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.action.prefix(), self.path)
    }
}

/// Receives decision lines as the walk makes them
pub trait DecisionSink: Send {
    fn record(&mut self, decision: Decision);
}

/// Prints each decision on its own stdout line
#[derive(Debug, Default)]
pub struct StdoutSink;

impl DecisionSink for StdoutSink {
    fn record(&mut self, decision: Decision) {
        println!("{}", decision);
    }
}

impl DecisionSink for Vec<Decision> {
    fn record(&mut self, decision: Decision) {
        self.push(decision);
    }
}

/// Result of one reconciliation step
#[derive(Debug)]
#[must_use]
pub enum Outcome {
    Success,
    /// Per-item failure; the enclosing level decides whether to go on
    Recoverable(SyncError),
    /// Failure that aborts the level it happened in
    Fatal(SyncError),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

pub struct SyncContext<'a> {
    pub options: &'a SyncOptions,
    pub remote: &'a dyn RemoteStore,
    pub local: &'a dyn LocalStore,
    pub progress: &'a ProgressReporter,
    pub stats: SyncStats,
    sink: &'a mut dyn DecisionSink,
}

impl<'a> SyncContext<'a> {
    pub fn new(
        options: &'a SyncOptions,
        remote: &'a dyn RemoteStore,
        local: &'a dyn LocalStore,
        sink: &'a mut dyn DecisionSink,
        progress: &'a ProgressReporter,
    ) -> Self {
        Self {
            options,
            remote,
            local,
            progress,
            stats: SyncStats::default(),
            sink,
        }
    }

    /// Emit a decision line unless running quietly.
    pub fn announce(&mut self, action: Action, path: impl fmt::Display) {
        if self.options.quiet {
            return;
        }
        self.sink.record(Decision {
            action,
            path: path.to_string(),
        });
    }

    /// Log and count a per-item failure.
    pub fn recoverable(&mut self, err: SyncError) -> Outcome {
        error!("{}", err);
        self.stats.files_with_errors += 1;
        Outcome::Recoverable(err)
    }

    /// Log a level-aborting failure.
    pub fn fatal(&mut self, err: SyncError) -> Outcome {
        error!("{}", err);
        Outcome::Fatal(err)
    }

    /// Fold a child's outcome into the status of the current level.
    ///
    /// Returns `false` when the level has to stop visiting siblings. With
    /// `ignore_errors` failures are absorbed and the level stays successful.
    pub fn absorb(&self, status: &mut Outcome, child: Outcome) -> bool {
        if child.is_success() || self.options.ignore_errors {
            return true;
        }
        *status = child;
        false
    }

    pub fn into_stats(self) -> SyncStats {
        self.stats
    }
}
