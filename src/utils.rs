use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

/// A `\r`-overwritten status line on stderr, redrawn every `interval` blocks.
#[derive(Debug, Clone)]
pub struct ProgressLine {
    label: &'static str,
    interval: u64,
}

impl ProgressLine {
    pub fn new(label: &'static str, interval: u64) -> Self {
        let line = Self {
            label,
            interval: interval.max(1),
        };
        line.print(&RunSummary::default());
        line
    }

    pub fn update(&self, progress: &RunSummary) {
        if progress.blocks % self.interval == 0 {
            self.print(progress);
        }
    }

    pub fn finish(&self, summary: &RunSummary) {
        self.print(summary);
        eprintln!();
    }

    fn print(&self, progress: &RunSummary) {
        eprint!(
            "\r{}: {} blocks, {} nodes, {} matches",
            self.label, progress.blocks, progress.nodes, progress.matches
        );
        let _ = std::io::stderr().flush();
    }
}

/// Primitive counts for one block, folded into [`RunCounters`] in one step.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BlockTally {
    pub nodes: u64,
    pub ways: u64,
    pub relations: u64,
    pub matches: u64,
}

/// Run-wide totals, updated concurrently by decode workers and read once
/// at the end.
#[derive(Debug, Default)]
pub struct RunCounters {
    nodes: AtomicU64,
    ways: AtomicU64,
    relations: AtomicU64,
    blocks: AtomicU64,
    matches: AtomicU64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub nodes: u64,
    pub ways: u64,
    pub relations: u64,
    pub blocks: u64,
    pub matches: u64,
}

impl RunCounters {
    /// Folds in one block and returns the running totals including it.
    pub fn add_block(&self, tally: BlockTally) -> RunSummary {
        RunSummary {
            blocks: self.blocks.fetch_add(1, Ordering::Relaxed) + 1,
            nodes: self.nodes.fetch_add(tally.nodes, Ordering::Relaxed) + tally.nodes,
            ways: self.ways.fetch_add(tally.ways, Ordering::Relaxed) + tally.ways,
            relations: self.relations.fetch_add(tally.relations, Ordering::Relaxed)
                + tally.relations,
            matches: self.matches.fetch_add(tally.matches, Ordering::Relaxed) + tally.matches,
        }
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            nodes: self.nodes.load(Ordering::Relaxed),
            ways: self.ways.load(Ordering::Relaxed),
            relations: self.relations.load(Ordering::Relaxed),
            blocks: self.blocks.load(Ordering::Relaxed),
            matches: self.matches.load(Ordering::Relaxed),
        }
    }
}
