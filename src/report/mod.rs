//! Result collection and tree-shaped console report
//!
//! The report walks the same invocation list the run executed, so its
//! nesting mirrors the plan.

use std::collections::HashMap;
use std::fmt;

use colored::Colorize;

use crate::plan::{InvocationEntry, InvocationList, QualifiedName};

/// Indentation of top-level entries
pub const BASELINE_INDENT: usize = 1;

/// Extra indentation per nesting level
pub const INDENT_STEP: usize = 4;

/// Pass/fail outcome per executed invocation entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultMap {
    outcomes: HashMap<InvocationEntry, bool>,
}

impl ResultMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of an entry that was run
    pub fn record(&mut self, entry: &InvocationEntry, passed: bool) {
        self.outcomes.insert(entry.clone(), passed);
    }

    /// Outcome of an entry, `None` if it never ran
    pub fn outcome(&self, entry: &InvocationEntry) -> Option<bool> {
        self.outcomes.get(entry).copied()
    }

    /// Outcome of a runnable test by its qualified name
    pub fn test_outcome(&self, name: &QualifiedName) -> Option<bool> {
        self.outcome(&InvocationEntry::Leaf(name.clone()))
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn passed(&self) -> usize {
        self.outcomes.values().filter(|passed| **passed).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.values().filter(|passed| !**passed).count()
    }
}

/// One rendered row of the report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLine {
    pub entry: InvocationEntry,
    pub passed: bool,
    pub indent: usize,
}

impl ReportLine {
    fn glyph(&self) -> &'static str {
        if self.passed {
            "+ "
        } else {
            "- "
        }
    }
}

impl fmt::Display for ReportLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}|_{}",
            self.glyph(),
            " ".repeat(self.indent),
            self.entry.selector()
        )
    }
}

/// Tree-shaped view of a run's results
#[derive(Debug, Clone)]
pub struct Report {
    lines: Vec<ReportLine>,
    final_indent: usize,
    passed: usize,
    failed: usize,
}

impl Report {
    pub fn lines(&self) -> &[ReportLine] {
        &self.lines
    }

    /// Indentation left after the last entry; equals the baseline for any
    /// balanced list
    pub fn final_indent(&self) -> usize {
        self.final_indent
    }

    /// Print the report with coloured glyphs
    pub fn print(&self) {
        println!("\n{}", "Tests results:".cyan());
        for line in &self.lines {
            let text = line.to_string();
            if line.passed {
                println!("{}", text.green());
            } else {
                println!("{}", text.red());
            }
        }
        println!(
            "\n{} passed, {} failed\n",
            self.passed.to_string().green().bold(),
            self.failed.to_string().red().bold()
        );
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

/// Render results against the invocation list
///
/// A suite's `Enter` and `Exit` lines sit at the suite's level and its
/// children one step deeper. Brackets that were not run as tests pass
/// vacuously; tests that never ran show as failed.
pub fn render(list: &InvocationList, results: &ResultMap) -> Report {
    let mut indent = BASELINE_INDENT;
    let mut lines = Vec::with_capacity(list.len());

    for entry in list {
        let passed = results
            .outcome(entry)
            .unwrap_or_else(|| entry.is_bracket());

        match entry {
            InvocationEntry::Enter(_) => {
                lines.push(ReportLine {
                    entry: entry.clone(),
                    passed,
                    indent,
                });
                indent += INDENT_STEP;
            }
            InvocationEntry::Leaf(_) => {
                lines.push(ReportLine {
                    entry: entry.clone(),
                    passed,
                    indent,
                });
            }
            InvocationEntry::Exit(_) => {
                indent = indent.saturating_sub(INDENT_STEP);
                lines.push(ReportLine {
                    entry: entry.clone(),
                    passed,
                    indent,
                });
            }
        }
    }

    Report {
        lines,
        final_indent: indent,
        passed: results.passed(),
        failed: results.failed(),
    }
}
