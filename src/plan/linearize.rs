//! Plan linearization
//!
//! Turns a plan tree into the ordered invocation list the orchestrator
//! executes: pre-order, depth-first, sibling order preserved. Suites are
//! bracketed by `Enter`/`Exit` entries, tests appear as `Leaf` entries.

use std::fmt;

use super::node::PlanNode;

/// Dotted path of a node from the plan root, e.g. `Smoke.Menu.OpenSettings`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedName(String);

impl QualifiedName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Name of a child of this node
    pub fn child(&self, name: &str) -> Self {
        Self(format!("{}.{}", self.0, name))
    }

    /// Qualified name of the enclosing suite, `None` for the root
    pub fn parent(&self) -> Option<QualifiedName> {
        self.0
            .rsplit_once('.')
            .map(|(parent, _)| QualifiedName(parent.to_string()))
    }

    /// Nesting depth, 0 for the root
    pub fn depth(&self) -> usize {
        self.0.matches('.').count()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One step of a run
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InvocationEntry {
    /// Start of a suite's scope
    Enter(QualifiedName),
    /// A runnable test
    Leaf(QualifiedName),
    /// End of a suite's scope
    Exit(QualifiedName),
}

impl InvocationEntry {
    pub fn name(&self) -> &QualifiedName {
        match self {
            Self::Enter(name) | Self::Leaf(name) | Self::Exit(name) => name,
        }
    }

    pub fn is_enter(&self) -> bool {
        matches!(self, Self::Enter(_))
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf(_))
    }

    /// Enter or Exit
    pub fn is_bracket(&self) -> bool {
        !self.is_leaf()
    }

    /// Test name handed to the external runner
    ///
    /// Suites expose their setup and teardown as `Enter` and `Exit` test
    /// methods.
    pub fn selector(&self) -> String {
        match self {
            Self::Enter(name) => format!("{}.Enter", name),
            Self::Leaf(name) => name.to_string(),
            Self::Exit(name) => format!("{}.Exit", name),
        }
    }
}

impl fmt::Display for InvocationEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.selector())
    }
}

/// Ordered, immutable sequence of invocation entries
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InvocationList {
    entries: Vec<InvocationEntry>,
}

impl InvocationList {
    pub fn entries(&self) -> &[InvocationEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, InvocationEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The runnable tests, in execution order
    pub fn leaves(&self) -> impl Iterator<Item = &QualifiedName> {
        self.entries.iter().filter_map(|entry| match entry {
            InvocationEntry::Leaf(name) => Some(name),
            _ => None,
        })
    }

    /// Whether every `Enter(x)` is closed by exactly one `Exit(x)` with only
    /// `x`'s descendants in between
    pub fn is_balanced(&self) -> bool {
        let mut open: Vec<&QualifiedName> = Vec::new();

        for entry in &self.entries {
            match entry {
                InvocationEntry::Enter(name) | InvocationEntry::Leaf(name) => {
                    if name.parent().as_ref() != open.last().copied() {
                        return false;
                    }
                    if entry.is_enter() {
                        open.push(name);
                    }
                }
                InvocationEntry::Exit(name) => {
                    if open.pop() != Some(name) {
                        return false;
                    }
                }
            }
        }

        open.is_empty()
    }
}

impl<'a> IntoIterator for &'a InvocationList {
    type Item = &'a InvocationEntry;
    type IntoIter = std::slice::Iter<'a, InvocationEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Linearize a plan tree
///
/// Pure: the same tree always yields the same list.
pub fn linearize(root: &PlanNode) -> InvocationList {
    let mut entries = Vec::new();
    walk(root, QualifiedName::new(root.name.clone()), &mut entries);
    InvocationList { entries }
}

fn walk(node: &PlanNode, name: QualifiedName, out: &mut Vec<InvocationEntry>) {
    if node.is_leaf() {
        out.push(InvocationEntry::Leaf(name));
        return;
    }

    out.push(InvocationEntry::Enter(name.clone()));
    for child in &node.children {
        walk(child, name.child(&child.name), out);
    }
    out.push(InvocationEntry::Exit(name));
}
