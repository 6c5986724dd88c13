//! Sensitive capability detection over the lowered syntax tree.
//!
//! Matching is by name only: an aliased `require` is missed and any callee
//! whose name merely contains `eval` is flagged.

use super::node::SyntaxNode;
use super::visitor::{walk_call, Visitor};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Eval,
    ChildProcess,
    Fs,
    Network,
    Os,
}

/// Module name → capability. Sorted ascending by name, verified by test.
static MODULE_CAPABILITIES: &[(&str, Capability)] = &[
    ("child_process", Capability::ChildProcess),
    ("fs", Capability::Fs),
    ("fs-extra", Capability::Fs),
    ("http", Capability::Network),
    ("https", Capability::Network),
    ("net", Capability::Network),
    ("os", Capability::Os),
];

/// Capability granted by importing `module`. A `node:` prefix is ignored.
pub fn classify_module(module: &str) -> Option<Capability> {
    let name = module.strip_prefix("node:").unwrap_or(module);
    MODULE_CAPABILITIES
        .binary_search_by(|(m, _)| (*m).cmp(name))
        .ok()
        .map(|i| MODULE_CAPABILITIES[i].1)
}

/// Per-file or per-package capability flags. Only ever set, never cleared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CapabilityFlags {
    pub eval: bool,
    pub child_process: bool,
    pub fs: bool,
    pub network: bool,
    pub os: bool,
}

impl CapabilityFlags {
    pub fn set(&mut self, capability: Capability) {
        match capability {
            Capability::Eval => self.eval = true,
            Capability::ChildProcess => self.child_process = true,
            Capability::Fs => self.fs = true,
            Capability::Network => self.network = true,
            Capability::Os => self.os = true,
        }
    }

    pub fn merge(&mut self, other: CapabilityFlags) {
        self.eval |= other.eval;
        self.child_process |= other.child_process;
        self.fs |= other.fs;
        self.network |= other.network;
        self.os |= other.os;
    }

    pub fn any(&self) -> bool {
        self.eval || self.child_process || self.fs || self.network || self.os
    }
}

/// Module named by a call, if the call is an import form with a literal
/// first argument: `require(m)`, `require.<x>(m)` or `import(m)`.
fn imported_module<'a>(callee: &SyntaxNode, args: &'a [SyntaxNode]) -> Option<&'a str> {
    let is_import = match callee {
        SyntaxNode::Identifier(name) => name == "require",
        SyntaxNode::Member { object, .. } => object.as_identifier() == Some("require"),
        SyntaxNode::ImportKeyword => true,
        _ => false,
    };
    if !is_import {
        return None;
    }
    args.first().and_then(SyntaxNode::as_string_literal)
}

#[derive(Debug, Default)]
pub struct CapabilityVisitor {
    pub flags: CapabilityFlags,
}

impl CapabilityVisitor {
    fn record_import(&mut self, module: &str) {
        if let Some(cap) = classify_module(module) {
            tracing::trace!(module, ?cap, "sensitive import");
            self.flags.set(cap);
        }
    }
}

impl Visitor for CapabilityVisitor {
    fn visit_call(&mut self, callee: &SyntaxNode, args: &[SyntaxNode]) {
        if callee.as_identifier().is_some_and(|name| name.contains("eval")) {
            self.flags.set(Capability::Eval);
        }
        if let Some(module) = imported_module(callee, args) {
            self.record_import(module);
        }
        walk_call(self, callee, args);
    }

    fn visit_import_decl(&mut self, source: &str) {
        self.record_import(source);
    }
}

/// Capability flags of a whole lowered tree.
pub fn detect_capabilities(tree: &SyntaxNode) -> CapabilityFlags {
    let mut visitor = CapabilityVisitor::default();
    visitor.visit_node(tree);
    visitor.flags
}
