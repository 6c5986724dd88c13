//! JavaScript syntax analysis: tree-sitter parse, lowering to [`SyntaxNode`],
//! then a capability walk.

pub mod capabilities;
pub mod node;
pub mod visitor;

pub use capabilities::{classify_module, detect_capabilities, Capability, CapabilityFlags};
pub use node::{lower, LowerStats, SyntaxNode, MAX_SYNTAX_DEPTH};
pub use visitor::{walk_call, walk_node, Visitor};

use std::time::Duration;
use tree_sitter::{LanguageError, Parser};

/// Result of analyzing one script.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptAnalysis {
    Parsed {
        flags: CapabilityFlags,
        /// Recovered syntax errors; the walk still covered the whole tree
        syntax_errors: usize,
        truncated: bool,
    },
    /// The parser gave up (timeout). No flags.
    Abandoned,
}

/// Reusable JavaScript analyzer. One per worker; not shared across threads.
pub struct ScriptAnalyzer {
    parser: Parser,
}

impl ScriptAnalyzer {
    pub fn new() -> Result<Self, LanguageError> {
        let mut parser = Parser::new();
        parser.set_language(&tree_sitter_javascript::LANGUAGE.into())?;
        Ok(Self { parser })
    }

    /// Parse and walk `source`. `timeout` bounds the parse only.
    pub fn analyze(&mut self, source: &str, timeout: Option<Duration>) -> ScriptAnalysis {
        // a timed-out parse would otherwise resume on the next call
        self.parser.reset();
        let micros = timeout.map_or(0, |t| u64::try_from(t.as_micros()).unwrap_or(u64::MAX).max(1));
        self.parser.set_timeout_micros(micros);

        let Some(tree) = self.parser.parse(source, None) else {
            return ScriptAnalysis::Abandoned;
        };
        let (root, stats) = lower(tree.root_node(), source.as_bytes());
        ScriptAnalysis::Parsed {
            flags: detect_capabilities(&root),
            syntax_errors: stats.syntax_errors,
            truncated: stats.truncated,
        }
    }
}
