//! Owned syntax tree lowered from the tree-sitter concrete tree.
//!
//! Only the shapes the capability walk cares about get their own variant;
//! everything else becomes [`SyntaxNode::Other`] and keeps its children, so no
//! subtree is lost to the walk.

use tree_sitter::Node;

/// Nodes deeper than this are replaced by [`SyntaxNode::Truncated`].
///
/// Lowering and the visitor walk recurse once per level; at this depth an
/// unoptimized build still fits in a default 2 MiB thread stack.
pub const MAX_SYNTAX_DEPTH: usize = 512;

#[derive(Debug, Clone, PartialEq)]
pub enum SyntaxNode {
    Program(Vec<SyntaxNode>),
    Call {
        callee: Box<SyntaxNode>,
        args: Vec<SyntaxNode>,
    },
    Member {
        object: Box<SyntaxNode>,
        property: Box<SyntaxNode>,
    },
    Identifier(String),
    /// String or substitution-free template literal, escapes decoded
    StringLiteral(String),
    /// `import ... from '<source>'` or `import '<source>'`
    ImportDecl { source: String },
    /// The `import` in a dynamic `import(...)` call
    ImportKeyword,
    /// Region the parser could not make sense of
    Error(Vec<SyntaxNode>),
    /// Subtree cut at the depth limit
    Truncated,
    Other {
        kind: &'static str,
        children: Vec<SyntaxNode>,
    },
}

impl SyntaxNode {
    pub fn children(&self) -> Vec<&SyntaxNode> {
        match self {
            SyntaxNode::Program(c) | SyntaxNode::Error(c) => c.iter().collect(),
            SyntaxNode::Other { children, .. } => children.iter().collect(),
            SyntaxNode::Call { callee, args } => {
                std::iter::once(callee.as_ref()).chain(args.iter()).collect()
            }
            SyntaxNode::Member { object, property } => vec![object.as_ref(), property.as_ref()],
            SyntaxNode::Identifier(_)
            | SyntaxNode::StringLiteral(_)
            | SyntaxNode::ImportDecl { .. }
            | SyntaxNode::ImportKeyword
            | SyntaxNode::Truncated => Vec::new(),
        }
    }

    pub fn as_identifier(&self) -> Option<&str> {
        match self {
            SyntaxNode::Identifier(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_string_literal(&self) -> Option<&str> {
        match self {
            SyntaxNode::StringLiteral(s) => Some(s),
            _ => None,
        }
    }
}

/// What lowering noticed about the concrete tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LowerStats {
    /// ERROR and MISSING nodes the parser inserted while recovering
    pub syntax_errors: usize,
    pub truncated: bool,
}

/// Lower a tree-sitter tree rooted at `root` over `source`.
pub fn lower(root: Node<'_>, source: &[u8]) -> (SyntaxNode, LowerStats) {
    lower_with_limit(root, source, MAX_SYNTAX_DEPTH)
}

pub fn lower_with_limit(root: Node<'_>, source: &[u8], max_depth: usize) -> (SyntaxNode, LowerStats) {
    let mut lowerer = Lowerer {
        source,
        max_depth,
        stats: LowerStats::default(),
    };
    let node = lowerer.lower(root, 0);
    (node, lowerer.stats)
}

struct Lowerer<'s> {
    source: &'s [u8],
    max_depth: usize,
    stats: LowerStats,
}

impl Lowerer<'_> {
    fn text(&self, node: Node<'_>) -> &str {
        node.utf8_text(self.source).unwrap_or("")
    }

    fn lower(&mut self, node: Node<'_>, depth: usize) -> SyntaxNode {
        if depth > self.max_depth {
            self.stats.truncated = true;
            return SyntaxNode::Truncated;
        }
        if node.is_missing() {
            self.stats.syntax_errors += 1;
        }
        if node.is_error() {
            self.stats.syntax_errors += 1;
            return SyntaxNode::Error(self.lower_children(node, depth));
        }

        match node.kind() {
            "program" => SyntaxNode::Program(self.lower_children(node, depth)),
            "identifier" | "property_identifier" => SyntaxNode::Identifier(self.text(node).to_string()),
            "import" => SyntaxNode::ImportKeyword,
            "string" => match self.string_value(node) {
                Some(s) => SyntaxNode::StringLiteral(s),
                None => self.other(node, depth),
            },
            "template_string" => {
                let text = self.text(node);
                if text.contains("${") {
                    self.other(node, depth)
                } else {
                    match self.string_value(node) {
                        Some(s) => SyntaxNode::StringLiteral(s),
                        None => self.other(node, depth),
                    }
                }
            }
            "call_expression" => self.lower_call(node, depth),
            "member_expression" => {
                match (node.child_by_field_name("object"), node.child_by_field_name("property")) {
                    (Some(object), Some(property)) => SyntaxNode::Member {
                        object: Box::new(self.lower(object, depth + 1)),
                        property: Box::new(self.lower(property, depth + 1)),
                    },
                    _ => self.other(node, depth),
                }
            }
            "import_statement" => match node
                .child_by_field_name("source")
                .and_then(|s| self.string_value(s))
            {
                Some(source) => SyntaxNode::ImportDecl { source },
                None => self.other(node, depth),
            },
            _ => self.other(node, depth),
        }
    }

    fn lower_call(&mut self, node: Node<'_>, depth: usize) -> SyntaxNode {
        let Some(function) = node.child_by_field_name("function") else {
            return self.other(node, depth);
        };
        let callee = Box::new(self.lower(function, depth + 1));
        let args = match node.child_by_field_name("arguments") {
            // tagged template: the template itself is the only argument
            Some(a) if a.kind() == "template_string" => vec![self.lower(a, depth + 1)],
            Some(a) => self.lower_children(a, depth + 1),
            None => Vec::new(),
        };
        SyntaxNode::Call { callee, args }
    }

    fn other(&mut self, node: Node<'_>, depth: usize) -> SyntaxNode {
        SyntaxNode::Other {
            kind: node.kind(),
            children: self.lower_children(node, depth),
        }
    }

    fn lower_children(&mut self, node: Node<'_>, depth: usize) -> Vec<SyntaxNode> {
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
        children
            .into_iter()
            .map(|child| self.lower(child, depth + 1))
            .collect()
    }

    /// Literal value between the delimiters, or None for an unterminated
    /// literal the parser patched up.
    fn string_value(&self, node: Node<'_>) -> Option<String> {
        if node.has_error() {
            return None;
        }
        let text = self.text(node);
        let mut chars = text.chars();
        let open = chars.next()?;
        let close = chars.next_back()?;
        if open != close || !matches!(open, '"' | '\'' | '`') {
            return None;
        }
        Some(unescape(chars.as_str()))
    }
}

/// Decode JS string escapes. Unknown escapes keep the escaped character.
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(e) = chars.next() else {
            break;
        };
        match e {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' => out.push('\0'),
            // line continuation
            '\n' => {}
            'x' => {
                let hex: String = chars.by_ref().take(2).collect();
                push_code_point(&mut out, &hex);
            }
            'u' => {
                let hex: String = if chars.peek() == Some(&'{') {
                    chars.next();
                    chars.by_ref().take_while(|&c| c != '}').collect()
                } else {
                    chars.by_ref().take(4).collect()
                };
                push_code_point(&mut out, &hex);
            }
            other => out.push(other),
        }
    }
    out
}

fn push_code_point(out: &mut String, hex: &str) {
    match u32::from_str_radix(hex, 16).ok().and_then(char::from_u32) {
        Some(c) => out.push(c),
        None => out.push(char::REPLACEMENT_CHARACTER),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tree_sitter::Parser;

    fn parse_and_lower(source: &str, max_depth: usize) -> (SyntaxNode, LowerStats) {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_javascript::LANGUAGE.into())
            .unwrap();
        let tree = parser.parse(source, None).unwrap();
        lower_with_limit(tree.root_node(), source.as_bytes(), max_depth)
    }

    fn first_statement(node: &SyntaxNode) -> &SyntaxNode {
        match node {
            SyntaxNode::Program(stmts) => &stmts[0],
            other => panic!("not a program: {other:?}"),
        }
    }

    fn expression_of(stmt: &SyntaxNode) -> &SyntaxNode {
        match stmt {
            SyntaxNode::Other { kind: "expression_statement", children } => &children[0],
            other => panic!("not an expression statement: {other:?}"),
        }
    }

    #[test]
    fn test_lowers_require_call() {
        let (tree, stats) = parse_and_lower("require('fs');", MAX_SYNTAX_DEPTH);
        assert_eq!(stats, LowerStats::default());
        let call = expression_of(first_statement(&tree));
        assert_eq!(
            call,
            &SyntaxNode::Call {
                callee: Box::new(SyntaxNode::Identifier("require".into())),
                args: vec![SyntaxNode::StringLiteral("fs".into())],
            }
        );
    }

    #[test]
    fn test_lowers_member_callee() {
        let (tree, _) = parse_and_lower("require.call(null, \"os\")", MAX_SYNTAX_DEPTH);
        match expression_of(first_statement(&tree)) {
            SyntaxNode::Call { callee, args } => {
                match callee.as_ref() {
                    SyntaxNode::Member { object, property } => {
                        assert_eq!(object.as_identifier(), Some("require"));
                        assert_eq!(property.as_identifier(), Some("call"));
                    }
                    other => panic!("unexpected callee {other:?}"),
                }
                assert_eq!(args.len(), 2);
                assert_eq!(args[1].as_string_literal(), Some("os"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_lowers_import_forms() {
        let (tree, _) = parse_and_lower("import x from 'node:net';\nimport('os');", MAX_SYNTAX_DEPTH);
        let SyntaxNode::Program(stmts) = &tree else {
            panic!("not a program");
        };
        assert_eq!(stmts[0], SyntaxNode::ImportDecl { source: "node:net".into() });
        match expression_of(&stmts[1]) {
            SyntaxNode::Call { callee, args } => {
                assert_eq!(callee.as_ref(), &SyntaxNode::ImportKeyword);
                assert_eq!(args[0].as_string_literal(), Some("os"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_string_escapes_and_templates() {
        let (tree, _) = parse_and_lower(r"require('child\x5fprocess')", MAX_SYNTAX_DEPTH);
        match expression_of(first_statement(&tree)) {
            SyntaxNode::Call { args, .. } => {
                assert_eq!(args[0].as_string_literal(), Some("child_process"))
            }
            other => panic!("unexpected {other:?}"),
        }

        let (tree, _) = parse_and_lower("require(`http`); require(`${x}`)", MAX_SYNTAX_DEPTH);
        let SyntaxNode::Program(stmts) = &tree else {
            panic!("not a program");
        };
        let args_of = |stmt: &SyntaxNode| match expression_of(stmt) {
            SyntaxNode::Call { args, .. } => args.clone(),
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(args_of(&stmts[0])[0].as_string_literal(), Some("http"));
        assert_eq!(args_of(&stmts[1])[0].as_string_literal(), None);
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(r"a\nb"), "a\nb");
        assert_eq!(unescape(r"fs"), "fs");
        assert_eq!(unescape(r"\u{6f}s"), "os");
        assert_eq!(unescape(r"\'q\'"), "'q'");
        assert_eq!(unescape(r"\xZZ"), "\u{fffd}");
    }

    #[test]
    fn test_syntax_errors_counted() {
        let (tree, stats) = parse_and_lower("eval(1); function (((", MAX_SYNTAX_DEPTH);
        assert!(stats.syntax_errors > 0);
        assert!(matches!(tree, SyntaxNode::Program(_)));
    }

    #[test]
    fn test_depth_limit_truncates() {
        let source = format!("x = {}1{};", "[".repeat(20), "]".repeat(20));
        let (_, stats) = parse_and_lower(&source, 8);
        assert!(stats.truncated);
        let (_, stats) = parse_and_lower(&source, MAX_SYNTAX_DEPTH);
        assert!(!stats.truncated);
    }
}
