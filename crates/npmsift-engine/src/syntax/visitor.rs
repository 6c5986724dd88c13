//! Recursive visitor over [`SyntaxNode`].
//!
//! Override the hooks you need and call the matching `walk_*` function to keep
//! descending. The default hooks visit every node.

use super::node::SyntaxNode;

pub trait Visitor {
    fn visit_node(&mut self, node: &SyntaxNode) {
        walk_node(self, node);
    }

    fn visit_call(&mut self, callee: &SyntaxNode, args: &[SyntaxNode]) {
        walk_call(self, callee, args);
    }

    fn visit_import_decl(&mut self, _source: &str) {}

    fn visit_error(&mut self, children: &[SyntaxNode]) {
        for child in children {
            self.visit_node(child);
        }
    }
}

pub fn walk_node<V: Visitor + ?Sized>(visitor: &mut V, node: &SyntaxNode) {
    match node {
        SyntaxNode::Call { callee, args } => visitor.visit_call(callee, args),
        SyntaxNode::ImportDecl { source } => visitor.visit_import_decl(source),
        SyntaxNode::Error(children) => visitor.visit_error(children),
        other => {
            for child in other.children() {
                visitor.visit_node(child);
            }
        }
    }
}

pub fn walk_call<V: Visitor + ?Sized>(visitor: &mut V, callee: &SyntaxNode, args: &[SyntaxNode]) {
    visitor.visit_node(callee);
    for arg in args {
        visitor.visit_node(arg);
    }
}
