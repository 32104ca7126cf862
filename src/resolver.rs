use thiserror::Error;

use crate::ast::{Node, NodeKind};
use crate::symbols::{ScopeId, Symbol, SymbolKind, SymbolTables};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("'{name}' is already defined in this scope")]
    DuplicateDefinition { name: String },
    #[error("'{name}' has not been declared")]
    UndeclaredName { name: String },
    #[error("Assignment target must be a variable reference")]
    NotAnLvalue,
    #[error("Cannot assign to constant '{name}'")]
    AssignToConstant { name: String },
}

/// Walks the tree, binds every name use to its declaration and annotates
/// nodes in place. Returns the scope arena the code generator reads slot
/// positions from.
///
/// Visitation is children-before-self; nodes keeping substructure under
/// dedicated attributes rather than `children` descend into it themselves.
pub fn resolve_symbols(root: &mut Node) -> Result<SymbolTables, ResolveError> {
    let mut resolver = SymbolResolver::new();
    let scope = resolver.tables.root();
    resolver.visit(root, scope)?;
    Ok(resolver.tables)
}

struct SymbolResolver {
    tables: SymbolTables,
}

impl SymbolResolver {
    fn new() -> Self {
        Self {
            tables: SymbolTables::new(),
        }
    }

    fn visit(&mut self, node: &mut Node, scope: ScopeId) -> Result<(), ResolveError> {
        for child in &mut node.children {
            self.visit(child, scope)?;
        }
        match &mut node.kind {
            NodeKind::FunctionDeclaration { body, .. } => {
                let inner = self.tables.push_scope(scope, 0);
                node.scope = Some(inner);
                self.visit(body, inner)?;
            }
            NodeKind::DeclareVariable { name, initializer } => {
                if let Some(initializer) = initializer {
                    self.visit(initializer, scope)?;
                }
                let symbol = self.declare(scope, name, SymbolKind::Variable)?;
                node.symbol = Some(symbol);
            }
            NodeKind::DeclareConstant { name, initializer } => {
                if let Some(initializer) = initializer {
                    self.visit(initializer, scope)?;
                }
                let symbol = self.declare(scope, name, SymbolKind::Constant)?;
                node.symbol = Some(symbol);
            }
            NodeKind::AccessVariable { name } => {
                let symbol =
                    self.tables
                        .get(scope, name)
                        .ok_or_else(|| ResolveError::UndeclaredName {
                            name: name.clone(),
                        })?;
                node.symbol = Some(symbol.clone());
            }
            NodeKind::Assignment { assignees } => {
                let mut symbols = Vec::with_capacity(assignees.len());
                for assignee in assignees.iter() {
                    let NodeKind::AccessVariable { name } = &assignee.kind else {
                        return Err(ResolveError::NotAnLvalue);
                    };
                    let symbol = self.tables.get(scope, name).ok_or_else(|| {
                        ResolveError::UndeclaredName { name: name.clone() }
                    })?;
                    if symbol.kind != SymbolKind::Variable {
                        return Err(ResolveError::AssignToConstant { name: name.clone() });
                    }
                    symbols.push(symbol.clone());
                }
                if symbols.len() == 1 {
                    node.symbol = symbols.pop();
                } else {
                    node.symbols = symbols;
                }
            }
            NodeKind::If {
                if_block,
                else_block,
            } => {
                // TODO: branches should get their own scope once the target
                // language grows block-local declarations.
                self.visit(if_block, scope)?;
                if let Some(else_block) = else_block {
                    self.visit(else_block, scope)?;
                }
            }
            NodeKind::While { body } => {
                self.visit(body, scope)?;
            }
            NodeKind::FunctionCall { args, .. } => {
                for arg in args {
                    self.visit(arg, scope)?;
                }
            }
            NodeKind::Return
            | NodeKind::ExprStatement
            | NodeKind::Operation { .. }
            | NodeKind::Number { .. }
            | NodeKind::StringLiteral { .. }
            | NodeKind::Block
            | NodeKind::Statement => {}
        }
        Ok(())
    }

    fn declare(
        &mut self,
        scope: ScopeId,
        name: &str,
        kind: SymbolKind,
    ) -> Result<Symbol, ResolveError> {
        if self.tables.is_defined_locally(scope, name) {
            return Err(ResolveError::DuplicateDefinition {
                name: name.to_string(),
            });
        }
        self.tables.define(scope, name, kind)
    }
}

#[cfg(test)]
mod tests {
    use super::resolve_symbols;
    use crate::ast::{Node, NodeKind};
    use crate::symbols::SymbolKind;

    fn block(children: Vec<Node>) -> Node {
        Node::with_children(NodeKind::Block, children)
    }

    fn declare(name: &str) -> Node {
        Node::new(NodeKind::DeclareVariable {
            name: name.to_string(),
            initializer: None,
        })
    }

    fn constant(name: &str) -> Node {
        Node::new(NodeKind::DeclareConstant {
            name: name.to_string(),
            initializer: None,
        })
    }

    fn access(name: &str) -> Node {
        Node::new(NodeKind::AccessVariable {
            name: name.to_string(),
        })
    }

    fn assign(targets: Vec<Node>, value: Node) -> Node {
        Node::with_children(NodeKind::Assignment { assignees: targets }, vec![value])
    }

    fn number(value: u64) -> Node {
        Node::new(NodeKind::Number { value })
    }

    fn function(name: &str, params: &[&str], body: Vec<Node>) -> Node {
        Node::new(NodeKind::FunctionDeclaration {
            name: name.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
            body: Box::new(block(body)),
        })
    }

    #[test]
    fn binds_accesses_to_global_declarations() {
        let mut root = block(vec![declare("total"), access("total")]);
        let tables = resolve_symbols(&mut root).expect("resolution should succeed");

        let symbol = root.children[1].symbol.as_ref().expect("access is bound");
        assert_eq!(symbol.name, "total");
        assert_eq!(symbol.position, 1);
        assert!(symbol.is_global);
        assert_eq!(tables.num_symbols(tables.root()), 1);
    }

    #[test]
    fn duplicate_declaration_is_fatal() {
        let mut root = block(vec![declare("total"), declare("total")]);
        let error = resolve_symbols(&mut root).expect_err("resolution should fail");
        assert_eq!(
            error.to_string(),
            "'total' is already defined in this scope"
        );
    }

    #[test]
    fn undeclared_access_is_fatal() {
        let mut root = block(vec![access("phantom")]);
        let error = resolve_symbols(&mut root).expect_err("resolution should fail");
        assert_eq!(error.to_string(), "'phantom' has not been declared");
    }

    #[test]
    fn assignment_binds_symbol_on_the_assignment_node() {
        let mut root = block(vec![
            declare("total"),
            assign(vec![access("total")], number(7)),
        ]);
        resolve_symbols(&mut root).expect("resolution should succeed");

        let assignment = &root.children[1];
        let symbol = assignment.symbol.as_ref().expect("assignment is bound");
        assert_eq!(symbol.name, "total");
        assert!(assignment.symbols.is_empty());
    }

    #[test]
    fn multi_target_assignment_collects_symbols_in_order() {
        let mut root = block(vec![
            declare("low"),
            declare("high"),
            assign(vec![access("low"), access("high")], number(3)),
        ]);
        resolve_symbols(&mut root).expect("resolution should succeed");

        let assignment = &root.children[2];
        assert!(assignment.symbol.is_none());
        let names: Vec<&str> = assignment
            .symbols
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["low", "high"]);
    }

    #[test]
    fn assignment_to_constant_is_fatal() {
        let mut root = block(vec![
            constant("fee"),
            assign(vec![access("fee")], number(1)),
        ]);
        let error = resolve_symbols(&mut root).expect_err("resolution should fail");
        assert_eq!(error.to_string(), "Cannot assign to constant 'fee'");
    }

    #[test]
    fn assignment_target_must_be_a_variable_reference() {
        let mut root = block(vec![assign(vec![number(1)], number(2))]);
        let error = resolve_symbols(&mut root).expect_err("resolution should fail");
        assert_eq!(
            error.to_string(),
            "Assignment target must be a variable reference"
        );
    }

    #[test]
    fn declaration_initializer_cannot_reference_itself() {
        let mut root = block(vec![Node::new(NodeKind::DeclareVariable {
            name: "seed".to_string(),
            initializer: Some(Box::new(access("seed"))),
        })]);
        let error = resolve_symbols(&mut root).expect_err("resolution should fail");
        assert_eq!(error.to_string(), "'seed' has not been declared");
    }

    #[test]
    fn function_body_declarations_land_in_the_function_scope() {
        let mut root = block(vec![
            declare("total"),
            function("pay", &["amount"], vec![declare("amount"), declare("tmp")]),
        ]);
        let tables = resolve_symbols(&mut root).expect("resolution should succeed");

        let scope = root.children[1].scope.expect("function scope is attached");
        assert_eq!(tables.num_symbols(scope), 2);
        let amount = tables.get(scope, "amount").expect("param slot exists");
        assert_eq!(amount.position, 1);
        assert!(!amount.is_global);
        let tmp = tables.get(scope, "tmp").expect("local slot exists");
        assert_eq!(tmp.position, 2);

        // The function scope numbers slots independently of the globals.
        assert_eq!(tables.num_symbols(tables.root()), 1);
    }

    #[test]
    fn function_locals_may_shadow_globals() {
        let mut root = block(vec![
            declare("total"),
            function("bump", &[], vec![declare("total"), access("total")]),
        ]);
        let tables = resolve_symbols(&mut root).expect("resolution should succeed");

        let scope = root.children[1].scope.expect("function scope is attached");
        let shadow = tables.get(scope, "total").expect("local wins the lookup");
        assert!(!shadow.is_global);
        assert_eq!(shadow.kind, SymbolKind::Variable);
    }

    #[test]
    fn if_branches_resolve_in_the_enclosing_scope() {
        let if_statement = Node {
            children: vec![number(1)],
            ..Node::new(NodeKind::If {
                if_block: Box::new(block(vec![declare("inner")])),
                else_block: None,
            })
        };
        let mut root = block(vec![if_statement, access("inner")]);
        let tables = resolve_symbols(&mut root).expect("resolution should succeed");

        // No branch scope: the declaration lands in the root table.
        assert_eq!(tables.num_symbols(tables.root()), 1);
        assert!(root.children[1].symbol.is_some());
    }

    #[test]
    fn while_bodies_are_resolved() {
        let while_statement = Node {
            children: vec![number(1)],
            ..Node::new(NodeKind::While {
                body: Box::new(block(vec![access("missing")])),
            })
        };
        let mut root = block(vec![while_statement]);
        let error = resolve_symbols(&mut root).expect_err("resolution should fail");
        assert_eq!(error.to_string(), "'missing' has not been declared");
    }

    #[test]
    fn resolving_twice_is_stable() {
        let mut root = block(vec![
            declare("total"),
            function("pay", &["amount"], vec![declare("amount")]),
            assign(vec![access("total")], number(1)),
        ]);
        let first = resolve_symbols(&mut root).expect("first resolution should succeed");
        let first_scopes = first.num_scopes();
        let first_symbol = root.children[2].symbol.clone().expect("assignment bound");

        let second = resolve_symbols(&mut root).expect("second resolution should succeed");
        assert_eq!(second.num_scopes(), first_scopes);
        assert_eq!(
            root.children[2].symbol.as_ref(),
            Some(&first_symbol),
            "slot positions must not shift on recompilation"
        );
    }
}
