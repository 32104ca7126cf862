use serde::Deserialize;

use crate::symbols::{ScopeId, Symbol};

/// One node of the parsed program.
///
/// The external parser hands trees over as JSON tagged on `nodeType`, with
/// expression operands in the generic `children` list and statement-shaped
/// substructures (`body`, `ifBlock`, `initializer`, ...) under dedicated
/// attributes. Resolution and code generation annotate nodes in place; the
/// annotations never appear on the wire.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Node {
    #[serde(flatten)]
    pub kind: NodeKind,
    #[serde(default)]
    pub children: Vec<Node>,
    #[serde(skip)]
    pub scope: Option<ScopeId>,
    #[serde(skip)]
    pub symbol: Option<Symbol>,
    #[serde(skip)]
    pub symbols: Vec<Symbol>,
    #[serde(skip)]
    pub control_id: Option<u32>,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            children: Vec::new(),
            scope: None,
            symbol: None,
            symbols: Vec::new(),
            control_id: None,
        }
    }

    pub fn with_children(kind: NodeKind, children: Vec<Node>) -> Self {
        Self {
            children,
            ..Self::new(kind)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "nodeType", rename_all = "kebab-case")]
pub enum NodeKind {
    FunctionDeclaration {
        name: String,
        #[serde(default)]
        params: Vec<String>,
        body: Box<Node>,
    },
    DeclareVariable {
        name: String,
        #[serde(default)]
        initializer: Option<Box<Node>>,
    },
    DeclareConstant {
        name: String,
        #[serde(default)]
        initializer: Option<Box<Node>>,
    },
    AccessVariable {
        name: String,
    },
    /// `children` holds the assigned expression; every target must be an
    /// `access-variable` node.
    #[serde(rename = "assignment-statement")]
    Assignment {
        #[serde(default)]
        assignees: Vec<Node>,
    },
    /// The condition lives in `children`; the branch bodies are attributes.
    #[serde(rename = "if-statement")]
    If {
        #[serde(rename = "ifBlock")]
        if_block: Box<Node>,
        #[serde(rename = "elseBlock", default)]
        else_block: Option<Box<Node>>,
    },
    #[serde(rename = "while-statement")]
    While {
        body: Box<Node>,
    },
    #[serde(rename = "return-statement")]
    Return,
    #[serde(rename = "expr-statement")]
    ExprStatement,
    FunctionCall {
        name: String,
        #[serde(rename = "functionArgs", default)]
        args: Vec<Node>,
    },
    /// A raw target-assembly operation; operand expressions live in
    /// `children`, literal instruction operands in `args`. The stack effect
    /// defaults to one pushed, two popped unless overridden.
    Operation {
        opcode: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(rename = "numItemsAdded", default)]
        pushed: Option<usize>,
        #[serde(rename = "numItemsRemoved", default)]
        popped: Option<usize>,
    },
    Number {
        value: u64,
    },
    StringLiteral {
        value: String,
    },
    Block,
    Statement,
}
