//! The abstract syntax tree shared by the interpreter and the M0 backend.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::token::{DebugData, MacroKind};

/// `RETURN` accepts 0 to 3 values.
pub const MAX_RETURN_COUNT: u8 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArithmeticOp {
    Add,
    Sub,
}

impl ArithmeticOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Sub => "-",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BooleanOp {
    Equal,
    Greater,
    Lesser,
    GreaterEqual,
    LesserEqual,
}

impl BooleanOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BooleanOp::Equal => "==",
            BooleanOp::Greater => ">",
            BooleanOp::Lesser => "<",
            BooleanOp::GreaterEqual => ">=",
            BooleanOp::LesserEqual => "<=",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DictionaryOp {
    Assign,
    Retrieve,
}

impl DictionaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            DictionaryOp::Assign => "ASSIGN",
            DictionaryOp::Retrieve => "RETRIEVE",
        }
    }
}

/// A formal parameter, declared with `VALUE` in a function header.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub debug: DebugData,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionNode {
    pub name: String,
    pub params: Vec<Parameter>,
    pub body: Vec<AstNode>,
    pub debug: DebugData,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AstNode {
    Number {
        value: u32,
        debug: DebugData,
    },
    Boolean {
        value: bool,
        debug: DebugData,
    },
    Macro {
        kind: MacroKind,
        debug: DebugData,
    },
    While {
        predicate: Vec<AstNode>,
        body: Vec<AstNode>,
        debug: DebugData,
    },
    If {
        then_body: Vec<AstNode>,
        else_body: Option<Vec<AstNode>>,
        debug: DebugData,
    },
    Variable {
        name: String,
        debug: DebugData,
    },
    /// A parameter placeholder. Only meaningful inside a function header.
    Value {
        name: String,
        debug: DebugData,
    },
    Ident {
        name: String,
        debug: DebugData,
    },
    Return {
        count: u8,
        debug: DebugData,
    },
    Function(FunctionNode),
    ArithmeticOp {
        op: ArithmeticOp,
        debug: DebugData,
    },
    BooleanOp {
        op: BooleanOp,
        debug: DebugData,
    },
    DictionaryOp {
        op: DictionaryOp,
        target: String,
        debug: DebugData,
    },
    Copy {
        debug: DebugData,
    },
}

impl AstNode {
    pub fn debug(&self) -> DebugData {
        match self {
            AstNode::Number { debug, .. }
            | AstNode::Boolean { debug, .. }
            | AstNode::Macro { debug, .. }
            | AstNode::While { debug, .. }
            | AstNode::If { debug, .. }
            | AstNode::Variable { debug, .. }
            | AstNode::Value { debug, .. }
            | AstNode::Ident { debug, .. }
            | AstNode::Return { debug, .. }
            | AstNode::ArithmeticOp { debug, .. }
            | AstNode::BooleanOp { debug, .. }
            | AstNode::DictionaryOp { debug, .. }
            | AstNode::Copy { debug } => *debug,
            AstNode::Function(function) => function.debug,
        }
    }

    /// A short, source-like rendering of the node, used in error messages.
    pub fn describe(&self) -> String {
        match self {
            AstNode::Number { value, .. } => value.to_string(),
            AstNode::Boolean { value: true, .. } => "True".to_string(),
            AstNode::Boolean { value: false, .. } => "False".to_string(),
            AstNode::Macro { kind, .. } => kind.as_str().to_string(),
            AstNode::While { .. } => "BEGIN".to_string(),
            AstNode::If { .. } => "IF".to_string(),
            AstNode::Variable { name, .. } => format!("VARIABLE {name}"),
            AstNode::Value { name, .. } => format!("VALUE {name}"),
            AstNode::Ident { name, .. } => name.clone(),
            AstNode::Return { count, .. } => format!("RETURN {count}"),
            AstNode::Function(function) => format!("function {}", function.name),
            AstNode::ArithmeticOp { op, .. } => op.symbol().to_string(),
            AstNode::BooleanOp { op, .. } => op.symbol().to_string(),
            AstNode::DictionaryOp { op, target, .. } => format!("{} {target}", op.symbol()),
            AstNode::Copy { .. } => "COPY".to_string(),
        }
    }

    pub fn debug_string(&self) -> String {
        format!("\"{}\" at {}", self.describe(), self.debug())
    }

    /// True when this node is, or structurally contains, a `RETURN`.
    pub fn contains_return(&self) -> bool {
        match self {
            AstNode::Return { .. } => true,
            AstNode::While {
                predicate, body, ..
            } => predicate.iter().chain(body).any(AstNode::contains_return),
            AstNode::If {
                then_body,
                else_body,
                ..
            } => then_body
                .iter()
                .chain(else_body.iter().flatten())
                .any(AstNode::contains_return),
            _ => false,
        }
    }
}

impl fmt::Display for AstNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.debug_string())
    }
}

/// A parsed program: the top-level nodes in source order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub nodes: Vec<AstNode>,
}

impl Program {
    pub fn new(nodes: Vec<AstNode>) -> Self {
        Self { nodes }
    }
}
