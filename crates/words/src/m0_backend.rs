//! Lowers a [`Program`] to Thumb assembly for Cortex-M0 boards.
//!
//! Every Words value lives on the hardware stack as one pushed register, so
//! each node pops its operands and pushes its results exactly like the
//! interpreter does. Function parameters are kept in `r4`..`r6` for the
//! duration of the call and `r7` holds the frame pointer.
//!
//! Jumps across a block use `bl`, which reaches 4 MB where `b` only reaches
//! 2 KB. Every frame saves `lr` on entry, so clobbering it is harmless.
//! Literal pools are flushed often enough that every `ldr rN, =value` stays
//! within its 1 KB reach.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use tracing::{debug, trace};
use uuid::Uuid;

use crate::ast::{ArithmeticOp, AstNode, BooleanOp, DictionaryOp, FunctionNode, Program};
use crate::token::{DebugData, MacroKind};

const PARAM_BASE_REGISTER: usize = 4;
pub const MAX_PARAMETERS: usize = 3;

/// Code bytes allowed between a literal load and the next pool. Leaves room
/// for a full pool of 4-byte entries inside the 1020-byte `ldr` range.
const LITERAL_POOL_SPACING: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    ArduinoDue,
}

impl FromStr for Target {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "arduino_due" => Ok(Target::ArduinoDue),
            _ => Err(CompileError::UnsupportedTarget(s.to_string())),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::ArduinoDue => f.write_str("arduino_due"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("{node} cannot be compiled to native code")]
    UnlowerableNode { node: String, debug: DebugData },
    #[error("unsupported target \"{0}\", expected arduino_due")]
    UnsupportedTarget(String),
    #[error("function \"{function}\" at {debug} takes {count} parameters, at most {MAX_PARAMETERS} are supported")]
    TooManyParameters {
        function: String,
        count: usize,
        debug: DebugData,
    },
    #[error("function \"{function}\" at {debug} was previously defined")]
    DuplicateFunction { function: String, debug: DebugData },
    #[error("function \"{function}\" returns {expected} values elsewhere but {found} at {debug}")]
    InconsistentReturnCount {
        function: String,
        expected: u8,
        found: u8,
        debug: DebugData,
    },
}

impl CompileError {
    pub fn code(&self) -> &'static str {
        match self {
            CompileError::UnlowerableNode { .. } => "WORDS-COMPILE-001",
            CompileError::UnsupportedTarget(_) => "WORDS-COMPILE-002",
            CompileError::TooManyParameters { .. } => "WORDS-COMPILE-003",
            CompileError::DuplicateFunction { .. } => "WORDS-COMPILE-004",
            CompileError::InconsistentReturnCount { .. } => "WORDS-COMPILE-005",
        }
    }

    pub fn debug_data(&self) -> Option<DebugData> {
        match self {
            CompileError::UnlowerableNode { debug, .. }
            | CompileError::TooManyParameters { debug, .. }
            | CompileError::DuplicateFunction { debug, .. }
            | CompileError::InconsistentReturnCount { debug, .. } => Some(*debug),
            CompileError::UnsupportedTarget(_) => None,
        }
    }
}

/// Where label suffixes come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LabelSource {
    /// Time-ordered UUIDs, unique across compilations.
    Unique,
    /// `0`, `1`, `2`, ... for reproducible output.
    Sequential(u64),
}

impl LabelSource {
    fn next_suffix(&mut self) -> String {
        match self {
            LabelSource::Unique => Uuid::now_v7().simple().to_string(),
            LabelSource::Sequential(next) => {
                let suffix = next.to_string();
                *next += 1;
                suffix
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Line {
    Directive(String),
    Label(String),
    Instr(String),
}

#[derive(Clone, Debug, Default)]
struct Assembly {
    lines: Vec<Line>,
    /// Code bytes emitted so far.
    size: usize,
    /// Offset of the first literal load not yet covered by a pool.
    unpooled_since: Option<usize>,
}

impl Assembly {
    fn directive(&mut self, text: impl Into<String>) {
        self.lines.push(Line::Directive(text.into()));
    }

    fn label(&mut self, name: impl Into<String>) {
        self.lines.push(Line::Label(name.into()));
    }

    fn instr(&mut self, text: impl Into<String>) {
        let text = text.into();
        if text.contains(", =") && self.unpooled_since.is_none() {
            self.unpooled_since = Some(self.size);
        }
        self.size += if text.starts_with("bl ") { 4 } else { 2 };
        self.lines.push(Line::Instr(text));
    }

    fn literal_pool(&mut self) {
        self.directive(".ltorg");
        self.unpooled_since = None;
    }

    fn pool_due(&self) -> bool {
        self.unpooled_since
            .is_some_and(|since| self.size - since >= LITERAL_POOL_SPACING)
    }

    fn append(&mut self, other: Assembly) {
        if self.unpooled_since.is_none() {
            self.unpooled_since = other.unpooled_since.map(|since| since + self.size);
        }
        self.size += other.size;
        self.lines.extend(other.lines);
    }
}

impl fmt::Display for Assembly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            match line {
                Line::Directive(text) => writeln!(f, "{text}")?,
                Line::Label(name) => writeln!(f, "{name}:")?,
                Line::Instr(text) => writeln!(f, "    {text}")?,
            }
        }
        Ok(())
    }
}

struct Frame {
    function: String,
    params: Vec<String>,
    return_count: Option<u8>,
}

impl Frame {
    fn register_of(&self, name: &str) -> Option<usize> {
        self.params
            .iter()
            .position(|param| param == name)
            .map(|index| PARAM_BASE_REGISTER + index)
    }
}

pub struct M0Compiler {
    target: Target,
    labels: LabelSource,
    variables: Vec<String>,
    functions: HashSet<String>,
    frame: Option<Frame>,
    uses_print: bool,
}

impl M0Compiler {
    pub fn new(target: Target) -> Self {
        Self {
            target,
            labels: LabelSource::Unique,
            variables: Vec::new(),
            functions: HashSet::new(),
            frame: None,
            uses_print: false,
        }
    }

    pub fn with_labels(mut self, labels: LabelSource) -> Self {
        self.labels = labels;
        self
    }

    #[tracing::instrument(level = "trace", skip_all)]
    pub fn compile(mut self, program: &Program) -> Result<String, CompileError> {
        debug!(board = %self.target, nodes = program.nodes.len(), "Compiling program");
        let mut body = Assembly::default();
        self.lower_block(&program.nodes, &mut body)?;

        let mut asm = Assembly::default();
        asm.directive(".cpu cortex-m0");
        asm.directive(".thumb");
        asm.directive(".text");
        asm.directive(".align 2");
        asm.directive(".global setup");
        asm.directive(".global loop");
        asm.directive(".thumb_func");
        asm.label("setup");
        asm.instr("push {r4, r5, r6, r7, lr}");
        asm.instr("mov r7, sp");
        if self.uses_print {
            aligned_call(&mut asm, "serial_begin");
        }
        asm.append(body);
        asm.instr("mov sp, r7");
        asm.instr("pop {r4, r5, r6, r7, pc}");
        asm.directive(".thumb_func");
        asm.label("loop");
        asm.instr("b loop");
        asm.literal_pool();

        if !self.variables.is_empty() {
            asm.directive(".data");
            asm.directive(".align 2");
            for variable in &self.variables {
                asm.label(variable_label(variable));
                asm.instr(".word 0");
            }
        }

        debug!(
            lines = asm.lines.len(),
            variables = self.variables.len(),
            functions = self.functions.len(),
            "Lowered program"
        );
        Ok(asm.to_string())
    }

    fn next_label(&mut self, kind: &str, debug: DebugData) -> String {
        let label = format!("{kind}_{}_{}", debug.line + 1, self.labels.next_suffix());
        trace!(label = %label, "Allocated label");
        label
    }

    fn declare_variable(&mut self, name: &str) {
        if !self.variables.iter().any(|variable| variable == name) {
            self.variables.push(name.to_string());
        }
    }

    fn parameter_register(&self, name: &str) -> Option<usize> {
        self.frame.as_ref().and_then(|frame| frame.register_of(name))
    }

    fn is_variable(&self, name: &str) -> bool {
        self.variables.iter().any(|variable| variable == name)
    }

    fn lower_block(&mut self, nodes: &[AstNode], asm: &mut Assembly) -> Result<(), CompileError> {
        for node in nodes {
            self.lower(node, asm)?;
            if asm.pool_due() {
                let over = self.next_label("pool", node.debug());
                asm.instr(format!("b {over}"));
                asm.literal_pool();
                asm.label(over);
            }
        }
        Ok(())
    }

    fn lower(&mut self, node: &AstNode, asm: &mut Assembly) -> Result<(), CompileError> {
        trace!(node = %node, "Lowering node");
        match node {
            AstNode::Number { value, .. } => {
                load_immediate(asm, "r0", *value);
                asm.instr("push {r0}");
            }
            AstNode::Boolean { value, .. } => {
                load_immediate(asm, "r0", u32::from(*value));
                asm.instr("push {r0}");
            }
            AstNode::Macro {
                kind: MacroKind::Print,
                ..
            } => {
                self.uses_print = true;
                asm.instr("pop {r0}");
                asm.instr("push {r0}");
                aligned_call(asm, "print_num");
            }
            AstNode::ArithmeticOp { op, .. } => {
                let mnemonic = match op {
                    ArithmeticOp::Add => "add",
                    ArithmeticOp::Sub => "sub",
                };
                asm.instr("pop {r1}");
                asm.instr("pop {r0}");
                asm.instr(format!("{mnemonic} r0, r0, r1"));
                asm.instr("push {r0}");
            }
            AstNode::BooleanOp { op, debug } => {
                let branch = match op {
                    BooleanOp::Equal => "beq",
                    BooleanOp::Greater => "bgt",
                    BooleanOp::Lesser => "blt",
                    BooleanOp::GreaterEqual => "bge",
                    BooleanOp::LesserEqual => "ble",
                };
                let is_true = self.next_label("cmp_true", *debug);
                let end = self.next_label("cmp_end", *debug);
                asm.instr("pop {r1}");
                asm.instr("pop {r0}");
                asm.instr("cmp r0, r1");
                asm.instr(format!("{branch} {is_true}"));
                asm.instr("mov r0, #0");
                asm.instr(format!("b {end}"));
                asm.label(is_true);
                asm.instr("mov r0, #1");
                asm.label(end);
                asm.instr("push {r0}");
            }
            AstNode::DictionaryOp {
                op: DictionaryOp::Assign,
                target,
                ..
            } => {
                asm.instr("pop {r0}");
                if let Some(register) = self.parameter_register(target) {
                    asm.instr(format!("mov r{register}, r0"));
                } else {
                    self.declare_variable(target);
                    asm.instr(format!("ldr r1, ={}", variable_label(target)));
                    asm.instr("str r0, [r1]");
                }
            }
            AstNode::DictionaryOp {
                op: DictionaryOp::Retrieve,
                target,
                ..
            } => {
                if !self.push_named_value(target, asm) {
                    return Err(unlowerable(node));
                }
            }
            AstNode::Variable { name, .. } => self.declare_variable(name),
            AstNode::Ident { name, .. } => {
                if !self.push_named_value(name, asm) {
                    asm.instr(format!("bl {}", function_label(name)));
                }
            }
            AstNode::If {
                then_body,
                else_body,
                debug,
            } => {
                let then_label = self.next_label("if_then", *debug);
                let else_label = self.next_label("if_else", *debug);
                let end = self.next_label("if_end", *debug);
                asm.instr("pop {r0}");
                asm.instr("cmp r0, #1");
                asm.instr(format!("beq {then_label}"));
                asm.instr(format!("bl {else_label}"));
                asm.label(then_label);
                self.lower_block(then_body, asm)?;
                asm.instr(format!("bl {end}"));
                asm.label(else_label);
                if let Some(else_body) = else_body {
                    self.lower_block(else_body, asm)?;
                }
                asm.label(end);
            }
            AstNode::While {
                predicate,
                body,
                debug,
            } => {
                let start = self.next_label("while", *debug);
                let body_label = self.next_label("while_body", *debug);
                let end = self.next_label("while_end", *debug);
                asm.label(start.clone());
                self.lower_block(predicate, asm)?;
                asm.instr("pop {r0}");
                asm.instr("cmp r0, #1");
                asm.instr(format!("beq {body_label}"));
                asm.instr(format!("bl {end}"));
                asm.label(body_label);
                self.lower_block(body, asm)?;
                asm.instr(format!("bl {start}"));
                asm.label(end);
            }
            AstNode::Return { count, debug } => {
                let Some(frame) = self.frame.as_mut() else {
                    return Err(unlowerable(node));
                };
                match frame.return_count {
                    Some(expected) if expected != *count => {
                        return Err(CompileError::InconsistentReturnCount {
                            function: frame.function.clone(),
                            expected,
                            found: *count,
                            debug: *debug,
                        });
                    }
                    _ => frame.return_count = Some(*count),
                }
                let results = register_list(0, usize::from(*count));
                if let Some(results) = &results {
                    asm.instr(format!("pop {{{results}}}"));
                }
                asm.instr("mov sp, r7");
                if let Some(results) = &results {
                    asm.instr(format!("push {{{results}}}"));
                }
            }
            AstNode::Function(function) => self.lower_function(function, asm)?,
            AstNode::Copy { .. } => {
                asm.instr("pop {r0}");
                asm.instr("push {r0}");
                asm.instr("push {r0}");
            }
            AstNode::Value { .. } => return Err(unlowerable(node)),
        }
        Ok(())
    }

    /// Pushes a parameter or variable. Returns false when `name` is neither.
    fn push_named_value(&self, name: &str, asm: &mut Assembly) -> bool {
        if let Some(register) = self.parameter_register(name) {
            asm.instr(format!("push {{r{register}}}"));
        } else if self.is_variable(name) {
            asm.instr(format!("ldr r1, ={}", variable_label(name)));
            asm.instr("ldr r0, [r1]");
            asm.instr("push {r0}");
        } else {
            return false;
        }
        true
    }

    fn lower_function(
        &mut self,
        function: &FunctionNode,
        asm: &mut Assembly,
    ) -> Result<(), CompileError> {
        let count = function.params.len();
        if count > MAX_PARAMETERS {
            return Err(CompileError::TooManyParameters {
                function: function.name.clone(),
                count,
                debug: function.debug,
            });
        }
        if !self.functions.insert(function.name.clone()) {
            return Err(CompileError::DuplicateFunction {
                function: function.name.clone(),
                debug: function.debug,
            });
        }
        debug!(function = %function.name, params = count, "Lowering function");

        let label = function_label(&function.name);
        let skip = self.next_label("skip", function.debug);
        asm.instr(format!("bl {skip}"));
        asm.directive(".thumb_func");
        asm.label(label);

        // The last parameter is on top of the stack, so it lands in r0.
        if let Some(arguments) = register_list(0, count) {
            asm.instr(format!("pop {{{arguments}}}"));
        }
        asm.instr("push {r4, r5, r6, r7, lr}");
        asm.instr("mov r7, sp");
        for index in 0..count {
            asm.instr(format!(
                "mov r{}, r{}",
                PARAM_BASE_REGISTER + index,
                count - 1 - index
            ));
        }

        let enclosing = self.frame.replace(Frame {
            function: function.name.clone(),
            params: function.params.iter().map(|param| param.name.clone()).collect(),
            return_count: None,
        });
        let lowered = self.lower_block(&function.body, asm);
        let frame = std::mem::replace(&mut self.frame, enclosing);
        lowered?;

        let return_count = frame.and_then(|frame| frame.return_count).unwrap_or(0);
        let results = register_list(0, usize::from(return_count));
        if let Some(results) = &results {
            asm.instr(format!("pop {{{results}}}"));
        }
        asm.instr("mov sp, r7");
        asm.instr("pop {r4, r5, r6, r7}");
        asm.instr("pop {r3}");
        asm.instr("mov lr, r3");
        if let Some(results) = &results {
            asm.instr(format!("push {{{results}}}"));
        }
        asm.instr("mov pc, lr");
        asm.literal_pool();
        asm.label(skip);
        Ok(())
    }
}

/// Compiles `program` with unique labels.
pub fn compile(program: &Program, target: Target) -> Result<String, CompileError> {
    M0Compiler::new(target).compile(program)
}

/// Calls `symbol` with `sp` rounded down to 8 bytes. The caller's `sp` is
/// saved in the padding below it; `r0` passes through untouched.
fn aligned_call(asm: &mut Assembly, symbol: &str) {
    asm.instr("mov r2, sp");
    asm.instr("mov r1, sp");
    asm.instr("sub r1, #8");
    asm.instr("lsr r1, r1, #3");
    asm.instr("lsl r1, r1, #3");
    asm.instr("mov sp, r1");
    asm.instr("str r2, [sp]");
    asm.instr(format!("bl {symbol}"));
    asm.instr("ldr r1, [sp]");
    asm.instr("mov sp, r1");
}

fn load_immediate(asm: &mut Assembly, register: &str, value: u32) {
    if value < 256 {
        asm.instr(format!("mov {register}, #{value}"));
    } else {
        asm.instr(format!("ldr {register}, ={value}"));
    }
}

/// `r{first}, ..., r{first + count - 1}`, or `None` for an empty list.
fn register_list(first: usize, count: usize) -> Option<String> {
    if count == 0 {
        return None;
    }
    Some(
        (first..first + count)
            .map(|register| format!("r{register}"))
            .collect::<Vec<_>>()
            .join(", "),
    )
}

fn mangle_symbol_component(value: &str) -> String {
    value
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

fn function_label(name: &str) -> String {
    format!("fn_{}", mangle_symbol_component(name))
}

fn variable_label(name: &str) -> String {
    format!("var_{}", mangle_symbol_component(name))
}

fn unlowerable(node: &AstNode) -> CompileError {
    CompileError::UnlowerableNode {
        node: node.debug_string(),
        debug: node.debug(),
    }
}
