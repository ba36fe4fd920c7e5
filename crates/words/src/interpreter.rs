//! Tree-walking interpreter.
//!
//! Every node takes the current `(Stack, Dictionary)` pair by value and hands
//! back the pair it leaves behind. Blocks are folds over their nodes and loops
//! are plain `loop`s, so native stack depth only grows with nested function
//! calls, which are bounded by [`Interpreter::with_max_call_depth`].
//! [`Interpreter::execute_program`] runs on its own thread whose stack is
//! sized for that bound, so hitting the limit is an error and never an abort.

use std::collections::HashMap;
use std::fmt;
use std::io::{self, Write};
use std::rc::Rc;
use std::str::FromStr;
use std::thread;

use serde::Serialize;
use tracing::{debug, trace};

use crate::ast::{ArithmeticOp, AstNode, BooleanOp, DictionaryOp, FunctionNode, Program};
use crate::token::{DebugData, MacroKind};

pub const DEFAULT_MAX_CALL_DEPTH: usize = 1024;

/// Native stack reserved for every nested call. One call passes through
/// `execute`, `call`, `execute_block` and the blocks enclosing the call site,
/// and unoptimized builds keep those frames large.
const NATIVE_STACK_PER_CALL: usize = 64 * 1024;
const NATIVE_STACK_BASE: usize = 2 * 1024 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum StackValue {
    Int(i64),
    Bool(bool),
}

impl fmt::Display for StackValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackValue::Int(value) => write!(f, "{value}"),
            StackValue::Bool(true) => f.write_str("True"),
            StackValue::Bool(false) => f.write_str("False"),
        }
    }
}

impl From<i64> for StackValue {
    fn from(value: i64) -> Self {
        StackValue::Int(value)
    }
}

impl From<bool> for StackValue {
    fn from(value: bool) -> Self {
        StackValue::Bool(value)
    }
}

impl FromStr for StackValue {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "True" => Ok(StackValue::Bool(true)),
            "False" => Ok(StackValue::Bool(false)),
            _ => s
                .parse::<i64>()
                .map(StackValue::Int)
                .map_err(|_| anyhow::anyhow!("expected an integer, True or False, got {s:?}")),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Stack {
    values: Vec<StackValue>,
}

impl Stack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: StackValue) {
        self.values.push(value);
    }

    pub fn pop(&mut self) -> Option<StackValue> {
        self.values.pop()
    }

    pub fn top(&self) -> Option<&StackValue> {
        self.values.last()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[StackValue] {
        &self.values
    }

    /// Removes the top `count` values, returned in push order.
    pub fn split_off_top(&mut self, count: usize) -> Vec<StackValue> {
        let at = self.values.len().saturating_sub(count);
        self.values.split_off(at)
    }

    pub fn extend(&mut self, other: Stack) {
        self.values.extend(other.values);
    }

    fn require(&self, expected: usize, node: &AstNode) -> Result<(), RuntimeError> {
        if self.values.len() < expected {
            return Err(RuntimeError::StackSize {
                node: node.describe(),
                expected,
                actual: self.values.len(),
                debug: node.debug(),
            });
        }
        Ok(())
    }
}

impl From<Vec<StackValue>> for Stack {
    fn from(values: Vec<StackValue>) -> Self {
        Self { values }
    }
}

impl FromIterator<StackValue> for Stack {
    fn from_iter<T: IntoIterator<Item = StackValue>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DictionaryEntry {
    /// Declared with `VARIABLE` but never assigned.
    Unassigned,
    Value(StackValue),
    Callable(Rc<FunctionNode>),
}

/// Names visible to the running code. Declarations are write-once, `ASSIGN`
/// and parameter binding overwrite.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Dictionary {
    entries: HashMap<String, DictionaryEntry>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&DictionaryEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn value_of(&self, name: &str) -> Option<StackValue> {
        match self.entries.get(name) {
            Some(DictionaryEntry::Value(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn declare(
        &mut self,
        name: &str,
        entry: DictionaryEntry,
        debug: DebugData,
    ) -> Result<(), RuntimeError> {
        if self.entries.contains_key(name) {
            return Err(RuntimeError::IdentifierPreviouslyDefined {
                name: name.to_string(),
                debug,
            });
        }
        self.entries.insert(name.to_string(), entry);
        Ok(())
    }

    pub fn bind(&mut self, name: &str, value: StackValue) {
        self.entries
            .insert(name.to_string(), DictionaryEntry::Value(value));
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("incorrect stack size for \"{node}\" at {debug}: expected {expected}, got {actual}")]
    StackSize {
        node: String,
        expected: usize,
        actual: usize,
        debug: DebugData,
    },
    #[error("got a non-boolean predicate {value} for \"{node}\" at {debug}")]
    InvalidPredicate {
        node: String,
        value: StackValue,
        debug: DebugData,
    },
    #[error("undefined function or variable \"{name}\" at {debug}")]
    UndefinedIdentifier { name: String, debug: DebugData },
    #[error("\"{name}\" at {debug} was previously defined")]
    IdentifierPreviouslyDefined { name: String, debug: DebugData },
    #[error("variable \"{name}\" at {debug} is read before it is assigned")]
    UnassignedIdentifier { name: String, debug: DebugData },
    #[error("\"{node}\" at {debug} cannot be applied to {second} and {top}")]
    InvalidOperand {
        node: String,
        second: StackValue,
        top: StackValue,
        debug: DebugData,
    },
    #[error("arithmetic overflow in \"{node}\" at {debug}")]
    ArithmeticOverflow { node: String, debug: DebugData },
    #[error("parameter \"{name}\" at {debug} is declared outside of a function header")]
    ParameterOutsideFunction { name: String, debug: DebugData },
    #[error("\"{name}\" at {debug} names a function, not a value")]
    NotAValue { name: String, debug: DebugData },
    #[error("calling \"{function}\" at {debug} exceeds the maximum call depth of {limit}")]
    CallDepthExceeded {
        function: String,
        limit: usize,
        debug: DebugData,
    },
    #[error("failed to write program output")]
    Output(#[from] io::Error),
    #[error("failed to start the interpreter thread")]
    Thread(#[source] io::Error),
}

impl RuntimeError {
    pub fn code(&self) -> &'static str {
        match self {
            RuntimeError::StackSize { .. } => "WORDS-RUNTIME-001",
            RuntimeError::InvalidPredicate { .. } => "WORDS-RUNTIME-002",
            RuntimeError::UndefinedIdentifier { .. } => "WORDS-RUNTIME-003",
            RuntimeError::IdentifierPreviouslyDefined { .. } => "WORDS-RUNTIME-004",
            RuntimeError::UnassignedIdentifier { .. } => "WORDS-RUNTIME-005",
            RuntimeError::InvalidOperand { .. } => "WORDS-RUNTIME-006",
            RuntimeError::ArithmeticOverflow { .. } => "WORDS-RUNTIME-007",
            RuntimeError::ParameterOutsideFunction { .. } => "WORDS-RUNTIME-008",
            RuntimeError::NotAValue { .. } => "WORDS-RUNTIME-009",
            RuntimeError::CallDepthExceeded { .. } => "WORDS-RUNTIME-010",
            RuntimeError::Output(_) => "WORDS-RUNTIME-011",
            RuntimeError::Thread(_) => "WORDS-RUNTIME-012",
        }
    }

    pub fn debug_data(&self) -> Option<DebugData> {
        match self {
            RuntimeError::StackSize { debug, .. }
            | RuntimeError::InvalidPredicate { debug, .. }
            | RuntimeError::UndefinedIdentifier { debug, .. }
            | RuntimeError::IdentifierPreviouslyDefined { debug, .. }
            | RuntimeError::UnassignedIdentifier { debug, .. }
            | RuntimeError::InvalidOperand { debug, .. }
            | RuntimeError::ArithmeticOverflow { debug, .. }
            | RuntimeError::ParameterOutsideFunction { debug, .. }
            | RuntimeError::NotAValue { debug, .. }
            | RuntimeError::CallDepthExceeded { debug, .. } => Some(*debug),
            RuntimeError::Output(_) | RuntimeError::Thread(_) => None,
        }
    }
}

pub struct Interpreter<W: Write = io::Stdout> {
    output: W,
    max_call_depth: usize,
    call_depth: usize,
}

impl Interpreter<io::Stdout> {
    pub fn new() -> Self {
        Self::with_output(io::stdout())
    }
}

impl Default for Interpreter<io::Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> Interpreter<W> {
    /// An interpreter whose `__PRINT__` output goes to `output`.
    pub fn with_output(output: W) -> Self {
        Self {
            output,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            call_depth: 0,
        }
    }

    pub fn with_max_call_depth(mut self, max_call_depth: usize) -> Self {
        self.max_call_depth = max_call_depth;
        self
    }

    pub fn output(&self) -> &W {
        &self.output
    }

    /// Runs `program` from `initial_stack` and an empty dictionary, returning
    /// the value left on top of the stack, if any.
    ///
    /// The program runs on a dedicated thread with enough native stack for
    /// `max_call_depth` nested calls. [`Interpreter::execute_block`] runs on
    /// the caller's thread and gets no such guarantee.
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn execute_program(
        &mut self,
        program: &Program,
        initial_stack: Stack,
    ) -> Result<Option<StackValue>, RuntimeError>
    where
        W: Send,
    {
        let stack_size = self
            .max_call_depth
            .saturating_mul(NATIVE_STACK_PER_CALL)
            .saturating_add(NATIVE_STACK_BASE);
        debug!(stack_size, max_call_depth = self.max_call_depth, "Spawning interpreter thread");

        thread::scope(|scope| -> Result<Option<StackValue>, RuntimeError> {
            let handle = thread::Builder::new()
                .name("words-interpreter".to_string())
                .stack_size(stack_size)
                .spawn_scoped(scope, || -> Result<Option<StackValue>, RuntimeError> {
                    let (stack, _) =
                        self.execute_block(&program.nodes, initial_stack, Dictionary::new())?;
                    Ok(stack.top().copied())
                })
                .map_err(RuntimeError::Thread)?;
            handle
                .join()
                .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
        })
    }

    pub fn execute_block(
        &mut self,
        nodes: &[AstNode],
        stack: Stack,
        dictionary: Dictionary,
    ) -> Result<(Stack, Dictionary), RuntimeError> {
        nodes
            .iter()
            .try_fold((stack, dictionary), |(stack, dictionary), node| {
                self.execute(node, stack, dictionary)
            })
    }

    pub fn execute(
        &mut self,
        node: &AstNode,
        mut stack: Stack,
        mut dictionary: Dictionary,
    ) -> Result<(Stack, Dictionary), RuntimeError> {
        trace!(node = %node, stack_len = stack.len(), "Executing node");

        match node {
            AstNode::Number { value, .. } => stack.push(StackValue::Int(i64::from(*value))),
            AstNode::Boolean { value, .. } => stack.push(StackValue::Bool(*value)),
            AstNode::Macro {
                kind: MacroKind::Print,
                ..
            } => {
                stack.require(1, node)?;
                if let Some(top) = stack.top() {
                    writeln!(self.output, "{top}")?;
                }
            }
            AstNode::ArithmeticOp { op, .. } => {
                let (second, top) = pop_two(&mut stack, node)?;
                stack.push(apply_arithmetic(*op, second, top, node)?);
            }
            AstNode::BooleanOp { op, .. } => {
                let (second, top) = pop_two(&mut stack, node)?;
                stack.push(StackValue::Bool(apply_comparison(*op, second, top, node)?));
            }
            AstNode::DictionaryOp {
                op: DictionaryOp::Assign,
                target,
                ..
            } => {
                let value = pop_one(&mut stack, node)?;
                dictionary.bind(target, value);
            }
            AstNode::DictionaryOp {
                op: DictionaryOp::Retrieve,
                target,
                debug,
            } => stack.push(retrieve(&dictionary, target, *debug)?),
            AstNode::Variable { name, debug } => {
                dictionary.declare(name, DictionaryEntry::Unassigned, *debug)?;
            }
            AstNode::Value { name, debug } => {
                return Err(RuntimeError::ParameterOutsideFunction {
                    name: name.clone(),
                    debug: *debug,
                });
            }
            AstNode::Ident { name, debug } => {
                if let Some(DictionaryEntry::Callable(function)) = dictionary.get(name) {
                    let function = Rc::clone(function);
                    return self.call(&function, node, stack, dictionary);
                }
                stack.push(retrieve(&dictionary, name, *debug)?);
            }
            AstNode::While {
                predicate, body, ..
            } => loop {
                let (outcome, _) =
                    self.execute_block(predicate, stack.clone(), dictionary.clone())?;
                if !expect_predicate(outcome.top().copied(), node)? {
                    break;
                }
                (stack, dictionary) = self.execute_block(body, stack, dictionary)?;
            },
            AstNode::If {
                then_body,
                else_body,
                ..
            } => {
                let predicate = pop_one(&mut stack, node)?;
                let branch = if expect_predicate(Some(predicate), node)? {
                    Some(then_body)
                } else {
                    else_body.as_ref()
                };
                if let Some(branch) = branch {
                    return self.execute_block(branch, stack, dictionary);
                }
            }
            AstNode::Return { count, .. } => {
                let count = usize::from(*count);
                stack.require(count, node)?;
                stack = Stack::from(stack.split_off_top(count));
            }
            AstNode::Function(function) => {
                dictionary.declare(
                    &function.name,
                    DictionaryEntry::Callable(Rc::new(function.clone())),
                    function.debug,
                )?;
                debug!(function = %function.name, params = function.params.len(), "Registered function");
            }
            AstNode::Copy { .. } => {
                stack.require(1, node)?;
                if let Some(top) = stack.top().copied() {
                    stack.push(top);
                }
            }
        }

        Ok((stack, dictionary))
    }

    /// Binds the arguments and runs the body in a copy of the caller's
    /// dictionary. The topmost stack value binds to the last parameter.
    fn call(
        &mut self,
        function: &FunctionNode,
        call_site: &AstNode,
        mut stack: Stack,
        dictionary: Dictionary,
    ) -> Result<(Stack, Dictionary), RuntimeError> {
        if self.call_depth >= self.max_call_depth {
            return Err(RuntimeError::CallDepthExceeded {
                function: function.name.clone(),
                limit: self.max_call_depth,
                debug: call_site.debug(),
            });
        }

        stack.require(function.params.len(), call_site)?;
        let arguments = stack.split_off_top(function.params.len());
        let mut bound = dictionary.clone();
        for (param, value) in function.params.iter().zip(arguments) {
            bound.bind(&param.name, value);
        }

        self.call_depth += 1;
        debug!(function = %function.name, depth = self.call_depth, "Calling function");
        let result = self.execute_block(&function.body, stack.clone(), bound);
        self.call_depth -= 1;

        let (body_stack, _) = result?;
        stack.extend(body_stack);
        Ok((stack, dictionary))
    }
}

fn pop_one(stack: &mut Stack, node: &AstNode) -> Result<StackValue, RuntimeError> {
    stack.require(1, node)?;
    stack.pop().ok_or_else(|| unreachable_underflow(node))
}

/// Pops `(second, top)`, in push order.
fn pop_two(stack: &mut Stack, node: &AstNode) -> Result<(StackValue, StackValue), RuntimeError> {
    stack.require(2, node)?;
    let top = stack.pop().ok_or_else(|| unreachable_underflow(node))?;
    let second = stack.pop().ok_or_else(|| unreachable_underflow(node))?;
    Ok((second, top))
}

fn unreachable_underflow(node: &AstNode) -> RuntimeError {
    RuntimeError::StackSize {
        node: node.describe(),
        expected: 1,
        actual: 0,
        debug: node.debug(),
    }
}

fn retrieve(
    dictionary: &Dictionary,
    name: &str,
    debug: DebugData,
) -> Result<StackValue, RuntimeError> {
    match dictionary.get(name) {
        Some(DictionaryEntry::Value(value)) => Ok(*value),
        Some(DictionaryEntry::Unassigned) => Err(RuntimeError::UnassignedIdentifier {
            name: name.to_string(),
            debug,
        }),
        Some(DictionaryEntry::Callable(_)) => Err(RuntimeError::NotAValue {
            name: name.to_string(),
            debug,
        }),
        None => Err(RuntimeError::UndefinedIdentifier {
            name: name.to_string(),
            debug,
        }),
    }
}

fn expect_predicate(value: Option<StackValue>, node: &AstNode) -> Result<bool, RuntimeError> {
    match value {
        Some(StackValue::Bool(outcome)) => Ok(outcome),
        Some(value) => Err(RuntimeError::InvalidPredicate {
            node: node.describe(),
            value,
            debug: node.debug(),
        }),
        None => Err(RuntimeError::StackSize {
            node: node.describe(),
            expected: 1,
            actual: 0,
            debug: node.debug(),
        }),
    }
}

fn apply_arithmetic(
    op: ArithmeticOp,
    second: StackValue,
    top: StackValue,
    node: &AstNode,
) -> Result<StackValue, RuntimeError> {
    let (StackValue::Int(a), StackValue::Int(b)) = (second, top) else {
        return Err(invalid_operand(node, second, top));
    };
    let result = match op {
        ArithmeticOp::Add => a.checked_add(b),
        ArithmeticOp::Sub => a.checked_sub(b),
    };
    result
        .map(StackValue::Int)
        .ok_or_else(|| RuntimeError::ArithmeticOverflow {
            node: node.describe(),
            debug: node.debug(),
        })
}

fn apply_comparison(
    op: BooleanOp,
    second: StackValue,
    top: StackValue,
    node: &AstNode,
) -> Result<bool, RuntimeError> {
    match (second, top) {
        (StackValue::Int(a), StackValue::Int(b)) => Ok(match op {
            BooleanOp::Equal => a == b,
            BooleanOp::Greater => a > b,
            BooleanOp::Lesser => a < b,
            BooleanOp::GreaterEqual => a >= b,
            BooleanOp::LesserEqual => a <= b,
        }),
        (StackValue::Bool(a), StackValue::Bool(b)) if op == BooleanOp::Equal => Ok(a == b),
        _ => Err(invalid_operand(node, second, top)),
    }
}

fn invalid_operand(node: &AstNode, second: StackValue, top: StackValue) -> RuntimeError {
    RuntimeError::InvalidOperand {
        node: node.describe(),
        second,
        top,
        debug: node.debug(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;

    use super::StackValue::{Bool, Int};

    fn run_with(
        source: &str,
        initial: Vec<StackValue>,
    ) -> Result<(Stack, Dictionary), RuntimeError> {
        let program = parse_source(source).expect("parse source");
        let mut interpreter = Interpreter::with_output(Vec::new());
        interpreter.execute_block(&program.nodes, Stack::from(initial), Dictionary::new())
    }

    fn run(source: &str) -> Result<(Stack, Dictionary), RuntimeError> {
        run_with(source, vec![])
    }

    fn stack_of(source: &str) -> Vec<StackValue> {
        run(source).expect("execute source").0.as_slice().to_vec()
    }

    #[test]
    fn literals_are_pushed() {
        assert_eq!(stack_of("16 True False"), vec![Int(16), Bool(true), Bool(false)]);
    }

    #[test]
    fn addition_uses_the_initial_stack() {
        let (stack, _) = run_with("52 +", vec![Int(921)]).unwrap();
        assert_eq!(stack.as_slice(), &[Int(973)]);
    }

    #[test]
    fn subtraction_can_go_negative() {
        assert_eq!(stack_of("25 52 -"), vec![Int(-27)]);
    }

    #[test]
    fn comparisons() {
        assert_eq!(stack_of("52 52 =="), vec![Bool(true)]);
        assert_eq!(stack_of("52 85 =="), vec![Bool(false)]);
        assert_eq!(stack_of("3 2 >"), vec![Bool(true)]);
        assert_eq!(stack_of("3 2 <"), vec![Bool(false)]);
        assert_eq!(stack_of("2 2 >="), vec![Bool(true)]);
        assert_eq!(stack_of("3 2 <="), vec![Bool(false)]);
        assert_eq!(stack_of("True True =="), vec![Bool(true)]);
    }

    #[test]
    fn operands_are_never_coerced() {
        let err = run("True 1 +").unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidOperand { .. }));
        let err = run("True 1 ==").unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidOperand { .. }));
        let err = run("True False <").unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidOperand { .. }));
    }

    #[test]
    fn print_keeps_the_top() {
        let program = parse_source("42 __PRINT__").unwrap();
        let mut interpreter = Interpreter::with_output(Vec::new());
        let result = interpreter.execute_program(&program, Stack::new()).unwrap();
        assert_eq!(result, Some(Int(42)));
        assert_eq!(String::from_utf8_lossy(interpreter.output()), "42\n");
    }

    #[test]
    fn underflow_is_a_stack_size_error() {
        for source in ["+", "1 -", "1 ==", "__PRINT__", "1 RETURN 2", "ASSIGN X", "COPY", "IF THEN"] {
            let err = run(source).unwrap_err();
            assert!(
                matches!(err, RuntimeError::StackSize { .. }),
                "{source}: {err}"
            );
        }
    }

    #[test]
    fn while_loop_counts_to_ten() {
        let (_, dictionary) = run(
            "VARIABLE X\n0 ASSIGN X\nBEGIN X 10 < WHILE X 1 + ASSIGN X REPEAT",
        )
        .unwrap();
        assert_eq!(dictionary.value_of("X"), Some(Int(10)));
    }

    #[test]
    fn long_loops_do_not_grow_the_native_stack() {
        let (_, dictionary) = run(
            "VARIABLE X 0 ASSIGN X BEGIN X 100000 < WHILE X 1 + ASSIGN X REPEAT",
        )
        .unwrap();
        assert_eq!(dictionary.value_of("X"), Some(Int(100_000)));
    }

    #[test]
    fn while_predicate_runs_on_a_copy_of_the_state() {
        assert_eq!(
            stack_of("VARIABLE X 0 ASSIGN X BEGIN X 3 < WHILE X 1 + ASSIGN X REPEAT"),
            vec![]
        );

        let (stack, dictionary) =
            run("VARIABLE X 0 ASSIGN X BEGIN 9 ASSIGN X X 3 < WHILE 3 ASSIGN X REPEAT").unwrap();
        assert!(stack.is_empty());
        assert_eq!(dictionary.value_of("X"), Some(Int(0)));
    }

    #[test]
    fn while_predicate_must_be_boolean() {
        let err = run("BEGIN 1 WHILE 1 REPEAT").unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidPredicate { .. }));
    }

    #[test]
    fn if_branches() {
        assert_eq!(stack_of("True IF 1 ELSE 2 THEN"), vec![Int(1)]);
        assert_eq!(stack_of("False IF 1 ELSE 2 THEN"), vec![Int(2)]);
        assert_eq!(stack_of("False IF 1 THEN"), vec![]);
        assert_eq!(stack_of("True IF 1 THEN"), vec![Int(1)]);
    }

    #[test]
    fn if_predicate_must_be_boolean() {
        let err = run("1 IF 1 THEN").unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidPredicate { .. }));
    }

    #[test]
    fn return_keeps_the_top_values() {
        assert_eq!(stack_of("1 2 3 RETURN 2"), vec![Int(2), Int(3)]);
        assert_eq!(stack_of("1 2 3 RETURN 0"), vec![]);
    }

    #[test]
    fn function_round_trip() {
        let (stack, _) = run_with("| F ( VALUE X ) X RETURN 1 | F", vec![Int(20)]).unwrap();
        assert_eq!(stack.as_slice(), &[Int(20)]);
    }

    #[test]
    fn topmost_value_binds_to_the_last_parameter() {
        assert_eq!(
            stack_of("| SUB ( VALUE A VALUE B ) A B - RETURN 1 | 10 3 SUB"),
            vec![Int(7)]
        );
    }

    #[test]
    fn results_are_appended_to_the_remaining_stack() {
        assert_eq!(
            stack_of("| INC ( VALUE N ) N 1 + RETURN 1 | 5 6 INC"),
            vec![Int(5), Int(7)]
        );
    }

    #[test]
    fn calls_do_not_leak_bindings() {
        let (_, dictionary) = run(
            "VARIABLE X 1 ASSIGN X | F ( VALUE N ) N ASSIGN X X RETURN 1 | 9 F",
        )
        .unwrap();
        assert_eq!(dictionary.value_of("X"), Some(Int(1)));
        assert!(!dictionary.contains("N"));
    }

    #[test]
    fn calls_need_enough_arguments() {
        let err = run("| F ( VALUE A VALUE B ) A RETURN 1 | 1 F").unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::StackSize {
                expected: 2,
                actual: 1,
                ..
            }
        ));
    }

    #[test]
    fn recursion_is_bounded() {
        let program = parse_source("| LOOP ( ) LOOP RETURN 0 | LOOP").unwrap();
        let mut interpreter = Interpreter::with_output(Vec::new()).with_max_call_depth(16);
        let err = interpreter
            .execute_program(&program, Stack::new())
            .unwrap_err();
        assert!(matches!(err, RuntimeError::CallDepthExceeded { limit: 16, .. }));
    }

    const COUNT_DOWN: &str =
        "| DOWN ( VALUE N ) N 0 == IF 0 ELSE N 1 - DOWN THEN RETURN 1 |";

    fn count_down(from: usize) -> Result<Option<StackValue>, RuntimeError> {
        let program = parse_source(&format!("{COUNT_DOWN} {from} DOWN")).unwrap();
        Interpreter::with_output(Vec::new()).execute_program(&program, Stack::new())
    }

    #[test]
    fn recursion_up_to_the_default_limit_completes() {
        // DOWN from n nests n + 1 calls.
        let result = count_down(DEFAULT_MAX_CALL_DEPTH - 1).unwrap();
        assert_eq!(result, Some(Int(0)));
    }

    #[test]
    fn recursion_past_the_default_limit_fails_cleanly() {
        let err = count_down(DEFAULT_MAX_CALL_DEPTH).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::CallDepthExceeded {
                limit: DEFAULT_MAX_CALL_DEPTH,
                ..
            }
        ));
        assert_eq!(err.code(), "WORDS-RUNTIME-010");
    }

    #[test]
    fn interpreter_is_reusable_after_hitting_the_limit() {
        let program = parse_source(&format!("{COUNT_DOWN} 40 DOWN")).unwrap();
        let mut interpreter = Interpreter::with_output(Vec::new()).with_max_call_depth(32);
        assert!(interpreter.execute_program(&program, Stack::new()).is_err());

        let program = parse_source(&format!("{COUNT_DOWN} 20 DOWN")).unwrap();
        assert_eq!(
            interpreter.execute_program(&program, Stack::new()).unwrap(),
            Some(Int(0))
        );
    }

    #[test]
    fn recursive_fibonacci() {
        let program = parse_source(
            "| FIB ( VALUE N ) N 2 < IF N ELSE N 1 - FIB N 2 - FIB + THEN RETURN 1 |\n10 FIB",
        )
        .unwrap();
        let mut interpreter = Interpreter::with_output(Vec::new());
        let result = interpreter.execute_program(&program, Stack::new()).unwrap();
        assert_eq!(result, Some(Int(55)));
    }

    #[test]
    fn declarations_are_write_once() {
        let err = run("VARIABLE X VARIABLE X").unwrap_err();
        assert!(matches!(err, RuntimeError::IdentifierPreviouslyDefined { .. }));

        let err = run("| F ( ) RETURN 0 | | F ( ) RETURN 0 |").unwrap_err();
        assert!(matches!(err, RuntimeError::IdentifierPreviouslyDefined { .. }));

        let err = run("VARIABLE F | F ( ) RETURN 0 |").unwrap_err();
        assert!(matches!(err, RuntimeError::IdentifierPreviouslyDefined { .. }));
    }

    #[test]
    fn assignment_overwrites() {
        assert_eq!(
            stack_of("VARIABLE X 5 ASSIGN X 6 ASSIGN X X"),
            vec![Int(6)]
        );
    }

    #[test]
    fn lookups() {
        let err = run("Y").unwrap_err();
        assert!(matches!(err, RuntimeError::UndefinedIdentifier { .. }));

        let err = run("VARIABLE Y Y").unwrap_err();
        assert!(matches!(err, RuntimeError::UnassignedIdentifier { .. }));

        let err = run("| F ( ) RETURN 0 | RETRIEVE F").unwrap_err();
        assert!(matches!(err, RuntimeError::NotAValue { .. }));

        assert_eq!(stack_of("VARIABLE Y 3 ASSIGN Y RETRIEVE Y"), vec![Int(3)]);
    }

    #[test]
    fn stray_parameter_cannot_execute() {
        let err = run("VALUE X").unwrap_err();
        assert!(matches!(err, RuntimeError::ParameterOutsideFunction { .. }));
    }

    #[test]
    fn copy_duplicates_the_top() {
        assert_eq!(stack_of("4 COPY +"), vec![Int(8)]);
    }

    #[test]
    fn empty_program_has_no_result() {
        let program = parse_source("").unwrap();
        let mut interpreter = Interpreter::with_output(Vec::new());
        assert_eq!(
            interpreter.execute_program(&program, Stack::new()).unwrap(),
            None
        );
        assert_eq!(
            interpreter
                .execute_program(&program, Stack::from(vec![Int(921)]))
                .unwrap(),
            Some(Int(921))
        );
    }

    #[test]
    fn stack_values_parse_from_cli_text() {
        assert_eq!("True".parse::<StackValue>().unwrap(), Bool(true));
        assert_eq!("-4".parse::<StackValue>().unwrap(), Int(-4));
        assert!("maybe".parse::<StackValue>().is_err());
    }
}
