//! Lexical tokens, and the rules by which each kind of token turns itself into
//! an AST node.
//!
//! Parsing is driven by the tokens themselves: the parser pulls one token off
//! the stream and hands it the rest of the stream. Keywords such as `BEGIN`,
//! `IF` and `|` keep pulling until they have consumed their whole construct,
//! so the extent of every multi-token form is decided in exactly one place.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ast::{
    ArithmeticOp, AstNode, BooleanOp, DictionaryOp, FunctionNode, Parameter, MAX_RETURN_COUNT,
};
use crate::lexer::Word;
use crate::parser::{eat_until, eat_until_discarding, Parse, ParseError, TokenStream};

/// Source position of a token. Lines and columns are 0-based; columns are
/// byte offsets into the line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugData {
    pub line: usize,
    pub column: usize,
}

impl DebugData {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for DebugData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}", self.line + 1)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Delim {
    Open,
    Close,
}

impl Delim {
    pub fn from_word(word: &str) -> Option<Self> {
        match word {
            "(" => Some(Delim::Open),
            ")" => Some(Delim::Close),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Delim::Open => "(",
            Delim::Close => ")",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Keyword {
    Begin,
    While,
    Repeat,
    If,
    Else,
    Then,
    Variable,
    Value,
    Return,
    Function,
    Lambda,
    Copy,
}

impl Keyword {
    pub fn from_word(word: &str) -> Option<Self> {
        let keyword = match word {
            "BEGIN" => Keyword::Begin,
            "WHILE" => Keyword::While,
            "REPEAT" => Keyword::Repeat,
            "IF" => Keyword::If,
            "ELSE" => Keyword::Else,
            "THEN" => Keyword::Then,
            "VARIABLE" => Keyword::Variable,
            "VALUE" => Keyword::Value,
            "RETURN" => Keyword::Return,
            "|" => Keyword::Function,
            "λ" => Keyword::Lambda,
            "COPY" => Keyword::Copy,
            _ => return None,
        };
        Some(keyword)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::Begin => "BEGIN",
            Keyword::While => "WHILE",
            Keyword::Repeat => "REPEAT",
            Keyword::If => "IF",
            Keyword::Else => "ELSE",
            Keyword::Then => "THEN",
            Keyword::Variable => "VARIABLE",
            Keyword::Value => "VALUE",
            Keyword::Return => "RETURN",
            Keyword::Function => "|",
            Keyword::Lambda => "λ",
            Keyword::Copy => "COPY",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiteralKind {
    Number,
    Comment,
    True,
    False,
}

impl LiteralKind {
    /// Matches the fixed literal words. Numbers are not matched here; they are
    /// the numeric fallback of [`LexicalToken::classify`].
    pub fn from_word(word: &str) -> Option<Self> {
        match word {
            "True" => Some(LiteralKind::True),
            "False" => Some(LiteralKind::False),
            _ if word.starts_with('#') => Some(LiteralKind::Comment),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MacroKind {
    Print,
}

impl MacroKind {
    pub fn from_word(word: &str) -> Option<Self> {
        match word {
            "__PRINT__" => Some(MacroKind::Print),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MacroKind::Print => "__PRINT__",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpKind {
    Add,
    Sub,
    Equal,
    Greater,
    Lesser,
    GreaterEqual,
    LesserEqual,
    Assign,
    Retrieve,
}

impl OpKind {
    pub fn from_word(word: &str) -> Option<Self> {
        let op = match word {
            "+" => OpKind::Add,
            "-" => OpKind::Sub,
            "==" => OpKind::Equal,
            ">" => OpKind::Greater,
            "<" => OpKind::Lesser,
            ">=" => OpKind::GreaterEqual,
            "<=" => OpKind::LesserEqual,
            "ASSIGN" => OpKind::Assign,
            "RETRIEVE" => OpKind::Retrieve,
            _ => return None,
        };
        Some(op)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OpKind::Add => "+",
            OpKind::Sub => "-",
            OpKind::Equal => "==",
            OpKind::Greater => ">",
            OpKind::Lesser => "<",
            OpKind::GreaterEqual => ">=",
            OpKind::LesserEqual => "<=",
            OpKind::Assign => "ASSIGN",
            OpKind::Retrieve => "RETRIEVE",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelimToken {
    pub kind: Delim,
    pub debug: DebugData,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentToken {
    pub name: String,
    pub debug: DebugData,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordToken {
    pub kind: Keyword,
    pub debug: DebugData,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiteralToken {
    pub kind: LiteralKind,
    pub content: String,
    pub debug: DebugData,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroToken {
    pub kind: MacroKind,
    pub debug: DebugData,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpToken {
    pub kind: OpKind,
    pub debug: DebugData,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LexicalToken {
    Delim(DelimToken),
    Ident(IdentToken),
    Keyword(KeywordToken),
    Literal(LiteralToken),
    Macro(MacroToken),
    Op(OpToken),
}

impl LexicalToken {
    /// Classifies a word. The order of the checks matters: the first match
    /// wins, and anything unrecognized is an identifier.
    pub fn classify(word: Word) -> Self {
        let Word { content, debug } = word;

        if let Some(kind) = Delim::from_word(&content) {
            return LexicalToken::Delim(DelimToken { kind, debug });
        }
        if let Some(kind) = Keyword::from_word(&content) {
            return LexicalToken::Keyword(KeywordToken { kind, debug });
        }
        if let Some(kind) = LiteralKind::from_word(&content) {
            return LexicalToken::Literal(LiteralToken {
                kind,
                content,
                debug,
            });
        }
        if let Some(kind) = MacroKind::from_word(&content) {
            return LexicalToken::Macro(MacroToken { kind, debug });
        }
        if let Some(kind) = OpKind::from_word(&content) {
            return LexicalToken::Op(OpToken { kind, debug });
        }
        if !content.is_empty() && content.bytes().all(|b| b.is_ascii_digit()) {
            return LexicalToken::Literal(LiteralToken {
                kind: LiteralKind::Number,
                content,
                debug,
            });
        }
        LexicalToken::Ident(IdentToken {
            name: content,
            debug,
        })
    }

    pub fn debug(&self) -> DebugData {
        match self {
            LexicalToken::Delim(token) => token.debug,
            LexicalToken::Ident(token) => token.debug,
            LexicalToken::Keyword(token) => token.debug,
            LexicalToken::Literal(token) => token.debug,
            LexicalToken::Macro(token) => token.debug,
            LexicalToken::Op(token) => token.debug,
        }
    }

    /// The source text the token was classified from.
    pub fn content(&self) -> &str {
        match self {
            LexicalToken::Delim(token) => token.kind.as_str(),
            LexicalToken::Ident(token) => &token.name,
            LexicalToken::Keyword(token) => token.kind.as_str(),
            LexicalToken::Literal(token) => &token.content,
            LexicalToken::Macro(token) => token.kind.as_str(),
            LexicalToken::Op(token) => token.kind.as_str(),
        }
    }

    pub fn debug_string(&self) -> String {
        format!("\"{}\" at {}", self.content(), self.debug())
    }

    pub fn is_comment(&self) -> bool {
        matches!(self, LexicalToken::Literal(literal) if literal.kind == LiteralKind::Comment)
    }

    pub fn is_keyword(&self, kind: Keyword) -> bool {
        matches!(self, LexicalToken::Keyword(keyword) if keyword.kind == kind)
    }

    pub fn is_delim(&self, kind: Delim) -> bool {
        matches!(self, LexicalToken::Delim(delim) if delim.kind == kind)
    }
}

impl Parse for LexicalToken {
    fn parse(self, tokens: &mut TokenStream<'_>) -> Result<AstNode, ParseError> {
        match self {
            LexicalToken::Delim(token) => token.parse(tokens),
            LexicalToken::Ident(token) => token.parse(tokens),
            LexicalToken::Keyword(token) => token.parse(tokens),
            LexicalToken::Literal(token) => token.parse(tokens),
            LexicalToken::Macro(token) => token.parse(tokens),
            LexicalToken::Op(token) => token.parse(tokens),
        }
    }
}

/// Delimiters only ever appear inside a function header, where `|` consumes
/// them itself.
impl Parse for DelimToken {
    fn parse(self, _tokens: &mut TokenStream<'_>) -> Result<AstNode, ParseError> {
        Err(ParseError::InvalidToken {
            token: self.kind.as_str().to_string(),
            debug: self.debug,
        })
    }
}

impl Parse for IdentToken {
    fn parse(self, _tokens: &mut TokenStream<'_>) -> Result<AstNode, ParseError> {
        Ok(AstNode::Ident {
            name: self.name,
            debug: self.debug,
        })
    }
}

impl Parse for KeywordToken {
    fn parse(self, tokens: &mut TokenStream<'_>) -> Result<AstNode, ParseError> {
        let debug = self.debug;
        match self.kind {
            Keyword::Begin => {
                let (predicate, _) =
                    eat_until(tokens, |token| token.is_keyword(Keyword::While), "WHILE")?;
                let body =
                    eat_until_discarding(tokens, |token| token.is_keyword(Keyword::Repeat), "REPEAT")?;
                if body.is_empty() {
                    return Err(ParseError::MissingToken {
                        expected: "a loop body before REPEAT".to_string(),
                        debug,
                    });
                }
                Ok(AstNode::While {
                    predicate,
                    body,
                    debug,
                })
            }
            Keyword::If => {
                let (then_body, terminator) = eat_until(
                    tokens,
                    |token| token.is_keyword(Keyword::Else) || token.is_keyword(Keyword::Then),
                    "ELSE or THEN",
                )?;
                let else_body = if terminator.is_keyword(Keyword::Else) {
                    Some(eat_until_discarding(
                        tokens,
                        |token| token.is_keyword(Keyword::Then),
                        "THEN",
                    )?)
                } else {
                    None
                };
                Ok(AstNode::If {
                    then_body,
                    else_body,
                    debug,
                })
            }
            Keyword::Variable => {
                let ident = expect_identifier(tokens, "a variable name")?;
                Ok(AstNode::Variable {
                    name: ident.name,
                    debug,
                })
            }
            Keyword::Value => {
                let ident = expect_identifier(tokens, "a parameter name")?;
                Ok(AstNode::Value {
                    name: ident.name,
                    debug,
                })
            }
            Keyword::Return => {
                let count = expect_return_count(tokens)?;
                Ok(AstNode::Return { count, debug })
            }
            Keyword::Function => parse_function(tokens, debug),
            Keyword::Lambda => Err(ParseError::NotImplemented {
                feature: "lambda expressions",
                debug,
            }),
            Keyword::Copy => Ok(AstNode::Copy { debug }),
            Keyword::While | Keyword::Repeat | Keyword::Else | Keyword::Then => {
                Err(ParseError::InvalidToken {
                    token: self.kind.as_str().to_string(),
                    debug,
                })
            }
        }
    }
}

impl Parse for LiteralToken {
    fn parse(self, _tokens: &mut TokenStream<'_>) -> Result<AstNode, ParseError> {
        let debug = self.debug;
        match self.kind {
            LiteralKind::Number => {
                let value = self
                    .content
                    .parse::<u32>()
                    .map_err(|_| ParseError::NumericLiteralOverflow {
                        literal: self.content.clone(),
                        debug,
                    })?;
                Ok(AstNode::Number { value, debug })
            }
            LiteralKind::True => Ok(AstNode::Boolean { value: true, debug }),
            LiteralKind::False => Ok(AstNode::Boolean {
                value: false,
                debug,
            }),
            LiteralKind::Comment => Err(ParseError::InvalidToken {
                token: self.content,
                debug,
            }),
        }
    }
}

impl Parse for MacroToken {
    fn parse(self, _tokens: &mut TokenStream<'_>) -> Result<AstNode, ParseError> {
        Ok(AstNode::Macro {
            kind: self.kind,
            debug: self.debug,
        })
    }
}

impl Parse for OpToken {
    fn parse(self, tokens: &mut TokenStream<'_>) -> Result<AstNode, ParseError> {
        let debug = self.debug;
        let node = match self.kind {
            OpKind::Add => AstNode::ArithmeticOp {
                op: ArithmeticOp::Add,
                debug,
            },
            OpKind::Sub => AstNode::ArithmeticOp {
                op: ArithmeticOp::Sub,
                debug,
            },
            OpKind::Equal => AstNode::BooleanOp {
                op: BooleanOp::Equal,
                debug,
            },
            OpKind::Greater => AstNode::BooleanOp {
                op: BooleanOp::Greater,
                debug,
            },
            OpKind::Lesser => AstNode::BooleanOp {
                op: BooleanOp::Lesser,
                debug,
            },
            OpKind::GreaterEqual => AstNode::BooleanOp {
                op: BooleanOp::GreaterEqual,
                debug,
            },
            OpKind::LesserEqual => AstNode::BooleanOp {
                op: BooleanOp::LesserEqual,
                debug,
            },
            OpKind::Assign | OpKind::Retrieve => {
                let op = if self.kind == OpKind::Assign {
                    DictionaryOp::Assign
                } else {
                    DictionaryOp::Retrieve
                };
                let target = expect_identifier(tokens, "a variable name")?;
                AstNode::DictionaryOp {
                    op,
                    target: target.name,
                    debug,
                }
            }
        };
        Ok(node)
    }
}

fn expect_identifier(
    tokens: &mut TokenStream<'_>,
    expected: &'static str,
) -> Result<IdentToken, ParseError> {
    match tokens.next() {
        Some(LexicalToken::Ident(ident)) => Ok(ident),
        Some(other) => Err(ParseError::UnexpectedToken {
            expected: expected.to_string(),
            found: other.debug_string(),
            debug: other.debug(),
        }),
        None => Err(ParseError::MissingToken {
            expected: expected.to_string(),
            debug: tokens.last_debug(),
        }),
    }
}

fn expect_return_count(tokens: &mut TokenStream<'_>) -> Result<u8, ParseError> {
    match tokens.next() {
        Some(LexicalToken::Literal(literal)) if literal.kind == LiteralKind::Number => literal
            .content
            .parse::<u8>()
            .ok()
            .filter(|count| *count <= MAX_RETURN_COUNT)
            .ok_or(ParseError::IncorrectReturnCount {
                found: literal.content,
                debug: literal.debug,
            }),
        Some(other) => Err(ParseError::UnexpectedTokenType {
            expected: "a number of return values".to_string(),
            found: other.debug_string(),
            debug: other.debug(),
        }),
        None => Err(ParseError::MissingToken {
            expected: "a number of return values".to_string(),
            debug: tokens.last_debug(),
        }),
    }
}

/// `| NAME ( VALUE A VALUE B ) body |`
fn parse_function(tokens: &mut TokenStream<'_>, debug: DebugData) -> Result<AstNode, ParseError> {
    let name = expect_identifier(tokens, "a function name")?.name;

    match tokens.next() {
        Some(token) if token.is_delim(Delim::Open) => {}
        Some(other) => {
            return Err(ParseError::UnexpectedTokenType {
                expected: "\"(\"".to_string(),
                found: other.debug_string(),
                debug: other.debug(),
            })
        }
        None => {
            return Err(ParseError::MissingToken {
                expected: "\"(\"".to_string(),
                debug: tokens.last_debug(),
            })
        }
    }

    let params = eat_until_discarding(tokens, |token| token.is_delim(Delim::Close), "\")\"")?
        .into_iter()
        .map(|node| match node {
            AstNode::Value { name, debug } => Ok(Parameter { name, debug }),
            other => Err(ParseError::InvalidParameter {
                function: name.clone(),
                found: other.debug_string(),
                debug: other.debug(),
            }),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let body = eat_until_discarding(
        tokens,
        |token| token.is_keyword(Keyword::Function),
        "a closing \"|\"",
    )?;
    if !body.iter().any(AstNode::contains_return) {
        return Err(ParseError::NoReturnToken {
            function: name,
            debug,
        });
    }

    Ok(AstNode::Function(FunctionNode {
        name,
        params,
        body,
        debug,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(content: &str) -> Word {
        Word {
            content: content.to_string(),
            debug: DebugData::default(),
        }
    }

    fn stream(words: &[&str]) -> Vec<LexicalToken> {
        words
            .iter()
            .map(|content| LexicalToken::classify(word(content)))
            .collect()
    }

    fn parse_one(first: &str, rest: &[&str]) -> Result<AstNode, ParseError> {
        let token = LexicalToken::classify(word(first));
        let mut tokens = TokenStream::new(stream(rest));
        token.parse(&mut tokens)
    }

    #[test]
    fn classification_follows_priority_order() {
        assert!(matches!(LexicalToken::classify(word("(")), LexicalToken::Delim(_)));
        assert!(matches!(LexicalToken::classify(word("|")), LexicalToken::Keyword(_)));
        assert!(matches!(LexicalToken::classify(word("COPY")), LexicalToken::Keyword(_)));
        assert!(matches!(
            LexicalToken::classify(word("True")),
            LexicalToken::Literal(LiteralToken {
                kind: LiteralKind::True,
                ..
            })
        ));
        assert!(LexicalToken::classify(word("#note")).is_comment());
        assert!(matches!(LexicalToken::classify(word("__PRINT__")), LexicalToken::Macro(_)));
        assert!(matches!(LexicalToken::classify(word(">=")), LexicalToken::Op(_)));
        assert!(matches!(
            LexicalToken::classify(word("2")),
            LexicalToken::Literal(LiteralToken {
                kind: LiteralKind::Number,
                ..
            })
        ));
        assert!(matches!(LexicalToken::classify(word("2a")), LexicalToken::Ident(_)));
        assert!(matches!(LexicalToken::classify(word("true")), LexicalToken::Ident(_)));
    }

    #[test]
    fn delimiters_cannot_be_parsed_standalone() {
        let err = parse_one("(", &[]).unwrap_err();
        assert!(matches!(err, ParseError::InvalidToken { .. }));
    }

    #[test]
    fn identifiers_parse_to_ident_nodes() {
        let node = parse_one("IDENT_NAME", &[]).unwrap();
        assert!(matches!(node, AstNode::Ident { ref name, .. } if name == "IDENT_NAME"));
    }

    #[test]
    fn begin_consumes_predicate_and_body() {
        let node = parse_one("BEGIN", &["1", "WHILE", "1", "REPEAT"]).unwrap();
        let AstNode::While {
            predicate, body, ..
        } = node
        else {
            panic!("expected a while node, got {node:?}");
        };
        assert_eq!(predicate.len(), 1);
        assert_eq!(body.len(), 1);
    }

    #[test]
    fn begin_with_empty_body_is_missing_token() {
        let err = parse_one("BEGIN", &["True", "WHILE", "REPEAT"]).unwrap_err();
        assert!(matches!(err, ParseError::MissingToken { .. }));
    }

    #[test]
    fn out_of_place_block_keywords_are_invalid() {
        for keyword in ["WHILE", "REPEAT", "ELSE", "THEN"] {
            let err = parse_one(keyword, &[]).unwrap_err();
            assert!(matches!(err, ParseError::InvalidToken { .. }), "{keyword}");
        }
    }

    #[test]
    fn if_without_else() {
        let node = parse_one("IF", &["0", "THEN"]).unwrap();
        assert!(matches!(
            node,
            AstNode::If { ref then_body, else_body: None, .. } if then_body.len() == 1
        ));
    }

    #[test]
    fn if_with_else() {
        let node = parse_one("IF", &["0", "ELSE", "1", "2", "THEN"]).unwrap();
        assert!(matches!(
            node,
            AstNode::If { ref then_body, else_body: Some(ref else_body), .. }
                if then_body.len() == 1 && else_body.len() == 2
        ));
    }

    #[test]
    fn if_with_empty_branch_is_valid() {
        let node = parse_one("IF", &["ELSE", "0", "THEN"]).unwrap();
        assert!(matches!(node, AstNode::If { ref then_body, .. } if then_body.is_empty()));
    }

    #[test]
    fn if_without_then_is_missing_token() {
        let err = parse_one("IF", &["0"]).unwrap_err();
        assert!(matches!(err, ParseError::MissingToken { .. }));
        let err = parse_one("IF", &["0", "ELSE", "0"]).unwrap_err();
        assert!(matches!(err, ParseError::MissingToken { .. }));
    }

    #[test]
    fn variable_needs_an_identifier() {
        let node = parse_one("VARIABLE", &["X"]).unwrap();
        assert!(matches!(node, AstNode::Variable { ref name, .. } if name == "X"));

        let err = parse_one("VARIABLE", &["5"]).unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedToken { .. }));

        let err = parse_one("VALUE", &[]).unwrap_err();
        assert!(matches!(err, ParseError::MissingToken { .. }));
    }

    #[test]
    fn return_count_is_checked() {
        for count in ["0", "1", "2", "3"] {
            assert!(matches!(
                parse_one("RETURN", &[count]).unwrap(),
                AstNode::Return { .. }
            ));
        }
        let err = parse_one("RETURN", &["4"]).unwrap_err();
        assert!(matches!(err, ParseError::IncorrectReturnCount { .. }));
        let err = parse_one("RETURN", &["True"]).unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedTokenType { .. }));
    }

    #[test]
    fn function_round_trip() {
        let node = parse_one("|", &["F", "(", "VALUE", "X", ")", "X", "RETURN", "1", "|"]).unwrap();
        let AstNode::Function(function) = node else {
            panic!("expected a function node");
        };
        assert_eq!(function.name, "F");
        assert_eq!(function.params.len(), 1);
        assert_eq!(function.params[0].name, "X");
        assert_eq!(function.body.len(), 2);
    }

    #[test]
    fn function_errors() {
        let err = parse_one("|", &["F", "(", ")", "1", "|"]).unwrap_err();
        assert!(matches!(err, ParseError::NoReturnToken { .. }));

        let err = parse_one("|", &["F", "(", "5", ")", "RETURN", "0", "|"]).unwrap_err();
        assert!(matches!(err, ParseError::InvalidParameter { .. }));

        let err = parse_one("|", &["F", "(", "VALUE", "X"]).unwrap_err();
        assert!(matches!(err, ParseError::MissingToken { .. }));

        let err = parse_one("|", &["F", "(", ")", "RETURN", "0"]).unwrap_err();
        assert!(matches!(err, ParseError::MissingToken { .. }));

        let err = parse_one("|", &["F", "X"]).unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedTokenType { .. }));
    }

    #[test]
    fn return_nested_in_a_branch_satisfies_the_function() {
        let node = parse_one(
            "|",
            &["F", "(", ")", "True", "IF", "1", "RETURN", "1", "THEN", "|"],
        )
        .unwrap();
        assert!(matches!(node, AstNode::Function(_)));
    }

    #[test]
    fn lambda_is_not_implemented() {
        let err = parse_one("λ", &[]).unwrap_err();
        assert!(matches!(err, ParseError::NotImplemented { .. }));
    }

    #[test]
    fn numbers_above_u32_overflow() {
        assert!(matches!(
            parse_one("4294967295", &[]).unwrap(),
            AstNode::Number {
                value: u32::MAX,
                ..
            }
        ));
        let err = parse_one("4294967296", &[]).unwrap_err();
        assert!(matches!(err, ParseError::NumericLiteralOverflow { .. }));
    }

    #[test]
    fn operators_map_to_node_kinds() {
        assert!(matches!(
            parse_one("-", &[]).unwrap(),
            AstNode::ArithmeticOp {
                op: ArithmeticOp::Sub,
                ..
            }
        ));
        assert!(matches!(
            parse_one("<=", &[]).unwrap(),
            AstNode::BooleanOp {
                op: BooleanOp::LesserEqual,
                ..
            }
        ));
        assert!(matches!(
            parse_one("ASSIGN", &["X"]).unwrap(),
            AstNode::DictionaryOp { op: DictionaryOp::Assign, ref target, .. } if target == "X"
        ));
        let err = parse_one("ASSIGN", &["+"]).unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedToken { .. }));
    }
}
