use tracing::trace;

use crate::ast::{AstNode, Program};
use crate::token::{DebugData, LexicalToken};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("expected {expected}, got {found}")]
    UnexpectedToken {
        expected: String,
        found: String,
        debug: DebugData,
    },
    #[error("expected a token of type {expected}, got {found}")]
    UnexpectedTokenType {
        expected: String,
        found: String,
        debug: DebugData,
    },
    #[error("expected {expected} after {debug}, but the source ended")]
    MissingToken { expected: String, debug: DebugData },
    #[error("got an invalid token \"{token}\" at {debug}")]
    InvalidToken { token: String, debug: DebugData },
    #[error("got an incorrect number of return values \"{found}\" at {debug}, expected 0, 1, 2 or 3")]
    IncorrectReturnCount { found: String, debug: DebugData },
    #[error("function \"{function}\" at {debug} has no RETURN")]
    NoReturnToken { function: String, debug: DebugData },
    #[error("numeric literal \"{literal}\" at {debug} does not fit in 32 bits")]
    NumericLiteralOverflow { literal: String, debug: DebugData },
    #[error("parameters of function \"{function}\" must be declared with VALUE, got {found}")]
    InvalidParameter {
        function: String,
        found: String,
        debug: DebugData,
    },
    #[error("{feature} are not implemented yet ({debug})")]
    NotImplemented {
        feature: &'static str,
        debug: DebugData,
    },
}

impl ParseError {
    pub fn code(&self) -> &'static str {
        match self {
            ParseError::UnexpectedToken { .. } => "WORDS-PARSE-001",
            ParseError::UnexpectedTokenType { .. } => "WORDS-PARSE-002",
            ParseError::MissingToken { .. } => "WORDS-PARSE-003",
            ParseError::InvalidToken { .. } => "WORDS-PARSE-004",
            ParseError::IncorrectReturnCount { .. } => "WORDS-PARSE-005",
            ParseError::NoReturnToken { .. } => "WORDS-PARSE-006",
            ParseError::NumericLiteralOverflow { .. } => "WORDS-PARSE-007",
            ParseError::InvalidParameter { .. } => "WORDS-PARSE-008",
            ParseError::NotImplemented { .. } => "WORDS-PARSE-009",
        }
    }

    pub fn debug_data(&self) -> DebugData {
        match self {
            ParseError::UnexpectedToken { debug, .. }
            | ParseError::UnexpectedTokenType { debug, .. }
            | ParseError::MissingToken { debug, .. }
            | ParseError::InvalidToken { debug, .. }
            | ParseError::IncorrectReturnCount { debug, .. }
            | ParseError::NoReturnToken { debug, .. }
            | ParseError::NumericLiteralOverflow { debug, .. }
            | ParseError::InvalidParameter { debug, .. }
            | ParseError::NotImplemented { debug, .. } => *debug,
        }
    }
}

/// Turns a lexical token into an AST node, pulling as many further tokens
/// from the stream as the construct needs.
pub trait Parse {
    fn parse(self, tokens: &mut TokenStream<'_>) -> Result<AstNode, ParseError>;
}

/// The shared stream every [`Parse`] implementation consumes from.
pub struct TokenStream<'a> {
    tokens: Box<dyn Iterator<Item = LexicalToken> + 'a>,
    last_debug: DebugData,
}

impl<'a> TokenStream<'a> {
    pub fn new<I>(tokens: I) -> Self
    where
        I: IntoIterator<Item = LexicalToken>,
        I::IntoIter: 'a,
    {
        Self {
            tokens: Box::new(tokens.into_iter()),
            last_debug: DebugData::default(),
        }
    }

    /// Position of the most recently consumed token.
    pub fn last_debug(&self) -> DebugData {
        self.last_debug
    }
}

impl Iterator for TokenStream<'_> {
    type Item = LexicalToken;

    fn next(&mut self) -> Option<LexicalToken> {
        let token = self.tokens.next()?;
        self.last_debug = token.debug();
        Some(token)
    }
}

/// Parses tokens until one satisfies `is_terminator`, returning the parsed
/// nodes together with the (unparsed) terminator.
pub fn eat_until<F>(
    tokens: &mut TokenStream<'_>,
    is_terminator: F,
    expected: &str,
) -> Result<(Vec<AstNode>, LexicalToken), ParseError>
where
    F: Fn(&LexicalToken) -> bool,
{
    let mut nodes = vec![];
    loop {
        let Some(token) = tokens.next() else {
            return Err(ParseError::MissingToken {
                expected: expected.to_string(),
                debug: tokens.last_debug(),
            });
        };
        if is_terminator(&token) {
            return Ok((nodes, token));
        }
        nodes.push(token.parse(tokens)?);
    }
}

/// Like [`eat_until`], dropping the terminator.
pub fn eat_until_discarding<F>(
    tokens: &mut TokenStream<'_>,
    is_terminator: F,
    expected: &str,
) -> Result<Vec<AstNode>, ParseError>
where
    F: Fn(&LexicalToken) -> bool,
{
    eat_until(tokens, is_terminator, expected).map(|(nodes, _)| nodes)
}

#[tracing::instrument(level = "trace", skip_all)]
pub fn parse<'a, I>(tokens: I) -> Result<Program, ParseError>
where
    I: IntoIterator<Item = LexicalToken>,
    I::IntoIter: 'a,
{
    let mut tokens = TokenStream::new(tokens);
    let mut nodes = vec![];
    while let Some(token) = tokens.next() {
        let node = token.parse(&mut tokens)?;
        trace!(node = %node, "Parsed top-level node");
        nodes.push(node);
    }
    Ok(Program::new(nodes))
}

pub fn parse_source(source: &str) -> Result<Program, ParseError> {
    parse(crate::lexer::lex_source(source))
}
