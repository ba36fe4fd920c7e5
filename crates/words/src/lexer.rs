//! A lazy lexer for Words source.
//!
//! Source is split into whitespace-delimited words, line by line, and every
//! word is classified into a [`LexicalToken`]. Nothing is read ahead of what
//! the parser asks for, except the words of the current line.

use serde::{Deserialize, Serialize};

use crate::token::{DebugData, LexicalToken};

/// A single whitespace-delimited piece of source text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Word {
    pub content: String,
    pub debug: DebugData,
}

pub fn lex<I>(lines: I) -> impl Iterator<Item = LexicalToken>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    lines
        .into_iter()
        .enumerate()
        .flat_map(|(line_nr, line)| lex_line(split_line_into_words(line_nr, line.as_ref())))
}

pub fn lex_source(source: &str) -> impl Iterator<Item = LexicalToken> + '_ {
    lex(source.lines())
}

/// Classifies the words of one line. A comment swallows the rest of its line.
pub fn lex_line(words: Vec<Word>) -> impl Iterator<Item = LexicalToken> {
    words
        .into_iter()
        .map(LexicalToken::classify)
        .take_while(|token| !token.is_comment())
}

fn split_line_into_words(line_nr: usize, line: &str) -> Vec<Word> {
    line.split_whitespace()
        .map(|content| Word {
            content: content.to_string(),
            // `split_whitespace` yields subslices of `line`.
            debug: DebugData::new(line_nr, content.as_ptr() as usize - line.as_ptr() as usize),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{Keyword, LiteralKind, LiteralToken};

    #[test]
    fn lexes_a_single_number() {
        let tokens = lex_source("2").collect::<Vec<_>>();
        assert_eq!(tokens.len(), 1);
        let LexicalToken::Literal(literal) = &tokens[0] else {
            panic!("expected a literal, got {:?}", tokens[0]);
        };
        assert_eq!(literal.kind, LiteralKind::Number);
        assert_eq!(literal.content, "2");
    }

    #[test]
    fn trailing_newline_does_not_matter() {
        assert_eq!(lex_source("2\n").count(), 1);
        assert_eq!(lex_source("2").count(), 1);
        assert_eq!(lex_source("").count(), 0);
    }

    #[test]
    fn records_line_and_column() {
        let tokens = lex(["VARIABLE X", "", "  0 ASSIGN X"]).collect::<Vec<_>>();
        let positions = tokens
            .iter()
            .map(|token| (token.debug().line, token.debug().column))
            .collect::<Vec<_>>();
        assert_eq!(positions, vec![(0, 0), (0, 9), (2, 2), (2, 4), (2, 11)]);
        assert!(tokens[0].is_keyword(Keyword::Variable));
    }

    #[test]
    fn comments_are_never_yielded() {
        assert_eq!(lex_source("# TEST_VAR").count(), 0);
        assert_eq!(lex_source("#").count(), 0);

        let tokens = lex_source("1 2 # add them\n+").collect::<Vec<_>>();
        let contents = tokens.iter().map(LexicalToken::content).collect::<Vec<_>>();
        assert_eq!(contents, vec!["1", "2", "+"]);
        assert!(!tokens.iter().any(LexicalToken::is_comment));
    }

    #[test]
    fn lexing_is_lazy() {
        // Only the first line is split when the first token is requested.
        let mut lines_read = 0;
        let lines = ["1", "2", "3"].into_iter().inspect(|_| lines_read += 1);
        let first = lex(lines).next();
        assert!(first.is_some());
        assert_eq!(lines_read, 1);
    }

    #[test]
    fn token_json_shape() {
        let token = lex_source("2").next().unwrap();
        insta::assert_json_snapshot!(token, @r###"
        {
          "Literal": {
            "kind": "Number",
            "content": "2",
            "debug": {
              "line": 0,
              "column": 0
            }
          }
        }
        "###);
        assert!(matches!(
            token,
            LexicalToken::Literal(LiteralToken {
                kind: LiteralKind::Number,
                ..
            })
        ));
    }
}
