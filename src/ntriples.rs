//! Line-oriented `subject predicate object .` statements, validated block by
//! block into an in-memory graph.
//!
//! Subjects and predicates are `<IRI>`s. Objects are `<IRI>`s or
//! double-quoted literals with backslash escapes, optionally followed by
//! `@lang` or `^^<datatype>`. Several statements may share a line.

use std::collections::HashSet;

use crate::error::GrammarError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Object {
    Iri(String),
    Literal {
        value: String,
        lang: Option<String>,
        datatype: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: Object,
}

/// Set of distinct triples accepted so far.
#[derive(Debug, Default)]
pub struct Graph {
    triples: HashSet<Triple>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn contains(&self, triple: &Triple) -> bool {
        self.triples.contains(triple)
    }

    /// Parse one statement block and add its triples to the graph.
    ///
    /// The block is accepted or rejected as a whole: on error the graph is
    /// left untouched. Returns how many triples were new to the graph.
    pub fn parse_block(&mut self, text: &str) -> Result<usize, GrammarError> {
        let prepared = prepare_block(text);
        let triples = parse_statements(&prepared)?;
        let before = self.triples.len();
        self.triples.extend(triples);
        Ok(self.triples.len() - before)
    }
}

/// Normalize a stored block before parsing: line breaks become spaces,
/// `\"` and `\'` are unescaped, and the trailing terminator is replaced by
/// exactly one ` .`.
pub fn prepare_block(text: &str) -> String {
    let flat = text
        .replace(['\r', '\n'], " ")
        .replace("\\\"", "\"")
        .replace("\\'", "'");
    let body = flat.trim_end_matches(|c: char| c == '.' || c.is_whitespace());
    format!("{} .", body)
}

/// Parse every statement in an already prepared block.
pub fn parse_statements(src: &str) -> Result<Vec<Triple>, GrammarError> {
    let mut parser = Parser { src, pos: 0 };
    let mut triples = Vec::new();

    loop {
        parser.skip_ws();
        if parser.at_end() {
            break;
        }
        if triples.is_empty() && parser.peek() == Some('.') {
            return Err(GrammarError::Empty);
        }

        let subject = parser.iri("subject IRI")?;
        parser.skip_ws();
        let predicate = parser.iri("predicate IRI")?;
        parser.skip_ws();
        let object = parser.object()?;
        parser.skip_ws();
        parser.expect('.', "'.'")?;

        triples.push(Triple { subject, predicate, object });
    }

    if triples.is_empty() {
        return Err(GrammarError::Empty);
    }
    Ok(triples)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn expect(&mut self, want: char, expected: &'static str) -> Result<(), GrammarError> {
        if self.peek() == Some(want) {
            self.bump();
            Ok(())
        } else {
            Err(GrammarError::Expected { expected, offset: self.pos })
        }
    }

    fn iri(&mut self, expected: &'static str) -> Result<String, GrammarError> {
        let start = self.pos;
        self.expect('<', expected)?;
        let mut iri = String::new();

        loop {
            let offset = self.pos;
            match self.bump() {
                None => return Err(GrammarError::UnterminatedIri(start)),
                Some('>') => break,
                Some('\\') => match self.bump() {
                    Some('u') => iri.push(self.hex_char(4, offset)?),
                    Some('U') => iri.push(self.hex_char(8, offset)?),
                    _ => return Err(GrammarError::InvalidEscape(offset)),
                },
                Some(ch) if forbidden_in_iri(ch) => {
                    return Err(GrammarError::InvalidIriChar { ch, offset })
                }
                Some(ch) => iri.push(ch),
            }
        }

        if iri.is_empty() {
            return Err(GrammarError::Expected { expected, offset: start });
        }
        Ok(iri)
    }

    fn object(&mut self) -> Result<Object, GrammarError> {
        match self.peek() {
            Some('<') => self.iri("object").map(Object::Iri),
            Some('"') => self.literal(),
            _ => Err(GrammarError::Expected { expected: "object IRI or literal", offset: self.pos }),
        }
    }

    fn literal(&mut self) -> Result<Object, GrammarError> {
        let start = self.pos;
        self.bump();
        let mut value = String::new();

        loop {
            let offset = self.pos;
            match self.bump() {
                None => return Err(GrammarError::UnterminatedLiteral(start)),
                Some('"') => break,
                Some('\\') => {
                    let decoded = match self.bump() {
                        Some('t') => '\t',
                        Some('b') => '\u{8}',
                        Some('n') => '\n',
                        Some('r') => '\r',
                        Some('f') => '\u{c}',
                        Some('"') => '"',
                        Some('\'') => '\'',
                        Some('\\') => '\\',
                        Some('u') => self.hex_char(4, offset)?,
                        Some('U') => self.hex_char(8, offset)?,
                        None => return Err(GrammarError::UnterminatedLiteral(start)),
                        Some(_) => return Err(GrammarError::InvalidEscape(offset)),
                    };
                    value.push(decoded);
                }
                Some(ch) => value.push(ch),
            }
        }

        let mut lang = None;
        let mut datatype = None;
        if self.peek() == Some('@') {
            lang = Some(self.lang_tag()?);
        } else if self.src[self.pos..].starts_with("^^") {
            self.pos += 2;
            datatype = Some(self.iri("datatype IRI")?);
        }
        Ok(Object::Literal { value, lang, datatype })
    }

    /// `@` [a-zA-Z]+ ( `-` [a-zA-Z0-9]+ )*
    fn lang_tag(&mut self) -> Result<String, GrammarError> {
        let start = self.pos;
        self.bump();
        let rest = &self.src[self.pos..];
        let len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
            .unwrap_or(rest.len());
        let tag = &rest[..len];

        let mut parts = tag.split('-');
        let primary_ok = parts
            .next()
            .is_some_and(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_alphabetic()));
        if !primary_ok || parts.any(str::is_empty) {
            return Err(GrammarError::InvalidLangTag(start));
        }

        self.pos += len;
        Ok(tag.to_string())
    }

    fn hex_char(&mut self, digits: usize, offset: usize) -> Result<char, GrammarError> {
        let hex = self
            .src
            .get(self.pos..self.pos + digits)
            .filter(|h| h.chars().all(|c| c.is_ascii_hexdigit()))
            .ok_or(GrammarError::InvalidEscape(offset))?;
        let ch = u32::from_str_radix(hex, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or(GrammarError::InvalidEscape(offset))?;
        self.pos += digits;
        Ok(ch)
    }
}

fn forbidden_in_iri(ch: char) -> bool {
    ch <= ' ' || matches!(ch, '<' | '"' | '{' | '}' | '|' | '^' | '`')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_statement() {
        let mut g = Graph::new();
        assert_eq!(g.parse_block("<http://ex/a> <http://ex/b> <http://ex/c> ."), Ok(1));
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn unterminated_literal_leaves_graph_unchanged() {
        let mut g = Graph::new();
        g.parse_block("<http://ex/x> <http://ex/y> \"kept\" .").unwrap();

        let err = g
            .parse_block("<http://ex/a> <http://ex/b> \"unterminated .")
            .unwrap_err();
        assert_eq!(err, GrammarError::UnterminatedLiteral(28));
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn block_is_rejected_as_a_whole() {
        let mut g = Graph::new();
        let block = "<http://ex/a> <http://ex/b> <http://ex/c> .\n<http://ex/a> broken <http://ex/c> .";
        assert!(g.parse_block(block).is_err());
        assert!(g.is_empty());
    }

    #[test]
    fn multi_line_and_same_line_statements() {
        let mut g = Graph::new();
        let block = concat!(
            "<http://ex/a> <http://ex/p> <http://ex/b> . <http://ex/a> <http://ex/q> \"two\"@en-GB .\n",
            "<http://ex/a> <http://ex/r> \"3\"^^<http://www.w3.org/2001/XMLSchema#int> .\n",
            "<http://ex/a> <http://ex/s> \"tab\\there \\u00e9\" .\n",
        );
        assert_eq!(g.parse_block(block), Ok(4));
        assert!(g.contains(&Triple {
            subject: "http://ex/a".into(),
            predicate: "http://ex/s".into(),
            object: Object::Literal {
                value: "tab\there \u{e9}".into(),
                lang: None,
                datatype: None,
            },
        }));
    }

    #[test]
    fn missing_final_terminator_is_supplied() {
        let mut g = Graph::new();
        assert_eq!(g.parse_block("<http://ex/a> <http://ex/b> <http://ex/c>"), Ok(1));
        assert_eq!(g.parse_block("<http://ex/a> <http://ex/b> <http://ex/d> ..  \n"), Ok(1));
    }

    #[test]
    fn duplicates_are_counted_once() {
        let mut g = Graph::new();
        let line = "<http://ex/a> <http://ex/b> <http://ex/c> .";
        assert_eq!(g.parse_block(&format!("{line}\n{line}")), Ok(1));
        assert_eq!(g.parse_block(line), Ok(0));
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn escaped_quotes_are_unescaped_before_parsing() {
        let mut g = Graph::new();
        assert_eq!(g.parse_block(r#"<http://ex/a> <http://ex/b> \"it\'s\" ."#), Ok(1));
        // An escaped quote inside a literal closes it once unescaped.
        assert!(g.parse_block(r#"<http://ex/a> <http://ex/b> "say \"hi\"" ."#).is_err());
    }

    #[test]
    fn empty_block_is_malformed() {
        let mut g = Graph::new();
        assert_eq!(g.parse_block(""), Err(GrammarError::Empty));
        assert_eq!(g.parse_block(" .\n"), Err(GrammarError::Empty));
    }

    #[test]
    fn subject_must_be_an_iri() {
        let mut g = Graph::new();
        assert_eq!(
            g.parse_block("\"lit\" <http://ex/b> <http://ex/c> ."),
            Err(GrammarError::Expected { expected: "subject IRI", offset: 0 })
        );
    }

    #[test]
    fn bad_iri_and_lang_tag() {
        let mut g = Graph::new();
        assert!(matches!(
            g.parse_block("<http://ex/a b> <http://ex/p> <http://ex/c> ."),
            Err(GrammarError::InvalidIriChar { ch: ' ', .. })
        ));
        assert!(matches!(
            g.parse_block("<http://ex/a> <http://ex/p> \"x\"@1 ."),
            Err(GrammarError::InvalidLangTag(_))
        ));
        assert!(matches!(
            g.parse_block("<http://ex/a> <http://ex/p> <http://ex/c"),
            Err(GrammarError::InvalidIriChar { ch: ' ', .. })
        ));
    }
}
