use logos::Logos;
use smol_str::SmolStr;

/// Source span as byte offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Empty span sitting at a single offset.
    pub fn point(at: u32) -> Span {
        Span { start: at, end: at }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub message: String,
    pub span: Span,
}

fn parse_string(lex: &mut logos::Lexer<RawToken>) -> Option<String> {
    let slice = lex.slice();
    let inner = &slice[1..slice.len() - 1];
    let mut result = String::new();
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next()? {
                'n' => result.push('\n'),
                't' => result.push('\t'),
                'r' => result.push('\r'),
                '\\' => result.push('\\'),
                '"' => result.push('"'),
                '0' => result.push('\0'),
                other => {
                    result.push('\\');
                    result.push(other);
                }
            }
        } else {
            result.push(c);
        }
    }
    Some(result)
}

/// Raw tokens straight out of logos, before the layout pass. Newlines are
/// significant here; the layout pass consumes them.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r]+")]
#[logos(skip r"#[^\n]*")]
enum RawToken {
    #[token("\n")]
    Newline,

    #[token("module")]
    Module,
    #[token("struct")]
    Struct,
    #[token("enum")]
    Enum,
    #[token("type")]
    Type,
    #[token("let")]
    Let,
    #[token("if")]
    If,
    #[token("elif")]
    Elif,
    #[token("else")]
    Else,
    #[token("return")]
    Return,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token("..")]
    DotDot,

    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),

    #[regex(r#""([^"\\\n]|\\[^\n])*""#, parse_string)]
    Str(String),

    #[regex(r"[A-Z][A-Za-z0-9_]*", |lex| SmolStr::new(lex.slice()))]
    Upper(SmolStr),

    #[regex(r"[a-z_][A-Za-z0-9_]*", |lex| SmolStr::new(lex.slice()))]
    Lower(SmolStr),

    /// Operator run. A bare `=` or `|` is reserved syntax and is split out
    /// into `Token::Assign` / `Token::Bar` after lexing.
    #[regex(r"[+\-*/<>=!&|^~]+", |lex| SmolStr::new(lex.slice()))]
    Op(SmolStr),
}

/// Tokens after layout: raw tokens minus newlines, plus the virtual
/// delimiters synthesized from indentation.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Module,
    Struct,
    Enum,
    Type,
    Let,
    If,
    Elif,
    Else,
    Return,

    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Colon,
    DotDot,
    /// Bare `=`.
    Assign,
    /// Bare `|`.
    Bar,

    Int(i64),
    Str(String),
    Upper(SmolStr),
    Lower(SmolStr),
    Op(SmolStr),

    /// Virtual: a more-indented line opened a new block.
    BlockStart,
    /// Virtual: indentation returned to an enclosing level.
    BlockEnd,
    /// Virtual: end of a logical line (a line plus its continuations).
    LineFoldEnd,
}

fn convert(raw: RawToken) -> Token {
    match raw {
        RawToken::Newline => unreachable!("newlines are consumed by layout"),
        RawToken::Module => Token::Module,
        RawToken::Struct => Token::Struct,
        RawToken::Enum => Token::Enum,
        RawToken::Type => Token::Type,
        RawToken::Let => Token::Let,
        RawToken::If => Token::If,
        RawToken::Elif => Token::Elif,
        RawToken::Else => Token::Else,
        RawToken::Return => Token::Return,
        RawToken::LParen => Token::LParen,
        RawToken::RParen => Token::RParen,
        RawToken::LBrace => Token::LBrace,
        RawToken::RBrace => Token::RBrace,
        RawToken::Comma => Token::Comma,
        RawToken::Colon => Token::Colon,
        RawToken::DotDot => Token::DotDot,
        RawToken::Int(v) => Token::Int(v),
        RawToken::Str(s) => Token::Str(s),
        RawToken::Upper(s) => Token::Upper(s),
        RawToken::Lower(s) => Token::Lower(s),
        RawToken::Op(s) => {
            if s == "=" {
                Token::Assign
            } else if s == "|" {
                Token::Bar
            } else {
                Token::Op(s)
            }
        }
    }
}

/// A physical line of raw tokens.
struct Line {
    indent: u32,
    tokens: Vec<(RawToken, Span)>,
}

fn split_lines(raw: Vec<(RawToken, Span)>) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut line_start: u32 = 0;
    let mut current: Option<Line> = None;
    for (tok, span) in raw {
        if tok == RawToken::Newline {
            line_start = span.end;
            if let Some(line) = current.take() {
                lines.push(line);
            }
            continue;
        }
        match &mut current {
            Some(line) => line.tokens.push((tok, span)),
            None => {
                current = Some(Line {
                    indent: span.start - line_start,
                    tokens: vec![(tok, span)],
                });
            }
        }
    }
    if let Some(line) = current {
        lines.push(line);
    }
    lines
}

/// Does the logical line collected so far introduce a block on the next,
/// more-indented line? `let ... =` does, as do `if`/`elif`/`else` headers
/// and `module` declarations. Everything else folds.
fn opens_block(first: &RawToken, last: &RawToken) -> bool {
    match first {
        RawToken::If | RawToken::Elif | RawToken::Else | RawToken::Module => true,
        RawToken::Let => matches!(last, RawToken::Op(op) if op == "="),
        _ => false,
    }
}

/// Run the layout pass: fold continuation lines into logical lines, and
/// synthesize `BlockStart`/`BlockEnd`/`LineFoldEnd` from indentation.
fn layout(lines: Vec<Line>, errors: &mut Vec<LexError>) -> Vec<(Token, Span)> {
    let mut out: Vec<(Token, Span)> = Vec::new();
    let mut stack: Vec<u32> = vec![0];
    // First and last raw token of the fold currently being collected.
    let mut fold: Option<(RawToken, RawToken)> = None;
    let mut last_offset: u32 = 0;

    for line in lines {
        let first_span = line.tokens[0].1;
        let n = line.indent;
        let top = *stack.last().unwrap();

        if let Some((fold_first, fold_last)) = fold.clone() {
            if n > top {
                if opens_block(&fold_first, &fold_last) {
                    out.push((Token::LineFoldEnd, Span::point(last_offset)));
                    out.push((Token::BlockStart, Span::point(first_span.start)));
                    stack.push(n);
                    fold = None;
                } else {
                    // Continuation line: extend the current fold.
                    let new_last = line.tokens.last().unwrap().0.clone();
                    if let Some(f) = &mut fold {
                        f.1 = new_last;
                    }
                    for (tok, span) in line.tokens {
                        last_offset = span.end;
                        out.push((convert(tok), span));
                    }
                    continue;
                }
            } else {
                out.push((Token::LineFoldEnd, Span::point(last_offset)));
                fold = None;
            }
        }

        while n < *stack.last().unwrap() {
            stack.pop();
            out.push((Token::BlockEnd, Span::point(first_span.start)));
        }
        if n != *stack.last().unwrap() {
            errors.push(LexError {
                message: "inconsistent indentation".into(),
                span: first_span,
            });
        }

        fold = Some((
            line.tokens[0].0.clone(),
            line.tokens.last().unwrap().0.clone(),
        ));
        for (tok, span) in line.tokens {
            last_offset = span.end;
            out.push((convert(tok), span));
        }
    }

    if fold.is_some() {
        out.push((Token::LineFoldEnd, Span::point(last_offset)));
    }
    while stack.len() > 1 {
        stack.pop();
        out.push((Token::BlockEnd, Span::point(last_offset)));
    }

    out
}

/// Lex source code into a laid-out token stream.
pub fn lex(source: &str) -> (Vec<(Token, Span)>, Vec<LexError>) {
    let mut raw = Vec::new();
    let mut errors = Vec::new();
    let mut lexer = RawToken::lexer(source);

    while let Some(result) = lexer.next() {
        let range = lexer.span();
        let span = Span::new(range.start as u32, range.end as u32);
        match result {
            Ok(token) => raw.push((token, span)),
            Err(_) => errors.push(LexError {
                message: "unexpected character".into(),
                span,
            }),
        }
    }

    let tokens = layout(split_lines(raw), &mut errors);
    (tokens, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_tokens(source: &str) -> Vec<Token> {
        let (tokens, errors) = lex(source);
        assert!(errors.is_empty(), "unexpected lex errors: {:?}", errors);
        tokens.into_iter().map(|(t, _)| t).collect()
    }

    fn upper(s: &str) -> Token {
        Token::Upper(s.into())
    }

    fn lower(s: &str) -> Token {
        Token::Lower(s.into())
    }

    fn op(s: &str) -> Token {
        Token::Op(s.into())
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(
            lex_tokens("let letter x"),
            vec![Token::Let, lower("letter"), lower("x"), Token::LineFoldEnd]
        );
    }

    #[test]
    fn integers_and_strings() {
        assert_eq!(
            lex_tokens(r#"42 "hi\n""#),
            vec![
                Token::Int(42),
                Token::Str("hi\n".into()),
                Token::LineFoldEnd
            ]
        );
    }

    #[test]
    fn operators_split_reserved() {
        assert_eq!(
            lex_tokens("= == | || <+> ->"),
            vec![
                Token::Assign,
                op("=="),
                Token::Bar,
                op("||"),
                op("<+>"),
                op("->"),
                Token::LineFoldEnd
            ]
        );
    }

    #[test]
    fn comments_skipped() {
        assert_eq!(
            lex_tokens("# a comment\n1"),
            vec![Token::Int(1), Token::LineFoldEnd]
        );
    }

    #[test]
    fn simple_line_gets_fold_end() {
        assert_eq!(
            lex_tokens("let a = 1"),
            vec![
                Token::Let,
                lower("a"),
                Token::Assign,
                Token::Int(1),
                Token::LineFoldEnd
            ]
        );
    }

    #[test]
    fn let_block_layout() {
        let toks = lex_tokens("let f x =\n  return x\n");
        assert_eq!(
            toks,
            vec![
                Token::Let,
                lower("f"),
                lower("x"),
                Token::Assign,
                Token::LineFoldEnd,
                Token::BlockStart,
                Token::Return,
                lower("x"),
                Token::LineFoldEnd,
                Token::BlockEnd,
            ]
        );
    }

    #[test]
    fn if_elif_else_layout() {
        let toks = lex_tokens("let f n =\n  if n\n    return 1\n  else\n    return 2\n");
        let folds = toks
            .iter()
            .filter(|t| **t == Token::LineFoldEnd)
            .count();
        let starts = toks
            .iter()
            .filter(|t| **t == Token::BlockStart)
            .count();
        let ends = toks.iter().filter(|t| **t == Token::BlockEnd).count();
        // Four logical lines inside, plus the header.
        assert_eq!(folds, 5);
        assert_eq!(starts, 3);
        assert_eq!(ends, 3);
    }

    #[test]
    fn continuation_lines_fold() {
        // `let a = 1 +` does not end with a bare `=`, so the deeper line
        // is a continuation, not a block.
        let toks = lex_tokens("let a = 1 +\n    2\n");
        assert_eq!(
            toks,
            vec![
                Token::Let,
                lower("a"),
                Token::Assign,
                Token::Int(1),
                op("+"),
                Token::Int(2),
                Token::LineFoldEnd,
            ]
        );
    }

    #[test]
    fn module_layout() {
        let toks = lex_tokens("module Geo\n  struct Point = { x, y }\n");
        assert_eq!(toks[0], Token::Module);
        assert_eq!(toks[1], upper("Geo"));
        assert_eq!(toks[2], Token::LineFoldEnd);
        assert_eq!(toks[3], Token::BlockStart);
        assert_eq!(*toks.last().unwrap(), Token::BlockEnd);
    }

    #[test]
    fn dedent_closes_all_blocks() {
        let toks = lex_tokens("let f =\n  if x\n    return 1\nlet g = 2\n");
        // Both the if-block and the let-block close before `let g`.
        let let_g = toks
            .iter()
            .position(|t| *t == lower("g"))
            .expect("g present");
        let ends_before: Vec<_> = toks[..let_g]
            .iter()
            .filter(|t| **t == Token::BlockEnd)
            .collect();
        assert_eq!(ends_before.len(), 2);
    }

    #[test]
    fn inconsistent_dedent_reported() {
        let (_, errors) = lex("let f =\n    return 1\n  return 2\n");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("indentation"));
    }

    #[test]
    fn blank_lines_ignored() {
        let toks = lex_tokens("let a = 1\n\n\nlet b = 2\n");
        let folds = toks
            .iter()
            .filter(|t| **t == Token::LineFoldEnd)
            .count();
        assert_eq!(folds, 2);
    }

    #[test]
    fn spans_are_byte_offsets() {
        let (tokens, _) = lex("let a");
        assert_eq!(tokens[0], (Token::Let, Span::new(0, 3)));
        assert_eq!(tokens[1], (Token::Lower("a".into()), Span::new(4, 5)));
    }
}
