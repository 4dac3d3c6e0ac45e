#![allow(clippy::module_name_repetitions)]

//! Lexer and parser for the gate REPL.
//!
//! `regal` splits a line into a bounded token stream. The parser then walks
//! the command's parameter list from the [`catalog`](super::catalog), handing
//! address and duration lexemes to `winnow`.

use core::fmt;
use core::ops::Range;
use core::time::Duration;

use heapless::Vec as HeaplessVec;
use regal::IncrementalError;
use regal::TokenCache;
use regal_macros::RegalLexer;
use winnow::ascii::dec_uint;
use winnow::combinator::alt;
use winnow::prelude::*;

use super::catalog::{self, CommandTag, Param};
use crate::address::{Address, AddressError, Symbol};
use crate::dialing::DialType;
use crate::effects::ObjectId;

/// Maximum number of tokens produced per REPL line.
pub const MAX_TOKENS: usize = 32;
const MAX_CACHE_RECORDS: usize = MAX_TOKENS * 2;

/// Lexical token kinds recognized by the REPL grammar.
#[derive(RegalLexer, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TokenKind {
    /// Glyph indices joined by `-` or `,`.
    #[regex(r"[0-9]+(?:[-,][0-9]+)+", priority = 3)]
    Address,
    /// Duration literal ending in `ms` or `s`.
    #[regex(r"[0-9]+(?:ms|s)", priority = 2)]
    Duration,
    /// Unsuffixed integer literal.
    #[regex(r"[0-9]+")]
    Integer,
    /// Keyword or gate name (case-insensitive match performed later).
    #[regex(r"[A-Za-z][A-Za-z0-9_-]*")]
    Ident,
    /// Inline whitespace is ignored.
    #[regex(r"[ \t]+", skip)]
    Whitespace,
    /// End-of-line token (`\r`, `\n`, or `\r\n`).
    #[token("\r\n")]
    #[token("\n")]
    #[token("\r")]
    Eol,
    /// Pseudo variant used when the lexer encounters unsupported input.
    #[default]
    #[regex(r".", priority = 1024)]
    Error,
}

/// Token emitted by the lexer with a byte span back into the source line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub lexeme: &'a str,
    pub span: Range<usize>,
}

pub type TokenBuffer<'a> = HeaplessVec<Token<'a>, MAX_TOKENS>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LexError {
    /// Input produced more tokens than the static buffer allows.
    TooManyTokens { processed: usize },
    /// Underlying lexer reported an unrecoverable error.
    Engine,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::TooManyTokens { processed } => {
                write!(f, "token buffer exhausted after {processed} items")
            }
            LexError::Engine => write!(f, "lexer engine error"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrammarErrorKind<'a> {
    UnexpectedToken {
        expected: &'static str,
        found: TokenKind,
        lexeme: &'a str,
        span: Range<usize>,
    },
    UnexpectedEnd {
        expected: &'static str,
    },
    UnknownCommand {
        lexeme: &'a str,
    },
    InvalidInteger {
        span: Range<usize>,
    },
    InvalidDuration {
        span: Range<usize>,
    },
    InvalidAddress {
        span: Range<usize>,
        error: AddressError,
    },
    InvalidToken {
        span: Range<usize>,
        lexeme: &'a str,
    },
}

impl fmt::Display for GrammarErrorKind<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrammarErrorKind::UnexpectedToken {
                expected,
                lexeme,
                span,
                ..
            } => write!(f, "expected {expected}, found `{lexeme}` at {span:?}"),
            GrammarErrorKind::UnexpectedEnd { expected } => {
                write!(f, "unexpected end of input, expected {expected}")
            }
            GrammarErrorKind::UnknownCommand { lexeme } => {
                write!(f, "unknown command `{lexeme}`, try `help`")
            }
            GrammarErrorKind::InvalidInteger { span } => {
                write!(f, "invalid integer literal at {span:?}")
            }
            GrammarErrorKind::InvalidDuration { span } => {
                write!(f, "invalid duration literal at {span:?}")
            }
            GrammarErrorKind::InvalidAddress { span, error } => {
                write!(f, "invalid address at {span:?}: {error}")
            }
            GrammarErrorKind::InvalidToken { span, lexeme } => {
                write!(f, "unsupported token `{lexeme}` at {span:?}")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrammarError<'a> {
    pub kind: GrammarErrorKind<'a>,
}

impl fmt::Display for GrammarError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

impl<'a> GrammarError<'a> {
    fn unexpected(expected: &'static str, token: Option<&Token<'a>>) -> Self {
        GrammarError {
            kind: match token {
                Some(tok) if tok.kind != TokenKind::Eol => GrammarErrorKind::UnexpectedToken {
                    expected,
                    found: tok.kind,
                    lexeme: tok.lexeme,
                    span: tok.span.clone(),
                },
                _ => GrammarErrorKind::UnexpectedEnd { expected },
            },
        }
    }

    fn with_span(token: &Token<'a>, kind: impl FnOnce(Range<usize>) -> GrammarErrorKind<'a>) -> Self {
        GrammarError {
            kind: kind(token.span.clone()),
        }
    }
}

/// Combined lex/parse error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseError<'a> {
    Lex(LexError),
    Grammar(GrammarError<'a>),
}

impl fmt::Display for ParseError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Lex(err) => err.fmt(f),
            ParseError::Grammar(err) => err.fmt(f),
        }
    }
}

/// Structured commands produced by the parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Dial {
        gate: &'a str,
        mode: DialType,
        address: Address,
    },
    Encode {
        gate: &'a str,
        symbol: Symbol,
    },
    Lock {
        gate: &'a str,
        symbol: Symbol,
    },
    Stop {
        gate: &'a str,
    },
    Reset {
        gate: &'a str,
    },
    Close {
        gate: &'a str,
    },
    Send {
        gate: &'a str,
        object: ObjectId,
    },
    Advance(Duration),
    Status {
        gate: Option<&'a str>,
    },
    Help {
        topic: Option<&'a str>,
    },
}

type Input<'src, 'slice> = &'slice [Token<'src>];

/// Tokenize the provided line.
pub fn lex(line: &str) -> Result<TokenBuffer<'_>, LexError> {
    let compiled = TokenKind::lexer();
    let mut cache: TokenCache<TokenKind, MAX_CACHE_RECORDS> = TokenCache::new();
    let partial = cache
        .rebuild(compiled, line)
        .map_err(map_incremental_error)?;
    let mut buffer = TokenBuffer::new();

    for record in cache.tokens() {
        if record.skipped {
            continue;
        }

        let span = record.start..record.end;
        let lexeme = &line[span.clone()];
        push_token(
            &mut buffer,
            Token {
                kind: record.token,
                lexeme,
                span,
            },
        )?;
    }

    if let Some(partial) = partial.filter(|partial| !partial.fragment.is_empty()) {
        let start = partial.start;
        let span = start..start + partial.fragment.len();
        push_token(
            &mut buffer,
            Token {
                kind: TokenKind::Error,
                lexeme: partial.fragment,
                span,
            },
        )?;
    }

    Ok(buffer)
}

fn push_token<'a>(buffer: &mut TokenBuffer<'a>, token: Token<'a>) -> Result<(), LexError> {
    buffer.push(token).map_err(|_| LexError::TooManyTokens {
        processed: MAX_TOKENS + 1,
    })
}

fn map_incremental_error(error: IncrementalError) -> LexError {
    match error {
        IncrementalError::TokenOverflow => LexError::TooManyTokens {
            processed: MAX_TOKENS,
        },
        _ => LexError::Engine,
    }
}

/// Parse a REPL command from the provided line.
pub fn parse(line: &str) -> Result<Command<'_>, ParseError<'_>> {
    let tokens = lex(line).map_err(ParseError::Lex)?;

    if let Some(token) = tokens.iter().find(|token| token.kind == TokenKind::Error) {
        return Err(ParseError::Grammar(GrammarError::with_span(token, |span| {
            GrammarErrorKind::InvalidToken {
                span,
                lexeme: token.lexeme,
            }
        })));
    }

    let mut input = tokens.as_slice();
    let command = command(&mut input).map_err(ParseError::Grammar)?;

    if let Some(token) = input.iter().find(|token| token.kind != TokenKind::Eol) {
        return Err(ParseError::Grammar(GrammarError::unexpected(
            "end of command",
            Some(token),
        )));
    }

    Ok(command)
}

fn command<'src>(input: &mut Input<'src, '_>) -> Result<Command<'src>, GrammarError<'src>> {
    let keyword = expect_kind(input, TokenKind::Ident, "command keyword")?;
    let spec = catalog::find(keyword.lexeme).ok_or(GrammarError {
        kind: GrammarErrorKind::UnknownCommand {
            lexeme: keyword.lexeme,
        },
    })?;

    let mut arguments = Arguments::default();
    for param in spec.params {
        parse_param(*param, input, &mut arguments)?;
    }
    arguments.finish(spec.tag)
}

fn parse_param<'src>(
    param: Param,
    input: &mut Input<'src, '_>,
    arguments: &mut Arguments<'src>,
) -> Result<(), GrammarError<'src>> {
    match param {
        Param::Gate => {
            arguments.gate = Some(expect_kind(input, TokenKind::Ident, param.label())?.lexeme);
        }
        Param::OptionalGate | Param::Topic => {
            if let Some(token) = take_optional(input, TokenKind::Ident) {
                if param == Param::Topic {
                    arguments.topic = Some(token.lexeme);
                } else {
                    arguments.gate = Some(token.lexeme);
                }
            }
        }
        Param::Mode => {
            if let Some((token, rest)) = input.split_first()
                && token.kind == TokenKind::Ident
            {
                let mode = catalog::find_mode(token.lexeme)
                    .ok_or_else(|| GrammarError::unexpected("fast, slow or instant", Some(token)))?;
                *input = rest;
                arguments.mode = Some(mode);
            }
        }
        Param::Address => {
            let token = expect_kind(input, TokenKind::Address, param.label())?;
            let address = Address::parse(token.lexeme).map_err(|error| {
                GrammarError::with_span(&token, |span| GrammarErrorKind::InvalidAddress { span, error })
            })?;
            arguments.address = Some(address);
        }
        Param::Symbol => {
            let token = expect_kind(input, TokenKind::Integer, param.label())?;
            let index = token.lexeme.parse::<u8>().map_err(|_| {
                GrammarError::with_span(&token, |span| GrammarErrorKind::InvalidInteger { span })
            })?;
            arguments.symbol = Some(Symbol(index));
        }
        Param::Object => {
            let token = expect_kind(input, TokenKind::Integer, param.label())?;
            let id = token.lexeme.parse::<u32>().map_err(|_| {
                GrammarError::with_span(&token, |span| GrammarErrorKind::InvalidInteger { span })
            })?;
            arguments.object = Some(ObjectId(id));
        }
        Param::Duration => {
            let token = expect_kind(input, TokenKind::Duration, param.label())?;
            let duration = parse_duration(token.lexeme).ok_or_else(|| {
                GrammarError::with_span(&token, |span| GrammarErrorKind::InvalidDuration { span })
            })?;
            arguments.duration = Some(duration);
        }
    }
    Ok(())
}

#[derive(Default)]
struct Arguments<'a> {
    gate: Option<&'a str>,
    mode: Option<DialType>,
    address: Option<Address>,
    symbol: Option<Symbol>,
    object: Option<ObjectId>,
    duration: Option<Duration>,
    topic: Option<&'a str>,
}

impl<'a> Arguments<'a> {
    fn finish(self, tag: CommandTag) -> Result<Command<'a>, GrammarError<'a>> {
        let command = match tag {
            CommandTag::Dial => Command::Dial {
                gate: required(self.gate, Param::Gate)?,
                mode: self.mode.unwrap_or(DialType::Fast),
                address: required(self.address, Param::Address)?,
            },
            CommandTag::Encode => Command::Encode {
                gate: required(self.gate, Param::Gate)?,
                symbol: required(self.symbol, Param::Symbol)?,
            },
            CommandTag::Lock => Command::Lock {
                gate: required(self.gate, Param::Gate)?,
                symbol: required(self.symbol, Param::Symbol)?,
            },
            CommandTag::Stop => Command::Stop {
                gate: required(self.gate, Param::Gate)?,
            },
            CommandTag::Reset => Command::Reset {
                gate: required(self.gate, Param::Gate)?,
            },
            CommandTag::Close => Command::Close {
                gate: required(self.gate, Param::Gate)?,
            },
            CommandTag::Send => Command::Send {
                gate: required(self.gate, Param::Gate)?,
                object: required(self.object, Param::Object)?,
            },
            CommandTag::Advance => Command::Advance(required(self.duration, Param::Duration)?),
            CommandTag::Status => Command::Status { gate: self.gate },
            CommandTag::Help => Command::Help { topic: self.topic },
        };
        Ok(command)
    }
}

fn required<'a, T>(value: Option<T>, param: Param) -> Result<T, GrammarError<'a>> {
    value.ok_or(GrammarError {
        kind: GrammarErrorKind::UnexpectedEnd {
            expected: param.label(),
        },
    })
}

fn expect_kind<'src>(
    input: &mut Input<'src, '_>,
    kind: TokenKind,
    label: &'static str,
) -> Result<Token<'src>, GrammarError<'src>> {
    match input.split_first() {
        Some((token, rest)) if token.kind == kind => {
            *input = rest;
            Ok(token.clone())
        }
        other => Err(GrammarError::unexpected(label, other.map(|(token, _)| token))),
    }
}

fn take_optional<'src>(input: &mut Input<'src, '_>, kind: TokenKind) -> Option<Token<'src>> {
    let (token, rest) = input.split_first()?;
    if token.kind != kind {
        return None;
    }
    *input = rest;
    Some(token.clone())
}

/// Reads `250ms` or `2s`.
#[must_use]
pub fn parse_duration(text: &str) -> Option<Duration> {
    duration_literal.parse(text).ok()
}

fn duration_literal(input: &mut &str) -> ModalResult<Duration> {
    let value = dec_uint::<_, u64, _>.parse_next(input)?;
    alt((
        "ms".value(Duration::from_millis(value)),
        "s".value(Duration::from_secs(value)),
    ))
    .parse_next(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(input: &str) -> Command<'_> {
        parse(input).expect("command should parse")
    }

    fn address(text: &str) -> Address {
        Address::parse(text).expect("test address should parse")
    }

    #[test]
    fn dial_defaults_to_fast() {
        assert_eq!(
            parse_ok("dial earth 1-2-3-4-5-6-7"),
            Command::Dial {
                gate: "earth",
                mode: DialType::Fast,
                address: address("1-2-3-4-5-6-7"),
            }
        );
    }

    #[test]
    fn dial_accepts_mode_keyword() {
        match parse_ok("dial abydos slow 26,6,14,31,11,29,0") {
            Command::Dial { gate, mode, address: dialed } => {
                assert_eq!(gate, "abydos");
                assert_eq!(mode, DialType::Slow);
                assert_eq!(dialed, address("26-6-14-31-11-29-0"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(matches!(
            parse_ok("dial earth instant 1-2-3-4-5-6-7"),
            Command::Dial {
                mode: DialType::Instant,
                ..
            }
        ));
    }

    #[test]
    fn rejects_unknown_mode() {
        match parse("dial earth manual 1-2-3") {
            Err(ParseError::Grammar(GrammarError {
                kind: GrammarErrorKind::UnexpectedToken { lexeme, .. },
            })) => assert_eq!(lexeme, "manual"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn parses_manual_steps() {
        assert_eq!(
            parse_ok("encode earth 12"),
            Command::Encode {
                gate: "earth",
                symbol: Symbol(12),
            }
        );
        assert_eq!(
            parse_ok("lock earth 0"),
            Command::Lock {
                gate: "earth",
                symbol: Symbol(0),
            }
        );
    }

    #[test]
    fn parses_advance_durations() {
        assert_eq!(
            parse_ok("advance 250ms"),
            Command::Advance(Duration::from_millis(250))
        );
        assert_eq!(parse_ok("advance 2s"), Command::Advance(Duration::from_secs(2)));
    }

    #[test]
    fn status_gate_is_optional() {
        assert_eq!(parse_ok("status"), Command::Status { gate: None });
        assert_eq!(
            parse_ok("status chulak\n"),
            Command::Status {
                gate: Some("chulak"),
            }
        );
    }

    #[test]
    fn parses_help_topic_and_send() {
        assert_eq!(
            parse_ok("help dial"),
            Command::Help { topic: Some("dial") }
        );
        assert_eq!(
            parse_ok("send earth 42"),
            Command::Send {
                gate: "earth",
                object: ObjectId(42),
            }
        );
    }

    #[test]
    fn supports_case_insensitive_keywords() {
        assert_eq!(parse_ok("StOp Earth"), Command::Stop { gate: "Earth" });
    }

    #[test]
    fn reports_missing_argument() {
        match parse("stop") {
            Err(ParseError::Grammar(err)) => assert_eq!(
                err.kind,
                GrammarErrorKind::UnexpectedEnd {
                    expected: "gate name",
                }
            ),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn reports_bad_address_and_symbol() {
        match parse("dial earth 1-2-300") {
            Err(ParseError::Grammar(err)) => assert!(matches!(
                err.kind,
                GrammarErrorKind::InvalidAddress {
                    error: AddressError::Malformed,
                    ..
                }
            )),
            other => panic!("unexpected result: {other:?}"),
        }
        match parse("encode earth 300") {
            Err(ParseError::Grammar(err)) => {
                assert!(matches!(err.kind, GrammarErrorKind::InvalidInteger { .. }));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn rejects_trailing_and_unknown_input() {
        assert!(matches!(
            parse("reset earth now"),
            Err(ParseError::Grammar(GrammarError {
                kind: GrammarErrorKind::UnexpectedToken {
                    expected: "end of command",
                    ..
                },
            }))
        ));
        assert!(matches!(
            parse("reboot now"),
            Err(ParseError::Grammar(GrammarError {
                kind: GrammarErrorKind::UnknownCommand { lexeme: "reboot" },
            }))
        ));
        match parse("stop earth$") {
            Err(ParseError::Grammar(err)) => {
                assert!(matches!(err.kind, GrammarErrorKind::InvalidToken { .. }));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn lexer_separates_addresses_durations_and_integers() {
        let tokens = lex("dial 1-2-3 15ms 7 $").expect("lexing should succeed");
        let kinds: HeaplessVec<TokenKind, 8> = tokens.iter().map(|token| token.kind).collect();
        assert_eq!(
            kinds.as_slice(),
            [
                TokenKind::Ident,
                TokenKind::Address,
                TokenKind::Duration,
                TokenKind::Integer,
                TokenKind::Error,
            ]
        );
        assert_eq!(tokens[1].lexeme, "1-2-3");
        assert_eq!(tokens[1].span, 5..10);
    }

    #[test]
    fn duration_literal_requires_unit() {
        assert_eq!(parse_duration("1500ms"), Some(Duration::from_millis(1500)));
        assert_eq!(parse_duration("3s"), Some(Duration::from_secs(3)));
        assert_eq!(parse_duration("3"), None);
        assert_eq!(parse_duration("3min"), None);
    }
}
