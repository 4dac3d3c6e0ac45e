//! Grammar-aware completion engine for REPL front-ends.
//!
//! The line editor hands over the buffer and cursor; the engine walks the
//! [`catalog`](super::catalog) to decide what belongs at the cursor and
//! offers commands, dial modes or the gate names it was built with.

use heapless::Vec as HeaplessVec;

use super::catalog::{self, CommandSpec, Param};
use super::grammar::{self, Token, TokenKind};

const MAX_SUGGESTIONS: usize = 16;

/// Completion result returned to the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletionResult<'a> {
    /// Text to splice in when a single candidate matches or the candidates
    /// share a prefix longer than what was typed.
    pub replacement: Option<Replacement<'a>>,
    /// Candidates for the word under the cursor; empty when nothing fits.
    pub options: HeaplessVec<&'a str, MAX_SUGGESTIONS>,
}

impl CompletionResult<'_> {
    fn empty() -> Self {
        Self {
            replacement: None,
            options: HeaplessVec::new(),
        }
    }
}

/// Portion of the buffer to substitute with `value`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Replacement<'a> {
    pub start: usize,
    pub end: usize,
    pub value: &'a str,
    pub append_space: bool,
}

/// Completion engine over the command catalog and a gate roster.
#[derive(Clone, Copy, Debug, Default)]
pub struct CompletionEngine<'a> {
    gates: &'a [&'a str],
}

impl<'a> CompletionEngine<'a> {
    /// Creates an engine that completes the given gate names.
    #[must_use]
    pub const fn new(gates: &'a [&'a str]) -> Self {
        Self { gates }
    }

    /// Computes completions for `buffer` at byte offset `cursor`.
    ///
    /// The cursor must sit on a UTF-8 boundary; callers keep input ASCII.
    #[must_use]
    pub fn complete(&self, buffer: &str, cursor: usize) -> CompletionResult<'a> {
        let Some(upto_cursor) = buffer.get(..cursor) else {
            return CompletionResult::empty();
        };
        let prefix_start = token_start(upto_cursor);
        let prefix = &upto_cursor[prefix_start..];
        let leading = &upto_cursor[..prefix_start];

        let Ok(leading_tokens) = grammar::lex(leading) else {
            return CompletionResult::empty();
        };

        let context = determine_context(leading_tokens.as_slice());
        let candidates: &[&'a str] = match context {
            CompletionContext::Command => catalog::command_names(),
            CompletionContext::Param { param, .. } => match param {
                Param::Gate | Param::OptionalGate => self.gates,
                Param::Mode => catalog::mode_keywords(),
                Param::Topic => catalog::command_names(),
                Param::Address | Param::Symbol | Param::Object | Param::Duration => &[],
            },
            CompletionContext::None => &[],
        };

        let mut matches: HeaplessVec<&'a str, MAX_SUGGESTIONS> = HeaplessVec::new();
        for candidate in candidates {
            if starts_with_ignore_ascii_case(candidate, prefix) && matches.push(*candidate).is_err() {
                break;
            }
        }

        let replacement = match matches.as_slice() {
            [] => None,
            [only] => Some(Replacement {
                start: prefix_start,
                end: cursor,
                value: *only,
                append_space: context.continues_after(only),
            }),
            several => {
                let lcp = longest_common_prefix(several);
                (lcp.len() > common_prefix_len_ignore_case(prefix, lcp)).then_some(Replacement {
                    start: prefix_start,
                    end: cursor,
                    value: lcp,
                    append_space: false,
                })
            }
        };

        CompletionResult {
            replacement,
            options: matches,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CompletionContext {
    Command,
    Param {
        spec: &'static CommandSpec,
        index: usize,
        param: Param,
    },
    None,
}

impl CompletionContext {
    /// Whether the accepted word leaves more of the command to type.
    fn continues_after(self, candidate: &str) -> bool {
        match self {
            CompletionContext::Command => {
                catalog::find(candidate).is_some_and(|spec| !spec.params.is_empty())
            }
            CompletionContext::Param { spec, index, .. } => index + 1 < spec.params.len(),
            CompletionContext::None => false,
        }
    }
}

fn determine_context(tokens: &[Token<'_>]) -> CompletionContext {
    let Some((first, rest)) = tokens.split_first() else {
        return CompletionContext::Command;
    };
    if tokens
        .iter()
        .any(|token| matches!(token.kind, TokenKind::Error | TokenKind::Eol))
    {
        return CompletionContext::None;
    }
    let Some(spec) = catalog::find(first.lexeme) else {
        return CompletionContext::None;
    };

    let mut index = 0;
    for token in rest {
        while spec.params.get(index) == Some(&Param::Mode) && !is_mode(token) {
            index += 1;
        }
        index += 1;
    }
    match spec.params.get(index) {
        Some(param) => CompletionContext::Param {
            spec,
            index,
            param: *param,
        },
        None => CompletionContext::None,
    }
}

fn is_mode(token: &Token<'_>) -> bool {
    token.kind == TokenKind::Ident && catalog::find_mode(token.lexeme).is_some()
}

fn token_start(buffer: &str) -> usize {
    buffer
        .rfind([' ', '\t'])
        .map_or(0, |position| position + 1)
}

fn starts_with_ignore_ascii_case(candidate: &str, prefix: &str) -> bool {
    candidate
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

fn common_prefix_len_ignore_case(lhs: &str, rhs: &str) -> usize {
    lhs.as_bytes()
        .iter()
        .zip(rhs.as_bytes())
        .take_while(|(l, r)| l.eq_ignore_ascii_case(r))
        .count()
}

fn longest_common_prefix<'a>(candidates: &[&'a str]) -> &'a str {
    let Some((first, rest)) = candidates.split_first() else {
        return "";
    };
    let mut prefix = *first;
    for candidate in rest {
        let len = common_prefix_len_ignore_case(prefix, candidate);
        prefix = &prefix[..len];
        if prefix.is_empty() {
            break;
        }
    }
    prefix
}

#[cfg(test)]
mod tests {
    use super::*;

    const GATES: &[&str] = &["earth", "abydos", "chulak", "chimera"];

    fn expect_options(
        result: CompletionResult<'_>,
    ) -> (Option<Replacement<'_>>, HeaplessVec<&str, MAX_SUGGESTIONS>) {
        assert!(
            !result.options.is_empty(),
            "expected suggestions but got no match"
        );
        (result.replacement, result.options)
    }

    #[test]
    fn offers_every_command_from_empty_buffer() {
        let engine = CompletionEngine::new(GATES);
        let (replacement, options) = expect_options(engine.complete("", 0));
        assert!(replacement.is_none());
        assert_eq!(options.as_slice(), catalog::command_names());
    }

    #[test]
    fn expands_unique_command_with_space() {
        let engine = CompletionEngine::new(GATES);
        let (replacement, options) = expect_options(engine.complete("di", 2));
        let replacement = replacement.expect("expected replacement");
        assert_eq!((replacement.start, replacement.end), (0, 2));
        assert_eq!(replacement.value, "dial");
        assert!(replacement.append_space);
        assert_eq!(options.as_slice(), ["dial"]);
    }

    #[test]
    fn shared_prefix_extends_partial_word() {
        let engine = CompletionEngine::new(GATES);
        let (replacement, options) = expect_options(engine.complete("s", 1));
        assert!(replacement.is_none());
        assert_eq!(options.as_slice(), ["stop", "send", "status"]);

        let (replacement, options) = expect_options(engine.complete("dial c", 6));
        let replacement = replacement.expect("expected shared prefix");
        assert_eq!(replacement.value, "ch");
        assert_eq!(options.as_slice(), ["chulak", "chimera"]);
    }

    #[test]
    fn completes_gate_names_case_insensitively() {
        let engine = CompletionEngine::new(GATES);
        let (replacement, options) = expect_options(engine.complete("stop EA", 7));
        let replacement = replacement.expect("expected replacement");
        assert_eq!((replacement.start, replacement.end), (5, 7));
        assert_eq!(replacement.value, "earth");
        assert!(!replacement.append_space);
        assert_eq!(options.as_slice(), ["earth"]);
    }

    #[test]
    fn offers_modes_after_dial_gate() {
        let engine = CompletionEngine::new(GATES);
        let (replacement, options) = expect_options(engine.complete("dial earth ", 11));
        assert!(replacement.is_none());
        assert_eq!(options.as_slice(), catalog::mode_keywords());

        let (replacement, _) = expect_options(engine.complete("dial earth sl", 13));
        let replacement = replacement.expect("expected replacement");
        assert_eq!(replacement.value, "slow");
        assert!(replacement.append_space);
    }

    #[test]
    fn nothing_to_offer_for_literals() {
        let engine = CompletionEngine::new(GATES);
        assert!(engine.complete("dial earth slow ", 16).options.is_empty());
        assert!(engine.complete("advance ", 8).options.is_empty());
        assert!(engine.complete("stop earth ", 11).options.is_empty());
        assert!(engine.complete("warp ", 5).options.is_empty());
        assert!(engine.complete("stop", 10).options.is_empty());
    }

    #[test]
    fn help_topics_are_command_names() {
        let engine = CompletionEngine::new(GATES);
        let (replacement, options) = expect_options(engine.complete("help lo", 7));
        assert_eq!(
            replacement.expect("expected replacement").value,
            "lock"
        );
        assert_eq!(options.as_slice(), ["lock"]);
    }
}
