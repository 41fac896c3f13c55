//! DFA lexer for the ledger language, built on Logos.
//!
//! [`tokenize`] runs the generated lexer and post-processes the stream:
//! it synthesizes [`Token::Indent`] at the start of continuation lines,
//! drops comments, tolerates a leading byte-order mark, and classifies
//! unrecognized input into [`Token::Error`] tokens that the grammar engine
//! reports and absorbs.

use logos::Logos;
use std::fmt;

use crate::span::Span;

/// Token types produced by the lexer.
// The skip class covers horizontal whitespace plus the byte-order mark, so
// a BOM at offset zero never reaches the grammar.
#[derive(Logos, Debug, Clone, PartialEq, Eq)]
#[logos(skip r"[ \t\u{feff}]+")]
pub enum Token<'src> {
    // ===== Literals =====
    /// A date, `YYYY-MM-DD` or `YYYY/MM/DD`. Range-checked by the grammar.
    #[regex(r"[0-9]{4}[-/][0-9]{2}[-/][0-9]{2}")]
    Date(&'src str),

    /// An unsigned number with optional thousands commas and fraction.
    /// Signs are operators, not part of the literal.
    #[regex(r"[0-9]+(,[0-9]{3})*(\.[0-9]+)?")]
    Number(&'src str),

    /// A double-quoted string; the slice includes the quotes. May span
    /// lines.
    #[regex(r#""([^"\\]|\\.)*""#)]
    String(&'src str),

    /// An account: capitalized colon-separated segments, at least two.
    /// Root-class validity is left to semantic layers.
    #[regex(r"[A-Z][A-Za-z0-9\-]*(:[A-Z][A-Za-z0-9\-]*)+")]
    Account(&'src str),

    /// A currency code, or a single uppercase letter.
    #[regex(r"[A-Z]([A-Z0-9'\._\-]{0,22}[A-Z0-9])?")]
    Currency(&'src str),

    /// A `#tag`; the slice includes the marker.
    #[regex(r"#[A-Za-z0-9\-_/\.]+")]
    Tag(&'src str),

    /// A `^link`; the slice includes the marker.
    #[regex(r"\^[A-Za-z0-9\-_/\.]+")]
    Link(&'src str),

    /// A metadata key; the trailing colon is part of the lexeme.
    #[regex(r"[a-z][a-zA-Z0-9\-_]*:")]
    Key(&'src str),

    // ===== Keywords =====
    /// The `txn` transaction keyword.
    #[token("txn")]
    Txn,
    /// The `balance` directive keyword.
    #[token("balance")]
    Balance,
    /// The `open` directive keyword.
    #[token("open")]
    Open,
    /// The `close` directive keyword.
    #[token("close")]
    Close,
    /// The `commodity` directive keyword.
    #[token("commodity")]
    Commodity,
    /// The `pad` directive keyword.
    #[token("pad")]
    Pad,
    /// The `event` directive keyword.
    #[token("event")]
    Event,
    /// The `price` directive keyword.
    #[token("price")]
    Price,
    /// The `note` directive keyword.
    #[token("note")]
    Note,
    /// The `document` directive keyword.
    #[token("document")]
    Document,
    /// The `query` directive keyword.
    #[token("query")]
    Query,
    /// The `custom` directive keyword.
    #[token("custom")]
    Custom,
    /// The `option` directive keyword.
    #[token("option")]
    Option_,
    /// The `include` directive keyword.
    #[token("include")]
    Include,
    /// The `plugin` directive keyword.
    #[token("plugin")]
    Plugin,
    /// The `pushtag` directive keyword.
    #[token("pushtag")]
    Pushtag,
    /// The `poptag` directive keyword.
    #[token("poptag")]
    Poptag,
    /// The `pushmeta` directive keyword.
    #[token("pushmeta")]
    Pushmeta,
    /// The `popmeta` directive keyword.
    #[token("popmeta")]
    Popmeta,
    /// The `TRUE` boolean literal.
    #[token("TRUE")]
    True,
    /// The `FALSE` boolean literal.
    #[token("FALSE")]
    False,

    // ===== Punctuation =====
    /// `|`, the deprecated payee/narration separator.
    #[token("|")]
    Pipe,
    /// `@@`, total price annotation.
    #[token("@@")]
    AtAt,
    /// `@`, per-unit price annotation.
    #[token("@")]
    At,
    /// `{{`, opening a total cost spec.
    #[token("{{")]
    LCurlCurl,
    /// `}}`, closing a total cost spec.
    #[token("}}")]
    RCurlCurl,
    /// `{`, opening a per-unit cost spec.
    #[token("{")]
    LCurl,
    /// `}`, closing a per-unit cost spec.
    #[token("}")]
    RCurl,
    /// `=`, lexed but used by no production.
    #[token("=")]
    Equal,
    /// `,` separator.
    #[token(",")]
    Comma,
    /// `~`, the balance tolerance marker.
    #[token("~")]
    Tilde,
    /// `#`, a flag, or the per/total separator in cost specs.
    #[token("#")]
    Hash,
    /// `*`, a flag, the merge marker, or multiplication.
    #[token("*")]
    Asterisk,
    /// `/`, division or the deprecated cost separator.
    #[token("/")]
    Slash,
    /// `+` operator.
    #[token("+")]
    Plus,
    /// `-` operator.
    #[token("-")]
    Minus,
    /// `(` opening a number expression.
    #[token("(")]
    LParen,
    /// `)` closing a number expression.
    #[token(")")]
    RParen,

    /// A transaction or posting flag that is not `*` or `#`.
    #[regex(r"[!&?%]", |lex| lex.slice().chars().next())]
    Flag(char),

    // ===== Structural =====
    /// End of a logical line.
    #[regex(r"\r?\n")]
    Eol,

    /// A `;` comment; dropped by [`tokenize`].
    #[regex(r";[^\n\r]*")]
    Comment(&'src str),

    /// Leading whitespace on a continuation line. Synthesized by
    /// [`tokenize`], never by the generated lexer.
    Indent,

    /// Unrecognized input.
    Error,
}

impl Token<'_> {
    /// The token's name, as used in grammar error messages.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Date(_) => "DATE",
            Self::Number(_) => "NUMBER",
            Self::String(_) => "STRING",
            Self::Account(_) => "ACCOUNT",
            Self::Currency(_) => "CURRENCY",
            Self::Tag(_) => "TAG",
            Self::Link(_) => "LINK",
            Self::Key(_) => "KEY",
            Self::Txn => "TXN",
            Self::Balance => "BALANCE",
            Self::Open => "OPEN",
            Self::Close => "CLOSE",
            Self::Commodity => "COMMODITY",
            Self::Pad => "PAD",
            Self::Event => "EVENT",
            Self::Price => "PRICE",
            Self::Note => "NOTE",
            Self::Document => "DOCUMENT",
            Self::Query => "QUERY",
            Self::Custom => "CUSTOM",
            Self::Option_ => "OPTION",
            Self::Include => "INCLUDE",
            Self::Plugin => "PLUGIN",
            Self::Pushtag => "PUSHTAG",
            Self::Poptag => "POPTAG",
            Self::Pushmeta => "PUSHMETA",
            Self::Popmeta => "POPMETA",
            Self::True | Self::False => "BOOL",
            Self::Pipe => "PIPE",
            Self::AtAt => "ATAT",
            Self::At => "AT",
            Self::LCurlCurl => "LCURLCURL",
            Self::RCurlCurl => "RCURLCURL",
            Self::LCurl => "LCURL",
            Self::RCurl => "RCURL",
            Self::Equal => "EQUAL",
            Self::Comma => "COMMA",
            Self::Tilde => "TILDE",
            Self::Hash => "HASH",
            Self::Asterisk => "ASTERISK",
            Self::Slash => "SLASH",
            Self::Plus => "PLUS",
            Self::Minus => "MINUS",
            Self::LParen => "LPAREN",
            Self::RParen => "RPAREN",
            Self::Flag(_) => "FLAG",
            Self::Eol => "EOL",
            Self::Comment(_) => "COMMENT",
            Self::Indent => "INDENT",
            Self::Error => "LEX_ERROR",
        }
    }

    /// Whether this token can fill a transaction or posting flag slot.
    #[must_use]
    pub fn is_flag(&self) -> bool {
        match self {
            Self::Asterisk | Self::Hash | Self::Flag(_) => true,
            // A bare uppercase letter is a letter flag in flag position.
            Self::Currency(c) => c.len() == 1,
            _ => false,
        }
    }

    /// The flag character, when [`Self::is_flag`] holds.
    #[must_use]
    pub fn flag_char(&self) -> Option<char> {
        match self {
            Self::Asterisk => Some('*'),
            Self::Hash => Some('#'),
            Self::Flag(c) => Some(*c),
            Self::Currency(c) if c.len() == 1 => c.chars().next(),
            _ => None,
        }
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Date(s)
            | Self::Number(s)
            | Self::String(s)
            | Self::Account(s)
            | Self::Currency(s)
            | Self::Tag(s)
            | Self::Link(s)
            | Self::Key(s)
            | Self::Comment(s) => write!(f, "{s}"),
            Self::Txn => write!(f, "txn"),
            Self::Balance => write!(f, "balance"),
            Self::Open => write!(f, "open"),
            Self::Close => write!(f, "close"),
            Self::Commodity => write!(f, "commodity"),
            Self::Pad => write!(f, "pad"),
            Self::Event => write!(f, "event"),
            Self::Price => write!(f, "price"),
            Self::Note => write!(f, "note"),
            Self::Document => write!(f, "document"),
            Self::Query => write!(f, "query"),
            Self::Custom => write!(f, "custom"),
            Self::Option_ => write!(f, "option"),
            Self::Include => write!(f, "include"),
            Self::Plugin => write!(f, "plugin"),
            Self::Pushtag => write!(f, "pushtag"),
            Self::Poptag => write!(f, "poptag"),
            Self::Pushmeta => write!(f, "pushmeta"),
            Self::Popmeta => write!(f, "popmeta"),
            Self::True => write!(f, "TRUE"),
            Self::False => write!(f, "FALSE"),
            Self::Pipe => write!(f, "|"),
            Self::AtAt => write!(f, "@@"),
            Self::At => write!(f, "@"),
            Self::LCurlCurl => write!(f, "{{{{"),
            Self::RCurlCurl => write!(f, "}}}}"),
            Self::LCurl => write!(f, "{{"),
            Self::RCurl => write!(f, "}}"),
            Self::Equal => write!(f, "="),
            Self::Comma => write!(f, ","),
            Self::Tilde => write!(f, "~"),
            Self::Hash => write!(f, "#"),
            Self::Asterisk => write!(f, "*"),
            Self::Slash => write!(f, "/"),
            Self::Plus => write!(f, "+"),
            Self::Minus => write!(f, "-"),
            Self::LParen => write!(f, "("),
            Self::RParen => write!(f, ")"),
            Self::Flag(c) => write!(f, "{c}"),
            Self::Eol => write!(f, "\\n"),
            Self::Indent => write!(f, "<indent>"),
            Self::Error => write!(f, "<error>"),
        }
    }
}

/// Tokenize source text into `(Token, Span)` pairs.
///
/// Post-processing on top of the generated lexer:
///
/// 1. An [`Token::Indent`] is inserted at the start of any line whose first
///    token sits after leading horizontal whitespace.
/// 2. Comments are dropped.
/// 3. Unrecognized input becomes [`Token::Error`] (one per bad slice); the
///    lexer resumes at the next recognizable token.
#[must_use]
pub fn tokenize(source: &str) -> Vec<(Token<'_>, Span)> {
    let mut tokens = Vec::new();
    let mut lexer = Token::lexer(source);
    let mut at_line_start = true;
    let mut line_start = 0usize;

    while let Some(result) = lexer.next() {
        let span: Span = lexer.span().into();

        let token = match result {
            Ok(Token::Eol) => {
                // A whitespace-only line keeps its indentation, so an
                // indented blank line continues a posting block.
                if at_line_start {
                    push_indent(&mut tokens, source, line_start, span.start);
                }
                tokens.push((Token::Eol, span));
                at_line_start = true;
                line_start = span.end;
                continue;
            }
            Ok(token) => token,
            Err(()) => Token::Error,
        };

        if at_line_start {
            push_indent(&mut tokens, source, line_start, span.start);
            at_line_start = false;
        }

        // Adjacent unrecognized bytes collapse into one error token, so a
        // junk word reports once and scanning resumes at the next
        // whitespace.
        if matches!(token, Token::Error) {
            if let Some((Token::Error, prev)) = tokens.last_mut() {
                if prev.end == span.start {
                    prev.end = span.end;
                    continue;
                }
            }
        }

        // Comments never reach the grammar.
        if !matches!(token, Token::Comment(_)) {
            tokens.push((token, span));
        }
    }

    tokens
}

fn push_indent<'src>(
    tokens: &mut Vec<(Token<'src>, Span)>,
    source: &str,
    line_start: usize,
    token_start: usize,
) {
    let leading = &source[line_start..token_start];
    if !leading.is_empty() && leading.bytes().all(|b| b == b' ' || b == b'\t') {
        tokens.push((Token::Indent, Span::new(line_start, token_start)));
    }
}

/// Decode a quoted string lexeme: strip the quotes and resolve the
/// `\"`, `\\`, `\n`, `\t` escapes. An unknown escape keeps the escaped
/// character as written.
#[must_use]
pub fn unquote(lexeme: &str) -> String {
    let inner = &lexeme[1..lexeme.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token<'_>> {
        tokenize(source).into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn test_tokenize_date() {
        assert_eq!(kinds("2014-03-01"), vec![Token::Date("2014-03-01")]);
        assert_eq!(kinds("2014/03/01"), vec![Token::Date("2014/03/01")]);
    }

    #[test]
    fn test_tokenize_number_forms() {
        assert_eq!(kinds("1234.56"), vec![Token::Number("1234.56")]);
        assert_eq!(kinds("1,234,567.89"), vec![Token::Number("1,234,567.89")]);
        // Signs are operators, not part of the literal.
        assert_eq!(
            kinds("-37.45"),
            vec![Token::Minus, Token::Number("37.45")]
        );
    }

    #[test]
    fn test_tokenize_account_and_currency() {
        assert_eq!(
            kinds("Liabilities:CreditCard:CapitalOne"),
            vec![Token::Account("Liabilities:CreditCard:CapitalOne")]
        );
        assert_eq!(kinds("USD"), vec![Token::Currency("USD")]);
        assert_eq!(kinds("V"), vec![Token::Currency("V")]);
        assert_eq!(kinds("X-7A"), vec![Token::Currency("X-7A")]);
    }

    #[test]
    fn test_tokenize_string() {
        assert_eq!(
            kinds(r#""Cafe Mogador""#),
            vec![Token::String(r#""Cafe Mogador""#)]
        );
        assert_eq!(
            kinds(r#""with \"escape\"""#),
            vec![Token::String(r#""with \"escape\"""#)]
        );
    }

    #[test]
    fn test_tokenize_keywords_and_bools() {
        assert_eq!(
            kinds("open close pushtag TRUE FALSE"),
            vec![
                Token::Open,
                Token::Close,
                Token::Pushtag,
                Token::True,
                Token::False
            ]
        );
    }

    #[test]
    fn test_tokenize_tag_link_key() {
        assert_eq!(
            kinds("#berlin-trip ^invoice.23 category:"),
            vec![
                Token::Tag("#berlin-trip"),
                Token::Link("^invoice.23"),
                Token::Key("category:")
            ]
        );
    }

    #[test]
    fn test_key_beats_keyword_with_colon() {
        assert_eq!(kinds("balance:"), vec![Token::Key("balance:")]);
    }

    #[test]
    fn test_tokenize_punctuation() {
        assert_eq!(
            kinds("{ }} @@ @ ~ | ="),
            vec![
                Token::LCurl,
                Token::RCurlCurl,
                Token::AtAt,
                Token::At,
                Token::Tilde,
                Token::Pipe,
                Token::Equal
            ]
        );
    }

    #[test]
    fn test_tokenize_flags() {
        assert_eq!(kinds("! ?"), vec![Token::Flag('!'), Token::Flag('?')]);
        assert!(Token::Asterisk.is_flag());
        assert_eq!(Token::Currency("P").flag_char(), Some('P'));
        assert_eq!(Token::Currency("PLN").flag_char(), None);
    }

    #[test]
    fn test_tokenize_comments_dropped() {
        assert_eq!(kinds("; a comment\n"), vec![Token::Eol]);
        assert_eq!(
            kinds("open ; trailing\n"),
            vec![Token::Open, Token::Eol]
        );
    }

    #[test]
    fn test_tokenize_indent() {
        let tokens = kinds("txn\n  Assets:Cash 100 USD\n");
        assert_eq!(
            tokens,
            vec![
                Token::Txn,
                Token::Eol,
                Token::Indent,
                Token::Account("Assets:Cash"),
                Token::Number("100"),
                Token::Currency("USD"),
                Token::Eol
            ]
        );
    }

    #[test]
    fn test_tokenize_indented_comment_line() {
        // Comment dropped, indent kept: the line still continues a block.
        assert_eq!(
            kinds("  ; note\n"),
            vec![Token::Indent, Token::Eol]
        );
    }

    #[test]
    fn test_tokenize_indented_blank_line() {
        assert_eq!(kinds("   \n"), vec![Token::Indent, Token::Eol]);
        assert_eq!(kinds("\n"), vec![Token::Eol]);
    }

    #[test]
    fn test_tokenize_bom() {
        assert_eq!(kinds("\u{feff}2014-01-01"), vec![Token::Date("2014-01-01")]);
    }

    #[test]
    fn test_tokenize_error_token() {
        let tokens = tokenize("2014-01-01 ` open");
        assert!(tokens.iter().any(|(t, _)| matches!(t, Token::Error)));
    }

    #[test]
    fn test_unquote_escapes() {
        assert_eq!(unquote(r#""a\"b""#), "a\"b");
        assert_eq!(unquote(r#""line\nbreak""#), "line\nbreak");
        assert_eq!(unquote(r#""tab\there""#), "tab\there");
        assert_eq!(unquote(r#""back\\slash""#), "back\\slash");
        assert_eq!(unquote(r#""plain""#), "plain");
    }
}
