// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Lexical analysis for Brio source code.
//!
//! This module converts source text into a stream of [`Token`]s. The
//! lexer is hand-written for maximum control over error recovery.
//!
//! # Design Principles
//!
//! - **Error recovery**: never abort on malformed input; emit
//!   [`TokenKind::Error`] and keep scanning
//! - **Significant line ends**: a line end is a statement separator, so
//!   it is a token; consecutive line ends collapse into one
//! - **One-token putback**: `123.ToString` lexes as integer, dot,
//!   identifier — the dot is put back once the fraction scan fails
//!
//! Comments (`'` or `Rem` to end of line) are dropped, except that the
//! line end they sit on still produces its EOL token. A `_` at the end
//! of a line splices the next line on, eliding the separator.
//!
//! # Example
//!
//! ```
//! use brio_core::source_analysis::lex;
//!
//! let (tokens, errors) = lex("Dim x = 42", 1);
//! assert!(errors.is_empty());
//! assert_eq!(tokens.len(), 5); // Dim, x, =, 42, <eof>
//! ```

use std::collections::VecDeque;
use std::iter::Peekable;
use std::str::Chars;

use ecow::EcoString;
use rust_decimal::Decimal;

use super::{
    DateValue, FloatKind, IntegerKind, Keyword, LexError, LexErrorKind, Location, Token, TokenKind,
};

/// Tokenizes a full source text.
///
/// Returns the token sequence (terminated by [`TokenKind::Eof`]) and any
/// lexical errors. Every input produces a total token stream; errors
/// never stop the scan.
#[must_use]
pub fn lex(source: &str, file: u16) -> (Vec<Token>, Vec<LexError>) {
    let mut lexer = Lexer::new(source, file);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token();
        let done = token.kind().is_eof();
        tokens.push(token);
        if done {
            break;
        }
    }
    (tokens, lexer.errors)
}

/// A lexer that tokenizes Brio source code.
///
/// Keeps the current (line, column) position so every token carries a
/// full [`Location`]. Implements [`Iterator`] over the tokens before
/// end-of-file for convenience in tests.
pub struct Lexer<'src> {
    chars: Peekable<Chars<'src>>,
    file: u16,
    /// 1-based line of the next unread character.
    line: u32,
    /// 1-based column of the next unread character.
    column: u32,
    /// Tokens put back or split off during scanning, drained first.
    pending: VecDeque<Token>,
    /// Suppresses EOL emission at start of input and after another EOL.
    suppress_eol: bool,
    /// Accumulated lexical errors.
    errors: Vec<LexError>,
    reached_eof: bool,
}

impl std::fmt::Debug for Lexer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lexer")
            .field("line", &self.line)
            .field("column", &self.column)
            .field("errors", &self.errors.len())
            .finish()
    }
}

impl<'src> Lexer<'src> {
    /// Creates a new lexer for the given source text and file index.
    #[must_use]
    pub fn new(source: &'src str, file: u16) -> Self {
        Self {
            chars: source.chars().peekable(),
            file,
            line: 1,
            column: 1,
            pending: VecDeque::new(),
            suppress_eol: true,
            errors: Vec::new(),
            reached_eof: false,
        }
    }

    /// Returns the lexical errors recorded so far.
    #[must_use]
    pub fn errors(&self) -> &[LexError] {
        &self.errors
    }

    /// Consumes the lexer, returning its recorded errors.
    #[must_use]
    pub fn into_errors(self) -> Vec<LexError> {
        self.errors
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    /// Consumes the next character if it satisfies the predicate.
    fn advance_if(&mut self, predicate: impl Fn(char) -> bool) -> Option<char> {
        if self.peek_char().is_some_and(&predicate) {
            self.advance()
        } else {
            None
        }
    }

    fn here(&self) -> Location {
        Location::new(self.file, self.line, self.column)
    }

    fn error(&mut self, kind: LexErrorKind, location: Location) {
        self.errors.push(LexError::new(kind, location));
    }

    /// Produces the next token. After [`TokenKind::Eof`] has been
    /// returned once, every further call returns another EOF token.
    pub fn next_token(&mut self) -> Token {
        if let Some(token) = self.pending.pop_front() {
            self.suppress_eol = false;
            return token;
        }

        loop {
            let location = self.here();
            let Some(c) = self.advance() else {
                self.reached_eof = true;
                return Token::new(TokenKind::Eof, location);
            };

            match c {
                ' ' | '\t' | '\r' => {}
                '\n' => {
                    if !self.suppress_eol {
                        self.suppress_eol = true;
                        return Token::new(TokenKind::Eol, location);
                    }
                }
                '\'' => self.skip_comment(),
                '_' if self.at_line_splice() => self.consume_line_splice(),
                '"' => {
                    let kind = self.scan_string(location);
                    return self.emit(kind, location);
                }
                '#' => {
                    let kind = self.scan_date(location);
                    return self.emit(kind, location);
                }
                '[' => {
                    let kind = self.scan_escaped_identifier(location);
                    return self.emit(kind, location);
                }
                '0'..='9' => {
                    let kind = self.scan_number(c, location);
                    return self.emit(kind, location);
                }
                c if is_identifier_start(c) => {
                    // `None` means the identifier was a `Rem` comment;
                    // keep scanning so its line end becomes the separator.
                    if let Some(kind) = self.scan_identifier(c) {
                        return self.emit(kind, location);
                    }
                }
                c => {
                    let kind = self.scan_operator(c).unwrap_or_else(|| {
                        self.error(LexErrorKind::UnexpectedCharacter(c), location);
                        TokenKind::Error(EcoString::from(c.to_string()))
                    });
                    return self.emit(kind, location);
                }
            }
        }
    }

    fn emit(&mut self, kind: TokenKind, location: Location) -> Token {
        self.suppress_eol = false;
        Token::new(kind, location)
    }

    /// Skips a `'` comment. The newline stays in the stream so the EOL
    /// token is still produced by the main loop.
    fn skip_comment(&mut self) {
        while self.peek_char().is_some_and(|c| c != '\n') {
            self.advance();
        }
    }

    /// A `_` splices lines only when nothing but whitespace follows it.
    fn at_line_splice(&mut self) -> bool {
        let mut lookahead = self.chars.clone();
        loop {
            match lookahead.next() {
                Some(' ' | '\t' | '\r') => {}
                Some('\n') | None => return true,
                Some(_) => return false,
            }
        }
    }

    fn consume_line_splice(&mut self) {
        while let Some(c) = self.advance() {
            if c == '\n' {
                break;
            }
        }
    }

    // === Identifiers and keywords ===

    /// Scans an identifier or keyword. Returns `None` for `Rem`, which
    /// comments out the rest of the line like `'`.
    fn scan_identifier(&mut self, first: char) -> Option<TokenKind> {
        let mut text = EcoString::new();
        text.push(first);
        while let Some(c) = self.advance_if(is_identifier_part) {
            text.push(c);
        }
        if text.eq_ignore_ascii_case("rem") {
            self.skip_comment();
            return None;
        }
        Some(match Keyword::from_ident(&text) {
            Some(keyword) => TokenKind::Keyword(keyword),
            None => TokenKind::Identifier(text),
        })
    }

    /// Scans a `[bracketed]` identifier. The bracket form exists exactly
    /// so names that collide with keywords stay usable, so the result is
    /// never keyword-matched.
    fn scan_escaped_identifier(&mut self, start: Location) -> TokenKind {
        let mut text = EcoString::new();
        while let Some(c) = self.advance_if(is_identifier_part) {
            text.push(c);
        }
        if text.is_empty() || self.advance_if(|c| c == ']').is_none() {
            self.error(LexErrorKind::UnexpectedCharacter('['), start);
            return TokenKind::Error(text);
        }
        TokenKind::Identifier(text)
    }

    // === Numbers ===

    /// Scans an integer, floating-point, or decimal literal.
    ///
    /// The literal's concrete type comes from its trailing type
    /// character (`S`/`I`/`L` for integers, `F`/`R`/`D` for reals); an
    /// unsuffixed integer picks the smallest of Integer and Long that
    /// fits. A `.` not followed by a digit is put back as a member
    /// access dot.
    fn scan_number(&mut self, first: char, start: Location) -> TokenKind {
        let mut text = String::new();
        text.push(first);
        while let Some(c) = self.advance_if(|c| c.is_ascii_digit()) {
            text.push(c);
        }

        let mut is_real = false;
        if self.peek_char() == Some('.') {
            // Only a digit after the dot makes it a fraction; otherwise
            // this is `123.member` and the dot goes back into the stream.
            let dot_location = self.here();
            let mut lookahead = self.chars.clone();
            lookahead.next();
            if lookahead.peek_is_digit() {
                self.advance();
                is_real = true;
                text.push('.');
                while let Some(c) = self.advance_if(|c| c.is_ascii_digit()) {
                    text.push(c);
                }
            } else {
                // Member access: the number ends at the dot, whatever
                // follows it (`123.Equals` must not scan an exponent).
                self.advance();
                self.pending
                    .push_back(Token::new(TokenKind::Dot, dot_location));
                return self.number_token(&text, false, None, start);
            }
        }

        if let Some(e) = self.advance_if(|c| c == 'e' || c == 'E') {
            is_real = true;
            text.push(e);
            if let Some(sign) = self.advance_if(|c| c == '+' || c == '-') {
                text.push(sign);
            }
            while let Some(c) = self.advance_if(|c| c.is_ascii_digit()) {
                text.push(c);
            }
        }

        let suffix = self.advance_if(|c| "silfrdSILFRD".contains(c));
        self.number_token(&text, is_real, suffix, start)
    }

    fn number_token(
        &mut self,
        text: &str,
        is_real: bool,
        suffix: Option<char>,
        start: Location,
    ) -> TokenKind {
        let invalid = |lexer: &mut Self| {
            lexer.error(LexErrorKind::InvalidNumber, start);
            TokenKind::Error(EcoString::from(text))
        };

        match suffix.map(|s| s.to_ascii_lowercase()) {
            Some('s' | 'i' | 'l') if is_real => invalid(self),
            Some('s') => match text.parse::<i16>() {
                Ok(v) => TokenKind::Integer {
                    value: i64::from(v),
                    kind: IntegerKind::Short,
                },
                Err(_) => invalid(self),
            },
            Some('i') => match text.parse::<i32>() {
                Ok(v) => TokenKind::Integer {
                    value: i64::from(v),
                    kind: IntegerKind::Integer,
                },
                Err(_) => invalid(self),
            },
            Some('l') => match text.parse::<i64>() {
                Ok(v) => TokenKind::Integer {
                    value: v,
                    kind: IntegerKind::Long,
                },
                Err(_) => invalid(self),
            },
            Some('f') => match text.parse::<f32>() {
                Ok(v) => TokenKind::Float {
                    value: f64::from(v),
                    kind: FloatKind::Single,
                },
                Err(_) => invalid(self),
            },
            Some('r') => match text.parse::<f64>() {
                Ok(v) => TokenKind::Float {
                    value: v,
                    kind: FloatKind::Double,
                },
                Err(_) => invalid(self),
            },
            Some('d') => match text.parse::<Decimal>() {
                Ok(v) => TokenKind::DecimalLiteral(v),
                Err(_) => invalid(self),
            },
            Some(_) | None if is_real => match text.parse::<f64>() {
                Ok(v) => TokenKind::Float {
                    value: v,
                    kind: FloatKind::Double,
                },
                Err(_) => invalid(self),
            },
            // Unsuffixed integer: smallest of Integer and Long that fits.
            Some(_) | None => match text.parse::<i32>() {
                Ok(v) => TokenKind::Integer {
                    value: i64::from(v),
                    kind: IntegerKind::Integer,
                },
                Err(_) => match text.parse::<i64>() {
                    Ok(v) => TokenKind::Integer {
                        value: v,
                        kind: IntegerKind::Long,
                    },
                    Err(_) => invalid(self),
                },
            },
        }
    }

    // === Strings, characters, dates ===

    /// Scans a string literal. A doubled `""` is an escaped quote; a
    /// trailing `c` turns the literal into a character. Reaching the end
    /// of the line inside the quotes is an error token.
    fn scan_string(&mut self, start: Location) -> TokenKind {
        let mut text = EcoString::new();
        loop {
            match self.peek_char() {
                None | Some('\n') => {
                    self.error(LexErrorKind::UnterminatedString, start);
                    return TokenKind::Error(text);
                }
                Some('"') => {
                    self.advance();
                    if self.peek_char() == Some('"') {
                        self.advance();
                        text.push('"');
                        continue;
                    }
                    break;
                }
                Some(c) => {
                    self.advance();
                    text.push(c);
                }
            }
        }

        if self.advance_if(|c| c == 'c' || c == 'C').is_some() {
            let mut chars = text.chars();
            return match (chars.next(), chars.next()) {
                (Some(c), None) => TokenKind::CharLiteral(c),
                _ => {
                    self.error(LexErrorKind::InvalidCharacterLiteral, start);
                    TokenKind::Error(text)
                }
            };
        }
        TokenKind::StringLiteral(text)
    }

    /// Scans a `#...#` date literal.
    ///
    /// The content is matched against the culture-invariant
    /// `M/d/yyyy [h:mm[:ss]] [AM|PM]` pattern. A malformed date reports
    /// through the error list but still yields a zero-date token, so
    /// parsing continues with a well-formed stream.
    fn scan_date(&mut self, start: Location) -> TokenKind {
        let mut text = String::new();
        loop {
            match self.peek_char() {
                None | Some('\n') => {
                    self.error(LexErrorKind::UnterminatedString, start);
                    return TokenKind::Error(EcoString::from(text));
                }
                Some('#') => {
                    self.advance();
                    break;
                }
                Some(c) => {
                    self.advance();
                    text.push(c);
                }
            }
        }
        match parse_date(&text) {
            Some(date) => TokenKind::DateLiteral(date),
            None => {
                self.error(LexErrorKind::MalformedDate, start);
                TokenKind::DateLiteral(DateValue::ZERO)
            }
        }
    }

    // === Operators ===

    fn scan_operator(&mut self, first: char) -> Option<TokenKind> {
        let followed_by_equals = |lexer: &mut Self| lexer.advance_if(|c| c == '=').is_some();
        Some(match first {
            '+' => {
                if followed_by_equals(self) {
                    TokenKind::PlusEquals
                } else {
                    TokenKind::Plus
                }
            }
            '-' => {
                if followed_by_equals(self) {
                    TokenKind::MinusEquals
                } else {
                    TokenKind::Minus
                }
            }
            '*' => {
                if followed_by_equals(self) {
                    TokenKind::StarEquals
                } else {
                    TokenKind::Star
                }
            }
            '/' => {
                if followed_by_equals(self) {
                    TokenKind::SlashEquals
                } else {
                    TokenKind::Slash
                }
            }
            '\\' => {
                if followed_by_equals(self) {
                    TokenKind::BackslashEquals
                } else {
                    TokenKind::Backslash
                }
            }
            '^' => {
                if followed_by_equals(self) {
                    TokenKind::CaretEquals
                } else {
                    TokenKind::Caret
                }
            }
            '&' => {
                if followed_by_equals(self) {
                    TokenKind::AmpersandEquals
                } else {
                    TokenKind::Ampersand
                }
            }
            '=' => TokenKind::Equals,
            '<' => match self.peek_char() {
                Some('>') => {
                    self.advance();
                    TokenKind::NotEquals
                }
                Some('=') => {
                    self.advance();
                    TokenKind::LessEquals
                }
                Some('<') => {
                    self.advance();
                    TokenKind::ShiftLeft
                }
                _ => TokenKind::Less,
            },
            '>' => match self.peek_char() {
                Some('=') => {
                    self.advance();
                    TokenKind::GreaterEquals
                }
                Some('>') => {
                    self.advance();
                    TokenKind::ShiftRight
                }
                _ => TokenKind::Greater,
            },
            ':' => {
                if followed_by_equals(self) {
                    TokenKind::ColonEquals
                } else {
                    TokenKind::Colon
                }
            }
            '.' => TokenKind::Dot,
            ',' => TokenKind::Comma,
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '{' => TokenKind::LeftBrace,
            '}' => TokenKind::RightBrace,
            _ => return None,
        })
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    /// Yields tokens up to, but not including, end-of-file.
    fn next(&mut self) -> Option<Token> {
        if self.reached_eof {
            return None;
        }
        let token = self.next_token();
        if token.kind().is_eof() {
            return None;
        }
        Some(token)
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_identifier_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Extension used for the fraction lookahead in [`Lexer::scan_number`].
trait PeekIsDigit {
    fn peek_is_digit(&mut self) -> bool;
}

impl PeekIsDigit for Peekable<Chars<'_>> {
    fn peek_is_digit(&mut self) -> bool {
        self.peek().is_some_and(char::is_ascii_digit)
    }
}

/// Parses the culture-invariant date pattern `M/d/yyyy [h:mm[:ss]] [AM|PM]`.
fn parse_date(text: &str) -> Option<DateValue> {
    let mut parts = text.split_whitespace();
    let date_part = parts.next()?;

    let mut fields = date_part.split('/');
    let month: u8 = fields.next()?.parse().ok()?;
    let day: u8 = fields.next()?.parse().ok()?;
    let year: u16 = fields.next()?.parse().ok()?;
    if fields.next().is_some() {
        return None;
    }
    if !(1..=9999).contains(&year) || !(1..=12).contains(&month) {
        return None;
    }
    if day < 1 || day > days_in_month(year, month) {
        return None;
    }

    let mut date = DateValue {
        year,
        month,
        day,
        hour: 0,
        minute: 0,
        second: 0,
    };

    let Some(time_part) = parts.next() else {
        return Some(date);
    };
    let mut fields = time_part.split(':');
    let mut hour: u8 = fields.next()?.parse().ok()?;
    date.minute = fields.next()?.parse().ok()?;
    if let Some(seconds) = fields.next() {
        date.second = seconds.parse().ok()?;
    }
    if fields.next().is_some() || date.minute > 59 || date.second > 59 {
        return None;
    }

    match parts.next() {
        Some(meridiem) if meridiem.eq_ignore_ascii_case("am") => {
            if !(1..=12).contains(&hour) {
                return None;
            }
            if hour == 12 {
                hour = 0;
            }
        }
        Some(meridiem) if meridiem.eq_ignore_ascii_case("pm") => {
            if !(1..=12).contains(&hour) {
                return None;
            }
            if hour != 12 {
                hour += 12;
            }
        }
        Some(_) => return None,
        None => {
            if hour > 23 {
                return None;
            }
        }
    }
    if parts.next().is_some() {
        return None;
    }
    date.hour = hour;
    Some(date)
}

fn days_in_month(year: u16, month: u8) -> u8 {
    match month {
        4 | 6 | 9 | 11 => 30,
        2 => {
            let leap = year % 4 == 0 && (year % 100 != 0 || year % 400 == 0);
            if leap { 29 } else { 28 }
        }
        _ => 31,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_clean(source: &str) -> Vec<TokenKind> {
        let (tokens, errors) = lex(source, 1);
        assert!(errors.is_empty(), "unexpected lex errors: {errors:?}");
        tokens.into_iter().map(Token::into_kind).collect()
    }

    #[test]
    fn keywords_are_case_insensitive() {
        let kinds = assert_clean("DIM dim DiM");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Keyword(Keyword::Dim),
                TokenKind::Keyword(Keyword::Dim),
                TokenKind::Keyword(Keyword::Dim),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn escaped_identifier_is_never_a_keyword() {
        let kinds = assert_clean("[End]");
        assert_eq!(
            kinds,
            vec![TokenKind::Identifier("End".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn unsuffixed_integer_picks_smallest_fit() {
        let kinds = assert_clean("42 3000000000");
        assert_eq!(
            kinds[0],
            TokenKind::Integer {
                value: 42,
                kind: IntegerKind::Integer
            }
        );
        assert_eq!(
            kinds[1],
            TokenKind::Integer {
                value: 3_000_000_000,
                kind: IntegerKind::Long
            }
        );
    }

    #[test]
    fn integer_suffixes_select_type() {
        let kinds = assert_clean("1S 2I 3L");
        assert_eq!(
            kinds[0],
            TokenKind::Integer {
                value: 1,
                kind: IntegerKind::Short
            }
        );
        assert_eq!(
            kinds[1],
            TokenKind::Integer {
                value: 2,
                kind: IntegerKind::Integer
            }
        );
        assert_eq!(
            kinds[2],
            TokenKind::Integer {
                value: 3,
                kind: IntegerKind::Long
            }
        );
    }

    #[test]
    fn short_suffix_overflow_is_an_error_token() {
        let (tokens, errors) = lex("40000S", 1);
        assert!(matches!(tokens[0].kind(), TokenKind::Error(_)));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, LexErrorKind::InvalidNumber);
    }

    #[test]
    fn float_suffixes_select_type() {
        let kinds = assert_clean("1.5F 1.5R 1.5 2.5e3");
        assert_eq!(
            kinds[0],
            TokenKind::Float {
                value: 1.5,
                kind: FloatKind::Single
            }
        );
        assert_eq!(
            kinds[1],
            TokenKind::Float {
                value: 1.5,
                kind: FloatKind::Double
            }
        );
        assert_eq!(
            kinds[2],
            TokenKind::Float {
                value: 1.5,
                kind: FloatKind::Double
            }
        );
        assert_eq!(
            kinds[3],
            TokenKind::Float {
                value: 2500.0,
                kind: FloatKind::Double
            }
        );
    }

    #[test]
    fn decimal_suffix_uses_decimal_payload() {
        let kinds = assert_clean("1.5D");
        assert_eq!(
            kinds[0],
            TokenKind::DecimalLiteral(Decimal::new(15, 1)),
        );
    }

    #[test]
    fn integer_suffix_on_fraction_is_an_error() {
        let (tokens, errors) = lex("1.5L", 1);
        assert!(matches!(tokens[0].kind(), TokenKind::Error(_)));
        assert_eq!(errors[0].kind, LexErrorKind::InvalidNumber);
    }

    #[test]
    fn trailing_dot_puts_back_member_access() {
        let kinds = assert_clean("123.ToString");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Integer {
                    value: 123,
                    kind: IntegerKind::Integer
                },
                TokenKind::Dot,
                TokenKind::Identifier("ToString".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn doubled_quote_escapes_inside_string() {
        let kinds = assert_clean("\"say \"\"hi\"\"\"");
        assert_eq!(kinds[0], TokenKind::StringLiteral("say \"hi\"".into()));
    }

    #[test]
    fn char_suffix_makes_character_literal() {
        let kinds = assert_clean("\"a\"c \"Z\"C");
        assert_eq!(kinds[0], TokenKind::CharLiteral('a'));
        assert_eq!(kinds[1], TokenKind::CharLiteral('Z'));
    }

    #[test]
    fn multi_char_char_literal_is_an_error() {
        let (_, errors) = lex("\"ab\"c", 1);
        assert_eq!(errors[0].kind, LexErrorKind::InvalidCharacterLiteral);
    }

    #[test]
    fn unterminated_string_recovers() {
        let (tokens, errors) = lex("\"oops\nDim x", 1);
        assert!(matches!(tokens[0].kind(), TokenKind::Error(_)));
        assert_eq!(errors[0].kind, LexErrorKind::UnterminatedString);
        // Scanning continued on the next line.
        assert!(tokens.iter().any(|t| t.kind().is_keyword(Keyword::Dim)));
    }

    #[test]
    fn date_literal_parses_invariant_pattern() {
        let kinds = assert_clean("#8/5/2026#");
        assert_eq!(
            kinds[0],
            TokenKind::DateLiteral(DateValue {
                year: 2026,
                month: 8,
                day: 5,
                hour: 0,
                minute: 0,
                second: 0,
            })
        );
    }

    #[test]
    fn date_literal_with_time_and_meridiem() {
        let kinds = assert_clean("#8/5/2026 10:30:00 PM#");
        assert_eq!(
            kinds[0],
            TokenKind::DateLiteral(DateValue {
                year: 2026,
                month: 8,
                day: 5,
                hour: 22,
                minute: 30,
                second: 0,
            })
        );
        let kinds = assert_clean("#1/1/2000 12:00 AM#");
        assert_eq!(
            kinds[0],
            TokenKind::DateLiteral(DateValue {
                year: 2000,
                month: 1,
                day: 1,
                hour: 0,
                minute: 0,
                second: 0,
            })
        );
    }

    #[test]
    fn malformed_date_reports_and_yields_zero_date() {
        let (tokens, errors) = lex("#13/45/99999#", 1);
        assert_eq!(tokens[0].kind(), &TokenKind::DateLiteral(DateValue::ZERO));
        assert_eq!(errors[0].kind, LexErrorKind::MalformedDate);
    }

    #[test]
    fn february_day_range_respects_leap_years() {
        assert_clean("#2/29/2024#");
        let (_, errors) = lex("#2/29/2023#", 1);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn consecutive_line_ends_collapse() {
        let kinds = assert_clean("a\n\n\nb");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Identifier("a".into()),
                TokenKind::Eol,
                TokenKind::Identifier("b".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn leading_blank_lines_produce_no_tokens() {
        let kinds = assert_clean("\n\nDim");
        assert_eq!(
            kinds,
            vec![TokenKind::Keyword(Keyword::Dim), TokenKind::Eof]
        );
    }

    #[test]
    fn comment_still_yields_the_line_end() {
        let kinds = assert_clean("a ' trailing words\nb");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Identifier("a".into()),
                TokenKind::Eol,
                TokenKind::Identifier("b".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn rem_comments_out_the_rest_of_the_line() {
        let kinds = assert_clean("a Rem whatever Dim x\nb");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Identifier("a".into()),
                TokenKind::Eol,
                TokenKind::Identifier("b".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn line_continuation_elides_the_separator() {
        let kinds = assert_clean("a _\n+ b");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Identifier("a".into()),
                TokenKind::Plus,
                TokenKind::Identifier("b".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn underscore_not_at_line_end_is_an_identifier() {
        let kinds = assert_clean("_x");
        assert_eq!(kinds[0], TokenKind::Identifier("_x".into()));
    }

    #[test]
    fn multi_character_operators() {
        let kinds = assert_clean("<> <= >= << >> += &= := \\=");
        assert_eq!(
            kinds,
            vec![
                TokenKind::NotEquals,
                TokenKind::LessEquals,
                TokenKind::GreaterEquals,
                TokenKind::ShiftLeft,
                TokenKind::ShiftRight,
                TokenKind::PlusEquals,
                TokenKind::AmpersandEquals,
                TokenKind::ColonEquals,
                TokenKind::BackslashEquals,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn unknown_character_recovers_with_error_token() {
        let (tokens, errors) = lex("a § b", 1);
        assert!(matches!(tokens[1].kind(), TokenKind::Error(_)));
        assert_eq!(errors[0].kind, LexErrorKind::UnexpectedCharacter('§'));
        assert_eq!(tokens[2].kind(), &TokenKind::Identifier("b".into()));
    }

    #[test]
    fn every_token_carries_its_location() {
        let (tokens, _) = lex("Dim x\n  y", 1);
        assert_eq!(tokens[0].location(), Location::new(1, 1, 1));
        assert_eq!(tokens[1].location(), Location::new(1, 1, 5));
        assert_eq!(tokens[2].location(), Location::new(1, 1, 6)); // EOL
        assert_eq!(tokens[3].location(), Location::new(1, 2, 3));
    }

    #[test]
    fn iterator_stops_before_eof() {
        let tokens: Vec<_> = Lexer::new("a + b", 1).collect();
        assert_eq!(tokens.len(), 3);
    }
}
