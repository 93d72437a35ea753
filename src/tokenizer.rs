use crate::error::{LessError, LessResult};
use crate::token::{SourceLocation, Token, TokenKind};

/// 把 LESS 源码切成 token 流。
///
/// 行注释直接丢弃；块注释保留为单个 token，便于上层输出 CSS 注释。
/// 连续空白压缩为一个空白 token。
pub fn tokenize(source: &str) -> LessResult<Vec<Token>> {
    Tokenizer::new(source).run()
}

struct Tokenizer {
    chars: Vec<char>,
    position: usize,
    line: u32,
    column: u32,
    tokens: Vec<Token>,
}

impl Tokenizer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> LessResult<Vec<Token>> {
        while let Some(ch) = self.peek() {
            let location = self.location();
            match ch {
                c if c.is_whitespace() => self.read_whitespace(location),
                '/' if self.peek_at(1) == Some('/') => self.skip_line_comment(),
                '/' if self.peek_at(1) == Some('*') => self.read_block_comment(location)?,
                '"' | '\'' => self.read_string(location)?,
                '@' => self.read_at_keyword(location)?,
                '#' => self.read_hash(location),
                c if c.is_ascii_digit() => self.read_number(location),
                '.' if self.peek_at(1).map_or(false, |c| c.is_ascii_digit()) => {
                    self.read_number(location)
                }
                '+' | '-'
                    if self.number_sign_allowed()
                        && self
                            .peek_at(1)
                            .map_or(false, |c| c.is_ascii_digit() || c == '.') =>
                {
                    self.read_number(location)
                }
                c if is_identifier_start(c, self.peek_at(1)) => self.read_identifier(location),
                ':' => self.push_simple(TokenKind::Colon, location),
                ',' => self.push_simple(TokenKind::Comma, location),
                '(' => self.push_simple(TokenKind::ParenOpen, location),
                ')' => self.push_simple(TokenKind::ParenClosed, location),
                '{' => self.push_simple(TokenKind::BraceOpen, location),
                '}' => self.push_simple(TokenKind::BraceClosed, location),
                '[' => self.push_simple(TokenKind::BracketOpen, location),
                ']' => self.push_simple(TokenKind::BracketClosed, location),
                '>' | '<' | '=' => self.read_comparison(location),
                _ => self.push_simple(TokenKind::Other, location),
            }
        }
        Ok(self.tokens)
    }

    fn location(&self) -> SourceLocation {
        SourceLocation::new(self.line, self.column)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.position).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.position + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.position += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    /// 符号只有在前一个有效 token 不是操作数时才归入数字字面量，
    /// 这样 `2 -1` 仍然是减法而 `margin: -4px` 是负数。
    fn number_sign_allowed(&self) -> bool {
        for token in self.tokens.iter().rev() {
            if token.is_whitespace() {
                continue;
            }
            return !matches!(
                token.kind,
                TokenKind::Number
                    | TokenKind::Dimension
                    | TokenKind::Percentage
                    | TokenKind::Identifier
                    | TokenKind::Hash
                    | TokenKind::AtKeyword
                    | TokenKind::Url
                    | TokenKind::String
                    | TokenKind::ParenClosed
            );
        }
        true
    }

    fn push_simple(&mut self, kind: TokenKind, location: SourceLocation) {
        let ch = self.advance().unwrap_or_default();
        self.tokens.push(Token::new(ch.to_string(), kind, location));
    }

    fn read_whitespace(&mut self, location: SourceLocation) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.advance();
        }
        self.tokens
            .push(Token::new(" ", TokenKind::Whitespace, location));
    }

    fn skip_line_comment(&mut self) {
        while let Some(ch) = self.advance() {
            if ch == '\n' {
                break;
            }
        }
    }

    fn read_block_comment(&mut self, location: SourceLocation) -> LessResult<()> {
        let mut text = String::new();
        text.push(self.advance().unwrap());
        text.push(self.advance().unwrap());
        loop {
            match self.advance() {
                Some('*') if self.peek() == Some('/') => {
                    text.push('*');
                    text.push(self.advance().unwrap());
                    break;
                }
                Some(ch) => text.push(ch),
                None => return Err(LessError::lex("块注释未闭合", location)),
            }
        }
        self.tokens.push(Token::new(text, TokenKind::Other, location));
        Ok(())
    }

    fn read_string(&mut self, location: SourceLocation) -> LessResult<()> {
        let quote = self.advance().unwrap();
        let mut text = String::new();
        text.push(quote);
        loop {
            match self.advance() {
                Some('\\') => {
                    text.push('\\');
                    match self.advance() {
                        Some(escaped) => text.push(escaped),
                        None => return Err(LessError::lex("字符串转义未结束", location)),
                    }
                }
                Some(ch) if ch == quote => {
                    text.push(ch);
                    break;
                }
                Some('\n') | None => {
                    return Err(LessError::lex("字符串未闭合", location));
                }
                Some(ch) => text.push(ch),
            }
        }
        self.tokens
            .push(Token::new(text, TokenKind::String, location));
        Ok(())
    }

    /// `@name` 普通变量；`@{name}` 插值引用，整体作为一个 token。
    fn read_at_keyword(&mut self, location: SourceLocation) -> LessResult<()> {
        let mut text = String::new();
        text.push(self.advance().unwrap());
        if self.peek() == Some('{') {
            text.push(self.advance().unwrap());
            loop {
                match self.advance() {
                    Some('}') => {
                        text.push('}');
                        break;
                    }
                    Some(ch) if ch.is_alphanumeric() || ch == '-' || ch == '_' => text.push(ch),
                    _ => return Err(LessError::lex("插值变量名不合法", location)),
                }
            }
            if text.len() <= 3 {
                return Err(LessError::lex("插值缺少变量名", location));
            }
            self.tokens
                .push(Token::new(text, TokenKind::AtKeyword, location));
            return Ok(());
        }
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '-' || c == '_') {
            text.push(self.advance().unwrap());
        }
        let kind = if text.len() > 1 {
            TokenKind::AtKeyword
        } else {
            TokenKind::Other
        };
        self.tokens.push(Token::new(text, kind, location));
        Ok(())
    }

    fn read_hash(&mut self, location: SourceLocation) {
        let mut text = String::new();
        text.push(self.advance().unwrap());
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '-' || c == '_') {
            text.push(self.advance().unwrap());
        }
        let kind = if text.len() > 1 {
            TokenKind::Hash
        } else {
            TokenKind::Other
        };
        self.tokens.push(Token::new(text, kind, location));
    }

    fn read_number(&mut self, location: SourceLocation) {
        let mut text = String::new();
        if matches!(self.peek(), Some('+') | Some('-')) {
            text.push(self.advance().unwrap());
        }
        let mut saw_dot = false;
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                text.push(self.advance().unwrap());
            } else if ch == '.' && !saw_dot && self.peek_at(1).map_or(false, |c| c.is_ascii_digit())
            {
                saw_dot = true;
                text.push(self.advance().unwrap());
            } else {
                break;
            }
        }

        if self.peek() == Some('%') {
            text.push(self.advance().unwrap());
            self.tokens
                .push(Token::new(text, TokenKind::Percentage, location));
            return;
        }

        let mut unit = String::new();
        while matches!(self.peek(), Some(c) if c.is_ascii_alphabetic()) {
            unit.push(self.advance().unwrap());
        }
        if unit.is_empty() {
            self.tokens
                .push(Token::new(text, TokenKind::Number, location));
        } else {
            text.push_str(&unit);
            self.tokens
                .push(Token::new(text, TokenKind::Dimension, location));
        }
    }

    fn read_identifier(&mut self, location: SourceLocation) {
        let mut text = String::new();
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '-' || c == '_') {
            text.push(self.advance().unwrap());
        }

        // url(...) 作为单个不透明 token，内部不再切分。
        if text.eq_ignore_ascii_case("url") && self.peek() == Some('(') {
            text.push(self.advance().unwrap());
            let mut depth = 1usize;
            while let Some(ch) = self.advance() {
                text.push(ch);
                match ch {
                    '(' => depth += 1,
                    ')' => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    _ => {}
                }
            }
            self.tokens.push(Token::new(text, TokenKind::Url, location));
            return;
        }

        self.tokens
            .push(Token::new(text, TokenKind::Identifier, location));
    }

    /// `>=` `<=` `=<` 作为一个 token，便于守卫条件求值。
    fn read_comparison(&mut self, location: SourceLocation) {
        let first = self.advance().unwrap();
        let mut text = first.to_string();
        match (first, self.peek()) {
            ('>', Some('=')) | ('<', Some('=')) | ('=', Some('<')) => {
                text.push(self.advance().unwrap());
            }
            _ => {}
        }
        self.tokens.push(Token::new(text, TokenKind::Other, location));
    }
}

fn is_identifier_start(ch: char, next: Option<char>) -> bool {
    if ch.is_alphabetic() || ch == '_' {
        return true;
    }
    ch == '-' && matches!(next, Some(c) if c.is_alphabetic() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn basic_declaration_tokens() {
        let tokens = tokenize("color: #fff;").unwrap();
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["color", ":", " ", "#fff", ";"]);
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
        assert_eq!(tokens[3].kind, TokenKind::Hash);
    }

    #[test]
    fn numbers_dimensions_percentages() {
        assert_eq!(
            kinds("10 10px 50% .5em"),
            vec![
                TokenKind::Number,
                TokenKind::Whitespace,
                TokenKind::Dimension,
                TokenKind::Whitespace,
                TokenKind::Percentage,
                TokenKind::Whitespace,
                TokenKind::Dimension,
            ]
        );
    }

    #[test]
    fn negative_numbers_depend_on_context() {
        let tokens = tokenize("margin: -4px").unwrap();
        assert!(tokens.iter().any(|t| t.text == "-4px"));

        let tokens = tokenize("2 - 1").unwrap();
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["2", " ", "-", " ", "1"]);
    }

    #[test]
    fn at_keywords_and_interpolation() {
        let tokens = tokenize("@base @{name}").unwrap();
        assert_eq!(tokens[0].text, "@base");
        assert_eq!(tokens[0].kind, TokenKind::AtKeyword);
        assert_eq!(tokens[2].text, "@{name}");
        assert_eq!(tokens[2].kind, TokenKind::AtKeyword);
    }

    #[test]
    fn url_is_one_token() {
        let tokens = tokenize("src: url(/a/b.woff2) format('woff2');").unwrap();
        assert!(tokens
            .iter()
            .any(|t| t.kind == TokenKind::Url && t.text == "url(/a/b.woff2)"));
    }

    #[test]
    fn unterminated_string_is_a_lex_error() {
        assert!(tokenize("content: \"oops").is_err());
    }

    #[test]
    fn line_comment_dropped_block_comment_kept() {
        let tokens = tokenize("// note\n/* keep */a").unwrap();
        assert!(tokens.iter().any(|t| t.text == "/* keep */"));
        assert!(!tokens.iter().any(|t| t.text.contains("note")));
    }

    #[test]
    fn locations_track_lines_and_columns() {
        let tokens = tokenize("a\n  b").unwrap();
        let b = tokens.iter().find(|t| t.text == "b").unwrap();
        assert_eq!(b.location.line, 2);
        assert_eq!(b.location.column, 3);
    }
}
