use crate::ast::*;
use crate::error::{LessError, LessResult};
use crate::token::{SourceLocation, Token, TokenKind, TokenList};
use crate::tokenizer::tokenize;

/// LESS 解析器：token 流进，AST 出。
///
/// 语句分类沿用"先向前探测再提交"的方式，探测通过克隆游标完成。
pub struct LessParser;

impl LessParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, input: &str) -> LessResult<Stylesheet> {
        let tokens = tokenize(input)?;
        let mut cursor = Cursor::new(tokens);
        let mut statements = Vec::new();

        loop {
            cursor.skip_whitespace();
            if cursor.is_eof() {
                break;
            }
            statements.push(self.parse_statement(&mut cursor)?);
        }

        Ok(Stylesheet::new(statements))
    }

    fn parse_statement(&self, cursor: &mut Cursor) -> LessResult<Statement> {
        cursor.skip_whitespace();

        if let Some(token) = cursor.peek() {
            if is_comment(token) {
                let text = token.text.clone();
                cursor.advance();
                return Ok(Statement::Comment(text));
            }
        }

        if cursor.lookahead_is_extend_statement() {
            return self.parse_extend_statement(cursor);
        }

        if let Some(token) = cursor.peek() {
            if token.kind == TokenKind::AtKeyword && !token.text.starts_with("@{") {
                let keyword = token.text[1..].to_ascii_lowercase();
                if keyword == "import" {
                    return Ok(Statement::Import(self.parse_import(cursor)?));
                }
                if keyword == "media" || keyword == "supports" {
                    return Ok(Statement::Media(self.parse_media(cursor, keyword)?));
                }
                if cursor.lookahead_is_variable_decl() {
                    return Ok(Statement::Variable(self.parse_variable(cursor)?));
                }
                if cursor.lookahead_is_detached_call() {
                    return Ok(Statement::DetachedCall(self.parse_detached_call(cursor)?));
                }
                if cursor.lookahead_is_block_at_rule() {
                    return Ok(Statement::AtRule(self.parse_block_at_rule(cursor)?));
                }
                return Ok(Statement::AtRule(self.parse_plain_at_rule(cursor)?));
            }
        }

        if cursor.lookahead_is_mixin_definition() {
            return Ok(Statement::MixinDefinition(
                self.parse_mixin_definition(cursor)?,
            ));
        }

        if cursor.lookahead_is_mixin_call() {
            return Ok(Statement::MixinCall(self.parse_mixin_call(cursor)?));
        }

        match cursor.detect_body_kind() {
            Some(BodyKind::Declaration) => {
                Ok(Statement::Declaration(self.parse_declaration(cursor)?))
            }
            Some(BodyKind::NestedRule) => Ok(Statement::Ruleset(self.parse_ruleset(cursor)?)),
            None => Err(LessError::parse(
                "无法判断声明或子选择器",
                cursor.location(),
            )),
        }
    }

    fn parse_variable(&self, cursor: &mut Cursor) -> LessResult<VariableDeclaration> {
        let token = cursor.expect_kind(TokenKind::AtKeyword)?;
        let name = token.text[1..].to_string();
        cursor.skip_whitespace();
        cursor.expect_kind(TokenKind::Colon)?;
        cursor.skip_whitespace();

        if matches!(cursor.peek(), Some(t) if t.kind == TokenKind::BraceOpen) {
            cursor.advance();
            let body = self.parse_block_statements(cursor)?;
            cursor.skip_whitespace();
            cursor.consume_delim(";");
            return Ok(VariableDeclaration {
                name,
                value: VariableValue::Ruleset(body),
            });
        }

        let value = self.read_value_tokens(cursor)?;
        cursor.consume_delim(";");
        Ok(VariableDeclaration {
            name,
            value: VariableValue::Tokens(value),
        })
    }

    /// 读取值 token 直到顶层的 `;` 或 `}`，括号内的分号不终止。
    fn read_value_tokens(&self, cursor: &mut Cursor) -> LessResult<TokenList> {
        let mut value = TokenList::new();
        let mut depth = 0usize;
        while let Some(token) = cursor.peek() {
            match token.kind {
                TokenKind::ParenOpen | TokenKind::BracketOpen => depth += 1,
                TokenKind::ParenClosed | TokenKind::BracketClosed => {
                    depth = depth.saturating_sub(1)
                }
                TokenKind::BraceClosed if depth == 0 => break,
                TokenKind::Other if depth == 0 && token.text == ";" => break,
                _ => {}
            }
            value.push(cursor.advance().unwrap());
        }
        Ok(value.trimmed())
    }

    fn parse_declaration(&self, cursor: &mut Cursor) -> LessResult<Declaration> {
        let mut name = String::new();
        while let Some(token) = cursor.peek() {
            if matches!(token.kind, TokenKind::Colon | TokenKind::BraceOpen) {
                break;
            }
            if token.kind == TokenKind::Other && token.text == ";" {
                break;
            }
            name.push_str(&token.text);
            cursor.advance();
        }
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(LessError::parse("属性名不能为空", cursor.location()));
        }
        cursor.expect_kind(TokenKind::Colon)?;
        cursor.skip_whitespace();
        let mut value = self.read_value_tokens(cursor)?;
        cursor.consume_delim(";");

        let important = strip_important(&mut value);
        Ok(Declaration {
            name,
            value,
            important,
        })
    }

    fn parse_ruleset(&self, cursor: &mut Cursor) -> LessResult<Ruleset> {
        let selector_tokens = self.read_selector_tokens(cursor)?;
        if selector_tokens.is_empty() {
            return Err(LessError::parse("缺少合法的选择器", cursor.location()));
        }
        cursor.expect_kind(TokenKind::BraceOpen)?;
        let body = self.parse_block_statements(cursor)?;
        Ok(Ruleset {
            selector: Selector::new(selector_tokens),
            body,
            reference: false,
        })
    }

    /// 读取选择器 token 直到块开始，注释被丢弃，括号配对内的 `{` 不会误判。
    fn read_selector_tokens(&self, cursor: &mut Cursor) -> LessResult<TokenList> {
        let mut tokens = TokenList::new();
        let mut depth = 0usize;
        while let Some(token) = cursor.peek() {
            match token.kind {
                TokenKind::ParenOpen | TokenKind::BracketOpen => depth += 1,
                TokenKind::ParenClosed | TokenKind::BracketClosed => {
                    depth = depth.saturating_sub(1)
                }
                TokenKind::BraceOpen if depth == 0 => break,
                _ => {}
            }
            let token = cursor.advance().unwrap();
            if !is_comment(&token) {
                tokens.push(token);
            }
        }
        if !matches!(cursor.peek(), Some(t) if t.kind == TokenKind::BraceOpen) {
            return Err(LessError::parse("期待 '{'", cursor.location()));
        }
        Ok(tokens.trimmed())
    }

    fn parse_block_statements(&self, cursor: &mut Cursor) -> LessResult<Vec<Statement>> {
        let mut body = Vec::new();
        loop {
            cursor.skip_whitespace();
            match cursor.peek() {
                Some(t) if t.kind == TokenKind::BraceClosed => {
                    cursor.advance();
                    break;
                }
                None => {
                    return Err(LessError::parse("缺少匹配的 '}'", cursor.location()));
                }
                _ => body.push(self.parse_statement(cursor)?),
            }
        }
        Ok(body)
    }

    fn parse_media(&self, cursor: &mut Cursor, name: String) -> LessResult<MediaQuery> {
        cursor.expect_kind(TokenKind::AtKeyword)?;
        let query = self.read_selector_tokens(cursor)?;
        cursor.expect_kind(TokenKind::BraceOpen)?;
        let body = self.parse_block_statements(cursor)?;
        Ok(MediaQuery { name, query, body })
    }

    fn parse_block_at_rule(&self, cursor: &mut Cursor) -> LessResult<AtRule> {
        let token = cursor.expect_kind(TokenKind::AtKeyword)?;
        let name = token.text[1..].to_string();
        let prelude = self.read_selector_tokens(cursor)?;
        cursor.expect_kind(TokenKind::BraceOpen)?;
        let body = self.parse_block_statements(cursor)?;
        Ok(AtRule {
            name,
            prelude,
            body: Some(body),
        })
    }

    fn parse_plain_at_rule(&self, cursor: &mut Cursor) -> LessResult<AtRule> {
        let token = cursor.expect_kind(TokenKind::AtKeyword)?;
        let name = token.text[1..].to_string();
        let prelude = self.read_value_tokens(cursor)?;
        cursor.consume_delim(";");
        Ok(AtRule {
            name,
            prelude,
            body: None,
        })
    }

    fn parse_import(&self, cursor: &mut Cursor) -> LessResult<ImportStatement> {
        cursor.expect_kind(TokenKind::AtKeyword)?;
        cursor.skip_whitespace();

        let mut options = Vec::new();
        if matches!(cursor.peek(), Some(t) if t.kind == TokenKind::ParenOpen) {
            cursor.advance();
            while let Some(token) = cursor.peek() {
                if token.kind == TokenKind::ParenClosed {
                    cursor.advance();
                    break;
                }
                if token.kind == TokenKind::Identifier {
                    options.push(token.text.to_ascii_lowercase());
                }
                cursor.advance();
            }
            cursor.skip_whitespace();
        }

        let spec = self.read_value_tokens(cursor)?;
        if !cursor.consume_delim(";") {
            return Err(LessError::parse("@import 缺少 ';'", cursor.location()));
        }

        let trimmed = spec.stringify().trim().to_string();
        let path = extract_import_path(&trimmed);
        let reference = options.iter().any(|opt| opt == "reference");
        let mut is_css = options.iter().any(|opt| opt == "css");
        if !is_css {
            match &path {
                Some(target) => {
                    if target.ends_with(".css") {
                        is_css = true;
                    }
                }
                // 无法解析路径时默认视为 CSS 导入
                None => is_css = true,
            }
        }

        let raw = format!("@import {trimmed};");
        Ok(ImportStatement {
            raw,
            path,
            is_css,
            reference,
        })
    }

    fn parse_detached_call(&self, cursor: &mut Cursor) -> LessResult<DetachedCall> {
        let token = cursor.expect_kind(TokenKind::AtKeyword)?;
        let location = token.location.clone();
        let name = token.text[1..].to_string();
        cursor.skip_whitespace();
        cursor.expect_kind(TokenKind::ParenOpen)?;
        cursor.skip_whitespace();
        cursor.expect_kind(TokenKind::ParenClosed)?;
        cursor.skip_whitespace();
        cursor.consume_delim(";");
        Ok(DetachedCall { name, location })
    }

    fn parse_extend_statement(&self, cursor: &mut Cursor) -> LessResult<Statement> {
        // `&` `:` `extend` `(`
        cursor.advance();
        cursor.advance();
        cursor.advance();
        cursor.expect_kind(TokenKind::ParenOpen)?;

        let mut inner = TokenList::new();
        let mut depth = 1usize;
        while let Some(token) = cursor.advance() {
            match token.kind {
                TokenKind::ParenOpen => depth += 1,
                TokenKind::ParenClosed => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
            inner.push(token);
        }
        cursor.skip_whitespace();
        cursor.consume_delim(";");

        let targets = inner
            .split(|t| t.kind == TokenKind::Comma)
            .into_iter()
            .filter(|part| !part.is_empty())
            .map(parse_extend_target)
            .collect();
        Ok(Statement::Extend(ExtendStatement { targets }))
    }

    fn parse_mixin_definition(&self, cursor: &mut Cursor) -> LessResult<MixinDefinition> {
        let name = cursor.read_mixin_name()?;
        cursor.skip_whitespace();

        let delimiter = cursor.argument_delimiter();
        cursor.expect_kind(TokenKind::ParenOpen)?;

        let mut params = Vec::new();
        let mut rest = None;
        let mut unlimited = false;
        loop {
            cursor.skip_whitespace();
            match cursor.peek() {
                Some(t) if t.kind == TokenKind::ParenClosed => {
                    cursor.advance();
                    break;
                }
                Some(t) if t.kind == TokenKind::AtKeyword => {
                    let param = cursor.advance().unwrap();
                    let param_name = param.text[1..].to_string();
                    cursor.skip_whitespace();
                    if matches!(cursor.peek(), Some(t) if t.kind == TokenKind::Colon) {
                        cursor.advance();
                        cursor.skip_whitespace();
                        let default = self.read_argument_tokens(cursor, &delimiter)?;
                        if default.is_empty() {
                            return Err(LessError::parse(
                                "':' 之后缺少默认值",
                                cursor.location(),
                            ));
                        }
                        params.push(MixinParam::Named {
                            name: param_name,
                            default: Some(default),
                        });
                    } else if cursor.consume_ellipsis() {
                        rest = Some(param_name);
                        unlimited = true;
                    } else {
                        params.push(MixinParam::Named {
                            name: param_name,
                            default: None,
                        });
                    }
                }
                Some(t) if t.is_delim(".") => {
                    if cursor.consume_ellipsis() {
                        unlimited = true;
                    } else {
                        return Err(LessError::parse("mixin 参数不合法", cursor.location()));
                    }
                }
                Some(_) => {
                    let literal = cursor.advance().unwrap();
                    params.push(MixinParam::Pattern(literal));
                }
                None => {
                    return Err(LessError::parse(
                        "mixin 参数列表缺少 ')'",
                        cursor.location(),
                    ));
                }
            }
            cursor.skip_whitespace();
            match cursor.peek() {
                Some(t) if t.kind == TokenKind::ParenClosed => {
                    cursor.advance();
                    break;
                }
                Some(t)
                    if t.kind == TokenKind::Comma && delimiter == Delimiter::Comma
                        || t.is_delim(";") && delimiter == Delimiter::Semicolon =>
                {
                    cursor.advance();
                }
                _ => {
                    return Err(LessError::parse(
                        "mixin 参数列表缺少分隔符",
                        cursor.location(),
                    ));
                }
            }
        }

        cursor.skip_whitespace();
        let mut guards = Vec::new();
        if matches!(cursor.peek(), Some(t) if t.kind == TokenKind::Identifier && t.text == "when")
        {
            cursor.advance();
            let condition_tokens = self.read_selector_tokens(cursor)?;
            guards = condition_tokens
                .split(|t| t.kind == TokenKind::Comma)
                .into_iter()
                .filter(|part| !part.is_empty())
                .collect();
        }

        cursor.expect_kind(TokenKind::BraceOpen)?;
        let body = self.parse_block_statements(cursor)?;
        Ok(MixinDefinition {
            name,
            params,
            rest,
            unlimited,
            guards,
            body,
            reference: false,
        })
    }

    /// 读取一个实参/默认值，直到分隔符或参数表结束。
    fn read_argument_tokens(
        &self,
        cursor: &mut Cursor,
        delimiter: &Delimiter,
    ) -> LessResult<TokenList> {
        let mut value = TokenList::new();
        let mut depth = 0usize;
        while let Some(token) = cursor.peek() {
            match token.kind {
                TokenKind::ParenOpen | TokenKind::BracketOpen => depth += 1,
                TokenKind::ParenClosed if depth == 0 => break,
                TokenKind::ParenClosed | TokenKind::BracketClosed => depth -= 1,
                TokenKind::Comma if depth == 0 && *delimiter == Delimiter::Comma => break,
                TokenKind::Other
                    if depth == 0 && token.text == ";" && *delimiter == Delimiter::Semicolon =>
                {
                    break
                }
                _ => {}
            }
            value.push(cursor.advance().unwrap());
        }
        Ok(value.trimmed())
    }

    fn parse_mixin_call(&self, cursor: &mut Cursor) -> LessResult<MixinCall> {
        let location = cursor.location();
        let mut path = Vec::new();
        loop {
            match cursor.peek() {
                Some(t) if t.is_delim(".") || t.kind == TokenKind::Hash => {
                    path.push(cursor.read_mixin_name()?);
                }
                _ => break,
            }
            let mut lookahead = cursor.fork();
            lookahead.skip_whitespace();
            if matches!(lookahead.peek(), Some(t) if t.is_delim(">")) {
                lookahead.advance();
                lookahead.skip_whitespace();
            }
            match lookahead.peek() {
                Some(t) if t.is_delim(".") || t.kind == TokenKind::Hash => {
                    *cursor = lookahead;
                }
                _ => break,
            }
        }
        if path.is_empty() {
            return Err(LessError::parse("期待 mixin 名称", cursor.location()));
        }

        cursor.skip_whitespace();
        let mut args = Vec::new();
        if matches!(cursor.peek(), Some(t) if t.kind == TokenKind::ParenOpen) {
            let delimiter = cursor.argument_delimiter();
            cursor.advance();
            loop {
                cursor.skip_whitespace();
                match cursor.peek() {
                    Some(t) if t.kind == TokenKind::ParenClosed => {
                        cursor.advance();
                        break;
                    }
                    None => {
                        return Err(LessError::parse(
                            "mixin 调用缺少 ')'",
                            cursor.location(),
                        ));
                    }
                    _ => {}
                }

                let mut name = None;
                let mut lookahead = cursor.fork();
                if matches!(lookahead.peek(), Some(t) if t.kind == TokenKind::AtKeyword) {
                    let named = lookahead.advance().unwrap();
                    lookahead.skip_whitespace();
                    if matches!(lookahead.peek(), Some(t) if t.kind == TokenKind::Colon) {
                        lookahead.advance();
                        lookahead.skip_whitespace();
                        name = Some(named.text[1..].to_string());
                        *cursor = lookahead;
                    }
                }

                let value = self.read_argument_tokens(cursor, &delimiter)?;
                args.push(MixinArgument { name, value });

                cursor.skip_whitespace();
                match cursor.peek() {
                    Some(t) if t.kind == TokenKind::ParenClosed => {
                        cursor.advance();
                        break;
                    }
                    Some(t)
                        if t.kind == TokenKind::Comma && delimiter == Delimiter::Comma
                            || t.is_delim(";") && delimiter == Delimiter::Semicolon =>
                    {
                        cursor.advance();
                    }
                    _ => {
                        return Err(LessError::parse(
                            "mixin 调用缺少分隔符",
                            cursor.location(),
                        ));
                    }
                }
            }
        }

        cursor.skip_whitespace();
        if !cursor.consume_delim(";") {
            match cursor.peek() {
                Some(t) if t.kind == TokenKind::BraceClosed => {}
                None => {}
                _ => {
                    return Err(LessError::parse("mixin 调用缺少 ';'", cursor.location()));
                }
            }
        }
        Ok(MixinCall {
            path,
            args,
            location,
        })
    }
}

impl Default for LessParser {
    fn default() -> Self {
        Self::new()
    }
}

/// 剥离值尾部的 `!important` 标记。
fn strip_important(value: &mut TokenList) -> bool {
    let tokens: Vec<Token> = value.iter().cloned().collect();
    let mut index = tokens.len();
    while index > 0 && tokens[index - 1].is_whitespace() {
        index -= 1;
    }
    if index >= 2
        && tokens[index - 1].kind == TokenKind::Identifier
        && tokens[index - 1].text.eq_ignore_ascii_case("important")
        && tokens[index - 2].is_delim("!")
    {
        let keep = tokens.into_iter().take(index - 2).collect::<TokenList>();
        *value = keep.trimmed();
        return true;
    }
    false
}

fn extract_import_path(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    let first = trimmed.chars().next()?;
    if first == '"' || first == '\'' {
        if let Some(end) = trimmed[1..].find(first) {
            return Some(trimmed[1..1 + end].to_string());
        }
        return None;
    }
    if trimmed.starts_with("url(") {
        return None;
    }
    let token = trimmed.split_whitespace().next().map(|s| s.to_string())?;
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

fn is_comment(token: &Token) -> bool {
    token.kind == TokenKind::Other && token.text.starts_with("/*")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delimiter {
    Comma,
    Semicolon,
}

enum BodyKind {
    Declaration,
    NestedRule,
}

/// 带位置的 token 游标，提供便捷的向前探测能力。
#[derive(Clone)]
struct Cursor {
    tokens: Vec<Token>,
    position: usize,
}

impl Cursor {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            position: 0,
        }
    }

    fn fork(&self) -> Self {
        self.clone()
    }

    fn is_eof(&self) -> bool {
        self.position >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position)?.clone();
        self.position += 1;
        Some(token)
    }

    fn location(&self) -> SourceLocation {
        self.tokens
            .get(self.position)
            .or_else(|| self.tokens.last())
            .map(|t| t.location.clone())
            .unwrap_or_default()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(t) if t.is_whitespace()) {
            self.position += 1;
        }
    }

    fn expect_kind(&mut self, kind: TokenKind) -> LessResult<Token> {
        match self.advance() {
            Some(token) if token.kind == kind => Ok(token),
            Some(token) => Err(LessError::parse(
                format!("期待 {kind:?}, 却得到 '{}'", token.text),
                token.location,
            )),
            None => Err(LessError::parse(
                format!("期待 {kind:?}"),
                self.location(),
            )),
        }
    }

    fn consume_delim(&mut self, text: &str) -> bool {
        if matches!(self.peek(), Some(t) if t.is_delim(text)) {
            self.position += 1;
            return true;
        }
        false
    }

    /// 连续三个 `.` 组成 `...`。
    fn consume_ellipsis(&mut self) -> bool {
        let dots = (0..3).all(|offset| {
            matches!(
                self.tokens.get(self.position + offset),
                Some(t) if t.is_delim(".")
            )
        });
        if dots {
            self.position += 3;
        }
        dots
    }

    fn read_mixin_name(&mut self) -> LessResult<String> {
        match self.peek() {
            Some(t) if t.is_delim(".") => {
                self.advance();
                let ident = self.expect_kind(TokenKind::Identifier)?;
                Ok(format!(".{}", ident.text))
            }
            Some(t) if t.kind == TokenKind::Hash => {
                let token = self.advance().unwrap();
                Ok(token.text)
            }
            _ => Err(LessError::parse("期待 mixin 名称", self.location())),
        }
    }

    /// 参数表里出现顶层 `;` 时以分号为分隔符，否则用逗号。
    fn argument_delimiter(&self) -> Delimiter {
        let mut lookahead = self.fork();
        if !matches!(lookahead.peek(), Some(t) if t.kind == TokenKind::ParenOpen) {
            return Delimiter::Comma;
        }
        lookahead.advance();
        let mut depth = 1usize;
        while let Some(token) = lookahead.advance() {
            match token.kind {
                TokenKind::ParenOpen => depth += 1,
                TokenKind::ParenClosed => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                TokenKind::Other if depth == 1 && token.text == ";" => {
                    return Delimiter::Semicolon;
                }
                _ => {}
            }
        }
        Delimiter::Comma
    }

    fn lookahead_is_variable_decl(&self) -> bool {
        let mut lookahead = self.fork();
        if !matches!(lookahead.peek(), Some(t) if t.kind == TokenKind::AtKeyword) {
            return false;
        }
        lookahead.advance();
        lookahead.skip_whitespace();
        matches!(lookahead.peek(), Some(t) if t.kind == TokenKind::Colon)
    }

    fn lookahead_is_detached_call(&self) -> bool {
        let mut lookahead = self.fork();
        if !matches!(lookahead.peek(), Some(t) if t.kind == TokenKind::AtKeyword) {
            return false;
        }
        lookahead.advance();
        lookahead.skip_whitespace();
        if !matches!(lookahead.peek(), Some(t) if t.kind == TokenKind::ParenOpen) {
            return false;
        }
        lookahead.advance();
        lookahead.skip_whitespace();
        if !matches!(lookahead.peek(), Some(t) if t.kind == TokenKind::ParenClosed) {
            return false;
        }
        lookahead.advance();
        lookahead.skip_whitespace();
        matches!(lookahead.peek(), Some(t) if t.is_delim(";"))
    }

    fn lookahead_is_block_at_rule(&self) -> bool {
        let mut lookahead = self.fork();
        if !matches!(lookahead.peek(), Some(t) if t.kind == TokenKind::AtKeyword) {
            return false;
        }
        lookahead.advance();
        let mut depth = 0usize;
        while let Some(token) = lookahead.peek() {
            match token.kind {
                TokenKind::BraceOpen if depth == 0 => return true,
                TokenKind::ParenOpen | TokenKind::BracketOpen => depth += 1,
                TokenKind::ParenClosed | TokenKind::BracketClosed => {
                    depth = depth.saturating_sub(1)
                }
                TokenKind::BraceClosed if depth == 0 => return false,
                TokenKind::Other if depth == 0 && token.text == ";" => return false,
                _ => {}
            }
            lookahead.advance();
        }
        false
    }

    fn lookahead_is_extend_statement(&self) -> bool {
        let mut lookahead = self.fork();
        if !matches!(lookahead.peek(), Some(t) if t.is_delim("&")) {
            return false;
        }
        lookahead.advance();
        if !matches!(lookahead.peek(), Some(t) if t.kind == TokenKind::Colon) {
            return false;
        }
        lookahead.advance();
        matches!(
            lookahead.peek(),
            Some(t) if t.kind == TokenKind::Identifier && t.text == "extend"
        )
    }

    fn lookahead_is_mixin_definition(&self) -> bool {
        let mut lookahead = self.fork();
        if lookahead.read_mixin_name().is_err() {
            return false;
        }
        lookahead.skip_whitespace();
        if !matches!(lookahead.peek(), Some(t) if t.kind == TokenKind::ParenOpen) {
            return false;
        }
        if !lookahead.skip_matched_parens() {
            return false;
        }
        lookahead.skip_whitespace();
        if matches!(lookahead.peek(), Some(t) if t.kind == TokenKind::Identifier && t.text == "when")
        {
            lookahead.advance();
            let mut depth = 0usize;
            while let Some(token) = lookahead.peek() {
                match token.kind {
                    TokenKind::BraceOpen if depth == 0 => break,
                    TokenKind::ParenOpen => depth += 1,
                    TokenKind::ParenClosed => depth = depth.saturating_sub(1),
                    _ => {}
                }
                lookahead.advance();
            }
        }
        matches!(lookahead.peek(), Some(t) if t.kind == TokenKind::BraceOpen)
    }

    fn lookahead_is_mixin_call(&self) -> bool {
        let mut lookahead = self.fork();
        if lookahead.read_mixin_name().is_err() {
            return false;
        }
        loop {
            let mut next = lookahead.fork();
            next.skip_whitespace();
            if matches!(next.peek(), Some(t) if t.is_delim(">")) {
                next.advance();
                next.skip_whitespace();
            }
            match next.peek() {
                Some(t) if t.is_delim(".") || t.kind == TokenKind::Hash => {
                    if next.read_mixin_name().is_err() {
                        return false;
                    }
                    lookahead = next;
                }
                _ => break,
            }
        }
        lookahead.skip_whitespace();
        if matches!(lookahead.peek(), Some(t) if t.kind == TokenKind::ParenOpen) {
            if !lookahead.skip_matched_parens() {
                return false;
            }
            lookahead.skip_whitespace();
        }
        match lookahead.peek() {
            Some(t) if t.is_delim(";") => true,
            Some(t) if t.kind == TokenKind::BraceClosed => true,
            None => true,
            _ => false,
        }
    }

    fn skip_matched_parens(&mut self) -> bool {
        if !matches!(self.peek(), Some(t) if t.kind == TokenKind::ParenOpen) {
            return false;
        }
        self.advance();
        let mut depth = 1usize;
        while let Some(token) = self.advance() {
            match token.kind {
                TokenKind::ParenOpen => depth += 1,
                TokenKind::ParenClosed => {
                    depth -= 1;
                    if depth == 0 {
                        return true;
                    }
                }
                _ => {}
            }
        }
        false
    }

    /// 通过向前查看判断接下来的语句类型（声明或子规则）。
    fn detect_body_kind(&self) -> Option<BodyKind> {
        let mut lookahead = self.fork();
        let mut saw_colon = false;
        let mut depth = 0usize;
        while let Some(token) = lookahead.peek() {
            match token.kind {
                TokenKind::ParenOpen | TokenKind::BracketOpen => depth += 1,
                TokenKind::ParenClosed | TokenKind::BracketClosed => {
                    depth = depth.saturating_sub(1)
                }
                TokenKind::BraceOpen if depth == 0 => return Some(BodyKind::NestedRule),
                TokenKind::Other if depth == 0 && token.text == ";" => {
                    return Some(BodyKind::Declaration)
                }
                TokenKind::BraceClosed if depth == 0 => {
                    return if saw_colon {
                        Some(BodyKind::Declaration)
                    } else {
                        None
                    };
                }
                TokenKind::Colon if depth == 0 => saw_colon = true,
                _ => {}
            }
            lookahead.advance();
        }
        if saw_colon {
            Some(BodyKind::Declaration)
        } else {
            None
        }
    }
}
