use std::fmt::{self, Display};

use crate::token::{SourceLocation, Token, TokenKind, TokenList};

/// 表示一份完整的 LESS 样式表。
#[derive(Debug, Clone)]
pub struct Stylesheet {
    pub statements: Vec<Statement>,
}

impl Stylesheet {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self { statements }
    }
}

/// 树中的语句。顶层与规则体共用同一组变体，由求值器决定各自的合法位置。
#[derive(Debug, Clone)]
pub enum Statement {
    Comment(String),
    Import(ImportStatement),
    Variable(VariableDeclaration),
    Declaration(Declaration),
    Ruleset(Ruleset),
    AtRule(AtRule),
    Media(MediaQuery),
    MixinDefinition(MixinDefinition),
    MixinCall(MixinCall),
    DetachedCall(DetachedCall),
    Extend(ExtendStatement),
}

/// 变量绑定的右侧：普通 token 序列，或者一段可调用的游离规则集。
#[derive(Debug, Clone)]
pub enum VariableValue {
    Tokens(TokenList),
    Ruleset(Vec<Statement>),
}

#[derive(Debug, Clone)]
pub struct VariableDeclaration {
    pub name: String,
    pub value: VariableValue,
}

#[derive(Debug, Clone)]
pub struct Declaration {
    pub name: String,
    pub value: TokenList,
    pub important: bool,
}

#[derive(Debug, Clone)]
pub struct Ruleset {
    pub selector: Selector,
    pub body: Vec<Statement>,
    /// 来自 `@import (reference)` 的规则集参与解析但不输出。
    pub reference: bool,
}

#[derive(Debug, Clone)]
pub struct AtRule {
    pub name: String,
    pub prelude: TokenList,
    pub body: Option<Vec<Statement>>,
}

/// `@media` 与 `@supports`，两者共享冒泡语义。
#[derive(Debug, Clone)]
pub struct MediaQuery {
    pub name: String,
    pub query: TokenList,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone)]
pub struct ImportStatement {
    pub raw: String,
    pub path: Option<String>,
    pub is_css: bool,
    pub reference: bool,
}

/// mixin 形参：命名参数（可带默认值）或要求实参逐字匹配的模式字面量。
#[derive(Debug, Clone)]
pub enum MixinParam {
    Named {
        name: String,
        default: Option<TokenList>,
    },
    Pattern(Token),
}

#[derive(Debug, Clone)]
pub struct MixinDefinition {
    pub name: String,
    pub params: Vec<MixinParam>,
    /// 剩余参数名（`@rest...`），为空时 `...` 只是放开参数上限。
    pub rest: Option<String>,
    pub unlimited: bool,
    pub guards: Vec<TokenList>,
    pub body: Vec<Statement>,
    pub reference: bool,
}

impl MixinDefinition {
    pub fn required_arity(&self) -> usize {
        self.params
            .iter()
            .filter(|p| match p {
                MixinParam::Named { default, .. } => default.is_none(),
                MixinParam::Pattern(_) => true,
            })
            .count()
    }

    pub fn accepts_arity(&self, passed: usize) -> bool {
        if passed < self.required_arity() {
            return false;
        }
        self.unlimited || passed <= self.params.len()
    }
}

#[derive(Debug, Clone)]
pub struct MixinCall {
    pub path: Vec<String>,
    pub args: Vec<MixinArgument>,
    pub location: SourceLocation,
}

impl MixinCall {
    pub fn display_name(&self) -> String {
        self.path.join(" ")
    }
}

#[derive(Debug, Clone)]
pub struct MixinArgument {
    pub name: Option<String>,
    pub value: TokenList,
}

#[derive(Debug, Clone)]
pub struct DetachedCall {
    pub name: String,
    pub location: SourceLocation,
}

/// `&:extend(target [all], ...)` 语句形式。
#[derive(Debug, Clone)]
pub struct ExtendStatement {
    pub targets: Vec<ExtendTarget>,
}

#[derive(Debug, Clone)]
pub struct ExtendTarget {
    pub selector: TokenList,
    pub all: bool,
}

/// 选择器是一条 token 序列，按顶层逗号拆成若干组成部分。
#[derive(Debug, Clone)]
pub struct Selector {
    pub tokens: TokenList,
}

impl Selector {
    pub fn new(tokens: TokenList) -> Self {
        Self {
            tokens: tokens.trimmed(),
        }
    }

    pub fn components(&self) -> Vec<TokenList> {
        self.tokens
            .split_on_commas()
            .into_iter()
            .filter(|c| !c.is_empty())
            .collect()
    }

    /// 组成部分是否包含 `&` 父引用。
    pub fn has_parent_reference(component: &TokenList) -> bool {
        component.iter().any(|t| t.is_delim("&"))
    }

    /// 提取 `:extend(...)` 子句，返回清理后的组成部分与其携带的扩展目标。
    ///
    /// 子句只在组成部分的尾部识别，和主流 LESS 一致。
    pub fn strip_extend(component: &TokenList) -> (TokenList, Vec<ExtendTarget>) {
        let tokens: Vec<Token> = component.iter().cloned().collect();
        let mut clean = TokenList::new();
        let mut targets = Vec::new();
        let mut index = 0usize;

        while index < tokens.len() {
            if tokens[index].kind == TokenKind::Colon
                && matches!(tokens.get(index + 1), Some(t) if t.kind == TokenKind::Identifier && t.text == "extend")
                && matches!(tokens.get(index + 2), Some(t) if t.kind == TokenKind::ParenOpen)
            {
                let mut depth = 1usize;
                let mut inner = TokenList::new();
                index += 3;
                while index < tokens.len() && depth > 0 {
                    match tokens[index].kind {
                        TokenKind::ParenOpen => depth += 1,
                        TokenKind::ParenClosed => {
                            depth -= 1;
                            if depth == 0 {
                                index += 1;
                                break;
                            }
                        }
                        _ => {}
                    }
                    inner.push(tokens[index].clone());
                    index += 1;
                }
                for part in inner.split(|t| t.kind == TokenKind::Comma) {
                    if !part.is_empty() {
                        targets.push(parse_extend_target(part));
                    }
                }
            } else {
                clean.push(tokens[index].clone());
                index += 1;
            }
        }

        (clean.trimmed(), targets)
    }

    /// 单一的 `.name` 或 `#name` 选择器可以被当作 mixin 调用。
    pub fn simple_callable_name(&self) -> Option<String> {
        let components = self.components();
        if components.len() != 1 {
            return None;
        }
        let tokens: Vec<&Token> = components[0].iter().collect();
        match tokens.as_slice() {
            [dot, ident]
                if dot.is_delim(".") && ident.kind == TokenKind::Identifier =>
            {
                Some(format!(".{}", ident.text))
            }
            [hash] if hash.kind == TokenKind::Hash => Some(hash.text.clone()),
            _ => None,
        }
    }
}

/// 目标尾部的 `all` 关键字表示子串匹配模式。
pub fn parse_extend_target(mut part: TokenList) -> ExtendTarget {
    let mut all = false;
    if matches!(part.back(), Some(t) if t.kind == TokenKind::Identifier && t.text == "all") {
        part.pop();
        part.rtrim();
        all = true;
    }
    ExtendTarget {
        selector: part,
        all,
    }
}

impl Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tokens.normalized())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tokenize;

    fn selector(input: &str) -> Selector {
        Selector::new(TokenList::from_tokens(tokenize(input).unwrap()))
    }

    #[test]
    fn components_split_on_top_level_commas() {
        let sel = selector("a, b:not(.x, .y), c");
        let parts = sel.components();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1].normalized(), "b:not(.x, .y)");
    }

    #[test]
    fn strip_extend_removes_clause_and_reads_all_flag() {
        let sel = selector(".b:extend(.a all)");
        let components = sel.components();
        let (clean, targets) = Selector::strip_extend(&components[0]);
        assert_eq!(clean.normalized(), ".b");
        assert_eq!(targets.len(), 1);
        assert!(targets[0].all);
        assert_eq!(targets[0].selector.normalized(), ".a");
    }

    #[test]
    fn simple_callable_names() {
        assert_eq!(selector(".card").simple_callable_name().as_deref(), Some(".card"));
        assert_eq!(selector("#ns").simple_callable_name().as_deref(), Some("#ns"));
        assert_eq!(selector(".a .b").simple_callable_name(), None);
        assert_eq!(selector(".a, .b").simple_callable_name(), None);
    }
}
