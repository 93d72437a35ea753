use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

use crate::ast::VariableValue;
use crate::error::{LessError, LessResult};
use crate::functions::BUILTINS;
use crate::scope::{ScopeArena, ScopeId};
use crate::token::{SourceLocation, Token, TokenKind, TokenList};
use crate::value::{self, Comparison, Op, Value};

/// mixin 展开深度上限。
pub const RECURSION_LIMIT: usize = 1024;

/// 求值上下文：作用域竞技场、递归深度与正在展开的变量集合。
pub struct ProcessingContext {
    pub scopes: ScopeArena,
    depth: usize,
    expanding: Vec<String>,
}

impl ProcessingContext {
    pub fn new() -> Self {
        Self {
            scopes: ScopeArena::new(),
            depth: 0,
            expanding: Vec::new(),
        }
    }

    pub fn enter(&mut self) -> LessResult<()> {
        self.depth += 1;
        if self.depth > RECURSION_LIMIT {
            return Err(LessError::RecursionLimit {
                limit: RECURSION_LIMIT,
            });
        }
        Ok(())
    }

    pub fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}

impl Default for ProcessingContext {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// 变量替换、函数求值、算术折叠全开。
    Full,
    /// 只做变量替换，用于 calc()/var() 这类要按原样输出的调用。
    SubstituteOnly,
}

/// 把 token 序列在给定作用域里归约成完全求值后的序列。
pub fn process_value(
    ctx: &mut ProcessingContext,
    tokens: &TokenList,
    scope: ScopeId,
) -> LessResult<TokenList> {
    let collected: Vec<Token> = tokens.iter().cloned().collect();
    let reduced = reduce(ctx, &collected, scope, false, Mode::Full)?;
    Ok(TokenList::from_tokens(reduced).trimmed())
}

/// 归约后若剩单个可提升 token，给出对应的类型化值。
pub fn evaluate_single(
    ctx: &mut ProcessingContext,
    tokens: &TokenList,
    scope: ScopeId,
) -> LessResult<Option<Value>> {
    let reduced = process_value(ctx, tokens, scope)?;
    let significant: Vec<&Token> = reduced.iter().filter(|t| !t.is_whitespace()).collect();
    match significant.as_slice() {
        [single] => Ok(Value::from_token(*single)),
        _ => Ok(None),
    }
}

static INTERP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@\{([0-9A-Za-z_-]+)\}").expect("插值正则编译失败"));

/// 展开一段文本里的 `@{name}` 插值，用于属性名与字符串字面量。
pub fn interpolate_text(
    ctx: &mut ProcessingContext,
    text: &str,
    scope: ScopeId,
    location: &SourceLocation,
) -> LessResult<String> {
    if !text.contains("@{") {
        return Ok(text.to_string());
    }
    let mut output = String::new();
    let mut last = 0;
    for caps in INTERP_RE.captures_iter(text) {
        let matched = caps.get(0).unwrap();
        output.push_str(&text[last..matched.start()]);
        let name = caps.get(1).unwrap().as_str();
        let expanded = expand_variable(ctx, name, scope, location)?;
        output.push_str(expanded.stringify().trim());
        last = matched.end();
    }
    output.push_str(&text[last..]);
    Ok(output)
}

/// 惰性变量展开：绑定在定义帧里求值，而不是使用处。
fn expand_variable(
    ctx: &mut ProcessingContext,
    name: &str,
    scope: ScopeId,
    location: &SourceLocation,
) -> LessResult<TokenList> {
    if ctx.expanding.iter().any(|n| n == name) {
        return Err(LessError::VariableCycle {
            name: name.to_string(),
            location: location.clone(),
        });
    }
    let (defining_scope, binding) = match ctx.scopes.lookup_variable(scope, name) {
        Some(found) => found,
        None => return Err(LessError::unbound_variable(name, location.clone())),
    };
    let tokens = match binding {
        VariableValue::Tokens(tokens) => tokens.clone(),
        VariableValue::Ruleset(_) => {
            return Err(LessError::type_error(
                format!("变量 @{name} 不是可作为文本使用的值"),
                location.clone(),
            ));
        }
    };
    trace!(variable = name, "展开变量");

    ctx.expanding.push(name.to_string());
    let result = process_value(ctx, &tokens, defining_scope);
    ctx.expanding.pop();
    result
}

fn reduce(
    ctx: &mut ProcessingContext,
    tokens: &[Token],
    scope: ScopeId,
    in_parens: bool,
    mode: Mode,
) -> LessResult<Vec<Token>> {
    let substituted = substitute(ctx, tokens, scope, mode)?;
    if mode == Mode::SubstituteOnly {
        return Ok(substituted);
    }
    fold_segments(substituted, in_parens)
}

fn substitute(
    ctx: &mut ProcessingContext,
    tokens: &[Token],
    scope: ScopeId,
    mode: Mode,
) -> LessResult<Vec<Token>> {
    let mut output: Vec<Token> = Vec::with_capacity(tokens.len());
    let mut index = 0usize;

    while index < tokens.len() {
        let token = &tokens[index];
        match token.kind {
            TokenKind::AtKeyword if token.text.starts_with("@{") => {
                let name = &token.text[2..token.text.len() - 1];
                let expanded = expand_variable(ctx, name, scope, &token.location)?;
                output.push(Token::new(
                    expanded.stringify().trim().to_string(),
                    TokenKind::Identifier,
                    token.location.clone(),
                ));
                index += 1;
            }
            TokenKind::AtKeyword => {
                let name = &token.text[1..];
                let expanded = expand_variable(ctx, name, scope, &token.location)?;
                output.extend(expanded);
                index += 1;
            }
            TokenKind::String => {
                let interpolated =
                    interpolate_text(ctx, &token.text, scope, &token.location)?;
                output.push(Token::new(interpolated, TokenKind::String, token.location.clone()));
                index += 1;
            }
            TokenKind::Identifier
                if matches!(tokens.get(index + 1), Some(t) if t.kind == TokenKind::ParenOpen) =>
            {
                index = substitute_call(ctx, tokens, index, scope, mode, &mut output)?;
            }
            // `%(...)` 格式化函数。
            TokenKind::Other
                if token.text == "%"
                    && matches!(tokens.get(index + 1), Some(t) if t.kind == TokenKind::ParenOpen) =>
            {
                index = substitute_call(ctx, tokens, index, scope, mode, &mut output)?;
            }
            TokenKind::ParenOpen => {
                let close = matching_paren(tokens, index);
                if close <= index {
                    output.push(token.clone());
                    index += 1;
                    continue;
                }
                let inner = reduce(ctx, &tokens[index + 1..close], scope, true, mode)?;
                let significant: Vec<&Token> =
                    inner.iter().filter(|t| !t.is_whitespace()).collect();
                if mode == Mode::Full && significant.len() == 1 {
                    output.push(significant[0].clone());
                } else {
                    output.push(token.clone());
                    output.extend(inner);
                    output.push(Token::new(
                        ")",
                        TokenKind::ParenClosed,
                        token.location.clone(),
                    ));
                }
                index = close + 1;
            }
            // 值里的注释直接丢弃。
            TokenKind::Other if token.text.starts_with("/*") => {
                index += 1;
            }
            _ => {
                output.push(token.clone());
                index += 1;
            }
        }
    }
    Ok(output)
}

/// 函数调用：内置函数求值，未知调用带着求值后的参数原样重建。
fn substitute_call(
    ctx: &mut ProcessingContext,
    tokens: &[Token],
    index: usize,
    scope: ScopeId,
    mode: Mode,
    output: &mut Vec<Token>,
) -> LessResult<usize> {
    let name_token = &tokens[index];
    let name = name_token.text.clone();
    let open = index + 1;
    let close = matching_paren(tokens, open);
    if close <= open {
        output.push(name_token.clone());
        return Ok(open);
    }
    let inner = &tokens[open + 1..close];

    // calc()/var() 按原样输出，只替换其中的变量。
    let passthrough = matches!(name.to_ascii_lowercase().as_str(), "calc" | "var" | "env");
    if passthrough || mode == Mode::SubstituteOnly {
        let reduced = substitute(ctx, inner, scope, Mode::SubstituteOnly)?;
        output.push(name_token.clone());
        output.push(Token::new(
            "(",
            TokenKind::ParenOpen,
            name_token.location.clone(),
        ));
        output.extend(reduced);
        output.push(Token::new(
            ")",
            TokenKind::ParenClosed,
            name_token.location.clone(),
        ));
        return Ok(close + 1);
    }

    let arg_list = TokenList::from_tokens(inner.iter().cloned());
    let mut reduced_args: Vec<Vec<Token>> = Vec::new();
    for part in arg_list.split(|t| t.kind == TokenKind::Comma) {
        if part.is_empty() && reduced_args.is_empty() {
            continue;
        }
        let collected: Vec<Token> = part.iter().cloned().collect();
        reduced_args.push(reduce(ctx, &collected, scope, true, Mode::Full)?);
    }

    // 所有实参都能提升为类型化值时才尝试内置函数。
    let mut values: Option<Vec<Value>> = Some(Vec::new());
    'lift: for arg in &reduced_args {
        for token in arg.iter().filter(|t| !t.is_whitespace()) {
            match Value::from_token(token) {
                Some(value) => {
                    if let Some(list) = values.as_mut() {
                        list.push(value);
                    }
                }
                None => {
                    values = None;
                    break 'lift;
                }
            }
        }
    }

    if let Some(values) = values {
        if let Some(result) = BUILTINS.call(&name, &values, &name_token.location) {
            output.push(result?.to_token());
            return Ok(close + 1);
        }
    }

    output.push(name_token.clone());
    output.push(Token::new(
        "(",
        TokenKind::ParenOpen,
        name_token.location.clone(),
    ));
    for (position, arg) in reduced_args.iter().enumerate() {
        if position > 0 {
            output.push(Token::synthetic(",", TokenKind::Comma));
            output.push(Token::whitespace());
        }
        output.extend(arg.iter().cloned());
    }
    output.push(Token::new(
        ")",
        TokenKind::ParenClosed,
        name_token.location.clone(),
    ));
    Ok(close + 1)
}

fn matching_paren(tokens: &[Token], open: usize) -> usize {
    let mut depth = 0usize;
    for (index, token) in tokens.iter().enumerate().skip(open) {
        match token.kind {
            TokenKind::ParenOpen => depth += 1,
            TokenKind::ParenClosed => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return index;
                }
            }
            _ => {}
        }
    }
    open
}

#[derive(Debug, Clone)]
enum Slot {
    Val(Value, SourceLocation),
    Tok(Token),
    Ws,
}

/// 顶层逗号分段后逐段折叠，段之间保持逗号。
fn fold_segments(tokens: Vec<Token>, in_parens: bool) -> LessResult<Vec<Token>> {
    let list = TokenList::from_tokens(tokens);
    let segments = list.split(|t| t.kind == TokenKind::Comma);
    let mut output: Vec<Token> = Vec::new();
    for (index, segment) in segments.iter().enumerate() {
        if index > 0 {
            output.push(Token::synthetic(",", TokenKind::Comma));
            output.push(Token::whitespace());
        }
        let collected: Vec<Token> = segment.iter().cloned().collect();
        output.extend(fold_ops(collected, in_parens)?);
    }
    Ok(output)
}

fn fold_ops(tokens: Vec<Token>, in_parens: bool) -> LessResult<Vec<Token>> {
    let mut slots: Vec<Slot> = tokens
        .into_iter()
        .map(|token| {
            if token.is_whitespace() {
                Slot::Ws
            } else {
                match Value::from_token(&token) {
                    Some(value) => Slot::Val(value, token.location.clone()),
                    None => Slot::Tok(token),
                }
            }
        })
        .collect();

    apply_unary_minus(&mut slots);
    fold_pass(&mut slots, &[Op::Multiply, Op::Divide], in_parens)?;
    fold_pass(&mut slots, &[Op::Add, Op::Subtract], in_parens)?;

    Ok(slots
        .into_iter()
        .map(|slot| match slot {
            Slot::Val(value, _) => value.to_token(),
            Slot::Tok(token) => token,
            Slot::Ws => Token::whitespace(),
        })
        .collect())
}

fn is_operator_slot(slot: &Slot) -> Option<Op> {
    match slot {
        Slot::Tok(token) if token.kind == TokenKind::Other => Op::from_text(&token.text),
        _ => None,
    }
}

/// 表达式开头或运算符之后的 `-` 是取负。
fn apply_unary_minus(slots: &mut Vec<Slot>) {
    let mut index = 0usize;
    while index < slots.len() {
        let is_minus = matches!(&slots[index], Slot::Tok(t) if t.is_delim("-"));
        if is_minus {
            let prev = slots[..index].iter().rev().find(|s| !matches!(s, Slot::Ws));
            let unary = match prev {
                None => true,
                Some(slot) => is_operator_slot(slot).is_some(),
            };
            if unary {
                let next_index = (index + 1..slots.len())
                    .find(|i| !matches!(slots[*i], Slot::Ws));
                if let Some(next_index) = next_index {
                    if let Slot::Val(value, location) = &slots[next_index] {
                        if let Some(number) = value.as_number() {
                            let negated = match value {
                                Value::Number(_) => Value::Number(-number),
                                Value::Dimension(_, unit) => {
                                    Value::Dimension(-number, unit.clone())
                                }
                                Value::Percentage(_) => Value::Percentage(-number),
                                _ => unreachable!(),
                            };
                            let location = location.clone();
                            slots.splice(index..=next_index, [Slot::Val(negated, location)]);
                            continue;
                        }
                    }
                }
            }
        }
        index += 1;
    }
}

/// 可以作为折叠操作数的类型。
fn operand(slot: &Slot) -> Option<&Value> {
    match slot {
        Slot::Val(value, _)
            if value.is_numeric()
                || matches!(value, Value::Color(_))
                || matches!(value, Value::String(_)) =>
        {
            Some(value)
        }
        _ => None,
    }
}

fn fold_pass(slots: &mut Vec<Slot>, ops: &[Op], in_parens: bool) -> LessResult<()> {
    let mut index = 0usize;
    while index < slots.len() {
        let op = match is_operator_slot(&slots[index]) {
            Some(op) if ops.contains(&op) => op,
            _ => {
                index += 1;
                continue;
            }
        };

        let prev_index = slots[..index]
            .iter()
            .rposition(|s| !matches!(s, Slot::Ws));
        let next_index = (index + 1..slots.len()).find(|i| !matches!(slots[*i], Slot::Ws));
        let (prev_index, next_index) = match (prev_index, next_index) {
            (Some(p), Some(n)) => (p, n),
            _ => {
                index += 1;
                continue;
            }
        };

        // `+`/`-` 要求两侧空白对称，否则按值列表处理。
        if matches!(op, Op::Add | Op::Subtract) {
            let ws_before = index - prev_index > 1;
            let ws_after = next_index - index > 1;
            if ws_before != ws_after {
                index += 1;
                continue;
            }
        }

        let (lhs, rhs) = match (operand(&slots[prev_index]), operand(&slots[next_index])) {
            (Some(l), Some(r)) => (l.clone(), r.clone()),
            _ => {
                index += 1;
                continue;
            }
        };

        // 括号外同单位维度间的除法保持原样，保护 font 简写。
        if op == Op::Divide && !in_parens {
            if let (Value::Dimension(_, lu), Value::Dimension(_, ru)) = (&lhs, &rhs) {
                if lu == ru {
                    index += 1;
                    continue;
                }
            }
        }

        let location = match &slots[prev_index] {
            Slot::Val(_, location) => location.clone(),
            _ => SourceLocation::default(),
        };
        let result = value::apply(op, &lhs, &rhs, &location)?;
        slots.splice(prev_index..=next_index, [Slot::Val(result, location)]);
        index = prev_index;
    }
    Ok(())
}

/// 守卫条件求值：`or` 优先级最低，其次 `and`，支持 `not` 与比较运算。
pub fn evaluate_condition(
    ctx: &mut ProcessingContext,
    tokens: &TokenList,
    scope: ScopeId,
    default_flag: bool,
) -> LessResult<bool> {
    let collected: Vec<Token> = tokens.iter().cloned().collect();
    condition_or(ctx, &collected, scope, default_flag)
}

fn split_on_keyword<'a>(tokens: &'a [Token], keyword: &str) -> Vec<&'a [Token]> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (index, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::ParenOpen => depth += 1,
            TokenKind::ParenClosed => depth = depth.saturating_sub(1),
            TokenKind::Identifier if depth == 0 && token.text == keyword => {
                parts.push(&tokens[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    parts.push(&tokens[start..]);
    parts
}

fn condition_or(
    ctx: &mut ProcessingContext,
    tokens: &[Token],
    scope: ScopeId,
    default_flag: bool,
) -> LessResult<bool> {
    for part in split_on_keyword(tokens, "or") {
        if condition_and(ctx, part, scope, default_flag)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn condition_and(
    ctx: &mut ProcessingContext,
    tokens: &[Token],
    scope: ScopeId,
    default_flag: bool,
) -> LessResult<bool> {
    for part in split_on_keyword(tokens, "and") {
        if !condition_unary(ctx, part, scope, default_flag)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn condition_unary(
    ctx: &mut ProcessingContext,
    tokens: &[Token],
    scope: ScopeId,
    default_flag: bool,
) -> LessResult<bool> {
    let significant: Vec<&Token> = tokens.iter().filter(|t| !t.is_whitespace()).collect();
    if let Some(first) = significant.first() {
        if first.kind == TokenKind::Identifier && first.text == "not" {
            let rest: Vec<Token> = significant[1..].iter().map(|t| (*t).clone()).collect();
            return Ok(!condition_primary(ctx, &rest, scope, default_flag)?);
        }
    }
    let rest: Vec<Token> = significant.into_iter().cloned().collect();
    condition_primary(ctx, &rest, scope, default_flag)
}

fn condition_primary(
    ctx: &mut ProcessingContext,
    tokens: &[Token],
    scope: ScopeId,
    default_flag: bool,
) -> LessResult<bool> {
    if tokens.is_empty() {
        return Ok(false);
    }

    // 整体括号包裹时剥开重来。
    if tokens[0].kind == TokenKind::ParenOpen
        && matching_paren(tokens, 0) == tokens.len() - 1
    {
        let inner: Vec<Token> = tokens[1..tokens.len() - 1].to_vec();
        return condition_or(ctx, &inner, scope, default_flag);
    }

    // default() 谓词。
    if tokens.len() == 3
        && tokens[0].kind == TokenKind::Identifier
        && tokens[0].text == "default"
        && tokens[1].kind == TokenKind::ParenOpen
        && tokens[2].kind == TokenKind::ParenClosed
    {
        return Ok(default_flag);
    }

    // 顶层比较运算符。
    let mut depth = 0usize;
    for (index, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::ParenOpen => depth += 1,
            TokenKind::ParenClosed => depth = depth.saturating_sub(1),
            TokenKind::Other if depth == 0 => {
                if let Some(cmp) = Comparison::from_text(&token.text) {
                    let lhs = condition_operand(ctx, &tokens[..index], scope)?;
                    let rhs = condition_operand(ctx, &tokens[index + 1..], scope)?;
                    return value::compare(cmp, &lhs, &rhs, &token.location);
                }
            }
            _ => {}
        }
    }

    // 没有比较运算时按真值判定。
    let list = TokenList::from_tokens(tokens.iter().cloned());
    match evaluate_single(ctx, &list, scope)? {
        Some(value) => Ok(value.is_truthy()),
        None => Ok(false),
    }
}

fn condition_operand(
    ctx: &mut ProcessingContext,
    tokens: &[Token],
    scope: ScopeId,
) -> LessResult<Value> {
    let list = TokenList::from_tokens(tokens.iter().cloned()).trimmed();
    let location = list.location();
    match evaluate_single(ctx, &list, scope)? {
        Some(value) => Ok(value),
        None => Err(LessError::type_error(
            format!("无法把 '{}' 当作单一值比较", list.normalized()),
            location,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tokenize;

    fn context_with(vars: &[(&str, &str)]) -> ProcessingContext {
        let mut ctx = ProcessingContext::new();
        let root = ctx.scopes.root();
        for (name, value) in vars {
            let tokens = TokenList::from_tokens(tokenize(value).unwrap());
            ctx.scopes
                .define_variable(root, name, VariableValue::Tokens(tokens));
        }
        ctx
    }

    fn process(ctx: &mut ProcessingContext, input: &str) -> String {
        let root = ctx.scopes.root();
        let tokens = TokenList::from_tokens(tokenize(input).unwrap());
        process_value(ctx, &tokens, root).unwrap().stringify()
    }

    #[test]
    fn substitutes_variables() {
        let mut ctx = context_with(&[("w", "10px")]);
        assert_eq!(process(&mut ctx, "@w"), "10px");
    }

    #[test]
    fn unbound_variable_fails() {
        let mut ctx = ProcessingContext::new();
        let root = ctx.scopes.root();
        let tokens = TokenList::from_tokens(tokenize("@missing").unwrap());
        let err = process_value(&mut ctx, &tokens, root).unwrap_err();
        assert!(matches!(err, LessError::UnboundVariable { .. }));
    }

    #[test]
    fn variable_cycle_is_detected() {
        let mut ctx = context_with(&[("a", "@b"), ("b", "@a")]);
        let root = ctx.scopes.root();
        let tokens = TokenList::from_tokens(tokenize("@a").unwrap());
        let err = process_value(&mut ctx, &tokens, root).unwrap_err();
        assert!(matches!(err, LessError::VariableCycle { .. }));
    }

    #[test]
    fn folds_addition_with_units() {
        let mut ctx = ProcessingContext::new();
        assert_eq!(process(&mut ctx, "1px + 2cm"), "76.5906px");
    }

    #[test]
    fn precedence_of_multiplication() {
        let mut ctx = ProcessingContext::new();
        assert_eq!(process(&mut ctx, "2 + 3 * 4"), "14");
    }

    #[test]
    fn parenthesized_groups_fold_and_inline() {
        let mut ctx = context_with(&[("gap", "12px")]);
        assert_eq!(process(&mut ctx, "(@gap * 2)"), "24px");
        assert_eq!(process(&mut ctx, "-(@gap / 2)"), "-6px");
    }

    #[test]
    fn division_outside_parens_between_same_units_is_preserved() {
        let mut ctx = ProcessingContext::new();
        assert_eq!(process(&mut ctx, "10px / 2px"), "10px / 2px");
        assert_eq!(process(&mut ctx, "(10px / 2px)"), "5px");
        assert_eq!(process(&mut ctx, "10px / 2"), "5px");
    }

    #[test]
    fn asymmetric_spacing_keeps_value_list() {
        let mut ctx = ProcessingContext::new();
        assert_eq!(process(&mut ctx, "10px -5px"), "10px -5px");
        assert_eq!(process(&mut ctx, "10px - 5px"), "5px");
    }

    #[test]
    fn known_function_evaluates() {
        let mut ctx = ProcessingContext::new();
        assert_eq!(process(&mut ctx, "percentage(0.5)"), "50%");
        assert_eq!(process(&mut ctx, "lighten(#336699, 20%)"), "#6699cc");
    }

    #[test]
    fn unknown_function_preserved_with_evaluated_arguments() {
        let mut ctx = context_with(&[("blur", "4px")]);
        assert_eq!(
            process(&mut ctx, "drop-shadow(0 0 @blur)"),
            "drop-shadow(0 0 4px)"
        );
    }

    #[test]
    fn calc_preserved_verbatim() {
        let mut ctx = ProcessingContext::new();
        assert_eq!(process(&mut ctx, "calc(100% - 10px)"), "calc(100% - 10px)");
    }

    #[test]
    fn string_interpolation() {
        let mut ctx = context_with(&[("name", "banner")]);
        assert_eq!(process(&mut ctx, "\"img-@{name}.png\""), "\"img-banner.png\"");
    }

    #[test]
    fn lazy_binding_uses_definition_scope() {
        let mut ctx = context_with(&[("a", "@b"), ("b", "1px")]);
        // @a 展开时 @b 在根作用域解析。
        let root = ctx.scopes.root();
        let child = ctx.scopes.child(root);
        let tokens = TokenList::from_tokens(tokenize("@a").unwrap());
        let result = process_value(&mut ctx, &tokens, child).unwrap();
        assert_eq!(result.stringify(), "1px");
    }

    #[test]
    fn comma_segments_fold_independently() {
        let mut ctx = ProcessingContext::new();
        assert_eq!(process(&mut ctx, "1 + 1, 2 + 2"), "2, 4");
    }

    #[test]
    fn conditions_compare_and_combine() {
        let mut ctx = context_with(&[("x", "5")]);
        let root = ctx.scopes.root();
        let check = |ctx: &mut ProcessingContext, input: &str, expected: bool| {
            let tokens = TokenList::from_tokens(tokenize(input).unwrap());
            assert_eq!(
                evaluate_condition(ctx, &tokens, root, false).unwrap(),
                expected,
                "条件: {input}"
            );
        };
        check(&mut ctx, "(@x > 0)", true);
        check(&mut ctx, "(@x < 0)", false);
        check(&mut ctx, "(@x >= 5)", true);
        check(&mut ctx, "(@x =< 5)", true);
        check(&mut ctx, "(@x > 0) and (@x < 10)", true);
        check(&mut ctx, "(@x > 0) and (@x > 10)", false);
        check(&mut ctx, "(@x > 10) or (@x > 0)", true);
        check(&mut ctx, "not (@x > 10)", true);
        check(&mut ctx, "(iscolor(#fff))", true);
    }

    #[test]
    fn default_predicate_uses_flag() {
        let mut ctx = ProcessingContext::new();
        let root = ctx.scopes.root();
        let tokens = TokenList::from_tokens(tokenize("(default())").unwrap());
        assert!(evaluate_condition(&mut ctx, &tokens, root, true).unwrap());
        assert!(!evaluate_condition(&mut ctx, &tokens, root, false).unwrap());
    }

    #[test]
    fn equality_comparison_on_keywords() {
        let mut ctx = context_with(&[("mode", "dark")]);
        let root = ctx.scopes.root();
        let tokens = TokenList::from_tokens(tokenize("(@mode = dark)").unwrap());
        assert!(evaluate_condition(&mut ctx, &tokens, root, false).unwrap());
    }
}
