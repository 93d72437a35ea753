use std::rc::Rc;

use tracing::{debug, trace};

use crate::ast::{
    AtRule, Declaration, MediaQuery, MixinCall, MixinDefinition, MixinParam, Ruleset, Selector,
    Statement, Stylesheet, VariableDeclaration, VariableValue,
};
use crate::error::{LessError, LessResult};
use crate::extend::{apply_extensions, Extension};
use crate::processor::{
    evaluate_condition, interpolate_text, process_value, ProcessingContext,
};
use crate::scope::{MixinEntry, ScopeId};
use crate::token::TokenList;
use crate::CompileOptions;

/// 经过语义求值后的扁平 CSS 树。
#[derive(Debug, Clone)]
pub struct EvaluatedStylesheet {
    pub imports: Vec<String>,
    pub nodes: Vec<EvaluatedNode>,
}

#[derive(Debug, Clone)]
pub enum EvaluatedNode {
    Comment(String),
    Rule(EvaluatedRule),
    Media(EvaluatedMedia),
    AtRule(EvaluatedAtRule),
}

#[derive(Debug, Clone)]
pub struct EvaluatedRule {
    pub selectors: Vec<String>,
    pub declarations: Vec<EvaluatedDeclaration>,
}

/// `@media`/`@supports` 节点，总是出现在输出顶层。
#[derive(Debug, Clone)]
pub struct EvaluatedMedia {
    pub name: String,
    pub query: String,
    pub declarations: Vec<EvaluatedDeclaration>,
    pub nodes: Vec<EvaluatedNode>,
}

#[derive(Debug, Clone)]
pub struct EvaluatedAtRule {
    pub name: String,
    pub params: String,
    pub declarations: Vec<EvaluatedDeclaration>,
    pub children: Vec<EvaluatedNode>,
}

#[derive(Debug, Clone)]
pub struct EvaluatedDeclaration {
    pub name: String,
    pub value: String,
    pub important: bool,
}

/// 负责把 LESS 树求值成扁平 CSS 规则，并收集 extend 关系。
pub struct Evaluator {
    ctx: ProcessingContext,
    extensions: Vec<Extension>,
}

impl Evaluator {
    pub fn new(options: CompileOptions) -> Self {
        let _ = options;
        Self {
            ctx: ProcessingContext::new(),
            extensions: Vec::new(),
        }
    }

    pub fn evaluate(&mut self, stylesheet: Stylesheet) -> LessResult<EvaluatedStylesheet> {
        let root = self.ctx.scopes.root();
        let mut imports = Vec::new();
        let mut nodes = Vec::new();

        self.register_body(&stylesheet.statements, root);

        for statement in &stylesheet.statements {
            match statement {
                Statement::Import(import) => imports.push(import.raw.clone()),
                Statement::Comment(text) => nodes.push(EvaluatedNode::Comment(text.clone())),
                Statement::Variable(var) => self.define_variable(var, root),
                Statement::Ruleset(rule) => {
                    let produced = self.eval_ruleset(rule, &[], root)?;
                    nodes.extend(produced);
                }
                Statement::Media(media) => {
                    let produced = self.eval_media(media, &[], root, None)?;
                    nodes.extend(produced);
                }
                Statement::AtRule(at_rule) => {
                    nodes.push(EvaluatedNode::AtRule(self.eval_at_rule(at_rule, root)?));
                }
                Statement::MixinDefinition(_) => {}
                Statement::MixinCall(call) => {
                    let mut declarations = Vec::new();
                    let mut produced = Vec::new();
                    self.expand_mixin(call, &[], root, &mut declarations, &mut produced)?;
                    if !declarations.is_empty() {
                        return Err(LessError::type_error(
                            "顶层 mixin 调用产生了无法附加的声明",
                            call.location.clone(),
                        ));
                    }
                    nodes.extend(produced);
                }
                Statement::DetachedCall(call) => {
                    let mut declarations = Vec::new();
                    let mut produced = Vec::new();
                    self.invoke_detached(call, &[], root, &mut declarations, &mut produced)?;
                    if !declarations.is_empty() {
                        return Err(LessError::type_error(
                            "顶层规则集调用产生了无法附加的声明",
                            call.location.clone(),
                        ));
                    }
                    nodes.extend(produced);
                }
                Statement::Declaration(decl) => {
                    return Err(LessError::type_error(
                        format!("顶层不允许出现声明 {}", decl.name),
                        decl.value.location(),
                    ));
                }
                Statement::Extend(_) => {
                    return Err(LessError::type_error(
                        "&:extend 只能出现在规则集内",
                        Default::default(),
                    ));
                }
            }
        }

        apply_extensions(&mut nodes, &self.extensions);

        Ok(EvaluatedStylesheet { imports, nodes })
    }

    /// 变量按未求值的 token 序列绑定，使用处才在定义作用域里求值。
    fn define_variable(&mut self, var: &VariableDeclaration, scope: ScopeId) {
        self.ctx
            .scopes
            .define_variable(scope, &var.name, var.value.clone());
    }

    /// 在处理语句之前登记整个块里的 mixin 定义与可调用规则集，
    /// 这样调用可以出现在定义之前，定义顺序仍然保留。
    fn register_body(&mut self, statements: &[Statement], scope: ScopeId) {
        for statement in statements {
            match statement {
                Statement::MixinDefinition(def) => {
                    self.ctx.scopes.define_mixin(
                        scope,
                        &def.name,
                        Rc::new(MixinEntry {
                            definition: def.clone(),
                            scope,
                        }),
                    );
                }
                Statement::Ruleset(rule) => {
                    if let Some(name) = rule.selector.simple_callable_name() {
                        self.ctx.scopes.define_mixin(
                            scope,
                            &name,
                            Rc::new(MixinEntry {
                                definition: MixinDefinition {
                                    name: name.clone(),
                                    params: Vec::new(),
                                    rest: None,
                                    unlimited: false,
                                    guards: Vec::new(),
                                    body: rule.body.clone(),
                                    reference: rule.reference,
                                },
                                scope,
                            }),
                        );
                    }
                }
                _ => {}
            }
        }
    }

    fn eval_ruleset(
        &mut self,
        rule: &Ruleset,
        parent_selectors: &[String],
        parent_scope: ScopeId,
    ) -> LessResult<Vec<EvaluatedNode>> {
        let scope = self.ctx.scopes.child(parent_scope);
        self.register_body(&rule.body, scope);

        let selectors = self.flatten_selector(&rule.selector, parent_selectors, scope)?;

        let mut declarations = Vec::new();
        let mut pending: Vec<EvaluatedNode> = Vec::new();
        for item in &rule.body {
            self.process_body_item(item, &selectors, scope, &mut declarations, &mut pending)?;
        }

        // reference 规则集只参与解析，不产生输出。
        if rule.reference {
            return Ok(Vec::new());
        }

        let mut output = Vec::new();
        if !declarations.is_empty() {
            output.push(EvaluatedNode::Rule(EvaluatedRule {
                selectors: selectors.clone(),
                declarations,
            }));
        }
        output.extend(pending);
        Ok(output)
    }

    /// 展开选择器：剥离 extend 子句、插值、与父选择器做叉积。
    fn flatten_selector(
        &mut self,
        selector: &Selector,
        parents: &[String],
        scope: ScopeId,
    ) -> LessResult<Vec<String>> {
        let mut cleaned = Vec::new();
        for component in selector.components() {
            let (clean, targets) = Selector::strip_extend(&component);
            let location = clean.location();
            let text = interpolate_text(&mut self.ctx, &clean.normalized(), scope, &location)?;
            cleaned.push((text, targets));
        }

        let mut flattened = Vec::new();
        let mut push = |this: &mut Self, combined: String, targets: &[crate::ast::ExtendTarget]| {
            for target in targets {
                trace!(extend_target = %target.selector.normalized(), source = %combined, "登记 extend");
                this.extensions.push(Extension {
                    target: target.selector.normalized(),
                    source: combined.clone(),
                    all: target.all,
                });
            }
            flattened.push(combined);
        };

        if parents.is_empty() {
            for (text, targets) in &cleaned {
                let combined = text.replace('&', "").trim().to_string();
                if !combined.is_empty() {
                    push(self, combined, targets);
                }
            }
        } else {
            for parent in parents {
                for (text, targets) in &cleaned {
                    push(self, combine_component(parent, text), targets);
                }
            }
        }
        Ok(flattened)
    }

    fn process_body_item(
        &mut self,
        item: &Statement,
        selectors: &[String],
        scope: ScopeId,
        declarations: &mut Vec<EvaluatedDeclaration>,
        pending: &mut Vec<EvaluatedNode>,
    ) -> LessResult<()> {
        match item {
            Statement::Variable(var) => self.define_variable(var, scope),
            Statement::Declaration(decl) => {
                declarations.push(self.eval_declaration(decl, scope)?);
            }
            Statement::Ruleset(nested) => {
                let produced = self.eval_ruleset(nested, selectors, scope)?;
                pending.extend(produced);
            }
            Statement::Media(media) => {
                let produced = self.eval_media(media, selectors, scope, None)?;
                pending.extend(produced);
            }
            Statement::AtRule(at_rule) => {
                pending.push(EvaluatedNode::AtRule(self.eval_at_rule(at_rule, scope)?));
            }
            Statement::MixinDefinition(_) => {}
            Statement::MixinCall(call) => {
                self.expand_mixin(call, selectors, scope, declarations, pending)?;
            }
            Statement::DetachedCall(call) => {
                self.invoke_detached(call, selectors, scope, declarations, pending)?;
            }
            Statement::Extend(extend) => {
                for target in &extend.targets {
                    for source in selectors {
                        self.extensions.push(Extension {
                            target: target.selector.normalized(),
                            source: source.clone(),
                            all: target.all,
                        });
                    }
                }
            }
            Statement::Comment(_) => {}
            Statement::Import(_) => {}
        }
        Ok(())
    }

    fn eval_declaration(
        &mut self,
        decl: &Declaration,
        scope: ScopeId,
    ) -> LessResult<EvaluatedDeclaration> {
        let location = decl.value.location();
        let name = interpolate_text(&mut self.ctx, &decl.name, scope, &location)?;
        let mut value = process_value(&mut self.ctx, &decl.value, scope)?
            .stringify()
            .trim()
            .to_string();
        let mut important = decl.important;
        // 变量代入后也可能携带 !important。
        if !important {
            if let Some(stripped) = strip_important(&value) {
                value = stripped;
                important = true;
            }
        }
        Ok(EvaluatedDeclaration {
            name,
            value,
            important,
        })
    }

    fn eval_media(
        &mut self,
        media: &MediaQuery,
        selectors: &[String],
        parent_scope: ScopeId,
        enclosing_query: Option<&str>,
    ) -> LessResult<Vec<EvaluatedNode>> {
        let scope = self.ctx.scopes.child(parent_scope);
        self.register_body(&media.body, scope);

        let own_query = process_value(&mut self.ctx, &media.query, scope)?
            .stringify()
            .trim()
            .to_string();
        let query = match enclosing_query {
            Some(outer) => format!("{outer} and {own_query}"),
            None => own_query,
        };

        let mut declarations = Vec::new();
        let mut nodes: Vec<EvaluatedNode> = Vec::new();
        let mut bubbled: Vec<EvaluatedNode> = Vec::new();

        for item in &media.body {
            match item {
                Statement::Media(nested) => {
                    let produced = self.eval_media(nested, selectors, scope, Some(query.as_str()))?;
                    bubbled.extend(produced);
                }
                _ => self.process_body_item(item, selectors, scope, &mut declarations, &mut nodes)?,
            }
        }

        // 被媒体查询限定的声明包在外层选择器的副本里。
        let mut inner: Vec<EvaluatedNode> = Vec::new();
        let mut direct = Vec::new();
        if declarations.is_empty() {
            // 无直接声明
        } else if selectors.is_empty() {
            direct = declarations;
        } else {
            inner.push(EvaluatedNode::Rule(EvaluatedRule {
                selectors: selectors.to_vec(),
                declarations,
            }));
        }
        inner.extend(nodes);

        let mut output = vec![EvaluatedNode::Media(EvaluatedMedia {
            name: media.name.clone(),
            query,
            declarations: direct,
            nodes: inner,
        })];
        output.extend(bubbled);
        Ok(output)
    }

    /// `@font-face`、`@keyframes` 这类块级 at-rule。内部规则不参与选择器展开。
    fn eval_at_rule(&mut self, at_rule: &AtRule, parent_scope: ScopeId) -> LessResult<EvaluatedAtRule> {
        let scope = self.ctx.scopes.child(parent_scope);
        let params = process_value(&mut self.ctx, &at_rule.prelude, scope)?
            .stringify()
            .trim()
            .to_string();

        let mut declarations = Vec::new();
        let mut children: Vec<EvaluatedNode> = Vec::new();
        if let Some(body) = &at_rule.body {
            self.register_body(body, scope);
            for item in body {
                self.process_body_item(item, &[], scope, &mut declarations, &mut children)?;
            }
        }

        Ok(EvaluatedAtRule {
            name: at_rule.name.clone(),
            params,
            declarations,
            children,
        })
    }

    fn invoke_detached(
        &mut self,
        call: &crate::ast::DetachedCall,
        selectors: &[String],
        scope: ScopeId,
        declarations: &mut Vec<EvaluatedDeclaration>,
        pending: &mut Vec<EvaluatedNode>,
    ) -> LessResult<()> {
        let (defining_scope, binding) =
            match self.ctx.scopes.lookup_variable(scope, &call.name) {
                Some(found) => found,
                None => {
                    return Err(LessError::unbound_variable(
                        call.name.clone(),
                        call.location.clone(),
                    ));
                }
            };
        let body = match binding {
            VariableValue::Ruleset(body) => body.clone(),
            VariableValue::Tokens(_) => {
                return Err(LessError::type_error(
                    format!("变量 @{} 不是可调用的规则集", call.name),
                    call.location.clone(),
                ));
            }
        };

        self.ctx.enter()?;
        let frame = self.ctx.scopes.child(defining_scope);
        self.register_body(&body, frame);
        let result = (|| {
            for item in &body {
                self.process_body_item(item, selectors, frame, declarations, pending)?;
            }
            Ok(())
        })();
        self.ctx.leave();
        result
    }

    /// mixin 解析与调用：名字路径 → 参数数量 → 模式 → 守卫，幸存者依定义序展开。
    fn expand_mixin(
        &mut self,
        call: &MixinCall,
        selectors: &[String],
        scope: ScopeId,
        declarations: &mut Vec<EvaluatedDeclaration>,
        pending: &mut Vec<EvaluatedNode>,
    ) -> LessResult<()> {
        self.ctx.enter()?;
        let result = self.expand_mixin_inner(call, selectors, scope, declarations, pending);
        self.ctx.leave();
        result
    }

    fn expand_mixin_inner(
        &mut self,
        call: &MixinCall,
        selectors: &[String],
        scope: ScopeId,
        declarations: &mut Vec<EvaluatedDeclaration>,
        pending: &mut Vec<EvaluatedNode>,
    ) -> LessResult<()> {
        let candidates = self.resolve_path(&call.path, scope)?;
        if candidates.is_empty() {
            return Err(LessError::MixinNotFound {
                name: call.display_name(),
                location: call.location.clone(),
            });
        }

        // 实参在调用处作用域求值一次。
        let mut named_args: Vec<(String, TokenList)> = Vec::new();
        let mut positional_args: Vec<TokenList> = Vec::new();
        let mut all_args: Vec<TokenList> = Vec::new();
        for arg in &call.args {
            let evaluated = process_value(&mut self.ctx, &arg.value, scope)?;
            all_args.push(evaluated.clone());
            match &arg.name {
                Some(name) => named_args.push((name.clone(), evaluated)),
                None => positional_args.push(evaluated),
            }
        }

        let passed = call.args.len();
        let arity_ok: Vec<Rc<MixinEntry>> = candidates
            .iter()
            .filter(|entry| entry.definition.accepts_arity(passed))
            .cloned()
            .collect();
        if arity_ok.is_empty() {
            return Err(LessError::Arity {
                name: call.display_name(),
                message: format!("没有接受 {passed} 个参数的定义"),
                location: call.location.clone(),
            });
        }

        let matched: Vec<Rc<MixinEntry>> = arity_ok
            .into_iter()
            .filter(|entry| self.patterns_match(&entry.definition, &positional_args))
            .collect();
        debug!(
            mixin = %call.display_name(),
            candidates = matched.len(),
            "mixin 候选筛选完成"
        );

        let has_guardless = matched
            .iter()
            .any(|entry| entry.definition.guards.is_empty());

        let mut expanded = 0usize;
        for entry in &matched {
            let frame = self.bind_arguments(
                entry,
                &named_args,
                &positional_args,
                &all_args,
                call,
            )?;

            if !entry.definition.guards.is_empty() {
                let mut satisfied = true;
                for guard in &entry.definition.guards {
                    if !evaluate_condition(&mut self.ctx, guard, frame, !has_guardless)? {
                        satisfied = false;
                        break;
                    }
                }
                if !satisfied {
                    continue;
                }
            }

            expanded += 1;
            self.register_body(&entry.definition.body, frame);
            for item in &entry.definition.body {
                self.process_body_item(item, selectors, frame, declarations, pending)?;
            }
        }

        if expanded == 0 {
            return Err(LessError::MixinNotFound {
                name: call.display_name(),
                location: call.location.clone(),
            });
        }
        Ok(())
    }

    /// `a.b.c` 式嵌套查找：先解析首段，再在每个候选的定义体里继续。
    fn resolve_path(&mut self, path: &[String], scope: ScopeId) -> LessResult<Vec<Rc<MixinEntry>>> {
        let mut current: Vec<Rc<MixinEntry>> = match self.ctx.scopes.lookup_mixins(scope, &path[0])
        {
            Some(list) => list.to_vec(),
            None => Vec::new(),
        };

        for segment in &path[1..] {
            let mut next = Vec::new();
            for entry in &current {
                // 中间层的变量声明装进临时帧，内层 mixin 惰性可见。
                let materialized = self.ctx.scopes.child(entry.scope);
                for item in &entry.definition.body {
                    if let Statement::Variable(var) = item {
                        self.define_variable(var, materialized);
                    }
                }
                self.register_body(&entry.definition.body, materialized);
                if let Some(list) = self.ctx.scopes.lookup_mixins(materialized, segment) {
                    next.extend(list.to_vec());
                }
            }
            current = next;
        }
        Ok(current)
    }

    /// 形参位置上的字面量要求对应实参逐字相等。
    fn patterns_match(&self, definition: &MixinDefinition, positional: &[TokenList]) -> bool {
        let mut index = 0usize;
        for param in &definition.params {
            match param {
                MixinParam::Pattern(expected) => {
                    match positional.get(index) {
                        Some(actual) if actual.normalized() == expected.text => {}
                        _ => return false,
                    }
                    index += 1;
                }
                MixinParam::Named { .. } => index += 1,
            }
        }
        true
    }

    /// 在定义作用域上开新帧并装入实参绑定。
    fn bind_arguments(
        &mut self,
        entry: &MixinEntry,
        named_args: &[(String, TokenList)],
        positional_args: &[TokenList],
        all_args: &[TokenList],
        call: &MixinCall,
    ) -> LessResult<ScopeId> {
        let frame = self.ctx.scopes.child(entry.scope);
        let definition = &entry.definition;

        let named_bound: Vec<&str> = named_args.iter().map(|(name, _)| name.as_str()).collect();
        for (name, value) in named_args {
            self.ctx
                .scopes
                .define_variable(frame, name, VariableValue::Tokens(value.clone()));
        }

        let mut position = 0usize;
        for param in &definition.params {
            match param {
                MixinParam::Pattern(_) => {
                    position += 1;
                }
                MixinParam::Named { name, default } => {
                    if named_bound.contains(&name.as_str()) {
                        continue;
                    }
                    if let Some(actual) = positional_args.get(position) {
                        self.ctx.scopes.define_variable(
                            frame,
                            name,
                            VariableValue::Tokens(actual.clone()),
                        );
                        position += 1;
                    } else if let Some(default) = default {
                        // 默认值保持未求值，使用时在定义作用域（含参数帧）里才展开。
                        self.ctx.scopes.define_variable(
                            frame,
                            name,
                            VariableValue::Tokens(default.clone()),
                        );
                    } else {
                        return Err(LessError::Arity {
                            name: definition.name.clone(),
                            message: format!("缺少必填参数 @{name}"),
                            location: call.location.clone(),
                        });
                    }
                }
            }
        }

        if definition.unlimited {
            if let Some(rest_name) = &definition.rest {
                let mut rest = TokenList::new();
                for leftover in positional_args.iter().skip(position) {
                    for token in leftover.iter().filter(|t| !t.is_whitespace()).cloned() {
                        rest.push_spaced(token);
                    }
                }
                self.ctx
                    .scopes
                    .define_variable(frame, rest_name, VariableValue::Tokens(rest));
            }
        }

        let mut arguments = TokenList::new();
        for arg in all_args {
            for token in arg.iter().filter(|t| !t.is_whitespace()).cloned() {
                arguments.push_spaced(token);
            }
        }
        self.ctx
            .scopes
            .define_variable(frame, "arguments", VariableValue::Tokens(arguments));

        Ok(frame)
    }
}

/// 合并父子选择器，`&` 被父选择器原文替换，否则用后代组合符连接。
fn combine_component(parent: &str, component: &str) -> String {
    if component.contains('&') {
        component.replace('&', parent).trim().to_string()
    } else {
        format!("{} {}", parent.trim(), component.trim())
    }
}

/// 检测并剥离 `!important` 标记，返回去除后的值。
fn strip_important(value: &str) -> Option<String> {
    let trimmed = value.trim_end();
    if trimmed.ends_with("!important") {
        let index = trimmed.len() - "!important".len();
        let without = trimmed[..index].trim_end();
        return Some(without.to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::LessParser;

    fn evaluate(input: &str) -> EvaluatedStylesheet {
        let stylesheet = LessParser::new().parse(input).unwrap();
        Evaluator::new(CompileOptions::default())
            .evaluate(stylesheet)
            .unwrap()
    }

    fn evaluate_err(input: &str) -> LessError {
        let stylesheet = LessParser::new().parse(input).unwrap();
        Evaluator::new(CompileOptions::default())
            .evaluate(stylesheet)
            .unwrap_err()
    }

    fn first_rule(sheet: &EvaluatedStylesheet) -> &EvaluatedRule {
        sheet
            .nodes
            .iter()
            .find_map(|node| match node {
                EvaluatedNode::Rule(rule) => Some(rule),
                _ => None,
            })
            .expect("期望至少一条规则")
    }

    #[test]
    fn selector_flattening_is_associative() {
        let nested = evaluate("a { b { c { x: 1; } } }");
        let flat = evaluate("a b { c { x: 1; } }");
        let direct = evaluate("a b c { x: 1; }");
        assert_eq!(first_rule(&nested).selectors, vec!["a b c".to_string()]);
        assert_eq!(first_rule(&flat).selectors, vec!["a b c".to_string()]);
        assert_eq!(first_rule(&direct).selectors, vec!["a b c".to_string()]);
    }

    #[test]
    fn parent_reference_replaces_ampersand() {
        let sheet = evaluate("a { &:hover { color: red; } }");
        let rule = first_rule(&sheet);
        assert_eq!(rule.selectors, vec!["a:hover".to_string()]);
    }

    #[test]
    fn comma_cross_product() {
        let sheet = evaluate("a, b { c, d { x: 1; } }");
        let rule = first_rule(&sheet);
        assert_eq!(
            rule.selectors,
            vec!["a c", "a d", "b c", "b d"]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn variables_are_scope_honest() {
        let err = evaluate_err("a { @x: 1; } b { width: @x; }");
        assert!(matches!(err, LessError::UnboundVariable { .. }));
    }

    #[test]
    fn lazy_variables_take_last_definition_at_use() {
        let sheet = evaluate("@v: 1px; a { width: @v; }");
        assert_eq!(first_rule(&sheet).declarations[0].value, "1px");
    }

    #[test]
    fn mixin_with_default_argument() {
        let sheet = evaluate(".m(@c: red) { color: @c; } a { .m(); } b { .m(blue); }");
        let rules: Vec<&EvaluatedRule> = sheet
            .nodes
            .iter()
            .filter_map(|n| match n {
                EvaluatedNode::Rule(rule) => Some(rule),
                _ => None,
            })
            .collect();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].declarations[0].value, "red");
        assert_eq!(rules[1].declarations[0].value, "blue");
    }

    #[test]
    fn mixin_named_arguments() {
        let sheet = evaluate(".m(@a: 1px, @b: 2px) { margin: @a @b; } x { .m(@b: 9px); }");
        assert_eq!(first_rule(&sheet).declarations[0].value, "1px 9px");
    }

    #[test]
    fn mixin_guards_dispatch() {
        let sheet = evaluate(
            ".m(@x) when (@x > 0) { a: pos; } .m(@x) when (@x < 0) { a: neg; } b { .m(1); .m(-1); }",
        );
        let rule = first_rule(&sheet);
        assert_eq!(rule.declarations.len(), 2);
        assert_eq!(rule.declarations[0].value, "pos");
        assert_eq!(rule.declarations[1].value, "neg");
    }

    #[test]
    fn default_guard_fires_when_others_fail() {
        let sheet = evaluate(
            ".m(@x) when (@x > 0) { a: pos; } .m(@x) when (default()) { a: other; } b { .m(-5); }",
        );
        assert_eq!(first_rule(&sheet).declarations[0].value, "other");
    }

    #[test]
    fn pattern_matching_selects_candidate() {
        let sheet = evaluate(
            ".m(dark, @c) { color: darken(@c, 10%); } .m(light, @c) { color: lighten(@c, 20%); } a { .m(light, #336699); }",
        );
        assert_eq!(first_rule(&sheet).declarations[0].value, "#6699cc");
    }

    #[test]
    fn rest_arguments_and_arguments_variable() {
        let sheet = evaluate(".m(@a, @rest...) { x: @rest; y: @arguments; } b { .m(1, 2, 3); }");
        let rule = first_rule(&sheet);
        assert_eq!(rule.declarations[0].value, "2 3");
        assert_eq!(rule.declarations[1].value, "1 2 3");
    }

    #[test]
    fn arity_error_when_no_arity_matches() {
        let err = evaluate_err(".m(@a, @b) { x: @a; } b { .m(1); }");
        assert!(matches!(err, LessError::Arity { .. }));
    }

    #[test]
    fn missing_mixin_is_reported() {
        let err = evaluate_err("a { .nope(); }");
        assert!(matches!(err, LessError::MixinNotFound { .. }));
    }

    #[test]
    fn nested_mixin_path() {
        let sheet = evaluate("#ns { .inner() { color: red; } } a { #ns > .inner(); }");
        assert_eq!(first_rule(&sheet).declarations[0].value, "red");
    }

    #[test]
    fn plain_ruleset_is_callable() {
        let sheet = evaluate(".base { color: red; } a { .base; }");
        let rules: Vec<&EvaluatedRule> = sheet
            .nodes
            .iter()
            .filter_map(|n| match n {
                EvaluatedNode::Rule(rule) => Some(rule),
                _ => None,
            })
            .collect();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[1].selectors, vec!["a".to_string()]);
        assert_eq!(rules[1].declarations[0].value, "red");
    }

    #[test]
    fn recursion_limit_guards_self_reference() {
        let err = evaluate_err(".m() { .m(); } a { .m(); }");
        assert!(matches!(err, LessError::RecursionLimit { .. }));
    }

    #[test]
    fn media_bubbles_with_selector_copy() {
        let sheet = evaluate("a { color: red; @media (min-width: 800px) { color: blue; } }");
        let media = sheet
            .nodes
            .iter()
            .find_map(|node| match node {
                EvaluatedNode::Media(media) => Some(media),
                _ => None,
            })
            .expect("期望媒体查询节点");
        assert_eq!(media.query, "(min-width: 800px)");
        match &media.nodes[0] {
            EvaluatedNode::Rule(rule) => {
                assert_eq!(rule.selectors, vec!["a".to_string()]);
                assert_eq!(rule.declarations[0].value, "blue");
            }
            other => panic!("意外的节点: {other:?}"),
        }
    }

    #[test]
    fn nested_media_queries_combine() {
        let sheet = evaluate(
            "@media screen { @media (min-width: 800px) { a { x: 1; } } }",
        );
        let queries: Vec<&str> = sheet
            .nodes
            .iter()
            .filter_map(|node| match node {
                EvaluatedNode::Media(media) => Some(media.query.as_str()),
                _ => None,
            })
            .collect();
        assert!(queries.contains(&"screen and (min-width: 800px)"));
    }

    #[test]
    fn detached_ruleset_invocation() {
        let sheet = evaluate("@panel: { color: red; }; a { @panel(); }");
        assert_eq!(first_rule(&sheet).declarations[0].value, "red");
    }

    #[test]
    fn extend_appends_selector() {
        let sheet = evaluate(".a { color: red; } .b:extend(.a) { font-weight: bold; }");
        let rule = first_rule(&sheet);
        assert_eq!(rule.selectors, vec![".a".to_string(), ".b".to_string()]);
    }

    #[test]
    fn reference_ruleset_emits_nothing_directly() {
        let stylesheet = LessParser::new().parse(".hidden { color: red; } a { .hidden; }").unwrap();
        let mut stylesheet = stylesheet;
        if let Statement::Ruleset(rule) = &mut stylesheet.statements[0] {
            rule.reference = true;
        }
        let sheet = Evaluator::new(CompileOptions::default())
            .evaluate(stylesheet)
            .unwrap();
        let rules: Vec<&EvaluatedRule> = sheet
            .nodes
            .iter()
            .filter_map(|n| match n {
                EvaluatedNode::Rule(rule) => Some(rule),
                _ => None,
            })
            .collect();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].selectors, vec!["a".to_string()]);
    }

    #[test]
    fn important_from_variable_value() {
        let sheet = evaluate("@v: 10px !important; a { margin: @v; }");
        let decl = &first_rule(&sheet).declarations[0];
        assert_eq!(decl.value, "10px");
        assert!(decl.important);
    }
}
