use crate::evaluator::{
    EvaluatedAtRule, EvaluatedDeclaration, EvaluatedMedia, EvaluatedNode, EvaluatedRule,
    EvaluatedStylesheet,
};
use crate::utils::{collapse_whitespace, indent};

/// 负责将扁平化的规则转换为最终 CSS 文本。
pub struct Serializer {
    minify: bool,
}

impl Serializer {
    pub fn new(minify: bool) -> Self {
        Self { minify }
    }

    pub fn to_css(&self, stylesheet: &EvaluatedStylesheet) -> String {
        if self.minify {
            self.render_minified(stylesheet)
        } else {
            self.render_pretty(stylesheet)
        }
    }

    fn render_pretty(&self, stylesheet: &EvaluatedStylesheet) -> String {
        let mut output = String::new();
        for import in &stylesheet.imports {
            output.push_str(import.trim());
            output.push('\n');
        }
        if !stylesheet.imports.is_empty() && !stylesheet.nodes.is_empty() {
            output.push('\n');
        }
        let mut first = true;
        for node in &stylesheet.nodes {
            if node_is_empty(node) {
                continue;
            }
            if !first {
                output.push('\n');
            }
            first = false;
            self.render_node_pretty(node, 0, &mut output);
        }
        output.trim().to_string()
    }

    fn render_minified(&self, stylesheet: &EvaluatedStylesheet) -> String {
        let mut output = String::new();
        for import in &stylesheet.imports {
            output.push_str(import.trim());
            output.push('\n');
        }
        for node in &stylesheet.nodes {
            self.render_node_minified(node, &mut output);
        }
        while output.ends_with('\n') {
            output.pop();
        }
        output
    }

    fn format_declaration(&self, decl: &EvaluatedDeclaration) -> String {
        let mut result = format!("{}: {}", decl.name.trim(), decl.value.trim());
        if decl.important {
            result.push_str(" !important");
        }
        result.push(';');
        result
    }

    fn format_declaration_minified(&self, decl: &EvaluatedDeclaration) -> String {
        let mut result = format!("{}:{}", decl.name.trim(), collapse_whitespace(&decl.value));
        if decl.important {
            result.push_str("!important");
        }
        result
    }

    fn render_node_pretty(&self, node: &EvaluatedNode, level: usize, output: &mut String) {
        match node {
            EvaluatedNode::Comment(text) => {
                output.push_str(&indent(level));
                output.push_str(text.trim());
                output.push('\n');
            }
            EvaluatedNode::Rule(rule) => self.render_rule_pretty(rule, level, output),
            EvaluatedNode::Media(media) => self.render_media_pretty(media, level, output),
            EvaluatedNode::AtRule(at_rule) => self.render_at_rule_pretty(at_rule, level, output),
        }
    }

    fn render_rule_pretty(&self, rule: &EvaluatedRule, level: usize, output: &mut String) {
        if rule.declarations.is_empty() {
            return;
        }
        output.push_str(&indent(level));
        output.push_str(&rule.selectors.join(", "));
        output.push_str(" {\n");
        for decl in &rule.declarations {
            output.push_str(&indent(level + 1));
            output.push_str(&self.format_declaration(decl));
            output.push('\n');
        }
        output.push_str(&indent(level));
        output.push_str("}\n");
    }

    fn render_media_pretty(&self, media: &EvaluatedMedia, level: usize, output: &mut String) {
        if media.declarations.is_empty() && media.nodes.iter().all(node_is_empty) {
            return;
        }
        output.push_str(&indent(level));
        output.push('@');
        output.push_str(&media.name);
        if !media.query.is_empty() {
            output.push(' ');
            output.push_str(media.query.trim());
        }
        output.push_str(" {\n");
        for decl in &media.declarations {
            output.push_str(&indent(level + 1));
            output.push_str(&self.format_declaration(decl));
            output.push('\n');
        }
        for child in &media.nodes {
            self.render_node_pretty(child, level + 1, output);
        }
        output.push_str(&indent(level));
        output.push_str("}\n");
    }

    fn render_at_rule_pretty(&self, at_rule: &EvaluatedAtRule, level: usize, output: &mut String) {
        output.push_str(&indent(level));
        output.push('@');
        output.push_str(&at_rule.name);
        if !at_rule.params.is_empty() {
            output.push(' ');
            output.push_str(at_rule.params.trim());
        }
        if at_rule.declarations.is_empty() && at_rule.children.is_empty() {
            output.push_str(";\n");
            return;
        }
        output.push_str(" {\n");
        for decl in &at_rule.declarations {
            output.push_str(&indent(level + 1));
            output.push_str(&self.format_declaration(decl));
            output.push('\n');
        }
        for child in &at_rule.children {
            self.render_node_pretty(child, level + 1, output);
        }
        output.push_str(&indent(level));
        output.push_str("}\n");
    }

    fn render_node_minified(&self, node: &EvaluatedNode, output: &mut String) {
        match node {
            // 压缩输出丢弃注释。
            EvaluatedNode::Comment(_) => {}
            EvaluatedNode::Rule(rule) => self.render_rule_minified(rule, output),
            EvaluatedNode::Media(media) => self.render_media_minified(media, output),
            EvaluatedNode::AtRule(at_rule) => self.render_at_rule_minified(at_rule, output),
        }
    }

    fn render_rule_minified(&self, rule: &EvaluatedRule, output: &mut String) {
        if rule.declarations.is_empty() {
            return;
        }
        output.push_str(&rule.selectors.join(","));
        output.push('{');
        for (index, decl) in rule.declarations.iter().enumerate() {
            if index > 0 {
                output.push(';');
            }
            output.push_str(&self.format_declaration_minified(decl));
        }
        output.push('}');
    }

    fn render_media_minified(&self, media: &EvaluatedMedia, output: &mut String) {
        if media.declarations.is_empty() && media.nodes.iter().all(node_is_empty) {
            return;
        }
        output.push('@');
        output.push_str(&media.name);
        if !media.query.is_empty() {
            output.push(' ');
            output.push_str(&collapse_whitespace(&media.query));
        }
        output.push('{');
        for (index, decl) in media.declarations.iter().enumerate() {
            if index > 0 {
                output.push(';');
            }
            output.push_str(&self.format_declaration_minified(decl));
        }
        for child in &media.nodes {
            self.render_node_minified(child, output);
        }
        output.push('}');
    }

    fn render_at_rule_minified(&self, at_rule: &EvaluatedAtRule, output: &mut String) {
        output.push('@');
        output.push_str(&at_rule.name);
        if !at_rule.params.trim().is_empty() {
            output.push(' ');
            output.push_str(&collapse_whitespace(&at_rule.params));
        }
        if at_rule.declarations.is_empty() && at_rule.children.is_empty() {
            output.push(';');
            return;
        }
        output.push('{');
        for (index, decl) in at_rule.declarations.iter().enumerate() {
            if index > 0 {
                output.push(';');
            }
            output.push_str(&self.format_declaration_minified(decl));
        }
        for child in &at_rule.children {
            self.render_node_minified(child, output);
        }
        output.push('}');
    }
}

/// 求值后没有任何内容的节点不输出。
fn node_is_empty(node: &EvaluatedNode) -> bool {
    match node {
        EvaluatedNode::Comment(_) => false,
        EvaluatedNode::Rule(rule) => rule.declarations.is_empty(),
        EvaluatedNode::Media(media) => {
            media.declarations.is_empty() && media.nodes.iter().all(node_is_empty)
        }
        EvaluatedNode::AtRule(at_rule) => {
            at_rule.name != "charset"
                && at_rule.name != "import"
                && at_rule.declarations.is_empty()
                && at_rule.children.iter().all(node_is_empty)
                && at_rule.params.is_empty()
        }
    }
}
