use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::{MixinDefinition, VariableValue};

/// 作用域句柄。所有帧都由同一个竞技场持有，互相之间只存编号。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeId(usize);

/// mixin 候选：定义本体加上它的词法作用域，调用时在该作用域上开新帧。
#[derive(Debug)]
pub struct MixinEntry {
    pub definition: MixinDefinition,
    pub scope: ScopeId,
}

#[derive(Debug, Default)]
struct Frame {
    parent: Option<ScopeId>,
    variables: IndexMap<String, VariableValue>,
    mixins: IndexMap<String, Vec<Rc<MixinEntry>>>,
}

/// 以父链相连的作用域帧集合。
///
/// 变量查找返回定义帧的编号，惰性求值据此回到文本定义处的作用域。
#[derive(Debug)]
pub struct ScopeArena {
    frames: Vec<Frame>,
}

impl ScopeArena {
    pub fn new() -> Self {
        Self {
            frames: vec![Frame::default()],
        }
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn child(&mut self, parent: ScopeId) -> ScopeId {
        let id = ScopeId(self.frames.len());
        self.frames.push(Frame {
            parent: Some(parent),
            ..Frame::default()
        });
        id
    }

    pub fn define_variable(&mut self, scope: ScopeId, name: &str, value: VariableValue) {
        self.frames[scope.0]
            .variables
            .insert(name.to_string(), value);
    }

    /// 沿父链查找，命中时返回定义帧与绑定值。
    pub fn lookup_variable(&self, from: ScopeId, name: &str) -> Option<(ScopeId, &VariableValue)> {
        let mut cursor = Some(from);
        while let Some(scope) = cursor {
            if let Some(value) = self.frames[scope.0].variables.get(name) {
                return Some((scope, value));
            }
            cursor = self.frames[scope.0].parent;
        }
        None
    }

    pub fn define_mixin(&mut self, scope: ScopeId, name: &str, entry: Rc<MixinEntry>) {
        self.frames[scope.0]
            .mixins
            .entry(name.to_string())
            .or_default()
            .push(entry);
    }

    /// 返回最近一个包含该名字的帧里的候选列表，顺序即定义顺序。
    pub fn lookup_mixins(&self, from: ScopeId, name: &str) -> Option<&[Rc<MixinEntry>]> {
        let mut cursor = Some(from);
        while let Some(scope) = cursor {
            if let Some(list) = self.frames[scope.0].mixins.get(name) {
                return Some(list);
            }
            cursor = self.frames[scope.0].parent;
        }
        None
    }
}

impl Default for ScopeArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{Token, TokenKind, TokenList};

    fn tokens(text: &str) -> VariableValue {
        VariableValue::Tokens(TokenList::from_tokens([Token::synthetic(
            text,
            TokenKind::Identifier,
        )]))
    }

    fn text_of(value: &VariableValue) -> String {
        match value {
            VariableValue::Tokens(list) => list.stringify(),
            VariableValue::Ruleset(_) => "<ruleset>".into(),
        }
    }

    #[test]
    fn lookup_walks_parent_chain() {
        let mut arena = ScopeArena::new();
        let root = arena.root();
        arena.define_variable(root, "base", tokens("red"));
        let inner = arena.child(root);
        let (scope, value) = arena.lookup_variable(inner, "base").unwrap();
        assert_eq!(scope, root);
        assert_eq!(text_of(value), "red");
    }

    #[test]
    fn inner_definition_shadows_outer() {
        let mut arena = ScopeArena::new();
        let root = arena.root();
        arena.define_variable(root, "c", tokens("red"));
        let inner = arena.child(root);
        arena.define_variable(inner, "c", tokens("blue"));
        let (scope, value) = arena.lookup_variable(inner, "c").unwrap();
        assert_eq!(scope, inner);
        assert_eq!(text_of(value), "blue");
        let (_, outer) = arena.lookup_variable(root, "c").unwrap();
        assert_eq!(text_of(outer), "red");
    }

    #[test]
    fn variables_are_not_visible_in_siblings() {
        let mut arena = ScopeArena::new();
        let root = arena.root();
        let left = arena.child(root);
        let right = arena.child(root);
        arena.define_variable(left, "x", tokens("1"));
        assert!(arena.lookup_variable(right, "x").is_none());
    }

    #[test]
    fn redefinition_replaces_in_same_scope() {
        let mut arena = ScopeArena::new();
        let root = arena.root();
        arena.define_variable(root, "x", tokens("1"));
        arena.define_variable(root, "x", tokens("2"));
        let (_, value) = arena.lookup_variable(root, "x").unwrap();
        assert_eq!(text_of(value), "2");
    }
}
