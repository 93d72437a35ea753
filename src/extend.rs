use tracing::debug;

use crate::evaluator::EvaluatedNode;
use crate::utils::collapse_whitespace;

/// 一条 extend 关系：target 被扩展的选择器，source 要追加的选择器。
/// `all` 模式按子串改写，否则要求整个组成部分相等。
#[derive(Debug, Clone)]
pub struct Extension {
    pub target: String,
    pub source: String,
    pub all: bool,
}

/// 主遍历结束后对输出选择器做改写。
///
/// 改写具有传递性：新增的组成部分继续参与匹配，迭代次数以
/// 扩展数量的平方为上界，保证结果与应用顺序无关。
pub fn apply_extensions(nodes: &mut [EvaluatedNode], extensions: &[Extension]) {
    if extensions.is_empty() {
        return;
    }
    let rounds = extensions.len() * extensions.len() + 1;
    for node in nodes.iter_mut() {
        apply_to_node(node, extensions, rounds);
    }
}

fn apply_to_node(node: &mut EvaluatedNode, extensions: &[Extension], rounds: usize) {
    match node {
        EvaluatedNode::Rule(rule) => {
            apply_to_selectors(&mut rule.selectors, extensions, rounds);
        }
        EvaluatedNode::Media(media) => {
            for child in &mut media.nodes {
                apply_to_node(child, extensions, rounds);
            }
        }
        EvaluatedNode::AtRule(at_rule) => {
            for child in &mut at_rule.children {
                apply_to_node(child, extensions, rounds);
            }
        }
        EvaluatedNode::Comment(_) => {}
    }
}

fn apply_to_selectors(selectors: &mut Vec<String>, extensions: &[Extension], rounds: usize) {
    for _ in 0..rounds {
        let mut changed = false;
        for extension in extensions {
            let snapshot = selectors.clone();
            for component in &snapshot {
                if extension.all {
                    for rewritten in
                        rewrite_occurrences(component, &extension.target, &extension.source)
                    {
                        if !selectors.contains(&rewritten) {
                            debug!(component = %component, rewritten = %rewritten, "extend 改写");
                            selectors.push(rewritten);
                            changed = true;
                        }
                    }
                } else if collapse_whitespace(component) == extension.target
                    && !selectors.contains(&extension.source)
                {
                    debug!(extend_target = %extension.target, source = %extension.source, "extend 追加");
                    selectors.push(extension.source.clone());
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
    }
}

/// `all` 模式：找到所有被组合符或组成部分边界界定的出现位置，
/// 每处替换产生一个新的组成部分。
fn rewrite_occurrences(component: &str, target: &str, source: &str) -> Vec<String> {
    let mut results = Vec::new();
    if target.is_empty() {
        return results;
    }
    let mut search_from = 0usize;
    while let Some(found) = component[search_from..].find(target) {
        let index = search_from + found;
        let before = component[..index].chars().last();
        let after = component[index + target.len()..].chars().next();
        if starts_at_boundary(before, target) && ends_at_boundary(after) {
            let mut rewritten = String::with_capacity(component.len());
            rewritten.push_str(&component[..index]);
            rewritten.push_str(source);
            rewritten.push_str(&component[index + target.len()..]);
            results.push(rewritten);
        }
        search_from = index + 1;
    }
    results
}

fn starts_at_boundary(before: Option<char>, target: &str) -> bool {
    match before {
        None => true,
        Some(c) if " >+~,(".contains(c) => true,
        // `.x`/`#x`/`:x` 自身就是组成部分的边界。
        Some(_) => matches!(target.chars().next(), Some('.') | Some('#') | Some(':')),
    }
}

fn ends_at_boundary(after: Option<char>) -> bool {
    match after {
        None => true,
        Some(c) => !(c.is_alphanumeric() || c == '-' || c == '_'),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::{EvaluatedDeclaration, EvaluatedRule};

    fn rule(selectors: &[&str]) -> EvaluatedNode {
        EvaluatedNode::Rule(EvaluatedRule {
            selectors: selectors.iter().map(|s| s.to_string()).collect(),
            declarations: vec![EvaluatedDeclaration {
                name: "color".into(),
                value: "red".into(),
                important: false,
            }],
        })
    }

    fn selectors_of(node: &EvaluatedNode) -> &[String] {
        match node {
            EvaluatedNode::Rule(rule) => &rule.selectors,
            _ => panic!("期望规则节点"),
        }
    }

    #[test]
    fn exact_match_appends_source() {
        let mut nodes = vec![rule(&[".a"])];
        let extensions = vec![Extension {
            target: ".a".into(),
            source: ".b".into(),
            all: false,
        }];
        apply_extensions(&mut nodes, &extensions);
        assert_eq!(selectors_of(&nodes[0]), &[".a".to_string(), ".b".to_string()]);
    }

    #[test]
    fn exact_match_requires_whole_component() {
        let mut nodes = vec![rule(&[".a .c"])];
        let extensions = vec![Extension {
            target: ".a".into(),
            source: ".b".into(),
            all: false,
        }];
        apply_extensions(&mut nodes, &extensions);
        assert_eq!(selectors_of(&nodes[0]), &[".a .c".to_string()]);
    }

    #[test]
    fn all_mode_rewrites_substring() {
        let mut nodes = vec![rule(&[".a .c"])];
        let extensions = vec![Extension {
            target: ".a".into(),
            source: ".b".into(),
            all: true,
        }];
        apply_extensions(&mut nodes, &extensions);
        assert_eq!(
            selectors_of(&nodes[0]),
            &[".a .c".to_string(), ".b .c".to_string()]
        );
    }

    #[test]
    fn all_mode_respects_identifier_boundaries() {
        let mut nodes = vec![rule(&[".ab"])];
        let extensions = vec![Extension {
            target: ".a".into(),
            source: ".b".into(),
            all: true,
        }];
        apply_extensions(&mut nodes, &extensions);
        assert_eq!(selectors_of(&nodes[0]), &[".ab".to_string()]);
    }

    #[test]
    fn all_mode_matches_compound_position() {
        let mut nodes = vec![rule(&[".x.a:hover"])];
        let extensions = vec![Extension {
            target: ".a".into(),
            source: ".b".into(),
            all: true,
        }];
        apply_extensions(&mut nodes, &extensions);
        assert_eq!(
            selectors_of(&nodes[0]),
            &[".x.a:hover".to_string(), ".x.b:hover".to_string()]
        );
    }

    #[test]
    fn extensions_are_transitive() {
        let mut nodes = vec![rule(&[".a"])];
        let extensions = vec![
            Extension {
                target: ".a".into(),
                source: ".b".into(),
                all: false,
            },
            Extension {
                target: ".b".into(),
                source: ".c".into(),
                all: false,
            },
        ];
        apply_extensions(&mut nodes, &extensions);
        assert_eq!(
            selectors_of(&nodes[0]),
            &[".a".to_string(), ".b".to_string(), ".c".to_string()]
        );
    }

    #[test]
    fn transitive_result_is_order_independent() {
        let forward = vec![
            Extension {
                target: ".a".into(),
                source: ".b".into(),
                all: false,
            },
            Extension {
                target: ".b".into(),
                source: ".c".into(),
                all: false,
            },
        ];
        let reversed: Vec<Extension> = forward.iter().rev().cloned().collect();

        let mut nodes_a = vec![rule(&[".a"])];
        let mut nodes_b = vec![rule(&[".a"])];
        apply_extensions(&mut nodes_a, &forward);
        apply_extensions(&mut nodes_b, &reversed);

        let mut left = selectors_of(&nodes_a[0]).to_vec();
        let mut right = selectors_of(&nodes_b[0]).to_vec();
        left.sort();
        right.sort();
        assert_eq!(left, right);
    }
}
