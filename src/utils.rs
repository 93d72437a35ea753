/// 压缩多余空白字符，用于压缩输出与选择器归一化比较。
pub fn collapse_whitespace(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    for word in input.split_whitespace() {
        if !result.is_empty() {
            result.push(' ');
        }
        result.push_str(word);
    }
    result
}

/// 两空格一级的缩进。
pub fn indent(level: usize) -> String {
    "  ".repeat(level)
}
