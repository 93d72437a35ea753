//! lessforge 库入口，提供面向 Rust 与 Node.js 的 LESS 编译能力。
//! 内部分为四个阶段：词法（Tokenizer）→ 解析（Parser）→ 语义求值（Evaluator）→ CSS 序列化（Serializer）。

mod ast;
mod color;
mod error;
mod evaluator;
mod extend;
mod functions;
mod importer;
mod parser;
mod processor;
mod scope;
mod serializer;
mod token;
mod tokenizer;
mod utils;
mod value;

pub use crate::error::{LessError, LessResult};

use evaluator::Evaluator;
use importer::expand_imports;
use parser::LessParser;
use serializer::Serializer;
use std::fs;
use std::path::{Path, PathBuf};

/// LESS 编译配置，目前只提供基础开关，后续可扩展 source map、模块化等高级能力。
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// 是否输出压缩后的 CSS。
    pub minify: bool,
    /// 当前源文件所在目录，用于解析相对 @import。
    pub current_dir: Option<PathBuf>,
    /// 额外的检索目录。
    pub include_paths: Vec<PathBuf>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            minify: false,
            current_dir: None,
            include_paths: Vec::new(),
        }
    }
}

/// 编译 LESS 源码为 CSS 文本。
///
/// # 参数
/// * `source` - 待编译的 LESS 字符串
/// * `options` - 编译配置
pub fn compile(source: &str, options: CompileOptions) -> LessResult<String> {
    let parser = LessParser::new();
    let mut ast = parser.parse(source)?;
    if options.current_dir.is_some() || !options.include_paths.is_empty() {
        ast = expand_imports(
            &parser,
            ast,
            options.current_dir.as_deref(),
            &options.include_paths,
        )?;
    }

    let minify = options.minify;
    let mut evaluator = Evaluator::new(options);
    let stylesheet = evaluator.evaluate(ast)?;

    let serializer = Serializer::new(minify);
    Ok(serializer.to_css(&stylesheet))
}

/// 从文件路径编译 LESS，自动处理 @import。
pub fn compile_file<P: AsRef<Path>>(path: P, mut options: CompileOptions) -> LessResult<String> {
    let path = path.as_ref();
    let source = fs::read_to_string(path)
        .map_err(|err| LessError::io(format!("读取文件 {} 失败: {err}", path.display())))?;
    if options.current_dir.is_none() {
        if let Some(parent) = path.parent() {
            options.current_dir = Some(parent.to_path_buf());
        }
    }
    if options.include_paths.is_empty() {
        if let Some(parent) = path.parent() {
            options.include_paths.push(parent.to_path_buf());
        }
    }
    compile(&source, options)
}

#[cfg(feature = "node")]
use napi::{Error, Result};
#[cfg(feature = "node")]
use napi_derive::napi;

/// Node.js 侧的编译选项对象。
#[cfg(feature = "node")]
#[napi(object)]
pub struct JsCompileOptions {
    /// 是否压缩输出 CSS。
    pub minify: Option<bool>,
    /// 源文件路径，用于解析 @import。
    pub filename: Option<String>,
}

/// 暴露给 Node.js 的异步编译函数。
#[cfg(feature = "node")]
#[napi]
pub fn compile_less(source: String, options: Option<JsCompileOptions>) -> Result<String> {
    let opt = options.unwrap_or(JsCompileOptions {
        minify: None,
        filename: None,
    });
    let minify = opt.minify.unwrap_or(false);
    let mut compile_options = CompileOptions {
        minify,
        ..CompileOptions::default()
    };
    if let Some(filename) = opt.filename {
        let path = PathBuf::from(&filename);
        if let Some(parent) = path.parent() {
            let dir = parent.to_path_buf();
            compile_options.current_dir = Some(dir.clone());
            compile_options.include_paths.push(dir);
        }
    }
    let result =
        compile(&source, compile_options).map_err(|err| Error::from_reason(err.to_string()))?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile_default(src: &str) -> String {
        compile(src, CompileOptions::default()).unwrap()
    }

    #[test]
    fn compile_basic_variable() {
        let css = compile_default("@w: 10px;\na {\n  width: @w;\n}");
        assert!(css.contains("a {"));
        assert!(css.contains("width: 10px;"));
    }

    #[test]
    fn compile_nested_parent_reference() {
        let css = compile_default("a {\n  &:hover {\n    color: red;\n  }\n}");
        assert!(css.contains("a:hover {"));
        assert!(css.contains("color: red;"));
    }

    #[test]
    fn compile_mixin_with_default() {
        let css = compile_default(".m(@c: red) { color: @c; }\na { .m(); }\nb { .m(blue); }");
        assert!(css.contains("a {\n  color: red;\n}"));
        assert!(css.contains("b {\n  color: blue;\n}"));
    }

    #[test]
    fn compile_unit_arithmetic() {
        let css = compile_default("a { x: 1px + 2cm; }");
        assert!(css.contains("x: 76.5906px;"));
    }

    #[test]
    fn compile_guarded_mixins() {
        let css = compile_default(
            ".m(@x) when (@x > 0) { a: pos; }\n.m(@x) when (@x < 0) { a: neg; }\nb { .m(1); .m(-1); }",
        );
        assert!(css.contains("a: pos;"));
        assert!(css.contains("a: neg;"));
    }

    #[test]
    fn compile_extend() {
        let css = compile_default(".a { color: red; }\n.b:extend(.a) { font-weight: bold; }");
        assert!(css.contains(".a, .b {\n  color: red;\n}"));
        assert!(css.contains(".b {\n  font-weight: bold;\n}"));
    }

    #[test]
    fn compile_important_flag() {
        let css = compile(
            "@base: 10px;\n.box {\n  margin: @base !important;\n}",
            CompileOptions {
                minify: true,
                ..CompileOptions::default()
            },
        )
        .unwrap();
        assert!(css.contains("margin:10px!important"));
        assert!(!css.contains("!important!important"));
    }

    #[test]
    fn compile_color_functions() {
        let css = compile_default(
            "@brand: #336699;\n.btn {\n  background: lighten(@brand, 20%);\n  border-color: darken(@brand, 10%);\n  color: fade(#ffffff, 40%);\n}",
        );
        assert!(css.contains("background: #6699cc"));
        assert!(css.contains("border-color: #264c73"));
        assert!(css.contains("color: rgba(255, 255, 255, 0.4)"));
    }

    #[test]
    fn compile_arithmetic_division_and_negative() {
        let css = compile_default("@gap: 12px;\n.grid {\n  margin: -(@gap / 2);\n  width: (@gap * -2);\n}");
        assert!(css.contains("margin: -6px"));
        assert!(css.contains("width: -24px"));
    }

    #[test]
    fn compile_import_statement() {
        let src = "@import \"reset.css\";\n@color: #000;\nbody {\n  color: @color;\n}";
        let pretty = compile_default(src);
        assert!(pretty.trim_start().starts_with("@import \"reset.css\";"));
        assert!(pretty.contains("body {"));

        let minified = compile(
            src,
            CompileOptions {
                minify: true,
                ..CompileOptions::default()
            },
        )
        .unwrap();
        assert!(minified.starts_with("@import \"reset.css\";"));
        assert!(minified.contains("body{color:#000}"));
    }

    #[test]
    fn plain_css_is_idempotent() {
        let css = "a {\n  color: red;\n}\n\nb c {\n  margin: 0 auto;\n}";
        assert_eq!(compile_default(css), css);
    }
}
