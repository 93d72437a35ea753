use lessforge::{compile, compile_file, CompileOptions, LessError};
use std::path::Path;

fn compile_pretty(src: &str) -> String {
    compile(src, CompileOptions::default()).unwrap()
}

fn compile_min(src: &str) -> String {
    compile(
        src,
        CompileOptions {
            minify: true,
            ..CompileOptions::default()
        },
    )
    .unwrap()
}

#[test]
fn variable_and_nesting() {
    let src = r"@spacing: 8px;
.container {
  padding: @spacing;
  .title {
    margin-bottom: @spacing;
  }
}";
    let css = compile_pretty(src);
    assert!(css.contains(".container {"));
    assert!(css.contains("padding: 8px;"));
    assert!(css.contains(".container .title {"));
    assert!(css.contains("margin-bottom: 8px;"));
}

#[test]
fn minify_output() {
    let src = r".demo {
  color: #333;
  font-weight: bold;
}";
    assert_eq!(compile_min(src), ".demo{color:#333;font-weight:bold}");
}

#[test]
fn seed_variable_substitution() {
    let css = compile_min("@w: 10px; a { width: @w; }");
    assert_eq!(css, "a{width:10px}");
}

#[test]
fn seed_parent_reference() {
    let css = compile_min("a { &:hover { color: red; } }");
    assert_eq!(css, "a:hover{color:red}");
}

#[test]
fn seed_mixin_defaults() {
    let css = compile_min(".m(@c: red) { color: @c; } a { .m(); } b { .m(blue); }");
    assert_eq!(css, "a{color:red}b{color:blue}");
}

#[test]
fn seed_unit_arithmetic() {
    let css = compile_min("a { x: 1px + 2cm; }");
    assert_eq!(css, "a{x:76.5906px}");
}

#[test]
fn seed_guard_dispatch() {
    let css = compile_min(
        ".m(@x) when (@x > 0) { a: pos; } .m(@x) when (@x < 0) { a: neg; } b { .m(1); .m(-1); }",
    );
    assert_eq!(css, "b{a:pos;a:neg}");
}

#[test]
fn seed_extend() {
    let css = compile_min(".a { color: red; } .b:extend(.a) { font-weight: bold; }");
    assert_eq!(css, ".a,.b{color:red}.b{font-weight:bold}");
}

#[test]
fn flattening_is_associative() {
    let a = compile_min("a { b { c { x: 1; } } }");
    let b = compile_min("a b { c { x: 1; } }");
    let c = compile_min("a b c { x: 1; }");
    assert_eq!(a, "a b c{x:1}");
    assert_eq!(a, b);
    assert_eq!(b, c);
}

#[test]
fn plain_css_roundtrip_is_stable() {
    let css = "a {\n  color: red;\n}";
    let once = compile_pretty(css);
    let twice = compile_pretty(&once);
    assert_eq!(once, twice);
    assert_eq!(once, css);
}

#[test]
fn unit_conversion_roundtrip() {
    let css = compile_min("a { x: convert(convert(10px, cm), px); }");
    assert_eq!(css, "a{x:10px}");
}

#[test]
fn extend_is_transitive_and_confluent() {
    let forward = compile_min(
        ".a { color: red; } .b:extend(.a) { x: 1; } .c:extend(.b) { y: 2; }",
    );
    let reversed = compile_min(
        ".a { color: red; } .c:extend(.b) { y: 2; } .b:extend(.a) { x: 1; }",
    );
    assert!(forward.contains(".a,.b,.c{color:red}"));
    assert!(reversed.contains(".c"));
    let mut left: Vec<&str> = forward.split('}').collect();
    let mut right: Vec<&str> = reversed.split('}').collect();
    left.sort();
    right.sort();
    assert_eq!(left, right);
}

#[test]
fn extend_all_rewrites_substrings() {
    let css = compile_min(".a .x { color: red; } .b:extend(.x all) { y: 1; }");
    assert!(css.contains(".a .x,.a .b{color:red}"));
}

#[test]
fn mixin_pattern_matching() {
    let css = compile_min(
        ".m(dark, @c) { color: @c; } .m(light, @c) { background: @c; } a { .m(dark, #111); } b { .m(light, #eee); }",
    );
    assert_eq!(css, "a{color:#111}b{background:#eee}");
}

#[test]
fn mixin_rest_and_arguments() {
    let css = compile_min(".m(@a, @rest...) { x: @rest; y: @arguments; } b { .m(1, 2, 3); }");
    assert_eq!(css, "b{x:2 3;y:1 2 3}");
}

#[test]
fn nested_mixin_name_path() {
    let css = compile_min("#ns { .mixin() { color: red; } } a { #ns > .mixin(); }");
    assert_eq!(css, "a{color:red}");
}

#[test]
fn media_bubbling_from_nested_ruleset() {
    let src = r".panel {
  color: #333;
  @media (min-width: 800px) {
    color: #000;
    .panel__title {
      font-size: 20px;
    }
  }
}

@media (max-width: 600px) {
  .panel {
    width: 100%;
  }
}";
    let css = compile_pretty(src);
    assert!(css.contains(".panel {\n  color: #333;"));
    assert!(css.contains("@media (min-width: 800px)"));
    assert!(css.contains(".panel {\n    color: #000;"));
    assert!(css.contains(".panel .panel__title"));
    assert!(css.contains("@media (max-width: 600px)"));
    assert!(css.contains(".panel {\n    width: 100%;"));
}

#[test]
fn font_face_and_keyframes_blocks() {
    let src = r"@font-face {
  font-family: 'Open Sans';
  src: url('/fonts/open-sans.woff2') format('woff2');
}

@keyframes fade-in {
  from {
    opacity: 0;
  }
  to {
    opacity: 1;
  }
}";
    let css = compile_min(src);
    assert!(css.contains(
        "@font-face{font-family:'Open Sans';src:url('/fonts/open-sans.woff2') format('woff2')}"
    ));
    assert!(css.contains("@keyframes fade-in{from{opacity:0}to{opacity:1}}"));
}

#[test]
fn string_functions() {
    let css = compile_min(
        "a { x: e(\"10px\"); y: %(\"%d-%a\", 1, 2px); z: replace(\"a-b\", \"-\", \"+\"); }",
    );
    assert_eq!(css, "a{x:10px;y:\"1-2px\";z:\"a+b\"}");
}

#[test]
fn list_functions() {
    let css = compile_min("@list: 1px 2px 3px; a { n: length(@list); e: extract(@list, 2); }");
    assert_eq!(css, "a{n:3;e:2px}");
}

#[test]
fn type_predicates_in_guards() {
    let css = compile_min(
        ".m(@v) when (isnumber(@v)) { kind: number; } .m(@v) when (iscolor(@v)) { kind: color; } a { .m(4px); } b { .m(#fff); }",
    );
    assert_eq!(css, "a{kind:number}b{kind:color}");
}

#[test]
fn unknown_functions_are_preserved() {
    let css = compile_min("@blur: 4px; a { filter: blur(@blur); transform: translateX(10px); }");
    assert_eq!(css, "a{filter:blur(4px);transform:translateX(10px)}");
}

#[test]
fn division_outside_parens_between_same_units_is_preserved() {
    let css = compile_min("a { font: 12px/14px sans-serif; margin: (10px / 2); }");
    assert!(css.contains("margin:5px"));
    assert!(css.contains("font:12px/14px sans-serif"));
}

#[test]
fn property_name_interpolation() {
    let css = compile_min("@side: margin; a { @{side}-top: 4px; }");
    assert_eq!(css, "a{margin-top:4px}");
}

#[test]
fn unbound_variable_reports_eval_exit_code() {
    let err = compile("a { width: @missing; }", CompileOptions::default()).unwrap_err();
    assert!(matches!(err, LessError::UnboundVariable { .. }));
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn parse_error_reports_parse_exit_code() {
    let err = compile("a { color: red;", CompileOptions::default()).unwrap_err();
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn recursion_limit_is_enforced() {
    let err = compile(".m() { .m(); } a { .m(); }", CompileOptions::default()).unwrap_err();
    assert!(matches!(err, LessError::RecursionLimit { .. }));
}

#[test]
fn import_statement_passthrough() {
    let src = r#"@import (css) "https://cdn.example.com/reset.css";
body {
  color: #333;
}"#;
    let css = compile_min(src);
    assert!(css.starts_with(r#"@import "https://cdn.example.com/reset.css";"#));
    assert!(css.contains("body{color:#333}"));
}

#[test]
fn compile_theme_fixture_with_imports() {
    let path = Path::new("fixtures/theme.less");
    let css = compile_file(
        path,
        CompileOptions {
            minify: true,
            ..CompileOptions::default()
        },
    )
    .unwrap();
    assert!(css.contains(".button{"));
    assert!(css.contains("border-radius:4px"));
    assert!(css.contains(".button--wide{"));
}
