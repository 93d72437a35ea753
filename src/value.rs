use crate::color::{self, Rgba};
use crate::error::{LessError, LessResult};
use crate::token::{SourceLocation, Token, TokenKind};

/// 语义层的类型化值，算术与函数调用都在这个域上进行。
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Dimension(f64, String),
    Percentage(f64),
    Color(ColorValue),
    String(StringValue),
    Url(String),
    Boolean(bool),
    Unit(String),
    Keyword(String),
}

/// 颜色值保留原始书写形式（十六进制或关键字），未经运算时按原样输出。
#[derive(Debug, Clone, PartialEq)]
pub struct ColorValue {
    pub rgba: Rgba,
    pub original: Option<String>,
}

impl ColorValue {
    pub fn computed(rgba: Rgba) -> Self {
        Self {
            rgba,
            original: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StringValue {
    pub text: String,
    pub quote: Option<char>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Op {
    pub fn from_text(text: &str) -> Option<Self> {
        match text {
            "+" => Some(Op::Add),
            "-" => Some(Op::Subtract),
            "*" => Some(Op::Multiply),
            "/" => Some(Op::Divide),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Lt,
    Gt,
    Le,
    Ge,
}

impl Comparison {
    pub fn from_text(text: &str) -> Option<Self> {
        match text {
            "=" => Some(Comparison::Eq),
            "<" => Some(Comparison::Lt),
            ">" => Some(Comparison::Gt),
            "<=" | "=<" => Some(Comparison::Le),
            ">=" => Some(Comparison::Ge),
            _ => None,
        }
    }
}

/// 单位按固定比例可以互换的等价类。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitGroup {
    Length,
    Time,
    Angle,
    Other,
}

pub fn unit_group(unit: &str) -> UnitGroup {
    match unit {
        "px" | "cm" | "mm" | "in" | "pt" | "pc" => UnitGroup::Length,
        "s" | "ms" => UnitGroup::Time,
        "rad" | "deg" | "grad" | "turn" => UnitGroup::Angle,
        _ => UnitGroup::Other,
    }
}

/// 长度基准是 px，时间是 ms，角度是 rad。
fn to_canonical(value: f64, unit: &str) -> f64 {
    match unit {
        "px" => value,
        "in" => value * 96.0,
        "cm" => value * 96.0 / 2.54,
        "mm" => value * 96.0 / 25.4,
        "pt" => value * 96.0 / 72.0,
        "pc" => value * 16.0,
        "ms" => value,
        "s" => value * 1000.0,
        "rad" => value,
        "deg" => value * std::f64::consts::PI / 180.0,
        "grad" => value * std::f64::consts::PI / 200.0,
        "turn" => value * 2.0 * std::f64::consts::PI,
        _ => value,
    }
}

fn from_canonical(value: f64, unit: &str) -> f64 {
    match unit {
        "px" => value,
        "in" => value / 96.0,
        "cm" => value * 2.54 / 96.0,
        "mm" => value * 25.4 / 96.0,
        "pt" => value * 72.0 / 96.0,
        "pc" => value / 16.0,
        "ms" => value,
        "s" => value / 1000.0,
        "rad" => value,
        "deg" => value * 180.0 / std::f64::consts::PI,
        "grad" => value * 200.0 / std::f64::consts::PI,
        "turn" => value / (2.0 * std::f64::consts::PI),
        _ => value,
    }
}

/// 同组单位间换算；跨组返回 None。
pub fn convert_between(value: f64, from: &str, to: &str) -> Option<f64> {
    if from == to {
        return Some(value);
    }
    let group = unit_group(from);
    if group == UnitGroup::Other || group != unit_group(to) {
        return None;
    }
    Some(from_canonical(to_canonical(value, from), to))
}

pub fn angle_to_rad(value: f64, unit: &str) -> Option<f64> {
    if unit_group(unit) != UnitGroup::Angle {
        return None;
    }
    Some(to_canonical(value, unit))
}

impl Value {
    /// 把单个 token 提升为类型化值；无法识别时返回 None，token 原样保留。
    pub fn from_token(token: &Token) -> Option<Value> {
        match token.kind {
            TokenKind::Number => token.text.parse().ok().map(Value::Number),
            TokenKind::Percentage => token.text[..token.text.len() - 1]
                .parse()
                .ok()
                .map(Value::Percentage),
            TokenKind::Dimension => {
                let split = token
                    .text
                    .find(|c: char| c.is_ascii_alphabetic())
                    .unwrap_or(token.text.len());
                let number: f64 = token.text[..split].parse().ok()?;
                let unit = token.text[split..].to_string();
                if unit.is_empty() {
                    None
                } else {
                    Some(Value::Dimension(number, unit))
                }
            }
            TokenKind::Hash => color::parse_color(&token.text).map(|rgba| {
                Value::Color(ColorValue {
                    rgba,
                    original: Some(token.text.clone()),
                })
            }),
            TokenKind::String => {
                let text = &token.text;
                let quote = text.chars().next()?;
                if text.len() < 2 || (quote != '"' && quote != '\'') {
                    return None;
                }
                Some(Value::String(StringValue {
                    text: text[1..text.len() - 1].to_string(),
                    quote: Some(quote),
                }))
            }
            TokenKind::Url => Some(Value::Url(token.text.clone())),
            TokenKind::Identifier => match token.text.as_str() {
                "true" => Some(Value::Boolean(true)),
                "false" => Some(Value::Boolean(false)),
                keyword => match color::named_color(keyword) {
                    Some(rgba) => Some(Value::Color(ColorValue {
                        rgba,
                        original: Some(keyword.to_string()),
                    })),
                    None => Some(Value::Keyword(keyword.to_string())),
                },
            },
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Value::Number(_) | Value::Dimension(_, _) | Value::Percentage(_)
        )
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) | Value::Dimension(n, _) | Value::Percentage(n) => Some(*n),
            _ => None,
        }
    }

    /// 当前单位；Number 为空字符串，Percentage 为 `%`。
    pub fn unit(&self) -> Option<&str> {
        match self {
            Value::Number(_) => Some(""),
            Value::Dimension(_, unit) => Some(unit),
            Value::Percentage(_) => Some("%"),
            _ => None,
        }
    }

    /// 输出文本形式。
    pub fn to_css(&self) -> String {
        match self {
            Value::Number(n) => format_number(*n),
            Value::Dimension(n, unit) => format!("{}{}", format_number(*n), unit),
            Value::Percentage(n) => format!("{}%", format_number(*n)),
            Value::Color(c) => match &c.original {
                Some(original) => original.clone(),
                None => color::format_color(c.rgba),
            },
            Value::String(s) => match s.quote {
                Some(q) => format!("{q}{}{q}", s.text),
                None => s.text.clone(),
            },
            Value::Url(text) => text.clone(),
            Value::Boolean(b) => b.to_string(),
            Value::Unit(unit) => unit.clone(),
            Value::Keyword(keyword) => keyword.clone(),
        }
    }

    pub fn to_token(&self) -> Token {
        let kind = match self {
            Value::Number(_) => TokenKind::Number,
            Value::Dimension(_, _) => TokenKind::Dimension,
            Value::Percentage(_) => TokenKind::Percentage,
            Value::Color(c) => {
                if c.original.as_deref().map_or(false, |o| !o.starts_with('#')) {
                    TokenKind::Identifier
                } else {
                    TokenKind::Hash
                }
            }
            // 去引号的字符串按普通标识符 token 回写，避免再次被当作字面量解引号。
            Value::String(s) => {
                if s.quote.is_some() {
                    TokenKind::String
                } else {
                    TokenKind::Identifier
                }
            }
            Value::Url(_) => TokenKind::Url,
            Value::Boolean(_) | Value::Unit(_) | Value::Keyword(_) => TokenKind::Identifier,
        };
        Token::synthetic(self.to_css(), kind)
    }

    /// 守卫条件里的真值判定。
    pub fn is_truthy(&self) -> bool {
        matches!(self, Value::Boolean(true))
            || matches!(self, Value::Keyword(k) if k == "true")
    }
}

/// 数字输出保留 4 位小数并去除尾零，与既有格式保持一致。
pub fn format_number(value: f64) -> String {
    let mut value = value;
    if value.abs() < 1e-9 {
        value = 0.0;
    }
    let mut formatted = format!("{value:.4}");
    while formatted.contains('.') && formatted.ends_with('0') {
        formatted.pop();
    }
    if formatted.ends_with('.') {
        formatted.pop();
    }
    formatted
}

/// 二元算术。左操作数决定结果类型，右操作数按需要换算单位。
pub fn apply(op: Op, lhs: &Value, rhs: &Value, location: &SourceLocation) -> LessResult<Value> {
    match (lhs, rhs) {
        (l, r) if l.is_numeric() && r.is_numeric() => numeric_op(op, l, r, location),
        (l, Value::Color(c)) if l.is_numeric() => match op {
            Op::Add | Op::Multiply => color_number_op(op, c, l.as_number().unwrap(), location),
            _ => Err(LessError::type_error(
                "颜色只支持与数字相加或相乘",
                location.clone(),
            )),
        },
        (l, Value::String(s)) if l.is_numeric() => match op {
            Op::Add => Ok(Value::String(StringValue {
                text: format!("{}{}", l.to_css(), s.text),
                quote: s.quote,
            })),
            Op::Multiply => repeat_string(s, l, location),
            _ => Err(LessError::type_error(
                "数字与字符串之间只支持 '+' 与 '*'",
                location.clone(),
            )),
        },
        (Value::Color(c), r) if r.is_numeric() => match op {
            Op::Add | Op::Subtract | Op::Multiply | Op::Divide => {
                color_number_op(op, c, r.as_number().unwrap(), location)
            }
        },
        (Value::Color(a), Value::Color(b)) => color_color_op(op, a, b, location),
        (Value::Color(c), Value::String(s)) if op == Op::Add => Ok(Value::String(StringValue {
            text: format!("{}{}", Value::Color(c.clone()).to_css(), s.text),
            quote: s.quote,
        })),
        (Value::String(s), r) => match op {
            Op::Add => Ok(Value::String(StringValue {
                text: format!("{}{}", s.text, r.to_css()),
                quote: s.quote,
            })),
            Op::Multiply if r.is_numeric() => repeat_string(s, r, location),
            _ => Err(LessError::type_error(
                "字符串只支持拼接或按次数重复",
                location.clone(),
            )),
        },
        _ => Err(LessError::type_error(
            format!("不支持的运算: {} 与 {}", lhs.to_css(), rhs.to_css()),
            location.clone(),
        )),
    }
}

fn numeric_op(op: Op, lhs: &Value, rhs: &Value, location: &SourceLocation) -> LessResult<Value> {
    let left = lhs.as_number().unwrap();
    let mut right = rhs.as_number().unwrap();

    // 结果沿用左操作数的单位；左侧是纯数字时采用右侧的单位。
    let result_shape = if matches!(lhs, Value::Number(_)) {
        rhs.clone()
    } else {
        lhs.clone()
    };

    if let (Value::Dimension(_, lu), Value::Dimension(_, ru)) = (lhs, rhs) {
        if lu != ru {
            match convert_between(right, ru, lu) {
                Some(converted) => right = converted,
                None => {
                    return Err(LessError::unit_mismatch(
                        format!("无法对 {lu} 与 {ru} 做算术"),
                        location.clone(),
                    ));
                }
            }
        }
    }

    if op == Op::Divide && right == 0.0 {
        return Err(LessError::type_error("除法分母不能为 0", location.clone()));
    }

    let value = match op {
        Op::Add => left + right,
        Op::Subtract => left - right,
        Op::Multiply => left * right,
        Op::Divide => left / right,
    };

    Ok(match result_shape {
        Value::Number(_) => Value::Number(value),
        Value::Dimension(_, unit) => Value::Dimension(value, unit),
        Value::Percentage(_) => Value::Percentage(value),
        _ => unreachable!(),
    })
}

/// 颜色与数字按 0-255 通道域做分量运算。
fn color_number_op(
    op: Op,
    color: &ColorValue,
    number: f64,
    location: &SourceLocation,
) -> LessResult<Value> {
    if op == Op::Divide && number == 0.0 {
        return Err(LessError::type_error("除法分母不能为 0", location.clone()));
    }
    let rgba = color.rgba;
    let channel = |value: f64| -> f64 {
        let base = value * 255.0;
        let result = match op {
            Op::Add => base + number,
            Op::Subtract => base - number,
            Op::Multiply => base * number,
            Op::Divide => base / number,
        };
        result.clamp(0.0, 255.0) / 255.0
    };
    Ok(Value::Color(ColorValue::computed(Rgba {
        r: channel(rgba.r),
        g: channel(rgba.g),
        b: channel(rgba.b),
        a: rgba.a,
    })))
}

fn color_color_op(
    op: Op,
    lhs: &ColorValue,
    rhs: &ColorValue,
    location: &SourceLocation,
) -> LessResult<Value> {
    let channel = |a: f64, b: f64| -> LessResult<f64> {
        let left = a * 255.0;
        let right = b * 255.0;
        let result = match op {
            Op::Add => left + right,
            Op::Subtract => left - right,
            Op::Multiply => left * right / 255.0,
            Op::Divide => {
                if right == 0.0 {
                    return Err(LessError::type_error(
                        "除法分母不能为 0",
                        location.clone(),
                    ));
                }
                left / right * 255.0
            }
        };
        Ok(result.clamp(0.0, 255.0) / 255.0)
    };
    Ok(Value::Color(ColorValue::computed(Rgba {
        r: channel(lhs.rgba.r, rhs.rgba.r)?,
        g: channel(lhs.rgba.g, rhs.rgba.g)?,
        b: channel(lhs.rgba.b, rhs.rgba.b)?,
        a: lhs.rgba.a,
    })))
}

fn repeat_string(s: &StringValue, count: &Value, location: &SourceLocation) -> LessResult<Value> {
    let times = count.as_number().unwrap();
    if times < 0.0 || times.fract() != 0.0 {
        return Err(LessError::type_error(
            "字符串重复次数必须是非负整数",
            location.clone(),
        ));
    }
    Ok(Value::String(StringValue {
        text: s.text.repeat(times as usize),
        quote: s.quote,
    }))
}

/// 比较运算。数值经单位换算后比较，`=` 对任意值退回到文本比较。
pub fn compare(
    cmp: Comparison,
    lhs: &Value,
    rhs: &Value,
    location: &SourceLocation,
) -> LessResult<bool> {
    if lhs.is_numeric() && rhs.is_numeric() {
        let left = lhs.as_number().unwrap();
        let mut right = rhs.as_number().unwrap();
        if let (Value::Dimension(_, lu), Value::Dimension(_, ru)) = (lhs, rhs) {
            if lu != ru {
                match convert_between(right, ru, lu) {
                    Some(converted) => right = converted,
                    None => {
                        return Err(LessError::unit_mismatch(
                            format!("无法比较 {lu} 与 {ru}"),
                            location.clone(),
                        ));
                    }
                }
            }
        }
        return Ok(match cmp {
            Comparison::Eq => (left - right).abs() < 1e-9,
            Comparison::Lt => left < right,
            Comparison::Gt => left > right,
            Comparison::Le => left <= right,
            Comparison::Ge => left >= right,
        });
    }

    match cmp {
        Comparison::Eq => Ok(lhs.to_css() == rhs.to_css()),
        Comparison::Lt => match (lhs, rhs) {
            (Value::Boolean(a), Value::Boolean(b)) => Ok(a < b),
            _ => Err(LessError::type_error(
                "只有数值之间才能比较大小",
                location.clone(),
            )),
        },
        _ => Err(LessError::type_error(
            "只有数值之间才能比较大小",
            location.clone(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> SourceLocation {
        SourceLocation::default()
    }

    fn dim(n: f64, unit: &str) -> Value {
        Value::Dimension(n, unit.to_string())
    }

    #[test]
    fn same_unit_addition() {
        let result = apply(Op::Add, &dim(10.0, "px"), &dim(5.0, "px"), &loc()).unwrap();
        assert_eq!(result.to_css(), "15px");
    }

    #[test]
    fn cross_unit_addition_coerces_to_left_unit() {
        let result = apply(Op::Add, &dim(1.0, "px"), &dim(2.0, "cm"), &loc()).unwrap();
        assert_eq!(result.to_css(), "76.5906px");
    }

    #[test]
    fn cross_group_addition_fails() {
        let err = apply(Op::Add, &dim(1.0, "px"), &dim(2.0, "s"), &loc()).unwrap_err();
        assert!(matches!(err, LessError::UnitMismatch { .. }));
    }

    #[test]
    fn number_adopts_dimension_unit() {
        let result = apply(Op::Multiply, &Value::Number(2.0), &dim(4.0, "em"), &loc()).unwrap();
        assert_eq!(result.to_css(), "8em");
    }

    #[test]
    fn convert_roundtrip_within_epsilon() {
        let x = 12.345;
        let there = convert_between(x, "cm", "mm").unwrap();
        let back = convert_between(there, "mm", "cm").unwrap();
        assert!((back - x).abs() < 1e-9);
    }

    #[test]
    fn color_plus_number_clamps() {
        let color = Value::from_token(&Token::synthetic("#fefefe", TokenKind::Hash)).unwrap();
        let result = apply(Op::Add, &color, &Value::Number(10.0), &loc()).unwrap();
        assert_eq!(result.to_css(), "#ffffff");
    }

    #[test]
    fn string_concatenation_and_repeat() {
        let s = Value::String(StringValue {
            text: "ab".into(),
            quote: Some('"'),
        });
        let joined = apply(Op::Add, &s, &Value::Number(3.0), &loc()).unwrap();
        assert_eq!(joined.to_css(), "\"ab3\"");
        let repeated = apply(Op::Multiply, &s, &Value::Number(3.0), &loc()).unwrap();
        assert_eq!(repeated.to_css(), "\"ababab\"");
    }

    #[test]
    fn subtracting_string_from_number_fails() {
        let s = Value::String(StringValue {
            text: "x".into(),
            quote: None,
        });
        let err = apply(Op::Subtract, &Value::Number(1.0), &s, &loc()).unwrap_err();
        assert!(matches!(err, LessError::Type { .. }));
    }

    #[test]
    fn comparisons_convert_units() {
        assert!(compare(Comparison::Eq, &dim(1.0, "cm"), &dim(10.0, "mm"), &loc()).unwrap());
        assert!(compare(Comparison::Lt, &dim(1.0, "cm"), &dim(11.0, "mm"), &loc()).unwrap());
    }

    #[test]
    fn equality_falls_back_to_text() {
        let a = Value::Keyword("bold".into());
        let b = Value::Keyword("bold".into());
        assert!(compare(Comparison::Eq, &a, &b, &loc()).unwrap());
    }

    #[test]
    fn keyword_color_keeps_original_form() {
        let red = Value::from_token(&Token::synthetic("red", TokenKind::Identifier)).unwrap();
        assert_eq!(red.to_css(), "red");
        assert!(matches!(red, Value::Color(_)));
    }

    #[test]
    fn hash_that_is_not_a_color_stays_unlifted() {
        assert!(Value::from_token(&Token::synthetic("#header", TokenKind::Hash)).is_none());
    }
}
