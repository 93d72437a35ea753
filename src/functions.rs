use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::color::{self, Rgba};
use crate::error::{LessError, LessResult};
use crate::token::SourceLocation;
use crate::value::{
    angle_to_rad, convert_between, unit_group, ColorValue, StringValue, UnitGroup, Value,
};

/// 内置函数处理器。失败时返回领域错误消息，由注册表补上函数名与位置。
pub type Handler = fn(&[Value]) -> Result<Value, String>;

/// 按小写函数名索引的注册表。
///
/// 签名字符：`.` 任意值，`N` 数字类，`S` 字符串，`C` 颜色，`U` 单位；
/// 后缀 `?` 表示可选，`+` 表示最后一个参数可重复。
/// 同名多个条目时后注册的优先。
pub struct FunctionLibrary {
    entries: IndexMap<String, Vec<(&'static str, Handler)>>,
}

impl FunctionLibrary {
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    pub fn register(&mut self, name: &str, signature: &'static str, handler: Handler) {
        self.entries
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push((signature, handler));
    }

    /// 按实参类型找到唯一可用的处理器，找不到返回 None（调用原样保留）。
    pub fn resolve(&self, name: &str, args: &[Value]) -> Option<Handler> {
        let candidates = self.entries.get(&name.to_ascii_lowercase())?;
        candidates
            .iter()
            .rev()
            .find(|(signature, _)| signature_accepts(signature, args))
            .map(|(_, handler)| *handler)
    }

    pub fn call(
        &self,
        name: &str,
        args: &[Value],
        location: &SourceLocation,
    ) -> Option<LessResult<Value>> {
        let handler = self.resolve(name, args)?;
        Some(handler(args).map_err(|message| LessError::function(name, message, location.clone())))
    }

    pub fn with_builtins() -> Self {
        let mut lib = Self::new();
        register_numeric(&mut lib);
        register_color(&mut lib);
        register_string(&mut lib);
        register_list(&mut lib);
        lib
    }
}

impl Default for FunctionLibrary {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// 全局内置函数表。
pub static BUILTINS: Lazy<FunctionLibrary> = Lazy::new(FunctionLibrary::with_builtins);

fn signature_accepts(signature: &str, args: &[Value]) -> bool {
    let mut specs: Vec<(char, bool)> = Vec::new();
    let mut variadic = false;
    let mut chars = signature.chars().peekable();
    while let Some(code) = chars.next() {
        let mut optional = false;
        if chars.peek() == Some(&'?') {
            chars.next();
            optional = true;
        }
        if chars.peek() == Some(&'+') {
            chars.next();
            variadic = true;
        }
        specs.push((code, optional));
    }

    let required = specs.iter().filter(|(_, optional)| !optional).count();
    if args.len() < required {
        return false;
    }
    if args.len() > specs.len() && !variadic {
        return false;
    }

    for (index, arg) in args.iter().enumerate() {
        let code = if index < specs.len() {
            specs[index].0
        } else {
            specs.last().map(|(c, _)| *c).unwrap_or('.')
        };
        if !code_accepts(code, arg) {
            return false;
        }
    }
    true
}

fn code_accepts(code: char, value: &Value) -> bool {
    match code {
        '.' => true,
        'N' => value.is_numeric(),
        'S' => matches!(value, Value::String(_)),
        'C' => matches!(value, Value::Color(_)),
        'U' => matches!(value, Value::Unit(_) | Value::Keyword(_)),
        _ => false,
    }
}

/// 百分比归一到 0-1，普通数字原样返回。
fn amount(value: &Value) -> Result<f64, String> {
    match value {
        Value::Percentage(p) => Ok(p / 100.0),
        Value::Number(n) => Ok(*n),
        Value::Dimension(n, _) => Ok(*n),
        _ => Err("期望数字或百分比".into()),
    }
}

fn channel(value: &Value) -> Result<f64, String> {
    match value {
        Value::Percentage(p) => Ok(p / 100.0 * 255.0),
        Value::Number(n) | Value::Dimension(n, _) => Ok(*n),
        _ => Err("期望通道数值".into()),
    }
}

fn expect_color(value: &Value) -> Result<Rgba, String> {
    match value {
        Value::Color(c) => Ok(c.rgba),
        _ => Err("期望颜色值".into()),
    }
}

fn expect_number(value: &Value) -> Result<f64, String> {
    value.as_number().ok_or_else(|| "期望数字".into())
}

fn unit_name(value: &Value) -> Option<String> {
    match value {
        Value::Unit(unit) => Some(unit.clone()),
        Value::Keyword(keyword) => Some(keyword.clone()),
        Value::String(s) => Some(s.text.clone()),
        _ => None,
    }
}

/// 保持输入的数值形态，替换数值部分。
fn with_value(shape: &Value, value: f64) -> Value {
    match shape {
        Value::Number(_) => Value::Number(value),
        Value::Dimension(_, unit) => Value::Dimension(value, unit.clone()),
        Value::Percentage(_) => Value::Percentage(value),
        _ => Value::Number(value),
    }
}

fn register_numeric(lib: &mut FunctionLibrary) {
    lib.register("unit", ".U?", |args| {
        let value = expect_number(&args[0])?;
        match args.get(1).and_then(unit_name) {
            Some(unit) if unit == "%" => Ok(Value::Percentage(value)),
            Some(unit) => Ok(Value::Dimension(value, unit)),
            None => Ok(Value::Number(value)),
        }
    });
    lib.register("get-unit", ".", |args| {
        let unit = args[0].unit().unwrap_or("").to_string();
        Ok(Value::Unit(unit))
    });
    lib.register("isunit", "..", |args| {
        let result = match (&args[0], unit_name(&args[1])) {
            (Value::Dimension(_, unit), Some(expected)) => *unit == expected,
            (Value::Percentage(_), Some(expected)) => expected == "%",
            _ => false,
        };
        Ok(Value::Boolean(result))
    });
    lib.register("ceil", ".", |args| {
        let value = args[0].as_number().ok_or("ceil() 只作用于数值")?;
        Ok(with_value(&args[0], value.ceil()))
    });
    lib.register("floor", ".", |args| {
        let value = args[0].as_number().ok_or("floor() 只作用于数值")?;
        Ok(with_value(&args[0], value.floor()))
    });
    lib.register("percentage", "N", |args| {
        Ok(Value::Percentage(expect_number(&args[0])? * 100.0))
    });
    lib.register("round", ".N?", |args| {
        let value = args[0].as_number().ok_or("round() 只作用于数值")?;
        let places = args.get(1).and_then(|v| v.as_number()).unwrap_or(0.0);
        let factor = 10f64.powf(places);
        // 四舍五入采用 floor(x·10^d + 0.5)/10^d。
        let rounded = (value * factor + 0.5).floor() / factor;
        Ok(with_value(&args[0], rounded))
    });
    lib.register("sqrt", ".", |args| {
        let value = args[0].as_number().ok_or("sqrt() 只作用于数值")?;
        Ok(with_value(&args[0], value.sqrt()))
    });
    lib.register("abs", ".", |args| {
        let value = args[0].as_number().ok_or("abs() 只作用于数值")?;
        Ok(with_value(&args[0], value.abs()))
    });
    lib.register("sin", ".", |args| trig(&args[0], f64::sin));
    lib.register("cos", ".", |args| trig(&args[0], f64::cos));
    lib.register("tan", ".", |args| trig(&args[0], f64::tan));
    lib.register("asin", "N", |args| arc(&args[0], f64::asin));
    lib.register("acos", "N", |args| arc(&args[0], f64::acos));
    lib.register("atan", "N", |args| arc(&args[0], f64::atan));
    lib.register("pi", "", |_| Ok(Value::Number(std::f64::consts::PI)));
    lib.register("pow", ".N", |args| {
        let base = args[0].as_number().ok_or("pow() 只作用于数值")?;
        let exponent = expect_number(&args[1])?;
        Ok(with_value(&args[0], base.powf(exponent)))
    });
    lib.register("mod", "..", |args| {
        let left = args[0].as_number().ok_or("mod() 只作用于数值")?;
        let right = args[1].as_number().ok_or("mod() 只作用于数值")?;
        Ok(with_value(&args[0], left % right))
    });
    lib.register("convert", "..", |args| {
        let value = args[0].as_number().ok_or("convert() 只作用于数值")?;
        let target = unit_name(&args[1]).ok_or("convert() 需要单位参数")?;
        let current = args[0].unit().unwrap_or("");
        // 跨单位组时原样返回输入。
        match convert_between(value, current, &target) {
            Some(converted) => Ok(Value::Dimension(converted, target)),
            None => Ok(args[0].clone()),
        }
    });
    lib.register("min", "..+", |args| pick_extreme(args, |a, b| a < b));
    lib.register("max", "..+", |args| pick_extreme(args, |a, b| a > b));
    lib.register("isnumber", ".", |args| {
        Ok(Value::Boolean(args[0].is_numeric()))
    });
    lib.register("isstring", ".", |args| {
        Ok(Value::Boolean(matches!(
            &args[0],
            Value::String(s) if s.quote.is_some()
        )))
    });
    lib.register("iscolor", ".", |args| {
        Ok(Value::Boolean(matches!(args[0], Value::Color(_))))
    });
    lib.register("iskeyword", ".", |args| {
        Ok(Value::Boolean(matches!(args[0], Value::Keyword(_))))
    });
    lib.register("isurl", ".", |args| {
        Ok(Value::Boolean(matches!(args[0], Value::Url(_))))
    });
    lib.register("ispixel", ".", |args| {
        Ok(Value::Boolean(
            matches!(&args[0], Value::Dimension(_, unit) if unit == "px"),
        ))
    });
    lib.register("isem", ".", |args| {
        Ok(Value::Boolean(
            matches!(&args[0], Value::Dimension(_, unit) if unit == "em"),
        ))
    });
    lib.register("ispercentage", ".", |args| {
        Ok(Value::Boolean(matches!(args[0], Value::Percentage(_))))
    });
}

/// 三角函数。带角度单位的维度先换算为弧度，结果去单位。
fn trig(value: &Value, f: fn(f64) -> f64) -> Result<Value, String> {
    let number = match value {
        Value::Number(n) => *n,
        Value::Dimension(n, unit) => {
            if unit_group(unit) != UnitGroup::Angle {
                return Err("需要 rad、deg、grad 或 turn 单位".into());
            }
            angle_to_rad(*n, unit).unwrap()
        }
        _ => return Err("只作用于数字或角度维度".into()),
    };
    Ok(Value::Number(f(number)))
}

/// 反三角函数的结果是弧度维度。
fn arc(value: &Value, f: fn(f64) -> f64) -> Result<Value, String> {
    let number = expect_number(value)?;
    Ok(Value::Dimension(f(number), "rad".into()))
}

fn pick_extreme(args: &[Value], wins: fn(f64, f64) -> bool) -> Result<Value, String> {
    let mut best: Option<&Value> = None;
    for arg in args {
        if !arg.is_numeric() {
            return Err("所有参数都必须是数值".into());
        }
        match best {
            None => best = Some(arg),
            Some(current) => {
                let reference_unit = current.unit().unwrap_or("");
                let candidate = convert_between(
                    arg.as_number().unwrap(),
                    arg.unit().unwrap_or(""),
                    reference_unit,
                )
                .unwrap_or_else(|| arg.as_number().unwrap());
                if wins(candidate, current.as_number().unwrap()) {
                    best = Some(arg);
                }
            }
        }
    }
    Ok(best.unwrap().clone())
}

fn register_color(lib: &mut FunctionLibrary) {
    lib.register("rgb", "NNN", |args| {
        Ok(color_value(Rgba::from_channels(
            channel(&args[0])?,
            channel(&args[1])?,
            channel(&args[2])?,
            1.0,
        )))
    });
    lib.register("rgba", "NNNN", |args| {
        Ok(color_value(Rgba::from_channels(
            channel(&args[0])?,
            channel(&args[1])?,
            channel(&args[2])?,
            amount(&args[3])?,
        )))
    });
    lib.register("hsl", "NNN", |args| {
        let h = expect_number(&args[0])?.rem_euclid(360.0) / 360.0;
        Ok(color_value(color::hsl_to_rgb(
            h,
            amount(&args[1])?,
            amount(&args[2])?,
            1.0,
        )))
    });
    lib.register("hsla", "NNNN", |args| {
        let h = expect_number(&args[0])?.rem_euclid(360.0) / 360.0;
        Ok(color_value(color::hsl_to_rgb(
            h,
            amount(&args[1])?,
            amount(&args[2])?,
            amount(&args[3])?,
        )))
    });
    lib.register("hue", "C", |args| {
        let (h, _, _) = color::rgb_to_hsl(expect_color(&args[0])?);
        Ok(Value::Number((h * 360.0).round()))
    });
    lib.register("saturation", "C", |args| {
        let (_, s, _) = color::rgb_to_hsl(expect_color(&args[0])?);
        Ok(Value::Percentage((s * 100.0).round()))
    });
    lib.register("lightness", "C", |args| {
        let (_, _, l) = color::rgb_to_hsl(expect_color(&args[0])?);
        Ok(Value::Percentage((l * 100.0).round()))
    });
    lib.register("red", "C", |args| {
        Ok(Value::Number(f64::from(color::to_channel(
            expect_color(&args[0])?.r,
        ))))
    });
    lib.register("green", "C", |args| {
        Ok(Value::Number(f64::from(color::to_channel(
            expect_color(&args[0])?.g,
        ))))
    });
    lib.register("blue", "C", |args| {
        Ok(Value::Number(f64::from(color::to_channel(
            expect_color(&args[0])?.b,
        ))))
    });
    lib.register("alpha", "C", |args| {
        Ok(Value::Number(expect_color(&args[0])?.a))
    });
    lib.register("lighten", "CN", |args| {
        Ok(color_value(color::lighten(
            expect_color(&args[0])?,
            amount(&args[1])?,
        )))
    });
    lib.register("darken", "CN", |args| {
        Ok(color_value(color::darken(
            expect_color(&args[0])?,
            amount(&args[1])?,
        )))
    });
    lib.register("saturate", "CN", |args| {
        Ok(color_value(color::saturate(
            expect_color(&args[0])?,
            amount(&args[1])?,
        )))
    });
    lib.register("desaturate", "CN", |args| {
        Ok(color_value(color::desaturate(
            expect_color(&args[0])?,
            amount(&args[1])?,
        )))
    });
    lib.register("fadein", "CN", |args| {
        Ok(color_value(color::fadein(
            expect_color(&args[0])?,
            amount(&args[1])?,
        )))
    });
    lib.register("fadeout", "CN", |args| {
        Ok(color_value(color::fadeout(
            expect_color(&args[0])?,
            amount(&args[1])?,
        )))
    });
    lib.register("fade", "CN", |args| {
        Ok(color_value(color::fade(
            expect_color(&args[0])?,
            amount(&args[1])?,
        )))
    });
    lib.register("spin", "CN", |args| {
        Ok(color_value(color::spin(
            expect_color(&args[0])?,
            expect_number(&args[1])?,
        )))
    });
    lib.register("mix", "CCN?", |args| {
        let weight = match args.get(2) {
            Some(value) => amount(value)?,
            None => 0.5,
        };
        Ok(color_value(color::mix(
            expect_color(&args[0])?,
            expect_color(&args[1])?,
            weight,
        )))
    });
    lib.register("contrast", "CC?C?N?", |args| {
        let dark = match args.get(1) {
            Some(value) => expect_color(value)?,
            None => Rgba::new(0.0, 0.0, 0.0, 1.0),
        };
        let light = match args.get(2) {
            Some(value) => expect_color(value)?,
            None => Rgba::new(1.0, 1.0, 1.0, 1.0),
        };
        let threshold = match args.get(3) {
            Some(value) => amount(value)?,
            None => 0.43,
        };
        Ok(color_value(color::contrast(
            expect_color(&args[0])?,
            dark,
            light,
            threshold,
        )))
    });
    lib.register("multiply", "CC", |args| {
        Ok(color_value(color::multiply(
            expect_color(&args[0])?,
            expect_color(&args[1])?,
        )))
    });
    lib.register("screen", "CC", |args| {
        Ok(color_value(color::screen(
            expect_color(&args[0])?,
            expect_color(&args[1])?,
        )))
    });
    lib.register("overlay", "CC", |args| {
        Ok(color_value(color::overlay(
            expect_color(&args[0])?,
            expect_color(&args[1])?,
        )))
    });
}

fn color_value(rgba: Rgba) -> Value {
    Value::Color(ColorValue::computed(rgba))
}

fn register_string(lib: &mut FunctionLibrary) {
    lib.register("e", "S", |args| match &args[0] {
        Value::String(s) => Ok(Value::String(StringValue {
            text: s.text.clone(),
            quote: None,
        })),
        _ => Err("期望字符串".into()),
    });
    lib.register("escape", "S", |args| match &args[0] {
        Value::String(s) => Ok(Value::String(StringValue {
            text: percent_encode(&s.text),
            quote: None,
        })),
        _ => Err("期望字符串".into()),
    });
    lib.register("%", "S", format_handler);
    lib.register("%", "S.+", format_handler);
    lib.register("replace", "SSS?", |args| {
        let (text, quote) = match &args[0] {
            Value::String(s) => (s.text.clone(), s.quote),
            _ => return Err("期望字符串".into()),
        };
        let pattern = match &args[1] {
            Value::String(s) => s.text.clone(),
            _ => return Err("期望模式字符串".into()),
        };
        let replacement = match args.get(2) {
            Some(Value::String(s)) => s.text.clone(),
            Some(other) => other.to_css(),
            None => String::new(),
        };
        let regex = Regex::new(&pattern).map_err(|err| format!("无法编译正则: {err}"))?;
        Ok(Value::String(StringValue {
            text: regex.replace(&text, replacement.as_str()).into_owned(),
            quote,
        }))
    });
}

/// `%("%d px", 10)` 风格的格式化。支持 %s（无引号）、%d（数字）、%a（任意值）。
fn format_handler(args: &[Value]) -> Result<Value, String> {
    let (template, quote) = match &args[0] {
        Value::String(s) => (s.text.clone(), s.quote),
        _ => return Err("期望格式字符串".into()),
    };
    let mut output = String::new();
    let mut replacements = args[1..].iter();
    let mut chars = template.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '%' {
            output.push(ch);
            continue;
        }
        match chars.next() {
            Some('%') => output.push('%'),
            Some(directive @ ('s' | 'S' | 'd' | 'D' | 'a' | 'A')) => {
                let value = replacements.next().ok_or("格式化参数不足")?;
                let rendered = match (directive.to_ascii_lowercase(), value) {
                    ('s', Value::String(s)) => s.text.clone(),
                    _ => value.to_css(),
                };
                if directive.is_ascii_uppercase() {
                    output.push_str(&percent_encode(&rendered));
                } else {
                    output.push_str(&rendered);
                }
            }
            _ => return Err("未知的格式化指令".into()),
        }
    }
    Ok(Value::String(StringValue {
        text: output,
        quote,
    }))
}

fn percent_encode(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '~') {
            output.push(ch);
        } else {
            let mut buffer = [0u8; 4];
            for byte in ch.encode_utf8(&mut buffer).bytes() {
                output.push_str(&format!("%{byte:02X}"));
            }
        }
    }
    output
}

fn register_list(lib: &mut FunctionLibrary) {
    lib.register("length", ".+", |args| {
        Ok(Value::Number(args.len() as f64))
    });
    lib.register("extract", ".+", |args| {
        if args.len() < 2 {
            return Err("extract() 需要列表与下标".into());
        }
        let index = args[args.len() - 1]
            .as_number()
            .ok_or("extract() 的下标必须是数字")?;
        let list = &args[..args.len() - 1];
        if index < 1.0 || index as usize > list.len() {
            return Err("extract() 下标越界".into());
        }
        Ok(list[index as usize - 1].clone())
    });
}
