use thiserror::Error;

use crate::token::SourceLocation;

/// 编译过程中统一的错误类型，按规格划分错误种类。
#[derive(Debug, Error)]
pub enum LessError {
    #[error("词法错误: {message} (位置 {location})")]
    Lex {
        message: String,
        location: SourceLocation,
    },
    #[error("解析失败: {message} (位置 {location})")]
    Parse {
        message: String,
        location: SourceLocation,
    },
    #[error("未定义的变量 @{name} (位置 {location})")]
    UnboundVariable {
        name: String,
        location: SourceLocation,
    },
    #[error("单位不兼容: {message} (位置 {location})")]
    UnitMismatch {
        message: String,
        location: SourceLocation,
    },
    #[error("类型错误: {message} (位置 {location})")]
    Type {
        message: String,
        location: SourceLocation,
    },
    #[error("未找到匹配的 mixin {name} (位置 {location})")]
    MixinNotFound {
        name: String,
        location: SourceLocation,
    },
    #[error("mixin {name} 参数数量不匹配: {message} (位置 {location})")]
    Arity {
        name: String,
        message: String,
        location: SourceLocation,
    },
    #[error("检测到循环的变量定义 @{name} (位置 {location})")]
    VariableCycle {
        name: String,
        location: SourceLocation,
    },
    #[error("mixin 展开深度超出上限 {limit}")]
    RecursionLimit { limit: usize },
    #[error("函数 {name} 参数不合法: {message} (位置 {location})")]
    Function {
        name: String,
        message: String,
        location: SourceLocation,
    },
    #[error("读写失败: {message}")]
    Io { message: String },
}

pub type LessResult<T> = Result<T, LessError>;

impl LessError {
    pub fn lex<S: Into<String>>(message: S, location: SourceLocation) -> Self {
        LessError::Lex {
            message: message.into(),
            location,
        }
    }

    pub fn parse<S: Into<String>>(message: S, location: SourceLocation) -> Self {
        LessError::Parse {
            message: message.into(),
            location,
        }
    }

    pub fn unbound_variable<S: Into<String>>(name: S, location: SourceLocation) -> Self {
        LessError::UnboundVariable {
            name: name.into(),
            location,
        }
    }

    pub fn unit_mismatch<S: Into<String>>(message: S, location: SourceLocation) -> Self {
        LessError::UnitMismatch {
            message: message.into(),
            location,
        }
    }

    pub fn type_error<S: Into<String>>(message: S, location: SourceLocation) -> Self {
        LessError::Type {
            message: message.into(),
            location,
        }
    }

    pub fn function<N: Into<String>, S: Into<String>>(
        name: N,
        message: S,
        location: SourceLocation,
    ) -> Self {
        LessError::Function {
            name: name.into(),
            message: message.into(),
            location,
        }
    }

    pub fn io<S: Into<String>>(message: S) -> Self {
        LessError::Io {
            message: message.into(),
        }
    }

    /// CLI 退出码约定：1 = 词法/解析错误，2 = 求值错误，3 = I/O 错误。
    pub fn exit_code(&self) -> i32 {
        match self {
            LessError::Lex { .. } | LessError::Parse { .. } => 1,
            LessError::Io { .. } => 3,
            _ => 2,
        }
    }
}
