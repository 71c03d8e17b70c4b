use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("component has no <script> element")]
    MissingScript,
    #[error("component has more than one <script> element")]
    MultipleScripts,
    #[error("component needs at least one markup element besides the script")]
    MissingMarkup,
    #[error("invalid script: {message}")]
    InvalidScript { message: String },
    #[error("invalid expression `{expression}`: {message}")]
    InvalidExpression { expression: String, message: String },
    #[error("invalid v-for `{expression}`: expected `pattern in iterable`")]
    InvalidForLoop { expression: String },
    #[error("`{directive}` must directly follow a v-if or v-else-if sibling")]
    DanglingElse { directive: String },
    #[error("directive `{name}` has no value")]
    MissingDirectiveValue { name: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CompileError {
    pub(crate) fn expression(expression: impl Into<String>, message: impl Into<String>) -> Self {
        CompileError::InvalidExpression {
            expression: expression.into(),
            message: message.into(),
        }
    }
}
