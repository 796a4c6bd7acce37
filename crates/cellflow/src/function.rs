//! Structured form of the generated cell functions.
//!
//! Cell code travels as text (`function name(a,b) { … }`) because that is what
//! the descriptor format stores and what a JavaScript host instantiates.
//! [`FunctionSource`] is the parsed view of that text: qualifiers, name,
//! parameter list and the untouched body.

use crate::error::{Error, Result};
use crate::parser::ParseError;
use chumsky::prelude::*;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FunctionKind {
    #[default]
    Plain,
    Async,
    Generator,
    AsyncGenerator,
}

impl FunctionKind {
    pub fn new(is_async: bool, is_generator: bool) -> Self {
        match (is_async, is_generator) {
            (false, false) => Self::Plain,
            (true, false) => Self::Async,
            (false, true) => Self::Generator,
            (true, true) => Self::AsyncGenerator,
        }
    }

    fn keyword(self) -> &'static str {
        match self {
            Self::Plain => "function",
            Self::Async => "async function",
            Self::Generator => "function*",
            Self::AsyncGenerator => "async function*",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSource {
    pub kind: FunctionKind,
    /// Empty for anonymous cells.
    pub name: String,
    pub parameters: Vec<String>,
    /// Block text including the surrounding braces.
    pub body: String,
}

impl FunctionSource {
    pub fn new(
        kind: FunctionKind,
        name: impl Into<String>,
        parameters: Vec<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            parameters,
            body: body.into(),
        }
    }

    /// Block body returning a single expression.
    pub fn expression_body(expression: &str) -> String {
        format!("{{\nreturn ({expression});\n}}")
    }

    pub fn parse(code: &str) -> Result<Self> {
        function_source()
            .parse(code)
            .into_result()
            .map_err(|errors| Error::FunctionSource {
                code: code.to_owned(),
                reason: errors
                    .first()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "unexpected input".to_owned()),
            })
    }
}

impl FromStr for FunctionSource {
    type Err = Error;

    fn from_str(code: &str) -> Result<Self> {
        Self::parse(code)
    }
}

impl fmt::Display for FunctionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}({}) {}",
            self.kind.keyword(),
            self.name,
            self.parameters.join(","),
            self.body
        )
    }
}

fn function_source<'code>()
-> impl Parser<'code, &'code str, FunctionSource, extra::Err<ParseError<'code, char>>> {
    let is_async = text::keyword("async")
        .then_ignore(text::inline_whitespace().at_least(1))
        .or_not()
        .map(|qualifier| qualifier.is_some());

    let is_generator = just('*').or_not().map(|star| star.is_some());

    let name = none_of("(")
        .repeated()
        .to_slice()
        .map(|name: &str| name.trim().to_owned());

    let parameter = none_of(",)")
        .repeated()
        .at_least(1)
        .to_slice()
        .map(|parameter: &str| parameter.trim().to_owned());

    let parameters = parameter
        .separated_by(just(','))
        .collect::<Vec<_>>()
        .delimited_by(just('('), just(')'));

    let body = any()
        .repeated()
        .at_least(1)
        .to_slice()
        .map(|body: &str| body.to_owned());

    is_async
        .then_ignore(text::keyword("function"))
        .then(is_generator)
        .then_ignore(text::inline_whitespace())
        .then(name)
        .then(parameters)
        .then_ignore(text::whitespace())
        .then(body)
        .map(|((((is_async, is_generator), name), parameters), body)| FunctionSource {
            kind: FunctionKind::new(is_async, is_generator),
            name,
            parameters,
            body,
        })
}
