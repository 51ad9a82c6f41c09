//! The ASP term model.
//!
//! Terms are the alphabet shared with the solver: everything the setup
//! phase emits and everything a stable model returns is an
//! [`AspFunction`] over [`AspValue`] arguments. Rendering a term yields
//! its rule source form (strings and booleans quoted, integers bare),
//! which is also the form used to identify rules in unsatisfiable cores.

use std::fmt::{Display, Formatter};

use winnow::{
    ModalResult,
    Parser,
    ascii::{dec_int, multispace0},
    combinator::{alt, delimited, opt, separated},
    token::{any, take_while},
};

use crate::Error;

/// One argument of an [`AspFunction`].
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum AspValue {
    /// A quoted string literal.
    Str(String),
    /// A bare signed integer.
    Int(i64),
    /// A boolean, rendered as a quoted token.
    Bool(bool),
    /// A nested functor application.
    Fun(AspFunction),
}

impl AspValue {
    /// Returns the value as unquoted text.
    ///
    /// This is the form the spec builder consumes: strings lose their
    /// quotes, everything else renders as written.
    pub fn raw(&self) -> String {
        match self {
            AspValue::Str(s) => s.clone(),
            AspValue::Int(i) => i.to_string(),
            AspValue::Bool(b) => b.to_string(),
            AspValue::Fun(f) => f.to_string(),
        }
    }

    /// Returns the string contents, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AspValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer, if this is an integer value.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            AspValue::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl Display for AspValue {
    fn fmt(&self, fmt: &mut Formatter) -> std::fmt::Result {
        match self {
            AspValue::Str(s) => {
                write!(fmt, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
            }
            AspValue::Int(i) => write!(fmt, "{i}"),
            AspValue::Bool(b) => write!(fmt, "\"{b}\""),
            AspValue::Fun(f) => write!(fmt, "{f}"),
        }
    }
}

impl From<&str> for AspValue {
    fn from(value: &str) -> Self {
        AspValue::Str(value.to_string())
    }
}

impl From<String> for AspValue {
    fn from(value: String) -> Self {
        AspValue::Str(value)
    }
}

impl From<&String> for AspValue {
    fn from(value: &String) -> Self {
        AspValue::Str(value.clone())
    }
}

impl From<bool> for AspValue {
    fn from(value: bool) -> Self {
        AspValue::Bool(value)
    }
}

impl From<i64> for AspValue {
    fn from(value: i64) -> Self {
        AspValue::Int(value)
    }
}

impl From<i32> for AspValue {
    fn from(value: i32) -> Self {
        AspValue::Int(i64::from(value))
    }
}

impl From<usize> for AspValue {
    fn from(value: usize) -> Self {
        AspValue::Int(value as i64)
    }
}

impl From<AspFunction> for AspValue {
    fn from(value: AspFunction) -> Self {
        AspValue::Fun(value)
    }
}

impl From<&concrete_types::Version> for AspValue {
    fn from(value: &concrete_types::Version) -> Self {
        AspValue::Str(value.to_string())
    }
}

impl From<&concrete_types::VersionRequest> for AspValue {
    fn from(value: &concrete_types::VersionRequest) -> Self {
        AspValue::Str(value.to_string())
    }
}

/// A functor application `name(arg1, …, argN)`.
///
/// Arity-zero functors render as `name()`.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct AspFunction {
    name: String,
    args: Vec<AspValue>,
}

impl AspFunction {
    /// Creates a functor application.
    pub fn new(name: &str, args: Vec<AspValue>) -> Self {
        Self {
            name: name.to_string(),
            args,
        }
    }

    /// Returns the functor name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the arguments.
    pub fn args(&self) -> &[AspValue] {
        &self.args
    }

    /// Recognizes a functor application in solver output text.
    pub fn parser(value: &mut &str) -> ModalResult<Self> {
        let name = identifier.parse_next(value)?;
        let args = opt(delimited(
            ('(', multispace0),
            separated(0.., term, (',', multispace0)),
            (multispace0, ')'),
        ))
        .parse_next(value)?;
        Ok(AspFunction {
            name: name.to_string(),
            args: args.unwrap_or_default(),
        })
    }

    /// Parses a functor application, consuming the whole input.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] naming the unparsable atom text.
    pub fn parse(input: &str) -> Result<Self, Error> {
        Self::parser
            .parse(input.trim())
            .map_err(|_| Error::Internal(format!("cannot parse model atom: {input}")))
    }
}

impl Display for AspFunction {
    fn fmt(&self, fmt: &mut Formatter) -> std::fmt::Result {
        write!(fmt, "{}(", self.name)?;
        let mut first = true;
        for arg in &self.args {
            if !first {
                write!(fmt, ", ")?;
            }
            write!(fmt, "{arg}")?;
            first = false;
        }
        write!(fmt, ")")
    }
}

fn identifier<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '_').parse_next(input)
}

fn quoted_string(input: &mut &str) -> ModalResult<String> {
    '"'.parse_next(input)?;
    let mut out = String::new();
    loop {
        let c = any.parse_next(input)?;
        match c {
            '"' => break,
            '\\' => out.push(any.parse_next(input)?),
            c => out.push(c),
        }
    }
    Ok(out)
}

fn term(input: &mut &str) -> ModalResult<AspValue> {
    alt((
        quoted_string.map(AspValue::Str),
        dec_int.map(AspValue::Int),
        AspFunction::parser.map(|f| {
            // A bare identifier is an arity-zero constant; keep it as
            // text, mirroring how model symbols are stringified.
            if f.args().is_empty() {
                AspValue::Str(f.name().to_string())
            } else {
                AspValue::Fun(f)
            }
        }),
    ))
    .parse_next(input)
}

/// A conjunction of terms, rendered `a, b, c`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AspAnd(pub Vec<AspFunction>);

impl AspAnd {
    /// Creates a conjunction from its conjuncts.
    pub fn new(args: Vec<AspFunction>) -> Self {
        Self(args)
    }

    /// Returns whether the conjunction is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for AspAnd {
    fn fmt(&self, fmt: &mut Formatter) -> std::fmt::Result {
        let mut first = true;
        for arg in &self.0 {
            if !first {
                write!(fmt, ", ")?;
            }
            write!(fmt, "{arg}")?;
            first = false;
        }
        Ok(())
    }
}

/// A choice of exactly one alternative, rendered `1 { a; b; c } 1`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AspOneOf(pub Vec<AspFunction>);

impl AspOneOf {
    /// Creates a one-of over its alternatives.
    pub fn new(args: Vec<AspFunction>) -> Self {
        Self(args)
    }
}

impl Display for AspOneOf {
    fn fmt(&self, fmt: &mut Formatter) -> std::fmt::Result {
        write!(fmt, "1 {{ ")?;
        let mut first = true;
        for arg in &self.0 {
            if !first {
                write!(fmt, "; ")?;
            }
            write!(fmt, "{arg}")?;
            first = false;
        }
        write!(fmt, " }} 1")
    }
}

/// Builds an [`AspFunction`] from a functor-shaped expression.
///
/// ```
/// use concrete_solve::fun;
///
/// let atom = fun!(version_declared("python", "2.7.11", 0_i64));
/// assert_eq!(atom.to_string(), r#"version_declared("python", "2.7.11", 0)"#);
/// ```
#[macro_export]
macro_rules! fun {
    ($name:ident ( $($arg:expr),* $(,)? )) => {
        $crate::asp::AspFunction::new(
            stringify!($name),
            vec![$($crate::asp::AspValue::from($arg)),*],
        )
    };
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use testresult::TestResult;

    use super::*;

    #[rstest]
    #[case(fun!(node("zlib")), r#"node("zlib")"#)]
    #[case(fun!(version_declared("python", "2.7.11", 0_i64)), r#"version_declared("python", "2.7.11", 0)"#)]
    #[case(fun!(variant_value("a", "debug", true)), r#"variant_value("a", "debug", "true")"#)]
    #[case(fun!(timestamp()), "timestamp()")]
    fn rule_source_form(#[case] fun: AspFunction, #[case] expected: &str) {
        assert_eq!(fun.to_string(), expected);
    }

    #[test]
    fn strings_with_quotes_are_escaped() {
        let fun = fun!(rule("version(\"a\") :- node(\"a\")."));
        assert_eq!(
            fun.to_string(),
            r#"rule("version(\"a\") :- node(\"a\").")"#
        );
    }

    #[rstest]
    #[case(r#"version("python","2.7.11")"#)]
    #[case(r#"depends_on("a", "b", "build")"#)]
    #[case("version_weight(\"a\", -3)")]
    fn atoms_roundtrip_through_the_parser(#[case] input: &str) -> TestResult {
        let parsed = AspFunction::parse(input)?;
        let rendered = parsed.to_string();
        let reparsed = AspFunction::parse(&rendered)?;
        assert_eq!(parsed, reparsed);
        Ok(())
    }

    #[test]
    fn bare_identifiers_parse_as_text() -> TestResult {
        let parsed = AspFunction::parse("node_os_default(debian6)")?;
        assert_eq!(parsed.args()[0], AspValue::Str("debian6".to_string()));
        Ok(())
    }

    #[test]
    fn conjunction_and_one_of_render() {
        let and = AspAnd::new(vec![fun!(node("a")), fun!(version("a", "1.0"))]);
        assert_eq!(and.to_string(), r#"node("a"), version("a", "1.0")"#);

        let one_of = AspOneOf::new(vec![fun!(version("a", "1.0")), fun!(version("a", "2.0"))]);
        assert_eq!(
            one_of.to_string(),
            r#"1 { version("a", "1.0"); version("a", "2.0") } 1"#
        );
    }
}
