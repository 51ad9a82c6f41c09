//! The spec literal parser.
//!
//! A spec literal is a whitespace separated sequence of constraint tokens
//! for one package node, optionally followed by `^dep` fragments that
//! constrain dependencies:
//!
//! ```text
//! mpileaks @2.3: %gcc@4.5 +debug foo=bar cflags="-O3 -g" os=fe ^mpich2@1.1
//! ```
//!
//! The leading package name may be omitted to form an anonymous
//! constraint spec, as used by dependency activation conditions.

use std::str::FromStr;

use log::debug;
use winnow::{
    ModalResult,
    Parser,
    ascii::{multispace0, space0},
    combinator::{cut_err, fail, opt, preceded},
    token::take_while,
};

use crate::{
    CompilerConstraint,
    DepTypes,
    Error,
    FlagCategory,
    Spec,
    SpecNode,
    TargetRequest,
    VariantValue,
    VersionRequest,
};

/// Parses a complete spec literal.
pub(crate) fn parse_spec(literal: &str) -> Result<Spec, Error> {
    debug!("Recognizing spec literal in {literal:?}.");
    if literal.trim().is_empty() {
        return Err(Error::InvalidSpecLiteral {
            literal: literal.to_string(),
            reason: "empty literal".to_string(),
        });
    }
    spec_parser
        .parse(literal)
        .map_err(|err| Error::InvalidSpecLiteral {
            literal: literal.to_string(),
            reason: err.to_string(),
        })
}

fn spec_parser(input: &mut &str) -> ModalResult<Spec> {
    multispace0.parse_next(input)?;
    let root = node_parser.parse_next(input)?;
    let mut spec = Spec::from_node(root);
    let root_name = spec.root_name().to_string();

    loop {
        multispace0.parse_next(input)?;
        if opt('^').parse_next(input)?.is_none() {
            break;
        }
        multispace0.parse_next(input)?;
        let dep = node_parser.parse_next(input)?;
        if dep.name.is_empty() {
            // Dependency fragments must name a package.
            return fail.parse_next(input);
        }
        spec.add_dependency(&root_name, dep, DepTypes::none());
    }
    multispace0.parse_next(input)?;
    Ok(spec)
}

fn node_parser(input: &mut &str) -> ModalResult<SpecNode> {
    let name = opt(identifier).parse_next(input)?.unwrap_or_default();
    let mut node = SpecNode::new(name);

    loop {
        space0.parse_next(input)?;
        let Some(next) = input.chars().next() else {
            break;
        };
        match next {
            '^' => break,
            '@' => {
                '@'.parse_next(input)?;
                node.versions = cut_err(VersionRequest::parser).parse_next(input)?;
            }
            '%' => {
                '%'.parse_next(input)?;
                let compiler = cut_err(identifier).parse_next(input)?;
                let versions =
                    opt(preceded('@', cut_err(VersionRequest::parser))).parse_next(input)?;
                node.compiler = Some(CompilerConstraint {
                    name: compiler.to_string(),
                    versions: versions.unwrap_or(VersionRequest::Any),
                });
            }
            '+' => {
                '+'.parse_next(input)?;
                let variant = cut_err(identifier).parse_next(input)?;
                node.variants
                    .insert(variant.to_string(), VariantValue::enabled());
            }
            '~' => {
                '~'.parse_next(input)?;
                let variant = cut_err(identifier).parse_next(input)?;
                node.variants
                    .insert(variant.to_string(), VariantValue::disabled());
            }
            c if c.is_ascii_alphanumeric() || c == '_' || c == '*' => {
                key_value(input, &mut node)?;
            }
            _ => break,
        }
    }
    Ok(node)
}

fn key_value(input: &mut &str, node: &mut SpecNode) -> ModalResult<()> {
    let key = identifier.parse_next(input)?.to_string();
    cut_err('=').parse_next(input)?;
    match key.as_str() {
        "platform" => {
            node.arch.platform = Some(cut_err(value_token).parse_next(input)?.to_string());
        }
        "os" => {
            node.arch.os = Some(cut_err(value_token).parse_next(input)?.to_string());
        }
        "target" => {
            let token = cut_err(value_token).parse_next(input)?;
            match TargetRequest::from_str(token) {
                Ok(target) => node.arch.target = Some(target),
                Err(_) => return fail.parse_next(input),
            }
        }
        "dev_path" => {
            let token = cut_err(value_token).parse_next(input)?;
            node.variants.insert(
                "dev_path".to_string(),
                VariantValue::Single(token.to_string()),
            );
        }
        "patches" => {
            let token = cut_err(value_token).parse_next(input)?;
            node.variants.insert(
                "patches".to_string(),
                VariantValue::Multi(token.split(',').map(str::to_string).collect()),
            );
        }
        key => match FlagCategory::from_name(key) {
            Ok(category) => {
                let value = quoted_or_token(input)?;
                for flag in value.split_whitespace() {
                    node.flags.push(category, flag);
                }
            }
            Err(_) => {
                let token = cut_err(value_token).parse_next(input)?;
                node.variants
                    .insert(key.to_string(), VariantValue::from_token(token));
            }
        },
    }
    Ok(())
}

fn identifier<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    take_while(1.., |c: char| {
        c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
    })
    .parse_next(input)
}

fn value_token<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    take_while(1.., |c: char| !c.is_whitespace() && c != '^').parse_next(input)
}

fn quoted_or_token(input: &mut &str) -> ModalResult<String> {
    if input.starts_with('"') {
        let inner = ('"', take_while(0.., |c: char| c != '"'), '"')
            .map(|(_, inner, _): (char, &str, char)| inner.to_string())
            .parse_next(input)?;
        Ok(inner)
    } else {
        cut_err(value_token)
            .parse_next(input)
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use testresult::TestResult;

    use super::*;
    use crate::Version;

    #[test]
    fn parses_dependencies_and_constraints() -> TestResult {
        let spec = Spec::from_str("mpileaks @2.3 +debug ^mpich2@1.1 ^ callpath")?;
        assert_eq!(spec.root_name(), "mpileaks");
        assert_eq!(
            spec.root().versions,
            VersionRequest::Exact(Version::from_str("2.3")?)
        );
        assert_eq!(
            spec.root().variants.get("debug"),
            Some(&VariantValue::enabled())
        );

        let mpich2 = spec.node("mpich2").expect("dependency node exists");
        assert_eq!(
            mpich2.versions,
            VersionRequest::Exact(Version::from_str("1.1")?)
        );
        assert!(spec.node("callpath").is_some());
        Ok(())
    }

    #[test]
    fn parses_compiler_and_architecture() -> TestResult {
        let spec = Spec::from_str("cmake-client %gcc@4.7.2 os=fe ^ cmake")?;
        let root = spec.root();
        let compiler = root.compiler.as_ref().expect("compiler constraint set");
        assert_eq!(compiler.name, "gcc");
        assert_eq!(
            compiler.concrete_version(),
            Some(&Version::from_str("4.7.2")?)
        );
        assert_eq!(root.arch.os.as_deref(), Some("fe"));
        assert!(spec.node("cmake").is_some());
        Ok(())
    }

    #[test]
    fn parses_flags_and_variants() -> TestResult {
        let spec = Spec::from_str("a foobar=bar cflags=\"-O3 -g\" target=x86_64:")?;
        let root = spec.root();
        assert_eq!(
            root.variants.get("foobar"),
            Some(&VariantValue::Single("bar".to_string()))
        );
        assert_eq!(
            root.flags.get(crate::FlagCategory::Cflags),
            Some(["-O3".to_string(), "-g".to_string()].as_slice())
        );
        assert_eq!(
            root.arch.target,
            Some(TargetRequest::Range {
                lo: Some("x86_64".to_string()),
                hi: None
            })
        );
        Ok(())
    }

    #[test]
    fn parses_anonymous_constraint() -> TestResult {
        let spec = Spec::from_str("@1.1~shared")?;
        assert!(!spec.is_named());
        assert_eq!(
            spec.root().variants.get("shared"),
            Some(&VariantValue::disabled())
        );

        let named = spec.with_default_name("zlib");
        assert_eq!(named.root_name(), "zlib");
        Ok(())
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("pkg ^@1.0")]
    #[case("pkg cflags=")]
    fn rejects_invalid_literals(#[case] literal: &str) {
        assert!(Spec::from_str(literal).is_err());
    }
}
