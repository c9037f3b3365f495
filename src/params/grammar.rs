//! Parameter-settings grammar
//!
//! `name=value, name2="quoted, text", name3=42` checked against a list of
//! [`ParameterDef`]s from the registry.

use std::collections::HashMap;

use super::value::{ParameterSettings, ParameterValue};
use crate::context::DataLookup;
use crate::error::{ParseError, ParseResult};
use crate::registry::{Direction, ParameterDef, ParameterType};
use crate::types::{DataType, TypeTable};

/// Where data references in a settings block are resolved
#[derive(Clone, Copy)]
pub enum TypeContext<'a> {
    /// The running type table of a protocol being parsed
    Protocol(&'a TypeTable),
    /// An explicit name-to-type table supplied by the caller
    Table(&'a HashMap<String, DataType>),
    /// Direct lookup in the engine's data store
    Engine(&'a dyn DataLookup),
}

impl TypeContext<'_> {
    pub fn resolve(&self, name: &str) -> Option<DataType> {
        match self {
            TypeContext::Protocol(table) => table.get(name),
            TypeContext::Table(map) => map.get(name).copied(),
            TypeContext::Engine(lookup) => lookup.data_type(name),
        }
    }
}

impl std::fmt::Debug for TypeContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeContext::Protocol(_) => f.write_str("TypeContext::Protocol"),
            TypeContext::Table(_) => f.write_str("TypeContext::Table"),
            TypeContext::Engine(_) => f.write_str("TypeContext::Engine"),
        }
    }
}

/// Which parameters [`render_settings`] emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParameterFilter {
    #[default]
    All,
    Input,
    Output,
}

impl ParameterFilter {
    fn admits(&self, direction: Direction) -> bool {
        match (self, direction) {
            (ParameterFilter::All, _) | (_, Direction::Both) => true,
            (ParameterFilter::Input, Direction::Input) => true,
            (ParameterFilter::Output, Direction::Output) => true,
            _ => false,
        }
    }
}

/// Split on `separator` outside double quotes
pub fn split_top_level(text: &str, separator: char) -> ParseResult<Vec<&str>> {
    let mut parts = Vec::new();
    let mut in_quote = false;
    let mut start = 0;
    for (idx, ch) in text.char_indices() {
        if ch == '"' {
            in_quote = !in_quote;
        } else if ch == separator && !in_quote {
            parts.push(&text[start..idx]);
            start = idx + ch.len_utf8();
        }
    }
    if in_quote {
        return Err(ParseError::syntax(format!(
            "Unmatched quote in '{}'",
            text.trim()
        )));
    }
    parts.push(&text[start..]);
    Ok(parts)
}

fn strip_quotes(text: &str) -> Option<&str> {
    let text = text.trim();
    if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        Some(&text[1..text.len() - 1])
    } else {
        None
    }
}

/// Parse a settings block (without its braces)
///
/// Parameters missing from the text get their declared default. A
/// required parameter with neither is an error.
pub fn parse_settings(
    text: &str,
    schema: &[ParameterDef],
    context: TypeContext<'_>,
) -> ParseResult<ParameterSettings> {
    let mut settings = ParameterSettings::new();

    if !text.trim().is_empty() {
        for pair in split_top_level(text, ',')? {
            let pair = pair.trim();
            if pair.is_empty() {
                return Err(ParseError::syntax(format!(
                    "Empty parameter setting in '{}'",
                    text.trim()
                )));
            }
            let (name, value) = pair.split_once('=').ok_or_else(|| {
                ParseError::syntax(format!("Expected 'name=value' but found '{}'", pair))
            })?;
            let name = name.trim();
            let param = schema
                .iter()
                .find(|p| p.name.eq_ignore_ascii_case(name))
                .ok_or_else(|| ParseError::semantic(format!("Unknown parameter '{}'", name)))?;
            if settings.contains(&param.name) {
                return Err(ParseError::semantic(format!(
                    "Parameter '{}' is set more than once",
                    param.name
                )));
            }
            let value = coerce(param, value.trim(), context)?;
            settings.set(param.name.clone(), value);
        }
    }

    for param in schema {
        if settings.contains(&param.name) {
            continue;
        }
        match &param.default {
            Some(default) => {
                let value = coerce_default(param, default)?;
                settings.set(param.name.clone(), value);
            }
            None if param.required => {
                return Err(ParseError::semantic(format!(
                    "Missing value for required parameter '{}'",
                    param.name
                )));
            }
            None => {}
        }
    }
    Ok(settings)
}

/// Coerce one textual value to the parameter's declared type
fn coerce(param: &ParameterDef, text: &str, context: TypeContext<'_>) -> ParseResult<ParameterValue> {
    let invalid = |expected: &str| {
        ParseError::semantic(format!(
            "Invalid value '{}' for parameter '{}'. Expected {}",
            text, param.name, expected
        ))
    };

    match param.param_type {
        ParameterType::Bool => {
            if text.eq_ignore_ascii_case("true") {
                Ok(ParameterValue::Bool(true))
            } else if text.eq_ignore_ascii_case("false") {
                Ok(ParameterValue::Bool(false))
            } else {
                Err(invalid("TRUE or FALSE"))
            }
        }
        ParameterType::Int => match text.parse::<i64>() {
            Ok(i) => Ok(ParameterValue::Int(i)),
            Err(_) => reference(param, text, context).map_err(|_| invalid("an integer")),
        },
        ParameterType::Double => match text.parse::<f64>() {
            Ok(d) if d.is_finite() => Ok(ParameterValue::Double(d)),
            _ => reference(param, text, context).map_err(|_| invalid("a number")),
        },
        ParameterType::String => {
            if let Some(quoted) = strip_quotes(text) {
                return allowed_text(param, quoted);
            }
            match context.resolve(text) {
                Some(ty) if param.accepts_reference(ty) => Ok(ParameterValue::Data(text.to_string())),
                _ => allowed_text(param, text),
            }
        }
        ParameterType::Data => reference(param, text, context),
    }
}

fn coerce_default(param: &ParameterDef, default: &str) -> ParseResult<ParameterValue> {
    let bad_default = || {
        ParseError::internal(format!(
            "Default value '{}' of parameter '{}' does not fit its type",
            default, param.name
        ))
    };
    match param.param_type {
        ParameterType::Bool => default
            .parse::<bool>()
            .map(ParameterValue::Bool)
            .map_err(|_| bad_default()),
        ParameterType::Int => default
            .parse::<i64>()
            .map(ParameterValue::Int)
            .map_err(|_| bad_default()),
        ParameterType::Double => default
            .parse::<f64>()
            .map(ParameterValue::Double)
            .map_err(|_| bad_default()),
        ParameterType::String => Ok(ParameterValue::Text(default.to_string())),
        ParameterType::Data => Ok(ParameterValue::Data(default.to_string())),
    }
}

fn reference(param: &ParameterDef, name: &str, context: TypeContext<'_>) -> ParseResult<ParameterValue> {
    let ty = context
        .resolve(name)
        .ok_or_else(|| ParseError::semantic(format!("Unknown data object '{}'", name)))?;
    if !param.accepts_reference(ty) && !(param.param_type == ParameterType::Data && param.data_types.is_none()) {
        return Err(ParseError::semantic(format!(
            "'{}' is a {} and can not be used for parameter '{}'",
            name, ty, param.name
        )));
    }
    Ok(ParameterValue::Data(name.to_string()))
}

/// Text value checked against the allowed set, spelled as the schema spells it
fn allowed_text(param: &ParameterDef, text: &str) -> ParseResult<ParameterValue> {
    let Some(allowed) = &param.allowed_values else {
        return Ok(ParameterValue::Text(text.to_string()));
    };
    allowed
        .iter()
        .find(|v| v.eq_ignore_ascii_case(text))
        .map(|v| ParameterValue::Text(v.clone()))
        .ok_or_else(|| {
            ParseError::semantic(format!(
                "Invalid value '{}' for parameter '{}'. Allowed values are: {}",
                text,
                param.name,
                allowed.join(", ")
            ))
        })
}

/// Render settings back to `name=value` pairs in schema order
///
/// Hidden and secret parameters are never written, advanced ones only when
/// they differ from their default, and the filter drops parameters of the
/// other direction.
pub fn render_settings(
    schema: &[ParameterDef],
    settings: &ParameterSettings,
    filter: ParameterFilter,
) -> String {
    let mut pairs = Vec::new();
    for param in schema {
        if param.hidden || param.secret || !filter.admits(param.direction) {
            continue;
        }
        let Some(value) = settings.get(&param.name) else {
            continue;
        };
        if param.advanced
            && param
                .default
                .as_deref()
                .is_some_and(|default| value.matches_text(default))
        {
            continue;
        }
        pairs.push(format!("{}={}", param.name, value));
    }
    pairs.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(name: &str, param_type: ParameterType, default: Option<&str>) -> ParameterDef {
        ParameterDef {
            name: name.to_string(),
            param_type,
            required: false,
            description: None,
            default: default.map(str::to_string),
            allowed_values: None,
            data_types: None,
            hidden: false,
            advanced: false,
            secret: false,
            direction: Direction::Both,
        }
    }

    fn no_types() -> HashMap<String, DataType> {
        HashMap::new()
    }

    #[test]
    fn test_empty_text_yields_defaults() {
        let schema = vec![
            param("a", ParameterType::Int, Some("1")),
            param("b", ParameterType::String, Some("x")),
        ];
        let types = no_types();
        let settings = parse_settings("", &schema, TypeContext::Table(&types)).unwrap();
        assert_eq!(settings.len(), 2);
        assert_eq!(settings.get("a"), Some(&ParameterValue::Int(1)));
        assert_eq!(settings.get("b"), Some(&ParameterValue::Text("x".into())));
    }

    #[test]
    fn test_empty_string_default() {
        let schema = vec![param("label", ParameterType::String, Some(""))];
        let types = no_types();
        let settings = parse_settings("  ", &schema, TypeContext::Table(&types)).unwrap();
        assert_eq!(settings.get("label"), Some(&ParameterValue::Text(String::new())));
    }

    #[test]
    fn test_comma_inside_quotes() {
        let schema = vec![
            param("name", ParameterType::String, None),
            param("other", ParameterType::Int, None),
        ];
        let types = no_types();
        let settings =
            parse_settings("name=\"a,b\",other=2", &schema, TypeContext::Table(&types)).unwrap();
        assert_eq!(settings.len(), 2);
        assert_eq!(settings.get("name"), Some(&ParameterValue::Text("a,b".into())));
        assert_eq!(settings.get("other"), Some(&ParameterValue::Int(2)));
    }

    #[test]
    fn test_numeric_reference() {
        let schema = vec![param("Threshold", ParameterType::Double, Some("0.95"))];
        let types = HashMap::from([
            ("Cutoff".to_string(), DataType::NumericVariable),
            ("Label".to_string(), DataType::TextVariable),
        ]);
        let ctx = TypeContext::Table(&types);
        let settings = parse_settings("Threshold=Cutoff", &schema, ctx).unwrap();
        assert_eq!(settings.get("Threshold"), Some(&ParameterValue::Data("Cutoff".into())));
        assert!(parse_settings("Threshold=Label", &schema, ctx).is_err());
        assert!(parse_settings("Threshold=Nothing", &schema, ctx).is_err());
    }

    #[test]
    fn test_bool_values() {
        let schema = vec![param("Reverse", ParameterType::Bool, Some("true"))];
        let types = no_types();
        let ctx = TypeContext::Table(&types);
        assert_eq!(
            parse_settings("Reverse=FALSE", &schema, ctx).unwrap().get("Reverse"),
            Some(&ParameterValue::Bool(false))
        );
        assert!(parse_settings("Reverse=yes", &schema, ctx).is_err());
    }

    #[test]
    fn test_allowed_values_are_canonicalised() {
        let mut model = param("Model", ParameterType::String, Some("zoops"));
        model.allowed_values = Some(vec!["oops".into(), "zoops".into(), "anr".into()]);
        let schema = vec![model];
        let types = no_types();
        let ctx = TypeContext::Table(&types);
        assert_eq!(
            parse_settings("model=ANR", &schema, ctx).unwrap().get("Model"),
            Some(&ParameterValue::Text("anr".into()))
        );
        let err = parse_settings("Model=tcm", &schema, ctx).unwrap_err();
        assert!(err.message.contains("Allowed values"));
    }

    #[test]
    fn test_structural_errors() {
        let schema = vec![param("a", ParameterType::Int, None)];
        let types = no_types();
        let ctx = TypeContext::Table(&types);
        assert!(parse_settings("a", &schema, ctx).is_err());
        assert!(parse_settings("b=1", &schema, ctx).is_err());
        assert!(parse_settings("a=1,a=2", &schema, ctx).is_err());
        assert!(parse_settings("a=1,", &schema, ctx).is_err());
    }

    #[test]
    fn test_required_without_default() {
        let mut email = param("Email", ParameterType::String, None);
        email.required = true;
        let types = no_types();
        let err = parse_settings("", &[email], TypeContext::Table(&types)).unwrap_err();
        assert!(err.message.contains("Email"));
    }

    #[test]
    fn test_engine_context() {
        let schema = vec![param("Track", ParameterType::Data, None)];
        let engine = HashMap::from([("Genes".to_string(), DataType::RegionDataset)]);
        let settings = parse_settings("Track=Genes", &schema, TypeContext::Engine(&engine)).unwrap();
        assert_eq!(settings.data_references(), ["Genes"]);
    }

    #[test]
    fn test_render_skips_hidden_secret_and_default_advanced() {
        let mut hidden = param("Track name", ParameterType::String, Some("track"));
        hidden.hidden = true;
        let mut secret = param("Token", ParameterType::String, None);
        secret.secret = true;
        let mut advanced = param("Pseudo", ParameterType::Double, Some("0.01"));
        advanced.advanced = true;
        let mut output_only = param("Include score", ParameterType::Bool, Some("true"));
        output_only.direction = Direction::Output;
        let schema = vec![
            param("Label", ParameterType::String, None),
            hidden,
            secret,
            advanced,
            output_only,
        ];

        let mut settings = ParameterSettings::new();
        settings.set("Label", ParameterValue::Text("x y".into()));
        settings.set("Track name", ParameterValue::Text("t".into()));
        settings.set("Token", ParameterValue::Text("s3cr3t".into()));
        settings.set("Pseudo", ParameterValue::Double(0.01));
        settings.set("Include score", ParameterValue::Bool(false));

        assert_eq!(
            render_settings(&schema, &settings, ParameterFilter::All),
            "Label=\"x y\", Include score=false"
        );
        assert_eq!(
            render_settings(&schema, &settings, ParameterFilter::Input),
            "Label=\"x y\""
        );

        settings.set("Pseudo", ParameterValue::Double(0.5));
        assert!(render_settings(&schema, &settings, ParameterFilter::All).contains("Pseudo=0.5"));
    }

    #[test]
    fn test_render_then_parse() {
        let schema = vec![
            param("Label", ParameterType::String, None),
            param("Width", ParameterType::Int, Some("8")),
            param("Cutoff", ParameterType::Double, Some("0.5")),
        ];
        let types = no_types();
        let ctx = TypeContext::Table(&types);
        let settings = parse_settings("Label=\"a, b\", Width=12", &schema, ctx).unwrap();
        let rendered = render_settings(&schema, &settings, ParameterFilter::All);
        assert_eq!(parse_settings(&rendered, &schema, ctx).unwrap(), settings);
    }
}
