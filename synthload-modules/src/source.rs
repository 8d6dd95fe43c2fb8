//! Source injection
//!
//! Injecting text into a module is opt-in: a [`Runtime`](crate::Runtime)
//! only accepts it once a [`SourceEvaluator`] is installed. The bundled
//! [`DirectiveEvaluator`] understands a small line-oriented language whose
//! directives map one-to-one onto the generation context's operations:
//!
//! ```text
//! # comments and blank lines are ignored
//! isa App::Base App::Mixin
//! use App::Helper "fast" 3
//! scalar version = "1.0"
//! list colors = ["red", "green"]
//! map limits = {"max": 10}
//! ```

use crate::context::{Collection, GenerationContext};
use crate::error::{LoaderError, Result};
use crate::pattern::Captures;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Evaluates injected source text into the module under generation
pub trait SourceEvaluator: Send + Sync {
    fn evaluate(&self, source: &str, ctx: &mut GenerationContext<'_>) -> Result<()>;
}

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$(?:(\d+)|\{(\d+)\}|(name)\b|(\$))").unwrap());

static BINDING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(scalar|list|map)\s+(\w+)\s*=\s*(.+)$").unwrap());

/// Replace `$N`, `${N}` and `$name` with captures and the module name.
/// `$$` is a literal dollar sign. Values are spliced in unescaped.
pub fn interpolate(text: &str, name: &str, captures: &Captures) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for caps in PLACEHOLDER_RE.captures_iter(text) {
        let whole = caps.get(0).map_or(0..0, |m| m.range());
        out.push_str(&text[last..whole.start]);
        last = whole.end;

        if let Some(index) = caps.get(1).or_else(|| caps.get(2)) {
            let value = index
                .as_str()
                .parse::<usize>()
                .ok()
                .and_then(|i| captures.get(i))
                .ok_or_else(|| {
                    LoaderError::generation(
                        name,
                        format!("no capture group {} (have {})", index.as_str(), captures.len()),
                    )
                })?;
            out.push_str(value);
        } else if caps.get(3).is_some() {
            out.push_str(name);
        } else {
            out.push('$');
        }
    }

    out.push_str(&text[last..]);
    Ok(out)
}

/// The built-in line-oriented directive language
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectiveEvaluator;

impl DirectiveEvaluator {
    pub fn new() -> Self {
        Self
    }

    fn evaluate_line(&self, line: &str, line_no: usize, ctx: &mut GenerationContext<'_>) -> Result<()> {
        let module = ctx.name().to_string();
        let fail = |message: String| LoaderError::SourceEvaluation {
            module: module.clone(),
            line: line_no,
            message,
        };

        let (keyword, rest) = line
            .split_once(char::is_whitespace)
            .map(|(k, r)| (k, r.trim()))
            .unwrap_or((line, ""));

        match keyword {
            "isa" => {
                if rest.is_empty() {
                    return Err(fail("isa needs at least one supertype".to_string()));
                }
                ctx.declare_supertypes(rest.split_whitespace())
            }
            "use" => {
                let (dependency, args) = rest
                    .split_once(char::is_whitespace)
                    .unwrap_or((rest, ""));
                if dependency.is_empty() {
                    return Err(fail("use needs a module name".to_string()));
                }
                let args = serde_json::Deserializer::from_str(args)
                    .into_iter::<Value>()
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|e| fail(format!("bad argument to use: {}", e)))?;
                ctx.declare_dependency(dependency, args).map(|_| ())
            }
            "scalar" | "list" | "map" => {
                let caps = BINDING_RE
                    .captures(line)
                    .ok_or_else(|| fail(format!("expected `{} NAME = VALUE`", keyword)))?;
                let member = &caps[2];
                let value: Value = serde_json::from_str(&caps[3])
                    .map_err(|e| fail(format!("bad value for {}: {}", member, e)))?;
                match (keyword, value) {
                    ("scalar", value) => ctx.bind_value(member, value),
                    ("list", Value::Array(values)) => ctx.bind_collection(member, Collection::List(values)),
                    ("map", Value::Object(entries)) => {
                        ctx.bind_collection(member, Collection::Map(entries.into_iter().collect()))
                    }
                    (kind, other) => Err(fail(format!(
                        "{} {} expects a {}, got {}",
                        kind,
                        member,
                        expected_json(kind),
                        other
                    ))),
                }
            }
            other => Err(fail(format!("unknown directive `{}`", other))),
        }
    }
}

fn expected_json(kind: &str) -> &'static str {
    match kind {
        "list" => "JSON array",
        "map" => "JSON object",
        _ => "JSON value",
    }
}

impl SourceEvaluator for DirectiveEvaluator {
    fn evaluate(&self, source: &str, ctx: &mut GenerationContext<'_>) -> Result<()> {
        for (i, raw) in source.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            self.evaluate_line(line, i + 1, ctx)?;
        }
        Ok(())
    }
}
