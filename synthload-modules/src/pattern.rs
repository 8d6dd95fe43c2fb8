//! Pattern compilation for module names
//!
//! A rule's pattern can be written as
//! - a literal module name (`"App::Config"`)
//! - a glob (`"App::*"`, `"App::**::Schema"`, `"Job??"`)
//! - a regular expression, used verbatim
//! - a list of any of the above
//!
//! Globs are compiled once into an anchored [`Regex`]:
//!
//! | marker | matches                                          |
//! |--------|--------------------------------------------------|
//! | `**`   | word characters and separators (many segments)   |
//! | `*`    | word characters inside one segment               |
//! | `?`    | exactly one word character                       |
//!
//! Every marker is a capturing group, numbered left to right. A glob with
//! no markers captures the whole name as group 1.

use crate::error::{LoaderError, Result};
use regex::Regex;
use std::fmt;
use std::ops::Index;
use tracing::trace;

/// A pattern as written by the rule author, before compilation
#[derive(Debug, Clone)]
pub enum PatternSpec {
    /// A literal name or glob
    Glob(String),
    /// Regular expression source, compiled at declaration time
    Regex(String),
    /// An already compiled regular expression
    Compiled(Regex),
    /// Several patterns sharing one generator
    List(Vec<PatternSpec>),
}

impl PatternSpec {
    /// Create a regular expression spec
    pub fn regex(source: impl Into<String>) -> Self {
        PatternSpec::Regex(source.into())
    }

    /// Compile into one [`Pattern`] per list element, in list order.
    ///
    /// Nested lists are flattened depth-first.
    pub fn compile(self, separator: &str) -> Result<Vec<Pattern>> {
        let mut patterns = Vec::new();
        self.compile_into(separator, &mut patterns)?;
        Ok(patterns)
    }

    fn compile_into(self, separator: &str, out: &mut Vec<Pattern>) -> Result<()> {
        match self {
            PatternSpec::Glob(glob) => out.push(compile_glob(&glob, separator)?),
            PatternSpec::Regex(source) => {
                let regex = Regex::new(&source).map_err(|source_err| LoaderError::PatternCompile {
                    pattern: source.clone(),
                    source: source_err,
                })?;
                out.push(Pattern::Regex(regex));
            }
            PatternSpec::Compiled(regex) => out.push(Pattern::Regex(regex)),
            PatternSpec::List(specs) => {
                for spec in specs {
                    spec.compile_into(separator, out)?;
                }
            }
        }
        Ok(())
    }
}

impl From<&str> for PatternSpec {
    fn from(glob: &str) -> Self {
        PatternSpec::Glob(glob.to_string())
    }
}

impl From<String> for PatternSpec {
    fn from(glob: String) -> Self {
        PatternSpec::Glob(glob)
    }
}

impl From<Regex> for PatternSpec {
    fn from(regex: Regex) -> Self {
        PatternSpec::Compiled(regex)
    }
}

impl<T: Into<PatternSpec>> From<Vec<T>> for PatternSpec {
    fn from(items: Vec<T>) -> Self {
        PatternSpec::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<PatternSpec>, const N: usize> From<[T; N]> for PatternSpec {
    fn from(items: [T; N]) -> Self {
        PatternSpec::List(items.into_iter().map(Into::into).collect())
    }
}

/// Substrings captured by a successful match, numbered from 1
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captures {
    groups: Vec<String>,
}

impl Captures {
    pub fn new(groups: Vec<String>) -> Self {
        Self { groups }
    }

    /// Get capture `index` (1-based, like regex groups)
    pub fn get(&self, index: usize) -> Option<&str> {
        index
            .checked_sub(1)
            .and_then(|i| self.groups.get(i))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.groups
    }
}

impl Index<usize> for Captures {
    type Output = str;

    fn index(&self, index: usize) -> &str {
        self.get(index)
            .unwrap_or_else(|| panic!("no capture group {} (have {})", index, self.groups.len()))
    }
}

/// A compiled matcher over module names
#[derive(Debug, Clone)]
pub enum Pattern {
    /// A literal name; captures the whole name
    Exact(String),
    /// A glob compiled to an anchored expression
    Glob { source: String, regex: Regex },
    /// A caller-supplied expression, unanchored
    Regex(Regex),
}

impl Pattern {
    /// Match a module name, returning its captures on success
    pub fn match_name(&self, name: &str) -> Option<Captures> {
        match self {
            Pattern::Exact(literal) => {
                (literal == name).then(|| Captures::new(vec![name.to_string()]))
            }
            Pattern::Glob { regex, .. } | Pattern::Regex(regex) => {
                let caps = regex.captures(name)?;
                let groups = if caps.len() > 1 {
                    caps.iter()
                        .skip(1)
                        .map(|m| m.map_or_else(String::new, |m| m.as_str().to_string()))
                        .collect()
                } else {
                    vec![caps[0].to_string()]
                };
                Some(Captures::new(groups))
            }
        }
    }

    pub fn is_match(&self, name: &str) -> bool {
        match self {
            Pattern::Exact(literal) => literal == name,
            Pattern::Glob { regex, .. } | Pattern::Regex(regex) => regex.is_match(name),
        }
    }

    /// The pattern as the rule author wrote it
    pub fn source(&self) -> &str {
        match self {
            Pattern::Exact(literal) => literal,
            Pattern::Glob { source, .. } => source,
            Pattern::Regex(regex) => regex.as_str(),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Exact(literal) => write!(f, "{}", literal),
            Pattern::Glob { source, .. } => write!(f, "glob({})", source),
            Pattern::Regex(regex) => write!(f, "regex({})", regex.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum GlobToken {
    Literal(String),
    Separator,
    AnySegments,
    AnyWord,
    OneChar,
}

fn tokenize(glob: &str, separator: &str) -> Vec<GlobToken> {
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut rest = glob;

    while let Some(c) = rest.chars().next() {
        let (token, len) = if !separator.is_empty() && rest.starts_with(separator) {
            (Some(GlobToken::Separator), separator.len())
        } else if rest.starts_with("**") {
            (Some(GlobToken::AnySegments), 2)
        } else if c == '*' {
            (Some(GlobToken::AnyWord), 1)
        } else if c == '?' {
            (Some(GlobToken::OneChar), 1)
        } else {
            literal.push(c);
            (None, c.len_utf8())
        };

        if let Some(token) = token {
            if !literal.is_empty() {
                tokens.push(GlobToken::Literal(std::mem::take(&mut literal)));
            }
            tokens.push(token);
        }
        rest = &rest[len..];
    }

    if !literal.is_empty() {
        tokens.push(GlobToken::Literal(literal));
    }
    tokens
}

/// Compile a glob (or literal name) into a [`Pattern`].
///
/// Every glob is well formed, so this only fails when the expression it
/// expands to exceeds the regex engine's size limit.
pub fn compile_glob(glob: &str, separator: &str) -> Result<Pattern> {
    let tokens = tokenize(glob, separator);
    let has_wildcard = tokens
        .iter()
        .any(|t| matches!(t, GlobToken::AnySegments | GlobToken::AnyWord | GlobToken::OneChar));

    if !has_wildcard {
        trace!("Compiled literal pattern: {}", glob);
        return Ok(Pattern::Exact(glob.to_string()));
    }

    let sep = regex::escape(separator);
    let segments = if sep.is_empty() {
        r"(\w*)".to_string()
    } else {
        format!(r"((?:\w|{})*)", sep)
    };

    let mut expr = String::from("^");
    // Set when the separator before the current token was already emitted
    // as the optional tail of a collapsed `**`
    let mut absorbed_sep = false;
    let mut i = 0;
    while i < tokens.len() {
        let prev_is_sep = i > 0 && tokens[i - 1] == GlobToken::Separator;
        let next_is_sep = tokens.get(i + 1) == Some(&GlobToken::Separator);

        match &tokens[i] {
            GlobToken::AnySegments if next_is_sep && (prev_is_sep || i == 0) => {
                // `A::**::B` must also match `A::B`, so the middle chain and
                // one separator are optional together.
                if prev_is_sep && !absorbed_sep {
                    expr.push_str(&sep);
                }
                expr.push_str(&format!("(?:{}{})?", segments, sep));
                absorbed_sep = true;
                i += 2;
                continue;
            }
            GlobToken::Separator => {
                // `SEP ** SEP` is emitted as a unit when the `**` is reached
                let collapses = tokens.get(i + 1) == Some(&GlobToken::AnySegments)
                    && tokens.get(i + 2) == Some(&GlobToken::Separator);
                if !collapses {
                    expr.push_str(&sep);
                }
            }
            GlobToken::Literal(text) => expr.push_str(&regex::escape(text)),
            GlobToken::AnySegments => expr.push_str(&segments),
            GlobToken::AnyWord => expr.push_str(r"(\w*)"),
            GlobToken::OneChar => expr.push_str(r"(\w)"),
        }
        absorbed_sep = false;
        i += 1;
    }
    expr.push('$');

    trace!("Compiled glob {} to {}", glob, expr);

    let regex = Regex::new(&expr).map_err(|source| LoaderError::PatternCompile {
        pattern: glob.to_string(),
        source,
    })?;
    Ok(Pattern::Glob {
        source: glob.to_string(),
        regex,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn glob(pattern: &str) -> Pattern {
        compile_glob(pattern, "::").unwrap()
    }

    fn captures(pattern: &Pattern, name: &str) -> Vec<String> {
        pattern
            .match_name(name)
            .unwrap_or_else(|| panic!("{} should match {}", pattern, name))
            .as_slice()
            .to_vec()
    }

    #[test]
    fn test_literal_captures_whole_name() {
        let pattern = glob("App::Config");
        assert!(matches!(pattern, Pattern::Exact(_)));
        assert_eq!(captures(&pattern, "App::Config"), vec!["App::Config"]);
        assert!(pattern.match_name("App::Config::Extra").is_none());
        assert!(pattern.match_name("App").is_none());
    }

    #[test]
    fn test_single_star_stays_in_segment() {
        let pattern = glob("App::*");
        assert_eq!(captures(&pattern, "App::Foo"), vec!["Foo"]);
        assert!(!pattern.is_match("App::Foo::Bar"));
        assert!(!pattern.is_match("Other::Foo"));
    }

    #[test]
    fn test_double_star_spans_segments() {
        let pattern = glob("App::**::X");
        assert_eq!(captures(&pattern, "App::X"), vec![""]);
        assert_eq!(captures(&pattern, "App::A::X"), vec!["A"]);
        assert_eq!(captures(&pattern, "App::A::B::X"), vec!["A::B"]);
        assert!(!pattern.is_match("App::A::B::Y"));
    }

    #[test]
    fn test_trailing_double_star_requires_segment() {
        let pattern = glob("App::**");
        assert_eq!(captures(&pattern, "App::A::B"), vec!["A::B"]);
        assert!(!pattern.is_match("App"));
    }

    #[test]
    fn test_leading_double_star() {
        let pattern = glob("**::Schema");
        assert_eq!(captures(&pattern, "Schema"), vec![""]);
        assert_eq!(captures(&pattern, "App::Db::Schema"), vec!["App::Db"]);
    }

    #[test]
    fn test_question_mark_is_one_char() {
        let pattern = glob("Job?");
        assert_eq!(captures(&pattern, "Job7"), vec!["7"]);
        assert!(!pattern.is_match("Job"));
        assert!(!pattern.is_match("Job77"));
        assert!(!glob("A?B").is_match("A::B"));
    }

    #[test]
    fn test_capture_order_left_to_right() {
        let pattern = glob("App??::**::*");
        assert_eq!(
            captures(&pattern, "App38::A::Package::Name::Blah"),
            vec!["3", "8", "A::Package::Name", "Blah"]
        );
    }

    #[test]
    fn test_metacharacters_are_literal() {
        let pattern = glob("App.v1+(x)::*");
        assert_eq!(captures(&pattern, "App.v1+(x)::Foo"), vec!["Foo"]);
        assert!(!pattern.is_match("Appxv1+(x)::Foo"));
    }

    #[test]
    fn test_dot_separator() {
        let pattern = compile_glob("app.*", ".").unwrap();
        assert_eq!(captures(&pattern, "app.config"), vec!["config"]);
        assert!(!pattern.is_match("app.config.extra"));

        let deep = compile_glob("app.**.schema", ".").unwrap();
        assert_eq!(captures(&deep, "app.schema"), vec![""]);
        assert_eq!(captures(&deep, "app.db.v2.schema"), vec!["db.v2"]);
    }

    #[test]
    fn test_regex_used_verbatim() {
        let patterns = PatternSpec::regex(r"TestApp::(\w+)").compile("::").unwrap();
        let pattern = &patterns[0];
        assert_eq!(captures(pattern, "TestApp::Delta"), vec!["Delta"]);
        // Unanchored: the caller owns anchoring
        assert!(pattern.is_match("MyTestApp::Delta"));
        assert!(!pattern.is_match("Snoopy::Delta"));
    }

    #[test]
    fn test_regex_without_groups_captures_match() {
        let patterns = PatternSpec::regex(r"^Plugin::\w+$").compile("::").unwrap();
        assert_eq!(captures(&patterns[0], "Plugin::Zip"), vec!["Plugin::Zip"]);
    }

    #[test]
    fn test_regex_optional_group_is_empty() {
        let regex = Regex::new(r"^App(?:::(\w+))?$").unwrap();
        let patterns = PatternSpec::from(regex).compile("::").unwrap();
        assert_eq!(captures(&patterns[0], "App"), vec![""]);
    }

    #[test]
    fn test_invalid_regex_is_reported() {
        let err = PatternSpec::regex(r"App::(\w+").compile("::").unwrap_err();
        match err {
            LoaderError::PatternCompile { pattern, .. } => assert_eq!(pattern, r"App::(\w+"),
            other => panic!("Expected PatternCompile, got {:?}", other),
        }
    }

    #[test]
    fn test_oversized_glob_is_reported() {
        let huge = "?".repeat(3000);
        match compile_glob(&huge, "::") {
            Err(LoaderError::PatternCompile { pattern, .. }) => assert_eq!(pattern, huge),
            other => panic!("Expected PatternCompile, got {:?}", other.map(|p| p.to_string())),
        }
    }

    #[test]
    fn test_list_compiles_in_order() {
        let spec = PatternSpec::from(vec![
            PatternSpec::from("App"),
            PatternSpec::from(vec!["App::*", "Lib::**"]),
            PatternSpec::regex("^Z"),
        ]);
        let sources: Vec<String> = spec
            .compile("::")
            .unwrap()
            .iter()
            .map(|p| p.source().to_string())
            .collect();
        assert_eq!(sources, vec!["App", "App::*", "Lib::**", "^Z"]);
    }

    #[test]
    fn test_captures_indexing() {
        let caps = Captures::new(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(caps.get(0), None);
        assert_eq!(caps.get(1), Some("a"));
        assert_eq!(&caps[2], "b");
        assert_eq!(caps.get(3), None);
        assert_eq!(caps.iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    proptest! {
        #[test]
        fn prop_literal_matches_only_itself(
            name in "[A-Z][a-z0-9]{0,6}(::[A-Z][a-z0-9]{0,6}){0,3}",
            suffix in "[a-z]{1,3}",
        ) {
            let pattern = glob(&name);
            let caps = pattern.match_name(&name).unwrap();
            prop_assert_eq!(caps.as_slice(), &[name.clone()][..]);
            let longer = format!("{}{}", name, suffix);
            let nested = format!("{}::{}", name, suffix);
            prop_assert!(pattern.match_name(&longer).is_none());
            prop_assert!(pattern.match_name(&nested).is_none());
        }

        #[test]
        fn prop_star_never_crosses_separator(
            head in "[A-Z][a-z]{0,5}",
            segments in proptest::collection::vec("[A-Za-z0-9_]{1,6}", 1..4),
        ) {
            let pattern = glob(&format!("{}::*", head));
            let name = format!("{}::{}", head, segments.join("::"));
            prop_assert_eq!(pattern.is_match(&name), segments.len() == 1);
        }

        #[test]
        fn prop_question_marks_consume_one_char_each(
            count in 1usize..5,
            word in "[a-z0-9]{1,6}",
        ) {
            let pattern = glob(&format!("X{}", "?".repeat(count)));
            let name = format!("X{}", word);
            prop_assert_eq!(pattern.is_match(&name), word.len() == count);
        }
    }
}
