//! Template variable substitution.
//!
//! The hosting platform normally owns the variables; [`TemplateResolver`] is
//! the seam the query engine consumes. [`VariableResolver`] is a map-backed
//! implementation used by the CLI and in tests.
//!
//! Recognized references: `$name`, `${name}`, `${name:fmt}` and `[[name]]`.
//! References to unknown variables are left untouched.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static VARIABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(\w+)|\$\{(\w+)(?::\w+)?\}|\[\[(\w+)(?::\w+)?\]\]")
        .expect("variable reference regex is valid")
});

/// How substituted values are spliced into the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    /// Values are inserted verbatim.
    Plain,
    /// Regex-significant characters in values are escaped so the value
    /// matches only itself inside a pattern.
    Regex,
}

/// Substitutes template variable references in a string.
pub trait TemplateResolver: Send + Sync {
    fn resolve(&self, text: &str, mode: ResolveMode) -> String;
}

/// The current value(s) of one dashboard variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateVariable {
    pub values: Vec<String>,
}

impl TemplateVariable {
    pub fn single(value: impl Into<String>) -> Self {
        Self {
            values: vec![value.into()],
        }
    }

    pub fn multi<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    fn render(&self, mode: ResolveMode) -> String {
        match (mode, self.values.as_slice()) {
            (_, []) => String::new(),
            (ResolveMode::Plain, [one]) => one.clone(),
            (ResolveMode::Regex, [one]) => regex::escape(one),
            (ResolveMode::Plain, many) => format!("{{{}}}", many.join(",")),
            (ResolveMode::Regex, many) => {
                let escaped: Vec<String> = many.iter().map(|v| regex::escape(v)).collect();
                format!("({})", escaped.join("|"))
            }
        }
    }
}

/// Map-backed [`TemplateResolver`].
#[derive(Debug, Clone, Default)]
pub struct VariableResolver {
    variables: HashMap<String, TemplateVariable>,
}

impl VariableResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, variable: TemplateVariable) -> Self {
        self.set(name, variable);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, variable: TemplateVariable) {
        self.variables.insert(name.into(), variable);
    }

    /// Parse a `name=value` assignment; `name=a,b` yields a multi-value
    /// variable.
    pub fn parse_assignment(assignment: &str) -> Option<(String, TemplateVariable)> {
        let (name, value) = assignment.split_once('=')?;
        let name = name.trim().trim_start_matches('$');
        if name.is_empty() {
            return None;
        }
        let values: Vec<&str> = value.split(',').map(str::trim).collect();
        let variable = if values.len() > 1 {
            TemplateVariable::multi(values)
        } else {
            TemplateVariable::single(value.trim())
        };
        Some((name.to_string(), variable))
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

impl TemplateResolver for VariableResolver {
    fn resolve(&self, text: &str, mode: ResolveMode) -> String {
        VARIABLE_RE
            .replace_all(text, |caps: &Captures<'_>| {
                let name = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .or_else(|| caps.get(3))
                    .map(|m| m.as_str())
                    .unwrap_or_default();
                match self.variables.get(name) {
                    Some(var) => var.render(mode),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> VariableResolver {
        VariableResolver::new()
            .with("region", TemplateVariable::single("us-east-1"))
            .with("table", TemplateVariable::single("events.prod*"))
            .with("envs", TemplateVariable::multi(["prod", "stage.eu"]))
    }

    #[test]
    fn all_reference_syntaxes_resolve() {
        let r = resolver();
        assert_eq!(r.resolve("$region", ResolveMode::Plain), "us-east-1");
        assert_eq!(r.resolve("${region}", ResolveMode::Plain), "us-east-1");
        assert_eq!(r.resolve("${region:raw}", ResolveMode::Plain), "us-east-1");
        assert_eq!(r.resolve("[[region]]", ResolveMode::Plain), "us-east-1");
        assert_eq!(r.resolve("at-$region-x", ResolveMode::Plain), "at-us-east-1-x");
    }

    #[test]
    fn unknown_variables_are_left_alone() {
        let r = resolver();
        assert_eq!(r.resolve("$nope and [[nada]]", ResolveMode::Plain), "$nope and [[nada]]");
        assert_eq!(r.resolve("no refs", ResolveMode::Regex), "no refs");
    }

    #[test]
    fn regex_mode_escapes_only_the_value() {
        let r = resolver();
        let pattern = r.resolve(".*$table.*", ResolveMode::Regex);
        assert_eq!(pattern, r".*events\.prod\*.*");

        let re = Regex::new(&format!("^{}$", r.resolve("$table", ResolveMode::Regex))).unwrap();
        assert!(re.is_match("events.prod*"));
        assert!(!re.is_match("eventsXprodd"));
        assert!(!re.is_match("events.production"));
    }

    #[test]
    fn multi_value_rendering() {
        let r = resolver();
        assert_eq!(r.resolve("$envs", ResolveMode::Plain), "{prod,stage.eu}");
        assert_eq!(r.resolve("$envs", ResolveMode::Regex), r"(prod|stage\.eu)");
    }

    #[test]
    fn parse_assignment_forms() {
        let (name, var) = VariableResolver::parse_assignment("region=us-west-2").unwrap();
        assert_eq!(name, "region");
        assert_eq!(var, TemplateVariable::single("us-west-2"));

        let (name, var) = VariableResolver::parse_assignment("$ids=a, b").unwrap();
        assert_eq!(name, "ids");
        assert_eq!(var, TemplateVariable::multi(["a", "b"]));

        assert!(VariableResolver::parse_assignment("novalue").is_none());
        assert!(VariableResolver::parse_assignment("=x").is_none());
    }
}
