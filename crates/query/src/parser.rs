//! Recognizes variable-query forms and extracts their raw argument tokens.
//!
//! Grammars are compiled from the [`FORMS`] table and tried in table order.
//! The first match wins; no match means the query is not ours.

use std::sync::LazyLock;

use regex::Regex;

use crate::forms::{Arg, FormSpec, QueryForm, FORMS};

/// A workgroup token: an Athena workgroup name or a template variable
/// reference. Anything else after the last comma stays part of the pattern.
const WORK_GROUP_TOKEN: &str =
    r"[\w.\-]+|\$\w+|\$\{\w+(?::\w+)?\}|\[\[\w+(?::\w+)?\]\]";

static GRAMMARS: LazyLock<Vec<(&'static FormSpec, Regex)>> = LazyLock::new(|| {
    FORMS
        .iter()
        .map(|spec| {
            let re = Regex::new(&grammar(spec)).expect("form grammar is a valid regex");
            (spec, re)
        })
        .collect()
});

fn grammar(spec: &FormSpec) -> String {
    let args: Vec<&str> = spec
        .args
        .iter()
        .map(|arg| match arg {
            Arg::Region | Arg::Limit => r"([^,()]+?)",
            Arg::Pattern => r"(.+?)",
        })
        .collect();

    let mut re = format!(r"^{}\(\s*", regex::escape(spec.function));
    re.push_str(&args.join(r"\s*,\s*"));
    if spec.optional_work_group {
        re.push_str(&format!(r"(\s*,\s*(?:{WORK_GROUP_TOKEN}))?"));
    }
    re.push_str(r"\s*\)\s*$");
    re
}

/// Unresolved argument tokens of a matched form. Only the fields the form
/// declares are set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawArguments {
    pub region: Option<String>,
    pub limit: Option<String>,
    pub pattern: Option<String>,
    /// The trailing workgroup clause as written, leading comma included.
    pub work_group: Option<String>,
}

/// A recognized query form with its raw arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuery {
    pub form: QueryForm,
    pub args: RawArguments,
}

impl ParsedQuery {
    pub fn spec(&self) -> &'static FormSpec {
        self.form.spec()
    }
}

/// Match `query` against the known forms. Returns `None` for anything
/// unrecognized, including malformed calls of a known function.
pub fn parse(query: &str) -> Option<ParsedQuery> {
    let query = query.trim();
    GRAMMARS.iter().find_map(|(spec, re)| {
        let caps = re.captures(query)?;
        let mut args = RawArguments::default();
        for (i, arg) in spec.args.iter().enumerate() {
            let token = caps.get(i + 1).map(|m| m.as_str().trim().to_string());
            match arg {
                Arg::Region => args.region = token,
                Arg::Limit => args.limit = token,
                Arg::Pattern => args.pattern = token,
            }
        }
        if spec.optional_work_group {
            args.work_group = caps.get(spec.args.len() + 1).map(|m| m.as_str().to_string());
        }
        Some(ParsedQuery {
            form: spec.form,
            args,
        })
    })
}
