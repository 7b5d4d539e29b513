//! Template substitution and argument defaults.

use athenaviz_core::{ResolveMode, TemplateResolver, TimeRangeSource};

use crate::error::QueryError;
use crate::forms::Param;
use crate::parser::ParsedQuery;

/// Arguments of a recognized form after substitution and defaulting.
///
/// Fields a form does not declare stay at their empty value; `to` is set
/// only for forms that send it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedArguments {
    pub region: String,
    /// `-1` means unbounded and is passed through as-is.
    pub limit: i64,
    pub pattern: String,
    pub work_group: String,
    pub to: String,
}

/// Resolve the raw tokens of `parsed`.
///
/// Region and workgroup are substituted verbatim; the pattern is
/// substituted in regex mode so multi-value variables become alternations.
/// The time range is read only when the form needs `to`.
pub fn normalize(
    parsed: &ParsedQuery,
    resolver: &dyn TemplateResolver,
    time: &dyn TimeRangeSource,
) -> Result<ResolvedArguments, QueryError> {
    let spec = parsed.spec();
    let raw = &parsed.args;
    let mut out = ResolvedArguments::default();

    if let Some(region) = &raw.region {
        out.region = resolver.resolve(region, ResolveMode::Plain);
    }

    if let Some(limit) = &raw.limit {
        let resolved = resolver.resolve(limit, ResolveMode::Plain);
        out.limit = resolved
            .trim()
            .parse()
            .map_err(|e: std::num::ParseIntError| QueryError::InvalidArgument {
                argument: "limit",
                value: resolved.clone(),
                reason: e.to_string(),
            })?;
    }

    if let Some(pattern) = &raw.pattern {
        out.pattern = resolver.resolve(pattern, ResolveMode::Regex);
    }

    if spec.sends(Param::WorkGroup) {
        out.work_group = match &raw.work_group {
            Some(clause) => {
                let token = clause.trim_start().trim_start_matches(',').trim();
                resolver.resolve(token, ResolveMode::Plain)
            }
            None => spec.default_work_group.to_string(),
        };
    }

    if spec.sends(Param::To) {
        out.to = time.time_range().to_iso();
    }

    Ok(out)
}
