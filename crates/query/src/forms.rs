//! The grammar and dispatch table of the recognized query forms.
//!
//! Each [`FormSpec`] row carries everything the pipeline needs to know
//! about a form: its function name and positional arguments (parser), its
//! workgroup default (normalizer), and its resource name and parameter
//! subset (dispatcher). Adding a form means adding a row.

use std::fmt;

/// The recognized variable-query forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryForm {
    Regions,
    WorkgroupNames,
    NamedQueryNames,
    NamedQueryQueries,
    QueryExecutionIds,
    QueryExecutionIdsByName,
}

/// A required positional argument of a form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arg {
    Region,
    Limit,
    /// Greedy: may contain commas and parentheses.
    Pattern,
}

/// A named parameter sent to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    Region,
    Limit,
    Pattern,
    WorkGroup,
    To,
}

impl Param {
    /// Key name expected by the backend service.
    pub fn wire_name(self) -> &'static str {
        match self {
            Param::Region => "region",
            Param::Limit => "limit",
            Param::Pattern => "pattern",
            Param::WorkGroup => "workGroup",
            Param::To => "to",
        }
    }
}

/// One row of the form table.
#[derive(Debug)]
pub struct FormSpec {
    pub form: QueryForm,
    /// Function name as written in the query string.
    pub function: &'static str,
    pub args: &'static [Arg],
    /// Whether a trailing `, <workgroup>` clause is accepted.
    pub optional_work_group: bool,
    /// Workgroup used when the optional clause is absent.
    pub default_work_group: &'static str,
    pub resource: &'static str,
    pub params: &'static [Param],
}

impl FormSpec {
    pub fn sends(&self, param: Param) -> bool {
        self.params.contains(&param)
    }
}

pub const DEFAULT_WORK_GROUP: &str = "primary";

/// All forms in matching priority order: most arguments first, so a
/// shorter form never swallows a longer one.
pub static FORMS: &[FormSpec] = &[
    FormSpec {
        form: QueryForm::QueryExecutionIdsByName,
        function: "query_execution_ids_by_name",
        args: &[Arg::Region, Arg::Limit, Arg::Pattern],
        optional_work_group: true,
        default_work_group: DEFAULT_WORK_GROUP,
        resource: "query_executions_by_name",
        params: &[Param::Region, Param::Limit, Param::Pattern, Param::WorkGroup, Param::To],
    },
    FormSpec {
        form: QueryForm::QueryExecutionIds,
        function: "query_execution_ids",
        args: &[Arg::Region, Arg::Limit, Arg::Pattern],
        optional_work_group: true,
        default_work_group: DEFAULT_WORK_GROUP,
        resource: "query_execution_ids",
        params: &[Param::Region, Param::Limit, Param::Pattern, Param::WorkGroup, Param::To],
    },
    FormSpec {
        form: QueryForm::NamedQueryQueries,
        function: "named_query_queries",
        args: &[Arg::Region, Arg::Pattern],
        optional_work_group: true,
        default_work_group: DEFAULT_WORK_GROUP,
        resource: "named_query_queries",
        params: &[Param::Region, Param::Pattern, Param::WorkGroup],
    },
    FormSpec {
        form: QueryForm::NamedQueryNames,
        function: "named_query_names",
        args: &[Arg::Region],
        optional_work_group: true,
        default_work_group: DEFAULT_WORK_GROUP,
        resource: "named_query_names",
        params: &[Param::Region, Param::WorkGroup],
    },
    FormSpec {
        form: QueryForm::WorkgroupNames,
        function: "workgroup_names",
        args: &[Arg::Region],
        optional_work_group: false,
        default_work_group: "",
        resource: "workgroup_names",
        params: &[Param::Region],
    },
    FormSpec {
        form: QueryForm::Regions,
        function: "regions",
        args: &[],
        optional_work_group: false,
        default_work_group: "",
        resource: "regions",
        params: &[],
    },
];

impl QueryForm {
    pub fn spec(self) -> &'static FormSpec {
        FORMS
            .iter()
            .find(|s| s.form == self)
            .unwrap_or_else(|| unreachable!("every form has a table row"))
    }

    pub fn function(self) -> &'static str {
        self.spec().function
    }

    pub fn resource(self) -> &'static str {
        self.spec().resource
    }
}

impl fmt::Display for QueryForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.function())
    }
}
