//! Template-query engine for the Athena data source.
//!
//! A variable query such as `query_execution_ids($region, 10, .*prod.*)` flows
//! through four stages:
//! - [`parser`] recognizes the query form and extracts raw argument tokens
//! - [`normalize`] substitutes template variables and applies defaults
//! - [`dispatch`] routes the form to exactly one backend resource lookup
//! - [`project`] turns the reply into a uniform suggestion list
//!
//! [`metric_find::MetricFindQuery`] wires the stages together. The panel query
//! path (request building and result reshaping) lives in [`panel`].

pub mod dispatch;
pub mod error;
pub mod forms;
pub mod http;
pub mod metric_find;
pub mod normalize;
pub mod panel;
pub mod parser;
pub mod project;
pub mod sequence;

pub use error::QueryError;
pub use forms::{FormSpec, Param, QueryForm};
pub use http::HttpResourceClient;
pub use metric_find::{DatasourceStatus, MetricFindQuery};
pub use normalize::ResolvedArguments;
pub use panel::{PanelData, PanelQuery, PanelReply, TargetError};
pub use parser::{parse, ParsedQuery, RawArguments};
pub use sequence::{RequestSequencer, RequestTicket, Settled};
