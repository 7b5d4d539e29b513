//! Routes a recognized form to exactly one backend resource lookup.

use athenaviz_core::{ParamValue, ResourceClient, ResourceParams};
use tracing::debug;

use crate::error::QueryError;
use crate::forms::{Param, QueryForm};
use crate::normalize::ResolvedArguments;

/// A planned lookup: resource name plus the parameters the form sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    pub resource: &'static str,
    pub params: ResourceParams,
}

/// Build the lookup for `form`. Only the parameters listed in the form's
/// table row are included.
pub fn plan(form: QueryForm, args: &ResolvedArguments) -> Lookup {
    let spec = form.spec();
    let params = spec
        .params
        .iter()
        .map(|&param| {
            let value = match param {
                Param::Region => ParamValue::from(args.region.as_str()),
                Param::Limit => ParamValue::Int(args.limit),
                Param::Pattern => ParamValue::from(args.pattern.as_str()),
                Param::WorkGroup => ParamValue::from(args.work_group.as_str()),
                Param::To => ParamValue::from(args.to.as_str()),
            };
            (param.wire_name().to_string(), value)
        })
        .collect();
    Lookup {
        resource: spec.resource,
        params,
    }
}

/// Issue the single lookup for `form` and return the raw reply.
pub async fn dispatch(
    client: &dyn ResourceClient,
    form: QueryForm,
    args: &ResolvedArguments,
) -> Result<(Lookup, serde_json::Value), QueryError> {
    let lookup = plan(form, args);
    debug!(
        form = %form,
        resource = lookup.resource,
        params = ?lookup.params,
        "Dispatching resource lookup"
    );
    let reply = client.fetch(lookup.resource, &lookup.params).await?;
    Ok((lookup, reply))
}
