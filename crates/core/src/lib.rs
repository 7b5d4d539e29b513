pub mod config;
pub mod duration;
pub mod error;
pub mod model;
pub mod resource;
pub mod template;

pub use config::Config;
pub use error::*;
pub use model::*;
pub use resource::{ParamValue, QueryBackend, ResourceClient, ResourceParams};
pub use template::{ResolveMode, TemplateResolver, TemplateVariable, VariableResolver};
