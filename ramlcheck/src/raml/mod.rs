//! RAML document model, loader and resource index.

pub use document::{
    BodySpec, Method, MethodNode, NamedParam, ParamType, RamlDocument, ResponseSpec,
};
pub use index::{IndexError, PathMethods, ResourceIndex};
pub use loader::{is_raml, parse, parse_file, parse_str, LoadError};
pub use path::{
    format_template, full_path, is_dynamic, parse_template, path_from_uri,
    resource_name_from_path, static_parent, template_params, value_to_segment, PathError,
    TemplateSegment,
};
pub use schema::named_param_schema;

mod document;
mod index;
mod loader;
mod path;
mod schema;
