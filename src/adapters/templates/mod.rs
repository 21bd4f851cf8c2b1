//! Template source adapters.

mod yaml_loader;

pub use yaml_loader::{TemplateLoadError, YamlTemplateLoader};
