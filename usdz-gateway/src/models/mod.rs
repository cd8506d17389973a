pub mod artifact;

pub use artifact::{converted_object_path, is_bare_file_name, ModelArtifact};
