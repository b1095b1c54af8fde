//! Path safety for manifest-controlled inputs.

pub mod path_policy;

pub use path_policy::{
    PathPolicyViolation, clean_subpath, resolve_local_path, validate_path_component,
};
