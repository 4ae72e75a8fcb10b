//! Variable models: named sources of selectable options for dashboard and
//! analysis variables.
//!
//! A model is either a remote resource (listed or reduced to distinct
//! values) or a fixed enumeration. See [`resolve_variable_model`].

mod config;
mod managed;
mod resolve;

pub use config::{
    resource_api_path, VariableModelConfig, VariableModelQuery, VariableModelResponse,
    VariableOption,
};
pub use managed::{managed_variable_model, managed_variable_model_keys};
pub use resolve::{
    distinct_stat_params, has_more, resolve_variable_model, resource_list_params, VariableModel,
};
