//! Console Reference - Reference Data and Variable Models
//!
//! Loads id -> label lookup maps for every reference type through the shared
//! query cache, and resolves variable models into selectable options. All
//! remote access goes through the [`ResourceClient`] seam.

pub mod catalog;
pub mod client;
pub mod factory;
pub mod join;
pub mod registry;
pub mod variable_model;

pub use catalog::{
    api_path, reference_source, reference_type_info, Endpoint, LabelStyle, ReferenceJoin,
    ReferenceSource,
};
pub use client::ResourceClient;
pub use factory::{
    LoadOptions, ReferenceFactory, ResourceReferenceFactory, StaticReferenceFactory,
};
pub use join::{with_project_group, with_role_info};
pub use registry::{is_probe_name, ReferenceRegistry};
pub use variable_model::{
    managed_variable_model, managed_variable_model_keys, resolve_variable_model,
    VariableModel, VariableModelConfig, VariableModelQuery, VariableModelResponse,
    VariableOption,
};

use console_core::{AppContext, ReferenceType};
use console_query::QueryClient;
use std::sync::Arc;

/// A registry with a [`ResourceReferenceFactory`] for every reference type.
pub fn resource_registry(
    ctx: AppContext,
    client: Arc<dyn ResourceClient>,
    query_client: QueryClient,
) -> ReferenceRegistry {
    let mut registry = ReferenceRegistry::new(ctx);
    for reference_type in ReferenceType::ALL {
        registry.register(Arc::new(ResourceReferenceFactory::new(
            reference_type,
            Arc::clone(&client),
            query_client.clone(),
        )));
    }
    registry
}
