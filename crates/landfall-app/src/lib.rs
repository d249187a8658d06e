//! Application layer for landfall stacks
//!
//! Installs a Helm chart into the declared cluster and composes the full
//! network → cluster → application stack.

pub mod chart;
pub mod compose;
pub mod deploy;

pub use chart::ChartSpec;
pub use compose::{compose_stack, network_output_name, zone_source, Composition, KUBECONFIG_OUTPUT};
pub use deploy::{
    ApplicationDeployer, ApplicationDeployment, ApplicationSpec, EndpointKind,
};
