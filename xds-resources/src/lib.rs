//! Decoding and validation of [xDS](https://www.envoyproxy.io/docs/envoy/latest/api-docs/xds_protocol)
//! configuration resources.
//!
//! This crate turns serialized xDS resources into strongly-typed,
//! invariant-checked domain objects for a client's load-balancing and routing
//! layers. It handles:
//! - Per-resource decode and validation with exhaustive, field-path-scoped
//!   error reporting (one aggregated status per resource)
//! - The endpoint (EDS) resource model: priorities, localities, weighted
//!   endpoint addresses, and the drop-overload policy
//! - Fault-injection method configuration from service-config JSON
//!
//! It does NOT handle transport concerns:
//! - ADS stream management, subscriptions, and ACK/NACK
//! - Resource caching and versioning across updates
//!
//! A transport layer dispatches each incoming resource through the
//! [`ResourceTypeRegistry`] and forwards the resulting [`DecodeResult`] —
//! either a validated resource or a status suitable for a NACK's
//! `error_detail`.
//!
//! # Example
//!
//! ```
//! use xds_resources::{
//!     CertificateProviderResolver, DecodeContext, EndpointResourceType, ResourceType,
//!     ResourceTypeRegistry,
//! };
//!
//! struct NoProviders;
//!
//! impl CertificateProviderResolver for NoProviders {
//!     fn has_instance(&self, _name: &str) -> bool {
//!         false
//!     }
//! }
//!
//! let mut registry = ResourceTypeRegistry::new();
//! registry.register(EndpointResourceType);
//!
//! let decoder = registry.lookup(EndpointResourceType::TYPE_URL).unwrap();
//! let context = DecodeContext {
//!     client: "example-client",
//!     tracing_enabled: false,
//!     certificate_providers: &NoProviders,
//! };
//! let result = decoder.decode(&context, b"garbage".as_ref().into(), false);
//! assert!(result.resource.is_err());
//! ```

pub mod attributes;
pub mod common;
pub mod fault;
pub mod resource;
pub mod validation;

pub use attributes::Attributes;
pub use fault::{FaultInjectionMethodConfig, FaultInjectionPolicy};
pub use resource::endpoint::{
    DropCategory, DropConfig, EndpointResource, EndpointResourceType, Locality, LocalityName,
    Priority, ServerAddress, WeightAttribute,
};
pub use resource::registry::ResourceTypeRegistry;
pub use resource::{
    CertificateProviderResolver, DecodeContext, DecodeResult, DecodedResource, ResourceType,
};
pub use validation::{ScopedField, ValidationError, ValidationErrors};
