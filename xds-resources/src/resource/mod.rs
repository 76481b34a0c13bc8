//! The decode contract shared by all xDS resource types.
//!
//! Every resource type implements [`ResourceType`]: given a serialized
//! payload and a [`DecodeContext`], produce a [`DecodeResult`] that is either
//! a fully-validated domain object or a status describing everything that is
//! wrong with the resource. The transport layer dispatches incoming resources
//! through a [`registry::ResourceTypeRegistry`] keyed by type URL.

pub mod endpoint;
pub mod registry;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tonic::Status;

/// Resolves certificate-provider instance names declared in the bootstrap
/// configuration.
///
/// Consumed by resource types that validate transport-security config; a
/// resource referencing an unknown instance fails validation.
pub trait CertificateProviderResolver: Send + Sync {
    /// Returns true if a certificate-provider instance with this name exists.
    fn has_instance(&self, instance_name: &str) -> bool;
}

/// Read-only context for one decode call.
///
/// The context is owned by the caller and never retained by a decoder. Any
/// transient wire objects produced while decoding are plain owned values
/// scoped to the call; the returned domain object holds copies of everything
/// it needs.
pub struct DecodeContext<'a> {
    /// Identity of the xDS client the resource was delivered to, used to
    /// attribute trace output.
    pub client: &'a str,
    /// Whether per-resource tracing is enabled at runtime.
    pub tracing_enabled: bool,
    /// Lookup capability for certificate-provider instances.
    pub certificate_providers: &'a dyn CertificateProviderResolver,
}

impl fmt::Debug for DecodeContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeContext")
            .field("client", &self.client)
            .field("tracing_enabled", &self.tracing_enabled)
            .finish_non_exhaustive()
    }
}

/// A validated resource, type-erased so one registry can dispatch the closed
/// set of resource types through a single interface.
#[derive(Debug, Clone)]
pub struct DecodedResource {
    resource: Arc<dyn Any + Send + Sync>,
}

impl DecodedResource {
    /// Wraps a validated domain object.
    pub fn new(resource: impl Any + Send + Sync) -> Self {
        Self {
            resource: Arc::new(resource),
        }
    }

    /// Recovers the concrete domain object.
    ///
    /// Returns `None` if the resource is of a different type than requested.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.resource.clone().downcast::<T>().ok()
    }
}

/// The outcome of decoding one serialized resource.
#[derive(Debug)]
pub struct DecodeResult {
    /// The resource name, populated as soon as it can be extracted from the
    /// payload — even when validation subsequently fails — so diagnostics can
    /// always be attributed to a resource. Empty only when the payload does
    /// not parse at all.
    pub name: Option<String>,
    /// The validated resource, or the status describing why decoding failed.
    pub resource: Result<DecodedResource, Status>,
}

/// A decoder for one xDS resource type.
///
/// Implementations are registered once at startup and shared read-only
/// afterwards; `decode` is synchronous, performs no I/O, and may run
/// concurrently for different payloads.
pub trait ResourceType: Send + Sync + 'static {
    /// The type URL under which resources of this type are delivered.
    fn type_url(&self) -> &'static str;

    /// The type URL used by the legacy (v2) transport protocol.
    fn v2_type_url(&self) -> &'static str;

    /// Whether a state-of-the-world response must contain every resource of
    /// this type for the subscription to be considered consistent. When true,
    /// a previously-seen resource missing from a response is treated as
    /// deleted.
    fn all_resources_required_in_sotw(&self) -> bool {
        false
    }

    /// Decodes and validates one serialized resource.
    ///
    /// A payload that does not parse against the expected schema yields an
    /// `InvalidArgument` status reading `Can't parse <Kind> resource.` and no
    /// name. A payload that parses but violates domain rules yields a single
    /// aggregated status listing every violation with its field path.
    fn decode(&self, context: &DecodeContext<'_>, serialized: Bytes, is_v2: bool) -> DecodeResult;
}
