//! The endpoint (EDS / `ClusterLoadAssignment`) resource type.
//!
//! Decodes a cluster's load assignment into the priority/locality/endpoint
//! model consumed by the load-balancing policies, plus the drop config used
//! for load shedding.

use std::collections::BTreeMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use bytes::Bytes;
use envoy_types::pb::envoy::config::core::v3::{HealthStatus, address, socket_address};
use envoy_types::pb::envoy::config::endpoint::v3::{
    ClusterLoadAssignment, LbEndpoint, LocalityLbEndpoints,
    cluster_load_assignment::policy::DropOverload, lb_endpoint::HostIdentifier,
};
use prost::Message;
use tonic::Status;

use crate::attributes::Attributes;
use crate::common::fraction_to_parts_per_million;
use crate::resource::{DecodeContext, DecodeResult, DecodedResource, ResourceType};
use crate::validation::ValidationErrors;

/// Identity of a locality: the (region, zone, sub_zone) triple.
///
/// Shared as `Arc<LocalityName>`; equality, ordering, and hashing are by
/// value, so the same locality delivered across resource updates compares
/// equal regardless of which allocation holds it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocalityName {
    region: String,
    zone: String,
    sub_zone: String,
}

impl LocalityName {
    /// Creates a locality name from its identity triple.
    pub fn new(
        region: impl Into<String>,
        zone: impl Into<String>,
        sub_zone: impl Into<String>,
    ) -> Self {
        Self {
            region: region.into(),
            zone: zone.into(),
            sub_zone: sub_zone.into(),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn zone(&self) -> &str {
        &self.zone
    }

    pub fn sub_zone(&self) -> &str {
        &self.sub_zone
    }
}

impl fmt::Display for LocalityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{region=\"{}\", zone=\"{}\", sub_zone=\"{}\"}}",
            self.region, self.zone, self.sub_zone
        )
    }
}

/// Endpoint weight attached to a [`ServerAddress`], consumed by weighted
/// endpoint selection in the load-balancing policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightAttribute(pub u32);

/// A resolved endpoint address plus its typed attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    address: SocketAddr,
    attributes: Attributes,
}

impl ServerAddress {
    pub fn new(address: SocketAddr, attributes: Attributes) -> Self {
        Self {
            address,
            attributes,
        }
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// The endpoint's load-balancing weight; defaults to 1 when no weight
    /// attribute is present.
    pub fn weight(&self) -> u32 {
        self.attributes
            .get::<WeightAttribute>()
            .map_or(1, |weight| weight.0)
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} weight={}", self.address, self.weight())
    }
}

/// A weighted group of endpoints sharing one locality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locality {
    pub name: Arc<LocalityName>,
    pub lb_weight: u32,
    pub endpoints: Vec<ServerAddress>,
}

impl fmt::Display for Locality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{name={}, lb_weight={}, endpoints=[", self.name, self.lb_weight)?;
        for (i, endpoint) in self.endpoints.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{endpoint}")?;
        }
        write!(f, "]}}")
    }
}

/// One priority tier: the localities assigned to it, keyed by name.
///
/// The map is ordered by locality name so iteration is deterministic;
/// equality compares corresponding entries pairwise.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Priority {
    pub localities: BTreeMap<Arc<LocalityName>, Locality>,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, locality) in self.localities.values().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{locality}")?;
        }
        write!(f, "]")
    }
}

/// One load-shedding category: drop `parts_per_million` of requests under
/// this name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropCategory {
    pub name: String,
    pub parts_per_million: u32,
}

/// The drop policy for a cluster's load assignment.
///
/// Immutable once decoding completes; shared by reference count between the
/// resource and any load-balancing policy that must survive resource updates
/// independently.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DropConfig {
    categories: Vec<DropCategory>,
    drop_all: bool,
}

impl DropConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a category. Zero-valued categories are retained; they are
    /// valid, just inert.
    pub fn add_category(&mut self, name: String, parts_per_million: u32) {
        if parts_per_million == 1_000_000 {
            self.drop_all = true;
        }
        self.categories.push(DropCategory {
            name,
            parts_per_million,
        });
    }

    /// The categories in configuration order.
    pub fn categories(&self) -> &[DropCategory] {
        &self.categories
    }

    /// True if some category drops every request.
    pub fn drop_all(&self) -> bool {
        self.drop_all
    }

    /// Decides whether one request should be dropped, returning the name of
    /// the responsible category.
    ///
    /// Draws a single uniform integer in `[0, 1_000_000)` and returns the
    /// first category whose parts-per-million exceeds it. Categories are
    /// checked in configuration order, so overlapping ranges favor earlier
    /// categories.
    pub fn should_drop(&self) -> Option<&str> {
        let draw = fastrand::u32(..1_000_000);
        self.categories
            .iter()
            .find(|category| category.parts_per_million > draw)
            .map(|category| category.name.as_str())
    }
}

impl fmt::Display for DropConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{[")?;
        for (i, category) in self.categories.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", category.name, category.parts_per_million)?;
        }
        write!(f, "], drop_all={}}}", self.drop_all)
    }
}

/// The decoded endpoint resource: priorities indexed by tier number, plus the
/// drop config.
#[derive(Debug, Clone)]
pub struct EndpointResource {
    /// Priority tiers in ascending order. Indices the resource does not
    /// mention still occupy a slot (the sequence is resized, never
    /// compacted); an empty slot is a validation error, so a successfully
    /// decoded resource has at least one locality in every tier.
    pub priorities: Vec<Priority>,
    pub drop_config: Arc<DropConfig>,
}

impl PartialEq for EndpointResource {
    fn eq(&self, other: &Self) -> bool {
        self.priorities == other.priorities && *self.drop_config == *other.drop_config
    }
}

impl fmt::Display for EndpointResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "priorities=[")?;
        for (i, priority) in self.priorities.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "priority {i}: {priority}")?;
        }
        write!(f, "], drop_config={}", self.drop_config)
    }
}

fn maybe_log_cluster_load_assignment(
    context: &DecodeContext<'_>,
    cluster_load_assignment: &ClusterLoadAssignment,
) {
    if context.tracing_enabled {
        tracing::debug!(
            "[xds_client {}] ClusterLoadAssignment: {:?}",
            context.client,
            cluster_load_assignment
        );
    }
}

fn parse_server_address(
    lb_endpoint: &LbEndpoint,
    errors: &mut ValidationErrors,
) -> Option<ServerAddress> {
    // health_status
    // If not HEALTHY or UNKNOWN, skip this endpoint.
    if lb_endpoint.health_status != HealthStatus::Unknown as i32
        && lb_endpoint.health_status != HealthStatus::Healthy as i32
    {
        return None;
    }
    // load_balancing_weight
    let mut weight = 1;
    {
        let mut errors = errors.scoped(".load_balancing_weight");
        if let Some(load_balancing_weight) = &lb_endpoint.load_balancing_weight {
            weight = load_balancing_weight.value;
            if weight == 0 {
                errors.add_error("must be greater than 0");
            }
        }
    }
    // endpoint
    let mut errors = errors.scoped(".endpoint");
    let Some(HostIdentifier::Endpoint(endpoint)) = &lb_endpoint.host_identifier else {
        errors.add_error("field not present");
        return None;
    };
    let mut errors = errors.scoped(".address");
    let Some(endpoint_address) = &endpoint.address else {
        errors.add_error("field not present");
        return None;
    };
    let mut errors = errors.scoped(".socket_address");
    let Some(address::Address::SocketAddress(socket_address)) = &endpoint_address.address else {
        errors.add_error("field not present");
        return None;
    };
    let port = {
        let mut errors = errors.scoped(".port_value");
        let port = match socket_address.port_specifier {
            Some(socket_address::PortSpecifier::PortValue(port)) => port,
            _ => 0,
        };
        if port > u32::from(u16::MAX) {
            errors.add_error("invalid port");
            return None;
        }
        port as u16
    };
    let ip: IpAddr = match socket_address.address.parse() {
        Ok(ip) => ip,
        Err(_) => {
            errors.add_error(format!(
                "Failed to parse address \"{}\"",
                socket_address.address
            ));
            return None;
        }
    };
    let attributes = Attributes::new().add(WeightAttribute(weight));
    Some(ServerAddress::new(SocketAddr::new(ip, port), attributes))
}

struct ParsedLocality {
    priority: usize,
    locality: Locality,
}

fn parse_locality(
    locality_lb_endpoints: &LocalityLbEndpoints,
    errors: &mut ValidationErrors,
) -> Option<ParsedLocality> {
    let original_error_size = errors.size();
    // load_balancing_weight
    // An absent or zero LB weight means this locality is assigned no load;
    // it is dropped from the result without an error.
    let lb_weight = locality_lb_endpoints
        .load_balancing_weight
        .as_ref()
        .map_or(0, |weight| weight.value);
    if lb_weight == 0 {
        return None;
    }
    // locality
    let Some(locality) = &locality_lb_endpoints.locality else {
        let mut errors = errors.scoped(".locality");
        errors.add_error("field not present");
        return None;
    };
    let name = Arc::new(LocalityName::new(
        locality.region.clone(),
        locality.zone.clone(),
        locality.sub_zone.clone(),
    ));
    // lb_endpoints
    let mut endpoints = Vec::new();
    for (i, lb_endpoint) in locality_lb_endpoints.lb_endpoints.iter().enumerate() {
        let mut errors = errors.scoped(format!(".lb_endpoints[{i}]"));
        if let Some(address) = parse_server_address(lb_endpoint, &mut errors) {
            endpoints.push(address);
        }
    }
    // priority
    let priority = locality_lb_endpoints.priority as usize;
    if errors.size() != original_error_size {
        return None;
    }
    Some(ParsedLocality {
        priority,
        locality: Locality {
            name,
            lb_weight,
            endpoints,
        },
    })
}

fn parse_drop_overload(
    drop_overload: &DropOverload,
    drop_config: &mut DropConfig,
    errors: &mut ValidationErrors,
) {
    // category
    let category = drop_overload.category.clone();
    if category.is_empty() {
        let mut errors = errors.scoped(".category");
        errors.add_error("empty drop category name");
    }
    // drop_percentage
    let parts_per_million = {
        let mut errors = errors.scoped(".drop_percentage");
        let Some(drop_percentage) = &drop_overload.drop_percentage else {
            errors.add_error("field not present");
            return;
        };
        fraction_to_parts_per_million(drop_percentage, &mut errors)
    };
    drop_config.add_category(category, parts_per_million);
}

fn parse_eds_resource(
    cluster_load_assignment: &ClusterLoadAssignment,
) -> Result<EndpointResource, Status> {
    let mut errors = ValidationErrors::new();
    let mut priorities: Vec<Priority> = Vec::new();
    // endpoints
    {
        let mut errors = errors.scoped("endpoints");
        for (i, locality_lb_endpoints) in cluster_load_assignment.endpoints.iter().enumerate() {
            let mut errors = errors.scoped(format!("[{i}]"));
            let Some(parsed) = parse_locality(locality_lb_endpoints, &mut errors) else {
                continue;
            };
            // Localities are not required to arrive in priority order; grow
            // the tier list as needed.
            if priorities.len() < parsed.priority + 1 {
                priorities.resize_with(parsed.priority + 1, Priority::default);
            }
            let localities = &mut priorities[parsed.priority].localities;
            if localities.contains_key(&parsed.locality.name) {
                errors.add_error(format!(
                    "duplicate locality {} found in priority {}",
                    parsed.locality.name, parsed.priority
                ));
            } else {
                localities.insert(parsed.locality.name.clone(), parsed.locality);
            }
        }
        for (i, priority) in priorities.iter().enumerate() {
            if priority.localities.is_empty() {
                errors.add_error(format!("priority {i} empty"));
            }
        }
    }
    // policy
    let mut drop_config = DropConfig::new();
    if let Some(policy) = &cluster_load_assignment.policy {
        let mut errors = errors.scoped("policy");
        for (i, drop_overload) in policy.drop_overloads.iter().enumerate() {
            let mut errors = errors.scoped(format!(".drop_overloads[{i}]"));
            parse_drop_overload(drop_overload, &mut drop_config, &mut errors);
        }
    }
    if !errors.ok() {
        return Err(errors.status("errors validating ClusterLoadAssignment resource"));
    }
    Ok(EndpointResource {
        priorities,
        drop_config: Arc::new(drop_config),
    })
}

/// The EDS resource type.
#[derive(Debug, Clone, Copy, Default)]
pub struct EndpointResourceType;

impl EndpointResourceType {
    pub const TYPE_URL: &'static str =
        "type.googleapis.com/envoy.config.endpoint.v3.ClusterLoadAssignment";
    pub const V2_TYPE_URL: &'static str =
        "type.googleapis.com/envoy.api.v2.ClusterLoadAssignment";
}

impl ResourceType for EndpointResourceType {
    fn type_url(&self) -> &'static str {
        Self::TYPE_URL
    }

    fn v2_type_url(&self) -> &'static str {
        Self::V2_TYPE_URL
    }

    fn decode(
        &self,
        context: &DecodeContext<'_>,
        serialized: Bytes,
        _is_v2: bool,
    ) -> DecodeResult {
        let Ok(cluster_load_assignment) = ClusterLoadAssignment::decode(serialized) else {
            return DecodeResult {
                name: None,
                resource: Err(Status::invalid_argument(
                    "Can't parse ClusterLoadAssignment resource.",
                )),
            };
        };
        maybe_log_cluster_load_assignment(context, &cluster_load_assignment);
        let name = cluster_load_assignment.cluster_name.clone();
        match parse_eds_resource(&cluster_load_assignment) {
            Ok(resource) => {
                if context.tracing_enabled {
                    tracing::info!(
                        "[xds_client {}] parsed ClusterLoadAssignment {name}: {resource}",
                        context.client
                    );
                }
                DecodeResult {
                    name: Some(name),
                    resource: Ok(DecodedResource::new(resource)),
                }
            }
            Err(status) => {
                if context.tracing_enabled {
                    tracing::error!(
                        "[xds_client {}] invalid ClusterLoadAssignment {name}: {}",
                        context.client,
                        status.message()
                    );
                }
                DecodeResult {
                    name: Some(name),
                    resource: Err(status),
                }
            }
        }
    }
}
