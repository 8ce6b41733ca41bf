//! # Stretch cluster networking
//!
//! Members of a stretch cluster run in different Kubernetes clusters and
//! reach each other through routable `address:port` pairs instead of
//! cluster-internal DNS. This module resolves those endpoints.
//!
//! ## How an endpoint is built
//!
//! 1. **Stable address**: at startup one worker node address is picked per
//!    cluster and cached for the process lifetime ([`StableAddressCache`]).
//! 2. **Exposure object**: every pod gets its own NodePort-style object
//!    (`<pod>-exposure`) selecting only that pod ([`ExposureManager`]).
//! 3. **Endpoint**: stable address + the external port the control plane
//!    assigned on the exposure object ([`EndpointResolver`]).
//! 4. **Configuration strings**: advertised listeners and quorum voters
//!    ([`ListenerAggregator`]).
//!
//! ```text
//! ┌───────────────────────────── StretchEngine ─────────────────────────────┐
//! │                                                                          │
//! │  ListenerAggregator ──► EndpointResolver ──► StableAddressCache          │
//! │                               │                     │                    │
//! │  ExposureManager ─────────────┼─────────────────────┤                    │
//! └───────────────────────────────┼─────────────────────┼────────────────────┘
//!                                 ▼                     ▼
//!                     ┌──────────────────────────────────────────┐
//!                     │  GatewayRegistry: central, east, west... │
//!                     └──────────────────────────────────────────┘
//! ```
//!
//! ## Known gaps
//!
//! - The cached address is never re-evaluated. If its node disappears,
//!   endpoints stay wrong until restart. Replace [`FirstWorkerNode`] with a
//!   pool/failover [`AddressSelector`] to change that.
//! - A cluster without a cached address borrows the local cluster's address.
//!   The resulting [`Endpoint`] has `fallback` set.

pub mod aggregator;
pub mod cache;
pub mod engine;
pub mod exposure;
pub mod gateway;
pub mod memory;
pub mod resolver;
pub mod resources;
pub mod selector;

pub use aggregator::{render_listeners, render_voters, AggregateError, ListenerAggregator};
pub use cache::{AddressCacheError, StableAddressCache};
pub use engine::StretchEngine;
pub use exposure::{build_exposure, ExposureError, ExposureManager};
pub use gateway::{ClusterGateway, GatewayError, GatewayRegistry, SharedGateway};
pub use memory::InMemoryGateway;
pub use resolver::{EndpointResolver, ResolveError};
pub use resources::*;
pub use selector::{AddressSelector, FirstWorkerNode, SelectedAddress};

/// Reserved id of the local (central) cluster
pub const LOCAL_CLUSTER_ID: &str = "central";

/// Name of the exposure strategy implemented here
pub const PROVIDER_NAME: &str = "nodeport";
