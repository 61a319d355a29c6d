//! Footprint SDK: model-agnostic CRUD and association engine over relational stores.

pub mod association;
pub mod case;
pub mod config;
pub mod criteria;
pub mod error;
pub mod handlers;
pub mod migration;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;
pub mod store;

pub use association::{AssociationResolver, ParentRef, RelationHandle};
pub use config::{load_from_path, load_from_str, resolve, FullConfig, ModelDescriptor, ModelRegistry};
pub use criteria::{Criteria, Direction, IdOrCriteria, QueryOptions, Record};
pub use error::{AppError, ConfigError};
pub use migration::apply_migrations;
pub use routes::{common_routes, footprint_routes};
pub use service::{FootprintService, Records};
pub use state::AppState;
pub use store::{connect_stores, MemoryStore, PgStore, Scope, Store, StoreRegistry};
