#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

pub mod config;
pub mod config_request;
pub mod error;
pub mod imports;
pub mod invalidations;
pub mod lookup;
pub mod monitoring;
pub mod probe;
pub mod resolver;
pub mod version;

pub use config::{Config, LoadedProjectConfig, ProjectConfig, CONFIG_FILE_NAME};
pub use config_request::{
    codes as config_codes, CachePolicy, ConfigLookup, ConfigRequest, ConfigRequestError,
    ConfigRequestRunner, ConfigResult,
};
pub use error::Error;
pub use imports::{scan_imports, ImportKind, ImportSpec};
pub use invalidations::{
    Affected, CreateInvalidation, InvalidationEvent, InvalidationLedger, Invalidations,
};
pub use lookup::{find_ancestor_file, find_first_file, find_node_module, find_project_root};
pub use monitoring::{close_monitoring, initialize_monitoring, MonitoringReport};
pub use probe::Probe;
pub use resolver::{
    codes as resolve_codes, ExportsConditions, ModuleType, Resolution, ResolveError,
    ResolveRequest, ResolveResult, Resolver, ResolverConfig, SpecifierKind,
};
pub use version::{VersionInfo, SCHEMA_VERSION, VERSION};
