//! The database context abstraction.

use crate::config::Settings;
use crate::driver::{Connector, TiberiusConnector};
use crate::mapping::entity::short_type_name;
use crate::mapping::ModelBuilder;

/// A unit of database access: a model of mapped entities plus the settings
/// and driver used to reach the server.
///
/// Only `settings` and `on_model_creating` are required. The model is
/// described once per context type and cached (see
/// [`MappingCache`](crate::mapping::MappingCache)), so `on_model_creating`
/// must describe the same model for every instance of a type.
pub trait DbContext: Send + Sync + 'static {
    /// Name used to look up the connection string. Defaults to the type name.
    fn name(&self) -> &str {
        short_type_name::<Self>()
    }

    /// Settings holding the connection strings.
    fn settings(&self) -> &Settings;

    /// Driver used to open connections.
    fn connector(&self) -> &dyn Connector {
        &TiberiusConnector
    }

    /// Register the table mapping of every entity this context can insert.
    fn on_model_creating(&self, model: &mut ModelBuilder);
}
