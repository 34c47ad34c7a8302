mod admin;
mod lifecycle;
mod output;
mod resources;
pub mod ui;
mod watch;

pub use admin::{create_resource, delete_resource, install_resource, update_resource};
pub use lifecycle::{run_action, Action};
pub use output::OutputFormat;
pub use resources::{get_resource, list_resources, open_explorer, show_metrics};
pub use watch::{run_demo, watch_registry};
