pub mod errors;
pub mod forms;
pub mod openapi;
pub mod routes;
pub mod startup;

pub use routes::auth::{ServerAuthConfig, ServerState};
pub use startup::{run, run_until};
