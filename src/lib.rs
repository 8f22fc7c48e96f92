pub mod aggregates;
pub mod api;
mod app;
pub mod config;
pub mod error;
pub mod redact;
pub mod state;
pub mod store;
pub mod transport;
pub mod types;

pub use error::{ActionError, ActionResult};
pub use store::{Action, Effect, Fetch, Outcome, Store};

pub fn run() -> std::process::ExitCode {
  app::run()
}
