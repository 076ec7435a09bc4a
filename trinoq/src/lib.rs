pub mod app;
pub mod cli;
pub mod eval;
pub mod query;
pub mod settings;

pub use app::{run, RemoteEngine, Request};
pub use cli::Cli;
pub use eval::{EvalError, Program, Value};
pub use settings::Settings;
