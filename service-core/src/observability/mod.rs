pub mod logging;
pub mod trace_context;

pub use logging::{init_cli_tracing, init_tracing};
pub use trace_context::{TracedClientExt, TracedRequest};
