pub mod chaos;
pub mod config;
pub mod errors;
pub mod external;
pub mod loadgen;
pub mod logging;
pub mod pipeline;
pub mod query;
pub mod recommendation;
pub mod search;
pub mod server;
pub mod store;
pub mod telemetry;
