pub mod config;
pub mod ddbj;
pub mod domain;
pub mod error;
pub mod expansion;
pub mod extract;
pub mod invert;
pub mod meta;
pub mod output;
pub mod pipeline;
pub mod runner;
pub mod snapshot;
pub mod store;
pub mod version;
