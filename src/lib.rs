pub mod agent;
pub mod clock;
pub mod config;
pub mod http_client;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod pred_store;
pub mod scoring;
pub mod service;
pub mod source;
pub mod ttl_cache;
