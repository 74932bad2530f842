//! Traceroute hop enrichment: geolocation, facility resolution, submarine
//! cable matching and same-site merging.

pub mod cables;
pub mod config;
pub mod geo;
pub mod location;
pub mod logging;
pub mod pipeline;
pub mod server;
pub mod traceroute;
