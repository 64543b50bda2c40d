pub mod assignment;
pub mod coverage;
pub mod enumeration;
pub mod graph;
pub mod network_operator;
pub mod placement;
pub mod request;
pub mod routing;
pub mod simulation;
pub mod utils;
