// Domain layer: report models and ports. Adapters implement the ports against real systems.

pub mod model;
pub mod ports;
