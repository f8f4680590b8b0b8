// Domain layer: the order model and the collaborator ports. No I/O here.

pub mod model;
pub mod ports;
