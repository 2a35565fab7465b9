// Domain layer: lock state model and the ports the link, dispatcher and hook plug into.

pub mod model;
pub mod ports;
