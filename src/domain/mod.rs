// Domain layer: mapping models and the two seams (gateway, port store).

pub mod model;
pub mod ports;
