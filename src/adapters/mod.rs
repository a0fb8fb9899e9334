// Adapters layer: concrete implementations for external systems (natpmpc, filesystem).

pub mod natpmpc;
pub mod port_file;
