pub mod cors;

pub use cors::get_cors_layer;
