// Load modules
mod location;
mod partial_type;
mod unknown_parameter;

// Expose functions to public
pub use location::Location;
pub use partial_type::PartialType;
pub use unknown_parameter::UnknownParameter;
