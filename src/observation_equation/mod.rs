// Load modules
mod matrix_products;
mod observation_equation;

// Expose functions to public
pub use matrix_products::{at_a_p, compute_ata, compute_atv, operate};
pub use observation_equation::ObservationEquation;

#[cfg(test)]
pub(crate) use observation_equation::{random_equation, two_window_equation};
