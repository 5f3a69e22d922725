// Load modules
mod conjugate_gradient;
mod constrained_conjugate_gradient;
mod fast_conjugate_gradient;
mod inverse_method;
mod inverse_solver_traits;
mod nonlinear_conjugate_gradient;

// Expose functions to public
pub use conjugate_gradient::ConjugateGradient;
pub use constrained_conjugate_gradient::{ConstrainedConjugateGradient, projector_rectangle};
pub use fast_conjugate_gradient::FastConjugateGradient;
pub use inverse_method::InverseMethod;
pub use inverse_solver_traits::{InverseSolverTraits, SolveResult};
pub use nonlinear_conjugate_gradient::NonlinearConjugateGradient;
