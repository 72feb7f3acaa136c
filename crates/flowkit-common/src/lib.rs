pub mod diagnostics;
pub mod errors;
