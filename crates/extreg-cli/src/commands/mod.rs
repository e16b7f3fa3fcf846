//! Command implementations for extreg-cli

pub mod check;
pub mod deps;
pub mod load;
pub mod satisfies;

pub use check::run_check;
pub use deps::run_deps;
pub use load::run_load;
pub use satisfies::run_satisfies;
