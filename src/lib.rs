//! weft: a compile-time dependency-injection code generator.
//!
//! weft reads `.weft` declaration files, finds injector stubs (functions
//! whose body is a single `Build(...)` call), and generates for each one a
//! topologically ordered initialization function, or reports positioned
//! diagnostics explaining why it cannot.

pub mod analysis;
pub mod driver;
pub mod emit;
pub mod errors;
pub mod generate;
pub mod lexer;
pub mod manifest;
pub mod model;
pub mod parser;
pub mod sources;
