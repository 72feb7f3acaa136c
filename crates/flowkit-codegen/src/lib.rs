pub mod actionlet;
pub mod assembler;
pub mod compiler;
pub mod context;
pub mod control;
pub mod expr;
