pub mod actionlet;
pub mod program;
