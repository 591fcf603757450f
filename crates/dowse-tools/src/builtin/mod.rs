pub mod func;
pub mod shell;
