pub mod assemble;
pub mod check;
pub mod config_cmd;
pub mod input;
