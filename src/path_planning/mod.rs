// Path Planning algorithms module

pub mod rrdt;

pub use rrdt::*;
