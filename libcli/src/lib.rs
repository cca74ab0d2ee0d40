#[macro_use]
extern crate log;

pub mod classify;
pub mod delegate;
pub mod features;
pub mod labels;
pub mod model;
pub mod vision;

pub use qrun_quant as quant;
