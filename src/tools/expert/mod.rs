//! Expert tools module
//!
//! Computation tools available to the expert role.

mod calculator;
mod python;
mod units;

pub use calculator::{evaluate, Calculator};
pub use python::PythonTool;
pub use units::{convert, UnitConverter};
