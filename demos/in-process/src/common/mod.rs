pub mod calculator;
pub mod stub;
pub mod wire;
