//! Integer helpers for 256-bit token amounts and 18-decimal fixed point
//! values.

pub mod u256_ext;
pub mod units;
