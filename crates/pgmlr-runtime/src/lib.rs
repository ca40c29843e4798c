//! Runtime for driving the LR(1) parse tables built by `pgmlr`.

pub mod definition;
pub mod engine;
