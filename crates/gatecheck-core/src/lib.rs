#![forbid(unsafe_code)]

pub mod contract;
pub mod decode;
pub mod errors;
pub mod mode;
pub mod record;
pub mod result;
