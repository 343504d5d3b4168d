#![forbid(unsafe_code)]

pub mod activation;
pub mod assertions;
pub mod driver;
pub mod generator;
pub mod golden;
pub mod report;
