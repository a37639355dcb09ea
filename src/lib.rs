pub mod cli;
pub mod errors;
pub mod logging;
pub mod report;
pub mod runner;
pub mod runtime;
pub mod utils;
