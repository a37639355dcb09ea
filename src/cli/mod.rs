pub mod cli_parser;
pub mod dependency_check;
pub mod settings;
