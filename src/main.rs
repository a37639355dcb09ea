use tryci::{cli::cli_parser::parse_cli, errors::TryciError};

fn main() -> Result<(), TryciError> {
    let runner = parse_cli()?;
    runner.run()
}
