pub mod checker;
pub mod coverage;
pub mod unittest;

/// Database a unit-test run is executed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Sqlite,
    Postgresql,
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Sqlite => "sqlite",
            Backend::Postgresql => "postgresql",
        }
    }

    /// Backends left after applying the `--sqlite-only` / `--pgsql-only`
    /// flags. Passing both excludes both.
    pub fn selected(sqlite_only: bool, pgsql_only: bool) -> Vec<Backend> {
        let mut backends = vec![];
        if !pgsql_only {
            backends.push(Backend::Sqlite);
        }
        if !sqlite_only {
            backends.push(Backend::Postgresql);
        }
        backends
    }
}
