pub use log::LevelFilter::*;

/// Route `log` output to stderr as `(LEVEL) target: message`.
///
/// Only the first call installs a logger; later calls report an error.
pub fn setup_logging(verbosity: log::LevelFilter) -> Result<(), String> {
    fern::Dispatch::new()
        .level(verbosity)
        .format(|out, message, record| out.finish(format_args!("({}) {}: {}", record.level(), record.target(), message)))
        .chain(std::io::stderr())
        .apply()
        .map_err(|err| format!("Failed to set up logging: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_setup_is_an_error() {
        assert!(setup_logging(Debug).is_ok());
        assert!(setup_logging(Info).is_err());
    }
}
