//! The `utils` module collects the pieces shared across the relay: the
//! crate-wide error type and logging setup.

pub mod error;
pub mod logging;

#[cfg(test)]
mod tests {
    use super::error::RelayError;
    use super::logging;

    #[test]
    fn logging_init_accepts_levels() {
        // Should not panic
        logging::init("info");
        logging::init("debug");
        logging::init("warn");
        logging::init("nonsense");
    }

    #[test]
    fn bind_error_names_address() {
        let err = RelayError::Bind {
            addr: "127.0.0.1:1".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
        };
        assert!(err.to_string().contains("127.0.0.1:1"));
    }
}
