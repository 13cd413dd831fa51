#[cfg(test)]
mod tests {
    use quarry::{ErrorKind, error_kind};
    use quarry_memory::MemoryChannel;
    use quarry_tests::{init_logs, schema_def, silent_logs};
    use std::{sync::Arc, time::Duration};

    #[test]
    fn connect() {
        init_logs();
        let metadata = Arc::new(schema_def());
        let channel = MemoryChannel::connect("memory://?latency_ms=15", metadata.clone())
            .expect("Could not open the memory channel");
        assert_eq!(channel.latency(), Duration::from_millis(15));
        MemoryChannel::connect("memory://", metadata.clone())
            .expect("Could not open the memory channel");
        silent_logs! {
            assert!(
                MemoryChannel::connect("sqlite://test.db", metadata.clone()).is_err(),
                "Only memory urls are accepted"
            );
            let error = MemoryChannel::connect("memory://?mode=rwc", metadata.clone())
                .err()
                .expect("Unknown parameters are rejected");
            assert_eq!(error_kind(&error), Some(ErrorKind::Validation));
            assert!(
                MemoryChannel::connect("memory://?latency_ms=soon", metadata.clone()).is_err(),
                "The latency must be an integer"
            );
        }
    }
}
