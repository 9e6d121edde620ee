use thiserror::Error;

#[derive(Debug, Error)]
pub enum CounterError {
    #[error("perf_event_open failed for {event}: {source}")]
    Open {
        event: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("ioctl({request}) failed: {source}")]
    Ioctl {
        request: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("read of grouped counter buffer failed: {0}")]
    Read(std::io::Error),
}
