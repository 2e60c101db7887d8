use std::error::Error as _;
use std::io;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(30);
const WRITE_TIMEOUT: Duration = Duration::from_secs(30);

/// Retry settings for transport failures with exponential backoff.
#[derive(Clone, Copy, Debug)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first try.
    pub max_attempts: usize,
    /// Base delay used for the exponential backoff.
    pub base_delay: Duration,
    /// Maximum delay allowed between attempts.
    pub max_delay: Duration,
}

impl RetryConfig {
    pub fn with_attempts(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(4),
        }
    }
}

/// Build an agent with the default connect/read/write timeouts.
pub fn agent() -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(CONNECT_TIMEOUT)
        .timeout_read(READ_TIMEOUT)
        .timeout_write(WRITE_TIMEOUT)
        .build()
}

/// Build an agent whose whole request must finish within `timeout`.
pub fn agent_with_timeout(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(timeout.min(CONNECT_TIMEOUT))
        .timeout(timeout)
        .build()
}

/// Retry an operation with bounded exponential backoff when the predicate allows it.
pub fn retry_with_backoff<T, E, F, R>(
    config: RetryConfig,
    mut action: F,
    mut should_retry: R,
) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    R: FnMut(&E) -> bool,
{
    let mut attempt = 0usize;
    loop {
        attempt += 1;
        match action() {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= config.max_attempts || !should_retry(&err) {
                    return Err(err);
                }
                let delay = backoff_delay(config.base_delay, config.max_delay, attempt);
                tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying request");
                std::thread::sleep(delay);
            }
        }
    }
}

/// Status responses are answers, not outages; only transport failures are retried.
pub fn is_transport_error(err: &ureq::Error) -> bool {
    matches!(err, ureq::Error::Transport(_))
}

/// The deadline ran out; a refused or unresolved host is not a timeout.
pub fn is_timeout(err: &ureq::Error) -> bool {
    let ureq::Error::Transport(transport) = err else {
        return false;
    };
    let mut source = transport.source();
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            if matches!(io_err.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) {
                return true;
            }
        }
        source = cause.source();
    }
    false
}

fn backoff_delay(base: Duration, max: Duration, attempt: usize) -> Duration {
    let exponent = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
    let factor = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);
    let delay = base.checked_mul(factor).unwrap_or(max);
    if delay > max { max } else { delay }
}

#[cfg(test)]
pub(crate) mod test_server {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    pub(crate) fn http_response(status: u16, body: &str) -> String {
        format!(
            "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\n\
             Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    /// Serve each response to one connection, in order, and report the request lines seen.
    pub(crate) fn serve_responses(responses: Vec<String>) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for response in responses {
                let Ok((mut stream, _)) = listener.accept() else {
                    return;
                };
                let head = read_request(&mut stream);
                let request_line = head.lines().next().unwrap_or_default().to_string();
                let _ = tx.send(request_line);
                let _ = stream.write_all(response.as_bytes());
            }
        });
        (format!("http://{addr}"), rx)
    }

    /// Accept one connection and hold it open without ever answering.
    pub(crate) fn serve_silence(hold: Duration) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let Ok((_stream, _)) = listener.accept() else {
                return;
            };
            thread::sleep(hold);
        });
        format!("http://{addr}")
    }

    fn read_request(stream: &mut impl Read) -> String {
        let mut data = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let Ok(read) = stream.read(&mut buf) else {
                break;
            };
            if read == 0 {
                break;
            }
            data.extend_from_slice(&buf[..read]);
            let text = String::from_utf8_lossy(&data).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let body_len = text[..end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if data.len() >= end + 4 + body_len {
                    return text[..end].to_string();
                }
            }
        }
        String::from_utf8_lossy(&data).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_with_backoff_stops_after_success() {
        let mut attempts = 0usize;
        let config = RetryConfig {
            max_attempts: 4,
            base_delay: Duration::from_millis(0),
            max_delay: Duration::from_millis(0),
        };
        let result: Result<u32, &'static str> = retry_with_backoff(
            config,
            || {
                attempts += 1;
                if attempts < 3 { Err("fail") } else { Ok(7) }
            },
            |_| true,
        );
        assert_eq!(result, Ok(7));
        assert_eq!(attempts, 3);
    }

    #[test]
    fn retry_with_backoff_honors_should_retry() {
        let mut attempts = 0usize;
        let config = RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(0),
            max_delay: Duration::from_millis(0),
        };
        let result: Result<u32, &'static str> = retry_with_backoff(
            config,
            || {
                attempts += 1;
                Err("fail")
            },
            |_| false,
        );
        assert_eq!(result, Err("fail"));
        assert_eq!(attempts, 1);
    }

    #[test]
    fn backoff_delay_is_capped() {
        let base = Duration::from_millis(100);
        let max = Duration::from_millis(300);
        assert_eq!(backoff_delay(base, max, 1), Duration::from_millis(100));
        assert_eq!(backoff_delay(base, max, 2), Duration::from_millis(200));
        assert_eq!(backoff_delay(base, max, 3), max);
        assert_eq!(backoff_delay(base, max, 40), max);
    }

    #[test]
    fn with_attempts_never_drops_below_one() {
        assert_eq!(RetryConfig::with_attempts(0).max_attempts, 1);
    }

    #[test]
    fn status_errors_are_not_transport_errors() {
        let (base, _requests) =
            test_server::serve_responses(vec![test_server::http_response(404, "{}")]);
        let err = agent().get(&base).call().unwrap_err();
        assert!(!is_transport_error(&err));
        assert!(!is_timeout(&err));
    }

    #[test]
    fn silent_server_is_a_timeout() {
        let base = test_server::serve_silence(Duration::from_secs(2));
        let err = agent_with_timeout(Duration::from_millis(200))
            .get(&base)
            .call()
            .unwrap_err();
        assert!(is_transport_error(&err));
        assert!(is_timeout(&err));
    }

    #[test]
    fn refused_connection_is_not_a_timeout() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let err = agent_with_timeout(Duration::from_millis(500))
            .get(&format!("http://{addr}"))
            .call()
            .unwrap_err();
        assert!(is_transport_error(&err));
        assert!(!is_timeout(&err));
    }
}
