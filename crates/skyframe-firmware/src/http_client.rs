use embedded_svc::http::Method;
use esp_idf_svc::http::client::{Configuration, EspHttpConnection};
use esp_idf_sys::EspError;
use log::{debug, info};

use skyframe::error::NetworkError;
use skyframe::http::HttpTransport;

use crate::debug_flags::{self, DEBUG_FETCH};

/// Size of the client's receive and header buffers.
const BUFFER_SIZE: usize = 2048;

fn transport(stage: &str, e: EspError) -> NetworkError {
    NetworkError::Transport(format!("{}: {}", stage, e))
}

/// One-shot HTTP client over `esp_http_client`.
///
/// Each `get` builds a new connection and drops the previous one, so there
/// is never more than one socket open.
#[derive(Default)]
pub struct EspTransport {
    conn: Option<EspHttpConnection>,
    content_length: Option<usize>,
    open: bool,
}

impl EspTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HttpTransport for EspTransport {
    fn get(&mut self, url: &str, timeout_ms: u64) -> Result<u16, NetworkError> {
        self.close();

        let config = Configuration {
            timeout: Some(std::time::Duration::from_millis(timeout_ms)),
            buffer_size: Some(BUFFER_SIZE),
            use_global_ca_store: true,
            crt_bundle_attach: Some(esp_idf_sys::esp_crt_bundle_attach),
            ..Default::default()
        };
        let mut conn = EspHttpConnection::new(&config)
            .map_err(|e| NetworkError::Connect(e.to_string()))?;
        conn.initiate_request(Method::Get, url, &[("Accept", "image/jpeg, application/json")])
            .map_err(|e| NetworkError::Connect(e.to_string()))?;
        conn.initiate_response().map_err(|e| {
            if e.code() == esp_idf_sys::ESP_ERR_HTTP_EAGAIN as esp_idf_sys::esp_err_t {
                NetworkError::Timeout
            } else {
                transport("response", e)
            }
        })?;

        let status = conn.status();
        self.content_length = conn
            .header("Content-Length")
            .and_then(|v| v.trim().parse().ok());
        let msg = format!(
            "HTTP GET {} -> {} ({:?} bytes)",
            url.chars().take(96).collect::<String>(),
            status,
            self.content_length
        );
        if debug_flags::is_on(&DEBUG_FETCH) {
            info!("{}", msg);
        } else {
            debug!("{}", msg);
        }

        self.conn = Some(conn);
        self.open = true;
        Ok(status)
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.conn.as_ref()?.header(name)
    }

    fn content_length(&self) -> Option<usize> {
        self.content_length
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, NetworkError> {
        let Some(conn) = self.conn.as_mut() else {
            return Ok(0);
        };
        if !self.open {
            return Ok(0);
        }
        match conn.read(buf) {
            Ok(0) => {
                self.open = false;
                Ok(0)
            }
            Ok(n) => Ok(n),
            // Nothing arrived within the socket timeout; the caller owns the deadline.
            Err(e) if e.code() == esp_idf_sys::ESP_ERR_HTTP_EAGAIN as esp_idf_sys::esp_err_t => {
                Ok(0)
            }
            Err(e) => {
                self.open = false;
                Err(transport("read", e))
            }
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) {
        self.open = false;
        self.content_length = None;
        self.conn = None;
    }
}
