use crate::config::Config;
use crate::error::FetchError;
use reqwest::blocking::Client;
use serde_json::Value;
use tracing::debug;

/// The two documents a sampling run needs from the inverter.
pub trait Inverter {
    /// Instantaneous system power.
    fn realtime_power(&self) -> Result<Value, FetchError>;

    /// Every per-string current/voltage sample recorded so far on `day` (`YYYY-MM-DD`).
    fn string_archive(&self, day: &str) -> Result<Value, FetchError>;
}

/// Fronius Solar API v1 over plain HTTP.
#[derive(Debug)]
pub struct FroniusClient {
    client: Client,
    host: String,
}

impl FroniusClient {
    /// Connects directly, ignoring any system proxy.
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        let client = Client::builder().no_proxy().build()?;
        Ok(Self::with_client(client, &config.inverter_host))
    }

    fn with_client(client: Client, host: &str) -> Self {
        Self {
            client,
            host: host.to_string(),
        }
    }

    fn get_json(&self, url: &str) -> Result<Value, FetchError> {
        debug!(url, "requesting inverter data");
        let response = self.client.get(url).send().map_err(|e| classify(e, url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response.json::<Value>().map_err(|e| classify(e, url))
    }
}

impl Inverter for FroniusClient {
    fn realtime_power(&self) -> Result<Value, FetchError> {
        self.get_json(&realtime_url(&self.host))
    }

    fn string_archive(&self, day: &str) -> Result<Value, FetchError> {
        self.get_json(&archive_url(&self.host, day))
    }
}

pub fn realtime_url(host: &str) -> String {
    format!("http://{host}/solar_api/v1/GetInverterRealtimeData.cgi?Scope=System")
}

pub fn archive_url(host: &str, day: &str) -> String {
    format!(
        "http://{host}/solar_api/v1/GetArchiveData.cgi?Scope=System&StartDate={day}&EndDate={day}\
         &Channel=Voltage_DC_String_1&Channel=Current_DC_String_1\
         &Channel=Voltage_DC_String_2&Channel=Current_DC_String_2"
    )
}

fn classify(e: reqwest::Error, url: &str) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if e.is_connect() {
        FetchError::Connect
    } else {
        FetchError::Http(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;
    use std::time::Duration;

    /// Answers one request with `response` and closes the connection.
    fn answer_once(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let host = listener.local_addr().unwrap().to_string();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = [0u8; 4096];
            let _ = stream.read(&mut request).unwrap();
            stream.write_all(response.as_bytes()).unwrap();
        });
        host
    }

    fn quick_client(host: &str) -> FroniusClient {
        let client = Client::builder()
            .no_proxy()
            .timeout(Duration::from_millis(300))
            .build()
            .unwrap();
        FroniusClient::with_client(client, host)
    }

    #[test]
    fn refused_connection_is_a_transport_failure() {
        // Nothing listens on the discard port of the loopback interface.
        let config = Config {
            inverter_host: "127.0.0.1:9".to_string(),
            ..Config::deployment()
        };
        let client = FroniusClient::new(&config).unwrap();

        let err = client.realtime_power().unwrap_err();
        assert!(err.is_transport(), "{err:?}");
        assert_eq!(err.to_string(), "Cannot connect to inverter");
    }

    #[test]
    fn server_error_is_a_transport_failure() {
        let host = answer_once(
            "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        );

        let err = quick_client(&host).realtime_power().unwrap_err();
        assert!(
            matches!(err, FetchError::Status { status: 500, ref url } if url == &realtime_url(&host)),
            "{err:?}"
        );
        assert!(err.is_transport());
    }

    #[test]
    fn silent_inverter_times_out() {
        // Connections queue in the backlog; nothing ever reads or answers them.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let host = listener.local_addr().unwrap().to_string();

        let err = quick_client(&host).string_archive("2021-06-21").unwrap_err();
        assert!(
            matches!(err, FetchError::Timeout { ref url } if url == &archive_url(&host, "2021-06-21")),
            "{err:?}"
        );
        assert!(err.is_transport());
        drop(listener);
    }

    #[test]
    fn json_body_is_returned() {
        let host = answer_once(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 17\r\nConnection: close\r\n\r\n{\"Body\":{\"Ok\":1}}",
        );

        let doc = quick_client(&host).realtime_power().unwrap();
        assert_eq!(doc["Body"]["Ok"], 1);
    }

    #[test]
    fn archive_url_asks_for_all_four_channels() {
        let url = archive_url("192.168.1.123", "2021-09-11");
        assert!(url.starts_with("http://192.168.1.123/solar_api/v1/GetArchiveData.cgi?"));
        assert!(url.contains("StartDate=2021-09-11&EndDate=2021-09-11"));
        for channel in [
            "Voltage_DC_String_1",
            "Current_DC_String_1",
            "Voltage_DC_String_2",
            "Current_DC_String_2",
        ] {
            assert!(url.contains(&format!("&Channel={channel}")), "{url}");
        }
    }

    #[test]
    fn timeout_message_names_the_url() {
        let err = FetchError::Timeout {
            url: "http://inverter/solar_api".to_string(),
        };
        assert!(err.is_transport());
        assert_eq!(
            err.to_string(),
            "Timeout reading from API: http://inverter/solar_api"
        );
    }
}
