use crate::fetch::error::FetchError;
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, COOKIE};
use reqwest::Client;
use std::time::Duration;

/// Posts one form to the AQI endpoint and hands back the raw response body.
///
/// Implementations report connection problems as [`FetchError::NetworkRequest`]
/// and non-success statuses as [`FetchError::HttpStatus`]; the body is not
/// interpreted here.
#[async_trait]
pub trait AqiTransport: Send + Sync {
    async fn post_form(&self, form: &[(&'static str, String)]) -> Result<String, FetchError>;
}

/// [`AqiTransport`] over a `reqwest` client carrying the browser-session headers.
pub struct ReqwestTransport {
    client: Client,
    url: String,
}

impl ReqwestTransport {
    pub fn new(
        url: impl Into<String>,
        headers: &[(String, String)],
        cookies: &[(String, String)],
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .default_headers(build_headers(headers, cookies)?)
            .timeout(timeout)
            .build()
            .map_err(FetchError::ClientBuild)?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

fn build_headers(
    headers: &[(String, String)],
    cookies: &[(String, String)],
) -> Result<HeaderMap, FetchError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| FetchError::InvalidHeader(name.clone()))?;
        let header_value =
            HeaderValue::from_str(value).map_err(|_| FetchError::InvalidHeader(name.clone()))?;
        map.insert(header_name, header_value);
    }
    if !cookies.is_empty() {
        let cookie = cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        let value =
            HeaderValue::from_str(&cookie).map_err(|_| FetchError::InvalidHeader(COOKIE.as_str().to_string()))?;
        map.insert(COOKIE, value);
    }
    Ok(map)
}

#[async_trait]
impl AqiTransport for ReqwestTransport {
    async fn post_form(&self, form: &[(&'static str, String)]) -> Result<String, FetchError> {
        debug!("POST {} {:?}", self.url, form);
        let response = self
            .client
            .post(&self.url)
            .form(form)
            .send()
            .await
            .map_err(|e| FetchError::NetworkRequest(self.url.clone(), e))?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            warn!("HTTP error for {}: {}", self.url, status);
            return Err(FetchError::HttpStatus {
                url: self.url.clone(),
                status,
            });
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::NetworkRequest(self.url.clone(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::jalali_date::JalaliDate;
    use crate::fetch::job::FetchJob;
    use reqwest::StatusCode;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    type Served = JoinHandle<std::io::Result<String>>;

    fn http_reply(status_line: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    async fn read_request(socket: &mut TcpStream) -> std::io::Result<String> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    break;
                }
            }
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Answers a single request with `reply`, or never answers when it is `None`.
    /// The handle yields the raw request as received.
    async fn serve_once(reply: Option<String>) -> std::io::Result<(String, Served)> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let url = format!("http://{}/Home/GetAQIDataByRegion/", listener.local_addr()?);
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await?;
            let request = read_request(&mut socket).await?;
            match reply {
                Some(reply) => socket.write_all(reply.as_bytes()).await?,
                None => tokio::time::sleep(Duration::from_secs(5)).await,
            }
            Ok(request)
        });
        Ok((url, handle))
    }

    fn transport(url: &str, timeout: Duration) -> Result<ReqwestTransport, FetchError> {
        let headers = vec![
            ("Accept".to_string(), "application/json".to_string()),
            ("X-Requested-With".to_string(), "XMLHttpRequest".to_string()),
        ];
        let cookies = vec![
            ("_ga".to_string(), "GA1.2".to_string()),
            ("ASP.NET_SessionId".to_string(), "abc".to_string()),
        ];
        ReqwestTransport::new(url, &headers, &cookies, timeout)
    }

    fn first_day_form() -> Vec<(&'static str, String)> {
        FetchJob::builder()
            .date(JalaliDate::new(1402, 1, 1).unwrap())
            .build()
            .form()
    }

    #[tokio::test]
    async fn test_post_form_sends_form_and_session() -> Result<(), Box<dyn std::error::Error>> {
        let body = r#"{"Data":[{"Id":1}]}"#;
        let (url, served) = serve_once(Some(http_reply("200 OK", body))).await?;

        let text = transport(&url, Duration::from_secs(5))?
            .post_form(&first_day_form())
            .await?;
        let request = served.await??;

        assert_eq!(text, body);
        assert!(request.starts_with("POST /Home/GetAQIDataByRegion/ HTTP/1.1\r\n"));
        let lowered = request.to_lowercase();
        assert!(lowered.contains("x-requested-with: xmlhttprequest"));
        assert!(lowered.contains("cookie: _ga=ga1.2; asp.net_sessionid=abc"));
        assert!(lowered.contains("content-type: application/x-www-form-urlencoded"));
        assert!(request.ends_with("\r\n\r\nDate=1402%2F01%2F01+11%3A00&type=1"));
        Ok(())
    }

    #[tokio::test]
    async fn test_post_form_maps_error_status() -> Result<(), Box<dyn std::error::Error>> {
        let (url, served) =
            serve_once(Some(http_reply("503 Service Unavailable", ""))).await?;

        let err = transport(&url, Duration::from_secs(5))?
            .post_form(&first_day_form())
            .await
            .unwrap_err();
        served.await??;

        assert!(err.is_retryable());
        assert!(matches!(
            err,
            FetchError::HttpStatus { status, .. } if status == StatusCode::SERVICE_UNAVAILABLE
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_post_form_times_out() -> Result<(), Box<dyn std::error::Error>> {
        let (url, served) = serve_once(None).await?;

        let err = transport(&url, Duration::from_millis(50))?
            .post_form(&first_day_form())
            .await
            .unwrap_err();
        served.abort();

        assert!(err.is_retryable());
        assert!(matches!(&err, FetchError::NetworkRequest(_, e) if e.is_timeout()));
        Ok(())
    }

    #[test]
    fn test_build_headers_with_cookies() -> Result<(), FetchError> {
        let headers = vec![
            ("Accept".to_string(), "application/json".to_string()),
            ("X-Requested-With".to_string(), "XMLHttpRequest".to_string()),
        ];
        let cookies = vec![
            ("_ga".to_string(), "GA1.2".to_string()),
            ("ASP.NET_SessionId".to_string(), String::new()),
        ];
        let map = build_headers(&headers, &cookies)?;

        assert_eq!(map.get("accept").unwrap(), "application/json");
        assert_eq!(map.get("x-requested-with").unwrap(), "XMLHttpRequest");
        assert_eq!(map.get(COOKIE).unwrap(), "_ga=GA1.2; ASP.NET_SessionId=");
        Ok(())
    }

    #[test]
    fn test_build_headers_rejects_bad_values() {
        let headers = vec![("Referer".to_string(), "bad\nvalue".to_string())];
        assert!(matches!(
            build_headers(&headers, &[]),
            Err(FetchError::InvalidHeader(name)) if name == "Referer"
        ));
    }
}
