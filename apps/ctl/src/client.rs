use ransomeye_types::ProblemDetails;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Exit code taxonomy: `0` success, `1` generic failure, `2` validation
/// error, `3` signature verification failure, `4` storage unavailable. A
/// response this CLI cannot even parse as `application/problem+json`
/// still falls back to `1` rather than panicking.
pub fn exit_code_for(code: &str) -> i32 {
    match code {
        "ERR_VALIDATION" | "ERR_CONFLICT" => 2,
        "ERR_SIGNATURE" => 3,
        "ERR_UNAVAILABLE" => 4,
        _ => 1,
    }
}

#[derive(Debug)]
pub struct CtlError {
    pub exit_code: i32,
    pub message: String,
}

impl std::fmt::Display for CtlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CtlError {}

pub struct CtlClient {
    http: reqwest::Client,
    base_url: String,
    bearer_token: String,
}

impl CtlClient {
    pub fn new(base_url: String, bearer_token: String) -> Self {
        CtlClient { http: reqwest::Client::new(), base_url, bearer_token }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn handle<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, CtlError> {
        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| CtlError { exit_code: 1, message: e.to_string() })?;

        if status.is_success() {
            serde_json::from_slice(&bytes).map_err(|e| CtlError { exit_code: 1, message: format!("malformed response body: {e}") })
        } else {
            match serde_json::from_slice::<ProblemDetails>(&bytes) {
                Ok(problem) => Err(CtlError { exit_code: exit_code_for(&problem.code), message: format!("{}: {}", problem.title, problem.detail) }),
                Err(_) => Err(CtlError { exit_code: 1, message: format!("http {status}: {}", String::from_utf8_lossy(&bytes)) }),
            }
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, CtlError> {
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(&self.bearer_token)
            .send()
            .await
            .map_err(|e| CtlError { exit_code: 4, message: e.to_string() })?;
        Self::handle(response).await
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, CtlError> {
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(&self.bearer_token)
            .json(body)
            .send()
            .await
            .map_err(|e| CtlError { exit_code: 4, message: e.to_string() })?;
        Self::handle(response).await
    }

    /// `GET /healthz` bypasses the generic `ProblemDetails` decoding: a
    /// maintenance response is still a well-formed JSON body, just not
    /// shaped like an error, and maps to the storage-unavailable exit code
    /// rather than the generic-failure one.
    pub async fn health(&self) -> Result<serde_json::Value, CtlError> {
        let response = self.http.get(self.url("/healthz")).send().await.map_err(|e| CtlError { exit_code: 4, message: e.to_string() })?;
        let status = response.status();
        let body: serde_json::Value = response.json().await.map_err(|e| CtlError { exit_code: 1, message: e.to_string() })?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(CtlError { exit_code: 4, message: body.to_string() })
        }
    }

    /// `GET /metrics` is Prometheus text exposition format, not JSON.
    pub async fn metrics_text(&self) -> Result<String, CtlError> {
        let response = self.http.get(self.url("/metrics")).bearer_auth(&self.bearer_token).send().await.map_err(|e| CtlError { exit_code: 4, message: e.to_string() })?;
        let status = response.status();
        let text = response.text().await.map_err(|e| CtlError { exit_code: 1, message: e.to_string() })?;
        if status.is_success() {
            Ok(text)
        } else {
            Err(CtlError { exit_code: 1, message: text })
        }
    }

    pub async fn patch<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, CtlError> {
        let response = self
            .http
            .patch(self.url(path))
            .bearer_auth(&self.bearer_token)
            .json(body)
            .send()
            .await
            .map_err(|e| CtlError { exit_code: 4, message: e.to_string() })?;
        Self::handle(response).await
    }
}
