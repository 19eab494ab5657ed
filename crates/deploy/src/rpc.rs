//! Shared RPC utilities for interacting with Ethereum JSON-RPC endpoints.

use std::time::Duration;

use alloy_core::primitives::Bytes;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;

use crate::chain::ChainError;

/// Default timeout for RPC requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Create an HTTP client configured for JSON-RPC requests.
pub fn create_client() -> Result<reqwest::Client, ChainError> {
    reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .map_err(|e| ChainError::Transport(format!("Failed to create HTTP client: {e}")))
}

/// JSON-RPC error object.
#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

/// Extract revert data from the `data` member of an error object.
///
/// Nodes disagree on the shape: some return the hex string directly, others nest
/// it under `data` or `result`.
fn revert_data(data: &Value) -> Option<Bytes> {
    match data {
        Value::String(s) if s.starts_with("0x") => s.parse().ok(),
        Value::Object(map) => map
            .get("data")
            .or_else(|| map.get("result"))
            .and_then(revert_data),
        _ => None,
    }
}

/// Make a JSON-RPC call and deserialize the result.
///
/// # Arguments
/// * `client` - The HTTP client to use
/// * `url` - The RPC endpoint URL
/// * `method` - The RPC method name
/// * `params` - The method parameters
///
/// # Returns
/// The deserialized result. Error responses carrying revert data become
/// [`ChainError::Reverted`], other error responses [`ChainError::Rpc`].
pub async fn json_rpc_call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: Vec<Value>,
) -> Result<T, ChainError> {
    let response = client
        .post(url)
        .json(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        }))
        .send()
        .await
        .map_err(|e| ChainError::Transport(format!("Failed to send {method} request: {e}")))?;

    let mut result: Value = response
        .json()
        .await
        .map_err(|e| ChainError::Transport(format!("Failed to parse {method} response: {e}")))?;

    if let Some(error) = result.get_mut("error").map(Value::take) {
        let error: RpcErrorObject = serde_json::from_value(error)
            .map_err(|e| ChainError::Transport(format!("Malformed {method} error: {e}")))?;

        if let Some(data) = error.data.as_ref().and_then(revert_data) {
            return Err(ChainError::Reverted { data });
        }

        return Err(ChainError::Rpc {
            code: error.code,
            message: error.message,
        });
    }

    let result_value = result
        .get_mut("result")
        .map(Value::take)
        .ok_or_else(|| ChainError::Transport(format!("No result in {method} response")))?;

    serde_json::from_value(result_value)
        .map_err(|e| ChainError::Transport(format!("Failed to deserialize {method} result: {e}")))
}

/// Poll `check_fn` until it yields a value.
///
/// # Arguments
/// * `name` - What is being waited for (for error messages)
/// * `timeout` - Maximum time to wait
/// * `interval` - Delay between attempts
/// * `check_fn` - Returns `Ok(Some(_))` when done, `Ok(None)` to keep waiting
pub async fn poll_until<T, F, Fut>(
    name: &str,
    timeout: Duration,
    interval: Duration,
    check_fn: F,
) -> Result<T, ChainError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<Option<T>, ChainError>>,
{
    let start = std::time::Instant::now();

    loop {
        if start.elapsed() > timeout {
            return Err(ChainError::Timeout(name.to_string()));
        }

        match check_fn().await? {
            Some(value) => return Ok(value),
            None => {
                tracing::trace!(target_name = %name, "Not ready yet, retrying...");
            }
        }

        tokio::time::sleep(interval).await;
    }
}
