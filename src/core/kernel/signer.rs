use crate::core::errors::ExchangeError;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::HashMap;

/// Result type for signing operations: (headers, `query_params`)
pub type SignatureResult = Result<(HashMap<String, String>, Vec<(String, String)>), ExchangeError>;

/// Signer trait for request authentication
///
/// Implementations produce the headers and query parameters a request needs
/// to pass the exchange's authentication checks.
pub trait Signer: Send + Sync {
    /// Sign a request and return headers and query parameters
    ///
    /// # Arguments
    /// * `method` - HTTP method (GET, POST, etc.)
    /// * `endpoint` - API endpoint path
    /// * `query_string` - Query string (without leading '?')
    /// * `body` - Raw request body bytes
    /// * `timestamp` - Request timestamp in milliseconds
    fn sign_request(
        &self,
        method: &str,
        endpoint: &str,
        query_string: &str,
        body: &[u8],
        timestamp: u64,
    ) -> SignatureResult;
}

/// HMAC-SHA256 signer for currency.com
///
/// The exchange authenticates Binance-style: the query string (with a
/// `timestamp` parameter prepended) is signed with HMAC-SHA256, the hex
/// digest is appended as a `signature` parameter, and the API key travels
/// in the `X-MBX-APIKEY` header.
pub struct HmacSigner {
    api_key: String,
    secret_key: String,
}

impl HmacSigner {
    pub fn new(api_key: String, secret_key: String) -> Self {
        Self {
            api_key,
            secret_key,
        }
    }

    fn hmac_hex(&self, payload: &str) -> Result<String, ExchangeError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret_key.as_bytes())
            .map_err(|e| ExchangeError::AuthError(format!("Invalid secret key: {}", e)))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

impl Signer for HmacSigner {
    fn sign_request(
        &self,
        _method: &str,
        _endpoint: &str,
        query_string: &str,
        _body: &[u8],
        timestamp: u64,
    ) -> SignatureResult {
        let signed_payload = if query_string.is_empty() {
            format!("timestamp={}", timestamp)
        } else {
            format!("timestamp={}&{}", timestamp, query_string)
        };

        let signature = self.hmac_hex(&signed_payload)?;

        let mut headers = HashMap::new();
        headers.insert("X-MBX-APIKEY".to_string(), self.api_key.clone());

        let mut signed_params = vec![("timestamp".to_string(), timestamp.to_string())];
        if !query_string.is_empty() {
            signed_params.extend(query_string.split('&').filter_map(|param| {
                param
                    .split_once('=')
                    .map(|(k, v)| (k.to_string(), v.to_string()))
            }));
        }
        signed_params.push(("signature".to_string(), signature));

        Ok((headers, signed_params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> HmacSigner {
        HmacSigner::new("test_key".to_string(), "test_secret".to_string())
    }

    #[test]
    fn test_api_key_header() {
        let (headers, _) = signer()
            .sign_request("GET", "/account", "recvWindow=5000", &[], 1_597_850_971_558)
            .unwrap();
        assert_eq!(headers.get("X-MBX-APIKEY").unwrap(), "test_key");
    }

    #[test]
    fn test_signature_appended_last() {
        let (_, params) = signer()
            .sign_request("GET", "/account", "recvWindow=5000", &[], 1_597_850_971_558)
            .unwrap();
        assert_eq!(params[0], ("timestamp".to_string(), "1597850971558".to_string()));
        assert_eq!(params[1].0, "recvWindow");
        let (last_key, last_value) = params.last().unwrap();
        assert_eq!(last_key, "signature");
        assert_eq!(last_value.len(), 64);
        assert!(last_value.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_signature_deterministic() {
        let (_, first) = signer()
            .sign_request("GET", "/depth", "symbol=BTC/USD&limit=100", &[], 1_000)
            .unwrap();
        let (_, second) = signer()
            .sign_request("GET", "/depth", "symbol=BTC/USD&limit=100", &[], 1_000)
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_timestamp_changes_signature() {
        let (_, first) = signer().sign_request("GET", "/depth", "", &[], 1_000).unwrap();
        let (_, second) = signer().sign_request("GET", "/depth", "", &[], 2_000).unwrap();
        assert_ne!(first.last(), second.last());
    }
}
