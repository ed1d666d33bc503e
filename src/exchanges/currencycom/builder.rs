use crate::core::config::ExchangeConfig;
use crate::core::errors::ExchangeError;
use crate::core::kernel::{HmacSigner, ReqwestRest, RestClientBuilder, RestClientConfig};
use crate::exchanges::currencycom::client::CurrencycomConnector;
use crate::exchanges::currencycom::constants;
use crate::exchanges::currencycom::rest::CurrencycomRestClient;
use std::sync::Arc;

/// Create a currency.com connector from configuration
///
/// Resolves the production or demo environment, attaches an HMAC signer
/// only when credentials are present (public market data needs none).
pub fn build_connector(
    config: ExchangeConfig,
) -> Result<CurrencycomConnector<ReqwestRest>, ExchangeError> {
    let base_url = config.base_url.clone().unwrap_or_else(|| {
        if config.demo {
            constants::DEMO_BASE_URL.to_string()
        } else {
            constants::BASE_URL.to_string()
        }
    });

    let rest_config = RestClientConfig::new(base_url, "currencycom".to_string()).with_timeout(30);

    let mut rest_builder = RestClientBuilder::new(rest_config);

    if config.has_credentials() {
        let signer = Arc::new(HmacSigner::new(
            config.api_key().to_string(),
            config.secret_key().to_string(),
        ));
        rest_builder = rest_builder.with_signer(signer);
    }

    let rest = rest_builder.build()?;
    Ok(CurrencycomConnector::new(
        CurrencycomRestClient::new(rest),
        config,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_flag_selects_demo_environment() {
        let connector = build_connector(ExchangeConfig::read_only().demo(true)).unwrap();
        assert_eq!(connector.ws_url(), constants::DEMO_BASE_WSS_URL);
    }

    #[test]
    fn test_production_by_default() {
        let connector = build_connector(ExchangeConfig::read_only()).unwrap();
        assert_eq!(connector.ws_url(), constants::BASE_WSS_URL);
    }

    #[test]
    fn test_ws_url_override_wins() {
        let config = ExchangeConfig::read_only().ws_url("wss://localhost:9001".to_string());
        let connector = build_connector(config).unwrap();
        assert_eq!(connector.ws_url(), "wss://localhost:9001");
    }
}
