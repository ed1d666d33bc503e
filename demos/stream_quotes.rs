//! Stream live quotes from the demo environment
//!
//! Run with `cargo run --example stream_quotes`. Credentials are read
//! from `.env` when present but are not required for public market data.

use currencycom::exchanges::currencycom::CurrencycomWsEvent;
use currencycom::{build_connector, ExchangeConfig, SessionState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let config = ExchangeConfig::from_env_file()
        .unwrap_or_else(|_| ExchangeConfig::read_only())
        .demo(true);
    let connector = build_connector(config)?;

    let server_time = connector.rest().get_server_time().await?;
    println!("server time: {}", server_time.server_time);

    let (stream, mut events) = connector.event_stream(256);
    stream
        .subscribe_market_data(vec!["BTC/USD".to_string(), "ETH/USD".to_string()])
        .await?;

    let mut states = stream.state_watch();
    tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = *states.borrow();
            println!("session state: {:?}", state);
            if state == SessionState::Failed {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(CurrencycomWsEvent::Quote(quote)) => {
                    println!(
                        "{}: bid {} ({}) / ask {} ({})",
                        quote.symbol_name, quote.bid, quote.bid_qty, quote.ofr, quote.ofr_qty
                    );
                }
                Some(CurrencycomWsEvent::Raw(envelope)) => {
                    println!("<- {}: {}", envelope.destination, envelope.payload);
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                println!("shutting down");
                stream.shutdown();
                break;
            }
        }
    }

    stream.closed().await;
    Ok(())
}
