//! Runs a single read-only endpoint from the command line.

use std::sync::Arc;

use anyhow::Context;
use anyhow::bail;
use serde::de::DeserializeOwned;
use serde_json::Value;
use xc_http::BinanceClient;
use xc_http::BitgetClient;
use xc_http::BybitClient;
use xc_http::DydxClient;
use xc_http::HtxClient;
use xc_http::KucoinClient;
use xc_http::MexcClient;
use xc_http::OkxClient;
use xc_http::Reply;
use xc_http::exchanges::ClientBuilder;
use xc_http::exchanges::Exchange;
use xc_ratelimit::KeyedRateLimiter;

use crate::cli::ProbeArgs;
use crate::config_loader::XcConfig;
use crate::secrets;

pub const EXCHANGES: [&str; 8] = ["binance", "bitget", "bybit", "dydx", "htx", "kucoin", "mexc", "okx"];

/// Clients built here share one limiter, so repeated probes respect the spacing
pub struct Probe {
    config: XcConfig,
    limiter: Arc<dyn KeyedRateLimiter>,
    secrets: Option<Value>,
}

impl Probe {
    pub fn new(config: XcConfig, secrets: Option<Value>) -> Self {
        let limiter = Arc::new(config.rate_limit.limiter());
        Self { config, limiter, secrets }
    }

    pub fn config(&self) -> &XcConfig {
        &self.config
    }

    fn builder<E: Exchange>(&self) -> ClientBuilder<E> {
        ClientBuilder::<E>::default()
            .http_config(self.config.http.client_config())
            .settings(self.config.execution.settings())
            .rate_limiter(self.limiter.clone())
    }

    fn credentials<A: DeserializeOwned>(&self, args: &ProbeArgs) -> anyhow::Result<A> {
        let secrets = self.secrets.as_ref().context("private endpoint needs secrets_path in the config")?;
        secrets::credentials(secrets, args.api_path()).with_context(|| format!("no {} credentials", args.exchange))
    }

    /// Public endpoints use an anonymous client, private ones load credentials first
    fn client<E: Exchange>(&self, args: &ProbeArgs, private: bool) -> anyhow::Result<E>
    where
        E::Auth: DeserializeOwned,
    {
        let mut builder = self.builder::<E>();
        if private {
            builder = builder.credentials(self.credentials(args)?);
        }
        Ok(builder.build()?)
    }

    pub async fn run(&self, args: &ProbeArgs) -> anyhow::Result<Value> {
        let reply = match args.exchange.as_str() {
            "binance" => self.binance(args).await?,
            "bitget" => self.bitget(args).await?,
            "bybit" => self.bybit(args).await?,
            "dydx" => self.dydx(args).await?,
            "htx" => self.htx(args).await?,
            "kucoin" => self.kucoin(args).await?,
            "mexc" => self.mexc(args).await?,
            "okx" => self.okx(args).await?,
            other => bail!("unknown exchange {other:?}, expected one of {}", EXCHANGES.join(", ")),
        };

        Ok(reply.into_body())
    }

    async fn binance(&self, args: &ProbeArgs) -> anyhow::Result<Reply<Value>> {
        let client = self.builder::<BinanceClient>().build()?;
        let params = args.params.clone();

        Ok(match args.endpoint.as_str() {
            "get_kline" => client.get_kline(args.arg(0, "symbol")?, args.arg(1, "interval")?, params).await?,
            "get_funding_rate_history" => client.get_funding_rate_history(params).await?,
            "get_funding_rate_info" => client.get_funding_rate_info().await?,
            "get_price_ticker_v2" => client.get_price_ticker_v2(params).await?,
            other => bail!("unknown binance endpoint {other:?}"),
        })
    }

    async fn bitget(&self, args: &ProbeArgs) -> anyhow::Result<Reply<Value>> {
        let private = matches!(args.endpoint.as_str(), "get_single_account" | "get_single_position");
        let client: BitgetClient = self.client(args, private)?;
        let params = args.params.clone();

        Ok(match args.endpoint.as_str() {
            "get_ticker" => client.get_ticker(args.arg(0, "symbol")?, args.arg(1, "product_type")?).await?,
            "get_candlestick_data" => {
                client.get_candlestick_data(args.arg(0, "symbol")?, args.arg(1, "product_type")?, args.arg(2, "granularity")?, params).await?
            }
            "get_next_funding_time" => client.get_next_funding_time(args.arg(0, "symbol")?, args.arg(1, "product_type")?).await?,
            "get_historical_funding_rates" => {
                client.get_historical_funding_rates(args.arg(0, "symbol")?, args.arg(1, "product_type")?, params).await?
            }
            "get_current_funding_rate" => client.get_current_funding_rate(args.arg(0, "product_type")?, params).await?,
            "get_single_account" => {
                client.get_single_account(args.arg(0, "symbol")?, args.arg(1, "product_type")?, args.arg(2, "margin_coin")?).await?
            }
            "get_single_position" => {
                client.get_single_position(args.arg(0, "symbol")?, args.arg(1, "product_type")?, args.arg(2, "margin_coin")?).await?
            }
            other => bail!("unknown bitget endpoint {other:?}"),
        })
    }

    async fn bybit(&self, args: &ProbeArgs) -> anyhow::Result<Reply<Value>> {
        let private = matches!(args.endpoint.as_str(), "get_transferable_amount_unified" | "get_position_info" | "get_closed_pnl");
        let client: BybitClient = self.client(args, private)?;
        let params = args.params.clone();

        Ok(match args.endpoint.as_str() {
            "get_kline" => client.get_kline(args.arg(0, "symbol")?, args.arg(1, "interval")?, params).await?,
            "get_instruments_info" => client.get_instruments_info(args.arg(0, "category")?, params).await?,
            "get_tickers" => client.get_tickers(args.arg(0, "category")?, params).await?,
            "get_funding_rate_history" => client.get_funding_rate_history(args.arg(0, "category")?, args.arg(1, "symbol")?, params).await?,
            "get_transferable_amount_unified" => client.get_transferable_amount_unified(args.arg(0, "coin")?).await?,
            "get_position_info" => client.get_position_info(args.arg(0, "category")?, params).await?,
            "get_closed_pnl" => client.get_closed_pnl(args.arg(0, "category")?, params).await?,
            other => bail!("unknown bybit endpoint {other:?}"),
        })
    }

    async fn dydx(&self, args: &ProbeArgs) -> anyhow::Result<Reply<Value>> {
        let client = self.builder::<DydxClient>().build()?;
        let params = args.params.clone();

        Ok(match args.endpoint.as_str() {
            "get_perpetual_markets" => client.get_perpetual_markets(params).await?,
            "get_candles" => client.get_candles(args.arg(0, "market")?, args.arg(1, "resolution")?, params).await?,
            other => bail!("unknown dydx endpoint {other:?}"),
        })
    }

    async fn htx(&self, args: &ProbeArgs) -> anyhow::Result<Reply<Value>> {
        let client: HtxClient = self.client(args, args.endpoint == "query_unified_account_assets")?;
        let params = args.params.clone();

        Ok(match args.endpoint.as_str() {
            "get_market_depth" => client.get_market_depth(args.arg(0, "contract_code")?, args.arg(1, "depth_type")?).await?,
            "get_market_bbo" => client.get_market_bbo(params).await?,
            "get_kline_data" => client.get_kline_data(args.arg(0, "contract_code")?, args.arg(1, "period")?, params).await?,
            "get_last_trade" => client.get_last_trade(params).await?,
            "query_funding_rate" => client.query_funding_rate(args.arg(0, "contract_code")?).await?,
            "query_batch_funding_rate" => client.query_batch_funding_rate(params).await?,
            "query_historical_funding_rate" => client.query_historical_funding_rate(args.arg(0, "contract_code")?, params).await?,
            "query_contract_info" => client.query_contract_info(params).await?,
            "query_contract_elements" => client.query_contract_elements(params).await?,
            "query_unified_account_assets" => client.query_unified_account_assets(params).await?,
            other => bail!("unknown htx endpoint {other:?}"),
        })
    }

    async fn kucoin(&self, args: &ProbeArgs) -> anyhow::Result<Reply<Value>> {
        let private = matches!(
            args.endpoint.as_str(),
            "get_futures_account"
                | "get_private_funding_history"
                | "get_position_details"
                | "get_position_list"
                | "get_positions_history"
                | "get_private_token"
        );
        let client: KucoinClient = self.client(args, private)?;
        let params = args.params.clone();

        Ok(match args.endpoint.as_str() {
            "get_symbol" => client.get_symbol(args.arg(0, "symbol")?).await?,
            "get_all_symbols" => client.get_all_symbols().await?,
            "get_ticker" => client.get_ticker(args.arg(0, "symbol")?).await?,
            "get_klines" => client.get_klines(args.arg(0, "symbol")?, args.arg(1, "granularity")?, params).await?,
            "get_current_funding_rate" => client.get_current_funding_rate(args.arg(0, "symbol")?).await?,
            "get_public_funding_history" => {
                let from = args.arg(1, "from")?.parse().context("<from> must be a millisecond timestamp")?;
                let to = args.arg(2, "to")?.parse().context("<to> must be a millisecond timestamp")?;
                client.get_public_funding_history(args.arg(0, "symbol")?, from, to).await?
            }
            "get_public_token" => client.get_public_token().await?,
            "get_futures_account" => client.get_futures_account(params).await?,
            "get_private_funding_history" => client.get_private_funding_history(args.arg(0, "symbol")?, params).await?,
            "get_position_details" => client.get_position_details(args.arg(0, "symbol")?).await?,
            "get_position_list" => client.get_position_list(params).await?,
            "get_positions_history" => client.get_positions_history(params).await?,
            "get_private_token" => client.get_private_token().await?,
            other => bail!("unknown kucoin endpoint {other:?}"),
        })
    }

    async fn mexc(&self, args: &ProbeArgs) -> anyhow::Result<Reply<Value>> {
        let private = matches!(args.endpoint.as_str(), "get_account_assets" | "get_currency_asset" | "get_open_positions");
        let client: MexcClient = self.client(args, private)?;
        let params = args.params.clone();

        Ok(match args.endpoint.as_str() {
            "get_contract_info" => client.get_contract_info(params).await?,
            "get_index_price" => client.get_index_price(args.arg(0, "symbol")?).await?,
            "get_funding_rate" => client.get_funding_rate(args.arg(0, "symbol")?).await?,
            "get_candlestick_data" => client.get_candlestick_data(args.arg(0, "symbol")?, params).await?,
            "get_ticker" => client.get_ticker(params).await?,
            "get_account_assets" => client.get_account_assets().await?,
            "get_currency_asset" => client.get_currency_asset(args.arg(0, "currency")?).await?,
            "get_open_positions" => client.get_open_positions(params).await?,
            other => bail!("unknown mexc endpoint {other:?}"),
        })
    }

    async fn okx(&self, args: &ProbeArgs) -> anyhow::Result<Reply<Value>> {
        let private = matches!(args.endpoint.as_str(), "get_balance" | "get_positions");
        let client: OkxClient = self.client(args, private)?;
        let params = args.params.clone();

        Ok(match args.endpoint.as_str() {
            "get_ticker" => client.get_ticker(args.arg(0, "inst_id")?).await?,
            "get_instruments" => client.get_instruments(args.arg(0, "inst_type")?, params).await?,
            "get_funding_rate" => client.get_funding_rate(args.arg(0, "inst_id")?).await?,
            "get_funding_rate_history" => client.get_funding_rate_history(args.arg(0, "inst_id")?, params).await?,
            "get_mark_price" => client.get_mark_price(args.arg(0, "inst_type")?, params).await?,
            "get_balance" => client.get_balance(params).await?,
            "get_positions" => client.get_positions(params).await?,
            other => bail!("unknown okx endpoint {other:?}"),
        })
    }
}
