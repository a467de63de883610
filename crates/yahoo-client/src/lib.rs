use analysis_core::{AnalysisError, CompanyInfo, DataProvider, PriceBar, ProviderSnapshot, SourceItem};
use async_trait::async_trait;
use chrono::{DateTime, Months, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub mod fundamentals;

use fundamentals::{into_statements, parse_timeseries, ANNUAL_FIELDS, MARKET_CAP_FIELD, SHARES_ROW};

const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const TIMESERIES_URL: &str = "https://query1.finance.yahoo.com/ws/fundamentals-timeseries/v1/finance/timeseries";
const SUMMARY_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";
const QUOTE_URL: &str = "https://finance.yahoo.com/quote";

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko)";

/// Years of annual statements requested per ticker
const STATEMENT_YEARS: u32 = 10;

/// Yahoo Finance data provider: daily chart, annual fundamentals and asset profile.
#[derive(Clone)]
pub struct YahooClient {
    client: Client,
    history_range: String,
}

impl YahooClient {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            history_range: "5y".to_string(),
        }
    }

    /// Price history range passed to the chart endpoint ("1y", "5y", "max", ...)
    pub fn with_history_range(mut self, range: impl Into<String>) -> Self {
        self.history_range = range.into();
        self
    }

    /// Send a request, retrying twice on HTTP 429.
    async fn send_request(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, AnalysisError> {
        let request = builder.build().map_err(|e| AnalysisError::ApiError(e.to_string()))?;

        for attempt in 0..3u32 {
            let req_clone = request
                .try_clone()
                .ok_or_else(|| AnalysisError::ApiError("Cannot clone request".to_string()))?;
            let response = self
                .client
                .execute(req_clone)
                .await
                .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

            if response.status().as_u16() != 429 {
                return Ok(response);
            }

            let wait_secs = 2u64 << attempt;
            tracing::warn!("Yahoo 429 rate limited, waiting {}s before retry {}/3", wait_secs, attempt + 1);
            tokio::time::sleep(Duration::from_secs(wait_secs)).await;
        }

        Err(AnalysisError::ApiError("Rate limited by Yahoo after 3 retries".to_string()))
    }

    async fn get_json(&self, builder: reqwest::RequestBuilder) -> Result<Value, AnalysisError> {
        let response = self.send_request(builder).await?;

        if !response.status().is_success() {
            return Err(AnalysisError::ApiError(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AnalysisError::ApiError(e.to_string()))
    }

    /// Daily closes plus the quote metadata carried by the chart payload
    pub async fn get_chart(&self, symbol: &str) -> Result<Chart, AnalysisError> {
        let url = format!("{}/{}", CHART_URL, symbol);
        let body = self
            .get_json(
                self.client
                    .get(&url)
                    .query(&[("range", self.history_range.as_str()), ("interval", "1d")]),
            )
            .await?;
        parse_chart(body)
    }

    /// Annual statement series plus trailing market cap, keyed by series type
    pub async fn get_fundamentals(
        &self,
        symbol: &str,
    ) -> Result<std::collections::HashMap<String, analysis_core::FiscalSeries>, AnalysisError> {
        let url = format!("{}/{}", TIMESERIES_URL, symbol);
        let now = Utc::now();
        let start = now
            .checked_sub_months(Months::new(12 * STATEMENT_YEARS))
            .unwrap_or(now);

        let types = ANNUAL_FIELDS
            .iter()
            .map(|(field, _)| *field)
            .chain(std::iter::once(MARKET_CAP_FIELD))
            .collect::<Vec<_>>()
            .join(",");

        let body = self
            .get_json(self.client.get(&url).query(&[
                ("symbol", symbol.to_string()),
                ("type", types),
                ("merge", "false".to_string()),
                ("period1", start.timestamp().to_string()),
                ("period2", now.timestamp().to_string()),
            ]))
            .await?;
        Ok(parse_timeseries(&body))
    }

    /// Country of domicile from the asset profile module
    pub async fn get_country(&self, symbol: &str) -> Result<Option<String>, AnalysisError> {
        let url = format!("{}/{}", SUMMARY_URL, symbol);
        let body = self
            .get_json(self.client.get(&url).query(&[("modules", "assetProfile")]))
            .await?;
        Ok(parse_country(&body))
    }
}

#[async_trait]
impl DataProvider for YahooClient {
    async fn fetch(&self, symbol: &str) -> Result<Arc<ProviderSnapshot>, AnalysisError> {
        tracing::info!("Fetching {} from Yahoo Finance", symbol);

        let (chart, fundamentals, country) = tokio::join!(
            self.get_chart(symbol),
            self.get_fundamentals(symbol),
            self.get_country(symbol)
        );

        if let (Err(chart_err), Err(fund_err)) = (&chart, &fundamentals) {
            return Err(AnalysisError::provider(
                symbol,
                format!("chart: {}; fundamentals: {}", chart_err, fund_err),
            ));
        }

        let chart = chart.unwrap_or_else(|e| {
            tracing::warn!("{}: chart unavailable: {}", symbol, e);
            Chart::default()
        });
        let series = fundamentals.unwrap_or_else(|e| {
            tracing::warn!("{}: fundamentals unavailable: {}", symbol, e);
            Default::default()
        });
        let country = country.unwrap_or_else(|e| {
            tracing::debug!("{}: asset profile unavailable: {}", symbol, e);
            None
        });

        let statements = into_statements(&series);
        let shares = statements
            .balance
            .as_ref()
            .and_then(|b| b.row(SHARES_ROW))
            .and_then(|s| s.last_value());

        let info = CompanyInfo {
            long_name: chart.long_name,
            market_cap: series.get(MARKET_CAP_FIELD).and_then(|s| s.last_value()),
            shares_outstanding: shares,
            current_price: None,
            regular_market_price: chart.regular_market_price,
            trailing_pe: None,
            country,
        };

        tracing::debug!(
            "Yahoo {}: {} bars, {} series",
            symbol,
            chart.prices.len(),
            series.len()
        );

        Ok(Arc::new(ProviderSnapshot {
            symbol: symbol.to_string(),
            prices: chart.prices,
            info,
            statements,
        }))
    }

    fn citation(&self, symbol: &str) -> SourceItem {
        SourceItem {
            title: format!("Yahoo Finance – {}", symbol),
            url: format!("{}/{}", QUOTE_URL, symbol),
        }
    }
}

/// Parsed chart payload
#[derive(Debug, Clone, Default)]
pub struct Chart {
    pub prices: Vec<PriceBar>,
    pub regular_market_price: Option<f64>,
    pub long_name: Option<String>,
}

pub fn parse_chart(body: Value) -> Result<Chart, AnalysisError> {
    let envelope: ChartEnvelope =
        serde_json::from_value(body).map_err(|e| AnalysisError::ApiError(e.to_string()))?;

    if let Some(error) = envelope.chart.error.filter(|e| !e.is_null()) {
        let message = error
            .get("description")
            .and_then(|d| d.as_str())
            .unwrap_or("unknown chart error")
            .to_string();
        return Err(AnalysisError::ApiError(message));
    }

    let Some(result) = envelope.chart.result.into_iter().flatten().next() else {
        return Err(AnalysisError::ApiError("empty chart result".to_string()));
    };
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();

    let prices = result
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, ts)| {
            let close = quote.close.get(i).copied().flatten()?;
            let date = DateTime::from_timestamp(*ts, 0)?.date_naive();
            Some(PriceBar {
                date,
                close,
                volume: quote.volume.get(i).copied().flatten(),
            })
        })
        .collect();

    Ok(Chart {
        prices,
        regular_market_price: result.meta.regular_market_price,
        long_name: result.meta.long_name,
    })
}

pub fn parse_country(body: &Value) -> Option<String> {
    body.pointer("/quoteSummary/result/0/assetProfile/country")
        .and_then(|c| c.as_str())
        .map(|c| c.to_string())
}

// Response structures
#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    #[serde(default)]
    indicators: ChartIndicators,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(default)]
    regular_market_price: Option<f64>,
    #[serde(default)]
    long_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}
