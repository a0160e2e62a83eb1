//! Unit Conversion
//!
//! Converts an amount between sats, BTC and the session's fiat currency.
//! Exchange rates come from a remote [`RateSource`] and are cached for a few
//! minutes, so repeated unit switches do not hit the network each time.
//!
//! Conversions are computed from the fiat price of one whole coin:
//!
//! | from  | sats            | BTC        | fiat           |
//! |-------|-----------------|------------|----------------|
//! | sats  | a               | a / 1e8    | a / 1e8 * last |
//! | BTC   | a * 1e8         | a          | a * last       |
//! | fiat  | a / last * 1e8  | a / last   | a              |

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::ConversionError;
use crate::units::{CurrencyUnit, SATS_PER_BTC};

/// Default lifetime of cached exchange rates (5 minutes)
pub const DEFAULT_RATE_TTL: Duration = Duration::from_secs(300);

/// Timeout for ticker requests
const TICKER_TIMEOUT: Duration = Duration::from_secs(30);

/// Price of one coin in a fiat currency
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FiatRate {
    /// Last traded price
    pub last: f64,
    /// Currency symbol, e.g. "$"
    #[serde(default)]
    pub symbol: String,
}

/// Exchange rates keyed by fiat code ("USD", "EUR", ...)
pub type RateTable = HashMap<String, FiatRate>;

/// An amount expressed in every supported unit
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    /// Fiat code the `Other` value is expressed in
    pub fiat: String,
    pub symbol: String,
    values: BTreeMap<CurrencyUnit, f64>,
}

impl Conversion {
    pub fn new(fiat: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            fiat: fiat.into(),
            symbol: symbol.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, unit: CurrencyUnit, value: f64) -> Self {
        self.values.insert(unit, value);
        self
    }

    pub fn get(&self, unit: CurrencyUnit) -> Option<f64> {
        self.values.get(&unit).copied()
    }

    /// Value for `unit`, or an error if the lookup omitted it
    pub fn require(&self, unit: CurrencyUnit) -> Result<f64, ConversionError> {
        self.get(unit).ok_or(ConversionError::MissingUnit(unit))
    }
}

/// Converts amounts between units
#[async_trait]
pub trait ConversionService: Send + Sync {
    /// Express `amount`, given in `from`, in every unit. `fiat` names the
    /// currency behind [`CurrencyUnit::Other`].
    async fn convert(
        &self,
        amount: f64,
        from: CurrencyUnit,
        fiat: &str,
    ) -> Result<Conversion, ConversionError>;
}

/// Where exchange rates come from
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn fetch_rates(&self) -> Result<RateTable, ConversionError>;
}

/// Convert using an already fetched rate table
pub fn convert_with_rates(
    amount: f64,
    from: CurrencyUnit,
    fiat: &str,
    rates: &RateTable,
) -> Result<Conversion, ConversionError> {
    let rate = rates
        .get(fiat)
        .ok_or_else(|| ConversionError::UnknownFiat(fiat.to_string()))?;

    if !(rate.last.is_finite() && rate.last > 0.0) {
        return Err(ConversionError::InvalidRate {
            fiat: fiat.to_string(),
            rate: rate.last,
        });
    }

    let (sats, btc, other) = match from {
        CurrencyUnit::Sats => (
            amount,
            amount / SATS_PER_BTC,
            amount / SATS_PER_BTC * rate.last,
        ),
        CurrencyUnit::Btc => (amount * SATS_PER_BTC, amount, amount * rate.last),
        CurrencyUnit::Other => (
            amount / rate.last * SATS_PER_BTC,
            amount / rate.last,
            amount,
        ),
    };

    Ok(Conversion::new(fiat, rate.symbol.clone())
        .with_value(CurrencyUnit::Sats, sats)
        .with_value(CurrencyUnit::Btc, btc)
        .with_value(CurrencyUnit::Other, other))
}

/// Rate table with TTL-based expiration
#[derive(Debug, Clone)]
pub struct ConversionRateCache {
    rates: RateTable,
    last_fetched: Option<Instant>,
    ttl: Duration,
}

impl Default for ConversionRateCache {
    fn default() -> Self {
        Self::with_ttl(DEFAULT_RATE_TTL)
    }
}

impl ConversionRateCache {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            rates: RateTable::new(),
            last_fetched: None,
            ttl,
        }
    }

    /// Replace the cached table with freshly fetched rates
    pub fn update(&mut self, rates: RateTable) {
        self.rates = rates;
        self.last_fetched = Some(Instant::now());
    }

    /// The cached table, or `None` if it was never filled or has expired
    pub fn rates(&self) -> Option<&RateTable> {
        self.last_fetched
            .filter(|t| t.elapsed() < self.ttl)
            .map(|_| &self.rates)
    }

    pub fn needs_refresh(&self) -> bool {
        self.rates().is_none()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

/// Conversion service backed by a [`RateSource`] and a rate cache
pub struct CachedRateConverter<S> {
    source: S,
    cache: Mutex<ConversionRateCache>,
}

impl<S: RateSource> CachedRateConverter<S> {
    pub fn new(source: S) -> Self {
        Self::with_ttl(source, DEFAULT_RATE_TTL)
    }

    pub fn with_ttl(source: S, ttl: Duration) -> Self {
        Self {
            source,
            cache: Mutex::new(ConversionRateCache::with_ttl(ttl)),
        }
    }

    /// Current rates, refreshing the cache if it went stale
    pub async fn rates(&self) -> Result<RateTable, ConversionError> {
        // Held across the fetch so concurrent callers share one refresh
        let mut cache = self.cache.lock().await;
        if let Some(rates) = cache.rates() {
            return Ok(rates.clone());
        }

        debug!("Refreshing exchange rates");
        let rates = self.source.fetch_rates().await?;
        cache.update(rates.clone());
        Ok(rates)
    }
}

#[async_trait]
impl<S: RateSource> ConversionService for CachedRateConverter<S> {
    async fn convert(
        &self,
        amount: f64,
        from: CurrencyUnit,
        fiat: &str,
    ) -> Result<Conversion, ConversionError> {
        let rates = self.rates().await?;
        convert_with_rates(amount, from, fiat, &rates)
    }
}

/// Fetches rates from an HTTP ticker in the blockchain.info `ticker` format:
///
/// ```json
/// { "USD": { "15m": 64000.1, "last": 64000.1, "buy": 64000.1, "sell": 64000.1, "symbol": "$" } }
/// ```
#[derive(Debug, Clone)]
pub struct TickerRateSource {
    client: Client,
    url: String,
}

impl TickerRateSource {
    pub fn new(url: &str) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(TICKER_TIMEOUT).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    async fn fetch(&self) -> anyhow::Result<RateTable> {
        let response = self.client.get(&self.url).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("ticker returned HTTP {}", response.status());
        }
        Ok(response.json::<RateTable>().await?)
    }
}

#[async_trait]
impl RateSource for TickerRateSource {
    async fn fetch_rates(&self) -> Result<RateTable, ConversionError> {
        Ok(self.fetch().await?)
    }
}
