//! Convert an amount between units

use anyhow::Result;

use onchain_send::{
    config::SendConfig,
    conversion::{CachedRateConverter, ConversionService, TickerRateSource},
    units::{format_amount, CurrencyUnit},
};

use super::print_error;

/// Run the convert command
pub async fn run(
    config: &SendConfig,
    amount: f64,
    from: CurrencyUnit,
    to: Option<CurrencyUnit>,
) -> Result<()> {
    let converter = CachedRateConverter::with_ttl(
        TickerRateSource::new(&config.conversion.ticker_url)?,
        config.cache_ttl(),
    );
    let fiat = &config.conversion.fiat_unit;

    let conversion = match converter.convert(amount, from, fiat).await {
        Ok(conversion) => conversion,
        Err(e) => {
            print_error(&format!("Conversion failed: {}", e));
            return Ok(());
        }
    };

    let formats = &config.conversion.formats;
    let units = match to {
        Some(unit) => vec![unit],
        None => CurrencyUnit::ALL.to_vec(),
    };

    println!();
    for unit in units {
        let value = conversion.require(unit)?;
        let label = match unit {
            CurrencyUnit::Other if !conversion.symbol.is_empty() => {
                format!("{} ({})", fiat, conversion.symbol)
            }
            _ => unit.label(fiat).to_string(),
        };
        println!("  {:<12} {}", label, format_amount(value, formats.get(unit)));
    }

    Ok(())
}
