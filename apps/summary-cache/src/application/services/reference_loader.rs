//! Reference Data Loader
//!
//! Builds [`ReferenceData`] from the exchange's symbol and currency
//! listings. The supported set keeps listing order, narrowed by an optional
//! allowlist.

use crate::application::ports::{QuoteSourceError, QuoteSourcePort};
use crate::domain::reference::ReferenceData;
use crate::domain::summary::Symbol;

/// Fetch both listings and build the reference tables.
///
/// An empty `allowlist` supports every listed symbol. Allowlisted symbols
/// the exchange does not list are logged and skipped.
///
/// # Errors
///
/// Returns the first listing error unchanged.
pub async fn load_reference_data(
    source: &dyn QuoteSourcePort,
    allowlist: Vec<Symbol>,
) -> Result<ReferenceData, QuoteSourceError> {
    let (symbols, currencies) =
        futures_util::future::try_join(source.list_symbols(), source.list_currencies()).await?;

    let mut builder = ReferenceData::builder();
    for listing in symbols {
        builder = builder.listed(listing.id, listing.fee_currency);
    }
    for currency in currencies {
        builder = builder.currency(currency.id, currency.full_name);
    }

    let narrowed = !allowlist.is_empty();
    let reference = builder.allowlist(allowlist.clone()).build();

    if narrowed {
        for symbol in allowlist.iter().filter(|s| !reference.is_listed(s)) {
            tracing::warn!(symbol = %symbol, "Allowlisted symbol is not listed, skipping");
        }
    }

    tracing::info!(
        listed = reference.listed_count(),
        supported = reference.supported_symbols().len(),
        "Reference data loaded"
    );
    Ok(reference)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{CurrencyListing, MockQuoteSourcePort, SymbolListing};

    fn listing(id: &str, fee: &str) -> SymbolListing {
        SymbolListing {
            id: id.to_string(),
            fee_currency: fee.to_string(),
        }
    }

    fn source() -> MockQuoteSourcePort {
        let mut source = MockQuoteSourcePort::new();
        source.expect_list_symbols().returning(|| {
            Ok(vec![
                listing("ETHBTC", "BTC"),
                listing("XRPBTC", "BTC"),
                listing("BTCUSD", "USD"),
            ])
        });
        source.expect_list_currencies().returning(|| {
            Ok(vec![CurrencyListing {
                id: "BTC".to_string(),
                full_name: "Bitcoin".to_string(),
            }])
        });
        source
    }

    #[tokio::test]
    async fn supports_every_listed_symbol_without_allowlist() {
        let reference = load_reference_data(&source(), Vec::new()).await.unwrap();

        assert_eq!(reference.supported_symbols(), ["ETHBTC", "XRPBTC", "BTCUSD"]);
        assert_eq!(reference.fee_currency("BTCUSD"), "USD");
        assert_eq!(reference.full_name("BTC"), "Bitcoin");
    }

    #[tokio::test]
    async fn allowlist_narrows_in_listing_order() {
        let allowlist = vec!["BTCUSD".to_string(), "ETHBTC".to_string(), "DOGEBTC".to_string()];

        let reference = load_reference_data(&source(), allowlist).await.unwrap();

        assert_eq!(reference.supported_symbols(), ["ETHBTC", "BTCUSD"]);
        assert!(reference.is_listed("XRPBTC"));
        assert!(!reference.is_supported("XRPBTC"));
    }

    #[tokio::test]
    async fn listing_failure_propagates() {
        let mut source = MockQuoteSourcePort::new();
        source
            .expect_list_symbols()
            .returning(|| Err(QuoteSourceError::Network("timeout".to_string())));
        source.expect_list_currencies().returning(|| Ok(Vec::new()));

        let err = load_reference_data(&source, Vec::new()).await.unwrap_err();

        assert_eq!(err, QuoteSourceError::Network("timeout".to_string()));
    }
}
