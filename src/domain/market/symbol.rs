//! Symbol normalization between exchange, application and file-system forms.

/// Supported quote currencies for crypto pairs, ordered by priority (longest first to prefer USDT over USD)
const CRYPTO_QUOTE_CURRENCIES: &[&str] = &[
    "USDT", "USDC", "BUSD", "TUSD", // Stablecoins (4 chars)
    "USD", "EUR", "GBP", "BTC", "ETH", // Traditional (3 chars)
];

/// Normalizes a crypto symbol to the application "BASE/QUOTE" form.
///
/// Accepts exchange form ("BTCUSDT"), dashed form ("BTC-USD", as used by
/// Yahoo exports and file stems) and already-normalized symbols.
///
/// # Examples
/// ```
/// use cryptocast::domain::market::symbol::normalize_crypto_symbol;
///
/// assert_eq!(normalize_crypto_symbol("BTCUSDT").unwrap(), "BTC/USDT");
/// assert_eq!(normalize_crypto_symbol("ETH-USD").unwrap(), "ETH/USD");
/// assert_eq!(normalize_crypto_symbol("SOL/USDT").unwrap(), "SOL/USDT");
/// ```
pub fn normalize_crypto_symbol(symbol: &str) -> Result<String, String> {
    if symbol.contains('/') {
        return Ok(symbol.to_string());
    }

    if symbol.is_empty() {
        return Err("Cannot normalize empty symbol".to_string());
    }

    if let Some((base, quote)) = symbol.split_once('-') {
        if !base.is_empty() && !quote.is_empty() {
            return Ok(format!("{}/{}", base, quote));
        }
        return Err(format!("Cannot normalize crypto symbol: '{}'", symbol));
    }

    for quote in CRYPTO_QUOTE_CURRENCIES {
        if symbol.ends_with(quote) && symbol.len() > quote.len() {
            let base = &symbol[..symbol.len() - quote.len()];
            if !base.is_empty() && base.chars().all(|c| c.is_ascii_uppercase()) {
                return Ok(format!("{}/{}", base, quote));
            }
        }
    }

    Err(format!(
        "Cannot normalize crypto symbol: '{}' - no recognized quote currency",
        symbol
    ))
}

/// Exchange form used by the Binance REST API ("BTC/USDT" -> "BTCUSDT").
pub fn denormalize_crypto_symbol(symbol: &str) -> String {
    symbol.replace(['/', '-'], "")
}

/// File-system safe stem for per-symbol files ("BTC/USDT" -> "BTC-USDT").
pub fn file_stem(symbol: &str) -> String {
    symbol.replace('/', "-")
}
