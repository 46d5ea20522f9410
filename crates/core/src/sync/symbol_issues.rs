use fintech_market_data::ProviderError;
use serde::Serialize;

/// Symbols that failed pricing with a user-visible cause.
///
/// Inserts are idempotent. The lists survive price-only cycles and are
/// cleared only when a full holdings sync starts, so a symbol that recovers
/// stays listed until then.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolIssues {
    invalid_symbols: Vec<String>,
    rate_limited_symbols: Vec<String>,
}

impl SymbolIssues {
    pub fn new(invalid_symbols: Vec<String>, rate_limited_symbols: Vec<String>) -> Self {
        let mut issues = Self::default();
        for symbol in invalid_symbols {
            push_unique(&mut issues.invalid_symbols, symbol);
        }
        for symbol in rate_limited_symbols {
            push_unique(&mut issues.rate_limited_symbols, symbol);
        }
        issues
    }

    /// Records `symbol` if the error is one the user is warned about.
    ///
    /// Returns `true` when a list changed.
    pub fn record(&mut self, symbol: &str, error: &ProviderError) -> bool {
        if error.is_invalid_symbol() {
            push_unique(&mut self.invalid_symbols, symbol.to_string())
        } else if error.is_rate_limited() {
            push_unique(&mut self.rate_limited_symbols, symbol.to_string())
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.invalid_symbols.clear();
        self.rate_limited_symbols.clear();
    }

    pub fn invalid_symbols(&self) -> &[String] {
        &self.invalid_symbols
    }

    pub fn rate_limited_symbols(&self) -> &[String] {
        &self.rate_limited_symbols
    }
}

fn push_unique(list: &mut Vec<String>, symbol: String) -> bool {
    if list.contains(&symbol) {
        false
    } else {
        list.push(symbol);
        true
    }
}
