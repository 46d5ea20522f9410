use fintech_market_data::{AssetType, PriceQuote};
use rust_decimal::Decimal;

use super::position::Position;
use crate::config::SortOrder;

/// Recomputes `value` and `gain_loss_percent` from quantity, price and cost.
pub fn revalue(position: &mut Position) {
    position.value = position.quantity * position.price;
    position.gain_loss_percent = gain_loss_percent(position.value, position.cost_basis);
}

/// Attaches a quote, scaled into the display currency.
pub fn apply_quote(position: &mut Position, quote: &PriceQuote, conversion_rate: Decimal) {
    position.price = quote.price * conversion_rate;
    position.change_24h = quote.change_24h;
    revalue(position);
}

/// Clears the price after a failed fetch.
pub fn clear_price(position: &mut Position) {
    position.price = Decimal::ZERO;
    position.change_24h = Decimal::ZERO;
    revalue(position);
}

/// `(value - cost) / cost * 100`, only defined for a positive cost basis.
pub fn gain_loss_percent(value: Decimal, cost_basis: Decimal) -> Option<Decimal> {
    if cost_basis > Decimal::ZERO {
        Some((value - cost_basis) / cost_basis * Decimal::ONE_HUNDRED)
    } else {
        None
    }
}

/// Portfolio-level aggregates.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PortfolioTotals {
    pub total_value: Decimal,
    pub total_cost_basis: Decimal,
    /// Gain over cost for the positions that carry a cost basis
    pub total_gain_loss_percent: Option<Decimal>,
    pub crypto_value: Decimal,
    /// Everything that is not crypto, cash included
    pub traditional_value: Decimal,
}

pub fn compute_totals(positions: &[Position]) -> PortfolioTotals {
    let mut totals = PortfolioTotals::default();
    let mut costed_value = Decimal::ZERO;

    for position in positions {
        totals.total_value += position.value;
        if position.asset_type == AssetType::Crypto {
            totals.crypto_value += position.value;
        }
        if position.has_cost_basis() {
            totals.total_cost_basis += position.cost_basis;
            costed_value += position.value;
        }
    }

    totals.traditional_value = totals.total_value - totals.crypto_value;
    totals.total_gain_loss_percent = gain_loss_percent(costed_value, totals.total_cost_basis);
    totals
}

/// Orders holdings for presentation.
pub fn sort_positions(positions: &mut [Position], order: SortOrder) {
    match order {
        SortOrder::Value => positions.sort_by(|a, b| b.value.cmp(&a.value)),
        SortOrder::Name => positions.sort_by(|a, b| {
            a.symbol
                .to_ascii_uppercase()
                .cmp(&b.symbol.to_ascii_uppercase())
        }),
        SortOrder::Change => positions.sort_by(|a, b| b.change_24h.cmp(&a.change_24h)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn priced(symbol: &str, asset_type: AssetType, qty: Decimal, price: Decimal, cost: Decimal) -> Position {
        let mut p = Position::new(symbol, asset_type, qty);
        p.cost_basis = cost;
        p.price = price;
        revalue(&mut p);
        p
    }

    #[test]
    fn test_gain_loss_only_with_positive_cost() {
        let p = priced("AAPL", AssetType::Stock, dec!(1), dec!(150), dec!(100));
        assert_eq!(p.value, dec!(150));
        assert_eq!(p.gain_loss_percent, Some(dec!(50)));

        let p = priced("BTC", AssetType::Crypto, dec!(1), dec!(150), Decimal::ZERO);
        assert_eq!(p.gain_loss_percent, None);
    }

    #[test]
    fn test_apply_quote_converts_price() {
        let mut p = Position::new("MSFT", AssetType::Stock, dec!(2));
        apply_quote(&mut p, &PriceQuote::new(dec!(100), dec!(1.5)), dec!(0.9));
        assert_eq!(p.price, dec!(90));
        assert_eq!(p.value, dec!(180));
        assert_eq!(p.change_24h, dec!(1.5));

        clear_price(&mut p);
        assert_eq!((p.price, p.value, p.change_24h), (dec!(0), dec!(0), dec!(0)));
    }

    #[test]
    fn test_totals_split_crypto_and_traditional() {
        let positions = vec![
            priced("BTC", AssetType::Crypto, dec!(1), dec!(100), dec!(50)),
            priced("VTI", AssetType::Etf, dec!(2), dec!(100), dec!(250)),
            priced("USD", AssetType::Cash, dec!(300), dec!(1), Decimal::ZERO),
        ];
        let totals = compute_totals(&positions);
        assert_eq!(totals.total_value, dec!(600));
        assert_eq!(totals.crypto_value, dec!(100));
        assert_eq!(totals.traditional_value, dec!(500));
        assert_eq!(totals.total_cost_basis, dec!(300));
        // (100 + 200 - 300) / 300
        assert_eq!(totals.total_gain_loss_percent, Some(dec!(0)));

        assert_eq!(compute_totals(&[]).total_gain_loss_percent, None);
    }

    #[test]
    fn test_sort_orders() {
        let mut positions = vec![
            priced("b", AssetType::Stock, dec!(1), dec!(10), dec!(0)),
            priced("A", AssetType::Stock, dec!(1), dec!(30), dec!(0)),
            priced("C", AssetType::Stock, dec!(1), dec!(20), dec!(0)),
        ];
        positions[0].change_24h = dec!(5);
        positions[1].change_24h = dec!(-1);
        positions[2].change_24h = dec!(2);

        sort_positions(&mut positions, SortOrder::Value);
        assert_eq!(symbols(&positions), vec!["A", "C", "b"]);
        sort_positions(&mut positions, SortOrder::Name);
        assert_eq!(symbols(&positions), vec!["A", "b", "C"]);
        sort_positions(&mut positions, SortOrder::Change);
        assert_eq!(symbols(&positions), vec!["b", "C", "A"]);
    }

    fn symbols(positions: &[Position]) -> Vec<&str> {
        positions.iter().map(|p| p.symbol.as_str()).collect()
    }
}
