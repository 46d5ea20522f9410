use std::collections::HashMap;

use fintech_market_data::RawHolding;
use rust_decimal::Decimal;

use super::position::Position;

/// Combines holdings from every source into one position per
/// `(symbol, asset_type)`.
///
/// Quantities, cost bases and open P&L sum; source tags concatenate in order
/// of first appearance, duplicates included. When any record tracks cost,
/// `avg_purchase_price` is recomputed as total cost / total quantity (0 for a
/// zero quantity). Zero-quantity results are kept; output order follows the
/// first appearance of each key.
pub fn merge_holdings(holdings: impl IntoIterator<Item = RawHolding>) -> Vec<Position> {
    let mut positions: Vec<Position> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut cost_tracked: Vec<bool> = Vec::new();

    for holding in holdings {
        let key = holding.merge_key();
        let slot = match index.get(&key) {
            Some(&i) => i,
            None => {
                positions.push(Position::new(
                    holding.symbol.clone(),
                    holding.asset_type,
                    Decimal::ZERO,
                ));
                cost_tracked.push(false);
                index.insert(key, positions.len() - 1);
                positions.len() - 1
            }
        };

        let position = &mut positions[slot];
        position.quantity += holding.quantity;
        position.cost_basis += holding.cost_basis.unwrap_or_default();
        position.open_pnl += holding.open_pnl.unwrap_or_default();
        position.sources.push(holding.source);
        if holding.cost_basis.is_some() || holding.avg_purchase_price.is_some() {
            cost_tracked[slot] = true;
        }
    }

    for (position, tracked) in positions.iter_mut().zip(cost_tracked) {
        if tracked {
            position.avg_purchase_price = Some(if position.quantity.is_zero() {
                Decimal::ZERO
            } else {
                position.cost_basis / position.quantity
            });
        }
    }

    positions
}
