//! Which cart lines go into the next checkout.
//!
//! The checkout screen opens with every line selected. The shopper can
//! untick lines; only selected lines are snapshotted for the order.

use rust_decimal::Decimal;

use subasa_core::{CartLine, LineKey};

/// A cart line with its checkbox state.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectableLine {
    pub line: CartLine,
    pub selected: bool,
}

/// Checkbox state over a copy of the cart lines.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckoutSelection {
    items: Vec<SelectableLine>,
}

impl CheckoutSelection {
    /// Every line selected.
    #[must_use]
    pub fn new(lines: &[CartLine]) -> Self {
        Self {
            items: lines
                .iter()
                .cloned()
                .map(|line| SelectableLine {
                    line,
                    selected: true,
                })
                .collect(),
        }
    }

    /// Follow a cart change. Lines still present keep their checkbox; new
    /// lines start selected; removed lines disappear.
    pub fn sync(&mut self, lines: &[CartLine]) {
        let items = lines
            .iter()
            .cloned()
            .map(|line| {
                let selected = self
                    .items
                    .iter()
                    .find(|i| i.line.line_key == line.line_key)
                    .is_none_or(|i| i.selected);
                SelectableLine { line, selected }
            })
            .collect();
        self.items = items;
    }

    #[must_use]
    pub fn items(&self) -> &[SelectableLine] {
        &self.items
    }

    /// Flip one checkbox. Returns the new state, or `None` for an unknown key.
    pub fn toggle(&mut self, key: &LineKey) -> Option<bool> {
        let item = self.items.iter_mut().find(|i| &i.line.line_key == key)?;
        item.selected = !item.selected;
        Some(item.selected)
    }

    /// Set one checkbox. Returns whether the key was found.
    pub fn set_selected(&mut self, key: &LineKey, selected: bool) -> bool {
        self.items
            .iter_mut()
            .find(|i| &i.line.line_key == key)
            .map(|i| i.selected = selected)
            .is_some()
    }

    pub fn select_all(&mut self, selected: bool) {
        for item in &mut self.items {
            item.selected = selected;
        }
    }

    /// Immutable copy of the selected lines.
    #[must_use]
    pub fn selected_lines(&self) -> Vec<CartLine> {
        self.items
            .iter()
            .filter(|i| i.selected)
            .map(|i| i.line.clone())
            .collect()
    }

    #[must_use]
    pub fn has_selection(&self) -> bool {
        self.items.iter().any(|i| i.selected)
    }

    /// Sum of `sale_price × quantity` over selected lines.
    #[must_use]
    pub fn selected_total(&self) -> Decimal {
        self.items
            .iter()
            .filter(|i| i.selected)
            .map(|i| i.line.subtotal())
            .sum()
    }
}
