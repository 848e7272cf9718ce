//! Splitting a checkout into one order per seller.

use chrono::{DateTime, Utc};

use subasa_core::{CartLine, CustomerInfo, Order, PaymentMethod, UserId};

/// Lines sold by one seller, in cart order.
#[derive(Debug, Clone, PartialEq)]
pub struct SellerGroup<'a> {
    pub seller: &'a str,
    pub lines: Vec<&'a CartLine>,
}

/// Group lines by seller (`"unknown"` for lines without one). Groups appear
/// in the order their seller first appears in `lines`.
#[must_use]
pub fn group_by_seller(lines: &[CartLine]) -> Vec<SellerGroup<'_>> {
    let mut groups: Vec<SellerGroup<'_>> = Vec::new();
    for line in lines {
        let seller = line.seller();
        match groups.iter_mut().find(|g| g.seller == seller) {
            Some(group) => group.lines.push(line),
            None => groups.push(SellerGroup {
                seller,
                lines: vec![line],
            }),
        }
    }
    groups
}

/// The `pending` orders for a checkout, one per seller group.
#[must_use]
pub fn build_orders(
    base_order_id: &str,
    lines: &[CartLine],
    customer: &CustomerInfo,
    user_id: Option<&UserId>,
    payment_method: PaymentMethod,
    created_at: DateTime<Utc>,
) -> Vec<Order> {
    group_by_seller(lines)
        .into_iter()
        .map(|group| {
            Order::for_seller(
                base_order_id,
                group.seller,
                group.lines,
                customer,
                user_id,
                payment_method,
                created_at,
            )
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use serde_json::json;
    use subasa_core::Product;

    fn line(id: &str, owner: Option<&str>, price: u32, qty: u32) -> CartLine {
        let mut doc = json!({ "id": id, "productName": id, "price": price, "quantity": 10 });
        if let Some(owner) = owner {
            doc["ownerEmail"] = json!(owner);
        }
        let product: Product = serde_json::from_value(doc).unwrap();
        CartLine::new(product, "", "", qty)
    }

    #[test]
    fn test_groups_by_seller_in_first_seen_order() {
        let lines = [
            line("a", Some("s2@x.vn"), 10, 1),
            line("b", Some("s1@x.vn"), 10, 1),
            line("c", Some("s2@x.vn"), 10, 1),
            line("d", None, 10, 1),
        ];
        let groups = group_by_seller(&lines);
        let sellers: Vec<&str> = groups.iter().map(|g| g.seller).collect();
        assert_eq!(sellers, vec!["s2@x.vn", "s1@x.vn", "unknown"]);
        assert_eq!(groups[0].lines.len(), 2);
    }

    #[test]
    fn test_one_order_per_seller_with_own_totals() {
        let lines = [
            line("a", Some("s1@x.vn"), 100, 2),
            line("b", Some("s2@x.vn"), 50, 1),
        ];
        let orders = build_orders(
            "ORDER1700000000000",
            &lines,
            &CustomerInfo::new("An", "090", "HCM"),
            None,
            PaymentMethod::Cod,
            Utc::now(),
        );

        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].order_id.as_str(), "ORDER1700000000000-s1@x.vn");
        assert_eq!(orders[0].total_price, Decimal::from(200));
        assert_eq!(orders[1].order_id.as_str(), "ORDER1700000000000-s2@x.vn");
        assert_eq!(orders[1].total_price, Decimal::from(50));
        assert_eq!(orders[1].items.len(), 1);
    }
}
