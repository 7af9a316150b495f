//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{OrderId, OrderNumber, ProductId, UserId};
use serde::{Deserialize, Serialize};

use super::{Money, OrderStatus, UnitPricing};
use crate::error::MoneyError;

/// One product/quantity request within an order.
///
/// `markup`, `discount` and `final_price` are derived from the pricing service
/// and always equal `quantity` times the per-unit value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LineItem {
    /// The product being ordered.
    pub product_id: ProductId,

    /// Requested quantity.
    pub quantity: u32,

    /// Markup for the whole line.
    #[serde(rename = "mark_up")]
    pub markup: Money,

    /// Discount for the whole line.
    pub discount: Money,

    /// Price of the whole line.
    pub final_price: Money,
}

impl LineItem {
    /// Creates an unpriced line item.
    pub fn new(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
            ..Self::default()
        }
    }

    /// Overwrites the derived amounts with `quantity` times the unit pricing.
    ///
    /// On overflow the line is left unchanged.
    pub fn apply_pricing(&mut self, unit: &UnitPricing) -> Result<(), MoneyError> {
        let final_price = unit.final_price.multiply(self.quantity)?;
        let markup = unit.markup.multiply(self.quantity)?;
        let discount = unit.discount.multiply(self.quantity)?;
        self.final_price = final_price;
        self.markup = markup;
        self.discount = discount;
        Ok(())
    }

    /// Recovers the per-unit pricing from the stored line amounts.
    ///
    /// Returns `None` for a zero-quantity line, which carries no price
    /// information.
    pub fn unit_pricing(&self) -> Option<UnitPricing> {
        Some(UnitPricing {
            final_price: self.final_price.per_unit(self.quantity)?,
            markup: self.markup.per_unit(self.quantity)?,
            discount: self.discount.per_unit(self.quantity)?,
        })
    }
}

/// Order aggregate root as persisted in the `orders` and `product_requests`
/// tables and published on change events.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Order {
    /// Storage identifier, assigned by the store on creation.
    pub id: OrderId,

    /// Routing key, assigned before persistence.
    pub order_number: OrderNumber,

    /// Owner of the order.
    pub user_id: UserId,

    /// Requested products, in submission order.
    #[serde(rename = "product_requests")]
    pub line_items: Vec<LineItem>,

    /// Sum of line quantities.
    pub quantity: u64,

    /// Sum of line final prices.
    pub total: Money,

    /// Sum of line markups.
    #[serde(rename = "total_mark_up")]
    pub total_markup: Money,

    /// Sum of line discounts.
    pub total_discount: Money,

    /// Current status. Absent on input means "unset" so that writers can
    /// fall back to their own default.
    #[serde(default = "OrderStatus::unset")]
    pub status: OrderStatus,

    /// Caller-supplied token used to reject duplicate submissions.
    #[serde(rename = "idempotent_key")]
    pub idempotency_key: String,

    /// When the order was first stored.
    pub created_at: Option<DateTime<Utc>>,

    /// When the order was last written.
    pub updated_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Creates a new order in the `created` status.
    ///
    /// Only the aggregate quantity is filled in; money totals stay zero until
    /// [`Order::recompute_totals`] runs on priced lines.
    pub fn new(
        user_id: UserId,
        line_items: Vec<LineItem>,
        idempotency_key: impl Into<String>,
    ) -> Self {
        let mut order = Self {
            user_id,
            line_items,
            idempotency_key: idempotency_key.into(),
            ..Self::default()
        };
        order.quantity = order.line_quantity();
        order
    }

    /// Recomputes every aggregate field from the line items.
    ///
    /// Aggregates are never taken from client input. On overflow the order is
    /// left unchanged.
    pub fn recompute_totals(&mut self) -> Result<(), MoneyError> {
        let total = Money::try_sum(self.line_items.iter().map(|i| i.final_price))?;
        let total_markup = Money::try_sum(self.line_items.iter().map(|i| i.markup))?;
        let total_discount = Money::try_sum(self.line_items.iter().map(|i| i.discount))?;
        self.quantity = self.line_quantity();
        self.total = total;
        self.total_markup = total_markup;
        self.total_discount = total_discount;
        Ok(())
    }

    fn line_quantity(&self) -> u64 {
        self.line_items.iter().map(|i| u64::from(i.quantity)).sum()
    }

    /// Returns true if the order has no line items.
    pub fn is_empty(&self) -> bool {
        self.line_items.is_empty()
    }

    /// Finds the first line item for a product.
    pub fn line_item(&self, product_id: ProductId) -> Option<&LineItem> {
        self.line_items.iter().find(|i| i.product_id == product_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pricing(final_cents: i64, markup_cents: i64, discount_cents: i64) -> UnitPricing {
        UnitPricing::new(
            Money::from_cents(final_cents),
            Money::from_cents(markup_cents),
            Money::from_cents(discount_cents),
        )
    }

    #[test]
    fn test_apply_pricing_scales_by_quantity() {
        let mut item = LineItem::new(ProductId::new(1), 3);
        item.apply_pricing(&pricing(1000, 200, 50)).unwrap();

        assert_eq!(item.final_price.cents(), 3000);
        assert_eq!(item.markup.cents(), 600);
        assert_eq!(item.discount.cents(), 150);
        assert_eq!(item.unit_pricing(), Some(pricing(1000, 200, 50)));
    }

    #[test]
    fn test_apply_pricing_overflow_leaves_line_unchanged() {
        let mut item = LineItem::new(ProductId::new(1), 1000);
        item.apply_pricing(&pricing(100, 0, 0)).unwrap();

        let result = item.apply_pricing(&pricing(1, 0, i64::MAX / 10));

        assert_eq!(result, Err(MoneyError::Overflow));
        assert_eq!(item.final_price.cents(), 100_000);
        assert!(item.discount.is_zero());
    }

    #[test]
    fn test_recompute_totals_overflow_is_an_error() {
        let mut first = LineItem::new(ProductId::new(1), 1);
        first.apply_pricing(&pricing(i64::MAX, 0, 0)).unwrap();
        let mut second = LineItem::new(ProductId::new(2), 1);
        second.apply_pricing(&pricing(1, 0, 0)).unwrap();
        let mut order = Order::new(UserId::new(1), vec![first, second], "key");

        assert_eq!(order.recompute_totals(), Err(MoneyError::Overflow));
        assert!(order.total.is_zero());
    }

    #[test]
    fn test_new_order_ignores_supplied_amounts() {
        let mut item = LineItem::new(ProductId::new(1), 2);
        item.final_price = Money::from_cents(i64::MAX);
        let order = Order::new(UserId::new(1), vec![item.clone(), item], "key");

        assert_eq!(order.quantity, 4);
        assert!(order.total.is_zero());
    }

    #[test]
    fn test_zero_quantity_has_no_unit_pricing() {
        let item = LineItem::new(ProductId::new(1), 0);
        assert!(item.unit_pricing().is_none());
    }

    #[test]
    fn test_recompute_totals_ignores_supplied_aggregates() {
        let mut first = LineItem::new(ProductId::new(1), 2);
        first.apply_pricing(&pricing(1000, 100, 0)).unwrap();
        let mut second = LineItem::new(ProductId::new(2), 1);
        second.apply_pricing(&pricing(2000, 0, 300)).unwrap();

        let mut order = Order::new(UserId::new(9), vec![first, second], "key-1");
        order.total = Money::from_cents(1);
        order.quantity = 99;
        order.recompute_totals().unwrap();

        assert_eq!(order.quantity, 3);
        assert_eq!(order.total, Money::from_major(40.0).unwrap());
        assert_eq!(order.total_markup.cents(), 200);
        assert_eq!(order.total_discount.cents(), 300);
    }

    #[test]
    fn test_empty_order_has_zero_total() {
        let order = Order::new(UserId::new(1), vec![], "key");
        assert!(order.is_empty());
        assert!(order.total.is_zero());
        assert_eq!(order.status, OrderStatus::Created);
    }

    #[test]
    fn test_wire_format_uses_service_field_names() {
        let mut item = LineItem::new(ProductId::new(5), 2);
        item.apply_pricing(&pricing(1000, 100, 50)).unwrap();
        let mut order = Order::new(UserId::new(7), vec![item], "abc");
        order.recompute_totals().unwrap();

        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["idempotent_key"], "abc");
        assert_eq!(json["status"], "created");
        assert_eq!(json["total"], 20.0);
        assert_eq!(json["total_mark_up"], 2.0);
        assert_eq!(json["product_requests"][0]["product_id"], 5);
        assert_eq!(json["product_requests"][0]["mark_up"], 2.0);
    }

    #[test]
    fn test_deserializes_partial_request_body() {
        let order: Order = serde_json::from_value(serde_json::json!({
            "user_id": 3,
            "idempotent_key": "k",
            "product_requests": [{"product_id": 1, "quantity": 2}]
        }))
        .unwrap();

        assert_eq!(order.user_id, UserId::new(3));
        assert_eq!(order.line_items.len(), 1);
        assert!(order.line_items[0].final_price.is_zero());
        assert!(order.status.is_unset());
    }
}
