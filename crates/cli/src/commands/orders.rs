//! Order administration commands.
//!
//! Card orders flip to paid when the payment webhook arrives; these commands
//! cover the cases a shop owner handles by hand (cash collected, refunds,
//! a missed webhook).

use tracing::{info, warn};

use threadline_core::{OrderId, PaymentMethod};
use threadline_storefront::db::{self, OrderFilter, OrderRepository};
use threadline_storefront::models::Order;
use threadline_storefront::models::order::order_total;

use super::database_url;

/// List orders newest first.
///
/// # Errors
///
/// Returns an error if the database URL is missing or the query fails.
pub async fn list(
    paid: Option<bool>,
    payment_method: Option<PaymentMethod>,
    search: Option<String>,
    limit: i64,
) -> Result<(), Box<dyn std::error::Error>> {
    let pool = db::create_pool(&database_url()?).await?;
    let filter = OrderFilter {
        paid,
        payment_method,
        search: search.filter(|s| !s.trim().is_empty()),
        limit: limit.max(1),
    };

    let orders = OrderRepository::new(&pool).list(&filter).await?;
    if orders.is_empty() {
        info!("No orders found");
        return Ok(());
    }

    info!(
        "{:>6}  {:<16}  {:<24}  {:<15}  {:<4}  {:>5}  {:>10}  paid",
        "id", "placed", "customer", "mobile", "via", "items", "total"
    );
    for summary in &orders {
        let o = &summary.order;
        info!(
            "{:>6}  {:<16}  {:<24}  {:<15}  {:<4}  {:>5}  {:>10}  {}",
            o.id,
            o.created_at.format("%Y-%m-%d %H:%M"),
            truncate(&o.customer_name, 24),
            o.mobile,
            o.payment_method.code(),
            summary.item_count,
            summary.total,
            if o.paid { "yes" } else { "no" },
        );
    }
    info!("{} order(s)", orders.len());

    Ok(())
}

/// Show one order with its line items.
///
/// # Errors
///
/// Returns an error if the database URL is missing, the order does not
/// exist, or a query fails.
pub async fn show(id: i32) -> Result<(), Box<dyn std::error::Error>> {
    let pool = db::create_pool(&database_url()?).await?;
    let repo = OrderRepository::new(&pool);
    let id = OrderId::new(id);

    let order = repo.get(id).await?.ok_or_else(|| format!("Order {id} not found"))?;
    let items = repo.items(id).await?;

    log_order(&order);
    for item in &items {
        info!(
            "  {} x {} ({}) @ {} = {}",
            item.qty,
            item.product_title,
            item.size,
            item.price,
            item.cost(),
        );
    }
    info!("  Total: {}", order_total(&items));

    Ok(())
}

fn log_order(order: &Order) {
    info!(
        "Order #{} placed {}",
        order.id,
        order.created_at.format("%Y-%m-%d %H:%M UTC")
    );
    info!(
        "  Customer: {} <{}>",
        order.customer_name,
        order.email.as_deref().unwrap_or("-")
    );
    info!("  Mobile:   {}", order.mobile);
    info!("  Address:  {}", order.address);
    let paid = if order.paid { "paid" } else { "unpaid" };
    info!("  Payment:  {} ({paid})", order.payment_method.label());
    if let Some(intent) = &order.payment_intent_id {
        info!("  Intent:   {intent}");
    }
}

/// Set the paid flag on the given orders.
///
/// # Errors
///
/// Returns an error if the database URL is missing or the update fails.
pub async fn set_paid(ids: &[i32], paid: bool) -> Result<(), Box<dyn std::error::Error>> {
    let pool = db::create_pool(&database_url()?).await?;
    let ids: Vec<OrderId> = ids.iter().copied().map(OrderId::new).collect();

    let updated = OrderRepository::new(&pool).set_paid(&ids, paid).await?;
    let state = if paid { "paid" } else { "unpaid" };
    info!(updated, "Marked order(s) {state}");

    let requested = u64::try_from(ids.len()).unwrap_or(u64::MAX);
    let missing = requested.saturating_sub(updated);
    if missing > 0 {
        warn!(missing, "Some order ids did not match any order");
    }

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Asha", 24), "Asha");
        assert_eq!(truncate("abcdef", 4), "abc…");
        assert_eq!(truncate("ébène", 5), "ébène");
    }
}
