use std::collections::HashSet;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::NotificationError;
use crate::evaluator::Decision;

#[derive(Debug, Clone, PartialEq)]
pub struct AlertRequest {
    pub id: i64,
    pub price: f64,
}

/// Delivers a user-facing alert. Delivery is fire-and-forget.
pub trait Notifier {
    fn alert(&self, title: &str, description: &str) -> Result<(), NotificationError>;
}

/// Select the decisions worth an alert: matching, at or under `price_ceiling`,
/// and not yet in `seen_ids`. Alerted ids are added to `seen_ids`, so the
/// same set threaded through later cycles suppresses repeats. Output keeps
/// input order.
pub fn process(
    decisions: &[Decision],
    price_ceiling: f64,
    seen_ids: &mut HashSet<i64>,
) -> Vec<AlertRequest> {
    decisions
        .iter()
        .filter(|d| d.matches && d.price <= price_ceiling)
        .filter(|d| seen_ids.insert(d.id))
        .map(|d| AlertRequest {
            id: d.id,
            price: d.price,
        })
        .collect()
}

/// Send each alert with the ad id as title and the price as description,
/// pausing between alerts. Returns how many were delivered.
pub fn deliver(alerts: &[AlertRequest], notifier: &dyn Notifier, pause: Duration) -> usize {
    let mut delivered = 0;
    for (i, alert) in alerts.iter().enumerate() {
        if i > 0 && !pause.is_zero() {
            thread::sleep(pause);
        }
        let title = alert.id.to_string();
        let description = format_price(alert.price);
        match notifier.alert(&title, &description) {
            Ok(()) => {
                info!("Alerted ad {} at {}", alert.id, description);
                delivered += 1;
            }
            Err(e) => warn!("Could not alert ad {}: {}", alert.id, e),
        }
    }
    delivered
}

fn format_price(price: f64) -> String {
    format!("${:.2}", price)
}
