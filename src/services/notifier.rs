use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::models::{Escalation, Trade};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
        }
    }
}

/// Recipient id for desk-wide alerts that no single operator owns.
pub const DESK_ALERTS: Uuid = Uuid::nil();

/// Outbound operator notifications. Implementations swallow and log their
/// own failures: a notification never undoes the state change it reports.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, operator_id: Uuid, title: &str, description: &str, priority: Priority);
}

/// Telegram notification service. Failures are logged but never block the main flow.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    http: reqwest::Client,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            bot_token,
            chat_id,
        }
    }

    /// Send a Telegram message. Failures are logged as warnings.
    pub async fn send(&self, message: &str) {
        let url = format!(
            "https://api.telegram.org/bot{}/sendMessage",
            self.bot_token
        );

        let body = json!({
            "chat_id": self.chat_id,
            "text": message,
            "parse_mode": "Markdown",
        });

        match self.http.post(&url).json(&body).send().await {
            Ok(resp) => {
                if !resp.status().is_success() {
                    tracing::warn!(
                        status = %resp.status(),
                        "Telegram sendMessage returned non-2xx"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to send Telegram notification");
            }
        }
    }
}

#[async_trait]
impl NotificationSink for TelegramNotifier {
    async fn notify(&self, operator_id: Uuid, title: &str, description: &str, priority: Priority) {
        let marker = if priority == Priority::High { "[!] " } else { "" };
        let message = format!(
            "{marker}*{title}*\n{description}\nOperator: `{operator_id}`"
        );
        self.send(&message).await;
    }
}

/// Sink used when notifications are disabled.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

#[async_trait]
impl NotificationSink for NoopNotifier {
    async fn notify(&self, operator_id: Uuid, title: &str, _description: &str, priority: Priority) {
        tracing::debug!(
            operator_id = %operator_id,
            title,
            priority = priority.as_str(),
            "Notification suppressed"
        );
    }
}

/// Body of the "new trade assigned" notification.
pub fn format_assignment(trade: &Trade) -> String {
    format!(
        "Trade `{}` on {}\nAmount: {} {}\nCounterparty: {}",
        trade.trade_hash,
        trade.platform,
        trade
            .amount
            .map(|a| a.round_dp(2).to_string())
            .unwrap_or_else(|| "?".into()),
        trade.fiat_currency.as_deref().unwrap_or(""),
        trade.counterparty.as_deref().unwrap_or("unknown"),
    )
}

/// Body of the dispute alert sent to admins.
pub fn format_escalation(escalation: &Escalation) -> String {
    format!(
        "*Dispute Escalated*\nTrade: `{}`\nPlatform: {}\nAmount: {}\nReason: {}",
        escalation.trade_hash,
        escalation.platform,
        escalation
            .amount
            .map(|a| a.round_dp(2).to_string())
            .unwrap_or_else(|| "?".into()),
        escalation.reason,
    )
}

/// Tell the desk about a fresh escalation.
pub async fn alert_escalation(notifier: &dyn NotificationSink, escalation: &Escalation) {
    notifier
        .notify(
            DESK_ALERTS,
            "Dispute escalated",
            &format_escalation(escalation),
            Priority::High,
        )
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewTrade, Platform};
    use chrono::Utc;
    use rust_decimal::Decimal;

    #[test]
    fn test_format_assignment() {
        let trade = Trade::from_projection(
            NewTrade {
                trade_hash: "h42".into(),
                platform: Platform::Paxful,
                account_id: Uuid::new_v4(),
                trade_status: None,
                amount: Some(Decimal::new(1234567, 2)),
                fiat_currency: Some("GHS".into()),
                crypto_currency: None,
                crypto_amount_requested: None,
                crypto_amount_total: None,
                fee_amount: None,
                fee_percentage: None,
                btc_rate: Decimal::ZERO,
                dollar_rate: Decimal::ZERO,
                btc_amount: None,
                payment_method: None,
                counterparty: None,
                activity_log: vec![],
                platform_metadata: serde_json::Value::Null,
            },
            Utc::now(),
        );
        let msg = format_assignment(&trade);
        assert!(msg.contains("`h42` on paxful"));
        assert!(msg.contains("12345.67 GHS"));
        assert!(msg.contains("unknown"));
    }
}
