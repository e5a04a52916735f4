use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::api::envelope::{probe, probe_list, probe_str};
use crate::api::ApiClient;
use crate::error::{AppError, AppResult};
use crate::notify::ToastQueue;
use crate::schemas::{de_lenient_f64, numeric_value};
use crate::session::Role;

const BILLS_PATH: &str = "/api/tenant/rent/bills";
const CREATE_ORDER_PATH: &str = "/api/tenant/payments/create-order";
const VERIFY_PATH: &str = "/api/tenant/payments/verify";
const AMOUNT_EPSILON: f64 = 0.005;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum BillStatus {
    #[default]
    Pending,
    Partial,
    Paid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RentBill {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(deserialize_with = "de_lenient_f64")]
    pub amount: f64,
    #[serde(alias = "balanceAmount", alias = "balance", deserialize_with = "de_lenient_f64")]
    pub balance_amount: f64,
    #[serde(default)]
    pub status: BillStatus,
    #[serde(default, alias = "dueDate")]
    pub due_date: Option<String>,
    #[serde(default, rename = "type", alias = "billType")]
    pub bill_type: Option<String>,
    #[serde(default, alias = "paymentId")]
    pub payment_id: Option<String>,
}

/// Order issued by the server for the gateway to collect.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentOrder {
    pub order_id: String,
    /// Amount in the smallest currency unit, as the gateway expects it.
    pub amount_minor: u64,
    pub currency: String,
    pub gateway_key: Option<String>,
    pub bill_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayReceipt {
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutOutcome {
    Completed(GatewayReceipt),
    Cancelled,
}

/// The external payment SDK that collects money for an order.
#[async_trait]
pub trait CheckoutGateway: Send + Sync {
    async fn checkout(&self, order: &PaymentOrder) -> AppResult<CheckoutOutcome>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum PaymentResult {
    Paid { payment_id: String },
    Cancelled,
}

pub struct RentLedger {
    api: ApiClient,
    pub bills: Vec<RentBill>,
    pub toasts: ToastQueue,
}

impl RentLedger {
    pub fn new(api: ApiClient, toasts: ToastQueue) -> Self {
        Self {
            api: api.with_role(Role::Tenant),
            bills: Vec::new(),
            toasts,
        }
    }

    pub fn outstanding(&self) -> f64 {
        self.bills.iter().map(|bill| bill.balance_amount).sum()
    }

    pub async fn load_bills(&mut self) -> AppResult<()> {
        match self.api.get(BILLS_PATH).await {
            Ok(body) => {
                self.bills = probe_list(&body, &["data.bills", "bills", "data"]);
                Ok(())
            }
            Err(error) => {
                self.toasts.failure(&error);
                Err(error)
            }
        }
    }

    fn check_amount(&self, bill_id: &str, amount: f64) -> AppResult<()> {
        let bill = self
            .bills
            .iter()
            .find(|bill| bill.id == bill_id)
            .ok_or_else(|| AppError::NotFound("Bill not found".to_string()))?;
        if bill.status == BillStatus::Paid || bill.balance_amount <= 0.0 {
            return Err(AppError::Conflict("This bill is already paid".to_string()));
        }
        if !amount.is_finite() || amount <= 0.0 {
            return Err(AppError::Validation("Enter an amount greater than 0".to_string()));
        }
        if amount > bill.balance_amount + AMOUNT_EPSILON {
            return Err(AppError::Validation(format!(
                "Amount cannot exceed the balance of {:.2}",
                bill.balance_amount
            )));
        }
        Ok(())
    }

    /// Creates an order, hands it to `gateway` and verifies the result.
    pub async fn pay(
        &mut self,
        bill_id: &str,
        amount: f64,
        gateway: &dyn CheckoutGateway,
    ) -> AppResult<PaymentResult> {
        if let Err(error) = self.check_amount(bill_id, amount) {
            self.toasts.failure(&error);
            return Err(error);
        }

        let order = match self.create_order(bill_id, amount).await {
            Ok(order) => order,
            Err(error) => {
                self.toasts.failure(&error);
                return Err(error);
            }
        };

        let receipt = match gateway.checkout(&order).await {
            Ok(CheckoutOutcome::Completed(receipt)) => receipt,
            Ok(CheckoutOutcome::Cancelled) => {
                tracing::info!(order_id = %order.order_id, "Checkout cancelled");
                self.toasts.info("Payment cancelled");
                return Ok(PaymentResult::Cancelled);
            }
            Err(error) => {
                tracing::error!(error = %error, order_id = %order.order_id, "Checkout failed");
                self.toasts.failure(&error);
                return Err(error);
            }
        };

        let verified = self
            .api
            .post_json(
                VERIFY_PATH,
                json!({
                    "billId": bill_id,
                    "orderId": receipt.order_id,
                    "paymentId": receipt.payment_id,
                    "signature": receipt.signature,
                }),
            )
            .await;
        if let Err(error) = verified {
            tracing::error!(error = %error, payment_id = %receipt.payment_id, "Payment verification failed");
            self.toasts.failure(&error);
            return Err(error);
        }

        self.toasts.success("Payment successful");
        if let Err(error) = self.load_bills().await {
            tracing::warn!(error = %error, "Could not refresh bills after payment");
        }
        Ok(PaymentResult::Paid {
            payment_id: receipt.payment_id,
        })
    }

    async fn create_order(&self, bill_id: &str, amount: f64) -> AppResult<PaymentOrder> {
        let body = self
            .api
            .post_json(CREATE_ORDER_PATH, json!({ "billId": bill_id, "amount": amount }))
            .await?;
        let order_id = probe_str(&body, &["data.orderId", "data.order.id", "orderId", "order.id", "data.id"])
            .ok_or_else(|| AppError::Dependency("Payment order was not created".to_string()))?;
        // Gateways take paise. Only the order object carries paise; a bare
        // `data.amount` is the rupee amount echoed back.
        let amount_minor = probe(&body, &["data.order.amount", "order.amount"])
            .and_then(numeric_value)
            .unwrap_or(amount * 100.0)
            .round() as u64;
        Ok(PaymentOrder {
            order_id,
            amount_minor,
            currency: probe_str(&body, &["data.order.currency", "order.currency", "data.currency"])
                .unwrap_or_else(|| "INR".to_string()),
            gateway_key: probe_str(&body, &["data.key", "key", "data.keyId"]),
            bill_id: bill_id.to_string(),
        })
    }

    /// Asks the server to produce a receipt and returns its URL when given.
    pub async fn generate_receipt(&mut self, payment_id: &str) -> AppResult<Option<String>> {
        match self
            .api
            .post_json(&format!("/api/tenant/payments/{payment_id}/receipt"), json!({}))
            .await
        {
            Ok(body) => {
                self.toasts.success("Receipt generated");
                Ok(probe_str(&body, &["data.receiptUrl", "receiptUrl", "data.url", "url"]))
            }
            Err(error) => {
                self.toasts.failure(&error);
                Err(error)
            }
        }
    }

    pub async fn download_receipt(&mut self, payment_id: &str, path: &Path) -> AppResult<usize> {
        let bytes = match self
            .api
            .download(&format!("/api/tenant/payments/{payment_id}/receipt/download"))
            .await
        {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => {
                let error = AppError::Dependency("Receipt file is empty".to_string());
                self.toasts.failure(&error);
                return Err(error);
            }
            Err(error) => {
                self.toasts.failure(&error);
                return Err(error);
            }
        };
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, &bytes).await?;
        tracing::info!(payment_id, path = %path.display(), size = bytes.len(), "Receipt saved");
        Ok(bytes.len())
    }
}
