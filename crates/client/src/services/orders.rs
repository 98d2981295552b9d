//! Paid shop orders and their invoices.

use jdp_core::{Invoice, InvoiceStatus, OrderId};
use serde_json::Value;
use tracing::instrument;

use super::error::define_service_error;
use super::{check_rejection, wire};
use crate::http::ApiRequest;
use crate::source::SharedSource;

define_service_error!(OrderError, "order");

/// Invoice endpoint (`/fetchPaidInvoicePerOrder`).
#[derive(Clone)]
pub struct OrderService {
    source: SharedSource,
}

impl std::fmt::Debug for OrderService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderService")
            .field("source", &self.source.label())
            .finish()
    }
}

impl OrderService {
    #[must_use]
    pub fn new(source: SharedSource) -> Self {
        Self { source }
    }

    /// Invoices of paid orders, most recent first.
    ///
    /// # Errors
    ///
    /// Returns the classified backend failure.
    #[instrument(skip(self))]
    pub async fn fetch_invoices(&self) -> Result<Vec<Invoice>, OrderError> {
        let body = self.source.send(ApiRequest::get("/fetchPaidInvoicePerOrder")).await?;
        check_rejection(&body)?;
        let mut invoices: Vec<Invoice> = wire::items(&body, &["invoices", "orders", "data"])
            .iter()
            .filter_map(map_invoice)
            .collect();
        invoices.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));
        Ok(invoices)
    }
}

fn map_invoice(raw: &Value) -> Option<Invoice> {
    Some(Invoice {
        order_id: OrderId::new(wire::string(raw, &["orderId", "idOrder", "order_id"])?),
        number: wire::string(raw, &["number", "invoiceNumber", "invoice_number"]).unwrap_or_default(),
        issued_at: wire::datetime(raw, &["date", "issuedAt", "createdAt", "created_at"]),
        total: wire::amount(raw, &["amountTTC", "total", "totalTTC", "amount"]).unwrap_or_default(),
        pdf_url: wire::string(raw, &["pdfUrl", "pdf", "url"]),
        status: wire::string(raw, &["status"]).map_or(InvoiceStatus::Paid, |s| InvoiceStatus::from_wire(&s)),
    })
}
