//! Mailer seam.
//!
//! Transport is an external capability: best effort, report failure, never
//! retry. The default implementation only logs, which keeps dev and test runs
//! free of SMTP credentials; deployments plug in a real transport behind the
//! same trait.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub attachments: Vec<Attachment>,
}

pub trait Mailer: Send + Sync {
    fn send(&self, msg: &EmailMessage) -> Result<()>;
}

pub type SharedMailer = Arc<dyn Mailer>;

/// Logs the send instead of performing it.
pub struct TracingMailer;

impl Mailer for TracingMailer {
    fn send(&self, msg: &EmailMessage) -> Result<()> {
        info!(
            target: "mailer",
            "send to={} subject={:?} attachments={}",
            msg.to,
            msg.subject,
            msg.attachments.len()
        );
        Ok(())
    }
}

/// Captures messages for assertions; can be told to fail.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: parking_lot::Mutex<Vec<EmailMessage>>,
    pub fail: bool,
}

impl RecordingMailer {
    pub fn failing() -> Self {
        Self { sent: parking_lot::Mutex::new(Vec::new()), fail: true }
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, msg: &EmailMessage) -> Result<()> {
        if self.fail {
            anyhow::bail!("smtp transport unavailable");
        }
        self.sent.lock().push(msg.clone());
        Ok(())
    }
}

/// Invoice notification body. The invoice document itself arrives pre-rendered
/// as an attachment; this is only the covering note.
pub fn invoice_html(company_name: &str, client_name: &str, invoice_number: &str) -> String {
    format!(
        "<div style=\"font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;\">\
         <h1>{company_name}</h1>\
         <p>Dear <strong>{client_name}</strong>,</p>\
         <p>Thank you for your business. We have attached the invoice for your recent project below.</p>\
         <p><strong>Invoice:</strong> {invoice_number}<br><strong>Status:</strong> Ready for Payment</p>\
         <p>Best Regards,<br><strong>The {company_name} Team</strong></p>\
         </div>"
    )
}
