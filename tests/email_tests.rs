//! Invoice email integration tests against the recording transport.

use anyhow::Result;

use agencyd::mailer::{invoice_html, Attachment, EmailMessage, Mailer, RecordingMailer};
use agencyd::store::Store;

fn invoice_message(invoice_number: &str) -> EmailMessage {
    EmailMessage {
        to: "billing@acme.com".into(),
        subject: format!("Invoice #{invoice_number} from GrowthServices Inc."),
        html_body: invoice_html("GrowthServices Inc.", "Acme", invoice_number),
        attachments: vec![Attachment {
            filename: format!("Invoice_{invoice_number}.pdf"),
            content: vec![0x25, 0x50, 0x44, 0x46],
        }],
    }
}

#[test]
fn successful_send_is_recorded_and_logged() -> Result<()> {
    let store = Store::in_memory()?;
    let mailer = RecordingMailer::default();

    let msg = invoice_message("INV-001");
    mailer.send(&msg)?;
    store.log_email("Acme", "billing@acme.com", "INV-001", "proj-1", "admin-1", "Success")?;

    let sent = mailer.sent.lock();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "billing@acme.com");
    assert_eq!(sent[0].attachments[0].filename, "Invoice_INV-001.pdf");
    assert!(sent[0].html_body.contains("Acme"));
    assert!(sent[0].html_body.contains("INV-001"));

    let logs = store.list_email_logs()?;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, "Success");
    assert_eq!(logs[0].invoice_number, "INV-001");
    Ok(())
}

#[test]
fn failed_transport_leaves_no_log_entry() -> Result<()> {
    let store = Store::in_memory()?;
    let mailer = RecordingMailer::failing();

    let err = mailer.send(&invoice_message("INV-002"));
    assert!(err.is_err());
    // The handler only logs after a successful send.
    assert!(store.list_email_logs()?.is_empty());
    assert!(mailer.sent.lock().is_empty());
    Ok(())
}

#[test]
fn log_listing_is_newest_first() -> Result<()> {
    let store = Store::in_memory()?;
    store.log_email("Acme", "a@acme.com", "INV-001", "p1", "admin-1", "Success")?;
    std::thread::sleep(std::time::Duration::from_millis(5));
    store.log_email("Beta", "b@beta.com", "INV-002", "p2", "admin-1", "Success")?;

    let logs = store.list_email_logs()?;
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].invoice_number, "INV-002");
    assert_eq!(logs[1].invoice_number, "INV-001");
    Ok(())
}
