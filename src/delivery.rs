//! Email draft delivery
//!
//! Minutes are handed to the user's default mail client as a `mailto:`
//! draft. Nothing is sent automatically, and the mail client is launched
//! without waiting for it to exit.

use crate::capabilities::DraftComposer;
use crate::error::DeliveryError;
use tracing::{info, warn};

/// Launches a URL handler and returns without waiting for it
type Opener = fn(&str) -> std::io::Result<()>;

/// Opens a `mailto:` URL with the system handler
pub(crate) struct MailtoComposer {
    opener: Opener,
}

impl Default for MailtoComposer {
    fn default() -> Self {
        Self {
            opener: |url| open::that_detached(url),
        }
    }
}

impl DraftComposer for MailtoComposer {
    fn open_draft(&self, recipient: &str, subject: &str, body: &str) -> Result<(), DeliveryError> {
        let recipient = recipient.trim();
        if recipient.is_empty() {
            warn!("Recipient email not configured, skipping email draft");
            return Err(DeliveryError::NoRecipient);
        }

        let url = mailto_url(recipient, subject, body);
        // Runs on the session loop; never wait for the mail client
        (self.opener)(&url)?;
        info!("Opened email draft for {}", recipient);
        Ok(())
    }
}

/// Build a `mailto:` URL with percent-encoded subject and body
pub(crate) fn mailto_url(recipient: &str, subject: &str, body: &str) -> String {
    format!(
        "mailto:{}?subject={}&body={}",
        recipient,
        urlencoding::encode(subject),
        urlencoding::encode(body)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_mailto_url_encodes_subject_and_body() {
        let url = mailto_url(
            "team@example.com",
            "Meeting Minutes Summary",
            "## 議題\n- Q3 & budget",
        );
        assert_eq!(
            url,
            "mailto:team@example.com?subject=Meeting%20Minutes%20Summary\
             &body=%23%23%20%E8%AD%B0%E9%A1%8C%0A-%20Q3%20%26%20budget"
        );
    }

    static OPENED: Mutex<Vec<String>> = Mutex::new(Vec::new());

    fn recording_composer() -> MailtoComposer {
        MailtoComposer {
            opener: |url| {
                OPENED.lock().unwrap().push(url.to_string());
                Ok(())
            },
        }
    }

    #[test]
    fn test_blank_recipient_is_refused() {
        let result = recording_composer().open_draft("  ", "subject", "body");
        assert!(matches!(result, Err(DeliveryError::NoRecipient)));
    }

    #[test]
    fn test_draft_is_handed_to_opener_and_returns() {
        recording_composer()
            .open_draft(" team@example.com ", "Minutes", "done")
            .unwrap();
        let opened = OPENED.lock().unwrap();
        assert!(opened.contains(&"mailto:team@example.com?subject=Minutes&body=done".to_string()));
    }

    #[test]
    fn test_opener_failure_is_reported() {
        let composer = MailtoComposer {
            opener: |_| Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no handler")),
        };
        let result = composer.open_draft("team@example.com", "Minutes", "done");
        assert!(matches!(result, Err(DeliveryError::Open(_))));
    }
}
