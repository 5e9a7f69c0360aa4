use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};

use mercabot_agent::CapturedLead;
use mercabot_channel::{LeadAlert, NotifierChain};
use mercabot_core::{Lead, UserId};
use mercabot_db::repositories::LeadRepository;

/// Persists a captured lead and fires the owner alert. The alert runs on
/// its own task so a slow notification provider never delays the reply.
pub struct LeadCaptureService {
    repository: Arc<dyn LeadRepository>,
    notifier: Arc<NotifierChain>,
}

impl LeadCaptureService {
    pub fn new(repository: Arc<dyn LeadRepository>, notifier: Arc<NotifierChain>) -> Self {
        Self { repository, notifier }
    }

    pub async fn capture(&self, user_id: &UserId, captured: CapturedLead) {
        let lead = Lead {
            user_id: user_id.clone(),
            phone: captured.phone,
            interested_products: captured.product_keys,
            captured_at: Utc::now(),
        };

        let alert = LeadAlert {
            phone: lead.phone.clone(),
            product_keys: lead.interested_products.iter().map(|key| key.0.clone()).collect(),
            captured_at: lead.captured_at,
        };

        match self.repository.upsert(lead).await {
            Ok(()) => info!(user_id = %user_id, phone = %alert.phone, "lead captured"),
            // the turn continues and the alert still carries the contact
            Err(err) => error!(user_id = %user_id, error = %err, "lead upsert failed"),
        }

        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            notifier.notify(alert).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;
    use std::time::Duration;

    use mercabot_agent::CapturedLead;
    use mercabot_channel::{DurableLogChannel, NotifierChain};
    use mercabot_core::{ProductKey, UserId};
    use mercabot_db::repositories::{InMemoryLeadRepository, LeadRepository};

    use super::LeadCaptureService;

    #[tokio::test]
    async fn capture_upserts_and_appends_alert() {
        let repository = Arc::new(InMemoryLeadRepository::default());
        let dir = tempdir();
        let log_path = dir.path().join("leads.log");
        let notifier =
            Arc::new(NotifierChain::new(vec![], DurableLogChannel::new(&log_path)));
        let service = LeadCaptureService::new(repository.clone(), notifier);

        let captured = CapturedLead {
            phone: "70012345".to_string(),
            product_keys: BTreeSet::from([ProductKey("tappers".to_string())]),
        };
        service.capture(&UserId("u-1".to_string()), captured).await;

        assert_eq!(repository.count().await.expect("count"), 1);

        // the alert task is detached; give it a beat to land
        tokio::time::sleep(Duration::from_millis(50)).await;
        let logged = tokio::fs::read_to_string(&log_path).await.expect("log readable");
        assert!(logged.contains("70012345"));
    }

    fn tempdir() -> tempfile::TempDir {
        tempfile::tempdir().expect("tempdir")
    }
}
