//! In-process [`PrescriptionRepository`] implementation.

// crates.io
use uuid::Uuid;
// self
use crate::{
	_prelude::*,
	records::{
		NewPrescription, NewWebhookEvent, PrescriptionRepository, RepositoryError,
		RepositoryFuture, StoredPrescription, WebhookEventRecord,
	},
};

#[derive(Debug, Default)]
struct Tables {
	prescriptions: Vec<StoredPrescription>,
	webhook_events: Vec<WebhookEventRecord>,
}

/// Thread-safe repository keeping rows in insertion order.
#[derive(Clone, Debug, Default)]
pub struct MemoryRepository(Arc<RwLock<Tables>>);
impl PrescriptionRepository for MemoryRepository {
	fn create(&self, prescription: NewPrescription) -> RepositoryFuture<'_, StoredPrescription> {
		Box::pin(async move {
			let now = OffsetDateTime::now_utc();
			let row = StoredPrescription {
				id: Uuid::new_v4().to_string(),
				signaturerx_prescription_id: prescription.signaturerx_prescription_id,
				patient_email: prescription.patient_email,
				patient_name: prescription.patient_name,
				status: prescription.status,
				medicines: prescription.medicines,
				created_at: now,
				updated_at: now,
				payload: prescription.payload,
			};

			self.0.write().prescriptions.push(row.clone());

			Ok::<_, RepositoryError>(row)
		})
	}

	fn list(&self) -> RepositoryFuture<'_, Vec<StoredPrescription>> {
		Box::pin(async move { Ok(self.0.read().prescriptions.iter().rev().cloned().collect()) })
	}

	fn get<'a>(&'a self, id: &'a str) -> RepositoryFuture<'a, Option<StoredPrescription>> {
		Box::pin(async move {
			Ok(self.0.read().prescriptions.iter().find(|row| row.id == id).cloned())
		})
	}

	fn update_status<'a>(
		&'a self,
		external_id: &'a str,
		status: &'a str,
	) -> RepositoryFuture<'a, u64> {
		Box::pin(async move {
			let now = OffsetDateTime::now_utc();
			let mut tables = self.0.write();
			let mut affected = 0;

			for row in tables
				.prescriptions
				.iter_mut()
				.filter(|row| row.signaturerx_prescription_id.as_deref() == Some(external_id))
			{
				row.status = status.to_owned();
				row.updated_at = now;
				affected += 1;
			}

			Ok(affected)
		})
	}

	fn record_webhook_event(
		&self,
		event: NewWebhookEvent,
	) -> RepositoryFuture<'_, WebhookEventRecord> {
		Box::pin(async move {
			let row = WebhookEventRecord {
				id: Uuid::new_v4().to_string(),
				event_type: event.event_type,
				external_id: event.external_id,
				status: event.status,
				payload: event.payload,
				received_at: OffsetDateTime::now_utc(),
			};

			self.0.write().webhook_events.push(row.clone());

			Ok(row)
		})
	}

	fn webhook_events<'a>(
		&'a self,
		external_id: &'a str,
	) -> RepositoryFuture<'a, Vec<WebhookEventRecord>> {
		Box::pin(async move {
			Ok(self
				.0
				.read()
				.webhook_events
				.iter()
				.filter(|row| row.external_id == external_id)
				.cloned()
				.collect())
		})
	}
}
