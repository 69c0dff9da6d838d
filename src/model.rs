//! Wire DTOs exchanged with the browser client and the SignatureRx prescribing API.

// self
use crate::_prelude::*;

/// Medication entry served by the static catalog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Medicine {
	/// SNOMED CT identifier.
	pub snomed_id: String,
	/// Human-readable product name.
	pub display_name: String,
	/// Whether the product is unlicensed in the UK.
	pub unlicensed: bool,
	/// Prescribing endorsements keyed by code.
	#[serde(default)]
	pub endorsements: serde_json::Map<String, serde_json::Value>,
	/// Whether the product must be prescribed by brand.
	pub prescribe_by_brand_only: bool,
	/// Dictionary type (`vmp`, `amp`, ...).
	#[serde(rename = "type")]
	pub kind: String,
	/// Exact BNF match, if any.
	pub bnf_exact_match: Option<String>,
	/// Candidate BNF matches, if any.
	pub bnf_matches: Option<String>,
	/// Appliance classification, empty for medicines.
	#[serde(default)]
	pub appliance_types: Vec<serde_json::Value>,
	/// Indicative price in GBP.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub price: Option<f64>,
}

/// Upstream action requested for a prescription.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrescriptionAction {
	/// Issue the prescription and dispatch to the delivery address.
	#[default]
	#[serde(rename = "issueForDelivery")]
	IssueForDelivery,
}

/// Patient gender as accepted by the prescribing API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
	#[allow(missing_docs)]
	Male,
	#[allow(missing_docs)]
	Female,
	#[allow(missing_docs)]
	Other,
}

/// Medicine line of a prescription.
#[allow(non_snake_case)]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrescriptionMedicine {
	/// Always `medicine`.
	pub object: String,
	/// Catalog identifier.
	pub id: u64,
	/// Virtual product id.
	pub VPID: String,
	/// Actual product id.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub APID: Option<String>,
	/// Virtual product pack id.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub VPPID: Option<String>,
	/// Actual product pack id.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub APPID: Option<String>,
	/// Product description.
	pub description: String,
	/// Quantity, as free text.
	pub qty: String,
	/// Dosage directions.
	pub directions: String,
}

/// Delivery address for dispatched medicines.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAddress {
	#[allow(missing_docs)]
	pub address_ln1: String,
	#[allow(missing_docs)]
	#[serde(default)]
	pub address_ln2: String,
	#[allow(missing_docs)]
	pub city: String,
	#[allow(missing_docs)]
	pub post_code: String,
	#[allow(missing_docs)]
	pub country: String,
}

/// Patient demographics sent with a prescription.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
	#[allow(missing_docs)]
	pub first_name: String,
	#[allow(missing_docs)]
	pub last_name: String,
	#[allow(missing_docs)]
	pub gender: Gender,
	#[allow(missing_docs)]
	pub email: String,
	#[allow(missing_docs)]
	pub phone: String,
	#[allow(missing_docs)]
	pub birth_day: String,
	#[allow(missing_docs)]
	pub birth_month: String,
	#[allow(missing_docs)]
	pub birth_year: String,
	#[allow(missing_docs)]
	pub address_ln1: String,
	#[allow(missing_docs)]
	#[serde(default)]
	pub address_ln2: String,
	#[allow(missing_docs)]
	pub city: String,
	#[allow(missing_docs)]
	pub post_code: String,
	#[allow(missing_docs)]
	pub country: String,
	/// Caller-side patient reference.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub client_ref_id: Option<String>,
}
impl Patient {
	/// `first last`, as stored alongside the prescription.
	pub fn full_name(&self) -> String {
		format!("{} {}", self.first_name, self.last_name)
	}
}

fn default_true() -> bool {
	true
}

/// Prescription payload accepted from the browser client and forwarded upstream verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePrescriptionRequest {
	#[allow(missing_docs)]
	pub action: PrescriptionAction,
	#[allow(missing_docs)]
	#[serde(default)]
	pub contact_id: u64,
	#[allow(missing_docs)]
	pub clinic_id: u64,
	#[allow(missing_docs)]
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub aff_tag: Option<String>,
	/// Prescriber PIN; never logged.
	pub secure_pin: String,
	#[allow(missing_docs)]
	#[serde(default = "default_true")]
	pub notify: bool,
	#[allow(missing_docs)]
	#[serde(default = "default_true")]
	pub send_sms: bool,
	#[allow(missing_docs)]
	#[serde(default)]
	pub invoice_clinic: bool,
	#[allow(missing_docs)]
	pub delivery_address: DeliveryAddress,
	#[allow(missing_docs)]
	#[serde(default)]
	pub prescription_id: String,
	#[allow(missing_docs)]
	pub patient: Patient,
	#[allow(missing_docs)]
	#[serde(default)]
	pub notes: String,
	#[allow(missing_docs)]
	#[serde(default)]
	pub client_ref_id: String,
	#[allow(missing_docs)]
	pub medicines: Vec<PrescriptionMedicine>,
	#[allow(missing_docs)]
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub prescriber_ip: Option<String>,
}
impl CreatePrescriptionRequest {
	/// Rejects payloads the upstream would refuse outright.
	pub fn validate(&self) -> Result<()> {
		if self.medicines.is_empty() {
			return Err(Error::InvalidPayload { reason: "at least one medicine is required".into() });
		}
		if !self.patient.email.contains('@') {
			return Err(Error::InvalidPayload { reason: "patient email is malformed".into() });
		}

		Ok(())
	}
}

/// Response returned by `POST /api/prescriptions/issue`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrescriptionResponse {
	/// Local record id.
	pub id: String,
	/// Status recorded for the prescription.
	pub status: String,
	/// SignatureRx prescription id, when the upstream returned one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub prescription_id: Option<String>,
	#[allow(missing_docs)]
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
	/// Creation instant, RFC 3339.
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::sample_request;

	#[test]
	fn defaults_fill_optional_fields() {
		let request = sample_request();

		assert_eq!(request.action, PrescriptionAction::IssueForDelivery);
		assert_eq!(request.contact_id, 0);
		assert!(request.notify);
		assert!(request.send_sms);
		assert!(!request.invoice_clinic);
		assert_eq!(request.patient.address_ln2, "");
		assert_eq!(request.patient.full_name(), "Ada Lovelace");
		request.validate().expect("Sample request should validate.");
	}

	#[test]
	fn medicine_ids_keep_upper_case_keys() {
		let json = serde_json::to_value(sample_request()).expect("Request should serialize.");

		assert_eq!(json["medicines"][0]["VPID"], "39720311000001101");
		assert!(json["medicines"][0].get("APID").is_none());
		assert_eq!(json["action"], "issueForDelivery");
	}

	#[test]
	fn validation_rejects_empty_medicines() {
		let mut request = sample_request();

		request.medicines.clear();

		assert!(matches!(request.validate(), Err(Error::InvalidPayload { .. })));
	}
}
