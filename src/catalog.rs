//! Static medication catalog served to the prescription form.

// self
use crate::model::Medicine;

struct Entry {
	snomed_id: &'static str,
	display_name: &'static str,
	kind: &'static str,
	unlicensed: bool,
	price: f64,
}

const ENTRIES: &[Entry] = &[
	Entry {
		snomed_id: "42109611000001109",
		display_name: "Paracetamol 500mg tablets",
		kind: "vmp",
		unlicensed: false,
		price: 0.89,
	},
	Entry {
		snomed_id: "39732311000001104",
		display_name: "Amoxicillin 500mg capsules",
		kind: "vmp",
		unlicensed: false,
		price: 1.25,
	},
	Entry {
		snomed_id: "42095611000001101",
		display_name: "Ibuprofen 400mg tablets",
		kind: "vmp",
		unlicensed: false,
		price: 0.95,
	},
	Entry {
		snomed_id: "39113611000001102",
		display_name: "Omeprazole 20mg gastro-resistant capsules",
		kind: "vmp",
		unlicensed: false,
		price: 1.10,
	},
	Entry {
		snomed_id: "41947111000001109",
		display_name: "Salbutamol 100micrograms/dose inhaler CFC free",
		kind: "vmp",
		unlicensed: false,
		price: 1.50,
	},
	Entry {
		snomed_id: "36032811000001105",
		display_name: "Melatonin 3mg tablets",
		kind: "vmp",
		unlicensed: true,
		price: 6.75,
	},
];

/// Returns every catalog entry, in display order.
pub fn medications() -> Vec<Medicine> {
	ENTRIES
		.iter()
		.map(|entry| Medicine {
			snomed_id: entry.snomed_id.into(),
			display_name: entry.display_name.into(),
			unlicensed: entry.unlicensed,
			endorsements: Default::default(),
			prescribe_by_brand_only: false,
			kind: entry.kind.into(),
			bnf_exact_match: None,
			bnf_matches: None,
			appliance_types: Vec::new(),
			price: Some(entry.price),
		})
		.collect()
}

/// Looks up a catalog entry by SNOMED id.
pub fn find(snomed_id: &str) -> Option<Medicine> {
	medications().into_iter().find(|medicine| medicine.snomed_id == snomed_id)
}
