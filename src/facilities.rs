use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Facility {
    pub label: &'static str,
    pub key: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FacilityGroup {
    pub key: &'static str,
    pub label: &'static str,
    pub items: &'static [Facility],
}

const fn item(label: &'static str, key: &'static str) -> Facility {
    Facility { label, key }
}

/// Room facility checklist: category → human label → backend key.
pub const FACILITY_CATALOG: &[FacilityGroup] = &[
    FacilityGroup {
        key: "roomEssentials",
        label: "Room Essentials",
        items: &[
            item("Bed", "bed"),
            item("Table", "table"),
            item("Chair", "chair"),
            item("Fan", "fan"),
            item("Light", "light"),
            item("Wardrobe", "wardrobe"),
            item("Mirror", "mirror"),
            item("Curtains", "curtains"),
        ],
    },
    FacilityGroup {
        key: "comfortFeatures",
        label: "Comfort Features",
        items: &[
            item("AC", "ac"),
            item("Cooler", "cooler"),
            item("Geyser", "geyser"),
            item("Heater", "heater"),
            item("TV", "tv"),
            item("Balcony", "balcony"),
        ],
    },
    FacilityGroup {
        key: "washroomHygiene",
        label: "Washroom & Hygiene",
        items: &[
            item("Attached Bathroom", "attachedBathroom"),
            item("Western Toilet", "westernToilet"),
            item("Indian Toilet", "indianToilet"),
            item("Hot Water", "hotWater"),
            item("Water Purifier", "waterPurifier"),
        ],
    },
    FacilityGroup {
        key: "utilitiesConnectivity",
        label: "Utilities & Connectivity",
        items: &[
            item("WiFi", "wifi"),
            item("Power Backup", "powerBackup"),
            item("Electricity Included", "electricityIncluded"),
            item("Water Included", "waterIncluded"),
            item("Gas Connection", "gasConnection"),
        ],
    },
    FacilityGroup {
        key: "laundryHousekeeping",
        label: "Laundry & Housekeeping",
        items: &[
            item("Washing Machine", "washingMachine"),
            item("Laundry Service", "laundryService"),
            item("Room Cleaning", "roomCleaning"),
            item("Iron", "iron"),
        ],
    },
    FacilityGroup {
        key: "securitySafety",
        label: "Security & Safety",
        items: &[
            item("CCTV", "cctv"),
            item("Security Guard", "securityGuard"),
            item("Fire Extinguisher", "fireExtinguisher"),
            item("Biometric Entry", "biometricEntry"),
        ],
    },
    FacilityGroup {
        key: "parkingTransport",
        label: "Parking & Transport",
        items: &[
            item("Bike Parking", "bikeParking"),
            item("Car Parking", "carParking"),
            item("Lift", "lift"),
        ],
    },
    FacilityGroup {
        key: "propertySpecific",
        label: "Property Specific",
        items: &[
            item("Kitchen Access", "kitchenAccess"),
            item("Refrigerator", "refrigerator"),
            item("Microwave", "microwave"),
            item("Mess Facility", "messFacility"),
            item("Study Table", "studyTable"),
        ],
    },
];

pub fn group_by_label(label: &str) -> Option<&'static FacilityGroup> {
    let needle = label.trim();
    FACILITY_CATALOG
        .iter()
        .find(|group| group.label.eq_ignore_ascii_case(needle) || group.key == needle)
}

pub fn facility_key(group_label: &str, item_label: &str) -> Option<(&'static str, &'static str)> {
    let group = group_by_label(group_label)?;
    let needle = item_label.trim();
    group
        .items
        .iter()
        .find(|facility| facility.label.eq_ignore_ascii_case(needle) || facility.key == needle)
        .map(|facility| (group.key, facility.key))
}

/// Checkbox state of a room's facilities, keyed by backend keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FacilitySelection {
    selected: BTreeMap<&'static str, BTreeMap<&'static str, bool>>,
}

impl FacilitySelection {
    pub fn set(&mut self, group_label: &str, item_label: &str, on: bool) -> AppResult<()> {
        let (group, key) = facility_key(group_label, item_label).ok_or_else(|| {
            AppError::Validation(format!("Unknown facility: {group_label} / {item_label}"))
        })?;
        self.selected.entry(group).or_default().insert(key, on);
        Ok(())
    }

    pub fn toggle(&mut self, group_label: &str, item_label: &str) -> AppResult<bool> {
        let on = !self.is_selected(group_label, item_label);
        self.set(group_label, item_label, on)?;
        Ok(on)
    }

    pub fn is_selected(&self, group_label: &str, item_label: &str) -> bool {
        facility_key(group_label, item_label)
            .and_then(|(group, key)| self.selected.get(group)?.get(key).copied())
            .unwrap_or(false)
    }

    pub fn selected_count(&self) -> usize {
        self.selected
            .values()
            .flat_map(BTreeMap::values)
            .filter(|on| **on)
            .count()
    }

    /// Nested `{group: {key: true}}` object containing only checked entries.
    pub fn to_payload(&self) -> Value {
        let mut groups = Map::new();
        for (group, items) in &self.selected {
            let checked: Map<String, Value> = items
                .iter()
                .filter(|(_, on)| **on)
                .map(|(key, _)| ((*key).to_string(), Value::Bool(true)))
                .collect();
            if !checked.is_empty() {
                groups.insert((*group).to_string(), Value::Object(checked));
            }
        }
        Value::Object(groups)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use serde_json::json;

    use super::{facility_key, FacilitySelection, FACILITY_CATALOG};

    #[test]
    fn catalog_keys_and_labels_are_unique() {
        let group_keys: HashSet<_> = FACILITY_CATALOG.iter().map(|group| group.key).collect();
        assert_eq!(group_keys.len(), FACILITY_CATALOG.len());

        for group in FACILITY_CATALOG {
            let keys: HashSet<_> = group.items.iter().map(|item| item.key).collect();
            let labels: HashSet<_> = group.items.iter().map(|item| item.label).collect();
            assert_eq!(keys.len(), group.items.len(), "duplicate key in {}", group.key);
            assert_eq!(labels.len(), group.items.len(), "duplicate label in {}", group.key);
        }

        let all_keys: Vec<_> = FACILITY_CATALOG
            .iter()
            .flat_map(|group| group.items.iter().map(|item| item.key))
            .collect();
        let distinct: HashSet<_> = all_keys.iter().collect();
        assert_eq!(distinct.len(), all_keys.len());
    }

    #[test]
    fn every_label_resolves_to_its_key() {
        for group in FACILITY_CATALOG {
            for facility in group.items {
                assert_eq!(
                    facility_key(group.label, facility.label),
                    Some((group.key, facility.key))
                );
            }
        }
    }

    #[test]
    fn payload_contains_only_checked_entries() {
        let mut selection = FacilitySelection::default();
        selection.set("Room Essentials", "Bed", true).expect("bed");
        selection.set("Room Essentials", "Fan", true).expect("fan");
        selection.set("Room Essentials", "Fan", false).expect("fan off");
        selection.set("Comfort Features", "AC", false).expect("ac off");
        selection
            .set("Utilities & Connectivity", "wifi", true)
            .expect("wifi");

        assert_eq!(
            selection.to_payload(),
            json!({
                "roomEssentials": { "bed": true },
                "utilitiesConnectivity": { "wifi": true }
            })
        );
        assert_eq!(selection.selected_count(), 2);
    }

    #[test]
    fn rejects_unknown_labels() {
        let mut selection = FacilitySelection::default();
        assert!(selection.set("Room Essentials", "Jacuzzi", true).is_err());
        assert!(selection.toggle("Spa", "Sauna").is_err());
        assert!(selection.to_payload().as_object().is_some_and(|map| map.is_empty()));
    }
}
