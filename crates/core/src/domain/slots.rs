//! Search slot schema.
//!
//! A [`SlotSet`] holds one value per [`SlotName`]. Every slot distinguishes
//! "never mentioned" ([`Slot::Unset`]) from "the user does not care"
//! ([`Slot::NoPreference`]) so completeness can treat both as missing while
//! merges only skip the former.

use std::fmt;
use std::str::FromStr;

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Wire form of [`Slot::NoPreference`].
pub const NO_PREFERENCE: &str = "no importa";

/// Legacy spelling accepted on input as a no-preference marker.
const NO_PREFERENCE_ALIAS: &str = "indiferente";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SlotError {
    #[error("unknown slot `{0}`")]
    UnknownSlot(String),
    #[error("slot `{slot}` expects {expected}")]
    TypeMismatch { slot: SlotName, expected: &'static str },
    #[error("slot `{0}` requires a positive value")]
    NonPositive(SlotName),
    #[error("slot `{0}` cannot be set to empty text")]
    EmptyText(SlotName),
    #[error("unknown property type `{0}`")]
    UnknownPropertyType(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SlotName {
    PropertyType,
    Price,
    Neighborhood,
    City,
    AreaM2,
    Bedrooms,
    Bathrooms,
    Parking,
}

impl SlotName {
    pub const ALL: [SlotName; 8] = [
        SlotName::PropertyType,
        SlotName::Price,
        SlotName::Neighborhood,
        SlotName::City,
        SlotName::AreaM2,
        SlotName::Bedrooms,
        SlotName::Bathrooms,
        SlotName::Parking,
    ];

    /// Slots that must hold a real value before a listing can be shown,
    /// in the order the assistant asks for them.
    pub const REQUIRED: [SlotName; 6] = [
        SlotName::PropertyType,
        SlotName::City,
        SlotName::Neighborhood,
        SlotName::Bedrooms,
        SlotName::Bathrooms,
        SlotName::AreaM2,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PropertyType => "tipo",
            Self::Price => "precio",
            Self::Neighborhood => "barrio",
            Self::City => "ciudad",
            Self::AreaM2 => "area_m2",
            Self::Bedrooms => "habitaciones",
            Self::Bathrooms => "banos",
            Self::Parking => "carros",
        }
    }

    pub fn is_required(&self) -> bool {
        Self::REQUIRED.contains(self)
    }

    /// Phrase appended to "antes necesito un detalle más:" when this slot
    /// is the next one to ask for. Optional slots have none.
    pub fn follow_up(&self) -> Option<&'static str> {
        match self {
            Self::PropertyType => Some(
                "que me digas qué tipo de propiedad prefieres: una casa, un apartamento, un local comercial… lo que tengas en mente",
            ),
            Self::City => {
                Some("saber en qué ciudad estás buscando, así enfoco mejor las opciones para ti")
            }
            Self::Neighborhood => Some(
                "conocer si tienes algún barrio o zona preferida para priorizar lo que más te gusta",
            ),
            Self::Bedrooms => Some(
                "una idea del número de habitaciones que necesitas, según cuántas personas vivirán allí o cómo usarías el espacio",
            ),
            Self::Bathrooms => Some(
                "cuántos baños consideras cómodos, sobre todo si es para familia o si quieres un baño privado",
            ),
            Self::AreaM2 => Some(
                "una aproximación del área en metros cuadrados, así sea algo general como “grande” o “compacto”",
            ),
            Self::Price | Self::Parking => None,
        }
    }
}

impl fmt::Display for SlotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SlotName {
    type Err = SlotError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == normalized)
            .ok_or_else(|| SlotError::UnknownSlot(value.to_string()))
    }
}

/// Closed set of listing categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    #[serde(rename = "Finca")]
    Farm,
    #[serde(rename = "Casa")]
    House,
    #[serde(rename = "Apartamento")]
    Apartment,
    #[serde(rename = "Apartaestudio")]
    Studio,
    #[serde(rename = "Lote")]
    Lot,
    #[serde(rename = "Local Comercial")]
    Commercial,
}

impl PropertyType {
    /// Detection priority: the first type whose pattern matches wins.
    pub const PRIORITY: [PropertyType; 6] = [
        PropertyType::Farm,
        PropertyType::House,
        PropertyType::Apartment,
        PropertyType::Studio,
        PropertyType::Lot,
        PropertyType::Commercial,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Farm => "Finca",
            Self::House => "Casa",
            Self::Apartment => "Apartamento",
            Self::Studio => "Apartaestudio",
            Self::Lot => "Lote",
            Self::Commercial => "Local Comercial",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PropertyType {
    type Err = SlotError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        Self::PRIORITY
            .into_iter()
            .find(|kind| kind.label().to_lowercase() == normalized)
            .ok_or_else(|| SlotError::UnknownPropertyType(value.to_string()))
    }
}

/// One slot of the search schema.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Slot<T> {
    Unset,
    NoPreference,
    Value(T),
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self::Unset
    }
}

impl<T> Slot<T> {
    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    pub fn is_no_preference(&self) -> bool {
        matches!(self, Self::NoPreference)
    }

    /// True only for a real value; both sentinels count as missing.
    pub fn has_value(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Value(value) => Some(value),
            Self::Unset | Self::NoPreference => None,
        }
    }
}

impl<T> From<Option<T>> for Slot<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Unset, Self::Value)
    }
}

impl<T: Serialize> Serialize for Slot<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Unset => serializer.serialize_none(),
            Self::NoPreference => serializer.serialize_str(NO_PREFERENCE),
            Self::Value(value) => value.serialize(serializer),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Slot<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        match &raw {
            serde_json::Value::Null => return Ok(Self::Unset),
            serde_json::Value::String(text) => {
                let normalized = text.trim().to_lowercase();
                if normalized.is_empty() {
                    return Ok(Self::Unset);
                }
                if normalized == NO_PREFERENCE || normalized == NO_PREFERENCE_ALIAS {
                    return Ok(Self::NoPreference);
                }
            }
            serde_json::Value::Number(number) if number.as_i64() == Some(-1) => {
                return Ok(Self::Unset);
            }
            _ => {}
        }
        serde_json::from_value(raw).map(Self::Value).map_err(D::Error::custom)
    }
}

/// A single value addressed by slot name, used for keyed updates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlotValue {
    Unset,
    NoPreference,
    PropertyType(PropertyType),
    Amount(u64),
    Count(u32),
    Text(String),
}

impl fmt::Display for SlotValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unset => f.write_str("null"),
            Self::NoPreference => f.write_str(NO_PREFERENCE),
            Self::PropertyType(kind) => write!(f, "{kind}"),
            Self::Amount(amount) => write!(f, "{amount}"),
            Self::Count(count) => write!(f, "{count}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotSet {
    #[serde(rename = "tipo", default)]
    pub property_type: Slot<PropertyType>,
    #[serde(rename = "precio", default)]
    pub price: Slot<u64>,
    #[serde(rename = "barrio", default)]
    pub neighborhood: Slot<String>,
    #[serde(rename = "ciudad", default)]
    pub city: Slot<String>,
    #[serde(rename = "area_m2", default)]
    pub area_m2: Slot<u32>,
    #[serde(rename = "habitaciones", default)]
    pub bedrooms: Slot<u32>,
    #[serde(rename = "banos", default)]
    pub bathrooms: Slot<u32>,
    #[serde(rename = "carros", default)]
    pub parking: Slot<u32>,
}

impl SlotSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every required slot holds a real value.
    pub fn is_complete(&self) -> bool {
        SlotName::REQUIRED.iter().all(|name| self.has_value(*name))
    }

    /// Required slots still missing a real value, in asking order.
    pub fn missing_required(&self) -> Vec<SlotName> {
        SlotName::REQUIRED.into_iter().filter(|name| !self.has_value(*name)).collect()
    }

    pub fn has_value(&self, name: SlotName) -> bool {
        !matches!(self.get(name), SlotValue::Unset | SlotValue::NoPreference)
    }

    /// Anything other than [`Slot::Unset`], including no-preference.
    pub fn is_filled(&self, name: SlotName) -> bool {
        !matches!(self.get(name), SlotValue::Unset)
    }

    pub fn get(&self, name: SlotName) -> SlotValue {
        match name {
            SlotName::PropertyType => slot_value(&self.property_type, |kind| {
                SlotValue::PropertyType(*kind)
            }),
            SlotName::Price => slot_value(&self.price, |amount| SlotValue::Amount(*amount)),
            SlotName::Neighborhood => {
                slot_value(&self.neighborhood, |text| SlotValue::Text(text.clone()))
            }
            SlotName::City => slot_value(&self.city, |text| SlotValue::Text(text.clone())),
            SlotName::AreaM2 => slot_value(&self.area_m2, |count| SlotValue::Count(*count)),
            SlotName::Bedrooms => slot_value(&self.bedrooms, |count| SlotValue::Count(*count)),
            SlotName::Bathrooms => slot_value(&self.bathrooms, |count| SlotValue::Count(*count)),
            SlotName::Parking => slot_value(&self.parking, |count| SlotValue::Count(*count)),
        }
    }

    /// Writes one slot, checking that the value fits the slot's type.
    pub fn set(&mut self, name: SlotName, value: SlotValue) -> Result<(), SlotError> {
        match name {
            SlotName::PropertyType => {
                self.property_type = typed_slot(name, value, "a property type", |value| {
                    match value {
                        SlotValue::PropertyType(kind) => Ok(Some(kind)),
                        SlotValue::Text(text) => text.parse().map(Some),
                        _ => Ok(None),
                    }
                })?;
            }
            SlotName::Price => {
                self.price = typed_slot(name, value, "an amount", |value| match value {
                    SlotValue::Amount(0) | SlotValue::Count(0) => {
                        Err(SlotError::NonPositive(name))
                    }
                    SlotValue::Amount(amount) => Ok(Some(amount)),
                    SlotValue::Count(count) => Ok(Some(u64::from(count))),
                    _ => Ok(None),
                })?;
            }
            SlotName::Neighborhood | SlotName::City => {
                let slot = typed_slot(name, value, "text", |value| match value {
                    SlotValue::Text(text) if text.trim().is_empty() => {
                        Err(SlotError::EmptyText(name))
                    }
                    SlotValue::Text(text) => Ok(Some(text.trim().to_string())),
                    _ => Ok(None),
                })?;
                if name == SlotName::City {
                    self.city = slot;
                } else {
                    self.neighborhood = slot;
                }
            }
            SlotName::AreaM2 | SlotName::Bedrooms | SlotName::Bathrooms | SlotName::Parking => {
                let slot = typed_slot(name, value, "a count", |value| match value {
                    SlotValue::Count(0) | SlotValue::Amount(0) => Err(SlotError::NonPositive(name)),
                    SlotValue::Count(count) => Ok(Some(count)),
                    SlotValue::Amount(amount) => u32::try_from(amount).map(Some).map_err(|_| {
                        SlotError::TypeMismatch { slot: name, expected: "a count" }
                    }),
                    _ => Ok(None),
                })?;
                match name {
                    SlotName::AreaM2 => self.area_m2 = slot,
                    SlotName::Bedrooms => self.bedrooms = slot,
                    SlotName::Bathrooms => self.bathrooms = slot,
                    _ => self.parking = slot,
                }
            }
        }
        Ok(())
    }

    /// Copies every slot of `update` that is not [`Slot::Unset`].
    /// Returns the names whose value actually changed.
    pub fn merge_defined(&mut self, update: &SlotSet) -> Vec<SlotName> {
        let mut changed = Vec::new();
        for name in SlotName::ALL {
            let incoming = update.get(name);
            if incoming == SlotValue::Unset || incoming == self.get(name) {
                continue;
            }
            // Both sides share the schema, so the incoming value always fits.
            if self.set(name, incoming).is_ok() {
                changed.push(name);
            }
        }
        changed
    }

    /// Marks every unset required slot as no-preference.
    pub fn fill_missing_with_no_preference(&mut self) -> Vec<SlotName> {
        let mut filled = Vec::new();
        for name in SlotName::REQUIRED {
            if !self.is_filled(name) && self.set(name, SlotValue::NoPreference).is_ok() {
                filled.push(name);
            }
        }
        filled
    }

    /// Slot names whose values differ between `self` and `other`.
    pub fn diff(&self, other: &SlotSet) -> Vec<SlotName> {
        SlotName::ALL.into_iter().filter(|name| self.get(*name) != other.get(*name)).collect()
    }
}

/// Free-function form of [`SlotSet::is_complete`].
pub fn slots_complete(slots: &SlotSet) -> bool {
    slots.is_complete()
}

fn slot_value<T>(slot: &Slot<T>, convert: impl FnOnce(&T) -> SlotValue) -> SlotValue {
    match slot {
        Slot::Unset => SlotValue::Unset,
        Slot::NoPreference => SlotValue::NoPreference,
        Slot::Value(value) => convert(value),
    }
}

fn typed_slot<T>(
    name: SlotName,
    value: SlotValue,
    expected: &'static str,
    convert: impl FnOnce(SlotValue) -> Result<Option<T>, SlotError>,
) -> Result<Slot<T>, SlotError> {
    match value {
        SlotValue::Unset => Ok(Slot::Unset),
        SlotValue::NoPreference => Ok(Slot::NoPreference),
        other => convert(other)?
            .map(Slot::Value)
            .ok_or(SlotError::TypeMismatch { slot: name, expected }),
    }
}

#[cfg(test)]
mod tests {
    use super::{PropertyType, Slot, SlotError, SlotName, SlotSet, SlotValue};

    fn complete_slots() -> SlotSet {
        SlotSet {
            property_type: Slot::Value(PropertyType::House),
            neighborhood: Slot::Value("El Carmen".to_string()),
            city: Slot::Value("Guadalajara de Buga".to_string()),
            area_m2: Slot::Value(120),
            bedrooms: Slot::Value(3),
            bathrooms: Slot::Value(2),
            ..SlotSet::default()
        }
    }

    #[test]
    fn fresh_slot_set_is_incomplete_and_asks_for_type_first() {
        let slots = SlotSet::new();
        assert!(!slots.is_complete());
        assert_eq!(slots.missing_required().first(), Some(&SlotName::PropertyType));
        assert_eq!(slots.missing_required().len(), 6);
    }

    #[test]
    fn optional_slots_do_not_block_completeness() {
        let slots = complete_slots();
        assert!(slots.is_complete());
        assert!(slots.price.is_unset());
        assert!(slots.parking.is_unset());
    }

    #[test]
    fn no_preference_counts_as_missing_for_completeness() {
        let mut slots = complete_slots();
        slots.bathrooms = Slot::NoPreference;
        assert!(!slots.is_complete());
        assert_eq!(slots.missing_required(), vec![SlotName::Bathrooms]);
    }

    #[test]
    fn merge_skips_unset_and_reports_changes() {
        let mut slots = complete_slots();
        let update = SlotSet {
            bedrooms: Slot::Value(4),
            price: Slot::Value(350_000_000),
            ..SlotSet::default()
        };

        let changed = slots.merge_defined(&update);
        assert_eq!(changed, vec![SlotName::Price, SlotName::Bedrooms]);
        assert_eq!(slots.bedrooms, Slot::Value(4));
        assert_eq!(slots.city, Slot::Value("Guadalajara de Buga".to_string()));
    }

    #[test]
    fn fill_missing_only_touches_unset_required_slots() {
        let mut slots = SlotSet {
            property_type: Slot::Value(PropertyType::Apartment),
            ..SlotSet::default()
        };
        let filled = slots.fill_missing_with_no_preference();
        assert_eq!(filled.len(), 5);
        assert_eq!(slots.property_type, Slot::Value(PropertyType::Apartment));
        assert!(slots.city.is_no_preference());
        assert!(slots.price.is_unset());
    }

    #[test]
    fn keyed_updates_are_type_checked() {
        let mut slots = SlotSet::new();
        assert_eq!(
            slots.set(SlotName::Bedrooms, SlotValue::Text("tres".to_string())),
            Err(SlotError::TypeMismatch { slot: SlotName::Bedrooms, expected: "a count" })
        );
        assert_eq!(
            slots.set(SlotName::Bathrooms, SlotValue::Count(0)),
            Err(SlotError::NonPositive(SlotName::Bathrooms))
        );
        assert!(slots.set(SlotName::PropertyType, SlotValue::Text("casa".to_string())).is_ok());
        assert_eq!(slots.property_type, Slot::Value(PropertyType::House));
    }

    #[test]
    fn serializes_with_schema_keys_and_sentinels() {
        let slots = SlotSet {
            property_type: Slot::Value(PropertyType::Commercial),
            city: Slot::NoPreference,
            bedrooms: Slot::Value(2),
            ..SlotSet::default()
        };

        let json = serde_json::to_value(&slots).unwrap();
        assert_eq!(json["tipo"], "Local Comercial");
        assert_eq!(json["ciudad"], "no importa");
        assert_eq!(json["habitaciones"], 2);
        assert!(json["precio"].is_null());
    }

    #[test]
    fn deserializes_legacy_undefined_markers() {
        let slots: SlotSet = serde_json::from_str(
            r#"{"tipo": "Casa", "barrio": "", "banos": -1, "ciudad": "indiferente"}"#,
        )
        .unwrap();

        assert_eq!(slots.property_type, Slot::Value(PropertyType::House));
        assert!(slots.neighborhood.is_unset());
        assert!(slots.bathrooms.is_unset());
        assert!(slots.city.is_no_preference());
        assert!(slots.area_m2.is_unset());
    }

    #[test]
    fn slot_names_round_trip_through_schema_keys() {
        for name in SlotName::ALL {
            assert_eq!(name.as_str().parse::<SlotName>(), Ok(name));
        }
        assert!("ubicacion".parse::<SlotName>().is_err());
    }
}
