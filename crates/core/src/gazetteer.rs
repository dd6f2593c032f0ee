//! Known location names grouped by area, each mapped to its containing city.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_CITY: &str = "Guadalajara de Buga";

#[derive(Debug, Error)]
pub enum GazetteerError {
    #[error("could not read gazetteer file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse gazetteer: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("gazetteer defines no locations")]
    Empty,
    #[error("gazetteer area `{0}` has an empty location name")]
    BlankName(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GazetteerEntry {
    pub name: String,
    pub area: String,
    pub city: Option<String>,
}

/// Ordered location table. Lookups that tie resolve to the earlier entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Gazetteer {
    entries: Vec<GazetteerEntry>,
    lowered: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GazetteerFile {
    #[serde(rename = "area", default)]
    areas: Vec<AreaRecord>,
}

#[derive(Debug, Deserialize)]
struct AreaRecord {
    name: String,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    locations: Vec<String>,
}

const BUILTIN_AREAS: &[(&str, &[&str])] = &[
    (
        "Comuna 1",
        &["El Carmen", "La Merced", "Santa Rita", "San Antonio", "Santa Bárbara", "El Centro"],
    ),
    (
        "Comuna 2",
        &["Jorge Eliécer Gaitán", "Alto Bonito", "Divino Niño", "La Revolución", "Paloblanco"],
    ),
    ("Comuna 3", &["El Porvenir", "Cristo Rey", "San José", "José María Cabal", "Fuenmayor"]),
    ("Comuna 4", &["La Victoria", "Las Américas", "El Jardín", "Los Ángeles", "Sucre"]),
    ("Comuna 5", &["Tomás Uribe Uribe", "Ricaurte", "La Esperanza", "El Albergue", "Aures"]),
    ("Comuna 6", &["Los Álamos", "Bosques de la Merced", "La Honda", "Villa del Lago"]),
    (
        "Urbanizaciones",
        &["Ciudadela Guadalajara", "La Campiña", "Portal de la Giralda", "Altos de Santa Inés"],
    ),
    (
        "Corregimientos y veredas",
        &[
            "La Magdalena",
            "El Placer",
            "Chambimbal",
            "Zanjón Hondo",
            "La María",
            "El Vínculo",
            "Quebradaseca",
            "Monterrey",
            "Alaska",
            "La Habana",
            "Nogales",
            "Los Bancos",
        ],
    ),
    ("Parcelaciones campestres", &["Campestre El Bosque", "Mirador de Buga", "Hacienda La Aurora"]),
];

impl Gazetteer {
    pub fn new(entries: Vec<GazetteerEntry>) -> Result<Self, GazetteerError> {
        if entries.is_empty() {
            return Err(GazetteerError::Empty);
        }
        if let Some(blank) = entries.iter().find(|entry| entry.name.trim().is_empty()) {
            return Err(GazetteerError::BlankName(blank.area.clone()));
        }
        let lowered = entries.iter().map(|entry| entry.name.trim().to_lowercase()).collect();
        Ok(Self { entries, lowered })
    }

    /// Locations of Guadalajara de Buga, all mapped to that city.
    pub fn builtin() -> Self {
        let entries = BUILTIN_AREAS
            .iter()
            .flat_map(|(area, names)| {
                names.iter().map(move |name| GazetteerEntry {
                    name: (*name).to_string(),
                    area: (*area).to_string(),
                    city: Some(DEFAULT_CITY.to_string()),
                })
            })
            .collect::<Vec<_>>();
        let lowered = entries.iter().map(|entry| entry.name.to_lowercase()).collect();
        Self { entries, lowered }
    }

    /// Parses `[[area]]` tables with `name`, optional `city` and `locations`.
    pub fn from_toml_str(raw: &str) -> Result<Self, GazetteerError> {
        let file = toml::from_str::<GazetteerFile>(raw)?;
        let entries = file
            .areas
            .into_iter()
            .flat_map(|area| {
                let AreaRecord { name: area_name, city, locations } = area;
                locations.into_iter().map(move |name| GazetteerEntry {
                    name: name.trim().to_string(),
                    area: area_name.clone(),
                    city: city.clone(),
                })
            })
            .collect();
        Self::new(entries)
    }

    pub fn load(path: &Path) -> Result<Self, GazetteerError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| GazetteerError::ReadFile { path: path.to_path_buf(), source })?;
        let gazetteer = Self::from_toml_str(&raw)?;
        debug!(path = %path.display(), locations = gazetteer.len(), "gazetteer loaded");
        Ok(gazetteer)
    }

    pub fn entries(&self) -> &[GazetteerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct area names in table order.
    pub fn areas(&self) -> Vec<&str> {
        let mut areas: Vec<&str> = Vec::new();
        for entry in &self.entries {
            if !areas.contains(&entry.area.as_str()) {
                areas.push(&entry.area);
            }
        }
        areas
    }

    pub fn city_for(&self, name: &str) -> Option<&str> {
        let needle = name.trim().to_lowercase();
        self.lowered
            .iter()
            .position(|candidate| *candidate == needle)
            .and_then(|index| self.entries[index].city.as_deref())
    }

    /// Closest entry to `fragment` by normalized edit similarity, if it
    /// reaches `floor`. Returns the entry and its similarity.
    pub fn closest(&self, fragment: &str, floor: f64) -> Option<(&GazetteerEntry, f64)> {
        let needle = fragment.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }

        let mut best: Option<(usize, f64)> = None;
        for (index, candidate) in self.lowered.iter().enumerate() {
            let similarity = strsim::normalized_levenshtein(&needle, candidate);
            if similarity < floor {
                continue;
            }
            if best.map_or(true, |(_, current)| similarity > current) {
                best = Some((index, similarity));
            }
        }

        best.map(|(index, similarity)| (&self.entries[index], similarity))
    }
}

impl Default for Gazetteer {
    fn default() -> Self {
        Self::builtin()
    }
}
