//! One conversational turn, end to end.
//!
//! The engine reads a private snapshot of the session, runs extraction and
//! intent detection without holding the store lock, and writes results back
//! through the store's own operations.

use std::sync::Arc;

use homecat_core::catalog::{Catalog, CatalogField};
use homecat_core::domain::conversation::{Role, SessionFlag, Turn};
use homecat_core::domain::property::Property;
use homecat_core::domain::slots::{SlotName, SlotSet};
use homecat_core::session::{Clock, SessionStore, SystemClock};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::extraction::chain::KnownLocations;
use crate::extraction::SlotExtractor;
use crate::intent::IntentClassifier;
use crate::llm::CompletionService;
use crate::prompt::{
    polish_reply, strip_invented_listings, FIRST_TURN_PERSONA, NO_INVENTION_NOTICE,
    REAL_LISTING_MARKER,
};

pub const APOLOGY: &str = "Hubo un problema generando la respuesta. Estoy organizando la \
información y en breve te mostraré las opciones disponibles.";
pub const ALMOST_READY: &str =
    "¡Estoy casi listo para mostrarte la propiedad ideal! Pero antes necesito un detalle más: ";
pub const GENERIC_SUGGESTION: &str =
    "¿Podrías darme un poco más de información para ayudarte mejor?";
pub const CATALOG_UNAVAILABLE: &str = "En este momento no puedo consultar las propiedades \
disponibles. ¿Te parece si lo intentamos de nuevo en un momento?";

/// Images shown on a listing card.
pub const CARD_IMAGES: usize = 3;

const LISTING_SUMMARY: &str = "\
Nombre: {{ title }}
Ciudad: {{ city }}
Barrio: {{ neighborhood }}
Precio: ${{ price }}
Tipo: {{ kind }}
Área: {{ area }} m²
Habitaciones: {{ bedrooms }}
Baños: {{ bathrooms }}
Parqueaderos: {{ parking }}";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PropertyCard {
    pub title: String,
    pub url: String,
    pub images: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    ListingShown,
    MissingDetails,
    Conversation,
    CatalogUnavailable,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TurnReply {
    pub text: String,
    pub card: Option<PropertyCard>,
    pub outcome: TurnOutcome,
    pub changed_slots: Vec<String>,
}

pub struct DialogueEngine<C = SystemClock> {
    store: Arc<SessionStore<C>>,
    extractor: Arc<SlotExtractor>,
    classifier: Arc<IntentClassifier>,
    catalog: Arc<dyn Catalog>,
    completion: Arc<dyn CompletionService>,
    listing_base_url: String,
}

impl<C: Clock> DialogueEngine<C> {
    pub fn new(
        store: Arc<SessionStore<C>>,
        extractor: Arc<SlotExtractor>,
        classifier: Arc<IntentClassifier>,
        catalog: Arc<dyn Catalog>,
        completion: Arc<dyn CompletionService>,
        listing_base_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            extractor,
            classifier,
            catalog,
            completion,
            listing_base_url: listing_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn store(&self) -> &Arc<SessionStore<C>> {
        &self.store
    }

    pub async fn handle_turn(&self, session_id: &str, message: &str) -> TurnReply {
        let snapshot = self.store.snapshot(session_id);
        let mut history = snapshot.history;
        if history.is_empty() {
            debug!(session_id, "first turn, adding persona");
            history.push(Turn::system(FIRST_TURN_PERSONA));
        }

        let extracted = self.extract(message, &snapshot.slots);
        let changed = self.store.update_slots(session_id, &extracted);
        let changed_slots = changed.iter().map(|name| name.as_str().to_string()).collect::<Vec<_>>();

        let slots = self.store.get_slots(session_id);
        let mut complete = slots.is_complete();
        self.store.set_flag(session_id, SessionFlag::SlotsComplete, complete);

        let mut ready = snapshot.flags.ready_to_show;
        if self.classifier.classify_confirmation(message) {
            info!(session_id, event_name = "dialogue.confirmation", "user asked to see a listing");
            self.store.set_flag(session_id, SessionFlag::ReadyToShow, true);
            ready = true;
        }

        if ready && complete {
            match self.catalog.find_best(&slots) {
                Ok(Some(listing)) => {
                    return self
                        .present_listing(session_id, message, history, listing, changed_slots)
                        .await;
                }
                Ok(None) => {
                    info!(session_id, event_name = "dialogue.no_match", "no listing matched the slots");
                }
                Err(error) => {
                    warn!(session_id, %error, "catalog lookup failed");
                    return self.record(
                        session_id,
                        message,
                        CATALOG_UNAVAILABLE.to_string(),
                        None,
                        TurnOutcome::CatalogUnavailable,
                        changed_slots,
                    );
                }
            }
        } else if ready {
            if self.classifier.classify_indifference(message) {
                let mut update = slots.clone();
                let filled = update.fill_missing_with_no_preference();
                self.store.update_slots(session_id, &update);
                info!(
                    session_id,
                    event_name = "dialogue.indifference",
                    filled = ?filled.iter().map(|name| name.as_str()).collect::<Vec<_>>(),
                    "missing slots marked as no preference"
                );
                complete = self.store.get_slots(session_id).is_complete();
                self.store.set_flag(session_id, SessionFlag::SlotsComplete, complete);
            } else {
                let text = format!("{ALMOST_READY}{}", next_suggestion(&slots));
                self.store.set_flag(session_id, SessionFlag::ReadyToShow, false);
                return self.record(
                    session_id,
                    message,
                    text,
                    None,
                    TurnOutcome::MissingDetails,
                    changed_slots,
                );
            }
        }

        let guard_invention = complete && !ready;
        if guard_invention {
            history.push(Turn::system(NO_INVENTION_NOTICE));
        }

        let mut reply = self.complete_or_apologise(session_id, message, &history).await;
        if guard_invention {
            reply = strip_invented_listings(&reply, &self.listing_titles());
        }
        let card = match self.catalog.mentioned_in(&reply) {
            Ok(found) => found.and_then(|listing| self.card_for(&listing)),
            Err(error) => {
                warn!(session_id, %error, "catalog lookup for mentioned listing failed");
                None
            }
        };

        let text = if reply.trim().is_empty() { APOLOGY.to_string() } else { polish_reply(&reply) };
        self.record(session_id, message, text, card, TurnOutcome::Conversation, changed_slots)
    }

    /// Slots found in `message` on top of `current`, using the catalog's
    /// own city and neighborhood names as a fallback vocabulary.
    pub fn extract(&self, message: &str, current: &SlotSet) -> SlotSet {
        self.extractor.extract_with_locations(message, current, &self.known_locations())
    }

    async fn present_listing(
        &self,
        session_id: &str,
        message: &str,
        mut history: Vec<Turn>,
        listing: Property,
        changed_slots: Vec<String>,
    ) -> TurnReply {
        info!(
            session_id,
            event_name = "dialogue.listing_found",
            listing_id = %listing.id.0,
            title = %listing.title,
            "presenting best listing"
        );

        match render_summary(&listing) {
            Ok(summary) => history.push(Turn::system(format!(
                "{REAL_LISTING_MARKER} de la propiedad más adecuada según lo que pidió el usuario:\n\
                 {summary}\n\
                 Redacta una respuesta natural, cálida y profesional como asesor humano, sin \
                 inventar nada. Incluye el nombre exacto de la propiedad. No repitas barrio y \
                 ciudad innecesariamente."
            ))),
            Err(error) => warn!(session_id, %error, "listing summary could not be rendered"),
        }

        let reply = self.complete_or_apologise(session_id, message, &history).await;
        self.store.set_flag(session_id, SessionFlag::ReadyToShow, false);
        let card = self.card_for(&listing);
        self.record(
            session_id,
            message,
            polish_reply(&reply),
            card,
            TurnOutcome::ListingShown,
            changed_slots,
        )
    }

    async fn complete_or_apologise(&self, session_id: &str, message: &str, history: &[Turn]) -> String {
        match self.completion.complete(message, history).await {
            Ok(text) => text,
            Err(error) => {
                warn!(session_id, error = %format!("{error:#}"), "completion failed, sending apology");
                APOLOGY.to_string()
            }
        }
    }

    fn record(
        &self,
        session_id: &str,
        message: &str,
        text: String,
        card: Option<PropertyCard>,
        outcome: TurnOutcome,
        changed_slots: Vec<String>,
    ) -> TurnReply {
        self.store.add_message(session_id, Role::User, message);
        self.store.add_message(session_id, Role::Assistant, text.clone());
        debug!(session_id, outcome = ?outcome, has_card = card.is_some(), "turn recorded");
        TurnReply { text, card, outcome, changed_slots }
    }

    fn known_locations(&self) -> KnownLocations {
        let lookup = |field: CatalogField| match self.catalog.lookup_distinct(field) {
            Ok(values) => values.into_iter().collect::<Vec<_>>(),
            Err(error) => {
                warn!(field = field.as_str(), %error, "catalog location lookup failed");
                Vec::new()
            }
        };
        KnownLocations::new(lookup(CatalogField::City), lookup(CatalogField::Neighborhood))
    }

    fn listing_titles(&self) -> Vec<String> {
        match self.catalog.listings() {
            Ok(listings) => listings.into_iter().map(|listing| listing.title).collect(),
            Err(error) => {
                warn!(%error, "catalog listing titles unavailable");
                Vec::new()
            }
        }
    }

    /// Card for a listing with a public page. Listings without a slug have
    /// nowhere to link to and get no card.
    pub fn card_for(&self, listing: &Property) -> Option<PropertyCard> {
        let slug = listing.slug.as_deref().map(str::trim).filter(|slug| !slug.is_empty())?;
        Some(PropertyCard {
            title: listing.title.clone(),
            url: format!("{}/{slug}/", self.listing_base_url),
            images: listing.preview_images(CARD_IMAGES),
        })
    }
}

fn next_suggestion(slots: &SlotSet) -> &'static str {
    slots
        .missing_required()
        .into_iter()
        .find(|name| !slots.is_filled(*name))
        .and_then(|name: SlotName| name.follow_up())
        .unwrap_or(GENERIC_SUGGESTION)
}

/// Plain-text listing summary handed to the model.
pub fn render_summary(listing: &Property) -> Result<String, tera::Error> {
    let missing = || "N/D".to_string();
    let mut context = tera::Context::new();
    context.insert("title", &listing.title);
    context.insert("city", &listing.city.clone().unwrap_or_else(missing));
    context.insert("neighborhood", &listing.neighborhood.clone().unwrap_or_else(missing));
    context.insert("price", &listing.price.map(group_thousands).unwrap_or_else(missing));
    context.insert("kind", &listing.property_type.clone().unwrap_or_else(missing));
    context.insert("area", &listing.area_m2.map(|value| value.to_string()).unwrap_or_else(missing));
    context.insert("bedrooms", &listing.bedrooms.map(|value| value.to_string()).unwrap_or_else(missing));
    context.insert(
        "bathrooms",
        &listing.bathrooms.map(|value| value.to_string()).unwrap_or_else(missing),
    );
    context.insert("parking", &listing.parking.map(|value| value.to_string()).unwrap_or_else(missing));
    tera::Tera::one_off(LISTING_SUMMARY, &context, false)
}

/// `1234567` becomes `1,234,567`.
pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::path::Path;
    use std::sync::Arc;

    use homecat_core::catalog::{Catalog, CatalogError, CatalogField, InMemoryCatalog};
    use homecat_core::domain::conversation::{Role, SessionFlag};
    use homecat_core::domain::property::Property;
    use homecat_core::domain::slots::{Slot, SlotSet};
    use homecat_core::gazetteer::Gazetteer;
    use homecat_core::session::{SessionSettings, SessionStore};

    use super::{
        group_thousands, render_summary, DialogueEngine, TurnOutcome, ALMOST_READY, APOLOGY,
        CATALOG_UNAVAILABLE,
    };
    use crate::embedding::HashingEmbedder;
    use crate::extraction::{ExtractionSettings, SlotExtractor};
    use crate::intent::{IntentClassifier, IntentSettings};
    use crate::llm::{CompletionService, FailingCompletion, ScriptedCompletion};
    use crate::prompt::{FIRST_TURN_PERSONA, NO_INVENTION_NOTICE, REAL_LISTING_MARKER};

    const LISTINGS: &str = r#"[
        {"id": "7", "titulo": "Casa Campestre El Vínculo", "slug": "casa-vinculo", "tipo": "Casa",
         "precio": 450000000, "barrio": "El Carmen", "ciudad": "Guadalajara de Buga",
         "area_m2": 150, "habitaciones": 3, "banos": 2, "carros": 1,
         "imagenes": ["https://img.example/a.jpg", "https://img.example/b.jpg",
                      "https://img.example/c.jpg", "https://img.example/d.jpg"]},
        {"id": "8", "titulo": "Apartamento Torre Sur", "tipo": "Apartamento",
         "precio": 210000000, "barrio": "Santa Rita", "ciudad": "Guadalajara de Buga",
         "area_m2": 70, "habitaciones": 2, "banos": 2}
    ]"#;

    const FULL_REQUEST: &str =
        "Busco una casa en El Carmen con 3 habitaciones, 2 baños y 120 m2";

    fn catalog() -> Arc<dyn Catalog> {
        Arc::new(InMemoryCatalog::from_json_str(LISTINGS, Path::new("inline.json")).unwrap())
    }

    fn engine(
        catalog: Arc<dyn Catalog>,
        completion: Arc<dyn CompletionService>,
    ) -> DialogueEngine {
        let embedder = Arc::new(HashingEmbedder::default());
        DialogueEngine::new(
            Arc::new(SessionStore::new(SessionSettings::default())),
            Arc::new(SlotExtractor::new(
                Arc::new(Gazetteer::builtin()),
                embedder.clone(),
                ExtractionSettings::default(),
            )),
            Arc::new(IntentClassifier::new(embedder, IntentSettings::default())),
            catalog,
            completion,
            "https://listings.example/inmueble/",
        )
    }

    #[tokio::test]
    async fn first_turn_sends_persona_but_stores_only_the_exchange() {
        let completion = Arc::new(ScriptedCompletion::new(["¡Hola! ¿Qué buscas?"]));
        let engine = engine(catalog(), completion.clone());

        let reply = engine.handle_turn("s1", "hola").await;

        assert_eq!(reply.text, "¡Hola! ¿Qué buscas?");
        assert_eq!(reply.outcome, TurnOutcome::Conversation);
        let requests = completion.requests();
        assert_eq!(requests[0].1[0].content, FIRST_TURN_PERSONA);
        let history = engine.store().get_history("s1");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn confirmation_with_complete_slots_presents_the_best_listing() {
        let completion = Arc::new(ScriptedCompletion::new([
            "Anotado.",
            "Asesor: Te va a encantar la Casa Campestre El Vínculo (descripción).",
        ]));
        let engine = engine(catalog(), completion.clone());

        let first = engine.handle_turn("s1", FULL_REQUEST).await;
        assert!(first.changed_slots.contains(&"tipo".to_string()));
        assert!(engine.store().get_flags("s1").slots_complete);

        let reply = engine.handle_turn("s1", "dale, muéstramela").await;

        assert_eq!(reply.outcome, TurnOutcome::ListingShown);
        let card = reply.card.unwrap();
        assert_eq!(card.title, "Casa Campestre El Vínculo");
        assert_eq!(card.url, "https://listings.example/inmueble/casa-vinculo/");
        assert_eq!(card.images.len(), 3);
        assert!(!reply.text.contains("(descripción)"));
        assert!(!engine.store().get_flags("s1").get(SessionFlag::ReadyToShow));

        let requests = completion.requests();
        let summary = requests[1].1.last().unwrap();
        assert!(summary.content.starts_with(REAL_LISTING_MARKER));
        assert!(summary.content.contains("Nombre: Casa Campestre El Vínculo"));
        assert!(summary.content.contains("Precio: $450,000,000"));
    }

    #[tokio::test]
    async fn confirmation_with_missing_slots_asks_for_the_first_one() {
        let completion = Arc::new(ScriptedCompletion::new(Vec::<String>::new()));
        let engine = engine(catalog(), completion.clone());

        let reply = engine.handle_turn("s1", "muéstrame algo ya").await;

        assert_eq!(reply.outcome, TurnOutcome::MissingDetails);
        assert!(reply.text.starts_with(ALMOST_READY));
        assert!(reply.text.contains("qué tipo de propiedad"));
        assert!(completion.requests().is_empty());
        assert!(!engine.store().get_flags("s1").ready_to_show);
        assert_eq!(engine.store().get_history("s1").len(), 2);
    }

    #[tokio::test]
    async fn indifference_marks_missing_slots_as_no_preference() {
        let completion = Arc::new(ScriptedCompletion::new(["Perfecto."]));
        let engine = engine(catalog(), completion.clone());

        let reply = engine.handle_turn("s1", "una casa, muéstrame lo que sea, me da igual").await;

        assert_eq!(reply.outcome, TurnOutcome::Conversation);
        let slots = engine.store().get_slots("s1");
        assert_eq!(slots.bedrooms, Slot::NoPreference);
        assert_eq!(slots.city, Slot::NoPreference);
        assert!(slots.property_type.has_value());
        assert_eq!(completion.requests().len(), 1);
    }

    #[tokio::test]
    async fn complete_but_unconfirmed_turns_forbid_invented_listings() {
        let completion = Arc::new(ScriptedCompletion::new(["Anotado.", "¿Algo más?"]));
        let engine = engine(catalog(), completion.clone());

        engine.handle_turn("s1", FULL_REQUEST).await;
        engine.handle_turn("s1", "tengo dos perros").await;

        let requests = completion.requests();
        assert_eq!(requests[1].1.last().unwrap().content, NO_INVENTION_NOTICE);
    }

    #[tokio::test]
    async fn completion_failure_becomes_the_apology() {
        let engine = engine(catalog(), Arc::new(FailingCompletion));
        let reply = engine.handle_turn("s1", "hola").await;

        assert_eq!(reply.text, APOLOGY);
        assert_eq!(engine.store().get_history("s1")[1].content, APOLOGY);
    }

    #[tokio::test]
    async fn model_mentioning_a_real_listing_gets_its_card() {
        let completion = Arc::new(ScriptedCompletion::new([
            "Tenemos el Apartamento Torre Sur, sin slug aún.",
            "La casa campestre el vínculo es preciosa.",
        ]));
        let engine = engine(catalog(), completion);

        assert!(engine.handle_turn("s1", "hola").await.card.is_none());
        let reply = engine.handle_turn("s1", "¿qué tienen?").await;
        assert_eq!(reply.card.unwrap().title, "Casa Campestre El Vínculo");
    }

    struct BrokenCatalog;

    impl Catalog for BrokenCatalog {
        fn lookup_distinct(&self, _field: CatalogField) -> Result<BTreeSet<String>, CatalogError> {
            Err(CatalogError::Unavailable("database offline".to_string()))
        }

        fn find_best(&self, _slots: &SlotSet) -> Result<Option<Property>, CatalogError> {
            Err(CatalogError::Unavailable("database offline".to_string()))
        }

        fn listings(&self) -> Result<Vec<Property>, CatalogError> {
            Err(CatalogError::Unavailable("database offline".to_string()))
        }
    }

    #[tokio::test]
    async fn catalog_failures_never_reach_the_user() {
        let completion = Arc::new(ScriptedCompletion::new(["Anotado."]));
        let engine = engine(Arc::new(BrokenCatalog), completion);

        let first = engine.handle_turn("s1", FULL_REQUEST).await;
        assert_eq!(first.outcome, TurnOutcome::Conversation);

        let reply = engine.handle_turn("s1", "muéstramela").await;
        assert_eq!(reply.outcome, TurnOutcome::CatalogUnavailable);
        assert_eq!(reply.text, CATALOG_UNAVAILABLE);
        assert!(!reply.text.contains("offline"));
    }

    #[test]
    fn summary_fills_gaps_and_groups_digits() {
        let catalog = InMemoryCatalog::from_json_str(LISTINGS, Path::new("inline.json")).unwrap();
        let listing = catalog.listings().unwrap().remove(1);
        let summary = render_summary(&listing).unwrap();

        assert!(summary.contains("Precio: $210,000,000"));
        assert!(summary.contains("Parqueaderos: N/D"));
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1_000), "1,000");
    }
}
