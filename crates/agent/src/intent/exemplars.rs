//! Example phrases compared against user messages by embedding similarity.
//!
//! Bump [`EXEMPLAR_CORPUS_VERSION`] whenever a list changes so cached
//! vectors are never mixed across corpora.

pub const EXEMPLAR_CORPUS_VERSION: &str = "es-3";

/// Willingness to see the best match now. Phrases naming a property type
/// are left out so plain search requests do not read as confirmations, and
/// so are thanks and closings, which do not ask for anything.
pub const CONFIRMATION: &[&str] = &[
    "muéstramela",
    "muéstrame",
    "dale",
    "claro",
    "sí",
    "por supuesto",
    "quiero verla",
    "enséñamela",
    "quiero ver opciones",
    "ver resultados",
    "sí quiero verla",
    "claro que sí, muéstramela",
    "me gustaría verla",
    "podrías mostrármela",
    "déjamela ver",
    "la quiero ver",
    "sí, quiero verla",
    "dale, muéstramela",
    "de una, enséñamela",
    "a ver qué tenés",
    "muéstrame qué hay",
    "que no se diga más, muéstrala",
    "qué opciones tienes por ahí",
    "tírame el dato",
    "soltá lo que tengas",
    "mostrame lo que hay",
    "ya pues, enséñamela",
    "esa me sirve",
    "me interesa esa opción",
    "me gustó esa",
    "suena buena, quiero verla",
    "esa podría funcionar",
    "esa está bien",
    "esa puede ser",
    "me llamó la atención esa",
    "esa pinta bien",
    "creo que esa me interesa",
    "verla",
    "quiero ver eso",
    "ok, muéstrala",
    "hazlo",
    "muéstrame ya",
    "veámosla",
    "dale pues",
    "listo, quiero verla",
    "bueno, veamos esa",
    "quiero ver detalles",
    "muéstrame fotos",
    "ver más información",
    "quiero más datos",
    "quiero saber más",
    "muéstrame el link",
    "ver ubicación",
    "ver fotos y precio",
    "me interesa conocer más detalles",
    "¿me la puedes mostrar?",
    "¿sería posible verla?",
    "quisiera más información sobre esa opción",
    "¿puede enviarme los detalles?",
    "esa opción está bien",
    "quiero verla mejor",
    "quiero analizarla",
    "quiero revisar esa",
    "me quedo con esa",
    "con esa opción me quedo",
    "esa está buena",
    "esa me convence",
    "cerramos con esa",
    "de una, esa es",
    "va esa",
];

/// No preference for whatever the assistant is asking about.
pub const INDIFFERENCE: &[&str] = &[
    "no me importa",
    "me da igual",
    "cualquiera está bien",
    "lo que tengas",
    "no tengo preferencia",
    "puede ser cualquiera",
    "no importa cuál",
    "estoy abierto a opciones",
    "sorpréndeme",
    "lo que sea",
    "el que sea",
    "como sea",
    "me sirve cualquiera",
    "la que tengas",
    "lo que me muestres",
    "da lo mismo",
    "no soy exigente",
    "el que salga está bien",
    "lo que salga",
    "como caiga",
    "eso no importa mucho",
    "no me fijo en eso",
    "con lo que haya está bien",
    "no tengo lío con eso",
    "lo que se pueda",
    "no tengo problema",
    "lo que aparezca",
    "no tengo rollo con eso",
    "con lo que consigas me sirve",
    "eso no es tan relevante para mí",
    "eso no es prioridad",
    "no tengo una idea clara de eso",
    "lo que haya disponible",
    "me acomodo a lo que haya",
    "escoja por mí",
    "usted diga",
    "usted verá",
    "me dejo guiar",
    "lo que usted vea",
    "escoja la que crea mejor",
    "confío en lo que me muestres",
    "todo bien con cualquiera",
    "no soy tan exigente en eso",
    "no importa mucho ese detalle",
    "déjalo al azar jaja",
    "no tengo una preferencia fija",
    "lo que te parezca bien",
    "me acomodo fácil",
    "con que sea decente, me sirve",
    "lo que tú digas",
    "elige tú",
    "cualquiera me funciona",
    "la que tú creas mejor",
    "yo no escojo, tú decide",
    "la que te parezca bien",
    "dale a cualquiera",
    "escoge tú",
    "no tengo inclinación",
    "todas me parecen bien",
    "como tú veas",
    "no me decido, elige por mí",
    "que sea lo que Dios quiera",
    "todas suenan bien",
    "ninguna en especial",
    "la que quieras mostrar",
    "como tú prefieras",
    "tú mandas",
    "a tu criterio",
    "a mí me da lo mismo",
    "lánzate con la que sea",
    "saca una al azar",
    "el destino dirá",
    "lo que caiga primero",
    "escoge con los ojos cerrados",
    "me lanzo a lo que sea",
    "esa vaina me da igual",
    "yo le jalo a todo",
    "esa vuelta no me afecta",
    "eso no me quita el sueño",
    "yo me dejo llevar",
    "lo que quieras mostrar primero",
    "échale suerte",
    "tú verás qué me das",
    "tírate una cualquiera",
    "el azar manda",
    "confío en tu criterio",
    "muéstrame lo que tú creas",
    "yo te sigo",
    "lo que tú escojas está bien",
    "me adapto",
    "a mí todo me parece",
    "lo que tú veas conveniente",
    "muéstrame cualquier opción",
    "tú decides por mí",
    "la que tú prefieras",
    "igual me va a tocar",
    "todo me da lo mismo",
    "ni idea, lo que sea",
    "no sé, escoge tú",
    "yo ni opino, muéstrame nomás",
];
