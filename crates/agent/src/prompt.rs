//! Prompt assembly for the completion backend and cleanup of what comes back.

use homecat_core::domain::conversation::{Role, Turn};
use once_cell::sync::Lazy;
use regex::Regex;

/// Turns of history included in a prompt.
pub const HISTORY_WINDOW: usize = 6;

/// Sequences that end generation before the model starts writing the next
/// speaker's turn.
pub const STOP_SEQUENCES: &[&str] = &[
    "Usuario:",
    "Asesor:",
    "<</SYS>>",
    "\nUsuario",
    "\nAsesor",
    "Sistema:",
    "\nSistema",
    "System:",
    "\nSystem",
];

/// Marker that opens the system turn carrying a real listing.
pub const REAL_LISTING_MARKER: &str = "Estos son los datos REALES";

/// Template used when no prompt template file is configured.
pub const DEFAULT_TEMPLATE: &str = "\
Eres un asesor inmobiliario de Guadalajara de Buga. Respondes siempre en español, \
con frases cortas, cálidas y profesionales.
Tu objetivo es entender qué propiedad busca el usuario: tipo, ciudad, barrio, \
habitaciones, baños y área aproximada.
Pregunta por un solo dato a la vez y no repitas lo que el usuario ya dijo.
Nunca inventes propiedades, precios, direcciones ni enlaces. Solo describes una \
propiedad cuando el sistema te entrega sus datos reales.
No escribas notas entre paréntesis ni hables como si fueras el usuario.";

/// System turn prepended on the first message of a session.
pub const FIRST_TURN_PERSONA: &str = "Eres un asesor inmobiliario profesional, empático y humano. \
Tu trabajo es conversar de forma natural para entender las necesidades del usuario. \
No puedes mostrar propiedades hasta que el sistema te las entregue explícitamente. \
No inventes información, no hagas promesas implícitas ni digas frases como 'estoy buscando'. \
Adáptate al tono del usuario y mantén una conversación fluida, útil y realista.";

/// System turn added when every slot is known but the user has not asked to
/// see a listing yet.
pub const NO_INVENTION_NOTICE: &str = "Aunque el usuario ha proporcionado suficientes datos para \
encontrar una propiedad, NO debes inventar ninguna propiedad ni suponer resultados. Espera a que \
el usuario confirme explícitamente que desea ver las propiedades. Puedes seguir conversando \
normalmente.";

static INSTRUCTION_ASIDE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\(([^()]*instrucci[oó]n[^()]*)\)").expect("aside pattern must compile")
});
static PARENTHESES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\([^)]*\)").expect("parentheses pattern must compile"));
static SPEAKER_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(usuarioa|usuario|usuro|user)[\s:\-]*").expect("prefix pattern must compile")
});
static SPEAKER_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|[\r\n]+)(sistema:|asesor:|usuario:|system:)\s*")
        .expect("label pattern must compile")
});
static INVENTED_INTRO: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)te (presento|muestro|recomiendo|sugiero)[^.:!]*[:.]?",
        r"(?i)una opci[oó]n podr[ií]a ser[^.:!]*[:.]?",
        r"(?i)esta propiedad llamada[^.:!]*[:.]?",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("invented listing pattern must compile"))
    .collect()
});

fn label(role: Role) -> &'static str {
    match role {
        Role::User => "Usuario",
        Role::Assistant => "Asesor",
        Role::System => "Sistema",
    }
}

/// Removes parenthesised asides that mention an instruction.
pub fn strip_instruction_asides(text: &str) -> String {
    INSTRUCTION_ASIDE.replace_all(text, "").into_owned()
}

/// Removes every parenthesised span.
pub fn strip_parentheses(text: &str) -> String {
    PARENTHESES.replace_all(text, "").trim().to_string()
}

/// Drops a leading "Usuario:"-style label the model sometimes echoes.
pub fn strip_speaker_prefix(text: &str) -> String {
    SPEAKER_PREFIX.replace(text.trim(), "").into_owned()
}

/// Llama-style prompt: template, the last [`HISTORY_WINDOW`] turns, then the
/// new user message and an open assistant label.
pub fn build_prompt(user_input: &str, history: &[Turn], template: &str) -> String {
    let start = history.len().saturating_sub(HISTORY_WINDOW);
    let mut transcript = String::new();
    for turn in &history[start..] {
        let mut content = strip_instruction_asides(&turn.content);
        if turn.role == Role::Assistant {
            content = strip_parentheses(&content);
        }
        transcript.push_str(label(turn.role));
        transcript.push_str(": ");
        transcript.push_str(content.trim());
        transcript.push('\n');
    }

    format!(
        "<<SYS>>\n{}\n<</SYS>>\n\n{}\nUsuario: {}\nAsesor:",
        template.trim(),
        transcript.trim(),
        user_input.trim()
    )
    .trim()
    .to_string()
}

/// Removes speaker labels from raw model output. `None` when nothing is left.
pub fn clean_completion(raw: &str) -> Option<String> {
    let cleaned = SPEAKER_LABEL.replace_all(raw.trim(), "").trim().to_string();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Final pass over a reply before the user sees it.
pub fn polish_reply(text: &str) -> String {
    strip_speaker_prefix(&strip_parentheses(text))
}

/// Whether the history carries a real listing summary for this turn.
pub fn has_real_listing(history: &[Turn]) -> bool {
    history.iter().any(|turn| {
        turn.role == Role::System
            && turn.content.to_lowercase().contains(&REAL_LISTING_MARKER.to_lowercase())
    })
}

/// Removes "te presento..." style introductions and "casa #..." lines that
/// do not name a real listing.
pub fn strip_invented_listings(text: &str, real_titles: &[String]) -> String {
    let mut cleaned = text.to_string();
    for pattern in INVENTED_INTRO.iter() {
        cleaned = pattern.replace_all(&cleaned, "").into_owned();
    }

    let titles = real_titles
        .iter()
        .map(|title| title.trim().to_lowercase())
        .filter(|title| !title.is_empty())
        .collect::<Vec<_>>();

    cleaned
        .lines()
        .filter(|line| {
            let lowered = line.to_lowercase();
            titles.iter().any(|title| lowered.contains(title.as_str()))
                || !(lowered.contains("casa") && lowered.contains('#'))
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
