use once_cell::sync::Lazy;
use regex::Regex;

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|pattern| Regex::new(pattern).expect("intent pattern must compile"))
        .collect()
}

/// Bare affirmatives only count when they are the whole message, so "sí
/// tiene patio?" or "bueno, también..." do not read as a go-ahead. A bare
/// "muéstrame" must end the message or take the listing as its object;
/// "muéstrame una casa de 3 habitaciones" is still a search.
pub static CONFIRMATION: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"^\W*(s[ií]|claro|vale|ok|okay|bueno|hecho|dale|de una|vamos|hazlo|listo|sim[oó]n|obvio|seguro|por supuesto|as[ií] es|acepto)\W*$",
        r"^\W*(s[ií] quiero|s[ií] deseo|s[ií] por favor|claro que s[ií]|confirm[oó])\b",
        r"\b(mu[eé]str[aá]mela|ens[eé]ñamela|d[eé]jamela ver|quiero verla|verla ya|verla ahora|verla pues|mostrarla|ver opciones|ver resultados|mostrar resultados|ver propiedad|ver la casa)\b",
        r"\b(a ver qu[eé] ten[eé]s|mu[eé]strame qu[eé] hay|suelta lo que tengas|t[ií]rame el dato|solt[aá] lo que tengas|mostrame lo que hay|ya pues|ya quiero verla|mostr[aá]mela ya|ya mismo|ya mu[eé]strala|ahora mu[eé]stramela)\b",
        r"\b(eso quiero|esa quiero|esa me interesa|acepto esa|quiero esa|esa est[aá] bien|esa me gusta|me gust[oó] esa|esa puede ser|esa me convence|me voy con esa)\b",
        r"\b(ver detalles|ver fotos|ver m[aá]s|ver info|ver informaci[oó]n|ver precio|ver ubicaci[oó]n|mostrar fotos|mostrar m[aá]s datos|ver link|ver mapa|ver todo|ver ficha)\b",
        r"\b(veamos esa|hazlo ya|mu[eé]strala|dale con esa|quiero ver esa)\b",
        r"\b(l[aá]nzate con esa|tira esa ya|dale con la que tengas|muestra lo que hay|t[ií]rate una|ya estoy listo|veamos esa vaina)\b",
        r"\b(puedo verla|me la puedes mostrar|la puedo ver|me muestras esa|me ense[ñn]as esa|me ense[ñn]as la casa|puedo ver opciones|me ense[ñn]as algo|hay algo para ver)\b",
        r"\b(ya quiero ver|quiero eso|vamos a eso|mostr[aá] ya|dale sin miedo)\b",
        r"\b(mu[eé]strame|ens[eé]ñame)([\s,]+(ya|pues|ahora|por favor|esa|ese|eso|la opci[oó]n|esa opci[oó]n|la propiedad|lo que tengas))*\W*$",
    ])
});

pub static INDIFFERENCE: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"\b(no me importa|me da igual|da lo mismo|me es indiferente|indiferente|no importa|sin preferencia|no tengo preferencia|ninguna en especial)\b",
        r"\b(cualquiera|lo que sea|el que sea|la que sea|como sea|lo que tengas|lo que haya|lo que salga)\b",
        r"\b(escoge t[uú]|elige t[uú]|t[uú] decides|usted diga|a tu criterio|como t[uú] veas)\b",
    ])
});

pub fn any_match(patterns: &[Regex], lowered: &str) -> bool {
    patterns.iter().any(|pattern| pattern.is_match(lowered))
}
