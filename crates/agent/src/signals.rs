//! Pure extractors over raw message text and a catalog snapshot. Every
//! ambiguity here is resolved by a documented ordering rule, never by error.

use std::sync::OnceLock;

use regex::Regex;

use mercabot_core::Product;

/// Phone patterns in priority order. Mobile numbers (optionally carrying the
/// 591 country prefix) win over the separator form, which wins over the
/// generic 8-digit sequence, so prices and quantities written as digit runs
/// lose to anything that looks like a real local mobile number.
const PHONE_PATTERNS: [&str; 3] =
    [r"\b(?:591)?[67][0-9]{7}\b", r"\b\d{4}[-\s]\d{4}\b", r"\b\d{8}\b"];

fn phone_regexes() -> &'static Vec<Regex> {
    static REGEXES: OnceLock<Vec<Regex>> = OnceLock::new();
    REGEXES.get_or_init(|| {
        PHONE_PATTERNS
            .iter()
            .filter_map(|pattern| Regex::new(pattern).ok())
            .collect()
    })
}

fn integer_regex() -> Option<&'static Regex> {
    static REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"\b(\d+)\b").ok()).as_ref()
}

fn number_word_regex() -> Option<&'static Regex> {
    static REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    REGEX
        .get_or_init(|| {
            Regex::new(r"\b(uno|una|dos|tres|cuatro|cinco|seis|siete|ocho|nueve|diez)\b").ok()
        })
        .as_ref()
}

/// First phone-like substring, by pattern priority then scan order,
/// normalized to bare digits with the country prefix stripped.
pub fn detect_phone(text: &str) -> Option<String> {
    for regex in phone_regexes() {
        if let Some(found) = regex.find(text) {
            return Some(normalize_phone(found.as_str()));
        }
    }
    None
}

fn normalize_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(|ch| ch.is_ascii_digit()).collect();
    if digits.len() == 11 {
        if let Some(stripped) = digits.strip_prefix("591") {
            return stripped.to_string();
        }
    }
    digits
}

/// Spelled-out number words (uno..diez) first, then the first standalone
/// integer literal. Word matches are whole-word so "todos" never reads as 2.
pub fn detect_quantity(text: &str) -> Option<u32> {
    let lowered = text.to_lowercase();

    if let Some(found) = number_word_regex().and_then(|regex| regex.find(&lowered)) {
        let value = match found.as_str() {
            "uno" | "una" => 1,
            "dos" => 2,
            "tres" => 3,
            "cuatro" => 4,
            "cinco" => 5,
            "seis" => 6,
            "siete" => 7,
            "ocho" => 8,
            "nueve" => 9,
            _ => 10,
        };
        return Some(value);
    }

    integer_regex()
        .and_then(|regex| regex.captures(&lowered))
        .and_then(|captures| captures.get(1))
        .and_then(|group| group.as_str().parse::<u32>().ok())
}

/// First sellable product (catalog order, which the store keeps sorted by
/// display name) with any keyword contained in the lowercased message.
pub fn detect_product<'a>(text: &str, catalog: &'a [Product]) -> Option<&'a Product> {
    let lowered = text.to_lowercase();
    catalog.iter().filter(|product| product.sellable()).find(|product| {
        product.keywords.iter().any(|keyword| lowered.contains(&keyword.to_lowercase()))
    })
}

pub const NEGOTIATION_KEYWORDS: [&str; 15] = [
    "nada menos",
    "descuento",
    "rebaja",
    "barato",
    "más barato",
    "mas barato",
    "promocion",
    "promoción",
    "oferta",
    "menos precio",
    "precio mejor",
    "más económico",
    "mas economico",
    "algo menos",
    "no hay descuento",
];

pub const DELIVERY_KEYWORDS: [&str; 7] =
    ["entrega", "delivery", "domicilio", "entregan", "envio", "envío", "traen"];

pub const PICKUP_KEYWORDS: [&str; 5] =
    ["recoger", "pasar a recoger", "puedo pasar", "voy a recoger", "recojo"];

pub const PHONE_REQUEST_KEYWORDS: [&str; 4] =
    ["su telefono", "tu telefono", "mandeme su telefono", "dame tu numero"];

pub const CONFIRMATION_KEYWORDS: [&str; 8] =
    ["ok", "está bien", "esta bien", "bueno", "dale", "sale", "si me parece", "me parece bien"];

pub const THANKS_KEYWORDS: [&str; 4] = ["gracias", "graciad", "grax", "thank"];

pub const GOODBYE_KEYWORDS: [&str; 6] =
    ["chau", "adiós", "adios", "hasta luego", "nos vemos", "bye"];

pub const PRICE_KEYWORDS: [&str; 19] = [
    "precio",
    "cuesta",
    "vale",
    "cuanto",
    "cuánto",
    "costa",
    "costo",
    "están",
    "estan",
    "cuanto sale",
    "cuánto sale",
    "a cuanto",
    "a cuánto",
    "que precio",
    "qué precio",
    "cuanto vale",
    "cuánto vale",
    "que cuesta",
    "qué cuesta",
];

pub const GREETING_KEYWORDS: [&str; 4] = ["hola", "buenos", "buenas", "saludos"];

pub const INTEREST_KEYWORDS: [&str; 5] =
    ["busco", "necesito", "quiero comprar", "me interesa", "quisiera"];

/// Case-insensitive substring intersection against a keyword set.
pub fn contains_any(text: &str, keywords: &[&str]) -> bool {
    let lowered = text.to_lowercase();
    keywords.iter().any(|keyword| lowered.contains(keyword))
}
