//! Offensive-language check for review comments.
//!
//! Text is lowercased, Portuguese accents are folded to their base letter and
//! every word is stripped down to ASCII letters and digits before it is looked
//! up in [`BLOCKED_WORDS`]. Matching is per word, so ordinary words that merely
//! contain a short entry ("curso", "analise") pass.

const BLOCKED_WORDS: &[&str] = &[
    "anal", "anus", "arrombada", "arrombado", "babaovo", "babaca", "bagos", "baitola", "bicha",
    "bixa", "boazuda", "boceta", "boiola", "bolagato", "boquete", "bosta", "brioco", "bronha",
    "buceta", "bunda", "bundao", "bundudo", "burra", "burro", "busseta", "cabaco", "cabrao",
    "cagar", "cagado", "cagao", "canalha", "caralho", "krl", "cacete", "kct", "corna", "corno",
    "cornudo", "chereca", "cherereca", "chifruda", "chifrudo", "chota", "chupa", "chupada",
    "chupado", "clitoris", "cocaina", "coco", "cu", "cuzinho", "cuzao", "desgraca", "drogado",
    "energumeno", "enfia", "estupida", "estupidez", "estupido", "estupro", "fiofo", "foda",
    "fodendo", "foder", "fodase", "fodeu", "fodida", "fodido", "fornicar", "fudendo", "fuder",
    "fudida", "fudido", "furo", "furona", "furnicar", "gaiato", "gay", "gonorreia", "grelinho",
    "grelo", "gozada", "gozado", "gozar", "herege", "idiota", "idiotice", "imbecil", "iscroto",
    "ladrao", "lambe", "lesbica", "macaca", "macaco", "maconha", "masturba", "masturbacao",
    "merda", "merdinha", "mija", "mijada", "mijado", "mijo", "mocreia", "mongol", "nadegas",
    "paspalhao", "peido", "pemba", "penis", "pentelha", "pentelho", "perereca", "peru", "pica",
    "picao", "pila", "pinto", "pintudo", "piranha", "piroca", "piru", "porno", "porra", "prega",
    "prostituta", "prostituto", "punheta", "punheteiro", "pustula", "puta", "puto", "puxasaco",
    "pqp", "putaquepariu", "rabo", "rabudo", "rabuda", "racha", "retardada", "retardado", "rola",
    "rosca", "sapatao", "siririca", "tarada", "tarado", "testuda", "tesuda", "tezuda", "transar",
    "trocha", "troucha", "trouxa", "troxa", "trolha", "vaca", "vadia", "vagabunda", "vagabundo",
    "vagina", "veada", "veado", "viada", "viado", "xana", "xaninha", "xavasca", "xereca", "xexeca",
    "xochota", "xota", "xoxota", "fdp", "filadaputa", "vsf", "vaisifoder", "tnc", "tomarnocu",
    "otario", "otaria", "cretino", "cretina", "vigarista", "pilantra", "escroto", "escrota",
    "ridiculo", "ridicula", "nojento", "nojenta", "lixo", "verme",
];

fn fold(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        other => other,
    }
}

fn normalize_word(word: &str) -> String {
    word.chars()
        .flat_map(char::to_lowercase)
        .map(fold)
        .filter(char::is_ascii_alphanumeric)
        .collect()
}

/// Whether any word of `text` is on the blocked list.
#[must_use]
pub fn contains_profanity(text: &str) -> bool {
    text.split_whitespace()
        .map(normalize_word)
        .any(|word| BLOCKED_WORDS.contains(&word.as_str()))
}
