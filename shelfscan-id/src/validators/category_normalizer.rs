//! Category Normalizer
//!
//! Maps free-text category strings (any source language, any casing) onto
//! the closed [`Category`] taxonomy by keyword containment. Categories are
//! tested in a fixed order and the first match wins, so "água sanitária"
//! lands in Cleaning before Beverages ever sees "água".
//!
//! Every category's keyword list contains its own lowercase canonical name,
//! which makes normalization idempotent.

use crate::types::Category;

/// Keyword table in test order (Other has no keywords and is the fallback)
const KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::Cleaning,
        &[
            "cleaning", "limpeza", "detergent", "detergente", "sanitária", "sanitaria",
            "desinfetante", "disinfectant", "bleach", "alvejante", "sabão em pó", "amaciante",
            "fabric softener", "multiuso",
        ],
    ),
    (
        Category::Hygiene,
        &[
            "hygiene", "higiene", "shampoo", "condicionador", "conditioner", "sabonete", "soap",
            "creme dental", "toothpaste", "desodorante", "deodorant", "fralda", "diaper",
            "absorvente", "papel higiênico", "toilet paper", "perfumaria", "cosmetic",
        ],
    ),
    (
        Category::Automotive,
        &[
            "automotive", "automotivo", "motor oil", "óleo de motor", "lubrificante",
            "lubricant", "pneu", "tire", "car care", "aditivo para radiador",
        ],
    ),
    (
        Category::Beverages,
        &[
            "beverages", "beverage", "bebida", "drink", "refrigerante", "soda", "suco", "juice",
            "água", "agua", "water", "cerveja", "beer", "vinho", "wine", "coffee", "café",
            "energético", "isotônico",
        ],
    ),
    (
        Category::Dairy,
        &[
            "dairy", "laticínio", "laticinio", "leite", "milk", "queijo", "cheese", "iogurte",
            "yogurt", "manteiga", "butter", "requeijão", "creme de leite",
        ],
    ),
    (
        Category::Food,
        &[
            "food", "alimento", "alimentos", "mercearia", "grocery", "snack", "biscoito",
            "cookie", "cereal", "arroz", "rice", "feijão", "beans", "massa", "pasta",
            "macarrão", "chocolate", "candy", "doce", "molho", "sauce", "tempero", "spice",
            "farinha", "flour", "açúcar", "sugar", "carne", "meat", "congelado", "frozen",
            "enlatado", "canned",
        ],
    ),
    (
        Category::Electronics,
        &[
            "electronics", "eletrônico", "eletronico", "eletrônicos", "smartphone", "celular",
            "headphone", "fone de ouvido", "charger", "carregador", "battery", "pilha",
            "bateria", "cabo usb", "usb cable", "television", "televisão", "notebook",
            "computer",
        ],
    ),
    (
        Category::Apparel,
        &[
            "apparel", "vestuário", "vestuario", "clothing", "roupa", "camiseta", "t-shirt",
            "shirt", "camisa", "calça", "pants", "jeans", "vestido", "dress", "jacket",
            "jaqueta", "shoe", "sapato", "tênis", "sneaker", "sock", "meia", "moda", "fashion",
        ],
    ),
    (
        Category::Construction,
        &[
            "construction", "construção", "construcao", "cimento", "cement", "tinta",
            "paint", "ferramenta", "tool", "parafuso", "screw", "argamassa", "hardware",
            "material de construção",
        ],
    ),
];

/// Normalize free text to a [`Category`]
///
/// Missing, blank and unmatched input all map to [`Category::Other`].
pub fn normalize_category(text: Option<&str>) -> Category {
    let Some(text) = text else {
        return Category::Other;
    };

    let lowered = text.trim().to_lowercase();
    if lowered.is_empty() {
        return Category::Other;
    }

    KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lowered.contains(k)))
        .map(|(category, _)| *category)
        .unwrap_or(Category::Other)
}
