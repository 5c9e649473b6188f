//! Keyword intent classification for the storefront assistant.
//!
//! The assistant is deliberately deterministic: the same message always
//! yields the same intent and the same reply. Classification lowercases the
//! message, folds the French accents the keyword tables use, and scans the
//! intents in a fixed priority order; the first table with a hit wins.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Pricing,
    Delivery,
    BoxContents,
    Wellbeing,
    Greeting,
    Fallback,
}

/// Priority order matters: a message like "combien coûte la box" must hit
/// `Pricing` before the `box` keyword can pull it into `BoxContents`, and a
/// greeting followed by a real question must answer the question.
const INTENT_TABLE: &[(Intent, &[&str])] = &[
    (
        Intent::Pricing,
        &[
            "prix", "tarif", "combien", "cout", "coute", "abonnement", "euro", "€",
        ],
    ),
    (
        Intent::Delivery,
        &[
            "livraison",
            "livrer",
            "livre",
            "delai",
            "expedition",
            "expedie",
            "envoi",
            "colis",
            "recevoir",
        ],
    ),
    (
        Intent::BoxContents,
        &[
            "contenu",
            "contient",
            "dedans",
            "composition",
            "produits",
            "coffret",
            "box",
        ],
    ),
    (
        Intent::Wellbeing,
        &[
            "bien-etre",
            "bien etre",
            "stress",
            "qvt",
            "detente",
            "relaxation",
            "sommeil",
            "ergonomie",
        ],
    ),
    (
        Intent::Greeting,
        &["bonjour", "salut", "hello", "coucou", "bonsoir"],
    ),
];

/// Classifies a free-text message into an [`Intent`].
#[must_use]
pub fn classify(message: &str) -> Intent {
    let folded = fold(message);
    for (intent, keywords) in INTENT_TABLE {
        if keywords.iter().any(|k| folded.contains(k)) {
            return *intent;
        }
    }
    Intent::Fallback
}

/// The fixed reply for an intent.
#[must_use]
pub fn reply_for(intent: Intent) -> &'static str {
    match intent {
        Intent::Pricing => {
            "Nos box démarrent à 29,90 € et chaque fiche produit affiche son tarif exact. \
             Les commandes de 80 € ou plus sont livrées sans frais de port."
        }
        Intent::Delivery => {
            "Les commandes sont préparées en France et expédiées sous 48 h ouvrées. \
             La livraison est offerte dès 80 € d'achat, sinon 5,90 € de frais de port."
        }
        Intent::BoxContents => {
            "Chaque box réunit des produits bien-être sourcés en France : le détail \
             complet (produits, origine, variantes) est sur la fiche de chaque box."
        }
        Intent::Wellbeing => {
            "Nos box sont pensées pour la qualité de vie au travail : détente, sommeil, \
             ergonomie… Filtrez le catalogue par tag pour trouver la thématique adaptée."
        }
        Intent::Greeting => {
            "Bonjour ! Posez-moi une question sur les box, les tarifs ou la livraison."
        }
        Intent::Fallback => {
            "Je n'ai pas la réponse exacte à cette question. Écrivez-nous via la page \
             contact et l'équipe vous répond rapidement."
        }
    }
}

/// Lowercases and strips the accents used by the keyword tables.
fn fold(message: &str) -> String {
    message
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'à' | 'â' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'î' | 'ï' => 'i',
            'ô' | 'ö' => 'o',
            'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            _ => c,
        })
        .collect()
}
