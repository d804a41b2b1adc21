//! Normalisation des en-têtes de colonnes en clés camelCase

use std::fmt;

use serde::{Deserialize, Serialize};

/// Clé normalisée issue d'un en-tête de colonne.
///
/// Commence par une lettre minuscule et ne contient que des caractères
/// alphanumériques ASCII. Une clé vide signale une colonne sans clé stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeaderKey(String);

impl HeaderKey {
    /// Normalise un en-tête brut
    pub fn new(header: &str) -> Self {
        normalize(header)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Colonne sans clé exploitable (aucun caractère alphanumérique)
    pub fn is_unkeyed(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for HeaderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for HeaderKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for HeaderKey {
    fn from(header: &str) -> Self {
        normalize(header)
    }
}

/// Normalise un en-tête: "Market Cap (millions)" -> "marketCapMillions".
///
/// Un espace suivi d'un caractère non blanc met la prochaine lettre en
/// majuscule. Les caractères non alphanumériques sont supprimés, ainsi que les
/// chiffres situés avant la première lettre. La première lettre est en
/// minuscule, les suivantes gardent leur casse.
pub fn normalize(header: &str) -> HeaderKey {
    let mut key = String::with_capacity(header.len());
    let mut upper_next = false;
    let mut chars = header.chars().peekable();

    while let Some(c) = chars.next() {
        if c.is_whitespace() {
            if chars.peek().is_some_and(|next| !next.is_whitespace()) {
                upper_next = true;
            }
            continue;
        }

        if !c.is_ascii_alphanumeric() {
            continue;
        }

        if key.is_empty() {
            // Préfixe numérique ignoré
            if c.is_ascii_digit() {
                continue;
            }
            key.push(c.to_ascii_lowercase());
            upper_next = false;
        } else if upper_next && c.is_ascii_alphabetic() {
            key.push(c.to_ascii_uppercase());
            upper_next = false;
        } else {
            key.push(c);
        }
    }

    HeaderKey(key)
}

/// Normalise une ligne d'en-têtes, sans réordonner ni supprimer de position
pub fn normalize_all<S: AsRef<str>>(headers: &[S]) -> Vec<HeaderKey> {
    headers.iter().map(|h| normalize(h.as_ref())).collect()
}

/// Radical de nom de fichier dérivé du nom d'un document, `unsaved` à défaut
pub fn file_stem(document_name: &str) -> String {
    let key = normalize(document_name);
    if key.is_unkeyed() {
        "unsaved".to_string()
    } else {
        key.0
    }
}

/// Position d'une clé dans une ligne d'en-têtes normalisée
pub fn position_of(keys: &[HeaderKey], key: &HeaderKey) -> Option<usize> {
    if key.is_unkeyed() {
        return None;
    }
    keys.iter().position(|k| k == key)
}
