//! Types de données pour le crate sheetgeo

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Valeur d'une cellule de tableur
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CellValue {
    /// Cellule vide
    #[default]
    Empty,

    /// Texte brut
    Text(String),

    /// Valeur numérique
    Number(f64),
}

impl CellValue {
    /// Une cellule est vide si elle ne contient rien ou une chaîne vide.
    /// Le zéro numérique n'est PAS vide.
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            CellValue::Number(_) => false,
        }
    }

    /// Valeur "vraie" au sens d'un tableur: texte non vide, nombre non nul et non NaN
    pub fn is_truthy(&self) -> bool {
        match self {
            CellValue::Empty => false,
            CellValue::Text(s) => !s.is_empty(),
            CellValue::Number(n) => *n != 0.0 && !n.is_nan(),
        }
    }

    /// Texte affichable de la cellule (`""` pour une cellule vide)
    pub fn to_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => n.to_string(),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Empty => serializer.serialize_str(""),
            CellValue::Text(s) => serializer.serialize_str(s),
            CellValue::Number(n) => match integral(*n) {
                Some(i) => serializer.serialize_i64(i),
                None => serializer.serialize_f64(*n),
            },
        }
    }
}

/// Valeur entière exacte d'un nombre (`7.0` -> `7`), hors de la plage exacte des f64 exclue
pub(crate) fn integral(n: f64) -> Option<i64> {
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;
    if n.is_finite() && n.fract() == 0.0 && n.abs() <= MAX_EXACT {
        Some(n as i64)
    } else {
        None
    }
}

/// Forme brute acceptée à la désérialisation (JSON, configs)
#[derive(Deserialize)]
#[serde(untagged)]
enum RawCell {
    Number(f64),
    Text(String),
    Null(()),
}

impl<'de> Deserialize<'de> for CellValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawCell::deserialize(deserializer)? {
            RawCell::Number(n) => CellValue::Number(n),
            RawCell::Text(s) if s.is_empty() => CellValue::Empty,
            RawCell::Text(s) => CellValue::Text(s),
            RawCell::Null(()) => CellValue::Empty,
        })
    }
}

/// Plage rectangulaire d'une grille (indices à partir de 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridRange {
    /// Première ligne de la plage
    pub first_row: usize,

    /// Première colonne de la plage
    pub first_col: usize,

    /// Nombre de lignes
    pub num_rows: usize,

    /// Nombre de colonnes
    pub num_cols: usize,
}

impl GridRange {
    pub fn new(first_row: usize, first_col: usize, num_rows: usize, num_cols: usize) -> Self {
        Self {
            first_row,
            first_col,
            num_rows,
            num_cols,
        }
    }

    /// Dernière colonne incluse (égale à `first_col` pour une plage vide)
    pub fn last_col(&self) -> usize {
        self.first_col + self.num_cols.saturating_sub(1)
    }

    /// Indices des lignes couvertes
    pub fn rows(&self) -> std::ops::Range<usize> {
        self.first_row..self.first_row + self.num_rows
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows == 0 || self.num_cols == 0
    }

    /// Restreint la plage aux lignes situées sous la ligne d'en-tête.
    ///
    /// Une plage qui commence sur l'en-tête est décalée d'une ligne; les lignes
    /// au-dessus (titre, notes) sont écartées elles aussi.
    pub fn below_header(self, header_row: usize) -> Self {
        let first_data = header_row + 1;
        if self.first_row >= first_data {
            return self;
        }
        let dropped = first_data - self.first_row;
        Self {
            first_row: first_data,
            num_rows: self.num_rows.saturating_sub(dropped),
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_emptiness() {
        assert!(CellValue::Empty.is_empty());
        assert!(CellValue::from("").is_empty());
        assert!(!CellValue::from(" ").is_empty());
        assert!(!CellValue::Number(0.0).is_empty());
    }

    #[test]
    fn test_cell_truthiness() {
        assert!(CellValue::from("A").is_truthy());
        assert!(CellValue::from("0").is_truthy());
        assert!(!CellValue::from("").is_truthy());
        assert!(!CellValue::Number(0.0).is_truthy());
        assert!(!CellValue::Number(f64::NAN).is_truthy());
        assert!(CellValue::Number(-3.5).is_truthy());
    }

    #[test]
    fn test_cell_to_text() {
        assert_eq!(CellValue::Number(12.0).to_text(), "12");
        assert_eq!(CellValue::Number(1.25).to_text(), "1.25");
        assert_eq!(CellValue::Empty.to_text(), "");
    }

    #[test]
    fn test_cell_serde() {
        let json = serde_json::to_string(&vec![
            CellValue::Empty,
            CellValue::from("x"),
            CellValue::Number(2.5),
        ])
        .unwrap();
        assert_eq!(json, r#"["","x",2.5]"#);

        let back: Vec<CellValue> = serde_json::from_str(r#"["", "x", 2.5, null]"#).unwrap();
        assert_eq!(
            back,
            vec![
                CellValue::Empty,
                CellValue::from("x"),
                CellValue::Number(2.5),
                CellValue::Empty
            ]
        );
    }

    #[test]
    fn test_range_below_header() {
        let range = GridRange::new(0, 1, 5, 3);
        let data = range.below_header(0);
        assert_eq!(data, GridRange::new(1, 1, 4, 3));

        // Plage déjà sous l'en-tête: inchangée
        assert_eq!(data.below_header(0), data);
        assert_eq!(range.last_col(), 3);
        assert_eq!(data.rows(), 1..5);
    }

    #[test]
    fn test_range_below_header_drops_rows_above() {
        // Ligne de titre au-dessus d'un en-tête en ligne 2
        let range = GridRange::new(0, 0, 5, 3);
        assert_eq!(range.below_header(1), GridRange::new(2, 0, 3, 3));

        // Plage entièrement au-dessus de l'en-tête: vide
        let above = GridRange::new(0, 0, 2, 3);
        assert!(above.below_header(3).is_empty());
        assert_eq!(above.below_header(3).rows().count(), 0);

        // Plage sous l'en-tête: inchangée
        let below = GridRange::new(4, 0, 2, 3);
        assert_eq!(below.below_header(1), below);
    }

    #[test]
    fn test_cell_serialize_integral_numbers() {
        let json = serde_json::to_string(&vec![
            CellValue::Number(7.0),
            CellValue::Number(-0.0),
            CellValue::Number(384.0),
            CellValue::Number(7.5),
            CellValue::Number(1e300),
        ])
        .unwrap();
        assert_eq!(json, "[7,0,384,7.5,1e300]");

        let back: Vec<CellValue> = serde_json::from_str("[7, 7.5]").unwrap();
        assert_eq!(back, vec![CellValue::Number(7.0), CellValue::Number(7.5)]);
    }
}
