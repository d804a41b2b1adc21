//! Projection des lignes brutes en enregistrements indexés par clé

use serde::de::{self, Deserialize, Deserializer, MapAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::debug;

use crate::grid::Grid;
use crate::header::{normalize_all, HeaderKey};
use crate::types::{CellValue, GridRange};
use crate::SheetError;

/// Une ligne de données indexée par clé d'en-tête, dans l'ordre des colonnes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(HeaderKey, CellValue)>,
}

impl Record {
    /// Valeur d'une colonne (absente si la cellule était vide ou hors ligne)
    pub fn get(&self, key: &HeaderKey) -> Option<&CellValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &HeaderKey) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &HeaderKey> {
        self.fields.iter().map(|(k, _)| k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HeaderKey, &CellValue)> {
        self.fields.iter().map(|(k, v)| (k, v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Clé en double: la dernière valeur gagne, la position de la première est conservée
    fn insert(&mut self, key: HeaderKey, value: CellValue) {
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
    }
}

impl<K: Into<HeaderKey>, V: Into<CellValue>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::default();
        for (key, value) in iter {
            let (key, value) = (key.into(), value.into());
            if !key.is_unkeyed() && !value.is_empty() {
                record.insert(key, value);
            }
        }
        record
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key.as_str(), value)?;
        }
        map.end()
    }
}

struct RecordVisitor;

impl<'de> Visitor<'de> for RecordVisitor {
    type Value = Record;

    fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("a properties object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Record, A::Error> {
        let mut fields: Vec<(String, CellValue)> = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((key, value)) = map.next_entry::<String, CellValue>()? {
            fields.push((key, value));
        }
        Ok(fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.clone()))
            .collect())
    }

    fn visit_unit<E: de::Error>(self) -> Result<Record, E> {
        Ok(Record::default())
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(RecordVisitor)
    }
}

/// Associe chaque clé à la cellule de même position.
///
/// Les cellules en trop sont ignorées, les clés sans cellule sont absentes.
/// Les colonnes sans clé et les cellules vides (chaîne vide) sont écartées;
/// le zéro numérique est conservé.
pub fn project(keys: &[HeaderKey], row: &[CellValue]) -> Record {
    keys.iter()
        .zip(row.iter())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Lit les enregistrements d'une plage, avec les en-têtes de `header_row`.
///
/// Si la plage commence sur la ligne d'en-tête, elle est décalée d'une ligne.
pub fn read_records<G: Grid + ?Sized>(
    grid: &G,
    range: GridRange,
    header_row: usize,
) -> Result<Vec<Record>, SheetError> {
    let keys = range_keys(grid, &range, header_row)?;
    let data_range = range.below_header(header_row);
    let rows = grid.cell_range(&data_range)?;

    debug!(
        rows = rows.len(),
        columns = keys.len(),
        unkeyed = keys.iter().filter(|k| k.is_unkeyed()).count(),
        "Projecting rows"
    );

    Ok(rows.iter().map(|row| project(&keys, row)).collect())
}

/// En-têtes normalisés couvrant les colonnes d'une plage
pub fn range_keys<G: Grid + ?Sized>(
    grid: &G,
    range: &GridRange,
    header_row: usize,
) -> Result<Vec<HeaderKey>, SheetError> {
    let headers = grid.headers(header_row)?;
    let end = range.first_col + range.num_cols;
    if end > headers.len() {
        return Err(SheetError::out_of_range("column", end - 1, headers.len()));
    }
    Ok(normalize_all(&headers[range.first_col..end]))
}
