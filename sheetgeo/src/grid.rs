//! Accès à une grille de cellules (feuille de calcul)
//!
//! Le pipeline ne dépend que de ces quatre capacités: lire une ligne d'en-tête,
//! lire une plage, écrire une cellule et insérer des colonnes.

use crate::types::{CellValue, GridRange};
use crate::SheetError;

/// Source tabulaire lisible et modifiable
pub trait Grid {
    /// Nombre de colonnes
    fn width(&self) -> usize;

    /// Nombre de lignes
    fn height(&self) -> usize;

    /// Valeurs texte d'une ligne entière (en-têtes)
    fn headers(&self, row: usize) -> Result<Vec<String>, SheetError>;

    /// Lit une plage rectangulaire
    fn cell_range(&self, range: &GridRange) -> Result<Vec<Vec<CellValue>>, SheetError>;

    /// Écrit une cellule
    fn set_cell(&mut self, row: usize, col: usize, value: CellValue) -> Result<(), SheetError>;

    /// Insère `count` colonnes vides après la colonne `after_col`
    fn append_columns(&mut self, after_col: usize, count: usize) -> Result<(), SheetError>;

    /// Plage couvrant toute la grille
    fn full_range(&self) -> GridRange {
        GridRange::new(0, 0, self.height(), self.width())
    }
}

/// Grille en mémoire, rectangulaire
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryGrid {
    rows: Vec<Vec<CellValue>>,
    width: usize,
}

impl MemoryGrid {
    /// Construit une grille; les lignes courtes sont complétées par des cellules vides
    pub fn new(mut rows: Vec<Vec<CellValue>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut rows {
            row.resize(width, CellValue::Empty);
        }
        Self { rows, width }
    }

    /// Construit une grille de texte (`""` devient une cellule vide)
    pub fn from_strings<R, S>(rows: R) -> Self
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rows = rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|s| match s.as_ref() {
                        "" => CellValue::Empty,
                        other => CellValue::from(other),
                    })
                    .collect()
            })
            .collect();
        Self::new(rows)
    }

    /// Lignes de la grille
    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    /// Lecture d'une cellule
    pub fn get(&self, row: usize, col: usize) -> Option<&CellValue> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    fn check_row(&self, row: usize) -> Result<(), SheetError> {
        if row >= self.rows.len() {
            return Err(SheetError::out_of_range("row", row, self.rows.len()));
        }
        Ok(())
    }

    fn check_col(&self, col: usize) -> Result<(), SheetError> {
        if col >= self.width {
            return Err(SheetError::out_of_range("column", col, self.width));
        }
        Ok(())
    }
}

impl Grid for MemoryGrid {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.rows.len()
    }

    fn headers(&self, row: usize) -> Result<Vec<String>, SheetError> {
        self.check_row(row)?;
        Ok(self.rows[row].iter().map(CellValue::to_text).collect())
    }

    fn cell_range(&self, range: &GridRange) -> Result<Vec<Vec<CellValue>>, SheetError> {
        if range.is_empty() {
            return Ok(Vec::new());
        }
        self.check_row(range.first_row + range.num_rows - 1)?;
        self.check_col(range.last_col())?;

        Ok(self.rows[range.rows()]
            .iter()
            .map(|row| row[range.first_col..=range.last_col()].to_vec())
            .collect())
    }

    fn set_cell(&mut self, row: usize, col: usize, value: CellValue) -> Result<(), SheetError> {
        self.check_row(row)?;
        self.check_col(col)?;
        self.rows[row][col] = value;
        Ok(())
    }

    fn append_columns(&mut self, after_col: usize, count: usize) -> Result<(), SheetError> {
        // Grille vide: on ajoute simplement de la largeur
        if self.width > 0 {
            self.check_col(after_col)?;
        }
        let at = if self.width == 0 { 0 } else { after_col + 1 };
        for row in &mut self.rows {
            row.splice(at..at, std::iter::repeat(CellValue::Empty).take(count));
        }
        self.width += count;
        Ok(())
    }
}
