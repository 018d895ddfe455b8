use unicode_width::UnicodeWidthStr;

use crate::model::Table;

/// Box sizes of table nodes on the canvas.
pub struct TableMetrics {
    pub char_width: f64,
    pub header_height: f64,
    pub row_height: f64,
    pub padding: f64,
    pub min_width: f64,
}

impl Default for TableMetrics {
    fn default() -> Self {
        Self {
            char_width: 8.0,
            header_height: 40.0,
            row_height: 32.0,
            padding: 20.0,
            min_width: 300.0,
        }
    }
}

impl TableMetrics {
    pub fn text_width(&self, text: &str) -> f64 {
        let width = UnicodeWidthStr::width(text);
        width as f64 * self.char_width
    }

    /// Width fits the widest of the table name and each `name type` row;
    /// height is the header plus one row per column.
    pub fn node_size(&self, table: &Table) -> (f64, f64) {
        let header_width = self.text_width(&table.name);
        let widest_row = table
            .columns
            .iter()
            .map(|c| self.text_width(&c.name) + self.text_width(&c.column_type) + self.char_width * 2.0)
            .fold(0.0, f64::max);

        let width = (header_width.max(widest_row) + self.padding * 2.0).max(self.min_width);
        let height = self.header_height + table.columns.len() as f64 * self.row_height + self.padding;
        (width, height)
    }
}
