//! Declarative styling.
//!
//! A [`StyleTemplate`] is plain configuration. [`apply_style`] turns a region,
//! the column classes laid over it and a role into a batch of [`FormatOp`]s.
//! No I/O happens here; the caller ships the batch to the store in one call.

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::region::{CellRegion, TableId};
use crate::schema::ColumnClass;

// ============================================================================
// Template
// ============================================================================

/// An sRGB colour, written as `#RRGGBB` in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid colour '{0}', expected #RRGGBB")]
pub struct InvalidColor(pub String);

impl Color {
    pub const WHITE: Color = Color::from_rgb(0xFF, 0xFF, 0xFF);
    pub const BLACK: Color = Color::from_rgb(0, 0, 0);

    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn parse(s: &str) -> Result<Self, InvalidColor> {
        let hex = s.trim().strip_prefix('#').unwrap_or(s.trim());
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(InvalidColor(s.to_string()));
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16);
        match (channel(0), channel(2), channel(4)) {
            (Ok(r), Ok(g), Ok(b)) => Ok(Self { r, g, b }),
            _ => Err(InvalidColor(s.to_string())),
        }
    }

    pub fn to_hex_string(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Channels scaled to 0.0..=1.0 (the Sheets API colour form).
    pub fn unit_rgb(&self) -> [f32; 3] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
        ]
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex_string())
    }
}

impl TryFrom<String> for Color {
    type Error = InvalidColor;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Color::parse(&value)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_hex_string()
    }
}

/// How text longer than the column behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WrapStrategy {
    Wrap,
    #[default]
    Overflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorderLine {
    #[default]
    Solid,
    SolidMedium,
    Dashed,
    Dotted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BorderSpec {
    #[serde(default)]
    pub style: BorderLine,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FontSpec {
    pub family: Option<String>,
    pub size: Option<u32>,
}

/// One value per column class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassMap<T> {
    pub compact: T,
    pub wrapped: T,
}

impl<T> ClassMap<T> {
    pub fn get(&self, class: ColumnClass) -> &T {
        match class {
            ColumnClass::Compact => &self.compact,
            ColumnClass::Wrapped => &self.wrapped,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderFormat {
    pub background: Option<Color>,
    pub bold: bool,
    pub border: Option<BorderSpec>,
    #[serde(default)]
    pub font: FontSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyFormat {
    pub wrap: WrapStrategy,
    #[serde(default)]
    pub font: FontSpec,
}

/// Extra decoration for each appended row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowFormat {
    pub background: Option<Color>,
    pub border: Option<BorderSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleTemplate {
    pub column_width_px: ClassMap<u32>,
    pub header: HeaderFormat,
    pub body: ClassMap<BodyFormat>,
    pub appended_row: RowFormat,
}

impl Default for StyleTemplate {
    fn default() -> Self {
        let font = FontSpec {
            family: Some("Arial".to_string()),
            size: Some(10),
        };
        let grey = BorderSpec {
            style: BorderLine::Solid,
            color: Color::from_rgb(0xB7, 0xB7, 0xB7),
        };
        Self {
            column_width_px: ClassMap { compact: 150, wrapped: 350 },
            header: HeaderFormat {
                background: Some(Color::from_rgb(0xD9, 0xEA, 0xD3)),
                bold: true,
                border: Some(BorderSpec {
                    style: BorderLine::SolidMedium,
                    color: Color::BLACK,
                }),
                font: font.clone(),
            },
            body: ClassMap {
                compact: BodyFormat { wrap: WrapStrategy::Overflow, font: font.clone() },
                wrapped: BodyFormat { wrap: WrapStrategy::Wrap, font },
            },
            appended_row: RowFormat {
                background: Some(Color::WHITE),
                border: Some(grey),
            },
        }
    }
}

// ============================================================================
// Format operations
// ============================================================================

/// Which part of a table a region plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StyleRole {
    Header,
    BodyDefault,
    AppendedRow,
}

/// Cell properties to set. `None` leaves the property untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CellStyle {
    pub background: Option<Color>,
    pub bold: Option<bool>,
    pub wrap: Option<WrapStrategy>,
    pub font_family: Option<String>,
    pub font_size: Option<u32>,
}

impl CellStyle {
    pub fn is_empty(&self) -> bool {
        self.background.is_none()
            && self.bold.is_none()
            && self.wrap.is_none()
            && self.font_family.is_none()
            && self.font_size.is_none()
    }

    fn with_font(mut self, font: &FontSpec) -> Self {
        self.font_family = font.family.clone();
        self.font_size = font.size;
        self
    }
}

/// One formatting instruction, batched by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FormatOp {
    ColumnWidth {
        table_id: TableId,
        col_start: u32,
        col_end: u32,
        pixels: u32,
    },
    CellStyle {
        region: CellRegion,
        style: CellStyle,
    },
    Borders {
        region: CellRegion,
        border: BorderSpec,
    },
}

// ============================================================================
// Engine
// ============================================================================

/// Compute the formatting batch for `region` in `role`.
///
/// `columns[i]` is the class of column `region.col_start + i`; columns past
/// the end of `columns` are left alone. Adjacent columns of one class share
/// an op. Only `Header` touches column widths.
pub fn apply_style(
    region: &CellRegion,
    columns: &[ColumnClass],
    template: &StyleTemplate,
    role: StyleRole,
) -> Vec<FormatOp> {
    if region.is_empty() {
        return Vec::new();
    }
    let runs = class_runs(region.col_start, region.col_end, columns);
    let mut ops = Vec::new();

    match role {
        StyleRole::Header => {
            for (class, cols) in &runs {
                ops.push(FormatOp::ColumnWidth {
                    table_id: region.table_id,
                    col_start: cols.start,
                    col_end: cols.end,
                    pixels: *template.column_width_px.get(*class),
                });
            }
            let header = &template.header;
            let style = CellStyle {
                background: header.background,
                bold: Some(header.bold),
                ..CellStyle::default()
            }
            .with_font(&header.font);
            ops.push(FormatOp::CellStyle { region: *region, style });
            if let Some(border) = header.border {
                ops.push(FormatOp::Borders { region: *region, border });
            }
        }
        StyleRole::BodyDefault => {
            for (class, cols) in &runs {
                ops.push(FormatOp::CellStyle {
                    region: region.with_cols(cols.clone()),
                    style: body_style(template, *class),
                });
            }
        }
        StyleRole::AppendedRow => {
            for (class, cols) in &runs {
                let style = CellStyle {
                    background: template.appended_row.background,
                    ..body_style(template, *class)
                };
                ops.push(FormatOp::CellStyle {
                    region: region.with_cols(cols.clone()),
                    style,
                });
            }
            if let Some(border) = template.appended_row.border {
                ops.push(FormatOp::Borders { region: *region, border });
            }
        }
    }

    ops
}

fn body_style(template: &StyleTemplate, class: ColumnClass) -> CellStyle {
    let body = template.body.get(class);
    CellStyle {
        wrap: Some(body.wrap),
        ..CellStyle::default()
    }
    .with_font(&body.font)
}

/// Group `col_start..col_end` into maximal runs of one class.
fn class_runs(col_start: u32, col_end: u32, columns: &[ColumnClass]) -> Vec<(ColumnClass, Range<u32>)> {
    let mut runs: Vec<(ColumnClass, Range<u32>)> = Vec::new();
    for (col, class) in (col_start..col_end).zip(columns.iter().copied()) {
        match runs.last_mut() {
            Some((last, cols)) if *last == class && cols.end == col => cols.end = col + 1,
            _ => runs.push((class, col..col + 1)),
        }
    }
    runs
}
