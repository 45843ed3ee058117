// [style] section: flat overrides on top of the built-in template.

use serde::{Deserialize, Serialize};
use sheetsink::style::{BorderLine, BorderSpec, WrapStrategy};
use sheetsink::{Color, StyleTemplate};

/// Every field is optional; unset fields keep the built-in value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StyleSettings {
    /// Column width in pixels for compact columns
    pub compact_width: Option<u32>,
    /// Column width in pixels for wrapped columns
    pub wrapped_width: Option<u32>,
    /// Font for header and body cells
    pub font_family: Option<String>,
    pub font_size: Option<u32>,

    pub header_background: Option<Color>,
    pub header_bold: Option<bool>,
    pub header_border: Option<Color>,

    pub compact_wrap: Option<WrapStrategy>,
    pub wrapped_wrap: Option<WrapStrategy>,

    /// Background of every appended row
    pub row_background: Option<Color>,
    /// Border drawn around and inside every appended row
    pub row_border: Option<Color>,
}

impl StyleSettings {
    pub fn apply(&self, mut template: StyleTemplate) -> StyleTemplate {
        if let Some(px) = self.compact_width {
            template.column_width_px.compact = px;
        }
        if let Some(px) = self.wrapped_width {
            template.column_width_px.wrapped = px;
        }

        for font in [
            &mut template.header.font,
            &mut template.body.compact.font,
            &mut template.body.wrapped.font,
        ] {
            if let Some(family) = &self.font_family {
                font.family = Some(family.clone());
            }
            if let Some(size) = self.font_size {
                font.size = Some(size);
            }
        }

        if let Some(color) = self.header_background {
            template.header.background = Some(color);
        }
        if let Some(bold) = self.header_bold {
            template.header.bold = bold;
        }
        if let Some(color) = self.header_border {
            template.header.border = Some(BorderSpec {
                style: BorderLine::SolidMedium,
                color,
            });
        }

        if let Some(wrap) = self.compact_wrap {
            template.body.compact.wrap = wrap;
        }
        if let Some(wrap) = self.wrapped_wrap {
            template.body.wrapped.wrap = wrap;
        }

        if let Some(color) = self.row_background {
            template.appended_row.background = Some(color);
        }
        if let Some(color) = self.row_border {
            template.appended_row.border = Some(BorderSpec {
                style: BorderLine::Solid,
                color,
            });
        }

        template
    }
}
