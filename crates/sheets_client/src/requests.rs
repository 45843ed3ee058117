//! `FormatOp` → Sheets `batchUpdate` request bodies.

use serde_json::{json, Map, Value};

use sheetsink::style::{BorderLine, BorderSpec, CellStyle, WrapStrategy};
use sheetsink::{CellRegion, Color, FormatOp};

/// One request per op. Ops that set nothing are dropped.
pub fn format_requests(ops: &[FormatOp]) -> Vec<Value> {
    ops.iter().filter_map(format_request).collect()
}

fn format_request(op: &FormatOp) -> Option<Value> {
    match op {
        FormatOp::ColumnWidth {
            table_id,
            col_start,
            col_end,
            pixels,
        } => Some(json!({
            "updateDimensionProperties": {
                "range": {
                    "sheetId": table_id.0,
                    "dimension": "COLUMNS",
                    "startIndex": col_start,
                    "endIndex": col_end,
                },
                "properties": { "pixelSize": pixels },
                "fields": "pixelSize",
            }
        })),
        FormatOp::CellStyle { region, style } => repeat_cell(region, style),
        FormatOp::Borders { region, border } => {
            let line = border_json(border);
            Some(json!({
                "updateBorders": {
                    "range": grid_range(region),
                    "top": line,
                    "bottom": line,
                    "left": line,
                    "right": line,
                    "innerHorizontal": line,
                    "innerVertical": line,
                }
            }))
        }
    }
}

fn repeat_cell(region: &CellRegion, style: &CellStyle) -> Option<Value> {
    if style.is_empty() {
        return None;
    }
    let mut format = Map::new();
    let mut text = Map::new();
    let mut fields = Vec::new();

    if let Some(color) = style.background {
        format.insert("backgroundColor".into(), color_json(color));
        fields.push("userEnteredFormat.backgroundColor");
    }
    if let Some(wrap) = style.wrap {
        let strategy = match wrap {
            WrapStrategy::Wrap => "WRAP",
            WrapStrategy::Overflow => "OVERFLOW_CELL",
        };
        format.insert("wrapStrategy".into(), json!(strategy));
        fields.push("userEnteredFormat.wrapStrategy");
    }
    if let Some(bold) = style.bold {
        text.insert("bold".into(), json!(bold));
        fields.push("userEnteredFormat.textFormat.bold");
    }
    if let Some(family) = &style.font_family {
        text.insert("fontFamily".into(), json!(family));
        fields.push("userEnteredFormat.textFormat.fontFamily");
    }
    if let Some(size) = style.font_size {
        text.insert("fontSize".into(), json!(size));
        fields.push("userEnteredFormat.textFormat.fontSize");
    }
    if !text.is_empty() {
        format.insert("textFormat".into(), Value::Object(text));
    }

    Some(json!({
        "repeatCell": {
            "range": grid_range(region),
            "cell": { "userEnteredFormat": format },
            "fields": fields.join(","),
        }
    }))
}

fn grid_range(region: &CellRegion) -> Value {
    json!({
        "sheetId": region.table_id.0,
        "startRowIndex": region.row_start,
        "endRowIndex": region.row_end,
        "startColumnIndex": region.col_start,
        "endColumnIndex": region.col_end,
    })
}

fn color_json(color: Color) -> Value {
    let [red, green, blue] = color.unit_rgb();
    json!({ "red": red, "green": green, "blue": blue })
}

fn border_json(border: &BorderSpec) -> Value {
    let style = match border.style {
        BorderLine::Solid => "SOLID",
        BorderLine::SolidMedium => "SOLID_MEDIUM",
        BorderLine::Dashed => "DASHED",
        BorderLine::Dotted => "DOTTED",
    };
    json!({ "style": style, "color": color_json(border.color) })
}
