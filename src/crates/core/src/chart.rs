//! Chart specification normalizer
//!
//! A `response.chart` event wraps the actual chart spec as a JSON-encoded
//! string inside its payload, so normalizing is a two-stage decode: outer
//! wrapper, then the embedded Vega-Lite-like spec. Rows that fail the
//! required-field checks for their mark are dropped silently; a partial chart
//! is a valid result.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChartParseError {
    #[error("failed to decode chart payload wrapper: {0}")]
    TopLevelDecode(serde_json::Error),
    #[error("failed to decode embedded chart spec: {0}")]
    EmbeddedSpecDecode(serde_json::Error),
}

/// Mark kinds the renderer understands. Unrecognized marks fall back to `Bar`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarkKind {
    #[default]
    Bar,
    Line,
    Point,
    Arc,
    Circle,
}

impl MarkKind {
    fn from_name(name: Option<&str>) -> Self {
        match name {
            Some("line") => MarkKind::Line,
            Some("point") => MarkKind::Point,
            Some("arc") => MarkKind::Arc,
            Some("circle") => MarkKind::Circle,
            _ => MarkKind::Bar,
        }
    }
}

/// One normalized data point. Identity is positional; row order is preserved.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartDatum {
    pub category: String,
    pub value: f64,
    pub x_value: Option<f64>,
    pub y_value: Option<f64>,
    pub size: Option<f64>,
    pub color_category: Option<String>,
}

impl ChartDatum {
    fn categorical(category: String, value: f64) -> Self {
        Self {
            category,
            value,
            x_value: None,
            y_value: None,
            size: None,
            color_category: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub title: Option<String>,
    pub mark: MarkKind,
    pub x_field: Option<String>,
    pub x_title: Option<String>,
    pub y_field: Option<String>,
    pub y_title: Option<String>,
    pub data: Vec<ChartDatum>,
}

/// A dynamically-typed JSON leaf from a data row.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonLeaf {
    String(String),
    Number(f64),
    Int(i64),
    Bool(bool),
    Null,
}

impl<'de> Deserialize<'de> for JsonLeaf {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(match value {
            serde_json::Value::Null => JsonLeaf::Null,
            serde_json::Value::Bool(b) => JsonLeaf::Bool(b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(JsonLeaf::Int)
                .or_else(|| n.as_f64().map(JsonLeaf::Number))
                .unwrap_or(JsonLeaf::Null),
            serde_json::Value::String(s) => JsonLeaf::String(s),
            // Nested structures are not meaningful as row leaves
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => JsonLeaf::Null,
        })
    }
}

impl JsonLeaf {
    /// String form of the leaf; `None` for null.
    pub fn as_display_string(&self) -> Option<String> {
        match self {
            JsonLeaf::String(s) => Some(s.clone()),
            JsonLeaf::Number(n) => Some(n.to_string()),
            JsonLeaf::Int(i) => Some(i.to_string()),
            JsonLeaf::Bool(b) => Some(b.to_string()),
            JsonLeaf::Null => None,
        }
    }

    /// Numeric coercion: numbers pass through, strings attempt a parse,
    /// booleans map to 1/0, null is non-numeric.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            JsonLeaf::Number(n) => Some(*n),
            JsonLeaf::Int(i) => Some(*i as f64),
            JsonLeaf::String(s) => s.parse().ok(),
            JsonLeaf::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            JsonLeaf::Null => None,
        }
    }
}

/// Outer wrapper: the spec itself arrives as a JSON-encoded string.
#[derive(Debug, Deserialize)]
struct ChartEventPayload {
    chart_spec: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddedSpec {
    title: Option<String>,
    mark: Option<String>,
    encoding: Option<Encoding>,
    data: Option<ValuesContainer>,
}

#[derive(Debug, Default, Deserialize)]
struct Encoding {
    x: Option<AxisSpec>,
    y: Option<AxisSpec>,
    theta: Option<AxisSpec>,
    color: Option<AxisSpec>,
    size: Option<AxisSpec>,
}

#[derive(Debug, Deserialize)]
struct AxisSpec {
    field: Option<String>,
    title: Option<String>,
    #[serde(rename = "type")]
    axis_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ValuesContainer {
    values: Vec<HashMap<String, JsonLeaf>>,
}

/// Row label with date-to-month formatting: a leaf matching `yyyy-MM-dd`
/// renders as its short month name.
fn label_from(leaf: &JsonLeaf) -> String {
    match leaf.as_display_string() {
        Some(s) => match NaiveDate::parse_from_str(&s, "%Y-%m-%d") {
            Ok(date) => date.format("%b").to_string(),
            Err(_) => s,
        },
        None => String::new(),
    }
}

fn axis_field(axis: &Option<AxisSpec>) -> Option<&str> {
    axis.as_ref().and_then(|a| a.field.as_deref())
}

fn axis_type(axis: &Option<AxisSpec>) -> Option<&str> {
    axis.as_ref().and_then(|a| a.axis_type.as_deref())
}

/// Parse the raw `response.chart` payload into a normalized [`ChartSpec`].
pub fn parse_chart_spec(payload: &str) -> Result<ChartSpec, ChartParseError> {
    let wrapper: ChartEventPayload =
        serde_json::from_str(payload).map_err(ChartParseError::TopLevelDecode)?;
    let embedded: EmbeddedSpec =
        serde_json::from_str(&wrapper.chart_spec).map_err(ChartParseError::EmbeddedSpecDecode)?;

    let mark = MarkKind::from_name(embedded.mark.as_deref());
    let encoding = embedded.encoding.unwrap_or_default();

    let x_field = axis_field(&encoding.x);
    let y_field = axis_field(&encoding.y);
    let theta_field = axis_field(&encoding.theta);
    let color_field = axis_field(&encoding.color);
    let size_field = axis_field(&encoding.size);
    let x_type = axis_type(&encoding.x);
    let y_type = axis_type(&encoding.y);

    let rows = embedded.data.map(|d| d.values).unwrap_or_default();

    let data = rows
        .iter()
        .filter_map(|row| {
            // 1) Arc/pie: theta supplies the value, category comes from
            //    color, then x, then y
            if mark == MarkKind::Arc || theta_field.is_some() {
                let numeric = theta_field
                    .and_then(|key| row.get(key))
                    .and_then(JsonLeaf::as_number)?;
                let category = [color_field, x_field, y_field]
                    .into_iter()
                    .flatten()
                    .find_map(|key| row.get(key))
                    .map(label_from)
                    .unwrap_or_default();
                return Some(ChartDatum::categorical(category, numeric));
            }

            // 2) Circle/scatter: both axes must be numeric; size and color
            //    tag along when present
            if mark == MarkKind::Circle {
                let x_raw = row.get(x_field?)?;
                let y_raw = row.get(y_field?)?;
                let x_num = x_raw.as_number()?;
                let y_num = y_raw.as_number()?;
                let size = size_field.and_then(|key| row.get(key)).and_then(JsonLeaf::as_number);
                let color_category = color_field.and_then(|key| row.get(key)).map(label_from);
                // x doubles as category and y as value for renderers that
                // expect the categorical shape
                return Some(ChartDatum {
                    category: label_from(x_raw),
                    value: y_num,
                    x_value: Some(x_num),
                    y_value: Some(y_num),
                    size,
                    color_category,
                });
            }

            // 3) Standard categorical: the quantitative-typed axis carries the
            //    value; untyped specs try y numeric, then x numeric
            let x_raw = row.get(x_field?)?;
            let y_raw = row.get(y_field?)?;

            if x_type == Some("quantitative") {
                if let Some(numeric) = x_raw.as_number() {
                    return Some(ChartDatum::categorical(label_from(y_raw), numeric));
                }
            }
            if y_type == Some("quantitative") {
                if let Some(numeric) = y_raw.as_number() {
                    return Some(ChartDatum::categorical(label_from(x_raw), numeric));
                }
            }
            if let Some(numeric) = y_raw.as_number() {
                Some(ChartDatum::categorical(label_from(x_raw), numeric))
            } else if let Some(numeric) = x_raw.as_number() {
                Some(ChartDatum::categorical(label_from(y_raw), numeric))
            } else {
                None
            }
        })
        .collect();

    Ok(ChartSpec {
        title: embedded.title,
        mark,
        x_field: x_field.map(str::to_string),
        x_title: encoding.x.as_ref().and_then(|a| a.title.clone()),
        y_field: y_field.map(str::to_string),
        y_title: encoding.y.as_ref().and_then(|a| a.title.clone()),
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wrap(spec: serde_json::Value) -> String {
        json!({"chart_spec": spec.to_string()}).to_string()
    }

    #[test]
    fn arc_rows_map_theta_to_value_in_row_order() {
        let payload = wrap(json!({
            "mark": "arc",
            "encoding": {
                "theta": {"field": "value"},
                "color": {"field": "category"}
            },
            "data": {"values": [
                {"category": "A", "value": 10},
                {"category": "B", "value": 20}
            ]}
        }));
        let spec = parse_chart_spec(&payload).unwrap();
        assert_eq!(spec.mark, MarkKind::Arc);
        assert_eq!(spec.data.len(), 2);
        assert_eq!(spec.data[0], ChartDatum::categorical("A".into(), 10.0));
        assert_eq!(spec.data[1], ChartDatum::categorical("B".into(), 20.0));
    }

    #[test]
    fn arc_row_without_numeric_theta_is_dropped() {
        let payload = wrap(json!({
            "mark": "arc",
            "encoding": {"theta": {"field": "value"}, "color": {"field": "category"}},
            "data": {"values": [
                {"category": "A", "value": "not a number"},
                {"category": "B", "value": 5}
            ]}
        }));
        let spec = parse_chart_spec(&payload).unwrap();
        assert_eq!(spec.data.len(), 1);
        assert_eq!(spec.data[0].category, "B");
    }

    #[test]
    fn theta_field_forces_arc_mapping_even_without_arc_mark() {
        let payload = wrap(json!({
            "encoding": {"theta": {"field": "share"}, "x": {"field": "region"}},
            "data": {"values": [{"region": "EMEA", "share": 0.4}]}
        }));
        let spec = parse_chart_spec(&payload).unwrap();
        assert_eq!(spec.data[0].category, "EMEA");
        assert_eq!(spec.data[0].value, 0.4);
    }

    #[test]
    fn circle_rows_require_both_axes() {
        let payload = wrap(json!({
            "mark": "circle",
            "encoding": {
                "x": {"field": "spend"},
                "y": {"field": "revenue"},
                "size": {"field": "deals"},
                "color": {"field": "segment"}
            },
            "data": {"values": [
                {"spend": 10, "revenue": 40, "deals": 3, "segment": "SMB"},
                {"spend": 12, "deals": 5, "segment": "ENT"}
            ]}
        }));
        let spec = parse_chart_spec(&payload).unwrap();
        assert_eq!(spec.data.len(), 1);
        let datum = &spec.data[0];
        assert_eq!(datum.x_value, Some(10.0));
        assert_eq!(datum.y_value, Some(40.0));
        assert_eq!(datum.size, Some(3.0));
        assert_eq!(datum.color_category.as_deref(), Some("SMB"));
        // compat shape: x as category, y as value
        assert_eq!(datum.category, "10");
        assert_eq!(datum.value, 40.0);
    }

    #[test]
    fn quantitative_axis_declaration_routes_the_value() {
        let payload = wrap(json!({
            "mark": "bar",
            "encoding": {
                "x": {"field": "revenue", "type": "quantitative", "title": "Revenue"},
                "y": {"field": "region", "type": "nominal", "title": "Region"}
            },
            "data": {"values": [{"region": "West", "revenue": 1200}]}
        }));
        let spec = parse_chart_spec(&payload).unwrap();
        assert_eq!(spec.data[0].category, "West");
        assert_eq!(spec.data[0].value, 1200.0);
        assert_eq!(spec.x_title.as_deref(), Some("Revenue"));
        assert_eq!(spec.y_title.as_deref(), Some("Region"));
    }

    #[test]
    fn untyped_axes_try_y_then_x() {
        let y_numeric = wrap(json!({
            "encoding": {"x": {"field": "label"}, "y": {"field": "count"}},
            "data": {"values": [{"label": "a", "count": "7"}]}
        }));
        let spec = parse_chart_spec(&y_numeric).unwrap();
        assert_eq!(spec.data[0].category, "a");
        assert_eq!(spec.data[0].value, 7.0);

        let x_numeric = wrap(json!({
            "encoding": {"x": {"field": "count"}, "y": {"field": "label"}},
            "data": {"values": [{"label": "b", "count": 3}]}
        }));
        let spec = parse_chart_spec(&x_numeric).unwrap();
        assert_eq!(spec.data[0].category, "b");
        assert_eq!(spec.data[0].value, 3.0);

        let neither = wrap(json!({
            "encoding": {"x": {"field": "a"}, "y": {"field": "b"}},
            "data": {"values": [{"a": "x", "b": "y"}]}
        }));
        assert!(parse_chart_spec(&neither).unwrap().data.is_empty());
    }

    #[test]
    fn iso_date_labels_render_as_short_month() {
        let payload = wrap(json!({
            "encoding": {"x": {"field": "month"}, "y": {"field": "value"}},
            "data": {"values": [
                {"month": "2026-01-07", "value": 1},
                {"month": "2026-11-30", "value": 2},
                {"month": "not-a-date", "value": 3}
            ]}
        }));
        let spec = parse_chart_spec(&payload).unwrap();
        assert_eq!(spec.data[0].category, "Jan");
        assert_eq!(spec.data[1].category, "Nov");
        assert_eq!(spec.data[2].category, "not-a-date");
    }

    #[test]
    fn boolean_leaves_coerce_to_one_and_zero() {
        let payload = wrap(json!({
            "encoding": {"x": {"field": "flag"}, "y": {"field": "active"}},
            "data": {"values": [
                {"flag": "on", "active": true},
                {"flag": "off", "active": false}
            ]}
        }));
        let spec = parse_chart_spec(&payload).unwrap();
        assert_eq!(spec.data[0].value, 1.0);
        assert_eq!(spec.data[1].value, 0.0);
    }

    #[test]
    fn unknown_mark_falls_back_to_bar() {
        let payload = wrap(json!({
            "mark": "area",
            "encoding": {"x": {"field": "a"}, "y": {"field": "b"}},
            "data": {"values": [{"a": "x", "b": 1}]}
        }));
        let spec = parse_chart_spec(&payload).unwrap();
        assert_eq!(spec.mark, MarkKind::Bar);
        assert_eq!(spec.data.len(), 1);
    }

    #[test]
    fn wrapper_and_embedded_failures_are_distinct() {
        assert!(matches!(
            parse_chart_spec("not json"),
            Err(ChartParseError::TopLevelDecode(_))
        ));
        let bad_inner = json!({"chart_spec": "{broken"}).to_string();
        assert!(matches!(
            parse_chart_spec(&bad_inner),
            Err(ChartParseError::EmbeddedSpecDecode(_))
        ));
    }

    #[test]
    fn missing_data_section_yields_empty_chart() {
        let payload = wrap(json!({"title": "Empty", "mark": "bar"}));
        let spec = parse_chart_spec(&payload).unwrap();
        assert_eq!(spec.title.as_deref(), Some("Empty"));
        assert!(spec.data.is_empty());
    }
}
