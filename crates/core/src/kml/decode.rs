use std::borrow::Cow;
use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::color::{Argb, DEFAULT_LAND_COLOR};
use crate::model::{non_empty_holes, Land, Point, Ring};
use crate::types::DbId;

use super::KmlError;

/// Line width used when `<width>` is present but not a number.
const DEFAULT_LINE_WIDTH: f64 = 1.0;

// ---------------------------------------------------------------------------
// Document types
// ---------------------------------------------------------------------------

/// A `<Style>` block. Colors are the raw `AABBGGRR` strings.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KmlStyle {
    pub id: String,
    pub line_color: Option<String>,
    pub line_width: Option<f64>,
    pub poly_color: Option<String>,
}

/// Placemark geometry. Coordinates are raw `lon,lat[,alt]` tokens.
#[derive(Debug, Clone, PartialEq)]
pub enum KmlGeometry {
    Point {
        coordinates: Vec<String>,
    },
    LineString {
        coordinates: Vec<String>,
    },
    Polygon {
        outer: Vec<String>,
        inner: Vec<Vec<String>>,
    },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct KmlPlacemark {
    pub name: Option<String>,
    pub description: Option<String>,
    pub style_url: Option<String>,
    /// Style declared inline inside the placemark.
    pub inline_style: Option<KmlStyle>,
    pub geometry: Option<KmlGeometry>,
}

/// Everything collected from one document, before conversion to lands.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KmlDocument {
    pub styles: HashMap<String, KmlStyle>,
    /// StyleMap id -> style url of its `normal` pair.
    pub style_maps: HashMap<String, String>,
    pub placemarks: Vec<KmlPlacemark>,
}

impl KmlDocument {
    /// Resolve a `styleUrl` (`#id`), following one StyleMap indirection.
    pub fn style(&self, url: &str) -> Option<&KmlStyle> {
        let id = url.trim().trim_start_matches('#');
        self.styles.get(id).or_else(|| {
            self.style_maps
                .get(id)
                .and_then(|normal| self.styles.get(normal.trim_start_matches('#')))
        })
    }
}

/// Result of [`decode_report`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecodeReport {
    pub lands: Vec<Land>,
    /// Placemarks that did not become lands: no geometry, non-polygon
    /// geometry, or unreadable coordinates.
    pub skipped: usize,
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
enum GeometryKind {
    Point,
    LineString,
    Polygon,
}

impl GeometryKind {
    fn from_tag(name: &str) -> Option<Self> {
        match name {
            "Point" => Some(Self::Point),
            "LineString" => Some(Self::LineString),
            "Polygon" => Some(Self::Polygon),
            _ => None,
        }
    }
}

#[derive(Default)]
struct PlacemarkBuilder {
    name: Option<String>,
    description: Option<String>,
    style_url: Option<String>,
    inline_style: Option<KmlStyle>,
    kind: Option<GeometryKind>,
    outer: Vec<String>,
    inner: Vec<Vec<String>>,
    coordinates: Vec<String>,
}

impl PlacemarkBuilder {
    /// A polygon replaces any line or point seen before it. Otherwise the
    /// first geometry wins.
    fn begin_geometry(&mut self, kind: GeometryKind) {
        match self.kind {
            None => self.kind = Some(kind),
            Some(GeometryKind::Polygon) => {}
            Some(_) if kind == GeometryKind::Polygon => {
                self.kind = Some(kind);
                self.coordinates.clear();
            }
            Some(_) => {}
        }
    }

    fn finish(self) -> KmlPlacemark {
        let geometry = match self.kind {
            Some(GeometryKind::Polygon) if !self.outer.is_empty() => Some(KmlGeometry::Polygon {
                outer: self.outer,
                inner: self.inner,
            }),
            Some(GeometryKind::LineString) if !self.coordinates.is_empty() => {
                Some(KmlGeometry::LineString {
                    coordinates: self.coordinates,
                })
            }
            Some(GeometryKind::Point) => Some(KmlGeometry::Point {
                coordinates: self.coordinates,
            }),
            _ => None,
        };
        KmlPlacemark {
            name: self.name,
            description: self.description,
            style_url: self.style_url,
            inline_style: self.inline_style,
            geometry,
        }
    }
}

#[derive(Default)]
struct StyleMapBuilder {
    id: String,
    key: Option<String>,
    url: Option<String>,
    normal: Option<String>,
}

/// Accumulated state threaded through the event loop.
#[derive(Default)]
struct ParseState {
    stack: Vec<String>,
    text: String,
    style: Option<KmlStyle>,
    style_map: Option<StyleMapBuilder>,
    placemark: Option<PlacemarkBuilder>,
    document: KmlDocument,
}

impl ParseState {
    fn inside(&self, name: &str) -> bool {
        self.stack.iter().any(|open| open == name)
    }

    /// Nearest enclosing geometry element.
    fn enclosing_geometry(&self) -> Option<GeometryKind> {
        self.stack
            .iter()
            .rev()
            .find_map(|name| GeometryKind::from_tag(name))
    }

    /// `id` is the element's `id` attribute, read for styles only.
    fn open(&mut self, name: &str, id: Option<String>) {
        match name {
            "Style" => {
                self.style = Some(KmlStyle {
                    id: id.unwrap_or_default(),
                    ..KmlStyle::default()
                });
            }
            "StyleMap" => {
                self.style_map = Some(StyleMapBuilder {
                    id: id.unwrap_or_default(),
                    ..StyleMapBuilder::default()
                });
            }
            "Pair" => {
                if let Some(map) = self.style_map.as_mut() {
                    map.key = None;
                    map.url = None;
                }
            }
            "Placemark" => self.placemark = Some(PlacemarkBuilder::default()),
            _ => {
                if let (Some(kind), Some(placemark)) =
                    (GeometryKind::from_tag(name), self.placemark.as_mut())
                {
                    placemark.begin_geometry(kind);
                }
            }
        }
        self.stack.push(name.to_string());
        self.text.clear();
    }

    fn close(&mut self, name: &str) -> Result<(), KmlError> {
        match self.stack.pop() {
            Some(open) if open == name => {}
            Some(open) => {
                return Err(KmlError::MismatchedTag {
                    expected: open,
                    found: name.to_string(),
                })
            }
            None => {
                return Err(KmlError::MismatchedTag {
                    expected: String::new(),
                    found: name.to_string(),
                })
            }
        }

        let text = std::mem::take(&mut self.text);
        let parent = self.stack.last().cloned();

        match (name, parent.as_deref()) {
            ("color", Some("LineStyle")) => {
                if let Some(style) = self.style.as_mut() {
                    style.line_color = Some(normalize_whitespace(&text));
                }
            }
            ("color", Some("PolyStyle")) => {
                if let Some(style) = self.style.as_mut() {
                    style.poly_color = Some(normalize_whitespace(&text));
                }
            }
            ("width", Some("LineStyle")) => {
                if let Some(style) = self.style.as_mut() {
                    style.line_width = Some(text.trim().parse().unwrap_or(DEFAULT_LINE_WIDTH));
                }
            }
            ("Style", _) => {
                if let Some(style) = self.style.take() {
                    match self.placemark.as_mut() {
                        Some(placemark) => placemark.inline_style = Some(style),
                        None if !style.id.is_empty() => {
                            self.document.styles.insert(style.id.clone(), style);
                        }
                        None => {}
                    }
                }
            }
            ("key", Some("Pair")) => {
                if let Some(map) = self.style_map.as_mut() {
                    map.key = Some(normalize_whitespace(&text));
                }
            }
            ("styleUrl", Some("Pair")) => {
                if let Some(map) = self.style_map.as_mut() {
                    map.url = Some(normalize_whitespace(&text));
                }
            }
            ("Pair", _) => {
                if let Some(map) = self.style_map.as_mut() {
                    if map.key.as_deref() == Some("normal") {
                        map.normal = map.url.take();
                    }
                }
            }
            ("StyleMap", _) => {
                if let Some(map) = self.style_map.take() {
                    if let (false, Some(normal)) = (map.id.is_empty(), map.normal) {
                        self.document.style_maps.insert(map.id, normal);
                    }
                }
            }
            ("name", Some("Placemark")) => {
                if let Some(placemark) = self.placemark.as_mut() {
                    placemark.name = Some(normalize_whitespace(&text));
                }
            }
            ("description", Some("Placemark")) => {
                if let Some(placemark) = self.placemark.as_mut() {
                    placemark.description = Some(normalize_whitespace(&text));
                }
            }
            ("styleUrl", Some("Placemark")) => {
                if let Some(placemark) = self.placemark.as_mut() {
                    placemark.style_url = Some(normalize_whitespace(&text));
                }
            }
            ("coordinates", _) => self.coordinates(&text),
            ("Placemark", _) => {
                if let Some(placemark) = self.placemark.take() {
                    self.document.placemarks.push(placemark.finish());
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn coordinates(&mut self, text: &str) {
        let enclosing = self.enclosing_geometry();
        let in_outer = self.inside("outerBoundaryIs");
        let in_inner = self.inside("innerBoundaryIs");
        let Some(placemark) = self.placemark.as_mut() else {
            return;
        };
        if enclosing.is_none() || enclosing != placemark.kind {
            return;
        }

        let tokens: Vec<String> = text.split_whitespace().map(str::to_string).collect();
        match enclosing {
            Some(GeometryKind::Polygon) if in_outer => placemark.outer = tokens,
            Some(GeometryKind::Polygon) if in_inner => placemark.inner.push(tokens),
            Some(GeometryKind::Polygon) => {}
            _ => placemark.coordinates = tokens,
        }
    }
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn malformed(offset: u64, reason: impl std::fmt::Display) -> KmlError {
    KmlError::Malformed {
        offset: offset as usize,
        reason: reason.to_string(),
    }
}

/// Local part of a tag name (`kml:Placemark` -> `Placemark`).
fn tag_name(raw: &[u8], offset: u64) -> Result<String, KmlError> {
    std::str::from_utf8(raw)
        .map(str::to_string)
        .map_err(|e| malformed(offset, e))
}

/// The `id` attribute of a start tag, matched by local name.
fn id_attribute(start: &BytesStart<'_>, offset: u64) -> Result<Option<String>, KmlError> {
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| malformed(offset, e))?;
        if attribute.key.local_name().as_ref() == b"id" {
            let value = attribute
                .unescape_value()
                .map_err(|e| malformed(offset, e))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn open_element(
    state: &mut ParseState,
    start: &BytesStart<'_>,
    offset: u64,
) -> Result<String, KmlError> {
    let name = tag_name(start.local_name().as_ref(), offset)?;
    let id = match name.as_str() {
        "Style" | "StyleMap" => id_attribute(start, offset)?,
        _ => None,
    };
    state.open(&name, id);
    Ok(name)
}

/// Collect every style and placemark from a KML document.
///
/// Fails only when the document itself cannot be read (unterminated or
/// mismatched tags). Declarations, comments and `<!DOCTYPE>` are ignored;
/// CDATA sections are taken as raw text.
pub fn parse_document(text: &str) -> Result<KmlDocument, KmlError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut reader = Reader::from_str(text);
    // Mismatches are reported by the tag stack with both names.
    reader.config_mut().check_end_names = false;
    let mut state = ParseState::default();

    loop {
        let offset = reader.buffer_position();
        let event = reader
            .read_event()
            .map_err(|e| malformed(reader.error_position(), e))?;
        match event {
            Event::Start(start) => {
                open_element(&mut state, &start, offset)?;
            }
            Event::Empty(start) => {
                let name = open_element(&mut state, &start, offset)?;
                state.close(&name)?;
            }
            Event::End(end) => {
                let name = tag_name(end.local_name().as_ref(), offset)?;
                state.close(&name)?;
            }
            Event::Text(chunk) => {
                let decoded = chunk.unescape().unwrap_or_else(|e| {
                    tracing::debug!(error = %e, "Keeping KML text with unknown entity as is");
                    Cow::Owned(String::from_utf8_lossy(&chunk).into_owned())
                });
                state.text.push_str(&decoded);
            }
            Event::CData(chunk) => state.text.push_str(&String::from_utf8_lossy(&chunk)),
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = state.stack.last() {
        return Err(malformed(
            reader.buffer_position(),
            format!("element <{open}> is never closed"),
        ));
    }

    Ok(state.document)
}

// ---------------------------------------------------------------------------
// Conversion to lands
// ---------------------------------------------------------------------------

/// Parse one `lon,lat[,alt]` token. Every field must be a finite number
/// and the position must lie within WGS84 bounds.
pub fn parse_lat_lng(token: &str) -> Result<Point, KmlError> {
    let invalid = || KmlError::InvalidCoordinate(token.to_string());
    let fields: Vec<&str> = token.split(',').collect();
    if !(2..=3).contains(&fields.len()) {
        return Err(invalid());
    }
    let numbers = fields
        .iter()
        .map(|f| f.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| invalid())?;
    if numbers.iter().any(|n| !n.is_finite()) {
        return Err(invalid());
    }
    let (longitude, latitude) = (numbers[0], numbers[1]);
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(invalid());
    }
    Ok(Point::new(latitude, longitude))
}

/// Parse a coordinate list into an open ring: a trailing point equal to
/// the first one is dropped.
fn parse_ring(tokens: &[String]) -> Result<Ring, KmlError> {
    let mut ring = tokens
        .iter()
        .map(|t| parse_lat_lng(t))
        .collect::<Result<Ring, _>>()?;
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    Ok(ring)
}

fn land_color(document: &KmlDocument, placemark: &KmlPlacemark) -> Argb {
    let style = match placemark.style_url.as_deref() {
        Some(url) => document.style(url),
        None => placemark.inline_style.as_ref(),
    };
    style
        .and_then(|s| s.poly_color.as_deref())
        .and_then(|raw| match Argb::from_kml_hex(raw) {
            Ok(color) => Some(color),
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring unreadable KML color");
                None
            }
        })
        .unwrap_or(DEFAULT_LAND_COLOR)
}

fn to_land(
    id: DbId,
    document: &KmlDocument,
    placemark: &KmlPlacemark,
    outer: &[String],
    inner: &[Vec<String>],
) -> Result<Land, KmlError> {
    let border = parse_ring(outer)?;
    let holes = inner
        .iter()
        .map(|hole| parse_ring(hole))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Land {
        id,
        title: placemark.name.clone().unwrap_or_default(),
        color: land_color(document, placemark),
        border,
        holes: non_empty_holes(holes),
    })
}

/// Decode lands and report how many placemarks were dropped.
///
/// Every polygon placemark takes the next id (1-based, document order),
/// even when its coordinates turn out to be unreadable and it is dropped.
pub fn decode_report(text: &str) -> Result<DecodeReport, KmlError> {
    let document = parse_document(text)?;
    let mut report = DecodeReport::default();
    let mut next_id: DbId = 0;

    for placemark in &document.placemarks {
        let Some(KmlGeometry::Polygon { outer, inner }) = &placemark.geometry else {
            report.skipped += 1;
            continue;
        };
        next_id += 1;
        match to_land(next_id, &document, placemark, outer, inner) {
            Ok(land) => report.lands.push(land),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    name = placemark.name.as_deref().unwrap_or_default(),
                    "Dropping placemark with unreadable boundary"
                );
                report.skipped += 1;
            }
        }
    }

    Ok(report)
}

/// Decode every polygon placemark of a KML document into a [`Land`].
pub fn decode(text: &str) -> Result<Vec<Land>, KmlError> {
    decode_report(text).map(|report| report.lands)
}
