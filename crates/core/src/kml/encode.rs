use std::fmt::Write;

use crate::model::{Land, Point};

const KML_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
"#;

const KML_FOOTER: &str = "  </Document>\n</kml>\n";

/// Encode lands as a KML document.
///
/// Lands with an empty border are skipped. Returns `None` when no land
/// has a border at all.
pub fn encode(lands: &[Land]) -> Option<String> {
    let drawable: Vec<(String, &Land)> = lands
        .iter()
        .enumerate()
        .filter(|(_, land)| !land.border.is_empty())
        .map(|(index, land)| (style_id(index, land), land))
        .collect();
    if drawable.is_empty() {
        return None;
    }

    let mut out = String::from(KML_HEADER);
    for (id, land) in &drawable {
        write_style(&mut out, id, land).ok()?;
    }
    for (id, land) in &drawable {
        write_placemark(&mut out, id, land).ok()?;
    }
    out.push_str(KML_FOOTER);
    Some(out)
}

/// Styles are keyed by land id. Unsaved lands all share id 0, so they get
/// a positional key instead.
fn style_id(index: usize, land: &Land) -> String {
    if land.is_saved() {
        land.id.to_string()
    } else {
        format!("new-{}", index + 1)
    }
}

fn write_style(out: &mut String, id: &str, land: &Land) -> std::fmt::Result {
    writeln!(out, "    <Style id=\"{}\">", escape(id))?;
    writeln!(out, "      <LineStyle>")?;
    writeln!(out, "        <color>{}</color>", land.color.opaque().to_kml_hex())?;
    writeln!(out, "        <width>1</width>")?;
    writeln!(out, "      </LineStyle>")?;
    writeln!(out, "      <PolyStyle>")?;
    writeln!(out, "        <color>{}</color>", land.color.to_kml_hex())?;
    writeln!(out, "      </PolyStyle>")?;
    writeln!(out, "    </Style>")
}

fn write_placemark(out: &mut String, id: &str, land: &Land) -> std::fmt::Result {
    writeln!(out, "    <Placemark>")?;
    writeln!(out, "      <name>{}</name>", escape(&land.title))?;
    writeln!(out, "      <styleUrl>#{}</styleUrl>", escape(id))?;
    writeln!(out, "      <Polygon>")?;
    writeln!(out, "        <extrude>1</extrude>")?;
    writeln!(out, "        <tessellate>1</tessellate>")?;
    writeln!(out, "        <altitudeMode>clampToGround</altitudeMode>")?;
    writeln!(out, "        <outerBoundaryIs>")?;
    write_ring(out, &land.border)?;
    writeln!(out, "        </outerBoundaryIs>")?;
    for hole in land.holes.iter().filter(|hole| !hole.is_empty()) {
        writeln!(out, "        <innerBoundaryIs>")?;
        write_ring(out, hole)?;
        writeln!(out, "        </innerBoundaryIs>")?;
    }
    writeln!(out, "      </Polygon>")?;
    writeln!(out, "    </Placemark>")
}

/// Write a `<LinearRing>`, repeating the first point at the end when the
/// ring is not already closed.
fn write_ring(out: &mut String, ring: &[Point]) -> std::fmt::Result {
    writeln!(out, "          <LinearRing>")?;
    writeln!(out, "            <coordinates>")?;
    for point in ring {
        write_coordinate(out, point)?;
    }
    if let (Some(first), Some(last)) = (ring.first(), ring.last()) {
        if first != last {
            write_coordinate(out, first)?;
        }
    }
    writeln!(out, "            </coordinates>")?;
    writeln!(out, "          </LinearRing>")
}

fn write_coordinate(out: &mut String, point: &Point) -> std::fmt::Result {
    writeln!(
        out,
        "              {},{},0",
        point.longitude, point.latitude
    )
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Argb;

    fn triangle(id: i64) -> Land {
        Land::new(
            id,
            "Triangle",
            Argb(0x7d00_ff00),
            vec![
                Point::new(1.0, 2.0),
                Point::new(1.5, 2.5),
                Point::new(1.0, 3.0),
            ],
            vec![],
        )
    }

    #[test]
    fn test_encode_nothing_to_write() {
        assert_eq!(encode(&[]), None);
        assert_eq!(encode(&[Land::empty()]), None);
    }

    #[test]
    fn test_encode_skips_lands_without_border() {
        let text = encode(&[Land::empty(), triangle(3)]).unwrap();
        assert_eq!(text.matches("<Placemark>").count(), 1);
        assert_eq!(text.matches("<Style id=").count(), 1);
    }

    #[test]
    fn test_encode_closes_ring_and_uses_lon_lat_order() {
        let text = encode(&[triangle(3)]).unwrap();
        let coords: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|l| l.ends_with(",0"))
            .collect();
        assert_eq!(coords, vec!["2,1,0", "2.5,1.5,0", "3,1,0", "2,1,0"]);
    }

    #[test]
    fn test_encode_does_not_double_close() {
        let mut land = triangle(3);
        land.border.push(land.border[0]);
        let text = encode(&[land]).unwrap();
        assert_eq!(text.matches("2,1,0").count(), 2);
    }

    #[test]
    fn test_encode_style_and_colors() {
        let text = encode(&[triangle(42)]).unwrap();
        assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(text.contains("<Style id=\"42\">"));
        assert!(text.contains("<styleUrl>#42</styleUrl>"));
        assert!(text.contains("<color>7d00ff00</color>"));
        assert!(text.contains("<color>ff00ff00</color>"));
        assert!(text.contains("<width>1</width>"));
        assert!(text.contains("<altitudeMode>clampToGround</altitudeMode>"));
        assert!(text.trim_end().ends_with("</kml>"));
    }

    #[test]
    fn test_encode_converts_argb_to_kml_order() {
        let mut land = triangle(1);
        land.color = Argb(0x80ff_0000);
        let text = encode(&[land]).unwrap();
        assert!(text.contains("<color>800000ff</color>"));
    }

    #[test]
    fn test_encode_holes_and_unsaved_ids() {
        let mut land = triangle(0);
        land.holes = vec![vec![
            Point::new(1.1, 2.4),
            Point::new(1.2, 2.5),
            Point::new(1.1, 2.6),
        ]];
        let text = encode(&[land.clone(), land]).unwrap();
        assert_eq!(text.matches("<innerBoundaryIs>").count(), 2);
        assert!(text.contains("<Style id=\"new-1\">"));
        assert!(text.contains("<Style id=\"new-2\">"));
    }

    #[test]
    fn test_escape_title() {
        assert_eq!(escape("A & <B> \"c\" 'd'"), "A &amp; &lt;B&gt; &quot;c&quot; &apos;d&apos;");
    }
}
