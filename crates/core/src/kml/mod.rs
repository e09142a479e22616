//! KML import and export for land boundaries.
//!
//! [`decode`] turns a KML document into [`Land`](crate::model::Land)s:
//! a `quick_xml` event reader feeds a tag-stack parser that collects
//! styles and placemarks, and only polygon placemarks are resolved into
//! lands. [`encode`] writes lands back as a KML 2.2 document.
//!
//! Both directions are one-shot transforms over an in-memory buffer and
//! hold no shared state, so they can run on any worker thread.

mod decode;
mod encode;

pub use decode::{
    decode, decode_report, parse_document, parse_lat_lng, DecodeReport, KmlDocument,
    KmlGeometry, KmlPlacemark, KmlStyle,
};
pub use encode::encode;

/// Errors raised while reading a KML document.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum KmlError {
    #[error("Malformed KML at byte {offset}: {reason}")]
    Malformed { offset: usize, reason: String },

    #[error("Mismatched closing tag: expected </{expected}>, found </{found}>")]
    MismatchedTag { expected: String, found: String },

    /// A single `lon,lat[,alt]` token could not be read. Only the
    /// placemark carrying it is dropped.
    #[error("Invalid coordinate '{0}'")]
    InvalidCoordinate(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Argb;
    use crate::model::{Land, Point};

    fn field(id: i64, title: &str, color: u32) -> Land {
        Land::new(
            id,
            title,
            Argb(color),
            vec![
                Point::new(45.10, 7.60),
                Point::new(45.10, 7.62),
                Point::new(45.12, 7.62),
                Point::new(45.12, 7.60),
            ],
            vec![vec![
                Point::new(45.105, 7.605),
                Point::new(45.105, 7.610),
                Point::new(45.110, 7.610),
            ]],
        )
    }

    #[test]
    fn test_encode_then_decode_reproduces_lands() {
        let lands = vec![
            field(4, "Vineyard & orchard", 0x7d00_ff00),
            field(9, "<South>", 0xff12_3456),
        ];
        let text = encode(&lands).expect("lands have borders");
        let decoded = decode(&text).unwrap();

        assert_eq!(decoded.len(), 2);
        for (original, back) in lands.iter().zip(&decoded) {
            assert_eq!(back.title, original.title);
            assert_eq!(back.color, original.color);
            assert_eq!(back.border, original.border);
            assert_eq!(back.holes, original.holes);
        }
        // Ids are reassigned in document order.
        assert_eq!(decoded[0].id, 1);
        assert_eq!(decoded[1].id, 2);
    }

    #[test]
    fn test_decode_then_encode_is_stable() {
        let text = encode(&[field(1, "A", 0x8011_2233)]).unwrap();
        let again = encode(&decode(&text).unwrap()).unwrap();
        assert_eq!(again, text);
    }
}
