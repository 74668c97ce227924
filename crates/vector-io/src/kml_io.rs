//! KML reader and writer (WGS84 only).
//!
//! The reader walks Placemarks anywhere in the document and collects their
//! name, description and `ExtendedData` values. Supported geometries are
//! Point, LineString, LinearRing, Polygon and MultiGeometry.

use geo_types::{
    Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon,
    Point, Polygon,
};
use gis_common::{Crs, GisError, GisResult};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde_json::Value;

use crate::dataset::{Feature, Properties, VectorDataset};

const FORMAT: &str = "KML";
const KML_NS: &str = "http://www.opengis.net/kml/2.2";

/// Partially built geometry; nested for MultiGeometry and Polygon rings.
#[derive(Debug)]
enum GeometryFrame {
    Multi(Vec<Geometry<f64>>),
    Polygon {
        exterior: Option<LineString<f64>>,
        interiors: Vec<LineString<f64>>,
    },
}

#[derive(Debug, Default)]
struct PlacemarkState {
    properties: Properties,
    geometries: Vec<Geometry<f64>>,
    frames: Vec<GeometryFrame>,
    data_name: Option<String>,
}

impl PlacemarkState {
    fn push_geometry(&mut self, geometry: Geometry<f64>) {
        match self.frames.last_mut() {
            Some(GeometryFrame::Multi(children)) => children.push(geometry),
            _ => self.geometries.push(geometry),
        }
    }

    fn push_ring(&mut self, ring: LineString<f64>, outer: bool) {
        if let Some(GeometryFrame::Polygon {
            exterior,
            interiors,
        }) = self.frames.last_mut()
        {
            if outer {
                *exterior = Some(ring);
            } else {
                interiors.push(ring);
            }
        } else {
            self.push_geometry(Geometry::LineString(ring));
        }
    }

    fn into_feature(mut self) -> Feature {
        let geometry = match self.geometries.len() {
            0 => None,
            1 => self.geometries.pop(),
            _ => Some(Geometry::GeometryCollection(GeometryCollection::new_from(
                self.geometries,
            ))),
        };
        Feature::new(geometry, self.properties)
    }
}

/// Homogeneous parts become the matching Multi* type.
fn collapse_multi(children: Vec<Geometry<f64>>) -> Geometry<f64> {
    if !children.is_empty() && children.iter().all(|g| matches!(g, Geometry::Point(_))) {
        let points = children
            .into_iter()
            .filter_map(|g| Point::try_from(g).ok())
            .collect();
        return Geometry::MultiPoint(MultiPoint::new(points));
    }
    if !children.is_empty() && children.iter().all(|g| matches!(g, Geometry::LineString(_))) {
        let lines = children
            .into_iter()
            .filter_map(|g| LineString::try_from(g).ok())
            .collect();
        return Geometry::MultiLineString(MultiLineString::new(lines));
    }
    if !children.is_empty() && children.iter().all(|g| matches!(g, Geometry::Polygon(_))) {
        let polygons = children
            .into_iter()
            .filter_map(|g| Polygon::try_from(g).ok())
            .collect();
        return Geometry::MultiPolygon(MultiPolygon::new(polygons));
    }
    Geometry::GeometryCollection(GeometryCollection::new_from(children))
}

fn parse_coordinates(text: &str) -> GisResult<Vec<Coord<f64>>> {
    text.split_whitespace()
        .map(|tuple| {
            let mut parts = tuple.split(',').map(str::trim);
            let x = parts.next().and_then(|v| v.parse::<f64>().ok());
            let y = parts.next().and_then(|v| v.parse::<f64>().ok());
            match (x, y) {
                (Some(x), Some(y)) => Ok(Coord { x, y }),
                _ => Err(GisError::parse(
                    FORMAT,
                    format!("invalid coordinate tuple '{}'", tuple),
                )),
            }
        })
        .collect()
}

/// Parse a KML document into a WGS84 dataset.
pub fn parse_kml(text: &str) -> GisResult<VectorDataset> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut features = Vec::new();
    let mut placemark: Option<PlacemarkState> = None;
    // Open element names, outermost first.
    let mut path: Vec<String> = Vec::new();
    let mut saw_kml_root = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| GisError::parse(FORMAT, e))?;

        match event {
            Event::Start(start) => {
                let name = local_name(&start);
                if path.is_empty() {
                    saw_kml_root = name == "kml";
                }
                if let Some(state) = placemark.as_mut() {
                    match name.as_str() {
                        "MultiGeometry" => state.frames.push(GeometryFrame::Multi(Vec::new())),
                        "Polygon" => state.frames.push(GeometryFrame::Polygon {
                            exterior: None,
                            interiors: Vec::new(),
                        }),
                        "Data" | "SimpleData" => state.data_name = attribute(&start, "name")?,
                        _ => {}
                    }
                } else if name == "Placemark" {
                    placemark = Some(PlacemarkState::default());
                }
                path.push(name);
            }
            Event::Empty(start) => {
                if local_name(&start) == "Placemark" && placemark.is_none() {
                    features.push(Feature::new(None, Properties::new()));
                }
            }
            Event::Text(text) => {
                let Some(state) = placemark.as_mut() else {
                    continue;
                };
                let value = text
                    .unescape()
                    .map_err(|e| GisError::parse(FORMAT, e))?
                    .into_owned();
                handle_text(state, &path, value)?;
            }
            Event::CData(data) => {
                let Some(state) = placemark.as_mut() else {
                    continue;
                };
                let value = String::from_utf8_lossy(&data.into_inner()).into_owned();
                handle_text(state, &path, value)?;
            }
            Event::End(_) => {
                let Some(name) = path.pop() else {
                    continue;
                };
                if name == "Placemark" {
                    if let Some(state) = placemark.take() {
                        features.push(state.into_feature());
                    }
                    continue;
                }
                let Some(state) = placemark.as_mut() else {
                    continue;
                };
                match name.as_str() {
                    "MultiGeometry" => {
                        if let Some(GeometryFrame::Multi(children)) = state.frames.pop() {
                            state.push_geometry(collapse_multi(children));
                        }
                    }
                    "Polygon" => {
                        if let Some(GeometryFrame::Polygon {
                            exterior,
                            interiors,
                        }) = state.frames.pop()
                        {
                            let exterior = exterior.ok_or_else(|| {
                                GisError::parse(FORMAT, "Polygon without outerBoundaryIs")
                            })?;
                            state.push_geometry(Geometry::Polygon(Polygon::new(
                                exterior, interiors,
                            )));
                        }
                    }
                    "Data" | "SimpleData" => state.data_name = None,
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_kml_root {
        return Err(GisError::parse(FORMAT, "document root is not <kml>"));
    }

    Ok(VectorDataset::new(features, Some(Crs::wgs84())))
}

fn handle_text(state: &mut PlacemarkState, path: &[String], value: String) -> GisResult<()> {
    let Some(current) = path.last() else {
        return Ok(());
    };
    let parent = path.len().checked_sub(2).and_then(|i| path.get(i));

    match (current.as_str(), parent.map(String::as_str)) {
        ("name", Some("Placemark")) => {
            state.properties.insert("name".to_string(), Value::String(value));
        }
        ("description", Some("Placemark")) => {
            state
                .properties
                .insert("description".to_string(), Value::String(value));
        }
        ("value", Some("Data")) | ("SimpleData", _) => {
            if let Some(key) = state.data_name.clone() {
                state.properties.insert(key, Value::String(value));
            }
        }
        ("coordinates", Some(owner)) => {
            let coords = parse_coordinates(&value)?;
            match owner {
                "Point" => {
                    let coord = coords.first().copied().ok_or_else(|| {
                        GisError::parse(FORMAT, "Point without coordinates")
                    })?;
                    state.push_geometry(Geometry::Point(Point::from(coord)));
                }
                "LineString" => state.push_geometry(Geometry::LineString(LineString::new(coords))),
                "LinearRing" => {
                    let grandparent = path.len().checked_sub(3).and_then(|i| path.get(i));
                    let ring = LineString::new(coords);
                    match grandparent.map(String::as_str) {
                        Some("outerBoundaryIs") => state.push_ring(ring, true),
                        Some("innerBoundaryIs") => state.push_ring(ring, false),
                        _ => state.push_geometry(Geometry::LineString(ring)),
                    }
                }
                _ => {}
            }
        }
        _ => {}
    }
    Ok(())
}

fn local_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.local_name().as_ref()).into_owned()
}

fn attribute(start: &BytesStart<'_>, key: &str) -> GisResult<Option<String>> {
    for attr in start.attributes() {
        let attr = attr.map_err(|e| GisError::parse(FORMAT, e))?;
        if attr.key.local_name().as_ref() == key.as_bytes() {
            let value = attr
                .unescape_value()
                .map_err(|e| GisError::parse(FORMAT, e))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

type XmlWriter = Writer<Vec<u8>>;

fn xml_err(e: impl ToString) -> GisError {
    GisError::serialize(FORMAT, e)
}

fn open(writer: &mut XmlWriter, name: &str) -> GisResult<()> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(xml_err)
}

fn close(writer: &mut XmlWriter, name: &str) -> GisResult<()> {
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(xml_err)
}

fn text_element(writer: &mut XmlWriter, name: &str, text: &str) -> GisResult<()> {
    open(writer, name)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(xml_err)?;
    close(writer, name)
}

fn format_coords<'a>(coords: impl Iterator<Item = &'a Coord<f64>>) -> String {
    coords
        .map(|c| format!("{},{}", c.x, c.y))
        .collect::<Vec<_>>()
        .join(" ")
}

fn write_ring(writer: &mut XmlWriter, boundary: &str, ring: &LineString<f64>) -> GisResult<()> {
    open(writer, boundary)?;
    open(writer, "LinearRing")?;
    text_element(writer, "coordinates", &format_coords(ring.coords()))?;
    close(writer, "LinearRing")?;
    close(writer, boundary)
}

fn write_polygon(writer: &mut XmlWriter, polygon: &Polygon<f64>) -> GisResult<()> {
    open(writer, "Polygon")?;
    write_ring(writer, "outerBoundaryIs", polygon.exterior())?;
    for interior in polygon.interiors() {
        write_ring(writer, "innerBoundaryIs", interior)?;
    }
    close(writer, "Polygon")
}

fn write_multi<'a>(
    writer: &mut XmlWriter,
    parts: impl Iterator<Item = Geometry<f64>> + 'a,
) -> GisResult<()> {
    open(writer, "MultiGeometry")?;
    for part in parts {
        write_geometry(writer, &part)?;
    }
    close(writer, "MultiGeometry")
}

fn write_geometry(writer: &mut XmlWriter, geometry: &Geometry<f64>) -> GisResult<()> {
    match geometry {
        Geometry::Point(p) => {
            open(writer, "Point")?;
            text_element(writer, "coordinates", &format!("{},{}", p.x(), p.y()))?;
            close(writer, "Point")
        }
        Geometry::Line(line) => {
            write_geometry(writer, &Geometry::LineString(LineString::from(*line)))
        }
        Geometry::LineString(ls) => {
            open(writer, "LineString")?;
            text_element(writer, "coordinates", &format_coords(ls.coords()))?;
            close(writer, "LineString")
        }
        Geometry::Polygon(p) => write_polygon(writer, p),
        Geometry::Rect(r) => write_polygon(writer, &r.to_polygon()),
        Geometry::Triangle(t) => write_polygon(writer, &t.to_polygon()),
        Geometry::MultiPoint(mp) => write_multi(writer, mp.iter().map(|p| Geometry::Point(*p))),
        Geometry::MultiLineString(mls) => {
            write_multi(writer, mls.iter().cloned().map(Geometry::LineString))
        }
        Geometry::MultiPolygon(mp) => {
            write_multi(writer, mp.iter().cloned().map(Geometry::Polygon))
        }
        Geometry::GeometryCollection(gc) => write_multi(writer, gc.iter().cloned()),
    }
}

fn property_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Serialize a WGS84 dataset as a KML document.
pub fn write_kml(dataset: &VectorDataset, document_name: &str) -> GisResult<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_err)?;
    writer
        .write_event(Event::Start(
            BytesStart::new("kml").with_attributes([("xmlns", KML_NS)]),
        ))
        .map_err(xml_err)?;
    open(&mut writer, "Document")?;
    text_element(&mut writer, "name", document_name)?;
    open(&mut writer, "Folder")?;
    text_element(&mut writer, "name", document_name)?;

    for feature in &dataset.features {
        open(&mut writer, "Placemark")?;

        if let Some(name) = feature.properties.get("name").filter(|v| !v.is_null()) {
            text_element(&mut writer, "name", &property_text(name))?;
        }
        if let Some(desc) = feature.properties.get("description").filter(|v| !v.is_null()) {
            text_element(&mut writer, "description", &property_text(desc))?;
        }

        let extended: Vec<_> = feature
            .properties
            .iter()
            .filter(|(k, v)| k.as_str() != "name" && k.as_str() != "description" && !v.is_null())
            .collect();
        if !extended.is_empty() {
            open(&mut writer, "ExtendedData")?;
            for (key, value) in extended {
                writer
                    .write_event(Event::Start(
                        BytesStart::new("Data").with_attributes([("name", key.as_str())]),
                    ))
                    .map_err(xml_err)?;
                text_element(&mut writer, "value", &property_text(value))?;
                close(&mut writer, "Data")?;
            }
            close(&mut writer, "ExtendedData")?;
        }

        if let Some(geometry) = &feature.geometry {
            write_geometry(&mut writer, geometry)?;
        }
        close(&mut writer, "Placemark")?;
    }

    close(&mut writer, "Folder")?;
    close(&mut writer, "Document")?;
    close(&mut writer, "kml")?;

    String::from_utf8(writer.into_inner()).map_err(xml_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{point, polygon};

    const DOCUMENT: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <Folder>
      <Placemark>
        <name>Depot</name>
        <description><![CDATA[Main <b>depot</b>]]></description>
        <ExtendedData>
          <Data name="capacity"><value>40</value></Data>
          <SchemaData schemaUrl="#s"><SimpleData name="owner">city</SimpleData></SchemaData>
        </ExtendedData>
        <Point><coordinates>10.5,59.9,0</coordinates></Point>
      </Placemark>
      <Placemark>
        <name>Park</name>
        <Polygon>
          <outerBoundaryIs><LinearRing>
            <coordinates>0,0 0,4 4,4 4,0 0,0</coordinates>
          </LinearRing></outerBoundaryIs>
          <innerBoundaryIs><LinearRing>
            <coordinates>1,1 1,2 2,2 2,1 1,1</coordinates>
          </LinearRing></innerBoundaryIs>
        </Polygon>
      </Placemark>
      <Placemark>
        <MultiGeometry>
          <Point><coordinates>1,1</coordinates></Point>
          <LineString><coordinates>0,0 1,1</coordinates></LineString>
        </MultiGeometry>
      </Placemark>
    </Folder>
  </Document>
</kml>"##;

    #[test]
    fn test_parse_placemarks() {
        let dataset = parse_kml(DOCUMENT).unwrap();
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.crs, Some(Crs::wgs84()));

        let depot = &dataset.features[0];
        assert_eq!(depot.properties["name"], "Depot");
        assert_eq!(depot.properties["description"], "Main <b>depot</b>");
        assert_eq!(depot.properties["capacity"], "40");
        assert_eq!(depot.properties["owner"], "city");
        assert_eq!(depot.geometry, Some(point!(x: 10.5, y: 59.9).into()));

        match &dataset.features[1].geometry {
            Some(Geometry::Polygon(p)) => assert_eq!(p.interiors().len(), 1),
            other => panic!("expected polygon, got {:?}", other),
        }

        match &dataset.features[2].geometry {
            Some(Geometry::GeometryCollection(gc)) => assert_eq!(gc.len(), 2),
            other => panic!("expected collection, got {:?}", other),
        }
    }

    #[test]
    fn test_homogeneous_multigeometry_collapses() {
        let text = r#"<kml><Placemark><MultiGeometry>
            <Point><coordinates>1,1</coordinates></Point>
            <Point><coordinates>2,2</coordinates></Point>
        </MultiGeometry></Placemark></kml>"#;
        let dataset = parse_kml(text).unwrap();
        match &dataset.features[0].geometry {
            Some(Geometry::MultiPoint(mp)) => assert_eq!(mp.0.len(), 2),
            other => panic!("expected multipoint, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_non_kml_root() {
        let err = parse_kml("<gpx><trk/></gpx>").unwrap_err();
        assert_eq!(err.code(), "parse_error");
    }

    #[test]
    fn test_parse_rejects_bad_coordinates() {
        let text = r#"<kml><Placemark><Point><coordinates>abc</coordinates></Point></Placemark></kml>"#;
        assert!(parse_kml(text).is_err());
    }

    #[test]
    fn test_write_then_parse() {
        let mut properties = Properties::new();
        properties.insert("name".into(), "Lake".into());
        properties.insert("depth".into(), 12.into());
        properties.insert("note".into(), Value::Null);

        let dataset = VectorDataset::new(
            vec![Feature::new(
                Some(polygon![(x: 0., y: 0.), (x: 0., y: 1.), (x: 1., y: 1.), (x: 0., y: 0.)].into()),
                properties,
            )],
            Some(Crs::wgs84()),
        );

        let text = write_kml(&dataset, "converted").unwrap();
        assert!(text.contains("<Data name=\"depth\">"));
        assert!(!text.contains("note"));

        let parsed = parse_kml(&text).unwrap();
        assert_eq!(parsed.features[0].properties["name"], "Lake");
        assert_eq!(parsed.features[0].properties["depth"], "12");
        assert_eq!(parsed.features[0].geometry, dataset.features[0].geometry);
    }
}
