//! Common vector fixtures for quickgis tests.
//!
//! All fixtures describe the same small scene near Oslo so results can be
//! compared across formats: two point features (`depot`, `harbor`) or one
//! polygon (`park`), WGS84 lon/lat.

/// Two WGS84 points with mixed attribute types.
pub const POINTS_GEOJSON: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {"type": "Feature", "properties": {"name": "depot", "capacity": 40, "active": true},
     "geometry": {"type": "Point", "coordinates": [10.75, 59.91]}},
    {"type": "Feature", "properties": {"name": "harbor", "capacity": 12, "active": false},
     "geometry": {"type": "Point", "coordinates": [10.73, 59.90]}}
  ]
}"#;

/// A roughly 1.1 km x 1.1 km square around the depot.
pub const PARK_GEOJSON: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {"type": "Feature", "properties": {"name": "park", "zone": "green"},
     "geometry": {"type": "Polygon", "coordinates": [[
       [10.74, 59.905], [10.76, 59.905], [10.76, 59.915], [10.74, 59.915], [10.74, 59.905]
     ]]}}
  ]
}"#;

/// A square far from the scene, for no-overlap cases.
pub const FAR_AWAY_GEOJSON: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {"type": "Feature", "properties": {"name": "elsewhere"},
     "geometry": {"type": "Polygon", "coordinates": [[
       [-70.0, -30.0], [-69.0, -30.0], [-69.0, -29.0], [-70.0, -29.0], [-70.0, -30.0]
     ]]}}
  ]
}"#;

/// The two points as KML placemarks.
pub const POINTS_KML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <Placemark>
      <name>depot</name>
      <ExtendedData><Data name="capacity"><value>40</value></Data></ExtendedData>
      <Point><coordinates>10.75,59.91,0</coordinates></Point>
    </Placemark>
    <Placemark>
      <name>harbor</name>
      <ExtendedData><Data name="capacity"><value>12</value></Data></ExtendedData>
      <Point><coordinates>10.73,59.90,0</coordinates></Point>
    </Placemark>
  </Document>
</kml>"#;

/// The two points as CSV with lon/lat columns (no CRS).
pub const POINTS_CSV: &str = "name,capacity,lon,lat\ndepot,40,10.75,59.91\nharbor,12,10.73,59.90\n";

/// The two points as CSV with a WKT column (no CRS).
pub const POINTS_WKT_CSV: &str =
    "name,capacity,WKT\ndepot,40,POINT(10.75 59.91)\nharbor,12,POINT(10.73 59.9)\n";

/// Bounding box of the scene as (min_lon, min_lat, max_lon, max_lat).
pub const SCENE_BBOX: (f64, f64, f64, f64) = (10.70, 59.88, 10.80, 59.94);
