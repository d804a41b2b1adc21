//! Sérialisation GeoJSON (FeatureCollection)
//!
//! L'ordre des clés est stable: `type, id, geometry, properties` pour chaque
//! feature, afin que deux exports d'un même tableau soient identiques.

use geo::Point;
use serde::de;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::feature::Feature;
use crate::record::Record;
use crate::types::{integral, CellValue};

/// Collection ordonnée de features
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// JSON indenté sur deux espaces
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Relit une collection produite par `to_json_pretty`
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Conversion vers les types du crate `geojson`
    pub fn to_geojson(&self) -> geojson::FeatureCollection {
        geojson::FeatureCollection {
            bbox: None,
            features: self.features.iter().map(to_geojson_feature).collect(),
            foreign_members: None,
        }
    }
}

fn to_geojson_feature(feature: &Feature) -> geojson::Feature {
    let id = match &feature.id {
        CellValue::Number(n) => match integral(*n) {
            Some(i) => Some(geojson::feature::Id::Number(i.into())),
            None => serde_json::Number::from_f64(*n).map(geojson::feature::Id::Number),
        },
        other => Some(geojson::feature::Id::String(other.to_text())),
    };

    let properties = match serde_json::to_value(&feature.properties) {
        Ok(serde_json::Value::Object(map)) => Some(map),
        _ => None,
    };

    geojson::Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(geojson::Value::Point(vec![
            feature.longitude(),
            feature.latitude(),
        ]))),
        id,
        properties,
        foreign_members: None,
    }
}

#[derive(Serialize, Deserialize)]
struct PointRepr {
    #[serde(rename = "type")]
    kind: String,
    coordinates: [f64; 2],
}

#[derive(Serialize)]
struct FeatureRef<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    id: &'a CellValue,
    geometry: PointRepr,
    properties: &'a Record,
}

#[derive(Serialize)]
struct CollectionRef<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    features: Vec<FeatureRef<'a>>,
}

impl Serialize for Feature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        feature_ref(self).serialize(serializer)
    }
}

fn feature_ref(feature: &Feature) -> FeatureRef<'_> {
    FeatureRef {
        kind: "Feature",
        id: &feature.id,
        geometry: PointRepr {
            kind: "Point".to_string(),
            coordinates: [feature.longitude(), feature.latitude()],
        },
        properties: &feature.properties,
    }
}

impl Serialize for FeatureCollection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        CollectionRef {
            kind: "FeatureCollection",
            features: self.features.iter().map(feature_ref).collect(),
        }
        .serialize(serializer)
    }
}

#[derive(Deserialize)]
struct FeatureOwned {
    #[serde(rename = "type")]
    kind: String,
    id: CellValue,
    geometry: PointRepr,
    #[serde(default)]
    properties: Record,
}

#[derive(Deserialize)]
struct CollectionOwned {
    #[serde(rename = "type")]
    kind: String,
    features: Vec<FeatureOwned>,
}

impl<'de> Deserialize<'de> for Feature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = FeatureOwned::deserialize(deserializer)?;
        into_feature(raw)
    }
}

fn into_feature<E: de::Error>(raw: FeatureOwned) -> Result<Feature, E> {
    if raw.kind != "Feature" {
        return Err(E::custom(format!("expected Feature, got {}", raw.kind)));
    }
    if raw.geometry.kind != "Point" {
        return Err(E::custom(format!(
            "expected Point geometry, got {}",
            raw.geometry.kind
        )));
    }
    let [lon, lat] = raw.geometry.coordinates;
    Ok(Feature {
        id: raw.id,
        geometry: Point::new(lon, lat),
        properties: raw.properties,
    })
}

impl<'de> Deserialize<'de> for FeatureCollection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = CollectionOwned::deserialize(deserializer)?;
        if raw.kind != "FeatureCollection" {
            return Err(de::Error::custom(format!(
                "expected FeatureCollection, got {}",
                raw.kind
            )));
        }
        let features = raw
            .features
            .into_iter()
            .map(into_feature)
            .collect::<Result<Vec<_>, D::Error>>()?;
        Ok(Self { features })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{build, ColumnMapping};
    use std::str::FromStr;

    fn collection() -> FeatureCollection {
        let records: Vec<Record> = vec![
            vec![
                ("id", CellValue::from("A")),
                ("lon", CellValue::from("10")),
                ("lat", CellValue::from("20")),
                ("name", CellValue::from("Café \"Central\"")),
            ]
            .into_iter()
            .collect(),
            vec![
                ("id", CellValue::Number(7.0)),
                ("lon", CellValue::Number(-1.5)),
                ("lat", CellValue::Number(48.25)),
            ]
            .into_iter()
            .collect(),
        ];
        FeatureCollection::new(build(&records, &ColumnMapping::new("id", "lon", "lat")).features)
    }

    #[test]
    fn test_feature_key_order() {
        let json = serde_json::to_string(&collection().features[0]).unwrap();
        let type_pos = json.find(r#""type":"Feature""#).unwrap();
        let id_pos = json.find(r#""id":"A""#).unwrap();
        let geom_pos = json.find(r#""geometry""#).unwrap();
        let props_pos = json.find(r#""properties""#).unwrap();
        assert!(type_pos < id_pos && id_pos < geom_pos && geom_pos < props_pos);
        assert!(json.contains(r#""coordinates":[10.0,20.0]"#));
    }

    #[test]
    fn test_integral_id_written_as_integer() {
        let json = serde_json::to_string(&collection().features[1]).unwrap();
        assert!(json.contains(r#""id":7,"#), "{json}");
        assert!(json.contains(r#""properties":{"id":7,"lon":-1.5,"lat":48.25}"#), "{json}");

        let geo = collection().to_geojson();
        assert_eq!(
            geo.features[1].id,
            Some(geojson::feature::Id::Number(7.into()))
        );
    }

    #[test]
    fn test_pretty_uses_two_spaces() {
        let json = collection().to_json_pretty().unwrap();
        assert!(json.starts_with("{\n  \"type\": \"FeatureCollection\""));
    }

    #[test]
    fn test_round_trip() {
        let original = collection();
        let json = original.to_json_pretty().unwrap();
        let parsed = FeatureCollection::from_json(&json).unwrap();

        assert_eq!(parsed.len(), original.len());
        for (a, b) in parsed.features.iter().zip(&original.features) {
            assert_eq!(a.geometry, b.geometry);
            assert_eq!(a.id, b.id);
        }
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_output_is_valid_geojson() {
        let json = collection().to_json_pretty().unwrap();
        let parsed = geojson::FeatureCollection::from_str(&json).unwrap();
        let expected = collection().to_geojson();
        assert_eq!(parsed.features.len(), expected.features.len());
        for (a, b) in parsed.features.iter().zip(&expected.features) {
            assert_eq!(a.geometry, b.geometry);
            assert_eq!(a.id, b.id);
            assert_eq!(a.properties, b.properties);
        }
    }

    #[test]
    fn test_from_json_rejects_other_types() {
        let json = r#"{"type":"Feature","features":[]}"#;
        assert!(FeatureCollection::from_json(json).is_err());

        let json = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","id":"x","geometry":{"type":"LineString","coordinates":[1,2]},"properties":{}}
        ]}"#;
        assert!(FeatureCollection::from_json(json).is_err());
    }

    #[test]
    fn test_empty_collection() {
        let json = FeatureCollection::default().to_json_pretty().unwrap();
        let parsed = FeatureCollection::from_json(&json).unwrap();
        assert!(parsed.is_empty());
    }
}
