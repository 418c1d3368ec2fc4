use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub duration_min: i32,
    pub category: ServiceCategory,
    #[serde(default)]
    pub image_url: Option<String>,
    // The backend column is `is_featured`; older rows may carry `featured`.
    #[serde(default, alias = "is_featured", deserialize_with = "null_as_false")]
    pub featured: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ServiceCategory {
    Classic,
    Therapeutic,
    Premium,
    #[serde(rename = "Add-on")]
    AddOn,
}

impl ServiceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceCategory::Classic => "Classic",
            ServiceCategory::Therapeutic => "Therapeutic",
            ServiceCategory::Premium => "Premium",
            ServiceCategory::AddOn => "Add-on",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Classic" => Some(ServiceCategory::Classic),
            "Therapeutic" => Some(ServiceCategory::Therapeutic),
            "Premium" => Some(ServiceCategory::Premium),
            "Add-on" => Some(ServiceCategory::AddOn),
            _ => None,
        }
    }
}

fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_backend_row() {
        let json = r#"{
            "id": "59fa75c4-2679-463e-ad17-74691d2745ce",
            "name": "Swedish Massage",
            "description": "Long flowing strokes",
            "price": 799.0,
            "duration_min": 60,
            "category": "Classic",
            "image_url": null,
            "is_featured": true,
            "is_active": true
        }"#;
        let service: Service = serde_json::from_str(json).unwrap();
        assert_eq!(service.category, ServiceCategory::Classic);
        assert!(service.featured);
        assert!(service.image_url.is_none());
    }

    #[test]
    fn test_featured_defaults_to_false() {
        let json = r#"{"id":"a","name":"Foot Scrub","description":"","price":150,"duration_min":15,"category":"Add-on","is_featured":null}"#;
        let service: Service = serde_json::from_str(json).unwrap();
        assert_eq!(service.category, ServiceCategory::AddOn);
        assert!(!service.featured);
    }

    #[test]
    fn test_category_parse() {
        assert_eq!(ServiceCategory::parse("Premium"), Some(ServiceCategory::Premium));
        assert_eq!(ServiceCategory::parse("Add-on"), Some(ServiceCategory::AddOn));
        assert_eq!(ServiceCategory::parse("spa"), None);
    }
}
