use crate::models::Service;

const FEATURED_FALLBACK: usize = 3;

/// Services flagged as featured, or the first few when none are flagged.
pub fn featured_services(services: &[Service]) -> Vec<Service> {
    let flagged: Vec<Service> = services.iter().filter(|s| s.featured).cloned().collect();
    if flagged.is_empty() {
        services.iter().take(FEATURED_FALLBACK).cloned().collect()
    } else {
        flagged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ServiceCategory;

    fn service(name: &str, featured: bool) -> Service {
        Service {
            id: name.to_lowercase(),
            name: name.to_string(),
            description: String::new(),
            price: 799.0,
            duration_min: 60,
            category: ServiceCategory::Classic,
            image_url: None,
            featured,
        }
    }

    #[test]
    fn test_flagged_services_win() {
        let all = vec![service("A", false), service("B", true), service("C", false), service("D", true)];
        let names: Vec<String> = featured_services(&all).into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["B", "D"]);
    }

    #[test]
    fn test_fallback_to_first_three() {
        let all = vec![
            service("A", false),
            service("B", false),
            service("C", false),
            service("D", false),
        ];
        let names: Vec<String> = featured_services(&all).into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert!(featured_services(&[]).is_empty());
    }
}
