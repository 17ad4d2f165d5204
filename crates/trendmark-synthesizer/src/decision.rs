//! Schema type decision table
//!
//! | category \ kind | product | article | event | other |
//! |---|---|---|---|---|
//! | ecommerce / shopping / retail | Product | Article | Event | Offer |
//! | news | NewsArticle | NewsArticle | Event | NewsArticle |
//! | events / entertainment / sports | Product | Article | Event | Event |
//! | anything else | Product | Article | Event | Article |

use trendmark_domain::{DocumentKind, SchemaType};

/// Trend category families that share a row of the decision table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryGroup {
    /// ecommerce, shopping, retail
    Commerce,
    /// news
    News,
    /// events, entertainment, sports
    Events,
    /// Everything else
    General,
}

impl CategoryGroup {
    /// Classify a (normalized, lowercase) trend category
    pub fn of(category: &str) -> Self {
        match category.trim() {
            "ecommerce" | "e-commerce" | "shopping" | "retail" => CategoryGroup::Commerce,
            "news" => CategoryGroup::News,
            "events" | "entertainment" | "sports" => CategoryGroup::Events,
            _ => CategoryGroup::General,
        }
    }
}

/// Choose the schema.org type for a trend category and document kind
pub fn choose_schema(category: &str, kind: DocumentKind) -> SchemaType {
    use CategoryGroup::*;
    use DocumentKind::*;

    match (CategoryGroup::of(category), kind) {
        (News, Product | Article | Page) => SchemaType::NewsArticle,
        (_, Event) => SchemaType::Event,
        (_, Product) => SchemaType::Product,
        (_, Article) => SchemaType::Article,
        (Commerce, Page) => SchemaType::Offer,
        (Events, Page) => SchemaType::Event,
        (General, Page) => SchemaType::Article,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_table() {
        let kinds = [
            DocumentKind::Product,
            DocumentKind::Article,
            DocumentKind::Event,
            DocumentKind::Page,
        ];
        let rows = [
            (
                "ecommerce",
                [SchemaType::Product, SchemaType::Article, SchemaType::Event, SchemaType::Offer],
            ),
            (
                "news",
                [
                    SchemaType::NewsArticle,
                    SchemaType::NewsArticle,
                    SchemaType::Event,
                    SchemaType::NewsArticle,
                ],
            ),
            (
                "sports",
                [SchemaType::Product, SchemaType::Article, SchemaType::Event, SchemaType::Event],
            ),
            (
                "gardening",
                [SchemaType::Product, SchemaType::Article, SchemaType::Event, SchemaType::Article],
            ),
        ];
        for (category, expected) in rows {
            for (kind, schema) in kinds.iter().zip(expected) {
                assert_eq!(choose_schema(category, *kind), schema, "{} / {:?}", category, kind);
            }
        }
    }

    #[test]
    fn test_category_aliases() {
        assert_eq!(CategoryGroup::of("shopping"), CategoryGroup::Commerce);
        assert_eq!(CategoryGroup::of("retail"), CategoryGroup::Commerce);
        assert_eq!(CategoryGroup::of("entertainment"), CategoryGroup::Events);
        assert_eq!(CategoryGroup::of("events"), CategoryGroup::Events);
        assert_eq!(CategoryGroup::of(""), CategoryGroup::General);
    }
}
