//! Query topic categories and their keyword tables.
//!
//! Single source of truth for the category list: the classifier matches on
//! the keyword tables, and a presentation layer can pull display labels and
//! badge colors from the same enum instead of duplicating the mapping.

use serde::{Deserialize, Serialize};

/// Topic category assigned to a query by keyword matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Leave,
    Benefits,
    Legal,
    #[serde(rename = "Remote Work")]
    RemoteWork,
    #[serde(rename = "Internal Culture")]
    InternalCulture,
    General,
}

/// Category check order matters: a query matching several keyword tables
/// always gets the earliest-checked category.
const CLASSIFICATION_ORDER: [Category; 5] = [
    Category::Leave,
    Category::Benefits,
    Category::Legal,
    Category::RemoteWork,
    Category::InternalCulture,
];

impl Category {
    /// Classify a free-text query by case-insensitive substring matching
    /// against the ordered keyword tables. Pure and total: every input maps
    /// to exactly one category, with `General` as the fallback.
    pub fn classify(query: &str) -> Self {
        let query = query.to_lowercase();
        for category in CLASSIFICATION_ORDER {
            if category
                .keywords()
                .iter()
                .any(|keyword| query.contains(keyword))
            {
                return category;
            }
        }
        Category::General
    }

    /// Keywords whose presence anywhere in a lowercased query selects this
    /// category. `General` has none; it is only reached as the fallback.
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Category::Leave => &[
                "leave",
                "vacation",
                "pto",
                "time off",
                "holiday",
                "sick",
                "parental",
                "maternity",
                "paternity",
            ],
            Category::Benefits => &[
                "benefit",
                "insurance",
                "health",
                "dental",
                "vision",
                "401k",
                "retirement",
                "pension",
                "compensation",
                "salary",
            ],
            Category::Legal => &[
                "legal",
                "policy",
                "compliance",
                "regulation",
                "contract",
                "agreement",
                "confidentiality",
                "nda",
            ],
            Category::RemoteWork => &[
                "remote",
                "work from home",
                "wfh",
                "hybrid",
                "office",
                "coffee shop",
                "coworking",
            ],
            Category::InternalCulture => &[
                "culture",
                "values",
                "mission",
                "team",
                "events",
                "diversity",
                "inclusion",
            ],
            Category::General => &[],
        }
    }

    /// Human-readable label for badges and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Leave => "Leave",
            Category::Benefits => "Benefits",
            Category::Legal => "Legal",
            Category::RemoteWork => "Remote Work",
            Category::InternalCulture => "Internal Culture",
            Category::General => "General",
        }
    }

    /// Badge color for the presentation layer.
    pub fn color(&self) -> &'static str {
        match self {
            Category::Leave => "#2196F3",
            Category::Benefits => "#4CAF50",
            Category::Legal => "#f44336",
            Category::RemoteWork => "#FF9800",
            Category::InternalCulture => "#9C27B0",
            Category::General => "#607D8B",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leave_keywords_classify_as_leave() {
        assert_eq!(
            Category::classify("How many vacation days do I get?"),
            Category::Leave
        );
        assert_eq!(
            Category::classify("What is the PTO carryover rule?"),
            Category::Leave
        );
    }

    #[test]
    fn unmatched_query_falls_back_to_general() {
        assert_eq!(Category::classify("What's the weather?"), Category::General);
        assert_eq!(Category::classify(""), Category::General);
    }

    #[test]
    fn classification_is_case_insensitive() {
        assert_eq!(Category::classify("REMOTE work rules?"), Category::RemoteWork);
        assert_eq!(Category::classify("Dental Coverage"), Category::Benefits);
    }

    #[test]
    fn earliest_category_wins_on_multiple_matches() {
        // "vacation" (Leave) and "salary" (Benefits) both match; Leave is
        // checked first.
        assert_eq!(
            Category::classify("Is my salary paid during vacation?"),
            Category::Leave
        );
        // "insurance" (Benefits) and "policy" (Legal) both match.
        assert_eq!(
            Category::classify("Where is the insurance policy?"),
            Category::Benefits
        );
    }

    #[test]
    fn every_query_maps_to_exactly_one_category() {
        let queries = [
            "vacation",
            "401k",
            "nda",
            "wfh",
            "diversity",
            "completely unrelated text",
        ];
        let expected = [
            Category::Leave,
            Category::Benefits,
            Category::Legal,
            Category::RemoteWork,
            Category::InternalCulture,
            Category::General,
        ];
        for (query, want) in queries.iter().zip(expected) {
            assert_eq!(Category::classify(query), want);
        }
    }

    #[test]
    fn labels_and_colors_cover_all_categories() {
        for category in [
            Category::Leave,
            Category::Benefits,
            Category::Legal,
            Category::RemoteWork,
            Category::InternalCulture,
            Category::General,
        ] {
            assert!(!category.label().is_empty());
            assert!(category.color().starts_with('#'));
        }
    }
}
