use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::record::CompanyRecord;

/// Breakdown of a collected listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatabaseStats {
    pub total_entries: usize,
    pub categories: BTreeMap<String, usize>,
    pub cities: BTreeMap<String, usize>,
    pub domains_by_tld: BTreeMap<String, usize>,
    pub versions: BTreeMap<String, usize>,
}

impl DatabaseStats {
    pub fn from_records(records: &[CompanyRecord]) -> Self {
        let mut stats = Self {
            total_entries: records.len(),
            ..Self::default()
        };

        for record in records {
            *stats.categories.entry(record.category.clone()).or_default() += 1;
            *stats.cities.entry(record.contact.city.clone()).or_default() += 1;
            *stats.domains_by_tld.entry(domain_tld(&record.domain)).or_default() += 1;
            *stats.versions.entry(record.version.clone()).or_default() += 1;
        }

        stats
    }

    pub fn print(&self) {
        println!("\nTotal Companies in Database: {}", self.total_entries);
        print_breakdown("Category", &self.categories);
        print_breakdown("City", &self.cities);
        print_breakdown("Domain TLD", &self.domains_by_tld);
        print_breakdown("Version", &self.versions);
    }
}

/// Last dot-separated label with trailing slashes removed, or `Unknown`.
pub fn domain_tld(domain: &str) -> String {
    if domain.is_empty() {
        return "Unknown".to_string();
    }
    domain
        .rsplit('.')
        .next()
        .unwrap_or(domain)
        .trim_end_matches('/')
        .to_string()
}

/// Records whose JSON form contains `term`, ignoring case.
pub fn search<'a>(records: &'a [CompanyRecord], term: &str) -> Vec<&'a CompanyRecord> {
    let needle = term.to_lowercase();
    let matches: Vec<&CompanyRecord> = records
        .iter()
        .filter(|record| {
            serde_json::to_string(record)
                .map(|json| json.to_lowercase().contains(&needle))
                .unwrap_or(false)
        })
        .collect();
    debug!("Found {} matches for term '{}'", matches.len(), term);
    matches
}

// Highest counts first, then by key.
fn print_breakdown(title: &str, counts: &BTreeMap<String, usize>) {
    let mut entries: Vec<(&String, &usize)> = counts.iter().collect();
    entries.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

    println!("\nBreakdown by {}:", title);
    for (key, count) in entries {
        let label = if key.is_empty() { "(empty)" } else { key.as_str() };
        println!("- {}: {}", label, count);
    }
}
