use analysis_core::{EntryKind, UniverseEntry, UniverseSource};

#[derive(Debug, Clone)]
pub struct IndustryRoster {
    pub key: String,
    pub label: String,
    pub tickers: Vec<String>,
}

/// Fixed industry rosters plus a short list of known companies
#[derive(Debug, Clone, Default)]
pub struct StaticUniverse {
    industries: Vec<IndustryRoster>,
    companies: Vec<UniverseEntry>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl StaticUniverse {
    pub fn new(industries: Vec<IndustryRoster>) -> Self {
        Self {
            industries,
            companies: Vec::new(),
        }
    }

    pub fn builtin() -> Self {
        let company = |label: &str, symbol: &str| UniverseEntry {
            label: label.to_string(),
            value: symbol.to_string(),
            kind: EntryKind::Company,
        };

        Self {
            industries: vec![
                IndustryRoster {
                    key: "Robotics".to_string(),
                    label: "Robotics & Automation".to_string(),
                    tickers: strings(&["ABB", "FANUY", "ROK", "ISRG", "TER", "CGNX", "IRBT"]),
                },
                IndustryRoster {
                    key: "Semiconductors".to_string(),
                    label: "Semiconductors (AI)".to_string(),
                    tickers: strings(&["NVDA"]),
                },
            ],
            companies: vec![
                company("NVIDIA (NVDA)", "NVDA"),
                company("ABB Ltd (ABB)", "ABB"),
                company("Fanuc (FANUY)", "FANUY"),
            ],
        }
    }

    /// Look an industry up by key or display label, ignoring case
    pub fn find(&self, industry: &str) -> Option<&IndustryRoster> {
        let needle = industry.trim();
        self.industries
            .iter()
            .find(|r| r.key.eq_ignore_ascii_case(needle) || r.label.eq_ignore_ascii_case(needle))
    }
}

impl UniverseSource for StaticUniverse {
    fn constituents(&self, industry: &str) -> Vec<String> {
        self.find(industry).map(|r| r.tickers.clone()).unwrap_or_default()
    }

    fn entries(&self) -> Vec<UniverseEntry> {
        self.industries
            .iter()
            .map(|r| UniverseEntry {
                label: r.label.clone(),
                value: r.key.clone(),
                kind: EntryKind::Industry,
            })
            .chain(self.companies.iter().cloned())
            .collect()
    }
}
