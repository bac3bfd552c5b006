use itertools::Itertools;

/// Official county/city ordering used for listings.
pub const TAIWAN_COUNTIES: [&str; 22] = [
    "基隆市", "臺北市", "新北市", "桃園市", "新竹市", "新竹縣", "苗栗縣", "臺中市", "彰化縣",
    "南投縣", "雲林縣", "嘉義市", "嘉義縣", "臺南市", "高雄市", "屏東縣", "臺東縣", "花蓮縣",
    "宜蘭縣", "澎湖縣", "金門縣", "連江縣",
];

/// Display order for regions. Never used to decide which regions have data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalOrder {
    names: Vec<String>,
}

impl CanonicalOrder {
    /// Blank names are dropped; later duplicates lose to the first occurrence.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names = names
            .into_iter()
            .map(|s| {
                let s: String = s.into();
                s.trim().to_string()
            })
            .filter(|s| !s.is_empty())
            .unique()
            .collect();
        Self { names }
    }

    /// Parse a comma-separated override (e.g. from the environment).
    pub fn parse_list(list: &str) -> Self {
        Self::new(list.split(','))
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Subsequence of the canonical order restricted to `present`.
    pub fn filter_present<F>(&self, mut present: F) -> Vec<String>
    where
        F: FnMut(&str) -> bool,
    {
        self.names
            .iter()
            .filter(|n| present(n.as_str()))
            .cloned()
            .collect()
    }
}

impl Default for CanonicalOrder {
    fn default() -> Self {
        Self::new(TAIWAN_COUNTIES)
    }
}
