//! # Feature: Saint Catalog
//!
//! Static catalog of the saints a user can talk to. Built once at startup,
//! keyed by exact display name, with a secondary inverted index of search
//! aliases ("Little Flower" -> "St. Thérèse of Lisieux").
//!
//! - **Version**: 1.3.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.3.0: Load an alternative catalog from YAML via SAINTS_CONFIG_PATH
//! - 1.2.0: Alias index for sidebar search
//! - 1.1.0: Biographical facts fed into the system prompt
//! - 1.0.0: Initial release with 5 saints

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Saint selected when the client does not name one
pub const DEFAULT_SAINT: &str = "St. Francis of Assisi";

/// Questions offered before the user has typed anything
pub const STARTER_QUESTIONS: &[&str] = &[
    "What is your greatest teaching?",
    "How did you find your calling?",
    "What challenges did you face?",
    "What advice would you give me?",
    "Tell me about your spiritual journey",
    "How did you pray?",
    "What is your view on suffering?",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Saint {
    pub name: String,
    pub years: String,
    pub description: String,
    /// Short facts woven into the system prompt
    #[serde(default)]
    pub biography: Vec<String>,
    /// Search synonyms, matched case- and accent-insensitively
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub article_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    saints: Vec<Saint>,
}

#[derive(Debug, Clone)]
pub struct SaintCatalog {
    saints: HashMap<String, Saint>,
    /// Folded alias (and folded name) -> canonical name
    alias_index: HashMap<String, String>,
}

impl Default for SaintCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl SaintCatalog {
    /// Built-in catalog
    pub fn new() -> Self {
        // The built-in table is validated by test_builtin_table_is_valid
        Self::from_saints(builtin_saints()).unwrap_or_else(|e| {
            log::error!("Built-in saint catalog is invalid: {e}");
            Self {
                saints: HashMap::new(),
                alias_index: HashMap::new(),
            }
        })
    }

    /// Load a catalog from a YAML file of the form `saints: [...]`
    pub fn load(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        let file: CatalogFile = serde_yaml::from_str(contents)?;
        Self::from_saints(file.saints)
    }

    pub fn from_saints(saints: Vec<Saint>) -> Result<Self> {
        if saints.is_empty() {
            return Err(anyhow::anyhow!("Saint catalog must contain at least one saint"));
        }

        let mut by_name = HashMap::new();
        let mut alias_index = HashMap::new();

        for saint in saints {
            if saint.name.trim().is_empty() {
                return Err(anyhow::anyhow!("Saint with empty name in catalog"));
            }
            if by_name.contains_key(&saint.name) {
                return Err(anyhow::anyhow!("Duplicate saint in catalog: {}", saint.name));
            }

            alias_index.insert(fold(&saint.name), saint.name.clone());
            for alias in &saint.aliases {
                let key = fold(alias);
                if let Some(existing) = alias_index.get(&key) {
                    if existing != &saint.name {
                        return Err(anyhow::anyhow!(
                            "Alias '{}' is claimed by both {} and {}",
                            alias,
                            existing,
                            saint.name
                        ));
                    }
                }
                alias_index.insert(key, saint.name.clone());
            }
            by_name.insert(saint.name.clone(), saint);
        }

        Ok(SaintCatalog {
            saints: by_name,
            alias_index,
        })
    }

    /// Exact, case-sensitive lookup
    pub fn get(&self, name: &str) -> Option<&Saint> {
        self.saints.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.saints.contains_key(name)
    }

    /// All saints ordered by name
    pub fn list(&self) -> Vec<&Saint> {
        let mut saints: Vec<&Saint> = self.saints.values().collect();
        saints.sort_by(|a, b| a.name.cmp(&b.name));
        saints
    }

    pub fn len(&self) -> usize {
        self.saints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.saints.is_empty()
    }

    /// Resolve a name or alias to a saint, exact match first
    pub fn resolve(&self, query: &str) -> Option<&Saint> {
        self.get(query).or_else(|| {
            self.alias_index
                .get(&fold(query))
                .and_then(|name| self.saints.get(name))
        })
    }

    /// Saints whose name or any alias contains the query. An empty query
    /// returns the full catalog.
    pub fn search(&self, query: &str) -> Vec<&Saint> {
        let needle = fold(query);
        if needle.is_empty() {
            return self.list();
        }

        let mut names: Vec<&String> = self
            .alias_index
            .iter()
            .filter(|(key, _)| key.contains(&needle))
            .map(|(_, name)| name)
            .collect();
        names.sort();
        names.dedup();

        names
            .into_iter()
            .filter_map(|name| self.saints.get(name))
            .collect()
    }
}

/// Lowercase and strip the accents that appear in saint names so that
/// "avila" finds "Ávila"
fn fold(text: &str) -> String {
    text.trim()
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            other => other,
        })
        .collect()
}

fn saint(
    name: &str,
    years: &str,
    description: &str,
    biography: &[&str],
    aliases: &[&str],
    image_url: &str,
    article_url: &str,
) -> Saint {
    Saint {
        name: name.to_string(),
        years: years.to_string(),
        description: description.to_string(),
        biography: biography.iter().map(|s| s.to_string()).collect(),
        aliases: aliases.iter().map(|s| s.to_string()).collect(),
        image_url: Some(image_url.to_string()),
        article_url: Some(article_url.to_string()),
    }
}

fn builtin_saints() -> Vec<Saint> {
    vec![
        saint(
            "St. Francis of Assisi",
            "1181-1226",
            "Founder of the Franciscan Order, known for my love of nature and animals.",
            &[
                "Born in Assisi to a wealthy cloth merchant, Pietro di Bernardone",
                "Renounced my inheritance before the bishop of Assisi and embraced poverty",
                "Founded the Order of Friars Minor in 1209",
                "Composed the Canticle of the Creatures praising Brother Sun and Sister Moon",
                "Received the stigmata at La Verna in 1224",
            ],
            &["Francis", "Assisi", "Franciscan", "Poverello"],
            "https://hebbkx1anhila5yf.public.blob.vercel-storage.com/assissi-xsrYL2QtPtrEYH4rNJYmlDIPqYzdw0.jpeg",
            "https://www.thecatholicvoice.com/saints/saint-francis-of-assisi-biography-miracles-and-wisdom",
        ),
        saint(
            "St. Thomas Aquinas",
            "1225-1274",
            "Dominican friar and Doctor of the Church, known for my theological writings.",
            &[
                "Joined the Dominican Order against the wishes of my family",
                "Studied under St. Albert the Great in Cologne",
                "Wrote the Summa Theologiae and the Summa contra Gentiles",
                "Taught theology at the University of Paris",
                "Called the Angelic Doctor",
            ],
            &["Aquinas", "Thomas", "Angelic Doctor", "Dominican"],
            "https://hebbkx1anhila5yf.public.blob.vercel-storage.com/thomas-9Kv24UV6iR1gEISzY3XtHAr1G57l4j.jpeg",
            "https://www.thecatholicvoice.com/saints/saint-thomas-aquinas-biography-miracles-and-wisdom",
        ),
        saint(
            "St. Teresa of Ávila",
            "1515-1582",
            "Spanish mystic, Carmelite nun, and reformer of the Carmelite Order.",
            &[
                "Entered the Carmelite Convent of the Incarnation in Ávila",
                "Founded the Discalced Carmelites with St. John of the Cross",
                "Wrote The Interior Castle and The Way of Perfection",
                "Described prayer as friendship with God",
            ],
            &["Teresa", "Teresa of Jesus", "Carmelite", "Interior Castle"],
            "https://hebbkx1anhila5yf.public.blob.vercel-storage.com/avila-zcNzree2r4Y7mMecpkqr7lvi1IHEtN.jpeg",
            "https://www.thecatholicvoice.com/saints/saint-teresa-of-avila-biography-miracles-and-wisdom",
        ),
        saint(
            "St. Augustine",
            "354-430",
            "Bishop of Hippo and Doctor of the Church, known for my theological writings.",
            &[
                "Born in Thagaste in North Africa to St. Monica",
                "Converted in a garden in Milan after hearing \"take up and read\"",
                "Baptized by St. Ambrose in 387",
                "Served as Bishop of Hippo for more than thirty years",
                "Wrote the Confessions and The City of God",
            ],
            &["Augustine of Hippo", "Hippo", "Confessions"],
            "https://hebbkx1anhila5yf.public.blob.vercel-storage.com/augistine-cl5Y961nWwBEBoAmBuuXZ41Sn3vjsb.jpeg",
            "https://www.thecatholicvoice.com/saints/saint-augustine-of-hippo-biography-miracles-and-wisdom",
        ),
        saint(
            "St. Thérèse of Lisieux",
            "1873-1897",
            "Carmelite nun known as \"The Little Flower\" and Doctor of the Church.",
            &[
                "Entered the Carmel of Lisieux at fifteen",
                "Taught the Little Way of spiritual childhood",
                "Wrote the autobiography Story of a Soul",
                "Died of tuberculosis at twenty-four",
            ],
            &["Therese", "Little Flower", "Lisieux", "Little Way"],
            "https://hebbkx1anhila5yf.public.blob.vercel-storage.com/lisieux-d4NxJJC52xSrbWtRRCfpWKOksK3XYV.jpeg",
            "https://www.thecatholicvoice.com/saints/saint-therese-of-lisieux-biography-miracles-and-wisdom",
        ),
    ]
}
