//! Language identities and resource-bundle style fallback chains.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A language variant known to the content store.
///
/// `code` is a culture name such as `en` or `fr-CA`. The display names are
/// what the translation document carries; a language without them is
/// considered degenerate when resolving the available languages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Language {
    pub code: String,
    #[serde(default)]
    pub english_name: String,
    #[serde(default)]
    pub native_name: String,
}

impl Language {
    pub fn new(
        code: impl Into<String>,
        english_name: impl Into<String>,
        native_name: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            english_name: english_name.into(),
            native_name: native_name.into(),
        }
    }

    /// A language known only by its code.
    pub fn from_code(code: impl Into<String>) -> Self {
        Self::new(code, "", "")
    }

    /// Returns true when code and both display names are present.
    pub fn is_well_formed(&self) -> bool {
        !self.code.trim().is_empty()
            && !self.english_name.trim().is_empty()
            && !self.native_name.trim().is_empty()
    }

    /// The next broader culture, e.g. `fr` for `fr-CA`.
    pub fn neutral(&self) -> Option<&str> {
        neutral_code(&self.code)
    }

    pub fn matches(&self, code: &str) -> bool {
        self.code.eq_ignore_ascii_case(code)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

fn neutral_code(code: &str) -> Option<&str> {
    code.rfind('-').map(|idx| &code[..idx]).filter(|c| !c.is_empty())
}

/// Codes to consult, in order, when looking up `code`.
///
/// The chain is the exact culture, each broader neutral culture, and finally
/// the master language. Codes are lowercased and never repeated.
pub fn fallback_chain(code: &str, master: &str) -> Vec<String> {
    let mut chain: Vec<String> = Vec::new();
    let mut push = |candidate: &str| {
        let candidate = candidate.trim().to_ascii_lowercase();
        if !candidate.is_empty() && !chain.contains(&candidate) {
            chain.push(candidate);
        }
    };

    let mut current = Some(code);
    while let Some(c) = current {
        push(c);
        current = neutral_code(c);
    }
    push(master);

    chain
}
