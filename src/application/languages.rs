//! Resolution of the languages a deployment serves translations in.

use tracing::warn;

use crate::domain::{ContentId, Language};

use super::repos::ContentTreeAccessor;

/// Languages found under the translation root.
///
/// Falls back to the master language alone when the lookup fails, returns
/// nothing, or returns any language without display names.
pub async fn resolve_available_languages(
    accessor: &dyn ContentTreeAccessor,
    root: ContentId,
    master: &Language,
) -> Vec<Language> {
    let languages = match accessor.get_language_variants(root).await {
        Ok(languages) => languages,
        Err(err) => {
            warn!(
                root = %root,
                error = %err,
                "Language variants of translation root unavailable; using master language"
            );
            return vec![master.clone()];
        }
    };

    if languages.is_empty() || languages.iter().any(|language| !language.is_well_formed()) {
        warn!(
            root = %root,
            count = languages.len(),
            "Translation root has no usable language variants; using master language"
        );
        return vec![master.clone()];
    }

    let mut unique: Vec<Language> = Vec::with_capacity(languages.len());
    for language in languages {
        if !unique.iter().any(|seen| seen.matches(&language.code)) {
            unique.push(language);
        }
    }
    unique
}
