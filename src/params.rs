//! Query parameter mapping and validation.
//!
//! Users may name a table by its label on the Vitibrasil site
//! (`opcao=Processamento&subopcao=Viníferas`) or by the site's numeric codes
//! (`opcao=03&subopcao=01`). Labels are matched after [`normalize`], so case
//! and accents do not matter. Anything not found in a vocabulary passes
//! through unchanged and is then checked by [`validate`].
//!
//! | Code | Category | Subcategories |
//! |------|----------|---------------|
//! | 02 | Produção | — (always 01) |
//! | 03 | Processamento | Viníferas, Americanas e Híbridas, Uvas de Mesa, Sem Classificação |
//! | 04 | Comercialização | — (always 01) |
//! | 05 | Importação | Vinhos de Mesa, Espumantes, Uvas Frescas, Uvas Passas, Suco de Uva |
//! | 06 | Exportação | Vinhos de Mesa, Espumantes, Uvas Frescas, Suco de Uva |

use crate::error::ApiError;
use crate::models::TableKey;
use crate::normalize::normalize;

pub const MIN_YEAR: i32 = 1970;
pub const MAX_YEAR: i32 = 2024;

pub const DEFAULT_YEAR: &str = "2023";
pub const DEFAULT_CATEGORY: &str = "02";
pub const DEFAULT_SUBCATEGORY: &str = "01";

/// A category of the remote site ("opção").
struct Category {
    code: &'static str,
    label: &'static str,
    /// Normalized names accepted for this category.
    names: &'static [&'static str],
    /// `(normalized name, code, display label)`; empty when the category
    /// has a single table.
    subcategories: &'static [(&'static str, &'static str, &'static str)],
}

const CATEGORIES: &[Category] = &[
    Category {
        code: "02",
        label: "Produção",
        names: &["producao", "production"],
        subcategories: &[],
    },
    Category {
        code: "03",
        label: "Processamento",
        names: &["processamento", "processing"],
        subcategories: &[
            ("viniferas", "01", "Viníferas"),
            ("americanas e hibridas", "02", "Americanas e Híbridas"),
            ("uvas de mesa", "03", "Uvas de Mesa"),
            ("sem classificacao", "04", "Sem Classificação"),
        ],
    },
    Category {
        code: "04",
        label: "Comercialização",
        names: &["comercializacao", "commercialization"],
        subcategories: &[],
    },
    Category {
        code: "05",
        label: "Importação",
        names: &["importacao", "imports"],
        subcategories: &[
            ("vinhos de mesa", "01", "Vinhos de Mesa"),
            ("espumantes", "02", "Espumantes"),
            ("uvas frescas", "03", "Uvas Frescas"),
            ("uvas passas", "04", "Uvas Passas"),
            ("suco de uva", "05", "Suco de Uva"),
        ],
    },
    Category {
        code: "06",
        label: "Exportação",
        names: &["exportacao", "exports"],
        subcategories: &[
            ("vinhos de mesa", "01", "Vinhos de Mesa"),
            ("espumantes", "02", "Espumantes"),
            ("uvas frescas", "03", "Uvas Frescas"),
            ("suco de uva", "04", "Suco de Uva"),
        ],
    },
];

fn category(code: &str) -> Option<&'static Category> {
    CATEGORIES.iter().find(|c| c.code == code)
}

/// Maps a category name or code to the site's code.
///
/// Unknown input is returned normalized, so raw codes flow straight through.
pub fn map_category(raw: &str) -> String {
    let normalized = normalize(raw.trim());
    CATEGORIES
        .iter()
        .find(|c| c.names.iter().any(|n| *n == normalized))
        .map(|c| c.code.to_string())
        .unwrap_or(normalized)
}

/// Maps a subcategory name or code to the site's code for category `code`.
///
/// Categories `02` and `04` have exactly one table and always yield `01`.
pub fn map_subcategory(code: &str, raw: &str) -> String {
    if code == "02" || code == "04" {
        return DEFAULT_SUBCATEGORY.to_string();
    }
    let normalized = normalize(raw.trim());
    category(code)
        .and_then(|c| {
            c.subcategories
                .iter()
                .find(|(name, _, _)| *name == normalized)
                .map(|(_, sub, _)| sub.to_string())
        })
        .unwrap_or(normalized)
}

fn invalid_category_message() -> String {
    let choices: Vec<String> = CATEGORIES
        .iter()
        .map(|c| format!("{} ({})", c.label, c.code))
        .collect();
    format!("invalid category. Use one of: {}.", choices.join(", "))
}

fn invalid_subcategory_message(cat: &Category) -> String {
    let choices: Vec<String> = cat
        .subcategories
        .iter()
        .map(|(_, code, label)| format!("{} ({})", label, code))
        .collect();
    format!(
        "invalid subcategory for {} ({}). Use the name or the code: {}.",
        cat.label,
        cat.code,
        choices.join(", ")
    )
}

/// Checks already-mapped codes and returns the canonical [`TableKey`].
///
/// Year must be an integer in `[1970, 2024]`. Category must be one of
/// `02`..`06`. Subcategory is only checked for categories that declare a
/// vocabulary (`03`, `05`, `06`).
pub fn validate(year: &str, code: &str, subcode: &str) -> Result<TableKey, ApiError> {
    let year = match year.trim().parse::<i32>() {
        Ok(y) if (MIN_YEAR..=MAX_YEAR).contains(&y) => y,
        _ => {
            return Err(ApiError::invalid(format!(
                "invalid year. Must be between {} and {}.",
                MIN_YEAR, MAX_YEAR
            )))
        }
    };

    let cat = category(code).ok_or_else(|| ApiError::invalid(invalid_category_message()))?;

    if !cat.subcategories.is_empty()
        && !cat.subcategories.iter().any(|(_, sub, _)| *sub == subcode)
    {
        return Err(ApiError::invalid(invalid_subcategory_message(cat)));
    }

    Ok(TableKey::new(year.to_string(), code, subcode))
}

/// Maps raw query values and validates them in one step.
///
/// Missing values take the defaults `2023` / `02` / `01`.
pub fn resolve(
    year: Option<&str>,
    category: Option<&str>,
    subcategory: Option<&str>,
) -> Result<TableKey, ApiError> {
    let code = map_category(category.unwrap_or(DEFAULT_CATEGORY));
    let subcode = map_subcategory(&code, subcategory.unwrap_or(DEFAULT_SUBCATEGORY));
    validate(year.unwrap_or(DEFAULT_YEAR), &code, &subcode)
}
