//! Built-in alias and rule tables

use crate::models::CanonicalCategory;

/// Phrases that identify a category inside a free-form smell name.
///
/// Matched as lowercase substrings after CamelCase, `_` and `-` have been
/// split into spaces. Entry order is match priority.
pub const ALIASES: &[(CanonicalCategory, &[&str])] = &[
    (
        CanonicalCategory::LongMethod,
        &[
            "long method",
            "method too long",
            "method is too long",
            "long function",
            "excessive method length",
            "method length",
            "metodo longo",
            "método longo",
            "método muito longo",
            "função longa",
        ],
    ),
    (
        CanonicalCategory::GodClass,
        &[
            "god class",
            "god object",
            "large class",
            "blob class",
            "huge class",
            "classe deus",
            "classe grande",
            "classe muito grande",
        ],
    ),
    (
        CanonicalCategory::FeatureEnvy,
        &["feature envy", "inveja de funcionalidade", "inveja"],
    ),
    (
        CanonicalCategory::DataClass,
        &["data class", "classe de dados"],
    ),
    (
        CanonicalCategory::MagicNumber,
        &[
            "magic number",
            "magic constant",
            "magic value",
            "número mágico",
            "números mágicos",
            "numero magico",
            "numeros magicos",
        ],
    ),
    (
        CanonicalCategory::DuplicateCode,
        &[
            "duplicat",
            "duplicad",
            "code clone",
            "copy paste",
            "código duplicado",
            "codigo duplicado",
        ],
    ),
    (
        CanonicalCategory::ExceptionHandling,
        &["exception", "error handling", "exceç", "excec", "tratamento de erro"],
    ),
];

/// Static rule ids with a known category.
///
/// SonarQube keys are stored with their language prefix; lookups also try
/// the bare key. Checkstyle checks are stored by short name without the
/// `Check` suffix.
pub const RULES: &[(&str, CanonicalCategory)] = &[
    // SonarQube
    ("java:S1192", CanonicalCategory::DuplicateCode),
    ("java:S4144", CanonicalCategory::DuplicateCode),
    ("java:S112", CanonicalCategory::ExceptionHandling),
    ("java:S1130", CanonicalCategory::ExceptionHandling),
    ("java:S1166", CanonicalCategory::ExceptionHandling),
    ("java:S2221", CanonicalCategory::ExceptionHandling),
    ("java:S138", CanonicalCategory::LongMethod),
    ("java:S1448", CanonicalCategory::GodClass),
    ("java:S1200", CanonicalCategory::GodClass),
    ("java:S109", CanonicalCategory::MagicNumber),
    ("java:S3400", CanonicalCategory::MagicNumber),
    ("java:S1144", CanonicalCategory::MagicNumber),
    ("java:S1172", CanonicalCategory::FeatureEnvy),
    ("java:S1104", CanonicalCategory::DataClass),
    ("java:S1450", CanonicalCategory::DataClass),
    // Checkstyle
    ("MethodLength", CanonicalCategory::LongMethod),
    ("ExecutableStatementCount", CanonicalCategory::LongMethod),
    ("FileLength", CanonicalCategory::GodClass),
    ("MethodCount", CanonicalCategory::GodClass),
    ("ClassFanOutComplexity", CanonicalCategory::GodClass),
    ("ClassDataAbstractionCoupling", CanonicalCategory::GodClass),
    ("MagicNumber", CanonicalCategory::MagicNumber),
    ("VisibilityModifier", CanonicalCategory::DataClass),
    ("MultipleStringLiterals", CanonicalCategory::DuplicateCode),
    ("IllegalCatch", CanonicalCategory::ExceptionHandling),
    ("IllegalThrows", CanonicalCategory::ExceptionHandling),
    ("EmptyCatchBlock", CanonicalCategory::ExceptionHandling),
];
