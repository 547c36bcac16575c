// ============================================================
// Layer 3 — Fixed Vocabularies
// ============================================================
// The categorical tables the whole system agrees on:
//
//   SEX_VOCAB          female=0, male=1, unknown=2
//   LOCALIZATION_VOCAB the 15 HAM10000 body sites, sorted,
//                      so "unknown" lands on code 13
//   DIAGNOSIS_CODES    the 7 HAM10000 diagnosis codes, sorted
//
// The sorted order is the same order a fitted label encoder
// would produce on HAM10000, so the preprocessing output and
// the serving tables assign identical codes.
//
// Reference: HAM10000 dataset description (Tschandl et al. 2018)

/// Sex categories. Position = integer code.
pub const SEX_VOCAB: [&str; 3] = ["female", "male", "unknown"];

/// Body-site categories. Position = integer code.
pub const LOCALIZATION_VOCAB: [&str; 15] = [
    "abdomen",
    "acral",
    "back",
    "chest",
    "ear",
    "face",
    "foot",
    "genital",
    "hand",
    "lower extremity",
    "neck",
    "scalp",
    "trunk",
    "unknown",
    "upper extremity",
];

/// The label every categorical column falls back to
pub const UNKNOWN_LABEL: &str = "unknown";

pub const SEX_UNKNOWN: u32 = 2;
pub const LOCALIZATION_UNKNOWN: u32 = 13;

/// Diagnosis codes, sorted. Last-resort label decoding table when
/// no persisted label map is available.
pub const DIAGNOSIS_CODES: [&str; 7] = ["akiec", "bcc", "bkl", "df", "mel", "nv", "vasc"];

/// Human-readable name for a diagnosis code.
/// Unrecognised codes pass through unchanged.
pub fn diagnosis_full_name(code: &str) -> &str {
    match code {
        "akiec" => "Actinic keratoses and intraepithelial carcinoma",
        "bcc"   => "Basal cell carcinoma",
        "bkl"   => "Benign keratosis-like lesions",
        "df"    => "Dermatofibroma",
        "mel"   => "Melanoma",
        "nv"    => "Melanocytic nevi",
        "vasc"  => "Vascular lesions",
        other   => other,
    }
}
