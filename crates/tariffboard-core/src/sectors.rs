//! Static mapping from 2-digit HS chapters to coarse economic sectors.
//!
//! The sector names form a closed set; any industry row persisted to the
//! store must carry one of [`SECTORS`]. Chapters without an explicit entry
//! map to `"Miscellaneous"`.

/// The closed set of sector names used across the system.
pub const SECTORS: &[&str] = &[
    "Agriculture",
    "Steel",
    "Aluminum",
    "Chemicals",
    "Pharmaceuticals",
    "Technology",
    "Automotive",
    "Textiles & Apparel",
    "Energy",
    "Metals",
    "Wood & Paper",
    "Plastics & Rubber",
    "Transportation",
    "Precision Instruments",
    "Miscellaneous",
    "Unknown",
];

/// Maps a 2-digit HS chapter code (e.g. `"72"`) to its sector.
///
/// Unmapped chapters return `"Miscellaneous"`.
#[must_use]
pub fn sector_for_hs_chapter(chapter: &str) -> &'static str {
    match chapter {
        "01" | "02" | "03" | "04" | "05" | "06" | "07" | "08" | "09" | "10" | "11" | "12"
        | "13" | "14" | "15" | "16" | "17" | "18" | "19" | "20" | "21" | "22" | "23" | "24" => {
            "Agriculture"
        }
        "27" => "Energy",
        "28" | "29" | "31" | "32" | "33" | "34" | "35" | "36" | "37" | "38" => "Chemicals",
        "30" => "Pharmaceuticals",
        "39" | "40" => "Plastics & Rubber",
        "41" | "42" | "43" | "50" | "51" | "52" | "53" | "54" | "55" | "56" | "57" | "58"
        | "59" | "60" | "61" | "62" | "63" | "64" | "65" => "Textiles & Apparel",
        "44" | "45" | "46" | "47" | "48" | "49" => "Wood & Paper",
        "72" | "73" => "Steel",
        "76" => "Aluminum",
        "74" | "75" | "78" | "79" | "80" | "81" | "82" | "83" => "Metals",
        "84" | "85" => "Technology",
        "87" => "Automotive",
        "86" | "88" | "89" => "Transportation",
        "90" | "91" => "Precision Instruments",
        _ => "Miscellaneous",
    }
}

/// Returns `true` when `sector` belongs to the closed sector set.
#[must_use]
pub fn is_known_sector(sector: &str) -> bool {
    SECTORS.contains(&sector)
}
