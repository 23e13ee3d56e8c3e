// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp id normalisation and phone-number variant generation.
//!
//! Drivers appear in the warehouse under several phone spellings
//! (`27831234567`, `0831234567`, `831234567`, `+27 83 123 4567`). The
//! normalised form is E.164 digits with the `27` country code and no
//! punctuation; variant generation produces every spelling a warehouse
//! column might use.

/// South African country code used for normalisation.
const COUNTRY_CODE: &str = "27";

/// Normalise a raw phone string to E.164 digits (`27XXXXXXXXX`).
///
/// Strips everything but digits, folds a leading `0` into the country code,
/// and prefixes the country code for bare 9-digit numbers. Idempotent:
/// `normalize_wa_id(normalize_wa_id(x)) == normalize_wa_id(x)`.
pub fn normalize_wa_id(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    if let Some(rest) = digits.strip_prefix('0') {
        return format!("{COUNTRY_CODE}{rest}");
    }
    if digits.len() == 9 {
        return format!("{COUNTRY_CODE}{digits}");
    }
    digits
}

/// Generate the phone spellings used to match against warehouse columns.
///
/// Returns the normalised form plus local (`0…`) and bare (no prefix)
/// variants, de-duplicated, longest first.
pub fn phone_variants(raw: &str) -> Vec<String> {
    let normalized = normalize_wa_id(raw);
    let mut variants = vec![normalized.clone()];

    if let Some(subscriber) = normalized.strip_prefix(COUNTRY_CODE) {
        variants.push(format!("0{subscriber}"));
        variants.push(subscriber.to_string());
        variants.push(format!("+{normalized}"));
    }

    variants.sort_by_key(|v| std::cmp::Reverse(v.len()));
    variants.dedup();
    variants
}

/// Strip a phone column value down to digits for comparison.
pub fn sanitize_phone_column(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_local_format() {
        assert_eq!(normalize_wa_id("0831234567"), "27831234567");
    }

    #[test]
    fn normalizes_bare_subscriber() {
        assert_eq!(normalize_wa_id("831234567"), "27831234567");
    }

    #[test]
    fn normalizes_formatted_international() {
        assert_eq!(normalize_wa_id("+27 83 123 4567"), "27831234567");
    }

    #[test]
    fn already_normalized_passes_through() {
        assert_eq!(normalize_wa_id("27831234567"), "27831234567");
    }

    #[test]
    fn normalize_is_idempotent() {
        for raw in ["0831234567", "+27 83 123 4567", "27831234567", "831234567"] {
            let once = normalize_wa_id(raw);
            assert_eq!(normalize_wa_id(&once), once, "not idempotent for {raw}");
        }
    }

    #[test]
    fn variants_cover_warehouse_spellings() {
        let variants = phone_variants("27831234567");
        assert!(variants.contains(&"27831234567".to_string()));
        assert!(variants.contains(&"0831234567".to_string()));
        assert!(variants.contains(&"831234567".to_string()));
        assert!(variants.contains(&"+27831234567".to_string()));
    }

    #[test]
    fn sanitize_strips_punctuation() {
        assert_eq!(sanitize_phone_column("+27 (83) 123-4567"), "27831234567");
    }
}
