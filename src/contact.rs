/// Reduces a phone number to digits and prefixes the country code.
///
/// Returns `None` when the input carries no digits at all.
pub(crate) fn normalize_contact_address(raw: &str, country_code: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|ch| ch.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    Some(format!("{country_code}{digits}"))
}
